//! Projection of absolute pixel face boxes onto resolution-independent
//! percentage overlays, and back.

use serde::{Deserialize, Serialize};

use crate::error::{GalleryError, Result};
use crate::models::{BoundingBox, FaceId, Photo};

/// Box position and size as percentages of the displayed photo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    pub left_pct: f64,
    pub top_pct: f64,
    pub width_pct: f64,
    pub height_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceOverlay {
    pub face_id: FaceId,
    pub overlay: Overlay,
    pub label: Option<String>,
    /// Only unlabeled faces can be picked for assignment.
    pub assignable: bool,
}

fn photo_dims(photo_width: Option<u32>, photo_height: Option<u32>) -> Result<(f64, f64)> {
    match (photo_width, photo_height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Ok((w as f64, h as f64)),
        (w, h) => Err(GalleryError::geometry(format!(
            "photo dimensions must be positive, got {}x{}",
            w.map_or_else(|| "?".to_string(), |v| v.to_string()),
            h.map_or_else(|| "?".to_string(), |v| v.to_string()),
        ))),
    }
}

fn ensure_finite(values: [f64; 4]) -> Result<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(GalleryError::geometry("box coordinates must be finite"))
    }
}

pub fn to_overlay(
    bbox: &BoundingBox,
    photo_width: Option<u32>,
    photo_height: Option<u32>,
) -> Result<Overlay> {
    let (w, h) = photo_dims(photo_width, photo_height)?;
    ensure_finite([bbox.x, bbox.y, bbox.width, bbox.height])?;

    let left_pct = (bbox.x / w * 100.0).clamp(0.0, 100.0);
    let top_pct = (bbox.y / h * 100.0).clamp(0.0, 100.0);
    let width_pct = (bbox.width / w * 100.0).clamp(0.0, 100.0 - left_pct);
    let height_pct = (bbox.height / h * 100.0).clamp(0.0, 100.0 - top_pct);

    Ok(Overlay {
        left_pct,
        top_pct,
        width_pct,
        height_pct,
    })
}

pub fn to_absolute(
    overlay: &Overlay,
    photo_width: Option<u32>,
    photo_height: Option<u32>,
) -> Result<BoundingBox> {
    let (w, h) = photo_dims(photo_width, photo_height)?;
    ensure_finite([
        overlay.left_pct,
        overlay.top_pct,
        overlay.width_pct,
        overlay.height_pct,
    ])?;

    Ok(BoundingBox::new(
        overlay.left_pct.clamp(0.0, 100.0) / 100.0 * w,
        overlay.top_pct.clamp(0.0, 100.0) / 100.0 * h,
        overlay.width_pct.clamp(0.0, 100.0) / 100.0 * w,
        overlay.height_pct.clamp(0.0, 100.0) / 100.0 * h,
    ))
}

/// Overlays for every face of a photo, in face order.
pub fn face_overlays(photo: &Photo) -> Result<Vec<FaceOverlay>> {
    photo
        .faces
        .iter()
        .map(|face| {
            Ok(FaceOverlay {
                face_id: face.id.clone(),
                overlay: to_overlay(&face.bbox, photo.width, photo.height)?,
                label: face.person.as_ref().map(|p| p.name.clone()),
                assignable: !face.is_assigned(),
            })
        })
        .collect()
}
