//! Server-side gallery operations: storing uploads, running detection,
//! resolving face assignments and deleting photos.

use chrono::Utc;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::metrics;
use crate::db::{faces, Database};
use crate::detector::{normalize_detections, DetectedFace, FaceDetector};
use crate::error::{GalleryError, Result};
use crate::models::{
    AssignFaceRequest, AssignFaceResponse, Face, FaceId, Page, Person, PersonId, Photo, PhotoId,
    PhotoPage, UploadFile,
};
use crate::registry::{normalize_name, PersonChoice, PersonRegistry};

pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.7;

pub struct GalleryService {
    db: Database,
    upload_dir: PathBuf,
    detector: Option<Arc<dyn FaceDetector>>,
    match_threshold: f32,
}

impl GalleryService {
    pub fn new(db: Database, upload_dir: PathBuf) -> Self {
        Self {
            db,
            upload_dir,
            detector: None,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }

    pub fn with_detector(mut self, detector: Arc<dyn FaceDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn with_match_threshold(mut self, threshold: f32) -> Self {
        self.match_threshold = threshold;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub async fn upload(&self, file: UploadFile) -> Result<Photo> {
        let content_type = resolve_content_type(&file);
        if !content_type.starts_with("image/") {
            return Err(GalleryError::validation("file must be an image"));
        }
        if file.bytes.is_empty() {
            return Err(GalleryError::validation("file is empty"));
        }

        let dimensions = read_dimensions(&file.bytes);
        if dimensions.is_none() {
            warn!("Could not read dimensions of {}", file.file_name);
        }

        let detections = self.detect(&file).await;
        let detections = normalize_detections(detections, dimensions, self.match_threshold);

        let photo_id = PhotoId::generate();
        let mut faces = Vec::with_capacity(detections.len());
        for detection in detections {
            let person = self.suggested_person(&detection).await?;
            faces.push(Face {
                id: FaceId::generate(),
                photo_id: photo_id.clone(),
                bbox: detection.bbox,
                confidence: detection.confidence,
                is_verified: person.is_some(),
                person,
            });
        }

        let extension = Path::new(&file.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
            .unwrap_or_default();
        let filename = format!("{}{}", Uuid::new_v4(), extension);

        let photo = Photo {
            id: photo_id,
            filename: filename.clone(),
            original_name: file.file_name.clone(),
            file_size: file.bytes.len() as i64,
            width: dimensions.map(|(w, _)| w),
            height: dimensions.map(|(_, h)| h),
            faces,
            created_at: Utc::now(),
        };

        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(anyhow::Error::from)?;
        let file_path = self.upload_dir.join(&filename);
        tokio::fs::write(&file_path, &file.bytes)
            .await
            .map_err(anyhow::Error::from)?;

        if let Err(e) = self.db.insert_photo(&photo, &file_path.to_string_lossy()).await {
            if let Err(remove_err) = tokio::fs::remove_file(&file_path).await {
                warn!("Failed to remove {} after failed insert: {}", file_path.display(), remove_err);
            }
            return Err(e.into());
        }

        info!(
            "Uploaded {} as photo {} with {} faces",
            photo.original_name,
            photo.id,
            photo.faces.len()
        );
        metrics::record_photo_uploaded(photo.faces.len() as u64);
        Ok(photo)
    }

    async fn detect(&self, file: &UploadFile) -> Vec<DetectedFace> {
        let Some(detector) = &self.detector else {
            debug!("Face detection disabled, skipping {}", file.file_name);
            return Vec::new();
        };

        match detector.detect(&file.bytes).await {
            Ok(faces) => faces,
            Err(e) => {
                warn!("Face detection with {} failed for {}: {:#}", detector.name(), file.file_name, e);
                Vec::new()
            }
        }
    }

    async fn suggested_person(&self, detection: &DetectedFace) -> Result<Option<Person>> {
        let Some(suggestion) = &detection.suggestion else {
            return Ok(None);
        };

        let person = self.db.get_person(&suggestion.person_id).await?;
        match &person {
            Some(p) => debug!("Auto-matched face to {} (similarity {:.2})", p.name, suggestion.similarity),
            None => warn!("Detector suggested unknown person {}", suggestion.person_id),
        }
        Ok(person)
    }

    pub async fn list_photos(&self, person_id: Option<&PersonId>, page: Page) -> Result<PhotoPage> {
        let (photos, total) = self.db.list_photos(person_id, page).await?;
        Ok(PhotoPage { photos, total })
    }

    pub async fn get_photo(&self, photo_id: &PhotoId) -> Result<Photo> {
        self.db
            .get_photo(photo_id)
            .await?
            .ok_or_else(|| GalleryError::not_found("photo", photo_id))
    }

    pub async fn list_persons(&self) -> Result<Vec<Person>> {
        Ok(self.db.list_persons().await?)
    }

    pub async fn assign_face(&self, face_id: &FaceId, request: AssignFaceRequest) -> Result<AssignFaceResponse> {
        let choice = PersonChoice::try_from(request)?;
        self.assign_face_to(face_id, choice).await
    }

    /// Links a face to the resolved person. Person creation and the face
    /// update commit together or not at all.
    pub async fn assign_face_to(&self, face_id: &FaceId, choice: PersonChoice) -> Result<AssignFaceResponse> {
        let mode = choice.mode();
        let created = matches!(choice, PersonChoice::NewName(_));
        let mut tx = self.db.pool().begin().await?;

        if faces::find_face(&mut *tx, face_id).await?.is_none() {
            return Err(GalleryError::not_found("face", face_id));
        }

        let person = PersonRegistry::resolve(&mut *tx, choice).await?;
        faces::set_face_person(&mut *tx, face_id, &person.id).await?;
        let face = faces::find_face(&mut *tx, face_id)
            .await?
            .ok_or_else(|| GalleryError::not_found("face", face_id))?;

        tx.commit().await?;

        info!("Assigned face {} to {} ({})", face_id, person.name, mode);
        metrics::record_face_assigned(mode);
        if created {
            metrics::record_person_created();
        }
        Ok(AssignFaceResponse { face, person })
    }

    pub async fn rename_person(&self, person_id: &PersonId, name: &str) -> Result<Person> {
        let name = normalize_name(name)?;
        let person = self
            .db
            .rename_person(person_id, &name)
            .await?
            .ok_or_else(|| GalleryError::not_found("person", person_id))?;

        info!("Renamed person {} to {}", person.id, person.name);
        Ok(person)
    }

    /// Deletes the photo with its faces. Persons are left alone, including
    /// those that no longer appear on any photo.
    pub async fn delete_photo(&self, photo_id: &PhotoId) -> Result<()> {
        let file_path = self
            .db
            .delete_photo(photo_id)
            .await?
            .ok_or_else(|| GalleryError::not_found("photo", photo_id))?;

        if let Err(e) = tokio::fs::remove_file(&file_path).await {
            warn!("Failed to remove stored file {}: {}", file_path, e);
        }

        info!("Deleted photo {}", photo_id);
        metrics::record_photo_deleted();
        Ok(())
    }
}

fn resolve_content_type(file: &UploadFile) -> String {
    match file.content_type.as_deref() {
        Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => ct.to_lowercase(),
        _ => mime_guess::from_path(&file.file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

fn read_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()?;

    (width > 0 && height > 0).then_some((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_falls_back_to_file_name() {
        let file = UploadFile::new("holiday.JPG", vec![1]);
        assert_eq!(resolve_content_type(&file), "image/jpeg");

        let file = UploadFile::new("notes.txt", vec![1]).with_content_type("application/octet-stream");
        assert_eq!(resolve_content_type(&file), "text/plain");

        let file = UploadFile::new("blob", vec![1]).with_content_type("image/png");
        assert_eq!(resolve_content_type(&file), "image/png");
    }

    #[test]
    fn test_unreadable_images_have_no_dimensions() {
        assert_eq!(read_dimensions(b"definitely not an image"), None);
    }
}
