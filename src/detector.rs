//! Client side of the external face detection service.
//!
//! Detection and recognition run elsewhere; this module only ships image
//! bytes to the detector and normalizes what comes back.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::DetectorConfig;
use crate::models::{BoundingBox, PersonId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonSuggestion {
    pub person_id: PersonId,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub confidence: f32,
    #[serde(default)]
    pub suggestion: Option<PersonSuggestion>,
}

#[async_trait]
pub trait FaceDetector: Send + Sync {
    fn name(&self) -> &str;

    async fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>>;
}

#[derive(Debug, Deserialize)]
struct DetectionResponse {
    faces: Vec<DetectedFace>,
}

/// Detector reached over HTTP. The image is posted as the raw request body
/// and the service answers with `{"faces": [...]}`.
pub struct RemoteDetector {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteDetector {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create detector HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &DetectorConfig) -> Result<Option<Self>> {
        match &config.url {
            Some(url) => Ok(Some(Self::new(url.clone(), Duration::from_secs(config.timeout_secs))?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl FaceDetector for RemoteDetector {
    fn name(&self) -> &str {
        &self.endpoint
    }

    async fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .with_context(|| format!("Failed to reach face detector at {}", self.endpoint))?;

        if !response.status().is_success() {
            anyhow::bail!("Face detector returned HTTP {}", response.status());
        }

        let body: DetectionResponse = response
            .json()
            .await
            .context("Failed to parse face detector response")?;

        debug!("Detector {} returned {} faces", self.endpoint, body.faces.len());
        Ok(body.faces)
    }
}

/// Fits detector output to the photo: boxes are clipped to the photo bounds
/// and dropped when nothing remains, weak suggestions are removed.
pub fn normalize_detections(
    faces: Vec<DetectedFace>,
    dimensions: Option<(u32, u32)>,
    match_threshold: f32,
) -> Vec<DetectedFace> {
    faces
        .into_iter()
        .filter_map(|mut face| {
            if let Some((w, h)) = dimensions {
                match face.bbox.clamp_to(w, h) {
                    Some(bbox) => face.bbox = bbox,
                    None => {
                        warn!("Dropping face outside photo bounds: {:?}", face.bbox);
                        return None;
                    }
                }
            }

            if face
                .suggestion
                .as_ref()
                .is_some_and(|s| s.similarity.is_nan() || s.similarity < match_threshold)
            {
                face.suggestion = None;
            }

            Some(face)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(x: f64, y: f64, w: f64, h: f64, similarity: Option<f32>) -> DetectedFace {
        DetectedFace {
            bbox: BoundingBox::new(x, y, w, h),
            confidence: 0.9,
            suggestion: similarity.map(|similarity| PersonSuggestion {
                person_id: "p1".into(),
                similarity,
            }),
        }
    }

    #[test]
    fn test_normalize_clips_and_drops_boxes() {
        let faces = vec![
            detection(-4.0, 10.0, 40.0, 40.0, None),
            detection(500.0, 500.0, 10.0, 10.0, None),
        ];

        let normalized = normalize_detections(faces, Some((200, 100)), 0.7);

        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].bbox, BoundingBox::new(0.0, 10.0, 36.0, 40.0));
    }

    #[test]
    fn test_normalize_filters_weak_suggestions() {
        let faces = vec![
            detection(0.0, 0.0, 10.0, 10.0, Some(0.95)),
            detection(0.0, 0.0, 10.0, 10.0, Some(0.4)),
            detection(0.0, 0.0, 10.0, 10.0, Some(f32::NAN)),
        ];

        let normalized = normalize_detections(faces, None, 0.7);

        assert!(normalized[0].suggestion.is_some());
        assert!(normalized[1].suggestion.is_none());
        assert!(normalized[2].suggestion.is_none());
    }

    #[test]
    fn test_detection_response_defaults_suggestion() {
        let body = r#"{"faces":[{"bbox":{"x":1.0,"y":2.0,"width":3.0,"height":4.0},"confidence":0.8}]}"#;
        let parsed: DetectionResponse = serde_json::from_str(body).unwrap();

        assert_eq!(parsed.faces.len(), 1);
        assert!(parsed.faces[0].suggestion.is_none());
    }
}
