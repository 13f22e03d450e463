use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

opaque_id!(PhotoId);
opaque_id!(FaceId);
opaque_id!(PersonId);

/// Face location in absolute pixels of the owning photo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn fits_within(&self, photo_width: u32, photo_height: u32) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.width >= 0.0
            && self.height >= 0.0
            && self.x + self.width <= photo_width as f64
            && self.y + self.height <= photo_height as f64
    }

    /// Intersects the box with the photo rectangle. Returns `None` when
    /// nothing of the box is left inside the photo.
    pub fn clamp_to(&self, photo_width: u32, photo_height: u32) -> Option<Self> {
        let values = [self.x, self.y, self.width, self.height];
        if values.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let (w, h) = (photo_width as f64, photo_height as f64);
        let left = self.x.clamp(0.0, w);
        let top = self.y.clamp(0.0, h);
        let right = (self.x + self.width).clamp(0.0, w);
        let bottom = (self.y + self.height).clamp(0.0, h);

        if right <= left || bottom <= top {
            return None;
        }

        Some(Self::new(left, top, right - left, bottom - top))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub id: FaceId,
    pub photo_id: PhotoId,
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub is_verified: bool,
    pub person: Option<Person>,
}

impl Face {
    pub fn person_id(&self) -> Option<&PersonId> {
        self.person.as_ref().map(|p| &p.id)
    }

    pub fn is_assigned(&self) -> bool {
        self.person.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: PhotoId,
    pub filename: String,
    pub original_name: String,
    pub file_size: i64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub faces: Vec<Face>,
    pub created_at: DateTime<Utc>,
}

impl Photo {
    pub fn faces_count(&self) -> usize {
        self.faces.len()
    }

    pub fn face(&self, face_id: &FaceId) -> Option<&Face> {
        self.faces.iter().find(|f| &f.id == face_id)
    }

    pub fn has_person(&self, person_id: &PersonId) -> bool {
        self.faces.iter().any(|f| f.person_id() == Some(person_id))
    }
}

/// A file handed to the gallery for storage and face detection.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Wire form of an assignment. Exactly one field is expected to be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignFaceRequest {
    pub person_id: Option<PersonId>,
    pub new_person_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignFaceResponse {
    pub face: Face,
    pub person: Person,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonUpdate {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoPage {
    pub photos: Vec<Photo>,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 100;

    pub fn new(skip: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            skip: skip.unwrap_or(0).max(0),
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
        }
    }

    /// Every row from the first one. SQLite treats a negative LIMIT as none.
    pub fn unbounded() -> Self {
        Self { skip: 0, limit: -1 }
    }
}
