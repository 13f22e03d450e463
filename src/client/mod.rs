//! The boundary operations the gallery core consumes.

pub mod http;
pub mod local;

use async_trait::async_trait;

use crate::config::Session;
use crate::error::Result;
use crate::models::{AssignFaceResponse, FaceId, Person, PersonId, Photo, PhotoId, UploadFile};
use crate::registry::PersonChoice;

pub use http::HttpBackend;
pub use local::LocalBackend;

/// Every call crosses the system boundary and takes the session explicitly.
#[async_trait]
pub trait GalleryBackend: Send + Sync {
    /// All photos, newest first, optionally only those showing `person_id`.
    async fn list_photos(&self, session: &Session, person_id: Option<&PersonId>) -> Result<Vec<Photo>>;

    async fn list_persons(&self, session: &Session) -> Result<Vec<Person>>;

    /// Stores the file and returns the new photo with its detected faces.
    async fn upload_photo(&self, session: &Session, file: UploadFile) -> Result<Photo>;

    async fn assign_face(
        &self,
        session: &Session,
        face_id: &FaceId,
        choice: &PersonChoice,
    ) -> Result<AssignFaceResponse>;

    async fn delete_photo(&self, session: &Session, photo_id: &PhotoId) -> Result<()>;
}
