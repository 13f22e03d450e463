use async_trait::async_trait;
use std::sync::Arc;

use crate::client::GalleryBackend;
use crate::config::Session;
use crate::error::Result;
use crate::models::{AssignFaceResponse, FaceId, Page, Person, PersonId, Photo, PhotoId, UploadFile};
use crate::registry::PersonChoice;
use crate::service::GalleryService;

/// Backend running the gallery service in the same process.
#[derive(Clone)]
pub struct LocalBackend {
    service: Arc<GalleryService>,
}

impl LocalBackend {
    pub fn new(service: Arc<GalleryService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &GalleryService {
        &self.service
    }
}

#[async_trait]
impl GalleryBackend for LocalBackend {
    async fn list_photos(&self, session: &Session, person_id: Option<&PersonId>) -> Result<Vec<Photo>> {
        session.ensure_active()?;
        let page = self.service.list_photos(person_id, Page::unbounded()).await?;
        Ok(page.photos)
    }

    async fn list_persons(&self, session: &Session) -> Result<Vec<Person>> {
        session.ensure_active()?;
        self.service.list_persons().await
    }

    async fn upload_photo(&self, session: &Session, file: UploadFile) -> Result<Photo> {
        session.ensure_active()?;
        self.service.upload(file).await
    }

    async fn assign_face(
        &self,
        session: &Session,
        face_id: &FaceId,
        choice: &PersonChoice,
    ) -> Result<AssignFaceResponse> {
        session.ensure_active()?;
        self.service.assign_face_to(face_id, choice.clone()).await
    }

    async fn delete_photo(&self, session: &Session, photo_id: &PhotoId) -> Result<()> {
        session.ensure_active()?;
        self.service.delete_photo(photo_id).await
    }
}
