use futures::future::try_join;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::client::GalleryBackend;
use crate::config::Session;
use crate::error::{GalleryError, Result};
use crate::gallery::composer::{GalleryComposer, GalleryFilter};
use crate::gallery::workflow::{AssignmentOutcome, AssignmentWorkflow};
use crate::models::{Photo, PhotoId, UploadFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Cancelled,
}

/// Drives the gallery for one session: loads the snapshot, uploads and
/// deletes photos and submits face assignments through the backend.
pub struct GalleryCoordinator {
    backend: Arc<dyn GalleryBackend>,
    session: Session,
    composer: GalleryComposer,
}

impl GalleryCoordinator {
    pub fn new(backend: Arc<dyn GalleryBackend>, session: Session) -> Self {
        Self {
            backend,
            session,
            composer: GalleryComposer::new(),
        }
    }

    pub fn composer(&self) -> &GalleryComposer {
        &self.composer
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn set_filter(&mut self, filter: GalleryFilter) {
        self.composer.set_filter(filter);
    }

    pub fn view(&self) -> Vec<&Photo> {
        self.composer.current_view()
    }

    /// Reloads photos and persons together. Neither is replaced unless both
    /// requests succeed.
    pub async fn refresh(&mut self) -> Result<()> {
        let (photos, persons) = try_join(
            self.backend.list_photos(&self.session, None),
            self.backend.list_persons(&self.session),
        )
        .await?;

        debug!("Refreshed gallery: {} photos, {} persons", photos.len(), persons.len());
        self.composer.set_photos(photos);
        self.composer.set_persons(persons);
        Ok(())
    }

    pub async fn refresh_photos(&mut self) -> Result<()> {
        let photos = self.backend.list_photos(&self.session, None).await?;
        self.composer.set_photos(photos);
        Ok(())
    }

    /// Uploads a file and reloads the gallery. The upload is committed once
    /// this returns `Ok`; a failed reload is only logged and leaves the
    /// previous snapshot in place.
    pub async fn upload(&mut self, file: UploadFile) -> Result<Photo> {
        let photo = self.backend.upload_photo(&self.session, file).await?;
        info!("Uploaded photo {} with {} faces", photo.id, photo.faces_count());

        if let Err(e) = self.refresh().await {
            warn!("Failed to reload gallery after uploading {}: {}", photo.id, e);
        }
        Ok(photo)
    }

    /// Deletes a photo once `confirm` approves it. Persons stay untouched,
    /// even when the photo was their last one. As with `upload`, a failed
    /// reload after the deletion does not turn it into an error.
    pub async fn delete<F>(&mut self, photo_id: &PhotoId, confirm: F) -> Result<DeleteOutcome>
    where
        F: FnOnce(&Photo) -> bool,
    {
        let photo = self
            .composer
            .photo(photo_id)
            .ok_or_else(|| GalleryError::consistency(format!("photo {} is not in the gallery", photo_id)))?;

        if !confirm(photo) {
            debug!("Deletion of photo {} cancelled", photo_id);
            return Ok(DeleteOutcome::Cancelled);
        }

        self.backend.delete_photo(&self.session, photo_id).await?;
        info!("Deleted photo {}", photo_id);

        if let Err(e) = self.refresh_photos().await {
            warn!("Failed to reload photos after deleting {}: {}", photo_id, e);
        }
        Ok(DeleteOutcome::Deleted)
    }

    /// Submits the workflow's form. A `Failed` outcome whose error
    /// `needs_refresh()` leaves reloading to the caller.
    pub async fn assign(&mut self, workflow: &mut AssignmentWorkflow) -> AssignmentOutcome {
        let outcome = workflow
            .submit(self.backend.as_ref(), &self.session, &mut self.composer)
            .await;

        if let AssignmentOutcome::Failed(err) = &outcome {
            if err.needs_refresh() {
                warn!("Gallery out of sync with the server: {}", err);
            }
        }
        outcome
    }

    /// Ends the session. Later backend calls fail until a new coordinator
    /// is created.
    pub fn logout(&mut self) {
        self.session.invalidate();
        self.composer.clear();
        info!("Session closed");
    }
}
