//! Interactive assignment of a person to one unlabeled face.
//!
//! ```text
//! Idle --select--> FaceSelected --submit--> Submitting --ok--> Idle
//!                       ^                        |
//!                       +---------- error -------+
//! ```

use std::collections::HashSet;
use std::mem;
use tracing::{debug, info, warn};

use crate::client::GalleryBackend;
use crate::config::Session;
use crate::error::{GalleryError, Result};
use crate::gallery::composer::GalleryComposer;
use crate::models::{AssignFaceResponse, FaceId, Person, PersonId, PhotoId};
use crate::registry::PersonChoice;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FaceTarget {
    pub photo_id: PhotoId,
    pub face_id: FaceId,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum AssignmentState {
    #[default]
    Idle,
    FaceSelected(FaceTarget),
    Submitting {
        target: FaceTarget,
        choice: PersonChoice,
    },
}

/// What the user typed or picked. Only one of the two may be filled in.
#[derive(Debug, Clone, Default)]
pub struct AssignmentForm {
    pub new_name: String,
    pub existing: Option<PersonId>,
}

impl AssignmentForm {
    pub fn choice(&self) -> Result<PersonChoice> {
        PersonChoice::from_parts(Some(&self.new_name), self.existing.as_ref())
    }
}

/// A submission handed to the backend and not yet answered.
#[derive(Debug)]
pub struct PendingAssignment {
    pub target: FaceTarget,
    pub choice: PersonChoice,
}

#[derive(Debug)]
pub enum AssignmentOutcome {
    Assigned { target: FaceTarget, person: Person },
    /// The form did not resolve to exactly one person; nothing was sent.
    Rejected(GalleryError),
    Failed(GalleryError),
    /// Result of a submission whose view was closed, dropped because its
    /// face is gone or the request failed.
    Discarded,
}

#[derive(Debug, Default)]
pub struct AssignmentWorkflow {
    state: AssignmentState,
    form: AssignmentForm,
    in_flight: HashSet<FaceId>,
    detached: HashSet<FaceId>,
}

impl AssignmentWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &AssignmentState {
        &self.state
    }

    pub fn form(&self) -> &AssignmentForm {
        &self.form
    }

    pub fn selected(&self) -> Option<&FaceTarget> {
        match &self.state {
            AssignmentState::Idle => None,
            AssignmentState::FaceSelected(target) => Some(target),
            AssignmentState::Submitting { target, .. } => Some(target),
        }
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.state, AssignmentState::Submitting { .. })
    }

    /// Opens the assignment for an unlabeled face. Labeled faces, faces with
    /// a submission in flight, and any selection while submitting are
    /// ignored and return `false`.
    pub fn select_face(
        &mut self,
        composer: &GalleryComposer,
        photo_id: &PhotoId,
        face_id: &FaceId,
    ) -> Result<bool> {
        if self.is_submitting() || self.in_flight.contains(face_id) {
            return Ok(false);
        }

        let face = composer.face(photo_id, face_id).ok_or_else(|| {
            GalleryError::consistency(format!("face {} is not on photo {}", face_id, photo_id))
        })?;

        if face.is_assigned() {
            debug!("Face {} is already labeled", face_id);
            return Ok(false);
        }

        let target = FaceTarget {
            photo_id: photo_id.clone(),
            face_id: face_id.clone(),
        };
        if self.selected() != Some(&target) {
            self.form = AssignmentForm::default();
        }
        self.state = AssignmentState::FaceSelected(target);
        Ok(true)
    }

    pub fn set_new_name(&mut self, name: impl Into<String>) {
        self.form.new_name = name.into();
    }

    pub fn select_existing(&mut self, person_id: Option<PersonId>) {
        self.form.existing = person_id;
    }

    /// Whether the submit action is enabled.
    pub fn can_submit(&self) -> bool {
        matches!(self.state, AssignmentState::FaceSelected(_)) && self.form.choice().is_ok()
    }

    pub fn begin_submit(&mut self) -> Result<PendingAssignment> {
        let target = match &self.state {
            AssignmentState::FaceSelected(target) => target.clone(),
            AssignmentState::Idle => return Err(GalleryError::validation("no face selected")),
            AssignmentState::Submitting { .. } => {
                return Err(GalleryError::validation("an assignment is already being submitted"))
            }
        };
        let choice = self.form.choice()?;

        self.in_flight.insert(target.face_id.clone());
        self.state = AssignmentState::Submitting {
            target: target.clone(),
            choice: choice.clone(),
        };
        Ok(PendingAssignment { target, choice })
    }

    /// Applies the backend answer for `pending`.
    pub fn finish(
        &mut self,
        pending: PendingAssignment,
        result: Result<AssignFaceResponse>,
        composer: &mut GalleryComposer,
    ) -> AssignmentOutcome {
        let PendingAssignment { target, .. } = pending;
        self.in_flight.remove(&target.face_id);
        let detached = self.detached.remove(&target.face_id);

        let response = match result {
            Ok(response) => response,
            Err(err) if detached => {
                warn!("Assignment of face {} failed after its view closed: {}", target.face_id, err);
                return AssignmentOutcome::Discarded;
            }
            Err(err) => {
                self.state = AssignmentState::FaceSelected(target);
                return AssignmentOutcome::Failed(err);
            }
        };

        let applied = if response.face.id != target.face_id {
            Err(GalleryError::consistency(format!(
                "server assigned face {} instead of {}",
                response.face.id, target.face_id
            )))
        } else {
            composer.patch_face(&target.photo_id, &target.face_id, response.person.clone())
        };

        if let Err(err) = applied {
            if detached {
                warn!("Discarding assignment of face {}: {}", target.face_id, err);
                return AssignmentOutcome::Discarded;
            }
            self.reset();
            return AssignmentOutcome::Failed(err);
        }

        if !detached {
            self.reset();
        }
        info!("Face {} assigned to {}", target.face_id, response.person.name);
        AssignmentOutcome::Assigned {
            target,
            person: response.person,
        }
    }

    /// Closes the assignment view. A submission already sent keeps running
    /// and is applied by `finish` if its face still exists.
    pub fn cancel(&mut self) {
        if let AssignmentState::Submitting { target, .. } = mem::take(&mut self.state) {
            self.detached.insert(target.face_id);
        }
        self.form = AssignmentForm::default();
    }

    pub async fn submit<B>(
        &mut self,
        backend: &B,
        session: &Session,
        composer: &mut GalleryComposer,
    ) -> AssignmentOutcome
    where
        B: GalleryBackend + ?Sized,
    {
        let pending = match self.begin_submit() {
            Ok(pending) => pending,
            Err(err) => return AssignmentOutcome::Rejected(err),
        };

        let result = backend
            .assign_face(session, &pending.target.face_id, &pending.choice)
            .await;
        self.finish(pending, result, composer)
    }

    fn reset(&mut self) {
        self.state = AssignmentState::Idle;
        self.form = AssignmentForm::default();
    }
}
