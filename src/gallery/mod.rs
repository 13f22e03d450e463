//! Client-side gallery core: the read model, the face assignment workflow
//! and the coordinator tying them to a backend.

pub mod composer;
pub mod coordinator;
pub mod workflow;

pub use composer::{GalleryComposer, GalleryFilter, Snapshot};
pub use coordinator::{DeleteOutcome, GalleryCoordinator};
pub use workflow::{AssignmentForm, AssignmentOutcome, AssignmentState, AssignmentWorkflow, FaceTarget};
