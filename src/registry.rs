//! Resolution of assignment requests to person identities.
//!
//! A request names either a brand new person or an existing one, never both.
//! New names are not matched against existing persons: two requests with the
//! same name create two distinct persons.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{GalleryError, Result};
use crate::models::{AssignFaceRequest, Person, PersonId};

const EXACTLY_ONE: &str = "must supply exactly one of new name or existing person";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonChoice {
    NewName(String),
    Existing(PersonId),
}

/// Trims a display name, rejecting names that are blank.
pub fn normalize_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(GalleryError::validation("person name must not be empty"));
    }
    Ok(trimmed.to_string())
}

impl PersonChoice {
    pub fn new_name(name: &str) -> Result<Self> {
        normalize_name(name).map(Self::NewName)
    }

    pub fn existing(id: PersonId) -> Self {
        Self::Existing(id)
    }

    /// Builds a choice from loosely filled form fields. Blank names count as
    /// not supplied.
    pub fn from_parts(new_name: Option<&str>, existing: Option<&PersonId>) -> Result<Self> {
        let name = new_name.map(str::trim).filter(|n| !n.is_empty());
        match (name, existing) {
            (Some(name), None) => Self::new_name(name),
            (None, Some(id)) => Ok(Self::Existing(id.clone())),
            _ => Err(GalleryError::validation(EXACTLY_ONE)),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::NewName(_) => "new",
            Self::Existing(_) => "existing",
        }
    }
}

impl TryFrom<AssignFaceRequest> for PersonChoice {
    type Error = GalleryError;

    fn try_from(request: AssignFaceRequest) -> Result<Self> {
        Self::from_parts(request.new_person_name.as_deref(), request.person_id.as_ref())
    }
}

impl From<&PersonChoice> for AssignFaceRequest {
    fn from(choice: &PersonChoice) -> Self {
        match choice {
            PersonChoice::NewName(name) => Self {
                person_id: None,
                new_person_name: Some(name.clone()),
            },
            PersonChoice::Existing(id) => Self {
                person_id: Some(id.clone()),
                new_person_name: None,
            },
        }
    }
}

/// Storage the registry creates and looks up persons in.
#[async_trait]
pub trait PersonStore: Send {
    async fn insert_person(&mut self, name: &str) -> Result<Person>;
    async fn find_person(&mut self, id: &PersonId) -> Result<Option<Person>>;
}

pub struct PersonRegistry;

impl PersonRegistry {
    pub async fn resolve<S>(store: &mut S, choice: PersonChoice) -> Result<Person>
    where
        S: PersonStore + ?Sized,
    {
        match choice {
            PersonChoice::NewName(name) => {
                let name = normalize_name(&name)?;
                let person = store.insert_person(&name).await?;
                debug!("Created person {} ({})", person.id, person.name);
                Ok(person)
            }
            PersonChoice::Existing(id) => store
                .find_person(&id)
                .await?
                .ok_or_else(|| GalleryError::not_found("person", &id)),
        }
    }
}
