use std::sync::Arc;

use crate::error::{GalleryError, Result};
use crate::models::{Face, FaceId, Person, PersonId, Photo, PhotoId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GalleryFilter {
    #[default]
    All,
    Person(PersonId),
}

impl GalleryFilter {
    pub fn matches(&self, photo: &Photo) -> bool {
        match self {
            GalleryFilter::All => true,
            GalleryFilter::Person(id) => photo.has_person(id),
        }
    }
}

/// Immutable state shared by everything rendering the gallery.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub photos: Arc<Vec<Photo>>,
    pub persons: Arc<Vec<Person>>,
}

/// Read model of the gallery. Every change swaps in a new snapshot; nothing
/// is mutated in place.
#[derive(Debug, Default)]
pub struct GalleryComposer {
    snapshot: Arc<Snapshot>,
    filter: GalleryFilter,
}

impl GalleryComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn set_photos(&mut self, photos: Vec<Photo>) {
        self.snapshot = Arc::new(Snapshot {
            photos: Arc::new(photos),
            persons: Arc::clone(&self.snapshot.persons),
        });
    }

    pub fn set_persons(&mut self, persons: Vec<Person>) {
        self.snapshot = Arc::new(Snapshot {
            photos: Arc::clone(&self.snapshot.photos),
            persons: Arc::new(persons),
        });
    }

    pub fn clear(&mut self) {
        self.snapshot = Arc::default();
        self.filter = GalleryFilter::All;
    }

    pub fn photos(&self) -> &[Photo] {
        &self.snapshot.photos
    }

    pub fn persons(&self) -> &[Person] {
        &self.snapshot.persons
    }

    pub fn photo(&self, photo_id: &PhotoId) -> Option<&Photo> {
        self.snapshot.photos.iter().find(|p| &p.id == photo_id)
    }

    pub fn face(&self, photo_id: &PhotoId, face_id: &FaceId) -> Option<&Face> {
        self.photo(photo_id).and_then(|p| p.face(face_id))
    }

    pub fn person(&self, person_id: &PersonId) -> Option<&Person> {
        self.snapshot.persons.iter().find(|p| &p.id == person_id)
    }

    pub fn filter(&self) -> &GalleryFilter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: GalleryFilter) {
        self.filter = filter;
    }

    /// Photos visible under `filter`, in snapshot order.
    pub fn view(&self, filter: &GalleryFilter) -> Vec<&Photo> {
        self.snapshot
            .photos
            .iter()
            .filter(|photo| filter.matches(photo))
            .collect()
    }

    pub fn current_view(&self) -> Vec<&Photo> {
        self.view(&self.filter)
    }

    /// Records `person` on a face of the snapshot. Every other face already
    /// showing the same person picks up the returned record too, so one
    /// snapshot never carries two names for one id. A missing photo or face
    /// means the snapshot drifted from the server and must be refreshed.
    pub fn patch_face(&mut self, photo_id: &PhotoId, face_id: &FaceId, person: Person) -> Result<()> {
        let photo_index = self
            .snapshot
            .photos
            .iter()
            .position(|p| &p.id == photo_id)
            .ok_or_else(|| GalleryError::consistency(format!("photo {} is not in the gallery", photo_id)))?;
        let face_index = self.snapshot.photos[photo_index]
            .faces
            .iter()
            .position(|f| &f.id == face_id)
            .ok_or_else(|| {
                GalleryError::consistency(format!("face {} is not on photo {}", face_id, photo_id))
            })?;

        let mut photos = self.snapshot.photos.as_ref().clone();
        let face = &mut photos[photo_index].faces[face_index];
        face.person = Some(person.clone());
        face.is_verified = true;

        for face in photos.iter_mut().flat_map(|p| p.faces.iter_mut()) {
            if face.person_id() == Some(&person.id) {
                face.person = Some(person.clone());
            }
        }

        let mut persons = self.snapshot.persons.as_ref().clone();
        match persons.iter_mut().find(|p| p.id == person.id) {
            Some(existing) => *existing = person,
            None => persons.push(person),
        }

        self.snapshot = Arc::new(Snapshot {
            photos: Arc::new(photos),
            persons: Arc::new(persons),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundingBox;
    use chrono::Utc;

    fn person(id: &str, name: &str) -> Person {
        Person {
            id: id.into(),
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }

    fn face(id: &str, photo: &str, person: Option<Person>) -> Face {
        Face {
            id: id.into(),
            photo_id: photo.into(),
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            confidence: 0.9,
            is_verified: person.is_some(),
            person,
        }
    }

    fn photo(id: &str, faces: Vec<Face>) -> Photo {
        Photo {
            id: id.into(),
            filename: format!("{}.jpg", id),
            original_name: format!("{}.jpg", id),
            file_size: 10,
            width: Some(100),
            height: Some(100),
            faces,
            created_at: Utc::now(),
        }
    }

    fn composer() -> GalleryComposer {
        let ann = person("ann", "Ann");
        let mut composer = GalleryComposer::new();
        composer.set_persons(vec![ann.clone(), person("lonely", "Lonely")]);
        composer.set_photos(vec![
            photo("p1", vec![face("f1", "p1", Some(ann.clone())), face("f2", "p1", None)]),
            photo("p2", vec![face("f3", "p2", None)]),
            photo("p3", vec![face("f4", "p3", Some(ann))]),
            photo("p4", Vec::new()),
        ]);
        composer
    }

    fn ids(photos: Vec<&Photo>) -> Vec<&str> {
        photos.into_iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_view_all_keeps_every_photo_in_order() {
        let composer = composer();
        assert_eq!(ids(composer.view(&GalleryFilter::All)), vec!["p1", "p2", "p3", "p4"]);
        // Idempotent.
        assert_eq!(ids(composer.view(&GalleryFilter::All)), vec!["p1", "p2", "p3", "p4"]);
    }

    #[test]
    fn test_view_person_keeps_only_their_photos() {
        let composer = composer();
        assert_eq!(ids(composer.view(&GalleryFilter::Person("ann".into()))), vec!["p1", "p3"]);
        assert!(composer.view(&GalleryFilter::Person("lonely".into())).is_empty());
    }

    #[test]
    fn test_patch_face_replaces_snapshot() {
        let mut composer = composer();
        let before = composer.snapshot();
        let bob = person("bob", "Bob");

        composer.patch_face(&"p2".into(), &"f3".into(), bob.clone()).unwrap();

        assert!(before.photos[1].faces[0].person.is_none());
        let patched = composer.face(&"p2".into(), &"f3".into()).unwrap();
        assert_eq!(patched.person.as_ref(), Some(&bob));
        assert!(patched.is_verified);
        assert_eq!(composer.person(&"bob".into()), Some(&bob));
        assert_eq!(ids(composer.view(&GalleryFilter::Person("bob".into()))), vec!["p2"]);
    }

    #[test]
    fn test_patch_face_refreshes_other_copies_of_person() {
        let mut composer = composer();
        let renamed = person("ann", "Annie");

        composer.patch_face(&"p2".into(), &"f3".into(), renamed.clone()).unwrap();

        for (photo_id, face_id) in [("p1", "f1"), ("p2", "f3"), ("p3", "f4")] {
            let face = composer.face(&photo_id.into(), &face_id.into()).unwrap();
            assert_eq!(face.person.as_ref(), Some(&renamed));
        }
        assert_eq!(composer.persons().len(), 2);
        assert_eq!(composer.person(&"ann".into()).unwrap().name, "Annie");
        assert!(composer.face(&"p1".into(), &"f2".into()).unwrap().person.is_none());
    }

    #[test]
    fn test_patch_face_reports_drift() {
        let mut composer = composer();
        let bob = person("bob", "Bob");

        let missing_photo = composer.patch_face(&"gone".into(), &"f3".into(), bob.clone());
        assert!(matches!(missing_photo, Err(GalleryError::Consistency(_))));

        let missing_face = composer.patch_face(&"p2".into(), &"f1".into(), bob);
        assert!(matches!(missing_face, Err(ref e) if e.needs_refresh()));
        assert!(composer.person(&"bob".into()).is_none());
    }

    #[test]
    fn test_filter_selection() {
        let mut composer = composer();
        composer.set_filter(GalleryFilter::Person("ann".into()));
        assert_eq!(ids(composer.current_view()), vec!["p1", "p3"]);

        composer.clear();
        assert_eq!(composer.filter(), &GalleryFilter::All);
        assert!(composer.current_view().is_empty());
    }
}
