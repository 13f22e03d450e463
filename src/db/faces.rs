use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashMap;

use crate::db::Database;
use crate::models::{BoundingBox, Face, FaceId, Person, PersonId, PhotoId};

const IDS_PER_QUERY: usize = 500;

pub(crate) const FACE_SELECT: &str = r#"
    SELECT f.id, f.photo_id, f.bbox_x, f.bbox_y, f.bbox_width, f.bbox_height,
           f.confidence, f.is_verified,
           p.id AS person_id, p.name AS person_name, p.created_at AS person_created_at
    FROM faces f
    LEFT JOIN persons p ON p.id = f.person_id
"#;

#[derive(Debug, FromRow)]
pub(crate) struct FaceRow {
    id: FaceId,
    photo_id: PhotoId,
    bbox_x: f64,
    bbox_y: f64,
    bbox_width: f64,
    bbox_height: f64,
    confidence: f64,
    is_verified: bool,
    person_id: Option<PersonId>,
    person_name: Option<String>,
    person_created_at: Option<DateTime<Utc>>,
}

impl From<FaceRow> for Face {
    fn from(row: FaceRow) -> Self {
        let person = match (row.person_id, row.person_name, row.person_created_at) {
            (Some(id), Some(name), Some(created_at)) => Some(Person { id, name, created_at }),
            _ => None,
        };

        Face {
            id: row.id,
            photo_id: row.photo_id,
            bbox: BoundingBox::new(row.bbox_x, row.bbox_y, row.bbox_width, row.bbox_height),
            confidence: row.confidence as f32,
            is_verified: row.is_verified,
            person,
        }
    }
}

pub async fn find_face(conn: &mut SqliteConnection, face_id: &FaceId) -> Result<Option<Face>> {
    let row = sqlx::query_as::<_, FaceRow>(&format!("{} WHERE f.id = ?1", FACE_SELECT))
        .bind(face_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(Face::from))
}

/// Links a face to a person and marks it as confirmed.
pub async fn set_face_person(
    conn: &mut SqliteConnection,
    face_id: &FaceId,
    person_id: &PersonId,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE faces
        SET person_id = ?2,
            is_verified = 1
        WHERE id = ?1
        "#,
    )
    .bind(face_id)
    .bind(person_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn insert_face(
    conn: &mut SqliteConnection,
    face: &Face,
    position: i64,
    detected_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO faces (
            id, photo_id, person_id, position,
            bbox_x, bbox_y, bbox_width, bbox_height,
            confidence, is_verified, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&face.id)
    .bind(&face.photo_id)
    .bind(face.person_id())
    .bind(position)
    .bind(face.bbox.x)
    .bind(face.bbox.y)
    .bind(face.bbox.width)
    .bind(face.bbox.height)
    .bind(face.confidence as f64)
    .bind(face.is_verified)
    .bind(detected_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

impl Database {
    /// Faces of the given photos, grouped by photo and kept in detector order.
    /// Ids are bound in chunks to stay under SQLite's host parameter limit.
    pub async fn faces_for_photos(&self, photo_ids: &[PhotoId]) -> Result<HashMap<PhotoId, Vec<Face>>> {
        let mut grouped: HashMap<PhotoId, Vec<Face>> = HashMap::new();

        for chunk in photo_ids.chunks(IDS_PER_QUERY) {
            let mut query = QueryBuilder::<Sqlite>::new(FACE_SELECT);
            query.push(" WHERE f.photo_id IN (");
            let mut ids = query.separated(", ");
            for id in chunk {
                ids.push_bind(id.clone());
            }
            ids.push_unseparated(")");
            query.push(" ORDER BY f.photo_id, f.position");

            let rows = query.build_query_as::<FaceRow>().fetch_all(&self.pool).await?;
            for row in rows {
                let face = Face::from(row);
                grouped.entry(face.photo_id.clone()).or_default().push(face);
            }
        }

        Ok(grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Photo;

    fn photo_with_face(id: &str) -> Photo {
        let photo_id = PhotoId::from(id);
        Photo {
            id: photo_id.clone(),
            filename: format!("{}.png", id),
            original_name: format!("{}.png", id),
            file_size: 1,
            width: Some(100),
            height: Some(100),
            faces: vec![Face {
                id: FaceId::generate(),
                photo_id,
                bbox: BoundingBox::new(1.0, 2.0, 3.0, 4.0),
                confidence: 0.5,
                is_verified: false,
                person: None,
            }],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_faces_for_many_photos() {
        let db = Database::in_memory().await.unwrap();
        for id in ["a", "b"] {
            db.insert_photo(&photo_with_face(id), id).await.unwrap();
        }

        // More ids than SQLite accepts as parameters of a single statement.
        let mut ids: Vec<PhotoId> = (0..40_000).map(|i| PhotoId::from(format!("ghost-{}", i))).collect();
        ids.insert(0, "a".into());
        ids.push("b".into());

        let grouped = db.faces_for_photos(&ids).await.unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&PhotoId::from("a")].len(), 1);
        assert_eq!(grouped[&PhotoId::from("b")][0].bbox, BoundingBox::new(1.0, 2.0, 3.0, 4.0));
    }
}
