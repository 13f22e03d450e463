use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::debug;

use crate::db::{faces, Database};
use crate::models::{Page, PersonId, Photo, PhotoId};

#[derive(Debug, FromRow)]
struct PhotoRow {
    id: PhotoId,
    filename: String,
    original_name: String,
    file_size: i64,
    width: Option<i64>,
    height: Option<i64>,
    created_at: DateTime<Utc>,
}

impl PhotoRow {
    fn into_photo(self) -> Photo {
        Photo {
            id: self.id,
            filename: self.filename,
            original_name: self.original_name,
            file_size: self.file_size,
            width: self.width.and_then(|w| u32::try_from(w).ok()),
            height: self.height.and_then(|h| u32::try_from(h).ok()),
            faces: Vec::new(),
            created_at: self.created_at,
        }
    }
}

const PHOTO_COLUMNS: &str = "p.id, p.filename, p.original_name, p.file_size, p.width, p.height, p.created_at";

impl Database {
    /// Stores a photo and its detected faces atomically.
    pub async fn insert_photo(&self, photo: &Photo, file_path: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO photos (
                id, filename, original_name, file_path, file_size,
                width, height, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&photo.id)
        .bind(&photo.filename)
        .bind(&photo.original_name)
        .bind(file_path)
        .bind(photo.file_size)
        .bind(photo.width.map(i64::from))
        .bind(photo.height.map(i64::from))
        .bind(photo.created_at)
        .execute(&mut *tx)
        .await?;

        for (position, face) in photo.faces.iter().enumerate() {
            faces::insert_face(&mut *tx, face, position as i64, photo.created_at).await?;
        }

        tx.commit().await?;
        debug!("Stored photo {} with {} faces", photo.id, photo.faces.len());
        Ok(())
    }

    pub async fn get_photo(&self, id: &PhotoId) -> Result<Option<Photo>> {
        let row = sqlx::query_as::<_, PhotoRow>(&format!(
            "SELECT {} FROM photos p WHERE p.id = ?1",
            PHOTO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut photo = row.into_photo();
        let mut faces = self.faces_for_photos(std::slice::from_ref(&photo.id)).await?;
        photo.faces = faces.remove(&photo.id).unwrap_or_default();
        Ok(Some(photo))
    }

    /// Newest photos first, optionally only those showing `person_id`.
    /// Returns the page together with the total number of matching photos.
    pub async fn list_photos(&self, person_id: Option<&PersonId>, page: Page) -> Result<(Vec<Photo>, i64)> {
        let filter = "WHERE ?1 IS NULL OR EXISTS (
                SELECT 1 FROM faces f WHERE f.photo_id = p.id AND f.person_id = ?1
            )";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM photos p {}", filter))
            .bind(person_id)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, PhotoRow>(&format!(
            "SELECT {} FROM photos p {} ORDER BY p.created_at DESC, p.rowid DESC LIMIT ?2 OFFSET ?3",
            PHOTO_COLUMNS, filter
        ))
        .bind(person_id)
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(&self.pool)
        .await?;

        let mut photos: Vec<Photo> = rows.into_iter().map(PhotoRow::into_photo).collect();
        let ids: Vec<PhotoId> = photos.iter().map(|p| p.id.clone()).collect();
        let mut faces = self.faces_for_photos(&ids).await?;
        for photo in &mut photos {
            photo.faces = faces.remove(&photo.id).unwrap_or_default();
        }

        Ok((photos, total))
    }

    /// Removes a photo and its faces. Returns the stored file path of the
    /// deleted photo, or `None` if there was no such photo.
    pub async fn delete_photo(&self, id: &PhotoId) -> Result<Option<String>> {
        let mut tx = self.pool.begin().await?;

        let file_path: Option<String> = sqlx::query_scalar("SELECT file_path FROM photos WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        if file_path.is_none() {
            return Ok(None);
        }

        sqlx::query("DELETE FROM faces WHERE photo_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM photos WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(file_path)
    }
}
