use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

use crate::db::Database;
use crate::error::GalleryError;
use crate::models::{Person, PersonId};
use crate::registry::PersonStore;

#[derive(Debug, FromRow)]
struct PersonRow {
    id: PersonId,
    name: String,
    created_at: DateTime<Utc>,
}

impl From<PersonRow> for Person {
    fn from(row: PersonRow) -> Self {
        Person {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

pub async fn find_person(conn: &mut SqliteConnection, id: &PersonId) -> Result<Option<Person>> {
    let row = sqlx::query_as::<_, PersonRow>(
        r#"
        SELECT id, name, created_at FROM persons WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Person::from))
}

pub async fn insert_person(conn: &mut SqliteConnection, name: &str) -> Result<Person> {
    let person = Person {
        id: PersonId::generate(),
        name: name.to_string(),
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO persons (id, name, created_at)
        VALUES (?1, ?2, ?3)
        "#,
    )
    .bind(&person.id)
    .bind(&person.name)
    .bind(person.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(person)
}

#[async_trait]
impl PersonStore for SqliteConnection {
    async fn insert_person(&mut self, name: &str) -> Result<Person, GalleryError> {
        Ok(insert_person(self, name).await?)
    }

    async fn find_person(&mut self, id: &PersonId) -> Result<Option<Person>, GalleryError> {
        Ok(find_person(self, id).await?)
    }
}

impl Database {
    pub async fn list_persons(&self) -> Result<Vec<Person>> {
        let rows = sqlx::query_as::<_, PersonRow>(
            r#"
            SELECT id, name, created_at FROM persons
            ORDER BY created_at, rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Person::from).collect())
    }

    pub async fn get_person(&self, id: &PersonId) -> Result<Option<Person>> {
        let mut conn = self.pool.acquire().await?;
        find_person(&mut conn, id).await
    }

    /// Returns the renamed person, or `None` when it does not exist.
    pub async fn rename_person(&self, id: &PersonId, name: &str) -> Result<Option<Person>> {
        let result = sqlx::query(
            r#"
            UPDATE persons
            SET name = ?2,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_person(id).await
    }
}
