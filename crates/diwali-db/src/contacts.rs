//! Database operations for outreach `contacts`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `contacts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContactRow {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    /// Free-form tag such as `friend`, `family`, or `colleague`.
    pub relationship: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_contacted: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewContact<'a> {
    pub name: &'a str,
    pub phone: &'a str,
    pub email: Option<&'a str>,
    pub relationship: &'a str,
    pub notes: Option<&'a str>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct ContactPatch<'a> {
    pub name: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub email: Option<Option<&'a str>>,
    pub relationship: Option<&'a str>,
    pub notes: Option<Option<&'a str>>,
}

// ---------------------------------------------------------------------------
// contacts operations
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_contact(pool: &PgPool, contact: &NewContact<'_>) -> Result<ContactRow, DbError> {
    let row = sqlx::query_as::<_, ContactRow>(
        "INSERT INTO contacts (id, name, phone, email, relationship, notes) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id, name, phone, email, relationship, notes, created_at, last_contacted",
    )
    .bind(Uuid::new_v4())
    .bind(contact.name)
    .bind(contact.phone)
    .bind(contact.email)
    .bind(contact.relationship)
    .bind(contact.notes)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Inserts every contact inside one transaction. Either all rows land or
/// none do.
///
/// Returns the number of rows inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails; the batch is rolled back.
pub async fn bulk_insert_contacts(
    pool: &PgPool,
    contacts: &[NewContact<'_>],
) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;

    for contact in contacts {
        sqlx::query(
            "INSERT INTO contacts (id, name, phone, email, relationship, notes) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(contact.name)
        .bind(contact.phone)
        .bind(contact.email)
        .bind(contact.relationship)
        .bind(contact.notes)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(contacts.len())
}

/// Returns all contacts ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_contacts(pool: &PgPool) -> Result<Vec<ContactRow>, DbError> {
    let rows = sqlx::query_as::<_, ContactRow>(
        "SELECT id, name, phone, email, relationship, notes, created_at, last_contacted \
         FROM contacts \
         ORDER BY name, created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no contact has `id`, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn get_contact(pool: &PgPool, id: Uuid) -> Result<ContactRow, DbError> {
    sqlx::query_as::<_, ContactRow>(
        "SELECT id, name, phone, email, relationship, notes, created_at, last_contacted \
         FROM contacts \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no contact has `id`, or [`DbError::Sqlx`]
/// if the update fails.
pub async fn update_contact(
    pool: &PgPool,
    id: Uuid,
    patch: &ContactPatch<'_>,
) -> Result<ContactRow, DbError> {
    sqlx::query_as::<_, ContactRow>(
        "UPDATE contacts \
         SET name         = COALESCE($2, name), \
             phone        = COALESCE($3, phone), \
             email        = CASE WHEN $4::BOOL THEN $5 ELSE email END, \
             relationship = COALESCE($6, relationship), \
             notes        = CASE WHEN $7::BOOL THEN $8 ELSE notes END \
         WHERE id = $1 \
         RETURNING id, name, phone, email, relationship, notes, created_at, last_contacted",
    )
    .bind(id)
    .bind(patch.name)
    .bind(patch.phone)
    .bind(patch.email.is_some())
    .bind(patch.email.flatten())
    .bind(patch.relationship)
    .bind(patch.notes.is_some())
    .bind(patch.notes.flatten())
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Deletes a contact. Its personalized links and their tracking events go
/// with it.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no contact has `id`, or [`DbError::Sqlx`]
/// if the delete fails.
pub async fn delete_contact(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM contacts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Sets `last_contacted = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn touch_last_contacted(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    sqlx::query("UPDATE contacts SET last_contacted = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
