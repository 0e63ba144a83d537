use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::products::MessageResponse;
use super::{double_option, map_db_error, map_db_error_for, parse_id, require_text, ApiError, AppState};

#[derive(Debug, Serialize)]
pub(super) struct ContactItem {
    id: Uuid,
    name: String,
    phone: String,
    email: Option<String>,
    relationship: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    last_contacted: Option<DateTime<Utc>>,
}

impl From<diwali_db::ContactRow> for ContactItem {
    fn from(row: diwali_db::ContactRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            phone: row.phone,
            email: row.email,
            relationship: row.relationship,
            notes: row.notes,
            created_at: row.created_at,
            last_contacted: row.last_contacted,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateContactRequest {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub relationship: String,
    pub notes: Option<String>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
pub(super) struct UpdateContactRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    pub relationship: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Serialize)]
pub(super) struct BulkImportResponse {
    imported: usize,
    message: String,
}

fn new_contact<'a>(
    rid: &str,
    body: &'a CreateContactRequest,
) -> Result<diwali_db::NewContact<'a>, ApiError> {
    Ok(diwali_db::NewContact {
        name: require_text(rid, "name", &body.name)?,
        phone: require_text(rid, "phone", &body.phone)?,
        email: body.email.as_deref(),
        relationship: require_text(rid, "relationship", &body.relationship)?,
        notes: body.notes.as_deref(),
    })
}

/// POST /api/admin/contacts
pub(super) async fn create_contact(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateContactRequest>,
) -> Result<(StatusCode, Json<ContactItem>), ApiError> {
    let rid = &req_id.0;
    let contact = new_contact(rid, &body)?;
    let row = diwali_db::create_contact(&state.pool, &contact)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    Ok((StatusCode::CREATED, Json(row.into())))
}

/// GET /api/admin/contacts
pub(super) async fn list_contacts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<Vec<ContactItem>>, ApiError> {
    let rows = diwali_db::list_contacts(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(rows.into_iter().map(ContactItem::from).collect()))
}

/// GET /api/admin/contacts/{id}
pub(super) async fn get_contact(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ContactItem>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "contact")?;
    let row = diwali_db::get_contact(&state.pool, id)
        .await
        .map_err(|e| map_db_error_for(rid, &e, "contact not found"))?;
    Ok(Json(row.into()))
}

/// PUT /api/admin/contacts/{id}
pub(super) async fn update_contact(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<UpdateContactRequest>,
) -> Result<Json<ContactItem>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "contact")?;

    let patch = diwali_db::ContactPatch {
        name: body
            .name
            .as_deref()
            .map(|v| require_text(rid, "name", v))
            .transpose()?,
        phone: body
            .phone
            .as_deref()
            .map(|v| require_text(rid, "phone", v))
            .transpose()?,
        email: body.email.as_ref().map(Option::as_deref),
        relationship: body
            .relationship
            .as_deref()
            .map(|v| require_text(rid, "relationship", v))
            .transpose()?,
        notes: body.notes.as_ref().map(Option::as_deref),
    };

    let row = diwali_db::update_contact(&state.pool, id, &patch)
        .await
        .map_err(|e| map_db_error_for(rid, &e, "contact not found"))?;
    Ok(Json(row.into()))
}

/// DELETE /api/admin/contacts/{id}
pub(super) async fn delete_contact(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "contact")?;
    diwali_db::delete_contact(&state.pool, id)
        .await
        .map_err(|e| map_db_error_for(rid, &e, "contact not found"))?;
    Ok(Json(MessageResponse {
        message: "Contact deleted successfully".to_string(),
    }))
}

/// POST /api/admin/contacts/bulk-import — all records or none.
pub(super) async fn bulk_import_contacts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<Vec<CreateContactRequest>>,
) -> Result<Json<BulkImportResponse>, ApiError> {
    let rid = &req_id.0;
    if body.is_empty() {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "at least one contact is required",
        ));
    }

    let contacts = body
        .iter()
        .map(|c| new_contact(rid, c))
        .collect::<Result<Vec<_>, _>>()?;

    let imported = diwali_db::bulk_insert_contacts(&state.pool, &contacts)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(imported, "contacts imported");
    Ok(Json(BulkImportResponse {
        imported,
        message: format!("Imported {imported} contacts successfully"),
    }))
}
