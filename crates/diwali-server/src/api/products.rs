//! Catalog handlers: admin product CRUD, image upload, and the public
//! storefront listing.

use std::path::Path as FsPath;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use diwali_core::catalog::{effective_price, has_offer, validate_pricing, ProductStatus, DEFAULT_UNIT};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{
    double_option, map_core_error, map_db_error, map_db_error_for, parse_enum, parse_id,
    require_text, ApiError, AppState,
};

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(super) struct ProductItem {
    id: Uuid,
    name: String,
    category: String,
    images: Vec<String>,
    description: String,
    note: Option<String>,
    base_price: Decimal,
    discount_percentage: Option<Decimal>,
    offer_price: Option<Decimal>,
    unit: String,
    status: String,
    final_price: Decimal,
    has_offer: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<diwali_db::ProductRow> for ProductItem {
    fn from(row: diwali_db::ProductRow) -> Self {
        Self {
            final_price: effective_price(row.base_price, row.discount_percentage, row.offer_price),
            has_offer: has_offer(row.discount_percentage, row.offer_price),
            id: row.id,
            name: row.name,
            category: row.category,
            images: row.images,
            description: row.description,
            note: row.note,
            base_price: row.base_price,
            discount_percentage: row.discount_percentage,
            offer_price: row.offer_price,
            unit: row.unit,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateProductRequest {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub description: String,
    pub note: Option<String>,
    pub base_price: Decimal,
    pub discount_percentage: Option<Decimal>,
    pub offer_price: Option<Decimal>,
    pub unit: Option<String>,
    pub status: Option<String>,
}

// Outer None = field absent (keep), Some(None) = clear, Some(Some(v)) = set.
#[allow(clippy::option_option)]
#[derive(Debug, Default, Deserialize)]
pub(super) struct UpdateProductRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub images: Option<Vec<String>>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub note: Option<Option<String>>,
    pub base_price: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    pub discount_percentage: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub offer_price: Option<Option<Decimal>>,
    pub unit: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub(super) struct UploadResponse {
    image_url: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/products — active products for the storefront.
pub(super) async fn list_storefront_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<Vec<ProductItem>>, ApiError> {
    let rows = diwali_db::list_active_products(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(rows.into_iter().map(ProductItem::from).collect()))
}

/// GET /api/admin/products — every product, newest first.
pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<Vec<ProductItem>>, ApiError> {
    let rows = diwali_db::list_products(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(rows.into_iter().map(ProductItem::from).collect()))
}

/// POST /api/admin/products
pub(super) async fn create_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductItem>), ApiError> {
    let rid = &req_id.0;

    let name = require_text(rid, "name", &body.name)?;
    let category = require_text(rid, "category", &body.category)?;
    validate_pricing(
        Some(body.base_price),
        body.discount_percentage,
        body.offer_price,
    )
    .map_err(|e| map_core_error(rid, &e))?;
    let status = match body.status.as_deref() {
        Some(raw) => parse_enum::<ProductStatus>(rid, raw)?,
        None => ProductStatus::Active,
    };

    let row = diwali_db::create_product(
        &state.pool,
        &diwali_db::NewProduct {
            name,
            category,
            images: &body.images,
            description: &body.description,
            note: body.note.as_deref(),
            base_price: body.base_price,
            discount_percentage: body.discount_percentage,
            offer_price: body.offer_price,
            unit: body.unit.as_deref().unwrap_or(DEFAULT_UNIT),
            status: status.as_str(),
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(product_id = %row.id, "product created");
    Ok((StatusCode::CREATED, Json(row.into())))
}

/// GET /api/admin/products/{id}
pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ProductItem>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "product")?;
    let row = diwali_db::get_product(&state.pool, id)
        .await
        .map_err(|e| map_db_error_for(rid, &e, "product not found"))?;
    Ok(Json(row.into()))
}

/// PUT /api/admin/products/{id} — only supplied fields change.
pub(super) async fn update_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<UpdateProductRequest>,
) -> Result<Json<ProductItem>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "product")?;

    let name = body
        .name
        .as_deref()
        .map(|v| require_text(rid, "name", v))
        .transpose()?;
    let category = body
        .category
        .as_deref()
        .map(|v| require_text(rid, "category", v))
        .transpose()?;
    validate_pricing(
        body.base_price,
        body.discount_percentage.flatten(),
        body.offer_price.flatten(),
    )
    .map_err(|e| map_core_error(rid, &e))?;
    let status = body
        .status
        .as_deref()
        .map(|raw| parse_enum::<ProductStatus>(rid, raw))
        .transpose()?;

    let row = diwali_db::update_product(
        &state.pool,
        id,
        &diwali_db::ProductPatch {
            name,
            category,
            images: body.images.as_deref(),
            description: body.description.as_deref(),
            note: body.note.as_ref().map(Option::as_deref),
            base_price: body.base_price,
            discount_percentage: body.discount_percentage,
            offer_price: body.offer_price,
            unit: body.unit.as_deref(),
            status: status.map(ProductStatus::as_str),
        },
    )
    .await
    .map_err(|e| map_db_error_for(rid, &e, "product not found"))?;

    Ok(Json(row.into()))
}

/// DELETE /api/admin/products/{id}
pub(super) async fn delete_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "product")?;
    diwali_db::delete_product(&state.pool, id)
        .await
        .map_err(|e| map_db_error_for(rid, &e, "product not found"))?;

    tracing::info!(product_id = %id, "product deleted");
    Ok(Json(MessageResponse {
        message: "Product deleted successfully".to_string(),
    }))
}

/// POST /api/admin/upload-image — multipart field `file`, images only.
pub(super) async fn upload_image(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let rid = &req_id.0;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(rid, "validation_error", e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let is_image = field
            .content_type()
            .is_some_and(|ct| ct.starts_with("image/"));
        if !is_image {
            return Err(ApiError::new(rid, "validation_error", "File must be an image"));
        }

        let extension = field
            .file_name()
            .and_then(|name| FsPath::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let filename = format!("{}{extension}", Uuid::new_v4());

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(rid, "validation_error", e.body_text()))?;

        let dir = &state.config.uploads_dir;
        let write = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(dir.join(&filename), &bytes).await
        };
        if let Err(e) = write.await {
            tracing::error!(error = %e, dir = %dir.display(), "failed to store upload");
            return Err(ApiError::new(rid, "internal_error", "failed to store image"));
        }

        tracing::info!(%filename, size = bytes.len(), "image uploaded");
        return Ok(Json(UploadResponse {
            image_url: format!("/uploads/{filename}"),
        }));
    }

    Err(ApiError::new(
        rid,
        "validation_error",
        "multipart field 'file' is required",
    ))
}
