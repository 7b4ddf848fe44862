use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::assets::dto::{
    AssetDeletedResponse, AssetDto, AssetListResponse, AssetResponse, ListAssetsQuery,
};
use crate::assets::model::Condition;
use crate::assets::service::{self, AssetForm, UploadedImage};
use crate::error::AppError;
use crate::state::AppState;

const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/assets", get(list_assets).post(create_asset))
        .route(
            "/assets/:id",
            get(get_asset).put(update_asset).delete(delete_asset),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

/// Pull the known text fields and the optional `image` file out of a
/// multipart body. Unknown fields are ignored; non-image uploads rejected.
async fn parse_asset_form(
    mut mp: Multipart,
) -> Result<(AssetForm, Option<UploadedImage>), AppError> {
    let mut form = AssetForm::default();
    let mut image = None;

    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let content_type = field.content_type().unwrap_or_default().to_string();
            if !content_type.starts_with("image/") {
                return Err(AppError::Validation("Only image files are allowed!".into()));
            }
            let original_name = field.file_name().unwrap_or("upload").to_string();
            let body = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Invalid image upload: {e}")))?;
            image = Some(UploadedImage {
                body,
                original_name,
            });
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid field {name}: {e}")))?;
        match name.as_str() {
            "name" => form.name = Some(text),
            "category" => form.category = Some(text),
            "serialNumber" => form.serial_number = Some(text),
            "purchaseDate" => form.purchase_date = Some(text),
            "purchasePrice" => form.purchase_price = Some(text),
            "condition" => form.condition = Some(text),
            _ => {}
        }
    }

    Ok((form, image))
}

#[instrument(skip(state))]
async fn list_assets(
    State(state): State<AppState>,
    Query(query): Query<ListAssetsQuery>,
) -> Result<Json<AssetListResponse>, AppError> {
    let condition = query
        .condition
        .as_deref()
        .map(str::parse::<Condition>)
        .transpose()?;
    let assets = service::list(&state, condition).await?;
    let data: Vec<AssetDto> = assets.into_iter().map(AssetDto::from).collect();
    Ok(Json(AssetListResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

#[instrument(skip(state))]
async fn get_asset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AssetResponse>, AppError> {
    let asset = service::get(&state, id).await?;
    Ok(Json(AssetResponse {
        success: true,
        message: None,
        data: asset.into(),
    }))
}

#[instrument(skip(state, mp))]
async fn create_asset(
    State(state): State<AppState>,
    mp: Multipart,
) -> Result<(StatusCode, Json<AssetResponse>), AppError> {
    let (form, image) = parse_asset_form(mp).await?;
    let asset = service::create(&state, form, image).await?;
    Ok((
        StatusCode::CREATED,
        Json(AssetResponse {
            success: true,
            message: Some("Asset created successfully".into()),
            data: asset.into(),
        }),
    ))
}

#[instrument(skip(state, mp))]
async fn update_asset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mp: Multipart,
) -> Result<Json<AssetResponse>, AppError> {
    let (form, image) = parse_asset_form(mp).await?;
    let asset = service::update(&state, id, form, image).await?;
    Ok(Json(AssetResponse {
        success: true,
        message: Some("Asset updated successfully".into()),
        data: asset.into(),
    }))
}

#[instrument(skip(state))]
async fn delete_asset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AssetDeletedResponse>, AppError> {
    service::delete(&state, id).await?;
    Ok(Json(AssetDeletedResponse {
        success: true,
        message: "Asset deleted successfully".into(),
    }))
}
