use bytes::Bytes;
use time::macros::format_description;
use time::Date;
use tracing::warn;
use uuid::Uuid;

use crate::assets::model::{Asset, Category, Condition};
use crate::blobs::BlobStore;
use crate::error::AppError;
use crate::records::RecordStore;
use crate::state::AppState;

/// Raw text fields from a multipart request. Parsing and validation happen
/// here so the handlers stay a thin mapping layer.
#[derive(Debug, Default)]
pub struct AssetForm {
    pub name: Option<String>,
    pub category: Option<String>,
    pub serial_number: Option<String>,
    pub purchase_date: Option<String>,
    pub purchase_price: Option<String>,
    pub condition: Option<String>,
}

pub struct UploadedImage {
    pub body: Bytes,
    pub original_name: String,
}

fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::Validation(format!("{field} is required."))),
    }
}

fn parse_price(raw: &str) -> Result<f64, AppError> {
    let price: f64 = raw
        .trim()
        .parse()
        .map_err(|_| AppError::Validation("purchasePrice must be a number.".into()))?;
    if !price.is_finite() {
        return Err(AppError::Validation(
            "purchasePrice must be a number.".into(),
        ));
    }
    if price < 0.0 {
        return Err(AppError::Validation(
            "purchasePrice must be non-negative.".into(),
        ));
    }
    Ok(price)
}

fn parse_date(raw: &str) -> Result<Date, AppError> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(raw.trim(), &format)
        .map_err(|_| AppError::Validation("purchaseDate must be YYYY-MM-DD.".into()))
}

/// Create an asset, saving the image blob first so a failed record insert
/// can clean it up and leave no orphan behind.
pub async fn create(
    state: &AppState,
    form: AssetForm,
    image: Option<UploadedImage>,
) -> Result<Asset, AppError> {
    let name = required(form.name, "name")?;
    let serial_number = required(form.serial_number, "serialNumber")?;
    let category: Category = required(form.category, "category")?.parse()?;
    let condition: Condition = match form.condition.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => raw.parse()?,
        _ => Condition::Excellent,
    };
    let purchase_price = form
        .purchase_price
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(parse_price)
        .transpose()?;
    let purchase_date = form
        .purchase_date
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(parse_date)
        .transpose()?;

    let image_key = match image {
        Some(upload) => Some(state.blobs.save(upload.body, &upload.original_name).await?),
        None => None,
    };

    let asset = Asset::new(
        name,
        category,
        serial_number,
        purchase_date,
        purchase_price,
        condition,
        image_key.clone(),
    );

    match state.assets.insert(asset).await {
        Ok(created) => Ok(created),
        Err(e) => {
            if let Some(key) = image_key {
                if let Err(cleanup) = state.blobs.delete(&key).await {
                    warn!(error = %cleanup, %key, "failed to remove blob after insert failure");
                }
            }
            Err(e)
        }
    }
}

/// Parsed, validated updates for the supplied fields only.
struct AssetPatch {
    name: Option<String>,
    category: Option<Category>,
    serial_number: Option<String>,
    purchase_date: Option<Date>,
    purchase_price: Option<f64>,
    condition: Option<Condition>,
}

impl AssetPatch {
    fn parse(form: AssetForm) -> Result<Self, AppError> {
        let name = form
            .name
            .map(|v| required(Some(v), "name"))
            .transpose()?;
        let serial_number = form
            .serial_number
            .map(|v| required(Some(v), "serialNumber"))
            .transpose()?;
        let category = form
            .category
            .as_deref()
            .map(str::parse::<Category>)
            .transpose()?;
        let condition = form
            .condition
            .as_deref()
            .map(str::parse::<Condition>)
            .transpose()?;
        // Forms round-trip untouched fields as empty strings; treat those
        // as absent, same as on create.
        let purchase_price = form
            .purchase_price
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(parse_price)
            .transpose()?;
        let purchase_date = form
            .purchase_date
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(parse_date)
            .transpose()?;
        Ok(Self {
            name,
            category,
            serial_number,
            purchase_date,
            purchase_price,
            condition,
        })
    }

    fn apply(self, asset: &mut Asset) {
        if let Some(name) = self.name {
            asset.name = name;
        }
        if let Some(category) = self.category {
            asset.category = category;
        }
        if let Some(serial) = self.serial_number {
            asset.serial_number = serial;
        }
        if let Some(date) = self.purchase_date {
            asset.purchase_date = Some(date);
        }
        if let Some(price) = self.purchase_price {
            asset.purchase_price = Some(price);
        }
        if let Some(condition) = self.condition {
            asset.condition = condition;
        }
    }
}

/// Update supplied fields and optionally replace the image. A new blob is
/// written before the record update; on failure the new blob is removed,
/// on success the superseded one is deleted best-effort.
pub async fn update(
    state: &AppState,
    id: Uuid,
    form: AssetForm,
    image: Option<UploadedImage>,
) -> Result<Asset, AppError> {
    let existing = state
        .assets
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Asset not found".into()))?;

    let patch = AssetPatch::parse(form)?;

    let Some(upload) = image else {
        return state
            .assets
            .update_by_id(id, Box::new(move |a: &mut Asset| patch.apply(a)))
            .await?
            .ok_or_else(|| AppError::NotFound("Asset not found".into()));
    };

    let new_key = state.blobs.save(upload.body, &upload.original_name).await?;
    let stored_key = new_key.clone();
    let result = state
        .assets
        .update_by_id(
            id,
            Box::new(move |a: &mut Asset| {
                patch.apply(a);
                a.image = Some(stored_key);
            }),
        )
        .await;

    match result {
        Ok(Some(updated)) => {
            if let Some(old_key) = existing.image {
                if let Err(e) = state.blobs.delete(&old_key).await {
                    warn!(error = %e, key = %old_key, "failed to remove superseded image");
                }
            }
            Ok(updated)
        }
        Ok(None) => {
            if let Err(e) = state.blobs.delete(&new_key).await {
                warn!(error = %e, key = %new_key, "failed to remove blob for vanished asset");
            }
            Err(AppError::NotFound("Asset not found".into()))
        }
        Err(e) => {
            if let Err(cleanup) = state.blobs.delete(&new_key).await {
                warn!(error = %cleanup, key = %new_key, "failed to remove blob after update failure");
            }
            Err(e)
        }
    }
}

/// Delete the record, then its blob. The record deletion is the
/// authoritative success; a failed blob removal is only logged.
pub async fn delete(state: &AppState, id: Uuid) -> Result<Asset, AppError> {
    let removed = state
        .assets
        .delete_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Asset not found".into()))?;

    if let Some(key) = &removed.image {
        if let Err(e) = state.blobs.delete(key).await {
            warn!(error = %e, %key, asset_id = %id, "failed to remove image of deleted asset");
        }
    }
    Ok(removed)
}

pub async fn get(state: &AppState, id: Uuid) -> Result<Asset, AppError> {
    state
        .assets
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Asset not found".into()))
}

/// All assets, newest first. Filtering by condition gives the "disposed"
/// view when asked for `out-of-service`.
pub async fn list(state: &AppState, condition: Option<Condition>) -> Result<Vec<Asset>, AppError> {
    let mut assets = state.assets.list().await?;
    if let Some(wanted) = condition {
        assets.retain(|a| a.condition == wanted);
    }
    assets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(assets)
}
