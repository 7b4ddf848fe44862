use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::assets::model::{Asset, Category, Condition};

/// Public URL prefix the blob directory is served under.
pub const UPLOADS_PREFIX: &str = "/uploads/assets";

/// Wire representation of an asset, camelCase to match the frontend.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDto {
    pub id: Uuid,
    pub name: String,
    pub category: Category,
    pub serial_number: String,
    pub purchase_date: Option<String>,
    pub purchase_price: Option<f64>,
    pub condition: Condition,
    pub image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Asset> for AssetDto {
    fn from(a: Asset) -> Self {
        Self {
            id: a.id,
            name: a.name,
            category: a.category,
            serial_number: a.serial_number,
            purchase_date: a.purchase_date.map(|d| d.to_string()),
            purchase_price: a.purchase_price,
            condition: a.condition,
            image: a.image.map(|key| format!("{UPLOADS_PREFIX}/{key}")),
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AssetListResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<AssetDto>,
}

#[derive(Debug, Serialize)]
pub struct AssetResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: AssetDto,
}

#[derive(Debug, Serialize)]
pub struct AssetDeletedResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ListAssetsQuery {
    pub condition: Option<String>,
}
