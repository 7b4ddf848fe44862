use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::AppError;
use crate::records::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Medical,
    Therapy,
    Furniture,
    Supplies,
    Other,
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "medical" => Ok(Category::Medical),
            "therapy" => Ok(Category::Therapy),
            "furniture" => Ok(Category::Furniture),
            "supplies" => Ok(Category::Supplies),
            "other" => Ok(Category::Other),
            other => Err(AppError::Validation(format!("Invalid category: {other}"))),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Medical => "medical",
            Category::Therapy => "therapy",
            Category::Furniture => "furniture",
            Category::Supplies => "supplies",
            Category::Other => "other",
        };
        f.write_str(s)
    }
}

/// Physical state of an asset. `OutOfService` doubles as the "disposed"
/// view: disposed assets are not a separate collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Condition {
    Excellent,
    Good,
    Fair,
    Poor,
    OutOfService,
}

impl FromStr for Condition {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "excellent" => Ok(Condition::Excellent),
            "good" => Ok(Condition::Good),
            "fair" => Ok(Condition::Fair),
            "poor" => Ok(Condition::Poor),
            "out-of-service" => Ok(Condition::OutOfService),
            other => Err(AppError::Validation(format!("Invalid condition: {other}"))),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Condition::Excellent => "excellent",
            Condition::Good => "good",
            Condition::Fair => "fair",
            Condition::Poor => "poor",
            Condition::OutOfService => "out-of-service",
        };
        f.write_str(s)
    }
}

/// Inventory asset record. `image` holds the blob key; the public URL is
/// assembled in the DTO layer, never stored.
#[derive(Debug, Clone)]
pub struct Asset {
    pub id: Uuid,
    pub name: String,
    pub category: Category,
    pub serial_number: String,
    pub purchase_date: Option<Date>,
    pub purchase_price: Option<f64>,
    pub condition: Condition,
    pub image: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Asset {
    pub fn new(
        name: String,
        category: Category,
        serial_number: String,
        purchase_date: Option<Date>,
        purchase_price: Option<f64>,
        condition: Condition,
        image: Option<String>,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            name,
            category,
            serial_number,
            purchase_date,
            purchase_price,
            condition,
            image,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for Asset {
    fn id(&self) -> Uuid {
        self.id
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.serial_number.clone())
    }

    fn unique_field() -> &'static str {
        "Serial number"
    }

    fn touch(&mut self, now: OffsetDateTime) {
        self.updated_at = now;
    }
}
