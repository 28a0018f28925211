//! Product catalog types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use storegate_core::ProductId;

/// A catalog entry.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /api/products`. All fields are required.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub image: Option<String>,
}

/// A validated [`NewProduct`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidProduct {
    pub name: String,
    pub price: Decimal,
    pub image: String,
}

impl NewProduct {
    /// Check every field is present and sensible.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message describing the first problem.
    pub fn validate(self) -> Result<ValidProduct, &'static str> {
        let name = non_blank(self.name).ok_or("Please provide all fields")?;
        let image = non_blank(self.image).ok_or("Please provide all fields")?;
        let price = self.price.ok_or("Please provide all fields")?;
        if price.is_sign_negative() {
            return Err("Price cannot be negative");
        }
        Ok(ValidProduct { name, price, image })
    }
}

/// Body of `PUT /api/products/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub image: Option<String>,
}

impl ProductPatch {
    /// Reject patches that change nothing or would blank a field.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message describing the problem.
    pub fn validate(self) -> Result<Self, &'static str> {
        if self.name.is_none() && self.price.is_none() && self.image.is_none() {
            return Err("Nothing to update");
        }
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty())
            || self.image.as_deref().is_some_and(|i| i.trim().is_empty())
        {
            return Err("Fields cannot be blank");
        }
        if self.price.is_some_and(|p| p.is_sign_negative()) {
            return Err("Price cannot be negative");
        }
        Ok(self)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
