use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::{single_field_error, FieldErrors};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub stock: i32,
    pub images: Json<Vec<String>>,
    pub is_active: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_on_sale(&self) -> bool {
        matches!(self.sale_price, Some(sale) if sale < self.price)
    }

    pub fn current_price(&self) -> Decimal {
        match self.sale_price {
            Some(sale) if sale < self.price => sale,
            _ => self.price,
        }
    }

    pub fn is_in_stock(&self) -> bool {
        self.stock > 0
    }

    pub fn can_fulfil(&self, quantity: i32) -> bool {
        self.is_active && quantity > 0 && self.stock >= quantity
    }
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    pub current_price: Decimal,
    pub is_on_sale: bool,
    pub is_in_stock: bool,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            current_price: product.current_price(),
            is_on_sale: product.is_on_sale(),
            is_in_stock: product.is_in_stock(),
            product,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub featured: Option<bool>,
    pub on_sale: Option<bool>,
}

/// Prices must be non-negative and a sale price strictly below the price
pub fn check_prices(price: Decimal, sale_price: Option<Decimal>) -> Result<(), FieldErrors> {
    if price.is_sign_negative() {
        return Err(single_field_error("price", "Price cannot be negative"));
    }
    match sale_price {
        Some(sale) if sale.is_sign_negative() || sale >= price => Err(single_field_error(
            "sale_price",
            "Sale price must be lower than the price",
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProduct {
    #[validate(length(min = 2, max = 255))]
    pub name: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub stock: i32,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
}

fn default_true() -> bool {
    true
}

impl CreateProduct {
    pub fn check_prices(&self) -> Result<(), FieldErrors> {
        check_prices(self.price, self.sale_price)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProduct {
    #[validate(length(min = 2, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    pub price: Option<Decimal>,
    /// `Some(None)` clears the sale price
    #[serde(default, with = "double_option")]
    pub sale_price: Option<Option<Decimal>>,
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
    pub images: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
}

impl UpdateProduct {
    /// Apply the patch to a copy of the current row, checking the price invariant
    pub fn apply(&self, current: &Product) -> Result<Product, FieldErrors> {
        let mut next = current.clone();
        if let Some(name) = &self.name {
            next.name = name.clone();
        }
        if let Some(description) = &self.description {
            next.description = Some(description.clone());
        }
        if let Some(category) = &self.category {
            next.category = category.clone();
        }
        if let Some(price) = self.price {
            next.price = price;
        }
        if let Some(sale_price) = self.sale_price {
            next.sale_price = sale_price;
        }
        if let Some(stock) = self.stock {
            next.stock = stock;
        }
        if let Some(images) = &self.images {
            next.images = Json(images.clone());
        }
        if let Some(is_active) = self.is_active {
            next.is_active = is_active;
        }
        if let Some(is_featured) = self.is_featured {
            next.is_featured = is_featured;
        }

        check_prices(next.price, next.sale_price)?;
        Ok(next)
    }
}

mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    pub fn product(price: Decimal, sale_price: Option<Decimal>, stock: i32) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            name: "Resistance Bands".to_string(),
            description: None,
            category: "equipment".to_string(),
            price,
            sale_price,
            stock,
            images: Json(vec![]),
            is_active: true,
            is_featured: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_current_price() {
        assert_eq!(product(dec!(100), Some(dec!(80)), 1).current_price(), dec!(80));
        assert_eq!(product(dec!(100), None, 1).current_price(), dec!(100));
        assert!(product(dec!(100), Some(dec!(80)), 1).is_on_sale());
        assert!(!product(dec!(100), None, 0).is_in_stock());
    }

    #[test]
    fn test_can_fulfil() {
        let p = product(dec!(10), None, 3);
        assert!(p.can_fulfil(3));
        assert!(!p.can_fulfil(4));
        assert!(!p.can_fulfil(0));
    }

    #[test]
    fn test_create_rejects_sale_price_above_price() {
        let request: CreateProduct = serde_json::from_value(serde_json::json!({
            "name": "Yoga Mat",
            "category": "equipment",
            "price": "50.00",
            "sale_price": "60.00",
            "stock": 5
        }))
        .unwrap();
        assert!(request.validate().is_ok());
        assert!(request.check_prices().unwrap_err().contains_key("sale_price"));
    }

    #[test]
    fn test_update_can_clear_sale_price() {
        let current = product(dec!(100), Some(dec!(80)), 1);

        let clear: UpdateProduct = serde_json::from_value(serde_json::json!({ "sale_price": null })).unwrap();
        assert_eq!(clear.apply(&current).unwrap().sale_price, None);

        let untouched: UpdateProduct = serde_json::from_value(serde_json::json!({ "stock": 4 })).unwrap();
        let next = untouched.apply(&current).unwrap();
        assert_eq!(next.sale_price, Some(dec!(80)));
        assert_eq!(next.stock, 4);

        let invalid: UpdateProduct = serde_json::from_value(serde_json::json!({ "price": "70" })).unwrap();
        assert!(invalid.apply(&current).is_err());
    }
}
