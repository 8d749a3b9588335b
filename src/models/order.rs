use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::DomainError;

pub const TAX_RATE: Decimal = dec!(0.05);
pub const FREE_SHIPPING_THRESHOLD: Decimal = dec!(200);
pub const SHIPPING_FEE: Decimal = dec!(15);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending | Confirmed | Processing, Cancelled)
        )
    }

    pub fn is_cancellable(&self) -> bool {
        self.can_transition_to(OrderStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    CashOnDelivery,
    ApplePay,
    GooglePay,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_phone: String,
    pub notes: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Move to `next`, stamping the matching timestamp
    pub fn transition(&mut self, next: OrderStatus, now: DateTime<Utc>) -> Result<(), DomainError> {
        if next == OrderStatus::Cancelled && !self.status.is_cancellable() {
            return Err(DomainError::OrderNotCancellable);
        }
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidOrderTransition {
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }

        match next {
            OrderStatus::Shipped => self.shipped_at = Some(now),
            OrderStatus::Delivered => self.delivered_at = Some(now),
            OrderStatus::Cancelled => {
                self.cancelled_at = Some(now);
                if self.payment_status == PaymentStatus::Paid {
                    self.payment_status = PaymentStatus::Refunded;
                }
            }
            _ => {}
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_as_paid(&mut self, reference: Option<String>, now: DateTime<Utc>) -> Result<(), DomainError> {
        match self.payment_status {
            PaymentStatus::Paid | PaymentStatus::Refunded => Err(DomainError::OrderAlreadyPaid),
            _ if self.status == OrderStatus::Cancelled => Err(DomainError::InvalidOrderTransition {
                from: self.status.as_str().to_string(),
                to: "paid".to_string(),
            }),
            _ => {
                self.payment_status = PaymentStatus::Paid;
                if reference.is_some() {
                    self.payment_reference = reference;
                }
                self.updated_at = now;
                Ok(())
            }
        }
    }

    pub fn totals(&self) -> OrderTotals {
        OrderTotals {
            subtotal: self.subtotal,
            discount: self.discount,
            tax: self.tax,
            shipping: self.shipping,
            total: self.total,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: Decimal,
    pub sale_price: Option<Decimal>,
    pub quantity: i32,
    pub line_total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Snapshot of a product at checkout
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: Decimal,
    pub sale_price: Option<Decimal>,
    pub quantity: i32,
}

impl PricedLine {
    pub fn effective_price(&self) -> Decimal {
        match self.sale_price {
            Some(sale) if sale < self.unit_price => sale,
            _ => self.unit_price,
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.effective_price() * Decimal::from(self.quantity)
    }

    pub fn gross(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    pub fn is_consistent(&self) -> bool {
        self.total == self.subtotal - self.discount + self.tax + self.shipping
    }
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Subtotal at list price, sale savings as discount, 5% tax on the discounted amount,
/// flat shipping below the free-shipping threshold
pub fn price_order(lines: &[PricedLine]) -> OrderTotals {
    let subtotal = round_money(lines.iter().map(PricedLine::gross).sum());
    let discount = round_money(lines.iter().map(|line| line.gross() - line.line_total()).sum());
    let taxable = subtotal - discount;
    let tax = round_money(taxable * TAX_RATE);
    let shipping = if taxable >= FREE_SHIPPING_THRESHOLD {
        Decimal::ZERO
    } else {
        SHIPPING_FEE
    };

    OrderTotals {
        subtotal,
        discount,
        tax,
        shipping,
        total: subtotal - discount + tax + shipping,
    }
}

pub fn generate_order_number() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect();
    format!("ORD-{}", suffix)
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 100, message = "Quantity must be between 1 and 100"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Order must contain at least one item"), nested)]
    pub items: Vec<OrderItemRequest>,
    pub payment_method: PaymentMethod,
    #[validate(length(min = 5, max = 500, message = "Shipping address is required"))]
    pub shipping_address: String,
    #[validate(length(min = 2, max = 100, message = "Shipping city is required"))]
    pub shipping_city: String,
    #[validate(length(min = 7, max = 20, message = "A valid phone number is required"))]
    pub shipping_phone: String,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MarkPaidRequest {
    pub payment_reference: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn line(price: Decimal, sale: Option<Decimal>, quantity: i32) -> PricedLine {
        PricedLine {
            product_id: Uuid::new_v4(),
            product_name: "Protein".to_string(),
            unit_price: price,
            sale_price: sale,
            quantity,
        }
    }

    fn order(status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            order_number: generate_order_number(),
            user_id: Uuid::new_v4(),
            subtotal: dec!(100),
            discount: dec!(0),
            tax: dec!(5),
            shipping: dec!(15),
            total: dec!(120),
            status,
            payment_status: PaymentStatus::Pending,
            payment_method: PaymentMethod::Card,
            payment_reference: None,
            shipping_address: "King Fahd Road 12".to_string(),
            shipping_city: "Riyadh".to_string(),
            shipping_phone: "0500000000".to_string(),
            notes: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_pricing_below_free_shipping() {
        let totals = price_order(&[line(dec!(50), None, 2), line(dec!(30), Some(dec!(25)), 1)]);

        assert_eq!(totals.subtotal, dec!(130));
        assert_eq!(totals.discount, dec!(5));
        assert_eq!(totals.tax, dec!(6.25));
        assert_eq!(totals.shipping, dec!(15));
        assert_eq!(totals.total, dec!(146.25));
        assert!(totals.is_consistent());
    }

    #[test]
    fn test_free_shipping_uses_discounted_amount() {
        // 210 list, 20 off -> 190 taxable, so shipping still applies
        let totals = price_order(&[line(dec!(105), Some(dec!(95)), 2)]);
        assert_eq!(totals.discount, dec!(20));
        assert_eq!(totals.shipping, dec!(15));

        let totals = price_order(&[line(dec!(100), None, 2)]);
        assert_eq!(totals.shipping, dec!(0));
        assert_eq!(totals.tax, dec!(10));
        assert_eq!(totals.total, dec!(210));
    }

    #[test]
    fn test_tax_rounds_half_away_from_zero() {
        // 0.05 * 10.10 = 0.505
        let totals = price_order(&[line(dec!(10.10), None, 1)]);
        assert_eq!(totals.tax, dec!(0.51));
        assert!(totals.is_consistent());
    }

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number();
        assert!(number.starts_with("ORD-"));
        assert_eq!(number.len(), 14);
        assert!(number[4..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_status_flow() {
        let now = Utc::now();
        let mut o = order(OrderStatus::Pending);
        o.transition(OrderStatus::Confirmed, now).unwrap();
        o.transition(OrderStatus::Processing, now).unwrap();
        o.transition(OrderStatus::Shipped, now).unwrap();
        assert!(o.shipped_at.is_some());
        o.transition(OrderStatus::Delivered, now).unwrap();
        assert!(o.delivered_at.is_some());

        assert!(o.transition(OrderStatus::Cancelled, now).is_err());
    }

    #[test]
    fn test_skipping_states_rejected() {
        let mut o = order(OrderStatus::Pending);
        assert_eq!(
            o.transition(OrderStatus::Shipped, Utc::now()),
            Err(DomainError::InvalidOrderTransition {
                from: "pending".to_string(),
                to: "shipped".to_string()
            })
        );
    }

    #[test]
    fn test_cancel_rules() {
        let now = Utc::now();
        for status in [OrderStatus::Pending, OrderStatus::Confirmed, OrderStatus::Processing] {
            let mut o = order(status);
            assert!(o.transition(OrderStatus::Cancelled, now).is_ok());
            assert!(o.cancelled_at.is_some());
        }
        let mut shipped = order(OrderStatus::Shipped);
        assert_eq!(
            shipped.transition(OrderStatus::Cancelled, now),
            Err(DomainError::OrderNotCancellable)
        );
    }

    #[test]
    fn test_cancelling_paid_order_refunds() {
        let now = Utc::now();
        let mut o = order(OrderStatus::Confirmed);
        o.mark_as_paid(Some("ch_123".to_string()), now).unwrap();
        assert_eq!(o.mark_as_paid(None, now), Err(DomainError::OrderAlreadyPaid));

        o.transition(OrderStatus::Cancelled, now).unwrap();
        assert_eq!(o.payment_status, PaymentStatus::Refunded);
    }

    #[test]
    fn test_create_request_validation() {
        let request: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "items": [{ "product_id": Uuid::new_v4(), "quantity": 0 }],
            "payment_method": "cash_on_delivery",
            "shipping_address": "King Fahd Road 12",
            "shipping_city": "Riyadh",
            "shipping_phone": "0500000000"
        }))
        .unwrap();

        let errors = crate::models::field_errors(&request.validate().unwrap_err());
        assert!(errors.contains_key("items.0.quantity"));
    }

    #[test]
    fn test_create_request_needs_items() {
        let request: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "items": [],
            "payment_method": "card",
            "shipping_address": "King Fahd Road 12",
            "shipping_city": "Riyadh",
            "shipping_phone": "0500000000"
        }))
        .unwrap();

        let errors = crate::models::field_errors(&request.validate().unwrap_err());
        assert_eq!(errors["items"], vec!["Order must contain at least one item".to_string()]);
    }
}
