use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::auth::UserSession;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    generate_order_number, price_order, sanitize_opt, sanitize_text, CreateOrderRequest,
    DomainError, Order, OrderFilter, OrderItem, OrderStatus, OrderWithItems, PageParams,
    Paginated, PricedLine, Product,
};

#[derive(Debug, Clone)]
pub struct OrderService {
    db: PgPool,
}

impl OrderService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Prices from locked product rows, decrements stock and writes the order in one transaction
    pub async fn create_order(&self, user_id: Uuid, request: CreateOrderRequest) -> ApiResult<OrderWithItems> {
        // Repeated products collapse into one line
        let mut quantities: BTreeMap<Uuid, i32> = BTreeMap::new();
        for item in &request.items {
            *quantities.entry(item.product_id).or_insert(0) += item.quantity;
        }
        let product_ids: Vec<Uuid> = quantities.keys().copied().collect();

        let mut tx = self.db.begin().await?;

        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&product_ids)
        .fetch_all(&mut *tx)
        .await?;

        let mut lines = Vec::with_capacity(products.len());
        for (product_id, quantity) in &quantities {
            let product = products
                .iter()
                .find(|product| product.id == *product_id)
                .ok_or_else(|| ApiError::not_found("Product"))?;

            if !product.is_active {
                return Err(DomainError::ProductUnavailable(product.name.clone()).into());
            }
            if !product.can_fulfil(*quantity) {
                return Err(DomainError::InsufficientStock(product.name.clone()).into());
            }

            lines.push(PricedLine {
                product_id: product.id,
                product_name: product.name.clone(),
                unit_price: product.price,
                sale_price: product.sale_price,
                quantity: *quantity,
            });
        }

        let totals = price_order(&lines);

        for line in &lines {
            sqlx::query("UPDATE products SET stock = stock - $1, updated_at = NOW() WHERE id = $2")
                .bind(line.quantity)
                .bind(line.product_id)
                .execute(&mut *tx)
                .await?;
        }

        let order = sqlx::query_as::<_, Order>(
            "INSERT INTO orders
                (id, order_number, user_id, subtotal, discount, tax, shipping, total,
                 payment_method, shipping_address, shipping_city, shipping_phone, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(generate_order_number())
        .bind(user_id)
        .bind(totals.subtotal)
        .bind(totals.discount)
        .bind(totals.tax)
        .bind(totals.shipping)
        .bind(totals.total)
        .bind(request.payment_method)
        .bind(sanitize_text(&request.shipping_address))
        .bind(sanitize_text(&request.shipping_city))
        .bind(request.shipping_phone.trim())
        .bind(sanitize_opt(request.notes))
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = sqlx::query_as::<_, OrderItem>(
                "INSERT INTO order_items
                    (id, order_id, product_id, product_name, unit_price, sale_price, quantity, line_total)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 RETURNING *",
            )
            .bind(Uuid::new_v4())
            .bind(order.id)
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(line.unit_price)
            .bind(line.sale_price.filter(|sale| *sale < line.unit_price))
            .bind(line.quantity)
            .bind(line.line_total())
            .fetch_one(&mut *tx)
            .await?;
            items.push(item);
        }

        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            "Order created"
        );
        Ok(OrderWithItems { order, items })
    }

    pub async fn list_user_orders(&self, user_id: Uuid, page: PageParams) -> ApiResult<Paginated<Order>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Paginated::new(orders, page, total))
    }

    pub async fn list_orders(&self, filter: &OrderFilter, page: PageParams) -> ApiResult<Paginated<Order>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders
             WHERE ($1::order_status IS NULL OR status = $1)
               AND ($2::payment_status IS NULL OR payment_status = $2)",
        )
        .bind(filter.status)
        .bind(filter.payment_status)
        .fetch_one(&self.db)
        .await?;

        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders
             WHERE ($1::order_status IS NULL OR status = $1)
               AND ($2::payment_status IS NULL OR payment_status = $2)
             ORDER BY created_at DESC
             LIMIT $3 OFFSET $4",
        )
        .bind(filter.status)
        .bind(filter.payment_status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Paginated::new(orders, page, total))
    }

    /// Owners see their own orders; admins see all
    pub async fn get_order(&self, session: &UserSession, order_id: Uuid) -> ApiResult<OrderWithItems> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(&self.db)
            .await?
            .filter(|order| session.is_admin() || order.user_id == session.user_id)
            .ok_or_else(|| ApiError::not_found("Order"))?;

        let items = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1")
            .bind(order.id)
            .fetch_all(&self.db)
            .await?;

        Ok(OrderWithItems { order, items })
    }

    /// Cancellation by the owner or an admin; stock is returned
    pub async fn cancel_order(&self, session: &UserSession, order_id: Uuid) -> ApiResult<Order> {
        let mut tx = self.db.begin().await?;
        let mut order = lock_order(&mut tx, order_id).await?;

        if !session.is_admin() && order.user_id != session.user_id {
            return Err(ApiError::not_found("Order"));
        }

        order.transition(OrderStatus::Cancelled, Utc::now())?;

        sqlx::query(
            "UPDATE products p SET stock = p.stock + i.quantity, updated_at = NOW()
             FROM order_items i
             WHERE i.order_id = $1 AND i.product_id = p.id",
        )
        .bind(order.id)
        .execute(&mut *tx)
        .await?;

        let order = save_order(&mut tx, &order).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id, "Order cancelled");
        Ok(order)
    }

    /// Admin status step (confirm, processing, shipped, delivered)
    pub async fn advance_order(&self, order_id: Uuid, next: OrderStatus) -> ApiResult<Order> {
        if next == OrderStatus::Cancelled {
            return Err(ApiError::BadRequest("Use the cancel action to cancel an order".to_string()));
        }

        let mut tx = self.db.begin().await?;
        let mut order = lock_order(&mut tx, order_id).await?;
        order.transition(next, Utc::now())?;
        let order = save_order(&mut tx, &order).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id, status = order.status.as_str(), "Order status changed");
        Ok(order)
    }

    pub async fn mark_as_paid(&self, order_id: Uuid, payment_reference: Option<String>) -> ApiResult<Order> {
        let mut tx = self.db.begin().await?;
        let mut order = lock_order(&mut tx, order_id).await?;
        order.mark_as_paid(sanitize_opt(payment_reference), Utc::now())?;
        let order = save_order(&mut tx, &order).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id, "Order marked as paid");
        Ok(order)
    }
}

async fn lock_order(tx: &mut Transaction<'_, Postgres>, order_id: Uuid) -> ApiResult<Order> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(order_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Order"))
}

async fn save_order(tx: &mut Transaction<'_, Postgres>, order: &Order) -> ApiResult<Order> {
    let order = sqlx::query_as::<_, Order>(
        "UPDATE orders SET
            status = $2, payment_status = $3, payment_reference = $4,
            shipped_at = $5, delivered_at = $6, cancelled_at = $7, updated_at = $8
         WHERE id = $1
         RETURNING *",
    )
    .bind(order.id)
    .bind(order.status)
    .bind(order.payment_status)
    .bind(&order.payment_reference)
    .bind(order.shipped_at)
    .bind(order.delivered_at)
    .bind(order.cancelled_at)
    .bind(order.updated_at)
    .fetch_one(&mut **tx)
    .await?;
    Ok(order)
}
