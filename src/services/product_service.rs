use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{
    sanitize_opt, sanitize_text, CreateProduct, PageParams, Paginated, Product, ProductFilter,
    ProductResponse, UpdateProduct,
};

const FILTER_CLAUSE: &str = "
    WHERE ($1 OR is_active)
      AND ($2::text IS NULL OR category = $2)
      AND ($3::text IS NULL OR name ILIKE $3 OR description ILIKE $3)
      AND ($4::boolean IS NULL OR is_featured = $4)
      AND ($5::boolean IS NULL OR (sale_price IS NOT NULL AND sale_price < price) = $5)";

#[derive(Debug, Clone)]
pub struct ProductService {
    db: PgPool,
}

impl ProductService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Storefront listing hides inactive products unless `include_inactive`
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageParams,
        include_inactive: bool,
    ) -> ApiResult<Paginated<ProductResponse>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(|term| format!("%{}%", term));

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM products {}", FILTER_CLAUSE))
            .bind(include_inactive)
            .bind(&filter.category)
            .bind(&search)
            .bind(filter.featured)
            .bind(filter.on_sale)
            .fetch_one(&self.db)
            .await?;

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT * FROM products {} ORDER BY is_featured DESC, created_at DESC LIMIT $6 OFFSET $7",
            FILTER_CLAUSE
        ))
        .bind(include_inactive)
        .bind(&filter.category)
        .bind(&search)
        .bind(filter.featured)
        .bind(filter.on_sale)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Paginated::new(products, page, total).map(ProductResponse::from))
    }

    pub async fn get_product(&self, product_id: Uuid, include_inactive: bool) -> ApiResult<ProductResponse> {
        let product = self.find(product_id).await?;
        if !product.is_active && !include_inactive {
            return Err(ApiError::not_found("Product"));
        }
        Ok(ProductResponse::from(product))
    }

    pub async fn create_product(&self, request: CreateProduct) -> ApiResult<ProductResponse> {
        request.check_prices().map_err(ApiError::Validation)?;

        let product = sqlx::query_as::<_, Product>(
            "INSERT INTO products
                (id, name, description, category, price, sale_price, stock, images, is_active, is_featured)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(sanitize_text(&request.name))
        .bind(sanitize_opt(request.description))
        .bind(sanitize_text(&request.category))
        .bind(request.price)
        .bind(request.sale_price)
        .bind(request.stock)
        .bind(Json(request.images))
        .bind(request.is_active)
        .bind(request.is_featured)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(product_id = %product.id, "Product created");
        Ok(ProductResponse::from(product))
    }

    pub async fn update_product(&self, product_id: Uuid, request: UpdateProduct) -> ApiResult<ProductResponse> {
        let current = self.find(product_id).await?;
        let next = request.apply(&current).map_err(ApiError::Validation)?;

        let product = sqlx::query_as::<_, Product>(
            "UPDATE products SET
                name = $2, description = $3, category = $4, price = $5, sale_price = $6,
                stock = $7, images = $8, is_active = $9, is_featured = $10, updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(product_id)
        .bind(sanitize_text(&next.name))
        .bind(sanitize_opt(next.description))
        .bind(sanitize_text(&next.category))
        .bind(next.price)
        .bind(next.sale_price)
        .bind(next.stock)
        .bind(next.images)
        .bind(next.is_active)
        .bind(next.is_featured)
        .fetch_one(&self.db)
        .await?;

        Ok(ProductResponse::from(product))
    }

    /// Products referenced by orders are deactivated instead of removed
    pub async fn delete_product(&self, product_id: Uuid) -> ApiResult<()> {
        let ordered: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM order_items WHERE product_id = $1)")
                .bind(product_id)
                .fetch_one(&self.db)
                .await?;

        let result = if ordered {
            sqlx::query("UPDATE products SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
                .bind(product_id)
                .execute(&self.db)
                .await?
        } else {
            sqlx::query("DELETE FROM products WHERE id = $1")
                .bind(product_id)
                .execute(&self.db)
                .await?
        };

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("Product"));
        }
        Ok(())
    }

    pub async fn categories(&self) -> ApiResult<Vec<String>> {
        let categories = sqlx::query_scalar(
            "SELECT DISTINCT category FROM products WHERE is_active ORDER BY category",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(categories)
    }

    async fn find(&self, product_id: Uuid) -> ApiResult<Product> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::not_found("Product"))
    }
}
