use axum::{
    extract::{Path, Query, State},
    routing::get,
    Router,
};
use uuid::Uuid;

use crate::api::response::ApiResponse;
use crate::error::ApiResult;
use crate::models::{PageParams, Paginated, ProductFilter, ProductResponse};
use crate::services::ProductService;

/// Public catalogue; inactive products are hidden
pub fn product_routes(product_service: ProductService) -> Router {
    Router::new()
        .route("/", get(list_products))
        .route("/categories", get(list_categories))
        .route("/:id", get(get_product))
        .with_state(product_service)
}

#[tracing::instrument(skip(product_service))]
async fn list_products(
    State(product_service): State<ProductService>,
    Query(page): Query<PageParams>,
    Query(filter): Query<ProductFilter>,
) -> ApiResult<ApiResponse<Paginated<ProductResponse>>> {
    let products = product_service.list_products(&filter, page, false).await?;
    Ok(ApiResponse::ok(products))
}

async fn list_categories(
    State(product_service): State<ProductService>,
) -> ApiResult<ApiResponse<Vec<String>>> {
    Ok(ApiResponse::ok(product_service.categories().await?))
}

#[tracing::instrument(skip(product_service))]
async fn get_product(
    State(product_service): State<ProductService>,
    Path(product_id): Path<Uuid>,
) -> ApiResult<ApiResponse<ProductResponse>> {
    let product = product_service.get_product(product_id, false).await?;
    Ok(ApiResponse::ok(product))
}
