use axum::{
    extract::{Path, Query, State},
    middleware,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::response::{ApiResponse, ValidatedJson};
use crate::auth::{admin_only_middleware, jwt_auth_middleware, UserSession};
use crate::error::ApiResult;
use crate::models::{
    AssignTrainerRequest, ChangeRoleRequest, CreatePlan, CreateProduct, MarkPaidRequest, Order,
    OrderFilter, OrderStatus, OrderWithItems, PageParams, Paginated, ProductFilter,
    ProductResponse, SetActiveRequest, SubscriptionPlan, SubscriptionResponse, UpdatePlan,
    UpdateProduct, UserFilter, UserResponse,
};
use crate::services::{
    DashboardService, DashboardStats, OrderService, ProductService, SubscriptionFilter,
    SubscriptionService, UserService,
};
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
struct PlanQuery {
    #[serde(default)]
    include_inactive: bool,
}

/// Back-office routes; admin role required
pub fn admin_routes(state: AppState) -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        // users
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user))
        .route("/users/:id/role", put(change_role))
        .route("/users/:id/status", put(set_active))
        .route("/users/:id/trainer", put(assign_trainer))
        // products
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        // orders
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/mark-as-paid", post(mark_as_paid))
        .route("/orders/:id/confirm", post(confirm_order))
        .route("/orders/:id/processing", post(mark_as_processing))
        .route("/orders/:id/ship", post(mark_as_shipped))
        .route("/orders/:id/deliver", post(mark_as_delivered))
        .route("/orders/:id/cancel", post(cancel_order))
        // plans
        .route("/plans", get(list_plans).post(create_plan))
        .route(
            "/plans/:id",
            get(get_plan).put(update_plan).delete(delete_plan),
        )
        // subscriptions
        .route("/subscriptions", get(list_subscriptions))
        .route("/subscriptions/expire-overdue", post(expire_overdue))
        .route("/subscriptions/:id/activate", post(activate_subscription))
        .route("/subscriptions/:id/cancel", post(cancel_subscription))
        .route_layer(middleware::from_fn(admin_only_middleware))
        .route_layer(middleware::from_fn_with_state(
            state.auth_service.clone(),
            jwt_auth_middleware,
        ))
        .with_state(state)
}

async fn dashboard(
    State(dashboard_service): State<DashboardService>,
) -> ApiResult<ApiResponse<DashboardStats>> {
    Ok(ApiResponse::ok(dashboard_service.stats().await?))
}

#[tracing::instrument(skip(user_service))]
async fn list_users(
    State(user_service): State<UserService>,
    Query(page): Query<PageParams>,
    Query(filter): Query<UserFilter>,
) -> ApiResult<ApiResponse<Paginated<UserResponse>>> {
    Ok(ApiResponse::ok(user_service.list_users(&filter, page).await?))
}

async fn get_user(
    State(user_service): State<UserService>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<ApiResponse<UserResponse>> {
    let user = user_service.get_user(user_id).await?;
    Ok(ApiResponse::ok(UserResponse::from(user)))
}

#[tracing::instrument(skip(user_service, session), fields(admin_id = %session.user_id))]
async fn change_role(
    State(user_service): State<UserService>,
    Extension(session): Extension<UserSession>,
    Path(user_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<ChangeRoleRequest>,
) -> ApiResult<ApiResponse<UserResponse>> {
    let user = user_service.change_role(&session, user_id, request.role).await?;
    Ok(ApiResponse::with_message("Role updated successfully", user))
}

#[tracing::instrument(skip(user_service, session), fields(admin_id = %session.user_id))]
async fn set_active(
    State(user_service): State<UserService>,
    Extension(session): Extension<UserSession>,
    Path(user_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<SetActiveRequest>,
) -> ApiResult<ApiResponse<UserResponse>> {
    let user = user_service
        .set_active(&session, user_id, request.is_active)
        .await?;
    let message = if request.is_active {
        "User activated"
    } else {
        "User deactivated"
    };
    Ok(ApiResponse::with_message(message, user))
}

#[tracing::instrument(skip(user_service))]
async fn assign_trainer(
    State(user_service): State<UserService>,
    Path(user_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<AssignTrainerRequest>,
) -> ApiResult<ApiResponse<UserResponse>> {
    let user = user_service.assign_trainer(user_id, request.trainer_id).await?;
    Ok(ApiResponse::with_message("Trainer assignment updated", user))
}

async fn list_products(
    State(product_service): State<ProductService>,
    Query(page): Query<PageParams>,
    Query(filter): Query<ProductFilter>,
) -> ApiResult<ApiResponse<Paginated<ProductResponse>>> {
    Ok(ApiResponse::ok(
        product_service.list_products(&filter, page, true).await?,
    ))
}

async fn get_product(
    State(product_service): State<ProductService>,
    Path(product_id): Path<Uuid>,
) -> ApiResult<ApiResponse<ProductResponse>> {
    Ok(ApiResponse::ok(product_service.get_product(product_id, true).await?))
}

#[tracing::instrument(skip(product_service, request))]
async fn create_product(
    State(product_service): State<ProductService>,
    ValidatedJson(request): ValidatedJson<CreateProduct>,
) -> ApiResult<ApiResponse<ProductResponse>> {
    let product = product_service.create_product(request).await?;
    Ok(ApiResponse::created("Product created successfully", product))
}

#[tracing::instrument(skip(product_service, request))]
async fn update_product(
    State(product_service): State<ProductService>,
    Path(product_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateProduct>,
) -> ApiResult<ApiResponse<ProductResponse>> {
    let product = product_service.update_product(product_id, request).await?;
    Ok(ApiResponse::with_message("Product updated successfully", product))
}

#[tracing::instrument(skip(product_service))]
async fn delete_product(
    State(product_service): State<ProductService>,
    Path(product_id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    product_service.delete_product(product_id).await?;
    Ok(ApiResponse::message("Product deleted successfully"))
}

async fn list_orders(
    State(order_service): State<OrderService>,
    Query(page): Query<PageParams>,
    Query(filter): Query<OrderFilter>,
) -> ApiResult<ApiResponse<Paginated<Order>>> {
    Ok(ApiResponse::ok(order_service.list_orders(&filter, page).await?))
}

async fn get_order(
    State(order_service): State<OrderService>,
    Extension(session): Extension<UserSession>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<ApiResponse<OrderWithItems>> {
    Ok(ApiResponse::ok(order_service.get_order(&session, order_id).await?))
}

#[tracing::instrument(skip(order_service, request))]
async fn mark_as_paid(
    State(order_service): State<OrderService>,
    Path(order_id): Path<Uuid>,
    request: Option<Json<MarkPaidRequest>>,
) -> ApiResult<ApiResponse<Order>> {
    let reference = request.and_then(|Json(request)| request.payment_reference);
    let order = order_service.mark_as_paid(order_id, reference).await?;
    Ok(ApiResponse::with_message("Order marked as paid", order))
}

async fn advance(
    order_service: &OrderService,
    order_id: Uuid,
    next: OrderStatus,
) -> ApiResult<ApiResponse<Order>> {
    let order = order_service.advance_order(order_id, next).await?;
    Ok(ApiResponse::with_message(
        format!("Order marked as {}", next.as_str()),
        order,
    ))
}

async fn confirm_order(
    State(order_service): State<OrderService>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<ApiResponse<Order>> {
    advance(&order_service, order_id, OrderStatus::Confirmed).await
}

async fn mark_as_processing(
    State(order_service): State<OrderService>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<ApiResponse<Order>> {
    advance(&order_service, order_id, OrderStatus::Processing).await
}

async fn mark_as_shipped(
    State(order_service): State<OrderService>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<ApiResponse<Order>> {
    advance(&order_service, order_id, OrderStatus::Shipped).await
}

async fn mark_as_delivered(
    State(order_service): State<OrderService>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<ApiResponse<Order>> {
    advance(&order_service, order_id, OrderStatus::Delivered).await
}

#[tracing::instrument(skip(order_service, session), fields(admin_id = %session.user_id))]
async fn cancel_order(
    State(order_service): State<OrderService>,
    Extension(session): Extension<UserSession>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<ApiResponse<Order>> {
    let order = order_service.cancel_order(&session, order_id).await?;
    Ok(ApiResponse::with_message("Order cancelled successfully", order))
}

async fn list_plans(
    State(subscription_service): State<SubscriptionService>,
    Query(query): Query<PlanQuery>,
) -> ApiResult<ApiResponse<Vec<SubscriptionPlan>>> {
    Ok(ApiResponse::ok(
        subscription_service.list_plans(query.include_inactive).await?,
    ))
}

async fn get_plan(
    State(subscription_service): State<SubscriptionService>,
    Path(plan_id): Path<Uuid>,
) -> ApiResult<ApiResponse<SubscriptionPlan>> {
    Ok(ApiResponse::ok(subscription_service.get_plan(plan_id).await?))
}

#[tracing::instrument(skip(subscription_service, request))]
async fn create_plan(
    State(subscription_service): State<SubscriptionService>,
    ValidatedJson(request): ValidatedJson<CreatePlan>,
) -> ApiResult<ApiResponse<SubscriptionPlan>> {
    let plan = subscription_service.create_plan(request).await?;
    Ok(ApiResponse::created("Plan created successfully", plan))
}

#[tracing::instrument(skip(subscription_service, request))]
async fn update_plan(
    State(subscription_service): State<SubscriptionService>,
    Path(plan_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdatePlan>,
) -> ApiResult<ApiResponse<SubscriptionPlan>> {
    let plan = subscription_service.update_plan(plan_id, request).await?;
    Ok(ApiResponse::with_message("Plan updated successfully", plan))
}

#[tracing::instrument(skip(subscription_service))]
async fn delete_plan(
    State(subscription_service): State<SubscriptionService>,
    Path(plan_id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    subscription_service.delete_plan(plan_id).await?;
    Ok(ApiResponse::message("Plan deleted successfully"))
}

async fn list_subscriptions(
    State(subscription_service): State<SubscriptionService>,
    Query(page): Query<PageParams>,
    Query(filter): Query<SubscriptionFilter>,
) -> ApiResult<ApiResponse<Paginated<SubscriptionResponse>>> {
    Ok(ApiResponse::ok(
        subscription_service.list_subscriptions(&filter, page).await?,
    ))
}

#[tracing::instrument(skip(subscription_service))]
async fn activate_subscription(
    State(subscription_service): State<SubscriptionService>,
    Path(subscription_id): Path<Uuid>,
) -> ApiResult<ApiResponse<SubscriptionResponse>> {
    let subscription = subscription_service.activate(subscription_id).await?;
    Ok(ApiResponse::with_message("Subscription activated", subscription))
}

#[tracing::instrument(skip(subscription_service, session), fields(admin_id = %session.user_id))]
async fn cancel_subscription(
    State(subscription_service): State<SubscriptionService>,
    Extension(session): Extension<UserSession>,
    Path(subscription_id): Path<Uuid>,
) -> ApiResult<ApiResponse<SubscriptionResponse>> {
    let subscription = subscription_service
        .cancel(&session, subscription_id)
        .await?;
    Ok(ApiResponse::with_message(
        "Subscription cancelled successfully",
        subscription,
    ))
}

async fn expire_overdue(
    State(subscription_service): State<SubscriptionService>,
) -> ApiResult<ApiResponse<Value>> {
    let expired = subscription_service.expire_overdue().await?;
    Ok(ApiResponse::ok(json!({ "expired": expired })))
}
