use axum::{middleware, Extension, Router};
use tower_http::trace::TraceLayer;

use super::admin::admin_routes;
use super::auth::auth_routes;
use super::chat::chat_routes;
use super::health::health_routes;
use super::orders::order_routes;
use super::products::product_routes;
use super::sessions::session_routes;
use super::subscriptions::subscription_routes;
use super::tracking::tracking_routes;
use super::trainers::trainer_routes;
use crate::middleware::{cors_layer, rate_limit_middleware, with_security_headers, TrustedProxies};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let auth_service = state.auth_service.clone();

    let api = Router::new()
        .nest("/auth", auth_routes(auth_service.clone(), &state.rate_limiters))
        .nest("/products", product_routes(state.product_service.clone()))
        .nest(
            "/orders",
            order_routes(state.order_service.clone(), auth_service.clone()),
        )
        .nest(
            "/subscriptions",
            subscription_routes(state.subscription_service.clone(), auth_service.clone()),
        )
        .nest(
            "/sessions",
            session_routes(state.session_service.clone(), auth_service.clone()),
        )
        .nest(
            "/chat",
            chat_routes(state.chat_service.clone(), auth_service.clone()),
        )
        .nest(
            "/tracking",
            tracking_routes(state.tracking_service.clone(), auth_service.clone()),
        )
        .nest(
            "/trainers",
            trainer_routes(state.trainer_service.clone(), auth_service),
        )
        .nest("/admin", admin_routes(state.clone()))
        .layer(middleware::from_fn_with_state(
            state.rate_limiters.api.clone(),
            rate_limit_middleware,
        ));

    let router = Router::new()
        .merge(health_routes(state.db.clone()))
        .nest("/api", api);

    with_security_headers(router)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .layer(Extension(TrustedProxies(state.config.trusted_proxy_hops)))
}
