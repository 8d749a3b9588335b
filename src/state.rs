use axum::extract::FromRef;
use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::middleware::RateLimiters;
use crate::services::{
    ChatService, DashboardService, Mailer, OrderService, ProductService, SubscriptionService,
    TrackingService, TrainerService, TrainingSessionService, UserService,
};

/// Every service the router hands out, built once at startup
#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: PgPool,
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub trainer_service: TrainerService,
    pub product_service: ProductService,
    pub order_service: OrderService,
    pub subscription_service: SubscriptionService,
    pub session_service: TrainingSessionService,
    pub chat_service: ChatService,
    pub tracking_service: TrackingService,
    pub dashboard_service: DashboardService,
    pub rate_limiters: RateLimiters,
}

impl AppState {
    pub fn new(db: PgPool, config: AppConfig, mailer: Mailer) -> Self {
        let auth_service = AuthService::new(db.clone(), &config.auth, mailer);

        Self {
            config: Arc::new(config),
            auth_service,
            user_service: UserService::new(db.clone()),
            trainer_service: TrainerService::new(db.clone()),
            product_service: ProductService::new(db.clone()),
            order_service: OrderService::new(db.clone()),
            subscription_service: SubscriptionService::new(db.clone()),
            session_service: TrainingSessionService::new(db.clone()),
            chat_service: ChatService::new(db.clone()),
            tracking_service: TrackingService::new(db.clone()),
            dashboard_service: DashboardService::new(db.clone()),
            rate_limiters: RateLimiters::default(),
            db,
        }
    }
}
