// Business logic services

pub mod background_job_service;
pub mod chat_service;
pub mod dashboard_service;
pub mod email_service;
pub mod order_service;
pub mod product_service;
pub mod security_log_service;
pub mod subscription_service;
pub mod tracking_service;
pub mod trainer_service;
pub mod training_session_service;
pub mod user_service;

pub use background_job_service::BackgroundJobService;
pub use chat_service::ChatService;
pub use dashboard_service::{DashboardService, DashboardStats};
pub use email_service::{EmailError, Mailer};
pub use order_service::OrderService;
pub use product_service::ProductService;
pub use security_log_service::{SecurityEvent, SecurityLogService};
pub use subscription_service::{SubscriptionFilter, SubscriptionService};
pub use tracking_service::TrackingService;
pub use trainer_service::TrainerService;
pub use training_session_service::{CompletedSession, TrainingSessionService};
pub use user_service::UserService;
