// Domain models, request payloads and state transitions

pub mod chat;
pub mod error;
pub mod health;
pub mod order;
pub mod pagination;
pub mod product;
pub mod subscription;
pub mod tracking;
pub mod trainer;
pub mod training_session;
pub mod user;
pub mod validation;

pub use chat::*;
pub use error::*;
pub use health::{BodyProfile, HealthMetrics};
pub use order::*;
pub use pagination::*;
pub use product::*;
pub use subscription::*;
pub use tracking::*;
pub use trainer::*;
pub use training_session::*;
pub use user::*;
pub use validation::*;
