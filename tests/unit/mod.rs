// Domain rules exercised through the public crate API

pub mod auth_state_test;
pub mod pricing_test;
pub mod subscription_test;
