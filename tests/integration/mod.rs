// Router-level tests: request in, envelope out

pub mod api_endpoints_test;
pub mod auth_flow_test;
pub mod commerce_flow_test;
pub mod subscription_flow_test;
