pub mod app;
pub mod config;
pub mod proxy;
pub mod routes;

pub use app::{build_router, AppState};
pub use config::{load_gateway_config, GatewayConfig};
