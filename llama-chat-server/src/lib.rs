pub mod config;
pub mod error;
pub mod llm;
pub mod routes;
pub mod telemetry;

pub use config::GatewayConfig;
pub use error::ApiError;
pub use llm::{BackendClient, BackendError};
pub use routes::router;
