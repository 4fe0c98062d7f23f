//! HTTP front end for the Waitroom queue

pub mod api;
pub mod error;
pub mod handlers;
pub mod server;
pub mod state;
pub mod types;

pub use api::build_router;
pub use error::{ServerError, ServerResult};
pub use server::{install_metrics_exporter, WaitroomServer};
pub use state::AppState;
