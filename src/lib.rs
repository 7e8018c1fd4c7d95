// src/lib.rs

pub mod api;
pub mod commands;
pub mod disambiguation;
pub mod error;
pub mod export;
pub mod reducer;
pub mod render;
pub mod routing;
pub mod server;
pub mod settings;
pub mod state;
pub mod types;

pub use api::{BackendClient, EventStream, QueryTransport, SseTransport};
pub use commands::{ActiveSession, ChatSurface, SessionManager, SurfaceMode};
pub use error::{ClientError, Result};
pub use state::{ChatState, Phase};

use tracing_subscriber::EnvFilter;

/// Installs the stderr log subscriber. `RUST_LOG` wins over `default`.
pub fn init_tracing(default: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
