//! # API Layer
//!
//! Registration of model APIs and the HTTP transport.
//!
//! ```text
//! ApiRegistry (collection → Endpoint) ──► Processor ──► RestServer (axum)
//! ```

mod config;
mod errors;
mod registry;
mod server;

pub use config::{ApiConfig, MethodSet};
pub use errors::{RegistryError, RegistryResult};
pub use registry::{ApiRegistry, Endpoint};
pub use server::RestServer;
