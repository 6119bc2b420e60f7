pub mod client;
pub mod content;
pub mod content_types;
pub mod error;
pub mod mapper;
pub mod models;
pub mod params;
pub mod projector;
pub mod removed;
pub mod resolver;
pub mod shared_types;
pub mod sync;
pub mod workers;

pub use crate::client::{FlotiqClient, HttpTransport, ReqwestTransport};
pub use crate::error::FlotiqError;
pub use crate::params::SyncOptions;
pub use crate::resolver::ReferenceResolver;
pub use crate::sync::{run_sync, SyncReport, SyncSession, SyncState};
