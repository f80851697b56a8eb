pub mod config;
pub mod error;
pub mod fetcher;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod utils;

pub use error::{ErrorKind, FetchError, TransportError};
pub use fetcher::{DispatchMode, Fetcher};
pub use models::{FetchOptions, FetchOutcome, Method};
