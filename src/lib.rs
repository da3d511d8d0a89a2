pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod query;
pub mod server;
pub mod store;

pub use cache::{CacheStats, CachedResponse, ResponseCache};
pub use catalog::Catalog;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use query::{Filters, Period};
pub use server::{create_router, AppState};
pub use store::{Column, Store};
