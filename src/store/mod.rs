pub mod db;
pub mod precompute;
pub mod schema;

pub use db::Store;
pub use schema::Column;
