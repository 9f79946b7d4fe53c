//! Items feature
//!
//! Demo resource showing a full CRUD slice on top of [`crate::rest`]:
//! - `commands/` - create, replace, patch, delete
//! - `queries/` - get by id, paged list
//! - `routes.rs` - [`ItemsResource`] wiring both into REST handler slots

pub mod commands;
pub mod queries;
pub mod routes;
pub mod types;

pub use routes::ItemsResource;
pub use types::Item;
