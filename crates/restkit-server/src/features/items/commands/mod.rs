pub mod create;
pub mod delete;
pub mod update;

pub use create::{CreateItemCommand, CreateItemError};
pub use update::{PatchItemCommand, ReplaceItemCommand, UpdateItemError};
