//! Replace and patch item commands
//!
//! `PUT` replaces every writable field; `PATCH` only touches the fields
//! present in the body.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::AppError;
use crate::features::items::types::{Item, MAX_DESCRIPTION_LENGTH, MAX_NAME_LENGTH};
use crate::features::shared::validation::{
    validate_name, validate_optional_text, validate_quantity, NameValidationError,
    QuantityValidationError, TextValidationError,
};

/// Body of `PUT /items/:id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceItemCommand {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub quantity: i32,
}

/// Body of `PATCH /items/:id`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchItemCommand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i32>,
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateItemError {
    #[error("Name validation failed: {0}")]
    NameValidation(#[from] NameValidationError),

    #[error("Description validation failed: {0}")]
    DescriptionValidation(#[from] TextValidationError),

    #[error("Quantity validation failed: {0}")]
    QuantityValidation(#[from] QuantityValidationError),

    #[error("Nothing to update")]
    Empty,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<UpdateItemError> for AppError {
    fn from(err: UpdateItemError) -> Self {
        match err {
            UpdateItemError::Database(e) => AppError::Database(e),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl ReplaceItemCommand {
    pub fn validate(&self) -> Result<(), UpdateItemError> {
        validate_name(&self.name, MAX_NAME_LENGTH)?;
        validate_optional_text(self.description.as_deref(), "description", MAX_DESCRIPTION_LENGTH)?;
        validate_quantity(self.quantity)?;
        Ok(())
    }
}

impl PatchItemCommand {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.quantity.is_none()
    }

    pub fn validate(&self) -> Result<(), UpdateItemError> {
        if self.is_empty() {
            return Err(UpdateItemError::Empty);
        }
        if let Some(name) = &self.name {
            validate_name(name, MAX_NAME_LENGTH)?;
        }
        validate_optional_text(self.description.as_deref(), "description", MAX_DESCRIPTION_LENGTH)?;
        if let Some(quantity) = self.quantity {
            validate_quantity(quantity)?;
        }
        Ok(())
    }
}

/// `None` when no item has `id`
#[tracing::instrument(skip(pool, command))]
pub async fn replace(
    pool: &PgPool,
    id: i64,
    command: ReplaceItemCommand,
) -> Result<Option<Item>, UpdateItemError> {
    command.validate()?;

    let item = sqlx::query_as::<_, Item>(
        r#"
        UPDATE items
        SET name = $2, description = $3, quantity = $4, updated_at = NOW()
        WHERE id = $1
        RETURNING id, name, description, quantity, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(command.name.trim())
    .bind(command.description)
    .bind(command.quantity)
    .fetch_optional(pool)
    .await?;

    if item.is_some() {
        tracing::info!(item_id = id, "Item replaced");
    }
    Ok(item)
}

/// `None` when no item has `id`
#[tracing::instrument(skip(pool, command))]
pub async fn patch(
    pool: &PgPool,
    id: i64,
    command: PatchItemCommand,
) -> Result<Option<Item>, UpdateItemError> {
    command.validate()?;

    let item = sqlx::query_as::<_, Item>(
        r#"
        UPDATE items
        SET name = COALESCE($2, name),
            description = COALESCE($3, description),
            quantity = COALESCE($4, quantity),
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, name, description, quantity, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(command.name.as_deref().map(str::trim))
    .bind(command.description)
    .bind(command.quantity)
    .fetch_optional(pool)
    .await?;

    if item.is_some() {
        tracing::info!(item_id = id, "Item patched");
    }
    Ok(item)
}
