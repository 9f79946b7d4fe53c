//! Create item command

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::AppError;
use crate::features::items::types::{Item, MAX_DESCRIPTION_LENGTH, MAX_NAME_LENGTH};
use crate::features::shared::validation::{
    validate_name, validate_optional_text, validate_quantity, NameValidationError,
    QuantityValidationError, TextValidationError,
};

/// Body of `POST /items`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateItemCommand {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub quantity: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateItemError {
    #[error("Name validation failed: {0}")]
    NameValidation(#[from] NameValidationError),

    #[error("Description validation failed: {0}")]
    DescriptionValidation(#[from] TextValidationError),

    #[error("Quantity validation failed: {0}")]
    QuantityValidation(#[from] QuantityValidationError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<CreateItemError> for AppError {
    fn from(err: CreateItemError) -> Self {
        match err {
            CreateItemError::Database(e) => AppError::Database(e),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl CreateItemCommand {
    #[tracing::instrument(skip(self), fields(name = %self.name))]
    pub fn validate(&self) -> Result<(), CreateItemError> {
        validate_name(&self.name, MAX_NAME_LENGTH)?;
        validate_optional_text(self.description.as_deref(), "description", MAX_DESCRIPTION_LENGTH)?;
        validate_quantity(self.quantity)?;
        Ok(())
    }
}

#[tracing::instrument(skip(pool, command), fields(name = %command.name))]
pub async fn handle(pool: &PgPool, command: CreateItemCommand) -> Result<Item, CreateItemError> {
    command.validate()?;

    let item = sqlx::query_as::<_, Item>(
        r#"
        INSERT INTO items (name, description, quantity)
        VALUES ($1, $2, $3)
        RETURNING id, name, description, quantity, created_at, updated_at
        "#,
    )
    .bind(command.name.trim())
    .bind(command.description)
    .bind(command.quantity)
    .fetch_one(pool)
    .await?;

    tracing::info!(item_id = item.id, "Item created");
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(name: &str) -> CreateItemCommand {
        CreateItemCommand {
            name: name.to_string(),
            description: None,
            quantity: 0,
        }
    }

    #[test]
    fn test_validate_success() {
        assert!(command("Widget").validate().is_ok());
    }

    #[test]
    fn test_validate_empty_name() {
        let result = command("  ").validate();
        assert!(matches!(result, Err(CreateItemError::NameValidation(_))));
    }

    #[test]
    fn test_validate_negative_quantity() {
        let mut cmd = command("Widget");
        cmd.quantity = -2;
        assert!(matches!(
            cmd.validate(),
            Err(CreateItemError::QuantityValidation(_))
        ));
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err = command("").validate().unwrap_err();
        assert!(matches!(AppError::from(err), AppError::BadRequest(_)));
    }

    #[test]
    fn test_deserialize_defaults() {
        let cmd: CreateItemCommand = serde_json::from_str(r#"{"name":"Widget"}"#).unwrap();
        assert_eq!(cmd.quantity, 0);
        assert!(cmd.description.is_none());
    }
}
