//! Typed errors raised by criteria building, compilation and the managers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("duplicate search attribute: {0}")]
    DuplicateAttribute(String),
    #[error("unknown domain path: {0}")]
    UnknownDomain(String),
    #[error("manager for '{0}' holds a different item type")]
    ItemType(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum MShopError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("malformed criteria: {0}")]
    MalformedCriteria(String),
    #[error("unknown search attribute: {0}")]
    Compile(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("storage: {0}")]
    Storage(#[from] sqlx::Error),
}

impl MShopError {
    /// Stable machine-readable code for collaborators translating failures into messages.
    pub fn code(&self) -> &'static str {
        match self {
            MShopError::Config(_) => "config_error",
            MShopError::MalformedCriteria(_) => "malformed_criteria",
            MShopError::Compile(_) => "compile_error",
            MShopError::NotFound(_) => "not_found",
            MShopError::Validation(_) => "validation_error",
            MShopError::Storage(sqlx::Error::RowNotFound) => "not_found",
            MShopError::Storage(_) => "storage_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_the_error_kind() {
        assert_eq!(MShopError::Compile("x.y".into()).code(), "compile_error");
        assert_eq!(MShopError::Storage(sqlx::Error::RowNotFound).code(), "not_found");
        let err: MShopError = ConfigError::UnknownDomain("foo".into()).into();
        assert_eq!(err.code(), "config_error");
        assert_eq!(err.to_string(), "unknown domain path: foo");
    }
}
