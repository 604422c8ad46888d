use thiserror::Error;

/// Service-level errors that can occur in business logic
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Expense not found: {id}")]
    ExpenseNotFound { id: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Repository error: {source}")]
    Repository {
        #[from]
        source: RepositoryError,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Repository-level errors for data access operations
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Item not found")]
    NotFound,

    #[error("Invalid item: {message}")]
    InvalidItem { message: String },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    #[error("AWS SDK error: {message}")]
    AwsSdk { message: String },

    #[error("DynamoDB table not found: {table_name}. Ensure the table exists and IAM permissions are correct.")]
    TableNotFound { table_name: String },

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type alias for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ServiceError::ExpenseNotFound {
            id: "abc-123".to_string(),
        };
        assert_eq!(error.to_string(), "Expense not found: abc-123");

        let error = ServiceError::ValidationError {
            message: "amount is required".to_string(),
        };
        assert_eq!(error.to_string(), "Validation error: amount is required");
    }

    #[test]
    fn test_repository_error_conversion() {
        let repo_error = RepositoryError::NotFound;
        let service_error: ServiceError = repo_error.into();
        assert!(matches!(
            service_error,
            ServiceError::Repository {
                source: RepositoryError::NotFound
            }
        ));
    }

    #[test]
    fn test_repository_error_from_serde() {
        let json_error = serde_json::from_str::<serde_json::Value>("not json");
        assert!(json_error.is_err());

        let repo_error: RepositoryError = json_error.unwrap_err().into();
        assert!(matches!(repo_error, RepositoryError::Serialization { .. }));
    }
}
