use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::models::{
    CreateExpenseRequest, CreateExpenseResponse, Expense, ExpenseUpdate, MessageResponse,
    RepositoryError, ServiceError,
};
use crate::services::ExpenseService;

/// Shared application state for the expense endpoints
#[derive(Clone)]
pub struct ApiState {
    pub expense_service: Arc<ExpenseService>,
}

/// Query parameters identifying the owner of list/update/delete requests.
///
/// Absent or empty values fall back to the configured default identity.
#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    #[serde(alias = "userId")]
    pub user_id: Option<String>,
}

/// Create the expense API router
pub fn create_expense_router(expense_service: Arc<ExpenseService>) -> Router {
    let state = ApiState { expense_service };

    Router::new()
        .route("/expenses", get(list_expenses).post(create_expense))
        // GET maps to List regardless of a trailing id; the id only
        // selects the target of update and delete.
        .route(
            "/expenses/:expense_id",
            get(list_expenses).put(update_expense).delete(delete_expense),
        )
        .with_state(state)
}

/// Create a new expense and run the spend threshold check
#[instrument(name = "create_expense", skip(state, body))]
pub async fn create_expense(
    State(state): State<ApiState>,
    body: Result<Json<CreateExpenseRequest>, JsonRejection>,
) -> Result<Json<CreateExpenseResponse>, (StatusCode, Json<Value>)> {
    let Json(request) = body.map_err(body_rejection_to_response)?;

    crate::info_with_trace!("Creating expense in category: {}", request.category);

    match state.expense_service.create_expense(request).await {
        Ok(response) => {
            crate::info_with_trace!("Successfully created expense {}", response.id);
            Ok(Json(response))
        }
        Err(err) => {
            crate::error_with_trace!("Failed to create expense: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

/// List a user's expenses, newest first
#[instrument(name = "list_expenses", skip(state), fields(user_id = query.user_id.as_deref()))]
pub async fn list_expenses(
    State(state): State<ApiState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<Expense>>, (StatusCode, Json<Value>)> {
    info!("Listing expenses");

    match state
        .expense_service
        .list_expenses(query.user_id.as_deref())
        .await
    {
        Ok(expenses) => {
            info!("Successfully listed {} expenses", expenses.len());
            Ok(Json(expenses))
        }
        Err(err) => {
            error!("Failed to list expenses: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

/// Apply a partial update to a single expense
#[instrument(name = "update_expense", skip(state, body), fields(expense_id = %expense_id))]
pub async fn update_expense(
    State(state): State<ApiState>,
    Path(expense_id): Path<String>,
    Query(query): Query<OwnerQuery>,
    body: Result<Json<ExpenseUpdate>, JsonRejection>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<Value>)> {
    let Json(update) = body.map_err(body_rejection_to_response)?;

    crate::info_with_trace!("Updating expense: {}", expense_id);

    match state
        .expense_service
        .update_expense(query.user_id.as_deref(), &expense_id, update)
        .await
    {
        Ok(response) => {
            crate::info_with_trace!("Successfully updated expense");
            Ok(Json(response))
        }
        Err(err) => {
            crate::error_with_trace!("Failed to update expense {}: {}", expense_id, err);
            Err(service_error_to_response(err))
        }
    }
}

/// Delete a single expense; deleting a missing record still succeeds
#[instrument(name = "delete_expense", skip(state), fields(expense_id = %expense_id))]
pub async fn delete_expense(
    State(state): State<ApiState>,
    Path(expense_id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<Value>)> {
    crate::info_with_trace!("Deleting expense: {}", expense_id);

    match state
        .expense_service
        .delete_expense(query.user_id.as_deref(), &expense_id)
        .await
    {
        Ok(response) => {
            crate::info_with_trace!("Successfully deleted expense");
            Ok(Json(response))
        }
        Err(err) => {
            crate::error_with_trace!("Failed to delete expense {}: {}", expense_id, err);
            Err(service_error_to_response(err))
        }
    }
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Map a missing or malformed JSON body to the validation error response
fn body_rejection_to_response(rejection: JsonRejection) -> (StatusCode, Json<Value>) {
    error!("Invalid request body: {}", rejection.body_text());
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": "Invalid request body",
            "message": rejection.body_text(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// Convert ServiceError to HTTP response
fn service_error_to_response(err: ServiceError) -> (StatusCode, Json<Value>) {
    let (status, message) = match err {
        ServiceError::ExpenseNotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        ServiceError::ValidationError { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        ServiceError::Repository { source } => match source {
            RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Resource not found".to_string()),
            RepositoryError::RateLimitExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        },
        ServiceError::Configuration { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Configuration error".to_string(),
        ),
    };

    (
        status,
        Json(json!({
            "error": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}
