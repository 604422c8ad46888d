use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::models::{
    CreateExpenseRequest, CreateExpenseResponse, Expense, ExpenseUpdate, MessageResponse,
    RepositoryError, ServiceError, ServiceResult,
};
use crate::repositories::ExpenseRepository;
use crate::services::AlertPublisher;

const ALERT_SUBJECT: &str = "Expense Tracker Alert";

/// Service implementing the expense CRUD operations and the spend
/// threshold monitor.
pub struct ExpenseService {
    repository: Arc<dyn ExpenseRepository>,
    publisher: Option<Arc<dyn AlertPublisher>>,
    spend_limit: Decimal,
    default_user_id: String,
}

impl ExpenseService {
    /// Create a new ExpenseService without alerting
    pub fn new(
        repository: Arc<dyn ExpenseRepository>,
        spend_limit: Decimal,
        default_user_id: String,
    ) -> Self {
        Self {
            repository,
            publisher: None,
            spend_limit,
            default_user_id,
        }
    }

    /// Create a new ExpenseService with an alert publisher
    pub fn new_with_publisher(
        repository: Arc<dyn ExpenseRepository>,
        publisher: Arc<dyn AlertPublisher>,
        spend_limit: Decimal,
        default_user_id: String,
    ) -> Self {
        Self {
            repository,
            publisher: Some(publisher),
            spend_limit,
            default_user_id,
        }
    }

    /// Resolve the owner of a request: caller-supplied id when present and
    /// non-empty, otherwise the configured single-tenant fallback.
    fn resolve_user(&self, supplied: Option<&str>) -> String {
        match supplied {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.default_user_id.clone(),
        }
    }

    /// Create a new expense, then recompute the user's total and raise an
    /// alert if the configured limit is exceeded.
    ///
    /// A create that returns success has durably persisted the record; the
    /// threshold check reads the persisted state afterwards and is advisory
    /// under concurrent creates for the same user.
    #[instrument(skip(self, request), fields(category = %request.category))]
    pub async fn create_expense(
        &self,
        request: CreateExpenseRequest,
    ) -> ServiceResult<CreateExpenseResponse> {
        crate::info_with_trace!("Creating new expense");

        self.validate_create_request(&request)?;

        let user_id = self.resolve_user(request.user_id.as_deref());
        let expense = Expense::new(user_id.clone(), request);
        let expense_id = expense.expense_id.clone();

        self.repository.put(expense).await?;

        // Fresh read rather than an incremental counter, so totals stay
        // honest against out-of-band writes.
        let total = self.total_for_user(&user_id).await?;
        self.check_spend_threshold(&user_id, total).await;

        crate::info_with_trace!("Expense created successfully with ID: {}", expense_id);

        Ok(CreateExpenseResponse {
            message: "Expense added successfully.".to_string(),
            id: expense_id,
            total: total.to_f64().unwrap_or(0.0),
        })
    }

    /// List a user's expenses, newest first. Records lacking a creation
    /// stamp sort last.
    #[instrument(skip(self))]
    pub async fn list_expenses(&self, user_id: Option<&str>) -> ServiceResult<Vec<Expense>> {
        crate::info_with_trace!("Listing expenses");

        let user_id = self.resolve_user(user_id);
        let mut expenses = self.repository.find_by_user(&user_id).await?;
        expenses.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        crate::info_with_trace!("Found {} expenses", expenses.len());
        Ok(expenses)
    }

    /// Apply a partial update to an expense. Only amount and description are
    /// mutable; an update carrying neither is rejected outright.
    #[instrument(skip(self, update), fields(expense_id = %expense_id))]
    pub async fn update_expense(
        &self,
        user_id: Option<&str>,
        expense_id: &str,
        update: ExpenseUpdate,
    ) -> ServiceResult<MessageResponse> {
        crate::info_with_trace!("Updating expense");

        if expense_id.is_empty() {
            return Err(ServiceError::ValidationError {
                message: "Expense ID cannot be empty".to_string(),
            });
        }

        if update.is_empty() {
            return Err(ServiceError::ValidationError {
                message: "Update must supply at least one of amount or description".to_string(),
            });
        }

        let user_id = self.resolve_user(user_id);
        match self
            .repository
            .update_fields(&user_id, expense_id, update)
            .await
        {
            Ok(()) => {
                crate::info_with_trace!("Expense updated successfully");
                Ok(MessageResponse {
                    message: "Expense updated successfully.".to_string(),
                })
            }
            Err(RepositoryError::NotFound) => Err(ServiceError::ExpenseNotFound {
                id: expense_id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an expense by id. Deleting a missing record succeeds.
    #[instrument(skip(self), fields(expense_id = %expense_id))]
    pub async fn delete_expense(
        &self,
        user_id: Option<&str>,
        expense_id: &str,
    ) -> ServiceResult<MessageResponse> {
        crate::info_with_trace!("Deleting expense");

        if expense_id.is_empty() {
            return Err(ServiceError::ValidationError {
                message: "Expense ID cannot be empty".to_string(),
            });
        }

        let user_id = self.resolve_user(user_id);
        self.repository.delete(&user_id, expense_id).await?;

        crate::info_with_trace!("Expense deleted successfully");
        Ok(MessageResponse {
            message: "Expense deleted successfully.".to_string(),
        })
    }

    /// Sum all recorded amounts for a user via a fresh range query
    async fn total_for_user(&self, user_id: &str) -> ServiceResult<Decimal> {
        let expenses = self.repository.find_by_user(user_id).await?;
        Ok(expenses.iter().map(|e| e.amount).sum())
    }

    /// Publish an alert when the total exceeds the spend limit.
    ///
    /// Every create that keeps a user over the limit re-sends the alert;
    /// there is no suppression watermark. Publish failures are logged and
    /// never fail the create that triggered them.
    async fn check_spend_threshold(&self, user_id: &str, total: Decimal) {
        if total <= self.spend_limit {
            return;
        }

        let Some(ref publisher) = self.publisher else {
            warn!(
                user_id = %user_id,
                total = %total,
                "Spend limit exceeded but no alert publisher is configured"
            );
            return;
        };

        let message = format!(
            "Expense limit exceeded!\n\nUser: {}\nTotal: {:.2}",
            user_id, total
        );

        if let Err(e) = publisher.publish(ALERT_SUBJECT, &message).await {
            warn!(
                user_id = %user_id,
                total = %total,
                error = %e,
                "Failed to publish spend alert"
            );
        } else {
            crate::info_with_trace!(
                "Spend alert published for user {} at total {}",
                user_id,
                total
            );
        }
    }

    fn validate_create_request(&self, request: &CreateExpenseRequest) -> ServiceResult<()> {
        if request.category.is_empty() {
            return Err(ServiceError::ValidationError {
                message: "Category cannot be empty".to_string(),
            });
        }
        if request.date.is_empty() {
            return Err(ServiceError::ValidationError {
                message: "Date cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MockExpenseRepository;
    use crate::services::spend_alert::MockAlertPublisher;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn expense_with(user_id: &str, amount: Decimal, age_minutes: i64) -> Expense {
        Expense {
            user_id: user_id.to_string(),
            expense_id: uuid::Uuid::new_v4().to_string(),
            amount,
            category: "misc".to_string(),
            description: String::new(),
            date: "2024-01-01".to_string(),
            created_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    fn create_request(amount: Decimal) -> CreateExpenseRequest {
        CreateExpenseRequest {
            amount,
            category: "food".to_string(),
            date: "2024-01-02".to_string(),
            description: None,
            user_id: None,
        }
    }

    fn service(
        repository: MockExpenseRepository,
        publisher: MockAlertPublisher,
    ) -> ExpenseService {
        ExpenseService::new_with_publisher(
            Arc::new(repository),
            Arc::new(publisher),
            dec!(10000),
            "default_user".to_string(),
        )
    }

    #[tokio::test]
    async fn test_create_over_limit_publishes_exactly_one_alert() {
        let mut repository = MockExpenseRepository::new();
        repository.expect_put().times(1).returning(Ok);
        repository.expect_find_by_user().times(1).returning(|uid| {
            Ok(vec![
                expense_with(uid, dec!(9500), 10),
                expense_with(uid, dec!(600), 0),
            ])
        });

        let mut publisher = MockAlertPublisher::new();
        publisher
            .expect_publish()
            .times(1)
            .withf(|subject, message| {
                subject == "Expense Tracker Alert" && message.contains("10100.00")
            })
            .returning(|_, _| Ok(()));

        let response = service(repository, publisher)
            .create_expense(create_request(dec!(600)))
            .await
            .unwrap();

        assert_eq!(response.total, 10100.0);
        assert_eq!(response.message, "Expense added successfully.");
    }

    #[tokio::test]
    async fn test_create_under_limit_publishes_nothing() {
        let mut repository = MockExpenseRepository::new();
        repository.expect_put().times(1).returning(Ok);
        repository
            .expect_find_by_user()
            .times(1)
            .returning(|uid| Ok(vec![expense_with(uid, dec!(100), 0)]));

        let mut publisher = MockAlertPublisher::new();
        publisher.expect_publish().times(0);

        let response = service(repository, publisher)
            .create_expense(create_request(dec!(100)))
            .await
            .unwrap();

        assert_eq!(response.total, 100.0);
    }

    #[tokio::test]
    async fn test_total_exactly_at_limit_publishes_nothing() {
        let mut repository = MockExpenseRepository::new();
        repository.expect_put().times(1).returning(Ok);
        repository
            .expect_find_by_user()
            .times(1)
            .returning(|uid| Ok(vec![expense_with(uid, dec!(10000), 0)]));

        let mut publisher = MockAlertPublisher::new();
        publisher.expect_publish().times(0);

        let response = service(repository, publisher)
            .create_expense(create_request(dec!(10000)))
            .await
            .unwrap();

        assert_eq!(response.total, 10000.0);
    }

    #[tokio::test]
    async fn test_publisher_failure_does_not_fail_create() {
        let mut repository = MockExpenseRepository::new();
        repository.expect_put().times(1).returning(Ok);
        repository
            .expect_find_by_user()
            .times(1)
            .returning(|uid| Ok(vec![expense_with(uid, dec!(20000), 0)]));

        let mut publisher = MockAlertPublisher::new();
        publisher
            .expect_publish()
            .times(1)
            .returning(|_, _| Err(crate::services::NotifierError::MaxRetriesExceeded));

        let result = service(repository, publisher)
            .create_expense(create_request(dec!(20000)))
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_create_with_empty_category_writes_nothing() {
        let mut repository = MockExpenseRepository::new();
        repository.expect_put().times(0);
        repository.expect_find_by_user().times(0);

        let mut publisher = MockAlertPublisher::new();
        publisher.expect_publish().times(0);

        let mut request = create_request(dec!(50));
        request.category = String::new();

        let result = service(repository, publisher).create_expense(request).await;
        assert!(matches!(
            result,
            Err(ServiceError::ValidationError { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_uses_default_user_when_none_supplied() {
        let mut repository = MockExpenseRepository::new();
        repository
            .expect_put()
            .times(1)
            .withf(|expense| expense.user_id == "default_user")
            .returning(Ok);
        repository
            .expect_find_by_user()
            .times(1)
            .returning(|uid| Ok(vec![expense_with(uid, dec!(5), 0)]));

        let publisher = MockAlertPublisher::new();
        let result = service(repository, publisher)
            .create_expense(create_request(dec!(5)))
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_create_honors_caller_supplied_user() {
        let mut repository = MockExpenseRepository::new();
        repository
            .expect_put()
            .times(1)
            .withf(|expense| expense.user_id == "alice")
            .returning(Ok);
        repository
            .expect_find_by_user()
            .times(1)
            .returning(|uid| Ok(vec![expense_with(uid, dec!(5), 0)]));

        let publisher = MockAlertPublisher::new();
        let mut request = create_request(dec!(5));
        request.user_id = Some("alice".to_string());

        let result = service(repository, publisher).create_expense(request).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_list_sorts_newest_first() {
        let mut repository = MockExpenseRepository::new();
        repository.expect_find_by_user().returning(|uid| {
            Ok(vec![
                expense_with(uid, dec!(1), 30),
                expense_with(uid, dec!(2), 0),
                expense_with(uid, dec!(3), 60),
            ])
        });

        let publisher = MockAlertPublisher::new();
        let expenses = service(repository, publisher)
            .list_expenses(None)
            .await
            .unwrap();

        assert_eq!(expenses.len(), 3);
        assert_eq!(expenses[0].amount, dec!(2));
        assert_eq!(expenses[1].amount, dec!(1));
        assert_eq!(expenses[2].amount, dec!(3));
    }

    #[tokio::test]
    async fn test_empty_update_is_rejected_without_store_access() {
        let mut repository = MockExpenseRepository::new();
        repository.expect_update_fields().times(0);

        let publisher = MockAlertPublisher::new();
        let result = service(repository, publisher)
            .update_expense(None, "some-id", ExpenseUpdate::default())
            .await;

        assert!(matches!(
            result,
            Err(ServiceError::ValidationError { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_missing_record_maps_to_not_found() {
        let mut repository = MockExpenseRepository::new();
        repository
            .expect_update_fields()
            .times(1)
            .returning(|_, _, _| Err(RepositoryError::NotFound));

        let publisher = MockAlertPublisher::new();
        let result = service(repository, publisher)
            .update_expense(
                None,
                "missing-id",
                ExpenseUpdate {
                    amount: Some(dec!(10)),
                    description: None,
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(ServiceError::ExpenseNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let mut repository = MockExpenseRepository::new();
        repository
            .expect_delete()
            .times(2)
            .returning(|_, _| Ok(()));

        let publisher = MockAlertPublisher::new();
        let service = service(repository, publisher);

        assert!(service.delete_expense(None, "gone-id").await.is_ok());
        assert!(service.delete_expense(None, "gone-id").await.is_ok());
    }
}
