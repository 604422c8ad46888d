use async_trait::async_trait;
use axum::{middleware, routing::get, Router};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};

use expense_tracker_rs::handlers::{
    cors_middleware, create_expense_router, health_check, method_not_allowed_middleware,
};
use expense_tracker_rs::models::{Expense, ExpenseUpdate, RepositoryError, RepositoryResult};
use expense_tracker_rs::repositories::ExpenseRepository;
use expense_tracker_rs::services::{AlertPublisher, ExpenseService, NotifierError};

/// In-memory expense store for driving the full router without DynamoDB
#[derive(Default)]
pub struct InMemoryExpenseRepository {
    items: Mutex<Vec<Expense>>,
}

impl InMemoryExpenseRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExpenseRepository for InMemoryExpenseRepository {
    async fn put(&self, expense: Expense) -> RepositoryResult<Expense> {
        let mut items = self.items.lock().unwrap();
        items.retain(|e| {
            !(e.user_id == expense.user_id && e.expense_id == expense.expense_id)
        });
        items.push(expense.clone());
        Ok(expense)
    }

    async fn find_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Expense>> {
        let items = self.items.lock().unwrap();
        Ok(items
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_fields(
        &self,
        user_id: &str,
        expense_id: &str,
        update: ExpenseUpdate,
    ) -> RepositoryResult<()> {
        let mut items = self.items.lock().unwrap();
        let expense = items
            .iter_mut()
            .find(|e| e.user_id == user_id && e.expense_id == expense_id)
            .ok_or(RepositoryError::NotFound)?;
        expense.apply(&update);
        Ok(())
    }

    async fn delete(&self, user_id: &str, expense_id: &str) -> RepositoryResult<()> {
        let mut items = self.items.lock().unwrap();
        items.retain(|e| !(e.user_id == user_id && e.expense_id == expense_id));
        Ok(())
    }
}

/// Alert publisher that records every publish for later assertions
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertPublisher for RecordingPublisher {
    async fn publish(&self, subject: &str, message: &str) -> Result<(), NotifierError> {
        if self.fail {
            return Err(NotifierError::MaxRetriesExceeded);
        }
        self.published
            .lock()
            .unwrap()
            .push((subject.to_string(), message.to_string()));
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub publisher: Arc<RecordingPublisher>,
}

/// Build the full application router over the in-memory fakes
pub fn build_test_app(spend_limit: Decimal, publisher: Arc<RecordingPublisher>) -> TestApp {
    let repository = Arc::new(InMemoryExpenseRepository::new());
    let service = Arc::new(ExpenseService::new_with_publisher(
        repository,
        publisher.clone() as Arc<dyn AlertPublisher>,
        spend_limit,
        "default_user".to_string(),
    ));

    let router = Router::new()
        .route("/health/status", get(health_check))
        .merge(create_expense_router(service))
        .layer(middleware::from_fn(cors_middleware))
        .layer(middleware::from_fn(method_not_allowed_middleware));

    TestApp { router, publisher }
}
