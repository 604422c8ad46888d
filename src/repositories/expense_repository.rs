use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::{Client as DynamoDbClient, Error as DynamoDbError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument, warn, Instrument};

use crate::models::{Expense, ExpenseUpdate, RepositoryError, RepositoryResult};

/// Trait defining the interface for expense data access operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExpenseRepository: Send + Sync {
    /// Persist an expense as a single point-write (last-writer-wins)
    async fn put(&self, expense: Expense) -> RepositoryResult<Expense>;

    /// Find all expenses for a user
    async fn find_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Expense>>;

    /// Apply a partial update to an existing expense; fails with
    /// `RepositoryError::NotFound` when the record does not exist
    async fn update_fields(
        &self,
        user_id: &str,
        expense_id: &str,
        update: ExpenseUpdate,
    ) -> RepositoryResult<()>;

    /// Delete an expense by key; deleting a missing record is not an error
    async fn delete(&self, user_id: &str, expense_id: &str) -> RepositoryResult<()>;
}

/// DynamoDB implementation of the ExpenseRepository trait.
///
/// The table is keyed by partition key `userId` and sort key `expenseId`.
pub struct DynamoDbExpenseRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    region: String,
}

impl DynamoDbExpenseRepository {
    /// Create a new DynamoDB expense repository
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            table_name,
            region,
        }
    }

    /// Create a DynamoDB subsegment span with X-Ray attributes
    fn create_dynamodb_span(&self, operation: &str) -> tracing::Span {
        tracing::info_span!(
            "DynamoDB",
            "aws.service" = "DynamoDB",
            "aws.operation" = operation,
            "aws.region" = %self.region,
            "aws.dynamodb.table_name" = %self.table_name,
            "aws.remote.service" = "AWS::DynamoDB",
            "aws.remote.resource.type" = "AWS::DynamoDB::Table",
            "aws.remote.resource.identifier" = %self.table_name,
            "otel.kind" = "client",
            "otel.name" = format!("DynamoDB.{}", operation),
            "rpc.system" = "aws-api",
            "rpc.service" = "AmazonDynamoDBv2",
            "rpc.method" = operation,
            "db.system" = "dynamodb",
            "db.name" = %self.table_name,
            "db.operation" = operation,
        )
    }

    /// Get the table name (for testing)
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Convert an Expense struct to DynamoDB attribute values.
    ///
    /// Amounts are written as the native number type so the stored value is the
    /// exact decimal, never a binary float.
    pub fn expense_to_item(&self, expense: &Expense) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();

        item.insert(
            "userId".to_string(),
            AttributeValue::S(expense.user_id.clone()),
        );
        item.insert(
            "expenseId".to_string(),
            AttributeValue::S(expense.expense_id.clone()),
        );
        item.insert(
            "amount".to_string(),
            AttributeValue::N(expense.amount.to_string()),
        );
        item.insert(
            "category".to_string(),
            AttributeValue::S(expense.category.clone()),
        );
        item.insert(
            "description".to_string(),
            AttributeValue::S(expense.description.clone()),
        );
        item.insert("date".to_string(), AttributeValue::S(expense.date.clone()));
        item.insert(
            "createdAt".to_string(),
            AttributeValue::S(expense.created_at.to_rfc3339()),
        );

        item
    }

    /// Convert a DynamoDB item to an Expense struct
    pub fn item_to_expense(
        &self,
        item: HashMap<String, AttributeValue>,
    ) -> RepositoryResult<Expense> {
        let user_id = item
            .get("userId")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidItem {
                message: "Missing userId".to_string(),
            })?
            .clone();

        let expense_id = item
            .get("expenseId")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidItem {
                message: "Missing expenseId".to_string(),
            })?
            .clone();

        let amount = item
            .get("amount")
            .and_then(|v| v.as_n().ok())
            .and_then(|s| Decimal::from_str(s).ok())
            .ok_or_else(|| RepositoryError::InvalidItem {
                message: "Invalid amount".to_string(),
            })?;

        let category = item
            .get("category")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidItem {
                message: "Missing category".to_string(),
            })?
            .clone();

        let description = item
            .get("description")
            .and_then(|v| v.as_s().ok())
            .cloned()
            .unwrap_or_default();

        let date = item
            .get("date")
            .and_then(|v| v.as_s().ok())
            .cloned()
            .unwrap_or_default();

        // Records written out of band may lack createdAt; the oldest possible
        // stamp makes them sort last under newest-first ordering.
        let created_at = item
            .get("createdAt")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        Ok(Expense {
            user_id,
            expense_id,
            amount,
            category,
            description,
            date,
            created_at,
        })
    }

    /// Build a partial UpdateExpression touching only the supplied fields.
    ///
    /// Callers must reject an empty update before reaching this; the returned
    /// expression would otherwise be malformed.
    pub(crate) fn build_update_expression(
        update: &ExpenseUpdate,
    ) -> (
        String,
        HashMap<String, AttributeValue>,
        HashMap<String, String>,
    ) {
        let mut clauses = Vec::new();
        let mut values = HashMap::new();
        let mut names = HashMap::new();

        if let Some(amount) = update.amount {
            clauses.push("#a = :amount".to_string());
            values.insert(":amount".to_string(), AttributeValue::N(amount.to_string()));
            names.insert("#a".to_string(), "amount".to_string());
        }
        if let Some(ref description) = update.description {
            clauses.push("#d = :desc".to_string());
            values.insert(":desc".to_string(), AttributeValue::S(description.clone()));
            names.insert("#d".to_string(), "description".to_string());
        }

        (format!("SET {}", clauses.join(", ")), values, names)
    }

    /// Convert DynamoDB error to RepositoryError
    fn map_dynamodb_error(&self, error: DynamoDbError) -> RepositoryError {
        error!("DynamoDB error: {:?}", error);

        match error {
            DynamoDbError::ResourceNotFoundException(_) => RepositoryError::TableNotFound {
                table_name: self.table_name.clone(),
            },
            DynamoDbError::ConditionalCheckFailedException(_) => RepositoryError::NotFound,
            DynamoDbError::ProvisionedThroughputExceededException(_)
            | DynamoDbError::RequestLimitExceeded(_) => RepositoryError::RateLimitExceeded,
            _ => RepositoryError::AwsSdk {
                message: error.to_string(),
            },
        }
    }
}

#[async_trait]
impl ExpenseRepository for DynamoDbExpenseRepository {
    #[instrument(skip(self, expense), fields(table = %self.table_name, expense_id = %expense.expense_id))]
    async fn put(&self, expense: Expense) -> RepositoryResult<Expense> {
        info!("Writing expense");

        let item = self.expense_to_item(&expense);
        let put_span = self.create_dynamodb_span("PutItem");

        async {
            self.client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item))
                .send()
                .await
                .map_err(|e| self.map_dynamodb_error(e.into()))
        }
        .instrument(put_span)
        .await?;

        info!("Expense written successfully");
        Ok(expense)
    }

    #[instrument(skip(self), fields(table = %self.table_name, user_id = %user_id))]
    async fn find_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Expense>> {
        info!("Querying expenses for user");

        let query_span = self.create_dynamodb_span("Query");

        // Single-page read: result size is bounded by the store's page limit,
        // which is documented as an accepted constraint for this service.
        let response = async {
            self.client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("userId = :uid")
                .expression_attribute_values(":uid", AttributeValue::S(user_id.to_string()))
                .send()
                .await
                .map_err(|e| self.map_dynamodb_error(e.into()))
        }
        .instrument(query_span)
        .await?;

        let mut expenses = Vec::new();
        if let Some(items) = response.items {
            for item in items {
                match self.item_to_expense(item) {
                    Ok(expense) => expenses.push(expense),
                    Err(e) => {
                        warn!("Failed to parse expense item: {}", e);
                        continue;
                    }
                }
            }
        }

        info!("Found {} expenses", expenses.len());
        Ok(expenses)
    }

    #[instrument(skip(self, update), fields(table = %self.table_name, user_id = %user_id, expense_id = %expense_id))]
    async fn update_fields(
        &self,
        user_id: &str,
        expense_id: &str,
        update: ExpenseUpdate,
    ) -> RepositoryResult<()> {
        info!("Updating expense fields");

        let (expression, values, names) = Self::build_update_expression(&update);
        let update_span = self.create_dynamodb_span("UpdateItem");

        async {
            self.client
                .update_item()
                .table_name(&self.table_name)
                .key("userId", AttributeValue::S(user_id.to_string()))
                .key("expenseId", AttributeValue::S(expense_id.to_string()))
                .update_expression(expression)
                .set_expression_attribute_values(Some(values))
                .set_expression_attribute_names(Some(names))
                .condition_expression("attribute_exists(userId)")
                .send()
                .await
                .map_err(|e| self.map_dynamodb_error(e.into()))
        }
        .instrument(update_span)
        .await?;

        info!("Expense updated successfully");
        Ok(())
    }

    #[instrument(skip(self), fields(table = %self.table_name, user_id = %user_id, expense_id = %expense_id))]
    async fn delete(&self, user_id: &str, expense_id: &str) -> RepositoryResult<()> {
        info!("Deleting expense");

        let delete_span = self.create_dynamodb_span("DeleteItem");

        async {
            self.client
                .delete_item()
                .table_name(&self.table_name)
                .key("userId", AttributeValue::S(user_id.to_string()))
                .key("expenseId", AttributeValue::S(expense_id.to_string()))
                .send()
                .await
                .map_err(|e| self.map_dynamodb_error(e.into()))?;

            info!("Expense deleted successfully");
            Ok(())
        }
        .instrument(delete_span)
        .await
    }
}
