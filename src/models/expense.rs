use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single recorded spending entry owned by a user.
///
/// `(user_id, expense_id)` is the table key; `expense_id` and `created_at`
/// are minted once at creation and never overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub user_id: String,
    pub expense_id: String,
    pub amount: Decimal,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub date: String,
    pub created_at: DateTime<Utc>,
}

/// Request body for creating a new expense.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExpenseRequest {
    pub amount: Decimal,
    pub category: String,
    pub date: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Caller-supplied owner; falls back to the configured single-tenant
    /// default when absent.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// The set of field changes a partial update may carry.
///
/// Only `amount` and `description` are mutable; an update carrying neither is
/// rejected before any store instruction is built.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseUpdate {
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Response body for a successful create, echoing the new id and the
/// recomputed running total as a display value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExpenseResponse {
    pub message: String,
    pub id: String,
    pub total: f64,
}

/// Acknowledgement-only response for update and delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl Expense {
    /// Create a new Expense with a generated id and creation timestamp.
    pub fn new(user_id: String, request: CreateExpenseRequest) -> Self {
        Self {
            user_id,
            expense_id: Uuid::new_v4().to_string(),
            amount: request.amount,
            category: request.category,
            description: request.description.unwrap_or_default(),
            date: request.date,
            created_at: Utc::now(),
        }
    }

    /// Apply a partial update in place. Immutable fields are untouched.
    pub fn apply(&mut self, update: &ExpenseUpdate) {
        if let Some(amount) = update.amount {
            self.amount = amount;
        }
        if let Some(ref description) = update.description {
            self.description = description.clone();
        }
    }
}

impl ExpenseUpdate {
    /// True when the update carries no field changes at all.
    pub fn is_empty(&self) -> bool {
        self.amount.is_none() && self.description.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn create_request() -> CreateExpenseRequest {
        CreateExpenseRequest {
            amount: dec!(42.50),
            category: "groceries".to_string(),
            date: "2024-01-15".to_string(),
            description: Some("weekly shop".to_string()),
            user_id: None,
        }
    }

    #[test]
    fn test_new_expense_mints_id_and_timestamp() {
        let expense = Expense::new("user-1".to_string(), create_request());

        assert_eq!(expense.user_id, "user-1");
        assert_eq!(expense.amount, dec!(42.50));
        assert_eq!(expense.category, "groceries");
        assert_eq!(expense.description, "weekly shop");
        // Generated id is a well-formed UUID
        assert!(Uuid::parse_str(&expense.expense_id).is_ok());
    }

    #[test]
    fn test_new_expense_ids_are_unique() {
        let a = Expense::new("user-1".to_string(), create_request());
        let b = Expense::new("user-1".to_string(), create_request());
        assert_ne!(a.expense_id, b.expense_id);
    }

    #[test]
    fn test_missing_description_defaults_to_empty() {
        let mut request = create_request();
        request.description = None;
        let expense = Expense::new("user-1".to_string(), request);
        assert_eq!(expense.description, "");
    }

    #[test]
    fn test_apply_touches_only_supplied_fields() {
        let mut expense = Expense::new("user-1".to_string(), create_request());
        let original_id = expense.expense_id.clone();
        let original_created_at = expense.created_at;

        expense.apply(&ExpenseUpdate {
            amount: Some(dec!(99.99)),
            description: None,
        });

        assert_eq!(expense.amount, dec!(99.99));
        assert_eq!(expense.description, "weekly shop");
        assert_eq!(expense.category, "groceries");
        assert_eq!(expense.date, "2024-01-15");
        assert_eq!(expense.expense_id, original_id);
        assert_eq!(expense.created_at, original_created_at);
    }

    #[test]
    fn test_update_is_empty() {
        assert!(ExpenseUpdate::default().is_empty());
        assert!(!ExpenseUpdate {
            amount: Some(dec!(1)),
            description: None
        }
        .is_empty());
        assert!(!ExpenseUpdate {
            amount: None,
            description: Some("x".to_string())
        }
        .is_empty());
    }

    #[test]
    fn test_amount_serializes_losslessly() {
        let mut expense = Expense::new("user-1".to_string(), create_request());
        expense.amount = dec!(0.1);

        let json = serde_json::to_value(&expense).unwrap();
        // Decimals are rendered as strings, never binary floats
        assert_eq!(json["amount"], serde_json::json!("0.1"));

        let back: Expense = serde_json::from_value(json).unwrap();
        assert_eq!(back.amount, dec!(0.1));
    }

    #[test]
    fn test_wire_field_names_are_camel_case() {
        let expense = Expense::new("user-1".to_string(), create_request());
        let json = serde_json::to_value(&expense).unwrap();

        assert!(json.get("userId").is_some());
        assert!(json.get("expenseId").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("user_id").is_none());
    }
}
