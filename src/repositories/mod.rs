// Repositories module - data access layer

pub mod expense_repository;

pub use expense_repository::{DynamoDbExpenseRepository, ExpenseRepository};

#[cfg(test)]
pub use expense_repository::MockExpenseRepository;
