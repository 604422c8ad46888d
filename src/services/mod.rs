// Services module - business logic layer

pub mod expense_service;
pub mod spend_alert;

pub use expense_service::ExpenseService;
pub use spend_alert::{AlertPublisher, NotifierError, SnsAlertPublisher};
