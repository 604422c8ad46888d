// Re-export all model types
pub use self::errors::*;
pub use self::expense::*;

mod errors;
mod expense;
