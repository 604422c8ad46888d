pub mod expenses;
pub mod health;
pub mod metrics;
pub mod middleware;

pub use expenses::*;
pub use health::*;
pub use metrics::*;
pub use middleware::*;
