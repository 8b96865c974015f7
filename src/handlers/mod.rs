pub mod audit_logs;
pub mod checkout;
pub mod common;
pub mod inventory;
pub mod orders;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;
