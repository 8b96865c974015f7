// Checkout core
pub mod checkout;
pub mod inventory;
pub mod orders;
pub mod pricing;

// Collaborators
pub mod audit;
pub mod catalog;
