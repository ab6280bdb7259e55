//! Persistence layer.
//!
//! [`CredentialStore`] is the contract the session and entitlement logic
//! depends on; [`DbOperations`] backs it with PostgreSQL and
//! [`InMemoryStore`] with process memory.

pub mod memory;
pub mod models;
pub mod operations;
pub mod store;

pub use memory::InMemoryStore;
pub use models::{PlanType, Subscription, SubscriptionFields, SubscriptionStatus, User, UserSession};
pub use operations::DbOperations;
pub use store::CredentialStore;
