//! User account management.

pub mod coordinator;

pub use coordinator::UserLifecycleCoordinator;
