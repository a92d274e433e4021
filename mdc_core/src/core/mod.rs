pub mod context;
pub mod errors;
pub mod manager;
pub mod notifier;
pub mod session;
