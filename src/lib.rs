pub mod api;
pub mod assistant;
pub mod config;
pub mod decoder;
pub mod domain;
pub mod engine;
pub mod error;
pub mod events;
pub mod logger;
pub mod notifier;
pub mod split;
pub mod transcript;
pub mod wallet;

#[cfg(test)]
mod testing;

pub use api::{ActionBackend, ApiClient};
pub use domain::{ActionKind, ActionOutcome, ActionRequest, Currency, Session};
pub use engine::ActionEngine;
pub use error::{ActionError, ErrorCategory};
pub use split::{SplitExecutor, SplitPlan};
