// ABOUTME: Platform-agnostic safe dispatch core for messaging sessions
// ABOUTME: Provides recipient loading, eligibility checks, the paced send loop and lifecycle gating

pub mod config;
pub mod content;
pub mod dispatch;
pub mod eligibility;
pub mod error;
pub mod lifecycle;
pub mod pacing;
pub mod paths;
pub mod recipients;
pub mod testing;
pub mod traits;

pub use content::{ContentLoader, MessageContent};
pub use dispatch::{
    classify_send_error, DispatchOutcome, Dispatcher, RecipientOutcome, RunSummary, SafeSender,
    SendFailure,
};
pub use eligibility::{EligibilityChecker, SweepReport};
pub use error::{LoadError, RunError};
pub use lifecycle::{LifecycleAction, LifecycleDriver, SessionLifecycle, SessionStatus};
pub use pacing::Pacing;
pub use recipients::{ChatId, RecipientStore};
pub use traits::{ConnectionState, MessagingClient, NumberStatus, StateStream};
