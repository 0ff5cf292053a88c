//! Publish pipeline: retry policies and the per-message orchestrator.

pub mod pusher;
pub mod retry;

pub use pusher::{PushOutcome, Pusher, PusherPolicies};
pub use retry::RetryPolicy;
