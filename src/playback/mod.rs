//! Playback session state and the coordinator that drives it.

pub mod coordinator;
pub mod session;

pub use coordinator::{CtaOverrides, Moment, Outcome, PlaybackCoordinator, PlaybackEffect, Transition};
pub use session::{Phase, PlaybackSession, SuppressReason, SuppressionWindow};
