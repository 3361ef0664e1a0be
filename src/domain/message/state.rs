//! Lifecycle of one delivered message.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;

/// Where a delivered message is in its processing.
///
/// ```text
/// Polled -> Validating -> Processing -> Committed
///                |             |
///                +--> Reported <+
/// ```
///
/// Only `Committed` messages have been removed from the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageState {
    Polled,
    Validating,
    Processing,
    Committed,
    Reported,
}

impl StateMachine for MessageState {
    fn valid_transitions(&self) -> &'static [Self] {
        use MessageState::*;
        match self {
            Polled => &[Validating],
            Validating => &[Processing, Reported],
            Processing => &[Committed, Reported],
            Committed | Reported => &[],
        }
    }
}

impl fmt::Display for MessageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageState::Polled => "polled",
            MessageState::Validating => "validating",
            MessageState::Processing => "processing",
            MessageState::Committed => "committed",
            MessageState::Reported => "reported",
        };
        f.write_str(s)
    }
}
