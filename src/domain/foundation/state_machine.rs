//! State machine trait for lifecycle enums.
//!
//! Gives every lifecycle enum (currently the inbound message lifecycle) the
//! same checked transition API.

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// Implementors list their legal transitions; `transition_to` and
/// `is_terminal` are derived from that list.
///
/// # Example
///
/// ```ignore
/// let state = MessageState::Polled.transition_to(MessageState::Validating)?;
/// assert!(!state.is_terminal());
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug + 'static {
    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> &'static [Self];

    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_transition(self, target))
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Switch {
        Off,
        On,
        Broken,
    }

    impl StateMachine for Switch {
        fn valid_transitions(&self) -> &'static [Self] {
            match self {
                Switch::Off => &[Switch::On, Switch::Broken],
                Switch::On => &[Switch::Off, Switch::Broken],
                Switch::Broken => &[],
            }
        }
    }

    #[test]
    fn listed_transition_is_allowed() {
        assert_eq!(Switch::Off.transition_to(Switch::On), Ok(Switch::On));
    }

    #[test]
    fn unlisted_transition_is_rejected() {
        let err = Switch::Broken.transition_to(Switch::On).unwrap_err();
        assert_eq!(err.to_string(), "Cannot transition from Broken to On");
    }

    #[test]
    fn state_without_transitions_is_terminal() {
        assert!(Switch::Broken.is_terminal());
        assert!(!Switch::On.is_terminal());
    }
}
