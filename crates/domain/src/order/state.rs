//! Order status state machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::OrderError;

/// The status of an order in its lifecycle.
///
/// Status transitions only move forward:
/// ```text
/// Prepare ──► Ongoing ──► Done
///    │                     ▲
///    └─────────────────────┘
/// ```
/// `Done` is terminal: reaching it archives the order into history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order received, kitchen preparing.
    #[default]
    #[serde(alias = "pending")]
    Prepare,

    /// Order is on its way / being served.
    Ongoing,

    /// Order finished (terminal state).
    #[serde(alias = "completed")]
    Done,
}

impl OrderStatus {
    fn rank(&self) -> u8 {
        match self {
            OrderStatus::Prepare => 0,
            OrderStatus::Ongoing => 1,
            OrderStatus::Done => 2,
        }
    }

    /// Returns true if this is the terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Done)
    }

    /// Returns true if an order in this status may be set to `next`.
    ///
    /// Re-setting the current status is allowed (and a no-op); moving
    /// backwards is not. Completing is always allowed.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        next.is_terminal() || next.rank() >= self.rank()
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Prepare => "prepare",
            OrderStatus::Ongoing => "ongoing",
            OrderStatus::Done => "done",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prepare" | "pending" => Ok(OrderStatus::Prepare),
            "ongoing" => Ok(OrderStatus::Ongoing),
            "done" | "completed" => Ok(OrderStatus::Done),
            _ => Err(OrderError::InvalidStatus(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_prepare() {
        assert_eq!(OrderStatus::default(), OrderStatus::Prepare);
    }

    #[test]
    fn test_parse_accepts_aliases() {
        assert_eq!("pending".parse::<OrderStatus>().unwrap(), OrderStatus::Prepare);
        assert_eq!("Ongoing".parse::<OrderStatus>().unwrap(), OrderStatus::Ongoing);
        assert_eq!(" completed ".parse::<OrderStatus>().unwrap(), OrderStatus::Done);
    }

    #[test]
    fn test_parse_rejects_unknown_status() {
        let err = "banana".parse::<OrderStatus>().unwrap_err();
        assert!(matches!(err, OrderError::InvalidStatus(s) if s == "banana"));
    }

    #[test]
    fn test_transitions_only_move_forward() {
        use OrderStatus::*;
        assert!(Prepare.can_transition_to(Ongoing));
        assert!(Prepare.can_transition_to(Done));
        assert!(Ongoing.can_transition_to(Done));
        assert!(Ongoing.can_transition_to(Ongoing));
        assert!(!Ongoing.can_transition_to(Prepare));
        assert!(!Done.can_transition_to(Ongoing));
    }

    #[test]
    fn test_terminal_state() {
        assert!(!OrderStatus::Prepare.is_terminal());
        assert!(!OrderStatus::Ongoing.is_terminal());
        assert!(OrderStatus::Done.is_terminal());
    }

    #[test]
    fn test_serialization_uses_lowercase_names() {
        let json = serde_json::to_string(&OrderStatus::Ongoing).unwrap();
        assert_eq!(json, "\"ongoing\"");
        let legacy: OrderStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(legacy, OrderStatus::Prepare);
    }
}
