//! Lifecycle states of a subscription

use std::fmt;

/// Where a [`MobiusSubscription`](crate::MobiusSubscription) is in its lifecycle.
///
/// ```text
/// Unregistered --start--> Registering --201--> Active --stop--> Deregistering --> Stopped
///                              |
///                              +--failure--> Stopped
/// ```
///
/// There is no way back from `Stopped`; a new instance is needed to subscribe again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionState {
    Unregistered,
    Registering,
    Active,
    Deregistering,
    Stopped,
}

impl SubscriptionState {
    /// True while a subscription resource may exist on the platform
    pub fn holds_resource(self) -> bool {
        matches!(
            self,
            SubscriptionState::Registering
                | SubscriptionState::Active
                | SubscriptionState::Deregistering
        )
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubscriptionState::Unregistered => "unregistered",
            SubscriptionState::Registering => "registering",
            SubscriptionState::Active => "active",
            SubscriptionState::Deregistering => "deregistering",
            SubscriptionState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holds_resource() {
        assert!(!SubscriptionState::Unregistered.holds_resource());
        assert!(SubscriptionState::Active.holds_resource());
        assert!(!SubscriptionState::Stopped.holds_resource());
    }

    #[test]
    fn test_display() {
        assert_eq!(SubscriptionState::Deregistering.to_string(), "deregistering");
    }
}
