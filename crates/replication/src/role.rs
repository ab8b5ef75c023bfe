//! Network roles.

use std::fmt;

/// What the local participant is to one vehicle. Fixed for the vehicle's
/// lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetRole {
    /// Ground truth for the vehicle. `locally_controlled` when the host
    /// itself drives it (listen server or AI) instead of a remote client.
    Authority { locally_controlled: bool },
    /// Remote client that steers the vehicle and predicts locally.
    Controller,
    /// Remote client that only renders the vehicle from snapshots.
    Observer,
}

impl NetRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authority { .. } => "Authority",
            Self::Controller => "Controller",
            Self::Observer => "Observer",
        }
    }

    pub fn is_authority(&self) -> bool {
        matches!(self, Self::Authority { .. })
    }
}

impl fmt::Display for NetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
