use super::events::{keywords, SubscriberCommand};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suspendable subscriber states. There is no terminal state; a process starts `Enabled`
/// unless configured otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberState {
    /// Messages are interpreted and recorded
    #[default]
    Enabled,
    /// Only resume commands are admitted
    Suspended,
}

impl SubscriberState {
    pub fn from_suspended(suspended: bool) -> Self {
        if suspended {
            Self::Suspended
        } else {
            Self::Enabled
        }
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended)
    }

    /// Gate check: a suspended subscriber only admits paths containing `"resume"`
    pub fn admits(&self, path: &str) -> bool {
        match self {
            Self::Enabled => true,
            Self::Suspended => path.contains(keywords::RESUME),
        }
    }

    /// State a command drives the flag to, if it touches the flag at all
    pub fn target_of(command: SubscriberCommand) -> Option<Self> {
        match command {
            SubscriberCommand::Suspend => Some(Self::Suspended),
            SubscriberCommand::Resume => Some(Self::Enabled),
            _ => None,
        }
    }
}

impl fmt::Display for SubscriberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => write!(f, "enabled"),
            Self::Suspended => write!(f, "suspended"),
        }
    }
}

impl std::str::FromStr for SubscriberState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enabled" => Ok(Self::Enabled),
            "suspended" => Ok(Self::Suspended),
            _ => Err(format!("Invalid subscriber state: {s}")),
        }
    }
}
