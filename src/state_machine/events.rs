use serde::{Deserialize, Serialize};

/// Command keywords recognised in a message `Path`, in priority order
pub mod keywords {
    pub const SUSPEND: &str = "suspend";
    pub const RESUME: &str = "resume";
    pub const SLEEP: &str = "sleep";
    pub const ERROR: &str = "error";
    pub const PANIC: &str = "panic";
}

/// Commands embedded in a message path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberCommand {
    /// Suspend the subscriber
    Suspend,
    /// Resume a suspended subscriber
    Resume,
    /// Block the invocation for the configured delay
    Sleep,
    /// Fail the invocation with a command error
    Error,
    /// Fail the invocation with a fatal fault
    Panic,
    /// No command; record the reception
    Ok,
}

impl SubscriberCommand {
    /// Interpret `path` by case-sensitive substring containment. The first keyword found in
    /// priority order wins, so `/admin/suspend/resume` is a suspend.
    pub fn parse(path: &str) -> Self {
        if path.contains(keywords::SUSPEND) {
            Self::Suspend
        } else if path.contains(keywords::RESUME) {
            Self::Resume
        } else if path.contains(keywords::SLEEP) {
            Self::Sleep
        } else if path.contains(keywords::ERROR) {
            Self::Error
        } else if path.contains(keywords::PANIC) {
            Self::Panic
        } else {
            Self::Ok
        }
    }

    /// Get a string representation of the command for logging
    pub fn command_type(&self) -> &'static str {
        match self {
            Self::Suspend => "suspend",
            Self::Resume => "resume",
            Self::Sleep => "sleep",
            Self::Error => "error",
            Self::Panic => "panic",
            Self::Ok => "ok",
        }
    }
}
