// State machine module for the suspendable subscriber
//
// Two states (enabled, suspended) driven by commands embedded in message paths, with the
// current state held behind the `SuspendFlag` trait.

pub mod events;
pub mod states;
pub mod suspend_flag;

// Re-export main types for convenient access
pub use events::SubscriberCommand;
pub use states::SubscriberState;
pub use suspend_flag::{LocalSuspendFlag, StoredSuspendFlag, SuspendFlag, SuspendRecord};
