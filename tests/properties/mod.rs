//! Property tests over the data model and the path command interpreter

use chrono::{TimeZone, Utc};
use event_core::models::{Message, Reception};
use event_core::state_machine::{SubscriberCommand, SubscriberState};
use proptest::prelude::*;

fn field() -> impl Strategy<Value = String> {
    "[ -~]{0,40}"
}

proptest! {
    /// Property: decoding an encoded message reproduces every field
    #[test]
    fn message_round_trips(sent in field(), path in field(), client in field()) {
        let message = Message { sent, path, client };
        let decoded = Message::from_json(&message.to_json().unwrap()).unwrap();
        prop_assert_eq!(decoded, message);
    }

    /// Property: the same holds for receptions, including the derived key
    #[test]
    fn reception_round_trips(
        sent in field(),
        path in field(),
        client in field(),
        subscriber in "[a-z0-9]{1,12}",
        seconds in 0i64..4_000_000_000,
    ) {
        let received = Utc.timestamp_opt(seconds, 0).unwrap();
        let message = Message { sent, path, client };
        let reception = Reception::received_at(&subscriber, message, received);

        let json = serde_json::to_string(&reception).unwrap();
        let decoded: Reception = serde_json::from_str(&json).unwrap();

        prop_assert_eq!(&decoded.pk, &format!("{}/{}", reception.message.sent, subscriber));
        prop_assert_eq!(decoded, reception);
    }

    /// Property: "suspend" anywhere in a path wins over every other keyword
    #[test]
    fn suspend_has_priority(prefix in "[a-z/]{0,10}", suffix in "[a-z/]{0,10}") {
        let path = format!("{prefix}suspend{suffix}");
        prop_assert_eq!(SubscriberCommand::parse(&path), SubscriberCommand::Suspend);
    }

    /// Property: a suspended subscriber admits exactly the paths containing "resume"
    #[test]
    fn suspended_gate_admits_only_resume(path in "[a-z/]{0,30}") {
        prop_assert_eq!(
            SubscriberState::Suspended.admits(&path),
            path.contains("resume")
        );
        prop_assert!(SubscriberState::Enabled.admits(&path));
    }

    /// Property: paths without any keyword are plain "ok" commands
    #[test]
    fn keyword_free_paths_are_ok(path in "[0-9/._-]{0,30}") {
        prop_assert_eq!(SubscriberCommand::parse(&path), SubscriberCommand::Ok);
    }
}
