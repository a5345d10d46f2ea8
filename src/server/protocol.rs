//! Wire events exchanged with connected clients.
//!
//! Every event is a JSON object `{"event": "<name>", "data": {...}}`; events
//! without a payload omit `data`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game::PlayerProfile;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    Register {
        account_key: String,
        display_name: String,
    },
    /// Public chat line.
    Message { text: String },
    RobBank,
    Travel { destination: String },
    PrivateMessage {
        to: String,
        msg: String,
        #[serde(default)]
        id: Option<String>,
    },
    /// Moderator text to everyone. Privilege checks are not done here.
    Announcement { text: String },
    RegisterPushToken { token: String },
    MarkRead { ids: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    Init {
        profile: PlayerProfile,
        locations: Vec<String>,
        travel_costs: BTreeMap<String, u64>,
    },
    UpdateStats { profile: PlayerProfile },
    Message { text: String },
    OnlinePlayers { players: Vec<String> },
    /// Wall-clock time as `HH:MM`.
    Time { time: String },
    #[serde(rename_all = "camelCase")]
    PrivateMessage {
        from: String,
        msg: String,
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_from_me: Option<bool>,
    },
    Announcement {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

impl ServerEvent {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Init { .. } => "init",
            ServerEvent::UpdateStats { .. } => "update-stats",
            ServerEvent::Message { .. } => "message",
            ServerEvent::OnlinePlayers { .. } => "online-players",
            ServerEvent::Time { .. } => "time",
            ServerEvent::PrivateMessage { .. } => "private-message",
            ServerEvent::Announcement { .. } => "announcement",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_client_events() {
        let ev: ClientEvent = serde_json::from_str(
            r#"{"event":"register","data":{"accountKey":"k1","displayName":"Alice"}}"#,
        )
        .unwrap();
        assert_eq!(
            ev,
            ClientEvent::Register {
                account_key: "k1".into(),
                display_name: "Alice".into()
            }
        );

        let ev: ClientEvent = serde_json::from_str(r#"{"event":"rob-bank"}"#).unwrap();
        assert_eq!(ev, ClientEvent::RobBank);

        let ev: ClientEvent = serde_json::from_str(
            r#"{"event":"private-message","data":{"to":"Carol","msg":"hi"}}"#,
        )
        .unwrap();
        assert_eq!(
            ev,
            ClientEvent::PrivateMessage {
                to: "Carol".into(),
                msg: "hi".into(),
                id: None
            }
        );
    }

    #[test]
    fn unknown_event_is_an_error() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"fly"}"#).is_err());
    }

    #[test]
    fn private_message_omits_empty_fields() {
        let ev = ServerEvent::PrivateMessage {
            from: "Bob".into(),
            msg: "hi".into(),
            id: "m1".into(),
            to: None,
            is_from_me: None,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "private-message");
        assert!(json["data"].get("isFromMe").is_none());

        let echo = ServerEvent::PrivateMessage {
            from: "Bob".into(),
            msg: "hi".into(),
            id: "m1".into(),
            to: Some("Carol".into()),
            is_from_me: Some(true),
        };
        let json = serde_json::to_value(&echo).unwrap();
        assert_eq!(json["data"]["isFromMe"], true);
        assert_eq!(json["data"]["to"], "Carol");
    }

    #[test]
    fn init_uses_camel_case_tables() {
        let mut costs = BTreeMap::new();
        costs.insert("Paris".to_string(), 60);
        let ev = ServerEvent::Init {
            profile: PlayerProfile::new("Alice", 0, 100, "Paris"),
            locations: vec!["Paris".into()],
            travel_costs: costs,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["data"]["travelCosts"]["Paris"], 60);
        assert_eq!(ev.name(), "init");
    }
}
