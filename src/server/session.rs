use chrono::{DateTime, Utc};

/// Per-connection state owned by the connection's task.
///
/// A session starts anonymous. A successful `register` binds it to an
/// account key and display name; game actions from an anonymous session are
/// dropped. Re-registering on the same connection rebinds it.
#[derive(Debug, Clone)]
pub struct Session {
    pub conn_id: u64,
    pub peer: Option<String>,
    pub account_key: Option<String>,
    pub display_name: Option<String>,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(conn_id: u64) -> Self {
        let now = Utc::now();
        Session {
            conn_id,
            peer: None,
            account_key: None,
            display_name: None,
            connected_at: now,
            last_activity: now,
        }
    }

    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = Some(peer.into());
        self
    }

    pub fn update_activity(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn bind(&mut self, account_key: &str, display_name: &str) {
        self.account_key = Some(account_key.to_string());
        self.display_name = Some(display_name.to_string());
    }

    pub fn is_registered(&self) -> bool {
        self.account_key.is_some()
    }

    /// Account key and display name, when registered.
    pub fn identity(&self) -> Option<(&str, &str)> {
        match (&self.account_key, &self.display_name) {
            (Some(k), Some(n)) => Some((k.as_str(), n.as_str())),
            _ => None,
        }
    }

    /// Name for log lines.
    pub fn label(&self) -> String {
        match &self.display_name {
            Some(name) => format!("#{} {}", self.conn_id, name),
            None => format!("#{} (anonymous)", self.conn_id),
        }
    }
}
