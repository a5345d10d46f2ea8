//! Private message recording.
//!
//! Both participants get a copy of every private message in their stored
//! history. The sender's copy is written first and doubles as the check that
//! the sender still has a profile; once it lands, a failure on the recipient
//! side is logged and does not undo the sender's copy.

use log::warn;

use crate::game::actions::{ActionEngine, Outcome, Rejection};
use crate::game::errors::GameError;
use crate::game::types::{now_millis, MessageRecord};
use crate::logutil::{escape_log, short_key};
use crate::validation::accept_client_message_id;

/// A private message that was accepted and recorded.
#[derive(Debug, Clone)]
pub struct RecordedMessage {
    pub id: String,
    pub from: String,
    pub to: String,
    pub body: String,
    pub timestamp: i64,
    pub recipient_key: String,
}

impl ActionEngine {
    /// Resolve `to_name`, build the message and append it to both histories.
    ///
    /// Rejected with `UnknownRecipient` when no profile carries `to_name`, and
    /// with `UnknownAccount` when the sender has no profile (for example after
    /// dying); neither history changes in those cases. A client id that is
    /// unsafe or missing is replaced with a fresh UUID.
    pub async fn record_private_message(
        &self,
        sender_key: &str,
        sender_name: &str,
        to_name: &str,
        body: &str,
        client_id: Option<&str>,
    ) -> Result<Outcome<RecordedMessage>, GameError> {
        let Some((recipient_key, _)) = self.store().find_by_display_name(to_name)? else {
            return Ok(Outcome::Rejected(Rejection::UnknownRecipient(
                to_name.to_string(),
            )));
        };

        let id = client_id
            .and_then(accept_client_message_id)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let timestamp = now_millis();
        let (sent, received) = MessageRecord::pair(&id, sender_name, to_name, body, timestamp);

        if !self.append_message(sender_key, sent).await? {
            return Ok(Outcome::Rejected(Rejection::UnknownAccount));
        }
        match self.append_message(&recipient_key, received).await {
            Ok(true) => {}
            Ok(false) => warn!(
                "recipient {} vanished before {} was stored",
                short_key(&recipient_key),
                escape_log(&id)
            ),
            Err(e) => warn!(
                "failed to store received copy of {} for {}: {}",
                escape_log(&id),
                short_key(&recipient_key),
                e
            ),
        }

        Ok(Outcome::Applied(RecordedMessage {
            id,
            from: sender_name.to_string(),
            to: to_name.to_string(),
            body: body.to_string(),
            timestamp,
            recipient_key,
        }))
    }
}
