//! Chat-transport seam.
//!
//! The engine only ever talks to the chat platform through this trait.
//! Failures are treated as best-effort degraded, except critical sends
//! (hand-setup DMs) which are retried a bounded number of times.

use crate::error::TransportError;
use crate::types::{ChannelHandle, MessageHandle, UserId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(
        &self,
        channel: &ChannelHandle,
        content: &str,
    ) -> Result<MessageHandle, TransportError>;

    async fn edit_message(
        &self,
        message: &MessageHandle,
        content: &str,
    ) -> Result<(), TransportError>;

    async fn delete_message(&self, message: &MessageHandle) -> Result<(), TransportError>;

    async fn send_direct_message(
        &self,
        user: &UserId,
        content: &str,
    ) -> Result<MessageHandle, TransportError>;
}

/// Send a DM, retrying a bounded number of times. Used for critical sends
/// where a lost message would strand the player (hand setup).
pub async fn send_dm_with_retry(
    transport: &dyn Transport,
    user: &UserId,
    content: &str,
    retries: u32,
) -> Result<MessageHandle, TransportError> {
    let mut last_err = TransportError::Other("no attempts made".to_string());
    for attempt in 0..=retries {
        match transport.send_direct_message(user, content).await {
            Ok(handle) => return Ok(handle),
            Err(e) => {
                tracing::warn!(
                    "DM to {} failed (attempt {}/{}): {}",
                    user,
                    attempt + 1,
                    retries + 1,
                    e
                );
                last_err = e;
            }
        }
    }
    Err(last_err)
}

/// Log-and-continue for non-critical transport results.
pub fn best_effort<T>(result: Result<T, TransportError>, context: &str) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("Transport failure ({}): {}", context, e);
            None
        }
    }
}

/// A record of one transport call, for inspection in tests and dry runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentMessage {
    Channel { channel: ChannelHandle, content: String },
    Edit { message_id: String, content: String },
    Delete { message_id: String },
    Direct { user: UserId, content: String },
}

/// In-memory transport. Records every call; optionally fails DMs to a
/// chosen set of users to exercise the degraded paths.
#[derive(Default)]
pub struct MemoryTransport {
    pub sent: Mutex<Vec<SentMessage>>,
    pub failing_dm_users: Mutex<Vec<UserId>>,
    counter: Mutex<u64>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> String {
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        format!("msg-{}", counter)
    }

    pub fn fail_dms_for(&self, user: &str) {
        self.failing_dm_users.lock().unwrap().push(user.to_string());
    }

    /// All recorded channel messages sent to the given channel
    pub fn channel_messages(&self, channel: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|m| match m {
                SentMessage::Channel { channel: c, content } if c == channel => {
                    Some(content.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// All recorded DMs sent to the given user
    pub fn direct_messages(&self, user: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|m| match m {
                SentMessage::Direct { user: u, content } if u == user => Some(content.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send_message(
        &self,
        channel: &ChannelHandle,
        content: &str,
    ) -> Result<MessageHandle, TransportError> {
        self.sent.lock().unwrap().push(SentMessage::Channel {
            channel: channel.clone(),
            content: content.to_string(),
        });
        Ok(MessageHandle {
            id: self.next_id(),
            channel: channel.clone(),
        })
    }

    async fn edit_message(
        &self,
        message: &MessageHandle,
        content: &str,
    ) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(SentMessage::Edit {
            message_id: message.id.clone(),
            content: content.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, message: &MessageHandle) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(SentMessage::Delete {
            message_id: message.id.clone(),
        });
        Ok(())
    }

    async fn send_direct_message(
        &self,
        user: &UserId,
        content: &str,
    ) -> Result<MessageHandle, TransportError> {
        if self.failing_dm_users.lock().unwrap().contains(user) {
            return Err(TransportError::Forbidden(format!(
                "DMs closed for {}",
                user
            )));
        }
        self.sent.lock().unwrap().push(SentMessage::Direct {
            user: user.clone(),
            content: content.to_string(),
        });
        Ok(MessageHandle {
            id: self.next_id(),
            channel: format!("dm:{}", user),
        })
    }
}

/// Counts of recorded messages per user, used by tests asserting retry
/// behaviour.
pub fn dm_attempt_counts(messages: &[SentMessage]) -> HashMap<UserId, usize> {
    let mut counts = HashMap::new();
    for m in messages {
        if let SentMessage::Direct { user, .. } = m {
            *counts.entry(user.clone()).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_transport_records_sends() {
        let transport = MemoryTransport::new();
        let handle = transport.send_message(&"ch1".to_string(), "hello").await.unwrap();
        transport.edit_message(&handle, "edited").await.unwrap();
        transport.delete_message(&handle).await.unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert!(matches!(sent[1], SentMessage::Edit { .. }));
    }

    #[tokio::test]
    async fn test_dm_retry_gives_up_after_budget() {
        let transport = MemoryTransport::new();
        transport.fail_dms_for("grumpy");

        let result = send_dm_with_retry(&transport, &"grumpy".to_string(), "hi", 2).await;
        assert!(result.is_err());

        // No DMs recorded since every attempt failed
        assert!(transport.direct_messages("grumpy").is_empty());
    }

    #[tokio::test]
    async fn test_dm_retry_succeeds_without_failures() {
        let transport = MemoryTransport::new();
        let result = send_dm_with_retry(&transport, &"happy".to_string(), "hi", 2).await;
        assert!(result.is_ok());
        assert_eq!(transport.direct_messages("happy").len(), 1);

        let counts = dm_attempt_counts(&transport.sent.lock().unwrap());
        assert_eq!(counts.get("happy"), Some(&1));
    }
}
