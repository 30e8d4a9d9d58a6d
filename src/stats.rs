//! Lifetime win counters, kept outside any single game.

use crate::types::UserId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Fire-and-forget counters for per-user lifetime stats.
#[async_trait]
pub trait StatsSink: Send + Sync {
    async fn increment_round_wins(&self, user: &UserId);
    async fn increment_game_wins(&self, user: &UserId);
}

/// A user's lifetime stats record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    #[serde(default)]
    pub round_wins: u32,
    #[serde(default)]
    pub game_wins: u32,
}

/// In-memory stats store, serializable for persistence through the
/// persistence helpers.
#[derive(Default)]
pub struct InMemoryStats {
    users: Mutex<HashMap<UserId, UserStats>>,
}

impl InMemoryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: HashMap<UserId, UserStats>) -> Self {
        Self {
            users: Mutex::new(records),
        }
    }

    pub fn get(&self, user: &str) -> UserStats {
        self.users.lock().unwrap().get(user).cloned().unwrap_or_default()
    }

    pub fn snapshot(&self) -> HashMap<UserId, UserStats> {
        self.users.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatsSink for InMemoryStats {
    async fn increment_round_wins(&self, user: &UserId) {
        let mut users = self.users.lock().unwrap();
        users.entry(user.clone()).or_default().round_wins += 1;
    }

    async fn increment_game_wins(&self, user: &UserId) {
        let mut users = self.users.lock().unwrap();
        users.entry(user.clone()).or_default().game_wins += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counters_accumulate() {
        let stats = InMemoryStats::new();
        stats.increment_round_wins(&"u1".to_string()).await;
        stats.increment_round_wins(&"u1".to_string()).await;
        stats.increment_game_wins(&"u1".to_string()).await;

        let record = stats.get("u1");
        assert_eq!(record.round_wins, 2);
        assert_eq!(record.game_wins, 1);
        assert_eq!(stats.get("u2"), UserStats::default());
    }
}
