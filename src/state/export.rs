//! State export/import for durable snapshots.
//!
//! Produces serializable snapshots of every registry for saving through
//! the persistence helpers. Runtime-only pieces (menu resolvers, pending
//! scheduler tasks) are excluded; restored menus get fresh resolvers and
//! their timeouts are rescheduled from the saved expiry times.

use super::AppState;
use crate::menu::{MenuExport, MenuReceiver, SelectionMenu};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Schema version for export format compatibility
pub const EXPORT_SCHEMA_VERSION: u32 = 1;

/// A serializable snapshot of the engine's registries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStateExport {
    /// Schema version for forward compatibility
    pub schema_version: u32,
    /// Export timestamp (RFC 3339)
    pub exported_at: String,
    pub games: HashMap<GameId, Game>,
    pub decks: HashMap<String, crate::deck::Deck>,
    pub menus: Vec<MenuExport>,
}

impl AppState {
    pub async fn export_state(&self) -> EngineStateExport {
        let games = self.games.read().await.clone();
        let decks = self.decks.read().await.clone();
        let menus = self
            .menus
            .read()
            .await
            .values()
            .map(|m| m.to_export())
            .collect();

        EngineStateExport {
            schema_version: EXPORT_SCHEMA_VERSION,
            exported_at: chrono::Utc::now().to_rfc3339(),
            games,
            decks,
            menus,
        }
    }

    /// Restore registries from a snapshot. Menus come back with fresh
    /// resolvers; their receivers are returned so the embedding bot can
    /// re-await them, and their timeouts are rescheduled from the saved
    /// expiry times (overdue menus expire on the next tick).
    pub async fn import_state(
        &self,
        export: EngineStateExport,
    ) -> Vec<(MenuId, MenuReceiver)> {
        if export.schema_version != EXPORT_SCHEMA_VERSION {
            tracing::warn!(
                "Importing snapshot with schema version {} (current {})",
                export.schema_version,
                EXPORT_SCHEMA_VERSION
            );
        }

        *self.games.write().await = export.games;
        *self.decks.write().await = export.decks;

        let mut receivers = Vec::new();
        for menu_export in export.menus {
            let remaining = menu_export
                .expires_at
                .as_deref()
                .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
                .map(|expiry| {
                    let delta = expiry.signed_duration_since(chrono::Utc::now());
                    delta.to_std().unwrap_or(Duration::ZERO)
                })
                .unwrap_or(Duration::ZERO);

            let (menu, rx) = SelectionMenu::from_export(menu_export);
            let menu_id = self.register_menu(menu, remaining).await;
            receivers.push((menu_id, rx));
        }
        receivers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::{MenuOutcome, OPT_ACCEPT};
    use crate::state::tests::test_state;

    #[tokio::test]
    async fn test_snapshot_round_trip_preserves_games_and_decks() {
        let (state, _transport, _stats) = test_state();
        let meta = crate::deck::tests::meta_with(14, 2);
        state.load_deck(&meta).await.unwrap();
        state
            .start_game(
                &"u1".to_string(),
                "test deck",
                vec!["base".to_string()],
                Rounds::Fixed(3),
                "channel-1".to_string(),
                vec![
                    ("u1".to_string(), "Alice".to_string()),
                    ("u2".to_string(), "Bob".to_string()),
                ],
            )
            .await
            .unwrap();

        let export = state.export_state().await;
        let raw = serde_json::to_string(&export).unwrap();
        let parsed: EngineStateExport = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, export);

        // Restore into a fresh engine and re-export
        let (restored_state, _transport2, _stats2) = test_state();
        restored_state.import_state(parsed).await;
        let re_export = restored_state.export_state().await;
        assert_eq!(re_export.games, export.games);
        assert_eq!(re_export.decks, export.decks);
    }

    #[tokio::test]
    async fn test_restored_menu_still_resolves() {
        let (state, _transport, _stats) = test_state();
        let (menu, _orig_rx) = SelectionMenu::confirm_prompt(
            Some("game-1".to_string()),
            "alice".to_string(),
            "Play another round?",
        );
        let export = EngineStateExport {
            schema_version: EXPORT_SCHEMA_VERSION,
            exported_at: chrono::Utc::now().to_rfc3339(),
            games: HashMap::new(),
            decks: HashMap::new(),
            menus: vec![menu.to_export()],
        };

        let mut receivers = state.import_state(export).await;
        let (menu_id, rx) = receivers.pop().unwrap();

        state.menu_event(&menu_id, "alice", OPT_ACCEPT, true).await;
        match rx.await.unwrap() {
            MenuOutcome::Triggered(options) => assert_eq!(options[0].reference, OPT_ACCEPT),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
