mod export;
mod game;
mod judge;
mod player;
mod round;

pub use export::{EngineStateExport, EXPORT_SCHEMA_VERSION};
pub use game::{launch_game, run_game, spawn_game_loop};

use crate::config::Config;
use crate::deck::{AnswerCard, Deck, DeckMeta, PromptCard};
use crate::error::{GameError, GameResult};
use crate::menu::{MenuOutcome, MenuReceiver, SelectionMenu};
use crate::sched::TaskScheduler;
use crate::stats::StatsSink;
use crate::transport::{best_effort, Transport};
use crate::types::*;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Shared engine state: every process-wide registry lives here, owned
/// explicitly rather than as ambient globals.
pub struct AppState {
    pub config: Config,
    pub games: Arc<RwLock<HashMap<GameId, Game>>>,
    pub decks: Arc<RwLock<HashMap<String, Deck>>>,
    pub menus: Arc<RwLock<HashMap<MenuId, SelectionMenu>>>,
    pub scheduler: TaskScheduler,
    pub transport: Arc<dyn Transport>,
    pub stats: Arc<dyn StatsSink>,
}

impl AppState {
    pub fn new(config: Config, transport: Arc<dyn Transport>, stats: Arc<dyn StatsSink>) -> Self {
        let scheduler = TaskScheduler::new(config.lateness_threshold);
        Self {
            config,
            games: Arc::new(RwLock::new(HashMap::new())),
            decks: Arc::new(RwLock::new(HashMap::new())),
            menus: Arc::new(RwLock::new(HashMap::new())),
            scheduler,
            transport,
            stats,
        }
    }

    /// Start the background tick loop driving every menu timeout
    pub fn spawn_scheduler(&self) {
        self.scheduler.spawn_ticker(self.config.scheduler_tick);
    }

    // ========== Decks ==========

    /// Register a deck built from validated metadata. On top of the deck's
    /// own construction invariant, the engine requires enough answer cards
    /// for at least two full hands.
    pub async fn load_deck(&self, meta: &DeckMeta) -> GameResult<String> {
        let deck = Deck::from_meta(meta)?;
        let min_answers = 2 * self.config.cards_per_hand;
        if deck.total_answer_cards(&[]) < min_answers {
            return Err(GameError::InvalidDeck(format!(
                "decks must have at least {} answer cards",
                min_answers
            )));
        }

        let name = deck.name.clone();
        self.decks.write().await.insert(name.clone(), deck);
        tracing::info!("Loaded deck {:?}", name);
        Ok(name)
    }

    pub async fn load_deck_from_path(&self, path: &Path) -> GameResult<String> {
        let meta: DeckMeta = crate::persist::read_json(path)
            .map_err(|e| GameError::InvalidDeck(format!("{}: {}", path.display(), e)))?;
        self.load_deck(&meta).await
    }

    /// Draw an answer card for `owner`. Draws within one deck are
    /// serialized by the registry lock.
    pub async fn draw_answer(
        &self,
        deck_name: &str,
        expansions: &[String],
        owner: &PlayerId,
    ) -> GameResult<Option<AnswerCard>> {
        let mut decks = self.decks.write().await;
        let deck = decks
            .get_mut(deck_name)
            .ok_or_else(|| GameError::DeckNotFound(deck_name.to_string()))?;
        Ok(deck.draw_random_answer(expansions, owner))
    }

    pub async fn draw_prompt(
        &self,
        deck_name: &str,
        expansions: &[String],
    ) -> GameResult<PromptCard> {
        let mut decks = self.decks.write().await;
        let deck = decks
            .get_mut(deck_name)
            .ok_or_else(|| GameError::DeckNotFound(deck_name.to_string()))?;
        deck.draw_random_prompt(expansions)
    }

    /// Return cards to the deck. Double releases indicate corrupted shared
    /// state; they are reported loudly but do not stop the remaining
    /// releases.
    pub async fn release_cards(&self, deck_name: &str, cards: &[CardId]) {
        let mut decks = self.decks.write().await;
        let Some(deck) = decks.get_mut(deck_name) else {
            tracing::error!("Release against unknown deck {:?}", deck_name);
            return;
        };
        for card_id in cards {
            if let Err(e) = deck.release(card_id) {
                tracing::error!("{}", e);
            }
        }
    }

    // ========== Games ==========

    pub async fn game_snapshot(&self, game_id: &str) -> Option<Game> {
        self.games.read().await.get(game_id).cloned()
    }

    pub async fn with_game<R>(
        &self,
        game_id: &str,
        f: impl FnOnce(&Game) -> R,
    ) -> GameResult<R> {
        let games = self.games.read().await;
        let game = games
            .get(game_id)
            .ok_or_else(|| GameError::GameNotFound(game_id.to_string()))?;
        Ok(f(game))
    }

    pub async fn with_game_mut<R>(
        &self,
        game_id: &str,
        f: impl FnOnce(&mut Game) -> R,
    ) -> GameResult<R> {
        let mut games = self.games.write().await;
        let game = games
            .get_mut(game_id)
            .ok_or_else(|| GameError::GameNotFound(game_id.to_string()))?;
        Ok(f(game))
    }

    pub async fn shutdown_requested(&self, game_id: &str) -> bool {
        self.with_game(game_id, |g| g.shutdown_override)
            .await
            .unwrap_or(true)
    }

    /// Best-effort channel message for a game
    pub async fn announce(&self, channel: &ChannelHandle, content: &str) {
        best_effort(
            self.transport.send_message(channel, content).await,
            "channel announcement",
        );
    }

    // ========== Menus ==========

    /// Send the menu's rendering to a channel and attach the resulting
    /// message handle. Best-effort; the menu still works unrendered.
    pub async fn post_menu(&self, channel: &ChannelHandle, menu: &mut SelectionMenu) {
        menu.message = best_effort(
            self.transport.send_message(channel, &menu.render()).await,
            "menu post",
        );
    }

    /// Register the menu, schedule its timeout, and suspend until it
    /// resolves by trigger, timeout, or external cancellation.
    pub async fn run_menu(
        &self,
        mut menu: SelectionMenu,
        rx: MenuReceiver,
        timeout: Duration,
    ) -> MenuOutcome {
        menu.expires_at = Some(
            (chrono::Utc::now() + chrono::Duration::from_std(timeout).unwrap_or_default())
                .to_rfc3339(),
        );
        self.register_menu(menu, timeout).await;

        match rx.await {
            Ok(outcome) => outcome,
            // Registry dropped the menu without finishing it; treat as an
            // external cancellation.
            Err(_) => MenuOutcome::Cancelled,
        }
    }

    /// Register a menu and schedule its timeout without awaiting its
    /// resolution. Returns the menu id.
    pub async fn register_menu(&self, mut menu: SelectionMenu, timeout: Duration) -> MenuId {
        let menu_id = menu.id.clone();
        let menus = Arc::clone(&self.menus);
        let expire_id = menu_id.clone();
        let task_id = self
            .scheduler
            .schedule_in(
                timeout,
                &format!("menu {} timeout", menu_id),
                Box::new(move || Box::pin(expire_menu(menus, expire_id))),
            )
            .await;

        menu.timeout_task = Some(task_id);
        self.menus.write().await.insert(menu_id.clone(), menu);
        menu_id
    }

    /// Entry point for selection events arriving from the transport.
    /// Invalid events (unknown menu, wrong actor, option not displayed)
    /// are ignored without altering state.
    pub async fn menu_event(&self, menu_id: &str, actor: &str, option_ref: &str, added: bool) {
        let mut menus = self.menus.write().await;
        let Some(menu) = menus.get_mut(menu_id) else {
            return;
        };

        match menu.apply_event(actor, option_ref, added) {
            crate::menu::EventEffect::Ignored => {}
            crate::menu::EventEffect::Updated => {
                let rendering = menu.render();
                let message = menu.message.clone();
                drop(menus);
                if let Some(message) = message {
                    best_effort(
                        self.transport.edit_message(&message, &rendering).await,
                        "menu re-render",
                    );
                }
            }
            crate::menu::EventEffect::Resolve(outcome) => {
                let Some(mut menu) = menus.remove(menu_id) else {
                    return;
                };
                drop(menus);
                if let Some(task_id) = menu.timeout_task.take() {
                    self.scheduler.cancel(&task_id).await;
                }
                if let Err(e) = menu.finish(outcome) {
                    tracing::error!("{}", e);
                }
            }
        }
    }

    /// Tear down a menu without resolving it normally
    pub async fn cancel_menu(&self, menu_id: &str) {
        let menu = self.menus.write().await.remove(menu_id);
        let Some(mut menu) = menu else { return };
        if let Some(task_id) = menu.timeout_task.take() {
            self.scheduler.cancel(&task_id).await;
        }
        if let Some(message) = &menu.message {
            best_effort(
                self.transport.delete_message(message).await,
                "menu teardown",
            );
        }
        if let Err(e) = menu.finish(MenuOutcome::Cancelled) {
            tracing::error!("{}", e);
        }
    }

    /// Tear down every menu belonging to a game
    pub async fn cancel_game_menus(&self, game_id: &str) {
        let ids: Vec<MenuId> = {
            let menus = self.menus.read().await;
            menus
                .values()
                .filter(|m| m.game_id.as_deref() == Some(game_id))
                .map(|m| m.id.clone())
                .collect()
        };
        for id in ids {
            self.cancel_menu(&id).await;
        }
    }

    /// Flip the escape hatch on a game's active review menus so any
    /// event at all resolves them. Used when the chooser walks out
    /// mid-judging.
    pub async fn open_menu_escape_hatch(&self, game_id: &str) {
        let mut menus = self.menus.write().await;
        for menu in menus.values_mut() {
            if menu.game_id.as_deref() == Some(game_id) {
                menu.close_on_any_event = true;
            }
        }
    }
}

/// Timeout callback for a registered menu. The menu may already be gone
/// if it resolved early; that's not an error.
async fn expire_menu(
    menus: Arc<RwLock<HashMap<MenuId, SelectionMenu>>>,
    menu_id: MenuId,
) -> GameResult<()> {
    let menu = menus.write().await.remove(&menu_id);
    match menu {
        Some(mut menu) => {
            let selections = menu.selections.clone();
            menu.finish(MenuOutcome::TimedOut(selections))
        }
        None => Ok(()),
    }
}
