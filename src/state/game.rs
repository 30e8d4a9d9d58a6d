//! The game-phase state machine: Setup → PlayRound → PostRound →
//! GameOver, looping back to Setup while rounds remain.

use super::AppState;
use crate::error::{GameError, GameResult};
use crate::menu::{MenuOutcome, SelectionMenu, OPT_ACCEPT};
use crate::types::*;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Create a game, set up every starting player's hand, and spawn its
/// driving loop.
pub async fn launch_game(
    state: &Arc<AppState>,
    owner: &UserId,
    deck_name: &str,
    expansions: Vec<String>,
    rounds: Rounds,
    channel: ChannelHandle,
    participants: Vec<(UserId, String)>,
) -> GameResult<GameId> {
    let game_id = state
        .start_game(owner, deck_name, expansions, rounds, channel, participants)
        .await?;
    spawn_game_loop(state.clone(), game_id.clone());
    Ok(game_id)
}

pub fn spawn_game_loop(state: Arc<AppState>, game_id: GameId) {
    tokio::spawn(async move {
        run_game(state, game_id).await;
    });
}

/// Drive one game to completion. The shutdown override is checked at
/// every phase entry; phases check it again at their own suspension
/// points.
pub async fn run_game(state: Arc<AppState>, game_id: GameId) {
    loop {
        if state.shutdown_requested(&game_id).await {
            break;
        }
        let phase = match state.with_game(&game_id, |g| g.phase).await {
            Ok(p) => p,
            // Game was torn down externally
            Err(_) => return,
        };

        let step = match phase {
            GamePhase::Setup => state.phase_setup(&game_id).await,
            GamePhase::PlayRound => state.phase_play_round(&game_id).await,
            GamePhase::PostRound => state.phase_post_round(&game_id).await,
            GamePhase::GameOver => state.phase_game_over(&game_id).await,
        };

        match step {
            Ok(true) => {
                let _ = state
                    .with_game_mut(&game_id, |g| g.phase = g.phase.next())
                    .await;
            }
            Ok(false) => break,
            Err(e) => {
                // Recoverable failures are handled inside the phase; an
                // error reaching here is an internal one.
                tracing::error!("Game {}: {}", game_id, e);
                let _ = state
                    .with_game_mut(&game_id, |g| {
                        if !g.shutdown_override {
                            g.force_shutdown(
                                "The game was forcibly ended, likely due to an error.",
                            );
                        }
                    })
                    .await;
                break;
            }
        }
    }
    state.end_game(&game_id).await;
}

impl AppState {
    /// Register a new game and set up its starting roster. The caller is
    /// responsible for spawning `run_game`; `launch_game` does both.
    pub async fn start_game(
        &self,
        owner: &UserId,
        deck_name: &str,
        expansions: Vec<String>,
        rounds: Rounds,
        channel: ChannelHandle,
        participants: Vec<(UserId, String)>,
    ) -> GameResult<GameId> {
        let (max_players, has_prompts) = {
            let decks = self.decks.read().await;
            let deck = decks
                .get(deck_name)
                .ok_or_else(|| GameError::DeckNotFound(deck_name.to_string()))?;
            (
                deck.total_answer_cards(&expansions) / self.config.cards_per_hand,
                deck.total_prompt_cards(&expansions) > 0,
            )
        };

        if !has_prompts {
            return Err(GameError::InvalidDeck(format!(
                "no prompt cards in the selected expansions of {:?}",
                deck_name
            )));
        }
        if participants.len() < self.config.min_players {
            return Err(GameError::InsufficientPlayers(format!(
                "a game needs at least {} players",
                self.config.min_players
            )));
        }
        if participants.len() > max_players {
            return Err(GameError::InsufficientPlayers(format!(
                "the selected expansions only have enough answer cards for {} players",
                max_players
            )));
        }

        let players: Vec<Player> = participants
            .into_iter()
            .map(|(user_id, name)| Player::new(user_id, name))
            .collect();
        let chooser_index = rand::rng().random_range(0..players.len());

        let mut game = Game {
            id: ulid::Ulid::new().to_string(),
            channel: channel.clone(),
            owner: owner.clone(),
            deck_name: deck_name.to_string(),
            expansion_names: expansions,
            phase: GamePhase::Setup,
            players,
            current_prompt: None,
            chooser_index,
            rounds,
            current_round: 0,
            shutdown_override: false,
            shutdown_reason: String::new(),
            started: false,
            players_left_during_setup: Vec::new(),
            allow_new_players: true,
            max_players,
            waiting_for_submissions: false,
            progress: None,
        };
        game.players[chooser_index].is_chooser = true;

        let game_id = game.id.clone();
        self.games.write().await.insert(game_id.clone(), game);

        self.do_game_intro(&game_id).await;
        self.announce_owner(&game_id).await;
        self.setup_all_player_hands(&game_id).await;
        self.with_game_mut(&game_id, |g| g.started = true).await?;

        tracing::info!("Game {} started in channel {}", game_id, channel);
        Ok(game_id)
    }

    async fn do_game_intro(&self, game_id: &str) {
        let Ok(channel) = self.with_game(game_id, |g| g.channel.clone()).await else {
            return;
        };
        let intro = "🃏 Welcome to the game!\n\
                     1) Watch this channel to see the current prompt card. \
                     Each prompt card has empty spaces `_` you need to fill with answer cards.\n\
                     2) Check your DMs and pick the funniest answer cards you've got to fill those spaces!\n\
                     3) Once everyone has submitted, the card chooser picks their favourite submission.\n\
                     You can leave at any time, and anyone can join at any time!";
        self.announce(&channel, intro).await;
    }

    async fn announce_owner(&self, game_id: &str) {
        let Ok((channel, owner)) = self
            .with_game(game_id, |g| (g.channel.clone(), g.owner.clone()))
            .await
        else {
            return;
        };
        self.announce(&channel, &format!("The deck master is now <@{}>! 🙇", owner))
            .await;
    }

    /// Setup: bump the round counter, refill hands, draw the round's
    /// prompt, advance the chooser, and reset submission state.
    pub(super) async fn phase_setup(&self, game_id: &str) -> GameResult<bool> {
        let (channel, deck_name, expansions, round, rounds) = self
            .with_game_mut(game_id, |g| {
                g.current_round += 1;
                (
                    g.channel.clone(),
                    g.deck_name.clone(),
                    g.expansion_names.clone(),
                    g.current_round,
                    g.rounds,
                )
            })
            .await?;

        let header = match rounds {
            Rounds::Fixed(total) => format!("**Round {} of {}**", round, total),
            Rounds::Unlimited => format!("**Round {}**", round),
        };
        self.announce(&channel, &format!("{}\nDealing cards...", header))
            .await;

        self.deal_all_player_cards(game_id).await;

        match self.draw_prompt(&deck_name, &expansions).await {
            Ok(prompt) => {
                self.announce(
                    &channel,
                    &format!(
                        "The prompt card is:\n> {}\n({} answer{} required)",
                        prompt.text,
                        prompt.required_answers,
                        if prompt.required_answers == 1 { "" } else { "s" }
                    ),
                )
                .await;
                self.with_game_mut(game_id, |g| g.current_prompt = Some(prompt))
                    .await?;
            }
            Err(e) => {
                // Deck construction guarantees prompts exist, so this is
                // an internal problem; end the game rather than stall.
                self.announce(&channel, "Could not draw a prompt card. Ending the game.")
                    .await;
                self.with_game_mut(game_id, |g| {
                    g.force_shutdown("The deck ran out of prompt cards.")
                })
                .await?;
                return Err(e);
            }
        }

        let new_chooser = self
            .with_game_mut(game_id, |g| {
                g.reset_submissions();
                g.rotate_chooser()
            })
            .await?;
        if let Some(name) = new_chooser {
            self.announce(&channel, &format!("{} is now the card chooser!", name))
                .await;
        }

        Ok(true)
    }

    /// GameOver: show the scoreboard, then decide whether to loop back
    /// into another round.
    pub(super) async fn phase_game_over(&self, game_id: &str) -> GameResult<bool> {
        self.show_leaderboard(game_id).await;
        Ok(self.check_keep_playing(game_id).await)
    }

    async fn show_leaderboard(&self, game_id: &str) {
        let Ok((channel, mut standings)) = self
            .with_game(game_id, |g| {
                (
                    g.channel.clone(),
                    g.players
                        .iter()
                        .map(|p| (p.display_name.clone(), p.points))
                        .collect::<Vec<_>>(),
                )
            })
            .await
        else {
            return;
        };
        standings.sort_by(|a, b| b.1.cmp(&a.1));
        let lines: Vec<String> = standings
            .iter()
            .map(|(name, points)| format!("{}: {}", name, points))
            .collect();
        self.announce(&channel, &format!("**Scoreboard**\n{}", lines.join("\n")))
            .await;
    }

    /// Fixed-round games continue automatically while rounds remain;
    /// unlimited games ask the owner through a short confirmation menu.
    /// No answer, or a timeout, ends the game.
    async fn check_keep_playing(&self, game_id: &str) -> bool {
        let Ok((shutdown, rounds, current, channel, owner)) = self
            .with_game(game_id, |g| {
                (
                    g.shutdown_override,
                    g.rounds,
                    g.current_round,
                    g.channel.clone(),
                    g.owner.clone(),
                )
            })
            .await
        else {
            return false;
        };
        if shutdown {
            return false;
        }

        match rounds {
            Rounds::Fixed(total) => current < total,
            Rounds::Unlimited => {
                let (mut menu, rx) = SelectionMenu::confirm_prompt(
                    Some(game_id.to_string()),
                    owner,
                    "Play another round?",
                );
                self.post_menu(&channel, &mut menu).await;
                let message = menu.message.clone();
                let outcome = self
                    .run_menu(
                        menu,
                        rx,
                        Duration::from_secs(self.config.timeouts.keep_playing_secs),
                    )
                    .await;
                if let Some(message) = message {
                    let _ = self.transport.delete_message(&message).await;
                }
                matches!(
                    outcome,
                    MenuOutcome::Triggered(options)
                        if options.len() == 1 && options[0].reference == OPT_ACCEPT
                )
            }
        }
    }

    /// Final teardown: announce results, credit game wins, release every
    /// still-owned card, tear down every menu the game owns, and drop the
    /// game from the registry.
    pub(super) async fn end_game(&self, game_id: &str) {
        let Some(game) = self.games.write().await.remove(game_id) else {
            return;
        };

        let max_points = game.players.iter().map(|p| p.points).max().unwrap_or(0);
        let winners: Vec<&Player> = game
            .players
            .iter()
            .filter(|p| p.points == max_points)
            .collect();

        let mut lines = Vec::new();
        if game.shutdown_override {
            lines.push(if game.shutdown_reason.is_empty() {
                "The game was forcibly ended, likely due to an error.".to_string()
            } else {
                game.shutdown_reason.clone()
            });
        }
        if !winners.is_empty() {
            let names: Vec<String> = winners.iter().map(|p| p.display_name.clone()).collect();
            lines.push(format!(
                "Thanks for playing! 🏆 Winner{}: {} with {} point{}{}",
                if winners.len() == 1 { "" } else { "s" },
                names.join(", "),
                max_points,
                if max_points == 1 { "" } else { "s" },
                if winners.len() == 1 { "" } else { " each" },
            ));
        }
        if !lines.is_empty() {
            self.announce(&game.channel, &lines.join("\n")).await;
        }

        for winner in &winners {
            self.stats.increment_game_wins(&winner.user_id).await;
        }

        for player in &game.players {
            let held = player.held_cards();
            if !held.is_empty() {
                self.release_cards(&game.deck_name, &held).await;
            }
        }

        self.cancel_game_menus(game_id).await;
        tracing::info!("Game {} ended", game_id);
    }
}
