//! Round plumbing: hand setup, card dealing, and submission collection.
//!
//! Hand setup and dealing fan out one concurrent unit per player and join
//! before the phase advances; one slow player delays the join but never
//! blocks the others' units, and a failed unit degrades that player only.

use super::AppState;
use crate::error::{GameError, GameResult};
use crate::transport::{best_effort, send_dm_with_retry};
use crate::types::*;
use futures::future::join_all;

impl AppState {
    /// Fan out hand setup across every starting player and join.
    pub(super) async fn setup_all_player_hands(&self, game_id: &str) {
        if self.shutdown_requested(game_id).await {
            return;
        }
        let Ok((channel, user_ids)) = self
            .with_game(game_id, |g| {
                (
                    g.channel.clone(),
                    g.players.iter().map(|p| p.user_id.clone()).collect::<Vec<_>>(),
                )
            })
            .await
        else {
            return;
        };

        self.announce(&channel, "Setting up player hands... ⏳").await;

        let units = user_ids
            .iter()
            .map(|user_id| self.setup_player_hand(game_id, user_id));
        for (user_id, result) in user_ids.iter().zip(join_all(units).await) {
            if let Err(e) = result {
                // Partial failure is tolerated: the affected player is
                // reported, the rest of the fan-out stands.
                tracing::warn!("Hand setup failed for {}: {}", user_id, e);
                self.announce(
                    &channel,
                    &format!("<@{}> couldn't be reached over DM. Are your DMs open?", user_id),
                )
                .await;
            }
        }

        self.announce(&channel, "Setting up player hands... ✅").await;
    }

    /// DM the hand intro and create this player's empty hand slots.
    /// The intro send is critical: a player who never saw their hand
    /// can't play, so it is retried before giving up.
    pub(super) async fn setup_player_hand(&self, game_id: &str, user_id: &str) -> GameResult<()> {
        if self.shutdown_requested(game_id).await {
            return Ok(());
        }
        let (channel, deck_name, owner) = self
            .with_game(game_id, |g| {
                (g.channel.clone(), g.deck_name.clone(), g.owner.clone())
            })
            .await?;
        let blank_url = {
            let decks = self.decks.read().await;
            decks
                .get(&deck_name)
                .map(|d| d.blank_answer_url.clone())
                .unwrap_or_default()
        };

        let intro = format!(
            "🃏 Welcome to <@{}>'s game!\n\
             Watch <#{}> to see the current prompt card. Below this message is your hand; \
             select the cards you want to play each round, in the order you want them.\n\
             Don't like your hand? You can redeal once per game.",
            owner, channel
        );
        send_dm_with_retry(
            self.transport.as_ref(),
            &user_id.to_string(),
            &intro,
            self.config.transport_retries,
        )
        .await?;

        let hand_size = self.config.cards_per_hand;
        for _ in 0..hand_size {
            if self.shutdown_requested(game_id).await {
                return Ok(());
            }
            let message = best_effort(
                self.transport
                    .send_direct_message(&user_id.to_string(), &format!("[blank card] {}", blank_url))
                    .await,
                "hand slot message",
            );
            self.with_game_mut(game_id, |g| {
                if let Some(player) = g.player_mut(user_id) {
                    player.hand.push(CardSlot::empty(message));
                }
            })
            .await?;
        }
        Ok(())
    }

    /// Fan out dealing across every player and join.
    pub(super) async fn deal_all_player_cards(&self, game_id: &str) {
        if self.shutdown_requested(game_id).await {
            return;
        }
        let Ok(user_ids) = self
            .with_game(game_id, |g| {
                g.players.iter().map(|p| p.user_id.clone()).collect::<Vec<_>>()
            })
            .await
        else {
            return;
        };

        let units = user_ids
            .iter()
            .map(|user_id| self.deal_player_cards(game_id, user_id));
        for result in join_all(units).await {
            if let Err(e) = result {
                tracing::warn!("Dealing failed: {}", e);
            }
        }
    }

    /// Fill this player's empty hand slots from the deck. Supply
    /// exhaustion is reported to the channel and the round continues;
    /// it never aborts the deal for other players.
    pub(super) async fn deal_player_cards(&self, game_id: &str, user_id: &str) -> GameResult<()> {
        if self.shutdown_requested(game_id).await {
            return Ok(());
        }
        let (channel, deck_name, expansions, player_id, empty_slots) = self
            .with_game(game_id, |g| {
                let player = g.player(user_id);
                (
                    g.channel.clone(),
                    g.deck_name.clone(),
                    g.expansion_names.clone(),
                    player.map(|p| p.id.clone()),
                    player
                        .map(|p| {
                            p.hand
                                .iter()
                                .enumerate()
                                .filter(|(_, s)| s.is_empty())
                                .map(|(i, _)| i)
                                .collect::<Vec<_>>()
                        })
                        .unwrap_or_default(),
                )
            })
            .await?;
        let Some(player_id) = player_id else {
            return Err(GameError::PlayerNotFound(user_id.to_string()));
        };

        let mut supply_exhausted = false;
        for slot_index in empty_slots {
            if self.shutdown_requested(game_id).await {
                return Ok(());
            }
            let Some(card) = self.draw_answer(&deck_name, &expansions, &player_id).await? else {
                supply_exhausted = true;
                continue;
            };

            let placed = self
                .with_game_mut(game_id, |g| {
                    let Some(player) = g.player_mut(user_id) else {
                        return None;
                    };
                    let slot = player.hand.get_mut(slot_index)?;
                    slot.card = Some(card.id.clone());
                    Some(slot.message.clone())
                })
                .await?;

            match placed {
                Some(message) => {
                    if let Some(message) = message {
                        best_effort(
                            self.transport.edit_message(&message, &card.text).await,
                            "hand slot render",
                        );
                    }
                }
                // Player vanished between the draw and the placement;
                // hand the card straight back.
                None => {
                    self.release_cards(&deck_name, &[card.id]).await;
                    return Ok(());
                }
            }
        }

        if supply_exhausted {
            tracing::warn!(
                "{}",
                GameError::CardSupplyExhausted(expansions.join(", "))
            );
            self.announce(
                &channel,
                &format!(
                    "<@{}> Some of your cards couldn't be dealt: the deck has no free cards right now.",
                    user_id
                ),
            )
            .await;
        }
        Ok(())
    }

    /// PlayRound: purge players who left during Setup (reassigning the
    /// chooser first if it was one of them), then suspend until every
    /// non-chooser has submitted or the game is shut down.
    pub(super) async fn phase_play_round(&self, game_id: &str) -> GameResult<bool> {
        let (channel, deck_name, reassigned, stragglers) = self
            .with_game_mut(game_id, |g| {
                let mut reassigned = None;
                for _ in 0..g.players.len() {
                    let chooser_left = g
                        .chooser()
                        .map(|c| g.players_left_during_setup.contains(&c.id))
                        .unwrap_or(false);
                    if !chooser_left {
                        break;
                    }
                    reassigned = g.rotate_chooser();
                }
                if reassigned.is_some() {
                    g.reset_submissions();
                }
                let left = std::mem::take(&mut g.players_left_during_setup);
                // The dealing fan-out may have refilled a leaver's slots
                // after their leave released the hand; purge returns
                // whatever landed there since.
                let mut stragglers = Vec::new();
                for player in g.players.iter_mut().filter(|p| left.contains(&p.id)) {
                    stragglers.extend(player.held_cards());
                    for slot in &mut player.hand {
                        slot.card = None;
                    }
                }
                g.players.retain(|p| !left.contains(&p.id));
                (g.channel.clone(), g.deck_name.clone(), reassigned, stragglers)
            })
            .await?;
        if !stragglers.is_empty() {
            self.release_cards(&deck_name, &stragglers).await;
        }
        if let Some(name) = reassigned {
            self.announce(&channel, &format!("{} is now the card chooser!", name))
                .await;
        }

        let progress_message = best_effort(
            self.transport
                .send_message(&channel, "Waiting for submissions...")
                .await,
            "submissions progress",
        );
        self.with_game_mut(game_id, |g| {
            g.waiting_for_submissions = true;
            if let Some(message) = progress_message {
                g.progress = Some(SubmissionsProgress::new(message, &g.players));
            }
        })
        .await?;
        self.update_progress_message(game_id).await;

        loop {
            let (shutdown, all_submitted) = self
                .with_game(game_id, |g| (g.shutdown_override, g.all_players_submitted()))
                .await?;
            if shutdown {
                return Ok(true);
            }
            if all_submitted {
                break;
            }
            tokio::time::sleep(self.config.check_period()).await;
        }

        self.with_game_mut(game_id, |g| {
            g.waiting_for_submissions = false;
            g.progress = None;
        })
        .await?;
        Ok(true)
    }

    pub(super) async fn update_progress_message(&self, game_id: &str) {
        let Ok(progress) = self
            .with_game(game_id, |g| {
                g.progress
                    .as_ref()
                    .map(|p| (p.message.clone(), p.render()))
            })
            .await
        else {
            return;
        };
        if let Some((message, rendering)) = progress {
            best_effort(
                self.transport.edit_message(&message, &rendering).await,
                "submissions progress",
            );
        }
    }

    /// Entry point: a player plays an ordered set of cards from their
    /// hand. The cards leave the hand slots and return to the deck's
    /// seen pool; the submission itself is judged by card id.
    pub async fn submit_answers(
        &self,
        game_id: &str,
        user_id: &str,
        cards: &[CardId],
    ) -> GameResult<()> {
        let (deck_name, played, cleared_messages) = self
            .with_game_mut(
                game_id,
                |g| -> GameResult<(String, Vec<CardId>, Vec<MessageHandle>)> {
                if g.phase != GamePhase::PlayRound || !g.waiting_for_submissions {
                    return Err(GameError::InvalidSubmission(
                        "no submission round is active".to_string(),
                    ));
                }
                let required = g
                    .current_prompt
                    .as_ref()
                    .map(|p| p.required_answers as usize)
                    .unwrap_or(1);

                let deck_name = g.deck_name.clone();
                let Some(player) = g.player_mut(user_id) else {
                    return Err(GameError::PlayerNotFound(user_id.to_string()));
                };
                if player.is_chooser {
                    return Err(GameError::InvalidSubmission(
                        "the card chooser doesn't submit this round".to_string(),
                    ));
                }
                if player.has_submitted {
                    return Err(GameError::InvalidSubmission(
                        "you already submitted this round".to_string(),
                    ));
                }
                if cards.len() != required {
                    return Err(GameError::InvalidSubmission(format!(
                        "this prompt needs exactly {} card{}",
                        required,
                        if required == 1 { "" } else { "s" }
                    )));
                }
                let mut distinct = cards.to_vec();
                distinct.sort();
                distinct.dedup();
                if distinct.len() != cards.len() {
                    return Err(GameError::InvalidSubmission(
                        "you can't play the same card twice".to_string(),
                    ));
                }
                for card in cards {
                    if !player.hand.iter().any(|s| s.card.as_deref() == Some(card)) {
                        return Err(GameError::InvalidSubmission(
                            "one of those cards isn't in your hand".to_string(),
                        ));
                    }
                }

                let mut cleared = Vec::new();
                for card in cards {
                    if let Some(slot) = player
                        .hand
                        .iter_mut()
                        .find(|s| s.card.as_deref() == Some(card))
                    {
                        slot.card = None;
                        if let Some(message) = slot.message.clone() {
                            cleared.push(message);
                        }
                    }
                }
                player.submitted_cards = cards.to_vec();
                player.has_submitted = true;
                let player_id = player.id.clone();
                if let Some(progress) = &mut g.progress {
                    progress.mark_submitted(&player_id);
                }
                Ok((deck_name, cards.to_vec(), cleared))
                },
            )
            .await??;

        self.release_cards(&deck_name, &played).await;
        for message in cleared_messages {
            best_effort(
                self.transport.edit_message(&message, "[card played]").await,
                "played slot render",
            );
        }
        self.update_progress_message(game_id).await;
        Ok(())
    }
}
