//! Player churn: joining, leaving, ownership transfer, and the one-shot
//! redeal. Leaving must release every card the player's hand owns back to
//! its pool; a card is never lost from circulation.

use super::AppState;
use crate::error::{GameError, GameResult};
use crate::menu::MenuKind;
use crate::types::*;
use rand::seq::IndexedRandom;

/// Everything `player_leave` decides under the game lock, applied outside
/// it: cards to release, channel messages to send, follow-up actions.
struct LeaveEffects {
    channel: ChannelHandle,
    deck_name: String,
    released: Vec<CardId>,
    messages: Vec<String>,
    open_escape_hatch: bool,
    new_owner: Option<UserId>,
}

impl AppState {
    /// Entry point: a participant joins a running game. New players get a
    /// hand set up and dealt immediately and enter the submissions
    /// progress indicator mid-round.
    pub async fn player_join(
        &self,
        game_id: &str,
        user_id: &str,
        display_name: &str,
    ) -> GameResult<()> {
        let player = Player::new(user_id.to_string(), display_name.to_string());
        let player_id = player.id.clone();
        let channel = self
            .with_game_mut(game_id, move |g| -> GameResult<ChannelHandle> {
                if g.shutdown_override {
                    return Err(GameError::JoinRefused("this game is shutting down".to_string()));
                }
                if !g.allow_new_players {
                    return Err(GameError::JoinRefused(
                        "this game isn't accepting new players".to_string(),
                    ));
                }
                if g.player(&player.user_id).is_some() {
                    return Err(GameError::JoinRefused("you're already in this game".to_string()));
                }
                if g.players.len() >= g.max_players {
                    return Err(GameError::JoinRefused(
                        "the deck doesn't have enough cards for another player".to_string(),
                    ));
                }

                if let Some(progress) = &mut g.progress {
                    progress.add_player(&player);
                }
                g.players.push(player);
                Ok(g.channel.clone())
            })
            .await??;

        // Hand setup is critical: if the player can't be reached, undo the
        // join instead of leaving a dead seat in the roster.
        if let Err(e) = self.setup_player_hand(game_id, user_id).await {
            self.with_game_mut(game_id, |g| {
                g.players.retain(|p| p.id != player_id);
                if let Some(progress) = &mut g.progress {
                    progress.remove_player(&player_id);
                }
            })
            .await?;
            return Err(e);
        }
        self.deal_player_cards(game_id, user_id).await?;
        self.update_progress_message(game_id).await;
        self.announce(&channel, &format!("{} joined the game!", display_name))
            .await;
        Ok(())
    }

    /// Entry point: a participant leaves. All of their owned cards go
    /// back to the pool unconditionally; chooser and ownership roles are
    /// reassigned; dropping below the minimum roster force-ends the game.
    pub async fn player_leave(&self, game_id: &str, user_id: &str) -> GameResult<()> {
        let effects = self
            .with_game_mut(game_id, |g| -> GameResult<LeaveEffects> {
                let Some(index) = g.players.iter().position(|p| p.user_id == user_id) else {
                    return Err(GameError::PlayerNotFound(user_id.to_string()));
                };

                let mut effects = LeaveEffects {
                    channel: g.channel.clone(),
                    deck_name: g.deck_name.clone(),
                    released: Vec::new(),
                    messages: Vec::new(),
                    open_escape_hatch: false,
                    new_owner: None,
                };
                let player_id = g.players[index].id.clone();
                let display_name = g.players[index].display_name.clone();
                let was_chooser = g.players[index].is_chooser;

                // Release first, and clear the slots so nothing later in
                // the player's lifecycle can release the same cards again.
                effects.released = g.players[index].held_cards();
                for slot in &mut g.players[index].hand {
                    slot.card = None;
                }

                if !g.started {
                    g.players.remove(index);
                } else {
                    match g.phase {
                        GamePhase::Setup => {
                            // Dealing fan-out may still be touching this
                            // player; mark now, purge at PlayRound entry.
                            g.players_left_during_setup.push(player_id.clone());
                        }
                        GamePhase::PlayRound => {
                            if was_chooser {
                                // rotate_chooser clears the leaver's flag
                                // and advances from their position
                                if let Some(name) = g.rotate_chooser() {
                                    effects
                                        .messages
                                        .push(format!("{} is now the card chooser!", name));
                                }
                                // The new chooser no longer submits this
                                // round; clear any submission they made.
                                let chooser_id = g.chooser().map(|c| c.id.clone());
                                if let Some(chooser_id) = chooser_id {
                                    if let Some(chooser) =
                                        g.players.iter_mut().find(|p| p.id == chooser_id)
                                    {
                                        chooser.has_submitted = false;
                                        chooser.submitted_cards.clear();
                                    }
                                    if let Some(progress) = &mut g.progress {
                                        progress.remove_player(&chooser_id);
                                    }
                                }
                            }
                            if let Some(progress) = &mut g.progress {
                                progress.remove_player(&player_id);
                            }
                            g.players.remove(index);
                        }
                        GamePhase::PostRound => {
                            if was_chooser {
                                g.players[index].is_chooser = false;
                                effects.messages.push(
                                    "The card chooser left the game! Any selection will now end \
                                     the round; the winner will be chosen at random."
                                        .to_string(),
                                );
                                effects.open_escape_hatch = true;
                            }
                            g.players.remove(index);
                        }
                        GamePhase::GameOver => {
                            g.players.remove(index);
                        }
                    }
                }

                effects
                    .messages
                    .push(format!("{} left the game.", display_name));

                if g.effective_player_count() < self.config.min_players {
                    g.force_shutdown("There aren't enough players left to continue the game.");
                } else if g.started && g.owner == user_id {
                    let candidates: Vec<UserId> = g
                        .players
                        .iter()
                        .filter(|p| {
                            p.user_id != user_id
                                && !g.players_left_during_setup.contains(&p.id)
                        })
                        .map(|p| p.user_id.clone())
                        .collect();
                    if let Some(new_owner) = candidates.choose(&mut rand::rng()) {
                        effects
                            .messages
                            .push("The deck master has left the game!".to_string());
                        effects.new_owner = Some(new_owner.clone());
                    }
                }

                Ok(effects)
            })
            .await??;

        if !effects.released.is_empty() {
            self.release_cards(&effects.deck_name, &effects.released).await;
        }
        for message in &effects.messages {
            self.announce(&effects.channel, message).await;
        }
        if effects.open_escape_hatch {
            self.open_menu_escape_hatch(game_id).await;
        }
        if let Some(new_owner) = effects.new_owner {
            self.set_owner(game_id, &new_owner).await?;
        }
        self.update_progress_message(game_id).await;
        Ok(())
    }

    /// Hand game ownership to another participant. Tears down the old
    /// owner's admin menu, if one is open.
    pub async fn set_owner(&self, game_id: &str, user_id: &str) -> GameResult<()> {
        let channel = self
            .with_game_mut(game_id, |g| -> GameResult<ChannelHandle> {
                if g.player(user_id).is_none() {
                    return Err(GameError::PlayerNotFound(user_id.to_string()));
                }
                g.owner = user_id.to_string();
                Ok(g.channel.clone())
            })
            .await??;

        let stale_menus: Vec<MenuId> = {
            let menus = self.menus.read().await;
            menus
                .values()
                .filter(|m| {
                    m.game_id.as_deref() == Some(game_id) && m.kind == MenuKind::ConfigMenu
                })
                .map(|m| m.id.clone())
                .collect()
        };
        for menu_id in stale_menus {
            self.cancel_menu(&menu_id).await;
        }

        self.announce(&channel, &format!("The deck master is now <@{}>! 🙇", user_id))
            .await;
        crate::transport::best_effort(
            self.transport
                .send_direct_message(
                    &user_id.to_string(),
                    &format!("You are now deck master of the game in <#{}>!", channel),
                )
                .await,
            "deck master DM",
        );
        Ok(())
    }

    /// One-shot per game: return the whole hand to the pool and deal a
    /// fresh one.
    pub async fn redeal_player(&self, game_id: &str, user_id: &str) -> GameResult<()> {
        let (deck_name, released) = self
            .with_game_mut(game_id, |g| -> GameResult<(String, Vec<CardId>)> {
                let deck_name = g.deck_name.clone();
                let Some(player) = g.player_mut(user_id) else {
                    return Err(GameError::PlayerNotFound(user_id.to_string()));
                };
                if player.has_redealt {
                    return Err(GameError::InvalidSubmission(
                        "you can only redeal once per game".to_string(),
                    ));
                }
                player.has_redealt = true;
                let released = player.held_cards();
                for slot in &mut player.hand {
                    slot.card = None;
                }
                Ok((deck_name, released))
            })
            .await??;

        self.release_cards(&deck_name, &released).await;
        self.deal_player_cards(game_id, user_id).await
    }

    /// Open the deck-master admin menu in the owner's DMs and act on
    /// whatever they pick. Currently the menu's one action is handing
    /// ownership to another player.
    pub async fn run_config_menu(&self, game_id: &str) -> GameResult<()> {
        let owner = self.with_game(game_id, |g| g.owner.clone()).await?;

        let (mut menu, rx) =
            crate::menu::SelectionMenu::config_menu(game_id.to_string(), owner.clone());
        menu.message = crate::transport::best_effort(
            self.transport
                .send_direct_message(&owner, &menu.render())
                .await,
            "config menu",
        );

        let outcome = self
            .run_menu(
                menu,
                rx,
                std::time::Duration::from_secs(self.config.timeouts.config_menu_secs),
            )
            .await;

        match outcome {
            crate::menu::MenuOutcome::Triggered(options)
                if options.len() == 1
                    && options[0].reference == crate::menu::OPT_TRANSFER_OWNER =>
            {
                self.run_owner_picker(game_id).await
            }
            _ => Ok(()),
        }
    }

    /// Ask the owner to pick a successor, with a uniformly random fallback
    /// on timeout or ambiguity. Never stalls ownership transfer.
    pub async fn run_owner_picker(&self, game_id: &str) -> GameResult<()> {
        let (owner, channel, candidates) = self
            .with_game(game_id, |g| {
                let candidates: Vec<(UserId, String)> = g
                    .players
                    .iter()
                    .filter(|p| p.user_id != g.owner)
                    .map(|p| (p.user_id.clone(), p.display_name.clone()))
                    .collect();
                (g.owner.clone(), g.channel.clone(), candidates)
            })
            .await?;
        if candidates.is_empty() {
            return Ok(());
        }

        let mut options: Vec<crate::menu::MenuOption> = candidates
            .iter()
            .map(|(user, name)| {
                crate::menu::MenuOption::trigger(user, name).with_value(user)
            })
            .collect();
        options.push(crate::menu::MenuOption::trigger(
            crate::menu::OPT_RANDOM_PLAYER,
            "Pick Random Player",
        ));
        let page = crate::menu::MenuPage {
            title: "New Deck Master".to_string(),
            body: "Who should be the new deck master?".to_string(),
            image_url: None,
            options,
        };
        let (mut menu, rx) = crate::menu::SelectionMenu::new(
            MenuKind::ConfigMenu,
            Some(game_id.to_string()),
            Some(owner.clone()),
            false,
            vec![page],
        );
        menu.message = crate::transport::best_effort(
            self.transport
                .send_direct_message(&owner, &menu.render())
                .await,
            "owner picker",
        );

        let outcome = self
            .run_menu(
                menu,
                rx,
                std::time::Duration::from_secs(self.config.timeouts.player_picker_secs),
            )
            .await;

        let pick_random = |candidates: &[(UserId, String)]| {
            candidates
                .choose(&mut rand::rng())
                .map(|(user, _)| user.clone())
        };

        let new_owner = match outcome {
            crate::menu::MenuOutcome::Cancelled => return Ok(()),
            crate::menu::MenuOutcome::Triggered(options)
                if options.len() == 1
                    && options[0].reference != crate::menu::OPT_RANDOM_PLAYER
                    && options[0].value.is_some() =>
            {
                options[0].value.clone()
            }
            crate::menu::MenuOutcome::Triggered(options)
                if options.len() == 1
                    && options[0].reference == crate::menu::OPT_RANDOM_PLAYER =>
            {
                pick_random(&candidates)
            }
            _ => {
                self.announce(
                    &channel,
                    "An unexpected error occurred when picking the new deck master. \
                     Picking one at random...",
                )
                .await;
                pick_random(&candidates)
            }
        };

        match new_owner {
            Some(new_owner) => self.set_owner(game_id, &new_owner).await,
            None => Ok(()),
        }
    }
}
