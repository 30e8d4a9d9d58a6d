//! Post-round judging: present the round's submissions to the chooser
//! and award the win. Every failure path here degrades to a random but
//! valid winner; a round never stalls in judging.

use super::AppState;
use crate::config::PresentationMethod;
use crate::error::{GameError, GameResult};
use crate::menu::{MenuKind, MenuOption, MenuOutcome, MenuPage, SelectionMenu, OPT_ACCEPT};
use crate::types::*;
use rand::seq::{IndexedRandom, SliceRandom};
use std::collections::HashMap;
use std::time::Duration;

/// How the chooser's review menu ended
enum ReviewVerdict {
    Winner(UserId),
    TimedOut,
    Ambiguous,
    Cancelled,
}

impl AppState {
    pub(super) async fn phase_post_round(&self, game_id: &str) -> GameResult<bool> {
        self.pick_winning_cards(game_id).await?;
        Ok(true)
    }

    async fn pick_winning_cards(&self, game_id: &str) -> GameResult<()> {
        if self.shutdown_requested(game_id).await {
            return Ok(());
        }

        let (channel, deck_name, chooser_user, prompt, mut contenders) = self
            .with_game(game_id, |g| {
                let contenders: Vec<(UserId, String, Vec<CardId>)> = g
                    .players
                    .iter()
                    .filter(|p| !p.is_chooser && p.has_submitted)
                    .map(|p| {
                        (
                            p.user_id.clone(),
                            p.display_name.clone(),
                            p.submitted_cards.clone(),
                        )
                    })
                    .collect();
                (
                    g.channel.clone(),
                    g.deck_name.clone(),
                    g.chooser().map(|c| c.user_id.clone()),
                    g.current_prompt.clone(),
                    contenders,
                )
            })
            .await?;

        if contenders.is_empty() {
            tracing::warn!("Round in game {} ended with nothing to judge", game_id);
            return Ok(());
        }

        // Submission order is randomized every round
        contenders.shuffle(&mut rand::rng());

        let card_texts: HashMap<CardId, String> = {
            let decks = self.decks.read().await;
            let deck = decks.get(&deck_name);
            contenders
                .iter()
                .flat_map(|(_, _, cards)| cards.iter())
                .map(|id| {
                    let text = deck
                        .and_then(|d| d.answers.get(id))
                        .map(|c| c.text.clone())
                        .unwrap_or_else(|| "[missing card]".to_string());
                    (id.clone(), text)
                })
                .collect()
        };

        let verdict = match &chooser_user {
            Some(chooser_user) => {
                self.run_review_menu(
                    game_id,
                    &channel,
                    chooser_user,
                    prompt.as_ref().map(|p| p.required_answers).unwrap_or(1),
                    &contenders,
                    &card_texts,
                )
                .await
            }
            // Chooser already gone entirely
            None => ReviewVerdict::Ambiguous,
        };

        let winner_user = match verdict {
            ReviewVerdict::Cancelled => return Ok(()),
            ReviewVerdict::Winner(user)
                if contenders.iter().any(|(u, _, _)| *u == user) =>
            {
                user
            }
            ReviewVerdict::TimedOut => {
                self.announce(
                    &channel,
                    "The card chooser ran out of time! Picking a winner at random...",
                )
                .await;
                self.random_contender(game_id, &contenders)?
            }
            ReviewVerdict::Winner(_) | ReviewVerdict::Ambiguous => {
                self.announce(
                    &channel,
                    "An unexpected error occurred when selecting the winner. \
                     Picking a winner at random...",
                )
                .await;
                self.random_contender(game_id, &contenders)?
            }
        };

        let award = self
            .with_game_mut(game_id, |g| {
                g.player_mut(&winner_user).map(|p| {
                    p.points += 1;
                    (p.display_name.clone(), p.submitted_cards.clone())
                })
            })
            .await?;

        match award {
            Some((name, cards)) => {
                let submission: Vec<String> = cards
                    .iter()
                    .map(|id| card_texts.get(id).cloned().unwrap_or_default())
                    .collect();
                self.announce(
                    &channel,
                    &format!("{} wins the round!\n> {}", name, submission.join(" / ")),
                )
                .await;
                self.stats.increment_round_wins(&winner_user).await;
            }
            // Winner left between selection and award; the round still ends
            None => {
                tracing::warn!(
                    "Winner {} left game {} before the award",
                    winner_user,
                    game_id
                );
            }
        }
        Ok(())
    }

    fn random_contender(
        &self,
        game_id: &str,
        contenders: &[(UserId, String, Vec<CardId>)],
    ) -> GameResult<UserId> {
        tracing::warn!(
            "{}",
            GameError::MenuResolutionAmbiguous(format!("review menu in game {}", game_id))
        );
        contenders
            .choose(&mut rand::rng())
            .map(|(user, _, _)| user.clone())
            .ok_or_else(|| {
                GameError::InternalConsistency("no contenders for random fallback".to_string())
            })
    }

    /// Build and run the chooser's review menu: one page per submitted
    /// card (sequential) or one page per player (merged). Each page's
    /// accept trigger carries the page's player.
    async fn run_review_menu(
        &self,
        game_id: &str,
        channel: &ChannelHandle,
        chooser_user: &UserId,
        required_answers: u32,
        contenders: &[(UserId, String, Vec<CardId>)],
        card_texts: &HashMap<CardId, String>,
    ) -> ReviewVerdict {
        let sequential =
            self.config.presentation == PresentationMethod::Sequential || required_answers == 1;
        let total = contenders.len();
        let mut pages = Vec::new();

        if sequential {
            for (player_num, (user, _, cards)) in contenders.iter().enumerate() {
                for (card_num, card) in cards.iter().enumerate() {
                    let footer = if required_answers > 1 {
                        format!(
                            "Card {} | Player {} of {}",
                            card_num + 1,
                            player_num + 1,
                            total
                        )
                    } else {
                        format!("Player {} of {}", player_num + 1, total)
                    };
                    pages.push(MenuPage {
                        title: "Submissions".to_string(),
                        body: format!(
                            "{}\n{}",
                            card_texts.get(card).cloned().unwrap_or_default(),
                            footer
                        ),
                        image_url: None,
                        options: vec![
                            MenuOption::trigger(OPT_ACCEPT, "Select winning player")
                                .with_value(user),
                        ],
                    });
                }
            }
        } else {
            for (player_num, (user, _, cards)) in contenders.iter().enumerate() {
                let merged: Vec<String> = cards
                    .iter()
                    .map(|id| card_texts.get(id).cloned().unwrap_or_default())
                    .collect();
                pages.push(MenuPage {
                    title: "Submissions".to_string(),
                    body: format!(
                        "{}\nPlayer {} of {}",
                        merged.join(" / "),
                        player_num + 1,
                        total
                    ),
                    image_url: None,
                    options: vec![
                        MenuOption::trigger(OPT_ACCEPT, "Select winning player").with_value(user),
                    ],
                });
            }
        }

        let kind = if sequential {
            MenuKind::SequentialReview
        } else {
            MenuKind::MergedReview
        };
        let (mut menu, rx) = SelectionMenu::review(
            kind,
            game_id.to_string(),
            chooser_user.clone(),
            pages,
        );

        self.announce(channel, "The submissions are in! But who wins?").await;
        self.post_menu(channel, &mut menu).await;
        let message = menu.message.clone();

        let outcome = self
            .run_menu(
                menu,
                rx,
                Duration::from_secs(self.config.timeouts.submissions_review_secs),
            )
            .await;

        if let Some(message) = message {
            let _ = self.transport.delete_message(&message).await;
        }

        match outcome {
            MenuOutcome::Triggered(options) if options.len() == 1 => options[0]
                .value
                .clone()
                .map(ReviewVerdict::Winner)
                .unwrap_or(ReviewVerdict::Ambiguous),
            MenuOutcome::Triggered(_) => ReviewVerdict::Ambiguous,
            MenuOutcome::TimedOut(_) => ReviewVerdict::TimedOut,
            MenuOutcome::Cancelled => ReviewVerdict::Cancelled,
        }
    }
}
