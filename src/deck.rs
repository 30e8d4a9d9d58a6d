//! Card supply for one deck: expansion pools partitioned into unseen and
//! seen cards, with exhaust-and-reshuffle recycling.
//!
//! A card is in exactly one of three states: available (unseen), seen and
//! unowned, or held in a player's hand (owned, physically in the seen
//! pool). All mutations go through `&mut self`, so a deck behind a lock is
//! linearizable.

use crate::error::{GameError, GameResult};
use crate::types::{CardId, PlayerId};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fallback artwork for the blank card backs when the deck metadata
/// doesn't carry its own.
pub const DEFAULT_BLANK_ANSWER_URL: &str = "https://example.invalid/cards/blank-white.png";
pub const DEFAULT_BLANK_PROMPT_URL: &str = "https://example.invalid/cards/blank-black.png";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerCard {
    pub id: CardId,
    pub text: String,
    pub url: String,
    pub expansion: String,
    /// The player currently holding this card, if any
    pub owner: Option<PlayerId>,
}

impl AnswerCard {
    pub fn is_owned(&self) -> bool {
        self.owner.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptCard {
    pub id: CardId,
    pub text: String,
    pub url: String,
    pub expansion: String,
    /// Number of answer-card slots this prompt exposes
    pub required_answers: u32,
}

/// One expansion's share of the deck, partitioned into unseen and seen.
/// Owned answer cards live in `seen_answers`; `owned_count` tracks how
/// many of them are currently held in hands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpansionPool {
    pub unseen_answers: Vec<CardId>,
    pub seen_answers: Vec<CardId>,
    pub unseen_prompts: Vec<CardId>,
    pub seen_prompts: Vec<CardId>,
    pub owned_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    pub name: String,
    /// Expansion names in metadata order
    pub expansion_names: Vec<String>,
    pub pools: HashMap<String, ExpansionPool>,
    pub answers: HashMap<CardId, AnswerCard>,
    pub prompts: HashMap<CardId, PromptCard>,
    /// Blank filler cards shown in empty hand slots
    pub blank_answer_url: String,
    pub blank_prompt_url: String,
}

/// Aggregate answer-card counts used for the conservation check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerCounts {
    /// Unseen, available to deal
    pub available: usize,
    /// Seen and unowned, back in circulation
    pub seen: usize,
    /// Currently held in hands
    pub owned: usize,
}

impl AnswerCounts {
    pub fn total(&self) -> usize {
        self.available + self.seen + self.owned
    }
}

// ========== Deck metadata ==========

/// The JSON shape of deck metadata. Prompt cards derive their
/// required-answer count from underscore placeholders in the card text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckMeta {
    pub deck_name: String,
    pub expansions: HashMap<String, ExpansionMeta>,
    #[serde(default)]
    pub white_back: Option<String>,
    #[serde(default)]
    pub black_back: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpansionMeta {
    #[serde(default)]
    pub white: Vec<CardMeta>,
    #[serde(default)]
    pub black: Vec<CardMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardMeta {
    pub text: String,
    #[serde(default)]
    pub url: String,
}

/// Count the underscore-delimited placeholders in a prompt card's text.
/// Consecutive underscores form a single blank.
pub fn required_answers(text: &str) -> u32 {
    let mut count = 0;
    let mut in_run = false;
    for c in text.chars() {
        if c == '_' {
            if !in_run {
                count += 1;
                in_run = true;
            }
        } else {
            in_run = false;
        }
    }
    count
}

impl Deck {
    /// Build a deck from validated metadata. Unnamed and empty expansions
    /// are skipped, as are prompt cards with no `_` placeholder. Fails if
    /// the result would have no answer cards or no prompt cards at all.
    pub fn from_meta(meta: &DeckMeta) -> GameResult<Self> {
        if meta.expansions.is_empty() {
            return Err(GameError::InvalidDeck(
                "deck metadata has no expansions".to_string(),
            ));
        }

        let mut deck = Deck {
            name: meta.deck_name.clone(),
            expansion_names: Vec::new(),
            pools: HashMap::new(),
            answers: HashMap::new(),
            prompts: HashMap::new(),
            blank_answer_url: meta
                .white_back
                .clone()
                .unwrap_or_else(|| DEFAULT_BLANK_ANSWER_URL.to_string()),
            blank_prompt_url: meta
                .black_back
                .clone()
                .unwrap_or_else(|| DEFAULT_BLANK_PROMPT_URL.to_string()),
        };

        let mut names: Vec<&String> = meta.expansions.keys().collect();
        names.sort();
        for name in names {
            let expansion = &meta.expansions[name];
            if name.is_empty() {
                tracing::warn!("Skipping unnamed expansion in deck {}", meta.deck_name);
                continue;
            }
            if expansion.white.is_empty() && expansion.black.is_empty() {
                tracing::warn!("Skipping empty expansion {:?} in deck {}", name, meta.deck_name);
                continue;
            }

            let mut pool = ExpansionPool::default();
            for card in &expansion.white {
                let answer = AnswerCard {
                    id: ulid::Ulid::new().to_string(),
                    text: card.text.clone(),
                    url: card.url.clone(),
                    expansion: name.clone(),
                    owner: None,
                };
                pool.unseen_answers.push(answer.id.clone());
                deck.answers.insert(answer.id.clone(), answer);
            }

            let mut dropped = 0;
            for card in &expansion.black {
                let required = required_answers(&card.text);
                if required == 0 {
                    dropped += 1;
                    continue;
                }
                let prompt = PromptCard {
                    id: ulid::Ulid::new().to_string(),
                    text: card.text.clone(),
                    url: card.url.clone(),
                    expansion: name.clone(),
                    required_answers: required,
                };
                pool.unseen_prompts.push(prompt.id.clone());
                deck.prompts.insert(prompt.id.clone(), prompt);
            }
            if dropped > 0 {
                tracing::warn!(
                    "Ignoring {} prompt cards with no answer slots in expansion {:?}",
                    dropped,
                    name
                );
            }

            deck.expansion_names.push(name.clone());
            deck.pools.insert(name.clone(), pool);
        }

        if deck.answers.is_empty() {
            return Err(GameError::InvalidDeck(
                "deck has no answer cards".to_string(),
            ));
        }
        if deck.prompts.is_empty() {
            return Err(GameError::InvalidDeck(
                "deck has no prompt cards".to_string(),
            ));
        }

        Ok(deck)
    }

    /// Restrict the requested expansion names to ones this deck knows;
    /// an empty request means every expansion.
    fn resolve_expansions(&self, requested: &[String]) -> Vec<String> {
        if requested.is_empty() {
            return self.expansion_names.clone();
        }
        requested
            .iter()
            .filter(|name| self.pools.contains_key(*name))
            .cloned()
            .collect()
    }

    /// Draw an answer card uniformly at random from the unseen pools of
    /// the given expansions, marking it owned by `owner` and moving it
    /// into the seen pool.
    ///
    /// When every requested unseen pool is empty, the seen pools are
    /// recycled system-wide first, but only if that yields at least one
    /// eligible (unowned) card. Returns None, never errors, when every
    /// card in the requested expansions is already owned.
    pub fn draw_random_answer(
        &mut self,
        expansions: &[String],
        owner: &PlayerId,
    ) -> Option<AnswerCard> {
        let names = self.resolve_expansions(expansions);
        if names.is_empty() {
            tracing::warn!("Answer draw requested for unknown expansions: {:?}", expansions);
            return None;
        }

        let all_unseen_empty = names
            .iter()
            .all(|n| self.pools[n].unseen_answers.is_empty());
        if all_unseen_empty {
            let any_recyclable = names.iter().any(|n| {
                self.pools[n]
                    .seen_answers
                    .iter()
                    .any(|id| !self.answers[id].is_owned())
            });
            if any_recyclable {
                self.recycle_answers();
            }
        }

        // Unseen cards are never owned, so every candidate is eligible.
        let candidates: Vec<(String, CardId)> = names
            .iter()
            .flat_map(|n| {
                self.pools[n]
                    .unseen_answers
                    .iter()
                    .map(|id| (n.clone(), id.clone()))
            })
            .collect();

        let (expansion, card_id) = match candidates.choose(&mut rand::rng()) {
            Some(pick) => pick.clone(),
            None => {
                tracing::warn!(
                    "All answer cards are already owned in expansions: {}",
                    names.join(", ")
                );
                return None;
            }
        };

        let pool = self.pools.get_mut(&expansion)?;
        pool.unseen_answers.retain(|id| id != &card_id);
        pool.seen_answers.push(card_id.clone());
        pool.owned_count += 1;

        let card = self.answers.get_mut(&card_id)?;
        card.owner = Some(owner.clone());
        Some(card.clone())
    }

    /// Draw a prompt card uniformly at random from the unseen prompt pools
    /// of the given expansions, recycling seen prompts system-wide when
    /// every requested unseen pool is empty. Prompt cards are never owned,
    /// so this only fails if the requested expansions contain no prompt
    /// cards at all, which deck construction is supposed to rule out.
    pub fn draw_random_prompt(&mut self, expansions: &[String]) -> GameResult<PromptCard> {
        let names = self.resolve_expansions(expansions);

        let all_unseen_empty = names
            .iter()
            .all(|n| self.pools[n].unseen_prompts.is_empty());
        if all_unseen_empty {
            let any_seen = names.iter().any(|n| !self.pools[n].seen_prompts.is_empty());
            if !any_seen {
                return Err(GameError::CardSupplyExhausted(format!(
                    "no prompt cards in expansions: {}",
                    names.join(", ")
                )));
            }
            for pool in self.pools.values_mut() {
                let recycled = std::mem::take(&mut pool.seen_prompts);
                pool.unseen_prompts.extend(recycled);
            }
        }

        let candidates: Vec<(String, CardId)> = names
            .iter()
            .flat_map(|n| {
                self.pools[n]
                    .unseen_prompts
                    .iter()
                    .map(|id| (n.clone(), id.clone()))
            })
            .collect();

        let (expansion, card_id) = candidates
            .choose(&mut rand::rng())
            .cloned()
            .ok_or_else(|| {
                GameError::CardSupplyExhausted(format!(
                    "no prompt cards in expansions: {}",
                    names.join(", ")
                ))
            })?;

        let pool = self
            .pools
            .get_mut(&expansion)
            .ok_or_else(|| GameError::InternalConsistency(format!("missing pool {}", expansion)))?;
        pool.unseen_prompts.retain(|id| id != &card_id);
        pool.seen_prompts.push(card_id.clone());

        self.prompts
            .get(&card_id)
            .cloned()
            .ok_or_else(|| GameError::InternalConsistency(format!("missing prompt {}", card_id)))
    }

    /// Return an owned answer card to circulation (seen, unowned).
    /// Releasing an unowned card is a caller bug that would corrupt the
    /// owned-count invariant, so it is surfaced as an internal error
    /// rather than ignored.
    pub fn release(&mut self, card_id: &str) -> GameResult<()> {
        let expansion = match self.answers.get_mut(card_id) {
            Some(card) => {
                if card.owner.is_none() {
                    return Err(GameError::InternalConsistency(format!(
                        "double release of card {} ({:?})",
                        card_id, card.text
                    )));
                }
                card.owner = None;
                card.expansion.clone()
            }
            None => {
                return Err(GameError::InternalConsistency(format!(
                    "release of unknown card {}",
                    card_id
                )))
            }
        };

        let pool = self
            .pools
            .get_mut(&expansion)
            .ok_or_else(|| GameError::InternalConsistency(format!("missing pool {}", expansion)))?;
        if pool.owned_count == 0 {
            return Err(GameError::InternalConsistency(format!(
                "owned-count underflow in expansion {}",
                expansion
            )));
        }
        pool.owned_count -= 1;
        Ok(())
    }

    /// Move every unowned seen answer card back into its unseen pool,
    /// across all expansions. Owned cards stay in the seen pool until
    /// released.
    fn recycle_answers(&mut self) {
        for (name, pool) in self.pools.iter_mut() {
            let seen = std::mem::take(&mut pool.seen_answers);
            for id in seen {
                if self.answers[&id].is_owned() {
                    pool.seen_answers.push(id);
                } else {
                    pool.unseen_answers.push(id);
                }
            }
            tracing::debug!("Recycled seen answers in expansion {:?}", name);
        }
    }

    pub fn answer_counts(&self, expansions: &[String]) -> AnswerCounts {
        let names = self.resolve_expansions(expansions);
        let mut counts = AnswerCounts {
            available: 0,
            seen: 0,
            owned: 0,
        };
        for name in &names {
            let pool = &self.pools[name];
            counts.available += pool.unseen_answers.len();
            counts.owned += pool.owned_count;
            counts.seen += pool.seen_answers.len() - pool.owned_count;
        }
        counts
    }

    /// Total answer cards in the given expansions, used to derive the
    /// player cap for a game.
    pub fn total_answer_cards(&self, expansions: &[String]) -> usize {
        let names = self.resolve_expansions(expansions);
        names
            .iter()
            .map(|n| {
                let pool = &self.pools[n];
                pool.unseen_answers.len() + pool.seen_answers.len()
            })
            .sum()
    }

    pub fn total_prompt_cards(&self, expansions: &[String]) -> usize {
        let names = self.resolve_expansions(expansions);
        names
            .iter()
            .map(|n| {
                let pool = &self.pools[n];
                pool.unseen_prompts.len() + pool.seen_prompts.len()
            })
            .sum()
    }
}
