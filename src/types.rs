use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type GameId = String;
pub type PlayerId = String;
pub type UserId = String;
pub type CardId = String;
pub type MenuId = String;
pub type TaskId = String;
pub type ChannelHandle = String;

/// Handle to a message previously sent through the transport,
/// used for later edits and deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHandle {
    pub id: String,
    pub channel: ChannelHandle,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    Setup,
    PlayRound,
    PostRound,
    GameOver,
}

impl GamePhase {
    /// The next phase in the fixed cycle. GameOver wraps back to Setup;
    /// whether the game actually continues is decided in the GameOver phase.
    pub fn next(self) -> GamePhase {
        match self {
            GamePhase::Setup => GamePhase::PlayRound,
            GamePhase::PlayRound => GamePhase::PostRound,
            GamePhase::PostRound => GamePhase::GameOver,
            GamePhase::GameOver => GamePhase::Setup,
        }
    }
}

/// Number of rounds a game is configured to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rounds {
    Fixed(u32),
    Unlimited,
}

/// One slot in a player's hand. Holds at most one answer card, plus the
/// DM message the slot is rendered into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSlot {
    pub card: Option<CardId>,
    pub message: Option<MessageHandle>,
}

impl CardSlot {
    pub fn empty(message: Option<MessageHandle>) -> Self {
        Self {
            card: None,
            message,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.card.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    /// The participant's identity on the chat platform
    pub user_id: UserId,
    pub display_name: String,
    pub hand: Vec<CardSlot>,
    pub has_submitted: bool,
    /// Submitted cards in the order the player played them
    pub submitted_cards: Vec<CardId>,
    pub is_chooser: bool,
    /// One-shot per game
    pub has_redealt: bool,
    pub points: u32,
}

impl Player {
    pub fn new(user_id: UserId, display_name: String) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            user_id,
            display_name,
            hand: Vec::new(),
            has_submitted: false,
            submitted_cards: Vec::new(),
            is_chooser: false,
            has_redealt: false,
            points: 0,
        }
    }

    /// Card ids currently held in hand slots
    pub fn held_cards(&self) -> Vec<CardId> {
        self.hand.iter().filter_map(|s| s.card.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub channel: ChannelHandle,
    /// The administrative owner ("deck master"), by user identity
    pub owner: UserId,
    pub deck_name: String,
    pub expansion_names: Vec<String>,
    pub phase: GamePhase,
    pub players: Vec<Player>,
    pub current_prompt: Option<crate::deck::PromptCard>,
    /// Rotating index into `players`; the chooser flag on the player is
    /// authoritative, this only drives the rotation.
    pub chooser_index: usize,
    pub rounds: Rounds,
    pub current_round: u32,
    pub shutdown_override: bool,
    pub shutdown_reason: String,
    pub started: bool,
    /// Players who left while the Setup phase was dealing; purged at the
    /// start of PlayRound rather than immediately.
    pub players_left_during_setup: Vec<PlayerId>,
    pub allow_new_players: bool,
    pub max_players: usize,
    pub waiting_for_submissions: bool,
    /// The "waiting for submissions" progress message, edited in place
    pub progress: Option<SubmissionsProgress>,
}

impl Game {
    pub fn chooser(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_chooser)
    }

    pub fn player(&self, user_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.user_id == user_id)
    }

    pub fn player_mut(&mut self, user_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.user_id == user_id)
    }

    /// True once every non-chooser player has confirmed a submission
    pub fn all_players_submitted(&self) -> bool {
        self.players.iter().all(|p| p.is_chooser || p.has_submitted)
    }

    /// Players counted towards the minimum-player check. Players who left
    /// during Setup are still in `players` until purged, so they are
    /// excluded here.
    pub fn effective_player_count(&self) -> usize {
        self.players
            .iter()
            .filter(|p| !self.players_left_during_setup.contains(&p.id))
            .count()
    }

    pub fn force_shutdown(&mut self, reason: impl Into<String>) {
        self.shutdown_override = true;
        self.shutdown_reason = reason.into();
    }

    /// Advance the chooser to the next player in rotation (wrap-around).
    /// Rotation starts from the current chooser's actual position, so it
    /// stays correct when leavers have shifted the roster under
    /// `chooser_index`. Returns the new chooser's display name.
    pub fn rotate_chooser(&mut self) -> Option<String> {
        if self.players.is_empty() {
            return None;
        }
        let base = match self.players.iter().position(|p| p.is_chooser) {
            Some(pos) => {
                self.players[pos].is_chooser = false;
                pos
            }
            None => self.chooser_index.min(self.players.len() - 1),
        };
        self.chooser_index = (base + 1) % self.players.len();
        let chooser = &mut self.players[self.chooser_index];
        chooser.is_chooser = true;
        Some(chooser.display_name.clone())
    }

    /// Reset every player's submission state for a fresh round
    pub fn reset_submissions(&mut self) {
        for player in &mut self.players {
            player.has_submitted = false;
            player.submitted_cards.clear();
        }
    }
}

/// Per-player submission status rendered into the channel while the game
/// waits for submissions. The message is edited as players submit,
/// join, and leave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionsProgress {
    pub message: MessageHandle,
    /// (player id, display name, has submitted), in roster order
    pub entries: Vec<(PlayerId, String, bool)>,
}

impl SubmissionsProgress {
    pub fn new(message: MessageHandle, players: &[Player]) -> Self {
        let entries = players
            .iter()
            .filter(|p| !p.is_chooser)
            .map(|p| (p.id.clone(), p.display_name.clone(), false))
            .collect();
        Self { message, entries }
    }

    pub fn mark_submitted(&mut self, player_id: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|(id, _, _)| id == player_id) {
            entry.2 = true;
        }
    }

    pub fn add_player(&mut self, player: &Player) {
        self.entries
            .push((player.id.clone(), player.display_name.clone(), false));
    }

    pub fn remove_player(&mut self, player_id: &str) {
        self.entries.retain(|(id, _, _)| id != player_id);
    }

    pub fn render(&self) -> String {
        let lines: Vec<String> = self
            .entries
            .iter()
            .map(|(_, name, submitted)| {
                if *submitted {
                    format!("{name}: submitted ✅")
                } else {
                    format!("{name}: choosing cards... ⏳")
                }
            })
            .collect();
        format!("Waiting for submissions...\n{}", lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_game(players: Vec<Player>) -> Game {
        Game {
            id: "g".into(),
            channel: "c".into(),
            owner: "u1".into(),
            deck_name: "d".into(),
            expansion_names: vec![],
            phase: GamePhase::PlayRound,
            players,
            current_prompt: None,
            chooser_index: 0,
            rounds: Rounds::Fixed(3),
            current_round: 1,
            shutdown_override: false,
            shutdown_reason: String::new(),
            started: true,
            players_left_during_setup: vec![],
            allow_new_players: true,
            max_players: 4,
            waiting_for_submissions: false,
            progress: None,
        }
    }

    #[test]
    fn test_phase_cycle() {
        assert_eq!(GamePhase::Setup.next(), GamePhase::PlayRound);
        assert_eq!(GamePhase::PlayRound.next(), GamePhase::PostRound);
        assert_eq!(GamePhase::PostRound.next(), GamePhase::GameOver);
        assert_eq!(GamePhase::GameOver.next(), GamePhase::Setup);
    }

    #[test]
    fn test_all_players_submitted_ignores_chooser() {
        let mut alice = Player::new("u1".into(), "Alice".into());
        alice.is_chooser = true;
        let mut bob = Player::new("u2".into(), "Bob".into());
        bob.has_submitted = true;
        let game = test_game(vec![alice, bob]);
        assert!(game.all_players_submitted());
    }

    #[test]
    fn test_effective_player_count_excludes_setup_leavers() {
        let alice = Player::new("u1".into(), "Alice".into());
        let bob = Player::new("u2".into(), "Bob".into());
        let bob_id = bob.id.clone();
        let mut game = test_game(vec![alice, bob]);
        assert_eq!(game.effective_player_count(), 2);

        game.players_left_during_setup.push(bob_id);
        assert_eq!(game.effective_player_count(), 1);
    }

    #[test]
    fn test_progress_render_tracks_submissions() {
        let players = vec![
            Player::new("u1".into(), "Alice".into()),
            Player::new("u2".into(), "Bob".into()),
        ];
        let msg = MessageHandle {
            id: "m1".into(),
            channel: "c1".into(),
        };
        let mut progress = SubmissionsProgress::new(msg, &players);
        assert_eq!(progress.entries.len(), 2);

        progress.mark_submitted(&players[0].id);
        let rendered = progress.render();
        assert!(rendered.contains("Alice: submitted"));
        assert!(rendered.contains("Bob: choosing cards..."));

        progress.remove_player(&players[1].id);
        assert_eq!(progress.entries.len(), 1);
    }
}
