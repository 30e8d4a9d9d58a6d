//! Engine configuration, loaded from environment variables with sane
//! defaults for every knob.

use std::time::Duration;

/// How round submissions are presented to the chooser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationMethod {
    /// One menu page per submitted card
    Sequential,
    /// One menu page per player, cards merged into a single image
    Merged,
}

/// Timeout table for menus and suspension points, in seconds
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Submissions review menu lifetime
    pub submissions_review_secs: u64,
    /// "Play another round?" confirmation menu lifetime
    pub keep_playing_secs: u64,
    /// Round-count picker menu lifetime
    pub rounds_picker_secs: u64,
    /// Expansion picker menu lifetime
    pub expansion_picker_secs: u64,
    /// Player picker (owner transfer) menu lifetime
    pub player_picker_secs: u64,
    /// Deck-master admin menu lifetime
    pub config_menu_secs: u64,
    /// Period between "all players submitted" checks
    pub all_submitted_check_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            submissions_review_secs: 1800,
            keep_playing_secs: 600,
            rounds_picker_secs: 300,
            expansion_picker_secs: 300,
            player_picker_secs: 120,
            config_menu_secs: 1800,
            all_submitted_check_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Number of cards dealt to each player's hand
    pub cards_per_hand: usize,
    /// Games below this many players are force-ended
    pub min_players: usize,
    pub presentation: PresentationMethod,
    /// Allowed fixed round counts for the rounds picker
    pub rounds_options: Vec<u32>,
    /// Fallback when the rounds picker fails
    pub default_rounds: u32,
    pub timeouts: Timeouts,
    /// Scheduler clock period
    pub scheduler_tick: Duration,
    /// Tasks fired later than this past their due time are logged as late
    pub lateness_threshold: Duration,
    /// Retry budget for critical transport sends (hand-setup DMs)
    pub transport_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cards_per_hand: 7,
            min_players: 2,
            presentation: PresentationMethod::Sequential,
            rounds_options: vec![3, 5, 10, 15],
            default_rounds: 5,
            timeouts: Timeouts::default(),
            scheduler_tick: Duration::from_secs(1),
            lateness_threshold: Duration::from_secs(10),
            transport_retries: 3,
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid value for {}: {:?}", name, raw);
                None
            }
        },
        Err(_) => None,
    }
}

impl Config {
    /// Load config from environment variables, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_u64("DECK_CARDS_PER_HAND") {
            config.cards_per_hand = v as usize;
        }
        if let Some(v) = env_u64("DECK_MIN_PLAYERS") {
            config.min_players = v as usize;
        }
        if let Ok(raw) = std::env::var("DECK_PRESENTATION_METHOD") {
            match raw.trim() {
                "sequential" => config.presentation = PresentationMethod::Sequential,
                "merged" => config.presentation = PresentationMethod::Merged,
                other => tracing::warn!("Unknown DECK_PRESENTATION_METHOD: {:?}", other),
            }
        }
        if let Some(v) = env_u64("DECK_REVIEW_TIMEOUT_SECS") {
            config.timeouts.submissions_review_secs = v;
        }
        if let Some(v) = env_u64("DECK_KEEP_PLAYING_TIMEOUT_SECS") {
            config.timeouts.keep_playing_secs = v;
        }
        if let Some(v) = env_u64("DECK_SUBMIT_CHECK_PERIOD_SECS") {
            config.timeouts.all_submitted_check_secs = v;
        }
        if let Some(v) = env_u64("DECK_SCHEDULER_TICK_MILLIS") {
            config.scheduler_tick = Duration::from_millis(v);
        }
        if let Some(v) = env_u64("DECK_LATENESS_THRESHOLD_SECS") {
            config.lateness_threshold = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("DECK_TRANSPORT_RETRIES") {
            config.transport_retries = v as u32;
        }

        config
    }

    pub fn check_period(&self) -> Duration {
        Duration::from_secs(self.timeouts.all_submitted_check_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        std::env::remove_var("DECK_CARDS_PER_HAND");
        std::env::remove_var("DECK_PRESENTATION_METHOD");
        let config = Config::from_env();
        assert_eq!(config.cards_per_hand, 7);
        assert_eq!(config.min_players, 2);
        assert_eq!(config.presentation, PresentationMethod::Sequential);
        assert_eq!(config.rounds_options, vec![3, 5, 10, 15]);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        std::env::set_var("DECK_CARDS_PER_HAND", "5");
        std::env::set_var("DECK_PRESENTATION_METHOD", "merged");
        let config = Config::from_env();
        assert_eq!(config.cards_per_hand, 5);
        assert_eq!(config.presentation, PresentationMethod::Merged);
        std::env::remove_var("DECK_CARDS_PER_HAND");
        std::env::remove_var("DECK_PRESENTATION_METHOD");
    }

    #[test]
    #[serial]
    fn test_from_env_ignores_invalid() {
        std::env::set_var("DECK_CARDS_PER_HAND", "not-a-number");
        let config = Config::from_env();
        assert_eq!(config.cards_per_hand, 7);
        std::env::remove_var("DECK_CARDS_PER_HAND");
    }
}
