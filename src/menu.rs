//! Interactive selection menus.
//!
//! A menu presents one or more pages of labeled options, collects
//! selection events from an authorized actor, and resolves exactly once:
//! by a trigger option, by its timeout firing, or by external
//! cancellation. The menu owns exactly one scheduler task (its timeout),
//! cancelled if the menu resolves early.

use crate::error::{GameError, GameResult};
use crate::types::{GameId, MenuId, MessageHandle, TaskId, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Built-in page-navigation option references
pub const NAV_NEXT: &str = "next";
pub const NAV_PREVIOUS: &str = "previous";

/// Option references used by the stock menu kinds
pub const OPT_ACCEPT: &str = "accept";
pub const OPT_REJECT: &str = "reject";
pub const OPT_START: &str = "start";
pub const OPT_TRANSFER_OWNER: &str = "transfer-owner";
pub const OPT_RANDOM_PLAYER: &str = "random-player";
pub const OPT_UNLIMITED: &str = "unlimited";

/// The closed set of menu kinds; selected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuKind {
    SequentialReview,
    MergedReview,
    ExpansionPicker,
    ConfirmPrompt,
    Poll,
    ConfigMenu,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuOption {
    /// Stable reference the transport reports back in selection events
    pub reference: String,
    pub label: String,
    /// Selecting a trigger option resolves the menu immediately
    pub is_trigger: bool,
    /// Payload attached by the menu builder (e.g. the player a review
    /// page belongs to)
    pub value: Option<String>,
}

impl MenuOption {
    pub fn new(reference: &str, label: &str) -> Self {
        Self {
            reference: reference.to_string(),
            label: label.to_string(),
            is_trigger: false,
            value: None,
        }
    }

    pub fn trigger(reference: &str, label: &str) -> Self {
        Self {
            is_trigger: true,
            ..Self::new(reference, label)
        }
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuPage {
    pub title: String,
    pub body: String,
    pub image_url: Option<String>,
    pub options: Vec<MenuOption>,
}

/// One recorded selection: which actor picked which option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub actor: UserId,
    pub option: String,
}

/// Terminal result of a menu's suspension
#[derive(Debug, Clone, PartialEq)]
pub enum MenuOutcome {
    /// A trigger option was selected; carries the triggering option(s).
    /// More than one (or zero) entries means the resolution was ambiguous
    /// and the caller should fall back.
    Triggered(Vec<MenuOption>),
    /// The timeout fired; carries the selections at expiry
    TimedOut(Vec<Selection>),
    /// The menu was torn down externally (e.g. owning game shut down)
    Cancelled,
}

/// What a selection event did to the menu
#[derive(Debug, PartialEq)]
pub enum EventEffect {
    /// Invalid event, silently rejected without altering menu state
    Ignored,
    /// Selection or page state changed; re-render
    Updated,
    /// A trigger fired; the registry must finish the menu with this outcome
    Resolve(MenuOutcome),
}

pub type MenuReceiver = oneshot::Receiver<MenuOutcome>;

pub struct SelectionMenu {
    pub id: MenuId,
    pub kind: MenuKind,
    pub game_id: Option<GameId>,
    /// The message this menu is rendered into, if it has been sent
    pub message: Option<MessageHandle>,
    /// Only this actor may interact; None means anyone may
    pub target_actor: Option<UserId>,
    pub multiple_choice: bool,
    pub pages: Vec<MenuPage>,
    pub current_page: usize,
    pub selections: Vec<Selection>,
    pub timeout_task: Option<TaskId>,
    /// Absolute expiry time (RFC 3339), recorded when the timeout is
    /// scheduled so a restored menu can be rescheduled faithfully
    pub expires_at: Option<String>,
    /// While paused, all events are ignored
    pub paused: bool,
    /// Softlock escape: once set, any event at all resolves the menu
    pub close_on_any_event: bool,
    resolver: Option<oneshot::Sender<MenuOutcome>>,
}

impl SelectionMenu {
    pub fn new(
        kind: MenuKind,
        game_id: Option<GameId>,
        target_actor: Option<UserId>,
        multiple_choice: bool,
        pages: Vec<MenuPage>,
    ) -> (Self, MenuReceiver) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                id: ulid::Ulid::new().to_string(),
                kind,
                game_id,
                message: None,
                target_actor,
                multiple_choice,
                pages,
                current_page: 0,
                selections: Vec::new(),
                timeout_task: None,
                expires_at: None,
                paused: false,
                close_on_any_event: false,
                resolver: Some(tx),
            },
            rx,
        )
    }

    /// Yes/no confirmation targeted at one actor
    pub fn confirm_prompt(
        game_id: Option<GameId>,
        target: UserId,
        question: &str,
    ) -> (Self, MenuReceiver) {
        let page = MenuPage {
            title: question.to_string(),
            body: String::new(),
            image_url: None,
            options: vec![
                MenuOption::trigger(OPT_ACCEPT, "Yes"),
                MenuOption::trigger(OPT_REJECT, "No"),
            ],
        };
        Self::new(MenuKind::ConfirmPrompt, game_id, Some(target), false, vec![page])
    }

    /// Multi-choice picker over expansion names with a start trigger
    pub fn expansion_picker(
        game_id: Option<GameId>,
        target: UserId,
        expansions: &[String],
    ) -> (Self, MenuReceiver) {
        let mut options: Vec<MenuOption> = expansions
            .iter()
            .map(|name| MenuOption::new(name, name))
            .collect();
        options.push(MenuOption::trigger(OPT_START, "Start the game"));
        let page = MenuPage {
            title: "Pick your expansion packs".to_string(),
            body: "Select the expansions to play with, then start the game.".to_string(),
            image_url: None,
            options,
        };
        Self::new(MenuKind::ExpansionPicker, game_id, Some(target), true, vec![page])
    }

    /// Round-count picker over the configured fixed options plus
    /// unlimited free play; every option is a trigger.
    pub fn rounds_picker(
        target: UserId,
        fixed_options: &[u32],
    ) -> (Self, MenuReceiver) {
        let mut options: Vec<MenuOption> = fixed_options
            .iter()
            .map(|n| {
                MenuOption::trigger(&format!("rounds-{}", n), &format!("{} rounds", n))
                    .with_value(&n.to_string())
            })
            .collect();
        options.push(MenuOption::trigger(OPT_UNLIMITED, "Free play"));
        let page = MenuPage {
            title: "How many rounds?".to_string(),
            body: String::new(),
            image_url: None,
            options,
        };
        Self::new(MenuKind::ConfirmPrompt, None, Some(target), false, vec![page])
    }

    /// Open poll with no triggers; resolves only by timeout
    pub fn poll(
        game_id: Option<GameId>,
        question: &str,
        options: Vec<MenuOption>,
        multiple_choice: bool,
    ) -> (Self, MenuReceiver) {
        let page = MenuPage {
            title: question.to_string(),
            body: "React to this message to vote!".to_string(),
            image_url: None,
            options,
        };
        Self::new(MenuKind::Poll, game_id, None, multiple_choice, vec![page])
    }

    /// Deck-master admin menu, targeted at the game owner
    pub fn config_menu(game_id: GameId, owner: UserId) -> (Self, MenuReceiver) {
        let page = MenuPage {
            title: "Deck Master Admin Menu".to_string(),
            body: String::new(),
            image_url: None,
            options: vec![MenuOption::trigger(
                OPT_TRANSFER_OWNER,
                "Relinquish Deck Master",
            )],
        };
        Self::new(MenuKind::ConfigMenu, Some(game_id), Some(owner), false, vec![page])
    }

    /// Review menu over pre-built pages, targeted at the chooser
    pub fn review(
        kind: MenuKind,
        game_id: GameId,
        chooser: UserId,
        pages: Vec<MenuPage>,
    ) -> (Self, MenuReceiver) {
        Self::new(kind, Some(game_id), Some(chooser), false, pages)
    }

    pub fn current_page(&self) -> Option<&MenuPage> {
        self.pages.get(self.current_page)
    }

    /// Apply one selection event. Invalid events are rejected silently;
    /// trigger events produce a `Resolve` effect for the registry to act
    /// on. Page navigation rotates the displayed page without touching
    /// selection state.
    pub fn apply_event(&mut self, actor: &str, option_ref: &str, added: bool) -> EventEffect {
        if self.paused || self.resolver.is_none() {
            return EventEffect::Ignored;
        }

        // Softlock escape: accept anything from anyone. If the event names
        // a trigger option it wins normally, otherwise the resolution is
        // deliberately ambiguous and the caller falls back.
        if self.close_on_any_event && added {
            let option = self
                .pages
                .iter()
                .flat_map(|p| p.options.iter())
                .find(|o| o.reference == option_ref && o.is_trigger)
                .cloned();
            return EventEffect::Resolve(MenuOutcome::Triggered(option.into_iter().collect()));
        }

        if let Some(target) = &self.target_actor {
            if target != actor {
                return EventEffect::Ignored;
            }
        }

        if added && self.pages.len() > 1 {
            match option_ref {
                NAV_NEXT => {
                    self.current_page = (self.current_page + 1) % self.pages.len();
                    return EventEffect::Updated;
                }
                NAV_PREVIOUS => {
                    self.current_page =
                        (self.current_page + self.pages.len() - 1) % self.pages.len();
                    return EventEffect::Updated;
                }
                _ => {}
            }
        }

        let option = match self
            .current_page()
            .and_then(|p| p.options.iter().find(|o| o.reference == option_ref))
        {
            Some(o) => o.clone(),
            None => return EventEffect::Ignored,
        };

        if added {
            if option.is_trigger {
                return EventEffect::Resolve(MenuOutcome::Triggered(vec![option]));
            }
            if !self.multiple_choice {
                self.selections.retain(|s| s.actor != actor);
            }
            let already = self
                .selections
                .iter()
                .any(|s| s.actor == actor && s.option == option_ref);
            if !already {
                self.selections.push(Selection {
                    actor: actor.to_string(),
                    option: option_ref.to_string(),
                });
            }
        } else {
            self.selections
                .retain(|s| !(s.actor == actor && s.option == option_ref));
        }
        EventEffect::Updated
    }

    /// Consume the resolver and deliver the outcome. Resolving twice is a
    /// programming error, surfaced loudly.
    pub fn finish(&mut self, outcome: MenuOutcome) -> GameResult<()> {
        match self.resolver.take() {
            Some(tx) => {
                // The awaiting side may have been dropped; that's fine.
                let _ = tx.send(outcome);
                Ok(())
            }
            None => Err(GameError::InternalConsistency(format!(
                "menu {} resolved twice",
                self.id
            ))),
        }
    }

    /// Text rendering of the currently displayed page
    pub fn render(&self) -> String {
        let Some(page) = self.current_page() else {
            return String::new();
        };
        let mut lines = vec![page.title.clone()];
        if !page.body.is_empty() {
            lines.push(page.body.clone());
        }
        for option in &page.options {
            lines.push(format!("[{}] {}", option.reference, option.label));
        }
        if self.pages.len() > 1 {
            lines.push(format!(
                "Page {} of {}",
                self.current_page + 1,
                self.pages.len()
            ));
        }
        lines.join("\n")
    }

    pub fn to_export(&self) -> MenuExport {
        MenuExport {
            id: self.id.clone(),
            kind: self.kind,
            game_id: self.game_id.clone(),
            message: self.message.clone(),
            target_actor: self.target_actor.clone(),
            multiple_choice: self.multiple_choice,
            pages: self.pages.clone(),
            current_page: self.current_page,
            selections: self.selections.clone(),
            expires_at: self.expires_at.clone(),
            paused: self.paused,
            close_on_any_event: self.close_on_any_event,
        }
    }

    /// Rebuild a menu from its exported state, with a fresh resolver and
    /// no timeout task; the caller reschedules the timeout.
    pub fn from_export(export: MenuExport) -> (Self, MenuReceiver) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                id: export.id,
                kind: export.kind,
                game_id: export.game_id,
                message: export.message,
                target_actor: export.target_actor,
                multiple_choice: export.multiple_choice,
                pages: export.pages,
                current_page: export.current_page,
                selections: export.selections,
                timeout_task: None,
                expires_at: export.expires_at,
                paused: export.paused,
                close_on_any_event: export.close_on_any_event,
                resolver: Some(tx),
            },
            rx,
        )
    }
}

/// Serializable snapshot of a menu, minus its runtime-only resolver and
/// timeout task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuExport {
    pub id: MenuId,
    pub kind: MenuKind,
    pub game_id: Option<GameId>,
    pub message: Option<MessageHandle>,
    pub target_actor: Option<UserId>,
    pub multiple_choice: bool,
    pub pages: Vec<MenuPage>,
    pub current_page: usize,
    pub selections: Vec<Selection>,
    #[serde(default)]
    pub expires_at: Option<String>,
    pub paused: bool,
    pub close_on_any_event: bool,
}

/// Interpret a rounds-picker outcome. Anything other than a clean pick
/// falls back to the configured default round count.
pub fn rounds_from_outcome(outcome: &MenuOutcome, default_rounds: u32) -> crate::types::Rounds {
    use crate::types::Rounds;
    match outcome {
        MenuOutcome::Triggered(options) if options.len() == 1 => {
            if options[0].reference == OPT_UNLIMITED {
                Rounds::Unlimited
            } else {
                options[0]
                    .value
                    .as_deref()
                    .and_then(|v| v.parse().ok())
                    .map(Rounds::Fixed)
                    .unwrap_or(Rounds::Fixed(default_rounds))
            }
        }
        _ => Rounds::Fixed(default_rounds),
    }
}

// ========== Poll results ==========

#[derive(Debug, Clone, PartialEq)]
pub struct PollResults {
    /// (option label, vote count) in page order
    pub counts: Vec<(String, usize)>,
    /// Labels of the option(s) with the most votes; empty if no votes
    pub winners: Vec<String>,
}

/// Count poll votes from the selections recorded at expiry. Single-choice
/// polls count at most one vote per actor (their earliest selection).
pub fn poll_results(
    options: &[MenuOption],
    selections: &[Selection],
    multiple_choice: bool,
) -> PollResults {
    let mut counted: Vec<&Selection> = Vec::new();
    for selection in selections {
        if !multiple_choice
            && counted.iter().any(|s| s.actor == selection.actor)
        {
            continue;
        }
        if counted
            .iter()
            .any(|s| s.actor == selection.actor && s.option == selection.option)
        {
            continue;
        }
        counted.push(selection);
    }

    let counts: Vec<(String, usize)> = options
        .iter()
        .map(|o| {
            let votes = counted.iter().filter(|s| s.option == o.reference).count();
            (o.label.clone(), votes)
        })
        .collect();

    let max_votes = counts.iter().map(|(_, v)| *v).max().unwrap_or(0);
    let winners = if max_votes == 0 {
        Vec::new()
    } else {
        counts
            .iter()
            .filter(|(_, v)| *v == max_votes)
            .map(|(label, _)| label.clone())
            .collect()
    };

    PollResults { counts, winners }
}

/// One bar of a poll-results chart: the option name padded to the longest
/// name, a bar proportional to the winning count, and the vote count.
pub fn make_poll_bar(name: &str, votes: usize, max_name_len: usize, max_votes: usize) -> String {
    const MAX_BAR_LEN: usize = 10;
    let bar_len = if max_votes == 0 {
        0
    } else {
        votes * MAX_BAR_LEN / max_votes
    };
    let trophy = if votes == max_votes && max_votes > 0 {
        "🏆"
    } else {
        ""
    };
    format!(
        "{}{} | {}{}{} +{} Vote{}",
        name,
        " ".repeat(max_name_len - name.len()),
        "=".repeat(bar_len),
        if votes == 0 { " " } else { "" },
        trophy,
        votes,
        if votes == 1 { "" } else { "s" }
    )
}

/// Full results chart for an expired poll
pub fn render_poll_results(results: &PollResults) -> String {
    if results.counts.iter().all(|(_, v)| *v == 0) {
        return "No votes received!".to_string();
    }
    let max_name_len = results
        .counts
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0);
    let max_votes = results.counts.iter().map(|(_, v)| *v).max().unwrap_or(0);
    let bars: Vec<String> = results
        .counts
        .iter()
        .map(|(name, votes)| make_poll_bar(name, *votes, max_name_len, max_votes))
        .collect();
    format!("```\n{}\n```", bars.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_page_menu() -> (SelectionMenu, MenuReceiver) {
        let pages = vec![
            MenuPage {
                title: "page one".to_string(),
                body: String::new(),
                image_url: None,
                options: vec![
                    MenuOption::new("a", "Option A"),
                    MenuOption::trigger(OPT_ACCEPT, "Pick this"),
                ],
            },
            MenuPage {
                title: "page two".to_string(),
                body: String::new(),
                image_url: None,
                options: vec![MenuOption::new("b", "Option B")],
            },
        ];
        SelectionMenu::new(
            MenuKind::SequentialReview,
            None,
            Some("judge".to_string()),
            false,
            pages,
        )
    }

    #[tokio::test]
    async fn test_trigger_resolves_menu() {
        let (mut menu, rx) = two_page_menu();
        let effect = menu.apply_event("judge", OPT_ACCEPT, true);
        let EventEffect::Resolve(outcome) = effect else {
            panic!("expected resolve effect");
        };
        menu.finish(outcome).unwrap();

        match rx.await.unwrap() {
            MenuOutcome::Triggered(options) => {
                assert_eq!(options.len(), 1);
                assert_eq!(options[0].reference, OPT_ACCEPT);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unauthorized_actor_is_ignored() {
        let (mut menu, _rx) = two_page_menu();
        assert_eq!(menu.apply_event("stranger", OPT_ACCEPT, true), EventEffect::Ignored);
        assert!(menu.selections.is_empty());
    }

    #[tokio::test]
    async fn test_option_must_be_on_displayed_page() {
        let (mut menu, _rx) = two_page_menu();
        // "b" lives on page two, which isn't displayed
        assert_eq!(menu.apply_event("judge", "b", true), EventEffect::Ignored);

        menu.apply_event("judge", NAV_NEXT, true);
        assert_eq!(menu.apply_event("judge", "b", true), EventEffect::Updated);
        assert_eq!(menu.selections.len(), 1);
    }

    #[tokio::test]
    async fn test_navigation_preserves_selections() {
        let (mut menu, _rx) = two_page_menu();
        menu.apply_event("judge", "a", true);
        assert_eq!(menu.selections.len(), 1);

        menu.apply_event("judge", NAV_NEXT, true);
        assert_eq!(menu.current_page, 1);
        menu.apply_event("judge", NAV_PREVIOUS, true);
        assert_eq!(menu.current_page, 0);
        assert_eq!(menu.selections.len(), 1);
    }

    #[tokio::test]
    async fn test_single_choice_poll_replaces_selection() {
        let (mut menu, _rx) = SelectionMenu::poll(
            None,
            "pick one",
            vec![MenuOption::new("x", "X"), MenuOption::new("y", "Y")],
            false,
        );

        menu.apply_event("voter", "x", true);
        menu.apply_event("voter", "y", true);
        assert_eq!(menu.selections.len(), 1);
        assert_eq!(menu.selections[0].option, "y");
    }

    #[tokio::test]
    async fn test_double_finish_is_internal_error() {
        let (mut menu, _rx) = two_page_menu();
        menu.finish(MenuOutcome::Cancelled).unwrap();
        assert!(matches!(
            menu.finish(MenuOutcome::Cancelled),
            Err(GameError::InternalConsistency(_))
        ));
    }

    #[tokio::test]
    async fn test_escape_hatch_accepts_anyone() {
        let (mut menu, _rx) = two_page_menu();
        menu.close_on_any_event = true;

        let effect = menu.apply_event("stranger", "unrelated", true);
        match effect {
            EventEffect::Resolve(MenuOutcome::Triggered(options)) => {
                // Not a trigger option, so the resolution is ambiguous
                assert!(options.is_empty());
            }
            other => panic!("unexpected effect: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_paused_menu_ignores_events() {
        let (mut menu, _rx) = two_page_menu();
        menu.paused = true;
        assert_eq!(menu.apply_event("judge", OPT_ACCEPT, true), EventEffect::Ignored);

        menu.paused = false;
        assert!(matches!(
            menu.apply_event("judge", OPT_ACCEPT, true),
            EventEffect::Resolve(_)
        ));
    }

    #[tokio::test]
    async fn test_expansion_picker_collects_selections_until_start() {
        let expansions = vec!["base".to_string(), "extra".to_string()];
        let (mut menu, _rx) =
            SelectionMenu::expansion_picker(None, "owner".to_string(), &expansions);

        menu.apply_event("owner", "base", true);
        menu.apply_event("owner", "extra", true);
        menu.apply_event("owner", "extra", false);
        assert_eq!(menu.selections.len(), 1);
        assert_eq!(menu.selections[0].option, "base");

        match menu.apply_event("owner", OPT_START, true) {
            EventEffect::Resolve(MenuOutcome::Triggered(options)) => {
                assert_eq!(options[0].reference, OPT_START);
            }
            other => panic!("unexpected effect: {:?}", other),
        }
    }

    #[test]
    fn test_rounds_picker_outcomes() {
        let (menu, _rx) = SelectionMenu::rounds_picker("owner".to_string(), &[3, 5, 10, 15]);
        assert_eq!(menu.pages[0].options.len(), 5);

        let five = menu.pages[0]
            .options
            .iter()
            .find(|o| o.reference == "rounds-5")
            .cloned()
            .unwrap();
        let outcome = MenuOutcome::Triggered(vec![five]);
        assert_eq!(
            rounds_from_outcome(&outcome, 5),
            crate::types::Rounds::Fixed(5)
        );

        let unlimited = menu.pages[0]
            .options
            .iter()
            .find(|o| o.reference == OPT_UNLIMITED)
            .cloned()
            .unwrap();
        assert_eq!(
            rounds_from_outcome(&MenuOutcome::Triggered(vec![unlimited]), 5),
            crate::types::Rounds::Unlimited
        );

        // Timeouts fall back to the configured default
        assert_eq!(
            rounds_from_outcome(&MenuOutcome::TimedOut(vec![]), 5),
            crate::types::Rounds::Fixed(5)
        );
    }

    #[test]
    fn test_poll_results_single_choice_counts_one_per_actor() {
        let options = vec![MenuOption::new("x", "X"), MenuOption::new("y", "Y")];
        let selections = vec![
            Selection {
                actor: "v1".to_string(),
                option: "x".to_string(),
            },
            Selection {
                actor: "v1".to_string(),
                option: "y".to_string(),
            },
            Selection {
                actor: "v2".to_string(),
                option: "y".to_string(),
            },
        ];

        let results = poll_results(&options, &selections, false);
        assert_eq!(results.counts, vec![("X".to_string(), 1), ("Y".to_string(), 1)]);
        assert_eq!(results.winners.len(), 2);

        let results = poll_results(&options, &selections, true);
        assert_eq!(results.counts, vec![("X".to_string(), 1), ("Y".to_string(), 2)]);
        assert_eq!(results.winners, vec!["Y".to_string()]);
    }

    #[test]
    fn test_render_poll_results_marks_winner() {
        let results = PollResults {
            counts: vec![("Cats".to_string(), 3), ("Dogs".to_string(), 1)],
            winners: vec!["Cats".to_string()],
        };
        let rendered = render_poll_results(&results);
        assert!(rendered.contains("🏆"));
        assert!(rendered.contains("+3 Votes"));
        assert!(rendered.contains("+1 Vote"));
    }

    #[test]
    fn test_export_round_trip() {
        let (mut menu, _rx) = two_page_menu();
        menu.apply_event("judge", "a", true);
        menu.apply_event("judge", NAV_NEXT, true);

        let export = menu.to_export();
        let raw = serde_json::to_string(&export).unwrap();
        let parsed: MenuExport = serde_json::from_str(&raw).unwrap();
        let (restored, _rx2) = SelectionMenu::from_export(parsed);
        assert_eq!(restored.to_export(), export);
    }
}
