use deckbreaker::config::Config;
use deckbreaker::deck::{CardMeta, DeckMeta, ExpansionMeta};
use deckbreaker::menu::{MenuKind, OPT_ACCEPT};
use deckbreaker::state::{launch_game, AppState};
use deckbreaker::stats::InMemoryStats;
use deckbreaker::transport::MemoryTransport;
use deckbreaker::types::{Game, GamePhase, Rounds};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const CHANNEL: &str = "game-channel";

fn engine() -> (Arc<AppState>, Arc<MemoryTransport>, Arc<InMemoryStats>) {
    let transport = Arc::new(MemoryTransport::new());
    let stats = Arc::new(InMemoryStats::new());
    let state = Arc::new(AppState::new(
        Config::default(),
        transport.clone(),
        stats.clone(),
    ));
    (state, transport, stats)
}

/// Deck metadata with one expansion, the given number of answer cards,
/// and one prompt card with the given number of blanks.
fn deck_meta(answers: usize, blanks: usize) -> DeckMeta {
    let mut expansions = HashMap::new();
    expansions.insert(
        "base".to_string(),
        ExpansionMeta {
            white: (0..answers)
                .map(|i| CardMeta {
                    text: format!("answer {}", i),
                    url: String::new(),
                })
                .collect(),
            black: vec![CardMeta {
                text: format!("fill these in: {}", vec!["_"; blanks].join(" and ")),
                url: String::new(),
            }],
        },
    );
    DeckMeta {
        deck_name: "integration deck".to_string(),
        expansions,
        white_back: None,
        black_back: None,
    }
}

fn users(count: usize) -> Vec<(String, String)> {
    (0..count)
        .map(|i| (format!("user-{}", i), format!("Player{}", i)))
        .collect()
}

/// Poll the game registry until the predicate holds (or the game is gone,
/// in which case the predicate sees None).
async fn wait_for(state: &Arc<AppState>, game_id: &str, pred: impl Fn(Option<&Game>) -> bool) {
    for _ in 0..2000 {
        let games = state.games.read().await;
        if pred(games.get(game_id)) {
            return;
        }
        drop(games);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for game condition");
}

async fn wait_for_phase(state: &Arc<AppState>, game_id: &str, phase: GamePhase) {
    wait_for(state, game_id, |g| {
        g.map(|g| g.phase == phase && (phase != GamePhase::PlayRound || g.waiting_for_submissions))
            .unwrap_or(false)
    })
    .await;
}

async fn wait_for_game_end(state: &Arc<AppState>, game_id: &str) {
    wait_for(state, game_id, |g| g.is_none()).await;
}

/// Full two-player round: deal to empty pool, submit, judge, score.
///
/// Uses the tight supply case: 14 answer cards, hand size 7, 2 players,
/// prompt with 2 blanks. After Setup both hands are full and the
/// available pool is exactly empty.
#[tokio::test(start_paused = true)]
async fn test_full_game_flow() {
    let (state, transport, stats) = engine();
    state.load_deck(&deck_meta(14, 2)).await.unwrap();

    let game_id = launch_game(
        &state,
        &"user-0".to_string(),
        "integration deck",
        vec!["base".to_string()],
        Rounds::Fixed(1),
        CHANNEL.to_string(),
        users(2),
    )
    .await
    .unwrap();

    wait_for_phase(&state, &game_id, GamePhase::PlayRound).await;

    // Both hands full, available pool exactly empty
    let (chooser_user, submitter_user, submitter_cards) = {
        let games = state.games.read().await;
        let game = games.get(&game_id).unwrap();
        for player in &game.players {
            assert_eq!(player.held_cards().len(), 7);
        }
        let chooser = game.players.iter().find(|p| p.is_chooser).unwrap();
        let submitter = game.players.iter().find(|p| !p.is_chooser).unwrap();
        (
            chooser.user_id.clone(),
            submitter.user_id.clone(),
            submitter.held_cards(),
        )
    };
    {
        let decks = state.decks.read().await;
        let counts = decks.get("integration deck").unwrap().answer_counts(&[]);
        assert_eq!(counts.available, 0);
        assert_eq!(counts.owned, 14);
    }

    // Every card is owned and nothing has been seen-and-released yet, so
    // a further draw has nothing to recycle and reports no card
    let extra = state
        .draw_answer("integration deck", &[], &"nobody".to_string())
        .await
        .unwrap();
    assert!(extra.is_none());

    // Submitting the wrong number of cards is rejected
    assert!(state
        .submit_answers(&game_id, &submitter_user, &submitter_cards[..1])
        .await
        .is_err());

    state
        .submit_answers(&game_id, &submitter_user, &submitter_cards[..2])
        .await
        .unwrap();

    // Played cards went back to the pool as seen cards
    {
        let decks = state.decks.read().await;
        let counts = decks.get("integration deck").unwrap().answer_counts(&[]);
        assert_eq!(counts.owned, 12);
        assert_eq!(counts.seen, 2);
    }

    // The review menu comes up for the chooser
    wait_for_phase(&state, &game_id, GamePhase::PostRound).await;
    let menu_id = loop {
        let menus = state.menus.read().await;
        if let Some(menu) = menus.values().find(|m| m.kind == MenuKind::SequentialReview) {
            break menu.id.clone();
        }
        drop(menus);
        tokio::time::sleep(Duration::from_millis(20)).await;
    };

    state.menu_event(&menu_id, &chooser_user, OPT_ACCEPT, true).await;
    wait_for_game_end(&state, &game_id).await;

    // The submitter won the round and, as sole point scorer, the game
    assert_eq!(stats.get(&submitter_user).round_wins, 1);
    assert_eq!(stats.get(&submitter_user).game_wins, 1);
    assert_eq!(stats.get(&chooser_user).round_wins, 0);

    let messages = transport.channel_messages(CHANNEL);
    assert!(messages.iter().any(|m| m.contains("wins the round!")));
    assert!(messages.iter().any(|m| m.contains("Thanks for playing!")));

    // Conservation: the game end released every owned card
    let decks = state.decks.read().await;
    let counts = decks.get("integration deck").unwrap().answer_counts(&[]);
    assert_eq!(counts.owned, 0);
    assert_eq!(counts.available + counts.seen, 14);
}

/// Chooser leaves during PlayRound: a new chooser is assigned, their
/// prior submission is cleared, and the round still completes. A player
/// joining mid-round is dealt in and counted.
#[tokio::test(start_paused = true)]
async fn test_chooser_leave_and_midround_join() {
    let (state, _transport, _stats) = engine();
    state.load_deck(&deck_meta(35, 1)).await.unwrap();

    let game_id = launch_game(
        &state,
        &"user-0".to_string(),
        "integration deck",
        vec!["base".to_string()],
        Rounds::Fixed(1),
        CHANNEL.to_string(),
        users(3),
    )
    .await
    .unwrap();

    wait_for_phase(&state, &game_id, GamePhase::PlayRound).await;

    // One non-chooser submits, then the chooser walks out
    let (chooser_user, early_submitter) = {
        let games = state.games.read().await;
        let game = games.get(&game_id).unwrap();
        let chooser = game.players.iter().find(|p| p.is_chooser).unwrap();
        let other = game.players.iter().find(|p| !p.is_chooser).unwrap();
        (chooser.user_id.clone(), other.user_id.clone())
    };
    let cards = {
        let games = state.games.read().await;
        games
            .get(&game_id)
            .unwrap()
            .player(&early_submitter)
            .unwrap()
            .held_cards()
    };
    state
        .submit_answers(&game_id, &early_submitter, &cards[..1])
        .await
        .unwrap();

    state.player_leave(&game_id, &chooser_user).await.unwrap();

    {
        let games = state.games.read().await;
        let game = games.get(&game_id).unwrap();
        assert!(!game.shutdown_override);
        assert_eq!(game.players.len(), 2);
        let new_chooser = game.players.iter().find(|p| p.is_chooser).unwrap();
        // Whoever judges now is not carrying a submission into judging
        assert!(!new_chooser.has_submitted);
    }

    // A new player joins mid-round and is dealt a full hand
    state
        .player_join(&game_id, "user-3", "Player3")
        .await
        .unwrap();
    {
        let games = state.games.read().await;
        let game = games.get(&game_id).unwrap();
        let joiner = game.player("user-3").unwrap();
        assert_eq!(joiner.held_cards().len(), 7);
        assert!(!joiner.is_chooser);
    }

    // Everyone still owing a submission submits; the round advances
    let pending: Vec<(String, Vec<String>)> = {
        let games = state.games.read().await;
        let game = games.get(&game_id).unwrap();
        game.players
            .iter()
            .filter(|p| !p.is_chooser && !p.has_submitted)
            .map(|p| (p.user_id.clone(), p.held_cards()))
            .collect()
    };
    for (user, cards) in pending {
        state
            .submit_answers(&game_id, &user, &cards[..1])
            .await
            .unwrap();
    }

    wait_for_phase(&state, &game_id, GamePhase::PostRound).await;
}

/// A two-player game never drops below two players without the shutdown
/// override firing, and shutdown returns every card to the pool.
#[tokio::test(start_paused = true)]
async fn test_leave_below_minimum_forces_shutdown() {
    let (state, transport, _stats) = engine();
    state.load_deck(&deck_meta(14, 2)).await.unwrap();

    let game_id = launch_game(
        &state,
        &"user-0".to_string(),
        "integration deck",
        vec!["base".to_string()],
        Rounds::Fixed(5),
        CHANNEL.to_string(),
        users(2),
    )
    .await
    .unwrap();

    wait_for_phase(&state, &game_id, GamePhase::PlayRound).await;
    state.player_leave(&game_id, "user-1").await.unwrap();
    wait_for_game_end(&state, &game_id).await;

    let messages = transport.channel_messages(CHANNEL);
    assert!(messages
        .iter()
        .any(|m| m.contains("aren't enough players")));

    // No card leaked: the leaver's release plus the end-of-game release
    // account for every card exactly once
    let decks = state.decks.read().await;
    let counts = decks.get("integration deck").unwrap().answer_counts(&[]);
    assert_eq!(counts.owned, 0);
    assert_eq!(counts.available + counts.seen, 14);
    assert!(state.menus.read().await.is_empty());
}

/// Chooser menu timing out awards a uniformly random non-chooser and
/// never stalls the round.
#[tokio::test(start_paused = true)]
async fn test_review_timeout_falls_back_to_random_winner() {
    let (state, transport, stats) = engine();
    state.load_deck(&deck_meta(21, 1)).await.unwrap();

    let game_id = launch_game(
        &state,
        &"user-0".to_string(),
        "integration deck",
        vec!["base".to_string()],
        Rounds::Fixed(1),
        CHANNEL.to_string(),
        users(3),
    )
    .await
    .unwrap();

    wait_for_phase(&state, &game_id, GamePhase::PlayRound).await;

    let (chooser_user, submitters): (String, Vec<(String, Vec<String>)>) = {
        let games = state.games.read().await;
        let game = games.get(&game_id).unwrap();
        (
            game.players
                .iter()
                .find(|p| p.is_chooser)
                .unwrap()
                .user_id
                .clone(),
            game.players
                .iter()
                .filter(|p| !p.is_chooser)
                .map(|p| (p.user_id.clone(), p.held_cards()))
                .collect(),
        )
    };
    for (user, cards) in &submitters {
        state
            .submit_answers(&game_id, user, &cards[..1])
            .await
            .unwrap();
    }

    wait_for_phase(&state, &game_id, GamePhase::PostRound).await;
    // Wait for the review menu to be registered, then let it expire
    loop {
        if !state.menus.read().await.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(Duration::from_secs(
        state.config.timeouts.submissions_review_secs + 1,
    ))
    .await;
    state.scheduler.run_pending().await;

    wait_for_game_end(&state, &game_id).await;

    let messages = transport.channel_messages(CHANNEL);
    assert!(messages.iter().any(|m| m.contains("ran out of time")));

    // Exactly one non-chooser got the round win; never the chooser
    let wins: u32 = submitters
        .iter()
        .map(|(user, _)| stats.get(user).round_wins)
        .sum();
    assert_eq!(wins, 1);
    assert_eq!(stats.get(&chooser_user).round_wins, 0);
}

/// Redeal is a one-shot that returns the old hand to the pool before
/// drawing the new one.
#[tokio::test(start_paused = true)]
async fn test_redeal_recycles_and_is_one_shot() {
    let (state, _transport, _stats) = engine();
    state.load_deck(&deck_meta(14, 2)).await.unwrap();

    let game_id = launch_game(
        &state,
        &"user-0".to_string(),
        "integration deck",
        vec!["base".to_string()],
        Rounds::Fixed(1),
        CHANNEL.to_string(),
        users(2),
    )
    .await
    .unwrap();

    wait_for_phase(&state, &game_id, GamePhase::PlayRound).await;

    let before = {
        let games = state.games.read().await;
        games.get(&game_id).unwrap().player("user-0").unwrap().held_cards()
    };
    assert_eq!(before.len(), 7);

    // The pool is fully owned, so the redeal can only succeed by
    // recycling the just-released hand
    state.redeal_player(&game_id, "user-0").await.unwrap();

    let after = {
        let games = state.games.read().await;
        games.get(&game_id).unwrap().player("user-0").unwrap().held_cards()
    };
    assert_eq!(after.len(), 7);

    let decks = state.decks.read().await;
    let counts = decks.get("integration deck").unwrap().answer_counts(&[]);
    assert_eq!(counts.owned, 14);
    drop(decks);

    assert!(state.redeal_player(&game_id, "user-0").await.is_err());
}
