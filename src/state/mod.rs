//! Authoritative session store and game phase controller.
//!
//! Every room lives in one keyed map owned by [`AppState`]. Actions
//! validate against the current phase and roster while holding the
//! map's write lock, so "check current phase, then mutate" is a single
//! atomic step per room: two racing starts cannot both select a GM and
//! a late guess cannot double-apply a transition. Events are published
//! while the lock is held, which keeps publish order identical to
//! mutation order.

mod phase;
mod room;
mod round;

use crate::ai::{AiConfig, ImageService, Judge, ScenePrompter};
use crate::channel::{EventSink, RecordingSink, RoomChannels};
use crate::config::AppConfig;
use crate::protocol::Snapshot;
use crate::types::*;
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::RwLock;
use tokio::task::AbortHandle;

/// Pending timer handles for one room, aborted when the session is
/// reset, retired or evicted so no timer outlives its room.
#[derive(Default)]
pub(crate) struct SessionTimers {
    role_reveal: Option<AbortHandle>,
    guess_deadline: Option<AbortHandle>,
}

impl SessionTimers {
    fn cancel_all(&mut self) {
        self.cancel_role_reveal();
        self.cancel_guess_deadline();
    }

    fn cancel_role_reveal(&mut self) {
        if let Some(timer) = self.role_reveal.take() {
            timer.abort();
        }
    }

    fn cancel_guess_deadline(&mut self) {
        if let Some(timer) = self.guess_deadline.take() {
            timer.abort();
        }
    }
}

/// One room's authoritative state.
pub struct RoomSession {
    pub room: Room,
    pub phase: GamePhase,
    /// Keyed by player id, so the same id can never appear twice.
    /// Insertion order is display order.
    pub players: IndexMap<PlayerId, Player>,
    pub artifacts: RoundArtifacts,
    /// Refreshed on every mutation; the sweeper evicts sessions idle
    /// past the TTL regardless of phase.
    pub last_active: Instant,
    pub(crate) timers: SessionTimers,
}

impl RoomSession {
    fn new(room: Room) -> Self {
        Self {
            room,
            phase: GamePhase::Waiting,
            players: IndexMap::new(),
            artifacts: RoundArtifacts::default(),
            last_active: Instant::now(),
            timers: SessionTimers::default(),
        }
    }

    pub fn game_master(&self) -> Option<&Player> {
        self.players.values().find(|p| p.is_game_master)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            room: self.room.clone(),
            phase: self.phase,
            players: self.players.values().cloned().collect(),
            game_master_id: self.game_master().map(|p| p.id.clone()),
            artifacts: self.artifacts.clone(),
            server_now: chrono::Utc::now().to_rfc3339(),
        }
    }

    fn touch(&mut self) {
        self.last_active = Instant::now();
    }
}

/// Shared application state
pub struct AppState {
    pub(crate) sessions: RwLock<HashMap<RoomCode, RoomSession>>,
    /// Per-room broadcast registry backing the WebSocket endpoint.
    pub channels: Arc<RoomChannels>,
    /// Where published events go. The real transport is `channels`;
    /// tests swap in a recording sink.
    pub(crate) sink: Arc<dyn EventSink>,
    pub images: ImageService,
    pub(crate) scenes: ScenePrompter,
    pub(crate) judge: Option<Box<dyn Judge>>,
    pub config: AppConfig,
    pub(crate) rng: Mutex<StdRng>,
    pub(crate) judge_attempts: u32,
}

impl AppState {
    pub fn new(config: AppConfig, ai: &AiConfig) -> Self {
        let channels = Arc::new(RoomChannels::new());
        Self {
            sessions: RwLock::new(HashMap::new()),
            sink: channels.clone(),
            channels,
            images: ai.build_image_service(),
            scenes: ai.build_scene_prompter(),
            judge: ai.build_judge().map(|j| Box::new(j) as Box<dyn Judge>),
            config,
            rng: Mutex::new(StdRng::from_os_rng()),
            judge_attempts: ai.judge_attempts,
        }
    }

    /// State for tests: no AI providers, a recording sink instead of a
    /// live transport, and a seeded rng so GM selection is predictable.
    pub fn for_tests(seed: u64) -> (Arc<Self>, Arc<RecordingSink>) {
        Self::for_tests_with_config(AppConfig::for_tests(), seed)
    }

    pub fn for_tests_with_config(config: AppConfig, seed: u64) -> (Arc<Self>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let state = Self {
            sessions: RwLock::new(HashMap::new()),
            channels: Arc::new(RoomChannels::new()),
            sink: sink.clone(),
            images: ImageService::disabled(),
            scenes: ScenePrompter::disabled(),
            judge: None,
            config,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            judge_attempts: 2,
        };
        (Arc::new(state), sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiError, AiResult, JudgeScene};
    use crate::protocol::Event;
    use async_trait::async_trait;

    /// Judge double whose every attempt fails, to exercise the
    /// fallback-ranking path.
    struct FailingJudge;

    #[async_trait]
    impl Judge for FailingJudge {
        async fn rank(&self, _scene: &JudgeScene) -> AiResult<Vec<Ranking>> {
            Err(AiError::ApiError("judge unreachable".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn state_with_judge(judge: Box<dyn Judge>, seed: u64) -> (Arc<AppState>, Arc<RecordingSink>) {
        let (state, sink) = AppState::for_tests(seed);
        let mut state = Arc::into_inner(state).expect("fresh state has one owner");
        state.judge = Some(judge);
        (Arc::new(state), sink)
    }

    /// Room with `names` joined, still in `waiting`. Player ids are the
    /// lowercased names.
    async fn room_with_players(state: &Arc<AppState>, names: &[&str]) -> String {
        let room = state.create_room().await;
        for name in names {
            state
                .join(&room.code, &name.to_lowercase(), name)
                .await
                .unwrap();
        }
        room.code
    }

    /// Drive a room from `waiting` to `guessing` and return the GM's id.
    async fn room_in_guessing(state: &Arc<AppState>, code: &str) -> String {
        let started = state.start_round(code, "alice").await.unwrap();
        state.complete_role_reveal(code).await;
        state
            .set_gm_scene(code, &started.game_master_id, "a red fox in snow", "")
            .await
            .unwrap();
        state
            .set_gm_description(code, &started.game_master_id, "An animal in the cold")
            .await
            .unwrap();
        started.game_master_id
    }

    fn other_player<'a>(gm: &str, a: &'a str, b: &'a str) -> &'a str {
        if gm == a {
            b
        } else {
            a
        }
    }

    #[tokio::test]
    async fn test_create_room_starts_pending_and_empty() {
        let (state, _) = AppState::for_tests(1);
        let room = state.create_room().await;

        assert_eq!(room.status, RoomStatus::Pending);
        assert_eq!(room.code.len(), 5);

        let snapshot = state.snapshot(&room.code).await.unwrap();
        assert_eq!(snapshot.phase, GamePhase::Waiting);
        assert!(snapshot.players.is_empty());
    }

    #[tokio::test]
    async fn test_join_is_idempotent_upsert() {
        let (state, sink) = AppState::for_tests(1);
        let code = room_with_players(&state, &["Alice"]).await;

        let rejoined = state.join(&code, "alice", "Alice the Great").await.unwrap();
        assert_eq!(rejoined.player_count, 1);
        assert_eq!(rejoined.players.len(), 1);
        assert_eq!(rejoined.player.name, "Alice the Great");

        // Both joins broadcast, each with the upserted player and count.
        let events = sink.for_room(&code);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1],
            Event::PlayerJoined { player, count: 1 } if player.name == "Alice the Great"
        ));
    }

    #[tokio::test]
    async fn test_join_requires_id_and_name() {
        let (state, sink) = AppState::for_tests(1);
        let room = state.create_room().await;

        let err = state.join(&room.code, "", "Alice").await.unwrap_err();
        assert_eq!(err.code(), "invalid_input");
        let err = state.join(&room.code, "alice", "  ").await.unwrap_err();
        assert_eq!(err.code(), "invalid_input");

        // Rejected actions mutate nothing and publish nothing.
        assert!(sink.is_empty());
        assert!(state.snapshot(&room.code).await.unwrap().players.is_empty());
    }

    #[tokio::test]
    async fn test_join_unknown_room_not_found() {
        let (state, _) = AppState::for_tests(1);
        let err = state.join("ZZZZZ", "alice", "Alice").await.unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn test_set_ready_flips_flag_and_broadcasts() {
        let (state, sink) = AppState::for_tests(1);
        let code = room_with_players(&state, &["Alice"]).await;

        let response = state.set_ready(&code, "alice", true).await.unwrap();
        assert!(response.is_ready);
        assert!(state.snapshot(&code).await.unwrap().players[0].is_ready);
        assert!(matches!(
            sink.for_room(&code).last().unwrap(),
            Event::PlayerReady { is_ready: true, .. }
        ));

        let err = state.set_ready(&code, "nobody", true).await.unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn test_start_requires_two_players() {
        let (state, _) = AppState::for_tests(1);
        let code = room_with_players(&state, &["Alice"]).await;

        let err = state.start_round(&code, "alice").await.unwrap_err();
        assert_eq!(err.code(), "forbidden");
        assert_eq!(
            state.snapshot(&code).await.unwrap().phase,
            GamePhase::Waiting
        );
    }

    #[tokio::test]
    async fn test_start_requires_actor_in_roster() {
        let (state, _) = AppState::for_tests(1);
        let code = room_with_players(&state, &["Alice", "Bob"]).await;

        let err = state.start_round(&code, "mallory").await.unwrap_err();
        assert_eq!(err.code(), "forbidden");
        assert_eq!(
            state.snapshot(&code).await.unwrap().phase,
            GamePhase::Waiting
        );
    }

    #[tokio::test]
    async fn test_start_selects_exactly_one_game_master() {
        let (state, sink) = AppState::for_tests(7);
        let code = room_with_players(&state, &["Alice", "Bob", "Carol"]).await;

        let started = state.start_round(&code, "alice").await.unwrap();
        let snapshot = state.snapshot(&code).await.unwrap();

        assert_eq!(snapshot.phase, GamePhase::RoleReveal);
        assert_eq!(snapshot.room.status, RoomStatus::Active);
        let masters: Vec<_> = snapshot
            .players
            .iter()
            .filter(|p| p.is_game_master)
            .collect();
        assert_eq!(masters.len(), 1);
        assert_eq!(masters[0].id, started.game_master_id);
        assert!(matches!(
            sink.for_room(&code).last().unwrap(),
            Event::GameStart { game_master_id } if *game_master_id == started.game_master_id
        ));
    }

    #[tokio::test]
    async fn test_gm_selection_is_seed_deterministic() {
        let (state_a, _) = AppState::for_tests(99);
        let (state_b, _) = AppState::for_tests(99);
        let code_a = room_with_players(&state_a, &["Alice", "Bob", "Carol"]).await;
        let code_b = room_with_players(&state_b, &["Alice", "Bob", "Carol"]).await;

        let gm_a = state_a.start_round(&code_a, "alice").await.unwrap();
        let gm_b = state_b.start_round(&code_b, "alice").await.unwrap();
        assert_eq!(gm_a.game_master_id, gm_b.game_master_id);
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let (state, _) = AppState::for_tests(1);
        let code = room_with_players(&state, &["Alice", "Bob"]).await;

        state.start_round(&code, "alice").await.unwrap();
        let err = state.start_round(&code, "bob").await.unwrap_err();
        assert_eq!(err.code(), "forbidden");

        // Still exactly one GM.
        let snapshot = state.snapshot(&code).await.unwrap();
        assert_eq!(
            snapshot.players.iter().filter(|p| p.is_game_master).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_no_input_accepted_during_role_reveal() {
        let (state, _) = AppState::for_tests(1);
        let code = room_with_players(&state, &["Alice", "Bob"]).await;
        let started = state.start_round(&code, "alice").await.unwrap();
        let gm = started.game_master_id;

        let err = state
            .set_gm_scene(&code, &gm, "a prompt", "")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "forbidden");

        state.complete_role_reveal(&code).await;
        assert!(state.set_gm_scene(&code, &gm, "a prompt", "").await.is_ok());
    }

    #[tokio::test]
    async fn test_gm_scene_with_empty_image_gets_placeholder() {
        let (state, sink) = AppState::for_tests(1);
        let code = room_with_players(&state, &["Alice", "Bob"]).await;
        let started = state.start_round(&code, "alice").await.unwrap();
        state.complete_role_reveal(&code).await;

        state
            .set_gm_scene(&code, &started.game_master_id, "a red fox", "  ")
            .await
            .unwrap();

        let snapshot = state.snapshot(&code).await.unwrap();
        assert_eq!(snapshot.phase, GamePhase::Describing);
        let image_url = snapshot.artifacts.gm_image_url.unwrap();
        assert!(image_url.starts_with("data:image/svg+xml,"));
        assert!(matches!(
            sink.for_room(&code).last().unwrap(),
            Event::GmPrompt { prompt, .. } if prompt == "a red fox"
        ));
    }

    #[tokio::test]
    async fn test_non_gm_cannot_set_scene_or_description() {
        let (state, _) = AppState::for_tests(1);
        let code = room_with_players(&state, &["Alice", "Bob"]).await;
        let started = state.start_round(&code, "alice").await.unwrap();
        state.complete_role_reveal(&code).await;
        let gm = started.game_master_id.clone();
        let guesser = other_player(&gm, "alice", "bob").to_string();

        let err = state
            .set_gm_scene(&code, &guesser, "a prompt", "")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "forbidden");

        state.set_gm_scene(&code, &gm, "a prompt", "").await.unwrap();

        let err = state
            .set_gm_description(&code, &guesser, "a description")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "forbidden");
        // Rejection leaves the phase unchanged.
        assert_eq!(
            state.snapshot(&code).await.unwrap().phase,
            GamePhase::Describing
        );
    }

    #[tokio::test]
    async fn test_empty_description_rejected_before_mutation() {
        let (state, _) = AppState::for_tests(1);
        let code = room_with_players(&state, &["Alice", "Bob"]).await;
        let started = state.start_round(&code, "alice").await.unwrap();
        state.complete_role_reveal(&code).await;
        let gm = started.game_master_id;
        state.set_gm_scene(&code, &gm, "a prompt", "").await.unwrap();

        let err = state
            .set_gm_description(&code, &gm, "   ")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_input");

        let snapshot = state.snapshot(&code).await.unwrap();
        assert_eq!(snapshot.phase, GamePhase::Describing);
        assert!(snapshot.artifacts.gm_description.is_none());
    }

    #[tokio::test]
    async fn test_first_guess_moves_room_to_generating() {
        let (state, _) = AppState::for_tests(1);
        let code = room_with_players(&state, &["Alice", "Bob", "Carol"]).await;
        let gm = room_in_guessing(&state, &code).await;
        let guessers: Vec<String> = state
            .snapshot(&code)
            .await
            .unwrap()
            .players
            .iter()
            .filter(|p| p.id != gm)
            .map(|p| p.id.clone())
            .collect();

        state
            .record_guess(&code, &guessers[0], "Guesser", "a wolf")
            .await
            .unwrap();
        assert_eq!(
            state.snapshot(&code).await.unwrap().phase,
            GamePhase::Generating
        );

        // Later guesses are still accepted while images generate.
        state
            .record_guess(&code, &guessers[1], "Guesser", "a dog")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_second_guess_from_same_player_rejected() {
        let (state, _) = AppState::for_tests(1);
        let code = room_with_players(&state, &["Alice", "Bob"]).await;
        let gm = room_in_guessing(&state, &code).await;
        let guesser = other_player(&gm, "alice", "bob");

        state
            .record_guess(&code, guesser, "Guesser", "a wolf")
            .await
            .unwrap();
        let err = state
            .record_guess(&code, guesser, "Guesser", "a second wolf")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_input");

        let snapshot = state.snapshot(&code).await.unwrap();
        assert_eq!(snapshot.artifacts.guess_images.len(), 1);
        assert_eq!(snapshot.artifacts.guess_images[0].guess_text, "a wolf");
    }

    #[tokio::test]
    async fn test_gm_cannot_guess() {
        let (state, _) = AppState::for_tests(1);
        let code = room_with_players(&state, &["Alice", "Bob"]).await;
        let gm = room_in_guessing(&state, &code).await;

        let err = state
            .record_guess(&code, &gm, "GM", "my own scene")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "forbidden");
    }

    #[tokio::test]
    async fn test_round_reaches_results_without_any_ai() {
        let (state, sink) = AppState::for_tests(1);
        let code = room_with_players(&state, &["Alice", "Bob"]).await;
        let gm = room_in_guessing(&state, &code).await;
        let guesser = other_player(&gm, "alice", "bob").to_string();

        // Disabled providers resolve to the placeholder; no judge means
        // the fallback ranking. The round must still settle.
        let response = state
            .submit_guess(&code, &guesser, "Guesser", "a wolf in winter")
            .await
            .unwrap();
        assert!(response.image_url.starts_with("data:image/svg+xml,"));

        let snapshot = state.snapshot(&code).await.unwrap();
        assert_eq!(snapshot.phase, GamePhase::Results);
        assert_eq!(snapshot.room.status, RoomStatus::Finished);
        assert_eq!(snapshot.artifacts.winner_id.as_deref(), Some(&*guesser));
        assert_eq!(snapshot.artifacts.rankings.len(), 1);

        let winner = snapshot.players.iter().find(|p| p.id == guesser).unwrap();
        assert_eq!(winner.score, 1);

        let events = sink.for_room(&code);
        let tail: Vec<_> = events.iter().rev().take(2).collect();
        assert!(matches!(tail[0], Event::GameEnd { .. }));
        assert!(matches!(tail[1], Event::ComparisonResult { .. }));
    }

    #[tokio::test]
    async fn test_failing_judge_falls_back_to_submission_order() {
        let (state, _) = state_with_judge(Box::new(FailingJudge), 1);
        let code = room_with_players(&state, &["Alice", "Bob", "Carol"]).await;
        let gm = room_in_guessing(&state, &code).await;
        let guessers: Vec<String> = state
            .snapshot(&code)
            .await
            .unwrap()
            .players
            .iter()
            .filter(|p| p.id != gm)
            .map(|p| p.id.clone())
            .collect();

        for guesser in &guessers {
            state
                .submit_guess(&code, guesser, "Guesser", "a guess")
                .await
                .unwrap();
        }

        let snapshot = state.snapshot(&code).await.unwrap();
        assert_eq!(snapshot.phase, GamePhase::Results);
        // All-zero similarity, earliest submitter wins the tie.
        assert!(snapshot
            .artifacts
            .rankings
            .iter()
            .all(|r| r.similarity == 0.0));
        assert_eq!(snapshot.artifacts.winner_id.as_deref(), Some(&*guessers[0]));
    }

    #[tokio::test]
    async fn test_deadline_close_skips_missing_guessers() {
        let (state, _) = AppState::for_tests(1);
        let code = room_with_players(&state, &["Alice", "Bob", "Carol"]).await;
        let gm = room_in_guessing(&state, &code).await;
        let guessers: Vec<String> = state
            .snapshot(&code)
            .await
            .unwrap()
            .players
            .iter()
            .filter(|p| p.id != gm)
            .map(|p| p.id.clone())
            .collect();

        // Only one of two guessers submits before the deadline fires.
        state
            .submit_guess(&code, &guessers[0], "Guesser", "a wolf")
            .await
            .unwrap();
        assert_eq!(
            state.snapshot(&code).await.unwrap().phase,
            GamePhase::Generating
        );

        state.close_guessing(&code).await;

        let snapshot = state.snapshot(&code).await.unwrap();
        assert_eq!(snapshot.phase, GamePhase::Results);
        assert_eq!(snapshot.artifacts.guess_images.len(), 1);
        assert_eq!(snapshot.artifacts.winner_id.as_deref(), Some(&*guessers[0]));
    }

    #[tokio::test]
    async fn test_deadline_close_with_no_guesses_still_ends_round() {
        let (state, sink) = AppState::for_tests(1);
        let code = room_with_players(&state, &["Alice", "Bob"]).await;
        room_in_guessing(&state, &code).await;

        state.close_guessing(&code).await;

        let snapshot = state.snapshot(&code).await.unwrap();
        assert_eq!(snapshot.phase, GamePhase::Results);
        assert!(snapshot.artifacts.winner_id.is_none());
        assert!(matches!(
            sink.for_room(&code).last().unwrap(),
            Event::GameEnd { winner_id: None }
        ));
    }

    #[tokio::test]
    async fn test_guesser_leaving_mid_generation_unblocks_round() {
        let (state, _) = AppState::for_tests(1);
        let code = room_with_players(&state, &["Alice", "Bob", "Carol"]).await;
        let gm = room_in_guessing(&state, &code).await;
        let guessers: Vec<String> = state
            .snapshot(&code)
            .await
            .unwrap()
            .players
            .iter()
            .filter(|p| p.id != gm)
            .map(|p| p.id.clone())
            .collect();

        state
            .submit_guess(&code, &guessers[0], "Guesser", "a wolf")
            .await
            .unwrap();
        // The other guesser bails without submitting; the round must
        // not wait on them.
        state.leave(&code, &guessers[1]).await.unwrap();

        assert_eq!(
            state.snapshot(&code).await.unwrap().phase,
            GamePhase::Results
        );
    }

    #[tokio::test]
    async fn test_reset_clears_round_but_keeps_roster_and_scores() {
        let (state, sink) = AppState::for_tests(1);
        let code = room_with_players(&state, &["Alice", "Bob"]).await;
        let gm = room_in_guessing(&state, &code).await;
        let guesser = other_player(&gm, "alice", "bob").to_string();
        state
            .submit_guess(&code, &guesser, "Guesser", "a wolf")
            .await
            .unwrap();

        state.reset(&code).await.unwrap();

        let snapshot = state.snapshot(&code).await.unwrap();
        assert_eq!(snapshot.phase, GamePhase::Waiting);
        assert_eq!(snapshot.room.status, RoomStatus::Pending);
        assert_eq!(snapshot.players.len(), 2);
        assert!(snapshot.players.iter().all(|p| !p.is_game_master));
        assert!(snapshot.players.iter().all(|p| !p.is_ready));
        assert!(snapshot.artifacts.gm_prompt.is_none());
        assert!(snapshot.artifacts.guess_images.is_empty());
        assert!(snapshot.artifacts.winner_id.is_none());
        // Scores survive across rounds.
        assert!(snapshot.players.iter().any(|p| p.score == 1));
        assert!(matches!(
            sink.for_room(&code).last().unwrap(),
            Event::GameReset
        ));

        // The cycle restarts cleanly.
        assert!(state.start_round(&code, "alice").await.is_ok());
    }

    #[tokio::test]
    async fn test_leave_broadcasts_and_last_leave_retires_room() {
        let (state, sink) = AppState::for_tests(1);
        let code = room_with_players(&state, &["Alice", "Bob"]).await;

        let response = state.leave(&code, "alice").await.unwrap();
        assert_eq!(response.player_count, 1);
        assert!(matches!(
            sink.for_room(&code).last().unwrap(),
            Event::PlayerLeft { count: 1, .. }
        ));

        let response = state.leave(&code, "bob").await.unwrap();
        assert_eq!(response.player_count, 0);

        // No dangling empty roster: the session is gone entirely.
        let err = state.snapshot(&code).await.unwrap_err();
        assert_eq!(err.code(), "not_found");
        let err = state.leave(&code, "bob").await.unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn test_leave_unknown_player_not_found() {
        let (state, _) = AppState::for_tests(1);
        let code = room_with_players(&state, &["Alice"]).await;
        let err = state.leave(&code, "nobody").await.unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn test_evict_idle_retires_abandoned_rooms() {
        let mut config = AppConfig::for_tests();
        config.room_ttl = std::time::Duration::ZERO;
        let (state, _) = AppState::for_tests_with_config(config, 1);
        let code = room_with_players(&state, &["Alice"]).await;

        let evicted = state.evict_idle().await;
        assert_eq!(evicted, 1);
        assert!(state.snapshot(&code).await.is_err());
    }

    #[tokio::test]
    async fn test_evict_idle_keeps_fresh_rooms() {
        let (state, _) = AppState::for_tests(1);
        let code = room_with_players(&state, &["Alice"]).await;

        let evicted = state.evict_idle().await;
        assert_eq!(evicted, 0);
        assert!(state.snapshot(&code).await.is_ok());
    }

    #[tokio::test]
    async fn test_rooms_do_not_interfere() {
        let (state, sink) = AppState::for_tests(1);
        let code_a = room_with_players(&state, &["Alice", "Bob"]).await;
        let code_b = room_with_players(&state, &["Carol"]).await;

        state.start_round(&code_a, "alice").await.unwrap();

        assert_eq!(
            state.snapshot(&code_b).await.unwrap().phase,
            GamePhase::Waiting
        );
        assert!(!sink
            .for_room(&code_b)
            .iter()
            .any(|e| matches!(e, Event::GameStart { .. })));
    }
}
