//! Wire contract between the authority and room subscribers.
//!
//! Events are a closed tagged union, one variant per named event, each
//! carrying only its own payload (never full room state). The
//! triggering client reconciles from its own HTTP response; everyone
//! else applies the event to their projection.

use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum Event {
    PlayerJoined {
        player: Player,
        count: usize,
    },
    PlayerLeft {
        player_id: PlayerId,
        count: usize,
    },
    PlayerReady {
        player_id: PlayerId,
        is_ready: bool,
    },
    GameStart {
        game_master_id: PlayerId,
    },
    GmPrompt {
        prompt: String,
        image_url: String,
    },
    GmDescription {
        description: String,
    },
    ImageGenerated {
        player_id: PlayerId,
        player_name: String,
        image_url: String,
    },
    ComparisonResult {
        rankings: Vec<Ranking>,
    },
    GameEnd {
        /// `None` when the round closed with no guesses to rank.
        winner_id: Option<PlayerId>,
    },
    GameReset,
}

/// Full authoritative view of a room, fetched on (re)subscribe.
/// Event replay alone is not a source of truth: a reconnecting
/// subscriber may have missed events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub room: Room,
    pub phase: GamePhase,
    pub players: Vec<Player>,
    pub game_master_id: Option<PlayerId>,
    pub artifacts: RoundArtifacts,
    pub server_now: String,
}

/// First frame sent on every WebSocket attach, tagged like events so
/// subscribers can decode the stream with one match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerFrame {
    Snapshot { snapshot: Snapshot },
}

// ========== HTTP request/response bodies ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub player_id: String,
    pub player_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResponse {
    pub player: Player,
    /// Full roster, returned only to the joiner; the broadcast event
    /// carries just the upserted player and the new count.
    pub players: Vec<Player>,
    pub player_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyRequest {
    pub player_id: String,
    pub is_ready: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyResponse {
    pub player_id: String,
    pub is_ready: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub player_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub game_master_id: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneRequest {
    pub player_id: String,
}

/// Returned to the GM only; the room learns the prompt via `gm_prompt`
/// once the GM confirms it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneResponse {
    pub prompt: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmPromptRequest {
    pub player_id: String,
    pub prompt: String,
    /// May be empty; the store substitutes a placeholder so the phase
    /// never blocks on generation outcome.
    #[serde(default)]
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptionRequest {
    pub player_id: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuessRequest {
    pub player_id: String,
    pub player_name: String,
    pub guess: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuessResponse {
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub player_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveResponse {
    pub player_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateImageRequest {
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateImageResponse {
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { success: true }
    }
}
