use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type RoomCode = String;
pub type PlayerId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Pending,
    Active,
    Finished,
}

/// The stages of one round, in cycle order. `Results` loops back to
/// `Waiting` via an explicit reset only.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    #[default]
    Waiting,
    RoleReveal,
    GmReceiving,
    Describing,
    Guessing,
    Generating,
    Comparing,
    Results,
}

impl GamePhase {
    /// Position along the round cycle, used to keep client projections
    /// monotonic when events arrive duplicated or out of order.
    pub fn ordinal(&self) -> u8 {
        match self {
            GamePhase::Waiting => 0,
            GamePhase::RoleReveal => 1,
            GamePhase::GmReceiving => 2,
            GamePhase::Describing => 3,
            GamePhase::Guessing => 4,
            GamePhase::Generating => 5,
            GamePhase::Comparing => 6,
            GamePhase::Results => 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    /// Short human-entered join code. All HTTP routes key rooms by this.
    pub code: RoomCode,
    pub status: RoomStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub is_game_master: bool,
    pub is_connected: bool,
    pub is_ready: bool,
    pub score: u32,
}

impl Player {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            is_game_master: false,
            is_connected: true,
            is_ready: false,
            score: 0,
        }
    }
}

/// A guesser's submitted guess plus its generated image.
/// `similarity` is filled in by judging, after `comparing` begins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuessImage {
    pub player_id: PlayerId,
    pub player_name: String,
    pub guess_text: String,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ranking {
    pub player_id: PlayerId,
    pub similarity: f32,
}

/// Per-round game data. Created fresh when a round starts, cleared on
/// reset. The prompt is broadcast with `gm_prompt`; treating it as
/// secret before `guessing` is a client concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoundArtifacts {
    pub gm_prompt: Option<String>,
    pub gm_image_url: Option<String>,
    pub gm_description: Option<String>,
    /// Insertion order is submission order; ties in ranking keep it.
    pub guess_images: Vec<GuessImage>,
    pub rankings: Vec<Ranking>,
    pub winner_id: Option<PlayerId>,
}

impl RoundArtifacts {
    pub fn guess_for(&self, player_id: &str) -> Option<&GuessImage> {
        self.guess_images.iter().find(|g| g.player_id == player_id)
    }
}
