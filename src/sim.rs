//! Simulation driver: the action surface without the network.
//!
//! [`GameActions`] mirrors what the HTTP routes expose; [`LocalDriver`]
//! implements it straight against the store, so the full phase
//! controller can be driven in tests or an offline demo with no
//! transport at all. The HTTP handlers are adapters over the same
//! store calls, which keeps the two surfaces from drifting.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::GameError;
use crate::protocol::{
    GuessResponse, JoinResponse, LeaveResponse, ReadyResponse, SceneResponse, StartResponse,
};
use crate::state::AppState;
use crate::types::Room;

#[async_trait]
pub trait GameActions: Send + Sync {
    async fn join(
        &self,
        room: &str,
        player_id: &str,
        player_name: &str,
    ) -> Result<JoinResponse, GameError>;

    async fn set_ready(
        &self,
        room: &str,
        player_id: &str,
        is_ready: bool,
    ) -> Result<ReadyResponse, GameError>;

    async fn start(&self, room: &str, player_id: &str) -> Result<StartResponse, GameError>;

    async fn scene(&self, room: &str, player_id: &str) -> Result<SceneResponse, GameError>;

    async fn send_prompt(
        &self,
        room: &str,
        player_id: &str,
        prompt: &str,
        image_url: &str,
    ) -> Result<(), GameError>;

    async fn send_description(
        &self,
        room: &str,
        player_id: &str,
        description: &str,
    ) -> Result<(), GameError>;

    async fn submit_guess(
        &self,
        room: &str,
        player_id: &str,
        player_name: &str,
        guess: &str,
    ) -> Result<GuessResponse, GameError>;

    async fn leave(&self, room: &str, player_id: &str) -> Result<LeaveResponse, GameError>;

    async fn reset(&self, room: &str) -> Result<(), GameError>;
}

/// Drives the store directly over an `Arc<AppState>`.
pub struct LocalDriver {
    state: Arc<AppState>,
}

impl LocalDriver {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn create_room(&self) -> Room {
        self.state.create_room().await
    }
}

#[async_trait]
impl GameActions for LocalDriver {
    async fn join(
        &self,
        room: &str,
        player_id: &str,
        player_name: &str,
    ) -> Result<JoinResponse, GameError> {
        self.state.join(room, player_id, player_name).await
    }

    async fn set_ready(
        &self,
        room: &str,
        player_id: &str,
        is_ready: bool,
    ) -> Result<ReadyResponse, GameError> {
        self.state.set_ready(room, player_id, is_ready).await
    }

    async fn start(&self, room: &str, player_id: &str) -> Result<StartResponse, GameError> {
        self.state.start_round(room, player_id).await
    }

    async fn scene(&self, room: &str, player_id: &str) -> Result<SceneResponse, GameError> {
        self.state.generate_scene(room, player_id).await
    }

    async fn send_prompt(
        &self,
        room: &str,
        player_id: &str,
        prompt: &str,
        image_url: &str,
    ) -> Result<(), GameError> {
        self.state
            .set_gm_scene(room, player_id, prompt, image_url)
            .await
    }

    async fn send_description(
        &self,
        room: &str,
        player_id: &str,
        description: &str,
    ) -> Result<(), GameError> {
        self.state
            .set_gm_description(room, player_id, description)
            .await
    }

    async fn submit_guess(
        &self,
        room: &str,
        player_id: &str,
        player_name: &str,
        guess: &str,
    ) -> Result<GuessResponse, GameError> {
        self.state
            .submit_guess(room, player_id, player_name, guess)
            .await
    }

    async fn leave(&self, room: &str, player_id: &str) -> Result<LeaveResponse, GameError> {
        self.state.leave(room, player_id).await
    }

    async fn reset(&self, room: &str) -> Result<(), GameError> {
        self.state.reset(room).await
    }
}
