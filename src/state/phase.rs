//! Phase transition rules.
//!
//! Every action gates on the exact phase it expects, then moves the
//! room one step along the cycle through [`advance`], which is the
//! single place the monotonic-cycle invariant is enforced.

use super::{AppState, RoomSession};
use crate::error::GameError;
use crate::protocol::{Event, StartResponse};
use crate::types::{GamePhase, RoomStatus, RoundArtifacts};
use rand::Rng;
use std::sync::Arc;

/// Legal transitions along the round cycle. `Waiting` is reachable from
/// anywhere via explicit reset; everything else moves one step forward.
fn is_valid_phase_transition(from: GamePhase, to: GamePhase) -> bool {
    use GamePhase::*;

    match (from, to) {
        (Waiting, RoleReveal) => true,
        (RoleReveal, GmReceiving) => true,
        (GmReceiving, Describing) => true,
        (Describing, Guessing) => true,
        (Guessing, Generating) => true,
        (Generating, Comparing) => true,
        (Comparing, Results) => true,

        // Explicit reset, from Results or out of an abandoned round.
        (_, Waiting) => true,

        _ => false,
    }
}

pub(super) fn advance(session: &mut RoomSession, to: GamePhase) -> Result<(), GameError> {
    if !is_valid_phase_transition(session.phase, to) {
        return Err(GameError::Forbidden(format!(
            "cannot move from {:?} to {:?}",
            session.phase, to
        )));
    }
    session.phase = to;
    Ok(())
}

impl AppState {
    /// `waiting → role_reveal`. Requires at least two players and an
    /// actor present in the roster; selects exactly one GM uniformly at
    /// random over the roster and opens the reveal window.
    pub async fn start_round(
        self: &Arc<Self>,
        code: &str,
        actor: &str,
    ) -> Result<StartResponse, GameError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(code)
            .ok_or_else(|| GameError::room_not_found(code))?;

        if !session.players.contains_key(actor) {
            return Err(GameError::Forbidden(
                "only a player in the room can start the round".to_string(),
            ));
        }
        if session.players.len() < 2 {
            return Err(GameError::Forbidden(
                "starting a round requires at least 2 players".to_string(),
            ));
        }
        if session.phase != GamePhase::Waiting {
            return Err(GameError::Forbidden(
                "the round has already started".to_string(),
            ));
        }

        let gm_index = {
            let mut rng = self.rng.lock().expect("rng poisoned");
            rng.random_range(0..session.players.len())
        };
        let mut game_master_id = String::new();
        for (index, player) in session.players.values_mut().enumerate() {
            player.is_game_master = index == gm_index;
            if index == gm_index {
                game_master_id = player.id.clone();
            }
        }

        session.artifacts = RoundArtifacts::default();
        session.room.status = RoomStatus::Active;
        advance(session, GamePhase::RoleReveal)?;
        session.touch();

        tracing::info!("Room {}: round started, GM is {}", code, game_master_id);
        self.sink.publish(
            code,
            Event::GameStart {
                game_master_id: game_master_id.clone(),
            },
        );

        self.schedule_role_reveal(session, code);

        Ok(StartResponse { game_master_id })
    }

    fn schedule_role_reveal(self: &Arc<Self>, session: &mut RoomSession, code: &str) {
        let delay = self.config.role_reveal_delay;
        // A zero window means the advance is driven explicitly (tests).
        if delay.is_zero() {
            return;
        }

        let state = Arc::clone(self);
        let code = code.to_string();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            state.complete_role_reveal(&code).await;
        });
        session.timers.role_reveal = Some(task.abort_handle());
    }

    /// `role_reveal → gm_receiving`, fired by the reveal timer. The
    /// window is purely presentational; no player input is accepted
    /// while it runs, and no event is published; clients run the same
    /// fixed window off `game_start`.
    pub async fn complete_role_reveal(&self, code: &str) {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(code) else {
            return;
        };
        if session.phase != GamePhase::RoleReveal {
            tracing::debug!(
                "Room {}: reveal timer fired in {:?}, ignoring",
                code,
                session.phase
            );
            return;
        }

        session.timers.cancel_role_reveal();
        session.phase = GamePhase::GmReceiving;
    }

    /// `results → waiting` ("play again"), also the escape hatch out of
    /// an abandoned round. Clears round artifacts and role/ready flags;
    /// the roster, scores and room identity survive.
    pub async fn reset(&self, code: &str) -> Result<(), GameError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(code)
            .ok_or_else(|| GameError::room_not_found(code))?;

        session.timers.cancel_all();
        session.artifacts = RoundArtifacts::default();
        for player in session.players.values_mut() {
            player.is_game_master = false;
            player.is_ready = false;
        }
        session.room.status = RoomStatus::Pending;
        advance(session, GamePhase::Waiting)?;
        session.touch();

        tracing::info!("Room {}: reset to waiting", code);
        self.sink.publish(code, Event::GameReset);
        Ok(())
    }
}
