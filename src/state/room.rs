//! Room and roster lifecycle: create, join, ready, leave, snapshot,
//! idle eviction.

use super::{AppState, RoomSession};
use crate::error::GameError;
use crate::protocol::{Event, JoinResponse, LeaveResponse, ReadyResponse, Snapshot};
use crate::types::*;
use rand::Rng;
use std::sync::Arc;

/// Safe character set for join codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 5;

fn generate_room_code<R: Rng>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

impl AppState {
    /// Create a new room with a fresh join code and an empty roster.
    pub async fn create_room(&self) -> Room {
        let mut sessions = self.sessions.write().await;

        // Collisions are extremely rare with 28M codes; retry if one hits.
        let code = loop {
            let candidate = {
                let mut rng = self.rng.lock().expect("rng poisoned");
                generate_room_code(&mut *rng)
            };
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let room = Room {
            id: ulid::Ulid::new().to_string(),
            code: code.clone(),
            status: RoomStatus::Pending,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        sessions.insert(code, RoomSession::new(room.clone()));

        tracing::info!("Created room {}", room.code);
        room
    }

    /// Idempotent upsert by player id: a rejoin refreshes the name and
    /// connection flag instead of duplicating the entry. The broadcast
    /// carries only the upserted player and the new count; the full
    /// roster goes back to the joiner alone.
    pub async fn join(
        &self,
        code: &str,
        player_id: &str,
        player_name: &str,
    ) -> Result<JoinResponse, GameError> {
        if player_id.trim().is_empty() {
            return Err(GameError::InvalidInput(
                "player_id must not be empty".to_string(),
            ));
        }
        if player_name.trim().is_empty() {
            return Err(GameError::InvalidInput(
                "player_name must not be empty".to_string(),
            ));
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(code)
            .ok_or_else(|| GameError::room_not_found(code))?;

        let player = match session.players.get_mut(player_id) {
            Some(existing) => {
                existing.name = player_name.to_string();
                existing.is_connected = true;
                existing.clone()
            }
            None => {
                let player = Player::new(player_id.to_string(), player_name.to_string());
                session
                    .players
                    .insert(player_id.to_string(), player.clone());
                player
            }
        };
        session.touch();

        let count = session.players.len();
        tracing::info!("Room {}: {} joined ({} players)", code, player.name, count);
        self.sink.publish(
            code,
            Event::PlayerJoined {
                player: player.clone(),
                count,
            },
        );

        Ok(JoinResponse {
            player,
            players: session.players.values().cloned().collect(),
            player_count: count,
        })
    }

    pub async fn set_ready(
        &self,
        code: &str,
        player_id: &str,
        is_ready: bool,
    ) -> Result<ReadyResponse, GameError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(code)
            .ok_or_else(|| GameError::room_not_found(code))?;
        let player = session
            .players
            .get_mut(player_id)
            .ok_or_else(|| GameError::player_not_found(player_id))?;

        player.is_ready = is_ready;
        session.touch();

        self.sink.publish(
            code,
            Event::PlayerReady {
                player_id: player_id.to_string(),
                is_ready,
            },
        );

        Ok(ReadyResponse {
            player_id: player_id.to_string(),
            is_ready,
        })
    }

    /// Remove a player. The last player out retires the session
    /// entirely, so an empty room never lingers waiting for a TTL. A
    /// departure mid-generation may complete the round (the room never
    /// waits on someone who is gone).
    pub async fn leave(
        self: &Arc<Self>,
        code: &str,
        player_id: &str,
    ) -> Result<LeaveResponse, GameError> {
        let (count, judge_now) = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(code)
                .ok_or_else(|| GameError::room_not_found(code))?;

            let player = session
                .players
                .shift_remove(player_id)
                .ok_or_else(|| GameError::player_not_found(player_id))?;
            let count = session.players.len();

            tracing::info!("Room {}: {} left ({} players)", code, player.name, count);
            self.sink.publish(
                code,
                Event::PlayerLeft {
                    player_id: player_id.to_string(),
                    count,
                },
            );

            if count == 0 {
                if let Some(mut session) = sessions.remove(code) {
                    session.timers.cancel_all();
                }
                self.channels.retire(code);
                tracing::info!("Room {}: empty, retired", code);
                (0, false)
            } else {
                session.touch();
                let judge_now = session.phase == GamePhase::Generating
                    && super::round::all_guesses_resolved(session);
                if judge_now {
                    session.timers.cancel_guess_deadline();
                    session.phase = GamePhase::Comparing;
                }
                (count, judge_now)
            }
        };

        if judge_now {
            self.run_judging(code).await;
        }

        Ok(LeaveResponse {
            player_count: count,
        })
    }

    /// Full authoritative view, fetched on (re)subscribe instead of
    /// trusting event replay.
    pub async fn snapshot(&self, code: &str) -> Result<Snapshot, GameError> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(code)
            .ok_or_else(|| GameError::room_not_found(code))?;
        Ok(session.snapshot())
    }

    pub async fn room_exists(&self, code: &str) -> bool {
        self.sessions.read().await.contains_key(code)
    }

    /// Connection flags are presence bookkeeping only; they ride along
    /// in snapshots rather than getting their own event.
    pub async fn set_connected(&self, code: &str, player_id: &str, connected: bool) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(code) {
            if let Some(player) = session.players.get_mut(player_id) {
                player.is_connected = connected;
            }
        }
    }

    /// Retire every session idle past the configured TTL, whatever
    /// phase it is stuck in. Returns how many were evicted.
    pub async fn evict_idle(&self) -> usize {
        let ttl = self.config.room_ttl;
        let mut sessions = self.sessions.write().await;

        let expired: Vec<RoomCode> = sessions
            .iter()
            .filter(|(_, session)| session.last_active.elapsed() >= ttl)
            .map(|(code, _)| code.clone())
            .collect();

        for code in &expired {
            if let Some(mut session) = sessions.remove(code) {
                session.timers.cancel_all();
                self.channels.retire(code);
                tracing::info!("Room {}: evicted after being idle past {:?}", code, ttl);
            }
        }
        expired.len()
    }
}
