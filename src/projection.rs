//! Client-side mirror of room state.
//!
//! A projection is never a source of truth: it applies broadcast
//! events best-effort and replaces itself wholesale with a snapshot on
//! (re)subscribe. Events may arrive duplicated or out of order, so
//! application is tolerant: an unknown `player_left` is a no-op, a
//! repeated `player_joined` updates in place, and a round-artifact
//! event for a phase already passed is logged and dropped, never a
//! panic.

use crate::protocol::{Event, Snapshot};
use crate::types::*;
use indexmap::IndexMap;

#[derive(Debug, Default)]
pub struct Projection {
    pub room: Option<Room>,
    pub phase: GamePhase,
    pub players: IndexMap<PlayerId, Player>,
    pub game_master_id: Option<PlayerId>,
    pub artifacts: RoundArtifacts,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace local state with an authoritative snapshot. Used on
    /// subscribe and whenever the event stream shows a gap.
    pub fn reconcile(&mut self, snapshot: Snapshot) {
        self.room = Some(snapshot.room);
        self.phase = snapshot.phase;
        self.players = snapshot
            .players
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        self.game_master_id = snapshot.game_master_id;
        self.artifacts = snapshot.artifacts;
    }

    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::PlayerJoined { player, .. } => {
                // Upsert: a rejoin for a known id updates in place.
                self.players.insert(player.id.clone(), player.clone());
            }
            Event::PlayerLeft { player_id, .. } => {
                if self.players.shift_remove(player_id).is_none() {
                    tracing::debug!("player_left for unknown player {}, ignoring", player_id);
                }
            }
            Event::PlayerReady {
                player_id,
                is_ready,
            } => match self.players.get_mut(player_id) {
                Some(player) => player.is_ready = *is_ready,
                None => {
                    tracing::debug!("player_ready for unknown player {}, ignoring", player_id)
                }
            },
            Event::GameStart { game_master_id } => {
                for player in self.players.values_mut() {
                    player.is_game_master = player.id == *game_master_id;
                }
                self.game_master_id = Some(game_master_id.clone());
                self.artifacts = RoundArtifacts::default();
                self.advance_phase(GamePhase::RoleReveal);
            }
            Event::GmPrompt { prompt, image_url } => {
                self.artifacts.gm_prompt = Some(prompt.clone());
                self.artifacts.gm_image_url = Some(image_url.clone());
                self.advance_phase(GamePhase::Describing);
            }
            Event::GmDescription { description } => {
                self.artifacts.gm_description = Some(description.clone());
                self.advance_phase(GamePhase::Guessing);
            }
            Event::ImageGenerated {
                player_id,
                player_name,
                image_url,
            } => {
                // Duplicates update the existing entry rather than
                // growing the list.
                match self
                    .artifacts
                    .guess_images
                    .iter_mut()
                    .find(|g| g.player_id == *player_id)
                {
                    Some(guess) => guess.image_url = image_url.clone(),
                    None => self.artifacts.guess_images.push(GuessImage {
                        player_id: player_id.clone(),
                        player_name: player_name.clone(),
                        // The guess text is the GM's secret to judge,
                        // not broadcast; only the image travels.
                        guess_text: String::new(),
                        image_url: image_url.clone(),
                        similarity: None,
                    }),
                }
                self.advance_phase(GamePhase::Generating);
            }
            Event::ComparisonResult { rankings } => {
                for ranking in rankings {
                    if let Some(guess) = self
                        .artifacts
                        .guess_images
                        .iter_mut()
                        .find(|g| g.player_id == ranking.player_id)
                    {
                        guess.similarity = Some(ranking.similarity);
                    }
                }
                self.artifacts.rankings = rankings.clone();
                self.advance_phase(GamePhase::Comparing);
            }
            Event::GameEnd { winner_id } => {
                self.artifacts.winner_id = winner_id.clone();
                self.advance_phase(GamePhase::Results);
            }
            Event::GameReset => {
                self.artifacts = RoundArtifacts::default();
                self.game_master_id = None;
                for player in self.players.values_mut() {
                    player.is_game_master = false;
                    player.is_ready = false;
                }
                self.phase = GamePhase::Waiting;
            }
        }
    }

    /// Move forward along the cycle only. A duplicated or stale event
    /// cannot drag the projection backwards.
    fn advance_phase(&mut self, to: GamePhase) {
        if to.ordinal() >= self.phase.ordinal() {
            self.phase = to;
        } else {
            tracing::debug!(
                "event for {:?} arrived while already in {:?}, keeping phase",
                to,
                self.phase
            );
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}
