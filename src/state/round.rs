//! Round artifact actions: the GM's scene, the description, player
//! guesses and the judging step that settles the round.

use super::phase::advance;
use super::{AppState, RoomSession};
use crate::ai::{fallback_rankings, fallback_scene, placeholder_image, JudgeScene};
use crate::error::GameError;
use crate::protocol::{Event, GuessResponse, SceneResponse};
use crate::types::*;
use std::cmp::Ordering;
use std::sync::Arc;

/// True once every non-GM player in the roster has a resolved guess
/// image. Players who already left no longer count.
pub(super) fn all_guesses_resolved(session: &RoomSession) -> bool {
    session
        .players
        .values()
        .filter(|p| !p.is_game_master)
        .all(|p| {
            session
                .artifacts
                .guess_for(&p.id)
                .map(|g| !g.image_url.is_empty())
                .unwrap_or(false)
        })
}

impl AppState {
    /// Produce a secret scene for the GM: a prompt from the text model
    /// (or the built-in list) plus a generated image. Returned to the
    /// GM only; nothing is stored or broadcast until the GM confirms
    /// it via [`AppState::set_gm_scene`].
    pub async fn generate_scene(&self, code: &str, actor: &str) -> Result<SceneResponse, GameError> {
        {
            let sessions = self.sessions.read().await;
            let session = sessions
                .get(code)
                .ok_or_else(|| GameError::room_not_found(code))?;
            let player = session
                .players
                .get(actor)
                .ok_or_else(|| GameError::player_not_found(actor))?;
            if !player.is_game_master {
                return Err(GameError::Forbidden(
                    "only the game master receives a scene".to_string(),
                ));
            }
            if session.phase != GamePhase::GmReceiving {
                return Err(GameError::Forbidden(
                    "the scene is only dealt while the game master is receiving".to_string(),
                ));
            }
        }

        // No lock held past this point: vendor calls can take a while.
        let prompt = match self.scenes.generate().await {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!("Scene prompt generation failed: {}, using fallback", e);
                let mut rng = self.rng.lock().expect("rng poisoned");
                fallback_scene(&mut *rng)
            }
        };
        let image_url = self.images.generate(&prompt).await;

        Ok(SceneResponse { prompt, image_url })
    }

    /// `gm_receiving → describing`: the GM confirms their secret prompt
    /// and image. Fail-soft on the image: an empty reference becomes
    /// the placeholder, never a blocked phase.
    pub async fn set_gm_scene(
        &self,
        code: &str,
        actor: &str,
        prompt: &str,
        image_url: &str,
    ) -> Result<(), GameError> {
        if prompt.trim().is_empty() {
            return Err(GameError::InvalidInput(
                "prompt must not be empty".to_string(),
            ));
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(code)
            .ok_or_else(|| GameError::room_not_found(code))?;
        let player = session
            .players
            .get(actor)
            .ok_or_else(|| GameError::player_not_found(actor))?;
        if !player.is_game_master {
            return Err(GameError::Forbidden(
                "only the game master sets the scene".to_string(),
            ));
        }
        if session.phase != GamePhase::GmReceiving {
            return Err(GameError::Forbidden(format!(
                "the scene cannot be set during {:?}",
                session.phase
            )));
        }

        let image_url = if image_url.trim().is_empty() {
            placeholder_image(prompt)
        } else {
            image_url.to_string()
        };
        session.artifacts.gm_prompt = Some(prompt.to_string());
        session.artifacts.gm_image_url = Some(image_url.clone());
        advance(session, GamePhase::Describing)?;
        session.touch();

        self.sink.publish(
            code,
            Event::GmPrompt {
                prompt: prompt.to_string(),
                image_url,
            },
        );
        Ok(())
    }

    /// `describing → guessing`: only the GM's non-empty description is
    /// accepted; its broadcast opens the guess window and arms the
    /// deadline that closes the round without stragglers.
    pub async fn set_gm_description(
        self: &Arc<Self>,
        code: &str,
        actor: &str,
        description: &str,
    ) -> Result<(), GameError> {
        if description.trim().is_empty() {
            return Err(GameError::InvalidInput(
                "description must not be empty".to_string(),
            ));
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(code)
            .ok_or_else(|| GameError::room_not_found(code))?;
        let player = session
            .players
            .get(actor)
            .ok_or_else(|| GameError::player_not_found(actor))?;
        if !player.is_game_master {
            return Err(GameError::Forbidden(
                "only the game master sends the description".to_string(),
            ));
        }
        if session.phase != GamePhase::Describing {
            return Err(GameError::Forbidden(format!(
                "the description cannot be sent during {:?}",
                session.phase
            )));
        }

        session.artifacts.gm_description = Some(description.to_string());
        advance(session, GamePhase::Guessing)?;
        session.touch();

        self.sink.publish(
            code,
            Event::GmDescription {
                description: description.to_string(),
            },
        );

        self.schedule_guess_deadline(session, code);
        Ok(())
    }

    fn schedule_guess_deadline(self: &Arc<Self>, session: &mut RoomSession, code: &str) {
        let deadline = self.config.guess_deadline;
        let state = Arc::clone(self);
        let code = code.to_string();
        let task = tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            state.close_guessing(&code).await;
        });
        session.timers.guess_deadline = Some(task.abort_handle());
    }

    /// Full guess pipeline: reserve the guess slot, generate the image
    /// (never fails, placeholder on vendor trouble), then resolve it
    /// into the round. HTTP handler and simulation driver both go
    /// through here.
    pub async fn submit_guess(
        self: &Arc<Self>,
        code: &str,
        player_id: &str,
        player_name: &str,
        guess: &str,
    ) -> Result<GuessResponse, GameError> {
        self.record_guess(code, player_id, player_name, guess)
            .await?;
        let image_url = self.images.generate(guess.trim()).await;
        self.resolve_guess_image(code, player_id, &image_url).await;
        Ok(GuessResponse { image_url })
    }

    /// Reserve a player's one guess slot for this round. Rejecting a
    /// second submission here (rather than overwriting) keeps the
    /// one-guess-per-player invariant observable to the caller.
    pub(crate) async fn record_guess(
        &self,
        code: &str,
        player_id: &str,
        player_name: &str,
        guess: &str,
    ) -> Result<(), GameError> {
        if player_name.trim().is_empty() {
            return Err(GameError::InvalidInput(
                "player_name must not be empty".to_string(),
            ));
        }
        if guess.trim().is_empty() {
            return Err(GameError::InvalidInput(
                "guess must not be empty".to_string(),
            ));
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(code)
            .ok_or_else(|| GameError::room_not_found(code))?;
        let player = session
            .players
            .get(player_id)
            .ok_or_else(|| GameError::player_not_found(player_id))?;
        if player.is_game_master {
            return Err(GameError::Forbidden(
                "the game master does not guess their own scene".to_string(),
            ));
        }
        if !matches!(
            session.phase,
            GamePhase::Guessing | GamePhase::Generating
        ) {
            return Err(GameError::Forbidden(format!(
                "guesses are not accepted during {:?}",
                session.phase
            )));
        }
        if session.artifacts.guess_for(player_id).is_some() {
            return Err(GameError::InvalidInput(
                "this player already submitted a guess this round".to_string(),
            ));
        }

        session.artifacts.guess_images.push(GuessImage {
            player_id: player_id.to_string(),
            player_name: player_name.trim().to_string(),
            guess_text: guess.trim().to_string(),
            image_url: String::new(),
            similarity: None,
        });
        if session.phase == GamePhase::Guessing {
            advance(session, GamePhase::Generating)?;
        }
        session.touch();
        Ok(())
    }

    /// Attach the generated image to a reserved guess and broadcast it.
    /// Late resolutions (room gone, deadline already closed the round)
    /// are absorbed, not errors.
    pub(crate) async fn resolve_guess_image(
        self: &Arc<Self>,
        code: &str,
        player_id: &str,
        image_url: &str,
    ) {
        let judge_now = {
            let mut sessions = self.sessions.write().await;
            let Some(session) = sessions.get_mut(code) else {
                tracing::debug!("Room {}: image resolved after the room was retired", code);
                return;
            };
            if session.phase != GamePhase::Generating {
                tracing::debug!(
                    "Room {}: image for {} resolved in {:?}, ignoring",
                    code,
                    player_id,
                    session.phase
                );
                return;
            }
            let Some(guess) = session
                .artifacts
                .guess_images
                .iter_mut()
                .find(|g| g.player_id == player_id)
            else {
                tracing::debug!("Room {}: no reserved guess for {}", code, player_id);
                return;
            };

            guess.image_url = image_url.to_string();
            let player_name = guess.player_name.clone();
            session.touch();

            self.sink.publish(
                code,
                Event::ImageGenerated {
                    player_id: player_id.to_string(),
                    player_name,
                    image_url: image_url.to_string(),
                },
            );

            if all_guesses_resolved(session) {
                session.timers.cancel_guess_deadline();
                // Phase is Generating, checked above.
                session.phase = GamePhase::Comparing;
                true
            } else {
                false
            }
        };

        if judge_now {
            self.run_judging(code).await;
        }
    }

    /// Deadline close for `guessing`/`generating`: players who never
    /// submitted are skipped, guesses still waiting on a vendor get the
    /// placeholder, and the round moves on to judging.
    pub async fn close_guessing(self: &Arc<Self>, code: &str) {
        let judge_now = {
            let mut sessions = self.sessions.write().await;
            let Some(session) = sessions.get_mut(code) else {
                return;
            };
            if !matches!(
                session.phase,
                GamePhase::Guessing | GamePhase::Generating
            ) {
                tracing::debug!(
                    "Room {}: guess deadline fired in {:?}, ignoring",
                    code,
                    session.phase
                );
                return;
            }

            session.timers.cancel_guess_deadline();
            tracing::info!(
                "Room {}: guess deadline reached with {} guess(es)",
                code,
                session.artifacts.guess_images.len()
            );

            for guess in &mut session.artifacts.guess_images {
                if guess.image_url.is_empty() {
                    guess.image_url = placeholder_image(&guess.guess_text);
                    self.sink.publish(
                        code,
                        Event::ImageGenerated {
                            player_id: guess.player_id.clone(),
                            player_name: guess.player_name.clone(),
                            image_url: guess.image_url.clone(),
                        },
                    );
                }
            }

            if session.phase == GamePhase::Guessing {
                session.phase = GamePhase::Generating;
            }
            session.phase = GamePhase::Comparing;
            session.touch();
            true
        };

        if judge_now {
            self.run_judging(code).await;
        }
    }

    /// Ask the judge for similarity scores, with bounded retries; total
    /// failure (or no judge configured) settles on the fallback ranking
    /// so the round always reaches `results`.
    pub(crate) async fn run_judging(self: &Arc<Self>, code: &str) {
        let scene = {
            let sessions = self.sessions.read().await;
            let Some(session) = sessions.get(code) else {
                return;
            };
            JudgeScene {
                gm_prompt: session.artifacts.gm_prompt.clone().unwrap_or_default(),
                gm_image_url: session.artifacts.gm_image_url.clone().unwrap_or_default(),
                guesses: session.artifacts.guess_images.clone(),
            }
        };

        let mut rankings = None;
        if let Some(judge) = &self.judge {
            for attempt in 1..=self.judge_attempts {
                match judge.rank(&scene).await {
                    Ok(scores) => {
                        rankings = Some(scores);
                        break;
                    }
                    Err(e) => tracing::warn!(
                        "Room {}: judging attempt {}/{} via {} failed: {}",
                        code,
                        attempt,
                        self.judge_attempts,
                        judge.name(),
                        e
                    ),
                }
            }
        }
        let rankings = rankings.unwrap_or_else(|| fallback_rankings(&scene.guesses));

        self.finish_round(code, rankings).await;
    }

    /// `comparing → results`: order the rankings by descending
    /// similarity (stable sort, so ties keep submission order), write
    /// scores back into the guess artifacts, crown the winner.
    pub(crate) async fn finish_round(&self, code: &str, mut rankings: Vec<Ranking>) {
        rankings.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
        });

        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(code) else {
            return;
        };
        if session.phase != GamePhase::Comparing {
            tracing::debug!(
                "Room {}: judging settled in {:?}, ignoring",
                code,
                session.phase
            );
            return;
        }

        for ranking in &rankings {
            if let Some(guess) = session
                .artifacts
                .guess_images
                .iter_mut()
                .find(|g| g.player_id == ranking.player_id)
            {
                guess.similarity = Some(ranking.similarity);
            }
        }

        let winner_id = rankings.first().map(|r| r.player_id.clone());
        if let Some(id) = &winner_id {
            if let Some(winner) = session.players.get_mut(id) {
                winner.score += 1;
            }
        }

        session.artifacts.rankings = rankings.clone();
        session.artifacts.winner_id = winner_id.clone();
        session.room.status = RoomStatus::Finished;
        session.phase = GamePhase::Results;
        session.timers.cancel_all();
        session.touch();

        tracing::info!("Room {}: round finished, winner {:?}", code, winner_id);
        self.sink.publish(code, Event::ComparisonResult { rankings });
        self.sink.publish(code, Event::GameEnd { winner_id });
    }
}
