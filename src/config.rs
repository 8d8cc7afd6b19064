//! Server configuration, loaded from environment variables.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// TCP port the server binds to.
    pub port: u16,
    /// Idle lifetime of a cached room session, phase-independent.
    pub room_ttl: Duration,
    /// Fixed role-reveal window before the GM starts receiving a scene.
    pub role_reveal_delay: Duration,
    /// How long guessers get before the round closes without them.
    pub guess_deadline: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 6398,
            room_ttl: Duration::from_secs(3600),
            role_reveal_delay: Duration::from_secs(3),
            guess_deadline: Duration::from_secs(90),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            port: env_parse("PORT").unwrap_or(defaults.port),
            room_ttl: env_parse("ROOM_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.room_ttl),
            role_reveal_delay: env_parse("ROLE_REVEAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.role_reveal_delay),
            guess_deadline: env_parse("GUESS_DEADLINE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.guess_deadline),
        }
    }

    /// Configuration for tests: timers collapsed so phase auto-advances
    /// are driven explicitly instead of by the clock.
    pub fn for_tests() -> Self {
        Self {
            role_reveal_delay: Duration::ZERO,
            guess_deadline: Duration::from_secs(600),
            ..Self::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
