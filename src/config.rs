//! Application-level configuration loading: session limits, timer lengths, game tuning.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::games::selector::Weighted;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PARTY_HOST_CONFIG_PATH";
/// Tolerance used when checking that a probability table sums to at most one.
const PROBABILITY_EPSILON: f64 = 1e-9;

/// Default public search endpoint (Deezer-compatible JSON).
pub const DEFAULT_SEARCH_BASE_URL: &str = "https://api.deezer.com";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Maximum number of player records a session may hold.
    pub max_players: usize,
    /// Seconds a disconnected host keeps their seat before migration.
    pub host_grace_secs: u64,
    /// Idle time after which a session is swept.
    pub inactivity_timeout: Duration,
    /// Period of the inactivity sweeper task.
    pub sweep_interval: Duration,
    /// Duration of a single timer tick.
    pub tick_interval: Duration,
    /// Duel game timings.
    pub duel: DuelTimings,
    /// Number of rounds kept by the duel penalty window.
    pub penalty_window: usize,
    /// Seconds the wheel spins before its outcome is revealed.
    pub wheel_spin_secs: u64,
    /// Severity table used by the wheel.
    pub wheel_severities: Vec<Weighted<String>>,
    /// Seconds players have to submit statements.
    pub statements_collect_secs: u64,
    /// Base URL of the track search upstream.
    pub search_base_url: String,
    /// Upper bound for a single track search request.
    pub search_timeout: Duration,
}

/// Phase lengths (in seconds) for the duel game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuelTimings {
    /// Pause before negotiation starts.
    pub countdown_secs: u64,
    /// Open chat between the duelists.
    pub negotiation_secs: u64,
    /// Window to lock a choice.
    pub decision_secs: u64,
    /// How long the result stays on screen.
    pub reveal_secs: u64,
}

impl Default for DuelTimings {
    fn default() -> Self {
        Self {
            countdown_secs: 3,
            negotiation_secs: 30,
            decision_secs: 15,
            reveal_secs: 5,
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        max_players = app_config.max_players,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Convert a wall-clock length into a number of timer ticks (at least one).
    pub fn ticks_for_secs(&self, secs: u64) -> u32 {
        let tick_ms = self.tick_interval.as_millis().max(1);
        let total_ms = u128::from(secs) * 1000;
        let ticks = total_ms.div_ceil(tick_ms).max(1);
        u32::try_from(ticks).unwrap_or(u32::MAX)
    }

    /// Number of ticks in the host grace window.
    pub fn host_grace_ticks(&self) -> u32 {
        self.ticks_for_secs(self.host_grace_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_players: 15,
            host_grace_secs: 30,
            inactivity_timeout: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
            tick_interval: Duration::from_millis(1000),
            duel: DuelTimings::default(),
            penalty_window: 10,
            wheel_spin_secs: 4,
            wheel_severities: default_severities(),
            statements_collect_secs: 60,
            search_base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
            search_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
///
/// Every field is optional; missing ones keep their built-in default.
struct RawConfig {
    max_players: Option<usize>,
    host_grace_secs: Option<u64>,
    inactivity_timeout_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
    tick_interval_ms: Option<u64>,
    duel: Option<RawDuelTimings>,
    penalty_window: Option<usize>,
    wheel_spin_secs: Option<u64>,
    wheel_severities: Option<Vec<RawSeverity>>,
    statements_collect_secs: Option<u64>,
    search_base_url: Option<String>,
    search_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawDuelTimings {
    countdown_secs: Option<u64>,
    negotiation_secs: Option<u64>,
    decision_secs: Option<u64>,
    reveal_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
/// JSON representation of a single wheel severity entry.
struct RawSeverity {
    label: String,
    probability: f64,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();

        let duel = value
            .duel
            .map(|raw| DuelTimings {
                countdown_secs: raw.countdown_secs.unwrap_or(defaults.duel.countdown_secs),
                negotiation_secs: raw
                    .negotiation_secs
                    .unwrap_or(defaults.duel.negotiation_secs),
                decision_secs: raw.decision_secs.unwrap_or(defaults.duel.decision_secs),
                reveal_secs: raw.reveal_secs.unwrap_or(defaults.duel.reveal_secs),
            })
            .unwrap_or(defaults.duel);

        let wheel_severities = match value.wheel_severities {
            Some(entries) if is_valid_table(&entries) => entries
                .into_iter()
                .map(|entry| Weighted::new(entry.label, entry.probability))
                .collect(),
            Some(_) => {
                warn!("invalid wheel severity table (empty, negative or summing above 1); using defaults");
                defaults.wheel_severities
            }
            None => defaults.wheel_severities,
        };

        Self {
            max_players: value.max_players.filter(|max| *max > 0).unwrap_or(defaults.max_players),
            host_grace_secs: value.host_grace_secs.unwrap_or(defaults.host_grace_secs),
            inactivity_timeout: value
                .inactivity_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.inactivity_timeout),
            sweep_interval: value
                .sweep_interval_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            tick_interval: value
                .tick_interval_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick_interval),
            duel,
            penalty_window: value
                .penalty_window
                .filter(|window| *window > 0)
                .unwrap_or(defaults.penalty_window),
            wheel_spin_secs: value.wheel_spin_secs.unwrap_or(defaults.wheel_spin_secs),
            wheel_severities,
            statements_collect_secs: value
                .statements_collect_secs
                .unwrap_or(defaults.statements_collect_secs),
            search_base_url: value.search_base_url.unwrap_or(defaults.search_base_url),
            search_timeout: value
                .search_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.search_timeout),
        }
    }
}

fn is_valid_table(entries: &[RawSeverity]) -> bool {
    let total: f64 = entries.iter().map(|entry| entry.probability).sum();
    !entries.is_empty()
        && entries.iter().all(|entry| entry.probability >= 0.0)
        && total <= 1.0 + PROBABILITY_EPSILON
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in severity table shipped with the binary.
fn default_severities() -> Vec<Weighted<String>> {
    vec![
        Weighted::new("one sip".to_string(), 0.5),
        Weighted::new("two sips".to_string(), 0.3),
        Weighted::new("three sips".to_string(), 0.15),
        Weighted::new("finish your drink".to_string(), 0.05),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_round_up_and_never_hit_zero() {
        let mut config = AppConfig::default();
        assert_eq!(config.ticks_for_secs(30), 30);
        assert_eq!(config.ticks_for_secs(0), 1);

        config.tick_interval = Duration::from_millis(400);
        assert_eq!(config.ticks_for_secs(1), 3);
        assert_eq!(config.host_grace_ticks(), 75);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let raw: RawConfig =
            serde_json::from_str(r#"{ "max_players": 4, "duel": { "decision_secs": 7 } }"#)
                .unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.max_players, 4);
        assert_eq!(config.duel.decision_secs, 7);
        assert_eq!(config.duel.negotiation_secs, 30);
        assert_eq!(config.host_grace_secs, 30);
    }

    #[test]
    fn oversized_severity_table_falls_back_to_defaults() {
        let raw: RawConfig = serde_json::from_str(
            r#"{ "wheel_severities": [ { "label": "a", "probability": 0.8 }, { "label": "b", "probability": 0.8 } ] }"#,
        )
        .unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.wheel_severities.len(), 4);
        assert_eq!(config.wheel_severities[0].outcome, "one sip");
    }
}
