//! Effective session parameters derived from the login response.

use crate::backend::api::AppLoginResponse;
use crate::config::SessionDefaultsConfig;
use crate::events::MAX_BATCH_SIZE;
use std::time::Duration;
use tracing::warn;

/// Longest heartbeat or staleness period accepted from the backend.
pub const MAX_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Local fallbacks applied when the backend sends a zero or absent feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDefaults {
    pub heartbeat: Duration,
    pub batch_size: usize,
    pub max_staleness: Duration,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self::from(&SessionDefaultsConfig::default())
    }
}

impl From<&SessionDefaultsConfig> for SessionDefaults {
    fn from(config: &SessionDefaultsConfig) -> Self {
        Self {
            heartbeat: config.heartbeat(),
            batch_size: config.batch_size,
            max_staleness: config.max_staleness(),
        }
    }
}

/// One authenticated run between login and logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub rulespack_id: String,
    pub heartbeat: Duration,
    pub batch_size: usize,
    pub max_staleness: Duration,
    pub use_signals: bool,
}

impl Session {
    pub fn from_login(response: AppLoginResponse, defaults: &SessionDefaults) -> Self {
        let features = response.features;
        Self {
            id: response.session_id,
            rulespack_id: response.pack_id,
            heartbeat: secs_or("heartbeat_delay", features.heartbeat_delay, defaults.heartbeat),
            batch_size: batch_size_or(features.batch_size, defaults.batch_size),
            max_staleness: secs_or("max_staleness", features.max_staleness, defaults.max_staleness),
            use_signals: features.use_signals,
        }
    }
}

fn secs_or(feature: &'static str, secs: u64, default: Duration) -> Duration {
    if secs == 0 {
        return default;
    }
    let period = Duration::from_secs(secs);
    if period > MAX_PERIOD {
        warn!(feature, secs, max = MAX_PERIOD.as_secs(), "feature period too large, clamping");
        return MAX_PERIOD;
    }
    period
}

fn batch_size_or(size: u64, default: usize) -> usize {
    if size == 0 {
        return default;
    }
    match usize::try_from(size) {
        Ok(n) if n <= MAX_BATCH_SIZE => n,
        _ => {
            warn!(batch_size = size, max = MAX_BATCH_SIZE, "batch size too large, clamping");
            MAX_BATCH_SIZE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::api::Features;

    fn response(features: Features) -> AppLoginResponse {
        AppLoginResponse {
            session_id: "sess".into(),
            status: true,
            pack_id: "pack".into(),
            features,
            ..AppLoginResponse::default()
        }
    }

    #[test]
    fn zero_features_fall_back_to_defaults() {
        let defaults = SessionDefaults {
            heartbeat: Duration::from_secs(7),
            batch_size: 11,
            max_staleness: Duration::from_secs(3),
        };
        let session = Session::from_login(response(Features::default()), &defaults);
        assert_eq!(session.id, "sess");
        assert_eq!(session.rulespack_id, "pack");
        assert_eq!(session.heartbeat, Duration::from_secs(7));
        assert_eq!(session.batch_size, 11);
        assert_eq!(session.max_staleness, Duration::from_secs(3));
        assert!(!session.use_signals);
    }

    #[test]
    fn server_features_win() {
        let features = Features {
            heartbeat_delay: 30,
            batch_size: 100,
            max_staleness: 0,
            use_signals: true,
        };
        let session = Session::from_login(response(features), &SessionDefaults::default());
        assert_eq!(session.heartbeat, Duration::from_secs(30));
        assert_eq!(session.batch_size, 100);
        assert_eq!(session.max_staleness, Duration::from_secs(20));
        assert!(session.use_signals);
    }

    #[test]
    fn oversized_features_are_clamped() {
        let features = Features {
            heartbeat_delay: u64::MAX,
            batch_size: u64::MAX,
            max_staleness: u64::MAX,
            use_signals: false,
        };
        let session = Session::from_login(response(features), &SessionDefaults::default());
        assert_eq!(session.heartbeat, MAX_PERIOD);
        assert_eq!(session.batch_size, MAX_BATCH_SIZE);
        assert_eq!(session.max_staleness, MAX_PERIOD);
    }
}
