use std::time::Duration;

use crate::config::{ConfigError, RunConfiguration, KEY_BOUND, KEY_DURATION, KEY_ITERATIONS};

/// How long each worker keeps iterating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// Run exactly this many iterations.
    Iterations(u64),
    /// Run until this much time has elapsed, checked before each iteration.
    Duration(Duration),
}

impl Bound {
    pub fn from_config(config: &RunConfiguration) -> Result<Self, ConfigError> {
        match config.get(KEY_BOUND)?.trim() {
            "iterations" => Ok(Bound::Iterations(config.parse(KEY_ITERATIONS)?)),
            "duration" => {
                let seconds: f64 = config.parse(KEY_DURATION)?;
                Duration::try_from_secs_f64(seconds)
                    .map(Bound::Duration)
                    .map_err(|e| ConfigError::Invalid {
                        key: KEY_DURATION.to_string(),
                        value: seconds.to_string(),
                        reason: e.to_string(),
                    })
            }
            other => Err(ConfigError::UnknownBound(other.to_string())),
        }
    }

    /// The planned run time, if the run is time bounded.
    pub fn planned_duration(&self) -> Option<Duration> {
        match self {
            Bound::Iterations(_) => None,
            Bound::Duration(d) => Some(*d),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_is_one_iteration() {
        let config = RunConfiguration::from_pairs([("scenario", "readSimple")]).unwrap();
        assert_eq!(Bound::Iterations(1), config.bound().unwrap());
    }

    #[test]
    fn duration_in_seconds() {
        let config =
            RunConfiguration::from_pairs([("bound", "duration"), ("duration", "2.5")]).unwrap();
        let bound = config.bound().unwrap();
        assert_eq!(Bound::Duration(Duration::from_millis(2500)), bound);
        assert_eq!(Some(Duration::from_millis(2500)), bound.planned_duration());
    }

    #[test]
    fn negative_duration_rejected() {
        let config =
            RunConfiguration::from_pairs([("bound", "duration"), ("duration", "-1")]).unwrap();
        assert!(matches!(config.bound(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn unknown_bound() {
        let config = RunConfiguration::from_pairs([("bound", "forever")]).unwrap();
        assert!(matches!(config.bound(), Err(ConfigError::UnknownBound(_))));
    }
}
