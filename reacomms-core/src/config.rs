use std::time::Duration;

use reacomms_proto::command::DEFAULT_BASE_PATH;

use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Period of the update timer and the floor for every refresh interval.
    pub min_update: Duration,
    pub track_refresh: Duration,
    pub transport_refresh: Duration,
    pub options_refresh: Duration,
    pub base_path: String,
}

impl Config {
    /// Uses `min_update` for every refresh interval.
    pub fn with_min_update(min_update: Duration) -> Config {
        Config {
            min_update,
            track_refresh: min_update,
            transport_refresh: min_update,
            options_refresh: min_update,
            base_path: DEFAULT_BASE_PATH.to_string(),
        }
    }

    /// `fps` updates per second.
    pub fn with_fps(fps: u32) -> Result<Config> {
        if fps == 0 {
            return Err(Error::Construction("fps must be positive".to_string()));
        }
        Ok(Config::with_min_update(Duration::from_millis(
            1000 / u64::from(fps),
        ))
        .clamped())
    }

    /// Raises refresh intervals that are shorter than `min_update`.
    pub fn clamped(mut self) -> Config {
        let floor = self.min_update;
        for interval in [
            &mut self.track_refresh,
            &mut self.transport_refresh,
            &mut self.options_refresh,
        ] {
            *interval = (*interval).max(floor);
        }
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::with_min_update(Duration::from_millis(1000 / 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.min_update, Duration::from_millis(16));
        assert_eq!(config.track_refresh, config.min_update);
        assert_eq!(config.base_path, "/_/");
    }

    #[test]
    fn fps() {
        assert_eq!(
            Config::with_fps(10).unwrap().min_update,
            Duration::from_millis(100)
        );
        assert!(matches!(Config::with_fps(0), Err(Error::Construction(_))));
    }

    #[test]
    fn refresh_never_below_min_update() {
        let config = Config {
            track_refresh: Duration::from_millis(1),
            ..Config::with_min_update(Duration::from_millis(50))
        }
        .clamped();
        assert_eq!(config.track_refresh, Duration::from_millis(50));
    }
}
