//! Validated engine settings.

use rand::Rng;
use std::time::Duration;

use crate::error::{LoadError, LoadResult};

/// Uniform pause range between two actions of the same user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThinkTime {
    min: Duration,
    max: Duration,
}

impl ThinkTime {
    pub fn new(min: Duration, max: Duration) -> LoadResult<Self> {
        if min > max {
            return Err(LoadError::InvalidThinkTime(format!(
                "min {:?} exceeds max {:?}",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    pub fn from_secs_f64(min_secs: f64, max_secs: f64) -> LoadResult<Self> {
        Self::new(secs("min", min_secs)?, secs("max", max_secs)?)
    }

    /// No pause at all; useful for saturation runs and tests.
    pub fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Draw a pause uniformly from `[min, max]`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let secs = rng.gen_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

fn secs(name: &str, value: f64) -> LoadResult<Duration> {
    if !value.is_finite() || value < 0.0 {
        return Err(LoadError::InvalidThinkTime(format!(
            "{} must be a non-negative number of seconds, got {}",
            name, value
        )));
    }
    Duration::try_from_secs_f64(value).map_err(|e| {
        LoadError::InvalidThinkTime(format!("{} of {} seconds is out of range: {}", name, value, e))
    })
}

/// Settings shared by every user of a class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserSettings {
    pub think_time: ThinkTime,
    pub request_timeout: Duration,
}

impl UserSettings {
    pub fn new(think_time: ThinkTime, request_timeout: Duration) -> LoadResult<Self> {
        if request_timeout.is_zero() {
            return Err(LoadError::InvalidParameter {
                param: "request_timeout".into(),
                message: "must be > 0".into(),
            });
        }
        Ok(Self {
            think_time,
            request_timeout,
        })
    }
}

/// Population-level scheduler settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerSettings {
    /// Grace period for users to reach `Stopped` after a stop signal.
    pub drain_timeout: Duration,
    /// Upper bound on concurrently active users across all classes.
    pub max_users: Option<usize>,
}

impl SchedulerSettings {
    pub fn new(drain_timeout: Duration, max_users: Option<usize>) -> LoadResult<Self> {
        if drain_timeout.is_zero() {
            return Err(LoadError::InvalidParameter {
                param: "drain_timeout".into(),
                message: "must be > 0".into(),
            });
        }
        if max_users == Some(0) {
            return Err(LoadError::InvalidParameter {
                param: "max_users".into(),
                message: "must be > 0 when set".into(),
            });
        }
        Ok(Self {
            drain_timeout,
            max_users,
        })
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(30),
            max_users: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_think_time_rejects_inverted_range() {
        let err = ThinkTime::from_secs_f64(3.0, 1.0).unwrap_err();
        assert!(matches!(err, LoadError::InvalidThinkTime(_)));
    }

    #[test]
    fn test_think_time_rejects_negative_and_nan() {
        assert!(ThinkTime::from_secs_f64(-1.0, 1.0).is_err());
        assert!(ThinkTime::from_secs_f64(0.0, f64::NAN).is_err());
    }

    #[test]
    fn test_think_time_rejects_unrepresentable_secs() {
        let err = ThinkTime::from_secs_f64(1.0, 1e30).unwrap_err();
        assert!(matches!(err, LoadError::InvalidThinkTime(_)));
        assert!(err.to_string().contains("max"));
    }

    #[test]
    fn test_think_time_samples_within_range() {
        let think = ThinkTime::from_secs_f64(1.0, 3.0).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..1000 {
            let pause = think.sample(&mut rng);
            assert!(pause >= Duration::from_secs(1));
            assert!(pause <= Duration::from_secs(3));
        }
    }

    #[test]
    fn test_fixed_think_time() {
        let think = ThinkTime::from_secs_f64(2.0, 2.0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(think.sample(&mut rng), Duration::from_secs(2));
        assert_eq!(ThinkTime::none().sample(&mut rng), Duration::ZERO);
    }

    #[test]
    fn test_user_settings_require_timeout() {
        assert!(UserSettings::new(ThinkTime::none(), Duration::ZERO).is_err());
        assert!(UserSettings::new(ThinkTime::none(), Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_scheduler_settings_validation() {
        assert!(SchedulerSettings::new(Duration::ZERO, None).is_err());
        assert!(SchedulerSettings::new(Duration::from_secs(5), Some(0)).is_err());
        let ok = SchedulerSettings::new(Duration::from_secs(5), Some(100)).unwrap();
        assert_eq!(ok.max_users, Some(100));
    }
}
