use std::time::Duration;

use crate::error::{MarkpipeError, MarkpipeResult};

pub const DEFAULT_PRE_ROLL: Duration = Duration::from_secs(2);
pub const DEFAULT_POST_ROLL: Duration = Duration::from_secs(5);

/// Key reserved for stopping playback; never a marker binding.
pub const QUIT_KEY: char = 'q';

/// Configuration for marking: clip interval geometry plus the table mapping
/// marker keys to event categories.
#[derive(Clone, Debug)]
pub struct MarkerConfig {
    pub pre_roll: Duration,
    pub post_roll: Duration,
    bindings: Vec<(char, i64)>,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        MarkerConfig::new(DEFAULT_PRE_ROLL, DEFAULT_POST_ROLL)
    }
}

impl MarkerConfig {
    pub fn new(pre_roll: Duration, post_roll: Duration) -> Self {
        Self {
            pre_roll,
            post_roll,
            bindings: default_bindings(),
        }
    }

    /// Replace the default digit table with an explicit key → category map.
    pub fn with_bindings(mut self, bindings: Vec<(char, i64)>) -> MarkpipeResult<Self> {
        for (i, &(key, category)) in bindings.iter().enumerate() {
            if key == QUIT_KEY {
                return Err(MarkpipeError::InvalidBinding(format!(
                    "'{}' is reserved for quit",
                    QUIT_KEY
                )));
            }
            if category < 1 {
                return Err(MarkpipeError::InvalidBinding(format!(
                    "category {} for key '{}' is not positive",
                    category, key
                )));
            }
            if bindings[..i].iter().any(|&(other, _)| other == key) {
                return Err(MarkpipeError::InvalidBinding(format!(
                    "key '{}' is bound twice",
                    key
                )));
            }
        }
        self.bindings = bindings;
        Ok(self)
    }

    pub fn category_for(&self, key: char) -> Option<i64> {
        self.bindings
            .iter()
            .find(|&&(bound, _)| bound == key)
            .map(|&(_, category)| category)
    }

    // Interval geometry is configured in seconds but applied in frame units;
    // these two do the conversion in one place.
    pub fn pre_roll_frames(&self, fps: f64) -> i64 {
        (self.pre_roll.as_secs_f64() * fps).floor() as i64
    }

    pub fn post_roll_frames(&self, fps: f64) -> i64 {
        (self.post_roll.as_secs_f64() * fps).floor() as i64
    }
}

fn default_bindings() -> Vec<(char, i64)> {
    ('1'..='9')
        .enumerate()
        .map(|(i, key)| (key, i as i64 + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings_cover_digits() {
        let config = MarkerConfig::default();
        assert_eq!(config.category_for('1'), Some(1));
        assert_eq!(config.category_for('9'), Some(9));
        assert_eq!(config.category_for('0'), None);
        assert_eq!(config.category_for('x'), None);
    }

    #[test]
    fn test_roll_conversion_uses_fps() {
        let config = MarkerConfig::default();
        assert_eq!(config.pre_roll_frames(25.0), 50);
        assert_eq!(config.post_roll_frames(25.0), 125);
        assert_eq!(config.pre_roll_frames(29.97), 59);
    }

    #[test]
    fn test_quit_key_cannot_be_bound() {
        let result = MarkerConfig::default().with_bindings(vec![('q', 1)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let result = MarkerConfig::default().with_bindings(vec![('a', 1), ('a', 2)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_custom_bindings_apply() {
        let config = MarkerConfig::default()
            .with_bindings(vec![('g', 1), ('b', 2)])
            .unwrap();
        assert_eq!(config.category_for('g'), Some(1));
        assert_eq!(config.category_for('b'), Some(2));
        assert_eq!(config.category_for('1'), None);
    }
}
