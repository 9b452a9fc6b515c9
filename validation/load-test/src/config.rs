//! Configuration loading and management.

use anyhow::Context;
use loadgen_core::{SchedulerSettings, ThinkTime, UserSettings};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Main test configuration loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub base_url: String,
    pub duration_secs: u64,
    #[serde(default = "default_min_think")]
    pub min_think_secs: f64,
    #[serde(default = "default_max_think")]
    pub max_think_secs: f64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,
    #[serde(default)]
    pub max_users: Option<usize>,
    #[serde(default)]
    pub seed: Option<u64>, // Optional RNG seed for reproducible runs
    #[serde(default = "default_known_ids")]
    pub known_ids: Vec<String>,
    #[serde(default)]
    pub weights: ActionWeights,
    #[serde(default)]
    pub mix: BranchMix,
    #[serde(default = "default_user_classes")]
    pub user_classes: Vec<UserClassConfig>,
    #[serde(default)]
    pub log_outcomes: bool, // Write every action record to a JSONL file
}

/// Relative weights of the three product actions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionWeights {
    #[serde(default = "default_get_weight")]
    pub get_products: u32,
    #[serde(default = "default_create_weight")]
    pub create_valid_product: u32,
    #[serde(default = "default_invalid_weight")]
    pub create_invalid_or_duplicate_product: u32,
}

impl Default for ActionWeights {
    fn default() -> Self {
        Self {
            get_products: default_get_weight(),
            create_valid_product: default_create_weight(),
            create_invalid_or_duplicate_product: default_invalid_weight(),
        }
    }
}

impl ActionWeights {
    pub fn total(&self) -> u64 {
        u64::from(self.get_products)
            + u64::from(self.create_valid_product)
            + u64::from(self.create_invalid_or_duplicate_product)
    }
}

/// Branch probabilities inside the actions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BranchMix {
    /// Share of `get_products` calls that list the whole collection.
    #[serde(default = "default_list_all")]
    pub list_all: f64,
    /// Share of single fetches that target an id expected to exist.
    #[serde(default = "default_valid_fetch")]
    pub valid_fetch: f64,
    /// Share of bad creates that send an invalid payload rather than a duplicate.
    #[serde(default = "default_invalid_payload")]
    pub invalid_payload: f64,
}

impl Default for BranchMix {
    fn default() -> Self {
        Self {
            list_all: default_list_all(),
            valid_fetch: default_valid_fetch(),
            invalid_payload: default_invalid_payload(),
        }
    }
}

/// One population of virtual users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserClassConfig {
    pub name: String,
    pub target_concurrency: usize,
    pub spawn_rate_per_second: f64,
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,
    #[serde(default = "default_invalid_id_prefix")]
    pub invalid_id_prefix: String,
    #[serde(default = "default_counter_base")]
    pub counter_base: u64,
    /// Word used in generated product names, e.g. "Product test_1000".
    #[serde(default = "default_product_label")]
    pub product_label: String,
}

fn default_min_think() -> f64 {
    1.0
}

fn default_max_think() -> f64 {
    3.0
}

fn default_request_timeout() -> u64 {
    10
}

fn default_drain_timeout() -> u64 {
    30
}

fn default_known_ids() -> Vec<String> {
    vec!["1".to_string(), "2".to_string(), "3".to_string()]
}

fn default_get_weight() -> u32 {
    9
}

fn default_create_weight() -> u32 {
    2
}

fn default_invalid_weight() -> u32 {
    1
}

fn default_list_all() -> f64 {
    0.5
}

fn default_valid_fetch() -> f64 {
    0.8
}

fn default_invalid_payload() -> f64 {
    0.7
}

fn default_id_prefix() -> String {
    "test_".to_string()
}

fn default_invalid_id_prefix() -> String {
    "invalid_".to_string()
}

fn default_counter_base() -> u64 {
    1000
}

fn default_product_label() -> String {
    "Product".to_string()
}

/// `standard` and `fast` users, ten of each, with disjoint id ranges.
pub fn default_user_classes() -> Vec<UserClassConfig> {
    vec![
        UserClassConfig {
            name: "standard".to_string(),
            target_concurrency: 10,
            spawn_rate_per_second: 2.0,
            id_prefix: "test_".to_string(),
            invalid_id_prefix: "invalid_".to_string(),
            counter_base: 1000,
            product_label: "Product".to_string(),
        },
        UserClassConfig {
            name: "fast".to_string(),
            target_concurrency: 10,
            spawn_rate_per_second: 2.0,
            id_prefix: "fast_test_".to_string(),
            invalid_id_prefix: "fast_invalid_".to_string(),
            counter_base: 2000,
            product_label: "Fast Product".to_string(),
        },
    ]
}

impl TestConfig {
    /// Load configuration from YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse scenario file {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: TestConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Built-in scenario used by `quick`: default mix and classes against `base_url`.
    pub fn quick(base_url: impl Into<String>, duration_secs: u64, users_per_class: usize) -> Self {
        let user_classes = default_user_classes()
            .into_iter()
            .map(|mut class| {
                class.target_concurrency = users_per_class;
                class
            })
            .collect();

        Self {
            name: "quick".to_string(),
            description: "Quick smoke test with the default product mix".to_string(),
            base_url: base_url.into(),
            duration_secs,
            min_think_secs: default_min_think(),
            max_think_secs: default_max_think(),
            request_timeout_secs: default_request_timeout(),
            drain_timeout_secs: default_drain_timeout(),
            max_users: None,
            seed: None,
            known_ids: default_known_ids(),
            weights: ActionWeights::default(),
            mix: BranchMix::default(),
            user_classes,
            log_outcomes: false,
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.duration_secs == 0 {
            anyhow::bail!("duration_secs must be > 0");
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            anyhow::bail!("base_url must start with http:// or https://, got {}", self.base_url);
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be > 0");
        }
        if self.drain_timeout_secs == 0 {
            anyhow::bail!("drain_timeout_secs must be > 0");
        }
        if self.max_users == Some(0) {
            anyhow::bail!("max_users must be > 0 when set");
        }
        self.think_time()?;

        if self.known_ids.is_empty() {
            anyhow::bail!("at least one known product id must be specified");
        }
        if self.weights.total() == 0 {
            anyhow::bail!("total action weight must be > 0");
        }
        for (name, p) in [
            ("mix.list_all", self.mix.list_all),
            ("mix.valid_fetch", self.mix.valid_fetch),
            ("mix.invalid_payload", self.mix.invalid_payload),
        ] {
            if !(0.0..=1.0).contains(&p) {
                anyhow::bail!("{} must be within [0, 1], got {}", name, p);
            }
        }

        if self.user_classes.is_empty() {
            anyhow::bail!("at least one user class must be specified");
        }
        let mut names = HashSet::new();
        for class in &self.user_classes {
            if class.name.trim().is_empty() {
                anyhow::bail!("user class name must not be empty");
            }
            if class.target_concurrency == 0 {
                anyhow::bail!("user class '{}': target_concurrency must be > 0", class.name);
            }
            if !class.spawn_rate_per_second.is_finite() || class.spawn_rate_per_second <= 0.0 {
                anyhow::bail!("user class '{}': spawn_rate_per_second must be > 0", class.name);
            }
            if Duration::try_from_secs_f64(1.0 / class.spawn_rate_per_second).is_err() {
                anyhow::bail!(
                    "user class '{}': spawn_rate_per_second {} is too small",
                    class.name,
                    class.spawn_rate_per_second
                );
            }
            if class.id_prefix.is_empty() {
                anyhow::bail!("user class '{}': id_prefix must not be empty", class.name);
            }
            if !names.insert(class.name.as_str()) {
                anyhow::bail!("duplicate user class name '{}'", class.name);
            }
        }

        // Counters grow without bound, so a shared or digit-extended prefix
        // collides whatever the counter bases are.
        for (i, class) in self.user_classes.iter().enumerate() {
            for other in &self.user_classes[i + 1..] {
                if prefixes_overlap(&class.id_prefix, &other.id_prefix) {
                    anyhow::bail!(
                        "user classes '{}' and '{}' have overlapping id prefixes '{}' and '{}'",
                        class.name,
                        other.name,
                        class.id_prefix,
                        other.id_prefix
                    );
                }
            }
            for other in &self.user_classes {
                if prefixes_overlap(&class.invalid_id_prefix, &other.id_prefix) {
                    anyhow::bail!(
                        "user class '{}': invalid_id_prefix '{}' overlaps id prefix '{}' of class '{}'",
                        class.name,
                        class.invalid_id_prefix,
                        other.id_prefix,
                        other.name
                    );
                }
            }
        }

        if let Some(limit) = self.max_users {
            if self.total_users() > limit {
                anyhow::bail!(
                    "user classes request {} users but max_users is {}",
                    self.total_users(),
                    limit
                );
            }
        }
        Ok(())
    }

    /// Users across all classes once ramp-up completes.
    pub fn total_users(&self) -> usize {
        self.user_classes.iter().map(|c| c.target_concurrency).sum()
    }

    pub fn think_time(&self) -> anyhow::Result<ThinkTime> {
        Ok(ThinkTime::from_secs_f64(self.min_think_secs, self.max_think_secs)?)
    }

    pub fn user_settings(&self) -> anyhow::Result<UserSettings> {
        Ok(UserSettings::new(
            self.think_time()?,
            Duration::from_secs(self.request_timeout_secs),
        )?)
    }

    pub fn scheduler_settings(&self) -> anyhow::Result<SchedulerSettings> {
        Ok(SchedulerSettings::new(
            Duration::from_secs(self.drain_timeout_secs),
            self.max_users,
        )?)
    }
}

/// Whether `<a><n>` and `<b><m>` can name the same id for some counters.
fn prefixes_overlap(a: &str, b: &str) -> bool {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    long.strip_prefix(short)
        .is_some_and(|rest| rest.bytes().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
name: minimal
base_url: http://localhost:8080
duration_secs: 5
"#;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = TestConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.weights, ActionWeights::default());
        assert_eq!(config.weights.total(), 12);
        assert_eq!(config.known_ids, vec!["1", "2", "3"]);
        assert_eq!(config.user_classes.len(), 2);
        assert_eq!(config.user_classes[1].counter_base, 2000);
        assert_eq!(config.mix.invalid_payload, 0.7);
        assert!(!config.log_outcomes);
        config.validate().unwrap();
    }

    #[test]
    fn test_inverted_think_time_rejected() {
        let mut config = TestConfig::from_yaml(MINIMAL).unwrap();
        config.min_think_secs = 5.0;
        config.max_think_secs = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shared_id_prefix_rejected_whatever_the_base() {
        let mut config = TestConfig::from_yaml(MINIMAL).unwrap();
        config.user_classes[0].counter_base = 1000;
        config.user_classes[1].id_prefix = "test_".to_string();
        config.user_classes[1].counter_base = 1001;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("overlapping id prefixes"));
    }

    #[test]
    fn test_digit_extended_prefix_rejected() {
        // test_1 + 0 and test_ + 10 both name test_10.
        let mut config = TestConfig::from_yaml(MINIMAL).unwrap();
        config.user_classes[1].id_prefix = "test_1".to_string();
        assert!(config.validate().is_err());

        config.user_classes[1].id_prefix = "test_fast_".to_string();
        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_prefix_must_not_hit_created_ids() {
        let mut config = TestConfig::from_yaml(MINIMAL).unwrap();
        config.user_classes[1].invalid_id_prefix = "test_".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("invalid_id_prefix"));
    }

    #[test]
    fn test_tiny_spawn_rate_rejected() {
        let mut config = TestConfig::from_yaml(MINIMAL).unwrap();
        config.user_classes[0].spawn_rate_per_second = 1e-30;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("too small"));
    }

    #[test]
    fn test_huge_think_time_rejected() {
        let mut config = TestConfig::from_yaml(MINIMAL).unwrap();
        config.max_think_secs = 1e30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_users_over_max_users_rejected() {
        let mut config = TestConfig::from_yaml(MINIMAL).unwrap();
        config.max_users = Some(config.total_users() - 1);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_users"));

        config.max_users = Some(config.total_users());
        config.validate().unwrap();
    }

    #[test]
    fn test_probability_out_of_range_rejected() {
        let mut config = TestConfig::from_yaml(MINIMAL).unwrap();
        config.mix.list_all = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_quick_scenario_is_valid() {
        let config = TestConfig::quick("http://localhost:9000", 10, 3);
        config.validate().unwrap();
        assert_eq!(config.total_users(), 6);
        assert_eq!(config.base_url, "http://localhost:9000");
    }
}
