//! Configuration trait for validated, consistent configuration across crates.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for configuration types that can be validated and have defaults.
pub trait ValidatedConfig: Send + Sync + Clone + Debug + Serialize + for<'de> Deserialize<'de> {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Validate the configuration, returning an error if invalid.
    fn validate(&self) -> Result<(), Self::Error>;

    /// Merge this configuration with defaults, preferring this config's values.
    fn merge_with_defaults(self, defaults: Self) -> Self;

    /// Description of what this configuration controls.
    fn description() -> &'static str;
}

/// Configurations that can be constructed with sensible, pre-validated defaults.
pub trait DefaultConfig: ValidatedConfig + Default {
    fn validated_default() -> Result<Self, Self::Error> {
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }
}

impl<T> DefaultConfig for T where T: ValidatedConfig + Default {}

#[cfg(test)]
mod tests {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Clone, Serialize, Deserialize, Default)]
    struct TestConfig {
        max_value: u32,
    }

    #[derive(Error, Debug)]
    enum TestConfigError {
        #[error("max_value must be greater than 0")]
        InvalidMaxValue,
    }

    impl ValidatedConfig for TestConfig {
        type Error = TestConfigError;

        fn validate(&self) -> Result<(), Self::Error> {
            if self.max_value == 0 {
                return Err(TestConfigError::InvalidMaxValue);
            }
            Ok(())
        }

        fn merge_with_defaults(self, defaults: Self) -> Self {
            Self {
                max_value: if self.max_value != 0 {
                    self.max_value
                } else {
                    defaults.max_value
                },
            }
        }

        fn description() -> &'static str {
            "Test configuration"
        }
    }

    #[test]
    fn validated_default_requires_nonzero() {
        assert!(TestConfig::validated_default().is_err());
    }

    #[test]
    fn merge_prefers_self_then_defaults() {
        let cfg = TestConfig { max_value: 0 }.merge_with_defaults(TestConfig { max_value: 7 });
        assert_eq!(cfg.max_value, 7);
    }
}
