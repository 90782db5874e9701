//! Lineage traversal configuration.

use serde::Deserialize;

use super::error::ValidationError;

/// Upper bound accepted for `max_chain_depth`.
pub const MAX_CHAIN_DEPTH_LIMIT: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LineageConfig {
    /// Maximum number of supersession links a chain walk may follow
    #[serde(default = "default_max_chain_depth")]
    pub max_chain_depth: u32,
}

impl LineageConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_chain_depth == 0 || self.max_chain_depth > MAX_CHAIN_DEPTH_LIMIT {
            return Err(ValidationError::InvalidChainDepth(self.max_chain_depth));
        }
        Ok(())
    }
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: default_max_chain_depth(),
        }
    }
}

fn default_max_chain_depth() -> u32 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_depth_is_one_hundred() {
        assert_eq!(LineageConfig::default().max_chain_depth, 100);
        assert!(LineageConfig::default().validate().is_ok());
    }

    #[test]
    fn depth_must_be_within_bounds() {
        for bad in [0, MAX_CHAIN_DEPTH_LIMIT + 1] {
            let config = LineageConfig { max_chain_depth: bad };
            assert!(matches!(
                config.validate(),
                Err(ValidationError::InvalidChainDepth(d)) if d == bad
            ));
        }
        let edge = LineageConfig {
            max_chain_depth: MAX_CHAIN_DEPTH_LIMIT,
        };
        assert!(edge.validate().is_ok());
    }
}
