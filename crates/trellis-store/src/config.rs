//! Processor runtime limits

use serde::{Deserialize, Serialize};
use trellis_core::{Result, TrellisError};

/// Validated runtime limits for the query processor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Parent ids per driver query batch
    pub parent_batch_size: usize,
    /// Maximum rows requested per driver call page
    pub row_limit: usize,
    /// Maximum nodes per emitted reply batch
    pub reply_batch_size: usize,
    /// Depth used when a query declares none
    pub default_depth: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            parent_batch_size: 64,
            row_limit: 4096,
            reply_batch_size: 128,
            default_depth: usize::MAX,
        }
    }
}

impl ProcessorConfig {
    /// Validate the configured limits
    pub fn validate(&self) -> Result<()> {
        if self.parent_batch_size == 0 {
            return Err(TrellisError::invalid("parent_batch_size must be positive"));
        }
        if self.row_limit == 0 {
            return Err(TrellisError::invalid("row_limit must be positive"));
        }
        if self.reply_batch_size == 0 {
            return Err(TrellisError::invalid("reply_batch_size must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(ProcessorConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_batch_rejected() {
        let config = ProcessorConfig {
            parent_batch_size: 0,
            ..ProcessorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
