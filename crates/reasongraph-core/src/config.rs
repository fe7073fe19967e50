//! Aggregated engine configuration.
//!
//! Each component validates its own section; [`EngineConfig::validate`] runs
//! all of them. With the `serde` feature the whole tree can be loaded from any
//! serde format.

use crate::adaptation::AdaptationConfig;
use crate::engine::errors::EngineError;
use crate::engine::propagation::PropagationConfig;
use crate::metrics::MetricsConfig;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    pub metrics: MetricsConfig,
    pub propagation: PropagationConfig,
    pub adaptation: AdaptationConfig,
}

impl EngineConfig {
    pub fn validate(self) -> Result<Self, EngineError> {
        Ok(Self {
            metrics: self.metrics.validate()?,
            propagation: self.propagation.validate()?,
            adaptation: self.adaptation.validate()?,
        })
    }
}
