//! # Per-Node Belief Distributions
//!
//! A [`BeliefModel`] is an immutable parametric distribution over a node's
//! probability of being correct. Bayesian updates never mutate a belief; they
//! return a [`BayesianUpdate`] record holding prior, likelihood and posterior.
//!
//! ## Update rules
//!
//! - **Normal–Normal** (conjugate): precision-weighted mean, precisions add.
//!   The observation precision is `reliability × power / OBSERVATION_VARIANCE`.
//! - **Beta–Beta** (conjugate): the observation contributes
//!   `reliability × power × BETA_PRIOR_STRENGTH` pseudo-counts, split between
//!   α and β by the observed value.
//! - **Dirichlet / Uniform**: no conjugate form here; a reliability-weighted
//!   linear move of the mean yields a Normal posterior.
//!
//! An observation with zero weight returns the prior unchanged.

use crate::engine::errors::EngineError;
use crate::engine::graph::{EdgeId, Node, NodeId, NodeType};
use crate::engine::numeric::{digamma, ln_gamma, ln_multivariate_beta, z_for_level};
use crate::engine::propagation::SourceType;

/// Minimum prior variance so a fresh node is never overconfident.
pub const PRIOR_VARIANCE_FLOOR: f64 = 0.04;

/// Epsilon guard for variances used as divisors.
pub const MIN_VARIANCE: f64 = 1e-6;

/// Minimum Beta/Dirichlet parameter to avoid degenerate distributions.
pub const MIN_BETA_PARAM: f64 = 0.01;

/// Pseudo-count scale mapping a mean in `[0, 1]` to Beta parameters.
pub const BETA_PRIOR_STRENGTH: f64 = 10.0;

/// Variance of a single full-weight observation.
pub const OBSERVATION_VARIANCE: f64 = 0.04;

/// Level of the credible interval cached on every belief.
pub const CREDIBLE_LEVEL: f64 = 0.95;

/// Distribution family tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DistributionFamily {
    Normal,
    Beta,
    Dirichlet,
    Uniform,
}

/// Family-specific parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Distribution {
    Normal { mean: f64, variance: f64 },
    Beta { alpha: f64, beta: f64 },
    /// The first concentration is the proposition the node asserts.
    Dirichlet { concentrations: Vec<f64> },
    Uniform { low: f64, high: f64 },
}

impl Distribution {
    pub fn family(&self) -> DistributionFamily {
        match self {
            Distribution::Normal { .. } => DistributionFamily::Normal,
            Distribution::Beta { .. } => DistributionFamily::Beta,
            Distribution::Dirichlet { .. } => DistributionFamily::Dirichlet,
            Distribution::Uniform { .. } => DistributionFamily::Uniform,
        }
    }
}

/// Immutable belief with cached summary statistics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BeliefModel {
    distribution: Distribution,
    mean: f64,
    variance: f64,
    interval: (f64, f64),
    entropy: f64,
}

impl BeliefModel {
    pub fn normal(mean: f64, variance: f64) -> Result<Self, EngineError> {
        Self::from_distribution(Distribution::Normal { mean, variance })
    }

    pub fn beta(alpha: f64, beta: f64) -> Result<Self, EngineError> {
        Self::from_distribution(Distribution::Beta { alpha, beta })
    }

    pub fn dirichlet(concentrations: Vec<f64>) -> Result<Self, EngineError> {
        Self::from_distribution(Distribution::Dirichlet { concentrations })
    }

    pub fn uniform(low: f64, high: f64) -> Result<Self, EngineError> {
        Self::from_distribution(Distribution::Uniform { low, high })
    }

    /// Validates parameters and computes mean, variance, interval and entropy.
    pub fn from_distribution(distribution: Distribution) -> Result<Self, EngineError> {
        let (mean, variance, entropy) = match &distribution {
            Distribution::Normal { mean, variance } => {
                ensure_finite(&[*mean, *variance], "normal")?;
                if *variance < 0.0 {
                    return Err(EngineError::Numerical(format!(
                        "normal variance must be non-negative, got {}",
                        variance
                    )));
                }
                let var = variance.max(MIN_VARIANCE);
                let entropy = 0.5 * (2.0 * std::f64::consts::PI * std::f64::consts::E * var).ln();
                (*mean, var, entropy)
            }
            Distribution::Beta { alpha, beta } => {
                ensure_finite(&[*alpha, *beta], "beta")?;
                if *alpha <= 0.0 || *beta <= 0.0 {
                    return Err(EngineError::Numerical(format!(
                        "beta parameters must be positive, got α={} β={}",
                        alpha, beta
                    )));
                }
                let (a, b) = (alpha.max(MIN_BETA_PARAM), beta.max(MIN_BETA_PARAM));
                let sum = a + b;
                let mean = a / sum;
                let variance = (a * b) / (sum * sum * (sum + 1.0));
                let entropy = ln_gamma(a) + ln_gamma(b) - ln_gamma(sum) - (a - 1.0) * digamma(a)
                    - (b - 1.0) * digamma(b)
                    + (sum - 2.0) * digamma(sum);
                (mean, variance, entropy)
            }
            Distribution::Dirichlet { concentrations } => {
                ensure_finite(concentrations, "dirichlet")?;
                if concentrations.len() < 2 || concentrations.iter().any(|&c| c <= 0.0) {
                    return Err(EngineError::Numerical(
                        "dirichlet needs at least two positive concentrations".into(),
                    ));
                }
                let alphas: Vec<f64> = concentrations.iter().map(|c| c.max(MIN_BETA_PARAM)).collect();
                let sum: f64 = alphas.iter().sum();
                let a0 = alphas[0];
                let mean = a0 / sum;
                let variance = a0 * (sum - a0) / (sum * sum * (sum + 1.0));
                let k = alphas.len() as f64;
                let entropy = ln_multivariate_beta(&alphas) + (sum - k) * digamma(sum)
                    - alphas.iter().map(|&a| (a - 1.0) * digamma(a)).sum::<f64>();
                (mean, variance, entropy)
            }
            Distribution::Uniform { low, high } => {
                ensure_finite(&[*low, *high], "uniform")?;
                if high <= low {
                    return Err(EngineError::Numerical(format!(
                        "uniform bounds must satisfy low < high, got [{}, {}]",
                        low, high
                    )));
                }
                let width = high - low;
                ((low + high) / 2.0, width * width / 12.0, width.ln())
            }
        };

        let half_width = z_for_level(CREDIBLE_LEVEL) * variance.max(0.0).sqrt();
        let interval = (
            (mean - half_width).clamp(0.0, 1.0),
            (mean + half_width).clamp(0.0, 1.0),
        );

        Ok(Self {
            distribution,
            mean,
            variance,
            interval,
            entropy,
        })
    }

    /// Initial belief for a node that has none attached.
    ///
    /// Evidence nodes carrying a statistical power get a Beta prior; every
    /// other node gets a Normal prior over its confidence components with the
    /// variance floored at [`PRIOR_VARIANCE_FLOOR`].
    pub fn prior_for(node: &Node) -> Result<Self, EngineError> {
        let mean = node.confidence.mean();
        if node.node_type == NodeType::Evidence && node.statistical_power().is_some() {
            let alpha = (mean * BETA_PRIOR_STRENGTH).max(MIN_BETA_PARAM);
            let beta = ((1.0 - mean) * BETA_PRIOR_STRENGTH).max(MIN_BETA_PARAM);
            return Self::beta(alpha, beta);
        }
        Self::normal(mean, node.confidence.variance().max(PRIOR_VARIANCE_FLOOR))
    }

    pub fn family(&self) -> DistributionFamily {
        self.distribution.family()
    }

    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }

    /// 95% credible interval, clamped to `[0, 1]`.
    pub fn confidence_interval(&self) -> (f64, f64) {
        self.interval
    }

    /// Differential entropy in nats.
    pub fn entropy(&self) -> f64 {
        self.entropy
    }

    /// Computes the posterior for one observation.
    pub fn posterior(&self, likelihood: &Likelihood) -> Result<BeliefModel, EngineError> {
        let weight = likelihood.weight();
        if weight <= 0.0 {
            return Ok(self.clone());
        }
        let x = likelihood.value;
        match &self.distribution {
            Distribution::Normal { .. } => {
                let tau_prior = 1.0 / self.variance.max(MIN_VARIANCE);
                let tau_obs = weight / OBSERVATION_VARIANCE;
                let tau_post = tau_prior + tau_obs;
                let mean = (tau_prior * self.mean + tau_obs * x) / tau_post;
                BeliefModel::normal(mean.clamp(0.0, 1.0), 1.0 / tau_post)
            }
            Distribution::Beta { alpha, beta } => {
                let n = weight * BETA_PRIOR_STRENGTH;
                BeliefModel::beta(alpha + x * n, beta + (1.0 - x) * n)
            }
            Distribution::Dirichlet { .. } | Distribution::Uniform { .. } => {
                let mean = (1.0 - weight) * self.mean + weight * x;
                let variance = (self.variance * (1.0 - 0.5 * weight)).max(MIN_VARIANCE);
                BeliefModel::normal(mean.clamp(0.0, 1.0), variance)
            }
        }
    }

    /// Magnitude of a belief change: KL(posterior ‖ prior) for two Normals,
    /// otherwise the absolute change of the mean.
    pub fn update_strength(prior: &BeliefModel, posterior: &BeliefModel) -> f64 {
        match (&prior.distribution, &posterior.distribution) {
            (Distribution::Normal { .. }, Distribution::Normal { .. }) => {
                let vp = prior.variance.max(MIN_VARIANCE);
                let vq = posterior.variance.max(MIN_VARIANCE);
                let diff = posterior.mean - prior.mean;
                (0.5 * ((vp / vq).ln() + (vq + diff * diff) / vp - 1.0)).max(0.0)
            }
            _ => (posterior.mean - prior.mean).abs(),
        }
    }
}

fn ensure_finite(values: &[f64], family: &str) -> Result<(), EngineError> {
    match values.iter().find(|v| !v.is_finite()) {
        Some(v) => Err(EngineError::Numerical(format!(
            "non-finite {} parameter: {}",
            family, v
        ))),
        None => Ok(()),
    }
}

/// A single observation as seen by the update rules.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Likelihood {
    /// Observed value in `[0, 1]`
    pub value: f64,
    /// Source reliability in `[0, 1]`
    pub reliability: f64,
    /// Statistical power in `[0, 1]`
    pub statistical_power: f64,
}

impl Likelihood {
    /// Effective observation weight: reliability × power.
    pub fn weight(&self) -> f64 {
        (self.reliability * self.statistical_power).clamp(0.0, 1.0)
    }
}

/// Where an update came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UpdateSource {
    /// Direct evidence submitted by a collaborator.
    Evidence(SourceType),
    /// Pseudo-evidence sent along an edge during propagation.
    Propagated { edge: EdgeId, from: NodeId },
}

/// Record of one Bayesian update, preserving the prior.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BayesianUpdate {
    pub node: NodeId,
    pub source: UpdateSource,
    pub prior: BeliefModel,
    pub likelihood: Likelihood,
    pub posterior: BeliefModel,
    pub update_strength: f64,
    /// Prior entropy minus posterior entropy (nats)
    pub information_gain: f64,
}

impl BayesianUpdate {
    pub fn compute(
        node: NodeId,
        source: UpdateSource,
        prior: &BeliefModel,
        likelihood: Likelihood,
    ) -> Result<Self, EngineError> {
        let posterior = prior.posterior(&likelihood)?;
        let update_strength = BeliefModel::update_strength(prior, &posterior);
        let information_gain = prior.entropy() - posterior.entropy();
        Ok(Self {
            node,
            source,
            prior: prior.clone(),
            likelihood,
            posterior,
            update_strength,
            information_gain,
        })
    }
}
