//! Posterior inference: Gibbs sampling, trace storage, summarization.

mod gibbs;
mod summary;
mod trace;

pub use gibbs::{sample, SamplerConfig, SamplerError};
pub use summary::{summarize, ParameterSummary, HDI_PROB};
pub use trace::{prior_predictive, Trace, POPULATION_EFFECT};
