//! Job recipes, dispatch and the pipeline driver.
//!
//! Jobs run strictly one after another; each job's container steps run in
//! order and the first failing step fails the job.

pub mod driver;
pub mod recipe;
pub mod runner;

#[cfg(test)]
mod test_support;

pub use driver::{PipelineDriver, PipelineEvent, PipelineResult, select_jobs};
pub use recipe::{build_container, deploy_container};
pub use runner::JobRunner;
