//! The JS sandbox: a `deno_core`-based execution environment for rendering
//! bundles, plus the dedicated-thread worker pool that runs them.

mod pool;
mod runtime;
mod worker;

pub use pool::SandboxPool;
pub use runtime::{ExecPackage, HarvestOutcome};
