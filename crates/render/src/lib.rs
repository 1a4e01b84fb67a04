//! SSR render pipeline: package cache and fetcher, sandboxed JS execution, the
//! per-request render context, and the orchestrator that ties them together.
//!
//! This is the imperative shell: everything here does real I/O (network,
//! threads, a `deno_core::JsRuntime`). Pure request validation, configuration,
//! and bootstrap-script generation live one layer down, in `ssrender_core`.

mod cache;
mod context;
mod error;
mod fetcher;
mod orchestrator;
mod resource_loader;
mod sandbox;

pub use cache::{Package, PackageCache};
pub use context::RenderContext;
pub use error::{sanitize_error, RenderError, Result};
pub use fetcher::{FetchError, PackageFetcher};
pub use orchestrator::{RenderOrchestrator, RenderOutcome};
pub use resource_loader::{LoadOutcome, ResourceLoader};
pub use sandbox::{ExecPackage, HarvestOutcome, SandboxPool};
