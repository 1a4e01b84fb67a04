//! Pure SSR render logic: validation, configuration, and bootstrap scripting.
//!
//! No I/O, no async, no side effects. Everything that touches the network, a thread,
//! or a `deno_core::JsRuntime` lives one layer up, in the `ssrender` crate.

mod bootstrap;
mod config;
mod error;
mod model;
mod stats;
mod validation;

pub use bootstrap::{generate_bootstrap, ApolloBootstrapConfig};
pub use config::RenderCoreConfig;
pub use error::{RenderCoreError, Result};
pub use model::{ApolloNetworkConfig, ErrorBody, RenderBody, RenderCss, RenderResult};
pub use stats::RequestStats;
pub use validation::{filter_js_urls, validate_props, validate_render_body, validate_urls};
