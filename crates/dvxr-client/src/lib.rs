//! # dvxr-client
//!
//! Composition root for the remote-desktop XR client. Loads configuration,
//! installs logging, and drives an [`Orchestrator`] from a frame clock and
//! the page's input events.
//!
//! ```rust,ignore
//! let (host, handle) = dvxr_client::start(platform)?;
//! page.on_click(move |id| { handle.click(id); });
//! host.run().await;
//! ```

pub mod action;
pub mod host;
pub mod telemetry;

use anyhow::Context;
use dvxr_session::Platform;

pub use action::Action;
pub use dvxr_session::Orchestrator;
pub use host::{Host, HostHandle, HostInput};

/// Load config from the environment, install logging, and build a host.
pub fn start(platform: Platform) -> anyhow::Result<(Host, HostHandle)> {
    let config = dvxr_common::config::load().context("failed to load configuration")?;
    telemetry::init_tracing(&config.log)?;
    tracing::info!("dvxr client v{} starting", env!("CARGO_PKG_VERSION"));
    Host::new(config, platform)
}
