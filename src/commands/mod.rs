pub mod apply;
pub mod default;
pub mod find;
pub mod plan;

use anyhow::{Context as AnyhowContext, Result};
use policykit::PolicyEngine;
use policykit::backend::OktaBackend;
use std::sync::Arc;
use std::time::Duration;

use crate::Context;
use crate::config::{self, Config};

/// Load the policies file selected by `--config` or the default location
pub fn load_config(ctx: &Context) -> Result<Config> {
    let path = config::resolve_path(ctx.config.as_deref())?;
    log::debug!("loading policies from {}", path.display());
    Config::load(&path)
}

/// HTTP backend for the org described by the config
pub fn backend_for(config: &Config, token: String) -> OktaBackend {
    OktaBackend::with_timeout(
        config.org.url.as_str(),
        token,
        Duration::from_secs(config.org.timeout_secs),
    )
}

/// Connect an engine to the org described by the config
pub fn connect(config: &Config) -> Result<PolicyEngine> {
    let backend = backend_for(config, config.token()?);
    log::debug!("using {backend:?}");
    Ok(PolicyEngine::from_backend(Arc::new(backend)))
}

/// Load the config and connect in one step
pub fn session(ctx: &Context) -> Result<(Config, PolicyEngine)> {
    let config = load_config(ctx)?;
    let engine = connect(&config).context("Failed to connect to the org")?;
    Ok((config, engine))
}
