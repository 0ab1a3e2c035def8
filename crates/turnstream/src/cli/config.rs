use dotenvy::dotenv;
use eyre::Result;
use std::path::Path;
use turnstream_core::config::ClientConfig;

pub fn load_env() -> Result<()> {
    dotenv().ok();
    Ok(())
}

/// Config file (explicit path or the per-user default), then `TURNSTREAM_*`
/// variables, then the `--endpoint` flag.
pub fn resolve_client_config(path: Option<&Path>, endpoint: Option<&str>) -> Result<ClientConfig> {
    let config = match path {
        Some(path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load()?,
    };

    Ok(config.with_env_overrides().with_overrides(endpoint, None))
}
