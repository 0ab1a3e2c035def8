use super::Command;
use async_trait::async_trait;
use eyre::Result;
use std::io::Write;
use std::path::PathBuf;
use turnstream_core::config::ClientConfig;

pub struct ConfigCommand {
    pub action: ConfigAction,
    /// Explicit `--config` path, if one was given.
    pub path: Option<PathBuf>,
    /// Configuration after env and flag overrides.
    pub resolved: ClientConfig,
}

pub enum ConfigAction {
    Show,
    Path,
    Init { force: bool },
}

#[async_trait]
impl Command for ConfigCommand {
    async fn execute(&self) -> Result<()> {
        let path = match &self.path {
            Some(path) => path.clone(),
            None => ClientConfig::config_path()?,
        };
        let mut stdout = std::io::stdout();

        match &self.action {
            ConfigAction::Path => writeln!(stdout, "{}", path.display())?,
            ConfigAction::Show => {
                let endpoint = self
                    .resolved
                    .endpoint_url()
                    .map_or_else(|e| format!("invalid ({e})"), |url| url.to_string());
                writeln!(stdout, "Config file: {}", path.display())?;
                writeln!(stdout, "Endpoint: {endpoint}")?;
                writeln!(stdout, "\n{}", toml::to_string_pretty(&self.resolved)?)?;
            }
            ConfigAction::Init { force } => {
                if path.exists() && !force {
                    eyre::bail!(
                        "Config file already exists at {}; pass --force to overwrite",
                        path.display()
                    );
                }
                ClientConfig::default().save_to(&path)?;
                writeln!(stdout, "Wrote default config to {}", path.display())?;
            }
        }

        Ok(())
    }
}
