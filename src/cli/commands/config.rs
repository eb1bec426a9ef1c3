use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use crate::config::RestarterConfig;

pub struct ShowConfigCommand {
    pub config_path: Option<PathBuf>,
}

impl ShowConfigCommand {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self { config_path }
    }

    pub fn execute(&self) -> Result<()> {
        RestarterConfig::load_env_file()?;
        let config = RestarterConfig::load_from(self.config_path.as_deref())?;
        print!("{}", config.to_toml()?);
        Ok(())
    }
}

pub struct InitConfigCommand {
    pub path: PathBuf,
    pub force: bool,
}

impl InitConfigCommand {
    pub fn new(path: PathBuf, force: bool) -> Self {
        Self { path, force }
    }

    pub fn execute(&self) -> Result<()> {
        write_default_config(&self.path, self.force)?;
        println!("✅ Wrote default configuration to {}", self.path.display());
        println!("   → Set device.base_url to your device's address");
        println!("   → Export DEVICE_RESTARTER__DEVICE__PASSWORD with the login password");
        Ok(())
    }
}

fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }
    RestarterConfig::default().save_to_file(path)
}
