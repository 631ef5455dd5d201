use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::RwLock;

use super::error::Result;

// 配置构建器，所有层（默认配置、用户配置、环境变量、运行时覆盖）都叠加在这里
lazy_static! {
    pub static ref BUILDER: RwLock<ConfigBuilder<DefaultState>> = RwLock::new(Config::builder());
}

/// Environment variables prefixed with this value override configuration keys,
/// e.g. `SECDESC_LOG__LEVEL=debug`.
pub const ENV_PREFIX: &str = "SECDESC";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    /// 是否额外写入 logs/app.log
    #[serde(default)]
    pub file: bool,
}

/// How commands are executed on the inspected host. Unset fields take the
/// platform defaults of [`descriptor::host::CommandSettings`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandConfig {
    #[serde(default)]
    pub shell: Option<String>,
    #[serde(default)]
    pub shell_arg: Option<String>,
    #[serde(default)]
    pub powershell: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlistConfig {
    pub plutil: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub log: LogConfig,
    #[serde(default)]
    pub command: CommandConfig,
    pub plist: PlistConfig,
}

impl From<&CommandConfig> for descriptor::host::CommandSettings {
    fn from(config: &CommandConfig) -> Self {
        let defaults = descriptor::host::CommandSettings::default();
        descriptor::host::CommandSettings {
            shell: config.shell.clone().unwrap_or(defaults.shell),
            shell_arg: config.shell_arg.clone().unwrap_or(defaults.shell_arg),
            powershell: config.powershell.clone().unwrap_or(defaults.powershell),
        }
    }
}

impl AppConfig {
    /// Initialize AppConfig from the embedded default configuration and the environment.
    pub fn init(default_config: Option<&str>) -> Result<()> {
        let mut builder = Config::builder();

        // Embed file into executable
        // This macro will embed the configuration file into the
        // executable. Check include_str! for more info.
        if let Some(config_contents) = default_config {
            builder = builder.add_source(File::from_str(config_contents, FileFormat::Toml));
        }

        // Merge settings with env variables
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let mut w = BUILDER.write()?;
        *w = builder;

        Ok(())
    }

    /// Merge a user supplied configuration file on top of the current layers.
    pub fn merge_config(config_file: Option<&Path>) -> Result<()> {
        if let Some(config_file_path) = config_file {
            let mut w = BUILDER.write()?;
            *w = w.clone().add_source(File::from(config_file_path));
        }
        Ok(())
    }

    // Set CONFIG
    pub fn set(key: &str, value: &str) -> Result<()> {
        let mut w = BUILDER.write()?;
        *w = w.clone().set_override(key, value)?;

        Ok(())
    }

    // Get a single value
    pub fn get<T>(key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let r = BUILDER.read()?;
        let config = r.clone().build()?;

        Ok(config.get::<T>(key)?)
    }

    // Get CONFIG
    // This clones Config (from RwLock<Config>) into a new AppConfig object.
    // This means you have to fetch this again if you changed the configuration.
    pub fn fetch() -> Result<AppConfig> {
        let r = BUILDER.read()?;
        let config = r.clone().build()?;

        Ok(config.try_deserialize()?)
    }
}
