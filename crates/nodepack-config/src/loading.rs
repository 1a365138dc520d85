use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format as _, Json, Serialized},
};

use crate::error::{ConfigError, Result};
use crate::options::BundleOptions;

/// Config file picked up from the working directory when no path is given.
pub const CONFIG_FILE_NAME: &str = "nodepack.config.json";

/// Prefix of environment variables that override file settings.
const ENV_PREFIX: &str = "NODEPACK_";

impl BundleOptions {
    /// Layered configuration sources, lowest priority first:
    /// defaults, config file, `NODEPACK_*` environment variables.
    ///
    /// Callers may merge further providers (e.g. parsed CLI flags) on top.
    pub fn figment(cwd: &Path, config_path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::new().merge(Serialized::defaults(BundleOptions::default()));

        let config_file = match config_path {
            Some(path) => {
                let path = cwd.join(path);
                if !path.is_file() {
                    return Err(ConfigError::FileNotFound(path));
                }
                Some(path)
            }
            None => {
                let default_path = cwd.join(CONFIG_FILE_NAME);
                default_path.is_file().then_some(default_path)
            }
        };

        if let Some(path) = config_file {
            tracing::debug!("loading config from {}", path.display());
            figment = figment.merge(Json::file(path));
        }

        // Environment keys arrive lowercased with underscores; fields are camelCase.
        let env = Env::prefixed(ENV_PREFIX).map(|key| match key.as_str() {
            "source_map" => "sourceMap".into(),
            other => other.to_string().into(),
        });

        Ok(figment.merge(env))
    }

    /// Load and validate options from all configuration layers.
    pub fn load(cwd: &Path, config_path: Option<&Path>) -> Result<Self> {
        let options: BundleOptions = Self::figment(cwd, config_path)?
            .extract()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }
}
