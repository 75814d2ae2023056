//! Deployment configuration. By default, the config is created with opinionated default values,
//! which can then be overwritten by environment variables prefixed with `CONTEXTURE_` or the
//! `contexture.json` file.
//!
//! Alternatives are disabled unless enabled for the deployment, optionally with a priority
//! overriding the one declared by the bean:
//!
//! ```json
//! {
//!     "install_tracing_logger": false,
//!     "alternatives": [
//!         { "bean": "managed:app::MockMailer", "priority": 10 }
//!     ]
//! }
//! ```

use config::{Config, ConfigError, Environment, File};
use contexture_di::resolver::Enablement;
use derive_more::Constructor;
use serde::Deserialize;

const CONFIG_ENV_PREFIX: &str = "CONTEXTURE";

/// Name of the default config file.
pub const CONFIG_FILE: &str = "contexture.json";

/// Alternative bean enabled for the deployment.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Constructor)]
pub struct AlternativeConfig {
    /// Id of the enabled bean.
    pub bean: String,
    /// Overrides the priority declared by the bean.
    #[serde(default)]
    pub priority: Option<i32>,
}

/// Deployment configuration used by [Application](crate::application::Application).
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeploymentConfig {
    /// Should a default tracing logger be installed in the scope of the application.
    pub install_tracing_logger: bool,
    /// Alternatives enabled for this deployment.
    pub alternatives: Vec<AlternativeConfig>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            install_tracing_logger: true,
            alternatives: vec![],
        }
    }
}

impl From<OptionalDeploymentConfig> for DeploymentConfig {
    fn from(value: OptionalDeploymentConfig) -> Self {
        let default = Self::default();
        Self {
            install_tracing_logger: value
                .install_tracing_logger
                .unwrap_or(default.install_tracing_logger),
            alternatives: value.alternatives.unwrap_or(default.alternatives),
        }
    }
}

impl DeploymentConfig {
    /// Loads the config from [CONFIG_FILE] in the working directory and the environment.
    pub fn init_from_environment() -> Result<Self, ConfigError> {
        Self::load(CONFIG_FILE)
    }

    /// Loads the config from given file, if it exists, and the environment. Environment variables
    /// take precedence.
    pub fn load(file: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(file).required(false))
            .add_source(Environment::with_prefix(CONFIG_ENV_PREFIX))
            .build()
            .and_then(|config| config.try_deserialize::<OptionalDeploymentConfig>())
            .map(|config| config.into())
    }

    pub fn with_install_tracing_logger(mut self, install_tracing_logger: bool) -> Self {
        self.install_tracing_logger = install_tracing_logger;
        self
    }

    pub fn with_alternative(mut self, alternative: AlternativeConfig) -> Self {
        self.alternatives.push(alternative);
        self
    }

    /// Converts enabled alternatives into resolver input.
    pub fn enablement(&self) -> Enablement {
        self.alternatives
            .iter()
            .fold(Enablement::default(), |mut enablement, alternative| {
                enablement.enable(alternative.bean.as_str(), alternative.priority);
                enablement
            })
    }
}

#[derive(Deserialize)]
struct OptionalDeploymentConfig {
    install_tracing_logger: Option<bool>,
    alternatives: Option<Vec<AlternativeConfig>>,
}
