//! Core application framework functionality.

use crate::config::DeploymentConfig;
use crate::runner::ApplicationRunnerPtr;
use config::ConfigError;
use contexture_di::bootstrap::BeanManagerBuilder;
use contexture_di::creational::CreationalContext;
use contexture_di::error::{BootstrapError, InstanceProviderError};
use contexture_di::instance_provider::{ErrorPtr, TypedInstanceProvider};
use contexture_di::manager::BeanManager;
use derive_more::Constructor;
use std::cmp::Reverse;
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Error loading configuration: {0}")]
    ConfigError(ConfigError),
    #[error("Error bootstrapping beans: {0}")]
    BootstrapError(BootstrapError),
    #[error("Error retrieving runners: {0}")]
    RunnerInjectionError(InstanceProviderError),
    #[error("Runner error: {0}")]
    RunnerError(ErrorPtr),
}

/// Main entrypoint for the application. Bootstraps the bean manager and runs
/// [ApplicationRunners](crate::runner::ApplicationRunner).
#[derive(Constructor)]
pub struct Application {
    bean_manager: BeanManager,
}

impl Application {
    /// Creates the application with [DeploymentConfig] loaded from the environment.
    pub fn create(builder: BeanManagerBuilder) -> Result<Self, ApplicationError> {
        let config =
            DeploymentConfig::init_from_environment().map_err(ApplicationError::ConfigError)?;
        Self::create_with_config(builder, &config)
    }

    pub fn create_with_config(
        builder: BeanManagerBuilder,
        config: &DeploymentConfig,
    ) -> Result<Self, ApplicationError> {
        if config.install_tracing_logger {
            install_tracing_logger();
        }

        builder
            .with_enablement(config.enablement())
            .build()
            .map(Self::new)
            .map_err(ApplicationError::BootstrapError)
    }

    #[inline]
    pub fn bean_manager(&self) -> &BeanManager {
        &self.bean_manager
    }

    /// Runs all runners, ordered by descending priority, until the first error.
    pub fn run(&self) -> Result<(), ApplicationError> {
        info!("Searching for application runners...");

        let mut creational_context = CreationalContext::new();
        let mut runners = self
            .bean_manager
            .instance_provider(&mut creational_context)
            .instances_typed::<ApplicationRunnerPtr>()
            .map_err(ApplicationError::RunnerInjectionError)?;

        runners.sort_by_key(|runner| Reverse(runner.priority()));

        info!(runners = runners.len(), "Running application runners...");

        for runner in &runners {
            runner.run().map_err(ApplicationError::RunnerError)?;
        }

        Ok(())
    }
}

fn install_tracing_logger() {
    if tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .is_err()
    {
        debug!("Global tracing subscriber already installed");
    }
}
