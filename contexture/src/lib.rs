//! Application framework based on [contexture_di] contextual dependency injection.
//!
//! With dependency injection in place, application components form a dependency graph managed by
//! a [BeanManager](contexture_di::manager::BeanManager) instead of being initialized and passed
//! around in `main()`. This crate provides the entrypoint for such applications in the form of
//! [Application](application::Application), which loads the deployment configuration, installs
//! logging, bootstraps the bean manager and runs
//! [ApplicationRunners](runner::ApplicationRunner).
//!
//! ### Features
//!
//! * `threadsafe` - use threadsafe pointers and `Send + Sync` trait bounds

pub mod application;
pub mod config;
pub mod runner;
