//! Runners executing actual application logic.

pub use contexture_di::instance_provider::ErrorPtr;
#[cfg(test)]
use mockall::automock;

#[cfg(feature = "threadsafe")]
pub type ApplicationRunnerPtr = dyn ApplicationRunner + Send + Sync;

#[cfg(not(feature = "threadsafe"))]
pub type ApplicationRunnerPtr = dyn ApplicationRunner;

/// Application logic executed once the bean manager is bootstrapped.
///
/// Every bean with the [ApplicationRunnerPtr] bean type is a runner, whatever its qualifiers or
/// scope. Add that type to the descriptor with
/// [BeanType::alias](contexture_di::bean::BeanType::alias) after implementing the downcast with
/// [bean_alias](contexture_di::bean_alias). Runner instances are obtained when
/// [Application::run](crate::application::Application::run) is called.
#[cfg_attr(test, automock)]
pub trait ApplicationRunner {
    fn run(&self) -> Result<(), ErrorPtr>;

    /// Ordering key read from the runner instance, not the bean descriptor. Runners with higher
    /// values run first; equal values keep resolution order.
    fn priority(&self) -> i8 {
        0
    }
}
