//! Bean instances live in [Context]s - containers tied to a scope, which decide when to reuse or
//! create an instance. There are process-wide contexts for singletons and application-scoped beans,
//! but also specialized ones, which need to be activated by external means, e.g. for the duration
//! of a request or a session.
//!
//! Contexts are either normal or pseudo-scopes. Instances of normal scopes can be referenced through
//! client proxies, while pseudo-scopes always hand out direct instances.
//!
//! Note: scope resolution happens at instantiation time, which can lead to unexpected consequences
//! if incompatible scopes are mixed together, e.g. an [application](APPLICATION) bean can depend on
//! a [dependent](DEPENDENT) one. In such case when creating the application bean, a new instance of
//! the dependency will be created, but then that single instance will live as long as the
//! application bean lives.

use crate::bean::{BeanDescriptor, BeanId, DestructorFn};
use crate::error::InstanceProviderError;
use crate::instance_provider::AnyInstancePtr;
use fxhash::FxHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(not(feature = "threadsafe"))]
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Name of the [DependentContext] scope.
pub const DEPENDENT: &str = "DEPENDENT";

/// Name of the [SingletonContext] scope.
pub const SINGLETON: &str = "SINGLETON";

/// Name of the [ApplicationContext] scope.
pub const APPLICATION: &str = "APPLICATION";

/// Name of the request [ActivatableContext] scope.
pub const REQUEST: &str = "REQUEST";

/// Name of the session [ActivatableContext] scope.
pub const SESSION: &str = "SESSION";

#[cfg(not(feature = "threadsafe"))]
pub type ContextPtr = Rc<dyn Context>;
#[cfg(feature = "threadsafe")]
pub type ContextPtr = Arc<dyn Context + Send + Sync>;

/// Creates a new instance of a bean on behalf of a [Context].
pub trait ContextualCreator {
    fn create(&mut self) -> Result<AnyInstancePtr, InstanceProviderError>;
}

/// A context containing bean instances. See module documentation for information on contexts.
pub trait Context {
    /// Name of the scope this context governs.
    fn scope(&self) -> &str;

    /// Inactive contexts cannot be used to get instances.
    fn is_active(&self) -> bool;

    /// Normal scopes allow client proxies, pseudo-scopes don't.
    fn is_normal(&self) -> bool {
        true
    }

    /// Returns the instance of given bean. If there's none and a creator is given, it's used to
    /// create a new instance; otherwise `None` is returned.
    fn get(
        &self,
        bean: &BeanDescriptor,
        creator: Option<&mut dyn ContextualCreator>,
    ) -> Result<Option<AnyInstancePtr>, InstanceProviderError>;

    /// Destroys the instance of given bean, if present.
    fn destroy(&self, bean: &BeanDescriptor);
}

struct StoredInstance {
    instance: AnyInstancePtr,
    destructor: Option<DestructorFn>,
}

impl StoredInstance {
    fn destroy(self) {
        if let Some(destructor) = self.destructor {
            destructor(self.instance);
        }
    }
}

type Slot = Arc<Mutex<Option<StoredInstance>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Storage for contexts holding at most one instance per bean. Each bean has its own slot, which
/// stays locked while the instance is being created, so concurrent first requests create it only
/// once. Creation of other beans is not blocked.
#[derive(Default)]
pub struct InstanceStore {
    slots: Mutex<FxHashMap<BeanId, Slot>>,
}

impl InstanceStore {
    pub fn get(
        &self,
        bean: &BeanDescriptor,
        creator: Option<&mut dyn ContextualCreator>,
    ) -> Result<Option<AnyInstancePtr>, InstanceProviderError> {
        let Some(creator) = creator else {
            return Ok(lock(&self.slots).get(bean.id()).and_then(|slot| {
                lock(slot)
                    .as_ref()
                    .map(|stored| stored.instance.clone())
            }));
        };

        let slot = lock(&self.slots).entry(bean.id().clone()).or_default().clone();
        let mut stored = lock(&slot);
        if let Some(stored) = stored.as_ref() {
            return Ok(Some(stored.instance.clone()));
        }

        let instance = creator.create()?;
        *stored = Some(StoredInstance {
            instance: instance.clone(),
            destructor: bean.destructor(),
        });

        Ok(Some(instance))
    }

    pub fn contains(&self, bean: &BeanId) -> bool {
        lock(&self.slots)
            .get(bean)
            .map(|slot| lock(slot).is_some())
            .unwrap_or(false)
    }

    pub fn destroy(&self, bean: &BeanId) {
        let Some(slot) = lock(&self.slots).remove(bean) else {
            return;
        };

        let stored = lock(&slot).take();
        if let Some(stored) = stored {
            debug!(%bean, "Destroying bean instance");
            stored.destroy();
        }
    }

    /// Destroys all stored instances.
    pub fn clear(&self) {
        let slots = lock(&self.slots).drain().collect::<Vec<_>>();
        for (bean, slot) in slots {
            let stored = lock(&slot).take();
            if let Some(stored) = stored {
                debug!(%bean, "Destroying bean instance");
                stored.destroy();
            }
        }
    }
}

/// Pseudo-scope creating a new instance on each request. Such instances are never stored, which
/// makes them bound to the lifetime of their dependents.
#[derive(Default, Copy, Clone, Eq, PartialEq, Debug)]
pub struct DependentContext;

impl Context for DependentContext {
    fn scope(&self) -> &str {
        DEPENDENT
    }

    fn is_active(&self) -> bool {
        true
    }

    fn is_normal(&self) -> bool {
        false
    }

    fn get(
        &self,
        _bean: &BeanDescriptor,
        creator: Option<&mut dyn ContextualCreator>,
    ) -> Result<Option<AnyInstancePtr>, InstanceProviderError> {
        creator.map(|creator| creator.create()).transpose()
    }

    fn destroy(&self, _bean: &BeanDescriptor) {}
}

/// Pseudo-scope for instances shared by the whole process. Stateless beans are good candidates
/// to be singletons.
#[derive(Default)]
pub struct SingletonContext {
    store: InstanceStore,
}

impl Context for SingletonContext {
    fn scope(&self) -> &str {
        SINGLETON
    }

    fn is_active(&self) -> bool {
        true
    }

    fn is_normal(&self) -> bool {
        false
    }

    fn get(
        &self,
        bean: &BeanDescriptor,
        creator: Option<&mut dyn ContextualCreator>,
    ) -> Result<Option<AnyInstancePtr>, InstanceProviderError> {
        self.store.get(bean, creator)
    }

    fn destroy(&self, bean: &BeanDescriptor) {
        self.store.destroy(bean.id());
    }
}

/// Normal scope for instances shared by the whole application.
#[derive(Default)]
pub struct ApplicationContext {
    store: InstanceStore,
}

impl ApplicationContext {
    /// Destroys all instances, e.g. on application shutdown.
    pub fn destroy_all(&self) {
        self.store.clear();
    }
}

impl Context for ApplicationContext {
    fn scope(&self) -> &str {
        APPLICATION
    }

    fn is_active(&self) -> bool {
        true
    }

    fn get(
        &self,
        bean: &BeanDescriptor,
        creator: Option<&mut dyn ContextualCreator>,
    ) -> Result<Option<AnyInstancePtr>, InstanceProviderError> {
        self.store.get(bean, creator)
    }

    fn destroy(&self, bean: &BeanDescriptor) {
        self.store.destroy(bean.id());
    }
}

/// Normal scope which needs to be activated externally, e.g. for the duration of a request.
/// Deactivation destroys all instances.
pub struct ActivatableContext {
    scope: String,
    active: AtomicBool,
    store: InstanceStore,
}

impl ActivatableContext {
    /// Creates a new, inactive context.
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            active: AtomicBool::new(false),
            store: Default::default(),
        }
    }

    #[inline]
    pub fn request() -> Self {
        Self::new(REQUEST)
    }

    #[inline]
    pub fn session() -> Self {
        Self::new(SESSION)
    }

    pub fn activate(&self) {
        debug!(scope = %self.scope, "Activating context");
        self.active.store(true, Ordering::Release);
    }

    pub fn deactivate(&self) {
        debug!(scope = %self.scope, "Deactivating context");
        self.active.store(false, Ordering::Release);
        self.store.clear();
    }
}

impl Context for ActivatableContext {
    fn scope(&self) -> &str {
        &self.scope
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn get(
        &self,
        bean: &BeanDescriptor,
        creator: Option<&mut dyn ContextualCreator>,
    ) -> Result<Option<AnyInstancePtr>, InstanceProviderError> {
        if !self.is_active() {
            return Err(InstanceProviderError::ContextNotActive(self.scope.clone()));
        }

        self.store.get(bean, creator)
    }

    fn destroy(&self, bean: &BeanDescriptor) {
        self.store.destroy(bean.id());
    }
}
