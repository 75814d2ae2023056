//! The [BeanManager] is the runtime entry point of the container. It holds the frozen set of bean
//! definitions, resolves queries against them and obtains contextual instances from the
//! [Context](crate::scope::Context) governing each bean's scope.
//!
//! Every request for an instance happens within a [CreationalContext]. A root request starts with
//! a fresh context, while beans constructed along the way get child contexts. This allows
//! detecting circular dependencies and satisfying them with partially constructed instances,
//! when possible.
//!
//! A bean manager is created with a [BeanManagerBuilder](crate::bootstrap::BeanManagerBuilder):
//!
//! ```
//! use contexture_di::bean::{BeanDescriptor, QualifierSet};
//! use contexture_di::bootstrap::BeanManagerBuilder;
//! use contexture_di::creational::CreationalContext;
//! use contexture_di::instance_provider::{into_instance, TypedInstanceProvider};
//! use contexture_di::scope::APPLICATION;
//!
//! struct Repository;
//!
//! struct Service {
//!     repository: contexture_di::instance_provider::InstancePtr<Repository>,
//! }
//!
//! let manager = BeanManagerBuilder::new()
//!     .with_bean(
//!         BeanDescriptor::managed::<Repository>(|_| Ok(into_instance(Repository)))
//!             .with_scope(APPLICATION)
//!             .build()
//!             .unwrap(),
//!     )
//!     .with_bean(
//!         BeanDescriptor::managed::<Service>(|instance_provider| {
//!             Ok(into_instance(Service {
//!                 repository: instance_provider.instance_typed()?,
//!             }))
//!         })
//!         .build()
//!         .unwrap(),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let mut context = CreationalContext::new();
//! let _service = manager
//!     .reference_typed::<Service>(QualifierSet::default(), &mut context)
//!     .unwrap();
//! ```

use crate::annotated::TypeKey;
use crate::bean::{BeanDescriptor, BeanId, BeanKind, QualifierSet};
use crate::bean_registry::BeanRegistry;
use crate::creational::{CreationalContext, Incomplete};
use crate::error::{InstanceProviderError, ResolutionError};
use crate::instance_provider::{
    AnyInstancePtr, CastFunction, InstanceProvider, InstancePtr, TypedInstanceProvider,
};
use crate::resolver::{ResolutionQuery, TypesafeResolver};
use crate::scope::{ContextPtr, ContextualCreator};
use fxhash::FxHashMap;
#[cfg(test)]
use mockall::automock;
use tracing::debug;

/// Creates client proxies for beans of normal scopes. A client proxy is an indirection which
/// looks up the current contextual instance whenever it's used.
#[cfg_attr(test, automock)]
pub trait ClientProxyFactory {
    /// Returns a proxy for given bean, or `None` if the bean cannot be proxied.
    fn client_proxy(&self, bean: &BeanDescriptor) -> Option<AnyInstancePtr>;
}

#[cfg(not(feature = "threadsafe"))]
pub type ClientProxyFactoryPtr = Box<dyn ClientProxyFactory>;
#[cfg(feature = "threadsafe")]
pub type ClientProxyFactoryPtr = Box<dyn ClientProxyFactory + Send + Sync>;

/// Runtime bean manager. See module documentation for details.
pub struct BeanManager {
    registry: BeanRegistry,
    resolver: TypesafeResolver,
    contexts: FxHashMap<String, ContextPtr>,
    proxy_factory: Option<ClientProxyFactoryPtr>,
}

impl BeanManager {
    pub(crate) fn new(
        registry: BeanRegistry,
        resolver: TypesafeResolver,
        contexts: FxHashMap<String, ContextPtr>,
        proxy_factory: Option<ClientProxyFactoryPtr>,
    ) -> Self {
        Self {
            registry,
            resolver,
            contexts,
            proxy_factory,
        }
    }

    /// All beans available for resolution, in registration order.
    #[inline]
    pub fn beans(&self) -> &[BeanDescriptor] {
        self.registry.beans()
    }

    #[inline]
    pub fn bean(&self, id: &BeanId) -> Option<&BeanDescriptor> {
        self.registry.bean(id)
    }

    #[inline]
    pub fn resolver(&self) -> &TypesafeResolver {
        &self.resolver
    }

    pub fn resolve(&self, query: &ResolutionQuery) -> Result<&BeanDescriptor, ResolutionError> {
        self.resolver.resolve(self.registry.beans(), query)
    }

    pub fn resolve_all(&self, query: &ResolutionQuery) -> Vec<&BeanDescriptor> {
        self.resolver.resolve_all(self.registry.beans(), query)
    }

    pub fn resolve_name(&self, name: &str) -> Result<&BeanDescriptor, ResolutionError> {
        self.resolver.resolve_name(self.registry.beans(), name)
    }

    /// Returns the active context for given scope.
    pub fn context(&self, scope: &str) -> Result<&ContextPtr, InstanceProviderError> {
        let context = self
            .contexts
            .get(scope)
            .ok_or_else(|| InstanceProviderError::UnrecognizedScope(scope.to_string()))?;

        if context.is_active() {
            Ok(context)
        } else {
            Err(InstanceProviderError::ContextNotActive(scope.to_string()))
        }
    }

    /// Returns a contextual reference to given bean, creating an instance if needed. When
    /// `delegate_allowed` is set, beans of normal scopes might be represented by a client proxy.
    pub fn get_reference(
        &self,
        bean: &BeanDescriptor,
        creational_context: &mut CreationalContext<'_>,
        delegate_allowed: bool,
    ) -> Result<AnyInstancePtr, InstanceProviderError> {
        let context = self.context(bean.scope())?;

        if delegate_allowed && context.is_normal() {
            if let Some(proxy) = self
                .proxy_factory
                .as_ref()
                .and_then(|factory| factory.client_proxy(bean))
            {
                return Ok(proxy);
            }
        }

        match creational_context.incomplete_instance(bean.id()).cloned() {
            Some(Incomplete::Partial(instance)) => {
                let dependent = creational_context.dependent_description();
                creational_context.record_substitution(dependent, bean.id().clone());
                return Ok(instance);
            }
            Some(Incomplete::Pending) => {
                return Err(InstanceProviderError::UnresolvableCircularDependency(
                    bean.id().clone(),
                ))
            }
            None => {}
        }

        let mut own_context = creational_context.child_for(bean.id().clone());
        let mut creator = BeanCreator {
            manager: self,
            bean,
            context: &mut own_context,
        };

        let instance = context.get(bean, Some(&mut creator as &mut dyn ContextualCreator));
        let substitutions = own_context.finish();
        creational_context.absorb(substitutions);

        instance?.ok_or_else(|| InstanceProviderError::MissingInstance {
            scope: bean.scope().to_string(),
            bean: bean.id().clone(),
        })
    }

    /// Resolves the query and returns a reference to the resolved bean, along with a cast
    /// function for the required type.
    pub fn reference(
        &self,
        query: &ResolutionQuery,
        creational_context: &mut CreationalContext<'_>,
    ) -> Result<(AnyInstancePtr, CastFunction), InstanceProviderError> {
        let bean = self.resolve(query)?;
        let cast = self.cast_for(bean, &query.required())?;
        self.get_reference(bean, creational_context, true)
            .map(|instance| (instance, cast))
    }

    /// Typesafe version of [BeanManager::reference].
    pub fn reference_typed<T: ?Sized + 'static>(
        &self,
        qualifiers: QualifierSet,
        creational_context: &mut CreationalContext<'_>,
    ) -> Result<InstancePtr<T>, InstanceProviderError> {
        self.instance_provider(creational_context)
            .instance_qualified_typed::<T>(qualifiers)
    }

    /// Returns an [InstanceProvider] for given creational context.
    pub fn instance_provider<'a, 'p>(
        &'a self,
        creational_context: &'a mut CreationalContext<'p>,
    ) -> BeanInstanceProvider<'a, 'p> {
        BeanInstanceProvider {
            manager: self,
            context: creational_context,
        }
    }

    /// Destroys the current instance of given bean in its context.
    pub fn destroy(&self, bean: &BeanDescriptor) -> Result<(), InstanceProviderError> {
        self.contexts
            .get(bean.scope())
            .ok_or_else(|| InstanceProviderError::UnrecognizedScope(bean.scope().to_string()))?
            .destroy(bean);
        Ok(())
    }

    pub(crate) fn cast_for(
        &self,
        bean: &BeanDescriptor,
        required: &TypeKey,
    ) -> Result<CastFunction, InstanceProviderError> {
        self.resolver
            .cast_for(bean, required)
            .ok_or(InstanceProviderError::IncompatibleBean(*required))
    }
}

struct BeanCreator<'a, 'p> {
    manager: &'a BeanManager,
    bean: &'a BeanDescriptor,
    context: &'a mut CreationalContext<'p>,
}

impl BeanCreator<'_, '_> {
    fn construct(&mut self) -> Result<AnyInstancePtr, InstanceProviderError> {
        let bean = self.bean;
        match bean.kind() {
            BeanKind::Managed {
                constructor,
                initializer,
            } => {
                let instance = constructor(&mut self.manager.instance_provider(self.context))?;

                if let Some(initializer) = initializer {
                    self.context.push(bean.id().clone(), instance.clone());
                    initializer(
                        &instance,
                        &mut self.manager.instance_provider(self.context),
                    )?;
                }

                Ok(instance)
            }
            BeanKind::ProducerMethod { produce, .. } => {
                let receiver = self.manager.receiver(bean, self.context)?;
                produce(
                    receiver.as_ref(),
                    &mut self.manager.instance_provider(self.context),
                )
            }
            BeanKind::ProducerField { read, .. } => {
                let receiver = self.manager.receiver(bean, self.context)?;
                read(receiver.as_ref())
            }
        }
    }
}

impl ContextualCreator for BeanCreator<'_, '_> {
    fn create(&mut self) -> Result<AnyInstancePtr, InstanceProviderError> {
        let id = self.bean.id().clone();
        debug!(bean = %id, scope = self.bean.scope(), "Creating bean instance");

        self.context.begin(id.clone());
        let result = self.construct();
        self.context.release(&id);

        result
    }
}

/// [InstanceProvider] requesting instances from a [BeanManager] within a creational context.
pub struct BeanInstanceProvider<'a, 'p> {
    manager: &'a BeanManager,
    context: &'a mut CreationalContext<'p>,
}

impl InstanceProvider for BeanInstanceProvider<'_, '_> {
    fn reference(
        &mut self,
        query: &ResolutionQuery,
    ) -> Result<(AnyInstancePtr, CastFunction), InstanceProviderError> {
        self.manager.reference(query, self.context)
    }

    fn references(
        &mut self,
        query: &ResolutionQuery,
    ) -> Result<Vec<(AnyInstancePtr, CastFunction)>, InstanceProviderError> {
        let manager = self.manager;
        manager
            .resolve_all(query)
            .into_iter()
            .map(|bean| {
                let cast = manager.cast_for(bean, &query.required())?;
                manager
                    .get_reference(bean, self.context, true)
                    .map(|instance| (instance, cast))
            })
            .collect()
    }

    fn reference_by_name(
        &mut self,
        name: &str,
        required: TypeKey,
    ) -> Result<(AnyInstancePtr, CastFunction), InstanceProviderError> {
        let bean = self.manager.resolve_name(name)?;
        let cast = self.manager.cast_for(bean, &required)?;
        self.manager
            .get_reference(bean, self.context, true)
            .map(|instance| (instance, cast))
    }
}
