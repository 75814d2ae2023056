//! Bootstrap collects bean definitions, contexts and deployment configuration, validates them and
//! freezes the result into a [BeanManager]. Bootstrap is single-threaded; the resulting manager
//! is read-only.
//!
//! During [BeanManagerBuilder::build], a [ProcessProducer] event is fired for each enabled
//! producer bean, in registration order. Producers vetoed by an observer are removed before the
//! manager is created, along with producers that are disabled alternatives or are declared on
//! one.

use crate::annotated::ExactTypeAssignability;
use crate::bean::{BeanDescriptor, BeanId};
use crate::bean_registry::BeanRegistry;
use crate::error::{BootstrapError, EventError};
use crate::event::{EventState, ObserverRegistration, ProcessProducer, ProducerObserverPtr};
use crate::instance_provider::InstancePtr;
use crate::manager::{BeanManager, ClientProxyFactoryPtr};
use crate::resolver::{AssignabilityPtr, Enablement, TypesafeResolver};
use crate::scope::{ApplicationContext, ContextPtr, DependentContext, SingletonContext};
use fxhash::{FxHashMap, FxHashSet};
use tracing::debug;

/// Builder for [BeanManager]s. Dependent, singleton and application contexts are registered by
/// default.
pub struct BeanManagerBuilder {
    beans: Vec<BeanDescriptor>,
    observers: Vec<ObserverRegistration>,
    contexts: FxHashMap<String, ContextPtr>,
    enablement: Enablement,
    assignability: Option<AssignabilityPtr>,
    proxy_factory: Option<ClientProxyFactoryPtr>,
}

impl Default for BeanManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BeanManagerBuilder {
    pub fn new() -> Self {
        Self {
            beans: vec![],
            observers: vec![],
            contexts: Default::default(),
            enablement: Default::default(),
            assignability: None,
            proxy_factory: None,
        }
        .with_context(InstancePtr::new(DependentContext))
        .with_context(InstancePtr::new(SingletonContext::default()))
        .with_context(InstancePtr::new(ApplicationContext::default()))
    }

    pub fn with_bean(mut self, bean: BeanDescriptor) -> Self {
        self.beans.push(bean);
        self
    }

    pub fn with_beans<I: IntoIterator<Item = BeanDescriptor>>(mut self, beans: I) -> Self {
        self.beans.extend(beans);
        self
    }

    /// Adds an observer for all producer validation events.
    pub fn with_observer<F>(self, observer: F) -> Self
    where
        F: Fn(&mut ProcessProducer<'_>) -> Result<(), EventError> + 'static,
    {
        self.with_observer_registration(ObserverRegistration::new(Box::new(observer)))
    }

    /// Adds an observer for producers of type `T`.
    pub fn with_producer_observer<T: ?Sized + 'static, F>(self, observer: F) -> Self
    where
        F: Fn(&mut ProcessProducer<'_>) -> Result<(), EventError> + 'static,
    {
        self.with_observer_registration(ObserverRegistration::for_type::<T>(Box::new(observer)))
    }

    pub fn with_observer_ptr(self, observer: ProducerObserverPtr) -> Self {
        self.with_observer_registration(ObserverRegistration::new(observer))
    }

    pub fn with_observer_registration(mut self, registration: ObserverRegistration) -> Self {
        self.observers.push(registration);
        self
    }

    /// Registers a context for its scope, replacing any previous context for the same scope.
    pub fn with_context(mut self, context: ContextPtr) -> Self {
        self.contexts.insert(context.scope().to_string(), context);
        self
    }

    pub fn with_enabled_alternative(
        mut self,
        bean: impl Into<BeanId>,
        priority: Option<i32>,
    ) -> Self {
        self.enablement.enable(bean, priority);
        self
    }

    pub fn with_enablement(mut self, enablement: Enablement) -> Self {
        self.enablement.merge(enablement);
        self
    }

    pub fn with_assignability(mut self, assignability: AssignabilityPtr) -> Self {
        self.assignability = Some(assignability);
        self
    }

    pub fn with_proxy_factory(mut self, proxy_factory: ClientProxyFactoryPtr) -> Self {
        self.proxy_factory = Some(proxy_factory);
        self
    }

    /// Validates the beans, fires producer validation events and creates the bean manager.
    pub fn build(self) -> Result<BeanManager, BootstrapError> {
        let mut registry = BeanRegistry::default();
        for bean in self.beans {
            registry.register(bean)?;
        }

        registry.validate()?;

        let removed = Self::fire_producer_events(&registry, &self.observers, &self.enablement)?;
        if !removed.is_empty() {
            registry.retain(|bean| !removed.contains(bean.id()));
        }

        debug!(
            beans = registry.beans().len(),
            removed = removed.len(),
            "Bean manager bootstrapped"
        );

        let resolver = TypesafeResolver::new(
            self.assignability
                .unwrap_or_else(|| Box::new(ExactTypeAssignability)),
            self.enablement,
        );

        Ok(BeanManager::new(
            registry,
            resolver,
            self.contexts,
            self.proxy_factory,
        ))
    }

    /// Returns producers which didn't pass validation: vetoed ones and those never validated,
    /// because they or their declaring beans are disabled.
    fn fire_producer_events(
        registry: &BeanRegistry,
        observers: &[ObserverRegistration],
        enablement: &Enablement,
    ) -> Result<FxHashSet<BeanId>, BootstrapError> {
        let mut removed = FxHashSet::default();

        for bean in registry.beans() {
            let declaring_bean = bean
                .declaring_bean()
                .and_then(|declaring_bean| registry.bean(declaring_bean));

            if !enablement.is_enabled(bean)
                || declaring_bean
                    .map(|declaring_bean| !enablement.is_enabled(declaring_bean))
                    .unwrap_or(false)
            {
                if bean.is_producer() {
                    debug!(bean = %bean.id(), "Removing disabled producer");
                    removed.insert(bean.id().clone());
                }
                continue;
            }

            if let Some(mut event) = ProcessProducer::new(bean, declaring_bean) {
                if event.fire(observers)? == EventState::Vetoed {
                    removed.insert(bean.id().clone());
                }
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use crate::annotated::{AnnotatedField, AnnotatedMember};
    use crate::bean::{BeanDescriptor, BeanId};
    use crate::bootstrap::BeanManagerBuilder;
    use crate::error::{
        BootstrapError, DefinitionError, EventError, InstanceProviderError, ResolutionError,
    };
    use crate::event::{ProcessProducer, ProducerObserver};
    use crate::instance_provider::{
        into_instance, AnyInstancePtr, InstanceProvider, InstancePtr,
    };
    use crate::resolver::ResolutionQuery;
    use crate::scope::{ActivatableContext, REQUEST};
    use std::cell::Cell;
    use std::rc::Rc;

    struct Declaring;

    struct VetoingObserver(Rc<Cell<bool>>);

    impl ProducerObserver for VetoingObserver {
        fn observe(&self, event: &mut ProcessProducer<'_>) -> Result<(), EventError> {
            self.0.set(true);
            event.veto()
        }
    }

    fn constructor(
        _instance_provider: &mut dyn InstanceProvider,
    ) -> Result<AnyInstancePtr, InstanceProviderError> {
        Ok(into_instance(Declaring))
    }

    fn read(_receiver: Option<&AnyInstancePtr>) -> Result<AnyInstancePtr, InstanceProviderError> {
        Ok(into_instance(1u8))
    }

    fn declaring_bean() -> BeanDescriptor {
        BeanDescriptor::managed::<Declaring>(constructor)
            .build()
            .unwrap()
    }

    fn producer(declaring: &BeanDescriptor) -> BeanDescriptor {
        BeanDescriptor::producer_field::<u8>(
            AnnotatedField::new::<Declaring, u8>("value"),
            declaring.id().clone(),
            read,
        )
        .build()
        .unwrap()
    }

    #[test]
    fn should_register_default_contexts() {
        let manager = BeanManagerBuilder::default().build().unwrap();
        assert!(manager.context("DEPENDENT").is_ok());
        assert!(manager.context("SINGLETON").is_ok());
        assert!(manager.context("APPLICATION").is_ok());
        assert!(matches!(
            manager.context(REQUEST),
            Err(InstanceProviderError::UnrecognizedScope(_))
        ));
    }

    #[test]
    fn should_register_custom_context() {
        let manager = BeanManagerBuilder::new()
            .with_context(InstancePtr::new(ActivatableContext::request()))
            .build()
            .unwrap();

        assert!(matches!(
            manager.context(REQUEST),
            Err(InstanceProviderError::ContextNotActive(_))
        ));
    }

    #[test]
    fn should_reject_duplicate_beans() {
        let result = BeanManagerBuilder::new()
            .with_beans([declaring_bean(), declaring_bean()])
            .build();

        assert!(matches!(
            result,
            Err(BootstrapError::Definition(DefinitionError::DuplicateBean(_)))
        ));
    }

    #[test]
    fn should_remove_vetoed_producers() {
        let declaring = declaring_bean();
        let manager = BeanManagerBuilder::new()
            .with_bean(declaring.clone())
            .with_bean(producer(&declaring))
            .with_observer(|event| event.veto())
            .build()
            .unwrap();

        assert_eq!(manager.beans().len(), 1);
        assert!(manager.resolve(&ResolutionQuery::of::<u8>()).is_err());
    }

    #[test]
    fn should_observe_producers_of_given_type() {
        let declaring = declaring_bean();
        let observed = Rc::new(Cell::new(0));
        let u8_observed = observed.clone();
        let u16_observed = observed.clone();

        BeanManagerBuilder::new()
            .with_bean(declaring.clone())
            .with_bean(producer(&declaring))
            .with_producer_observer::<u8, _>(move |event| {
                assert_eq!(event.annotated_member()?.name(), "value");
                u8_observed.set(u8_observed.get() + 1);
                Ok(())
            })
            .with_producer_observer::<u16, _>(move |_| {
                u16_observed.set(u16_observed.get() + 10);
                Ok(())
            })
            .build()
            .unwrap();

        assert_eq!(observed.get(), 1);
    }

    #[test]
    fn should_skip_producers_of_disabled_alternatives() {
        let declaring = BeanDescriptor::managed::<Declaring>(constructor)
            .alternative()
            .build()
            .unwrap();
        let observed = Rc::new(Cell::new(false));
        let observer_observed = observed.clone();

        let manager = BeanManagerBuilder::new()
            .with_bean(declaring.clone())
            .with_bean(producer(&declaring))
            .with_observer(move |_| {
                observer_observed.set(true);
                Ok(())
            })
            .build()
            .unwrap();

        assert!(!observed.get());
        assert_eq!(manager.beans().len(), 1);
        assert!(matches!(
            manager.resolve(&ResolutionQuery::of::<u8>()),
            Err(ResolutionError::Unsatisfied { .. })
        ));
    }

    #[test]
    fn should_observe_with_boxed_observer() {
        let declaring = declaring_bean();
        let observed = Rc::new(Cell::new(false));
        let observer_observed = observed.clone();

        let manager = BeanManagerBuilder::new()
            .with_bean(declaring.clone())
            .with_bean(producer(&declaring))
            .with_observer_ptr(Box::new(VetoingObserver(observer_observed)))
            .build()
            .unwrap();

        assert!(observed.get());
        assert_eq!(manager.beans().len(), 1);
    }

    #[test]
    fn should_fire_for_producers_of_enabled_alternatives() {
        let declaring = BeanDescriptor::managed::<Declaring>(constructor)
            .alternative()
            .build()
            .unwrap();
        let observed = Rc::new(Cell::new(false));
        let observer_observed = observed.clone();

        BeanManagerBuilder::new()
            .with_bean(declaring.clone())
            .with_bean(producer(&declaring))
            .with_enabled_alternative(declaring.id().clone(), None)
            .with_observer(move |_| {
                observer_observed.set(true);
                Ok(())
            })
            .build()
            .unwrap();

        assert!(observed.get());
    }

    #[test]
    fn should_abort_on_observer_error() {
        let declaring = declaring_bean();
        let producer = producer(&declaring);
        let producer_id = producer.id().clone();

        let result = BeanManagerBuilder::new()
            .with_bean(declaring)
            .with_bean(producer)
            .with_observer(|_| {
                Err(EventError::IllegalEventAccess(
                    crate::event::EventState::Finalized,
                ))
            })
            .build();

        assert!(matches!(
            result,
            Err(BootstrapError::Observer { bean, .. }) if bean == producer_id
        ));
    }

    #[test]
    fn should_reject_producer_without_declaring_bean() {
        let declaring = declaring_bean();
        let result = BeanManagerBuilder::new().with_bean(producer(&declaring)).build();

        assert!(matches!(
            result,
            Err(BootstrapError::Definition(
                DefinitionError::MissingDeclaringBean { declaring_bean, .. }
            )) if declaring_bean == BeanId::from(declaring.id().as_str())
        ));
    }
}
