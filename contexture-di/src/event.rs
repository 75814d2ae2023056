//! The [ProcessProducer] event is fired once for every enabled producer bean during bootstrap,
//! before the bean becomes visible for resolution. Observers can inspect the producer, veto it or
//! report definition errors, which abort the bootstrap.
//!
//! The event is only accessible while it's being dispatched. Once all observers have run, the
//! event is sealed and every access fails with [EventError::IllegalEventAccess].

use crate::annotated::{
    AnnotatedField, AnnotatedMember, AnnotatedMethod, AnnotatedParameter, TypeKey,
};
use crate::bean::{BeanDescriptor, BeanKind};
use crate::error::{BootstrapError, EventError};
use crate::instance_provider::ErrorPtr;
use tracing::debug;

#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum EventState {
    Registered,
    EventFired,
    Vetoed,
    Finalized,
}

/// Producer validation event.
#[derive(Debug)]
pub struct ProcessProducer<'a> {
    bean: &'a BeanDescriptor,
    member: &'a dyn AnnotatedMember,
    declaring_bean: Option<&'a BeanDescriptor>,
    state: EventState,
    vetoed: bool,
    definition_errors: Vec<ErrorPtr>,
}

impl<'a> ProcessProducer<'a> {
    /// Creates an event for given producer bean. Returns `None` for managed beans.
    pub(crate) fn new(
        bean: &'a BeanDescriptor,
        declaring_bean: Option<&'a BeanDescriptor>,
    ) -> Option<Self> {
        bean.producer_member().map(|member| Self {
            bean,
            member,
            declaring_bean,
            state: EventState::Registered,
            vetoed: false,
            definition_errors: vec![],
        })
    }

    #[inline]
    pub fn state(&self) -> EventState {
        self.state
    }

    /// The producer bean being validated.
    pub fn bean(&self) -> Result<&'a BeanDescriptor, EventError> {
        self.check_access()?;
        Ok(self.bean)
    }

    /// The producing field or method.
    pub fn annotated_member(&self) -> Result<&'a dyn AnnotatedMember, EventError> {
        self.check_access()?;
        Ok(self.member)
    }

    /// The producing field, if the producer is a field.
    pub fn annotated_producer_field(&self) -> Result<Option<&'a AnnotatedField>, EventError> {
        self.check_access()?;
        Ok(match self.bean.kind() {
            BeanKind::ProducerField { member, .. } => Some(member.as_ref()),
            _ => None,
        })
    }

    /// The producing method, if the producer is a method.
    pub fn annotated_producer_method(&self) -> Result<Option<&'a AnnotatedMethod>, EventError> {
        self.check_access()?;
        Ok(match self.bean.kind() {
            BeanKind::ProducerMethod { member, .. } => Some(member.as_ref()),
            _ => None,
        })
    }

    /// The disposer parameter receiving produced instances, if a disposer is declared.
    pub fn annotated_disposed_parameter(
        &self,
    ) -> Result<Option<&'a AnnotatedParameter>, EventError> {
        self.check_access()?;
        Ok(self.bean.disposed_parameter())
    }

    /// The bean declaring the producer.
    pub fn declaring_bean(&self) -> Result<Option<&'a BeanDescriptor>, EventError> {
        self.check_access()?;
        Ok(self.declaring_bean)
    }

    /// Removes the producer from the deployment.
    pub fn veto(&mut self) -> Result<(), EventError> {
        self.check_access()?;

        debug!(bean = %self.bean.id(), "Producer vetoed");
        self.vetoed = true;
        Ok(())
    }

    /// Reports a definition error, which aborts the bootstrap after this event is processed.
    pub fn add_definition_error(&mut self, error: ErrorPtr) -> Result<(), EventError> {
        self.check_access()?;
        self.definition_errors.push(error);
        Ok(())
    }

    /// Dispatches this event to given observers in order, then seals it.
    pub(crate) fn fire(
        &mut self,
        observers: &[ObserverRegistration],
    ) -> Result<EventState, BootstrapError> {
        self.state = EventState::EventFired;

        let produced_type = self.member.base_type();
        let result = observers
            .iter()
            .filter(|registration| {
                registration
                    .produced_type
                    .map(|key| key == produced_type)
                    .unwrap_or(true)
            })
            .try_for_each(|registration| registration.observer.observe(self));

        self.state = if self.vetoed {
            EventState::Vetoed
        } else {
            EventState::Finalized
        };

        result.map_err(|source| BootstrapError::Observer {
            bean: self.bean.id().clone(),
            source,
        })?;

        if let Some(error) = self.definition_errors.first() {
            return Err(BootstrapError::ProducerDefinition {
                bean: self.bean.id().clone(),
                error: error.clone(),
            });
        }

        Ok(self.state)
    }

    fn check_access(&self) -> Result<(), EventError> {
        if self.state == EventState::EventFired {
            Ok(())
        } else {
            Err(EventError::IllegalEventAccess(self.state))
        }
    }
}

/// Observes producer validation events during bootstrap.
pub trait ProducerObserver {
    fn observe(&self, event: &mut ProcessProducer<'_>) -> Result<(), EventError>;
}

impl<F> ProducerObserver for F
where
    F: Fn(&mut ProcessProducer<'_>) -> Result<(), EventError>,
{
    #[inline]
    fn observe(&self, event: &mut ProcessProducer<'_>) -> Result<(), EventError> {
        self(event)
    }
}

pub type ProducerObserverPtr = Box<dyn ProducerObserver>;

/// Observer along with the optional produced type it's restricted to.
pub struct ObserverRegistration {
    pub produced_type: Option<TypeKey>,
    pub observer: ProducerObserverPtr,
}

impl ObserverRegistration {
    pub fn new(observer: ProducerObserverPtr) -> Self {
        Self {
            produced_type: None,
            observer,
        }
    }

    pub fn for_type<T: ?Sized + 'static>(observer: ProducerObserverPtr) -> Self {
        Self {
            produced_type: Some(TypeKey::of::<T>()),
            observer,
        }
    }
}
