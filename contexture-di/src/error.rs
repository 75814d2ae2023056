use crate::annotated::TypeKey;
use crate::bean::{BeanId, QualifierSet};
use crate::event::EventState;
use crate::instance_provider::ErrorPtr;
use itertools::Itertools;
use thiserror::Error;

/// Typesafe resolution failures. Resolution against a candidate set yields either exactly one bean
/// or exactly one of these errors.
#[derive(Error, Clone, Eq, PartialEq, Debug)]
pub enum ResolutionError {
    #[error("Unsatisfied dependency: no bean of type {required} with qualifiers {qualifiers}")]
    Unsatisfied {
        required: TypeKey,
        qualifiers: QualifierSet,
    },
    #[error(
        "Ambiguous dependency: type {required} with qualifiers {qualifiers} matches beans: {}",
        .candidates.iter().join(", ")
    )]
    Ambiguous {
        required: TypeKey,
        qualifiers: QualifierSet,
        candidates: Vec<BeanId>,
    },
    #[error("Unsatisfied dependency: no bean named '{0}'")]
    UnsatisfiedName(String),
    #[error("Ambiguous name '{name}' matches beans: {}", .candidates.iter().join(", "))]
    AmbiguousName {
        name: String,
        candidates: Vec<BeanId>,
    },
}

/// Errors related to obtaining and creating bean instances.
#[derive(Error, Clone, Debug)]
pub enum InstanceProviderError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("No active context for scope: {0}")]
    ContextNotActive(String),
    #[error("No context registered for scope: {0}")]
    UnrecognizedScope(String),
    #[error("Unknown bean: {0}")]
    UnknownBean(BeanId),
    #[error("Tried to cast bean instance to incompatible type: {0}")]
    IncompatibleBean(TypeKey),
    #[error("Bean {0} was requested while its own constructor is running")]
    UnresolvableCircularDependency(BeanId),
    #[error("Context for scope {scope} did not provide an instance of bean {bean}")]
    MissingInstance { scope: String, bean: BeanId },
    #[error("Error constructing bean: {0}")]
    ConstructionError(ErrorPtr),
}

/// Invalid bean definitions, detected while registering beans.
#[derive(Error, Clone, Eq, PartialEq, Hash, Debug)]
pub enum DefinitionError {
    #[error("Bean {0} declares no bean types")]
    NoBeanTypes(BeanId),
    #[error("Attempted to register a duplicated bean: {0}")]
    DuplicateBean(BeanId),
    #[error("Missing declaring bean {declaring_bean} for producer: {producer}")]
    MissingDeclaringBean {
        producer: BeanId,
        declaring_bean: BeanId,
    },
    #[error("Producer {producer} is declared on {declaring_bean}, which is not a managed bean")]
    InvalidDeclaringBean {
        producer: BeanId,
        declaring_bean: BeanId,
    },
    #[error("Bean {bean} specializes unknown bean: {specialized}")]
    MissingSpecializedBean { bean: BeanId, specialized: BeanId },
    #[error("Managed bean {0} cannot declare a disposer")]
    DisposerOnManagedBean(BeanId),
}

/// Misuse of a [ProcessProducer](crate::event::ProcessProducer) event.
#[derive(Error, Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum EventError {
    #[error("Producer validation event accessed outside of its dispatch (state: {0:?})")]
    IllegalEventAccess(EventState),
}

/// Errors aborting the bootstrap of a [BeanManager](crate::manager::BeanManager).
#[derive(Error, Clone, Debug)]
pub enum BootstrapError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error("Observer failed processing producer {bean}: {source}")]
    Observer { bean: BeanId, source: EventError },
    #[error("Definition error reported for producer {bean}: {error}")]
    ProducerDefinition { bean: BeanId, error: ErrorPtr },
}
