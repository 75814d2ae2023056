//! A [CreationalContext] tracks beans under construction within a single root request for an
//! instance. Every bean constructed while serving the request gets a child context, which can see
//! all incomplete instances of its ancestors. This is what allows circular dependencies to be
//! satisfied with partially constructed instances instead of infinite recursion.
//!
//! Managed beans are constructed in two phases. While the constructor runs, there is no instance
//! yet and the bean is [Incomplete::Pending] - requesting it again is an unresolvable cycle. Once
//! the constructor returns, the instance becomes [Incomplete::Partial] for the duration of
//! its initializer and is handed to anyone needing it, which is recorded as a
//! [CircularDependencyWarning].

use crate::bean::BeanId;
use crate::instance_provider::AnyInstancePtr;
use derivative::Derivative;
use derive_more::Display;
use fxhash::FxHashMap;
use tracing::warn;

/// State of a bean under construction.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub enum Incomplete {
    /// Construction started, but no instance exists yet.
    Pending,
    /// The instance exists, but is not fully initialized.
    Partial(#[derivative(Debug = "ignore")] AnyInstancePtr),
}

/// A partially constructed instance of `substituted` was given to `dependent`.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Display)]
#[display(fmt = "{} received an incomplete instance of {}", dependent, substituted)]
pub struct CircularDependencyWarning {
    pub dependent: String,
    pub substituted: BeanId,
}

/// Per-request construction tracking. See module documentation for details.
#[derive(Debug, Default)]
pub struct CreationalContext<'p> {
    parent: Option<&'p CreationalContext<'p>>,
    bean: Option<BeanId>,
    incomplete: FxHashMap<BeanId, Incomplete>,
    substitutions: Vec<CircularDependencyWarning>,
}

impl<'p> CreationalContext<'p> {
    /// Creates a root context for a new request.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a nested context, which sees the incomplete instances of this one.
    pub fn child(&self) -> CreationalContext<'_> {
        CreationalContext {
            parent: Some(self),
            bean: None,
            incomplete: Default::default(),
            substitutions: vec![],
        }
    }

    /// Creates a nested context for constructing the given bean.
    pub fn child_for(&self, bean: BeanId) -> CreationalContext<'_> {
        CreationalContext {
            bean: Some(bean),
            ..self.child()
        }
    }

    /// The bean this context is constructing, if any.
    #[inline]
    pub fn bean(&self) -> Option<&BeanId> {
        self.bean.as_ref()
    }

    /// Looks for an incomplete instance of given bean in this context and its ancestors.
    pub fn incomplete_instance(&self, bean: &BeanId) -> Option<&Incomplete> {
        self.incomplete
            .get(bean)
            .or_else(|| self.parent.and_then(|parent| parent.incomplete_instance(bean)))
    }

    #[inline]
    pub fn is_incomplete(&self, bean: &BeanId) -> bool {
        self.incomplete_instance(bean).is_some()
    }

    /// Checks if this context itself has beans under construction.
    #[inline]
    pub fn has_incomplete_instances(&self) -> bool {
        !self.incomplete.is_empty()
    }

    /// Incomplete instances handed out so far, including those from finished child contexts.
    #[inline]
    pub fn substitutions(&self) -> &[CircularDependencyWarning] {
        &self.substitutions
    }

    /// Describes whoever currently requests instances through this context.
    pub fn dependent_description(&self) -> String {
        self.bean
            .as_ref()
            .or_else(|| self.parent.and_then(|parent| parent.bean()))
            .map(|bean| bean.to_string())
            .unwrap_or_else(|| "<root request>".to_string())
    }

    pub(crate) fn begin(&mut self, bean: BeanId) {
        self.incomplete.insert(bean, Incomplete::Pending);
    }

    pub(crate) fn push(&mut self, bean: BeanId, instance: AnyInstancePtr) {
        self.incomplete.insert(bean, Incomplete::Partial(instance));
    }

    pub(crate) fn release(&mut self, bean: &BeanId) {
        self.incomplete.remove(bean);
    }

    pub(crate) fn record_substitution(&mut self, dependent: String, substituted: BeanId) {
        let warning = CircularDependencyWarning {
            dependent,
            substituted,
        };

        warn!(%warning, "Circular dependency satisfied with an incomplete instance");
        self.substitutions.push(warning);
    }

    /// Consumes this context, returning warnings to be absorbed by the parent.
    pub(crate) fn finish(self) -> Vec<CircularDependencyWarning> {
        self.substitutions
    }

    pub(crate) fn absorb(&mut self, substitutions: Vec<CircularDependencyWarning>) {
        self.substitutions.extend(substitutions);
    }
}
