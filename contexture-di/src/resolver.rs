//! Typesafe resolution maps a [ResolutionQuery] - a required type along with a set of qualifiers -
//! onto exactly one bean, or a [ResolutionError] explaining why that's not possible.
//!
//! Resolution works in the following steps:
//!
//! 1. keep beans with a type assignable to the required type
//! 2. keep beans whose qualifiers are a superset of the requested ones
//! 3. drop alternatives which are not enabled for the deployment
//! 4. fail with [ResolutionError::Unsatisfied] if no bean remains
//! 5. succeed if exactly one bean remains
//! 6. otherwise try to find the most specific bean: drop beans specialized by other remaining
//! beans, prefer enabled alternatives over regular beans and keep only alternatives with the
//! highest priority; fail with [ResolutionError::Ambiguous] if that doesn't leave a single bean
//!
//! The resolver is a pure function of its inputs and the candidate order doesn't affect the
//! outcome.

use crate::annotated::{AnnotatedMember, TypeAssignability, TypeKey};
use crate::bean::{BeanDescriptor, BeanId, Qualifier, QualifierSet};
use crate::error::ResolutionError;
use crate::instance_provider::CastFunction;
use fxhash::FxHashMap;
use itertools::Itertools;
use std::borrow::Borrow;

#[cfg(not(feature = "threadsafe"))]
pub type AssignabilityPtr = Box<dyn TypeAssignability>;
#[cfg(feature = "threadsafe")]
pub type AssignabilityPtr = Box<dyn TypeAssignability + Send + Sync>;

/// Required type and qualifiers derived from an injection point.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ResolutionQuery {
    required: TypeKey,
    qualifiers: QualifierSet,
}

impl ResolutionQuery {
    /// Creates a new query. No qualifiers means the `Default` qualifier.
    pub fn new(required: TypeKey, qualifiers: QualifierSet) -> Self {
        let qualifiers = if qualifiers.is_empty() {
            QualifierSet::default().with(Qualifier::default_qualifier())
        } else {
            qualifiers
        };

        Self {
            required,
            qualifiers,
        }
    }

    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(TypeKey::of::<T>(), QualifierSet::default())
    }

    pub fn qualified<T: ?Sized + 'static>(qualifiers: QualifierSet) -> Self {
        Self::new(TypeKey::of::<T>(), qualifiers)
    }

    /// Matches every bean of type `T`.
    pub fn any<T: ?Sized + 'static>() -> Self {
        Self::new(
            TypeKey::of::<T>(),
            QualifierSet::default().with(Qualifier::any()),
        )
    }

    pub fn from_member(member: &dyn AnnotatedMember) -> Self {
        Self::new(member.base_type(), member.qualifiers().clone())
    }

    #[inline]
    pub fn required(&self) -> TypeKey {
        self.required
    }

    #[inline]
    pub fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }
}

/// Alternatives enabled for a deployment, with optional priority overrides.
#[derive(Clone, Default, Debug, Eq, PartialEq)]
pub struct Enablement {
    alternatives: FxHashMap<BeanId, Option<i32>>,
}

impl Enablement {
    pub fn enable(&mut self, bean: impl Into<BeanId>, priority: Option<i32>) {
        self.alternatives.insert(bean.into(), priority);
    }

    pub fn with_enabled(mut self, bean: impl Into<BeanId>, priority: Option<i32>) -> Self {
        self.enable(bean, priority);
        self
    }

    /// Regular beans are always enabled, alternatives only when listed.
    pub fn is_enabled(&self, bean: &BeanDescriptor) -> bool {
        !bean.is_alternative() || self.alternatives.contains_key(bean.id())
    }

    /// Effective priority of given bean.
    pub fn priority(&self, bean: &BeanDescriptor) -> i32 {
        self.alternatives
            .get(bean.id())
            .copied()
            .flatten()
            .or_else(|| bean.priority())
            .unwrap_or(0)
    }

    pub fn merge(&mut self, other: Enablement) {
        self.alternatives.extend(other.alternatives);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }
}

pub struct TypesafeResolver {
    assignability: AssignabilityPtr,
    enablement: Enablement,
}

impl TypesafeResolver {
    pub fn new(assignability: AssignabilityPtr, enablement: Enablement) -> Self {
        Self {
            assignability,
            enablement,
        }
    }

    #[inline]
    pub fn enablement(&self) -> &Enablement {
        &self.enablement
    }

    #[inline]
    pub fn is_enabled(&self, bean: &BeanDescriptor) -> bool {
        self.enablement.is_enabled(bean)
    }

    pub fn is_assignable(&self, bean: &BeanDescriptor, required: &TypeKey) -> bool {
        bean.types()
            .iter()
            .any(|bean_type| self.assignability.is_assignable(required, &bean_type.key()))
    }

    /// Returns the function casting instances of given bean to the required type. Exact type
    /// matches take precedence over other assignable types.
    pub fn cast_for(&self, bean: &BeanDescriptor, required: &TypeKey) -> Option<CastFunction> {
        bean.types()
            .iter()
            .find(|bean_type| bean_type.key() == *required)
            .or_else(|| {
                bean.types().iter().find(|bean_type| {
                    self.assignability
                        .is_assignable(required, &bean_type.key())
                })
            })
            .map(|bean_type| bean_type.cast())
    }

    /// Returns all enabled beans matching the query, in candidate order.
    pub fn resolve_all<'b, B: Borrow<BeanDescriptor>>(
        &self,
        candidates: &'b [B],
        query: &ResolutionQuery,
    ) -> Vec<&'b BeanDescriptor> {
        candidates
            .iter()
            .map(Borrow::<BeanDescriptor>::borrow)
            .filter(|bean| self.is_assignable(bean, &query.required))
            .filter(|bean| bean.qualifiers().is_superset(&query.qualifiers))
            .filter(|bean| self.is_enabled(bean))
            .collect()
    }

    pub fn resolve<'b, B: Borrow<BeanDescriptor>>(
        &self,
        candidates: &'b [B],
        query: &ResolutionQuery,
    ) -> Result<&'b BeanDescriptor, ResolutionError> {
        let resolved = self.resolve_all(candidates, query);
        match resolved.len() {
            0 => Err(ResolutionError::Unsatisfied {
                required: query.required,
                qualifiers: query.qualifiers.clone(),
            }),
            1 => Ok(resolved[0]),
            _ => self.disambiguate(resolved).map_err(|candidates| {
                ResolutionError::Ambiguous {
                    required: query.required,
                    qualifiers: query.qualifiers.clone(),
                    candidates,
                }
            }),
        }
    }

    /// Resolves the bean with given name.
    pub fn resolve_name<'b, B: Borrow<BeanDescriptor>>(
        &self,
        candidates: &'b [B],
        name: &str,
    ) -> Result<&'b BeanDescriptor, ResolutionError> {
        let resolved = candidates
            .iter()
            .map(Borrow::<BeanDescriptor>::borrow)
            .filter(|bean| bean.name() == Some(name))
            .filter(|bean| self.is_enabled(bean))
            .collect_vec();

        match resolved.len() {
            0 => Err(ResolutionError::UnsatisfiedName(name.to_string())),
            1 => Ok(resolved[0]),
            _ => self
                .disambiguate(resolved)
                .map_err(|candidates| ResolutionError::AmbiguousName {
                    name: name.to_string(),
                    candidates,
                }),
        }
    }

    fn disambiguate<'b>(
        &self,
        candidates: Vec<&'b BeanDescriptor>,
    ) -> Result<&'b BeanDescriptor, Vec<BeanId>> {
        let specialized = candidates
            .iter()
            .filter_map(|bean| bean.specializes())
            .collect_vec();

        let mut remaining = candidates
            .iter()
            .copied()
            .filter(|bean| !specialized.contains(&bean.id()))
            .collect_vec();
        if remaining.is_empty() {
            // a specialization cycle removes everything
            remaining = candidates;
        }

        if remaining.iter().any(|bean| bean.is_alternative()) {
            remaining.retain(|bean| bean.is_alternative());

            let highest = remaining
                .iter()
                .map(|bean| self.enablement.priority(bean))
                .max()
                .unwrap_or_default();
            remaining.retain(|bean| self.enablement.priority(bean) == highest);
        }

        if remaining.len() == 1 {
            Ok(remaining[0])
        } else {
            Err(remaining
                .into_iter()
                .map(|bean| bean.id().clone())
                .sorted()
                .collect())
        }
    }
}
