//! Beans are the managed, injectable component definitions. A [BeanDescriptor] is immutable once
//! built and describes which types the bean satisfies, which qualifiers discriminate it, which
//! scope governs its instances, and how instances are created.
//!
//! ## Bean kinds
//!
//! * managed beans are created by a constructor function, optionally followed by an initializer
//! which runs on the already existing instance; between the two phases the instance is considered
//! partially constructed and may be handed to circular dependents
//! * producer methods and producer fields obtain their instance from another bean - the declaring
//! bean - unless the producing member is static
//!
//! ## Registering bean types
//!
//! Each bean satisfies at least one type. Concrete types are added with [BeanType::of], while
//! `dyn Trait` types need a [BeanDowncast] implementation, which is generated by [bean_alias]:
//!
//! ```
//! use contexture_di::bean::{BeanDescriptor, BeanType};
//! use contexture_di::bean_alias;
//! use contexture_di::instance_provider::into_instance;
//!
//! trait Greeter {}
//!
//! struct EnglishGreeter;
//!
//! impl Greeter for EnglishGreeter {}
//!
//! bean_alias!(dyn Greeter + Send + Sync => EnglishGreeter);
//!
//! let bean = BeanDescriptor::managed::<EnglishGreeter>(|_| Ok(into_instance(EnglishGreeter)))
//!     .with_type(BeanType::alias::<dyn Greeter + Send + Sync, EnglishGreeter>())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(bean.types().len(), 2);
//! ```

use crate::annotated::{AnnotatedField, AnnotatedMember, AnnotatedMethod, AnnotatedParameter, TypeKey};
use crate::error::{DefinitionError, InstanceProviderError};
use crate::instance_provider::{
    AnyInstancePtr, BeanInstance, CastFunction, InstanceProvider, InstancePtr,
};
use crate::scope::DEPENDENT;
use derivative::Derivative;
use itertools::Itertools;
use std::any::{type_name, Any};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Kind of the built-in qualifier present on unqualified beans and injection points.
pub const DEFAULT: &str = "Default";

/// Kind of the built-in qualifier present on every bean.
pub const ANY: &str = "Any";

/// Kind of the built-in qualifier carrying bean names.
pub const NAMED: &str = "Named";

/// Stable identity of a bean, unique within a bean manager.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, derive_more::Display)]
pub struct BeanId(Arc<str>);

impl BeanId {
    #[inline]
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BeanId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BeanId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// A qualifier discriminates beans which provide the same type. Non-binding members are carried
/// along for informational purposes, but are ignored when comparing qualifiers.
#[derive(Derivative, Clone)]
#[derivative(Debug, PartialEq, Eq, Hash)]
pub struct Qualifier {
    kind: Cow<'static, str>,
    members: BTreeMap<String, String>,
    #[derivative(PartialEq = "ignore", Hash = "ignore")]
    non_binding: BTreeMap<String, String>,
}

impl Qualifier {
    pub fn new(kind: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind: kind.into(),
            members: Default::default(),
            non_binding: Default::default(),
        }
    }

    /// The `Default` qualifier.
    pub fn default_qualifier() -> Self {
        Self::new(DEFAULT)
    }

    /// The `Any` qualifier.
    pub fn any() -> Self {
        Self::new(ANY)
    }

    /// The `Named` qualifier with given name as its value.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(NAMED).with_member("value", name)
    }

    pub fn with_member(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.members.insert(name.into(), value.into());
        self
    }

    pub fn with_non_binding_member(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.non_binding.insert(name.into(), value.into());
        self
    }

    #[inline]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the value of a binding or non-binding member.
    pub fn member(&self, name: &str) -> Option<&str> {
        self.members
            .get(name)
            .or_else(|| self.non_binding.get(name))
            .map(String::as_str)
    }
}

impl Ord for Qualifier {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.kind, &self.members).cmp(&(&other.kind, &other.members))
    }
}

impl PartialOrd for Qualifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Qualifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.kind)?;
        if !self.members.is_empty() {
            write!(
                f,
                "({})",
                self.members
                    .iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .join(", ")
            )?;
        }
        Ok(())
    }
}

/// Ordered set of qualifiers.
#[derive(Clone, Default, Debug, Eq, PartialEq, Hash)]
pub struct QualifierSet(BTreeSet<Qualifier>);

impl QualifierSet {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn insert(&mut self, qualifier: Qualifier) -> bool {
        self.0.insert(qualifier)
    }

    pub fn with(mut self, qualifier: Qualifier) -> Self {
        self.insert(qualifier);
        self
    }

    #[inline]
    pub fn contains(&self, qualifier: &Qualifier) -> bool {
        self.0.contains(qualifier)
    }

    pub fn contains_kind(&self, kind: &str) -> bool {
        self.0.iter().any(|qualifier| qualifier.kind() == kind)
    }

    #[inline]
    pub fn is_superset(&self, other: &QualifierSet) -> bool {
        self.0.is_superset(&other.0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Qualifier> {
        self.0.iter()
    }
}

impl FromIterator<Qualifier> for QualifierSet {
    fn from_iter<T: IntoIterator<Item = Qualifier>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Display for QualifierSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.0.iter().join(", "))
    }
}

/// Helper trait for types a bean of concrete type `C` can be injected as. Usually those are
/// `dyn Trait` types implemented by `C` - see [bean_alias].
pub trait BeanDowncast<C>: 'static {
    fn downcast(source: AnyInstancePtr) -> Result<InstancePtr<Self>, AnyInstancePtr>;
}

impl<C: BeanInstance> BeanDowncast<C> for C {
    #[inline]
    fn downcast(source: AnyInstancePtr) -> Result<InstancePtr<Self>, AnyInstancePtr> {
        source.downcast::<C>()
    }
}

/// Implements [BeanDowncast] for a `dyn Trait` type, so it can be registered as a bean type of the
/// given concrete type with [BeanType::alias].
#[macro_export]
macro_rules! bean_alias {
    ($alias:ty => $target:ty) => {
        impl $crate::bean::BeanDowncast<$target> for $alias {
            fn downcast(
                source: $crate::instance_provider::AnyInstancePtr,
            ) -> ::std::result::Result<
                $crate::instance_provider::InstancePtr<Self>,
                $crate::instance_provider::AnyInstancePtr,
            > {
                source
                    .downcast::<$target>()
                    .map(|instance| instance as $crate::instance_provider::InstancePtr<Self>)
            }
        }
    };
}

fn cast_to<S: BeanDowncast<C> + ?Sized, C>(
    instance: AnyInstancePtr,
) -> Result<Box<dyn Any>, AnyInstancePtr> {
    S::downcast(instance).map(|instance| Box::new(instance) as Box<dyn Any>)
}

/// A type satisfied by a bean, along with the function casting bean instances to it.
#[derive(Derivative, Clone, Copy)]
#[derivative(Debug)]
pub struct BeanType {
    key: TypeKey,
    #[derivative(Debug = "ignore")]
    cast: CastFunction,
}

impl BeanType {
    /// The concrete type of a bean.
    pub fn of<C: BeanInstance>() -> Self {
        Self::alias::<C, C>()
    }

    /// Type `S` satisfied by a bean of concrete type `C`.
    pub fn alias<S: BeanDowncast<C> + ?Sized, C>() -> Self {
        Self {
            key: TypeKey::of::<S>(),
            cast: cast_to::<S, C>,
        }
    }

    #[inline]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    #[inline]
    pub fn cast(&self) -> CastFunction {
        self.cast
    }
}

/// Creates a managed bean instance.
pub type ConstructorFn =
    fn(instance_provider: &mut dyn InstanceProvider) -> Result<AnyInstancePtr, InstanceProviderError>;

/// Finishes a managed bean instance, e.g. by injecting late dependencies. The instance is
/// available to circular dependents while the initializer runs.
pub type InitializerFn = fn(
    instance: &AnyInstancePtr,
    instance_provider: &mut dyn InstanceProvider,
) -> Result<(), InstanceProviderError>;

/// Invokes a producer method on the receiver, which is `None` for static methods.
pub type ProducerMethodFn = fn(
    receiver: Option<&AnyInstancePtr>,
    instance_provider: &mut dyn InstanceProvider,
) -> Result<AnyInstancePtr, InstanceProviderError>;

/// Reads a producer field from the receiver, which is `None` for static fields.
pub type ProducerFieldFn =
    fn(receiver: Option<&AnyInstancePtr>) -> Result<AnyInstancePtr, InstanceProviderError>;

/// Called when a context destroys an instance; a disposer for producer beans.
pub type DestructorFn = fn(instance: AnyInstancePtr);

#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub enum BeanKind {
    Managed {
        #[derivative(Debug = "ignore")]
        constructor: ConstructorFn,
        #[derivative(Debug = "ignore")]
        initializer: Option<InitializerFn>,
    },
    ProducerMethod {
        declaring_bean: BeanId,
        member: Arc<AnnotatedMethod>,
        #[derivative(Debug = "ignore")]
        produce: ProducerMethodFn,
    },
    ProducerField {
        declaring_bean: BeanId,
        member: Arc<AnnotatedField>,
        #[derivative(Debug = "ignore")]
        read: ProducerFieldFn,
    },
}

/// Definition of a bean registered in a bean manager.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct BeanDescriptor {
    id: BeanId,
    kind: BeanKind,
    types: Vec<BeanType>,
    qualifiers: QualifierSet,
    scope: String,
    name: Option<String>,
    is_alternative: bool,
    priority: Option<i32>,
    specializes: Option<BeanId>,
    disposed_parameter: Option<AnnotatedParameter>,
    #[derivative(Debug = "ignore")]
    destructor: Option<DestructorFn>,
}

impl BeanDescriptor {
    /// Starts building a managed bean of concrete type `C`.
    pub fn managed<C: BeanInstance>(constructor: ConstructorFn) -> BeanBuilder {
        BeanBuilder::new(
            BeanId::new(format!("managed:{}", type_name::<C>())),
            BeanKind::Managed {
                constructor,
                initializer: None,
            },
            BeanType::of::<C>(),
            QualifierSet::default(),
        )
    }

    /// Starts building a producer method bean producing type `T`.
    pub fn producer_method<T: BeanInstance>(
        member: AnnotatedMethod,
        declaring_bean: impl Into<BeanId>,
        produce: ProducerMethodFn,
    ) -> BeanBuilder {
        let id = BeanId::new(format!(
            "producer-method:{}.{}",
            member.declaring_type(),
            member.name()
        ));
        let qualifiers = member.qualifiers().clone();

        BeanBuilder::new(
            id,
            BeanKind::ProducerMethod {
                declaring_bean: declaring_bean.into(),
                member: Arc::new(member),
                produce,
            },
            BeanType::of::<T>(),
            qualifiers,
        )
    }

    /// Starts building a producer field bean producing type `T`.
    pub fn producer_field<T: BeanInstance>(
        member: AnnotatedField,
        declaring_bean: impl Into<BeanId>,
        read: ProducerFieldFn,
    ) -> BeanBuilder {
        let id = BeanId::new(format!(
            "producer-field:{}.{}",
            member.declaring_type(),
            member.name()
        ));
        let qualifiers = member.qualifiers().clone();

        BeanBuilder::new(
            id,
            BeanKind::ProducerField {
                declaring_bean: declaring_bean.into(),
                member: Arc::new(member),
                read,
            },
            BeanType::of::<T>(),
            qualifiers,
        )
    }

    #[inline]
    pub fn id(&self) -> &BeanId {
        &self.id
    }

    #[inline]
    pub fn kind(&self) -> &BeanKind {
        &self.kind
    }

    /// Types satisfied by this bean. Never empty.
    #[inline]
    pub fn types(&self) -> &[BeanType] {
        &self.types
    }

    pub fn has_type(&self, key: &TypeKey) -> bool {
        self.types.iter().any(|bean_type| bean_type.key == *key)
    }

    #[inline]
    pub fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }

    #[inline]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn is_alternative(&self) -> bool {
        self.is_alternative
    }

    #[inline]
    pub fn priority(&self) -> Option<i32> {
        self.priority
    }

    /// The bean this bean replaces during resolution.
    #[inline]
    pub fn specializes(&self) -> Option<&BeanId> {
        self.specializes.as_ref()
    }

    #[inline]
    pub fn destructor(&self) -> Option<DestructorFn> {
        self.destructor
    }

    #[inline]
    pub fn disposed_parameter(&self) -> Option<&AnnotatedParameter> {
        self.disposed_parameter.as_ref()
    }

    #[inline]
    pub fn is_producer(&self) -> bool {
        !matches!(self.kind, BeanKind::Managed { .. })
    }

    /// The bean whose instance serves as the receiver of a producer. This is a key into the bean
    /// registry, not an owning reference.
    pub fn declaring_bean(&self) -> Option<&BeanId> {
        match &self.kind {
            BeanKind::Managed { .. } => None,
            BeanKind::ProducerMethod { declaring_bean, .. }
            | BeanKind::ProducerField { declaring_bean, .. } => Some(declaring_bean),
        }
    }

    pub fn producer_member(&self) -> Option<&dyn AnnotatedMember> {
        match &self.kind {
            BeanKind::Managed { .. } => None,
            BeanKind::ProducerMethod { member, .. } => Some(member.as_ref() as &dyn AnnotatedMember),
            BeanKind::ProducerField { member, .. } => Some(member.as_ref() as &dyn AnnotatedMember),
        }
    }

    /// True for producers which don't need a receiver.
    pub fn is_static(&self) -> bool {
        self.producer_member()
            .map(|member| member.is_static())
            .unwrap_or(false)
    }
}

/// Builder for [BeanDescriptor]s.
#[derive(Debug)]
pub struct BeanBuilder {
    descriptor: BeanDescriptor,
}

impl BeanBuilder {
    fn new(id: BeanId, kind: BeanKind, bean_type: BeanType, qualifiers: QualifierSet) -> Self {
        Self {
            descriptor: BeanDescriptor {
                id,
                kind,
                types: vec![bean_type],
                qualifiers,
                scope: DEPENDENT.to_string(),
                name: None,
                is_alternative: false,
                priority: None,
                specializes: None,
                disposed_parameter: None,
                destructor: None,
            },
        }
    }

    pub fn with_id(mut self, id: impl Into<BeanId>) -> Self {
        self.descriptor.id = id.into();
        self
    }

    /// Adds a type satisfied by the bean.
    pub fn with_type(mut self, bean_type: BeanType) -> Self {
        if !self.descriptor.has_type(&bean_type.key) {
            self.descriptor.types.push(bean_type);
        }
        self
    }

    /// Replaces all types satisfied by the bean.
    pub fn with_types(mut self, types: Vec<BeanType>) -> Self {
        self.descriptor.types = types;
        self
    }

    pub fn with_qualifier(mut self, qualifier: Qualifier) -> Self {
        self.descriptor.qualifiers.insert(qualifier);
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.descriptor.scope = scope.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.descriptor.name = Some(name.into());
        self
    }

    /// Marks the bean as an alternative, which needs explicit enablement to be resolvable.
    pub fn alternative(mut self) -> Self {
        self.descriptor.is_alternative = true;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.descriptor.priority = Some(priority);
        self
    }

    pub fn specializing(mut self, bean: impl Into<BeanId>) -> Self {
        self.descriptor.specializes = Some(bean.into());
        self
    }

    /// Sets the initializer of a managed bean. Ignored for producers.
    pub fn with_initializer(mut self, initializer: InitializerFn) -> Self {
        if let BeanKind::Managed {
            initializer: target,
            ..
        } = &mut self.descriptor.kind
        {
            *target = Some(initializer);
        }
        self
    }

    pub fn with_destructor(mut self, destructor: DestructorFn) -> Self {
        self.descriptor.destructor = Some(destructor);
        self
    }

    /// Sets the disposer of a producer along with the parameter receiving disposed instances.
    pub fn with_disposer(mut self, parameter: AnnotatedParameter, disposer: DestructorFn) -> Self {
        self.descriptor.disposed_parameter = Some(parameter);
        self.descriptor.destructor = Some(disposer);
        self
    }

    /// Validates and normalizes the definition: every bean gets the `Any` qualifier, named beans
    /// get their `Named` qualifier and beans without other qualifiers get `Default`.
    pub fn build(self) -> Result<BeanDescriptor, DefinitionError> {
        let mut descriptor = self.descriptor;

        if descriptor.types.is_empty() {
            return Err(DefinitionError::NoBeanTypes(descriptor.id));
        }

        if !descriptor.is_producer() && descriptor.disposed_parameter.is_some() {
            return Err(DefinitionError::DisposerOnManagedBean(descriptor.id));
        }

        if let Some(name) = &descriptor.name {
            descriptor.qualifiers.insert(Qualifier::named(name.clone()));
        }

        if descriptor
            .qualifiers
            .iter()
            .all(|qualifier| qualifier.kind() == NAMED || qualifier.kind() == ANY)
        {
            descriptor.qualifiers.insert(Qualifier::default_qualifier());
        }

        descriptor.qualifiers.insert(Qualifier::any());

        Ok(descriptor)
    }
}
