//! Instance pointers and the injection API available to bean constructors, initializers and
//! producers. Instances are type-erased as [AnyInstancePtr] and converted to concrete pointers with
//! the [CastFunction] registered for the requested bean type.

use crate::annotated::{AnnotatedMember, TypeKey};
use crate::bean::QualifierSet;
use crate::error::{InstanceProviderError, ResolutionError};
use crate::resolver::ResolutionQuery;
use std::any::Any;
use std::error::Error;
#[cfg(not(feature = "threadsafe"))]
use std::rc::Rc;
#[cfg(feature = "threadsafe")]
use std::sync::Arc;

#[cfg(not(feature = "threadsafe"))]
pub type InstancePtr<T> = Rc<T>;
#[cfg(feature = "threadsafe")]
pub type InstancePtr<T> = Arc<T>;

#[cfg(not(feature = "threadsafe"))]
pub type AnyInstancePtr = InstancePtr<dyn Any + 'static>;
#[cfg(feature = "threadsafe")]
pub type AnyInstancePtr = InstancePtr<dyn Any + Send + Sync + 'static>;

#[cfg(not(feature = "threadsafe"))]
pub type ErrorPtr = Rc<dyn Error + 'static>;
#[cfg(feature = "threadsafe")]
pub type ErrorPtr = Arc<dyn Error + Send + Sync + 'static>;

/// Casts a type-erased bean instance to a boxed `InstancePtr<T>` for one of the bean types. On
/// failure, the original instance is returned back.
pub type CastFunction = fn(instance: AnyInstancePtr) -> Result<Box<dyn Any>, AnyInstancePtr>;

/// Bound for concrete bean instance types.
#[cfg(feature = "threadsafe")]
pub trait BeanInstance: Any + Send + Sync {}
#[cfg(feature = "threadsafe")]
impl<T: Any + Send + Sync> BeanInstance for T {}

/// Bound for concrete bean instance types.
#[cfg(not(feature = "threadsafe"))]
pub trait BeanInstance: Any {}
#[cfg(not(feature = "threadsafe"))]
impl<T: Any> BeanInstance for T {}

/// Wraps a freshly created value in a type-erased instance pointer.
#[inline]
pub fn into_instance<T: BeanInstance>(value: T) -> AnyInstancePtr {
    InstancePtr::new(value) as AnyInstancePtr
}

/// Wraps an error raised by user code as a construction failure.
#[cfg(feature = "threadsafe")]
pub fn construction_error<E: Error + Send + Sync + 'static>(error: E) -> InstanceProviderError {
    InstanceProviderError::ConstructionError(Arc::new(error) as ErrorPtr)
}

/// Wraps an error raised by user code as a construction failure.
#[cfg(not(feature = "threadsafe"))]
pub fn construction_error<E: Error + 'static>(error: E) -> InstanceProviderError {
    InstanceProviderError::ConstructionError(Rc::new(error) as ErrorPtr)
}

/// Generic provider for bean instances, handed to bean lifecycle functions. Every returned
/// instance comes with the cast function for the requested type.
pub trait InstanceProvider {
    /// Resolves exactly one bean for the query and returns its contextual reference.
    fn reference(
        &mut self,
        query: &ResolutionQuery,
    ) -> Result<(AnyInstancePtr, CastFunction), InstanceProviderError>;

    /// Returns references to all enabled beans matching the query, without disambiguation.
    fn references(
        &mut self,
        query: &ResolutionQuery,
    ) -> Result<Vec<(AnyInstancePtr, CastFunction)>, InstanceProviderError>;

    /// Returns a reference to the bean with given name, which must provide the `required` type.
    fn reference_by_name(
        &mut self,
        name: &str,
        required: TypeKey,
    ) -> Result<(AnyInstancePtr, CastFunction), InstanceProviderError>;
}

/// Helper trait for [InstanceProvider] providing strongly-typed access.
pub trait TypedInstanceProvider {
    /// Typesafe version of [InstanceProvider::reference] for the `Default` qualifier.
    fn instance_typed<T: ?Sized + 'static>(
        &mut self,
    ) -> Result<InstancePtr<T>, InstanceProviderError>;

    /// Typesafe version of [InstanceProvider::reference] with explicit qualifiers.
    fn instance_qualified_typed<T: ?Sized + 'static>(
        &mut self,
        qualifiers: QualifierSet,
    ) -> Result<InstancePtr<T>, InstanceProviderError>;

    /// Tries to get an instance like [TypedInstanceProvider::instance_typed] does, but returns
    /// `None` when no bean is available.
    fn instance_option<T: ?Sized + 'static>(
        &mut self,
    ) -> Result<Option<InstancePtr<T>>, InstanceProviderError>;

    /// Returns instances of all enabled beans of given type, regardless of their qualifiers.
    fn instances_typed<T: ?Sized + 'static>(
        &mut self,
    ) -> Result<Vec<InstancePtr<T>>, InstanceProviderError>;

    /// Typesafe version of [InstanceProvider::reference_by_name].
    fn instance_by_name_typed<T: ?Sized + 'static>(
        &mut self,
        name: &str,
    ) -> Result<InstancePtr<T>, InstanceProviderError>;

    /// Resolves the injection point described by given member. The member base type must be `T`.
    fn inject_typed<T: ?Sized + 'static>(
        &mut self,
        member: &dyn AnnotatedMember,
    ) -> Result<InstancePtr<T>, InstanceProviderError>;
}

impl<P: InstanceProvider + ?Sized> TypedInstanceProvider for P {
    fn instance_typed<T: ?Sized + 'static>(
        &mut self,
    ) -> Result<InstancePtr<T>, InstanceProviderError> {
        self.instance_qualified_typed::<T>(QualifierSet::default())
    }

    fn instance_qualified_typed<T: ?Sized + 'static>(
        &mut self,
        qualifiers: QualifierSet,
    ) -> Result<InstancePtr<T>, InstanceProviderError> {
        let query = ResolutionQuery::new(TypeKey::of::<T>(), qualifiers);
        self.reference(&query)
            .and_then(|(instance, cast)| cast_instance::<T>(instance, cast))
    }

    fn instance_option<T: ?Sized + 'static>(
        &mut self,
    ) -> Result<Option<InstancePtr<T>>, InstanceProviderError> {
        match self.instance_typed::<T>() {
            Ok(instance) => Ok(Some(instance)),
            Err(InstanceProviderError::Resolution(ResolutionError::Unsatisfied { .. })) => {
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    fn instances_typed<T: ?Sized + 'static>(
        &mut self,
    ) -> Result<Vec<InstancePtr<T>>, InstanceProviderError> {
        self.references(&ResolutionQuery::any::<T>())?
            .into_iter()
            .map(|(instance, cast)| cast_instance::<T>(instance, cast))
            .collect()
    }

    fn instance_by_name_typed<T: ?Sized + 'static>(
        &mut self,
        name: &str,
    ) -> Result<InstancePtr<T>, InstanceProviderError> {
        self.reference_by_name(name, TypeKey::of::<T>())
            .and_then(|(instance, cast)| cast_instance::<T>(instance, cast))
    }

    fn inject_typed<T: ?Sized + 'static>(
        &mut self,
        member: &dyn AnnotatedMember,
    ) -> Result<InstancePtr<T>, InstanceProviderError> {
        let required = TypeKey::of::<T>();
        if member.base_type() != required {
            return Err(InstanceProviderError::IncompatibleBean(required));
        }

        self.reference(&ResolutionQuery::from_member(member))
            .and_then(|(instance, cast)| cast_instance::<T>(instance, cast))
    }
}

fn cast_instance<T: ?Sized + 'static>(
    instance: AnyInstancePtr,
    cast: CastFunction,
) -> Result<InstancePtr<T>, InstanceProviderError> {
    cast(instance)
        .ok()
        .and_then(|instance| instance.downcast::<InstancePtr<T>>().ok())
        .map(|instance| *instance)
        .ok_or_else(|| InstanceProviderError::IncompatibleBean(TypeKey::of::<T>()))
}
