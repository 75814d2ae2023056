//! Uniform, read-only view over the members beans are declared with: fields, methods and method
//! parameters. Metadata extraction is up to the code registering beans; this module only carries
//! what the container needs to know: the declared type, declaring type, static-ness and
//! qualifiers.

use crate::bean::{Qualifier, QualifierSet};
use derivative::Derivative;
#[cfg(test)]
use mockall::automock;
use std::any::{type_name, TypeId};
use std::fmt::{Debug, Display, Formatter};

/// Type identifier for bean types and injection points. Two keys are equal when they refer to the
/// same [TypeId]; the name only serves diagnostics.
#[derive(Derivative, Clone, Copy)]
#[derivative(Debug, PartialEq, Eq, Hash)]
pub struct TypeKey {
    #[derivative(Debug = "ignore")]
    id: TypeId,
    #[derivative(PartialEq = "ignore", Hash = "ignore")]
    name: &'static str,
}

impl TypeKey {
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Display for TypeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum MemberKind {
    Field,
    Method,
    Parameter,
}

/// Read-only view over an annotated member.
pub trait AnnotatedMember: Debug + Display {
    fn kind(&self) -> MemberKind;

    fn name(&self) -> &str;

    /// The declared type of the member - field type, method return type or parameter type.
    fn base_type(&self) -> TypeKey;

    /// Type declaring this member.
    fn declaring_type(&self) -> TypeKey;

    /// Static members belong to the declaring type, not its instances.
    fn is_static(&self) -> bool;

    fn qualifiers(&self) -> &QualifierSet;
}

#[derive(Clone, Debug)]
pub struct AnnotatedField {
    name: String,
    base_type: TypeKey,
    declaring_type: TypeKey,
    is_static: bool,
    qualifiers: QualifierSet,
}

impl AnnotatedField {
    /// Creates a field of type `T` declared on type `X`.
    pub fn new<X: ?Sized + 'static, T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_type: TypeKey::of::<T>(),
            declaring_type: TypeKey::of::<X>(),
            is_static: false,
            qualifiers: Default::default(),
        }
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    pub fn with_qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.insert(qualifier);
        self
    }
}

impl AnnotatedMember for AnnotatedField {
    fn kind(&self) -> MemberKind {
        MemberKind::Field
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn base_type(&self) -> TypeKey {
        self.base_type
    }

    fn declaring_type(&self) -> TypeKey {
        self.declaring_type
    }

    fn is_static(&self) -> bool {
        self.is_static
    }

    fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }
}

impl Display for AnnotatedField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "field {}::{}", self.declaring_type, self.name)
    }
}

#[derive(Clone, Debug)]
pub struct AnnotatedMethod {
    name: String,
    base_type: TypeKey,
    declaring_type: TypeKey,
    is_static: bool,
    qualifiers: QualifierSet,
    parameters: Vec<AnnotatedParameter>,
}

impl AnnotatedMethod {
    /// Creates a method returning `T` declared on type `X`.
    pub fn new<X: ?Sized + 'static, T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_type: TypeKey::of::<T>(),
            declaring_type: TypeKey::of::<X>(),
            is_static: false,
            qualifiers: Default::default(),
            parameters: vec![],
        }
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        for parameter in &mut self.parameters {
            parameter.is_static = is_static;
        }
        self
    }

    pub fn with_qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.insert(qualifier);
        self
    }

    /// Appends a parameter of type `T` with given qualifiers.
    pub fn with_parameter<T: ?Sized + 'static>(mut self, qualifiers: QualifierSet) -> Self {
        self.parameters.push(AnnotatedParameter {
            name: format!("arg{}", self.parameters.len()),
            position: self.parameters.len(),
            base_type: TypeKey::of::<T>(),
            declaring_type: self.declaring_type,
            declaring_method: self.name.clone(),
            is_static: self.is_static,
            qualifiers,
        });
        self
    }

    #[inline]
    pub fn parameters(&self) -> &[AnnotatedParameter] {
        &self.parameters
    }
}

impl AnnotatedMember for AnnotatedMethod {
    fn kind(&self) -> MemberKind {
        MemberKind::Method
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn base_type(&self) -> TypeKey {
        self.base_type
    }

    fn declaring_type(&self) -> TypeKey {
        self.declaring_type
    }

    fn is_static(&self) -> bool {
        self.is_static
    }

    fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }
}

impl Display for AnnotatedMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "method {}::{}()", self.declaring_type, self.name)
    }
}

#[derive(Clone, Debug)]
pub struct AnnotatedParameter {
    name: String,
    position: usize,
    base_type: TypeKey,
    declaring_type: TypeKey,
    declaring_method: String,
    is_static: bool,
    qualifiers: QualifierSet,
}

impl AnnotatedParameter {
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn declaring_method(&self) -> &str {
        &self.declaring_method
    }
}

impl AnnotatedMember for AnnotatedParameter {
    fn kind(&self) -> MemberKind {
        MemberKind::Parameter
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn base_type(&self) -> TypeKey {
        self.base_type
    }

    fn declaring_type(&self) -> TypeKey {
        self.declaring_type
    }

    fn is_static(&self) -> bool {
        self.is_static
    }

    fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }
}

impl Display for AnnotatedParameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "parameter {} of {}::{}()",
            self.position, self.declaring_type, self.declaring_method
        )
    }
}

/// Decides whether a bean type can be injected where another type is required. Identity is the
/// only built-in rule, since Rust has no runtime subtyping; custom rules can map e.g. wrapper types
/// onto each other.
#[cfg_attr(test, automock)]
pub trait TypeAssignability {
    fn is_assignable(&self, required: &TypeKey, provided: &TypeKey) -> bool;
}

#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
pub struct ExactTypeAssignability;

impl TypeAssignability for ExactTypeAssignability {
    #[inline]
    fn is_assignable(&self, required: &TypeKey, provided: &TypeKey) -> bool {
        required == provided
    }
}
