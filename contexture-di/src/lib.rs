//! Contextual dependency injection core.
//!
//! Beans are injectable component definitions described by [BeanDescriptor](bean::BeanDescriptor)s:
//! the types they satisfy, qualifiers discriminating them, the scope governing their instances
//! and the way instances are created. Beans are either managed (created by a constructor) or
//! producers, whose instances are obtained from a field or method of another bean - the declaring
//! bean.
//!
//! A [BeanManagerBuilder](bootstrap::BeanManagerBuilder) validates bean definitions, lets
//! observers veto producer beans and creates a [BeanManager](manager::BeanManager), which
//! answers requests for instances: it resolves a required type with qualifiers to exactly one
//! bean and asks the [Context](scope::Context) of the bean's scope for its instance, creating one
//! if needed.
//!
//! Circular dependencies are tracked by a [CreationalContext](creational::CreationalContext)
//! spanning a single root request. A bean whose constructor finished, but whose initializer is
//! still running, can be handed to its dependents in that incomplete state, which is reported as
//! a [CircularDependencyWarning](creational::CircularDependencyWarning).
//!
//! ### Features
//!
//! * `threadsafe` - use threadsafe pointers and `Send + Sync` trait bounds

pub mod annotated;
pub mod bean;
pub mod bean_registry;
pub mod bootstrap;
pub mod creational;
pub mod error;
pub mod event;
pub mod instance_provider;
pub mod manager;
mod receiver;
pub mod resolver;
pub mod scope;
