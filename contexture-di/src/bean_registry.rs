//! Registry of bean definitions collected during bootstrap. The registry preserves registration
//! order, which is also the order producer validation events are fired in.

use crate::bean::{BeanDescriptor, BeanId, BeanKind};
use crate::error::DefinitionError;
use fxhash::FxHashMap;

#[derive(Clone, Debug, Default)]
pub struct BeanRegistry {
    beans: Vec<BeanDescriptor>,
    index: FxHashMap<BeanId, usize>,
}

impl BeanRegistry {
    /// Adds a new bean. Bean ids must be unique.
    pub fn register(&mut self, bean: BeanDescriptor) -> Result<(), DefinitionError> {
        if self.index.contains_key(bean.id()) {
            return Err(DefinitionError::DuplicateBean(bean.id().clone()));
        }

        self.index.insert(bean.id().clone(), self.beans.len());
        self.beans.push(bean);
        Ok(())
    }

    #[inline]
    pub fn bean(&self, id: &BeanId) -> Option<&BeanDescriptor> {
        self.index.get(id).map(|index| &self.beans[*index])
    }

    #[inline]
    pub fn beans(&self) -> &[BeanDescriptor] {
        &self.beans
    }

    #[inline]
    pub fn is_registered(&self, id: &BeanId) -> bool {
        self.index.contains_key(id)
    }

    /// Checks relations between beans: producers need to be declared on registered managed beans
    /// and specialized beans need to exist.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        for bean in &self.beans {
            if let Some(declaring_bean) = bean.declaring_bean() {
                match self.bean(declaring_bean).map(BeanDescriptor::kind) {
                    None => {
                        return Err(DefinitionError::MissingDeclaringBean {
                            producer: bean.id().clone(),
                            declaring_bean: declaring_bean.clone(),
                        })
                    }
                    Some(BeanKind::Managed { .. }) => {}
                    Some(_) => {
                        return Err(DefinitionError::InvalidDeclaringBean {
                            producer: bean.id().clone(),
                            declaring_bean: declaring_bean.clone(),
                        })
                    }
                }
            }

            if let Some(specialized) = bean.specializes() {
                if !self.is_registered(specialized) {
                    return Err(DefinitionError::MissingSpecializedBean {
                        bean: bean.id().clone(),
                        specialized: specialized.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Keeps only beans matching given predicate.
    pub fn retain<F: FnMut(&BeanDescriptor) -> bool>(&mut self, predicate: F) {
        self.beans.retain(predicate);
        self.index = self
            .beans
            .iter()
            .enumerate()
            .map(|(index, bean)| (bean.id().clone(), index))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use crate::annotated::AnnotatedField;
    use crate::bean::{BeanDescriptor, BeanId};
    use crate::bean_registry::BeanRegistry;
    use crate::error::{DefinitionError, InstanceProviderError};
    use crate::instance_provider::{into_instance, AnyInstancePtr, InstanceProvider};

    struct Declaring;

    fn constructor(
        _instance_provider: &mut dyn InstanceProvider,
    ) -> Result<AnyInstancePtr, InstanceProviderError> {
        Ok(into_instance(Declaring))
    }

    fn read(_receiver: Option<&AnyInstancePtr>) -> Result<AnyInstancePtr, InstanceProviderError> {
        Ok(into_instance(0i8))
    }

    fn create_bean(id: &str) -> BeanDescriptor {
        BeanDescriptor::managed::<Declaring>(constructor)
            .with_id(id)
            .build()
            .unwrap()
    }

    fn create_producer(declaring_bean: &str) -> BeanDescriptor {
        BeanDescriptor::producer_field::<i8>(
            AnnotatedField::new::<Declaring, i8>("value"),
            declaring_bean,
            read,
        )
        .build()
        .unwrap()
    }

    #[test]
    fn should_register_bean() {
        let mut registry = BeanRegistry::default();
        registry.register(create_bean("bean")).unwrap();

        assert!(registry.is_registered(&BeanId::from("bean")));
        assert_eq!(
            registry.bean(&BeanId::from("bean")).unwrap().id().as_str(),
            "bean"
        );
        assert_eq!(registry.beans().len(), 1);
    }

    #[test]
    fn should_not_register_duplicate_bean() {
        let mut registry = BeanRegistry::default();
        registry.register(create_bean("bean")).unwrap();

        assert_eq!(
            registry.register(create_bean("bean")).unwrap_err(),
            DefinitionError::DuplicateBean(BeanId::from("bean"))
        );
    }

    #[test]
    fn should_accept_producer_on_managed_bean() {
        let mut registry = BeanRegistry::default();
        registry.register(create_bean("declaring")).unwrap();
        registry.register(create_producer("declaring")).unwrap();

        assert!(registry.validate().is_ok());
    }

    #[test]
    fn should_reject_missing_declaring_bean() {
        let mut registry = BeanRegistry::default();
        registry.register(create_producer("missing")).unwrap();

        assert!(matches!(
            registry.validate().unwrap_err(),
            DefinitionError::MissingDeclaringBean { declaring_bean, .. } if declaring_bean.as_str() == "missing"
        ));
    }

    #[test]
    fn should_reject_producer_declared_on_producer() {
        let mut registry = BeanRegistry::default();
        registry.register(create_bean("declaring")).unwrap();

        let producer = create_producer("declaring");
        let nested = BeanDescriptor::producer_field::<i8>(
            AnnotatedField::new::<Declaring, i8>("nested"),
            producer.id().clone(),
            read,
        )
        .build()
        .unwrap();

        registry.register(producer).unwrap();
        registry.register(nested).unwrap();

        assert!(matches!(
            registry.validate().unwrap_err(),
            DefinitionError::InvalidDeclaringBean { .. }
        ));
    }

    #[test]
    fn should_reject_missing_specialized_bean() {
        let mut registry = BeanRegistry::default();
        registry
            .register(
                BeanDescriptor::managed::<Declaring>(constructor)
                    .specializing("missing")
                    .build()
                    .unwrap(),
            )
            .unwrap();

        assert!(matches!(
            registry.validate().unwrap_err(),
            DefinitionError::MissingSpecializedBean { .. }
        ));
    }

    #[test]
    fn should_reindex_after_retain() {
        let mut registry = BeanRegistry::default();
        registry.register(create_bean("first")).unwrap();
        registry.register(create_bean("second")).unwrap();

        registry.retain(|bean| bean.id().as_str() != "first");

        assert!(!registry.is_registered(&BeanId::from("first")));
        assert_eq!(
            registry.bean(&BeanId::from("second")).unwrap().id().as_str(),
            "second"
        );
    }
}
