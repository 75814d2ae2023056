use crate::bean::BeanDescriptor;
use crate::creational::{CreationalContext, Incomplete};
use crate::error::InstanceProviderError;
use crate::instance_provider::AnyInstancePtr;
use crate::manager::BeanManager;

impl BeanManager {
    /// Returns the instance a producer is invoked on: `None` for static producers and managed
    /// beans, an incomplete instance of the declaring bean if it's currently being constructed,
    /// or a direct reference to the declaring bean otherwise.
    ///
    /// The reference is requested with `delegate_allowed` unset, so a normal-scoped declaring bean
    /// yields its contextual instance instead of a client proxy. Producer functions downcast the
    /// receiver to the declaring type, which a proxy wouldn't survive.
    pub fn receiver(
        &self,
        producer: &BeanDescriptor,
        creational_context: &mut CreationalContext<'_>,
    ) -> Result<Option<AnyInstancePtr>, InstanceProviderError> {
        let Some(declaring_bean) = producer.declaring_bean() else {
            return Ok(None);
        };

        if producer.is_static() {
            return Ok(None);
        }

        if let Some(Incomplete::Partial(instance)) =
            creational_context.incomplete_instance(declaring_bean).cloned()
        {
            let dependent = producer
                .producer_member()
                .map(|member| member.to_string())
                .unwrap_or_else(|| producer.id().to_string());

            creational_context.record_substitution(dependent, declaring_bean.clone());
            return Ok(Some(instance));
        }

        let declaring = self
            .bean(declaring_bean)
            .ok_or_else(|| InstanceProviderError::UnknownBean(declaring_bean.clone()))?;

        self.get_reference(declaring, creational_context, false)
            .map(Some)
    }
}
