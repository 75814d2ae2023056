#[cfg(feature = "threadsafe")]
mod bean_manager_test {
    use contexture_di::annotated::{AnnotatedField, AnnotatedMethod};
    use contexture_di::bean::{BeanDescriptor, BeanType, Qualifier, QualifierSet};
    use contexture_di::bean_alias;
    use contexture_di::bootstrap::BeanManagerBuilder;
    use contexture_di::creational::CreationalContext;
    use contexture_di::error::{InstanceProviderError, ResolutionError};
    use contexture_di::instance_provider::{
        construction_error, into_instance, AnyInstancePtr, InstanceProvider, InstancePtr,
        TypedInstanceProvider,
    };
    use contexture_di::manager::BeanManager;
    use contexture_di::resolver::ResolutionQuery;
    use contexture_di::scope::{ActivatableContext, Context, APPLICATION, SESSION};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier, Mutex};
    use std::thread;

    trait Greeter {
        fn greet(&self) -> String;
    }

    struct English;

    struct Polish;

    impl Greeter for English {
        fn greet(&self) -> String {
            "Hello".to_string()
        }
    }

    impl Greeter for Polish {
        fn greet(&self) -> String {
            "Cześć".to_string()
        }
    }

    bean_alias!(dyn Greeter + Send + Sync => English);
    bean_alias!(dyn Greeter + Send + Sync => Polish);

    type GreeterPtr = dyn Greeter + Send + Sync;

    struct Port(u16);

    /// Declares the `Port` producer and injects that port back into itself.
    struct Server {
        base: u16,
        port: Mutex<Option<InstancePtr<Port>>>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("backend unavailable")]
    struct BackendUnavailable;

    struct Backend;

    struct Frontend {
        _backend: InstancePtr<Backend>,
    }

    static SLOW_CREATED: AtomicUsize = AtomicUsize::new(0);
    static PORTS_RELEASED: AtomicUsize = AtomicUsize::new(0);

    fn english(
        _instance_provider: &mut dyn InstanceProvider,
    ) -> Result<AnyInstancePtr, InstanceProviderError> {
        Ok(into_instance(English))
    }

    fn polish(
        _instance_provider: &mut dyn InstanceProvider,
    ) -> Result<AnyInstancePtr, InstanceProviderError> {
        Ok(into_instance(Polish))
    }

    fn server(
        _instance_provider: &mut dyn InstanceProvider,
    ) -> Result<AnyInstancePtr, InstanceProviderError> {
        Ok(into_instance(Server {
            base: 8000,
            port: Mutex::new(None),
        }))
    }

    fn init_server(
        instance: &AnyInstancePtr,
        instance_provider: &mut dyn InstanceProvider,
    ) -> Result<(), InstanceProviderError> {
        let port = instance_provider.instance_typed::<Port>()?;
        if let Some(server) = instance.downcast_ref::<Server>() {
            *server.port.lock().unwrap() = Some(port);
        }
        Ok(())
    }

    fn port(
        receiver: Option<&AnyInstancePtr>,
        _instance_provider: &mut dyn InstanceProvider,
    ) -> Result<AnyInstancePtr, InstanceProviderError> {
        let server = receiver
            .and_then(|receiver| receiver.downcast_ref::<Server>())
            .ok_or(InstanceProviderError::IncompatibleBean(
                contexture_di::annotated::TypeKey::of::<Server>(),
            ))?;

        Ok(into_instance(Port(server.base + 80)))
    }

    fn release_port(_instance: AnyInstancePtr) {
        PORTS_RELEASED.fetch_add(1, Ordering::SeqCst);
    }

    fn slow(
        _instance_provider: &mut dyn InstanceProvider,
    ) -> Result<AnyInstancePtr, InstanceProviderError> {
        SLOW_CREATED.fetch_add(1, Ordering::SeqCst);
        thread::sleep(std::time::Duration::from_millis(20));
        Ok(into_instance(1u64))
    }

    fn backend(
        _instance_provider: &mut dyn InstanceProvider,
    ) -> Result<AnyInstancePtr, InstanceProviderError> {
        Err(construction_error(BackendUnavailable))
    }

    fn frontend(
        instance_provider: &mut dyn InstanceProvider,
    ) -> Result<AnyInstancePtr, InstanceProviderError> {
        Ok(into_instance(Frontend {
            _backend: instance_provider.instance_typed()?,
        }))
    }

    fn server_bean() -> BeanDescriptor {
        BeanDescriptor::managed::<Server>(server)
            .with_initializer(init_server)
            .build()
            .unwrap()
    }

    fn plain_server_bean() -> BeanDescriptor {
        BeanDescriptor::managed::<Server>(server).build().unwrap()
    }

    fn port_bean(server: &BeanDescriptor) -> BeanDescriptor {
        BeanDescriptor::producer_method::<Port>(
            AnnotatedMethod::new::<Server, Port>("port"),
            server.id().clone(),
            port,
        )
        .build()
        .unwrap()
    }

    fn greeters() -> Vec<BeanDescriptor> {
        vec![
            BeanDescriptor::managed::<English>(english)
                .with_type(BeanType::alias::<GreeterPtr, English>())
                .build()
                .unwrap(),
            BeanDescriptor::managed::<Polish>(polish)
                .with_type(BeanType::alias::<GreeterPtr, Polish>())
                .with_qualifier(Qualifier::new("Local"))
                .with_name("polish")
                .build()
                .unwrap(),
        ]
    }

    #[test]
    fn should_complete_circular_producer_graph() {
        let server = server_bean();
        let manager = BeanManagerBuilder::new()
            .with_bean(port_bean(&server))
            .with_bean(server.clone())
            .build()
            .unwrap();

        let mut context = CreationalContext::new();
        let instance = manager
            .reference_typed::<Server>(QualifierSet::default(), &mut context)
            .unwrap();

        let port = instance.port.lock().unwrap().clone().unwrap();
        assert_eq!(port.0, 8080);
        assert!(!context.has_incomplete_instances());

        let substitutions = context.substitutions();
        assert_eq!(substitutions.len(), 1);
        assert_eq!(&substitutions[0].substituted, server.id());
        assert!(substitutions[0].dependent.contains("port"));
    }

    #[test]
    fn should_create_receiver_for_producer() {
        let server = plain_server_bean();
        let manager = BeanManagerBuilder::new()
            .with_bean(server.clone())
            .with_bean(port_bean(&server))
            .build()
            .unwrap();

        let mut context = CreationalContext::new();
        let port = manager
            .reference_typed::<Port>(QualifierSet::default(), &mut context)
            .unwrap();

        assert_eq!(port.0, 8080);
        assert!(context.substitutions().is_empty());
    }

    #[test]
    fn should_reject_cycle_entered_through_producer() {
        let server = server_bean();
        let port = port_bean(&server);
        let manager = BeanManagerBuilder::new()
            .with_bean(server)
            .with_bean(port.clone())
            .build()
            .unwrap();

        // the server is created as the receiver and asks for the port which isn't constructed yet
        let mut context = CreationalContext::new();
        assert!(matches!(
            manager.reference_typed::<Port>(QualifierSet::default(), &mut context),
            Err(InstanceProviderError::UnresolvableCircularDependency(bean)) if bean == *port.id()
        ));
        assert!(!context.has_incomplete_instances());
    }

    #[test]
    fn should_hide_vetoed_producer() {
        let server = server_bean();
        let manager = BeanManagerBuilder::new()
            .with_bean(server.clone())
            .with_bean(port_bean(&server))
            .with_producer_observer::<Port, _>(|event| event.veto())
            .build()
            .unwrap();

        assert!(matches!(
            manager.resolve(&ResolutionQuery::of::<Port>()),
            Err(ResolutionError::Unsatisfied { .. })
        ));

        // the server itself can't be initialized without the port
        assert!(manager
            .reference_typed::<Server>(QualifierSet::default(), &mut CreationalContext::new())
            .is_err());
    }

    #[test]
    fn should_hide_producer_of_disabled_alternative() {
        let alternative_server = BeanDescriptor::managed::<Server>(server)
            .alternative()
            .build()
            .unwrap();
        let observed = Arc::new(AtomicUsize::new(0));
        let observer_observed = observed.clone();

        let manager = BeanManagerBuilder::new()
            .with_bean(alternative_server.clone())
            .with_bean(port_bean(&alternative_server))
            .with_observer(move |_| {
                observer_observed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
            .unwrap();

        assert_eq!(observed.load(Ordering::SeqCst), 0);
        assert!(matches!(
            manager.resolve(&ResolutionQuery::of::<Port>()),
            Err(ResolutionError::Unsatisfied { .. })
        ));
        assert!(matches!(
            manager.reference_typed::<Port>(QualifierSet::default(), &mut CreationalContext::new()),
            Err(InstanceProviderError::Resolution(
                ResolutionError::Unsatisfied { .. }
            ))
        ));
    }

    #[test]
    fn should_expose_producer_of_enabled_alternative() {
        let alternative_server = BeanDescriptor::managed::<Server>(server)
            .alternative()
            .build()
            .unwrap();
        let observed = Arc::new(AtomicUsize::new(0));
        let observer_observed = observed.clone();

        let manager = BeanManagerBuilder::new()
            .with_bean(alternative_server.clone())
            .with_bean(port_bean(&alternative_server))
            .with_enabled_alternative(alternative_server.id().clone(), None)
            .with_observer(move |_| {
                observer_observed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
            .unwrap();

        assert_eq!(observed.load(Ordering::SeqCst), 1);
        let port = manager
            .reference_typed::<Port>(QualifierSet::default(), &mut CreationalContext::new())
            .unwrap();
        assert_eq!(port.0, 8080);
    }

    #[test]
    fn should_inject_trait_objects() {
        let manager = BeanManagerBuilder::new()
            .with_beans(greeters())
            .build()
            .unwrap();

        let mut context = CreationalContext::new();
        let mut instance_provider = manager.instance_provider(&mut context);

        assert_eq!(
            instance_provider
                .instance_typed::<GreeterPtr>()
                .unwrap()
                .greet(),
            "Hello"
        );
        assert_eq!(
            instance_provider
                .instance_qualified_typed::<GreeterPtr>(
                    [Qualifier::new("Local")].into_iter().collect()
                )
                .unwrap()
                .greet(),
            "Cześć"
        );
        assert_eq!(
            instance_provider
                .instance_by_name_typed::<GreeterPtr>("polish")
                .unwrap()
                .greet(),
            "Cześć"
        );
        assert_eq!(
            instance_provider
                .instances_typed::<GreeterPtr>()
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn should_inject_from_annotated_member() {
        struct Consumer;

        let manager = BeanManagerBuilder::new()
            .with_beans(greeters())
            .build()
            .unwrap();

        let member = AnnotatedField::new::<Consumer, GreeterPtr>("greeter")
            .with_qualifier(Qualifier::new("Local"));
        let mut context = CreationalContext::new();

        let greeter = manager
            .instance_provider(&mut context)
            .inject_typed::<GreeterPtr>(&member)
            .unwrap();
        assert_eq!(greeter.greet(), "Cześć");
    }

    #[test]
    fn should_create_application_instance_once_across_threads() {
        let manager = Arc::new(
            BeanManagerBuilder::new()
                .with_bean(
                    BeanDescriptor::managed::<u64>(slow)
                        .with_scope(APPLICATION)
                        .build()
                        .unwrap(),
                )
                .build()
                .unwrap(),
        );

        let barrier = Arc::new(Barrier::new(4));
        let handles = (0..4)
            .map(|_| {
                let manager = manager.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    manager
                        .reference_typed::<u64>(QualifierSet::default(), &mut CreationalContext::new())
                        .unwrap()
                })
            })
            .collect::<Vec<_>>();

        let instances = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>();

        assert_eq!(SLOW_CREATED.load(Ordering::SeqCst), 1);
        assert!(instances
            .windows(2)
            .all(|pair| InstancePtr::ptr_eq(&pair[0], &pair[1])));
    }

    #[test]
    fn should_keep_session_instances_per_activation() {
        let session = InstancePtr::new(ActivatableContext::session());
        let manager = BeanManagerBuilder::new()
            .with_bean(
                BeanDescriptor::managed::<English>(english)
                    .with_scope(SESSION)
                    .build()
                    .unwrap(),
            )
            .with_context(session.clone())
            .build()
            .unwrap();

        let get = |manager: &BeanManager| {
            manager.reference_typed::<English>(QualifierSet::default(), &mut CreationalContext::new())
        };

        assert!(matches!(
            get(&manager),
            Err(InstanceProviderError::ContextNotActive(_))
        ));

        session.activate();
        let first = get(&manager).unwrap();
        let second = get(&manager).unwrap();
        assert!(InstancePtr::ptr_eq(&first, &second));

        session.deactivate();
        session.activate();
        let third = get(&manager).unwrap();
        assert!(!InstancePtr::ptr_eq(&first, &third));
    }

    #[test]
    fn should_dispose_produced_instances() {
        let server = plain_server_bean();
        let disposer = AnnotatedMethod::new::<Server, ()>("release")
            .with_parameter::<Port>(QualifierSet::default());
        let port = BeanDescriptor::producer_method::<Port>(
            AnnotatedMethod::new::<Server, Port>("port"),
            server.id().clone(),
            port,
        )
        .with_scope(APPLICATION)
        .with_disposer(disposer.parameters()[0].clone(), release_port)
        .build()
        .unwrap();

        let manager = BeanManagerBuilder::new()
            .with_bean(server)
            .with_bean(port.clone())
            .build()
            .unwrap();

        manager
            .reference_typed::<Port>(QualifierSet::default(), &mut CreationalContext::new())
            .unwrap();
        manager.destroy(manager.bean(port.id()).unwrap()).unwrap();

        assert_eq!(PORTS_RELEASED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn should_not_leak_partial_state_after_dependency_failure() {
        let manager = BeanManagerBuilder::new()
            .with_bean(BeanDescriptor::managed::<Backend>(backend).build().unwrap())
            .with_bean(
                BeanDescriptor::managed::<Frontend>(frontend)
                    .with_scope(APPLICATION)
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();

        let mut context = CreationalContext::new();
        assert!(matches!(
            manager.reference_typed::<Frontend>(QualifierSet::default(), &mut context),
            Err(InstanceProviderError::ConstructionError(_))
        ));

        let frontend = manager.resolve(&ResolutionQuery::of::<Frontend>()).unwrap();
        let backend = manager.resolve(&ResolutionQuery::of::<Backend>()).unwrap();
        assert!(!context.is_incomplete(frontend.id()));
        assert!(!context.is_incomplete(backend.id()));
        let application = manager.context(APPLICATION).unwrap();
        assert!(Context::get(&**application, frontend, None)
            .unwrap()
            .is_none());
    }
}
