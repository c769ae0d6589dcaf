mod common;

use common::{Logger, Mailer, Node, Transport};
use container::{
    Argument, ContainerBuilder, ContainerError, ContainerResult, Definition, Factory,
    InvalidBehavior, Reference, ServiceLocator,
};
use serde_json::json;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

fn mailer_builder() -> ContainerResult<ContainerBuilder> {
    let mut builder = common::builder()?;
    builder.set_parameter("transport.dsn", "smtp://localhost")?;
    builder
        .register("transport", Some("Transport"))?
        .add_argument(Argument::parameter("transport.dsn"));
    builder
        .register("logger", Some("Logger"))?
        .add_argument("mail");
    builder
        .register("mailer", Some("Mailer"))?
        .add_argument(Argument::reference("transport"))
        .add_method_call("set_logger", vec![Argument::reference("logger")]);
    Ok(builder)
}

#[test]
fn test_shared_services_are_identical() -> ContainerResult<()> {
    let mut builder = mailer_builder()?;
    builder.compile()?;

    let first = builder.get_typed::<Mailer>("mailer")?;
    let second = builder.get_typed::<Mailer>("mailer")?;
    assert!(Arc::ptr_eq(&first, &second));

    // The injected transport is the shared one
    let transport = builder.get_typed::<Transport>("transport")?;
    assert!(Arc::ptr_eq(&first.transport, &transport));
    assert_eq!(transport.dsn, "smtp://localhost");

    let logger = first.logger.as_ref().map(|logger| logger.channel.as_str());
    assert_eq!(logger, Some("mail"));
    Ok(())
}

#[test]
fn test_non_shared_services_are_distinct() -> ContainerResult<()> {
    let mut builder = mailer_builder()?;
    builder.get_definition_mut("mailer")?.set_shared(false);
    builder.compile()?;

    let first = builder.get_typed::<Mailer>("mailer")?;
    let second = builder.get_typed::<Mailer>("mailer")?;
    assert!(!Arc::ptr_eq(&first, &second));
    // Dependencies stay shared
    assert!(Arc::ptr_eq(&first.transport, &second.transport));
    assert_eq!(first.transport.dsn, second.transport.dsn);
    Ok(())
}

#[test]
fn test_circular_dependency_at_runtime() -> ContainerResult<()> {
    let mut builder = common::builder()?;
    builder
        .register("a", Some("Node"))?
        .add_argument(Argument::reference("b"));
    builder
        .register("b", Some("Node"))?
        .add_argument(Argument::reference("a"));

    match builder.get("a") {
        Err(ContainerError::CircularDependency { path }) => assert_eq!(path, vec!["a", "b", "a"]),
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }

    // Loading state was cleaned up: the same error again, not a different one
    assert!(matches!(
        builder.get("b"),
        Err(ContainerError::CircularDependency { .. })
    ));
    assert!(builder.container().loading().is_empty());
    Ok(())
}

#[test]
fn test_circular_dependency_at_compile_time() -> ContainerResult<()> {
    let mut builder = common::builder()?;
    builder
        .register("a", Some("Node"))?
        .add_argument(Argument::reference("b"));
    builder
        .register("b", Some("Node"))?
        .add_argument(Argument::reference("c"));
    builder
        .register("c", Some("Node"))?
        .add_method_call("attach", vec![Argument::reference("a")]);

    match builder.compile() {
        Err(ContainerError::CircularDependency { path }) => {
            assert_eq!(path, vec!["a", "b", "c", "a"]);
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!builder.is_compiled());
    Ok(())
}

#[test]
fn test_lazy_reference_breaks_cycle() -> ContainerResult<()> {
    let mut builder = common::builder()?;
    builder
        .register("a", Some("Node"))?
        .add_argument(Argument::reference("b"));
    builder
        .register("b", Some("Node"))?
        .add_argument(Argument::reference("a"))
        .set_lazy(true);
    builder.compile()?;

    let a = builder.get_typed::<Node>("a")?;
    let proxy = a.args.lazy(0)?;
    assert_eq!(proxy.id(), "b");
    assert!(!proxy.is_initialized());

    let b = proxy.get_typed::<Node>()?;
    assert!(proxy.is_initialized());
    assert!(Arc::ptr_eq(&b, &builder.get_typed::<Node>("b")?));

    // b received the real, already constructed a
    let a_from_b = b.args.service::<Node>(0)?;
    assert!(Arc::ptr_eq(&a, &a_from_b));
    Ok(())
}

#[test]
fn test_compile_is_idempotent() -> ContainerResult<()> {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut builder = mailer_builder()?;

    let counter = Arc::clone(&runs);
    builder.add_compiler_pass(move |builder: &mut ContainerBuilder| -> ContainerResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        builder.get_definition_mut("transport")?.replace_argument(0, "smtp://relay")?;
        Ok(())
    })?;

    builder.compile()?;
    builder.compile()?;

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(builder.get_typed::<Transport>("transport")?.dsn, "smtp://relay");
    Ok(())
}

#[test]
fn test_passes_run_in_registration_order() -> ContainerResult<()> {
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let mut builder = ContainerBuilder::new();

    for name in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        builder.add_compiler_pass(move |_: &mut ContainerBuilder| -> ContainerResult<()> {
            order.lock().push(name);
            Ok(())
        })?;
    }
    builder.compile()?;

    assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    Ok(())
}

#[test]
fn test_mutations_are_frozen_only_after_compile() -> ContainerResult<()> {
    let mut builder = mailer_builder()?;

    builder.register("extra", Some("Logger"))?;
    builder.set_definition("extra2", Definition::of("Logger"))?;
    builder.set_alias("mail", "mailer")?;
    builder.add_compiler_pass(|_: &mut ContainerBuilder| -> ContainerResult<()> { Ok(()) })?;
    builder.remove_definition("extra2")?;

    builder.compile()?;

    let frozen = |result: ContainerResult<()>| matches!(result, Err(ContainerError::Frozen { .. }));
    assert!(frozen(builder.register("x", None).map(|_| ())));
    assert!(frozen(builder.set_definition("x", Definition::new()).map(|_| ())));
    assert!(frozen(builder.set_alias("y", "mailer")));
    assert!(frozen(builder.add_compiler_pass(
        |_: &mut ContainerBuilder| -> ContainerResult<()> { Ok(()) }
    )));
    assert!(frozen(builder.remove_definition("extra").map(|_| ())));
    assert!(frozen(builder.set_parameter("late", 1)));
    Ok(())
}

#[test]
fn test_parameters_are_substituted_recursively() -> ContainerResult<()> {
    let mut builder = ContainerBuilder::new();
    builder.set_parameter("a", "%b%")?;
    builder.set_parameter("b", "x")?;
    builder.set_parameter("url", "https://%host%:%port%/%%")?;
    builder.set_parameter("host", "%b%.example.com")?;
    builder.set_parameter("port", 8080)?;
    builder.set_parameter("hosts", json!(["%host%", "backup"]))?;

    assert_eq!(builder.get_parameter("a")?, json!("x"));
    assert_eq!(builder.get_parameter("url")?, json!("https://x.example.com:8080/%"));
    assert_eq!(builder.get_parameter("hosts")?, json!(["x.example.com", "backup"]));
    assert!(matches!(
        builder.get_parameter("missing"),
        Err(ContainerError::ParameterNotFound { .. })
    ));
    Ok(())
}

#[test]
fn test_alias_resolves_to_same_instance() -> ContainerResult<()> {
    let mut builder = mailer_builder()?;
    builder.set_alias("TransportInterface", "transport")?;
    builder.compile()?;

    let via_alias = builder.get("TransportInterface")?;
    let direct = builder.get("transport")?;
    assert!(Arc::ptr_eq(&via_alias, &direct));
    assert!(builder.has("TransportInterface"));
    Ok(())
}

#[test]
fn test_private_services_are_reachable_only_through_references() -> ContainerResult<()> {
    let mut builder = mailer_builder()?;
    builder.get_definition_mut("transport")?.set_public(false);
    builder.compile()?;

    assert!(!builder.has("transport"));
    let error = builder.get("transport").err().map(|error| error.to_string());
    assert_eq!(
        error.as_deref(),
        Some("You have requested a private service \"transport\"")
    );

    let mailer = builder.get_typed::<Mailer>("mailer")?;
    assert_eq!(mailer.transport.dsn, "smtp://localhost");
    Ok(())
}

#[test]
fn test_missing_reference_names_the_consumer() -> ContainerResult<()> {
    let mut builder = mailer_builder()?;
    builder.remove_definition("transport")?;

    let error = builder.compile().err();
    assert_eq!(
        error,
        Some(ContainerError::ServiceNotFound {
            id: "transport".into(),
            referenced_by: Some("mailer".into()),
            private: false,
        })
    );
    Ok(())
}

#[test]
fn test_invalid_reference_behaviors() -> ContainerResult<()> {
    let mut builder = common::builder()?;
    builder
        .register("transport", Some("Transport"))?
        .add_argument("null://");
    builder
        .register("quiet_mailer", Some("Mailer"))?
        .add_argument(Argument::reference("transport"))
        .add_method_call(
            "set_logger",
            vec![Argument::Reference(Reference::ignore_on_missing("logger"))],
        );
    builder
        .register("null_mailer", Some("Mailer"))?
        .add_argument(Argument::reference("transport"))
        .add_method_call(
            "set_logger",
            vec![Argument::Reference(Reference::optional("logger"))],
        );
    builder.compile()?;

    // Ignore drops the whole call, null still performs it
    let quiet = builder.get_typed::<Mailer>("quiet_mailer")?;
    assert_eq!(quiet.logger_calls, 0);
    let null = builder.get_typed::<Mailer>("null_mailer")?;
    assert_eq!(null.logger_calls, 1);
    assert!(null.logger.is_none());

    assert!(builder.get_with("logger", InvalidBehavior::Null)?.is_none());
    assert!(builder.get_with("logger", InvalidBehavior::Raise).is_err());
    Ok(())
}

#[test]
fn test_synthetic_and_abstract_errors_differ() -> ContainerResult<()> {
    let mut builder = common::builder()?;
    builder.register("request", None)?.set_synthetic(true);
    builder.register("base", Some("Logger"))?.set_abstract(true);
    builder.compile()?;

    let synthetic = builder.get("request").err().map(|e| e.to_string()).unwrap_or_default();
    let abstract_ = builder.get("base").err().map(|e| e.to_string()).unwrap_or_default();
    assert!(synthetic.contains("must be set at runtime"));
    assert!(abstract_.contains("cannot be instantiated"));

    builder.set("request", Arc::new(Logger { channel: "request".into() }))?;
    assert_eq!(builder.get_typed::<Logger>("request")?.channel, "request");
    Ok(())
}

#[test]
fn test_child_definitions_inherit_from_parent() -> ContainerResult<()> {
    let mut builder = common::builder()?;
    builder
        .register("transport.base", Some("Transport"))?
        .add_argument("smtp://default")
        .set_shared(false)
        .set_abstract(true);

    let mut child = Definition::child("transport.base");
    child.replace_argument(0, "smtp://mail.example.com")?;
    builder.set_definition("transport", child)?;
    builder.compile()?;

    let first = builder.get_typed::<Transport>("transport")?;
    let second = builder.get_typed::<Transport>("transport")?;
    assert_eq!(first.dsn, "smtp://mail.example.com");
    // shared = false is inherited
    assert!(!Arc::ptr_eq(&first, &second));

    let resolved = builder.get_definition("transport")?;
    assert!(resolved.parent().is_none());
    assert_eq!(resolved.class(), Some("Transport"));
    Ok(())
}

#[test]
fn test_factories() -> ContainerResult<()> {
    let mut builder = common::builder()?;
    builder
        .register("env_transport", None)?
        .set_factory(Factory::static_method("Transport", "from_env"))
        .add_argument("MAILER_DSN");
    builder
        .register("closure_transport", None)?
        .set_factory(Factory::closure(|args| {
            Ok(Transport {
                dsn: format!("closure:{}", args.len()),
            })
        }));
    builder.compile()?;

    assert_eq!(builder.get_typed::<Transport>("env_transport")?.dsn, "env:MAILER_DSN");
    assert_eq!(builder.get_typed::<Transport>("closure_transport")?.dsn, "closure:0");
    Ok(())
}

#[test]
fn test_stats_and_dependency_report() -> ContainerResult<()> {
    let mut builder = mailer_builder()?;
    builder.compile()?;
    builder.get("mailer")?;
    builder.get("mailer")?;

    let stats = builder.stats();
    assert_eq!(stats.definitions, 3);
    assert_eq!(stats.constructions, 3);
    assert!(stats.cache_hits >= 1);

    let report = builder.dependency_report();
    assert!(report.contains("Total services: 3"));
    assert!(report.contains("Most dependent service: mailer"));
    Ok(())
}

#[test]
fn test_compile_retry_runs_remaining_passes() -> ContainerResult<()> {
    let before = Arc::new(AtomicUsize::new(0));
    let after = Arc::new(AtomicUsize::new(0));
    let mut builder = ContainerBuilder::new();

    let runs = Arc::clone(&before);
    builder.add_compiler_pass(move |_: &mut ContainerBuilder| -> ContainerResult<()> {
        runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })?;
    builder.add_compiler_pass(|_: &mut ContainerBuilder| -> ContainerResult<()> {
        Err(ContainerError::configuration("broken pass", None::<String>))
    })?;
    let runs = Arc::clone(&after);
    builder.add_compiler_pass(move |_: &mut ContainerBuilder| -> ContainerResult<()> {
        runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })?;

    assert!(builder.compile().is_err());
    assert!(!builder.is_compiled());
    assert_eq!(after.load(Ordering::SeqCst), 0);

    builder.compile()?;
    assert!(builder.is_compiled());
    assert_eq!(before.load(Ordering::SeqCst), 1);
    assert_eq!(after.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn test_lazy_proxy_fails_while_definition_is_borrowed() -> ContainerResult<()> {
    let mut builder = common::builder()?;
    builder
        .register("a", Some("Node"))?
        .add_argument(Argument::reference("b"));
    builder.register("b", Some("Node"))?.set_lazy(true);

    let a = builder.get_typed::<Node>("a")?;
    let proxy = a.args.lazy(0)?;
    {
        let _definition = builder.get_definition_mut("a")?;
        assert!(matches!(
            proxy.get(),
            Err(ContainerError::Configuration { .. })
        ));
        assert!(!proxy.is_initialized());
    }

    proxy.get_typed::<Node>()?;
    assert!(proxy.is_initialized());
    Ok(())
}
