use std::sync::Arc;

use cask_core::{
    Container, ContextualImpl, DescriptorRegistry, Error, MethodDescriptor, Overrides,
    ParameterDescriptor, TypeDescriptor, arg, downcast, to_instance,
};

struct ReportService {
    prefix: String,
}

fn registry() -> Arc<DescriptorRegistry> {
    let registry = Arc::new(DescriptorRegistry::new());

    registry.register(
        TypeDescriptor::new("ReportService").constructor(|_| {
            Ok(to_instance(ReportService {
                prefix: "report".to_string(),
            }))
        }),
    );
    registry.register_method(
        MethodDescriptor::new("ReportService", "generate", |receiver, args| {
            let service = receiver
                .as_ref()
                .and_then(downcast::<ReportService>)
                .ok_or_else(|| Error::Downcast {
                    id: "ReportService".to_string(),
                    expected: "ReportService".to_string(),
                })?;
            let format = arg::<String>(&args, 0)?;
            Ok(to_instance(format!("{}.{}", service.prefix, format)))
        })
        .parameter(ParameterDescriptor::primitive("format").default_value("pdf".to_string())),
    );
    registry.register_method(
        MethodDescriptor::new("ReportService", "version", |_, _| {
            Ok(to_instance("v1".to_string()))
        })
        .static_method(),
    );

    registry
}

#[test]
fn test_call_injects_declared_parameters_with_defaults() {
    let container = Container::with_introspector(registry());

    let result = container
        .call("ReportService@generate", Overrides::new(), None)
        .unwrap();
    assert_eq!(*downcast::<String>(&result).unwrap(), "report.pdf");
}

#[test]
fn test_call_overrides_win_by_parameter_name() {
    let container = Container::with_introspector(registry());

    let result = container
        .call(
            "ReportService@generate",
            Overrides::new().with("format", "csv".to_string()),
            None,
        )
        .unwrap();
    assert_eq!(*downcast::<String>(&result).unwrap(), "report.csv");
}

#[test]
fn test_call_applies_contextual_primitives_for_the_class() {
    let container = Container::with_introspector(registry());

    // The class joins the build stack for the call, so its contextual
    // bindings apply to method parameters exactly as to constructors.
    container
        .when("ReportService")
        .needs("$format")
        .give(ContextualImpl::value("xml".to_string()));

    let result = container
        .call("ReportService@generate", Overrides::new(), None)
        .unwrap();
    assert_eq!(*downcast::<String>(&result).unwrap(), "report.xml");
}

#[test]
fn test_call_uses_default_method_when_target_has_no_method() {
    let container = Container::with_introspector(registry());

    let result = container
        .call("ReportService", Overrides::new(), Some("generate"))
        .unwrap();
    assert_eq!(*downcast::<String>(&result).unwrap(), "report.pdf");
}

#[test]
fn test_call_without_method_fails() {
    let container = Container::with_introspector(registry());

    let error = container
        .call("ReportService", Overrides::new(), None)
        .unwrap_err();
    assert!(matches!(error, Error::MethodNotProvided { .. }));
}

#[test]
fn test_call_unknown_method_fails() {
    let container = Container::with_introspector(registry());

    let error = container
        .call("ReportService@missing", Overrides::new(), None)
        .unwrap_err();
    assert!(matches!(error, Error::MethodNotFound { .. }));
}

#[test]
fn test_static_methods_skip_the_receiver() {
    let registry = Arc::new(DescriptorRegistry::new());
    // No type descriptor at all: a static method never resolves a receiver.
    registry.register_method(
        MethodDescriptor::new("ReportService", "version", |receiver, _| {
            assert!(receiver.is_none());
            Ok(to_instance("v1".to_string()))
        })
        .static_method(),
    );
    let container = Container::with_introspector(registry);

    let result = container
        .call("ReportService@version", Overrides::new(), None)
        .unwrap();
    assert_eq!(*downcast::<String>(&result).unwrap(), "v1");
}

#[test]
fn test_method_bindings_short_circuit_descriptor_dispatch() {
    let container = Container::with_introspector(registry());

    container.bind_method("ReportService", "generate", |receiver, _| {
        let service = downcast::<ReportService>(&receiver).ok_or_else(|| Error::Downcast {
            id: "ReportService".to_string(),
            expected: "ReportService".to_string(),
        })?;
        Ok(to_instance(format!("{}.bound", service.prefix)))
    });

    assert!(container.has_method_binding("ReportService@generate"));

    let result = container
        .call("ReportService@generate", Overrides::new(), None)
        .unwrap();
    assert_eq!(*downcast::<String>(&result).unwrap(), "report.bound");
}

#[test]
fn test_call_method_binding_directly() {
    let container = Container::new();
    container.bind_method("Job", "handle", |instance, _| {
        let payload = downcast::<String>(&instance).ok_or_else(|| Error::Downcast {
            id: "Job".to_string(),
            expected: "String".to_string(),
        })?;
        Ok(to_instance(format!("handled {payload}")))
    });

    let result = container
        .call_method_binding("Job@handle", to_instance("sync".to_string()))
        .unwrap();
    assert_eq!(*downcast::<String>(&result).unwrap(), "handled sync");
}

#[test]
fn test_wrap_defers_the_call() {
    let container = Container::with_introspector(registry());

    let thunk = container.wrap(
        "ReportService@generate",
        Overrides::new().with("format", "csv".to_string()),
    );

    let result = thunk().unwrap();
    assert_eq!(*downcast::<String>(&result).unwrap(), "report.csv");
}

#[test]
fn test_factory_returns_a_resolution_thunk() {
    let container = Container::with_introspector(registry());

    let thunk = container.factory("ReportService");
    let first = thunk().unwrap();
    let second = thunk().unwrap();

    assert!(downcast::<ReportService>(&first).is_some());
    // Non-shared: each invocation resolves a fresh instance.
    assert!(!Arc::ptr_eq(&first, &second));
}
