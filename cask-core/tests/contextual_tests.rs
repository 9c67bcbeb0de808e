use std::sync::Arc;

use cask_core::{
    Config, Container, ContextualImpl, DescriptorRegistry, Instance, ParameterDescriptor,
    TypeDescriptor, arg, downcast, to_instance,
};
use serde_json::{Value, json};

struct SqlRepo;

struct MemRepo;

struct Controller {
    repo: Instance,
}

fn registry() -> Arc<DescriptorRegistry> {
    let registry = Arc::new(DescriptorRegistry::new());
    registry.register(TypeDescriptor::new("Repo").abstract_only());
    registry.register(
        TypeDescriptor::new("SqlRepo")
            .implements("Repo")
            .constructor(|_| Ok(to_instance(SqlRepo))),
    );
    registry.register(
        TypeDescriptor::new("MemRepo")
            .implements("Repo")
            .constructor(|_| Ok(to_instance(MemRepo))),
    );
    registry.register(
        TypeDescriptor::new("Controller")
            .parameter(ParameterDescriptor::class("repo", "Repo"))
            .constructor(|mut args| {
                Ok(to_instance(Controller {
                    repo: args.remove(0),
                }))
            }),
    );
    registry
}

#[test]
fn test_contextual_binding_overrides_default_for_one_consumer() {
    let container = Container::with_introspector(registry());
    container.bind("Repo", Some("MemRepo".into()), false).unwrap();

    container.when("Controller").needs("Repo").give("SqlRepo");

    // Inside the Controller build context the contextual concrete wins.
    let controller = container.make_as::<Controller>("Controller").unwrap();
    assert!(downcast::<SqlRepo>(&controller.repo).is_some());

    // Outside that context the default binding still applies.
    let repo = container.make("Repo").unwrap();
    assert!(downcast::<MemRepo>(&repo).is_some());
}

#[test]
fn test_contextual_binding_found_through_abstract_alias() {
    let container = Container::with_introspector(registry());
    container.bind("Repo", Some("MemRepo".into()), false).unwrap();

    // Recorded under a name that only later becomes an alias of "Repo"; the
    // lookup falls back to bindings registered under any alias.
    container.when("Controller").needs("repository").give("SqlRepo");
    container.alias("Repo", "repository").unwrap();

    let controller = container.make_as::<Controller>("Controller").unwrap();
    assert!(downcast::<SqlRepo>(&controller.repo).is_some());
}

#[test]
fn test_contextual_value_injection() {
    let container = Container::with_introspector(registry());

    container
        .when("Controller")
        .needs("Repo")
        .give(ContextualImpl::value(SqlRepo));

    let controller = container.make_as::<Controller>("Controller").unwrap();
    assert!(downcast::<SqlRepo>(&controller.repo).is_some());
}

#[test]
fn test_contextual_primitive_by_parameter_name() {
    let registry = Arc::new(DescriptorRegistry::new());
    registry.register(
        TypeDescriptor::new("Mailer")
            .parameter(ParameterDescriptor::primitive("host"))
            .constructor(|args| {
                let host = arg::<String>(&args, 0)?;
                Ok(to_instance((*host).clone()))
            }),
    );
    let container = Container::with_introspector(registry);

    container
        .when("Mailer")
        .needs("$host")
        .give(ContextualImpl::value("smtp.internal".to_string()));

    let mailer = container.make_as::<String>("Mailer").unwrap();
    assert_eq!(*mailer, "smtp.internal");
}

#[test]
fn test_contextual_primitive_factory_is_unwrapped() {
    let registry = Arc::new(DescriptorRegistry::new());
    registry.register(
        TypeDescriptor::new("Mailer")
            .parameter(ParameterDescriptor::primitive("host"))
            .constructor(|args| {
                let host = arg::<String>(&args, 0)?;
                Ok(to_instance((*host).clone()))
            }),
    );
    let container = Container::with_introspector(registry);

    container
        .when("Mailer")
        .needs("$host")
        .give_factory(|_, _| Ok(to_instance("resolved-lazily".to_string())));

    let mailer = container.make_as::<String>("Mailer").unwrap();
    assert_eq!(*mailer, "resolved-lazily");
}

#[test]
fn test_give_tagged_collects_the_group() {
    let registry = Arc::new(DescriptorRegistry::new());
    registry.register(
        TypeDescriptor::new("ReportRunner")
            .parameter(ParameterDescriptor::primitive("reports"))
            .constructor(|mut args| Ok(args.remove(0))),
    );
    let container = Container::with_introspector(registry);

    container.set("sales-report", to_instance("sales".to_string())).unwrap();
    container.set("churn-report", to_instance("churn".to_string())).unwrap();
    container.tag(&["sales-report", "churn-report"], &["reports"]);

    container
        .when("ReportRunner")
        .needs("$reports")
        .give_tagged("reports");

    let runner = container.make("ReportRunner").unwrap();
    let reports = downcast::<Vec<Instance>>(&runner).unwrap();
    assert_eq!(reports.len(), 2);
}

#[test]
fn test_give_config_injects_configuration_values() {
    let registry = Arc::new(DescriptorRegistry::new());
    registry.register(
        TypeDescriptor::new("Mailer")
            .parameter(ParameterDescriptor::primitive("host"))
            .parameter(ParameterDescriptor::primitive("port"))
            .constructor(|args| {
                let host = arg::<Value>(&args, 0)?;
                let port = arg::<Value>(&args, 1)?;
                Ok(to_instance(format!("{}:{}", host.as_str().unwrap(), port)))
            }),
    );
    let container = Container::with_introspector(registry);

    let config = Config::new().with("mail.host", json!("smtp.example.com"));
    container.instance("config", to_instance(config)).unwrap();

    container
        .when("Mailer")
        .needs("$host")
        .give_config("mail.host", None);
    container
        .when("Mailer")
        .needs("$port")
        .give_config("mail.port", Some(json!(25)));

    let mailer = container.make_as::<String>("Mailer").unwrap();
    assert_eq!(*mailer, "smtp.example.com:25");
}

#[test]
fn test_when_each_applies_to_every_consumer() {
    let container = Container::with_introspector(registry());
    container.bind("Repo", Some("MemRepo".into()), false).unwrap();

    container
        .when_each(&["Controller", "AdminController"])
        .needs("Repo")
        .give("SqlRepo");

    let controller = container.make_as::<Controller>("Controller").unwrap();
    assert!(downcast::<SqlRepo>(&controller.repo).is_some());
}
