use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cask_core::{
    Concrete, Container, DescriptorRegistry, TypeDescriptor, downcast, to_instance,
};
use parking_lot::Mutex;

struct FileLogger;

fn registry_with_file_logger() -> Arc<DescriptorRegistry> {
    let registry = Arc::new(DescriptorRegistry::new());
    registry.register(TypeDescriptor::new("Logger").abstract_only());
    registry.register(
        TypeDescriptor::new("FileLogger")
            .implements("Logger")
            .constructor(|_| Ok(to_instance(FileLogger))),
    );
    registry
}

#[test]
fn test_hooks_fire_in_before_resolving_after_order() {
    let container = Container::new();
    container.set("service", to_instance(1_u8)).unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));

    let log = events.clone();
    container.before_resolving("service", move |_, _, _| log.lock().push("before"));
    let log = events.clone();
    container.resolving("service", move |_, _| log.lock().push("resolving"));
    let log = events.clone();
    container.after_resolving("service", move |_, _| log.lock().push("after"));

    container.make("service").unwrap();

    assert_eq!(*events.lock(), vec!["before", "resolving", "after"]);
}

#[test]
fn test_global_hooks_fire_before_typed_hooks() {
    let container = Container::new();
    container.set("service", to_instance(1_u8)).unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));

    let log = events.clone();
    container.resolving("service", move |_, _| log.lock().push("typed"));
    let log = events.clone();
    container.resolving_any(move |_, _| log.lock().push("global"));

    container.make("service").unwrap();

    assert_eq!(*events.lock(), vec!["global", "typed"]);
}

#[test]
fn test_typed_hooks_match_declared_interfaces() {
    let container = Container::with_introspector(registry_with_file_logger());

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    container.resolving("Logger", move |object, _| {
        assert!(downcast::<FileLogger>(object).is_some());
        counter.fetch_add(1, Ordering::SeqCst);
    });

    // FileLogger declares that it implements Logger.
    container.make("FileLogger").unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn test_before_hooks_match_declared_interfaces() {
    let container = Container::with_introspector(registry_with_file_logger());

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    container.before_resolving("Logger", move |abstract_id, _, _| {
        assert_eq!(abstract_id, "FileLogger");
        counter.fetch_add(1, Ordering::SeqCst);
    });

    container.make("FileLogger").unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unrelated_typed_hooks_do_not_fire() {
    let container = Container::with_introspector(registry_with_file_logger());

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    container.resolving("Mailer", move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    container.make("FileLogger").unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[test]
fn test_singleton_cache_hits_skip_resolving_hooks() {
    let container = Container::with_introspector(registry_with_file_logger());
    container
        .singleton("Logger", Some("FileLogger".into()))
        .unwrap();

    let resolving_count = Arc::new(AtomicUsize::new(0));
    let before_count = Arc::new(AtomicUsize::new(0));

    let counter = resolving_count.clone();
    container.resolving("Logger", move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = before_count.clone();
    container.before_resolving("Logger", move |_, _, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    container.make("Logger").unwrap();
    container.make("Logger").unwrap();

    // Before-resolving hooks fire per attempt; resolving hooks only on builds.
    assert_eq!(before_count.load(Ordering::SeqCst), 2);
    assert_eq!(resolving_count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_hook_registration_canonicalizes_aliases() {
    let container = Container::new();
    container.set("service", to_instance(1_u8)).unwrap();
    container.alias("service", "svc").unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    container.resolving("svc", move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    container.make("service").unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn test_tagged_sequence_is_lazy_and_re_evaluated() {
    let container = Container::new();
    let built = Arc::new(AtomicUsize::new(0));

    let counter = built.clone();
    container
        .bind(
            "report",
            Some(Concrete::factory(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(to_instance("report".to_string()))
            })),
            false,
        )
        .unwrap();
    container.tag(&["report"], &["reports"]);

    let tagged = container.tagged("reports");
    assert_eq!(tagged.len(), 1);
    // Nothing is resolved until the sequence is iterated.
    assert_eq!(built.load(Ordering::SeqCst), 0);

    let first_pass: Vec<_> = tagged.iter().collect();
    let second_pass: Vec<_> = tagged.iter().collect();
    assert_eq!(first_pass.len(), 1);
    assert_eq!(second_pass.len(), 1);

    // Each pass re-resolves every tagged identifier.
    assert_eq!(built.load(Ordering::SeqCst), 2);
}
