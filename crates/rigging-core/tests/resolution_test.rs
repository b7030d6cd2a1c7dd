//! Integration tests for dependency resolution and attribute propagation.
//!
//! These tests drive whole host definitions through:
//! 1. Option selection (default, shorthand, discriminator, envelopes)
//! 2. Injection of pre-built instances
//! 3. Collection shapes
//! 4. The reserved `id` guard
//! 5. Live propagation, including into nested hosts
//! 6. Lazy dependencies, factories, delegation, and validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use rigging_common::error::RiggingError;
use rigging_common::value::{AttrValue, AttributeMap};
use rigging_core::attribute::ConfigAttr;
use rigging_core::class::{ClassRegistry, ComponentClass};
use rigging_core::component::{PlainComponent, SharedComponent, shared};
use rigging_core::dependency::DependencyBuilder;
use rigging_core::factory::Factory;
use rigging_core::graph::Realized;
use rigging_core::host::{Host, HostDefinition, HostInput};
use rigging_core::input::{DependencyValue, When};

fn registry() -> ClassRegistry {
    let mut registry = ClassRegistry::new();
    let _ = registry.register(ComponentClass::plain("S3Storage", &["bucket", "region"]));
    let _ = registry.register(ComponentClass::plain("LocalStorage", &["directory", "path"]));
    let _ = registry.register(ComponentClass::plain("Point", &["x", "y"]));
    let _ = registry.register(ComponentClass::plain("Tagged", &["id", "label"]));
    registry
}

fn read(instance: &SharedComponent, name: &str) -> Option<AttrValue> {
    instance.borrow().read_attribute(name)
}

fn scalar(host: &mut Host, name: &str) -> SharedComponent {
    host.instance(name)
        .expect("dependency should resolve")
        .expect("dependency should hold an instance")
}

/// `storage` with `s3` (requires bucket) and `local` (requires directory),
/// no default, and a discriminator on path prefixes.
fn storage_host(calls: &Rc<Cell<usize>>) -> Rc<HostDefinition> {
    let calls = Rc::clone(calls);
    HostDefinition::builder("Archive")
        .dependency(
            DependencyBuilder::new("storage")
                .option("s3", |o| o.class("S3Storage").bind(ConfigAttr::new("bucket").required()))
                .option("local", |o| {
                    o.class("LocalStorage").bind(ConfigAttr::new("directory").required())
                })
                .when(move |raw, _| {
                    calls.set(calls.get() + 1);
                    let path = raw?.as_str()?;
                    Some(if path.starts_with("s3://") {
                        When::option("s3").rebind_as("bucket")
                    } else {
                        When::option("local").rebind_as("directory")
                    })
                }),
        )
        .build(&registry())
        .expect("storage host should build")
}

// ── Option selection ─────────────────────────────────────────────────

#[test]
fn storage_scenario_selects_by_prefix() {
    let calls = Rc::new(Cell::new(0));
    let definition = storage_host(&calls);

    let mut host = Host::new(&definition, HostInput::new().dependency("storage", "s3://my-bucket"))
        .expect("s3 path should resolve");
    let storage = scalar(&mut host, "storage");
    assert_eq!(storage.borrow().class_name(), "S3Storage");
    assert_eq!(read(&storage, "bucket"), Some("s3://my-bucket".into()));

    let mut host = Host::new(&definition, HostInput::new().dependency("storage", "/data"))
        .expect("local path should resolve");
    let storage = scalar(&mut host, "storage");
    assert_eq!(storage.borrow().class_name(), "LocalStorage");
    assert_eq!(read(&storage, "directory"), Some("/data".into()));
}

#[test]
fn explicit_option_map_skips_discriminator() {
    let calls = Rc::new(Cell::new(0));
    let definition = storage_host(&calls);
    let input = AttrValue::map([("local", AttrValue::map([("directory", "/tmp")]))]);
    let mut host = Host::new(&definition, HostInput::new().dependency("storage", input))
        .expect("explicit option should resolve");
    let storage = scalar(&mut host, "storage");
    assert_eq!(storage.borrow().class_name(), "LocalStorage");
    assert_eq!(read(&storage, "directory"), Some("/tmp".into()));
    assert_eq!(calls.get(), 0);
}

#[test]
fn absent_input_without_default_fails() {
    let calls = Rc::new(Cell::new(0));
    let err = Host::new(&storage_host(&calls), HostInput::new()).unwrap_err();
    assert!(matches!(err, RiggingError::NoDefault { ref component } if component == "storage"));
}

#[test]
fn default_option_and_named_option() {
    let definition = HostDefinition::builder("Archive")
        .dependency(
            DependencyBuilder::new("storage")
                .option("local", |o| o.class("LocalStorage").default())
                .option("s3", |o| o.class("S3Storage")),
        )
        .build(&registry())
        .expect("definition");

    let mut host = Host::new(&definition, HostInput::new()).expect("default");
    assert_eq!(scalar(&mut host, "storage").borrow().class_name(), "LocalStorage");

    let input = AttrValue::map([("s3", AttrValue::map([("bucket", "b")]))]);
    let mut host = Host::new(&definition, HostInput::new().dependency("storage", input)).expect("named");
    assert_eq!(scalar(&mut host, "storage").borrow().class_name(), "S3Storage");
}

#[test]
fn single_key_shorthand_fills_remaining_defaults() {
    let definition = HostDefinition::builder("Chart")
        .dependency(
            DependencyBuilder::new("origin")
                .class("Point")
                .bind(ConfigAttr::new("x"))
                .bind(ConfigAttr::new("y").default_value(0)),
        )
        .build(&registry())
        .expect("definition");

    let input = AttrValue::map([("x", 1)]);
    let mut host = Host::new(&definition, HostInput::new().dependency("origin", input)).expect("x only");
    let origin = scalar(&mut host, "origin");
    assert_eq!(read(&origin, "x"), Some(AttrValue::Integer(1)));
    assert_eq!(read(&origin, "y"), Some(AttrValue::Integer(0)));

    let input = AttrValue::map([("x", 1), ("y", 2)]);
    let mut host = Host::new(&definition, HostInput::new().dependency("origin", input)).expect("both");
    let origin = scalar(&mut host, "origin");
    assert_eq!(read(&origin, "y"), Some(AttrValue::Integer(2)));
}

#[test]
fn discriminator_wins_over_shorthand() {
    let definition = HostDefinition::builder("Archive")
        .dependency(
            DependencyBuilder::new("storage")
                .option("local", |o| o.class("LocalStorage").bind(ConfigAttr::new("path")).default())
                .option("s3", |o| o.class("S3Storage").bind(ConfigAttr::new("bucket")))
                .when(|raw, _| raw?.as_map().map(|_| When::option("s3"))),
        )
        .build(&registry())
        .expect("definition");
    let input = AttrValue::map([("bucket", "b")]);
    let mut host = Host::new(&definition, HostInput::new().dependency("storage", input)).expect("resolve");
    let storage = scalar(&mut host, "storage");
    assert_eq!(storage.borrow().class_name(), "S3Storage");
    assert_eq!(read(&storage, "bucket"), Some("b".into()));
}

#[test]
fn unknown_option_names_key_and_allowed_set() {
    let definition = HostDefinition::builder("Archive")
        .dependency(
            DependencyBuilder::new("storage")
                .option("local", |o| o.class("LocalStorage").default())
                .option("s3", |o| o.class("S3Storage")),
        )
        .build(&registry())
        .expect("definition");
    let input = AttrValue::map([("gcs", AttrValue::map([("bucket", "b")]))]);
    let err = Host::new(&definition, HostInput::new().dependency("storage", input)).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("\"gcs\""), "got: {msg}");
    assert!(msg.contains("local, s3"), "got: {msg}");
}

// ── Injection ────────────────────────────────────────────────────────

#[test]
fn injected_instance_is_kept_as_is() {
    let definition = HostDefinition::builder("Archive")
        .attribute(ConfigAttr::new("bucket").default_value("from-parent"))
        .dependency(DependencyBuilder::new("storage").class("S3Storage").bind(ConfigAttr::new("bucket")))
        .build(&registry())
        .expect("definition");
    let prebuilt = shared(
        PlainComponent::new(
            "S3Storage",
            &["bucket", "region"],
            AttributeMap::from([("bucket".to_owned(), AttrValue::from("prebuilt"))]),
        )
        .expect("instance"),
    );
    let input = HostInput::new().dependency("storage", Rc::clone(&prebuilt));
    let mut host = Host::new(&definition, input).expect("injection");
    let storage = scalar(&mut host, "storage");
    assert!(Rc::ptr_eq(&storage, &prebuilt));
    assert_eq!(read(&storage, "bucket"), Some("prebuilt".into()));

    // The matched option is recorded, so later writes still propagate.
    let _ = host.set("bucket", "changed").expect("set");
    assert_eq!(read(&prebuilt, "bucket"), Some("changed".into()));
}

#[test]
fn injection_is_ambiguous_when_options_share_a_class() {
    let definition = HostDefinition::builder("Worker")
        .dependency(
            DependencyBuilder::new("queue")
                .option("fast", |o| o.class("LocalStorage").default())
                .option("durable", |o| o.class("LocalStorage")),
        )
        .build(&registry())
        .expect("definition");
    let prebuilt = shared(PlainComponent::new("LocalStorage", &["directory"], AttributeMap::new()).expect("instance"));
    let err = Host::new(&definition, HostInput::new().dependency("queue", prebuilt)).unwrap_err();
    assert!(matches!(err, RiggingError::InvalidInput { .. }), "got: {err}");
    assert!(err.to_string().contains("fast, durable"), "got: {err}");
}

// ── Collections ──────────────────────────────────────────────────────

#[test]
fn list_input_keeps_length_and_order() {
    let calls = Rc::new(Cell::new(0));
    let input = AttrValue::from(vec!["s3://a", "/b", "s3://c"]);
    let mut host = Host::new(&storage_host(&calls), HostInput::new().dependency("storage", input))
        .expect("list");
    let realized = host.dependency("storage").expect("storage").expect("entry");
    assert!(matches!(realized, Realized::List(_)));
    let classes: Vec<String> = realized
        .bindings()
        .into_iter()
        .map(|b| b.instance().borrow().class_name().to_owned())
        .collect();
    assert_eq!(classes, vec!["S3Storage", "LocalStorage", "S3Storage"]);
}

#[test]
fn keyed_input_keeps_keys() {
    let calls = Rc::new(Cell::new(0));
    let input = BTreeMap::from([
        ("a".to_owned(), DependencyValue::from("s3://a")),
        ("b".to_owned(), DependencyValue::from("/b")),
    ]);
    let mut host = Host::new(&storage_host(&calls), HostInput::new().dependency("storage", input))
        .expect("keyed");
    let realized = host.dependency("storage").expect("storage").expect("entry");
    let Realized::Keyed(bindings) = realized else {
        unreachable!("expected a keyed entry, got {realized:?}");
    };
    assert_eq!(bindings.keys().map(String::as_str).collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(bindings["b"].option().name(), "local");
}

#[test]
fn raw_map_of_scalars_is_a_named_collection() {
    let calls = Rc::new(Cell::new(0));
    let input = AttrValue::map([("primary", "s3://a"), ("backup", "/b")]);
    let mut host = Host::new(&storage_host(&calls), HostInput::new().dependency("storage", input))
        .expect("named scalars");
    let realized = host.dependency("storage").expect("storage").expect("entry");
    let Realized::Keyed(bindings) = realized else {
        unreachable!("expected a keyed entry, got {realized:?}");
    };
    assert_eq!(bindings["primary"].option().name(), "s3");
    assert_eq!(bindings["backup"].option().name(), "local");
}

#[test]
fn unresolvable_map_names_the_offending_key() {
    let calls = Rc::new(Cell::new(0));
    let input = AttrValue::map([("primary", AttrValue::from("s3://a")), ("backup", AttrValue::from(5))]);
    let err = Host::new(&storage_host(&calls), HostInput::new().dependency("storage", input)).unwrap_err();
    assert!(
        matches!(err, RiggingError::UnknownOption { ref option, .. } if option == "backup"),
        "got: {err}"
    );
}

#[test]
fn elements_follow_the_same_argument_rules_as_scalars() {
    let definition = HostDefinition::builder("Catalog")
        .dependency(
            DependencyBuilder::new("origin")
                .option("plane", |o| {
                    o.class("Point").bind(ConfigAttr::new("x")).bind(ConfigAttr::new("y")).default()
                })
                .option("tag", |o| o.class("Tagged").bind(ConfigAttr::new("label"))),
        )
        .build(&registry())
        .expect("definition");

    let both = || AttrValue::map([("x", 1), ("y", 2)]);
    let mut host = Host::new(&definition, HostInput::new().dependency("origin", both())).expect("scalar");
    assert_eq!(read(&scalar(&mut host, "origin"), "y"), Some(AttrValue::Integer(2)));
    let list = AttrValue::from(vec![both()]);
    let mut host = Host::new(&definition, HostInput::new().dependency("origin", list)).expect("list");
    assert_eq!(host.dependency("origin").expect("origin").map(Realized::len), Some(1));

    let single = || AttrValue::map([("x", 1)]);
    for input in [single(), AttrValue::from(vec![single()])] {
        let err = Host::new(&definition, HostInput::new().dependency("origin", input)).unwrap_err();
        assert!(
            matches!(err, RiggingError::UnknownOption { ref option, .. } if option == "x"),
            "got: {err}"
        );
    }
}

// ── Reserved attribute guard ─────────────────────────────────────────

fn tagged_host() -> Rc<HostDefinition> {
    HostDefinition::builder("Catalog")
        .attribute(ConfigAttr::new("id"))
        .dependency(
            DependencyBuilder::new("tag")
                .class("Tagged")
                .bind(ConfigAttr::new("id"))
                .bind(ConfigAttr::new("label")),
        )
        .build(&registry())
        .expect("definition")
}

#[test]
fn reserved_id_is_rejected_for_every_shape() {
    let definition = tagged_host();
    let element = || AttrValue::map([("label", "x")]);
    let inputs = [
        DependencyValue::Absent,
        DependencyValue::Value(AttrValue::from(vec![element(), element()])),
        DependencyValue::Keyed(BTreeMap::from([("a".to_owned(), DependencyValue::Value(element()))])),
    ];
    for input in inputs {
        let host_input = HostInput::new().attribute("id", 42).dependency("tag", input);
        let err = Host::new(&definition, host_input).unwrap_err();
        assert!(
            matches!(err, RiggingError::ReservedAttribute { ref name, .. } if name == "id"),
            "got: {err}"
        );
    }
}

#[test]
fn reserved_id_absent_from_parent_is_allowed() {
    let mut host = Host::new(&tagged_host(), HostInput::new()).expect("no id to bind");
    assert_eq!(read(&scalar(&mut host, "tag"), "id"), None);
}

// ── Propagation ──────────────────────────────────────────────────────

fn workspace_host() -> Rc<HostDefinition> {
    HostDefinition::builder("Workspace")
        .attribute(ConfigAttr::new("root").default_value("/srv"))
        .dependency(
            DependencyBuilder::new("scratch").class("LocalStorage").bind(
                ConfigAttr::new("path").source("root").transform(|v, _| {
                    AttrValue::String(format!("{}/x", v.as_str().unwrap_or_default()))
                }),
            ),
        )
        .build(&registry())
        .expect("definition")
}

#[test]
fn parent_change_updates_child_in_place() {
    let mut host = Host::new(&workspace_host(), HostInput::new()).expect("host");
    let before = scalar(&mut host, "scratch");
    assert_eq!(read(&before, "path"), Some("/srv/x".into()));

    let _ = host.set("root", "/data").expect("set root");
    let after = scalar(&mut host, "scratch");
    assert!(Rc::ptr_eq(&before, &after));
    assert_eq!(read(&after, "path"), Some("/data/x".into()));
}

#[test]
fn unchanged_value_does_not_propagate() {
    let mut host = Host::new(&workspace_host(), HostInput::new()).expect("host");
    let scratch = scalar(&mut host, "scratch");
    let _ = scratch
        .borrow_mut()
        .write_attribute("path", "manual".into())
        .expect("write");
    assert!(!host.set("root", "/srv").expect("set root"));
    assert_eq!(read(&scratch, "path"), Some("manual".into()));
}

#[test]
fn own_name_propagates_next_to_source() {
    let definition = HostDefinition::builder("Workspace")
        .attribute(ConfigAttr::new("root").default_value("/srv"))
        .attribute(ConfigAttr::new("directory"))
        .dependency(
            DependencyBuilder::new("scratch")
                .class("LocalStorage")
                .bind(ConfigAttr::new("directory").source("root")),
        )
        .build(&registry())
        .expect("definition");
    let mut host = Host::new(&definition, HostInput::new()).expect("host");
    let scratch = scalar(&mut host, "scratch");
    assert_eq!(read(&scratch, "directory"), Some("/srv".into()));

    let _ = host.set("directory", "/new").expect("set directory");
    assert_eq!(read(&scratch, "directory"), Some("/new".into()));
    let _ = host.set("root", "/data").expect("set root");
    assert_eq!(read(&scratch, "directory"), Some("/data".into()));
}

#[test]
fn nested_host_receives_and_forwards_propagation() {
    let mut registry = registry();
    let inner = HostDefinition::builder("Project")
        .attribute(ConfigAttr::new("root"))
        .dependency(
            DependencyBuilder::new("cache")
                .class("LocalStorage")
                .bind(ConfigAttr::new("directory").source("root")),
        )
        .build(&registry)
        .expect("inner");
    let _ = registry.register(ComponentClass::host(&inner));
    let outer = HostDefinition::builder("Studio")
        .attribute(ConfigAttr::new("root").default_value("/a"))
        .dependency(DependencyBuilder::new("project").class("Project").bind(ConfigAttr::new("root")))
        .build(&registry)
        .expect("outer");

    let mut host = Host::new(&outer, HostInput::new()).expect("host");
    let project = scalar(&mut host, "project");
    assert_eq!(read(&project, "root"), Some("/a".into()));

    let _ = host.set("root", "/b").expect("set root");
    assert_eq!(read(&project, "root"), Some("/b".into()));
    let cache = project
        .borrow()
        .serialize()
        .expect("nested dump")
        .and_then(|v| v.as_map().and_then(|m| m.get("cache").cloned()));
    assert_eq!(
        cache,
        Some(AttrValue::map([("default", AttrValue::map([("directory", "/b")]))]))
    );
}

// ── Lazy, factories, delegation, validation ──────────────────────────

#[test]
fn lazy_dependency_builds_on_first_access() {
    let definition = HostDefinition::builder("Workspace")
        .attribute(ConfigAttr::new("root").default_value("/srv"))
        .dependency(
            DependencyBuilder::new("scratch")
                .class("LocalStorage")
                .bind(ConfigAttr::new("directory").source("root"))
                .lazy(),
        )
        .build(&registry())
        .expect("definition");
    let mut host = Host::new(&definition, HostInput::new()).expect("host");
    assert!(host.built_dependency("scratch").is_none());

    let _ = host.set("root", "/late").expect("set root");
    let scratch = scalar(&mut host, "scratch");
    assert_eq!(read(&scratch, "directory"), Some("/late".into()));
}

#[test]
fn lazy_dependency_without_default_resolves_to_nothing() {
    let definition = HostDefinition::builder("Archive")
        .dependency(
            DependencyBuilder::new("mirror")
                .option("s3", |o| o.class("S3Storage"))
                .option("local", |o| o.class("LocalStorage"))
                .lazy(),
        )
        .build(&registry())
        .expect("definition");
    let mut host = Host::new(&definition, HostInput::new()).expect("host");
    assert!(host.dependency("mirror").expect("mirror").is_none());
}

#[test]
fn factory_bundle_is_reused_across_hosts() {
    let registry = registry();
    let factory = Factory::builder("storage")
        .dependency(
            DependencyBuilder::new("storage")
                .option("local", |o| o.class("LocalStorage").default())
                .option("s3", |o| o.class("S3Storage")),
        )
        .build(&registry)
        .expect("factory");
    let definition = HostDefinition::builder("Archive")
        .dependency(DependencyBuilder::new("primary").factory(&factory))
        .dependency(DependencyBuilder::new("backup").factory(&factory))
        .build(&registry)
        .expect("definition");
    let input = AttrValue::map([("s3", AttrValue::map([("bucket", "b")]))]);
    let mut host = Host::new(&definition, HostInput::new().dependency("backup", input)).expect("host");
    assert_eq!(scalar(&mut host, "primary").borrow().class_name(), "LocalStorage");
    assert_eq!(scalar(&mut host, "backup").borrow().class_name(), "S3Storage");
}

#[test]
fn factory_with_own_discriminator_fails_at_definition() {
    let registry = registry();
    let factory = Factory::builder("storage")
        .dependency(DependencyBuilder::new("storage").class("LocalStorage"))
        .build(&registry)
        .expect("factory");
    let err = HostDefinition::builder("Archive")
        .dependency(
            DependencyBuilder::new("primary")
                .factory(&factory)
                .when(|_, _| Some(When::option("default"))),
        )
        .build(&registry)
        .unwrap_err();
    assert!(err.to_string().contains("own discriminator"), "got: {err}");
}

#[test]
fn delegated_method_reads_dependency() {
    let calls = Rc::new(Cell::new(0));
    let definition = HostDefinition::extend(&storage_host(&calls), "Archive")
        .delegate("bucket_name", "storage", "bucket")
        .build(&registry())
        .expect("definition");
    let mut host = Host::new(&definition, HostInput::new().dependency("storage", "s3://b"))
        .expect("host");
    assert_eq!(host.delegated("bucket_name").expect("delegate"), Some("s3://b".into()));
}

#[test]
fn validation_collects_required_bound_attributes() {
    let definition = HostDefinition::builder("Archive")
        .dependency(
            DependencyBuilder::new("storage")
                .option("s3", |o| o.class("S3Storage").bind(ConfigAttr::new("bucket").required()).default()),
        )
        .build(&registry())
        .expect("definition");
    let host = Host::new(&definition, HostInput::new()).expect("construction does not validate");
    let errors = host.validate();
    assert_eq!(errors.full_messages(), vec!["storage.bucket can't be blank"]);
    let err = host.validate_strict().unwrap_err();
    assert!(err.to_string().contains("storage.bucket can't be blank"));
}
