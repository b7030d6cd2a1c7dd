//! Integration tests for saving and loading hosts.
//!
//! Every test builds a host, saves it through a record, loads it into a
//! fresh host of the same definition, and compares the two.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::rc::Rc;

use chrono::{NaiveDate, TimeZone, Utc};
use rigging_common::value::AttrValue;
use rigging_core::attribute::ConfigAttr;
use rigging_core::class::{ClassRegistry, ComponentClass};
use rigging_core::dependency::DependencyBuilder;
use rigging_core::dump::dump_host;
use rigging_core::host::{Host, HostDefinition, HostInput};
use rigging_core::input::{DependencyValue, When};
use rigging_core::store::AttributeStore;
use rigging_store::record::{self, ConfigurationRecord, FileRecord, MemoryRecord};
use rigging_store::serializer;

fn registry() -> ClassRegistry {
    let mut registry = ClassRegistry::new();
    let _ = registry.register(ComponentClass::plain("S3Storage", &["bucket", "region"]));
    let _ = registry.register(ComponentClass::plain("LocalStorage", &["directory"]));
    registry
}

fn storage(name: &str) -> DependencyBuilder {
    DependencyBuilder::new(name)
        .option("s3", |o| o.class("S3Storage").bind(ConfigAttr::new("bucket").required()))
        .option("local", |o| o.class("LocalStorage").bind(ConfigAttr::new("directory")))
        .when(|raw, _| {
            let path = raw?.as_str()?;
            Some(if path.starts_with("s3://") {
                When::option("s3").rebind_as("bucket")
            } else {
                When::option("local").rebind_as("directory")
            })
        })
}

fn suffixed(value: AttrValue, _: &AttributeStore) -> AttrValue {
    AttrValue::String(format!("{}/x", value.as_str().unwrap_or_default()))
}

fn definition(registry: &mut ClassRegistry) -> Rc<HostDefinition> {
    let job = HostDefinition::builder("Job")
        .attribute(ConfigAttr::new("schedule"))
        .dependency(storage("storage").lazy())
        .build(registry)
        .expect("job");
    let _ = registry.register(ComponentClass::host(&job));

    HostDefinition::builder("Backup")
        .attribute(ConfigAttr::new("name"))
        .attribute(ConfigAttr::new("region").default_value("eu-west-1"))
        .attribute(ConfigAttr::new("since"))
        .attribute(ConfigAttr::new("updated_at"))
        .association("owner", "owner_id")
        .dependency(storage("storage"))
        .dependency(storage("mirrors").lazy())
        .dependency(
            DependencyBuilder::new("job")
                .class("Job")
                .bind(ConfigAttr::new("schedule")),
        )
        .build(registry)
        .expect("backup")
}

fn populated(definition: &Rc<HostDefinition>) -> Host {
    let since = NaiveDate::from_ymd_opt(2023, 6, 1).expect("date");
    let updated = Utc.with_ymd_and_hms(2024, 3, 9, 12, 30, 0).single().expect("time");
    let mirrors = BTreeMap::from([
        ("primary".to_owned(), DependencyValue::from("s3://primary")),
        ("secondary".to_owned(), DependencyValue::from("s3://secondary")),
    ]);
    let input = HostInput::new()
        .attribute("name", "nightly")
        .attribute("since", since)
        .attribute("updated_at", updated)
        .attribute("owner", 7)
        .dependency("storage", AttrValue::from(vec!["s3://a", "/b"]))
        .dependency("mirrors", mirrors)
        .dependency("job", AttrValue::map([("schedule", "0 3 * * *")]));
    Host::new(definition, input).expect("populated host")
}

#[test]
fn memory_round_trip_preserves_everything() {
    let mut registry = registry();
    let definition = definition(&mut registry);
    let mut original = populated(&definition);
    let mut record = MemoryRecord::new();
    record.set_column("owner_id", 7);
    record.relate("owner", 7, AttrValue::from(7));

    record::save(&mut original, &mut record).expect("save");
    let mut restored = record::load(&definition, &record).expect("load");

    assert_eq!(
        dump_host(&restored).expect("restored dump"),
        dump_host(&original).expect("original dump")
    );
    assert_eq!(
        restored.get("since"),
        Some(&AttrValue::Date(NaiveDate::from_ymd_opt(2023, 6, 1).expect("date")))
    );
    assert!(matches!(restored.get("updated_at"), Some(AttrValue::DateTime(_))));
    assert_eq!(restored.get("owner"), Some(&AttrValue::from(7)));

    let storage = restored.dependency("storage").expect("storage").expect("entry");
    let classes: Vec<String> = storage
        .bindings()
        .into_iter()
        .map(|b| b.instance().borrow().class_name().to_owned())
        .collect();
    assert_eq!(classes, vec!["S3Storage", "LocalStorage"]);
}

#[test]
fn blob_uses_envelopes_tags_and_sentinels() {
    let mut registry = registry();
    let definition = definition(&mut registry);
    let host = populated(&definition);
    let value = serializer::to_value(&host).expect("serialize");

    assert_eq!(value["owner"], serde_json::Value::Bool(true));
    assert_eq!(value["since"]["__type__"], "Date");
    assert_eq!(value["since"]["value"], "2023-06-01");
    assert_eq!(value["storage"][0]["s3"]["bucket"], "s3://a");
    assert_eq!(value["storage"][1]["local"]["directory"], "/b");
    assert_eq!(value["mirrors"]["primary"]["s3"]["bucket"], "s3://primary");
    assert_eq!(value["job"]["default"]["schedule"], "0 3 * * *");
}

#[test]
fn rebuilt_dependencies_are_fresh_instances() {
    let mut registry = registry();
    let definition = definition(&mut registry);
    let mut original = populated(&definition);
    let json = serializer::serialize(&original).expect("serialize");
    let mut restored = serializer::deserialize::<MemoryRecord>(&definition, &json, None).expect("deserialize");

    let before = original.instance("job").expect("job").expect("instance");
    let after = restored.instance("job").expect("job").expect("instance");
    assert!(!Rc::ptr_eq(&before, &after));
    assert_eq!(
        after.borrow().read_attribute("schedule"),
        Some(AttrValue::from("0 3 * * *"))
    );
    assert_eq!(restored.get("owner"), None);
}

#[test]
fn file_record_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut registry = registry();
    let definition = definition(&mut registry);
    let mut original = populated(&definition);
    let mut file = FileRecord::open(dir.path().join("backup.json"));

    record::save(&mut original, &mut file).expect("save");
    let blob = file.read_configuration_blob().expect("read").expect("blob");
    assert!(blob.contains("\"__type__\":\"DateTime\""), "got: {blob}");

    // A file record has no related tables, so the association is not restored.
    let restored = record::load(&definition, &file).expect("load");
    assert_eq!(restored.get("owner"), None);
    let mut expected = dump_host(&original).expect("original dump");
    if let AttrValue::Map(entries) = &mut expected {
        let _ = entries.remove("owner");
    }
    assert_eq!(dump_host(&restored).expect("restored dump"), expected);
}

#[test]
fn required_fields_are_revalidated_on_load() {
    let mut registry = registry();
    let definition = definition(&mut registry);
    let json = r#"{"storage": [{"s3": {"region": "us"}}], "job": {"default": {}}}"#;
    let host = serializer::deserialize::<MemoryRecord>(&definition, json, None).expect("deserialize");
    let errors = host.validate();
    assert_eq!(errors.full_messages(), vec!["storage.bucket can't be blank"]);
}

#[test]
fn options_sharing_a_class_keep_their_choice() {
    let mut registry = registry();
    let _ = registry.register(ComponentClass::plain("Queue", &["size", "url"]));
    let definition = HostDefinition::builder("Worker")
        .attribute(ConfigAttr::new("url"))
        .dependency(
            DependencyBuilder::new("queue")
                .option("fast", |o| o.class("Queue").bind(ConfigAttr::new("url")).default())
                .option("remote", |o| o.class("Queue").bind(ConfigAttr::new("url"))),
        )
        .build(&registry)
        .expect("definition");
    let input = HostInput::new()
        .attribute("url", "u")
        .dependency("queue", AttrValue::map([("remote", AttrValue::map([("size", 1)]))]));
    let mut original = Host::new(&definition, input).expect("host");
    let mut record = MemoryRecord::new();

    record::save(&mut original, &mut record).expect("save");
    let value: serde_json::Value = serde_json::from_str(record.blob().expect("blob")).expect("json");
    assert_eq!(value["queue"]["remote"]["size"], 1);

    let mut restored = record::load(&definition, &record).expect("load");
    let queue = restored.dependency("queue").expect("queue").expect("entry");
    assert_eq!(queue.single().map(|b| b.option().name()), Some("remote"));
    assert_eq!(
        dump_host(&restored).expect("restored dump"),
        dump_host(&original).expect("original dump")
    );
}

#[test]
fn transforms_run_once_across_a_round_trip() {
    let mut registry = registry();
    let volume = HostDefinition::builder("Volume")
        .attribute(ConfigAttr::new("mount").transform(suffixed))
        .build(&registry)
        .expect("volume");
    let _ = registry.register(ComponentClass::host(&volume));
    let definition = HostDefinition::builder("Machine")
        .attribute(ConfigAttr::new("path").transform(suffixed))
        .dependency(DependencyBuilder::new("volume").class("Volume").bind(ConfigAttr::new("mount")))
        .build(&registry)
        .expect("machine");
    let input = HostInput::new()
        .attribute("path", "/srv")
        .dependency("volume", AttrValue::map([("mount", "/mnt")]));
    let mut original = Host::new(&definition, input).expect("host");
    assert_eq!(original.get("path"), Some(&AttrValue::from("/srv/x")));

    let json = serializer::serialize(&original).expect("serialize");
    let mut restored = serializer::deserialize::<MemoryRecord>(&definition, &json, None).expect("deserialize");
    assert_eq!(restored.get("path"), Some(&AttrValue::from("/srv/x")));
    let before = original.instance("volume").expect("volume").expect("instance");
    let after = restored.instance("volume").expect("volume").expect("instance");
    assert_eq!(after.borrow().read_attribute("mount"), Some(AttrValue::from("/mnt/x")));
    assert_eq!(
        after.borrow().read_attribute("mount"),
        before.borrow().read_attribute("mount")
    );
}
