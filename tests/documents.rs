//! Document lifecycle tests against a SQLite-backed platform.

mod common;

use common::{Platform, doc, named, record};
use serde_json::json;
use vellum::constraint::Constraint;
use vellum::error::Error;
use vellum::notify::Event;
use vellum::service::AttributeDefinition;
use vellum::types::{
    DataRecord, META_ORIGINAL_DOCUMENT_ID, NewDocument, Principal, ResourceType, Roles,
    ServiceLimits, Value,
};

#[test]
fn create_updates_ledger_and_notifies() {
    let platform = Platform::new();
    let ws = platform.owner();
    let contacts = &platform.contacts;

    let created = platform
        .state
        .documents()
        .create(&ws, &contacts.id, doc(json!({"name": "Ada", "email": null})))
        .unwrap();

    let collection = platform.collection(&contacts.id);
    assert_eq!(collection.documents_count, 1);
    assert_eq!(collection.version, contacts.version + 1);
    assert_eq!(platform.usage(&contacts.id, "name"), Some(1));
    assert_eq!(platform.usage(&contacts.id, "email"), Some(0));
    assert_eq!(created.created_by, common::OWNER);

    let events = platform.events.take();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], Event::DocumentCreated { document, .. } if document.id == created.id));
}

#[test]
fn name_usage_follows_deletes_and_creates() {
    let platform = Platform::new();
    let ws = platform.owner();
    let documents = platform.state.documents();
    let id = &platform.contacts.id;

    let first = documents.create(&ws, id, named("a")).unwrap();
    documents.create(&ws, id, named("b")).unwrap();
    assert_eq!(platform.usage(id, "name"), Some(2));
    assert_eq!(platform.collection(id).documents_count, 2);

    documents.delete(&ws, id, &first.id).unwrap();
    assert_eq!(platform.usage(id, "name"), Some(1));
    assert_eq!(platform.collection(id).documents_count, 1);

    documents.create(&ws, id, named("x")).unwrap();
    assert_eq!(platform.usage(id, "name"), Some(2));
    assert_eq!(platform.collection(id).documents_count, 2);
}

#[test]
fn create_then_delete_restores_usage() {
    let platform = Platform::new();
    let ws = platform.owner();
    let documents = platform.state.documents();
    let id = &platform.contacts.id;

    documents
        .create(&ws, id, doc(json!({"name": "kept", "city": "Oslo"})))
        .unwrap();
    let before: Vec<(String, u64)> = platform
        .collection(id)
        .attributes
        .iter()
        .map(|a| (a.id.clone(), a.usage_count))
        .collect();

    let temporary = documents
        .create(&ws, id, doc(json!({"name": "tmp", "city": "Rome", "phone": "1"})))
        .unwrap();
    documents.delete(&ws, id, &temporary.id).unwrap();

    let collection = platform.collection(id);
    for (attribute, usage) in before {
        assert_eq!(collection.attribute(&attribute).unwrap().usage_count, usage);
    }
    assert_eq!(platform.usage(id, "phone").unwrap_or(0), 0);
    assert_eq!(collection.documents_count, 1);
}

#[test]
fn patch_keeps_keys_and_replace_drops_them() {
    let platform = Platform::new();
    let ws = platform.owner();
    let documents = platform.state.documents();
    let id = &platform.contacts.id;

    let created = documents
        .create(&ws, id, doc(json!({"a": 1, "b": 2})))
        .unwrap();

    let patched = documents
        .patch_data(&ws, id, &created.id, record(json!({"c": 3})))
        .unwrap();
    assert_eq!(patched.data.len(), 3);
    assert_eq!(patched.data["a"], Value::Int(1));
    assert_eq!(platform.usage(id, "c"), Some(1));

    let replaced = documents
        .update_data(&ws, id, &created.id, record(json!({"a": 5})))
        .unwrap();
    assert_eq!(replaced.data.keys().collect::<Vec<_>>(), vec!["a"]);
    assert_eq!(platform.usage(id, "a"), Some(1));
    assert_eq!(platform.usage(id, "b"), Some(0));
    assert_eq!(platform.usage(id, "c"), Some(0));
    assert_eq!(replaced.updated_by.as_deref(), Some(common::OWNER));

    let stored = documents.get(&ws, id, &created.id).unwrap();
    assert_eq!(stored.data, replaced.data);
}

#[test]
fn patch_with_null_keeps_key_but_releases_usage() {
    let platform = Platform::new();
    let ws = platform.owner();
    let documents = platform.state.documents();
    let id = &platform.contacts.id;

    let created = documents
        .create(&ws, id, doc(json!({"a": 1, "b": 2})))
        .unwrap();
    let patched = documents
        .patch_data(&ws, id, &created.id, record(json!({"b": null})))
        .unwrap();

    assert!(patched.data.contains_key("b"));
    assert_eq!(patched.data["b"], Value::Null);
    assert_eq!(platform.usage(id, "b"), Some(0));
    assert_eq!(platform.usage(id, "a"), Some(1));
}

#[test]
fn meta_data_updates_leave_ledger_alone() {
    let platform = Platform::new();
    let ws = platform.owner();
    let documents = platform.state.documents();
    let id = &platform.contacts.id;

    let created = documents.create(&ws, id, named("Ada")).unwrap();
    let version = platform.collection(id).version;

    let updated = documents
        .patch_meta_data(&ws, id, &created.id, record(json!({"pinned": true})))
        .unwrap();
    assert_eq!(updated.meta_data["pinned"], Value::Bool(true));
    assert_eq!(updated.data, created.data);
    assert_eq!(platform.collection(id).version, version);
}

#[test]
fn read_only_member_cannot_patch() {
    let platform = Platform::new();
    let id = platform.contacts.id.clone();
    let created = platform
        .state
        .documents()
        .create(&platform.owner(), &id, named("Ada"))
        .unwrap();

    let reader = platform.member("reader", &id, Roles::READ);
    let documents = platform.state.documents();
    assert!(documents.get(&reader, &id, &created.id).is_ok());
    let denied = documents.patch_data(&reader, &id, &created.id, record(json!({"name": "Eve"})));
    assert!(matches!(
        denied,
        Err(Error::PermissionDenied {
            resource: ResourceType::Collection,
            ..
        })
    ));

    let writer = platform.member("reader", &id, Roles::WRITE);
    let patched = documents
        .patch_data(&writer, &id, &created.id, record(json!({"name": "Eve"})))
        .unwrap();
    assert_eq!(patched.data["name"], Value::from("Eve"));
}

#[test]
fn outsider_cannot_resolve_workspace() {
    let platform = Platform::new();
    let result = platform
        .state
        .hierarchy()
        .resolve_workspace(&Principal::new("stranger"), "acme", "crm", None);
    assert!(matches!(
        result,
        Err(Error::PermissionDenied {
            resource: ResourceType::Organization,
            ..
        })
    ));
}

#[test]
fn view_grants_write_within_author_rights() {
    let platform = Platform::new();
    let id = platform.contacts.id.clone();
    let owner = platform.owner();
    let created = platform
        .state
        .documents()
        .create(&owner, &id, named("Ada"))
        .unwrap();

    let reader = platform.member("reader", &id, Roles::READ);
    let hierarchy = platform.state.hierarchy();
    let view = hierarchy
        .create_view(&owner, "board", "Board", &[id.clone()])
        .unwrap();
    hierarchy
        .share_view(&owner, &view.id, "reader", Roles::WRITE)
        .unwrap();

    let through_view = hierarchy
        .resolve_workspace(&reader.principal, "acme", "crm", Some(&view.id))
        .unwrap();
    let documents = platform.state.documents();
    documents
        .patch_data(&through_view, &id, &created.id, record(json!({"stage": "won"})))
        .unwrap();

    assert!(documents
        .patch_data(&reader, &id, &created.id, record(json!({"stage": "lost"})))
        .is_err());
}

#[test]
fn document_limit_is_enforced() {
    let platform = Platform::with_limits(ServiceLimits {
        max_documents: Some(2),
        ..ServiceLimits::default()
    });
    let ws = platform.owner();
    let documents = platform.state.documents();
    let id = &platform.contacts.id;

    documents.create(&ws, id, named("a")).unwrap();
    assert!(matches!(
        documents.create_many(&ws, id, vec![named("b"), named("c")], false),
        Err(Error::LimitExceeded(_))
    ));
    documents.create(&ws, id, named("b")).unwrap();
    assert!(matches!(
        documents.create(&ws, id, named("c")),
        Err(Error::LimitExceeded(_))
    ));
    assert_eq!(platform.collection(id).documents_count, 2);
}

#[test]
fn create_many_updates_ledger_once() {
    let platform = Platform::new();
    let ws = platform.owner();
    let id = &platform.contacts.id;
    let version = platform.collection(id).version;

    let created = platform
        .state
        .documents()
        .create_many(
            &ws,
            id,
            vec![named("a"), named("b"), doc(json!({"city": "Oslo"}))],
            true,
        )
        .unwrap();

    assert_eq!(created.len(), 3);
    let collection = platform.collection(id);
    assert_eq!(collection.version, version + 1);
    assert_eq!(collection.documents_count, 3);
    assert_eq!(platform.usage(id, "name"), Some(2));
    assert_eq!(platform.usage(id, "city"), Some(1));

    let events = platform.events.take();
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        Event::CollectionImported { documents: 3, .. }
    ));
}

#[test]
fn constrained_values_are_encoded() {
    let platform = Platform::new();
    let ws = platform.owner();
    let id = &platform.contacts.id;
    platform
        .state
        .hierarchy()
        .set_attribute(
            &ws,
            id,
            AttributeDefinition {
                id: "age".into(),
                name: Some("Age".into()),
                constraint: Some(Constraint::Number),
            },
        )
        .unwrap();

    let documents = platform.state.documents();
    let created = documents
        .create(&ws, id, doc(json!({"age": "42", "note": "42"})))
        .unwrap();
    assert_eq!(created.data["age"], Value::Int(42));
    assert_eq!(created.data["note"], Value::from("42"));

    let garbage = documents
        .create(&ws, id, doc(json!({"age": "forty"})))
        .unwrap();
    assert_eq!(garbage.data["age"], Value::from("forty"));
    assert_eq!(platform.usage(id, "age"), Some(2));
    assert_eq!(platform.collection(id).attribute("age").unwrap().name, "Age");
}

#[test]
fn ambiguous_thousands_separator_is_stored_raw() {
    let platform = Platform::new();
    let ws = platform.owner();
    let id = &platform.contacts.id;
    platform
        .state
        .hierarchy()
        .set_attribute(
            &ws,
            id,
            AttributeDefinition {
                id: "price".into(),
                name: None,
                constraint: Some(Constraint::Number),
            },
        )
        .unwrap();

    let documents = platform.state.documents();
    let thousand = documents
        .create(&ws, id, doc(json!({"price": "1,000"})))
        .unwrap();
    assert_eq!(thousand.data["price"], Value::from("1,000"));

    let decimal = documents
        .create(&ws, id, doc(json!({"price": "2,5"})))
        .unwrap();
    assert_eq!(decimal.data["price"], Value::Float(2.5));
}

#[test]
fn non_finite_floats_do_not_leak_usage() {
    let platform = Platform::new();
    let ws = platform.owner();
    let id = &platform.contacts.id;
    let documents = platform.state.documents();

    let mut data = record(json!({"name": "Ada"}));
    data.insert("score".into(), Value::Float(f64::NAN));
    data.insert("ratio".into(), Value::Float(f64::INFINITY));
    let created = documents.create(&ws, id, NewDocument::new(data)).unwrap();

    assert_eq!(created.data["score"], Value::Null);
    assert_eq!(platform.usage(id, "score"), Some(0));
    assert_eq!(platform.usage(id, "ratio"), Some(0));

    let patch = DataRecord::from([("score".to_string(), Value::Float(f64::NEG_INFINITY))]);
    documents.patch_data(&ws, id, &created.id, patch).unwrap();
    assert_eq!(platform.usage(id, "score"), Some(0));

    documents.delete(&ws, id, &created.id).unwrap();
    assert_eq!(platform.usage(id, "score"), Some(0));
    assert_eq!(platform.usage(id, "name"), Some(0));
}

#[test]
fn duplicate_records_original_and_counts_usage() {
    let platform = Platform::new();
    let ws = platform.owner();
    let documents = platform.state.documents();
    let id = &platform.contacts.id;

    let original = documents
        .create(&ws, id, doc(json!({"name": "Ada", "city": "London"})))
        .unwrap();
    platform.events.take();

    let duplicated = documents
        .duplicate(&ws, id, &[original.id.clone()])
        .unwrap();
    assert_eq!(duplicated.documents.len(), 1);
    let clone = &duplicated.documents[0];
    assert_ne!(clone.id, original.id);
    assert_eq!(clone.data, original.data);
    assert_eq!(
        clone.meta_data[META_ORIGINAL_DOCUMENT_ID],
        Value::String(original.id.clone())
    );
    assert_eq!(duplicated.id_map[&original.id], clone.id);

    assert_eq!(platform.usage(id, "name"), Some(2));
    assert_eq!(platform.collection(id).documents_count, 2);
    assert_eq!(platform.events.take().len(), 1);
}

#[test]
fn missing_documents_and_foreign_collections() {
    let platform = Platform::new();
    let ws = platform.owner();
    let documents = platform.state.documents();

    assert!(matches!(
        documents.get(&ws, &platform.contacts.id, "nope"),
        Err(Error::ResourceNotFound(ResourceType::Document))
    ));
    assert!(matches!(
        documents.delete(&ws, &platform.contacts.id, "nope"),
        Err(Error::ResourceNotFound(ResourceType::Document))
    ));

    let owner = Principal::new(common::OWNER);
    let hierarchy = platform.state.hierarchy();
    hierarchy
        .create_project(&owner, &platform.organization_id, "ops", "Ops")
        .unwrap();
    let other = hierarchy
        .resolve_workspace(&owner, "acme", "ops", None)
        .unwrap();
    assert!(matches!(
        documents.create(&other, &platform.contacts.id, named("x")),
        Err(Error::ResourceNotFound(ResourceType::Collection))
    ));
}

#[test]
fn invalid_attribute_ids_are_rejected() {
    let platform = Platform::new();
    let ws = platform.owner();
    let result = platform
        .state
        .documents()
        .create(&ws, &platform.contacts.id, doc(json!({"": 1})));
    assert!(matches!(result, Err(Error::BadRequest(_))));
    assert_eq!(platform.collection(&platform.contacts.id).documents_count, 0);
}
