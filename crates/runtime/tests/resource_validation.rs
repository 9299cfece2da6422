//! Factory guards, live-validated writes, default coercion, and the
//! validator's constraint surface.

use concerto_core::ModelManager;
use concerto_runtime::{Factory, ResourceOptions, Value};

const MODEL: &str = r#"
namespace org.store

enum Status {
    o OPEN
    o CLOSED
}

abstract participant Party identified by id {
    o String id
}

participant Customer extends Party {
    o String email regex=/^[^@]+@[^@]+$/ optional
    o Integer loyaltyPoints range=[0,100000] optional
    o Double balance default=0.0 optional
    o Boolean active default=true optional
    o Status status default="OPEN" optional
    o String tier default="bronze" optional
    o String[] notes optional
}
"#;

fn fixture() -> ModelManager {
    let mut mm = ModelManager::new();
    mm.add_model_text(MODEL, Some("store.cto")).unwrap();
    mm
}

#[test]
fn defaults_are_coerced_per_declared_type() {
    let mm = fixture();
    let factory = Factory::new(&mm);
    let customer = factory
        .new_resource("org.store", "Customer", "C1", ResourceOptions::default())
        .unwrap();

    assert_eq!(customer.get_property_value("balance"), Some(&Value::Double(0.0)));
    assert_eq!(customer.get_property_value("active"), Some(&Value::Boolean(true)));
    assert_eq!(
        customer.get_property_value("status"),
        Some(&Value::String("OPEN".to_owned()))
    );
    assert_eq!(
        customer.get_property_value("tier"),
        Some(&Value::String("bronze".to_owned()))
    );
    // the supplied id always wins over defaults and lands in the id field
    assert_eq!(
        customer.get_property_value("id"),
        Some(&Value::String("C1".to_owned()))
    );
    assert_eq!(customer.identifier(), Some("C1"));
}

#[test]
fn abstract_types_cannot_be_instantiated() {
    let mm = fixture();
    let factory = Factory::new(&mm);
    let err = factory
        .new_resource("org.store", "Party", "P1", ResourceOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("abstract"));
}

#[test]
fn enums_and_concepts_take_their_own_paths() {
    let mm = fixture();
    let factory = Factory::new(&mm);
    let err = factory
        .new_resource("org.store", "Status", "X", ResourceOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("enum"));
    let err = factory
        .new_concept("org.store", "Customer", ResourceOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("not a concept"));
}

#[test]
fn undeclared_properties_are_rejected_on_write() {
    let mm = fixture();
    let factory = Factory::new(&mm);
    let mut customer = factory
        .new_resource("org.store", "Customer", "C1", ResourceOptions::default())
        .unwrap();

    let err = customer
        .set_property_value(&mm, "nickname", Value::from("ace"))
        .unwrap_err();
    assert!(err.to_string().contains("not declared"));
    assert!(customer.get_property_value("nickname").is_none());
}

#[test]
fn wrong_typed_writes_leave_the_resource_unchanged() {
    let mm = fixture();
    let factory = Factory::new(&mm);
    let mut customer = factory
        .new_resource("org.store", "Customer", "C1", ResourceOptions::default())
        .unwrap();

    let err = customer
        .set_property_value(&mm, "loyaltyPoints", Value::from("lots"))
        .unwrap_err();
    assert!(err.to_string().contains("expected type Integer"));
    assert!(customer.get_property_value("loyaltyPoints").is_none());

    // a plain resource skips the checks entirely
    let mut unchecked = factory
        .new_resource(
            "org.store",
            "Customer",
            "C2",
            ResourceOptions {
                disable_validation: true,
            },
        )
        .unwrap();
    unchecked
        .set_property_value(&mm, "loyaltyPoints", Value::from("lots"))
        .unwrap();
    // but a full validation pass still catches it
    assert!(unchecked.validate(&mm).is_err());
}

#[test]
fn regex_and_range_validators_gate_writes() {
    let mm = fixture();
    let factory = Factory::new(&mm);
    let mut customer = factory
        .new_resource("org.store", "Customer", "C1", ResourceOptions::default())
        .unwrap();

    customer
        .set_property_value(&mm, "email", Value::from("kim@example.org"))
        .unwrap();
    let err = customer
        .set_property_value(&mm, "email", Value::from("not-an-email"))
        .unwrap_err();
    assert!(err.to_string().contains("does not match regex"));
    // the passing value is still in place
    assert_eq!(
        customer.get_property_value("email"),
        Some(&Value::String("kim@example.org".to_owned()))
    );

    customer
        .set_property_value(&mm, "loyaltyPoints", Value::Integer(500))
        .unwrap();
    let err = customer
        .set_property_value(&mm, "loyaltyPoints", Value::Integer(200_000))
        .unwrap_err();
    assert!(err.to_string().contains("above the range maximum"));
}

#[test]
fn enum_membership_is_enforced() {
    let mm = fixture();
    let factory = Factory::new(&mm);
    let mut customer = factory
        .new_resource("org.store", "Customer", "C1", ResourceOptions::default())
        .unwrap();

    customer
        .set_property_value(&mm, "status", Value::from("CLOSED"))
        .unwrap();
    let err = customer
        .set_property_value(&mm, "status", Value::from("LIMBO"))
        .unwrap_err();
    assert!(err.to_string().contains("not a member of enum"));
}

#[test]
fn add_array_value_validates_the_prospective_full_array() {
    let mm = fixture();
    let factory = Factory::new(&mm);
    let mut customer = factory
        .new_resource("org.store", "Customer", "C1", ResourceOptions::default())
        .unwrap();

    customer
        .add_array_value(&mm, "notes", Value::from("first"))
        .unwrap();
    customer
        .add_array_value(&mm, "notes", Value::from("second"))
        .unwrap();
    assert_eq!(
        customer.get_property_value("notes").unwrap().as_array().unwrap().len(),
        2
    );

    // a bad element is rejected and the array keeps its prior contents
    let err = customer
        .add_array_value(&mm, "notes", Value::Integer(3))
        .unwrap_err();
    assert!(err.to_string().contains("expected type String[]"));
    assert_eq!(
        customer.get_property_value("notes").unwrap().as_array().unwrap().len(),
        2
    );

    // appending to a non-array property is refused outright
    let err = customer
        .add_array_value(&mm, "email", Value::from("x@y.z"))
        .unwrap_err();
    assert!(err.to_string().contains("not declared as an array"));
}

#[test]
fn full_validation_reports_missing_required_and_empty_identifiers() {
    let mm = fixture();
    let factory = Factory::new(&mm);

    let customer = factory
        .new_resource("org.store", "Customer", "  ", ResourceOptions::default())
        .unwrap();
    let err = customer.validate(&mm).unwrap_err();
    assert!(err.to_string().contains("empty identifier"));

    let mut mm2 = ModelManager::new();
    mm2.add_model_text(
        "namespace n\nparticipant P identified by id { o String id o String mandatory }",
        None,
    )
    .unwrap();
    let p = Factory::new(&mm2)
        .new_resource("n", "P", "1", ResourceOptions::default())
        .unwrap();
    let err = p.validate(&mm2).unwrap_err();
    assert!(err.to_string().contains("missing required property 'mandatory'"));
}

#[test]
fn class_declaration_re_resolves_against_the_live_registry() {
    let mut mm = fixture();
    let factory = Factory::new(&mm);
    let customer = factory
        .new_resource("org.store", "Customer", "C1", ResourceOptions::default())
        .unwrap();
    assert_eq!(
        customer.class_declaration(&mm).unwrap().name(),
        "Customer"
    );

    // drop the namespace: the same resource now fails to resolve, because
    // nothing is cached
    mm.delete_model_file("org.store").unwrap();
    assert!(customer.class_declaration(&mm).is_err());
}
