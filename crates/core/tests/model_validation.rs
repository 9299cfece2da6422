//! Registry-level validation behavior across files: inheritance, imports,
//! identifier rules, and the declared property ordering contract.

use concerto_core::{DeclarationKind, ModelManager, PropertyKind};

fn manager(sources: &[&str]) -> ModelManager {
    let mut mm = ModelManager::new();
    let pairs: Vec<(&str, Option<&str>)> = sources.iter().map(|s| (*s, None)).collect();
    mm.add_model_texts(&pairs).expect("model should validate");
    mm
}

#[test]
fn inherited_properties_come_after_own_in_declaration_order() {
    let mm = manager(&[r#"
namespace org.acme

abstract asset Base identified by id {
    o String id
    o String created
}

asset Child extends Base {
    o String childA
    o Integer childB optional
}

asset Grandchild extends Child {
    o String leaf
}
"#]);

    let decl = mm.get_type("org.acme.Grandchild").unwrap();
    let names: Vec<&str> = decl
        .properties(&mm)
        .unwrap()
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(names, vec!["leaf", "childA", "childB", "id", "created"]);

    // the identifier is inherited from the root of the chain
    assert_eq!(decl.identifier_field_name(&mm).unwrap(), Some("id"));
}

#[test]
fn duplicate_name_across_chain_is_rejected() {
    let mut mm = ModelManager::new();
    let err = mm
        .add_model_texts(&[(
            r#"
namespace org.acme
asset Base identified by id { o String id o String color }
asset Child extends Base { o String color }
"#,
            None,
        )])
        .unwrap_err();
    assert!(err.to_string().contains("duplicate property name 'color'"));
}

#[test]
fn identifier_constraint_messages_are_distinct() {
    let mut mm = ModelManager::new();

    let missing = "namespace a\nasset A identified by nope { o String x }";
    let err = mm.add_model_texts(&[(missing, None)]).unwrap_err();
    assert!(err.to_string().contains("is not a property"));

    let not_string = "namespace a\nasset A identified by n { o Integer n }";
    let err = mm.add_model_texts(&[(not_string, None)]).unwrap_err();
    assert!(err.to_string().contains("must be a String field"));

    let optional = "namespace a\nasset A identified by n { o String n optional }";
    let err = mm.add_model_texts(&[(optional, None)]).unwrap_err();
    assert!(err.to_string().contains("cannot be optional"));
}

#[test]
fn supertype_cycles_are_rejected() {
    let mut mm = ModelManager::new();
    let err = mm
        .add_model_texts(&[(
            r#"
namespace org.acme
concept A extends B { o String a }
concept B extends A { o String b }
"#,
            None,
        )])
        .unwrap_err();
    assert!(err.to_string().contains("cyclic supertype chain"));
}

#[test]
fn unresolvable_supertype_is_rejected() {
    let mut mm = ModelManager::new();
    let err = mm
        .add_model_texts(&[("namespace a\nconcept A extends Ghost { o String x }", None)])
        .unwrap_err();
    assert!(err.to_string().contains("could not find super type 'Ghost'"));
}

#[test]
fn kind_mismatched_supertype_is_rejected() {
    let mut mm = ModelManager::new();
    let err = mm
        .add_model_texts(&[(
            "namespace a\nparticipant P identified by i { o String i }\nasset A identified by j extends P { o String j }",
            None,
        )])
        .unwrap_err();
    assert!(err.to_string().contains("cannot extend"));
}

#[test]
fn wildcard_imports_resolve_against_the_target_file() {
    let mm = manager(&[
        "namespace org.people\nparticipant Person identified by email { o String email }",
        r#"
namespace org.zoo
import org.people.*

asset Cage identified by id {
    o String id
    --> Person keeper
}
"#,
    ]);
    let decl = mm.get_type("org.zoo.Cage").unwrap();
    let keeper = decl.get_property(&mm, "keeper").unwrap().unwrap();
    assert_eq!(
        keeper.fully_qualified_type_name(&mm).unwrap(),
        "org.people.Person"
    );
}

#[test]
fn unresolved_import_fails_validation() {
    let mut mm = ModelManager::new();
    let err = mm
        .add_model_texts(&[(
            "namespace a\nimport org.ghost.Thing\nconcept C { o String x }",
            None,
        )])
        .unwrap_err();
    assert!(err.to_string().contains("org.ghost"));
}

#[test]
fn relationships_require_identified_targets() {
    let mut mm = ModelManager::new();
    let err = mm
        .add_model_texts(&[(
            r#"
namespace a
concept Address { o String street }
asset House identified by id {
    o String id
    --> Address addr
}
"#,
            None,
        )])
        .unwrap_err();
    assert!(err.to_string().contains("must target an identified type"));

    let mut mm = ModelManager::new();
    let err = mm
        .add_model_texts(&[(
            "namespace a\nasset B identified by i { o String i --> String s }",
            None,
        )])
        .unwrap_err();
    assert!(err.to_string().contains("cannot target primitive type"));
}

#[test]
fn enum_declarations_expose_their_values() {
    let mm = manager(&["namespace a\nenum Color { o RED o GREEN o BLUE }"]);
    let decl = mm.get_type("a.Color").unwrap();
    assert!(decl.is_enum());
    assert_eq!(decl.kind(), DeclarationKind::Enum);
    let props = decl.properties(&mm).unwrap();
    assert_eq!(props.len(), 3);
    assert!(props
        .iter()
        .all(|p| matches!(p.kind, PropertyKind::EnumValue)));
}

#[test]
fn assignability_follows_the_supertype_chain() {
    let mm = manager(&[r#"
namespace v
abstract asset Vehicle identified by vin { o String vin }
asset Car extends Vehicle { o String model optional }
asset Truck extends Vehicle { o Integer axles optional }
"#]);
    use concerto_core::modelutil::is_assignable_to;
    assert!(is_assignable_to(&mm, "v.Car", "v.Vehicle").unwrap());
    assert!(is_assignable_to(&mm, "v.Car", "v.Car").unwrap());
    assert!(!is_assignable_to(&mm, "v.Car", "v.Truck").unwrap());
    assert!(is_assignable_to(&mm, "v.Ghost", "v.Vehicle").is_err());
}
