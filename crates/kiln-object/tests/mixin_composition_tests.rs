//! Integration tests for mixin composition and super chaining

use std::cell::RefCell;
use std::rc::Rc;

use kiln_object::{access, Class, ComputedProperty, Mixin, ObjectError, Properties, Value};
use pretty_assertions::assert_eq;

fn greeter(suffix: &'static str) -> Mixin {
    Mixin::builder()
        .name(suffix)
        .method("greet", move |call| {
            let inner = call.super_forward()?;
            Ok(Value::string(format!("{}{}", inner, suffix)))
        })
        .build()
}

#[test]
fn test_super_walks_application_order_then_parents() {
    let base = Class::core_object()
        .extend_named(
            "Base",
            [Mixin::builder()
                .method("greet", |call| Ok(Value::string(format!("hi {}", call.arg(0)))))
                .build()],
        )
        .unwrap();
    let child = base.extend_named("Child", [greeter("-a"), greeter("-b")]).unwrap();
    let grandchild = child.extend([greeter("-c")]).unwrap();

    let obj = grandchild.create().unwrap();
    assert_eq!(obj.send("greet", &[Value::from("tom")]).unwrap(), Value::from("hi tom-a-b-c"));
}

#[test]
fn test_absent_super_is_inert_unless_required() {
    let class = Class::core_object()
        .extend([Mixin::builder()
            .method("quiet", |call| {
                assert!(!call.has_super());
                call.super_call(&[])
            })
            .method("loud", |call| call.super_value(&[]))
            .build()])
        .unwrap();
    let obj = class.create().unwrap();

    assert_eq!(obj.send("quiet", &[]).unwrap(), Value::Undefined);
    assert!(matches!(
        obj.send("loud", &[]),
        Err(ObjectError::MissingSuper { ref name }) if name == "loud"
    ));
}

#[test]
fn test_same_mixin_applied_once() {
    let count = Rc::new(RefCell::new(0));
    let counter = count.clone();
    let tagged = Mixin::builder()
        .concatenated("tags")
        .value("tags", Value::list([Value::from("tagged")]))
        .method("touch", move |call| {
            *counter.borrow_mut() += 1;
            call.super_forward()
        })
        .build();

    let once = Class::core_object().extend([tagged.clone()]).unwrap();
    let twice = once.extend([tagged.clone(), tagged.clone()]).unwrap();

    let obj = twice.create().unwrap();
    obj.send("touch", &[]).unwrap();
    assert_eq!(*count.borrow(), 1);
    assert_eq!(access::get(&obj, "tags").unwrap(), Value::list([Value::from("tagged")]));
    assert_eq!(twice.applied_mixins(), once.applied_mixins());
    assert!(tagged.applies_to(&twice));
    assert!(tagged.detect(&obj));
}

#[test]
fn test_composition_is_deterministic() {
    let a = Mixin::builder().value("x", 1).method("m", |_| Ok(Value::from(1))).build();
    let b = Mixin::builder().value("x", 2).value("y", 3).build();

    let first = Class::core_object().extend([a.clone(), b.clone()]).unwrap();
    let second = Class::core_object().extend([a, b]).unwrap();

    let names = |class: &Class| class.entry_names().map(str::to_string).collect::<Vec<_>>();
    assert_eq!(names(&first), names(&second));
    assert_eq!(
        access::get(&first.create().unwrap(), "x").unwrap(),
        access::get(&second.create().unwrap(), "x").unwrap()
    );
}

#[test]
fn test_concatenated_values_combine_at_create() {
    let class = Class::core_object()
        .extend([Mixin::builder()
            .concatenated("classNames")
            .merged("options")
            .value("classNames", Value::list([Value::from("base")]))
            .value("options", Properties::new().with("a", 1))
            .build()])
        .unwrap();

    let obj = class
        .create_with(
            Properties::new()
                .with("classNames", "extra")
                .with("options", Properties::new().with("b", 2)),
        )
        .unwrap();

    assert_eq!(
        access::get(&obj, "classNames").unwrap(),
        Value::list([Value::from("base"), Value::from("extra")])
    );
    assert_eq!(
        access::get(&obj, "options").unwrap(),
        Value::map(Properties::new().with("a", 1).with("b", 2))
    );
}

#[test]
fn test_invalid_dependent_key_fails_extend() {
    let result = Class::core_object().extend([Mixin::builder()
        .computed("broken", ComputedProperty::new(|_, _| Ok(Value::Null)).depends_on(["a.{b"]))
        .build()]);
    assert!(matches!(result, Err(ObjectError::InvalidDependentKey(_))));
}

#[test]
fn test_includes_are_flattened_before_the_host() {
    let inner = Mixin::builder().value("layer", "inner").value("only_inner", true).build();
    let outer = Mixin::builder().include(&inner).value("layer", "outer").build();

    let class = Class::core_object().extend([outer]).unwrap();
    let obj = class.create().unwrap();

    assert_eq!(access::get(&obj, "layer").unwrap(), Value::from("outer"));
    assert_eq!(access::get(&obj, "only_inner").unwrap(), Value::from(true));
    assert!(inner.applies_to(&class));
}
