//! Contracts and named pointcuts on live objects

use serde_json::json;
use weft_core::{AdviceKind, AspectSpec, ContractError, ContractSpec, JoinPoint, PointcutQuery, PointcutSpec};
use weft_runtime::{Runtime, TypeName, Value, Visibility};

fn invar_cond() -> Runtime {
    let runtime = Runtime::new();
    runtime.define_type("InvarCond", None).unwrap();
    runtime
        .define_method("InvarCond", "good_action", Visibility::Public, |_| Ok(json!("good")))
        .unwrap();
    runtime
        .define_method("InvarCond", "bad_action", Visibility::Public, |call| {
            call.set_field("invar", json!(1))?;
            Ok(json!("bad"))
        })
        .unwrap();
    runtime
}

fn invar_is_zero(runtime: &Runtime, jp: &JoinPoint) -> bool {
    let value = jp
        .context()
        .and_then(|context| context.advised_object.as_object())
        .and_then(|object| runtime.field(object, "invar").ok().flatten())
        .unwrap_or_else(|| json!(0));
    value == json!(0)
}

#[test]
fn invariant_rejects_a_method_that_breaks_it() {
    let runtime = invar_cond();
    let observer = runtime.clone();
    runtime
        .contract(
            ContractSpec::invariant(PointcutSpec::new().type_name("InvarCond").method("/action$/"))
                .message("Must not change the invar value.")
                .check(move |jp| invar_is_zero(&observer, jp)),
        )
        .unwrap();

    let object = runtime.instantiate("InvarCond").unwrap();
    assert_eq!(runtime.invoke(&object, "good_action", vec![]).unwrap(), json!("good"));

    let err = runtime.invoke(&object, "bad_action", vec![]).unwrap_err();
    assert_eq!(
        err.downcast_ref::<ContractError>(),
        Some(&ContractError::InvariantAfter("Must not change the invar value.".into()))
    );

    let fresh = runtime.instantiate("InvarCond").unwrap();
    assert_eq!(runtime.invoke(&fresh, "good_action", vec![]).unwrap(), json!("good"));
}

#[test]
fn precondition_checks_arguments_and_can_be_removed() {
    let runtime = Runtime::new();
    runtime.define_type("PreCond", None).unwrap();
    runtime
        .define_method("PreCond", "action", Visibility::Public, |_| Ok(Value::Null))
        .unwrap();
    let contract = runtime
        .contract(
            ContractSpec::precondition(PointcutSpec::new().type_name("PreCond").method("action"))
                .check(|jp| jp.context().is_some_and(|context| !context.parameters.is_empty())),
        )
        .unwrap();

    let object = runtime.instantiate("PreCond").unwrap();
    let err = runtime.invoke(&object, "action", vec![]).unwrap_err();
    assert!(err.is::<ContractError>());
    assert!(format!("{:#}", err).contains("precondition failure: (no error message)"));
    assert!(runtime.invoke(&object, "action", vec![json!("a1")]).is_ok());

    contract.unadvise().unwrap();
    assert!(runtime.invoke(&object, "action", vec![]).is_ok());
}

#[test]
fn named_pointcuts_are_found_and_advised() {
    let runtime = invar_cond();
    runtime.define_type("Holder", None).unwrap();
    runtime
        .define_pointcut(
            "InvarCond",
            "actions",
            PointcutSpec::new().type_name("InvarCond").method("/action$/"),
        )
        .unwrap();
    runtime
        .define_pointcut("InvarCond", "good", PointcutSpec::new().type_name("InvarCond").method("good_action"))
        .unwrap();
    assert!(runtime
        .define_pointcut("Missing", "actions", PointcutSpec::new().type_name("InvarCond"))
        .is_err());

    let found = runtime
        .find_pointcuts(&PointcutQuery::new().type_name("InvarCond").type_name("Holder").named("actions"))
        .unwrap();
    assert_eq!(found.len(), 1);
    let actions = found.get(&TypeName::new("InvarCond"), "actions").unwrap().clone();
    assert_eq!(actions.join_points_matched().len(), 2);

    runtime
        .aspect(
            AspectSpec::new(AdviceKind::AfterReturning)
                .resolved_pointcut(actions)
                .advice(|jp| {
                    let context = jp.context_mut();
                    let value = context.returned_value.take().unwrap_or_default();
                    context.returned_value = Some(json!(format!("{}!", value.as_str().unwrap_or(""))));
                    Ok(Value::Null)
                }),
        )
        .unwrap();

    let object = runtime.instantiate("InvarCond").unwrap();
    assert_eq!(runtime.invoke(&object, "good_action", vec![]).unwrap(), json!("good!"));
    assert_eq!(runtime.invoke(&object, "bad_action", vec![]).unwrap(), json!("bad!"));
}
