//! Integration tests for advice running through the runtime

use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use thiserror::Error;
use weft_core::{AdviceKind, AspectSpec, JoinPoint, MethodOption, PointcutSpec};
use weft_runtime::{AttributeAccess, Runtime, RuntimeError, TargetRef, TypeName, Value, Visibility};

type Log = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Error)]
#[error("foo went wrong")]
struct FooError;

#[derive(Debug, Error)]
#[error("bar went wrong")]
struct BarError;

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().clone()
}

/// `Base#describe`, `Watchful < Base` with `greet(name)` and `explode`
fn runtime(log: &Log) -> Runtime {
    let runtime = Runtime::new();
    runtime.define_type("Base", None).unwrap();
    runtime.define_type("Watchful", Some("Base")).unwrap();

    let calls = Arc::clone(log);
    runtime
        .define_method("Watchful", "greet", Visibility::Public, move |call| {
            calls.lock().push("call".to_string());
            Ok(json!(format!("Hello, {}", call.argument(0)?.as_str().unwrap_or("?"))))
        })
        .unwrap();
    runtime
        .define_method("Watchful", "explode", Visibility::Public, |call| {
            match call.argument(0)?.as_str() {
                Some("foo") => Err(FooError.into()),
                _ => Err(BarError.into()),
            }
        })
        .unwrap();
    runtime
        .define_method("Base", "describe", Visibility::Public, |call| {
            Ok(json!(call.receiver().type_name().to_string()))
        })
        .unwrap();
    runtime
}

fn recording(kind: AdviceKind, log: &Log, label: &str) -> AspectSpec {
    let log = Arc::clone(log);
    let label = label.to_string();
    AspectSpec::new(kind).advice(move |jp| {
        if jp.context().map_or(false, |context| context.can_proceed()) {
            log.lock().push(format!("{}-enter", label));
            let value = jp.proceed()?;
            log.lock().push(format!("{}-exit", label));
            Ok(value)
        } else {
            log.lock().push(label.clone());
            Ok(Value::Null)
        }
    })
}

fn greet_join_point() -> JoinPoint {
    JoinPoint::for_type("Watchful", "greet")
}

#[test]
fn test_before_advice_sees_arguments_and_keeps_result() {
    let log = log();
    let runtime = runtime(&log);
    let names: Log = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&names);

    let _aspect = runtime
        .aspect(
            AspectSpec::new(AdviceKind::Before)
                .pointcut(PointcutSpec::new().type_name("Watchful").method("greet"))
                .advice(move |jp| {
                    let name = jp.context_mut().parameters[0].as_str().unwrap_or_default().to_string();
                    seen.lock().push(name);
                    Ok(Value::Null)
                }),
        )
        .unwrap();

    let watchful = runtime.instantiate("Watchful").unwrap();
    let result = runtime.invoke(&watchful, "greet", vec![json!("Ada")]).unwrap();
    assert_eq!(result, json!("Hello, Ada"));
    assert_eq!(entries(&names), vec!["Ada"]);
}

#[test]
fn test_around_advice_nests_last_added_outermost() {
    let log = log();
    let runtime = runtime(&log);
    let _a = runtime
        .aspect(recording(AdviceKind::Around, &log, "A").type_name("Watchful").method("greet"))
        .unwrap();
    let _b = runtime
        .aspect(recording(AdviceKind::Around, &log, "B").type_name("Watchful").method("greet"))
        .unwrap();

    let watchful = runtime.instantiate("Watchful").unwrap();
    runtime.invoke(&watchful, "greet", vec![json!("Ada")]).unwrap();
    assert_eq!(
        entries(&log),
        vec!["B-enter", "A-enter", "call", "A-exit", "B-exit"]
    );
}

#[test]
fn test_kinds_run_in_priority_order_regardless_of_insertion() {
    let log = log();
    let runtime = runtime(&log);
    for (kind, label) in [
        (AdviceKind::Before, "before1"),
        (AdviceKind::Around, "around1"),
        (AdviceKind::After, "after1"),
    ] {
        runtime
            .aspect(recording(kind, &log, label).type_name("Watchful").method("greet"))
            .unwrap();
    }

    let watchful = runtime.instantiate("Watchful").unwrap();
    runtime.invoke(&watchful, "greet", vec![json!("Ada")]).unwrap();
    assert_eq!(
        entries(&log),
        vec!["around1-enter", "before1", "call", "after1", "around1-exit"]
    );
}

#[test]
fn test_around_without_proceed_skips_everything_inside() {
    let log = log();
    let runtime = runtime(&log);
    runtime
        .aspect(recording(AdviceKind::Before, &log, "before1").type_name("Watchful").method("greet"))
        .unwrap();
    runtime
        .aspect(
            AspectSpec::new(AdviceKind::Around)
                .type_name("Watchful")
                .method("greet")
                .advice(|_| Ok(json!("intercepted"))),
        )
        .unwrap();

    let watchful = runtime.instantiate("Watchful").unwrap();
    let result = runtime.invoke(&watchful, "greet", vec![json!("Ada")]).unwrap();
    assert_eq!(result, json!("intercepted"));
    assert!(entries(&log).is_empty());
}

#[test]
fn test_around_can_replace_arguments() {
    let log = log();
    let runtime = runtime(&log);
    runtime
        .aspect(
            AspectSpec::new(AdviceKind::Around)
                .type_name("Watchful")
                .method("greet")
                .advice(|jp| jp.proceed_with(Some(vec![json!("Grace")]), None)),
        )
        .unwrap();

    let watchful = runtime.instantiate("Watchful").unwrap();
    assert_eq!(
        runtime.invoke(&watchful, "greet", vec![json!("Ada")]).unwrap(),
        json!("Hello, Grace")
    );
}

#[test]
fn test_after_returning_replaces_the_result() {
    let log = log();
    let runtime = runtime(&log);
    runtime
        .aspect(
            AspectSpec::new(AdviceKind::AfterReturning)
                .type_name("Watchful")
                .method("greet")
                .advice(|jp| {
                    let context = jp.context_mut();
                    assert_eq!(context.returned_value, Some(json!("Hello, Ada")));
                    context.returned_value = Some(json!("replaced"));
                    Ok(Value::Null)
                }),
        )
        .unwrap();

    let watchful = runtime.instantiate("Watchful").unwrap();
    assert_eq!(
        runtime.invoke(&watchful, "greet", vec![json!("Ada")]).unwrap(),
        json!("replaced")
    );
}

#[test]
fn test_after_raising_only_sees_matching_errors() {
    let log = log();
    let runtime = runtime(&log);
    runtime
        .aspect(
            recording(AdviceKind::AfterRaising, &log, "rescued")
                .exception::<FooError>()
                .type_name("Watchful")
                .method("explode"),
        )
        .unwrap();

    let watchful = runtime.instantiate("Watchful").unwrap();
    let err = runtime.invoke(&watchful, "explode", vec![json!("bar")]).unwrap_err();
    assert!(err.is::<BarError>());
    assert_eq!(err.to_string(), "bar went wrong");
    assert!(entries(&log).is_empty());

    let err = runtime.invoke(&watchful, "explode", vec![json!("foo")]).unwrap_err();
    assert!(err.is::<FooError>());
    assert_eq!(entries(&log), vec!["rescued"]);
}

#[test]
fn test_after_raising_can_recover() {
    let log = log();
    let runtime = runtime(&log);
    runtime
        .aspect(
            AspectSpec::new(AdviceKind::AfterRaising)
                .type_name("Watchful")
                .method("explode")
                .advice(|jp| {
                    let context = jp.context_mut();
                    context.clear_raised_error();
                    context.returned_value = Some(json!("recovered"));
                    Ok(Value::Null)
                }),
        )
        .unwrap();

    let watchful = runtime.instantiate("Watchful").unwrap();
    assert_eq!(
        runtime.invoke(&watchful, "explode", vec![json!("foo")]).unwrap(),
        json!("recovered")
    );
}

#[test]
fn test_failing_advice_reports_where_it_ran() {
    let log = log();
    let runtime = runtime(&log);
    runtime
        .aspect(
            AspectSpec::new(AdviceKind::Before)
                .type_name("Watchful")
                .method("greet")
                .advice(|_| Err(FooError.into())),
        )
        .unwrap();

    let watchful = runtime.instantiate("Watchful").unwrap();
    let err = runtime.invoke(&watchful, "greet", vec![json!("Ada")]).unwrap_err();
    assert!(err.is::<FooError>());
    assert_eq!(
        format!("{:#}", err),
        "Exception raised while executing \"before\" advice for \"Watchful#greet\": foo went wrong"
    );
    assert!(entries(&log).is_empty());
}

#[test]
fn test_unadvise_restores_original_behavior() {
    let log = log();
    let runtime = runtime(&log);
    let watchful = runtime.instantiate("Watchful").unwrap();
    let before = runtime.invoke(&watchful, "greet", vec![json!("Ada")]).unwrap();

    let aspect = runtime
        .aspect(
            AspectSpec::new(AdviceKind::Around)
                .type_name("Watchful")
                .method("greet")
                .advice(|_| Ok(json!("intercepted"))),
        )
        .unwrap();
    assert!(runtime.is_intercepted(&greet_join_point()));
    assert_eq!(aspect.unadvise().unwrap(), 1);
    assert_eq!(aspect.unadvise().unwrap(), 0);

    assert!(!runtime.is_intercepted(&greet_join_point()));
    assert!(runtime.registry().is_empty());
    assert_eq!(runtime.invoke(&watchful, "greet", vec![json!("Ada")]).unwrap(), before);
}

#[test]
fn test_unadvising_one_of_two_keeps_the_other_in_place() {
    let log = log();
    let runtime = runtime(&log);
    let first = runtime
        .aspect(recording(AdviceKind::Before, &log, "before1").type_name("Watchful").method("greet"))
        .unwrap();
    let _second = runtime
        .aspect(recording(AdviceKind::After, &log, "after1").type_name("Watchful").method("greet"))
        .unwrap();

    first.unadvise().unwrap();
    let watchful = runtime.instantiate("Watchful").unwrap();
    runtime.invoke(&watchful, "greet", vec![json!("Ada")]).unwrap();
    assert_eq!(entries(&log), vec!["call", "after1"]);
    assert_eq!(
        runtime.registry().chain(&greet_join_point()).unwrap().kinds(),
        vec![AdviceKind::After]
    );
}

#[test]
fn test_object_advice_wraps_type_advice() {
    let log = log();
    let runtime = runtime(&log);
    let watchful = runtime.instantiate("Watchful").unwrap();
    let other = runtime.instantiate("Watchful").unwrap();

    let on_type = runtime
        .aspect(recording(AdviceKind::Around, &log, "type").type_name("Watchful").method("greet"))
        .unwrap();
    let on_object = runtime
        .aspect(
            recording(AdviceKind::Around, &log, "object")
                .object(watchful.clone())
                .method("greet"),
        )
        .unwrap();

    runtime.invoke(&watchful, "greet", vec![json!("Ada")]).unwrap();
    assert_eq!(
        entries(&log),
        vec!["object-enter", "type-enter", "call", "type-exit", "object-exit"]
    );

    log.lock().clear();
    runtime.invoke(&other, "greet", vec![json!("Ada")]).unwrap();
    assert_eq!(entries(&log), vec!["type-enter", "call", "type-exit"]);

    log.lock().clear();
    on_type.unadvise().unwrap();
    runtime.invoke(&watchful, "greet", vec![json!("Ada")]).unwrap();
    assert_eq!(entries(&log), vec!["object-enter", "call", "object-exit"]);

    log.lock().clear();
    on_object.unadvise().unwrap();
    runtime.invoke(&watchful, "greet", vec![json!("Ada")]).unwrap();
    assert_eq!(entries(&log), vec!["call"]);
}

#[test]
fn test_inherited_methods_run_every_type_chain() {
    let log = log();
    let runtime = runtime(&log);
    runtime
        .aspect(recording(AdviceKind::Before, &log, "base").type_name("Base").method("describe"))
        .unwrap();
    runtime
        .aspect(recording(AdviceKind::Before, &log, "watchful").type_name("Watchful").method("describe"))
        .unwrap();

    let watchful = runtime.instantiate("Watchful").unwrap();
    assert_eq!(
        runtime.invoke(&watchful, "describe", vec![]).unwrap(),
        json!("Watchful")
    );
    assert_eq!(entries(&log), vec!["watchful", "base"]);

    log.lock().clear();
    let base = runtime.instantiate("Base").unwrap();
    runtime.invoke(&base, "describe", vec![]).unwrap();
    assert_eq!(entries(&log), vec!["base"]);
}

#[test]
fn test_descendents_and_excluded_ancestor_methods() {
    let log = log();
    let runtime = runtime(&log);
    let pointcut = runtime
        .pointcut(
            PointcutSpec::new()
                .type_and_descendents(TypeName::new("Base"))
                .method("describe"),
        )
        .unwrap();
    assert_eq!(pointcut.join_points_matched().len(), 2);

    let own_only = runtime
        .pointcut(
            PointcutSpec::new()
                .type_name("Watchful")
                .method("all")
                .method_option(MethodOption::ExcludeAncestorMethods),
        )
        .unwrap();
    let names: Vec<String> = own_only
        .join_points_matched()
        .iter()
        .map(|jp| jp.method_name().to_string())
        .collect();
    assert_eq!(names, vec!["explode", "greet"]);
}

#[test]
fn test_class_methods_are_advised_separately() {
    let log = log();
    let runtime = runtime(&log);
    runtime
        .define_class_method("Watchful", "create", Visibility::Public, |_| Ok(json!("new")))
        .unwrap();
    runtime
        .aspect(
            recording(AdviceKind::Before, &log, "class")
                .type_name("Watchful")
                .method("create")
                .method_option(MethodOption::Class),
        )
        .unwrap();

    assert_eq!(runtime.invoke_class("Watchful", "create", vec![]).unwrap(), json!("new"));
    assert_eq!(entries(&log), vec!["class"]);
}

#[test]
fn test_attribute_writers_can_be_advised() {
    let log = log();
    let runtime = runtime(&log);
    runtime
        .define_attribute("Watchful", "name", AttributeAccess::Accessor)
        .unwrap();
    let aspect = runtime
        .aspect(
            AspectSpec::new(AdviceKind::Before)
                .type_name("Watchful")
                .attribute("name")
                .attribute_option(weft_core::AttributeOption::Writers)
                .advice(|jp| {
                    let context = jp.context_mut();
                    let upper = context.parameters[0].as_str().unwrap_or_default().to_uppercase();
                    context.parameters[0] = json!(upper);
                    Ok(Value::Null)
                }),
        )
        .unwrap();
    assert_eq!(aspect.join_points_matched().len(), 1);

    let watchful = runtime.instantiate("Watchful").unwrap();
    runtime.invoke(&watchful, "name=", vec![json!("ada")]).unwrap();
    assert_eq!(runtime.invoke(&watchful, "name", vec![]).unwrap(), json!("ADA"));
}

#[test]
fn test_callbacks_reach_the_method_through_advice() {
    let log = log();
    let runtime = runtime(&log);
    runtime
        .define_method("Watchful", "each", Visibility::Public, |call| call.yield_to(&[json!(21)]))
        .unwrap();
    runtime
        .aspect(
            AspectSpec::new(AdviceKind::Around)
                .type_name("Watchful")
                .method("each")
                .advice(|jp| {
                    assert!(jp.context().and_then(|c| c.callback.as_ref()).is_some());
                    jp.proceed()
                }),
        )
        .unwrap();

    let watchful = runtime.instantiate("Watchful").unwrap();
    let doubled = runtime
        .invoke_with_callback(
            &watchful,
            "each",
            vec![],
            weft_core::callback(|args| Ok(json!(args[0].as_i64().unwrap_or(0) * 2))),
        )
        .unwrap();
    assert_eq!(doubled, json!(42));
}

#[test]
fn test_advice_does_not_bypass_visibility() {
    let log = log();
    let runtime = runtime(&log);
    runtime
        .define_method("Watchful", "secret", Visibility::Private, |_| Ok(json!("hidden")))
        .unwrap();
    runtime
        .aspect(
            recording(AdviceKind::Before, &log, "secret")
                .type_name("Watchful")
                .method("secret")
                .method_option(MethodOption::Private),
        )
        .unwrap();

    let watchful = runtime.instantiate("Watchful").unwrap();
    let err = runtime.invoke(&watchful, "secret", vec![]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RuntimeError>(),
        Some(RuntimeError::NotPublic { .. })
    ));
    assert!(entries(&log).is_empty());

    let receiver = TargetRef::Object(watchful);
    assert_eq!(runtime.send(&receiver, "secret", vec![], None).unwrap(), json!("hidden"));
    assert_eq!(entries(&log), vec!["secret"]);
}

#[test]
fn test_concurrent_advise_and_unadvise() {
    let log = log();
    let runtime = runtime(&log);
    let fired = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|index| {
            let runtime = runtime.clone();
            let fired = Arc::clone(&fired);
            thread::spawn(move || {
                let aspect = runtime
                    .aspect(
                        AspectSpec::new(AdviceKind::Before)
                            .type_name("Watchful")
                            .method("greet")
                            .advice(move |_| {
                                fired.fetch_add(1, Ordering::SeqCst);
                                Ok(Value::Null)
                            }),
                    )
                    .unwrap();
                if index % 2 == 0 {
                    aspect.unadvise().unwrap();
                }
                aspect
            })
        })
        .collect();
    let aspects: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(runtime.registry().chain(&greet_join_point()).unwrap().len(), 4);
    let watchful = runtime.instantiate("Watchful").unwrap();
    runtime.invoke(&watchful, "greet", vec![json!("Ada")]).unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 4);

    for aspect in &aspects {
        aspect.unadvise().unwrap();
    }
    assert!(!runtime.is_intercepted(&greet_join_point()));
}
