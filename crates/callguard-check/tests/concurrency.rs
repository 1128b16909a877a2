//! Integration tests for checking calls made from many threads at once.

use std::sync::{Arc, Barrier};
use std::thread;

use callguard_check::TypeChecker;
use callguard_core::{Annotation, CallFrame, ContextId, ContractTable, Host, TypeId, Value};
use callguard_runtime::Runtime;

const THREADS: usize = 8;

fn int_contract() -> ContractTable {
    ContractTable::new().with("x", Annotation::Type(TypeId::INT))
}

#[test]
fn concurrent_first_calls_resolve_once() {
    let rt = Runtime::default();
    let checker = TypeChecker::default();
    checker.enable(&rt).unwrap();
    let f = rt.define_function(
        "f",
        &["x"],
        int_contract(),
        Arc::new(|frame: &CallFrame| Ok(frame.local(0).cloned().unwrap_or(Value::None))),
    );
    let barrier = Barrier::new(THREADS);

    thread::scope(|s| {
        for i in 0..THREADS {
            let (rt, f, barrier) = (&rt, &f, &barrier);
            s.spawn(move || {
                barrier.wait();
                let result = if i % 2 == 0 {
                    rt.call(ContextId(0), f, vec![Value::Int(i as i64)])
                } else {
                    rt.call(ContextId(0), f, vec![Value::from("odd")])
                };
                assert_eq!(result.is_ok(), i % 2 == 0);
            });
        }
    });

    assert_eq!(checker.resolutions(), Some(1));
    let stats = checker.stats().unwrap();
    assert_eq!(stats.intercepted, THREADS as u64);
    assert_eq!(stats.checked, (THREADS / 2) as u64);
    assert_eq!(stats.rejected, (THREADS / 2) as u64);
    // Ours, the heap's, and the single cached owner.
    assert_eq!(Arc::strong_count(&f), 3);
}

#[test]
fn contexts_share_one_cache() {
    let rt = Runtime::default();
    let contexts: Vec<ContextId> = (0..THREADS - 1).map(|_| rt.new_context()).collect();
    let checker = TypeChecker::default();
    checker.enable(&rt).unwrap();
    assert_eq!(rt.contexts().len(), THREADS);

    let f = rt.define_function(
        "f",
        &["x"],
        int_contract(),
        Arc::new(|_frame: &CallFrame| Ok(Value::None)),
    );
    let barrier = Barrier::new(contexts.len());

    thread::scope(|s| {
        for &context in &contexts {
            let (rt, f, barrier) = (&rt, &f, &barrier);
            s.spawn(move || {
                barrier.wait();
                for _ in 0..50 {
                    assert!(rt.call(context, f, vec![Value::Int(1)]).is_ok());
                    assert!(rt.call(context, f, vec![Value::Float(1.0)]).is_err());
                }
            });
        }
    });

    assert_eq!(checker.resolutions(), Some(1));
}

#[test]
fn destruction_during_calls_on_other_units() {
    let rt = Runtime::default();
    let checker = TypeChecker::default();
    checker.enable(&rt).unwrap();
    let busy = rt.define_function(
        "busy",
        &["x"],
        int_contract(),
        Arc::new(|_frame: &CallFrame| Ok(Value::None)),
    );
    let doomed: Vec<_> = (0..THREADS)
        .map(|i| {
            rt.define_function(
                &format!("doomed{i}"),
                &["x"],
                int_contract(),
                Arc::new(|_frame: &CallFrame| Ok(Value::None)),
            )
        })
        .collect();
    for f in &doomed {
        rt.call(ContextId(0), f, vec![Value::Int(0)]).unwrap();
    }
    assert_eq!(checker.cache_len(), Some(THREADS));

    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..200 {
                assert!(rt.call(ContextId(0), &busy, vec![Value::Int(1)]).is_ok());
            }
        });
        s.spawn(|| {
            for f in &doomed {
                rt.drop_function(f.id).unwrap();
                rt.destroy_unit(f.unit).unwrap();
            }
        });
    });

    // Only the busy unit is left.
    assert_eq!(checker.cache_len(), Some(1));
    for f in &doomed {
        assert_eq!(Arc::strong_count(f), 1);
    }
}
