//! Concurrent calls against the same and different objects.

mod common;

use common::{Fixture, Machine, Network};
use core::sync::atomic::Ordering;
use core::time::Duration;
use gridnode_engine::prelude::*;
use std::sync::Barrier;
use std::sync::mpsc;

const SETTLE: Duration = Duration::from_millis(100);

#[test]
fn concurrent_creates_of_same_object_admit_exactly_one() {
    let fx = Fixture::new();
    fx.probe.create_delay_ms.store(50, Ordering::SeqCst);
    let barrier = Barrier::new(2);

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..2)
            .map(|size| {
                let (fx, barrier) = (&fx, &barrier);
                s.spawn(move || {
                    barrier.wait();
                    fx.create_disk("d1", 10 + size)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let created = results
        .iter()
        .filter(|r| matches!(r, Ok(response) if response.is_success()))
        .count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(EngineError::ObjectExists(_))))
        .count();

    assert_eq!((created, rejected), (1, 1), "{results:?}");
    assert_eq!(fx.probe.creates(), 1);
    assert!(fx.engine.resource("disk").unwrap().guards().is_empty());
}

#[test]
fn creates_of_different_objects_all_succeed() {
    let fx = Fixture::new();
    let barrier = Barrier::new(8);

    std::thread::scope(|s| {
        for i in 0..8 {
            let (fx, barrier) = (&fx, &barrier);
            s.spawn(move || {
                barrier.wait();
                let response = fx.create_disk(&format!("d{i}"), 10).unwrap();
                assert!(response.is_success());
            });
        }
    });

    assert_eq!(fx.store.len(), 8);
    assert!(fx.engine.resource("disk").unwrap().guards().is_empty());
}

#[test]
fn shared_actions_run_alongside_readers_exclusive_ones_wait() {
    let fx = Fixture::new();
    fx.create_disk("d1", 10).unwrap();

    let guards = fx.engine.resource("disk").unwrap().guards();
    let guard = guards.enter(fx.key("d1").to_string());
    let reader = guard.read();

    std::thread::scope(|s| {
        let (read_tx, read_rx) = mpsc::channel();
        let fx_ref = &fx;
        s.spawn(move || {
            let result = fx_ref.call("disk", "get", "d1", &());
            read_tx.send(result.map(|r| r.is_success())).unwrap();
        });
        assert!(
            matches!(read_rx.recv_timeout(SETTLE * 10), Ok(Ok(true))),
            "read should not wait for another reader"
        );

        let (write_tx, write_rx) = mpsc::channel();
        s.spawn(move || {
            let result = fx_ref.call("disk", "resize", "d1", &20u64);
            write_tx.send(result.map(|r| r.is_success())).unwrap();
        });
        assert!(
            write_rx.recv_timeout(SETTLE).is_err(),
            "exclusive action must wait for readers"
        );

        drop(reader);
        assert!(matches!(write_rx.recv_timeout(SETTLE * 10), Ok(Ok(true))));
    });

    drop(guard);
    assert!(guards.is_empty());
}

#[test]
fn delete_waits_for_running_action_on_same_object() {
    let fx = Fixture::new();
    fx.create_disk("d1", 10).unwrap();

    let guards = fx.engine.resource("disk").unwrap().guards();
    let guard = guards.enter(fx.key("d1").to_string());
    let reader = guard.read();

    std::thread::scope(|s| {
        let (tx, rx) = mpsc::channel();
        let fx_ref = &fx;
        s.spawn(move || {
            tx.send(fx_ref.delete("disk", "d1").is_ok()).unwrap();
        });

        assert!(rx.recv_timeout(SETTLE).is_err());
        assert!(fx.exists("d1"));

        drop(reader);
        assert_eq!(rx.recv_timeout(SETTLE * 10), Ok(true));
    });

    drop(guard);
    assert!(!fx.exists("d1"));
}

#[test]
fn lock_on_one_object_does_not_block_another() {
    let fx = Fixture::new();
    fx.create_disk("d1", 10).unwrap();
    fx.create_disk("d2", 10).unwrap();

    let guards = fx.engine.resource("disk").unwrap().guards();
    let guard = guards.enter(fx.key("d1").to_string());
    let _writer = guard.lock();

    let response = fx.call("disk", "resize", "d2", &40u64).unwrap();

    assert!(response.is_success());
    assert_eq!(guards.len(), 1);
}

#[test]
fn resources_share_one_guard_table() {
    let fx = Fixture::new();
    let guard = fx.engine.guards().enter(fx.key("x").to_string());

    for kind in fx.engine.kinds() {
        assert_eq!(fx.engine.resource(kind).unwrap().guards().ref_count(guard.id()), 1);
    }
}

#[test]
fn concurrent_creates_under_different_kinds_admit_exactly_one() {
    let fx = Fixture::new();
    fx.probe.create_delay_ms.store(50, Ordering::SeqCst);
    let barrier = Barrier::new(2);

    let (disk, vm) = std::thread::scope(|s| {
        let disk = s.spawn(|| {
            barrier.wait();
            fx.create_disk("x", 10)
        });
        let vm = s.spawn(|| {
            barrier.wait();
            fx.call(
                "vm",
                "create",
                "x",
                &Machine {
                    cpu: 1,
                    disks: Vec::new(),
                },
            )
        });
        (disk.join().unwrap(), vm.join().unwrap())
    });

    let rejected = [&disk, &vm]
        .iter()
        .filter(|r| matches!(r, Err(EngineError::ObjectExists(_))))
        .count();
    assert_eq!(rejected, 1, "disk={disk:?} vm={vm:?}");
    assert_eq!(fx.store.len(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Dependency reservations
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn concurrent_reservations_of_exclusive_disk_admit_one_master() {
    let fx = Fixture::new();
    fx.create_disk("d1", 10).unwrap();
    let d1 = fx.key("d1");
    let barrier = Barrier::new(2);

    let results: Vec<Result<(), EngineError>> = std::thread::scope(|s| {
        let handles: Vec<_> = ["vm1", "vm2"]
            .into_iter()
            .map(|vm| {
                let (fx, barrier, d1) = (&fx, &barrier, &d1);
                s.spawn(move || {
                    barrier.wait();
                    fx.engine.add_dependency(&fx.key(vm), d1, || {
                        std::thread::sleep(Duration::from_millis(50));
                        Ok::<_, EngineError>(())
                    })
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let in_use = results
        .iter()
        .filter(|r| matches!(r, Err(EngineError::ObjectInUse(_))))
        .count();
    assert_eq!(in_use, 1, "{results:?}");
    assert_eq!(fx.store.masters(&d1).unwrap().len(), 1);
}

#[test]
fn concurrent_opposite_reservations_cannot_form_a_cycle() {
    let fx = Fixture::new();
    for net in ["net1", "net2"] {
        let network = Network {
            subnet: "10.30.0.0/16".into(),
        };
        fx.call("network", "create", net, &network).unwrap();
    }
    let (a, b) = (fx.key("net1"), fx.key("net2"));
    let barrier = Barrier::new(2);

    let results: Vec<Result<(), EngineError>> = std::thread::scope(|s| {
        let handles: Vec<_> = [(&a, &b), (&b, &a)]
            .into_iter()
            .map(|(master, slave)| {
                let barrier = &barrier;
                let engine = &fx.engine;
                s.spawn(move || {
                    barrier.wait();
                    engine.add_dependency(master, slave, || {
                        std::thread::sleep(Duration::from_millis(50));
                        Ok::<_, EngineError>(())
                    })
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let cycles = results
        .iter()
        .filter(|r| matches!(r, Err(EngineError::DependencyCycle { .. })))
        .count();
    assert_eq!(cycles, 1, "{results:?}");
    let edges = fx.store.masters(&a).unwrap().len() + fx.store.masters(&b).unwrap().len();
    assert_eq!(edges, 1);
}
