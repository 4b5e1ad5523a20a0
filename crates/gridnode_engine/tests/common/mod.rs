//! Shared workloads and engine fixtures for engine integration tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use core::time::Duration;
use std::sync::Arc;

use gridnode_engine::prelude::*;
use gridnode_store::MemoryStore;
use serde::{Deserialize, Serialize};

pub const USER: UserId = 7;
pub const SPACE: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Workload)]
#[workload(kind = "disk")]
pub struct Disk {
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Workload)]
#[workload(kind = "vm")]
pub struct Machine {
    pub cpu: u8,
    pub disks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Workload)]
#[workload(kind = "network")]
pub struct Network {
    pub subnet: String,
}

const DISKS: BaseResource<Disk> = BaseResource::new();
const MACHINES: BaseResource<Machine> = BaseResource::new();
const NETWORKS: BaseResource<Network> = BaseResource::new();

/// Counts handler invocations and injects failures.
#[derive(Debug, Default)]
pub struct Probe {
    pub creates: AtomicUsize,
    pub deletes: AtomicUsize,
    pub reads: AtomicUsize,
    pub fail_delete: AtomicBool,
    /// How long `create` holds the object lock.
    pub create_delay_ms: AtomicUsize,
}

impl Probe {
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

pub fn disk_resource(probe: &Arc<Probe>) -> Resource {
    let on_create = Arc::clone(probe);
    let on_read = Arc::clone(probe);
    let on_delete = Arc::clone(probe);

    ResourceBuilder::new::<Disk>(ResourceFlags::EXCLUSIVE)
        .with_action(
            "create",
            typed(move |ctx: &dyn Context, disk: Disk| -> Result<(), ActionError> {
                on_create.creates.fetch_add(1, Ordering::SeqCst);
                let delay = on_create.create_delay_ms.load(Ordering::SeqCst) as u64;
                if delay > 0 {
                    std::thread::sleep(Duration::from_millis(delay));
                }
                DISKS.set(ctx, &disk)?;
                Ok(())
            }),
            ActionFlags::CREATE,
        )
        .with_action(
            "get",
            typed(move |ctx: &dyn Context, (): ()| -> Result<Disk, ActionError> {
                on_read.reads.fetch_add(1, Ordering::SeqCst);
                Ok(DISKS.current(ctx)?)
            }),
            ActionFlags::empty(),
        )
        .with_action(
            "resize",
            typed(|ctx: &dyn Context, size: u64| -> Result<Disk, ActionError> {
                let mut disk = DISKS.current(ctx)?;
                if size < disk.size {
                    return Err(ActionError::failed("disks cannot shrink"));
                }
                disk.size = size;
                DISKS.set(ctx, &disk)?;
                Ok(disk)
            }),
            ActionFlags::EXCLUSIVE,
        )
        .with_delete(typed(
            move |_: &dyn Context, (): ()| -> Result<(), ActionError> {
                if on_delete.fail_delete.load(Ordering::SeqCst) {
                    return Err(ActionError::failed("disk is busy"));
                }
                on_delete.deletes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        ))
        .build()
}

pub fn network_resource() -> Resource {
    ResourceBuilder::new::<Network>(ResourceFlags::shareable())
        .with_action(
            "create",
            typed(|ctx: &dyn Context, network: Network| -> Result<(), ActionError> {
                Ok(NETWORKS.set(ctx, &network)?)
            }),
            ActionFlags::CREATE,
        )
        .with_delete(typed(|_: &dyn Context, (): ()| -> Result<(), ActionError> {
            Ok(())
        }))
        .build()
}

/// A VM reserves every disk it lists, plus an optional network.
pub fn vm_resource() -> Resource {
    ResourceBuilder::new::<Machine>(ResourceFlags::shareable())
        .with_action(
            "create",
            typed(|ctx: &dyn Context, vm: Machine| -> Result<(), ActionError> {
                for disk in &vm.disks {
                    MACHINES.add_dependency(ctx, disk, || Ok::<_, ActionError>(()))?;
                }
                MACHINES.set(ctx, &vm)?;
                Ok(())
            }),
            ActionFlags::CREATE,
        )
        .with_action(
            "attach",
            typed(|ctx: &dyn Context, object: String| -> Result<(), ActionError> {
                MACHINES.add_dependency(ctx, &object, || Ok::<_, ActionError>(()))
            }),
            ActionFlags::EXCLUSIVE,
        )
        .with_action(
            "detach",
            typed(|ctx: &dyn Context, disk: String| -> Result<(), ActionError> {
                let mut vm = MACHINES.current(ctx)?;
                MACHINES.remove_dependency(ctx, &disk, || Ok::<_, ActionError>(()))?;
                vm.disks.retain(|name| name != &disk);
                MACHINES.set(ctx, &vm)?;
                Ok(())
            }),
            ActionFlags::EXCLUSIVE,
        )
        .with_delete(typed(|_: &dyn Context, (): ()| -> Result<(), ActionError> {
            Ok(())
        }))
        .build()
}

/// A [`MemoryStore`] whose operations can be made to fail one by one.
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_exists: AtomicBool,
    pub fail_masters: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl FlakyStore {
    fn check(flag: &AtomicBool, op: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::backend(format!("{op}: backend unavailable")));
        }
        Ok(())
    }
}

impl Store for FlakyStore {
    fn record_get(&self, key: &ObjectKey) -> Result<Record, StoreError> {
        self.inner.record_get(key)
    }

    fn record_exists(&self, key: &ObjectKey) -> Result<bool, StoreError> {
        Self::check(&self.fail_exists, "exists")?;
        self.inner.record_exists(key)
    }

    fn record_set(&self, key: &ObjectKey, record: Record) -> Result<(), StoreError> {
        self.inner.record_set(key, record)
    }

    fn record_delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        Self::check(&self.fail_delete, "delete")?;
        self.inner.record_delete(key)
    }

    fn dependency_add(&self, master: &ObjectKey, slave: &ObjectKey) -> Result<(), StoreError> {
        self.inner.dependency_add(master, slave)
    }

    fn dependency_remove(&self, master: &ObjectKey, slave: &ObjectKey) -> Result<(), StoreError> {
        self.inner.dependency_remove(master, slave)
    }

    fn dependencies_release(&self, master: &ObjectKey) -> Result<Vec<ObjectKey>, StoreError> {
        self.inner.dependencies_release(master)
    }

    fn masters(&self, slave: &ObjectKey) -> Result<Vec<ObjectKey>, StoreError> {
        Self::check(&self.fail_masters, "masters")?;
        self.inner.masters(slave)
    }
}

/// Engine with the disk, vm and network resources over `store`.
pub fn engine_over(store: Arc<dyn Store>, probe: &Arc<Probe>) -> Engine {
    Engine::builder(store)
        .with_resource(disk_resource(probe))
        .with_resource(vm_resource())
        .with_resource(network_resource())
        .build()
}

/// Engine over a [`FlakyStore`].
pub fn flaky() -> (Engine, Arc<FlakyStore>, Arc<Probe>) {
    let store = Arc::new(FlakyStore::default());
    let probe = Arc::new(Probe::default());
    let engine = engine_over(Arc::clone(&store) as Arc<dyn Store>, &probe);
    (engine, store, probe)
}

pub struct Fixture {
    pub engine: Engine,
    pub store: Arc<MemoryStore>,
    pub probe: Arc<Probe>,
}

impl Fixture {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let probe = Arc::new(Probe::default());

        let engine = engine_over(Arc::clone(&store) as Arc<dyn Store>, &probe);

        Self {
            engine,
            store,
            probe,
        }
    }

    pub fn call(
        &self,
        kind: &str,
        action: &str,
        object: &str,
        input: &impl Serialize,
    ) -> Result<ResourceResponse, EngineError> {
        let request = ResourceRequest::with_input(action, object, input).expect("encode input");
        self.engine.call(USER, SPACE, kind, &request)
    }

    pub fn create_disk(&self, object: &str, size: u64) -> Result<ResourceResponse, EngineError> {
        self.call("disk", "create", object, &Disk { size })
    }

    pub fn delete(&self, kind: &str, object: &str) -> Result<ResourceResponse, EngineError> {
        self.engine
            .call(USER, SPACE, kind, &ResourceRequest::empty("delete", object))
    }

    pub fn key(&self, object: &str) -> ObjectKey {
        ObjectKey::new(USER, SPACE, object)
    }

    pub fn exists(&self, object: &str) -> bool {
        self.store.record_exists(&self.key(object)).unwrap()
    }
}
