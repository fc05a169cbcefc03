//! Test support utilities shared across unit and integration tests.
//!
//! [`ScriptedBackend`] simulates a Compute Engine project in memory: it keeps
//! instances per zone, hands out operations that finish after a configurable
//! number of polls, applies the state change when an operation reports
//! `DONE`, and records every call. Clones share state, so a `v1` and a `beta`
//! handle can be labelled separately and still see the same instances.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::env;
use std::ffi::OsString;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tokio::time::Instant;

use crate::backend::{BackendFuture, ComputeBackend, InstanceAction};
use crate::compute::ComputeError;
use crate::compute::model::{
    AccessConfig, AttachedDisk, Image, Instance, NetworkInterface, Operation, OperationError,
    OperationErrorItem, OperationStatus,
};
use crate::instance_config::InstanceConfig;
use crate::lifecycle::{SnapshotError, SnapshotWriter};

const API_ROOT: &str = "https://www.googleapis.com/compute/v1/projects";
const CREATED_AT: &str = "2024-01-15T10:20:30.000-08:00";
const IMAGE_VERSION: &str = "v20240110";

/// One call made through a [`ScriptedBackend`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordedCall {
    /// Label of the handle that made the call, for example `v1` or `beta`.
    pub backend: String,
    /// Trait method name.
    pub method: &'static str,
    /// Call target, `zone/name` style.
    pub target: String,
    /// When the call was made, on tokio's clock.
    pub at: Instant,
}

impl fmt::Display for RecordedCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.backend, self.method, self.target)
    }
}

#[derive(Clone, Copy, Debug)]
enum Effect {
    Create,
    Delete,
    SetStatus(&'static str),
}

#[derive(Debug)]
struct ScriptedOperation {
    zone: String,
    instance: Option<String>,
    steps: VecDeque<Operation>,
    effect: Option<Effect>,
}

#[derive(Debug)]
struct State {
    zones: Vec<String>,
    instances: BTreeMap<(String, String), Instance>,
    operations: HashMap<String, ScriptedOperation>,
    calls: Vec<RecordedCall>,
    failures: Vec<(&'static str, ComputeError)>,
    operation_error: Option<OperationError>,
    polls_before_done: usize,
    image_self_link: bool,
    next_id: u64,
}

impl Default for State {
    fn default() -> Self {
        Self {
            zones: vec![String::from("us-central1-a")],
            instances: BTreeMap::new(),
            operations: HashMap::new(),
            calls: Vec::new(),
            failures: Vec::new(),
            operation_error: None,
            polls_before_done: 1,
            image_self_link: true,
            next_id: 1,
        }
    }
}

/// In-memory [`ComputeBackend`] for tests.
#[derive(Clone, Debug)]
pub struct ScriptedBackend {
    label: String,
    state: Arc<Mutex<State>>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    /// Creates a backend labelled `v1` with a single zone, `us-central1-a`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            label: String::from("v1"),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Returns a handle that shares this backend's state under another label.
    #[must_use]
    pub fn labelled(&self, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: Arc::clone(&self.state),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the zone list.
    pub fn set_zones<I, S>(&self, zones: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state().zones = zones.into_iter().map(Into::into).collect();
    }

    /// Sets how many `RUNNING` polls precede `DONE` for new operations.
    pub fn set_polls_before_done(&self, polls: usize) {
        self.state().polls_before_done = polls;
    }

    /// Makes image lookups return images without a `selfLink`.
    pub fn drop_image_self_link(&self) {
        self.state().image_self_link = false;
    }

    /// Makes the next submitted operation finish with an error payload.
    pub fn fail_next_operation(&self, code: &str, message: &str) {
        self.state().operation_error = Some(OperationError {
            errors: vec![OperationErrorItem {
                code: Some(code.to_owned()),
                message: Some(message.to_owned()),
                location: None,
            }],
        });
    }

    /// Makes the next call to `method` fail with `error`.
    pub fn fail_next(&self, method: &'static str, error: ComputeError) {
        self.state().failures.push((method, error));
    }

    /// Scripts the responses returned when `name` is polled. The last entry
    /// repeats once the others are consumed.
    pub fn script_operation<I>(&self, zone: &str, name: &str, steps: I)
    where
        I: IntoIterator<Item = Operation>,
    {
        self.state().operations.insert(
            name.to_owned(),
            ScriptedOperation {
                zone: zone.to_owned(),
                instance: None,
                steps: steps.into_iter().collect(),
                effect: None,
            },
        );
    }

    /// Inserts a raw instance record.
    pub fn insert_raw_instance(&self, zone: &str, instance: Instance) {
        let name = instance.name.clone().unwrap_or_default();
        self.state()
            .instances
            .insert((zone.to_owned(), name), instance);
    }

    /// Returns the status of a simulated instance.
    #[must_use]
    pub fn instance_status(&self, zone: &str, name: &str) -> Option<String> {
        self.state()
            .instances
            .get(&(zone.to_owned(), name.to_owned()))
            .and_then(|instance| instance.status.clone())
    }

    /// Returns every call recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    /// Returns the recorded calls of one method.
    #[must_use]
    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.state()
            .calls
            .iter()
            .filter(|call| call.method == method)
            .cloned()
            .collect()
    }

    fn enter(&self, method: &'static str, target: String) -> Result<MutexGuard<'_, State>, ComputeError> {
        let mut state = self.state();
        state.calls.push(RecordedCall {
            backend: self.label.clone(),
            method,
            target,
            at: Instant::now(),
        });
        if let Some(index) = state.failures.iter().position(|(name, _)| *name == method) {
            let (_, error) = state.failures.remove(index);
            return Err(error);
        }
        Ok(state)
    }
}

impl State {
    fn submit(
        &mut self,
        project: &str,
        zone: &str,
        instance: &str,
        verb: &str,
        effect: Effect,
    ) -> Operation {
        let name = format!("operation-{}-{verb}", self.next_id);
        self.next_id += 1;
        let target_link = format!("{API_ROOT}/{project}/zones/{zone}/instances/{instance}");
        let base = Operation {
            operation_type: Some(verb.to_owned()),
            target_link: Some(target_link),
            zone: Some(format!("{API_ROOT}/{project}/zones/{zone}")),
            ..Operation::new(name.clone(), OperationStatus::Running)
        };
        let mut steps: VecDeque<Operation> =
            std::iter::repeat_n(base.clone(), self.polls_before_done).collect();
        steps.push_back(Operation {
            status: OperationStatus::Done,
            error: self.operation_error.take(),
            ..base.clone()
        });
        self.operations.insert(
            name,
            ScriptedOperation {
                zone: zone.to_owned(),
                instance: Some(instance.to_owned()),
                steps,
                effect: Some(effect),
            },
        );
        base
    }

    fn apply(&mut self, zone: &str, instance: &str, effect: Effect) {
        let key = (zone.to_owned(), instance.to_owned());
        match effect {
            Effect::Create => self.set_status(&key, "RUNNING"),
            Effect::SetStatus(status) => self.set_status(&key, status),
            Effect::Delete => {
                self.instances.remove(&key);
            }
        }
    }

    fn set_status(&mut self, key: &(String, String), status: &str) {
        if let Some(instance) = self.instances.get_mut(key) {
            instance.status = Some(status.to_owned());
        }
    }

    fn simulated_instance(&mut self, project: &str, zone: &str, config: &InstanceConfig) -> Instance {
        let id = self.next_id;
        self.next_id += 1;
        let disks = config
            .disks
            .iter()
            .map(|disk| AttachedDisk {
                disk_size_gb: Some(disk.initialize_params.disk_size_gb.clone()),
                kind: Some(disk.kind.clone().unwrap_or_else(|| String::from("PERSISTENT"))),
                boot: disk.boot,
                interface: Some(disk.interface.clone().unwrap_or_else(|| String::from("SCSI"))),
            })
            .collect();
        Instance {
            id: Some((4_000_000_000_000_000_000 + id).to_string()),
            name: Some(config.name.clone()),
            status: Some(String::from("PROVISIONING")),
            zone: Some(format!("{API_ROOT}/{project}/zones/{zone}")),
            creation_timestamp: Some(CREATED_AT.to_owned()),
            machine_type: Some(format!("{API_ROOT}/{project}/{}", config.machine_type)),
            network_interfaces: vec![NetworkInterface {
                network_ip: Some(format!("10.128.0.{}", id % 250 + 2)),
                access_configs: vec![AccessConfig {
                    nat_ip: Some(format!("34.70.0.{}", id % 250 + 2)),
                }],
            }],
            disks,
        }
    }
}

fn not_found(project: &str, zone: &str, name: &str) -> ComputeError {
    ComputeError::Api {
        status: 404,
        message: format!("The resource 'projects/{project}/zones/{zone}/instances/{name}' was not found"),
    }
}

const fn action_effect(action: InstanceAction) -> Effect {
    match action {
        InstanceAction::Start | InstanceAction::Resume => Effect::SetStatus("RUNNING"),
        InstanceAction::Stop => Effect::SetStatus("TERMINATED"),
        InstanceAction::Suspend { .. } => Effect::SetStatus("SUSPENDED"),
    }
}

impl ComputeBackend for ScriptedBackend {
    fn list_zones<'a>(&'a self, project: &'a str) -> BackendFuture<'a, Vec<String>> {
        Box::pin(async move {
            let state = self.enter("list_zones", project.to_owned())?;
            Ok(state.zones.clone())
        })
    }

    fn list_instances<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
    ) -> BackendFuture<'a, Vec<Instance>> {
        Box::pin(async move {
            let state = self.enter("list_instances", format!("{project}/{zone}"))?;
            Ok(state
                .instances
                .iter()
                .filter(|((instance_zone, _), _)| instance_zone == zone)
                .map(|(_, instance)| instance.clone())
                .collect())
        })
    }

    fn get_instance<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        name: &'a str,
    ) -> BackendFuture<'a, Instance> {
        Box::pin(async move {
            let state = self.enter("get_instance", format!("{zone}/{name}"))?;
            state
                .instances
                .get(&(zone.to_owned(), name.to_owned()))
                .cloned()
                .ok_or_else(|| not_found(project, zone, name))
        })
    }

    fn insert_instance<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        config: &'a InstanceConfig,
    ) -> BackendFuture<'a, Operation> {
        Box::pin(async move {
            let mut state = self.enter("insert_instance", format!("{zone}/{}", config.name))?;
            let key = (zone.to_owned(), config.name.clone());
            if state.instances.contains_key(&key) {
                return Err(ComputeError::Api {
                    status: 409,
                    message: format!(
                        "The resource 'projects/{project}/zones/{zone}/instances/{}' already exists",
                        config.name
                    ),
                });
            }
            let instance = state.simulated_instance(project, zone, config);
            state.instances.insert(key, instance);
            Ok(state.submit(project, zone, &config.name, "insert", Effect::Create))
        })
    }

    fn delete_instance<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        name: &'a str,
    ) -> BackendFuture<'a, Operation> {
        Box::pin(async move {
            let mut state = self.enter("delete_instance", format!("{zone}/{name}"))?;
            if !state.instances.contains_key(&(zone.to_owned(), name.to_owned())) {
                return Err(not_found(project, zone, name));
            }
            Ok(state.submit(project, zone, name, "delete", Effect::Delete))
        })
    }

    fn perform_action<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        name: &'a str,
        action: InstanceAction,
    ) -> BackendFuture<'a, Operation> {
        Box::pin(async move {
            let target = match action {
                InstanceAction::Suspend { discard_local_ssd } => {
                    format!("{zone}/{name} discardLocalSsd={discard_local_ssd}")
                }
                _ => format!("{zone}/{name}"),
            };
            let mut state = self.enter(action.verb(), target)?;
            if !state.instances.contains_key(&(zone.to_owned(), name.to_owned())) {
                return Err(not_found(project, zone, name));
            }
            Ok(state.submit(project, zone, name, action.verb(), action_effect(action)))
        })
    }

    fn get_zone_operation<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        operation: &'a str,
    ) -> BackendFuture<'a, Operation> {
        Box::pin(async move {
            let mut state = self.enter("get_zone_operation", format!("{zone}/{operation}"))?;
            let missing = || ComputeError::Api {
                status: 404,
                message: format!(
                    "The resource 'projects/{project}/zones/{zone}/operations/{operation}' was not found"
                ),
            };
            let scripted = state.operations.get_mut(operation).ok_or_else(missing)?;
            if scripted.zone != zone {
                return Err(missing());
            }
            let current = if scripted.steps.len() > 1 {
                scripted.steps.pop_front()
            } else {
                scripted.steps.front().cloned()
            }
            .ok_or_else(missing)?;

            if current.status.is_done() && current.error.is_none() {
                if let (Some(effect), Some(instance)) =
                    (scripted.effect.take(), scripted.instance.clone())
                {
                    let zone = scripted.zone.clone();
                    state.apply(&zone, &instance, effect);
                }
            }
            Ok(current)
        })
    }

    fn get_image_from_family<'a>(
        &'a self,
        project: &'a str,
        family: &'a str,
    ) -> BackendFuture<'a, Image> {
        Box::pin(async move {
            let state = self.enter("get_image_from_family", format!("{project}/{family}"))?;
            let name = format!("{family}-{IMAGE_VERSION}");
            let self_link = state
                .image_self_link
                .then(|| format!("{API_ROOT}/{project}/global/images/{name}"));
            Ok(Image {
                name: Some(name),
                self_link,
            })
        })
    }
}

/// Snapshot writer that keeps files in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySnapshotWriter {
    files: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemorySnapshotWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the names of the files written so far.
    #[must_use]
    pub fn file_names(&self) -> Vec<String> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Returns the contents of one file parsed as JSON.
    #[must_use]
    pub fn json(&self, file_name: &str) -> Option<serde_json::Value> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(file_name)
            .and_then(|contents| serde_json::from_str(contents).ok())
    }
}

impl SnapshotWriter for MemorySnapshotWriter {
    fn write(&self, file_name: &str, contents: &str) -> Result<(), SnapshotError> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(file_name.to_owned(), contents.to_owned());
        Ok(())
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets and removes environment variables while holding a global mutex.
    ///
    /// `None` values remove the variable for the guard's lifetime.
    pub async fn set_vars(pairs: &[(&str, Option<&str>)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`.
            unsafe {
                match value {
                    Some(value) => env::set_var(key, value),
                    None => env::remove_var(key),
                }
            }
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
