// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory fakes shared by the unit tests.
//!
//! - [`FakeScope`] - a scope backed by [`ReconcileStatus`]
//! - [`FakeAzureClient`] - a scriptable Azure client for any spec type
//! - [`FakeObjectClient`] - an in-memory Kubernetes object store

use crate::azure::{Creator, Deleter, Getter, PollStatus, Poller, ResourceRef};
use crate::azure_errors::ReconcileError;
use crate::crd::{ConditionSeverity, Future, FutureType, MachineAddress, ProvisioningState};
use crate::reconcilers::resources::ObjectClient;
use crate::reconcilers::status::ReconcileStatus;
use crate::scope::{
    AnnotationJson, AsyncStatusUpdater, ClusterDescriber, ConditionSetter, FutureScope,
    TimeoutsGetter,
};
use crate::tags::Tags;
use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Scope
// ============================================================================

/// A scope whose status lives in memory. `specs` holds whatever the service
/// under test asks its scope for.
pub struct FakeScope<T = ()> {
    pub specs: T,
    pub status: ReconcileStatus,
    pub cluster_name: String,
    pub subscription_id: String,
    pub resource_group: String,
    pub location: String,
    pub additional_tags: Tags,
    pub timeout: Duration,
    pub provider_id: Mutex<Option<String>>,
    pub addresses: Mutex<Vec<MachineAddress>>,
    pub provisioning_state: Mutex<Option<ProvisioningState>>,
}

impl<T: Default> Default for FakeScope<T> {
    fn default() -> Self {
        Self::with_specs(T::default())
    }
}

impl<T> FakeScope<T> {
    pub fn with_specs(specs: T) -> Self {
        Self {
            specs,
            status: ReconcileStatus::default(),
            cluster_name: "test-cluster".to_string(),
            subscription_id: "123".to_string(),
            resource_group: "test-group".to_string(),
            location: "test-location".to_string(),
            additional_tags: Tags::new(),
            timeout: Duration::from_millis(50),
            provider_id: Mutex::new(None),
            addresses: Mutex::new(Vec::new()),
            provisioning_state: Mutex::new(None),
        }
    }

    /// Status of `condition` as `(status, reason)`.
    pub fn condition(&self, condition: &str) -> Option<(String, Option<String>)> {
        self.status
            .condition(condition)
            .map(|c| (c.status, c.reason))
    }
}

impl<T: Send + Sync> FutureScope for FakeScope<T> {
    fn get_long_running_operation_state(
        &self,
        name: &str,
        service_name: &str,
        future_type: FutureType,
    ) -> Option<Future> {
        self.status
            .get_long_running_operation_state(name, service_name, future_type)
    }

    fn set_long_running_operation_state(&self, future: Future) {
        self.status.set_long_running_operation_state(future);
    }

    fn delete_long_running_operation_state(
        &self,
        name: &str,
        service_name: &str,
        future_type: FutureType,
    ) {
        self.status
            .delete_long_running_operation_state(name, service_name, future_type);
    }
}

impl<T: Send + Sync> ConditionSetter for FakeScope<T> {
    fn set_condition_true(&self, condition: &str) {
        self.status.set_condition_true(condition);
    }

    fn set_condition_false(
        &self,
        condition: &str,
        reason: &str,
        severity: ConditionSeverity,
        message: &str,
    ) {
        self.status
            .set_condition_false(condition, reason, severity, message);
    }
}

impl<T: Send + Sync> AsyncStatusUpdater for FakeScope<T> {
    fn update_put_status(&self, condition: &str, service_name: &str, err: Option<&ReconcileError>) {
        self.status.update_put_status(condition, service_name, err);
    }

    fn update_delete_status(&self, condition: &str, service_name: &str, err: Option<&ReconcileError>) {
        self.status.update_delete_status(condition, service_name, err);
    }
}

impl<T: Send + Sync> ClusterDescriber for FakeScope<T> {
    fn cluster_name(&self) -> String {
        self.cluster_name.clone()
    }

    fn subscription_id(&self) -> String {
        self.subscription_id.clone()
    }

    fn resource_group(&self) -> String {
        self.resource_group.clone()
    }

    fn location(&self) -> String {
        self.location.clone()
    }

    fn additional_tags(&self) -> Tags {
        self.additional_tags.clone()
    }
}

impl<T: Send + Sync> TimeoutsGetter for FakeScope<T> {
    fn defaulted_azure_service_reconcile_timeout(&self) -> Duration {
        self.timeout
    }
}

impl<T: Send + Sync> AnnotationJson for FakeScope<T> {
    fn annotation_json(&self, key: &str) -> Result<Tags, ReconcileError> {
        self.status.annotation_json(key)
    }

    fn update_annotation_json(&self, key: &str, value: &Tags) -> Result<(), ReconcileError> {
        self.status.update_annotation_json(key, value)
    }
}

// ============================================================================
// Azure client
// ============================================================================

/// Mutable state of a [`FakeAzureClient`].
pub struct FakeAzureState<R> {
    /// What `get` returns; `None` answers `NotFound`.
    pub existing: Option<R>,
    /// Overrides `get` with an error.
    pub get_error: Option<ReconcileError>,
    /// Overrides the start of a create or delete with an error.
    pub begin_error: Option<ReconcileError>,
    /// Delay before a create or delete is accepted.
    pub begin_delay: Duration,
    /// Number of `InProgress` answers before an operation is done.
    pub pending_polls: u32,
    /// Error returned by every poll while set: the operation state is unreadable.
    pub poll_error: Option<ReconcileError>,
    /// Failure the operation finishes with instead of a result.
    pub operation_error: Option<ReconcileError>,
    /// Parameters of the last create-or-update.
    pub last_parameters: Option<R>,
    pub get_calls: usize,
    pub create_calls: usize,
    pub delete_calls: usize,
    pub resume_calls: usize,
}

impl<R> Default for FakeAzureState<R> {
    fn default() -> Self {
        Self {
            existing: None,
            get_error: None,
            begin_error: None,
            begin_delay: Duration::ZERO,
            pending_polls: 0,
            poll_error: None,
            operation_error: None,
            last_parameters: None,
            get_calls: 0,
            create_calls: 0,
            delete_calls: 0,
            resume_calls: 0,
        }
    }
}

/// Scriptable Azure client. Completed creates store their parameters as the
/// existing resource; completed deletes clear it.
pub struct FakeAzureClient<R> {
    pub state: Arc<Mutex<FakeAzureState<R>>>,
}

impl<R> Clone for FakeAzureClient<R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<R> Default for FakeAzureClient<R> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeAzureState::default())),
        }
    }
}

impl<R: Clone> FakeAzureClient<R> {
    #[must_use]
    pub fn with_existing(existing: R) -> Self {
        let client = Self::default();
        client.lock().existing = Some(existing);
        client
    }

    pub fn lock(&self) -> std::sync::MutexGuard<'_, FakeAzureState<R>> {
        self.state.lock().unwrap()
    }
}

const FAKE_PUT_TOKEN: &str = "fake-put";
const FAKE_DELETE_TOKEN: &str = "fake-delete";

struct FakePoller<R, T> {
    state: Arc<Mutex<FakeAzureState<R>>>,
    finish: fn(&mut FakeAzureState<R>) -> T,
    token: &'static str,
}

#[async_trait]
impl<R: Send + 'static, T: Send + 'static> Poller<T> for FakePoller<R, T> {
    async fn poll(&mut self) -> Result<PollStatus<T>, ReconcileError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.poll_error.clone() {
            return Err(err);
        }
        if state.pending_polls > 0 {
            state.pending_polls -= 1;
            return Ok(PollStatus::InProgress);
        }
        if let Some(err) = state.operation_error.clone() {
            return Ok(PollStatus::Failed(err));
        }
        Ok(PollStatus::Done((self.finish)(&mut state)))
    }

    fn resume_token(&self) -> Result<String, ReconcileError> {
        Ok(self.token.to_string())
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

fn finish_put<R: Clone>(state: &mut FakeAzureState<R>) -> R {
    let result = state.last_parameters.clone();
    state.existing.clone_from(&result);
    result.unwrap_or_else(|| panic!("fake create finished without parameters"))
}

fn finish_delete<R>(state: &mut FakeAzureState<R>) {
    state.existing = None;
}

#[async_trait]
impl<S, R> Getter<S> for FakeAzureClient<R>
where
    S: ResourceRef<Resource = R>,
    R: Clone + Send + Sync + 'static,
{
    async fn get(&self, spec: &S) -> Result<R, ReconcileError> {
        let mut state = self.lock();
        state.get_calls += 1;
        if let Some(err) = state.get_error.clone() {
            return Err(err);
        }
        state.existing.clone().ok_or_else(|| ReconcileError::NotFound {
            message: format!(
                "resource {}/{} not found",
                spec.resource_group_name(),
                spec.resource_name()
            ),
        })
    }
}

#[async_trait]
impl<S, R> Creator<S> for FakeAzureClient<R>
where
    S: ResourceRef<Resource = R>,
    R: Clone + Send + Sync + 'static,
{
    async fn create_or_update_async(
        &self,
        _spec: &S,
        parameters: R,
    ) -> Result<Box<dyn Poller<R>>, ReconcileError> {
        let delay = {
            let mut state = self.lock();
            state.create_calls += 1;
            state.last_parameters = Some(parameters);
            if let Some(err) = state.begin_error.clone() {
                return Err(err);
            }
            state.begin_delay
        };
        tokio::time::sleep(delay).await;
        Ok(Box::new(FakePoller {
            state: Arc::clone(&self.state),
            finish: finish_put::<R>,
            token: FAKE_PUT_TOKEN,
        }))
    }

    fn resume_create_or_update(
        &self,
        _spec: &S,
        resume_token: &str,
    ) -> Result<Box<dyn Poller<R>>, ReconcileError> {
        if resume_token != FAKE_PUT_TOKEN {
            return Err(ReconcileError::transient("unknown resume token"));
        }
        self.lock().resume_calls += 1;
        Ok(Box::new(FakePoller {
            state: Arc::clone(&self.state),
            finish: finish_put::<R>,
            token: FAKE_PUT_TOKEN,
        }))
    }
}

#[async_trait]
impl<S, R> Deleter<S> for FakeAzureClient<R>
where
    S: ResourceRef<Resource = R>,
    R: Clone + Send + Sync + 'static,
{
    async fn delete_async(&self, spec: &S) -> Result<Box<dyn Poller<()>>, ReconcileError> {
        let delay = {
            let mut state = self.lock();
            state.delete_calls += 1;
            if let Some(err) = state.begin_error.clone() {
                return Err(err);
            }
            if state.existing.is_none() {
                return Err(ReconcileError::NotFound {
                    message: format!(
                        "resource {}/{} not found",
                        spec.resource_group_name(),
                        spec.resource_name()
                    ),
                });
            }
            state.begin_delay
        };
        tokio::time::sleep(delay).await;
        Ok(Box::new(FakePoller {
            state: Arc::clone(&self.state),
            finish: finish_delete::<R>,
            token: FAKE_DELETE_TOKEN,
        }))
    }

    fn resume_delete(
        &self,
        _spec: &S,
        resume_token: &str,
    ) -> Result<Box<dyn Poller<()>>, ReconcileError> {
        if resume_token != FAKE_DELETE_TOKEN {
            return Err(ReconcileError::transient("unknown resume token"));
        }
        self.lock().resume_calls += 1;
        Ok(Box::new(FakePoller {
            state: Arc::clone(&self.state),
            finish: finish_delete::<R>,
            token: FAKE_DELETE_TOKEN,
        }))
    }
}

// ============================================================================
// Kubernetes objects
// ============================================================================

/// In-memory object store keyed by `(namespace, name)`.
pub struct FakeObjectClient<K> {
    pub objects: Mutex<BTreeMap<(String, String), K>>,
    /// Called on every applied object, e.g. to fake the operator's status.
    pub on_apply: Option<fn(&mut K)>,
    /// When set, `delete` only marks the object as deleting.
    pub keep_on_delete: bool,
    /// Latency of every call.
    pub delay: Duration,
    pub apply_calls: Mutex<Vec<K>>,
    pub delete_calls: Mutex<Vec<String>>,
}

impl<K> Default for FakeObjectClient<K> {
    fn default() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            on_apply: None,
            keep_on_delete: false,
            delay: Duration::ZERO,
            apply_calls: Mutex::new(Vec::new()),
            delete_calls: Mutex::new(Vec::new()),
        }
    }
}

impl<K: Clone> FakeObjectClient<K> {
    pub fn insert(&self, namespace: &str, name: &str, object: K) {
        self.objects
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), object);
    }

    #[must_use]
    pub fn stored(&self, namespace: &str, name: &str) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    #[must_use]
    pub fn applied(&self) -> Vec<K> {
        self.apply_calls.lock().unwrap().clone()
    }

    #[must_use]
    pub fn deleted(&self) -> Vec<String> {
        self.delete_calls.lock().unwrap().clone()
    }
}

/// Marks `object` as being deleted.
pub fn mark_deleting<K: Serialize + DeserializeOwned>(object: &K) -> K {
    let mut value = serde_json::to_value(object).unwrap();
    value["metadata"]["deletionTimestamp"] = serde_json::json!("2024-01-01T00:00:00Z");
    serde_json::from_value(value).unwrap()
}

#[async_trait]
impl<K> ObjectClient<K> for FakeObjectClient<K>
where
    K: Resource + ResourceExt + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, ReconcileError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.stored(namespace, name))
    }

    async fn apply(&self, namespace: &str, object: &K) -> Result<K, ReconcileError> {
        tokio::time::sleep(self.delay).await;
        let mut stored = object.clone();
        stored.meta_mut().generation = Some(stored.meta().generation.unwrap_or(0) + 1);
        if let Some(on_apply) = self.on_apply {
            on_apply(&mut stored);
        }
        self.apply_calls.lock().unwrap().push(object.clone());
        self.insert(namespace, &object.name_any(), stored.clone());
        Ok(stored)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ReconcileError> {
        tokio::time::sleep(self.delay).await;
        self.delete_calls.lock().unwrap().push(name.to_string());
        let key = (namespace.to_string(), name.to_string());
        let mut objects = self.objects.lock().unwrap();
        if self.keep_on_delete {
            if let Some(object) = objects.get(&key).map(mark_deleting) {
                objects.insert(key, object);
            }
        } else {
            objects.remove(&key);
        }
        Ok(())
    }
}
