//! Common test utilities
//!
//! In-memory fakes for the resource store and the IAM layers, plus builders
//! for annotated resources.

#![allow(dead_code, reason = "each test binary uses a subset of the helpers")]

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use futures::stream::{self, BoxStream, StreamExt};
use gcp_service_account_controller::config::{ControllerConfig, Mode, OwnershipPolicy};
use gcp_service_account_controller::constants::{ANNOTATION_STATE, SERVICE_ACCOUNT_EMAIL_DOMAIN};
use gcp_service_account_controller::controller::reconciler::Reconciler;
use gcp_service_account_controller::controller::resource::ManagedResource;
use gcp_service_account_controller::controller::state::PersistedState;
use gcp_service_account_controller::controller::store::{ResourceStore, StoreEvent};
use gcp_service_account_controller::provider::gcp::client::{
    Policy, ServiceAccount as IamAccount, ServiceAccountApi, ServiceAccountKey,
};
use gcp_service_account_controller::provider::gcp::naming;
use gcp_service_account_controller::provider::{
    AccountRef, IamBackend, IamError, KeyMaterial, Permission,
};
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const PROJECT: &str = "sa-container";
pub const NAMESPACE: &str = "team";
pub const PREFIX: &str = "ctl";
pub const KEY_FILE_JSON: &str = r#"{"type":"service_account"}"#;

pub fn config(mode: Mode) -> Arc<ControllerConfig> {
    Arc::new(ControllerConfig {
        mode,
        project_id: PROJECT.to_string(),
        ownership: OwnershipPolicy::Prefix(PREFIX.to_string()),
        ..ControllerConfig::default()
    })
}

pub fn canonical_name(account_id: &str) -> String {
    format!(
        "projects/{PROJECT}/serviceAccounts/{}",
        naming::account_email(PROJECT, account_id)
    )
}

fn metadata(name: &str, annotations: &[(&str, &str)]) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(NAMESPACE.to_string()),
        annotations: Some(
            annotations
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        ),
        ..ObjectMeta::default()
    }
}

pub fn secret(name: &str, annotations: &[(&str, &str)]) -> Secret {
    Secret {
        metadata: metadata(name, annotations),
        ..Secret::default()
    }
}

pub fn service_account(name: &str, annotations: &[(&str, &str)]) -> ServiceAccount {
    ServiceAccount {
        metadata: metadata(name, annotations),
        ..ServiceAccount::default()
    }
}

pub fn state_of<K: ManagedResource>(resource: &K) -> PersistedState {
    PersistedState::decode(resource.annotations())
}

pub fn with_state<K: ManagedResource>(mut resource: K, state: &PersistedState) -> K {
    let encoded = state.encode().expect("state should encode");
    resource
        .annotations_mut()
        .insert(ANNOTATION_STATE.to_string(), encoded);
    resource
}

/// In-memory resource store with resource version conflict checks
pub struct MemoryStore<K> {
    objects: Mutex<BTreeMap<String, K>>,
    version: AtomicUsize,
    replaces: AtomicUsize,
    fail_replace: AtomicBool,
    scripted_watch: Mutex<Vec<Result<StoreEvent<K>>>>,
}

impl<K: ManagedResource> MemoryStore<K> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            objects: Mutex::new(BTreeMap::new()),
            version: AtomicUsize::new(0),
            replaces: AtomicUsize::new(0),
            fail_replace: AtomicBool::new(false),
            scripted_watch: Mutex::new(Vec::new()),
        })
    }

    fn key(namespace: &str, name: &str) -> String {
        format!("{namespace}/{name}")
    }

    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    /// Create `resource`, returning the stored copy
    pub fn insert(&self, mut resource: K) -> K {
        resource.meta_mut().resource_version = Some(self.next_version());
        let key = Self::key(&resource.namespace().unwrap_or_default(), &resource.name_any());
        self.objects
            .lock()
            .expect("store lock")
            .insert(key, resource.clone());
        resource
    }

    pub fn current(&self, name: &str) -> K {
        self.objects
            .lock()
            .expect("store lock")
            .get(&Self::key(NAMESPACE, name))
            .cloned()
            .expect("resource should exist")
    }

    pub fn replace_count(&self) -> usize {
        self.replaces.load(Ordering::SeqCst)
    }

    pub fn fail_replaces(&self, fail: bool) {
        self.fail_replace.store(fail, Ordering::SeqCst);
    }

    pub fn script_watch(&self, events: Vec<Result<StoreEvent<K>>>) {
        *self.scripted_watch.lock().expect("watch lock") = events;
    }
}

#[async_trait]
impl<K: ManagedResource> ResourceStore<K> for MemoryStore<K> {
    async fn get(&self, namespace: &str, name: &str) -> Result<K> {
        self.objects
            .lock()
            .expect("store lock")
            .get(&Self::key(namespace, name))
            .cloned()
            .ok_or_else(|| anyhow!("{} {namespace}/{name} not found", K::KIND))
    }

    async fn replace(&self, resource: &K) -> Result<K> {
        if self.fail_replace.load(Ordering::SeqCst) {
            bail!("injected replace failure");
        }
        let key = Self::key(&resource.namespace().unwrap_or_default(), &resource.name_any());
        let mut objects = self.objects.lock().expect("store lock");
        let stored = objects
            .get(&key)
            .ok_or_else(|| anyhow!("{} {key} not found", K::KIND))?;
        if stored.resource_version() != resource.resource_version() {
            bail!("conflict: {} {key} has been modified", K::KIND);
        }
        let mut updated = resource.clone();
        updated.meta_mut().resource_version = Some(self.next_version());
        objects.insert(key, updated.clone());
        self.replaces.fetch_add(1, Ordering::SeqCst);
        Ok(updated)
    }

    async fn list(&self) -> Result<Vec<K>> {
        Ok(self
            .objects
            .lock()
            .expect("store lock")
            .values()
            .cloned()
            .collect())
    }

    fn watch(&self) -> BoxStream<'static, Result<StoreEvent<K>>> {
        let events = std::mem::take(&mut *self.scripted_watch.lock().expect("watch lock"));
        stream::iter(events).boxed()
    }
}

/// Reconciler-level IAM fake recording every call
#[derive(Default)]
pub struct FakeIam {
    calls: Mutex<Vec<String>>,
    /// `find_account_by_logical_name` fails with not-found when unset
    pub adoptable: Mutex<Option<AccountRef>>,
    pub purged_per_call: AtomicUsize,
    pub fail_keys: AtomicBool,
}

impl FakeIam {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }

    pub fn account_for(logical_name: &str) -> AccountRef {
        let account_id = format!("{PREFIX}-{logical_name}-abcd");
        AccountRef {
            name: canonical_name(&account_id),
            email: format!("{account_id}@{PROJECT}.{SERVICE_ACCOUNT_EMAIL_DOMAIN}"),
        }
    }
}

#[async_trait]
impl IamBackend for FakeIam {
    async fn create_account(&self, logical_name: &str) -> Result<AccountRef, IamError> {
        self.record(format!("create_account:{logical_name}"));
        naming::validate_logical_name(logical_name)?;
        Ok(Self::account_for(logical_name))
    }

    async fn find_account_by_logical_name(
        &self,
        logical_name: &str,
    ) -> Result<AccountRef, IamError> {
        self.record(format!("find_account:{logical_name}"));
        self.adoptable
            .lock()
            .expect("adoptable lock")
            .clone()
            .ok_or_else(|| IamError::NotFound(logical_name.to_string()))
    }

    async fn create_key(&self, canonical_name: &str) -> Result<KeyMaterial, IamError> {
        self.record(format!("create_key:{canonical_name}"));
        if self.fail_keys.load(Ordering::SeqCst) {
            return Err(IamError::Backend(anyhow!("quota exceeded")));
        }
        Ok(KeyMaterial {
            name: format!("{canonical_name}/keys/k1"),
            private_key_data: general_purpose::STANDARD.encode(KEY_FILE_JSON),
        })
    }

    async fn purge_keys(
        &self,
        canonical_name: &str,
        _threshold: chrono::Duration,
    ) -> Result<usize, IamError> {
        self.record(format!("purge_keys:{canonical_name}"));
        Ok(self.purged_per_call.load(Ordering::SeqCst))
    }

    async fn delete_account(&self, canonical_name: &str) -> Result<bool, IamError> {
        self.record(format!("delete_account:{canonical_name}"));
        Ok(true)
    }

    async fn set_permissions(
        &self,
        canonical_name: &str,
        permissions: &[Permission],
    ) -> Result<(), IamError> {
        self.record(format!(
            "set_permissions:{canonical_name}:{}",
            permissions.len()
        ));
        Ok(())
    }
}

pub fn reconciler<K: ManagedResource>(
    store: &Arc<MemoryStore<K>>,
    iam: &Arc<FakeIam>,
    mode: Mode,
) -> Reconciler<K> {
    Reconciler::new(
        Arc::clone(store) as Arc<dyn ResourceStore<K>>,
        Arc::clone(iam) as Arc<dyn IamBackend>,
        config(mode),
    )
}

/// REST-level IAM fake for exercising `IamService`
///
/// Clones share state, so a test keeps a handle after moving one into the service.
#[derive(Clone, Default)]
pub struct FakeApi(Arc<ApiState>);

impl Deref for FakeApi {
    type Target = ApiState;

    fn deref(&self) -> &ApiState {
        &self.0
    }
}

#[derive(Default)]
pub struct ApiState {
    calls: Mutex<Vec<String>>,
    /// Accounts by email
    pub accounts: Mutex<BTreeMap<String, IamAccount>>,
    /// Keys by canonical account name
    pub keys: Mutex<BTreeMap<String, Vec<ServiceAccountKey>>>,
    /// Number of upcoming `get_account` probes that report a taken id
    pub collisions: AtomicUsize,
    pub policy: Mutex<Policy>,
}

impl ApiState {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }

    pub fn add_account(&self, account_id: &str, display_name: &str, unique_id: &str) -> String {
        let email = naming::account_email(PROJECT, account_id);
        let name = canonical_name(account_id);
        self.accounts.lock().expect("accounts lock").insert(
            email.clone(),
            IamAccount {
                name: name.clone(),
                email,
                unique_id: unique_id.to_string(),
                display_name: display_name.to_string(),
            },
        );
        name
    }

    pub fn add_key(&self, account_name: &str, key_id: &str, valid_after_time: &str) {
        self.keys
            .lock()
            .expect("keys lock")
            .entry(account_name.to_string())
            .or_default()
            .push(ServiceAccountKey {
                name: format!("{account_name}/keys/{key_id}"),
                private_key_data: None,
                valid_after_time: valid_after_time.to_string(),
            });
    }

    pub fn key_names(&self, account_name: &str) -> Vec<String> {
        self.keys
            .lock()
            .expect("keys lock")
            .get(account_name)
            .map(|keys| keys.iter().map(|k| k.name.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ServiceAccountApi for FakeApi {
    async fn get_account(&self, project_id: &str, email: &str) -> Result<Option<IamAccount>> {
        self.record(format!("get_account:{email}"));
        if self
            .collisions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Ok(Some(IamAccount {
                name: format!("projects/{project_id}/serviceAccounts/{email}"),
                email: email.to_string(),
                ..IamAccount::default()
            }));
        }
        Ok(self.accounts.lock().expect("accounts lock").get(email).cloned())
    }

    async fn create_account(
        &self,
        project_id: &str,
        account_id: &str,
        display_name: &str,
    ) -> Result<IamAccount> {
        self.record(format!("create_account:{account_id}:{display_name}"));
        let email = naming::account_email(project_id, account_id);
        let account = IamAccount {
            name: format!("projects/{project_id}/serviceAccounts/{email}"),
            email: email.clone(),
            unique_id: "1".to_string(),
            display_name: display_name.to_string(),
        };
        self.accounts
            .lock()
            .expect("accounts lock")
            .insert(email, account.clone());
        Ok(account)
    }

    async fn list_accounts(&self, _project_id: &str) -> Result<Vec<IamAccount>> {
        self.record("list_accounts".to_string());
        Ok(self
            .accounts
            .lock()
            .expect("accounts lock")
            .values()
            .cloned()
            .collect())
    }

    async fn delete_account(&self, name: &str) -> Result<bool> {
        self.record(format!("delete_account:{name}"));
        let mut accounts = self.accounts.lock().expect("accounts lock");
        let before = accounts.len();
        accounts.retain(|_, account| account.name != name);
        Ok(accounts.len() < before)
    }

    async fn create_key(&self, name: &str) -> Result<ServiceAccountKey> {
        self.record(format!("create_key:{name}"));
        Ok(ServiceAccountKey {
            name: format!("{name}/keys/new"),
            private_key_data: Some(general_purpose::STANDARD.encode(KEY_FILE_JSON)),
            valid_after_time: chrono::Utc::now().to_rfc3339(),
        })
    }

    async fn list_keys(&self, name: &str) -> Result<Vec<ServiceAccountKey>> {
        self.record(format!("list_keys:{name}"));
        Ok(self
            .keys
            .lock()
            .expect("keys lock")
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_key(&self, key_name: &str) -> Result<bool> {
        self.record(format!("delete_key:{key_name}"));
        let mut keys = self.keys.lock().expect("keys lock");
        for account_keys in keys.values_mut() {
            if let Some(position) = account_keys.iter().position(|k| k.name == key_name) {
                account_keys.remove(position);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn get_iam_policy(&self, project_id: &str) -> Result<Policy> {
        self.record(format!("get_iam_policy:{project_id}"));
        Ok(self.policy.lock().expect("policy lock").clone())
    }
}
