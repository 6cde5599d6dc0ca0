use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::account::Registration;
use crate::acme_client::{AcmeAccount, AcmeDirectory, CertificateBundle};
use crate::object_store::{ObjectStore, ObjectStoreError};
use crate::secret_store::{SecretStore, SecretStoreError};

/// In-memory secret store counting writes.
#[derive(Default)]
pub(crate) struct MemorySecretStore {
    entries: Mutex<BTreeMap<String, String>>,
    puts: AtomicUsize,
}

impl MemorySecretStore {
    /// Seed an entry without counting it as a write.
    pub fn insert(&self, name: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }

    pub fn value(&self, name: &str) -> Option<String> {
        self.entries.lock().unwrap().get(name).cloned()
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, name: &str) -> Result<String, SecretStoreError> {
        self.value(name)
            .ok_or_else(|| SecretStoreError::NotFound(name.to_string()))
    }

    async fn put(&self, name: &str, value: &str) -> Result<(), SecretStoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.insert(name, value);
        Ok(())
    }
}

/// Secret store whose operations always fail with a backend error.
#[derive(Default)]
pub(crate) struct FailingSecretStore {
    puts: AtomicUsize,
}

impl FailingSecretStore {
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for FailingSecretStore {
    async fn get(&self, _name: &str) -> Result<String, SecretStoreError> {
        Err(SecretStoreError::Api("injected get failure".to_string()))
    }

    async fn put(&self, _name: &str, _value: &str) -> Result<(), SecretStoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        Err(SecretStoreError::Api("injected put failure".to_string()))
    }
}

/// In-memory object store keeping writes in order.
#[derive(Default)]
pub(crate) struct MemoryObjectStore {
    writes: Mutex<Vec<(String, String, Vec<u8>)>>,
    fail_on: Mutex<Option<String>>,
}

impl MemoryObjectStore {
    /// Make writes to `path` fail.
    pub fn fail_on(&self, path: &str) {
        *self.fail_on.lock().unwrap() = Some(path.to_string());
    }

    /// Paths written so far, in write order.
    pub fn paths(&self) -> Vec<String> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .map(|(_, path, _)| path.clone())
            .collect()
    }

    /// The last written bytes for `path` in `bucket`.
    pub fn object(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(b, p, _)| b == bucket && p == path)
            .map(|(_, _, data)| data.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, bucket: &str, path: &str, data: &[u8]) -> Result<(), ObjectStoreError> {
        if self.fail_on.lock().unwrap().as_deref() == Some(path) {
            return Err(ObjectStoreError::Api(format!("injected failure for {path}")));
        }
        self.writes
            .lock()
            .unwrap()
            .push((bucket.to_string(), path.to_string(), data.to_vec()));
        Ok(())
    }
}

/// Stub ACME directory recording registrations and orders.
pub(crate) struct StubAcme {
    fail_register: bool,
    fail_obtain: bool,
    state: Arc<StubState>,
}

#[derive(Default)]
struct StubState {
    registered: AtomicUsize,
    orders: Mutex<Vec<Vec<String>>>,
}

impl StubAcme {
    pub fn new() -> Self {
        Self {
            fail_register: false,
            fail_obtain: false,
            state: Arc::new(StubState::default()),
        }
    }

    pub fn failing_register() -> Self {
        Self {
            fail_register: true,
            ..Self::new()
        }
    }

    pub fn failing_obtain() -> Self {
        Self {
            fail_obtain: true,
            ..Self::new()
        }
    }

    pub fn registered(&self) -> usize {
        self.state.registered.load(Ordering::SeqCst)
    }

    pub fn orders(&self) -> Vec<Vec<String>> {
        self.state.orders.lock().unwrap().clone()
    }
}

#[async_trait]
impl AcmeDirectory for StubAcme {
    async fn register(&self, email: &str) -> Result<Box<dyn AcmeAccount>> {
        if self.fail_register {
            bail!("registration rejected");
        }
        self.state.registered.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubAccount {
            account_id: format!("https://acme.test/acct/{email}"),
            fail_obtain: self.fail_obtain,
            state: self.state.clone(),
        }))
    }
}

struct StubAccount {
    account_id: String,
    fail_obtain: bool,
    state: Arc<StubState>,
}

#[async_trait]
impl AcmeAccount for StubAccount {
    fn registration(&self) -> Registration {
        Registration::new(self.account_id.clone())
    }

    async fn obtain_certificate(
        &self,
        key_pem: &str,
        domains: &[String],
    ) -> Result<CertificateBundle> {
        if self.fail_obtain {
            bail!("order rejected");
        }
        self.state.orders.lock().unwrap().push(domains.to_vec());
        Ok(test_bundle(key_pem))
    }
}

/// A bundle with distinct artifact contents for upload assertions.
pub(crate) fn test_bundle(key_pem: &str) -> CertificateBundle {
    CertificateBundle {
        certificate: "LEAF PEM\nISSUER PEM\n".to_string(),
        private_key: key_pem.to_string(),
        issuer_certificate: "ISSUER PEM\n".to_string(),
    }
}
