//! Credential Storage
//!
//! The injected persistence boundary. A `CredentialStorage` holds at most
//! one credential; `load()` returning `None` is an ordinary outcome,
//! distinct from `load()` failing.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, Mutex};

use crate::crypto;
use crate::error::{LifecycleError, StorageError};
use crate::types::Credential;

/// Credential persistence interface.
#[async_trait]
pub trait CredentialStorage: Send + Sync {
    /// Load the persisted credential, if any.
    async fn load(&self) -> Result<Option<Credential>, LifecycleError>;

    /// Persist a credential, replacing any previous one.
    async fn save(&self, credential: &Credential) -> Result<(), LifecycleError>;

    /// Delete the persisted credential. Deleting an absent credential is
    /// not an error.
    async fn delete(&self) -> Result<(), LifecycleError>;
}

/// In-memory credential storage.
pub struct InMemoryCredentialStorage {
    credential: Mutex<Option<Credential>>,
}

impl InMemoryCredentialStorage {
    /// Create empty in-memory storage.
    pub fn new() -> Self {
        Self {
            credential: Mutex::new(None),
        }
    }
}

impl Default for InMemoryCredentialStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStorage for InMemoryCredentialStorage {
    async fn load(&self) -> Result<Option<Credential>, LifecycleError> {
        Ok(self.credential.lock().unwrap().clone())
    }

    async fn save(&self, credential: &Credential) -> Result<(), LifecycleError> {
        *self.credential.lock().unwrap() = Some(credential.clone());
        Ok(())
    }

    async fn delete(&self) -> Result<(), LifecycleError> {
        *self.credential.lock().unwrap() = None;
        Ok(())
    }
}

/// Text blob backend. Concrete adapters (filesystem, object storage, remote
/// cache) implement this; the blob is structurally opaque to them.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Read the stored blob, if any.
    async fn read(&self) -> Result<Option<String>, LifecycleError>;

    /// Write the blob, replacing any previous one.
    async fn write(&self, blob: String) -> Result<(), LifecycleError>;

    /// Remove the stored blob.
    async fn clear(&self) -> Result<(), LifecycleError>;
}

/// In-memory blob backend.
#[derive(Default)]
pub struct MemoryBlobStorage {
    blob: Mutex<Option<String>>,
}

impl MemoryBlobStorage {
    /// Create empty blob storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create blob storage pre-populated with `blob`.
    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: Mutex::new(Some(blob.into())),
        }
    }

    /// Inspect the currently stored blob.
    pub fn current(&self) -> Option<String> {
        self.blob.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn read(&self) -> Result<Option<String>, LifecycleError> {
        Ok(self.blob.lock().unwrap().clone())
    }

    async fn write(&self, blob: String) -> Result<(), LifecycleError> {
        *self.blob.lock().unwrap() = Some(blob);
        Ok(())
    }

    async fn clear(&self) -> Result<(), LifecycleError> {
        *self.blob.lock().unwrap() = None;
        Ok(())
    }
}

/// Credential storage over a text blob backend.
///
/// The credential is serialized to JSON. With a passphrase configured the
/// stored blob is the authenticated-encryption blob from [`crate::crypto`];
/// without one it is the raw JSON.
pub struct BlobCredentialStorage {
    blobs: Arc<dyn BlobStorage>,
    passphrase: Option<SecretString>,
}

impl BlobCredentialStorage {
    /// Store plaintext JSON blobs.
    pub fn new(blobs: Arc<dyn BlobStorage>) -> Self {
        Self {
            blobs,
            passphrase: None,
        }
    }

    /// Store encrypted blobs keyed by `passphrase`.
    pub fn with_passphrase(blobs: Arc<dyn BlobStorage>, passphrase: impl Into<String>) -> Self {
        Self {
            blobs,
            passphrase: Some(SecretString::new(passphrase.into())),
        }
    }
}

#[async_trait]
impl CredentialStorage for BlobCredentialStorage {
    async fn load(&self) -> Result<Option<Credential>, LifecycleError> {
        let Some(blob) = self.blobs.read().await? else {
            return Ok(None);
        };

        let json = match &self.passphrase {
            Some(passphrase) => crypto::decrypt(&blob, passphrase.expose_secret())?,
            None => blob,
        };

        let credential: Credential = serde_json::from_str(&json).map_err(|e| {
            LifecycleError::Storage(StorageError::CorruptedData {
                message: e.to_string(),
            })
        })?;

        Ok(Some(credential))
    }

    async fn save(&self, credential: &Credential) -> Result<(), LifecycleError> {
        let json = serde_json::to_string(credential).map_err(|e| {
            LifecycleError::Storage(StorageError::WriteFailed {
                message: e.to_string(),
            })
        })?;

        let blob = match &self.passphrase {
            Some(passphrase) => crypto::encrypt(&json, passphrase.expose_secret())?,
            None => json,
        };

        self.blobs.write(blob).await
    }

    async fn delete(&self) -> Result<(), LifecycleError> {
        self.blobs.clear().await
    }
}

/// Mock credential storage for testing.
#[derive(Default)]
pub struct MockCredentialStorage {
    credential: Mutex<Option<Credential>>,
    load_count: Mutex<usize>,
    save_history: Mutex<Vec<Credential>>,
    delete_count: Mutex<usize>,
    next_error: Mutex<Option<LifecycleError>>,
    fail_all: Mutex<bool>,
    fail_saves: Mutex<bool>,
    save_delay: Mutex<Option<std::time::Duration>>,
}

impl MockCredentialStorage {
    /// Create empty mock storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the stored credential.
    pub fn with_credential(credential: Credential) -> Self {
        let storage = Self::default();
        *storage.credential.lock().unwrap() = Some(credential);
        storage
    }

    /// Return `error` from the next operation.
    pub fn set_next_error(&self, error: LifecycleError) -> &Self {
        *self.next_error.lock().unwrap() = Some(error);
        self
    }

    /// Fail every operation.
    pub fn set_fail_all(&self, fail: bool) -> &Self {
        *self.fail_all.lock().unwrap() = fail;
        self
    }

    /// Fail `save` calls only; `load` and `delete` keep working.
    pub fn set_fail_saves(&self, fail: bool) -> &Self {
        *self.fail_saves.lock().unwrap() = fail;
        self
    }

    /// Make every `save` call take `delay` before completing.
    pub fn set_save_delay(&self, delay: std::time::Duration) -> &Self {
        *self.save_delay.lock().unwrap() = Some(delay);
        self
    }

    /// Replace the stored credential directly, bypassing `save` history.
    pub fn set_credential(&self, credential: Credential) -> &Self {
        *self.credential.lock().unwrap() = Some(credential);
        self
    }

    /// Number of `load` calls observed.
    pub fn load_count(&self) -> usize {
        *self.load_count.lock().unwrap()
    }

    /// Credentials passed to `save`, in order.
    pub fn save_history(&self) -> Vec<Credential> {
        self.save_history.lock().unwrap().clone()
    }

    /// Number of `delete` calls observed.
    pub fn delete_count(&self) -> usize {
        *self.delete_count.lock().unwrap()
    }

    fn check_error(&self) -> Result<(), LifecycleError> {
        if *self.fail_all.lock().unwrap() {
            return Err(LifecycleError::Storage(StorageError::ReadFailed {
                message: "Mock storage failure".to_string(),
            }));
        }
        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStorage for MockCredentialStorage {
    async fn load(&self) -> Result<Option<Credential>, LifecycleError> {
        *self.load_count.lock().unwrap() += 1;
        self.check_error()?;
        Ok(self.credential.lock().unwrap().clone())
    }

    async fn save(&self, credential: &Credential) -> Result<(), LifecycleError> {
        let delay = *self.save_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_error()?;
        if *self.fail_saves.lock().unwrap() {
            return Err(LifecycleError::Storage(StorageError::WriteFailed {
                message: "Mock storage failure".to_string(),
            }));
        }
        self.save_history.lock().unwrap().push(credential.clone());
        *self.credential.lock().unwrap() = Some(credential.clone());
        Ok(())
    }

    async fn delete(&self) -> Result<(), LifecycleError> {
        self.check_error()?;
        *self.delete_count.lock().unwrap() += 1;
        *self.credential.lock().unwrap() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CryptoError;
    use crate::types::now_ms;

    fn test_credential() -> Credential {
        Credential {
            access_token: "test-access-token".to_string(),
            refresh_token: Some("test-refresh-token".to_string()),
            expires_at: now_ms() + 3_600_000,
            token_type: "Bearer".to_string(),
            scope: Some("openid".to_string()),
        }
    }

    #[tokio::test]
    async fn test_in_memory_roundtrip() {
        let storage = InMemoryCredentialStorage::new();
        assert!(storage.load().await.unwrap().is_none());

        let credential = test_credential();
        storage.save(&credential).await.unwrap();
        assert_eq!(storage.load().await.unwrap(), Some(credential));

        storage.delete().await.unwrap();
        assert!(storage.load().await.unwrap().is_none());

        // Deleting again is fine.
        storage.delete().await.unwrap();
    }

    #[tokio::test]
    async fn test_plaintext_blob_storage_is_json() {
        let blobs = Arc::new(MemoryBlobStorage::new());
        let storage = BlobCredentialStorage::new(blobs.clone());

        let credential = test_credential();
        storage.save(&credential).await.unwrap();

        let blob = blobs.current().unwrap();
        assert!(blob.contains("test-access-token"));

        assert_eq!(storage.load().await.unwrap(), Some(credential));
    }

    #[tokio::test]
    async fn test_encrypted_blob_storage_roundtrip() {
        let blobs = Arc::new(MemoryBlobStorage::new());
        let storage = BlobCredentialStorage::with_passphrase(blobs.clone(), "passphrase");

        let credential = test_credential();
        storage.save(&credential).await.unwrap();

        // Token material never appears in the stored blob.
        let blob = blobs.current().unwrap();
        assert!(!blob.contains("test-access-token"));
        assert!(!blob.contains("test-refresh-token"));

        assert_eq!(storage.load().await.unwrap(), Some(credential));
    }

    #[tokio::test]
    async fn test_encrypted_blob_wrong_passphrase() {
        let blobs = Arc::new(MemoryBlobStorage::new());
        let writer = BlobCredentialStorage::with_passphrase(blobs.clone(), "right");
        writer.save(&test_credential()).await.unwrap();

        let reader = BlobCredentialStorage::with_passphrase(blobs, "wrong");
        let result = reader.load().await;
        assert!(matches!(
            result,
            Err(LifecycleError::Crypto(CryptoError::DecryptionFailed))
        ));
    }

    #[tokio::test]
    async fn test_corrupted_json_blob() {
        let blobs = Arc::new(MemoryBlobStorage::with_blob("{not valid json"));
        let storage = BlobCredentialStorage::new(blobs);

        let result = storage.load().await;
        assert!(matches!(
            result,
            Err(LifecycleError::Storage(StorageError::CorruptedData { .. }))
        ));
    }

    #[tokio::test]
    async fn test_blob_storage_empty_is_none() {
        let storage = BlobCredentialStorage::new(Arc::new(MemoryBlobStorage::new()));
        assert!(storage.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mock_storage_histories() {
        let storage = MockCredentialStorage::new();
        let credential = test_credential();

        storage.save(&credential).await.unwrap();
        storage.load().await.unwrap();
        storage.delete().await.unwrap();

        assert_eq!(storage.save_history().len(), 1);
        assert_eq!(storage.load_count(), 1);
        assert_eq!(storage.delete_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_storage_failure_injection() {
        let storage = MockCredentialStorage::new();
        storage.set_fail_all(true);

        assert!(storage.load().await.is_err());
        assert!(storage.save(&test_credential()).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_storage_save_only_failure() {
        let storage = MockCredentialStorage::new();
        storage.set_fail_saves(true);

        let result = storage.save(&test_credential()).await;
        assert!(matches!(
            result,
            Err(LifecycleError::Storage(StorageError::WriteFailed { .. }))
        ));

        // Loads keep working and the failed save left nothing behind.
        assert!(storage.load().await.unwrap().is_none());
        assert!(storage.save_history().is_empty());
    }
}
