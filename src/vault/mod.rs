use std::collections::HashMap;
use std::sync::Arc;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use redis::{AsyncCommands, Client};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::CredentialBundle;

const ENVELOPE_PREFIX: &str = "v1:";

/// Raw storage under the `user:{id}` keyspace. Entries have no TTL —
/// credential deletion is an explicit administrative action, never automatic.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait VaultStore: Send + Sync {
    async fn get(&self, user_id: &str) -> AppResult<Option<String>>;
    async fn set(&self, user_id: &str, value: String) -> AppResult<()>;
}

/// Redis-backed credential storage
#[derive(Clone)]
pub struct RedisVaultStore {
    redis_client: Client,
}

impl RedisVaultStore {
    pub fn new(redis_client: Client) -> Self {
        Self { redis_client }
    }

    fn storage_key(user_id: &str) -> String {
        format!("user:{}", user_id)
    }
}

#[async_trait::async_trait]
impl VaultStore for RedisVaultStore {
    async fn get(&self, user_id: &str) -> AppResult<Option<String>> {
        let mut conn = self
            .redis_client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Vault(e.to_string()))?;

        conn.get(Self::storage_key(user_id))
            .await
            .map_err(|e| AppError::Vault(e.to_string()))
    }

    async fn set(&self, user_id: &str, value: String) -> AppResult<()> {
        let mut conn = self
            .redis_client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Vault(e.to_string()))?;

        conn.set::<_, _, ()>(Self::storage_key(user_id), value)
            .await
            .map_err(|e| AppError::Vault(e.to_string()))
    }
}

/// In-memory credential storage for tests and single-process development
#[derive(Debug, Default)]
pub struct MemoryVaultStore {
    entries: RwLock<HashMap<String, String>>,
}

#[async_trait::async_trait]
impl VaultStore for MemoryVaultStore {
    async fn get(&self, user_id: &str) -> AppResult<Option<String>> {
        Ok(self.entries.read().await.get(user_id).cloned())
    }

    async fn set(&self, user_id: &str, value: String) -> AppResult<()> {
        self.entries
            .write()
            .await
            .insert(user_id.to_string(), value);
        Ok(())
    }
}

/// Encrypts and decrypts per-user credential bundles at rest.
///
/// Bundles are stored as `v1:<nonce b64>:<ciphertext b64>` envelopes under
/// AES-256-GCM. The decrypted form is only ever held in memory for the span
/// of one request. Every `put` overwrites the whole bundle — partial updates
/// are read-modify-write at the caller, last writer wins.
pub struct CredentialVault {
    store: Arc<dyn VaultStore>,
    key: [u8; 32],
}

impl CredentialVault {
    pub fn new(store: Arc<dyn VaultStore>, key: [u8; 32]) -> Self {
        Self { store, key }
    }

    /// Builds the vault from the configured hex secret, enforcing the
    /// 256-bit key length. This is the startup-time invariant check.
    pub fn from_hex_key(store: Arc<dyn VaultStore>, hex_key: &str) -> anyhow::Result<Self> {
        let bytes =
            hex::decode(hex_key).map_err(|e| anyhow::anyhow!("Invalid encryption key: {}", e))?;
        let key: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            anyhow::anyhow!(
                "Invalid encryption key length: {} bytes, expected 32",
                bytes.len()
            )
        })?;
        Ok(Self::new(store, key))
    }

    pub async fn get(&self, user_id: &str) -> AppResult<Option<CredentialBundle>> {
        let Some(envelope) = self.store.get(user_id).await? else {
            return Ok(None);
        };

        let bundle = self.decrypt(&envelope)?;
        Ok(Some(bundle))
    }

    pub async fn put(&self, user_id: &str, bundle: &CredentialBundle) -> AppResult<()> {
        let envelope = self.encrypt(bundle)?;
        self.store.set(user_id, envelope).await
    }

    fn encrypt(&self, bundle: &CredentialBundle) -> AppResult<String> {
        let plaintext = serde_json::to_vec(bundle)
            .map_err(|e| AppError::Internal(format!("Credential serialization error: {}", e)))?;

        let nonce_source = Uuid::new_v4().into_bytes();
        let nonce = Nonce::from_slice(&nonce_source[..12]);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_ref())
            .map_err(|e| AppError::Internal(format!("Credential encryption failed: {}", e)))?;

        Ok(format!(
            "{}{}:{}",
            ENVELOPE_PREFIX,
            URL_SAFE_NO_PAD.encode(&nonce_source[..12]),
            URL_SAFE_NO_PAD.encode(ciphertext)
        ))
    }

    fn decrypt(&self, envelope: &str) -> AppResult<CredentialBundle> {
        let body = envelope
            .strip_prefix(ENVELOPE_PREFIX)
            .ok_or(AppError::CorruptCredentials)?;
        let (nonce_b64, ciphertext_b64) =
            body.split_once(':').ok_or(AppError::CorruptCredentials)?;

        let nonce_bytes = URL_SAFE_NO_PAD
            .decode(nonce_b64)
            .map_err(|_| AppError::CorruptCredentials)?;
        if nonce_bytes.len() != 12 {
            return Err(AppError::CorruptCredentials);
        }
        let ciphertext = URL_SAFE_NO_PAD
            .decode(ciphertext_b64)
            .map_err(|_| AppError::CorruptCredentials)?;

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| AppError::CorruptCredentials)?;

        serde_json::from_slice(&plaintext).map_err(|_| AppError::CorruptCredentials)
    }
}
