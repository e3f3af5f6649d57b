//! Credential Record persistence.

use crate::{DualStore, StorageError, StorageKeys, StorageResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// User profile snapshot as returned by the backend.
///
/// Fields beyond id/name/email are kept in `extra` so they survive a
/// read-modify-write cycle untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Access token plus the user it was issued to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub access_token: String,
    pub user: UserProfile,
    #[serde(default)]
    pub remember_me: bool,
}

/// Proof that a caller observed the store at a given generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteTicket(u64);

/// Reads and writes the single current Credential Record.
///
/// Every write that changes the access token, and every clear, bumps a
/// generation counter. Profile edits do not. Long-running writers
/// (token refresh) take a [`WriteTicket`] first and commit against it, so a
/// result that lands after a newer write is rejected instead of clobbering it.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<DualStore>,
    generation: Arc<Mutex<u64>>,
}

impl CredentialStore {
    pub fn new(inner: Arc<DualStore>) -> Self {
        Self {
            inner,
            generation: Arc::new(Mutex::new(0)),
        }
    }

    /// The underlying dual store.
    pub fn layers(&self) -> &DualStore {
        &self.inner
    }

    /// Current write generation.
    pub fn generation(&self) -> u64 {
        *self.generation.lock()
    }

    /// Persist a record to both layers.
    ///
    /// A [`StorageError::PartialWrite`] still leaves one usable copy.
    pub fn write(&self, record: &CredentialRecord) -> StorageResult<()> {
        let mut generation = self.generation.lock();
        self.put_locked(&mut generation, record)
    }

    /// Read the current record, if any.
    pub fn read(&self) -> StorageResult<Option<CredentialRecord>> {
        self.inner.get_json(StorageKeys::CREDENTIAL_RECORD)
    }

    /// Remove the record from both layers.
    pub fn clear(&self) -> StorageResult<()> {
        let mut generation = self.generation.lock();
        *generation += 1;
        self.inner.remove(StorageKeys::CREDENTIAL_RECORD)?;
        info!("Credential record cleared");
        Ok(())
    }

    /// Snapshot the generation before starting a slow write.
    pub fn begin_write(&self) -> WriteTicket {
        WriteTicket(self.generation())
    }

    /// Replace the access token (and user, if given) unless another write
    /// landed since `ticket` was taken.
    pub fn commit_access_token(
        &self,
        ticket: WriteTicket,
        access_token: &str,
        user: Option<UserProfile>,
    ) -> StorageResult<CredentialRecord> {
        let mut generation = self.generation.lock();
        if *generation != ticket.0 {
            debug!(
                ticket = ticket.0,
                current = *generation,
                "Rejecting stale credential write"
            );
            return Err(StorageError::StaleWrite);
        }
        self.update_locked(&mut generation, |record| {
            record.access_token = access_token.to_string();
            if let Some(user) = user {
                record.user = user;
            }
        })
    }

    /// Replace the access token, keeping `remember_me`.
    pub fn update_access_token(
        &self,
        access_token: &str,
        user: Option<UserProfile>,
    ) -> StorageResult<CredentialRecord> {
        let ticket = self.begin_write();
        self.commit_access_token(ticket, access_token, user)
    }

    /// Replace the stored user profile.
    ///
    /// Leaves the generation alone: an in-flight refresh still commits its
    /// token on top of the edited profile.
    pub fn update_user(&self, user: UserProfile) -> StorageResult<CredentialRecord> {
        let _generation = self.generation.lock();
        let mut record = self.read_existing()?;
        record.user = user;
        self.inner.put(StorageKeys::CREDENTIAL_RECORD, &encode(&record)?)?;
        Ok(record)
    }

    fn read_existing(&self) -> StorageResult<CredentialRecord> {
        self.read()?
            .ok_or_else(|| StorageError::NotFound(StorageKeys::CREDENTIAL_RECORD.to_string()))
    }

    fn update_locked(
        &self,
        generation: &mut u64,
        mutate: impl FnOnce(&mut CredentialRecord),
    ) -> StorageResult<CredentialRecord> {
        let mut record = self.read_existing()?;
        mutate(&mut record);
        self.put_locked(generation, &record)?;
        Ok(record)
    }

    fn put_locked(&self, generation: &mut u64, record: &CredentialRecord) -> StorageResult<()> {
        let json = encode(record)?;
        *generation += 1;
        self.inner.put(StorageKeys::CREDENTIAL_RECORD, &json)
    }
}

fn encode(record: &CredentialRecord) -> StorageResult<String> {
    serde_json::to_string(record).map_err(|e| StorageError::Encoding(e.to_string()))
}
