use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use certa_crypto::{ContentDigest, ContentHasher};
use certa_types::{ItemSubmission, UploadFile, WalletAddress};
use tracing::debug;

use crate::error::GateError;

/// Identity of a submission: who sent it and a fingerprint of what they sent.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubmissionKey {
    owner: WalletAddress,
    fingerprint: ContentDigest,
}

impl SubmissionKey {
    /// Key of a registration: the title plus both documents' bytes.
    pub fn registration(
        owner: WalletAddress,
        submission: &ItemSubmission,
        bill: &UploadFile,
        id_document: &UploadFile,
    ) -> Self {
        let fingerprint = ContentHasher::REGISTRATION.hash_parts(&[
            submission.title.trim().as_bytes(),
            &bill.bytes[..],
            &id_document.bytes[..],
        ]);
        Self { owner, fingerprint }
    }

    /// Key of a mint attempt: the asset bytes and the workflow mode.
    pub fn mint(owner: WalletAddress, asset: &UploadFile, mode: &str) -> Self {
        let fingerprint = ContentHasher::MINT.hash_parts(&[mode.as_bytes(), &asset.bytes[..]]);
        Self { owner, fingerprint }
    }

    pub fn owner(&self) -> &WalletAddress {
        &self.owner
    }
}

impl fmt::Debug for SubmissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubmissionKey({}, {})", self.owner.short(), self.fingerprint.short_hex())
    }
}

/// In-process set of in-flight submissions.
///
/// Cloning shares the same set. A key stays held for as long as the
/// returned [`SubmissionPermit`] is alive.
#[derive(Clone, Default)]
pub struct SubmissionGuard {
    inflight: Arc<Mutex<HashSet<SubmissionKey>>>,
}

impl SubmissionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`, or fail if an identical submission is in flight.
    pub fn try_acquire(&self, key: SubmissionKey) -> Result<SubmissionPermit, GateError> {
        let mut inflight = self.inflight.lock().expect("lock poisoned");
        if !inflight.insert(key) {
            debug!(?key, "duplicate submission refused");
            return Err(GateError::DuplicateSubmission);
        }
        Ok(SubmissionPermit {
            inflight: Arc::clone(&self.inflight),
            key,
        })
    }

    /// Number of keys currently held.
    pub fn in_flight(&self) -> usize {
        self.inflight.lock().expect("lock poisoned").len()
    }
}

impl fmt::Debug for SubmissionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionGuard")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Releases its key when dropped.
#[must_use = "the key is released as soon as the permit is dropped"]
pub struct SubmissionPermit {
    inflight: Arc<Mutex<HashSet<SubmissionKey>>>,
    key: SubmissionKey,
}

impl SubmissionPermit {
    pub fn key(&self) -> &SubmissionKey {
        &self.key
    }
}

impl fmt::Debug for SubmissionPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SubmissionPermit").field(&self.key).finish()
    }
}

impl Drop for SubmissionPermit {
    fn drop(&mut self) {
        if let Ok(mut inflight) = self.inflight.lock() {
            inflight.remove(&self.key);
        }
    }
}
