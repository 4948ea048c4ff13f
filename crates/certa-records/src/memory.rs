use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use certa_types::{
    Bucket, CertificateId, CertificateLinkage, Item, ItemId, ItemStatus, MintedCertificate,
    RewardLogEntry, User, WalletAddress,
};
use chrono::Utc;
use tracing::debug;

use crate::error::{RecordError, RecordResult};
use crate::traits::RecordStore;

/// Write operations that can be made to fail for tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordOp {
    UpsertUser,
    IncrementPoints,
    InsertItem,
    UpdateItem,
    InsertReward,
    InsertCertificate,
    UpdateCertificate,
}

#[derive(Default)]
struct Faults {
    always: HashMap<RecordOp, bool>,
    next: HashMap<RecordOp, usize>,
}

#[derive(Default)]
struct Tables {
    users: HashMap<WalletAddress, User>,
    items: BTreeMap<ItemId, Item>,
    rewards: Vec<RewardLogEntry>,
    certificates: BTreeMap<CertificateId, MintedCertificate>,
}

/// In-memory record store for tests, local demos, and embedding.
///
/// Enforces the same constraints a relational schema would: items and
/// reward entries reference an existing user, ids are unique, and a
/// completed certificate carries a transaction hash.
pub struct InMemoryRecordStore {
    tables: RwLock<Tables>,
    faults: Mutex<Faults>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            faults: Mutex::new(Faults::default()),
        }
    }

    /// Make every call of `op` fail until [`Self::heal`].
    pub fn fail(&self, op: RecordOp) {
        self.faults.lock().expect("lock poisoned").always.insert(op, true);
    }

    /// Make the next `count` calls of `op` fail.
    pub fn fail_next(&self, op: RecordOp, count: usize) {
        *self
            .faults
            .lock()
            .expect("lock poisoned")
            .next
            .entry(op)
            .or_default() += count;
    }

    /// Clear injected failures for `op`.
    pub fn heal(&self, op: RecordOp) {
        let mut faults = self.faults.lock().expect("lock poisoned");
        faults.always.remove(&op);
        faults.next.remove(&op);
    }

    pub fn item_count(&self) -> usize {
        self.tables.read().expect("lock poisoned").items.len()
    }

    pub fn certificate_count(&self) -> usize {
        self.tables.read().expect("lock poisoned").certificates.len()
    }

    pub fn reward_count(&self) -> usize {
        self.tables.read().expect("lock poisoned").rewards.len()
    }

    pub fn certificates(&self) -> Vec<MintedCertificate> {
        self.tables
            .read()
            .expect("lock poisoned")
            .certificates
            .values()
            .cloned()
            .collect()
    }

    fn check(&self, op: RecordOp) -> RecordResult<()> {
        let mut faults = self.faults.lock().expect("lock poisoned");
        if faults.always.get(&op).copied().unwrap_or(false) {
            return Err(RecordError::Unavailable(format!("injected failure for {op:?}")));
        }
        if let Some(n) = faults.next.get_mut(&op) {
            if *n > 0 {
                *n -= 1;
                return Err(RecordError::Unavailable(format!("injected failure for {op:?}")));
            }
        }
        Ok(())
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn upsert_user(&self, user: User) -> RecordResult<User> {
        self.check(RecordOp::UpsertUser)?;
        let mut tables = self.tables.write().expect("lock poisoned");
        let stored = match tables.users.get(&user.wallet) {
            Some(existing) => User {
                reward_points: existing.reward_points,
                monthly_credits: existing.monthly_credits,
                created_at: existing.created_at,
                ..user
            },
            None => user,
        };
        tables.users.insert(stored.wallet, stored.clone());
        Ok(stored)
    }

    async fn get_user(&self, wallet: &WalletAddress) -> RecordResult<Option<User>> {
        Ok(self.tables.read().expect("lock poisoned").users.get(wallet).cloned())
    }

    async fn increment_user_points(&self, wallet: &WalletAddress, amount: u64) -> RecordResult<u64> {
        self.check(RecordOp::IncrementPoints)?;
        let mut tables = self.tables.write().expect("lock poisoned");
        let user = tables
            .users
            .get_mut(wallet)
            .ok_or_else(|| RecordError::not_found("user", wallet))?;
        user.reward_points = user.reward_points.saturating_add(amount);
        Ok(user.reward_points)
    }

    async fn insert_item(&self, item: Item) -> RecordResult<Item> {
        self.check(RecordOp::InsertItem)?;
        let mut tables = self.tables.write().expect("lock poisoned");
        if !tables.users.contains_key(&item.owner) {
            return Err(RecordError::not_found("user", item.owner));
        }
        if tables.items.contains_key(&item.id) {
            return Err(RecordError::Duplicate {
                entity: "item",
                key: item.id.to_string(),
            });
        }
        tables.items.insert(item.id, item.clone());
        debug!(item = %item.id, owner = %item.owner, "item inserted");
        Ok(item)
    }

    async fn get_item(&self, id: &ItemId) -> RecordResult<Option<Item>> {
        Ok(self.tables.read().expect("lock poisoned").items.get(id).cloned())
    }

    async fn update_item_status(&self, id: &ItemId, status: ItemStatus) -> RecordResult<Item> {
        self.check(RecordOp::UpdateItem)?;
        let mut tables = self.tables.write().expect("lock poisoned");
        let item = tables
            .items
            .get_mut(id)
            .ok_or_else(|| RecordError::not_found("item", id))?;
        item.status = status;
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn attach_linkage(&self, id: &ItemId, linkage: CertificateLinkage) -> RecordResult<Item> {
        self.check(RecordOp::UpdateItem)?;
        let mut tables = self.tables.write().expect("lock poisoned");
        let item = tables
            .items
            .get_mut(id)
            .ok_or_else(|| RecordError::not_found("item", id))?;
        item.linkage.merge(linkage);
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn items_by_owner(&self, owner: &WalletAddress) -> RecordResult<Vec<Item>> {
        let tables = self.tables.read().expect("lock poisoned");
        Ok(tables
            .items
            .values()
            .filter(|i| &i.owner == owner)
            .cloned()
            .collect())
    }

    async fn item_referencing(&self, bucket: Bucket, path: &str) -> RecordResult<Option<ItemId>> {
        let tables = self.tables.read().expect("lock poisoned");
        Ok(tables
            .items
            .values()
            .find(|i| i.documents.as_ref().is_some_and(|d| d.contains(bucket, path)))
            .map(|i| i.id))
    }

    async fn insert_reward(&self, entry: RewardLogEntry) -> RecordResult<RewardLogEntry> {
        self.check(RecordOp::InsertReward)?;
        let mut tables = self.tables.write().expect("lock poisoned");
        if !tables.users.contains_key(&entry.user) {
            return Err(RecordError::not_found("user", entry.user));
        }
        if !tables.items.contains_key(&entry.item) {
            return Err(RecordError::not_found("item", entry.item));
        }
        tables.rewards.push(entry.clone());
        debug!(user = %entry.user, item = %entry.item, points = entry.points, "reward logged");
        Ok(entry)
    }

    async fn rewards_for(&self, user: &WalletAddress) -> RecordResult<Vec<RewardLogEntry>> {
        let tables = self.tables.read().expect("lock poisoned");
        Ok(tables
            .rewards
            .iter()
            .filter(|r| &r.user == user)
            .cloned()
            .collect())
    }

    async fn insert_certificate(&self, cert: MintedCertificate) -> RecordResult<MintedCertificate> {
        self.check(RecordOp::InsertCertificate)?;
        if !cert.is_consistent() {
            return Err(RecordError::Invariant(
                "completed certificate without transaction hash".into(),
            ));
        }
        let mut tables = self.tables.write().expect("lock poisoned");
        if tables.certificates.contains_key(&cert.id) {
            return Err(RecordError::Duplicate {
                entity: "certificate",
                key: cert.id.to_string(),
            });
        }
        tables.certificates.insert(cert.id, cert.clone());
        debug!(certificate = %cert.id, "certificate inserted");
        Ok(cert)
    }

    async fn update_certificate(&self, mut cert: MintedCertificate) -> RecordResult<MintedCertificate> {
        self.check(RecordOp::UpdateCertificate)?;
        if !cert.is_consistent() {
            return Err(RecordError::Invariant(
                "completed certificate without transaction hash".into(),
            ));
        }
        let mut tables = self.tables.write().expect("lock poisoned");
        if !tables.certificates.contains_key(&cert.id) {
            return Err(RecordError::not_found("certificate", cert.id));
        }
        cert.updated_at = Utc::now();
        tables.certificates.insert(cert.id, cert.clone());
        Ok(cert)
    }

    async fn get_certificate(&self, id: &CertificateId) -> RecordResult<Option<MintedCertificate>> {
        Ok(self
            .tables
            .read()
            .expect("lock poisoned")
            .certificates
            .get(id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certa_types::{Bucket, ItemDocuments, ItemSubmission, LicenseTerms, MintStatus, ObjectRef};

    fn wallet(b: u8) -> WalletAddress {
        WalletAddress::from_bytes([b; 20])
    }

    fn item_for(owner: WalletAddress) -> Item {
        let doc = |bucket, path: &str| ObjectRef {
            bucket,
            path: path.into(),
            url: format!("http://x/{path}"),
        };
        Item::new(
            &ItemSubmission::new("Watch", "Jewelry", 500.0),
            owner,
            ItemDocuments {
                bill: doc(Bucket::Proof, "a/bill.pdf"),
                id: doc(Bucket::Id, "a/id.png"),
            },
        )
    }

    async fn store_with_user(b: u8) -> InMemoryRecordStore {
        let store = InMemoryRecordStore::new();
        store.upsert_user(User::new(wallet(b), "alice")).await.unwrap();
        store
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn upsert_preserves_points() {
        let store = store_with_user(0xaa).await;
        store.increment_user_points(&wallet(0xaa), 10).await.unwrap();
        let updated = store
            .upsert_user(User::new(wallet(0xaa), "alice b").with_email("a@x"))
            .await
            .unwrap();
        assert_eq!(updated.reward_points, 10);
        assert_eq!(updated.display_name, "alice b");
        assert_eq!(updated.email.as_deref(), Some("a@x"));
    }

    #[tokio::test]
    async fn increment_unknown_user_fails() {
        let store = InMemoryRecordStore::new();
        let err = store.increment_user_points(&wallet(1), 5).await.unwrap_err();
        assert!(matches!(err, RecordError::NotFound { entity: "user", .. }));
    }

    #[tokio::test]
    async fn increment_accumulates() {
        let store = store_with_user(0xaa).await;
        assert_eq!(store.increment_user_points(&wallet(0xaa), 10).await.unwrap(), 10);
        assert_eq!(store.increment_user_points(&wallet(0xaa), 5).await.unwrap(), 15);
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn insert_item_requires_owner() {
        let store = InMemoryRecordStore::new();
        let err = store.insert_item(item_for(wallet(2))).await.unwrap_err();
        assert!(matches!(err, RecordError::NotFound { entity: "user", .. }));
        assert_eq!(store.item_count(), 0);
    }

    #[tokio::test]
    async fn insert_item_rejects_duplicate_id() {
        let store = store_with_user(0xaa).await;
        let item = item_for(wallet(0xaa));
        store.insert_item(item.clone()).await.unwrap();
        let err = store.insert_item(item).await.unwrap_err();
        assert!(matches!(err, RecordError::Duplicate { entity: "item", .. }));
    }

    #[tokio::test]
    async fn status_and_linkage_updates() {
        let store = store_with_user(0xaa).await;
        let item = store.insert_item(item_for(wallet(0xaa))).await.unwrap();

        let verified = store
            .update_item_status(&item.id, ItemStatus::Verified)
            .await
            .unwrap();
        assert_eq!(verified.status, ItemStatus::Verified);

        let linked = store
            .attach_linkage(
                &item.id,
                CertificateLinkage {
                    ip_id: Some("ip-9".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(linked.linkage.ip_id.as_deref(), Some("ip-9"));
        assert_eq!(store.items_by_owner(&wallet(0xaa)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn finds_item_by_document() {
        let store = store_with_user(0xaa).await;
        let item = store.insert_item(item_for(wallet(0xaa))).await.unwrap();

        assert_eq!(store.item_referencing(Bucket::Proof, "a/bill.pdf").await.unwrap(), Some(item.id));
        assert_eq!(store.item_referencing(Bucket::Id, "a/id.png").await.unwrap(), Some(item.id));
        assert_eq!(store.item_referencing(Bucket::Id, "a/bill.pdf").await.unwrap(), None);
        assert_eq!(store.item_referencing(Bucket::Proof, "b/bill.pdf").await.unwrap(), None);
    }

    // -----------------------------------------------------------------------
    // Rewards and certificates
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn reward_requires_item() {
        let store = store_with_user(0xaa).await;
        let err = store
            .insert_reward(RewardLogEntry::new(wallet(0xaa), ItemId::new(), 10, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::NotFound { entity: "item", .. }));
    }

    #[tokio::test]
    async fn certificate_invariant_enforced() {
        let store = InMemoryRecordStore::new();
        let mut cert = MintedCertificate::completed(
            wallet(1),
            None,
            "1",
            "0xc",
            "0xtx",
            "u",
            "m",
            LicenseTerms::default(),
        );
        cert.tx_hash = None;
        let err = store.insert_certificate(cert.clone()).await.unwrap_err();
        assert!(matches!(err, RecordError::Invariant(_)));

        cert.status = MintStatus::Pending;
        store.insert_certificate(cert).await.unwrap();
        assert_eq!(store.certificate_count(), 1);
    }

    #[tokio::test]
    async fn update_certificate_requires_existing_row() {
        let store = InMemoryRecordStore::new();
        let cert = MintedCertificate::completed(
            wallet(1),
            None,
            "1",
            "0xc",
            "0xtx",
            "u",
            "m",
            LicenseTerms::default(),
        );
        assert!(store.update_certificate(cert.clone()).await.is_err());
        store.insert_certificate(cert.clone()).await.unwrap();
        let updated = store
            .update_certificate(MintedCertificate {
                ip_id: Some("ip".into()),
                ..cert
            })
            .await
            .unwrap();
        assert_eq!(updated.ip_id.as_deref(), Some("ip"));
    }

    // -----------------------------------------------------------------------
    // Fault injection
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn fail_next_is_consumed() {
        let store = store_with_user(0xaa).await;
        store.fail_next(RecordOp::InsertItem, 1);
        let err = store.insert_item(item_for(wallet(0xaa))).await.unwrap_err();
        assert!(err.is_transient());
        assert!(store.insert_item(item_for(wallet(0xaa))).await.is_ok());
    }

    #[tokio::test]
    async fn fail_until_healed() {
        let store = store_with_user(0xaa).await;
        store.fail(RecordOp::IncrementPoints);
        assert!(store.increment_user_points(&wallet(0xaa), 1).await.is_err());
        assert!(store.increment_user_points(&wallet(0xaa), 1).await.is_err());
        store.heal(RecordOp::IncrementPoints);
        assert_eq!(store.increment_user_points(&wallet(0xaa), 1).await.unwrap(), 1);
    }
}
