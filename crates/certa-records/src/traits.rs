use async_trait::async_trait;
use certa_types::{
    Bucket, CertificateId, CertificateLinkage, Item, ItemId, ItemStatus, MintedCertificate,
    RewardLogEntry, User, WalletAddress,
};

use crate::error::RecordResult;

/// Relational storage boundary.
///
/// Each call is atomic on its own; there are no multi-row transactions.
/// Callers that span several writes (or several stores) are responsible for
/// their own compensation.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // ---- users ----

    /// Insert a user, or replace profile fields of an existing one. Points
    /// and credits of an existing user are preserved.
    async fn upsert_user(&self, user: User) -> RecordResult<User>;

    async fn get_user(&self, wallet: &WalletAddress) -> RecordResult<Option<User>>;

    /// Add `amount` to a user's reward points and return the new total.
    async fn increment_user_points(&self, wallet: &WalletAddress, amount: u64) -> RecordResult<u64>;

    // ---- items ----

    async fn insert_item(&self, item: Item) -> RecordResult<Item>;

    async fn get_item(&self, id: &ItemId) -> RecordResult<Option<Item>>;

    async fn update_item_status(&self, id: &ItemId, status: ItemStatus) -> RecordResult<Item>;

    /// Overlay certificate/IP references onto an item.
    async fn attach_linkage(&self, id: &ItemId, linkage: CertificateLinkage) -> RecordResult<Item>;

    async fn items_by_owner(&self, owner: &WalletAddress) -> RecordResult<Vec<Item>>;

    /// The item whose documents include `bucket/path`, if any.
    async fn item_referencing(&self, bucket: Bucket, path: &str) -> RecordResult<Option<ItemId>>;

    // ---- reward log ----

    async fn insert_reward(&self, entry: RewardLogEntry) -> RecordResult<RewardLogEntry>;

    async fn rewards_for(&self, user: &WalletAddress) -> RecordResult<Vec<RewardLogEntry>>;

    // ---- certificates ----

    async fn insert_certificate(&self, cert: MintedCertificate) -> RecordResult<MintedCertificate>;

    async fn update_certificate(&self, cert: MintedCertificate) -> RecordResult<MintedCertificate>;

    async fn get_certificate(&self, id: &CertificateId) -> RecordResult<Option<MintedCertificate>>;
}
