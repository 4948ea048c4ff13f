use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CertificateId, ItemId, RewardId};
use crate::license::LicenseTerms;
use crate::submission::ItemSubmission;
use crate::wallet::WalletAddress;

// ---------------------------------------------------------------------------
// Buckets and object references
// ---------------------------------------------------------------------------

/// Logical object-store namespace.
///
/// The physical bucket names are configured by the storage backend; the
/// workflows only ever refer to the logical bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// Proof-of-purchase documents (bills, receipts).
    Proof,
    /// Identity documents.
    Id,
    /// Certificate assets and their metadata documents.
    Asset,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Proof, Bucket::Id, Bucket::Asset];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proof => "proof",
            Self::Id => "id",
            Self::Asset => "asset",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location of a stored object: its bucket, its key within the bucket, and
/// the public URL it is served under.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub bucket: Bucket,
    pub path: String,
    pub url: String,
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered account, keyed by wallet address.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub wallet: WalletAddress,
    pub display_name: String,
    pub email: Option<String>,
    pub reward_points: u64,
    pub monthly_credits: u32,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(wallet: WalletAddress, display_name: impl Into<String>) -> Self {
        Self {
            wallet,
            display_name: display_name.into(),
            email: None,
            reward_points: 0,
            monthly_credits: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// Verification state of a registered item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    PendingVerification,
    Verified,
    Rejected,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingVerification => "pending_verification",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two proof documents of an item. They exist together or not at all.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDocuments {
    pub bill: ObjectRef,
    pub id: ObjectRef,
}

impl ItemDocuments {
    pub fn contains(&self, bucket: Bucket, path: &str) -> bool {
        [&self.bill, &self.id]
            .into_iter()
            .any(|doc| doc.bucket == bucket && doc.path == path)
    }
}

/// Certificate and IP references attached to an item after minting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateLinkage {
    pub nft_asset_url: Option<String>,
    pub nft_metadata_url: Option<String>,
    pub certificate_id: Option<CertificateId>,
    pub ip_id: Option<String>,
}

impl CertificateLinkage {
    /// Overlay `other` onto `self`; fields absent in `other` are kept.
    pub fn merge(&mut self, other: CertificateLinkage) {
        if other.nft_asset_url.is_some() {
            self.nft_asset_url = other.nft_asset_url;
        }
        if other.nft_metadata_url.is_some() {
            self.nft_metadata_url = other.nft_metadata_url;
        }
        if other.certificate_id.is_some() {
            self.certificate_id = other.certificate_id;
        }
        if other.ip_id.is_some() {
            self.ip_id = other.ip_id;
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// A registered physical item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub category: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub serial_number: Option<String>,
    pub estimated_value: f64,
    pub owner: WalletAddress,
    pub documents: Option<ItemDocuments>,
    pub linkage: CertificateLinkage,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// A new item awaiting verification.
    pub fn new(submission: &ItemSubmission, owner: WalletAddress, documents: ItemDocuments) -> Self {
        let now = Utc::now();
        Self {
            id: ItemId::new(),
            title: submission.title.trim().to_string(),
            category: submission.category.trim().to_string(),
            description: submission.description.clone(),
            brand: submission.brand.clone(),
            serial_number: submission.serial_number.clone(),
            estimated_value: submission.estimated_value,
            owner,
            documents: Some(documents),
            linkage: CertificateLinkage::default(),
            status: ItemStatus::PendingVerification,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn bill_url(&self) -> Option<&str> {
        self.documents.as_ref().map(|d| d.bill.url.as_str())
    }

    pub fn id_url(&self) -> Option<&str> {
        self.documents.as_ref().map(|d| d.id.url.as_str())
    }
}

// ---------------------------------------------------------------------------
// RewardLogEntry
// ---------------------------------------------------------------------------

/// Points granted to a user for an action on an item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardLogEntry {
    pub id: RewardId,
    pub user: WalletAddress,
    pub item: ItemId,
    pub points: u64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl RewardLogEntry {
    pub fn new(user: WalletAddress, item: ItemId, points: u64, reason: impl Into<String>) -> Self {
        Self {
            id: RewardId::new(),
            user,
            item,
            points,
            reason: reason.into(),
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// MintedCertificate
// ---------------------------------------------------------------------------

/// Lifecycle of a certificate row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MintStatus {
    Pending,
    Completed,
    Failed,
}

impl MintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for MintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted summary of an on-chain certificate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintedCertificate {
    pub id: CertificateId,
    pub owner: WalletAddress,
    pub item: Option<ItemId>,
    pub token_id: Option<String>,
    pub contract_address: Option<String>,
    pub tx_hash: Option<String>,
    pub asset_url: String,
    pub metadata_url: String,
    pub license_terms: LicenseTerms,
    pub ip_id: Option<String>,
    pub status: MintStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MintedCertificate {
    /// A certificate for a confirmed mint.
    #[allow(clippy::too_many_arguments)]
    pub fn completed(
        owner: WalletAddress,
        item: Option<ItemId>,
        token_id: impl Into<String>,
        contract_address: impl Into<String>,
        tx_hash: impl Into<String>,
        asset_url: impl Into<String>,
        metadata_url: impl Into<String>,
        license_terms: LicenseTerms,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: CertificateId::new(),
            owner,
            item,
            token_id: Some(token_id.into()),
            contract_address: Some(contract_address.into()),
            tx_hash: Some(tx_hash.into()),
            asset_url: asset_url.into(),
            metadata_url: metadata_url.into(),
            license_terms,
            ip_id: None,
            status: MintStatus::Completed,
            created_at: now,
            updated_at: now,
        }
    }

    /// A completed certificate always carries its transaction hash.
    pub fn is_consistent(&self) -> bool {
        self.status != MintStatus::Completed || self.tx_hash.is_some()
    }
}
