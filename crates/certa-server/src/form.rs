//! Reading registration and mint requests out of multipart forms.

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::Multipart;
use certa_gate::WalletSession;
use certa_minting::{MintMode, MintRequest};
use certa_types::{ItemId, ItemSubmission, LicenseTerms, UploadFile, WalletAddress};

use crate::error::{ServerError, ServerResult};

/// A field that is missing or does not parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct FormError(String);

type FormResult<T> = Result<T, FormError>;

/// Text fields and files of one multipart request.
#[derive(Debug, Default)]
pub struct Form {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadFile>,
}

impl Form {
    pub async fn read(mut multipart: Multipart) -> ServerResult<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServerError::BadRequest(e.to_string()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ServerError::BadRequest(e.to_string()))?;
                    form.files
                        .insert(name, UploadFile::new(file_name, content_type, bytes));
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| ServerError::BadRequest(e.to_string()))?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    /// A text field, trimmed; blank counts as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn parsed<T: FromStr>(&self, name: &str, what: &str) -> FormResult<Option<T>> {
        self.text(name)
            .map(|v| {
                v.parse()
                    .map_err(|_| FormError(format!("{name} must be {what}")))
            })
            .transpose()
    }

    fn take_file(&mut self, name: &str, label: &str) -> FormResult<UploadFile> {
        self.files
            .remove(name)
            .ok_or_else(|| FormError(format!("{label} is required")))
    }

    pub fn owner(&self) -> FormResult<WalletAddress> {
        let raw = self
            .text("owner")
            .ok_or_else(|| FormError("owner wallet is required".into()))?;
        WalletAddress::parse(raw).map_err(|e| FormError(e.to_string()))
    }

    /// Item fields. Title and category are left for preflight to judge.
    pub fn submission(&self) -> FormResult<ItemSubmission> {
        let estimated_value = self
            .parsed::<f64>("estimated_value", "a number")?
            .ok_or_else(|| FormError("estimated_value is required".into()))?;
        let mut submission = ItemSubmission::new(
            self.text("title").unwrap_or_default(),
            self.text("category").unwrap_or_default(),
            estimated_value,
        );
        if let Some(brand) = self.text("brand") {
            submission = submission.with_brand(brand);
        }
        if let Some(serial) = self.text("serial_number") {
            submission = submission.with_serial_number(serial);
        }
        if let Some(description) = self.text("description") {
            submission = submission.with_description(description);
        }
        Ok(submission)
    }

    /// License fields over the non-commercial remix defaults.
    pub fn license(&self) -> FormResult<LicenseTerms> {
        let mut terms = LicenseTerms::default();
        if let Some(v) = self.parsed("commercial_use", "true or false")? {
            terms.commercial_use = v;
        }
        if let Some(v) = self.parsed("derivatives_allowed", "true or false")? {
            terms.derivatives_allowed = v;
        }
        if let Some(v) = self.parsed("attribution_required", "true or false")? {
            terms.attribution_required = v;
        }
        if let Some(v) = self.parsed("commercial_rev_share_bps", "a whole number of basis points")? {
            terms.commercial_rev_share_bps = v;
        }
        Ok(terms)
    }

    /// `(submission, bill, id document, owner)` for a registration.
    pub fn registration(&mut self) -> FormResult<(ItemSubmission, UploadFile, UploadFile, WalletAddress)> {
        let submission = self.submission()?;
        let owner = self.owner()?;
        let bill = self.take_file("bill", "bill document")?;
        let id_document = self.take_file("id", "id document")?;
        Ok((submission, bill, id_document, owner))
    }

    /// A mint request. Without `chain_id` the wallet counts as disconnected.
    pub fn mint_request(&mut self) -> FormResult<MintRequest> {
        let submission = self.submission()?;
        let owner = self.owner()?;
        let wallet = match self.parsed::<u64>("chain_id", "a chain id")? {
            Some(chain_id) => WalletSession::connected(owner, chain_id),
            None => WalletSession::disconnected(owner),
        };
        let mode = self
            .text("mode")
            .map(MintMode::from_str)
            .transpose()
            .map_err(|e| FormError(e.to_string()))?
            .unwrap_or(MintMode::MintOnly);
        let item = self
            .text("item_id")
            .map(ItemId::from_str)
            .transpose()
            .map_err(|e| FormError(e.to_string()))?;
        let license = self.license()?;
        let asset = self.take_file("asset", "asset file")?;

        let mut request = MintRequest::new(asset, submission, wallet, mode).with_license(license);
        if let Some(item) = item {
            request = request.for_item(item);
        }
        Ok(request)
    }
}
