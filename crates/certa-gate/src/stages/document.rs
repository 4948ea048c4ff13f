use certa_types::UploadFile;

use crate::config::GateConfig;
use crate::error::GateError;
use crate::stage::{Preflight, PreflightStage, StageDecision};

/// Both proof documents present, non-empty and within the size limit.
pub struct DocumentStage;

fn check(label: &str, file: Option<&UploadFile>, config: &GateConfig) -> Option<String> {
    let Some(file) = file else {
        return Some(format!("{label} document is required"));
    };
    if file.is_empty() {
        return Some(format!("{label} document is empty"));
    }
    if file.len() > config.max_document_bytes {
        return Some(format!(
            "{label} document is {} bytes; the limit is {}",
            file.len(),
            config.max_document_bytes
        ));
    }
    None
}

impl PreflightStage for DocumentStage {
    fn name(&self) -> &str {
        "documents"
    }

    fn evaluate(&self, input: &Preflight<'_>, config: &GateConfig) -> Result<StageDecision, GateError> {
        let failure = check("bill", input.bill, config)
            .or_else(|| check("id", input.id_document, config));
        Ok(match failure {
            Some(reason) => StageDecision::Fail { reason },
            None => StageDecision::Pass,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn doc(len: usize) -> UploadFile {
        UploadFile::new("doc.pdf", "application/pdf", Bytes::from(vec![1u8; len]))
    }

    #[test]
    fn accepts_two_documents() {
        let (bill, id) = (doc(3), doc(3));
        let d = DocumentStage
            .evaluate(&Preflight::new().documents(&bill, &id), &GateConfig::default())
            .unwrap();
        assert!(d.is_pass());
    }

    #[test]
    fn names_the_offending_document() {
        let (bill, id) = (doc(3), doc(0));
        let d = DocumentStage
            .evaluate(&Preflight::new().documents(&bill, &id), &GateConfig::default())
            .unwrap();
        assert_eq!(d, StageDecision::fail("id document is empty"));
    }

    #[test]
    fn enforces_size_limit() {
        let config = GateConfig {
            max_document_bytes: 4,
            ..GateConfig::default()
        };
        let (bill, id) = (doc(5), doc(1));
        let d = DocumentStage
            .evaluate(&Preflight::new().documents(&bill, &id), &config)
            .unwrap();
        assert!(matches!(d, StageDecision::Fail { reason } if reason.starts_with("bill")));
    }
}
