use crate::config::GateConfig;
use crate::error::GateError;
use crate::stage::{Preflight, PreflightStage, StageDecision};

/// Item metadata checks.
///
/// Title and category must be non-blank, the estimated value finite and not
/// negative, and every free-text field within its length limit.
pub struct SubmissionStage;

impl PreflightStage for SubmissionStage {
    fn name(&self) -> &str {
        "submission"
    }

    fn evaluate(&self, input: &Preflight<'_>, config: &GateConfig) -> Result<StageDecision, GateError> {
        let Some(s) = input.submission else {
            return Ok(StageDecision::fail("item details are missing"));
        };

        if s.title.trim().is_empty() {
            return Ok(StageDecision::fail("title is required"));
        }
        if s.category.trim().is_empty() {
            return Ok(StageDecision::fail("category is required"));
        }
        if s.title.chars().count() > config.max_title_chars {
            return Ok(StageDecision::fail(format!(
                "title exceeds {} characters",
                config.max_title_chars
            )));
        }
        if !s.estimated_value.is_finite() {
            return Ok(StageDecision::fail("estimated value must be a number"));
        }
        if s.estimated_value < 0.0 {
            return Ok(StageDecision::fail("estimated value must not be negative"));
        }

        let optional = [
            ("description", &s.description),
            ("brand", &s.brand),
            ("serial number", &s.serial_number),
        ];
        for (field, value) in optional {
            if value.as_ref().is_some_and(|v| v.chars().count() > config.max_text_chars) {
                return Ok(StageDecision::fail(format!(
                    "{field} exceeds {} characters",
                    config.max_text_chars
                )));
            }
        }

        Ok(StageDecision::Pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certa_types::ItemSubmission;

    fn run(s: &ItemSubmission) -> StageDecision {
        SubmissionStage
            .evaluate(&Preflight::new().submission(s), &GateConfig::default())
            .unwrap()
    }

    fn reason(d: StageDecision) -> String {
        match d {
            StageDecision::Fail { reason } => reason,
            StageDecision::Pass => panic!("expected failure"),
        }
    }

    #[test]
    fn accepts_minimal_submission() {
        assert!(run(&ItemSubmission::new("Watch", "Jewelry", 0.0)).is_pass());
    }

    #[test]
    fn rejects_blank_title() {
        assert!(reason(run(&ItemSubmission::new(" \t", "Jewelry", 1.0))).contains("title"));
    }

    #[test]
    fn rejects_negative_and_non_finite_values() {
        assert!(reason(run(&ItemSubmission::new("Watch", "Jewelry", -0.01))).contains("negative"));
        assert!(reason(run(&ItemSubmission::new("Watch", "Jewelry", f64::NAN))).contains("number"));
        assert!(!run(&ItemSubmission::new("Watch", "Jewelry", f64::INFINITY)).is_pass());
    }

    #[test]
    fn rejects_long_fields() {
        let long = "x".repeat(201);
        assert!(!run(&ItemSubmission::new(long, "Jewelry", 1.0)).is_pass());

        let s = ItemSubmission::new("Watch", "Jewelry", 1.0).with_brand("b".repeat(2_001));
        assert!(reason(run(&s)).contains("brand"));
    }

    #[test]
    fn missing_submission_fails() {
        let d = SubmissionStage
            .evaluate(&Preflight::new(), &GateConfig::default())
            .unwrap();
        assert!(!d.is_pass());
    }
}
