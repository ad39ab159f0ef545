//! Free-text rationale attached alongside a [`Decision`].
//!
//! Rationale text is enrichment only: it never feeds back into the
//! status. A [`RationaleSource`] (for example a remote text generator
//! living outside this crate) may produce it; [`TemplateRationale`] is
//! the deterministic fallback used whenever no source answers.

use serde::{Deserialize, Serialize};

use crate::classify::{Decision, Status};
use crate::types::MetricSummary;

/// Optional caller-supplied patient details.
///
/// Stored alongside a record and quoted in generation prompts. Never
/// read by the classifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diabetes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl PatientContext {
    /// Clinically relevant fields that are present and non-blank, as
    /// `key=value` pairs in a fixed order. The name is left out.
    #[must_use]
    pub fn clinical_entries(&self) -> Vec<String> {
        let text = |key: &str, value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| format!("{key}={v}"))
        };
        [
            self.age.map(|v| format!("age={v}")),
            self.diabetes.map(|v| format!("diabetes={v}")),
            text("pain", &self.pain),
            text("notes", &self.notes),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Everything a rationale generator may look at.
#[derive(Debug, Clone, Copy)]
pub struct RationaleInput<'a> {
    pub current: &'a MetricSummary,
    pub previous: Option<&'a MetricSummary>,
    pub decision: &'a Decision,
    pub context: Option<&'a PatientContext>,
}

impl RationaleInput<'_> {
    /// Prompt text for a text-generation backend.
    ///
    /// Only the measured metrics, the automated status, its explanation
    /// and non-empty patient context are included.
    #[must_use]
    pub fn prompt(&self) -> String {
        let c = self.current;
        let mut lines = vec![
            "You are a careful clinical assistant. Do not invent facts. \
             Use ONLY the metrics and context provided."
                .to_string(),
            String::new(),
            format!("Automated status: {}", self.decision.status),
            format!(
                "Metrics: area={}, area_pct={:.3}, redness={:.1}, exudate_ratio={:.3}",
                c.area, c.area_pct, c.redness, c.exudate_ratio
            ),
        ];
        if let Some(p) = self.previous {
            lines.push(format!(
                "Previous: area={}, redness={:.1}, exudate_ratio={:.3}",
                p.area, p.redness, p.exudate_ratio
            ));
        }
        lines.push(format!(
            "Delta_pct (vs previous): {:.1}",
            self.decision.delta_pct
        ));
        lines.push(format!(
            "Explanation: {}",
            self.decision.explanation_string()
        ));
        if let Some(entries) = self
            .context
            .map(PatientContext::clinical_entries)
            .filter(|e| !e.is_empty())
        {
            lines.push(format!("Context: {}", entries.join(", ")));
        }
        lines.extend([
            String::new(),
            "TASK:".to_string(),
            "1) Provide a ONE-LINER clinician summary citing the metric(s) behind this status."
                .to_string(),
            "2) Provide FOUR short plain-language bullet points for the patient.".to_string(),
            "Be concise and factual.".to_string(),
        ]);
        lines.join("\n")
    }
}

/// A producer of rationale text.
///
/// Returning `None` means "no answer"; callers then fall back to
/// [`TemplateRationale`].
pub trait RationaleSource {
    fn rationale(&self, input: &RationaleInput<'_>) -> Option<String>;
}

/// Fixed one-sentence guidance per status.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRationale;

impl TemplateRationale {
    #[must_use]
    pub const fn text(status: Status) -> &'static str {
        match status {
            Status::Stable => {
                "Status: Stable. Continue current wound care and follow up as scheduled."
            }
            Status::Monitor => {
                "Status: Monitor. Observe wound daily; photograph change. \
                 Contact clinician if worsening."
            }
            Status::Concerning => {
                "Status: Concerning. Consider nurse review; increase dressing \
                 frequency and monitor."
            }
            Status::Urgent => {
                "Status: URGENT. Recommend immediate clinician review; \
                 consider in-person evaluation."
            }
        }
    }
}

impl RationaleSource for TemplateRationale {
    fn rationale(&self, input: &RationaleInput<'_>) -> Option<String> {
        Some(Self::text(input.decision.status).to_string())
    }
}

/// Ask `source`, falling back to the status template when it yields
/// nothing or only whitespace.
#[must_use]
pub fn rationale_or_template<S: RationaleSource + ?Sized>(
    source: &S,
    input: &RationaleInput<'_>,
) -> String {
    match source.rationale(input) {
        Some(text) if !text.trim().is_empty() => text,
        _ => {
            log::debug!("rationale source gave no text; using template");
            TemplateRationale::text(input.decision.status).to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Quality;

    struct Silent;

    impl RationaleSource for Silent {
        fn rationale(&self, _input: &RationaleInput<'_>) -> Option<String> {
            None
        }
    }

    struct Fixed(&'static str);

    impl RationaleSource for Fixed {
        fn rationale(&self, _input: &RationaleInput<'_>) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    fn decision(status: Status) -> Decision {
        Decision {
            status,
            delta_pct: 20.0,
            quality: Quality::Ok,
            explanation: vec!["area_increase_pct:20.0".to_string()],
        }
    }

    #[test]
    fn template_covers_every_status() {
        assert!(TemplateRationale::text(Status::Urgent).starts_with("Status: URGENT."));
        assert!(TemplateRationale::text(Status::Stable).contains("follow up as scheduled"));
        assert!(TemplateRationale::text(Status::Monitor).contains("Observe wound daily"));
        assert!(TemplateRationale::text(Status::Concerning).contains("nurse review"));
    }

    #[test]
    fn silent_source_falls_back() {
        let current = MetricSummary::default();
        let decision = decision(Status::Concerning);
        let input = RationaleInput {
            current: &current,
            previous: None,
            decision: &decision,
            context: None,
        };
        assert_eq!(
            rationale_or_template(&Silent, &input),
            TemplateRationale::text(Status::Concerning)
        );
        assert_eq!(
            rationale_or_template(&Fixed("  \n"), &input),
            TemplateRationale::text(Status::Concerning)
        );
    }

    #[test]
    fn source_text_wins_when_present() {
        let current = MetricSummary::default();
        let decision = decision(Status::Urgent);
        let input = RationaleInput {
            current: &current,
            previous: None,
            decision: &decision,
            context: None,
        };
        assert_eq!(rationale_or_template(&Fixed("see a nurse"), &input), "see a nurse");
    }

    #[test]
    fn prompt_cites_metrics_and_status() {
        let current = MetricSummary {
            area: 120,
            redness: 88.0,
            ..MetricSummary::default()
        };
        let previous = MetricSummary {
            area: 100,
            ..MetricSummary::default()
        };
        let decision = decision(Status::Urgent);
        let prompt = RationaleInput {
            current: &current,
            previous: Some(&previous),
            decision: &decision,
            context: None,
        }
        .prompt();
        assert!(prompt.contains("Automated status: Urgent"));
        assert!(prompt.contains("area=120"));
        assert!(prompt.contains("Previous: area=100"));
        assert!(prompt.contains("Delta_pct (vs previous): 20.0"));
        assert!(prompt.contains("Explanation: area_increase_pct:20.0"));
        assert!(!prompt.contains("Context:"));
    }

    #[test]
    fn prompt_quotes_non_empty_context() {
        let current = MetricSummary::default();
        let decision = decision(Status::Concerning);
        let context = PatientContext {
            name: Some("A. Patient".to_string()),
            age: Some(67),
            diabetes: Some(true),
            pain: Some("  ".to_string()),
            notes: Some("dressing changed yesterday".to_string()),
        };
        let prompt = RationaleInput {
            current: &current,
            previous: None,
            decision: &decision,
            context: Some(&context),
        }
        .prompt();
        assert!(
            prompt.contains("Context: age=67, diabetes=true, notes=dressing changed yesterday")
        );
        assert!(!prompt.contains("pain="));
        assert!(!prompt.contains("A. Patient"));
    }

    #[test]
    fn empty_context_adds_no_line() {
        let current = MetricSummary::default();
        let decision = decision(Status::Stable);
        let context = PatientContext::default();
        let prompt = RationaleInput {
            current: &current,
            previous: None,
            decision: &decision,
            context: Some(&context),
        }
        .prompt();
        assert!(!prompt.contains("Context:"));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn context_json_is_partial_and_sparse() {
        let context: PatientContext =
            serde_json::from_str(r#"{"age": 54, "notes": "post-op"}"#).unwrap();
        assert_eq!(context.age, Some(54));
        assert_eq!(context.notes.as_deref(), Some("post-op"));
        assert!(context.diabetes.is_none());
        assert_eq!(
            serde_json::to_string(&context).unwrap(),
            r#"{"age":54,"notes":"post-op"}"#
        );
    }
}
