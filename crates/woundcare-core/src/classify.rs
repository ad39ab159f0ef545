//! Triage classification: metrics (plus an optional prior) to a status.
//!
//! The classifier is an ordered chain of override rules. The running
//! status starts at [`Status::Monitor`] and each [`Rule`] in
//! [`Rule::ORDER`] may overwrite it. The guards are asymmetric:
//!
//! - moderate exudate, moderate growth and moderate redness only
//!   escalate when the status is not already `Urgent`;
//! - a shrinking area (`delta_pct < -5`) sets `Stable` unconditionally,
//!   even over an `Urgent` exudate verdict;
//! - redness runs last and can re-escalate after that downgrade.
//!
//! The result is not a severity maximum.
//!
//! Every rule that fires appends a tag to the explanation trail in
//! evaluation order. The growth rule only runs when a prior observation
//! is supplied: without one there is no `area_change_pct:0.0` tag, and
//! an observation that trips nothing else reports `heuristic_default`.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::types::MetricSummary;

/// Triage status, informally ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Stable,
    Monitor,
    Concerning,
    Urgent,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => f.write_str("Stable"),
            Self::Monitor => f.write_str("Monitor"),
            Self::Concerning => f.write_str("Concerning"),
            Self::Urgent => f.write_str("Urgent"),
        }
    }
}

/// Capture-fidelity flag. Never influences [`Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Ok,
    Poor,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Poor => f.write_str("poor"),
        }
    }
}

/// Outcome of one classification call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub status: Status,
    /// Percentage change of area against the prior observation, or 0
    /// when there is none.
    pub delta_pct: f64,
    pub quality: Quality,
    /// Tags of every rule that fired, in evaluation order. Never empty.
    pub explanation: Vec<String>,
}

impl Decision {
    /// Tag used when no rule fired.
    pub const DEFAULT_TAG: &'static str = "heuristic_default";

    /// The explanation trail joined with `"; "`.
    #[must_use]
    pub fn explanation_string(&self) -> String {
        self.explanation.join("; ")
    }
}

/// Thresholds of the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// `exudate_ratio` at or above this is `Urgent`.
    pub exudate_high: f64,
    /// `exudate_ratio` at or above this (and below `exudate_high`) is
    /// `Concerning`.
    pub exudate_moderate: f64,
    /// Area growth (percent) strictly above this is `Urgent`.
    pub delta_urgent: f64,
    /// Area growth (percent) strictly above this is `Concerning`.
    pub delta_concerning: f64,
    /// Area change (percent) strictly below this is `Stable`.
    pub delta_decrease: f64,
    /// Redness strictly above this is `Urgent`.
    pub redness_urgent: f64,
    /// Redness strictly above this is `Concerning`.
    pub redness_concerning: f64,
    /// `blur_var` strictly below this marks the capture as poor.
    pub blur_poor: f64,
    /// `brightness` strictly below this marks the capture as poor.
    pub brightness_poor: f64,
}

impl ClassifierConfig {
    pub const DEFAULT_EXUDATE_HIGH: f64 = 0.08;
    pub const DEFAULT_EXUDATE_MODERATE: f64 = 0.03;
    pub const DEFAULT_DELTA_URGENT: f64 = 15.0;
    pub const DEFAULT_DELTA_CONCERNING: f64 = 5.0;
    pub const DEFAULT_DELTA_DECREASE: f64 = -5.0;
    pub const DEFAULT_REDNESS_URGENT: f64 = 150.0;
    pub const DEFAULT_REDNESS_CONCERNING: f64 = 120.0;
    pub const DEFAULT_BLUR_POOR: f64 = 60.0;
    pub const DEFAULT_BRIGHTNESS_POOR: f64 = 30.0;
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            exudate_high: Self::DEFAULT_EXUDATE_HIGH,
            exudate_moderate: Self::DEFAULT_EXUDATE_MODERATE,
            delta_urgent: Self::DEFAULT_DELTA_URGENT,
            delta_concerning: Self::DEFAULT_DELTA_CONCERNING,
            delta_decrease: Self::DEFAULT_DELTA_DECREASE,
            redness_urgent: Self::DEFAULT_REDNESS_URGENT,
            redness_concerning: Self::DEFAULT_REDNESS_CONCERNING,
            blur_poor: Self::DEFAULT_BLUR_POOR,
            brightness_poor: Self::DEFAULT_BRIGHTNESS_POOR,
        }
    }
}

/// Percentage change of area relative to the prior observation.
///
/// The prior area is floored at 1 so a zero prior cannot divide by zero.
/// Returns 0.0 without a prior.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_delta_pct(current: &MetricSummary, previous: Option<&MetricSummary>) -> f64 {
    previous.map_or(0.0, |prev| {
        let prev_area = prev.area.max(1) as f64;
        (current.area as f64 - prev_area) / prev_area * 100.0
    })
}

/// Sanitized scalar inputs seen by the rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleInput {
    pub redness: f64,
    pub exudate_ratio: f64,
    /// `None` when there is no prior observation.
    pub delta_pct: Option<f64>,
}

/// Result of a rule that fired.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    /// New running status, or `None` for an informational tag.
    pub status: Option<Status>,
    pub tag: String,
}

impl Verdict {
    fn set(status: Status, tag: String) -> Self {
        Self {
            status: Some(status),
            tag,
        }
    }

    const fn note(tag: String) -> Self {
        Self { status: None, tag }
    }
}

/// The status-changing rules, in the order they are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rule {
    Exudate,
    Growth,
    Redness,
}

impl Rule {
    /// Fixed evaluation order.
    pub const ORDER: [Self; 3] = [Self::Exudate, Self::Growth, Self::Redness];

    /// Evaluate this rule against the running status.
    #[must_use]
    pub fn evaluate(
        self,
        input: &RuleInput,
        status: Status,
        config: &ClassifierConfig,
    ) -> Option<Verdict> {
        match self {
            Self::Exudate => exudate(input.exudate_ratio, status, config),
            Self::Growth => input.delta_pct.and_then(|d| growth(d, status, config)),
            Self::Redness => redness(input.redness, status, config),
        }
    }
}

fn exudate(ratio: f64, status: Status, config: &ClassifierConfig) -> Option<Verdict> {
    if ratio >= config.exudate_high {
        Some(Verdict::set(Status::Urgent, format!("high_exudate:{ratio:.3}")))
    } else if ratio >= config.exudate_moderate && status != Status::Urgent {
        Some(Verdict::set(
            Status::Concerning,
            format!("moderate_exudate:{ratio:.3}"),
        ))
    } else {
        None
    }
}

fn growth(delta: f64, status: Status, config: &ClassifierConfig) -> Option<Verdict> {
    if delta > config.delta_urgent {
        Some(Verdict::set(
            Status::Urgent,
            format!("area_increase_pct:{delta:.1}"),
        ))
    } else if delta > config.delta_concerning && status != Status::Urgent {
        Some(Verdict::set(
            Status::Concerning,
            format!("area_increase_pct:{delta:.1}"),
        ))
    } else if delta >= config.delta_decrease && delta <= config.delta_concerning {
        Some(Verdict::note(format!("area_change_pct:{delta:.1}")))
    } else if delta < config.delta_decrease {
        // Unconditional: overrides any earlier Urgent or Concerning.
        Some(Verdict::set(
            Status::Stable,
            format!("area_decrease_pct:{delta:.1}"),
        ))
    } else {
        None
    }
}

fn redness(redness: f64, status: Status, config: &ClassifierConfig) -> Option<Verdict> {
    if redness > config.redness_urgent {
        Some(Verdict::set(Status::Urgent, format!("redness:{redness:.1}")))
    } else if redness > config.redness_concerning && status != Status::Urgent {
        Some(Verdict::set(
            Status::Concerning,
            format!("redness:{redness:.1}"),
        ))
    } else {
        None
    }
}

/// Out-of-range scalars are read as zero.
fn sanitize(v: f64) -> f64 {
    if v.is_finite() && v >= 0.0 { v } else { 0.0 }
}

/// Classify the current observation, optionally against a prior one.
///
/// Total: every input yields exactly one [`Decision`]. Non-finite or
/// negative scalars are treated as 0.0.
#[must_use]
pub fn classify(
    current: &MetricSummary,
    previous: Option<&MetricSummary>,
    config: &ClassifierConfig,
) -> Decision {
    let delta_pct = previous.map(|prev| compute_delta_pct(current, Some(prev)));
    let blur_var = sanitize(current.blur_var);
    let brightness = sanitize(current.brightness);
    let input = RuleInput {
        redness: sanitize(current.redness),
        exudate_ratio: sanitize(current.exudate_ratio),
        delta_pct,
    };

    let mut explanation = Vec::new();

    let quality = if blur_var < config.blur_poor || brightness < config.brightness_poor {
        explanation.push(format!(
            "image_quality: blur_var={blur_var:.1}, brightness={brightness:.1}"
        ));
        Quality::Poor
    } else {
        Quality::Ok
    };

    let status = Rule::ORDER
        .into_iter()
        .fold(Status::Monitor, |status, rule| {
            match rule.evaluate(&input, status, config) {
                Some(verdict) => {
                    debug!("rule {rule:?} fired: {} ({status} -> {:?})", verdict.tag, verdict.status);
                    explanation.push(verdict.tag);
                    verdict.status.unwrap_or(status)
                }
                None => status,
            }
        });

    if explanation.is_empty() {
        explanation.push(Decision::DEFAULT_TAG.to_string());
    }

    Decision {
        status,
        delta_pct: delta_pct.unwrap_or(0.0),
        quality,
        explanation,
    }
}
