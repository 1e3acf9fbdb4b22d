use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

/// Opaque identifier the remote side uses for one item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemHandle(pub String);

impl fmt::Display for ItemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An item yielded by the content source. Never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub handle: ItemHandle,
    /// Raw creation timestamp exactly as the listing reported it.
    pub created_at: Option<String>,
    pub text: Option<String>,
}

impl Candidate {
    pub fn new(handle: impl Into<String>, created_at: Option<&str>) -> Self {
        Self {
            handle: ItemHandle(handle.into()),
            created_at: created_at.map(ToOwned::to_owned),
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }
}

/// Accepts RFC 3339 or epoch seconds (integer or fractional).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    let secs: f64 = raw.parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    let whole = secs.trunc() as i64;
    let nanos = (secs.fract() * 1e9) as u32;
    Utc.timestamp_opt(whole, nanos).single()
}

/// True when the candidate is too recent to delete, or when its age cannot be
/// established. A zero window lets every dated candidate through; an
/// unparseable or missing timestamp is protected regardless of the window.
pub fn is_protected(candidate: &Candidate, now: DateTime<Utc>, preserve_window: Duration) -> bool {
    let Some(created) = candidate.created_at_utc() else {
        return true;
    };
    if preserve_window.is_zero() {
        return false;
    }
    let Ok(window) = chrono::Duration::from_std(preserve_window) else {
        return true;
    };
    match now.checked_sub_signed(window) {
        Some(cutoff) => created > cutoff,
        None => true,
    }
}

/// One reason a candidate may have to be kept.
pub trait ProtectionRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn protects(&self, candidate: &Candidate, now: DateTime<Utc>) -> bool;
}

/// Keeps items created inside the preserve window.
#[derive(Debug, Clone)]
pub struct AgeRule {
    pub preserve_window: Duration,
}

impl ProtectionRule for AgeRule {
    fn name(&self) -> &'static str {
        "age"
    }

    fn protects(&self, candidate: &Candidate, now: DateTime<Utc>) -> bool {
        is_protected(candidate, now, self.preserve_window)
    }
}

/// Keeps items whose text carries any of the configured markers.
#[derive(Debug, Clone)]
pub struct MarkerRule {
    markers: Vec<String>,
}

impl MarkerRule {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let markers = markers
            .into_iter()
            .map(|m| m.as_ref().trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        Self { markers }
    }
}

impl ProtectionRule for MarkerRule {
    fn name(&self) -> &'static str {
        "marker"
    }

    fn protects(&self, candidate: &Candidate, _now: DateTime<Utc>) -> bool {
        let Some(text) = candidate.text.as_deref() else {
            return false;
        };
        let text = text.to_lowercase();
        self.markers.iter().any(|m| text.contains(m.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Eligible,
    Protected { rule: &'static str },
}

/// All protection rules ANDed together: a candidate is eligible only when no
/// rule protects it. Evaluation stops at the first protecting rule.
pub struct EligibilityFilter {
    rules: Vec<Box<dyn ProtectionRule>>,
}

impl EligibilityFilter {
    pub fn new(preserve_window: Duration) -> Self {
        Self {
            rules: vec![Box::new(AgeRule { preserve_window })],
        }
    }

    pub fn with_rule(mut self, rule: impl ProtectionRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn evaluate(&self, candidate: &Candidate, now: DateTime<Utc>) -> Verdict {
        self.rules
            .iter()
            .find(|rule| rule.protects(candidate, now))
            .map_or(Verdict::Eligible, |rule| Verdict::Protected { rule: rule.name() })
    }

    pub fn is_eligible(&self, candidate: &Candidate, now: DateTime<Utc>) -> bool {
        self.evaluate(candidate, now) == Verdict::Eligible
    }
}
