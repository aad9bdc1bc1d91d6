use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A named phase bound to a progress threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub threshold: u8,
    pub label: String,
    #[serde(default)]
    pub tag: Option<String>,
}

impl Milestone {
    pub fn new(threshold: u8, label: impl Into<String>) -> Self {
        Self {
            threshold,
            label: label.into(),
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MilestoneError {
    #[error("milestone table must contain at least one entry")]
    Empty,
    #[error("milestone {label:?} has threshold {threshold}, above 100")]
    ThresholdOutOfRange { label: String, threshold: u8 },
}

/// Ordered, non-empty lookup from progress percentage to milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MilestoneTable {
    entries: Vec<Milestone>,
}

impl MilestoneTable {
    /// Builds a table; entries are sorted by threshold. Duplicate thresholds
    /// keep the later entry.
    pub fn new(mut entries: Vec<Milestone>) -> Result<Self, MilestoneError> {
        if entries.is_empty() {
            return Err(MilestoneError::Empty);
        }
        if let Some(bad) = entries.iter().find(|m| m.threshold > 100) {
            return Err(MilestoneError::ThresholdOutOfRange {
                label: bad.label.clone(),
                threshold: bad.threshold,
            });
        }
        entries.sort_by_key(|m| m.threshold);
        entries.dedup_by(|later, earlier| {
            if later.threshold == earlier.threshold {
                std::mem::swap(later, earlier);
                true
            } else {
                false
            }
        });
        Ok(Self { entries })
    }

    /// Built-in tables are written in ascending order and need no validation.
    pub(crate) fn from_sorted(entries: Vec<Milestone>) -> Self {
        debug_assert!(!entries.is_empty());
        debug_assert!(entries.windows(2).all(|w| w[0].threshold < w[1].threshold));
        Self { entries }
    }

    /// Milestone with the greatest threshold not above `progress_percent`
    /// (clamped to 0..=100), or the lowest milestone when none qualifies.
    pub fn resolve(&self, progress_percent: i64) -> &Milestone {
        let clamped = progress_percent.clamp(0, 100);
        self.entries
            .iter()
            .rev()
            .find(|m| i64::from(m.threshold) <= clamped)
            .unwrap_or(&self.entries[0])
    }

    pub fn entries(&self) -> &[Milestone] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'de> Deserialize<'de> for MilestoneTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            entries: Vec<Milestone>,
        }
        let raw = Raw::deserialize(deserializer)?;
        MilestoneTable::new(raw.entries).map_err(serde::de::Error::custom)
    }
}
