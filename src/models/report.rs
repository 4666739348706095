//! Reports: one real-world event distilled from several source articles.

use super::values::{Body, Categories, Country, Discourse, Facts, Stance};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

static SOURCE_REFERENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*:\S+$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(Uuid);

impl ReportId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReportId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ReportId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| Error::validation(format!("invalid report id {s:?}: {e}")))
    }
}

/// A provider-namespaced external article id, e.g. `worldnewsapi:123`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceReference(String);

impl SourceReference {
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        let value = value.as_ref().trim();
        if !SOURCE_REFERENCE_RE.is_match(value) {
            return Err(Error::validation(format!(
                "source reference {value:?} is not of the form provider:id"
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SourceReference {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SourceReference> for String {
    fn from(value: SourceReference) -> String {
        value.0
    }
}

impl fmt::Display for SourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationState {
    Pending,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeduplicationState {
    Pending,
    Complete,
}

/// Audience reach assigned by the classification agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudienceTier {
    Broad,
    Niche,
    OffTopic,
}

impl AudienceTier {
    /// Broad and niche reports get articles; off-topic ones are archived.
    pub fn is_publishable(&self) -> bool {
        matches!(self, AudienceTier::Broad | AudienceTier::Niche)
    }
}

impl FromStr for AudienceTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "broad" => Ok(AudienceTier::Broad),
            "niche" => Ok(AudienceTier::Niche),
            "off_topic" | "offtopic" | "archived" => Ok(AudienceTier::OffTopic),
            other => Err(Error::validation(format!("unknown audience tier {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTraits {
    #[serde(default)]
    pub enriching: bool,
    #[serde(default)]
    pub uplifting: bool,
}

/// One distinct editorial viewpoint on the event. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportAngle {
    /// Everything the sources say from this viewpoint, compiled rather than summarized.
    pub corpus: Body,
    pub stance: Stance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discourse: Option<Discourse>,
}

/// Everything needed to create a report; validated by [`Report::new`].
#[derive(Debug, Clone)]
pub struct ReportDraft {
    pub categories: Categories,
    pub country: Country,
    pub dateline: DateTime<Utc>,
    pub facts: Facts,
    pub angles: Vec<ReportAngle>,
    pub source_references: Vec<SourceReference>,
    pub traits: ContentTraits,
    pub deduplication_state: DeduplicationState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub categories: Categories,
    pub country: Country,
    pub dateline: DateTime<Utc>,
    pub facts: Facts,
    pub angles: Vec<ReportAngle>,
    pub source_references: Vec<SourceReference>,
    pub traits: ContentTraits,
    pub classification_state: ClassificationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<AudienceTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification_reason: Option<String>,
    pub deduplication_state: DeduplicationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<ReportId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    pub const MAX_ANGLES: usize = 2;

    pub fn new(draft: ReportDraft, now: DateTime<Utc>) -> Result<Self> {
        if draft.angles.is_empty() || draft.angles.len() > Self::MAX_ANGLES {
            return Err(Error::validation(format!(
                "a report needs 1 to {} angles, got {}",
                Self::MAX_ANGLES,
                draft.angles.len()
            )));
        }
        let mut report = Report {
            id: ReportId::new(),
            categories: draft.categories,
            country: draft.country,
            dateline: draft.dateline,
            facts: draft.facts,
            angles: draft.angles,
            source_references: Vec::new(),
            traits: draft.traits,
            classification_state: ClassificationState::Pending,
            tier: None,
            classification_reason: None,
            deduplication_state: draft.deduplication_state,
            duplicate_of: None,
            created_at: now,
            updated_at: now,
        };
        report.push_unique_references(draft.source_references);
        Ok(report)
    }

    /// Append references not already present. Returns how many were added.
    pub fn add_source_references(
        &mut self,
        references: impl IntoIterator<Item = SourceReference>,
        now: DateTime<Utc>,
    ) -> usize {
        let added = self.push_unique_references(references);
        if added > 0 {
            self.updated_at = now;
        }
        added
    }

    fn push_unique_references(
        &mut self,
        references: impl IntoIterator<Item = SourceReference>,
    ) -> usize {
        let mut added = 0;
        for reference in references {
            if !self.source_references.contains(&reference) {
                self.source_references.push(reference);
                added += 1;
            }
        }
        added
    }

    /// Record the classification. A report is classified exactly once.
    pub fn classify(
        &mut self,
        tier: AudienceTier,
        reason: impl Into<String>,
        traits: Option<ContentTraits>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.classification_state == ClassificationState::Complete {
            return Err(Error::validation(format!(
                "report {} is already classified",
                self.id
            )));
        }
        self.tier = Some(tier);
        self.classification_reason = Some(reason.into());
        if let Some(traits) = traits {
            self.traits = traits;
        }
        self.classification_state = ClassificationState::Complete;
        self.updated_at = now;
        Ok(())
    }

    /// Close the deduplication state machine, optionally as an alias of `duplicate_of`.
    pub fn resolve_deduplication(
        &mut self,
        duplicate_of: Option<ReportId>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if duplicate_of == Some(self.id) {
            return Err(Error::validation(format!(
                "report {} cannot be a duplicate of itself",
                self.id
            )));
        }
        self.duplicate_of = duplicate_of;
        self.deduplication_state = DeduplicationState::Complete;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_alias(&self) -> bool {
        self.duplicate_of.is_some()
    }

    pub fn is_publishable(&self) -> bool {
        self.classification_state == ClassificationState::Complete
            && !self.is_alias()
            && self.tier.is_some_and(|t| t.is_publishable())
    }
}
