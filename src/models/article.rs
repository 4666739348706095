//! Articles: the user-facing writeups, authentic or fabricated.

use super::report::{Report, ReportId};
use super::values::{
    Authenticity, Body, Categories, Category, Country, Discourse, Headline, Language, Stance,
};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(Uuid);

impl ArticleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ArticleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An angle-specific rendering of an article, mirroring one report angle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleFrame {
    pub headline: Headline,
    pub body: Body,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stance: Option<Stance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discourse: Option<Discourse>,
}

/// Attached after publication by a separate enrichment step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_option: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub headline: Headline,
    pub body: Body,
    pub categories: Categories,
    pub country: Country,
    pub language: Language,
    pub authenticity: Authenticity,
    #[serde(default)]
    pub frames: Vec<ArticleFrame>,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub report_ids: Vec<ReportId>,
    #[serde(default)]
    pub quiz_questions: Vec<QuizQuestion>,
    pub created_at: DateTime<Utc>,
}

/// Fields of a fabricated article, as produced by the fabrication agent.
#[derive(Debug, Clone)]
pub struct FabricatedDraft {
    pub headline: Headline,
    pub body: Body,
    pub category: Category,
    pub country: Country,
    pub language: Language,
    pub clarification: String,
    pub published_at: DateTime<Utc>,
}

impl Article {
    /// Compose an authentic article from `report`.
    ///
    /// Each frame renders one report angle, so the counts must match; a
    /// frame without its own stance inherits the stance of its angle.
    pub fn authentic(
        report: &Report,
        language: Language,
        headline: Headline,
        body: Body,
        mut frames: Vec<ArticleFrame>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if frames.len() != report.angles.len() {
            return Err(Error::validation(format!(
                "report {} has {} angles but composition returned {} frames",
                report.id,
                report.angles.len(),
                frames.len()
            )));
        }
        for (frame, angle) in frames.iter_mut().zip(&report.angles) {
            frame.stance = frame.stance.or(Some(angle.stance));
            frame.discourse = frame.discourse.or(angle.discourse);
        }
        Ok(Article {
            id: ArticleId::new(),
            headline,
            body,
            categories: report.categories.clone(),
            country: report.country.clone(),
            language,
            authenticity: Authenticity::Authentic,
            frames,
            published_at: report.dateline,
            report_ids: vec![report.id],
            quiz_questions: Vec::new(),
            created_at: now,
        })
    }

    pub fn fabricated(draft: FabricatedDraft, now: DateTime<Utc>) -> Result<Self> {
        Ok(Article {
            id: ArticleId::new(),
            headline: draft.headline,
            body: draft.body,
            categories: Categories::single(draft.category),
            country: draft.country,
            language: draft.language,
            authenticity: Authenticity::fabricated(draft.clarification)?,
            frames: Vec::new(),
            published_at: draft.published_at,
            report_ids: Vec::new(),
            quiz_questions: Vec::new(),
            created_at: now,
        })
    }

    pub fn is_fabricated(&self) -> bool {
        self.authenticity.is_fabricated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::report::Report;
    use crate::testing::{frame, report_draft};

    #[test]
    fn test_authentic_article_links_report_and_inherits_stance() {
        let report = Report::new(report_draft("US"), Utc::now()).unwrap();
        let mut f = frame("Supporters cheer");
        f.stance = None;
        let article = Article::authentic(
            &report,
            Language::new("en").unwrap(),
            Headline::new("Council passes budget").unwrap(),
            Body::new("The city council passed the budget.").unwrap(),
            vec![f, frame("Critics object")],
            Utc::now(),
        )
        .unwrap();

        assert_eq!(article.report_ids, vec![report.id]);
        assert_eq!(article.published_at, report.dateline);
        assert_eq!(article.frames[0].stance, Some(report.angles[0].stance));
        assert_eq!(article.authenticity.reason(), None);
    }

    #[test]
    fn test_authentic_article_rejects_frame_mismatch() {
        let report = Report::new(report_draft("US"), Utc::now()).unwrap();
        let result = Article::authentic(
            &report,
            Language::new("en").unwrap(),
            Headline::new("Council passes budget").unwrap(),
            Body::new("The city council passed the budget.").unwrap(),
            vec![frame("Only one")],
            Utc::now(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_fabricated_article_has_reason_and_no_reports() {
        let article = Article::fabricated(
            FabricatedDraft {
                headline: Headline::new("Moon declared a nature reserve").unwrap(),
                body: Body::new("Officials announced the moon is now protected.").unwrap(),
                category: Category::Science,
                country: Country::new("US").unwrap(),
                language: Language::new("en").unwrap(),
                clarification: "No such declaration exists.".to_string(),
                published_at: Utc::now(),
            },
            Utc::now(),
        )
        .unwrap();

        assert!(article.is_fabricated());
        assert!(article.report_ids.is_empty());
        assert!(article.frames.is_empty());
        assert_eq!(article.authenticity.reason(), Some("No such declaration exists."));
    }

    #[test]
    fn test_fabricated_article_requires_clarification() {
        let result = Article::fabricated(
            FabricatedDraft {
                headline: Headline::new("Headline").unwrap(),
                body: Body::new("Body").unwrap(),
                category: Category::Other,
                country: Country::new("US").unwrap(),
                language: Language::new("en").unwrap(),
                clarification: "".to_string(),
                published_at: Utc::now(),
            },
            Utc::now(),
        );
        assert!(result.is_err());
    }
}
