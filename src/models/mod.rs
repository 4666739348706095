//! Domain entities and the value objects they are built from.
//!
//! - [`report`]: [`Report`] and its angles, ids and state machines
//! - [`article`]: [`Article`] and its frames
//! - [`values`]: validated scalars such as [`Headline`], [`Country`] and [`Authenticity`]

pub mod article;
pub mod report;
pub mod values;

pub use article::{Article, ArticleFrame, ArticleId, FabricatedDraft, QuizQuestion};
pub use report::{
    AudienceTier, ClassificationState, ContentTraits, DeduplicationState, Report, ReportAngle,
    ReportDraft, ReportId, SourceReference,
};
pub use values::{
    Authenticity, AuthenticityStatus, Body, Categories, Category, Country, Discourse, Facts,
    Headline, Language, Stance, Tone,
};
