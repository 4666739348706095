//! Self-validating value objects shared by reports and articles.
//!
//! Every type here can only be built through a checked constructor, and the
//! serde impls go through the same checks, so a snapshot or an agent answer
//! can never smuggle an invalid value into an entity.

use crate::error::{Error, Result};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static COUNTRY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2}$").expect("valid regex"));
static LANGUAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]{2}$").expect("valid regex"));

/// Declares a trimmed text newtype with character-count bounds.
macro_rules! bounded_text {
    ($(#[$meta:meta])* $name:ident, $label:literal, $min:expr, $max:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub const MIN_CHARS: usize = $min;
            pub const MAX_CHARS: usize = $max;

            pub fn new(value: impl Into<String>) -> Result<Self> {
                let value = value.into().trim().to_string();
                let chars = value.chars().count();
                if chars < Self::MIN_CHARS {
                    return Err(Error::validation(format!(
                        "{} must be at least {} characters, got {}",
                        $label,
                        Self::MIN_CHARS,
                        chars
                    )));
                }
                if chars > Self::MAX_CHARS {
                    return Err(Error::validation(format!(
                        "{} must be at most {} characters, got {}",
                        $label,
                        Self::MAX_CHARS,
                        chars
                    )));
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

bounded_text!(
    /// An article or frame headline.
    Headline,
    "headline",
    1,
    200
);

bounded_text!(
    /// An article or frame body.
    Body,
    "body",
    1,
    20_000
);

bounded_text!(
    /// The neutral factual statement at the heart of a report.
    Facts,
    "facts",
    20,
    20_000
);

/// Topic category assigned to reports and articles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Politics,
    Business,
    Technology,
    Science,
    Health,
    Environment,
    Sports,
    Culture,
    World,
    Other,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Politics,
        Category::Business,
        Category::Technology,
        Category::Science,
        Category::Health,
        Category::Environment,
        Category::Sports,
        Category::Culture,
        Category::World,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Politics => "politics",
            Category::Business => "business",
            Category::Technology => "technology",
            Category::Science => "science",
            Category::Health => "health",
            Category::Environment => "environment",
            Category::Sports => "sports",
            Category::Culture => "culture",
            Category::World => "world",
            Category::Other => "other",
        }
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| Error::validation(format!("unknown category {s:?}")))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One to three distinct categories, in the order they were given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Category>", into = "Vec<Category>")]
pub struct Categories(Vec<Category>);

impl Categories {
    pub const MAX: usize = 3;

    pub fn new(categories: Vec<Category>) -> Result<Self> {
        let categories: Vec<Category> = categories.into_iter().unique().collect();
        if categories.is_empty() {
            return Err(Error::validation("at least one category is required"));
        }
        if categories.len() > Self::MAX {
            return Err(Error::validation(format!(
                "at most {} categories are allowed, got {}",
                Self::MAX,
                categories.len()
            )));
        }
        Ok(Self(categories))
    }

    pub fn single(category: Category) -> Self {
        Self(vec![category])
    }

    /// Parse free-form category names, rejecting the whole set on any unknown name.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let parsed = names
            .iter()
            .map(|n| n.as_ref().parse::<Category>())
            .collect::<Result<Vec<_>>>()?;
        Self::new(parsed)
    }
}

impl TryFrom<Vec<Category>> for Categories {
    type Error = Error;

    fn try_from(value: Vec<Category>) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Categories> for Vec<Category> {
    fn from(value: Categories) -> Self {
        value.0
    }
}

/// ISO 3166-1 alpha-2 country code, stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Country(String);

impl Country {
    pub fn new(code: impl AsRef<str>) -> Result<Self> {
        let code = code.as_ref().trim().to_uppercase();
        if !COUNTRY_RE.is_match(&code) {
            return Err(Error::validation(format!("invalid country code {code:?}")));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Country {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Country> for String {
    fn from(value: Country) -> String {
        value.0
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ISO 639-1 language code, stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Language(String);

impl Language {
    pub fn new(code: impl AsRef<str>) -> Result<Self> {
        let code = code.as_ref().trim().to_lowercase();
        if !LANGUAGE_RE.is_match(&code) {
            return Err(Error::validation(format!("invalid language code {code:?}")));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Language {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Language> for String {
    fn from(value: Language) -> String {
        value.0
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether an article reports a real event or was fabricated for the game.
///
/// A fabricated article always carries a non-empty clarification explaining
/// what was invented; an authentic one never carries any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AuthenticityRecord", into = "AuthenticityRecord")]
pub enum Authenticity {
    Authentic,
    Fabricated { clarification: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticityStatus {
    Authentic,
    Fabricated,
}

impl Authenticity {
    pub fn fabricated(clarification: impl Into<String>) -> Result<Self> {
        let clarification = clarification.into().trim().to_string();
        if clarification.is_empty() {
            return Err(Error::validation(
                "fabricated articles require a clarification",
            ));
        }
        Ok(Self::Fabricated { clarification })
    }

    pub fn status(&self) -> AuthenticityStatus {
        match self {
            Authenticity::Authentic => AuthenticityStatus::Authentic,
            Authenticity::Fabricated { .. } => AuthenticityStatus::Fabricated,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Authenticity::Authentic => None,
            Authenticity::Fabricated { clarification } => Some(clarification),
        }
    }

    pub fn is_fabricated(&self) -> bool {
        matches!(self, Authenticity::Fabricated { .. })
    }
}

/// Wire form of [`Authenticity`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticityRecord {
    status: AuthenticityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    clarification: Option<String>,
}

impl TryFrom<AuthenticityRecord> for Authenticity {
    type Error = Error;

    fn try_from(record: AuthenticityRecord) -> Result<Self> {
        match (record.status, record.clarification) {
            (AuthenticityStatus::Authentic, None) => Ok(Authenticity::Authentic),
            (AuthenticityStatus::Authentic, Some(_)) => Err(Error::validation(
                "authentic articles cannot carry a clarification",
            )),
            (AuthenticityStatus::Fabricated, Some(c)) => Authenticity::fabricated(c),
            (AuthenticityStatus::Fabricated, None) => Err(Error::validation(
                "fabricated articles require a clarification",
            )),
        }
    }
}

impl From<Authenticity> for AuthenticityRecord {
    fn from(value: Authenticity) -> Self {
        match value {
            Authenticity::Authentic => AuthenticityRecord {
                status: AuthenticityStatus::Authentic,
                clarification: None,
            },
            Authenticity::Fabricated { clarification } => AuthenticityRecord {
                status: AuthenticityStatus::Fabricated,
                clarification: Some(clarification),
            },
        }
    }
}

/// Editorial stance of an angle or frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    Supportive,
    Critical,
    Neutral,
}

impl FromStr for Stance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "supportive" => Ok(Stance::Supportive),
            "critical" => Ok(Stance::Critical),
            "neutral" => Ok(Stance::Neutral),
            other => Err(Error::validation(format!("unknown stance {other:?}"))),
        }
    }
}

/// Whether an angle reflects mainstream or alternative discourse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Discourse {
    Mainstream,
    Alternative,
}

impl FromStr for Discourse {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mainstream" => Ok(Discourse::Mainstream),
            "alternative" => Ok(Discourse::Alternative),
            other => Err(Error::validation(format!("unknown discourse {other:?}"))),
        }
    }
}

/// Register a fabricated article is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Serious,
    Satirical,
}

impl FromStr for Tone {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "serious" => Ok(Tone::Serious),
            "satirical" => Ok(Tone::Satirical),
            other => Err(Error::validation(format!("unknown tone {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headline_trims_and_bounds() {
        assert_eq!(Headline::new("  Hello  ").unwrap().as_str(), "Hello");
        assert!(Headline::new("   ").is_err());
        assert!(Headline::new("a".repeat(201)).is_err());
    }

    #[test]
    fn test_facts_minimum_length() {
        assert!(Facts::new("Too short").is_err());
        assert!(Facts::new("The council approved the new budget on Monday.").is_ok());
    }

    #[test]
    fn test_categories_deduplicate_and_bound() {
        let cats = Categories::new(vec![Category::World, Category::World, Category::Politics])
            .unwrap();
        assert_eq!(Vec::<Category>::from(cats), vec![Category::World, Category::Politics]);
        assert!(Categories::new(vec![]).is_err());
        assert!(
            Categories::new(vec![
                Category::World,
                Category::Politics,
                Category::Health,
                Category::Sports
            ])
            .is_err()
        );
    }

    #[test]
    fn test_categories_parse_rejects_unknown() {
        assert!(Categories::parse(&["Science", "health"]).is_ok());
        assert!(Categories::parse(&["science", "astrology"]).is_err());
    }

    #[test]
    fn test_country_and_language_normalize() {
        assert_eq!(Country::new("us").unwrap().as_str(), "US");
        assert_eq!(Language::new("EN").unwrap().as_str(), "en");
        assert!(Country::new("USA").is_err());
        assert!(Language::new("e1").is_err());
    }

    #[test]
    fn test_authenticity_reason_invariant() {
        assert_eq!(Authenticity::Authentic.reason(), None);
        let fake = Authenticity::fabricated("The summit never took place.").unwrap();
        assert_eq!(fake.status(), AuthenticityStatus::Fabricated);
        assert_eq!(fake.reason(), Some("The summit never took place."));
        assert!(Authenticity::fabricated("  ").is_err());
    }

    #[test]
    fn test_authenticity_deserialization_enforces_invariant() {
        let ok: Authenticity =
            serde_json::from_str(r#"{"status":"fabricated","clarification":"Invented quote"}"#)
                .unwrap();
        assert!(ok.is_fabricated());

        let missing: std::result::Result<Authenticity, _> =
            serde_json::from_str(r#"{"status":"fabricated"}"#);
        assert!(missing.is_err());

        let extra: std::result::Result<Authenticity, _> =
            serde_json::from_str(r#"{"status":"authentic","clarification":"x"}"#);
        assert!(extra.is_err());
    }

    #[test]
    fn test_enum_parsing_is_case_insensitive() {
        assert_eq!("Critical".parse::<Stance>().unwrap(), Stance::Critical);
        assert_eq!(" ALTERNATIVE ".parse::<Discourse>().unwrap(), Discourse::Alternative);
        assert_eq!("satirical".parse::<Tone>().unwrap(), Tone::Satirical);
        assert!("hostile".parse::<Stance>().is_err());
    }
}
