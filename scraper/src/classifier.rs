//! Keyword and pattern based relevance checks.
//!
//! Exclusion keywords always win: a listing that mentions "senior" is
//! rejected even when it also says "junior" or "entry level".

use common::{Classification, RawRecord};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Experience-range phrasing that marks a listing as entry level.
const EXPERIENCE_PATTERNS: &[&str] = &[
    r"\b0\s*(?:-|to)?\s*[12]?\s*\+?\s*years?\b",
    r"\bentry[\s-]?level\b",
    r"\bnew[\s-]?grad",
    r"\bno[\s-]?(?:prior\s+)?experience\b",
];

/// The three phrase lists driving classification. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordSet {
    pub fresher: Vec<String>,
    pub remote: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for KeywordSet {
    fn default() -> Self {
        Self {
            fresher: to_strings(&[
                "entry level",
                "junior",
                "fresher",
                "graduate",
                "trainee",
                "intern",
                "associate",
                "no experience",
                "0-1 years",
                "0-2 years",
                "recent graduate",
                "new grad",
                "entry-level",
                "beginner",
                "starting",
                "career starter",
                "apprentice",
            ]),
            remote: to_strings(&[
                "remote",
                "work from home",
                "telecommute",
                "distributed",
                "virtual",
                "home office",
                "anywhere",
                "location independent",
                "wfh",
                "remote-first",
                "fully remote",
                "100% remote",
                "remote work",
                "remote position",
            ]),
            exclude: to_strings(&[
                "senior",
                "lead",
                "principal",
                "architect",
                "manager",
                "director",
                "head of",
                "5+ years",
                "10+ years",
                "experienced",
                "expert",
                "specialist",
                "chief",
                "3+ years",
                "4+ years",
                "minimum 3",
                "minimum 5",
                "at least 3",
                "at least 5",
            ]),
        }
    }
}

impl KeywordSet {
    /// Lowercases and whitespace-collapses every phrase, dropping empties.
    pub fn normalized(self) -> Self {
        let clean = |list: Vec<String>| -> Vec<String> {
            list.iter()
                .map(|phrase| normalize_text(phrase))
                .filter(|phrase| !phrase.is_empty())
                .collect()
        };

        Self {
            fresher: clean(self.fresher),
            remote: clean(self.remote),
            exclude: clean(self.exclude),
        }
    }

    /// The lists must be disjoint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let lists: [(&'static str, &Vec<String>); 3] = [
            ("fresher", &self.fresher),
            ("remote", &self.remote),
            ("exclude", &self.exclude),
        ];

        for (i, (first, left)) in lists.iter().enumerate() {
            for (second, right) in lists.iter().skip(i + 1) {
                if let Some(keyword) = left.iter().find(|k| right.contains(k)) {
                    return Err(ConfigError::OverlappingKeywords {
                        keyword: keyword.clone(),
                        first: *first,
                        second: *second,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Which checks a source's listings must pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevancePolicy {
    Fresher,
    Remote,
    #[default]
    FresherAndRemote,
    Any,
}

impl RelevancePolicy {
    fn admits(self, is_fresher: bool, is_remote: bool) -> bool {
        match self {
            Self::Fresher => is_fresher,
            Self::Remote => is_remote,
            Self::FresherAndRemote => is_fresher && is_remote,
            Self::Any => true,
        }
    }
}

pub struct Classifier {
    keywords: KeywordSet,
    patterns: Vec<Regex>,
    skills: Vec<String>,
}

impl Classifier {
    pub fn new(keywords: KeywordSet, skills: Vec<String>) -> Result<Self, ConfigError> {
        let keywords = keywords.normalized();
        keywords.validate()?;

        let patterns = EXPERIENCE_PATTERNS
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::Pattern {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let skills = skills
            .iter()
            .map(|skill| normalize_text(skill))
            .filter(|skill| !skill.is_empty())
            .collect();

        Ok(Self {
            keywords,
            patterns,
            skills,
        })
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    /// Entry-level check over title and description.
    pub fn is_fresher(&self, record: &RawRecord) -> bool {
        let combined = normalize_text(&format!("{} {}", record.title, record.description));

        if let Some(keyword) = first_hit(&self.keywords.exclude, &combined) {
            debug!("⛔ '{}' excluded by '{}'", record.title, keyword);
            return false;
        }

        if first_hit(&self.keywords.fresher, &combined).is_some() {
            return true;
        }

        self.patterns.iter().any(|re| re.is_match(&combined))
    }

    /// Remote check over title, location and description.
    pub fn is_remote(&self, record: &RawRecord) -> bool {
        let combined = normalize_text(&format!(
            "{} {} {}",
            record.title, record.location, record.description
        ));
        first_hit(&self.keywords.remote, &combined).is_some()
    }

    /// Skill names found on token boundaries in the title or description.
    pub fn skills(&self, record: &RawRecord) -> Vec<String> {
        let combined = normalize_text(&format!("{} {}", record.title, record.description));
        self.skills
            .iter()
            .filter(|skill| contains_term(&combined, skill))
            .cloned()
            .collect()
    }

    /// Runs both checks and applies the source's policy.
    pub fn classify(&self, record: &RawRecord, policy: RelevancePolicy) -> Option<Classification> {
        self.classify_for(record, policy, false)
    }

    /// Same as [`Classifier::classify`], but every listing from a remote-only
    /// board counts as remote whatever its location text says.
    pub fn classify_for(
        &self,
        record: &RawRecord,
        policy: RelevancePolicy,
        remote_only: bool,
    ) -> Option<Classification> {
        let is_fresher = self.is_fresher(record);
        let is_remote = remote_only || self.is_remote(record);

        if !policy.admits(is_fresher, is_remote) {
            return None;
        }

        Some(Classification {
            is_fresher,
            is_remote,
            skills: self.skills(record),
        })
    }
}

pub fn default_skills() -> Vec<String> {
    to_strings(&[
        "python",
        "java",
        "javascript",
        "typescript",
        "golang",
        "react",
        "angular",
        "nodejs",
        "aws",
        "docker",
        "kubernetes",
        "sql",
        "nosql",
        "git",
        "agile",
        "rust",
        "c++",
        "machine learning",
        "cloud",
        "devops",
    ])
}

/// Lowercase and collapse whitespace runs to single spaces.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn first_hit<'a>(keywords: &'a [String], text: &str) -> Option<&'a str> {
    keywords
        .iter()
        .find(|keyword| text.contains(keyword.as_str()))
        .map(String::as_str)
}

// "java" must not match inside "javascript".
fn contains_term(text: &str, term: &str) -> bool {
    text.match_indices(term).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + term.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
