use anyhow::Result;
use std::collections::HashMap;
use tabtrack_storage::{Category, Database};

/// How a rule decides whether a page belongs to its category
#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    /// Any of these substrings appears in the domain
    Domains(&'static [&'static str]),
    /// Any of these keywords appears in the lowercased "domain url" text
    Keywords(&'static [&'static str]),
}

/// One entry of a category's rule list
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub matcher: Matcher,
    /// Confidence of the rule, reported for diagnostics only
    pub weight: f32,
}

const fn domains(list: &'static [&'static str], weight: f32) -> Rule {
    Rule {
        matcher: Matcher::Domains(list),
        weight,
    }
}

const fn keywords(list: &'static [&'static str], weight: f32) -> Rule {
    Rule {
        matcher: Matcher::Keywords(list),
        weight,
    }
}

/// Built-in rules. Categories are checked in this order and the first
/// matching rule wins, so order is the tie-break.
pub static BUILT_IN_RULES: [(Category, &[Rule]); 5] = [
    (
        Category::HighlyProductive,
        &[
            domains(&["github.com", "gitlab.com", "bitbucket.org"], 1.0),
            domains(&["stackoverflow.com", "stackexchange.com"], 0.95),
            domains(&["developer.mozilla.org", "w3schools.com"], 0.9),
            keywords(&["documentation", "api", "tutorial", "learn"], 0.85),
        ],
    ),
    (
        Category::Productive,
        &[
            domains(&["google.com/search", "bing.com", "duckduckgo.com"], 0.8),
            domains(&["medium.com", "dev.to", "hashnode.com"], 0.75),
            domains(&["coursera.org", "udemy.com", "edx.org"], 0.9),
            keywords(&["work", "project", "task", "productivity"], 0.7),
        ],
    ),
    (
        Category::Neutral,
        &[
            domains(&["gmail.com", "outlook.com", "slack.com"], 0.6),
            domains(&["drive.google.com", "dropbox.com", "onedrive.com"], 0.65),
            keywords(&["news", "weather", "maps"], 0.5),
        ],
    ),
    (
        Category::Unproductive,
        &[
            domains(&["facebook.com", "twitter.com", "instagram.com"], 0.2),
            domains(&["youtube.com", "netflix.com", "twitch.tv"], 0.1),
            domains(&["reddit.com", "pinterest.com", "tiktok.com"], 0.15),
            keywords(&["game", "entertainment", "meme", "funny"], 0.25),
        ],
    ),
    (
        Category::Break,
        &[
            domains(&["spotify.com", "music.apple.com", "soundcloud.com"], 0.4),
            keywords(&["meditation", "relaxation", "break"], 0.6),
        ],
    ),
];

const LEARNING_HINTS: [&str; 3] = ["learn", "tutorial", "doc"];
const ENTERTAINMENT_HINTS: [&str; 3] = ["game", "fun", "entertainment"];

/// Host name of a URL without a leading `www.`, or `unknown` if the URL does
/// not parse or has no host
#[must_use]
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .map_or_else(
            || String::from("unknown"),
            |host| host.strip_prefix("www.").map_or(host.clone(), str::to_string),
        )
}

/// Classification result with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub category: Category,
    pub domain: String,
    pub source: ClassificationSource,
}

/// Where the classification came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClassificationSource {
    /// Matched a user-defined domain override
    Override,
    /// Matched a built-in rule with the given weight
    BuiltInRule { weight: f32 },
    /// No rule matched; decided by URL keywords
    Heuristic,
}

/// Classifier for categorizing pages by domain and URL
/// Priority: User overrides > Built-in rules > URL heuristic
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    overrides: HashMap<String, Category>,
}

impl Classifier {
    /// Create a classifier with no overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a classifier with the given domain overrides
    #[must_use]
    pub fn with_overrides<I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, Category)>,
    {
        Self {
            overrides: overrides.into_iter().collect(),
        }
    }

    /// Create a classifier from the overrides stored in the database
    ///
    /// # Errors
    ///
    /// Returns an error if the database query for overrides fails
    pub fn from_database(db: &Database) -> Result<Self> {
        let classifier = Self::with_overrides(
            db.get_domain_overrides()?
                .into_iter()
                .map(|o| (o.domain, o.category)),
        );
        log::info!("Loaded {} domain overrides", classifier.overrides.len());
        Ok(classifier)
    }

    /// Add or replace an override in memory
    pub fn set_override(&mut self, domain: String, category: Category) {
        self.overrides.insert(domain, category);
    }

    /// Remove an override in memory
    pub fn remove_override(&mut self, domain: &str) -> bool {
        self.overrides.remove(domain).is_some()
    }

    /// Classify a URL into one of the five categories
    #[must_use]
    pub fn classify(&self, url: &str) -> Category {
        self.classify_full(url).category
    }

    /// Classify with full result metadata
    #[must_use]
    pub fn classify_full(&self, url: &str) -> ClassificationResult {
        let domain = extract_domain(url);

        // 1. User overrides first (highest priority)
        if let Some(category) = self.overrides.get(&domain) {
            log::debug!("'{domain}' matched override -> {category}");
            return ClassificationResult {
                category: *category,
                domain,
                source: ClassificationSource::Override,
            };
        }

        // 2. Built-in rules in declared order
        let text = format!("{domain} {url}").to_lowercase();
        for (category, rules) in &BUILT_IN_RULES {
            for rule in *rules {
                let matched = match rule.matcher {
                    Matcher::Domains(list) => list.iter().any(|d| domain.contains(d)),
                    Matcher::Keywords(list) => list.iter().any(|k| text.contains(k)),
                };
                if matched {
                    log::debug!("'{domain}' matched built-in rule -> {category}");
                    return ClassificationResult {
                        category: *category,
                        domain,
                        source: ClassificationSource::BuiltInRule {
                            weight: rule.weight,
                        },
                    };
                }
            }
        }

        // 3. URL heuristic
        let url_lower = url.to_lowercase();
        let category = if LEARNING_HINTS.iter().any(|k| url_lower.contains(k)) {
            Category::Productive
        } else if ENTERTAINMENT_HINTS.iter().any(|k| url_lower.contains(k)) {
            Category::Unproductive
        } else {
            Category::Neutral
        };
        log::debug!("'{domain}' not matched by rules, heuristic -> {category}");

        ClassificationResult {
            category,
            domain,
            source: ClassificationSource::Heuristic,
        }
    }
}
