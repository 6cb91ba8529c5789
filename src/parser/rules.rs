//! Extraction rules: named, ordered selector chains
//!
//! A rule is a chain of CSS selectors. The first step selects every matching
//! element in document order; each later step narrows an element to its
//! first matching descendant, dropping elements where the step finds
//! nothing. Rule lists are evaluated in declared order by the extractor.
//!
//! The built-in rule sets cover the listing and article layouts the Sina
//! news front page has used over time.

use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::utils::error::ExtractError;

/// One compiled step of a selector chain
#[derive(Debug, Clone)]
struct SelectorStep {
    source: String,
    selector: Selector,
}

/// A named candidate strategy for locating content
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    name: String,
    chain: Vec<SelectorStep>,
}

impl ExtractionRule {
    /// Compile a rule from its selector chain
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::EmptyChain` for an empty chain and
    /// `ExtractError::InvalidSelector` if any step fails to parse.
    pub fn new<S: AsRef<str>>(name: impl Into<String>, chain: &[S]) -> Result<Self, ExtractError> {
        let name = name.into();
        if chain.is_empty() {
            return Err(ExtractError::EmptyChain(name));
        }

        let chain = chain
            .iter()
            .map(|source| {
                let source = source.as_ref();
                Selector::parse(source)
                    .map(|selector| SelectorStep {
                        source: source.to_string(),
                        selector,
                    })
                    .map_err(|e| ExtractError::InvalidSelector {
                        rule: name.clone(),
                        selector: source.to_string(),
                        message: format!("{e:?}"),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { name, chain })
    }

    /// Compile a rule from its configuration form
    pub fn from_spec(spec: &RuleSpec) -> Result<Self, ExtractError> {
        Self::new(spec.name.clone(), spec.chain.as_slice())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Selector sources in chain order
    pub fn chain(&self) -> Vec<&str> {
        self.chain.iter().map(|step| step.source.as_str()).collect()
    }

    /// Configuration form of this rule
    pub fn spec(&self) -> RuleSpec {
        RuleSpec {
            name: self.name.clone(),
            chain: self.chain.iter().map(|step| step.source.clone()).collect(),
        }
    }

    /// Apply the chain to a document, returning matched elements in document order
    pub fn select<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        let Some((first, rest)) = self.chain.split_first() else {
            return Vec::new();
        };

        document
            .select(&first.selector)
            .filter_map(|element| {
                rest.iter()
                    .try_fold(element, |current, step| current.select(&step.selector).next())
            })
            .collect()
    }
}

/// Serializable description of a rule, as written in configuration files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    pub chain: Vec<String>,
}

/// Rule overrides from configuration; an empty list keeps the built-in set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub listing: Vec<RuleSpec>,
    pub content: Vec<RuleSpec>,
    pub publish_time: Vec<RuleSpec>,
    pub author: Vec<RuleSpec>,
}

// Helper macro to build the hardcoded rules
macro_rules! rule {
    ($name:expr, [$($sel:expr),+ $(,)?]) => {
        ExtractionRule::new($name, &[$($sel),+]).expect(concat!("Invalid built-in rule: ", $name))
    };
}

lazy_static! {
    static ref LISTING_RULES: Vec<ExtractionRule> = vec![
        rule!("news_item", [".news-item", "a"]),
        rule!("main_news", [".main-news h2", "a"]),
        rule!("ct_t_01", [".ct_t_01 a"]),
        rule!("news_2", [".news-2 a"]),
    ];

    static ref CONTENT_RULES: Vec<ExtractionRule> = vec![
        rule!("article_id", ["#article"]),
        rule!("article_class", [".article"]),
        rule!("artibody", ["#artibody"]),
    ];

    static ref PUBLISH_TIME_RULES: Vec<ExtractionRule> = vec![
        rule!("date", [".date"]),
        rule!("time_source", [".time-source"]),
        rule!("pub_date", ["#pub_date"]),
    ];

    static ref AUTHOR_RULES: Vec<ExtractionRule> = vec![
        rule!("show_author", [".show_author"]),
        rule!("source", [".source"]),
        rule!("media_name", ["#media_name"]),
    ];
}

/// Per-field fallback chains for detail pages
#[derive(Debug, Clone)]
pub struct DetailRules {
    pub content: Vec<ExtractionRule>,
    pub publish_time: Vec<ExtractionRule>,
    pub author: Vec<ExtractionRule>,
}

impl Default for DetailRules {
    fn default() -> Self {
        Self {
            content: CONTENT_RULES.clone(),
            publish_time: PUBLISH_TIME_RULES.clone(),
            author: AUTHOR_RULES.clone(),
        }
    }
}

/// Listing and detail rule sets used by one pipeline
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub listing: Vec<ExtractionRule>,
    pub detail: DetailRules,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            listing: LISTING_RULES.clone(),
            detail: DetailRules::default(),
        }
    }
}

impl RuleSet {
    /// Build a rule set, replacing each built-in list that the config overrides
    ///
    /// # Errors
    ///
    /// Returns the first `ExtractError` met while compiling overrides
    pub fn from_config(config: &RuleConfig) -> Result<Self, ExtractError> {
        let mut rules = Self::default();

        override_rules(&mut rules.listing, &config.listing)?;
        override_rules(&mut rules.detail.content, &config.content)?;
        override_rules(&mut rules.detail.publish_time, &config.publish_time)?;
        override_rules(&mut rules.detail.author, &config.author)?;

        Ok(rules)
    }
}

fn override_rules(target: &mut Vec<ExtractionRule>, specs: &[RuleSpec]) -> Result<(), ExtractError> {
    if specs.is_empty() {
        return Ok(());
    }

    *target = specs
        .iter()
        .map(ExtractionRule::from_spec)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(())
}
