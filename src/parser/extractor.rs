//! Fallback-chain extraction over raw HTML
//!
//! Every entry point parses the HTML once and walks the given rules in their
//! declared order. The first rule whose chain yields a non-empty text node
//! wins; later rules are never consulted and results are never merged. When
//! nothing matches the result is `None`, which callers treat as a normal
//! structural mismatch rather than an error.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::models::ExtractedDetail;
use crate::parser::rules::{DetailRules, ExtractionRule};
use crate::parser::sanitize::{clean_inline, has_content, sanitize_text};

static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Texts matched by the winning rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedContent {
    /// Name of the rule that matched
    pub rule: String,

    /// Position of that rule in the list it came from
    pub rule_index: usize,

    /// Non-empty texts of the matched elements, in document order
    pub texts: Vec<String>,
}

impl ExtractedContent {
    /// First matched text
    pub fn first(&self) -> Option<&str> {
        self.texts.first().map(String::as_str)
    }
}

/// One raw row from a listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    /// Anchor text, trimmed; may be empty
    pub title: String,

    /// Raw `href`, if the row had one
    pub href: Option<String>,
}

/// Rows found by the winning listing rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingExtraction {
    pub rule: String,
    pub rule_index: usize,
    pub entries: Vec<ListingEntry>,
}

/// Stateless extractor; rules are passed per call
#[derive(Debug, Clone, Copy, Default)]
pub struct Extractor;

impl Extractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Return the first rule yielding at least one non-empty text node
    pub fn extract(&self, html: &str, rules: &[ExtractionRule]) -> Option<ExtractedContent> {
        let document = Html::parse_document(html);
        self.extract_from(&document, rules)
    }

    /// Extract `(title, href)` rows from a listing page
    ///
    /// Rows with empty titles or missing links are kept: validating them is
    /// the record builder's job, and it counts what it rejects.
    pub fn extract_listing(&self, html: &str, rules: &[ExtractionRule]) -> Option<ListingExtraction> {
        let document = Html::parse_document(html);
        let (rule_index, rule, elements) = first_match(&document, rules)?;

        let entries = elements
            .into_iter()
            .map(|element| ListingEntry {
                title: clean_inline(&element_text(&element)),
                href: link_of(&element),
            })
            .collect();

        Some(ListingExtraction {
            rule: rule.name().to_string(),
            rule_index,
            entries,
        })
    }

    /// Resolve the optional detail fields, each through its own chain
    ///
    /// A field that no rule finds stays `None` without affecting the others.
    pub fn extract_detail(&self, html: &str, rules: &DetailRules) -> ExtractedDetail {
        let document = Html::parse_document(html);

        let content = first_match(&document, &rules.content)
            .and_then(|(_, _, elements)| first_text(&elements))
            .map(|text| sanitize_text(&text))
            .filter(|text| has_content(text));

        let publish_time = self
            .extract_from(&document, &rules.publish_time)
            .and_then(|found| found.first().map(str::to_string));

        let author = self
            .extract_from(&document, &rules.author)
            .and_then(|found| found.first().map(str::to_string));

        ExtractedDetail {
            content,
            publish_time,
            author,
        }
    }

    fn extract_from(&self, document: &Html, rules: &[ExtractionRule]) -> Option<ExtractedContent> {
        let (rule_index, rule, elements) = first_match(document, rules)?;

        let texts = elements
            .iter()
            .map(|element| clean_inline(&element_text(element)))
            .filter(|text| has_content(text))
            .collect();

        Some(ExtractedContent {
            rule: rule.name().to_string(),
            rule_index,
            texts,
        })
    }
}

/// Find the first rule whose matched elements include a non-empty text node
fn first_match<'a, 'r>(
    document: &'a Html,
    rules: &'r [ExtractionRule],
) -> Option<(usize, &'r ExtractionRule, Vec<ElementRef<'a>>)> {
    rules.iter().enumerate().find_map(|(index, rule)| {
        let elements = rule.select(document);
        let matched = elements
            .iter()
            .any(|element| has_content(&element_text(element)));

        if matched {
            tracing::trace!(rule = rule.name(), index, count = elements.len(), "Rule matched");
            Some((index, rule, elements))
        } else {
            None
        }
    })
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

/// Body text of the first element that has any
fn first_text(elements: &[ElementRef<'_>]) -> Option<String> {
    elements
        .iter()
        .map(|element| {
            element
                .text()
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .find(|text| has_content(text))
}

/// `href` of the element itself when it is an anchor, else of its first descendant anchor
fn link_of(element: &ElementRef<'_>) -> Option<String> {
    if element.value().name() == "a" {
        return element.value().attr("href").map(|href| href.trim().to_string());
    }

    element
        .select(&ANCHOR_SELECTOR)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
}
