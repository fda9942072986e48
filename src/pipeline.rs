//! The extraction pipeline.
//!
//! One invocation is a pure function of HTML + mode + settings: normalize,
//! locate, render, synthesize metadata. Failures are captured into the
//! [`ExtractionResult`] instead of crossing the engine boundary, so the
//! caller only ever inspects a result record.

use crate::classify::Lang;
use crate::dom::Document;
use crate::error::ExtractError;
use crate::locate::{self, Mode};
use crate::note::Frontmatter;
use crate::render;
use crate::title::{TitleSuggester, smart_title};
use chrono::Local;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Engine knobs, supplied by the caller as plain parameters.
#[derive(Debug, Clone)]
pub struct Settings {
    /// strftime-style format for frontmatter dates.
    pub date_format: String,
    /// Character budget for synthesized titles (and filenames derived
    /// from them).
    pub max_title_len: usize,
    /// Rewrite verbose questions into concise headings.
    pub smart_titles: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            date_format: "%Y-%m-%d".to_string(),
            max_title_len: 60,
            smart_titles: true,
        }
    }
}

/// Content keywords worth tagging, scanned against the lower-cased body.
const KEYWORD_TAGS: &[(&str, &str)] = &[
    ("exam", "exam"),
    ("homework", "homework"),
    ("assignment", "homework"),
    ("research", "research"),
    ("interview", "interview"),
    ("tutorial", "tutorial"),
];

/// Every note gets this tag regardless of content.
const BASE_TAG: &str = "ai-chat";

/// Outcome of one extraction. The only structure crossing to the caller.
#[derive(Debug)]
pub struct ExtractionResult {
    pub success: bool,
    pub markdown: Option<String>,
    pub message: String,
    pub word_count: usize,
    /// Distinct language tokens encountered, sorted.
    pub languages: Vec<String>,
    /// Tag set for the frontmatter (languages + content keywords + base).
    pub tags: BTreeSet<String>,
    /// Synthesized note title, when one could be derived.
    pub title: Option<String>,
    /// Source platform inferred from the page, "unknown" otherwise.
    pub source: String,
}

impl ExtractionResult {
    fn failure(err: &ExtractError) -> Self {
        ExtractionResult {
            success: false,
            markdown: None,
            message: err.to_string(),
            word_count: 0,
            languages: Vec::new(),
            tags: BTreeSet::new(),
            title: None,
            source: "unknown".to_string(),
        }
    }
}

/// Run the full pipeline over one HTML document.
///
/// `suggester` is the optional external title collaborator; `None` (or a
/// suggester that declines) means the built-in heuristic runs.
pub fn extract(
    html: &str,
    mode: &Mode,
    settings: &Settings,
    suggester: Option<&dyn TitleSuggester>,
) -> ExtractionResult {
    let doc = match Document::parse(html) {
        Ok(doc) => doc,
        Err(err) => {
            warn!(%err, "normalization failed");
            return ExtractionResult::failure(&err);
        }
    };

    let region = match locate::locate(&doc, mode) {
        Ok(region) => region,
        Err(err) => {
            warn!(%err, "no region to render");
            return ExtractionResult::failure(&err);
        }
    };

    let rendered = render::render(&region);
    let title = synthesize_title(&doc, mode, settings, suggester);
    let tags = derive_tags(&rendered.languages, &rendered.body);
    let word_count = rendered.body.split_whitespace().count();
    let languages: Vec<String> = rendered
        .languages
        .iter()
        .map(|l| l.token().to_string())
        .collect();

    info!(
        words = word_count,
        languages = %languages.join(","),
        "extraction successful"
    );

    ExtractionResult {
        success: true,
        markdown: Some(rendered.body),
        message: "extraction successful".to_string(),
        word_count,
        languages,
        tags,
        title,
        source: doc.platform().to_string(),
    }
}

fn synthesize_title(
    doc: &Document,
    mode: &Mode,
    settings: &Settings,
    suggester: Option<&dyn TitleSuggester>,
) -> Option<String> {
    match mode {
        Mode::Search { phrase } => {
            if settings.smart_titles {
                Some(smart_title(phrase, settings.max_title_len, suggester))
            } else {
                Some(phrase.clone())
            }
        }
        // Full page: the captured page title, smartened when enabled.
        Mode::FullPage => doc.page_title().map(|t| {
            if settings.smart_titles {
                smart_title(t, settings.max_title_len, suggester)
            } else {
                t.to_string()
            }
        }),
    }
}

/// Union of language tags, keyword content tags, and the base tag.
pub fn derive_tags(languages: &BTreeSet<Lang>, body: &str) -> BTreeSet<String> {
    let mut tags: BTreeSet<String> = BTreeSet::new();
    tags.insert(BASE_TAG.to_string());
    for lang in languages {
        if *lang != Lang::Unknown {
            tags.insert(lang.token().to_string());
        }
    }
    let lower = body.to_lowercase();
    for (needle, tag) in KEYWORD_TAGS {
        if lower.contains(needle) {
            tags.insert((*tag).to_string());
        }
    }
    tags
}

/// Build the frontmatter for a successful extraction.
pub fn frontmatter_for(result: &ExtractionResult, title: &str, settings: &Settings) -> Frontmatter {
    Frontmatter {
        title: title.to_string(),
        date: Local::now().format(&settings.date_format).to_string(),
        source: result.source.clone(),
        tags: result.tags.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BST_PAGE: &str = r#"<html><head><title>Binary Search Trees - ChatGPT</title></head><body><main>
        <div data-message-author-role="user"><p>What is a binary search tree?</p></div>
        <div data-message-author-role="assistant">
            <p>A binary search tree keeps keys ordered for fast lookup.</p>
            <pre><code class="language-python">def insert(node, key):
    if node is None:
        return Node(key)</code></pre>
        </div>
    </main></body></html>"#;

    #[test]
    fn search_scenario_yields_one_python_fence_and_a_clean_title() {
        let result = extract(
            BST_PAGE,
            &Mode::Search {
                phrase: "binary search tree".into(),
            },
            &Settings::default(),
            None,
        );
        assert!(result.success);
        let body = result.markdown.as_deref().unwrap();
        assert_eq!(body.matches("```python").count(), 1);
        assert_eq!(result.title.as_deref(), Some("Binary Search Tree"));
        assert_eq!(result.languages, vec!["python".to_string()]);
        assert_eq!(result.source, "ChatGPT");
        assert!(result.word_count > 0);
    }

    #[test]
    fn missing_phrase_reports_not_found_without_failing_hard() {
        let result = extract(
            BST_PAGE,
            &Mode::Search {
                phrase: "red-black tree".into(),
            },
            &Settings::default(),
            None,
        );
        assert!(!result.success);
        assert!(result.message.contains("not found"));
        assert!(result.markdown.is_none());
    }

    #[test]
    fn empty_input_reports_a_parse_failure() {
        let result = extract(
            "",
            &Mode::FullPage,
            &Settings::default(),
            None,
        );
        assert!(!result.success);
        assert!(result.message.contains("parse"));
    }

    #[test]
    fn full_page_spans_every_turn() {
        let result = extract(BST_PAGE, &Mode::FullPage, &Settings::default(), None);
        assert!(result.success);
        let body = result.markdown.as_deref().unwrap();
        assert!(body.contains("What is a binary search tree?"));
        assert!(body.contains("fast lookup"));
        assert!(body.contains("```python"));
    }

    #[test]
    fn tags_union_languages_keywords_and_base() {
        let langs: BTreeSet<Lang> = [Lang::Python, Lang::Sql].into_iter().collect();
        let tags = derive_tags(&langs, "notes for my homework on joins");
        let expected: BTreeSet<String> = ["ai-chat", "python", "sql", "homework"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(tags, expected);
    }

    #[test]
    fn smart_titles_can_be_disabled() {
        let settings = Settings {
            smart_titles: false,
            ..Settings::default()
        };
        let result = extract(
            BST_PAGE,
            &Mode::Search {
                phrase: "what is a binary search tree".into(),
            },
            &settings,
            None,
        );
        assert_eq!(
            result.title.as_deref(),
            Some("what is a binary search tree")
        );
    }
}
