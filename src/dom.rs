//! HTML normalization.
//!
//! Parses a saved chat page into a traversable tree, fingerprints the source
//! platform, captures the page title, and strips UI chrome (sidebars, copy
//! buttons, input boxes, branding) before anything downstream looks at the
//! content. Chrome is matched structurally — tag names, class/id substrings
//! and ARIA roles — never by exact class names, since platforms rename their
//! classes across releases.

use crate::error::ExtractError;
use crate::locate;
use regex::Regex;
use ego_tree::{NodeId, NodeRef};
use scraper::node::{Element, Node};
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

/// Tags that never carry conversation content.
const CHROME_TAGS: &[&str] = &[
    "script", "style", "svg", "button", "nav", "footer", "header", "aside", "textarea", "input",
    "img", "title",
];

const CHROME_ROLES: &[&str] = &[
    "navigation",
    "complementary",
    "dialog",
    "alertdialog",
    "tooltip",
    "banner",
];

/// Class/id substrings of sidebars, drawers and old-chat lists.
const SIDEBAR_CLASS_HINTS: &[&str] = &[
    "sidebar",
    "side-bar",
    "sidenav",
    "side-nav",
    "side_nav",
    "drawer",
    "nav-rail",
    "nav_rail",
    "chat-list",
    "chat_list",
    "conversation-list",
    "conversation_list",
    "history-panel",
    "history_panel",
    "left-panel",
    "left_panel",
    "left-nav",
    "left_nav",
    "menu-panel",
    "menu_panel",
    "threads-list",
    "thread-list",
];

/// Class/id substrings of overlays, popups and per-block toolbars.
const OVERLAY_CLASS_HINTS: &[&str] = &[
    "tooltip",
    "popover",
    "modal",
    "overlay",
    "backdrop",
    "snackbar",
    "toolbar",
    "copy-button",
    "copy_button",
];

/// aria-label substrings that reveal navigation chrome.
const SIDEBAR_ARIA_HINTS: &[&str] = &[
    "conversation",
    "recent chat",
    "chat history",
    "sidebar",
    "navigation",
    "threads",
    "previous chat",
    "menu",
];

/// Branding strings platforms leak into exports, longest first so
/// "Google Gemini" wins over "Gemini".
pub const PLATFORM_NAMES: &[&str] = &[
    "Google Gemini",
    "Gemini",
    "ChatGPT",
    "GPT-4o",
    "GPT-4",
    "Claude",
    "Copilot",
    "Perplexity",
    "DeepSeek",
];

/// Lowercased fingerprint → canonical platform name, most specific first.
const PLATFORM_FINGERPRINTS: &[(&str, &str)] = &[
    ("google gemini", "Gemini"),
    ("gemini", "Gemini"),
    ("chatgpt", "ChatGPT"),
    ("gpt-4", "ChatGPT"),
    ("claude", "Claude"),
    ("copilot", "Copilot"),
    ("perplexity", "Perplexity"),
    ("deepseek", "DeepSeek"),
];

/// Sidebar entries that are section labels, not conversation titles.
const GENERIC_SIDEBAR_TITLES: &[&str] = &[
    "chats",
    "chat history",
    "conversations",
    "recent",
    "history",
    "menu",
    "new chat",
];

static CONV_WITH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^conversation\s+with\s+").unwrap());

static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static USER_ROLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"[data-message-author-role]"#).unwrap());
static NAV_CONTAINER_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"aside, nav, [role="complementary"], [role="navigation"]"#).unwrap()
});
static MAIN_SELS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    ["main", r#"[role="main"]"#, "article", "body"]
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});

/// A parsed chat page with chrome removed.
///
/// Owned exclusively by the pipeline invocation that created it; the
/// locator and renderer borrow into its tree.
pub struct Document {
    html: Html,
    platform: String,
    page_title: Option<String>,
}

impl Document {
    /// Parse raw HTML and normalize it.
    ///
    /// Fails with [`ExtractError::Parse`] only when the input is empty or
    /// yields no readable text at all; unknown markup degrades to being
    /// treated as ordinary content.
    pub fn parse(raw: &str) -> Result<Self, ExtractError> {
        if raw.trim().is_empty() {
            return Err(ExtractError::Parse("document is empty".into()));
        }

        let mut html = Html::parse_document(raw);

        if !has_any_text(html.tree.root()) {
            return Err(ExtractError::Parse(
                "document contains no readable text".into(),
            ));
        }

        // Platform and title come from nodes the stripper is about to remove.
        let platform = detect_platform(&html);
        let page_title = extract_page_title(&html);

        strip_chrome(&mut html);
        strip_branding(&mut html);
        debug!(%platform, "normalized document");

        Ok(Document {
            html,
            platform,
            page_title,
        })
    }

    /// Canonical name of the platform the page came from, or "unknown".
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Conversation title captured from the page, if any.
    pub fn page_title(&self) -> Option<&str> {
        self.page_title.as_deref()
    }

    /// Root of the full normalized tree.
    pub fn root(&self) -> NodeRef<'_, Node> {
        self.html.tree.root()
    }

    /// Root of the main content region: `main`, `[role=main]`, `article`
    /// or `body`, in that priority order.
    pub fn content_root(&self) -> NodeRef<'_, Node> {
        for sel in MAIN_SELS.iter() {
            if let Some(el) = self.html.select(sel).next() {
                return *el;
            }
        }
        self.html.tree.root()
    }
}

/// Concatenated text of a subtree, raw (no whitespace collapsing).
pub(crate) fn node_text(node: NodeRef<'_, Node>) -> String {
    let mut out = String::new();
    for d in node.descendants() {
        if let Some(t) = d.value().as_text() {
            out.push_str(&t.text);
        }
    }
    out
}

/// Collapse runs of whitespace to single spaces and trim.
pub(crate) fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn has_any_text(root: NodeRef<'_, Node>) -> bool {
    root.descendants()
        .filter_map(|n| n.value().as_text())
        .any(|t| !t.trim().is_empty())
}

fn class_and_id(el: &Element) -> String {
    let mut out = String::new();
    if let Some(c) = el.attr("class") {
        out.push_str(c);
        out.push(' ');
    }
    if let Some(i) = el.attr("id") {
        out.push_str(i);
    }
    out.make_ascii_lowercase();
    out
}

fn is_chrome(el: &Element) -> bool {
    if CHROME_TAGS.contains(&el.name()) {
        return true;
    }
    if let Some(role) = el.attr("role")
        && CHROME_ROLES.contains(&role)
    {
        return true;
    }
    if el.attr("contenteditable") == Some("true") {
        return true;
    }
    let hints = class_and_id(el);
    if !hints.is_empty()
        && SIDEBAR_CLASS_HINTS
            .iter()
            .chain(OVERLAY_CLASS_HINTS)
            .any(|h| hints.contains(h))
    {
        return true;
    }
    if let Some(label) = el.attr("aria-label") {
        let label = label.to_ascii_lowercase();
        if SIDEBAR_ARIA_HINTS.iter().any(|h| label.contains(h)) {
            return true;
        }
    }
    false
}

fn strip_chrome(html: &mut Html) {
    let doomed: Vec<NodeId> = html
        .tree
        .root()
        .descendants()
        .filter(|n| n.value().as_element().is_some_and(is_chrome))
        .map(|n| n.id())
        .collect();
    for id in &doomed {
        if let Some(mut node) = html.tree.get_mut(*id) {
            node.detach();
        }
    }
    if !doomed.is_empty() {
        debug!(removed = doomed.len(), "stripped chrome nodes");
    }
}

/// Text content that is nothing but a platform name.
fn is_branding_text(text: &str) -> bool {
    let trimmed = text.trim().trim_start_matches('✨').trim();
    PLATFORM_NAMES
        .iter()
        .any(|name| trimmed.eq_ignore_ascii_case(name))
}

fn strip_branding(html: &mut Html) {
    const BRANDING_HOSTS: &[&str] = &[
        "h1", "h2", "h3", "h4", "h5", "h6", "span", "div", "a", "p", "label",
    ];
    let doomed: Vec<NodeId> = html
        .tree
        .root()
        .descendants()
        .filter(|n| {
            n.value()
                .as_element()
                .is_some_and(|el| BRANDING_HOSTS.contains(&el.name()))
                && is_branding_text(&node_text(*n))
        })
        .map(|n| n.id())
        .collect();
    for id in doomed {
        if let Some(mut node) = html.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn detect_platform(html: &Html) -> String {
    if let Some(title) = html.select(&TITLE_SEL).next() {
        let text = node_text(*title).to_lowercase();
        for (needle, canon) in PLATFORM_FINGERPRINTS {
            if text.contains(needle) {
                return (*canon).to_string();
            }
        }
    }

    // Standalone branding nodes ("✨ Gemini" headers and the like).
    for node in html.tree.root().descendants() {
        if let Some(t) = node.value().as_text() {
            let trimmed = t.trim().trim_start_matches('✨').trim().to_lowercase();
            if trimmed.is_empty() {
                continue;
            }
            for (needle, canon) in PLATFORM_FINGERPRINTS {
                if trimmed == *needle {
                    return (*canon).to_string();
                }
            }
        }
    }

    // ChatGPT exports mark turns with data attributes even when all
    // branding text has been lost.
    if html.select(&USER_ROLE_SEL).next().is_some() {
        return "ChatGPT".to_string();
    }

    "unknown".to_string()
}

fn strip_suffix_ci<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let cut = s.len().checked_sub(suffix.len())?;
    if s.is_char_boundary(cut) && s[cut..].eq_ignore_ascii_case(suffix) {
        Some(&s[..cut])
    } else {
        None
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// Clean a raw `<title>` down to the conversation title, removing platform
/// branding and the "Conversation with …" prefix.
fn clean_title_text(raw: &str) -> Option<String> {
    let is_sep = |c: char| c.is_whitespace() || matches!(c, '-' | '–' | '—' | '|');
    let mut text = CONV_WITH_RE.replace(raw.trim(), "").trim().to_string();

    loop {
        let before = text.len();
        for name in PLATFORM_NAMES {
            if let Some(rest) = strip_suffix_ci(&text, name) {
                text = rest.trim_end_matches(is_sep).to_string();
            }
            if let Some(rest) = strip_prefix_ci(&text, name) {
                text = rest.trim_start_matches(is_sep).to_string();
            }
        }
        if text.len() == before {
            break;
        }
    }

    let text = text.trim_matches(is_sep).to_string();
    (!text.is_empty()).then_some(text)
}

fn has_active_marker(el: &Element) -> bool {
    if el.attr("aria-selected") == Some("true") {
        return true;
    }
    el.classes()
        .any(|c| c.eq_ignore_ascii_case("active") || c.eq_ignore_ascii_case("selected"))
}

/// The active entry of a chat-list sidebar, when the platform highlights
/// the open conversation there (Gemini does).
fn sidebar_active_title(html: &Html) -> Option<String> {
    for container in html.select(&NAV_CONTAINER_SEL) {
        for node in container.descendants() {
            let Some(el) = node.value().as_element() else {
                continue;
            };
            if !has_active_marker(el) {
                continue;
            }
            let text = collapse_ws(&node_text(node));
            if text.is_empty()
                || is_branding_text(&text)
                || GENERIC_SIDEBAR_TITLES
                    .iter()
                    .any(|g| text.eq_ignore_ascii_case(g))
            {
                continue;
            }
            return Some(text);
        }
    }
    None
}

/// Capture the conversation title before chrome stripping removes its host.
///
/// Priority: active sidebar entry, then the cleaned `<title>` tag, then the
/// first user message with trailing punctuation trimmed.
fn extract_page_title(html: &Html) -> Option<String> {
    if let Some(title) = sidebar_active_title(html) {
        return Some(title);
    }

    if let Some(title_el) = html.select(&TITLE_SEL).next()
        && let Some(cleaned) = clean_title_text(&node_text(*title_el))
    {
        return Some(cleaned);
    }

    for node in html.tree.root().descendants() {
        if let Some(el) = node.value().as_element()
            && locate::is_user_turn(el)
        {
            let text = collapse_ws(&node_text(node));
            let text = text.trim_end_matches([' ', '?', '.', '!', ',', ';', ':']);
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_a_parse_error() {
        assert!(matches!(
            Document::parse("   \n  "),
            Err(ExtractError::Parse(_))
        ));
        assert!(matches!(Document::parse(""), Err(ExtractError::Parse(_))));
    }

    #[test]
    fn unknown_markup_degrades_instead_of_failing() {
        let doc = Document::parse("<weird-element>some text</weird-element>").unwrap();
        assert!(node_text(doc.root()).contains("some text"));
    }

    #[test]
    fn strips_sidebars_buttons_and_inputs() {
        let html = r#"<html><body>
            <aside><a href="/c/1">Old chat</a></aside>
            <div class="chat-list"><a>Another old chat</a></div>
            <main><p>Real content</p><button>Copy</button></main>
            <textarea>draft</textarea>
        </body></html>"#;
        let doc = Document::parse(html).unwrap();
        let text = node_text(doc.root());
        assert!(text.contains("Real content"));
        assert!(!text.contains("Old chat"));
        assert!(!text.contains("Another old chat"));
        assert!(!text.contains("Copy"));
        assert!(!text.contains("draft"));
    }

    #[test]
    fn strips_aria_roles_and_labels() {
        let html = r#"<html><body>
            <div role="navigation"><a>Nav link</a></div>
            <div aria-label="Chat history panel"><a>Yesterday's chat</a></div>
            <div role="dialog">Are you sure?</div>
            <main><p>Answer text</p></main>
        </body></html>"#;
        let doc = Document::parse(html).unwrap();
        let text = node_text(doc.root());
        assert!(text.contains("Answer text"));
        assert!(!text.contains("Nav link"));
        assert!(!text.contains("Yesterday"));
        assert!(!text.contains("Are you sure"));
    }

    #[test]
    fn strips_standalone_branding_lines() {
        let html = r#"<html><body>
            <h1>Google Gemini</h1>
            <main><p>Gemini said something useful about Gemini models.</p></main>
        </body></html>"#;
        let doc = Document::parse(html).unwrap();
        let text = node_text(doc.root());
        // The branding header goes; inline mentions stay.
        assert!(!text.contains("Google Gemini"));
        assert!(text.contains("something useful"));
    }

    #[test]
    fn detects_platform_from_title() {
        let doc =
            Document::parse("<html><head><title>Google Gemini</title></head><body><p>x</p></body></html>")
                .unwrap();
        assert_eq!(doc.platform(), "Gemini");
    }

    #[test]
    fn detects_platform_from_turn_attributes() {
        let html = r#"<html><body><main>
            <div data-message-author-role="user"><p>Hi</p></div>
            <div data-message-author-role="assistant"><p>Hello</p></div>
        </main></body></html>"#;
        let doc = Document::parse(html).unwrap();
        assert_eq!(doc.platform(), "ChatGPT");
    }

    #[test]
    fn unknown_platform_defaults() {
        let doc = Document::parse("<html><body><p>plain page</p></body></html>").unwrap();
        assert_eq!(doc.platform(), "unknown");
    }

    #[test]
    fn title_from_active_sidebar_entry() {
        let html = r#"<html><head><title>Google Gemini</title></head><body>
            <aside>
              <h1>Chats</h1>
              <a href="/c/1">Codeforces Rating Plan</a>
              <a href="/c/2" aria-selected="true" class="selected">First Year Student's Academic Reset</a>
              <a href="/c/3">Python Decorators</a>
            </aside>
            <main><p>Chat content here</p></main>
        </body></html>"#;
        let doc = Document::parse(html).unwrap();
        assert_eq!(doc.page_title(), Some("First Year Student's Academic Reset"));
    }

    #[test]
    fn title_from_active_class_in_nav() {
        let html = r#"<html><head><title>Gemini</title></head><body>
            <nav>
              <div class="item">Old Chat</div>
              <div class="item active">Building a Stress Tester</div>
            </nav>
            <main><p>Content</p></main>
        </body></html>"#;
        let doc = Document::parse(html).unwrap();
        assert_eq!(doc.page_title(), Some("Building a Stress Tester"));
    }

    #[test]
    fn generic_sidebar_headers_are_not_titles() {
        let html = r#"<html><head><title>Google Gemini</title></head><body>
            <h1>Chats</h1>
            <main><p>Content</p></main>
        </body></html>"#;
        let doc = Document::parse(html).unwrap();
        assert_eq!(doc.page_title(), None);
    }

    #[test]
    fn title_tag_cleaned_of_platform_suffix() {
        let html = r#"<html><head><title>Merge Sort Explanation - ChatGPT</title></head>
            <body><main><p>x</p></main></body></html>"#;
        let doc = Document::parse(html).unwrap();
        assert_eq!(doc.page_title(), Some("Merge Sort Explanation"));
    }

    #[test]
    fn title_falls_back_to_first_user_message() {
        let html = r#"<html><head><title>Google Gemini</title></head><body><main>
            <div data-message-author-role="user"><p>How do I sort in C++?</p></div>
            <div data-message-author-role="assistant"><p>Use std::sort</p></div>
        </main></body></html>"#;
        let doc = Document::parse(html).unwrap();
        assert_eq!(doc.page_title(), Some("How do I sort in C++"));
    }

    #[test]
    fn content_root_prefers_main() {
        let html = r#"<html><body>
            <div><p>outer</p></div>
            <main><p>inner</p></main>
        </body></html>"#;
        let doc = Document::parse(html).unwrap();
        let text = node_text(doc.content_root());
        assert!(text.contains("inner"));
        assert!(!text.contains("outer"));
    }

    #[test]
    fn conversation_with_prefix_is_removed() {
        assert_eq!(
            clean_title_text("Conversation with Gemini - Binary Trees"),
            Some("Binary Trees".to_string())
        );
        assert_eq!(clean_title_text("Conversation with Gemini"), None);
    }
}
