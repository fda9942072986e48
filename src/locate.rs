//! Exchange location.
//!
//! Finds the user turn matching a search phrase and the response region that
//! follows it, or selects the whole content root in full-page mode. When a
//! phrase occurs in several user turns the *first match in document order*
//! wins; repeated invocations on the same file are reproducible by design.

use crate::dom::{Document, node_text};
use crate::error::ExtractError;
use ego_tree::NodeRef;
use scraper::node::{Element, Node};
use tracing::debug;

/// Processing mode selector supplied by the caller.
#[derive(Debug, Clone)]
pub enum Mode {
    /// Extract the single exchange whose user message contains this phrase.
    Search { phrase: String },
    /// Convert the entire normalized page; any phrase is ignored.
    FullPage,
}

/// Borrowed handles into the [`Document`] tree identifying what to render.
pub enum ContentRegion<'a> {
    /// One user turn and the response nodes that follow it.
    /// `responses` is non-empty whenever this variant is constructed.
    SearchMatch {
        user: NodeRef<'a, Node>,
        responses: Vec<NodeRef<'a, Node>>,
    },
    /// The whole normalized content region.
    FullPage { root: NodeRef<'a, Node> },
}

/// Turn-container data attributes platforms mark user messages with.
const USER_TURN_ATTRS: &[(&str, &str)] = &[
    ("data-message-author-role", "user"),
    ("data-turn-role", "human"),
    ("data-turn-role", "user"),
    ("data-role", "user"),
];

/// Class substrings that reveal a user-authored turn container.
const USER_CLASS_HINTS: &[&str] = &[
    "user-message",
    "user_message",
    "human-message",
    "human_message",
    "query-message",
    "query_message",
    "user-turn",
    "user_turn",
    "human-turn",
    "human_turn",
    "request-row",
    "request_row",
    "user-row",
    "user_row",
    "prompt-row",
    "prompt_row",
];

/// Elements a loose text match is widened to before pairing with a response.
const TURN_CONTAINER_TAGS: &[&str] = &["div", "li", "article", "section"];

/// A response needs more text than a stray label or timestamp.
const MIN_RESPONSE_CHARS: usize = 20;

/// Whether this element is a user-authored turn container.
pub(crate) fn is_user_turn(el: &Element) -> bool {
    for (attr, val) in USER_TURN_ATTRS {
        if el.attr(attr) == Some(*val) {
            return true;
        }
    }
    if let Some(class) = el.attr("class") {
        let class = class.to_ascii_lowercase();
        return USER_CLASS_HINTS.iter().any(|h| class.contains(h));
    }
    false
}

fn subtree_has_user_turn(node: NodeRef<'_, Node>) -> bool {
    node.descendants()
        .filter_map(|n| n.value().as_element())
        .any(is_user_turn)
}

/// Locate the region to render.
pub fn locate<'a>(doc: &'a Document, mode: &Mode) -> Result<ContentRegion<'a>, ExtractError> {
    match mode {
        Mode::FullPage => Ok(ContentRegion::FullPage {
            root: doc.content_root(),
        }),
        Mode::Search { phrase } => locate_exchange(doc, phrase),
    }
}

fn locate_exchange<'a>(
    doc: &'a Document,
    phrase: &str,
) -> Result<ContentRegion<'a>, ExtractError> {
    let needle = phrase.to_lowercase();

    // Structured pass: platform-marked user turns in document order.
    let mut user = None;
    let mut saw_user_turns = false;
    for node in doc.root().descendants() {
        let Some(el) = node.value().as_element() else {
            continue;
        };
        if !is_user_turn(el) {
            continue;
        }
        saw_user_turns = true;
        if node_text(node).to_lowercase().contains(&needle) {
            user = Some(node);
            break;
        }
    }

    // Loose pass: pages without turn markers degrade to a raw text search,
    // widening the hit to its nearest block container.
    if user.is_none() && !saw_user_turns {
        user = doc
            .root()
            .descendants()
            .find(|n| {
                n.value()
                    .as_text()
                    .is_some_and(|t| t.to_lowercase().contains(&needle))
            })
            .and_then(ascend_to_container);
    }

    let Some(user) = user else {
        debug!(phrase, "no user turn contains the phrase");
        return Err(ExtractError::PhraseNotFound);
    };

    let responses = collect_responses(user);
    if responses.is_empty() {
        return Err(ExtractError::ResponseMissing);
    }
    debug!(phrase, nodes = responses.len(), "located exchange");
    Ok(ContentRegion::SearchMatch { user, responses })
}

fn ascend_to_container<'a>(node: NodeRef<'a, Node>) -> Option<NodeRef<'a, Node>> {
    node.ancestors().find(|a| {
        a.value()
            .as_element()
            .is_some_and(|el| TURN_CONTAINER_TAGS.contains(&el.name()))
    })
}

/// Following siblings of the matched turn up to the next user turn, ascending
/// through wrapper layers until something substantial is found.
fn collect_responses<'a>(user: NodeRef<'a, Node>) -> Vec<NodeRef<'a, Node>> {
    let mut anchor = Some(user);
    while let Some(node) = anchor {
        let mut picked = Vec::new();
        let mut chars = 0usize;
        for sib in node.next_siblings() {
            match sib.value() {
                Node::Element(el) => {
                    if is_user_turn(el) || subtree_has_user_turn(sib) {
                        break;
                    }
                    let text = node_text(sib);
                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    chars += trimmed.chars().count();
                    picked.push(sib);
                }
                Node::Text(t) if !t.trim().is_empty() => {
                    chars += t.trim().chars().count();
                    picked.push(sib);
                }
                _ => {}
            }
        }
        if chars > MIN_RESPONSE_CHARS {
            return picked;
        }
        anchor = node.parent();
    }
    Vec::new()
}
