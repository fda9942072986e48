//! # ai-chat-export
//!
//! A CLI tool that converts saved AI-chat web pages (ChatGPT, Gemini,
//! Claude, and friends) into clean Markdown notes.
//!
//! ## What it does
//!
//! Browsers save chat pages as HTML full of platform chrome — sidebars,
//! copy buttons, input boxes, branding. This tool parses that HTML, strips
//! the chrome, finds either one exchange (by a search phrase matched
//! against the user's messages) or the whole conversation, and renders it
//! as Markdown. Code blocks get language-annotated fences through a
//! three-tier detection strategy: the declared `language-*` class, then the
//! nearest preceding caption, then syntax heuristics on the code itself.
//!
//! Each note starts with YAML-style frontmatter (title, date, source
//! platform, tags derived from detected languages and content keywords).
//! With `--merge`, extractions accumulate as ordered sections of a single
//! master note whose tag set grows as the union of every section's tags.
//!
//! ## Usage
//!
//! ```sh
//! # Extract one exchange into its own note
//! ai-chat-export saved-chat.html --phrase "binary search tree"
//!
//! # Convert a whole page, appending to a master note
//! ai-chat-export saved-chat.html --full-page --merge algorithms.md
//!
//! # Convert every HTML file in a directory
//! ai-chat-export --batch ~/Downloads --full-page
//! ```
//!
//! Preferences can be persisted in `~/.config/ai-chat-export/config.toml`.
//!
//! ## Compatibility
//!
//! Chrome stripping matches structural patterns (tag names, class-name
//! substrings, ARIA roles), not exact class names, so it survives platform
//! redesigns. Pages from unrecognized platforms still convert; their
//! unmatched chrome is treated as ordinary content.

pub mod classify;
pub mod config;
pub mod dom;
pub mod error;
pub mod locate;
pub mod note;
pub mod pipeline;
pub mod render;
pub mod title;
