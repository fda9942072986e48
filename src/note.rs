//! Note persistence.
//!
//! Markdown notes carry a line-delimited frontmatter block (`title`, `date`,
//! `source`, `tags` as an inline list) followed by `##`-level sections, one
//! per extracted exchange. Merging appends a section and unions the tag set;
//! `title` and `source` are set once, `date` tracks the latest write, and
//! existing sections are never reordered or rewritten. Every write goes
//! through a temp file renamed into place, so a crash never leaves a
//! dangling frontmatter-only note.
//!
//! Callers running merges concurrently against one path must serialize
//! them; the writer itself takes no lock.

use crate::error::ExtractError;
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The metadata block at the head of every note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frontmatter {
    pub title: String,
    pub date: String,
    pub source: String,
    pub tags: BTreeSet<String>,
}

impl Frontmatter {
    /// Serialize as the leading block, terminated by a blank line.
    pub fn to_block(&self) -> String {
        let tags = self.tags.iter().cloned().collect::<Vec<_>>().join(", ");
        format!(
            "---\ntitle: \"{}\"\ndate: {}\nsource: \"{}\"\ntags: [{}]\n---\n\n",
            self.title.replace('"', "'"),
            self.date,
            self.source.replace('"', "'"),
            tags
        )
    }

    /// Parse the frontmatter of an existing note, returning it and the body
    /// that follows. `None` when the file does not start with a block.
    pub fn parse(content: &str) -> Option<(Frontmatter, String)> {
        let mut lines = content.lines();
        if lines.next()?.trim() != "---" {
            return None;
        }

        let mut title = None;
        let mut date = None;
        let mut source = None;
        let mut tags = BTreeSet::new();
        let mut consumed = 0usize;

        for line in lines {
            consumed += 1;
            if line.trim() == "---" {
                break;
            }
            if let Some(rest) = line.strip_prefix("title:") {
                title = Some(unquote(rest));
            } else if let Some(rest) = line.strip_prefix("date:") {
                date = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("source:") {
                source = Some(unquote(rest));
            } else if let Some(rest) = line.strip_prefix("tags:") {
                let inner = rest.trim().trim_start_matches('[').trim_end_matches(']');
                tags = inner
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
            }
        }

        let body: String = content
            .lines()
            .skip(consumed + 1)
            .collect::<Vec<_>>()
            .join("\n");
        Some((
            Frontmatter {
                title: title?,
                date: date?,
                source: source.unwrap_or_else(|| "unknown".to_string()),
                tags,
            },
            body.trim_start_matches('\n').to_string(),
        ))
    }
}

fn unquote(raw: &str) -> String {
    raw.trim().trim_matches('"').trim_matches('\'').to_string()
}

/// How an invocation wants its output persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// One fresh note per exchange.
    Create,
    /// Grow a master note, merging frontmatter.
    Append,
}

/// What the writer actually did.
#[derive(Debug)]
pub enum WriteOutcome {
    Created(PathBuf),
    Appended(PathBuf),
}

impl WriteOutcome {
    pub fn path(&self) -> &Path {
        match self {
            WriteOutcome::Created(p) | WriteOutcome::Appended(p) => p,
        }
    }
}

/// Persist one rendered exchange.
///
/// Create mode refuses a path already holding a different note. Append mode
/// merges: tags union, date refreshed, prior sections untouched, the new
/// body appended under `## <section_title>`. Appending to a missing file
/// behaves as create.
pub fn write_note(
    path: &Path,
    fm: &Frontmatter,
    section_title: &str,
    body: &str,
    mode: WriteMode,
) -> Result<WriteOutcome, ExtractError> {
    let existing = if path.exists() {
        Some(fs::read_to_string(path)?)
    } else {
        None
    };

    match (mode, existing) {
        (WriteMode::Create, Some(content)) => {
            match Frontmatter::parse(&content) {
                Some((old, _)) if old.title == fm.title => {}
                Some((old, _)) => {
                    return Err(ExtractError::Io(std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        format!(
                            "{} already holds a different note (\"{}\")",
                            path.display(),
                            old.title
                        ),
                    )));
                }
                None => {
                    return Err(ExtractError::Io(std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        format!("{} exists and is not a note", path.display()),
                    )));
                }
            }
            // Same note re-extracted: rewrite in place.
            let content = compose(fm, section_title, body);
            persist(path, &content)?;
            info!(path = %path.display(), "rewrote note");
            Ok(WriteOutcome::Created(path.to_path_buf()))
        }
        (WriteMode::Create, None) => {
            let content = compose(fm, section_title, body);
            persist(path, &content)?;
            info!(path = %path.display(), "created note");
            Ok(WriteOutcome::Created(path.to_path_buf()))
        }
        (WriteMode::Append, None) => {
            let content = compose(fm, section_title, body);
            persist(path, &content)?;
            info!(path = %path.display(), "created master note");
            Ok(WriteOutcome::Created(path.to_path_buf()))
        }
        (WriteMode::Append, Some(content)) => {
            let Some((old, old_body)) = Frontmatter::parse(&content) else {
                return Err(ExtractError::Parse(format!(
                    "{} has no parseable frontmatter",
                    path.display()
                )));
            };
            let merged = Frontmatter {
                title: old.title,
                date: fm.date.clone(),
                source: old.source,
                tags: old.tags.union(&fm.tags).cloned().collect(),
            };
            let mut out = merged.to_block();
            out.push_str(old_body.trim_end_matches('\n'));
            out.push_str("\n\n## ");
            out.push_str(section_title);
            out.push_str("\n\n");
            out.push_str(body.trim_end_matches('\n'));
            out.push('\n');
            persist(path, &out)?;
            debug!(tags = merged.tags.len(), "merged frontmatter");
            info!(path = %path.display(), "appended section");
            Ok(WriteOutcome::Appended(path.to_path_buf()))
        }
    }
}

fn compose(fm: &Frontmatter, section_title: &str, body: &str) -> String {
    let mut out = fm.to_block();
    out.push_str("## ");
    out.push_str(section_title);
    out.push_str("\n\n");
    out.push_str(body.trim_end_matches('\n'));
    out.push('\n');
    out
}

/// Temp-write-then-rename so readers never observe a partial note.
fn persist(path: &Path, content: &str) -> Result<(), ExtractError> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        fs::create_dir_all(dir)?;
    }
    let mut tmp = match dir {
        Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
        None => tempfile::NamedTempFile::new()?,
    };
    tmp.write_all(content.as_bytes())?;
    tmp.persist(path).map_err(|e| ExtractError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fm(title: &str, date: &str, tags: &[&str]) -> Frontmatter {
        Frontmatter {
            title: title.to_string(),
            date: date.to_string(),
            source: "ChatGPT".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn frontmatter_round_trips() {
        let original = fm("Binary Search Trees", "2026-08-06", &["ai-chat", "python"]);
        let text = format!("{}## Section\n\nbody\n", original.to_block());
        let (parsed, body) = Frontmatter::parse(&text).unwrap();
        assert_eq!(parsed, original);
        assert_eq!(body, "## Section\n\nbody");
    }

    #[test]
    fn create_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.md");
        let meta = fm("Graph Traversal", "2026-08-06", &["ai-chat", "rust"]);
        write_note(&path, &meta, "Graph Traversal", "Use BFS.", WriteMode::Create).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let (parsed, body) = Frontmatter::parse(&content).unwrap();
        assert_eq!(parsed, meta);
        assert!(body.starts_with("## Graph Traversal"));
        assert!(body.contains("Use BFS."));
    }

    #[test]
    fn two_merges_produce_ordered_sections_and_unioned_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.md");

        let first = fm("First", "2026-08-01", &["ai-chat", "python"]);
        write_note(&path, &first, "First", "python body", WriteMode::Append).unwrap();

        let second = fm("Second", "2026-08-06", &["ai-chat", "sql"]);
        let outcome =
            write_note(&path, &second, "Second", "sql body", WriteMode::Append).unwrap();
        assert!(matches!(outcome, WriteOutcome::Appended(_)));

        let content = fs::read_to_string(&path).unwrap();
        let (merged, body) = Frontmatter::parse(&content).unwrap();
        // Title and source are set once; date tracks the latest write.
        assert_eq!(merged.title, "First");
        assert_eq!(merged.date, "2026-08-06");
        let expected: BTreeSet<String> =
            ["ai-chat", "python", "sql"].iter().map(|s| s.to_string()).collect();
        assert_eq!(merged.tags, expected);

        let first_pos = body.find("## First").unwrap();
        let second_pos = body.find("## Second").unwrap();
        assert!(first_pos < second_pos);
        assert!(body.contains("python body"));
        assert!(body.contains("sql body"));
    }

    #[test]
    fn merging_a_tag_subset_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.md");

        let first = fm("Note", "2026-08-01", &["ai-chat", "python", "sql"]);
        write_note(&path, &first, "One", "body", WriteMode::Append).unwrap();

        let subset = fm("Note", "2026-08-06", &["python"]);
        write_note(&path, &subset, "Two", "body", WriteMode::Append).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let (merged, _) = Frontmatter::parse(&content).unwrap();
        assert_eq!(merged.tags, first.tags);
    }

    #[test]
    fn create_refuses_a_conflicting_note() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.md");

        let original = fm("Original", "2026-08-01", &["ai-chat"]);
        write_note(&path, &original, "Original", "body", WriteMode::Create).unwrap();

        let conflicting = fm("Different", "2026-08-06", &["ai-chat"]);
        let err = write_note(&path, &conflicting, "Different", "body", WriteMode::Create)
            .err()
            .unwrap();
        assert!(matches!(err, ExtractError::Io(_)));
    }

    #[test]
    fn append_to_missing_file_creates_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.md");
        let outcome = write_note(
            &path,
            &fm("Fresh", "2026-08-06", &["ai-chat"]),
            "Fresh",
            "body",
            WriteMode::Append,
        )
        .unwrap();
        assert!(matches!(outcome, WriteOutcome::Created(_)));
        assert!(path.exists());
    }

    #[test]
    fn append_to_garbage_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.md");
        fs::write(&path, "no frontmatter here").unwrap();
        let err = write_note(
            &path,
            &fm("X", "2026-08-06", &["ai-chat"]),
            "X",
            "body",
            WriteMode::Append,
        )
        .err()
        .unwrap();
        assert!(matches!(err, ExtractError::Parse(_)));
    }
}
