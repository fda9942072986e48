//! Code-block language classification.
//!
//! Three tiers, applied in strict priority order: the declared markup hint,
//! then a proximity search over the nearest preceding text, then syntax
//! pattern matching on the code itself. Each tier only runs when the one
//! before it yields no answer. The whole procedure is a pure function of its
//! input, so regression tests across platform HTML samples stay reproducible.
//!
//! All lookup tables are immutable ordered slices; priority is their listed
//! order and the extension point is appending entries.

use regex::Regex;
use std::sync::LazyLock;

/// Canonical language tags the classifier can produce.
///
/// `Unknown` is a valid terminal classification, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lang {
    Python,
    Cpp,
    JavaScript,
    TypeScript,
    Java,
    Rust,
    Go,
    Sql,
    Bash,
    Ruby,
    CSharp,
    Kotlin,
    Swift,
    Php,
    Dart,
    Html,
    Css,
    R,
    Unknown,
}

impl Lang {
    /// Lower-case token used in code fences and frontmatter tags.
    pub fn token(self) -> &'static str {
        match self {
            Lang::Python => "python",
            Lang::Cpp => "cpp",
            Lang::JavaScript => "javascript",
            Lang::TypeScript => "typescript",
            Lang::Java => "java",
            Lang::Rust => "rust",
            Lang::Go => "go",
            Lang::Sql => "sql",
            Lang::Bash => "bash",
            Lang::Ruby => "ruby",
            Lang::CSharp => "csharp",
            Lang::Kotlin => "kotlin",
            Lang::Swift => "swift",
            Lang::Php => "php",
            Lang::Dart => "dart",
            Lang::Html => "html",
            Lang::Css => "css",
            Lang::R => "r",
            Lang::Unknown => "",
        }
    }
}

/// A code block lifted out of the DOM, with everything the classifier needs.
#[derive(Debug, Clone)]
pub struct CodeBlock {
    /// Plain code text, whitespace preserved.
    pub text: String,
    /// Declared hint from the markup (`language-*` / `lang-*` class suffix).
    pub hint: Option<String>,
    /// Text of the nearest preceding blocks, for proximity search.
    pub preceding: Option<String>,
}

/// Declared-hint name → tag. Unknown names fall through to the next tier.
const HINT_MAP: &[(&str, Lang)] = &[
    ("python", Lang::Python),
    ("py", Lang::Python),
    ("cpp", Lang::Cpp),
    ("c++", Lang::Cpp),
    ("c", Lang::Cpp),
    ("javascript", Lang::JavaScript),
    ("js", Lang::JavaScript),
    ("jsx", Lang::JavaScript),
    ("typescript", Lang::TypeScript),
    ("ts", Lang::TypeScript),
    ("tsx", Lang::TypeScript),
    ("java", Lang::Java),
    ("rust", Lang::Rust),
    ("rs", Lang::Rust),
    ("go", Lang::Go),
    ("golang", Lang::Go),
    ("sql", Lang::Sql),
    ("bash", Lang::Bash),
    ("sh", Lang::Bash),
    ("shell", Lang::Bash),
    ("zsh", Lang::Bash),
    ("console", Lang::Bash),
    ("ruby", Lang::Ruby),
    ("rb", Lang::Ruby),
    ("csharp", Lang::CSharp),
    ("cs", Lang::CSharp),
    ("c#", Lang::CSharp),
    ("kotlin", Lang::Kotlin),
    ("kt", Lang::Kotlin),
    ("swift", Lang::Swift),
    ("php", Lang::Php),
    ("dart", Lang::Dart),
    ("html", Lang::Html),
    ("css", Lang::Css),
    ("r", Lang::R),
];

/// Proximity labels, most specific names before generic ones so
/// "typescript" wins over "javascript" and file extensions beat prose.
const LABEL_MAP: &[(&str, Lang)] = &[
    ("typescript", Lang::TypeScript),
    (".ts", Lang::TypeScript),
    ("javascript", Lang::JavaScript),
    ("js code", Lang::JavaScript),
    (".js", Lang::JavaScript),
    ("c plus plus", Lang::Cpp),
    ("c++", Lang::Cpp),
    ("cpp", Lang::Cpp),
    (".cc", Lang::Cpp),
    ("python", Lang::Python),
    (".py", Lang::Python),
    ("golang", Lang::Go),
    (".go", Lang::Go),
    ("rust", Lang::Rust),
    (".rs", Lang::Rust),
    ("kotlin", Lang::Kotlin),
    (".kt", Lang::Kotlin),
    ("swift", Lang::Swift),
    ("csharp", Lang::CSharp),
    ("c#", Lang::CSharp),
    (".cs", Lang::CSharp),
    ("ruby", Lang::Ruby),
    (".rb", Lang::Ruby),
    ("bash", Lang::Bash),
    ("shell", Lang::Bash),
    ("terminal", Lang::Bash),
    (".sh", Lang::Bash),
    ("html", Lang::Html),
    ("css", Lang::Css),
    ("sql", Lang::Sql),
    ("php", Lang::Php),
    (".php", Lang::Php),
    ("dart", Lang::Dart),
    (".dart", Lang::Dart),
    ("java", Lang::Java),
    (".java", Lang::Java),
    ("r code", Lang::R),
    (" in r", Lang::R),
];

/// Long captions usually end with the relevant part ("…save this as main.py:").
const PROXIMITY_FULL_LIMIT: usize = 120;
const PROXIMITY_TAIL: usize = 60;

static C_FN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\b(int|void|double|float|bool|char)\s+\w+\s*\([^)]*\)\s*\{").unwrap()
});
static SQL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\bselect\b.*\bfrom\b").unwrap());
static HTML_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?[a-z][a-z0-9-]*[^>]*>").unwrap());
static CSS_RULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)[.#]?[A-Za-z][\w-]*\s*\{[^{}]*:[^{}]*;").unwrap());

/// Classify a code block. Deterministic and side-effect free.
pub fn classify(block: &CodeBlock) -> Lang {
    if let Some(hint) = &block.hint {
        let hint = hint.to_ascii_lowercase();
        for (name, lang) in HINT_MAP {
            if *name == hint {
                return *lang;
            }
        }
    }

    if let Some(context) = &block.preceding
        && let Some(lang) = proximity_tier(context)
    {
        return lang;
    }

    syntax_tier(&block.text)
}

fn proximity_tier(context: &str) -> Option<Lang> {
    let lower = context.to_lowercase();
    let chars: Vec<char> = lower.chars().collect();
    let text: String = if chars.len() > PROXIMITY_FULL_LIMIT {
        chars[chars.len() - PROXIMITY_TAIL..].iter().collect()
    } else {
        lower
    };

    for (label, lang) in LABEL_MAP {
        if text.contains(label) {
            // Guard "java" from matching inside "javascript".
            if *label == "java" && text.contains("script") {
                continue;
            }
            return Some(*lang);
        }
    }
    None
}

/// Ordered all-or-nothing syntax heuristics; the first rule that matches
/// wins, and no match means `Unknown`.
fn syntax_tier(code: &str) -> Lang {
    // Unambiguous full-phrase markers come before the loose C-style rules,
    // otherwise `void main(...)` claims every Java entry point for C++.
    if code.contains("public static void main") || code.contains("System.out.println") {
        return Lang::Java;
    }
    if code.contains("using System") || code.contains("Console.WriteLine") {
        return Lang::CSharp;
    }
    if code.contains("#include")
        || code.contains("std::")
        || (code.contains("cout") && code.contains("<<"))
        || C_FN_RE.is_match(code)
    {
        return Lang::Cpp;
    }
    if code.contains("<?php") {
        return Lang::Php;
    }
    if (code.contains("def ") && code.contains(':'))
        || (code.contains("import ") && code.contains("from "))
    {
        return Lang::Python;
    }
    if code.contains("fn ") && code.contains("let ") && code.contains("->") {
        return Lang::Rust;
    }
    if code.contains("func ") && (code.contains("package ") || code.contains("fmt.")) {
        return Lang::Go;
    }
    if code.contains("fun ") && (code.contains("val ") || code.contains("println(")) {
        return Lang::Kotlin;
    }
    if code.contains("interface ")
        && code.contains(':')
        && (code.contains("export ") || code.contains("implements "))
    {
        return Lang::TypeScript;
    }
    if code.contains(": string") || code.contains(": number") {
        return Lang::TypeScript;
    }
    if code.contains("console.log")
        || code.contains("document.")
        || (code.contains("function ") && code.contains('{'))
    {
        return Lang::JavaScript;
    }
    if code.contains("func ") && code.contains("let ") {
        return Lang::Swift;
    }
    if (code.contains("puts ") || code.contains("def ")) && code.contains("\nend") {
        return Lang::Ruby;
    }
    if code.contains("void main()") && code.contains("print(") {
        return Lang::Dart;
    }
    if code.contains("<-") && (code.contains("library(") || code.contains("function(")) {
        return Lang::R;
    }
    if code.starts_with("#!") || code.contains("#!/bin/") || code.contains("set -e") {
        return Lang::Bash;
    }
    if SQL_RE.is_match(code) {
        return Lang::Sql;
    }
    if !code.contains('<') && CSS_RULE_RE.is_match(code) {
        return Lang::Css;
    }
    if HTML_TAG_RE.is_match(code) {
        return Lang::Html;
    }
    Lang::Unknown
}
