//! Markdown rendering.
//!
//! Walks a located region in document order and emits Markdown: ATX
//! headings, paragraphs, lists, tables, blockquotes, and fenced code blocks
//! annotated with the classifier's tag. Code a user pasted into their
//! question is never duplicated in the answer section. Blank-line runs
//! collapse to one and trailing whitespace is trimmed per line, but fence
//! interiors are preserved byte-for-byte.

use crate::classify::{self, CodeBlock, Lang};
use crate::dom::{collapse_ws, node_text};
use crate::locate::{self, ContentRegion};
use ego_tree::NodeRef;
use scraper::node::{Element, Node};
use std::collections::{BTreeSet, HashSet};

/// Output of a render pass.
pub struct Rendered {
    pub body: String,
    pub languages: BTreeSet<Lang>,
}

const BLOCK_TAGS: &[&str] = &[
    "html",
    "head",
    "body",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "p",
    "div",
    "section",
    "article",
    "main",
    "ul",
    "ol",
    "li",
    "table",
    "pre",
    "blockquote",
    "hr",
    "figure",
    "details",
    "form",
];

/// Render a located region to a Markdown body.
pub fn render(region: &ContentRegion<'_>) -> Rendered {
    match region {
        ContentRegion::SearchMatch { user, responses } => {
            let mut w = Walker::default();

            // The question, code suppressed, as a leading blockquote.
            let mut question_pass = Walker {
                suppress_code: true,
                ..Walker::default()
            };
            question_pass.render_node(*user);
            let question = normalize(&question_pass.out);
            if !question.is_empty() {
                for line in question.lines() {
                    if line.is_empty() {
                        w.out.push_str(">\n");
                    } else {
                        w.out.push_str("> ");
                        w.out.push_str(line);
                        w.out.push('\n');
                    }
                }
            }

            // The user's own code pastes render once, up front, and seed the
            // set that response blocks are deduplicated against.
            let user_blocks = collect_code_blocks(*user);
            for cb in &user_blocks {
                w.user_code.insert(cb.text.trim().to_string());
            }
            for cb in &user_blocks {
                w.emit_fence(cb);
            }

            w.dedup_against_user = true;
            for r in responses {
                w.render_node(*r);
            }

            Rendered {
                body: normalize(&w.out),
                languages: w.languages,
            }
        }
        ContentRegion::FullPage { root } => {
            let mut w = Walker {
                drop_user_code: true,
                ..Walker::default()
            };
            w.render_node(*root);
            Rendered {
                body: normalize(&w.out),
                languages: w.languages,
            }
        }
    }
}

#[derive(Default)]
struct Walker {
    out: String,
    languages: BTreeSet<Lang>,
    /// Trimmed code texts seen in the user message of this exchange.
    user_code: HashSet<String>,
    /// Skip response code blocks that match `user_code` verbatim.
    dedup_against_user: bool,
    /// Full-page mode: drop code fences inside user turns so only the
    /// response's formatted copy renders.
    drop_user_code: bool,
    /// Question pass: emit no code at all.
    suppress_code: bool,
    user_depth: usize,
}

impl Walker {
    fn render_node(&mut self, node: NodeRef<'_, Node>) {
        match node.value() {
            Node::Element(el) => self.render_block(node, el),
            Node::Text(t) => {
                let text = collapse_ws(t);
                if !text.is_empty() {
                    self.block_open();
                    self.out.push_str(&text);
                    self.out.push('\n');
                }
            }
            Node::Document | Node::Fragment => self.render_children(node),
            _ => {}
        }
    }

    /// Group consecutive inline children into paragraphs, recursing into
    /// block children as they appear.
    fn render_children(&mut self, node: NodeRef<'_, Node>) {
        let mut para = String::new();
        for child in node.children() {
            match child.value() {
                Node::Element(el) if self.is_block(child, el) => {
                    self.flush_para(&mut para);
                    self.render_block(child, el);
                }
                Node::Element(_) | Node::Text(_) => inline_into(child, &mut para),
                _ => {}
            }
        }
        self.flush_para(&mut para);
    }

    fn is_block(&self, node: NodeRef<'_, Node>, el: &Element) -> bool {
        BLOCK_TAGS.contains(&el.name())
            || (el.name() == "code" && node_text(node).contains('\n'))
    }

    fn render_block(&mut self, node: NodeRef<'_, Node>, el: &Element) {
        let entering_user = locate::is_user_turn(el);
        if entering_user {
            self.user_depth += 1;
        }

        match el.name() {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let depth = el.name()[1..].parse::<usize>().unwrap_or(1);
                let text = collapse_ws(&inline_of(node));
                if !text.is_empty() {
                    self.block_open();
                    for _ in 0..depth {
                        self.out.push('#');
                    }
                    self.out.push(' ');
                    self.out.push_str(&text);
                    self.out.push('\n');
                }
            }
            "ul" => self.render_list(node, false, 0),
            "ol" => self.render_list(node, true, 0),
            "pre" | "code" => self.render_code(node),
            "blockquote" => {
                self.block_open();
                let start = self.out.len();
                self.render_children(node);
                let tail = self.out.split_off(start);
                let tail = tail.trim_matches('\n');
                for line in tail.lines() {
                    if line.trim().is_empty() {
                        self.out.push_str(">\n");
                    } else {
                        self.out.push_str("> ");
                        self.out.push_str(line);
                        self.out.push('\n');
                    }
                }
            }
            "hr" => {
                self.block_open();
                self.out.push_str("---\n");
            }
            "table" => self.render_table(node),
            _ => self.render_children(node),
        }

        if entering_user {
            self.user_depth -= 1;
        }
    }

    fn render_list(&mut self, node: NodeRef<'_, Node>, ordered: bool, depth: usize) {
        if depth == 0 {
            self.block_open();
        }
        let mut index = 1usize;
        for item in node.children() {
            let Some(el) = item.value().as_element() else {
                continue;
            };
            if el.name() != "li" {
                continue;
            }
            let mut para = String::new();
            let mut nested: Vec<(NodeRef<'_, Node>, bool)> = Vec::new();
            let mut code: Vec<NodeRef<'_, Node>> = Vec::new();
            for child in item.children() {
                match child.value() {
                    Node::Element(cel) if cel.name() == "ul" => nested.push((child, false)),
                    Node::Element(cel) if cel.name() == "ol" => nested.push((child, true)),
                    Node::Element(cel) if cel.name() == "pre" => code.push(child),
                    _ => inline_into(child, &mut para),
                }
            }
            let text = collapse_ws(&para);
            for _ in 0..depth {
                self.out.push_str("  ");
            }
            if ordered {
                self.out.push_str(&format!("{index}. "));
            } else {
                self.out.push_str("- ");
            }
            self.out.push_str(&text);
            self.out.push('\n');
            for (list, ord) in nested {
                self.render_list(list, ord, depth + 1);
            }
            for pre in code {
                self.render_code(pre);
            }
            index += 1;
        }
    }

    fn render_table(&mut self, node: NodeRef<'_, Node>) {
        let mut rows: Vec<Vec<String>> = Vec::new();
        for d in node.descendants() {
            if !d.value().as_element().is_some_and(|e| e.name() == "tr") {
                continue;
            }
            let mut cells = Vec::new();
            for cell in d.children() {
                let Some(cel) = cell.value().as_element() else {
                    continue;
                };
                if cel.name() == "td" || cel.name() == "th" {
                    let mut buf = String::new();
                    for c in cell.children() {
                        inline_into(c, &mut buf);
                    }
                    cells.push(collapse_ws(&buf).replace('|', "\\|"));
                }
            }
            if !cells.is_empty() {
                rows.push(cells);
            }
        }
        if rows.is_empty() {
            return;
        }
        self.block_open();
        let header = &rows[0];
        self.out.push_str(&format!("| {} |\n", header.join(" | ")));
        self.out
            .push_str(&format!("|{}\n", " --- |".repeat(header.len())));
        for row in &rows[1..] {
            self.out.push_str(&format!("| {} |\n", row.join(" | ")));
        }
    }

    fn render_code(&mut self, node: NodeRef<'_, Node>) {
        if self.suppress_code || (self.drop_user_code && self.user_depth > 0) {
            return;
        }
        let cb = code_block_of(node);
        if self.dedup_against_user && self.user_code.contains(cb.text.trim()) {
            return;
        }
        self.emit_fence(&cb);
    }

    fn emit_fence(&mut self, cb: &CodeBlock) {
        let lang = classify::classify(cb);
        if lang != Lang::Unknown {
            self.languages.insert(lang);
        }
        let code = cb.text.trim_matches('\n');
        self.block_open();
        self.out.push_str("```");
        self.out.push_str(lang.token());
        self.out.push('\n');
        self.out.push_str(code);
        self.out.push_str("\n```\n");
    }

    fn flush_para(&mut self, para: &mut String) {
        let text = collapse_ws(para);
        if !text.is_empty() {
            self.block_open();
            self.out.push_str(&text);
            self.out.push('\n');
        }
        para.clear();
    }

    /// Ensure a blank line separates the next block from what came before.
    fn block_open(&mut self) {
        if self.out.is_empty() {
            return;
        }
        while !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }
}

fn inline_of(node: NodeRef<'_, Node>) -> String {
    let mut buf = String::new();
    for child in node.children() {
        inline_into(child, &mut buf);
    }
    buf
}

fn inline_into(node: NodeRef<'_, Node>, buf: &mut String) {
    match node.value() {
        Node::Text(t) => buf.push_str(&t.text),
        Node::Element(el) => match el.name() {
            "br" => buf.push(' '),
            "strong" | "b" => wrap_inline(node, buf, "**"),
            "em" | "i" => wrap_inline(node, buf, "*"),
            "code" => {
                let code = collapse_ws(&node_text(node));
                if !code.is_empty() {
                    buf.push('`');
                    buf.push_str(&code);
                    buf.push('`');
                }
            }
            "a" => {
                let text = collapse_ws(&inline_of(node));
                match el.attr("href") {
                    Some(href)
                        if !href.is_empty() && !href.starts_with('#') && !text.is_empty() =>
                    {
                        buf.push_str(&format!("[{text}]({href})"));
                    }
                    _ => buf.push_str(&text),
                }
            }
            _ => {
                for child in node.children() {
                    inline_into(child, buf);
                }
            }
        },
        _ => {}
    }
}

fn wrap_inline(node: NodeRef<'_, Node>, buf: &mut String, marker: &str) {
    let inner = collapse_ws(&inline_of(node));
    if inner.is_empty() {
        return;
    }
    if !buf.is_empty() && !buf.ends_with(char::is_whitespace) {
        buf.push(' ');
    }
    buf.push_str(marker);
    buf.push_str(&inner);
    buf.push_str(marker);
}

/// Lift a `<pre>`/`<code>` node into a [`CodeBlock`] for classification.
fn code_block_of(node: NodeRef<'_, Node>) -> CodeBlock {
    let code_node = node
        .descendants()
        .find(|d| d.value().as_element().is_some_and(|e| e.name() == "code"))
        .unwrap_or(node);
    CodeBlock {
        text: node_text(code_node),
        hint: declared_hint(node),
        preceding: preceding_text(node),
    }
}

fn hint_from_classes(el: &Element) -> Option<String> {
    let class = el.attr("class")?;
    for token in class.split_whitespace() {
        if let Some(rest) = token
            .strip_prefix("language-")
            .or_else(|| token.strip_prefix("lang-"))
        {
            if !rest.is_empty() {
                return Some(rest.to_string());
            }
        }
    }
    None
}

/// `language-*` class on the block itself, a descendant, or its parent.
fn declared_hint(node: NodeRef<'_, Node>) -> Option<String> {
    for d in node.descendants() {
        if let Some(el) = d.value().as_element()
            && let Some(hint) = hint_from_classes(el)
        {
            return Some(hint);
        }
    }
    node.parent()
        .and_then(|p| p.value().as_element().and_then(hint_from_classes))
}

/// Nearest preceding text outside the code block, for proximity search.
fn preceding_text(node: NodeRef<'_, Node>) -> Option<String> {
    let mut cur = node;
    loop {
        for sib in cur.prev_siblings() {
            let text = collapse_ws(&node_text(sib));
            if !text.is_empty() {
                return Some(text);
            }
        }
        cur = cur.parent()?;
    }
}

/// Collect every code block in a subtree, in document order.
fn collect_code_blocks(node: NodeRef<'_, Node>) -> Vec<CodeBlock> {
    let mut out = Vec::new();
    for d in node.descendants() {
        let Some(el) = d.value().as_element() else {
            continue;
        };
        let in_pre = d
            .ancestors()
            .any(|a| a.value().as_element().is_some_and(|e| e.name() == "pre"));
        let is_block_code = el.name() == "code" && !in_pre && node_text(d).contains('\n');
        if el.name() == "pre" || is_block_code {
            out.push(code_block_of(d));
        }
    }
    out
}

/// Collapse blank-line runs, trim trailing whitespace per line, and leave
/// fence interiors untouched.
pub(crate) fn normalize(body: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut in_fence = false;
    let mut last_blank = true;
    for line in body.lines() {
        let is_delim = line.trim_start().starts_with("```");
        if in_fence {
            out.push(line.to_string());
            if is_delim {
                in_fence = false;
            }
            last_blank = false;
            continue;
        }
        if is_delim {
            in_fence = true;
            out.push(line.trim_end().to_string());
            last_blank = false;
            continue;
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            if !last_blank {
                out.push(String::new());
                last_blank = true;
            }
        } else {
            out.push(trimmed.to_string());
            last_blank = false;
        }
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    let mut body = out.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::locate::{Mode, locate};

    fn render_search(html: &str, phrase: &str) -> Rendered {
        let doc = Document::parse(html).unwrap();
        let region = locate(
            &doc,
            &Mode::Search {
                phrase: phrase.into(),
            },
        )
        .unwrap();
        render(&region)
    }

    fn render_full(html: &str) -> Rendered {
        let doc = Document::parse(html).unwrap();
        let region = locate(&doc, &Mode::FullPage).unwrap();
        render(&region)
    }

    #[test]
    fn fenced_block_carries_classifier_tag() {
        let out = render_search(
            r#"<html><body><main>
                <div data-message-author-role="user"><p>What is a binary search tree?</p></div>
                <div data-message-author-role="assistant">
                    <p>Here is an implementation:</p>
                    <pre><code class="language-python">def insert(node, key):
    pass</code></pre>
                </div>
            </main></body></html>"#,
            "binary search tree",
        );
        assert!(out.body.contains("```python\ndef insert(node, key):\n    pass\n```"));
        assert!(out.languages.contains(&Lang::Python));
    }

    #[test]
    fn question_renders_as_blockquote() {
        let out = render_search(
            r#"<html><body><main>
                <div data-message-author-role="user"><p>explain borrowing</p></div>
                <div data-message-author-role="assistant"><p>Borrowing lets you reference data.</p></div>
            </main></body></html>"#,
            "explain borrowing",
        );
        assert!(out.body.contains("> explain borrowing"));
        assert!(out.body.contains("Borrowing lets you reference data."));
    }

    #[test]
    fn duplicated_user_code_renders_exactly_once() {
        let code = "x = compute()\nprint(x)";
        let html = format!(
            r#"<html><body><main>
                <div data-message-author-role="user">
                    <p>why does this fail?</p>
                    <pre><code>{code}</code></pre>
                </div>
                <div data-message-author-role="assistant">
                    <p>Your snippet:</p>
                    <pre><code>{code}</code></pre>
                    <p>The fix:</p>
                    <pre><code>x = compute()
print(x or 0)</code></pre>
                </div>
            </main></body></html>"#
        );
        let out = render_search(&html, "why does this fail");
        assert_eq!(out.body.matches("print(x)\n").count(), 1);
        assert!(out.body.contains("print(x or 0)"));
    }

    #[test]
    fn full_page_drops_user_code_pastes() {
        let code = "SELECT id FROM users;";
        let html = format!(
            r#"<html><body><main>
                <div data-message-author-role="user">
                    <p>optimize this query</p>
                    <pre><code>{code}</code></pre>
                </div>
                <div data-message-author-role="assistant">
                    <p>Add an index:</p>
                    <pre><code>{code}</code></pre>
                </div>
            </main></body></html>"#
        );
        let out = render_full(&html);
        assert_eq!(out.body.matches(code).count(), 1);
        assert!(out.body.contains("optimize this query"));
    }

    #[test]
    fn headings_lists_and_rules_map_to_markdown() {
        let out = render_full(
            r#"<html><body><main>
                <h2>Approach</h2>
                <p>Two options:</p>
                <ul><li>first</li><li>second</li></ul>
                <ol><li>alpha</li><li>beta</li></ol>
                <hr>
                <p>Done.</p>
            </main></body></html>"#,
        );
        assert!(out.body.contains("## Approach"));
        assert!(out.body.contains("- first\n- second"));
        assert!(out.body.contains("1. alpha\n2. beta"));
        assert!(out.body.contains("---"));
    }

    #[test]
    fn inline_markup_maps_to_markdown() {
        let out = render_full(
            r#"<html><body><main>
                <p>Use <strong>bold</strong> and <em>italics</em> and <code>inline_code()</code>
                   and <a href="https://example.com/docs">the docs</a>.</p>
            </main></body></html>"#,
        );
        assert!(out.body.contains("**bold**"));
        assert!(out.body.contains("*italics*"));
        assert!(out.body.contains("`inline_code()`"));
        assert!(out.body.contains("[the docs](https://example.com/docs)"));
    }

    #[test]
    fn tables_map_to_pipes() {
        let out = render_full(
            r#"<html><body><main><table>
                <tr><th>Name</th><th>Cost</th></tr>
                <tr><td>insert</td><td>O(log n)</td></tr>
            </table></main></body></html>"#,
        );
        assert!(out.body.contains("| Name | Cost |"));
        assert!(out.body.contains("| insert | O(log n) |"));
    }

    #[test]
    fn blank_runs_collapse_but_fences_are_preserved() {
        let raw = "a\n\n\n\nb\n```\n  keep   \n\n\n  this \n```\nc  \n";
        let normalized = normalize(raw);
        assert_eq!(
            normalized,
            "a\n\nb\n```\n  keep   \n\n\n  this \n```\nc\n"
        );
    }

    #[test]
    fn unknown_code_gets_a_bare_fence() {
        let out = render_full(
            r#"<html><body><main>
                <pre><code>some opaque output 12345 with no recognizable syntax</code></pre>
            </main></body></html>"#,
        );
        assert!(out.body.contains("```\nsome opaque output"));
        assert!(out.languages.is_empty());
    }

    #[test]
    fn proximity_caption_tags_the_fence() {
        let out = render_full(
            r#"<html><body><main>
                <p>Save this as build.sh and run it from the terminal:</p>
                <pre><code>cargo build --release</code></pre>
            </main></body></html>"#,
        );
        assert!(out.body.contains("```bash\ncargo build --release\n```"));
        assert!(out.languages.contains(&Lang::Bash));
    }
}
