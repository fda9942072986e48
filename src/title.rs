//! Smart titles.
//!
//! Turns a verbose user question into a short, title-cased heading: filler
//! prefixes and suffixes go, trailing punctuation goes, the rest is cut at a
//! word boundary and title-cased. An external suggester (say, a language
//! model behind the orchestration layer) can be injected through
//! [`TitleSuggester`]; the heuristic is the always-available fallback.

/// Pluggable title generation. Implementations return `None` when they
/// cannot produce a title, which hands control back to the heuristic.
pub trait TitleSuggester {
    fn suggest_title(&self, text: &str) -> Option<String>;
}

/// The built-in, dependency-free suggester.
pub struct HeuristicTitler {
    pub max_len: usize,
}

impl Default for HeuristicTitler {
    fn default() -> Self {
        HeuristicTitler { max_len: 60 }
    }
}

impl TitleSuggester for HeuristicTitler {
    fn suggest_title(&self, text: &str) -> Option<String> {
        Some(heuristic_title(text, self.max_len))
    }
}

/// Filler lead-ins, stripped repeatedly (longest candidate first).
const FILLER_STARTS: &[&str] = &[
    "can you ",
    "could you ",
    "please ",
    "i want to ",
    "i need to ",
    "i want you to ",
    "i need you to ",
    "i would like to ",
    "help me ",
    "tell me ",
    "show me ",
    "write me ",
    "give me ",
    "explain to me ",
    "explain me ",
    "explain ",
    "what is ",
    "what are ",
    "how to ",
    "how do i ",
    "how can i ",
    "how do you ",
    "what does ",
    "what do ",
    "i am ",
    "i'm ",
    "we need to ",
    "let's ",
    "let us ",
];

const FILLER_ENDS: &[&str] = &[
    " please",
    " thanks",
    " thank you",
    " for me",
    " asap",
    " in detail",
    " with examples",
    " with example",
    " step by step",
    " briefly",
];

/// Words kept lowercase mid-title.
const SMALL_WORDS: &[&str] = &[
    "a", "an", "the", "and", "but", "or", "for", "nor", "on", "at", "to", "by", "in", "of", "is",
    "it", "vs", "with",
];

fn strip_fillers<'a>(text: &'a str, table: &[&str], from_start: bool) -> &'a str {
    let mut text = text;
    loop {
        let lower = text.to_lowercase();
        let hit = table
            .iter()
            .filter(|f| {
                if from_start {
                    lower.starts_with(*f)
                } else {
                    lower.ends_with(*f)
                }
            })
            .max_by_key(|f| f.len());
        match hit {
            Some(f) if text.len() > f.len() => {
                text = if from_start {
                    &text[f.len()..]
                } else {
                    &text[..text.len() - f.len()]
                };
            }
            _ => return text,
        }
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            if i > 0 && SMALL_WORDS.contains(&word.to_lowercase().as_str()) {
                word.to_lowercase()
            } else {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Generate a clean, concise title from a verbose question.
pub fn heuristic_title(question: &str, max_len: usize) -> String {
    let text = question.trim();
    let text = strip_fillers(text, FILLER_STARTS, true);
    let text = strip_fillers(text, FILLER_ENDS, false);
    let mut text = text.trim_matches([' ', '?', '.', '!', ',', ';', ':']).to_string();

    if text.chars().count() > max_len {
        let cut: String = text.chars().take(max_len).collect();
        let cut = match cut.rfind(' ') {
            Some(pos) => &cut[..pos],
            None => cut.as_str(),
        };
        text = cut.trim_end_matches([' ', ',', '.', ';', ':', '-']).to_string();
    }

    let text = title_case(&text);
    if text.is_empty() {
        question.chars().take(max_len).collect()
    } else {
        text
    }
}

/// Resolve the final title: external suggester first, heuristic fallback.
pub fn smart_title(
    phrase: &str,
    max_len: usize,
    external: Option<&dyn TitleSuggester>,
) -> String {
    if let Some(suggester) = external
        && let Some(title) = suggester.suggest_title(phrase)
    {
        let title = title.trim();
        if !title.is_empty() {
            return title.to_string();
        }
    }
    heuristic_title(phrase, max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_filler_prefixes_and_suffixes() {
        assert_eq!(
            heuristic_title("can you explain binary search trees please", 60),
            "Binary Search Trees"
        );
        assert_eq!(
            heuristic_title("what is a segment tree?", 60),
            "A Segment Tree"
        );
    }

    #[test]
    fn stacked_fillers_strip_repeatedly() {
        assert_eq!(
            heuristic_title("please tell me how to profile rust code step by step", 60),
            "Profile Rust Code"
        );
    }

    #[test]
    fn small_words_stay_lowercase() {
        assert_eq!(
            heuristic_title("difference between stack and heap", 60),
            "Difference Between Stack and Heap"
        );
    }

    #[test]
    fn truncates_at_a_word_boundary() {
        let long = "implement a lock free concurrent queue with hazard pointers in modern cpp";
        let title = heuristic_title(long, 40);
        assert!(title.chars().count() <= 40);
        assert!(!title.ends_with(' '));
        assert!(title.starts_with("Implement a Lock Free"));
    }

    #[test]
    fn degenerate_input_falls_back_to_raw_text() {
        // Nothing but filler; the raw phrase survives rather than an empty title.
        assert!(!heuristic_title("please", 60).is_empty());
    }

    #[test]
    fn external_suggester_wins_when_it_answers() {
        struct Fixed;
        impl TitleSuggester for Fixed {
            fn suggest_title(&self, _text: &str) -> Option<String> {
                Some("Fixed Title".into())
            }
        }
        assert_eq!(smart_title("whatever", 60, Some(&Fixed)), "Fixed Title");
    }

    #[test]
    fn failing_external_suggester_falls_back() {
        struct Broken;
        impl TitleSuggester for Broken {
            fn suggest_title(&self, _text: &str) -> Option<String> {
                None
            }
        }
        assert_eq!(
            smart_title("explain tail recursion", 60, Some(&Broken)),
            "Tail Recursion"
        );
    }
}
