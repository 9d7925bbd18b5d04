//! Markdown cleanup for LLM-generated summaries.
//!
//! The model is asked for plain structure but still emits Markdown
//! markers. Cleaning strips them before the text reaches the PDF or the
//! plain-message fallback. Heading detection happens on the raw line,
//! before markers are stripped, so headings keep their bold face in the
//! rendered document.

use std::sync::LazyLock;

use regex::Regex;

static RE_HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#+\s?").unwrap());
static RE_BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static RE_ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.*?)\*").unwrap());
static RE_BOLD_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"__([^_]+)__").unwrap());
static RE_ITALIC_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_(.*?)_").unwrap());
static RE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]+)`").unwrap());
static RE_LIST_DASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^(?:-\s+)+").unwrap());
static RE_BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Strip inline Markdown markers from a fragment. Ordering matters:
/// bold before italic, double underscore before single.
fn strip_markup(text: &str) -> String {
    let text = RE_HEADING.replace_all(text, "");
    let text = RE_BOLD.replace_all(&text, "$1");
    let text = RE_ITALIC.replace_all(&text, "$1");
    let text = RE_BOLD_UNDERSCORE.replace_all(&text, "$1");
    let text = RE_ITALIC_UNDERSCORE.replace_all(&text, "$1");
    let text = RE_CODE.replace_all(&text, "$1");
    RE_LIST_DASH.replace_all(&text, "").into_owned()
}

/// Clean a whole summary: strip markers, collapse runs of three or more
/// newlines to one blank line, trim the ends. Idempotent.
pub fn clean(summary: &str) -> String {
    let cleaned = strip_markup(summary);
    let cleaned = RE_BLANK_RUN.replace_all(&cleaned, "\n\n");
    cleaned.trim().to_string()
}

/// One laid-out source line. An empty `text` is a blank spacer line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutLine {
    pub text: String,
    pub heading: bool,
}

impl LayoutLine {
    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }
}

/// Split a raw summary into render-ready lines: headings flagged from
/// the raw `##`/`###` prefix, markers stripped, blank runs collapsed to
/// a single spacer, no leading or trailing spacers.
pub fn layout_lines(summary: &str) -> Vec<LayoutLine> {
    let mut lines: Vec<LayoutLine> = Vec::new();
    let mut pending_blank = false;

    for raw in summary.lines() {
        let heading = raw.trim_start().starts_with("##");
        let text = strip_markup(raw).trim().to_string();

        if text.is_empty() {
            pending_blank = !lines.is_empty();
            continue;
        }
        if pending_blank {
            lines.push(LayoutLine {
                text: String::new(),
                heading: false,
            });
            pending_blank = false;
        }
        lines.push(LayoutLine { text, heading });
    }

    lines
}
