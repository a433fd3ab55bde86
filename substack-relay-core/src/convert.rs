//! # convert: markdown body → note
//!
//! Walks the token sequence produced by [`crate::markdown::lex`] and replays it
//! as builder calls on a [`NoteCanvas`]. The walk owns exactly one "current"
//! paragraph handle at a time and replaces it with every call's return value.
//!
//! Blocks without visible text never open a paragraph. If no block contributes
//! anything the conversion fails with [`NoteError::NoMeaningfulContent`]; a body
//! that is blank before parsing fails earlier with [`NoteError::EmptyBody`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

pub use crate::markdown::decode_html_entities;
use crate::markdown::{lex, Block, Inline, ListItem};
use crate::note::{NoteBuilder, NoteCanvas, NoteDocument, ParagraphHandle};

pub const BULLET: &str = "•";

/// Paragraphs made of nothing but stray list markers, e.g. `1.` or `- *`.
static LIST_MARKER_ONLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?:\d+[.)]|[-*+•])\s*)+$").expect("list marker pattern is valid")
});

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NoteError {
    #[error("note body is empty")]
    EmptyBody,
    #[error("note body has no meaningful content after parsing markdown")]
    NoMeaningfulContent,
}

/// How a note body is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteFormat {
    Simple,
    #[default]
    #[serde(alias = "advanced")]
    Markdown,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown note format `{0}`, expected `simple` or `markdown`")]
pub struct UnknownNoteFormat(pub String);

impl FromStr for NoteFormat {
    type Err = UnknownNoteFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(NoteFormat::Simple),
            "markdown" | "advanced" => Ok(NoteFormat::Markdown),
            _ => Err(UnknownNoteFormat(s.to_string())),
        }
    }
}

impl fmt::Display for NoteFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteFormat::Simple => f.write_str("simple"),
            NoteFormat::Markdown => f.write_str("markdown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Body,
    /// Plain text is emphasised as bold.
    Heading,
}

/// Build a complete note document from a body in the given format.
pub fn compose_note(body: &str, format: NoteFormat) -> Result<NoteDocument, NoteError> {
    let canvas = NoteBuilder::new();
    let handle = match format {
        NoteFormat::Markdown => parse_markdown_to_note(body, &canvas)?,
        NoteFormat::Simple => build_simple_note(body, &canvas)?,
    };
    let document = handle.finish();
    debug!(
        format = %format,
        paragraphs = document.paragraphs.len(),
        "[NOTE] Composed note document"
    );
    Ok(document)
}

/// Convert a markdown body into builder calls, returning the last paragraph handle.
pub fn parse_markdown_to_note<C: NoteCanvas>(
    markdown: &str,
    canvas: &C,
) -> Result<C::Paragraph, NoteError> {
    if markdown.trim().is_empty() {
        return Err(NoteError::EmptyBody);
    }
    let blocks = lex(markdown);
    debug!(blocks = blocks.len(), "[NOTE] Lexed markdown body");
    render_blocks(&blocks, canvas)
}

/// Replay already-lexed blocks onto a canvas.
pub fn render_blocks<C: NoteCanvas>(
    blocks: &[Block],
    canvas: &C,
) -> Result<C::Paragraph, NoteError> {
    let mut current: Option<C::Paragraph> = None;
    let mut content = 0usize;
    for block in blocks {
        current = render_block(block, canvas, current, &mut content);
    }
    if content == 0 {
        warn!(blocks = blocks.len(), "[NOTE] Markdown produced no meaningful content");
        return Err(NoteError::NoMeaningfulContent);
    }
    current.ok_or(NoteError::NoMeaningfulContent)
}

/// Build a note from plain text: blank-line separated blocks become paragraphs.
pub fn build_simple_note<C: NoteCanvas>(
    body: &str,
    canvas: &C,
) -> Result<C::Paragraph, NoteError> {
    if body.trim().is_empty() {
        return Err(NoteError::EmptyBody);
    }
    let mut current: Option<C::Paragraph> = None;
    for block in plain_blocks(body) {
        let handle = next_paragraph(canvas, current);
        current = Some(handle.text(&decode_html_entities(&block)));
    }
    current.ok_or(NoteError::EmptyBody)
}

fn render_block<C: NoteCanvas>(
    block: &Block,
    canvas: &C,
    current: Option<C::Paragraph>,
    content: &mut usize,
) -> Option<C::Paragraph> {
    match block {
        Block::Heading { inlines, .. } => {
            if !has_visible_text(inlines) {
                return current;
            }
            let handle = next_paragraph(canvas, current);
            *content += 1;
            Some(render_inlines(handle, inlines, Mode::Heading))
        }
        Block::Paragraph { inlines } => {
            if !has_visible_text(inlines) || is_list_marker_only(&block.text()) {
                return current;
            }
            let handle = next_paragraph(canvas, current);
            *content += 1;
            Some(render_inlines(handle, inlines, Mode::Body))
        }
        Block::List { ordered, items } => render_list(*ordered, items, canvas, current, content),
        Block::Space => current,
        Block::Other { text } => {
            if text.trim().is_empty() {
                return current;
            }
            let handle = next_paragraph(canvas, current);
            *content += 1;
            Some(append_plain(handle, text, Mode::Body))
        }
    }
}

fn render_list<C: NoteCanvas>(
    ordered: bool,
    items: &[ListItem],
    canvas: &C,
    mut current: Option<C::Paragraph>,
    content: &mut usize,
) -> Option<C::Paragraph> {
    let mut ordinal = 0usize;
    for item in items {
        if !item.has_content() {
            continue;
        }
        ordinal += 1;
        let marker = if ordered {
            format!("{ordinal}. ")
        } else {
            format!("{BULLET} ")
        };
        let mut handle = next_paragraph(canvas, current).text(&marker);
        if let Some(first) = item.blocks.first() {
            handle = match first.inlines() {
                Some(inlines) => render_inlines(handle, inlines, Mode::Body),
                None => append_plain(handle, &item.text(), Mode::Body),
            };
        }
        *content += 1;
        current = Some(handle);
    }
    current
}

fn render_inlines<P: ParagraphHandle>(mut handle: P, inlines: &[Inline], mode: Mode) -> P {
    for inline in inlines {
        if inline.is_blank() {
            continue;
        }
        handle = match inline {
            Inline::Text(text) | Inline::Other(text) => append_plain(handle, text, mode),
            Inline::Strong(text) => handle.bold(text),
            Inline::Emphasis(text) => handle.italic(text),
            Inline::Code(text) => handle.code(text),
            Inline::Link { text, href } => append_plain(handle, &link_label(text, href), mode),
        };
    }
    handle
}

fn append_plain<P: ParagraphHandle>(handle: P, text: &str, mode: Mode) -> P {
    match mode {
        Mode::Body => handle.text(text),
        Mode::Heading => handle.bold(text),
    }
}

fn next_paragraph<C: NoteCanvas>(canvas: &C, current: Option<C::Paragraph>) -> C::Paragraph {
    match current {
        Some(handle) => handle.paragraph(),
        None => canvas.paragraph(),
    }
}

fn link_label(text: &str, href: &str) -> String {
    let text = text.trim();
    if text.is_empty() || text == href {
        href.to_string()
    } else {
        format!("{text} ({href})")
    }
}

fn has_visible_text(inlines: &[Inline]) -> bool {
    inlines.iter().any(|inline| !inline.is_blank())
}

fn is_list_marker_only(text: &str) -> bool {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    !normalized.is_empty() && LIST_MARKER_ONLY.is_match(&normalized)
}

fn plain_blocks(body: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut lines: Vec<&str> = Vec::new();
    for line in body.lines() {
        if line.trim().is_empty() {
            if !lines.is_empty() {
                blocks.push(lines.join("\n"));
                lines.clear();
            }
        } else {
            lines.push(line.trim_end());
        }
    }
    if !lines.is_empty() {
        blocks.push(lines.join("\n"));
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn decodes_entities_without_double_unescaping() {
        assert_eq!(decode_html_entities("Fish &amp; chips"), "Fish & chips");
        assert_eq!(
            decode_html_entities("&quot;hi&quot; &#39;there&#39; &lt;b&gt;"),
            "\"hi\" 'there' <b>"
        );
        assert_eq!(decode_html_entities("a&nbsp;b"), "a b");
        assert_eq!(decode_html_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn leaves_text_without_ampersands_borrowed() {
        assert!(matches!(decode_html_entities("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn list_marker_guard_only_matches_marker_runs() {
        assert!(is_list_marker_only("1."));
        assert!(is_list_marker_only("1. 2."));
        assert!(is_list_marker_only(" -  * "));
        assert!(is_list_marker_only("•"));
        assert!(!is_list_marker_only("42"));
        assert!(!is_list_marker_only("1.5"));
        assert!(!is_list_marker_only("1. item"));
        assert!(!is_list_marker_only(""));
    }

    #[test]
    fn link_label_prefers_text_and_collapses_autolinks() {
        assert_eq!(link_label("n8n", "https://n8n.io"), "n8n (https://n8n.io)");
        assert_eq!(link_label("", "https://n8n.io"), "https://n8n.io");
        assert_eq!(link_label("https://n8n.io", "https://n8n.io"), "https://n8n.io");
    }

    #[test]
    fn note_format_parses_aliases() {
        assert_eq!("simple".parse::<NoteFormat>(), Ok(NoteFormat::Simple));
        assert_eq!("Markdown".parse::<NoteFormat>(), Ok(NoteFormat::Markdown));
        assert_eq!("advanced".parse::<NoteFormat>(), Ok(NoteFormat::Markdown));
        assert!("html".parse::<NoteFormat>().is_err());
    }

    #[test]
    fn plain_blocks_split_on_blank_lines() {
        assert_eq!(
            plain_blocks("one\ntwo\n\n  \nthree  \n"),
            vec!["one\ntwo".to_string(), "three".to_string()]
        );
    }
}
