//! # note: immutable note builder
//!
//! A note is composed by threading a handle through formatting calls. Every
//! call consumes the handle and hands back a new one, so a stale handle cannot
//! be used again: the compiler rejects it.
//!
//! [`NoteCanvas`] is the starting capability (it can only open the first
//! paragraph); [`ParagraphHandle`] is the cursor inside a paragraph. The
//! concrete pair is [`NoteBuilder`] / [`ParagraphBuilder`], which accumulate a
//! [`NoteDocument`] ready to be published through
//! [`crate::contract::SubstackGateway::publish_note`].

use serde::Serialize;
use serde_json::{json, Value};

/// Entry point of a note: opens the first paragraph.
pub trait NoteCanvas {
    type Paragraph: ParagraphHandle;

    fn paragraph(&self) -> Self::Paragraph;
}

/// Cursor into the paragraph being written. Each method returns the next handle.
pub trait ParagraphHandle: Sized {
    #[must_use]
    fn text(self, text: &str) -> Self;
    #[must_use]
    fn bold(self, text: &str) -> Self;
    #[must_use]
    fn italic(self, text: &str) -> Self;
    #[must_use]
    fn code(self, text: &str) -> Self;
    /// Close the current paragraph and open the next one.
    #[must_use]
    fn paragraph(self) -> Self;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentStyle {
    Plain,
    Bold,
    Italic,
    Code,
}

impl SegmentStyle {
    /// Mark name in the published document body; plain text carries no mark.
    pub fn mark(self) -> Option<&'static str> {
        match self {
            SegmentStyle::Plain => None,
            SegmentStyle::Bold => Some("bold"),
            SegmentStyle::Italic => Some("italic"),
            SegmentStyle::Code => Some("code"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub text: String,
    pub style: SegmentStyle,
}

impl Segment {
    pub fn new(text: impl Into<String>, style: SegmentStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NoteParagraph {
    pub segments: Vec<Segment>,
}

impl NoteParagraph {
    pub fn plain_text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }
}

/// A finished note: ordered paragraphs of ordered, styled segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NoteDocument {
    pub paragraphs: Vec<NoteParagraph>,
}

impl NoteDocument {
    pub fn is_empty(&self) -> bool {
        self.paragraphs.iter().all(|p| p.segments.is_empty())
    }

    /// Paragraph texts joined by blank lines.
    pub fn plain_text(&self) -> String {
        self.paragraphs
            .iter()
            .map(NoteParagraph::plain_text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// The rich-text document body expected by the notes endpoint.
    pub fn to_body_json(&self) -> Value {
        let content: Vec<Value> = self
            .paragraphs
            .iter()
            .map(|paragraph| {
                let segments: Vec<Value> = paragraph.segments.iter().map(segment_json).collect();
                json!({ "type": "paragraph", "content": segments })
            })
            .collect();
        json!({
            "type": "doc",
            "attrs": { "schemaVersion": "v1" },
            "content": content,
        })
    }
}

fn segment_json(segment: &Segment) -> Value {
    let mut node = json!({ "type": "text", "text": segment.text });
    if let Some(mark) = segment.style.mark() {
        node["marks"] = json!([{ "type": mark }]);
    }
    node
}

/// Starting capability for a new note.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoteBuilder;

impl NoteBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl NoteCanvas for NoteBuilder {
    type Paragraph = ParagraphBuilder;

    fn paragraph(&self) -> ParagraphBuilder {
        ParagraphBuilder {
            document: NoteDocument {
                paragraphs: vec![NoteParagraph::default()],
            },
        }
    }
}

/// Handle for the note so far, positioned in its last paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct ParagraphBuilder {
    document: NoteDocument,
}

impl ParagraphBuilder {
    pub fn document(&self) -> &NoteDocument {
        &self.document
    }

    pub fn finish(self) -> NoteDocument {
        self.document
    }

    fn append(mut self, text: &str, style: SegmentStyle) -> Self {
        if text.is_empty() {
            return self;
        }
        if let Some(paragraph) = self.document.paragraphs.last_mut() {
            paragraph.segments.push(Segment::new(text, style));
        }
        self
    }
}

impl ParagraphHandle for ParagraphBuilder {
    fn text(self, text: &str) -> Self {
        self.append(text, SegmentStyle::Plain)
    }

    fn bold(self, text: &str) -> Self {
        self.append(text, SegmentStyle::Bold)
    }

    fn italic(self, text: &str) -> Self {
        self.append(text, SegmentStyle::Italic)
    }

    fn code(self, text: &str) -> Self {
        self.append(text, SegmentStyle::Code)
    }

    fn paragraph(mut self) -> Self {
        self.document.paragraphs.push(NoteParagraph::default());
        self
    }
}
