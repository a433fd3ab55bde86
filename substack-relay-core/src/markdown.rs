//! # markdown: block and inline tokens for note composition
//!
//! Folds the `pulldown-cmark` event stream into a flat sequence of [`Block`]
//! tokens, each carrying its [`Inline`] children. The token set is deliberately
//! small: the note composer only understands headings, paragraphs and lists,
//! and everything else is reduced to [`Block::Other`] with its flattened text.
//!
//! Lexing rules worth knowing when reading the composer:
//! - adjacent text fragments and line breaks collapse into one [`Inline::Text`];
//! - nested spans (`**bold *and italic***`) flatten into the outermost span;
//! - a blank line between two top-level blocks yields a [`Block::Space`];
//! - tight list items get a synthesized paragraph as their first block;
//! - entities are resolved once per text fragment, code is left verbatim.

use pulldown_cmark::{Event, Options, Parser, Tag};
use std::borrow::Cow;
use std::ops::Range;

/// A top-level markdown construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, inlines: Vec<Inline> },
    Paragraph { inlines: Vec<Inline> },
    List { ordered: bool, items: Vec<ListItem> },
    Space,
    /// Block quotes, code blocks, tables, raw HTML and footnote definitions.
    Other { text: String },
}

/// One entry of a [`Block::List`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListItem {
    pub blocks: Vec<Block>,
}

/// A span-level markdown construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Strong(String),
    Emphasis(String),
    Code(String),
    Link { text: String, href: String },
    /// Strikethrough, images (alt text), inline HTML, footnote references.
    Other(String),
}

impl Inline {
    /// The visible text of the token. Links without a label show their target.
    pub fn text(&self) -> &str {
        match self {
            Inline::Text(text)
            | Inline::Strong(text)
            | Inline::Emphasis(text)
            | Inline::Code(text)
            | Inline::Other(text) => text,
            Inline::Link { text, href } => {
                if text.trim().is_empty() {
                    href
                } else {
                    text
                }
            }
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text().trim().is_empty()
    }
}

impl Block {
    /// Inline children for blocks that carry them directly.
    pub fn inlines(&self) -> Option<&[Inline]> {
        match self {
            Block::Heading { inlines, .. } | Block::Paragraph { inlines } => Some(inlines),
            _ => None,
        }
    }

    /// Plain text of the block with all formatting dropped.
    pub fn text(&self) -> String {
        match self {
            Block::Heading { inlines, .. } | Block::Paragraph { inlines } => {
                inlines.iter().map(Inline::text).collect()
            }
            Block::List { items, .. } => items
                .iter()
                .map(ListItem::text)
                .collect::<Vec<_>>()
                .join("\n"),
            Block::Space => String::new(),
            Block::Other { text } => text.clone(),
        }
    }
}

impl ListItem {
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .map(Block::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_content(&self) -> bool {
        !self.text().trim().is_empty()
    }
}

/// Lex a markdown document into block tokens, in document order.
pub fn lex(source: &str) -> Vec<Block> {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let mut lexer = Lexer::new(source);
    for (event, range) in Parser::new_ext(source, options).into_offset_iter() {
        lexer.handle(event, range);
    }
    lexer.finish()
}

enum Frame {
    Heading { level: u8, inlines: Vec<Inline> },
    Paragraph { inlines: Vec<Inline> },
    List { ordered: bool, items: Vec<ListItem> },
    Item { blocks: Vec<Block>, inlines: Vec<Inline> },
    Opaque { text: String, depth: usize },
}

enum SpanKind {
    Strong,
    Emphasis,
    Link { href: String },
    Other,
}

struct Span {
    kind: SpanKind,
    text: String,
}

struct Lexer<'s> {
    source: &'s str,
    blocks: Vec<Block>,
    frames: Vec<Frame>,
    spans: Vec<Span>,
    last_end: Option<usize>,
    html_run: bool,
    /// Open code blocks; their text is kept verbatim.
    literal: usize,
}

impl<'s> Lexer<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            blocks: Vec::new(),
            frames: Vec::new(),
            spans: Vec::new(),
            last_end: None,
            html_run: false,
            literal: 0,
        }
    }

    fn handle(&mut self, event: Event<'_>, range: Range<usize>) {
        if !matches!(event, Event::Html(_)) {
            self.html_run = false;
        }
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag, range),
            Event::Text(text) => {
                let text = if self.literal > 0 {
                    text.into_string()
                } else {
                    normalize_text(&text)
                };
                self.push_inline(Inline::Text(text))
            }
            Event::Code(code) => self.push_inline(Inline::Code(code.into_string())),
            Event::Html(html) => self.html(decode_html_entities(&html).into_owned(), range),
            Event::FootnoteReference(label) => {
                self.push_inline(Inline::Other(format!("[^{label}]")))
            }
            Event::SoftBreak | Event::HardBreak => self.push_inline(Inline::Text("\n".into())),
            Event::Rule => self.push_block(Block::Space, range),
            Event::TaskListMarker(_) => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        if matches!(tag, Tag::CodeBlock(_)) {
            self.literal += 1;
        }
        if let Some(Frame::Opaque { depth, .. }) = self.frames.last_mut() {
            if is_opaque(&tag) {
                *depth += 1;
            }
            return;
        }
        match tag {
            Tag::Paragraph => self.frames.push(Frame::Paragraph {
                inlines: Vec::new(),
            }),
            Tag::Heading(level, _, _) => self.frames.push(Frame::Heading {
                level: level as u8,
                inlines: Vec::new(),
            }),
            Tag::List(start) => self.frames.push(Frame::List {
                ordered: start.is_some(),
                items: Vec::new(),
            }),
            Tag::Item => self.frames.push(Frame::Item {
                blocks: Vec::new(),
                inlines: Vec::new(),
            }),
            Tag::Strong => self.open_span(SpanKind::Strong),
            Tag::Emphasis => self.open_span(SpanKind::Emphasis),
            Tag::Link(_, dest, _) => self.open_span(SpanKind::Link {
                href: dest.into_string(),
            }),
            Tag::Strikethrough | Tag::Image(..) => self.open_span(SpanKind::Other),
            tag if is_opaque(&tag) => self.frames.push(Frame::Opaque {
                text: String::new(),
                depth: 0,
            }),
            _ => {}
        }
    }

    fn end(&mut self, tag: Tag<'_>, range: Range<usize>) {
        if matches!(tag, Tag::CodeBlock(_)) {
            self.literal = self.literal.saturating_sub(1);
        }
        if matches!(self.frames.last(), Some(Frame::Opaque { .. })) {
            self.end_in_opaque(tag, range);
            return;
        }
        match tag {
            Tag::Paragraph | Tag::Heading(..) | Tag::List(_) | Tag::Item => {
                if let Some(frame) = self.frames.pop() {
                    self.close_frame(frame, range);
                }
            }
            Tag::Strong | Tag::Emphasis | Tag::Link(..) | Tag::Strikethrough | Tag::Image(..) => {
                self.close_span()
            }
            _ => {}
        }
    }

    fn end_in_opaque(&mut self, tag: Tag<'_>, range: Range<usize>) {
        let closes = is_opaque(&tag);
        if let Some(Frame::Opaque { text, depth }) = self.frames.last_mut() {
            if !closes {
                match tag {
                    Tag::TableCell => text.push(' '),
                    Tag::Paragraph
                    | Tag::Heading(..)
                    | Tag::Item
                    | Tag::TableHead
                    | Tag::TableRow => ensure_newline(text),
                    _ => {}
                }
                return;
            }
            if *depth > 0 {
                *depth -= 1;
                ensure_newline(text);
                return;
            }
        }
        if let Some(frame) = self.frames.pop() {
            self.close_frame(frame, range);
        }
    }

    fn close_frame(&mut self, frame: Frame, range: Range<usize>) {
        match frame {
            Frame::Paragraph { inlines } => self.push_block(Block::Paragraph { inlines }, range),
            Frame::Heading { level, inlines } => {
                self.push_block(Block::Heading { level, inlines }, range)
            }
            Frame::List { ordered, items } => self.push_block(Block::List { ordered, items }, range),
            Frame::Item {
                mut blocks,
                inlines,
            } => {
                if !inlines.is_empty() {
                    blocks.insert(0, Block::Paragraph { inlines });
                }
                if let Some(Frame::List { items, .. }) = self.frames.last_mut() {
                    items.push(ListItem { blocks });
                }
            }
            Frame::Opaque { text, .. } => {
                let text = text.trim_end().to_string();
                self.push_block(Block::Other { text }, range)
            }
        }
    }

    fn html(&mut self, html: String, range: Range<usize>) {
        if !self.frames.is_empty() || !self.spans.is_empty() {
            self.push_inline(Inline::Other(html));
            return;
        }
        // An HTML block arrives one line at a time.
        if self.html_run {
            if let Some(Block::Other { text }) = self.blocks.last_mut() {
                text.push_str(&html);
                self.last_end = Some(range.end);
                return;
            }
        }
        self.push_block(Block::Other { text: html }, range);
        self.html_run = true;
    }

    fn push_block(&mut self, block: Block, range: Range<usize>) {
        match self.frames.last_mut() {
            None => {
                if let Some(previous_end) = self.last_end {
                    if blank_line_between(self.source, previous_end, range.start) {
                        self.blocks.push(Block::Space);
                    }
                }
                self.blocks.push(block);
                self.last_end = Some(range.end);
            }
            Some(Frame::Item { blocks, .. }) => blocks.push(block),
            Some(Frame::Opaque { text, .. }) => {
                text.push_str(&block.text());
                ensure_newline(text);
            }
            Some(_) => {}
        }
    }

    fn open_span(&mut self, kind: SpanKind) {
        self.spans.push(Span {
            kind,
            text: String::new(),
        });
    }

    fn close_span(&mut self) {
        let Some(span) = self.spans.pop() else {
            return;
        };
        if let Some(parent) = self.spans.last_mut() {
            parent.text.push_str(&span.text);
            return;
        }
        let inline = match span.kind {
            SpanKind::Strong => Inline::Strong(span.text),
            SpanKind::Emphasis => Inline::Emphasis(span.text),
            SpanKind::Link { href } => Inline::Link {
                text: span.text,
                href,
            },
            SpanKind::Other => Inline::Other(span.text),
        };
        self.push_inline(inline);
    }

    fn push_inline(&mut self, inline: Inline) {
        if let Some(span) = self.spans.last_mut() {
            span.text.push_str(inline.text());
            return;
        }
        match self.frames.last_mut() {
            Some(Frame::Paragraph { inlines })
            | Some(Frame::Heading { inlines, .. })
            | Some(Frame::Item { inlines, .. }) => append_inline(inlines, inline),
            Some(Frame::Opaque { text, .. }) => text.push_str(inline.text()),
            Some(Frame::List { .. }) | None => {}
        }
    }

    fn finish(mut self) -> Vec<Block> {
        while let Some(frame) = self.frames.pop() {
            let end = self.source.len();
            self.close_frame(frame, end..end);
        }
        self.blocks
    }
}

/// Decode the entities the note endpoint would otherwise show verbatim.
/// `&amp;` goes last so `&amp;lt;` stays `&lt;`.
pub fn decode_html_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.replace("&#39;", "'")
            .replace("&quot;", "\"")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&nbsp;", " ")
            .replace("&amp;", "&"),
    )
}

/// One text fragment as it enters a token. The parser has already resolved
/// entities it recognises, so each fragment is decoded once here and never
/// again after merging. Non-breaking spaces become plain spaces.
fn normalize_text(fragment: &str) -> String {
    decode_html_entities(fragment).replace('\u{a0}', " ")
}

fn is_opaque(tag: &Tag<'_>) -> bool {
    matches!(
        tag,
        Tag::BlockQuote | Tag::CodeBlock(_) | Tag::Table(_) | Tag::FootnoteDefinition(_)
    )
}

fn append_inline(inlines: &mut Vec<Inline>, inline: Inline) {
    if let Inline::Text(fragment) = &inline {
        if let Some(Inline::Text(previous)) = inlines.last_mut() {
            previous.push_str(fragment);
            return;
        }
    }
    inlines.push(inline);
}

fn ensure_newline(text: &mut String) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
}

/// Block ranges may or may not include their trailing newline, so count it either way.
fn blank_line_between(source: &str, previous_end: usize, start: usize) -> bool {
    let Some(gap) = source.get(previous_end..start) else {
        return false;
    };
    let trailing = source
        .get(..previous_end)
        .map_or(false, |head| head.ends_with('\n'));
    gap.matches('\n').count() + usize::from(trailing) >= 2
}
