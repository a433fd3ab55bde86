use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

use substack_relay_core::convert::{
    build_simple_note, compose_note, parse_markdown_to_note, render_blocks, NoteError,
    NoteFormat,
};
use substack_relay_core::markdown::{Block, Inline, ListItem};
use substack_relay_core::note::{
    NoteBuilder, NoteCanvas, NoteDocument, ParagraphHandle, Segment, SegmentStyle,
};

/// Canvas that records every builder call in order.
#[derive(Default)]
struct RecordingCanvas {
    calls: Rc<RefCell<Vec<String>>>,
}

struct RecordingHandle {
    calls: Rc<RefCell<Vec<String>>>,
}

impl RecordingHandle {
    fn record(self, call: String) -> Self {
        self.calls.borrow_mut().push(call);
        self
    }
}

impl NoteCanvas for RecordingCanvas {
    type Paragraph = RecordingHandle;

    fn paragraph(&self) -> RecordingHandle {
        self.calls.borrow_mut().push("paragraph".to_string());
        RecordingHandle {
            calls: self.calls.clone(),
        }
    }
}

impl ParagraphHandle for RecordingHandle {
    fn text(self, text: &str) -> Self {
        self.record(format!("text:{text}"))
    }

    fn bold(self, text: &str) -> Self {
        self.record(format!("bold:{text}"))
    }

    fn italic(self, text: &str) -> Self {
        self.record(format!("italic:{text}"))
    }

    fn code(self, text: &str) -> Self {
        self.record(format!("code:{text}"))
    }

    fn paragraph(self) -> Self {
        self.record("paragraph".to_string())
    }
}

fn markdown(body: &str) -> NoteDocument {
    compose_note(body, NoteFormat::Markdown).expect("markdown body should convert")
}

fn plain(text: &str) -> Segment {
    Segment::new(text, SegmentStyle::Plain)
}

fn bold(text: &str) -> Segment {
    Segment::new(text, SegmentStyle::Bold)
}

#[test]
fn test_plain_paragraph_produces_one_paragraph() {
    let doc = markdown("Hello from the relay");
    assert_eq!(doc.paragraphs.len(), 1);
    assert_eq!(doc.paragraphs[0].segments, vec![plain("Hello from the relay")]);
}

#[test]
fn test_blank_bodies_are_rejected_before_parsing() {
    let canvas = NoteBuilder::new();
    assert_eq!(
        parse_markdown_to_note("", &canvas).err(),
        Some(NoteError::EmptyBody)
    );
    assert_eq!(
        parse_markdown_to_note("   \n\t ", &canvas).err(),
        Some(NoteError::EmptyBody)
    );
}

#[test]
fn test_empty_headings_have_no_meaningful_content() {
    let canvas = NoteBuilder::new();
    assert_eq!(
        parse_markdown_to_note("## \n### \n#### ", &canvas).err(),
        Some(NoteError::NoMeaningfulContent)
    );
}

#[test]
fn test_bold_span_splits_paragraph_into_segments() {
    let doc = markdown("This is **bold** text");
    assert_eq!(doc.paragraphs.len(), 1);
    assert_eq!(
        doc.paragraphs[0].segments,
        vec![plain("This is "), bold("bold"), plain(" text")]
    );
}

#[test]
fn test_bullet_list_items_become_prefixed_paragraphs() {
    let doc = markdown("- a\n- b\n- c");
    let texts: Vec<String> = doc.paragraphs.iter().map(|p| p.plain_text()).collect();
    assert_eq!(texts, vec!["• a", "• b", "• c"]);
    assert_eq!(doc.paragraphs[0].segments, vec![plain("• "), plain("a")]);
}

#[test]
fn test_ordered_list_numbers_ignore_source_numerals() {
    let doc = markdown("1. a\n2. b");
    let texts: Vec<String> = doc.paragraphs.iter().map(|p| p.plain_text()).collect();
    assert_eq!(texts, vec!["1. a", "2. b"]);

    let doc = markdown("7. first\n9. second");
    let texts: Vec<String> = doc.paragraphs.iter().map(|p| p.plain_text()).collect();
    assert_eq!(texts, vec!["1. first", "2. second"]);
}

#[test]
fn test_heading_renders_as_bold_paragraph() {
    let doc = markdown("## Hello");
    assert_eq!(doc.paragraphs.len(), 1);
    assert_eq!(doc.paragraphs[0].segments, vec![bold("Hello")]);
}

#[test]
fn test_entities_are_decoded_exactly_once() {
    assert_eq!(markdown("Fish &amp; chips").plain_text(), "Fish & chips");
    assert_eq!(markdown("Fish &amp;amp; chips").plain_text(), "Fish &amp; chips");
    assert_eq!(
        markdown("a &amp;lt;b&amp;gt; c").plain_text(),
        "a &lt;b&gt; c"
    );
    assert_eq!(markdown("**&amp;lt;**").paragraphs[0].segments, vec![bold("&lt;")]);
}

#[test]
fn test_code_spans_stay_literal() {
    let doc = markdown("x `&amp;` y");
    assert_eq!(
        doc.paragraphs[0].segments,
        vec![
            plain("x "),
            Segment::new("&amp;", SegmentStyle::Code),
            plain(" y"),
        ]
    );
}

#[test]
fn test_non_breaking_space_becomes_plain_space() {
    assert_eq!(markdown("a&nbsp;b").plain_text(), "a b");
}

#[test]
fn test_link_renders_text_and_target() {
    let doc = markdown("Built with [n8n](https://n8n.io)");
    assert_eq!(
        doc.paragraphs[0].segments,
        vec![plain("Built with "), plain("n8n (https://n8n.io)")]
    );
}

#[test]
fn test_inline_styles_map_to_marks() {
    let doc = markdown("*soft* and `code`");
    assert_eq!(
        doc.paragraphs[0].segments,
        vec![
            Segment::new("soft", SegmentStyle::Italic),
            plain(" and "),
            Segment::new("code", SegmentStyle::Code),
        ]
    );
}

#[test]
fn test_mixed_document_keeps_block_order() {
    let doc = markdown("# Title\n\nIntro line.\n\n- one\n- two\n\n> quoted");
    let texts: Vec<String> = doc.paragraphs.iter().map(|p| p.plain_text()).collect();
    assert_eq!(texts, vec!["Title", "Intro line.", "• one", "• two", "quoted"]);
}

#[test]
fn test_only_non_empty_paragraph_contributes() {
    let blocks = vec![
        Block::Paragraph {
            inlines: vec![Inline::Text("   ".to_string())],
        },
        Block::Space,
        Block::Paragraph {
            inlines: vec![Inline::Text("kept".to_string())],
        },
    ];
    let canvas = RecordingCanvas::default();
    let calls = canvas.calls.clone();
    render_blocks(&blocks, &canvas).expect("one paragraph has content");
    assert_eq!(*calls.borrow(), vec!["paragraph", "text:kept"]);
}

#[test]
fn test_marker_only_paragraph_is_skipped() {
    let blocks = vec![
        Block::Paragraph {
            inlines: vec![Inline::Text("1. 2.".to_string())],
        },
        Block::Paragraph {
            inlines: vec![Inline::Text("after".to_string())],
        },
    ];
    let document = render_blocks(&blocks, &NoteBuilder::new())
        .expect("second paragraph has content")
        .finish();
    assert_eq!(document.plain_text(), "after");
}

#[test]
fn test_builder_calls_are_chained_in_document_order() {
    let canvas = RecordingCanvas::default();
    let calls = canvas.calls.clone();
    parse_markdown_to_note("## Head\n\nBody **b**\n\n1. x", &canvas).expect("converts");
    assert_eq!(
        *calls.borrow(),
        vec![
            "paragraph",
            "bold:Head",
            "paragraph",
            "text:Body ",
            "bold:b",
            "paragraph",
            "text:1. ",
            "text:x",
        ]
    );
}

#[test]
fn test_empty_list_items_are_skipped_and_not_counted() {
    let item = |text: &str| ListItem {
        blocks: vec![Block::Paragraph {
            inlines: vec![Inline::Text(text.to_string())],
        }],
    };
    let blocks = vec![Block::List {
        ordered: true,
        items: vec![item("first"), ListItem::default(), item("  "), item("third")],
    }];
    let doc = render_blocks(&blocks, &NoteBuilder::new())
        .expect("two items have content")
        .finish();
    let texts: Vec<String> = doc.paragraphs.iter().map(|p| p.plain_text()).collect();
    assert_eq!(texts, vec!["1. first", "2. third"]);
}

#[test]
fn test_simple_format_keeps_markdown_literal() {
    let doc = compose_note("**not bold**\n\nsecond &amp; last", NoteFormat::Simple)
        .expect("simple body converts");
    assert_eq!(doc.paragraphs.len(), 2);
    assert_eq!(doc.paragraphs[0].segments, vec![plain("**not bold**")]);
    assert_eq!(doc.paragraphs[1].segments, vec![plain("second & last")]);
}

#[test]
fn test_simple_note_rejects_blank_body() {
    assert_eq!(
        build_simple_note(" \n ", &NoteBuilder::new()).err(),
        Some(NoteError::EmptyBody)
    );
}

#[test]
fn test_body_json_uses_prosemirror_shape() {
    let doc = markdown("Hi **there**");
    let json = doc.to_body_json();
    assert_eq!(
        json,
        serde_json::json!({
            "type": "doc",
            "attrs": { "schemaVersion": "v1" },
            "content": [{
                "type": "paragraph",
                "content": [
                    { "type": "text", "text": "Hi " },
                    { "type": "text", "text": "there", "marks": [{ "type": "bold" }] },
                ],
            }],
        })
    );
}
