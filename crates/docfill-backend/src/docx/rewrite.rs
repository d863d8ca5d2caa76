//! Streaming rewrite of `word/document.xml`.
//!
//! Events are copied through verbatim until a `w:p` opens. The paragraph
//! subtree is captured, its runs are flattened, substituted, and
//! re-segmented, and the transformed paragraph is emitted in place. Each
//! paragraph is processed in isolation: a paragraph that cannot be
//! processed is emitted unchanged and its siblings are unaffected.

use std::sync::Arc;

use docfill_core::{CharFormat, DocfillError, Placeholder, RenderOptions, Result, RunProps};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use super::resegment::{resegment, write_run};
use super::{
    check_val_off, flatten_runs, get_attr, substitute, ParagraphChild, ParagraphData, RunData,
    RunPiece,
};

fn parse_err(reader: &Reader<&[u8]>, err: impl std::fmt::Display) -> DocfillError {
    DocfillError::InvalidPackage(format!(
        "document.xml parse error at byte {}: {err}",
        reader.buffer_position()
    ))
}

fn write_err(err: impl std::fmt::Display) -> DocfillError {
    DocfillError::InvalidPackage(format!("failed to serialize document.xml: {err}"))
}

/// Rewrite the main document part, substituting placeholder tokens in
/// every paragraph while leaving all other markup untouched.
pub fn rewrite_document_xml(
    xml: &str,
    placeholders: &[Placeholder],
    options: &RenderOptions,
) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:p" => {
                let start = e.to_owned();
                let paragraph = parse_paragraph(&mut reader, start)?;
                match process_paragraph(&paragraph, placeholders, options) {
                    Ok(bytes) => writer.get_mut().extend_from_slice(&bytes),
                    Err(err) => {
                        log::warn!("paragraph left unchanged after processing failure: {err}");
                        writer.get_mut().extend_from_slice(&paragraph_raw(&paragraph)?);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(event) => writer.write_event(event).map_err(write_err)?,
            Err(err) => return Err(parse_err(&reader, err)),
        }
        buf.clear();
    }
    String::from_utf8(writer.into_inner()).map_err(|err| {
        DocfillError::InvalidPackage(format!("document.xml is not UTF-8 after rewrite: {err}"))
    })
}

/// Capture a `w:p` subtree: runs parsed, everything else verbatim.
fn parse_paragraph(reader: &mut Reader<&[u8]>, start: BytesStart<'static>) -> Result<ParagraphData> {
    let mut children = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:r" => {
                let run_start = e.to_owned();
                children.push(ParagraphChild::Run(parse_run(reader, run_start)?));
            }
            Ok(Event::Start(e)) => {
                let child_start = e.to_owned();
                children.push(ParagraphChild::Node(capture_subtree(reader, child_start)?));
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"w:r" => {
                // An empty run: no text, no object. Cleanup will drop it.
                children.push(ParagraphChild::Run(RunData {
                    raw: serialize_event(&Event::Empty(e.to_owned()))?,
                    format: CharFormat::plain(),
                    pieces: Vec::new(),
                    has_object: false,
                }));
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"w:p" => break,
            Ok(Event::Eof) => {
                return Err(DocfillError::InvalidPackage(
                    "unexpected end of document.xml inside w:p".to_string(),
                ));
            }
            Ok(event) => children.push(ParagraphChild::Node(serialize_event(&event)?)),
            Err(err) => return Err(parse_err(reader, err)),
        }
        buf.clear();
    }
    Ok(ParagraphData { start, children })
}

/// Copy an element subtree verbatim, from its start event to the matching
/// end tag.
fn capture_subtree(reader: &mut Reader<&[u8]>, start: BytesStart<'static>) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Start(start)).map_err(write_err)?;

    let mut depth = 1usize;
    let mut buf = Vec::new();
    while depth > 0 {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => {
                return Err(DocfillError::InvalidPackage(
                    "unexpected end of document.xml inside a paragraph child".to_string(),
                ));
            }
            Ok(event) => {
                match &event {
                    Event::Start(_) => depth += 1,
                    Event::End(_) => depth -= 1,
                    _ => {}
                }
                writer.write_event(event).map_err(write_err)?;
            }
            Err(err) => return Err(parse_err(reader, err)),
        }
        buf.clear();
    }
    Ok(writer.into_inner())
}

/// Flatten, substitute, and re-segment one captured paragraph.
///
/// Non-run children and object-carrying runs are emitted first, in their
/// original order; the re-segmented runs follow. Text-only runs are
/// dropped, replaced by the emitted groups. A paragraph without runs
/// passes through unchanged.
fn process_paragraph(
    paragraph: &ParagraphData,
    placeholders: &[Placeholder],
    options: &RenderOptions,
) -> Result<Vec<u8>> {
    let runs = paragraph.runs();
    if runs.is_empty() {
        return paragraph_raw(paragraph);
    }
    let flattened = flatten_runs(&runs);
    let substituted = substitute(&flattened, placeholders);
    let groups = resegment(&substituted);

    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Start(paragraph.start.clone()))
        .map_err(write_err)?;
    for child in &paragraph.children {
        match child {
            ParagraphChild::Node(raw) => writer.get_mut().extend_from_slice(raw),
            ParagraphChild::Run(run) if run.has_object => {
                writer.get_mut().extend_from_slice(&run.raw);
            }
            ParagraphChild::Run(_) => {}
        }
    }
    for group in &groups {
        write_run(&mut writer, group, options)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("w:p")))
        .map_err(write_err)?;
    Ok(writer.into_inner())
}

/// The paragraph exactly as captured, for pass-through.
fn paragraph_raw(paragraph: &ParagraphData) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Start(paragraph.start.clone()))
        .map_err(write_err)?;
    for child in &paragraph.children {
        match child {
            ParagraphChild::Node(raw) => writer.get_mut().extend_from_slice(raw),
            ParagraphChild::Run(run) => writer.get_mut().extend_from_slice(&run.raw),
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new("w:p")))
        .map_err(write_err)?;
    Ok(writer.into_inner())
}

/// Scalar formatting flags derived from a `w:rPr` block.
#[derive(Debug, Default)]
struct RunFlags {
    bold: bool,
    italic: bool,
    underline: bool,
    color: Option<String>,
}

fn flag_element(e: &BytesStart, flags: &mut RunFlags) {
    match e.name().as_ref() {
        b"w:b" => flags.bold = !check_val_off(e),
        b"w:i" => flags.italic = !check_val_off(e),
        b"w:u" => flags.underline = get_attr(e, b"w:val").map_or(true, |v| v != "none"),
        b"w:color" => flags.color = get_attr(e, b"w:val"),
        _ => {}
    }
}

/// Parse a `w:r` subtree: capture the raw markup, the `w:rPr` block, the
/// formatting flags, the text/tab pieces, and whether an object is
/// embedded.
fn parse_run(reader: &mut Reader<&[u8]>, start: BytesStart<'static>) -> Result<RunData> {
    let mut raw = Writer::new(Vec::new());
    raw.write_event(Event::Start(start)).map_err(write_err)?;

    let mut pieces = Vec::new();
    let mut has_object = false;
    let mut format = CharFormat::plain();
    let mut props: Option<Arc<str>> = None;

    // Open descendant elements below w:r; 0 means directly inside the run.
    let mut depth = 0usize;
    let mut in_text = false;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if depth == 0 && e.name().as_ref() == b"w:rPr" {
                    let (xml, flags) = parse_run_props(reader, e.to_owned(), &mut raw)?;
                    format.bold = flags.bold;
                    format.italic = flags.italic;
                    format.underline = flags.underline;
                    format.color = flags.color;
                    props = Some(Arc::from(xml.as_str()));
                } else {
                    match e.name().as_ref() {
                        b"w:t" if depth == 0 => in_text = true,
                        b"w:tab" if depth == 0 => pieces.push(RunPiece::Tab),
                        b"w:drawing" | b"w:pict" | b"w:object" => has_object = true,
                        _ => {}
                    }
                    depth += 1;
                    raw.write_event(Event::Start(e.to_owned())).map_err(write_err)?;
                }
            }
            Ok(Event::Empty(e)) => {
                match e.name().as_ref() {
                    b"w:tab" if depth == 0 => pieces.push(RunPiece::Tab),
                    b"w:drawing" | b"w:pict" | b"w:object" => has_object = true,
                    b"w:rPr" if depth == 0 => props = Some(Arc::from("<w:rPr/>")),
                    _ => {}
                }
                raw.write_event(Event::Empty(e.to_owned())).map_err(write_err)?;
            }
            Ok(Event::Text(e)) => {
                if in_text {
                    let text = e.unescape().map_err(|err| {
                        DocfillError::InvalidPackage(format!("bad text node in run: {err}"))
                    })?;
                    pieces.push(RunPiece::Text(text.into_owned()));
                }
                raw.write_event(Event::Text(e.to_owned())).map_err(write_err)?;
            }
            Ok(Event::End(e)) => {
                if depth == 0 {
                    // Closing w:r.
                    raw.write_event(Event::End(e.to_owned())).map_err(write_err)?;
                    break;
                }
                depth -= 1;
                if depth == 0 && e.name().as_ref() == b"w:t" {
                    in_text = false;
                }
                raw.write_event(Event::End(e.to_owned())).map_err(write_err)?;
            }
            Ok(Event::Eof) => {
                return Err(DocfillError::InvalidPackage(
                    "unexpected end of document.xml inside w:r".to_string(),
                ));
            }
            Ok(event) => raw.write_event(event).map_err(write_err)?,
            Err(err) => return Err(parse_err(reader, err)),
        }
        buf.clear();
    }

    format.props = match props {
        Some(xml) => RunProps::Preserved(xml),
        None => RunProps::Synthesized,
    };
    Ok(RunData {
        raw: raw.into_inner(),
        format,
        pieces,
        has_object,
    })
}

/// Capture a `w:rPr` subtree verbatim (into both the run's raw markup and
/// its own clone) while deriving the scalar flags from its direct children.
fn parse_run_props(
    reader: &mut Reader<&[u8]>,
    start: BytesStart<'static>,
    raw: &mut Writer<Vec<u8>>,
) -> Result<(String, RunFlags)> {
    let mut props = Writer::new(Vec::new());
    raw.write_event(Event::Start(start.clone())).map_err(write_err)?;
    props.write_event(Event::Start(start)).map_err(write_err)?;

    let mut flags = RunFlags::default();
    let mut depth = 1usize;
    let mut buf = Vec::new();
    while depth > 0 {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => {
                return Err(DocfillError::InvalidPackage(
                    "unexpected end of document.xml inside w:rPr".to_string(),
                ));
            }
            Ok(event) => {
                match &event {
                    Event::Start(e) => {
                        if depth == 1 {
                            flag_element(e, &mut flags);
                        }
                        depth += 1;
                    }
                    Event::Empty(e) => {
                        if depth == 1 {
                            flag_element(e, &mut flags);
                        }
                    }
                    Event::End(_) => depth -= 1,
                    _ => {}
                }
                raw.write_event(event.clone()).map_err(write_err)?;
                props.write_event(event).map_err(write_err)?;
            }
            Err(err) => return Err(parse_err(reader, err)),
        }
        buf.clear();
    }
    let xml = String::from_utf8(props.into_inner())
        .map_err(|err| DocfillError::InvalidPackage(format!("w:rPr is not UTF-8: {err}")))?;
    Ok((xml, flags))
}

/// Serialize a single event to its markup.
fn serialize_event(event: &Event) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(event.clone()).map_err(write_err)?;
    Ok(writer.into_inner())
}
