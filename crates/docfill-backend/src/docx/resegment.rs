//! Re-segmentation: regroup a character stream into minimal runs and
//! serialize them back to WordprocessingML.

use docfill_core::{CharFormat, DocfillError, FontPolicy, RenderOptions, Result, SizePolicy};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::FlatStream;

/// A maximal group of adjacent characters sharing one format tuple.
#[derive(Debug, Clone)]
pub(crate) struct RunGroup {
    pub text: String,
    pub format: CharFormat,
}

/// Group the stream into maximal same-format runs.
///
/// Adjacent characters extend the current group while their format tuples
/// match (scalar flags, color, block identity); any difference closes the
/// group. No two adjacent groups share a format tuple.
pub(crate) fn resegment(stream: &FlatStream) -> Vec<RunGroup> {
    let mut groups: Vec<RunGroup> = Vec::new();
    for (i, ch) in stream.chars.iter().enumerate() {
        let format = &stream.formats[i];
        match groups.last_mut() {
            Some(group) if group.format.same_run(format) => group.text.push(*ch),
            _ => groups.push(RunGroup {
                text: ch.to_string(),
                format: format.clone(),
            }),
        }
    }
    groups
}

fn write_err(err: impl std::fmt::Display) -> DocfillError {
    DocfillError::InvalidPackage(format!("failed to serialize document.xml: {err}"))
}

/// Emit one `w:r` for a group.
///
/// A preserved properties block is re-injected verbatim; otherwise a block
/// is synthesized from the render options and the group's scalar flags.
/// Tabs become `<w:tab/>`; consecutive other characters are emitted as one
/// space-preserving `w:t`.
pub(crate) fn write_run(
    writer: &mut Writer<Vec<u8>>,
    group: &RunGroup,
    options: &RenderOptions,
) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("w:r")))
        .map_err(write_err)?;

    match group.format.props.preserved_xml() {
        Some(props) => writer.get_mut().extend_from_slice(props.as_bytes()),
        None => write_synthesized_props(writer, &group.format, options)?,
    }

    let mut pending = String::new();
    for ch in group.text.chars() {
        if ch == '\t' {
            flush_text(writer, &mut pending)?;
            writer
                .write_event(Event::Empty(BytesStart::new("w:tab")))
                .map_err(write_err)?;
        } else {
            pending.push(ch);
        }
    }
    flush_text(writer, &mut pending)?;

    writer
        .write_event(Event::End(BytesEnd::new("w:r")))
        .map_err(write_err)?;
    Ok(())
}

fn flush_text(writer: &mut Writer<Vec<u8>>, pending: &mut String) -> Result<()> {
    if pending.is_empty() {
        return Ok(());
    }
    let mut t = BytesStart::new("w:t");
    // Substituted values may start or end with meaningful spaces.
    t.push_attribute(("xml:space", "preserve"));
    writer.write_event(Event::Start(t)).map_err(write_err)?;
    writer
        .write_event(Event::Text(BytesText::new(pending)))
        .map_err(write_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("w:t")))
        .map_err(write_err)?;
    pending.clear();
    Ok(())
}

fn write_synthesized_props(
    writer: &mut Writer<Vec<u8>>,
    format: &CharFormat,
    options: &RenderOptions,
) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("w:rPr")))
        .map_err(write_err)?;

    if let FontPolicy::Named(family) = &options.font {
        let mut fonts = BytesStart::new("w:rFonts");
        fonts.push_attribute(("w:ascii", family.as_str()));
        fonts.push_attribute(("w:hAnsi", family.as_str()));
        fonts.push_attribute(("w:cs", family.as_str()));
        writer
            .write_event(Event::Empty(fonts))
            .map_err(write_err)?;
    }
    if let SizePolicy::Points(points) = options.font_size {
        let half_points = (points * 2).to_string();
        let mut size = BytesStart::new("w:sz");
        size.push_attribute(("w:val", half_points.as_str()));
        writer.write_event(Event::Empty(size)).map_err(write_err)?;
    }
    if format.bold {
        writer
            .write_event(Event::Empty(BytesStart::new("w:b")))
            .map_err(write_err)?;
    }
    if format.italic {
        writer
            .write_event(Event::Empty(BytesStart::new("w:i")))
            .map_err(write_err)?;
    }
    if format.underline {
        let mut underline = BytesStart::new("w:u");
        underline.push_attribute(("w:val", "single"));
        writer
            .write_event(Event::Empty(underline))
            .map_err(write_err)?;
    }
    if let Some(color) = &format.color {
        let mut elem = BytesStart::new("w:color");
        elem.push_attribute(("w:val", color.as_str()));
        writer.write_event(Event::Empty(elem)).map_err(write_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("w:rPr")))
        .map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docfill_core::RunProps;
    use std::sync::Arc;

    fn stream(pairs: Vec<(char, CharFormat)>) -> FlatStream {
        let mut s = FlatStream::default();
        for (ch, format) in pairs {
            s.push(ch, format);
        }
        s
    }

    fn bold() -> CharFormat {
        CharFormat {
            bold: true,
            ..CharFormat::plain()
        }
    }

    #[test]
    fn test_format_change_splits_into_two_runs() {
        let s = stream(vec![('A', bold()), ('B', CharFormat::plain())]);
        let groups = resegment(&s);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].text, "A");
        assert_eq!(groups[1].text, "B");
    }

    #[test]
    fn test_same_format_merges_into_one_run() {
        let s = stream(vec![('A', bold()), ('B', bold())]);
        let groups = resegment(&s);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].text, "AB");
    }

    #[test]
    fn test_distinct_preserved_blocks_never_merge() {
        let first = CharFormat {
            props: RunProps::Preserved(Arc::from("<w:rPr/>")),
            ..CharFormat::plain()
        };
        let second = CharFormat {
            props: RunProps::Preserved(Arc::from("<w:rPr/>")),
            ..CharFormat::plain()
        };
        let s = stream(vec![('A', first), ('B', second)]);
        assert_eq!(resegment(&s).len(), 2);
    }

    #[test]
    fn test_write_run_preserved_props_pass_verbatim() {
        let format = CharFormat {
            bold: true,
            props: RunProps::Preserved(Arc::from("<w:rPr><w:b/></w:rPr>")),
            ..CharFormat::plain()
        };
        let group = RunGroup {
            text: "аб".to_string(),
            format,
        };
        let mut writer = Writer::new(Vec::new());
        write_run(&mut writer, &group, &RenderOptions::preserve()).unwrap();
        let xml = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(
            xml,
            "<w:r><w:rPr><w:b/></w:rPr><w:t xml:space=\"preserve\">аб</w:t></w:r>"
        );
    }

    #[test]
    fn test_write_run_synthesizes_props_with_options() {
        let group = RunGroup {
            text: "x".to_string(),
            format: CharFormat {
                bold: true,
                underline: true,
                ..CharFormat::plain()
            },
        };
        let options = RenderOptions::preserve()
            .with_font("Arial")
            .with_font_size(12);
        let mut writer = Writer::new(Vec::new());
        write_run(&mut writer, &group, &options).unwrap();
        let xml = String::from_utf8(writer.into_inner()).unwrap();
        assert!(xml.contains("<w:rFonts w:ascii=\"Arial\" w:hAnsi=\"Arial\" w:cs=\"Arial\"/>"));
        assert!(xml.contains("<w:sz w:val=\"24\"/>"));
        assert!(xml.contains("<w:b/>"));
        assert!(xml.contains("<w:u w:val=\"single\"/>"));
    }

    #[test]
    fn test_write_run_emits_tabs_as_elements() {
        let group = RunGroup {
            text: "a\tb".to_string(),
            format: CharFormat::plain(),
        };
        let mut writer = Writer::new(Vec::new());
        write_run(&mut writer, &group, &RenderOptions::preserve()).unwrap();
        let xml = String::from_utf8(writer.into_inner()).unwrap();
        assert!(xml.contains("<w:t xml:space=\"preserve\">a</w:t><w:tab/>"));
        assert!(xml.ends_with("<w:t xml:space=\"preserve\">b</w:t></w:r>"));
    }
}
