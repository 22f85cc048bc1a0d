//! # Relationships Module
//!
//! Parsing e riscrittura delle parti XML di un pacchetto OOXML che servono a
//! trovare le immagini: `.rels`, `xl/workbook.xml`, `[Content_Types].xml`.

use crate::error::Result;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const ROOT_RELS_PART: &str = "_rels/.rels";

/// One `<Relationship>` entry of a `.rels` part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

impl Relationship {
    /// Match on the last segment of the type URI so transitional and strict namespaces both work
    pub fn is_type(&self, kind: &str) -> bool {
        self.rel_type.rsplit('/').next() == Some(kind)
    }
}

/// Name of the `.rels` part describing the relationships of `part`
pub fn rels_part_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None if part.is_empty() => ROOT_RELS_PART.to_string(),
        None => format!("_rels/{}.rels", part),
    }
}

/// Inverse of [`rels_part_for`]; `None` if `rels_part` is not a relationships part
pub fn source_part_for(rels_part: &str) -> Option<String> {
    let (dir, file) = match rels_part.rsplit_once('/') {
        Some((dir, file)) => (dir, file),
        None => return None,
    };
    let source_file = file.strip_suffix(".rels")?;
    let parent = if dir == "_rels" {
        ""
    } else {
        dir.strip_suffix("/_rels")?
    };

    Some(if parent.is_empty() {
        source_file.to_string()
    } else {
        format!("{}/{}", parent, source_file)
    })
}

/// Resolve a relationship target against the directory of its source part
pub fn resolve_target(source_part: &str, target: &str) -> String {
    let target = target.replace('\\', "/");
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

fn attribute_value(element: &BytesStart<'_>, local: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes().with_checks(false) {
        let attr = attr?;
        if attr.key.local_name().as_ref() == local {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Parse the `<Relationship>` entries of a `.rels` part, in document order
pub fn parse_relationships(xml: &[u8]) -> Result<Vec<Relationship>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut relationships = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) =
                    (attribute_value(&e, b"Id")?, attribute_value(&e, b"Target")?)
                {
                    let rel_type = attribute_value(&e, b"Type")?.unwrap_or_default();
                    let external = attribute_value(&e, b"TargetMode")?
                        .map(|mode| mode.eq_ignore_ascii_case("External"))
                        .unwrap_or(false);

                    relationships.push(Relationship {
                        id,
                        rel_type,
                        target,
                        external,
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

/// Parse `(name, relationship id)` of every `<sheet>` in `xl/workbook.xml`, in tab order
pub fn parse_sheets(xml: &[u8]) -> Result<Vec<(String, String)>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attribute_value(&e, b"name")?.unwrap_or_default();
                if let Some(rel_id) = attribute_value(&e, b"id")? {
                    sheets.push((name, rel_id));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

fn file_name(part: &str) -> &str {
    part.rsplit('/').next().unwrap_or(part)
}

/// Point every internal relationship of `source_part` that targets `from` at `to`.
///
/// Returns the rewritten XML, or `None` when no relationship pointed at `from`.
pub fn retarget_relationships(
    xml: &[u8],
    source_part: &str,
    from: &str,
    to: &str,
) -> Result<Option<Vec<u8>>> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 16));
    let mut buf = Vec::new();
    let mut changed = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Eof => break,
            Event::Empty(ref e) | Event::Start(ref e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let external = attribute_value(e, b"TargetMode")?
                    .map(|mode| mode.eq_ignore_ascii_case("External"))
                    .unwrap_or(false);
                let target = attribute_value(e, b"Target")?;

                match target {
                    Some(target)
                        if !external
                            && resolve_target(source_part, &target).eq_ignore_ascii_case(from) =>
                    {
                        let old_name = file_name(&target);
                        let new_target = format!(
                            "{}{}",
                            &target[..target.len() - old_name.len()],
                            file_name(to)
                        );
                        let rewritten = replace_attribute(e, b"Target", &new_target)?;
                        changed = true;
                        if matches!(event, Event::Empty(_)) {
                            writer.write_event(Event::Empty(rewritten))?;
                        } else {
                            writer.write_event(Event::Start(rewritten))?;
                        }
                    }
                    _ => writer.write_event(event.borrow())?,
                }
            }
            other => writer.write_event(other)?,
        }
        buf.clear();
    }

    Ok(changed.then(|| writer.into_inner()))
}

fn replace_attribute(element: &BytesStart<'_>, local: &[u8], value: &str) -> Result<BytesStart<'static>> {
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let mut rewritten = BytesStart::new(name);
    for attr in element.attributes().with_checks(false) {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if attr.key.local_name().as_ref() == local {
            rewritten.push_attribute((key.as_str(), value));
        } else {
            let current = attr.unescape_value()?.into_owned();
            rewritten.push_attribute((key.as_str(), current.as_str()));
        }
    }
    Ok(rewritten)
}

/// Make `[Content_Types].xml` describe a part renamed from `old_part` to `new_part`.
///
/// Adds a `<Default>` for the new extension when missing and moves any
/// `<Override>` registered for the old part name.
pub fn update_content_types(
    xml: &[u8],
    old_part: &str,
    new_part: &str,
    extension: &str,
    content_type: &str,
) -> Result<Vec<u8>> {
    let old_name = format!("/{}", old_part);
    let new_name = format!("/{}", new_part);

    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 96));
    let mut buf = Vec::new();
    let mut has_default = false;
    let mut default_tag: Option<String> = None;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Eof => break,
            Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == b"Default" => {
                if default_tag.is_none() {
                    default_tag = Some(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                }
                if attribute_value(e, b"Extension")?
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
                {
                    has_default = true;
                }
                writer.write_event(event.borrow())?;
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"Override" => {
                if attribute_value(e, b"PartName")?
                    .is_some_and(|name| name.eq_ignore_ascii_case(&old_name))
                {
                    let moved = replace_attribute(e, b"PartName", &new_name)?;
                    let moved = replace_attribute(&moved, b"ContentType", content_type)?;
                    writer.write_event(Event::Empty(moved))?;
                } else {
                    writer.write_event(event.borrow())?;
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == b"Types" => {
                if !has_default {
                    let tag = default_tag.clone().unwrap_or_else(|| "Default".to_string());
                    let mut default = BytesStart::new(tag);
                    default.push_attribute(("Extension", extension));
                    default.push_attribute(("ContentType", content_type));
                    writer.write_event(Event::Empty(default))?;
                    has_default = true;
                }
                writer.write_event(event.borrow())?;
            }
            other => writer.write_event(other)?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}
