// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A small owned XML tree.
//!
//! FHIR XML is read into a generic element tree so that everything the model
//! does not cover survives a rewrite. Elements whose content is pure markup
//! are re-indented; mixed content (narrative XHTML) is written back inline.

use crate::document::DocumentError;

use std::borrow::Cow;
use std::fmt::Display;
use std::io::Cursor;

use quick_xml::escape::partial_escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};

const INDENT: &str = "  ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

fn xml_error(e: impl Display) -> DocumentError {
    DocumentError::Xml(e.to_string())
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// `<name value="..."/>`, the FHIR encoding of a primitive.
    pub fn with_value(name: &str, value: &str) -> Self {
        let mut e = Self::new(name);
        e.set_attribute("value", value);
        e
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attribute(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |e| e.name == name)
    }

    pub fn children_named_mut<'a>(
        &'a mut self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a mut Element> {
        self.children.iter_mut().filter_map(move |c| match c {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|c| match c {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// The `value` attribute of the first child called `name`.
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(|c| c.attribute("value"))
    }

    pub fn remove_children(&mut self, name: &str) -> usize {
        let before = self.children.len();
        self.children
            .retain(|c| !matches!(c, Node::Element(e) if e.name == name));
        before - self.children.len()
    }

    /// Inserts `new` in front of the first child whose name is in `before`,
    /// or at the end when there is none.
    pub fn insert_before(&mut self, new: Vec<Element>, before: &[&str]) {
        let at = self
            .children
            .iter()
            .position(|c| matches!(c, Node::Element(e) if before.contains(&e.name.as_str())))
            .unwrap_or(self.children.len());
        self.children
            .splice(at..at, new.into_iter().map(Node::Element));
    }

    fn is_mixed(&self) -> bool {
        self.children.iter().any(|c| match c {
            Node::Text(t) => !t.trim().is_empty(),
            Node::CData(_) => true,
            _ => false,
        })
    }

    fn start_tag(&self) -> BytesStart<'_> {
        let mut start = BytesStart::new(self.name.as_str());
        for (k, v) in &self.attributes {
            start.push_attribute(Attribute {
                key: QName(k.as_bytes()),
                value: Cow::Owned(escape_attribute(v).into_bytes()),
            });
        }
        start
    }
}

// Line breaks and tabs in attribute values would be normalized to spaces by
// the next reader, so they are written as character references.
fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            c => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub declaration: bool,
    /// Comments in front of the root element.
    pub prolog: Vec<String>,
    pub root: Element,
}

impl XmlDocument {
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_str(text);
        let mut stack: Vec<Element> = vec![];
        let mut root: Option<Element> = None;
        let mut prolog = vec![];
        let mut declaration = false;

        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Decl(_) => declaration = true,
                Event::Start(e) => stack.push(Self::open(&e)?),
                Event::Empty(e) => {
                    let element = Self::open(&e)?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| xml_error("unbalanced end tag"))?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Event::Text(t) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = t.unescape().map_err(xml_error)?;
                        parent.children.push(Node::Text(text.into_owned()));
                    }
                }
                Event::CData(c) => {
                    if let Some(parent) = stack.last_mut() {
                        parent
                            .children
                            .push(Node::CData(String::from_utf8_lossy(&c).into_owned()));
                    }
                }
                Event::Comment(c) => {
                    let text = String::from_utf8_lossy(&c).into_owned();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Comment(text)),
                        None if root.is_none() => prolog.push(text),
                        None => (),
                    }
                }
                Event::Eof => break,
                _ => (),
            }
        }

        if !stack.is_empty() {
            return Err(xml_error("unexpected end of document"));
        }
        let root = root.ok_or_else(|| xml_error("document has no root element"))?;
        Ok(Self {
            declaration,
            prolog,
            root,
        })
    }

    fn open(start: &BytesStart) -> Result<Element, DocumentError> {
        let mut element = Element::new(&String::from_utf8_lossy(start.name().as_ref()));
        for attr in start.attributes() {
            let attr = attr.map_err(xml_error)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(xml_error)?.into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }

    fn attach(
        stack: &mut [Element],
        root: &mut Option<Element>,
        element: Element,
    ) -> Result<(), DocumentError> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(Node::Element(element)),
            None if root.is_none() => *root = Some(element),
            None => return Err(xml_error("more than one root element")),
        }
        Ok(())
    }

    pub fn to_xml_string(&self) -> Result<String, DocumentError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        if self.declaration {
            writer
                .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
                .map_err(xml_error)?;
            newline(&mut writer, 0)?;
        }
        for comment in &self.prolog {
            writer
                .write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))
                .map_err(xml_error)?;
            newline(&mut writer, 0)?;
        }
        write_element(&mut writer, &self.root, Some(0))?;
        let bytes = writer.into_inner().into_inner();
        String::from_utf8(bytes).map_err(xml_error)
    }
}

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn newline(writer: &mut XmlWriter, depth: usize) -> Result<(), DocumentError> {
    let ws = format!("\n{}", INDENT.repeat(depth));
    writer
        .write_event(Event::Text(BytesText::from_escaped(ws.as_str())))
        .map_err(xml_error)
}

// `depth` is None inside mixed content, where whitespace is significant.
fn write_element(
    writer: &mut XmlWriter,
    element: &Element,
    depth: Option<usize>,
) -> Result<(), DocumentError> {
    if element.children.iter().all(|c| matches!(c, Node::Text(t) if t.trim().is_empty())) {
        return writer
            .write_event(Event::Empty(element.start_tag()))
            .map_err(xml_error);
    }
    writer
        .write_event(Event::Start(element.start_tag()))
        .map_err(xml_error)?;

    let inner = match depth {
        Some(d) if !element.is_mixed() => Some(d + 1),
        _ => None,
    };
    for child in &element.children {
        if let (Node::Text(_), Some(_)) = (child, inner) {
            continue;
        }
        if let Some(d) = inner {
            newline(writer, d)?;
        }
        match child {
            Node::Element(e) => write_element(writer, e, inner)?,
            Node::Text(t) => writer
                .write_event(Event::Text(BytesText::from_escaped(partial_escape(t))))
                .map_err(xml_error)?,
            Node::CData(t) => writer
                .write_event(Event::CData(BytesCData::new(t.as_str())))
                .map_err(xml_error)?,
            Node::Comment(t) => writer
                .write_event(Event::Comment(BytesText::from_escaped(t.as_str())))
                .map_err(xml_error)?,
        }
    }
    if let (Some(d), Some(_)) = (depth, inner) {
        newline(writer, d)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(xml_error)
}
