//! Minimal XML element tree used as the editable representation of
//! descriptors.
//!
//! Scalar fields are attributes, nested structures are ordered child
//! elements. Text content is ignored. Parsing and serialization go through
//! `quick-xml`.

use std::fmt::Display;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::XmlError;

/// One XML element with its attributes and children, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Append a new child element and return it.
    pub fn add_element(&mut self, name: impl Into<String>) -> &mut Element {
        self.children.push(Element::new(name));
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Append an already built child element.
    pub fn push_child(&mut self, child: Element) {
        self.children.push(child);
    }

    // ------------------------------------------------------------------
    // Attribute setters
    // ------------------------------------------------------------------

    /// Set an attribute, replacing any previous value.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    /// Set a decimal integer attribute.
    pub fn set_int_attribute(&mut self, name: &str, value: impl Display) {
        self.set_attribute(name, value.to_string());
    }

    /// Set an integer attribute in `0x` hexadecimal with `digits` digits.
    pub fn set_hex_int_attribute(&mut self, name: &str, value: u64, digits: usize) {
        self.set_attribute(name, format!("0x{:0width$X}", value, width = digits));
    }

    /// Set an integer attribute only when the value is present.
    pub fn set_optional_int_attribute<T: Display>(&mut self, name: &str, value: Option<T>) {
        if let Some(v) = value {
            self.set_int_attribute(name, v);
        }
    }

    pub fn set_bool_attribute(&mut self, name: &str, value: bool) {
        self.set_attribute(name, if value { "true" } else { "false" });
    }

    /// Set an attribute containing a hexadecimal byte string.
    pub fn set_bytes_attribute(&mut self, name: &str, bytes: &[u8]) {
        self.set_attribute(name, hex::encode_upper(bytes));
    }

    // ------------------------------------------------------------------
    // Attribute getters
    // ------------------------------------------------------------------

    /// Raw attribute value.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn missing(&self, attribute: &str) -> XmlError {
        XmlError::MissingAttribute {
            element: self.name.clone(),
            attribute: attribute.to_string(),
        }
    }

    fn invalid(&self, attribute: &str, value: &str) -> XmlError {
        XmlError::InvalidAttribute {
            element: self.name.clone(),
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }

    /// Required string attribute.
    pub fn get_attribute(&self, name: &str) -> Result<&str, XmlError> {
        self.attribute(name).ok_or_else(|| self.missing(name))
    }

    /// Required integer attribute within `[min, max]`.
    pub fn get_int_attribute<T>(&self, name: &str, min: T, max: T) -> Result<T, XmlError>
    where
        T: Copy + Into<i128> + TryFrom<i128>,
    {
        match self.get_optional_int_attribute(name, min, max)? {
            Some(v) => Ok(v),
            None => Err(self.missing(name)),
        }
    }

    /// Integer attribute within `[min, max]`, `default` when absent.
    pub fn get_int_attribute_or<T>(&self, name: &str, default: T, min: T, max: T) -> Result<T, XmlError>
    where
        T: Copy + Into<i128> + TryFrom<i128>,
    {
        Ok(self
            .get_optional_int_attribute(name, min, max)?
            .unwrap_or(default))
    }

    /// Optional integer attribute within `[min, max]`.
    pub fn get_optional_int_attribute<T>(
        &self,
        name: &str,
        min: T,
        max: T,
    ) -> Result<Option<T>, XmlError>
    where
        T: Copy + Into<i128> + TryFrom<i128>,
    {
        let Some(text) = self.attribute(name) else {
            return Ok(None);
        };
        let value = parse_int(text).ok_or_else(|| self.invalid(name, text))?;
        let (min, max) = (min.into(), max.into());
        if value < min || value > max {
            return Err(XmlError::OutOfRange {
                element: self.name.clone(),
                attribute: name.to_string(),
                value,
                min,
                max,
            });
        }
        T::try_from(value)
            .map(Some)
            .map_err(|_| self.invalid(name, text))
    }

    /// Required boolean attribute.
    pub fn get_bool_attribute(&self, name: &str) -> Result<bool, XmlError> {
        let text = self.get_attribute(name)?;
        parse_bool(text).ok_or_else(|| self.invalid(name, text))
    }

    /// Boolean attribute, `default` when absent.
    pub fn get_bool_attribute_or(&self, name: &str, default: bool) -> Result<bool, XmlError> {
        match self.attribute(name) {
            None => Ok(default),
            Some(text) => parse_bool(text).ok_or_else(|| self.invalid(name, text)),
        }
    }

    /// Optional hexadecimal byte string attribute, at most `max_size` bytes.
    pub fn get_optional_bytes_attribute(
        &self,
        name: &str,
        max_size: usize,
    ) -> Result<Option<Vec<u8>>, XmlError> {
        let Some(text) = self.attribute(name) else {
            return Ok(None);
        };
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = hex::decode(&compact).map_err(|_| self.invalid(name, text))?;
        if bytes.len() > max_size {
            return Err(XmlError::OutOfRange {
                element: self.name.clone(),
                attribute: name.to_string(),
                value: bytes.len() as i128,
                min: 0,
                max: max_size as i128,
            });
        }
        Ok(Some(bytes))
    }

    /// Required hexadecimal byte string attribute.
    pub fn get_bytes_attribute(&self, name: &str, max_size: usize) -> Result<Vec<u8>, XmlError> {
        self.get_optional_bytes_attribute(name, max_size)?
            .ok_or_else(|| self.missing(name))
    }

    // ------------------------------------------------------------------
    // Children
    // ------------------------------------------------------------------

    /// Children with a given element name, in document order.
    pub fn children_named<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a Element> + 'n
    where
        'a: 'n,
    {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Children with a given name, checking that there are `min..=max` of them.
    pub fn get_children(&self, name: &str, min: usize, max: usize) -> Result<Vec<&Element>, XmlError> {
        let found: Vec<&Element> = self.children.iter().filter(|c| c.name == name).collect();
        if found.len() < min || found.len() > max {
            return Err(XmlError::Cardinality {
                element: self.name.clone(),
                child: name.to_string(),
                min,
                max,
                actual: found.len(),
            });
        }
        Ok(found)
    }

    /// Zero or one child with a given name.
    pub fn get_optional_child(&self, name: &str) -> Result<Option<&Element>, XmlError> {
        Ok(self.get_children(name, 0, 1)?.into_iter().next())
    }

    // ------------------------------------------------------------------
    // Text form
    // ------------------------------------------------------------------

    /// Parse a document and return its root element.
    pub fn parse(text: &str) -> Result<Element, XmlError> {
        let mut reader = Reader::from_str(text);
        reader.trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => stack.push(element_from_start(&e)?),
                Ok(Event::Empty(e)) => {
                    let element = element_from_start(&e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| XmlError::Syntax("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(XmlError::Syntax(e.to_string())),
            }
        }

        if !stack.is_empty() {
            return Err(XmlError::Syntax("unterminated element".to_string()));
        }
        root.ok_or_else(|| XmlError::Syntax("no root element".to_string()))
    }

    /// Serialize as an indented UTF-8 document.
    pub fn to_xml_string(&self) -> String {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        // Writing into a Vec cannot fail.
        let _ = writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)));
        let _ = self.write_to(&mut writer);
        String::from_utf8_lossy(&writer.into_inner()).into_owned()
    }

    fn write_to(&self, writer: &mut Writer<Vec<u8>>) -> quick_xml::Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (k, v) in &self.attributes {
            start.push_attribute((k.as_str(), v.as_str()));
        }
        if self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
        } else {
            writer.write_event(Event::Start(start))?;
            for child in &self.children {
                child.write_to(writer)?;
            }
            writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        }
        Ok(())
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, XmlError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Syntax(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::Syntax(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(XmlError::Syntax("multiple root elements".to_string())),
    }
    Ok(())
}

/// Parse a decimal or `0x` hexadecimal integer, ignoring `,` and `_`
/// digit separators.
pub fn parse_int(text: &str) -> Option<i128> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',' && *c != '_').collect();
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };
    let value = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i128::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i128>().ok()?,
    };
    Some(if negative { -value } else { value })
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int(" 0x1F "), Some(31));
        assert_eq!(parse_int("1,000,000"), Some(1_000_000));
        assert_eq!(parse_int("-3"), Some(-3));
        assert_eq!(parse_int("abc"), None);
    }

    #[test]
    fn test_int_attribute_range() {
        let mut e = Element::new("test");
        e.set_int_attribute("a", 300);
        e.set_hex_int_attribute("b", 0x1F, 2);
        assert_eq!(e.attribute("b"), Some("0x1F"));
        assert_eq!(e.get_int_attribute::<u8>("b", 0, 0xFF).unwrap(), 0x1F);
        let err = e.get_int_attribute::<u8>("a", 0, 0xFF).unwrap_err();
        assert!(matches!(err, XmlError::OutOfRange { value: 300, .. }));
        let err = e.get_int_attribute::<u8>("c", 0, 0xFF).unwrap_err();
        assert!(matches!(err, XmlError::MissingAttribute { .. }));
        assert_eq!(e.get_optional_int_attribute::<u8>("c", 0, 7).unwrap(), None);
        assert_eq!(e.get_int_attribute_or::<u8>("c", 5, 0, 7).unwrap(), 5);
    }

    #[test]
    fn test_bool_and_bytes_attributes() {
        let mut e = Element::new("test");
        e.set_bool_attribute("flag", true);
        e.set_bytes_attribute("data", &[0xDE, 0xAD]);
        assert!(e.get_bool_attribute("flag").unwrap());
        assert_eq!(e.attribute("data"), Some("DEAD"));
        assert_eq!(e.get_bytes_attribute("data", 16).unwrap(), vec![0xDE, 0xAD]);
        assert!(e.get_bytes_attribute("data", 1).is_err());
        e.set_attribute("data", "zz");
        assert!(matches!(
            e.get_bytes_attribute("data", 16),
            Err(XmlError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn test_children_outlive_name() {
        let mut e = Element::new("parent");
        e.add_element("cell");
        let found = {
            let name = String::from("cell");
            e.get_children(&name, 1, 1).unwrap()
        };
        assert_eq!(found[0].name(), "cell");
        assert_eq!(e.children_named("cell").count(), 1);
    }

    #[test]
    fn test_children_cardinality() {
        let mut e = Element::new("parent");
        e.add_element("child");
        e.add_element("other");
        e.add_element("child");
        assert_eq!(e.get_children("child", 0, 2).unwrap().len(), 2);
        assert!(matches!(
            e.get_children("child", 0, 1),
            Err(XmlError::Cardinality { actual: 2, .. })
        ));
        assert!(e.get_optional_child("other").unwrap().is_some());
        assert!(e.get_optional_child("none").unwrap().is_none());
    }

    #[test]
    fn test_text_round_trip() {
        let mut root = Element::new("descriptors");
        let d = root.add_element("FMC_descriptor");
        d.add_element("stream").set_attribute("ES_ID", "0x0001");
        d.add_element("stream").set_attribute("name", "a<b&\"c\"");
        let text = root.to_xml_string();
        assert!(text.starts_with("<?xml"));
        let parsed = Element::parse(&text).unwrap();
        assert_eq!(parsed, root);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Element::parse("<a><b></a>"), Err(XmlError::Syntax(_))));
        assert!(matches!(Element::parse(""), Err(XmlError::Syntax(_))));
        assert!(matches!(Element::parse("<a/><b/>"), Err(XmlError::Syntax(_))));
    }
}
