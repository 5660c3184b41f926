//! The lifecycle every typed descriptor implements.
//!
//! Implementors provide the payload codec (`serialize_payload` /
//! `deserialize_payload`) and the XML mapping (`build_xml` / `analyze_xml`).
//! The provided methods wrap them with the common framing rules: clearing
//! before decode, tag and extended-tag agreement, validity tracking, and
//! refusal to encode invalid or overflowing content.

use std::any::Any;
use std::fmt::Debug;

use crate::buffer::{PsiBuffer, MAX_DESCRIPTOR_PAYLOAD};
use crate::descriptor::Descriptor;
use crate::edid::Edid;
use crate::error::{EncodeError, XmlError};
use crate::xml::Element;

/// Validity of a decoded instance.
///
/// Defaults to valid: a freshly built descriptor is fully populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validity(bool);

impl Default for Validity {
    fn default() -> Self {
        Validity(true)
    }
}

impl Validity {
    pub fn get(self) -> bool {
        self.0
    }

    pub fn set(&mut self, valid: bool) {
        self.0 = valid;
    }
}

/// A descriptor type with binary and XML representations.
pub trait AbstractDescriptor: Debug + Send + Sync + Any {
    /// XML element name of the type.
    fn xml_name(&self) -> &'static str;

    /// Primary identity of the type. Extension families carry their
    /// extended tag here.
    fn edid(&self) -> Edid;

    fn is_valid(&self) -> bool;

    fn set_valid(&mut self, valid: bool);

    /// Reset every field to its default value.
    fn clear_content(&mut self);

    /// Write the payload, after the extended tag if any.
    fn serialize_payload(&self, buf: &mut PsiBuffer) -> Result<(), EncodeError>;

    /// Read the payload, after the extended tag if any.
    fn deserialize_payload(&mut self, buf: &mut PsiBuffer);

    /// Fill the element created by [`to_xml`](Self::to_xml).
    fn build_xml(&self, root: &mut Element);

    /// Load fields from an element whose name was already checked.
    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError>;

    fn as_any(&self) -> &dyn Any;

    fn tag(&self) -> u8 {
        self.edid().tag
    }

    fn extended_tag(&self) -> Option<u8> {
        self.edid().extended_tag
    }

    /// Name used in display headers.
    fn display_name(&self) -> &'static str {
        self.xml_name()
    }

    /// Decode from a binary descriptor.
    ///
    /// The instance is valid only if the tags agree, the payload was read
    /// without error and completely consumed. On failure, fields decoded
    /// before the error are kept.
    fn deserialize(&mut self, bin: &Descriptor) {
        self.clear_content();
        let mut buf = PsiBuffer::from_bytes(bin.payload());
        let mut ok = bin.tag() == self.tag();
        if let Some(ext) = self.extended_tag() {
            ok = ok && buf.can_read_bytes(1) && buf.get_u8() == ext;
        }
        if ok {
            self.deserialize_payload(&mut buf);
        }
        let valid = ok && !buf.error() && buf.end_of_read();
        self.set_valid(valid);
    }

    /// Encode into a binary descriptor.
    fn serialize(&self) -> Result<Descriptor, EncodeError> {
        let name = self.xml_name();
        if !self.is_valid() {
            return Err(EncodeError::InvalidDescriptor(name));
        }
        let mut buf = PsiBuffer::with_capacity(MAX_DESCRIPTOR_PAYLOAD);
        if let Some(ext) = self.extended_tag() {
            buf.put_u8(ext);
        }
        self.serialize_payload(&mut buf)?;
        if buf.write_error() {
            return Err(EncodeError::Overflow(name));
        }
        if buf.open_regions() != 0 || !buf.write_is_byte_aligned() {
            return Err(EncodeError::Inconsistent {
                descriptor: name,
                message: "payload does not end on a byte boundary",
            });
        }
        Descriptor::new(self.tag(), buf.bytes_written()).map_err(|_| EncodeError::Overflow(name))
    }

    /// Append this descriptor as a new child of `parent`.
    fn to_xml<'a>(&self, parent: &'a mut Element) -> &'a mut Element {
        let element = parent.add_element(self.xml_name());
        self.build_xml(element);
        element
    }

    /// Load from an XML element. The instance is valid iff this succeeds.
    fn from_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        if element.name() != self.xml_name() {
            return Err(XmlError::UnexpectedElement {
                expected: self.xml_name().to_string(),
                actual: element.name().to_string(),
            });
        }
        self.clear_content();
        let result = self.analyze_xml(element);
        self.set_valid(result.is_ok());
        result
    }
}

impl dyn AbstractDescriptor {
    /// Concrete type of a resolved descriptor.
    pub fn downcast_ref<T: AbstractDescriptor>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Check that `value` fits in `bits` bits before writing it.
pub fn check_bits(
    descriptor: &'static str,
    field: &'static str,
    value: u64,
    bits: u32,
) -> Result<(), EncodeError> {
    let max = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
    if value > max {
        return Err(EncodeError::FieldOutOfRange {
            descriptor,
            field,
            value,
            max,
        });
    }
    Ok(())
}
