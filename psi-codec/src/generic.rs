//! Opaque descriptor used when no schema matches an identity.
//!
//! The payload is kept byte for byte, together with the identity it was
//! found under, so that it can be displayed, converted to XML and re-encoded
//! without loss.

use std::any::Any;

use crate::abstract_descriptor::{AbstractDescriptor, Validity};
use crate::buffer::{PsiBuffer, MAX_DESCRIPTOR_PAYLOAD};
use crate::descriptor::Descriptor;
use crate::edid::{Edid, Standards};
use crate::error::{EncodeError, XmlError};
use crate::repository::RepositoryBuilder;
use crate::xml::Element;

pub const XML_NAME: &str = "generic_descriptor";

/// Raw payload of an unresolved descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericDescriptor {
    /// Identity under which the payload was found.
    pub edid: Edid,
    /// Complete payload, including an extended tag if there is one.
    pub payload: Vec<u8>,
    valid: Validity,
}

impl Default for GenericDescriptor {
    fn default() -> Self {
        GenericDescriptor {
            edid: Edid::standard(0, Standards::NONE),
            payload: Vec::new(),
            valid: Validity::default(),
        }
    }
}

impl GenericDescriptor {
    /// Wrap a binary descriptor found under `edid`.
    pub fn from_descriptor(bin: &Descriptor, edid: Edid) -> Self {
        GenericDescriptor {
            edid,
            payload: bin.payload().to_vec(),
            valid: Validity::default(),
        }
    }
}

impl AbstractDescriptor for GenericDescriptor {
    fn xml_name(&self) -> &'static str {
        XML_NAME
    }

    fn edid(&self) -> Edid {
        self.edid
    }

    // The extended tag, when known, is already the first payload byte.
    fn extended_tag(&self) -> Option<u8> {
        None
    }

    fn is_valid(&self) -> bool {
        self.valid.get()
    }

    fn set_valid(&mut self, valid: bool) {
        self.valid.set(valid);
    }

    fn clear_content(&mut self) {
        self.payload.clear();
    }

    fn serialize_payload(&self, buf: &mut PsiBuffer) -> Result<(), EncodeError> {
        buf.put_bytes(&self.payload);
        Ok(())
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer) {
        self.payload = buf.get_remaining_bytes();
    }

    /// Any tag is accepted: the identity follows the binary descriptor.
    fn deserialize(&mut self, bin: &Descriptor) {
        self.edid.tag = bin.tag();
        self.payload = bin.payload().to_vec();
        self.set_valid(true);
    }

    fn build_xml(&self, root: &mut Element) {
        root.set_hex_int_attribute("tag", self.edid.tag as u64, 2);
        if let Some(pds) = self.edid.pds {
            root.set_hex_int_attribute("private_data_specifier", pds as u64, 8);
        }
        root.set_bytes_attribute("payload", &self.payload);
    }

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        let tag = element.get_int_attribute::<u8>("tag", 0, 0xFF)?;
        let pds = element.get_optional_int_attribute::<u32>("private_data_specifier", 0, u32::MAX)?;
        let payload = element
            .get_optional_bytes_attribute("payload", MAX_DESCRIPTOR_PAYLOAD)?
            .unwrap_or_default();
        self.edid = Edid {
            tag,
            extended_tag: None,
            pds,
            standard: Standards::NONE,
        };
        self.payload = payload;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn factory() -> Box<dyn AbstractDescriptor> {
    Box::<GenericDescriptor>::default()
}

pub(crate) fn register(builder: &mut RepositoryBuilder) {
    builder.register(factory, &[], XML_NAME, None);
}
