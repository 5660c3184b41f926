//! DVB data_broadcast_id_descriptor: a 16-bit identifier followed by
//! selector bytes whose layout depends on the identifier.

use crate::abstract_descriptor::{AbstractDescriptor, Validity};
use crate::buffer::{PsiBuffer, MAX_DESCRIPTOR_PAYLOAD};
use crate::display::TablesDisplay;
use crate::edid::{did, Edid, Standards};
use crate::error::{EncodeError, XmlError};
use crate::repository::RepositoryBuilder;
use crate::xml::Element;

pub const XML_NAME: &str = "data_broadcast_id_descriptor";
const EDID: Edid = Edid::standard(did::DATA_BROADCAST_ID, Standards::DVB);

/// Room left for selector bytes after the identifier.
pub const MAX_SELECTOR_SIZE: usize = MAX_DESCRIPTOR_PAYLOAD - 2;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataBroadcastIdDescriptor {
    pub data_broadcast_id: u16,
    pub private_data: Vec<u8>,
    valid: Validity,
}

impl DataBroadcastIdDescriptor {
    pub fn new(data_broadcast_id: u16, private_data: Vec<u8>) -> Self {
        DataBroadcastIdDescriptor {
            data_broadcast_id,
            private_data,
            ..Default::default()
        }
    }
}

/// Well-known data broadcast identifiers.
fn data_broadcast_name(id: u16) -> &'static str {
    match id {
        0x0001 => "Data pipe",
        0x0002 => "Asynchronous data stream",
        0x0003 => "Synchronous data stream",
        0x0004 => "Synchronised data stream",
        0x0005 => "Multi protocol encapsulation",
        0x0006 => "Data Carousel",
        0x0007 => "Object Carousel",
        0x0009 => "Higher Protocols based on asynchronous data streams",
        0x000A => "System Software Update",
        0x000B => "IP/MAC Notification Table",
        0x00F0 => "MHP Object Carousel",
        0x0106 => "MHEG5 (UK)",
        0x0123 => "HbbTV Carousel",
        _ => "unknown",
    }
}

impl AbstractDescriptor for DataBroadcastIdDescriptor {
    descriptor_identity!(XML_NAME, EDID);

    fn clear_content(&mut self) {
        self.data_broadcast_id = 0;
        self.private_data.clear();
    }

    fn serialize_payload(&self, buf: &mut PsiBuffer) -> Result<(), EncodeError> {
        buf.put_u16(self.data_broadcast_id);
        buf.put_bytes(&self.private_data);
        Ok(())
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer) {
        self.data_broadcast_id = buf.get_u16();
        self.private_data = buf.get_remaining_bytes();
    }

    fn build_xml(&self, root: &mut Element) {
        root.set_hex_int_attribute("data_broadcast_id", self.data_broadcast_id as u64, 4);
        if !self.private_data.is_empty() {
            root.set_bytes_attribute("selector_bytes", &self.private_data);
        }
    }

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        self.data_broadcast_id = element.get_int_attribute::<u16>("data_broadcast_id", 0, u16::MAX)?;
        self.private_data = element
            .get_optional_bytes_attribute("selector_bytes", MAX_SELECTOR_SIZE)?
            .unwrap_or_default();
        Ok(())
    }
}

fn display(disp: &mut TablesDisplay, buf: &mut PsiBuffer, margin: &str, _edid: &Edid) {
    if !buf.can_read_bytes(2) {
        return;
    }
    let id = buf.get_u16();
    disp.line(
        margin,
        format_args!("Data broadcast id: 0x{:04X} ({})", id, data_broadcast_name(id)),
    );
    let selector = buf.get_remaining_bytes();
    if !selector.is_empty() {
        disp.line(margin, format_args!("Selector bytes: {}", selector.len()));
        let inner = disp.nested(margin);
        disp.hexa(&inner, &selector);
    }
}

fn factory() -> Box<dyn AbstractDescriptor> {
    Box::<DataBroadcastIdDescriptor>::default()
}

pub fn register(builder: &mut RepositoryBuilder) {
    builder.register(factory, &[EDID], XML_NAME, Some(display));
}
