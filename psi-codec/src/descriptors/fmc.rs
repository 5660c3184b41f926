//! MPEG-4 FMC_descriptor: maps elementary stream ids to FlexMux channels.

use crate::abstract_descriptor::{AbstractDescriptor, Validity};
use crate::buffer::{PsiBuffer, MAX_DESCRIPTOR_PAYLOAD};
use crate::display::TablesDisplay;
use crate::edid::{did, Edid, Standards};
use crate::error::{EncodeError, XmlError};
use crate::repository::RepositoryBuilder;
use crate::xml::Element;

pub const XML_NAME: &str = "FMC_descriptor";
const EDID: Edid = Edid::standard(did::FMC, Standards::MPEG);

const ENTRY_SIZE: usize = 3;
pub const MAX_ENTRIES: usize = MAX_DESCRIPTOR_PAYLOAD / ENTRY_SIZE;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FmcEntry {
    pub es_id: u16,
    pub flexmux_channel: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FmcDescriptor {
    pub entries: Vec<FmcEntry>,
    valid: Validity,
}

impl AbstractDescriptor for FmcDescriptor {
    descriptor_identity!(XML_NAME, EDID);

    fn clear_content(&mut self) {
        self.entries.clear();
    }

    fn serialize_payload(&self, buf: &mut PsiBuffer) -> Result<(), EncodeError> {
        if self.entries.len() > MAX_ENTRIES {
            return Err(EncodeError::FieldOutOfRange {
                descriptor: XML_NAME,
                field: "entries",
                value: self.entries.len() as u64,
                max: MAX_ENTRIES as u64,
            });
        }
        for entry in &self.entries {
            buf.put_u16(entry.es_id);
            buf.put_u8(entry.flexmux_channel);
        }
        Ok(())
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer) {
        while buf.can_read_bytes(ENTRY_SIZE) {
            let es_id = buf.get_u16();
            let flexmux_channel = buf.get_u8();
            self.entries.push(FmcEntry { es_id, flexmux_channel });
        }
    }

    fn build_xml(&self, root: &mut Element) {
        for entry in &self.entries {
            let e = root.add_element("stream");
            e.set_hex_int_attribute("ES_ID", entry.es_id as u64, 4);
            e.set_hex_int_attribute("FlexMuxChannel", entry.flexmux_channel as u64, 2);
        }
    }

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        for e in element.get_children("stream", 0, MAX_ENTRIES)? {
            self.entries.push(FmcEntry {
                es_id: e.get_int_attribute::<u16>("ES_ID", 0, u16::MAX)?,
                flexmux_channel: e.get_int_attribute::<u8>("FlexMuxChannel", 0, u8::MAX)?,
            });
        }
        Ok(())
    }
}

fn display(disp: &mut TablesDisplay, buf: &mut PsiBuffer, margin: &str, _edid: &Edid) {
    while buf.can_read_bytes(ENTRY_SIZE) {
        let es_id = buf.get_u16();
        let channel = buf.get_u8();
        disp.line(
            margin,
            format_args!("ES id: 0x{:04X} ({}), FlexMux channel: 0x{:02X} ({})", es_id, es_id, channel, channel),
        );
    }
}

fn factory() -> Box<dyn AbstractDescriptor> {
    Box::<FmcDescriptor>::default()
}

pub fn register(builder: &mut RepositoryBuilder) {
    builder.register(factory, &[EDID], XML_NAME, Some(display));
}
