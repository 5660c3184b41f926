//! DVB private_data_specifier_descriptor: opens a vendor scope for the
//! private descriptors that follow it in the same loop.

use crate::abstract_descriptor::{AbstractDescriptor, Validity};
use crate::buffer::PsiBuffer;
use crate::display::TablesDisplay;
use crate::edid::{did, pds, Edid, Standards};
use crate::error::{EncodeError, XmlError};
use crate::repository::RepositoryBuilder;
use crate::xml::Element;

pub const XML_NAME: &str = "private_data_specifier_descriptor";
const EDID: Edid = Edid::standard(did::PRIVATE_DATA_SPECIFIER, Standards::DVB);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivateDataSpecifierDescriptor {
    pub pds: u32,
    valid: Validity,
}

impl PrivateDataSpecifierDescriptor {
    pub fn new(pds: u32) -> Self {
        PrivateDataSpecifierDescriptor {
            pds,
            ..Default::default()
        }
    }
}

impl AbstractDescriptor for PrivateDataSpecifierDescriptor {
    descriptor_identity!(XML_NAME, EDID);

    fn clear_content(&mut self) {
        self.pds = 0;
    }

    fn serialize_payload(&self, buf: &mut PsiBuffer) -> Result<(), EncodeError> {
        buf.put_u32(self.pds);
        Ok(())
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer) {
        self.pds = buf.get_u32();
    }

    fn build_xml(&self, root: &mut Element) {
        root.set_hex_int_attribute("private_data_specifier", self.pds as u64, 8);
    }

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        self.pds = element.get_int_attribute::<u32>("private_data_specifier", 0, u32::MAX)?;
        Ok(())
    }
}

fn display(disp: &mut TablesDisplay, buf: &mut PsiBuffer, margin: &str, _edid: &Edid) {
    if buf.can_read_bytes(4) {
        let value = buf.get_u32();
        let name = pds::name(value).unwrap_or("unknown");
        disp.line(margin, format_args!("Specifier: 0x{:08X} ({})", value, name));
    }
}

fn factory() -> Box<dyn AbstractDescriptor> {
    Box::<PrivateDataSpecifierDescriptor>::default()
}

pub fn register(builder: &mut RepositoryBuilder) {
    builder.register(factory, &[EDID], XML_NAME, Some(display));
}
