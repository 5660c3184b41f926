//! EACEM/EICTA preferred_name_identifier_descriptor (private tag 0x85).
//!
//! Some TPS broadcasts reuse the EACEM layout under their own specifier,
//! so the type is reachable from both scopes.

use crate::abstract_descriptor::{AbstractDescriptor, Validity};
use crate::buffer::PsiBuffer;
use crate::display::TablesDisplay;
use crate::edid::{did, pds, Edid, Standards};
use crate::error::{EncodeError, XmlError};
use crate::repository::RepositoryBuilder;
use crate::xml::Element;

pub const XML_NAME: &str = "eacem_preferred_name_identifier_descriptor";
const EDID: Edid = Edid::private(did::EACEM_PREFERRED_NAME_ID, pds::EACEM, Standards::DVB);
const TPS_EDID: Edid = Edid::private(did::EACEM_PREFERRED_NAME_ID, pds::TPS, Standards::DVB);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EacemPreferredNameIdentifierDescriptor {
    pub name_id: u8,
    valid: Validity,
}

impl EacemPreferredNameIdentifierDescriptor {
    pub fn new(name_id: u8) -> Self {
        EacemPreferredNameIdentifierDescriptor {
            name_id,
            ..Default::default()
        }
    }
}

impl AbstractDescriptor for EacemPreferredNameIdentifierDescriptor {
    descriptor_identity!(XML_NAME, EDID);

    fn clear_content(&mut self) {
        self.name_id = 0;
    }

    fn serialize_payload(&self, buf: &mut PsiBuffer) -> Result<(), EncodeError> {
        buf.put_u8(self.name_id);
        Ok(())
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer) {
        self.name_id = buf.get_u8();
    }

    fn build_xml(&self, root: &mut Element) {
        root.set_int_attribute("name_id", self.name_id);
    }

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        self.name_id = element.get_int_attribute::<u8>("name_id", 0, u8::MAX)?;
        Ok(())
    }
}

fn display(disp: &mut TablesDisplay, buf: &mut PsiBuffer, margin: &str, _edid: &Edid) {
    if buf.can_read_bytes(1) {
        let id = buf.get_u8();
        disp.line(margin, format_args!("Name identifier: {} (0x{:02X})", id, id));
    }
}

fn factory() -> Box<dyn AbstractDescriptor> {
    Box::<EacemPreferredNameIdentifierDescriptor>::default()
}

pub fn register(builder: &mut RepositoryBuilder) {
    builder.register(factory, &[EDID, TPS_EDID], XML_NAME, Some(display));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DescriptorContext, DescriptorList};
    use crate::repository::PsiRepository;

    fn loop_with_specifier(specifier: u32) -> DescriptorList {
        let mut data = vec![0x5F, 0x04];
        data.extend_from_slice(&specifier.to_be_bytes());
        data.extend_from_slice(&[0x85, 0x01, 0x07]);
        let (list, err) = DescriptorList::from_loop_bytes(&data);
        assert!(err.is_none());
        list
    }

    #[test]
    fn test_same_type_under_two_specifiers() {
        let repo = PsiRepository::instance();
        let ctx = DescriptorContext::default();
        let mut displays = Vec::new();
        for specifier in [pds::EACEM, pds::TPS] {
            let list = loop_with_specifier(specifier);
            let decoded = list.decode_all(repo, &ctx);
            let d = decoded[1]
                .downcast_ref::<EacemPreferredNameIdentifierDescriptor>()
                .unwrap();
            assert!(d.is_valid());
            assert_eq!(d.name_id, 7);

            let mut disp = TablesDisplay::new();
            let pds = list.private_data_specifier(1, &ctx);
            disp.display_descriptor(1, list.get(1).unwrap(), "", repo, &ctx, pds);
            displays.push(disp.into_string());
        }
        assert_eq!(displays[0], displays[1]);
        assert_eq!(
            displays[0],
            "- Descriptor 1: eacem_preferred_name_identifier_descriptor (0x85, 133), 1 bytes\n  Name identifier: 7 (0x07)\n"
        );
    }

    #[test]
    fn test_unscoped_tag_is_generic() {
        let repo = PsiRepository::instance();
        let ctx = DescriptorContext::default();
        let (list, _) = DescriptorList::from_loop_bytes(&[0x85, 0x01, 0x07]);
        let decoded = list.decode_all(repo, &ctx);
        assert_eq!(decoded[0].xml_name(), "generic_descriptor");
    }

    #[test]
    fn test_tps_scope_survives_xml() {
        let repo = PsiRepository::instance();
        let ctx = DescriptorContext::default();
        let list = loop_with_specifier(pds::TPS);
        let mut root = Element::new("descriptors");
        list.to_xml(&mut root, repo, &ctx);
        assert_eq!(root.children()[0].name(), "private_data_specifier_descriptor");
        assert_eq!(root.children()[1].name(), XML_NAME);

        let (back, errors) = DescriptorList::from_xml(&root, repo, &ctx);
        assert!(errors.is_empty());
        assert_eq!(back, list);
    }

    #[test]
    fn test_xml_adds_specifier() {
        let repo = PsiRepository::instance();
        let ctx = DescriptorContext::default();
        let mut root = Element::new("descriptors");
        EacemPreferredNameIdentifierDescriptor::new(3).to_xml(&mut root);
        let (list, errors) = DescriptorList::from_xml(&root, repo, &ctx);
        assert!(errors.is_empty());
        assert_eq!(
            &list.to_loop_bytes()[..],
            &[0x5F, 0x04, 0x00, 0x00, 0x00, 0x28, 0x85, 0x01, 0x03]
        );
    }
}
