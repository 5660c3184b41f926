//! MPEG-4 FlexMuxTiming_descriptor.

use crate::abstract_descriptor::{AbstractDescriptor, Validity};
use crate::buffer::PsiBuffer;
use crate::display::TablesDisplay;
use crate::edid::{did, Edid, Standards};
use crate::error::{EncodeError, XmlError};
use crate::repository::RepositoryBuilder;
use crate::xml::Element;

pub const XML_NAME: &str = "flexmux_timing_descriptor";
const EDID: Edid = Edid::standard(did::FLEX_MUX_TIMING, Standards::MPEG);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlexMuxTimingDescriptor {
    /// ES_ID of the clock reference stream.
    pub fcr_es_id: u16,
    /// Object time base resolution, in cycles per second.
    pub fcr_resolution: u32,
    pub fcr_length: u8,
    pub fmx_rate_length: u8,
    valid: Validity,
}

impl AbstractDescriptor for FlexMuxTimingDescriptor {
    descriptor_identity!(XML_NAME, EDID);

    fn clear_content(&mut self) {
        self.fcr_es_id = 0;
        self.fcr_resolution = 0;
        self.fcr_length = 0;
        self.fmx_rate_length = 0;
    }

    fn serialize_payload(&self, buf: &mut PsiBuffer) -> Result<(), EncodeError> {
        buf.put_u16(self.fcr_es_id);
        buf.put_u32(self.fcr_resolution);
        buf.put_u8(self.fcr_length);
        buf.put_u8(self.fmx_rate_length);
        Ok(())
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer) {
        self.fcr_es_id = buf.get_u16();
        self.fcr_resolution = buf.get_u32();
        self.fcr_length = buf.get_u8();
        self.fmx_rate_length = buf.get_u8();
    }

    fn build_xml(&self, root: &mut Element) {
        root.set_hex_int_attribute("FCR_ES_ID", self.fcr_es_id as u64, 4);
        root.set_int_attribute("FCRResolution", self.fcr_resolution);
        root.set_int_attribute("FCRLength", self.fcr_length);
        root.set_int_attribute("FmxRateLength", self.fmx_rate_length);
    }

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        self.fcr_es_id = element.get_int_attribute::<u16>("FCR_ES_ID", 0, u16::MAX)?;
        self.fcr_resolution = element.get_int_attribute::<u32>("FCRResolution", 0, u32::MAX)?;
        self.fcr_length = element.get_int_attribute::<u8>("FCRLength", 0, u8::MAX)?;
        self.fmx_rate_length = element.get_int_attribute::<u8>("FmxRateLength", 0, u8::MAX)?;
        Ok(())
    }
}

fn display(disp: &mut TablesDisplay, buf: &mut PsiBuffer, margin: &str, _edid: &Edid) {
    if buf.can_read_bytes(8) {
        let es_id = buf.get_u16();
        disp.line(margin, format_args!("FCR ES ID: 0x{:04X} ({})", es_id, es_id));
        disp.line(margin, format_args!("FCR resolution: {} cycles/second", buf.get_u32()));
        disp.line(margin, format_args!("FCR length: {}", buf.get_u8()));
        disp.line(margin, format_args!("FMX rate length: {}", buf.get_u8()));
    }
}

fn factory() -> Box<dyn AbstractDescriptor> {
    Box::<FlexMuxTimingDescriptor>::default()
}

pub fn register(builder: &mut RepositoryBuilder) {
    builder.register(factory, &[EDID], XML_NAME, Some(display));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Descriptor;

    #[test]
    fn test_flexmux_timing_binary() {
        let bin = Descriptor::new(0x2C, vec![0x00, 0x65, 0x00, 0x01, 0x5F, 0x90, 0x20, 0x08]).unwrap();
        let mut d = FlexMuxTimingDescriptor::default();
        d.deserialize(&bin);
        assert!(d.is_valid());
        assert_eq!(d.fcr_es_id, 0x65);
        assert_eq!(d.fcr_resolution, 90_000);
        assert_eq!(d.fcr_length, 32);
        assert_eq!(d.fmx_rate_length, 8);
        assert_eq!(d.serialize().unwrap(), bin);

        d.deserialize(&Descriptor::new(0x2C, vec![0x00, 0x65, 0x00]).unwrap());
        assert!(!d.is_valid());
    }

    #[test]
    fn test_flexmux_timing_xml() {
        let d = FlexMuxTimingDescriptor {
            fcr_es_id: 0x1234,
            fcr_resolution: 27_000_000,
            fcr_length: 42,
            fmx_rate_length: 22,
            ..Default::default()
        };
        let mut root = Element::new("root");
        d.to_xml(&mut root);
        assert_eq!(root.children()[0].attribute("FCR_ES_ID"), Some("0x1234"));
        let mut back = FlexMuxTimingDescriptor::default();
        back.from_xml(&root.children()[0]).unwrap();
        assert_eq!(back, d);
    }
}
