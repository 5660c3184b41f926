//! MPEG-4 FmxBufferSize_descriptor: a default FlexMux buffer followed by
//! per-channel buffers, 4 bytes each.

use crate::abstract_descriptor::{AbstractDescriptor, Validity};
use crate::buffer::PsiBuffer;
use crate::display::TablesDisplay;
use crate::edid::{did, Edid, Standards};
use crate::error::{EncodeError, XmlError};
use crate::repository::RepositoryBuilder;
use crate::xml::Element;

pub const XML_NAME: &str = "FmxBufferSize_descriptor";
const EDID: Edid = Edid::standard(did::FMX_BUFFER_SIZE, Standards::MPEG);

const ENTRY_SIZE: usize = 4;
const MAX_BUFFER_SIZE: u32 = 0x00FF_FFFF;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlexMuxBuffer {
    pub flexmux_channel: u8,
    /// 24 bits.
    pub buffer_size: u32,
}

impl FlexMuxBuffer {
    fn read(buf: &mut PsiBuffer) -> Self {
        let flexmux_channel = buf.get_u8();
        let buffer_size = buf.get_u24();
        FlexMuxBuffer {
            flexmux_channel,
            buffer_size,
        }
    }

    fn write(&self, buf: &mut PsiBuffer) -> Result<(), EncodeError> {
        if self.buffer_size > MAX_BUFFER_SIZE {
            return Err(EncodeError::FieldOutOfRange {
                descriptor: XML_NAME,
                field: "FB_BufferSize",
                value: self.buffer_size as u64,
                max: MAX_BUFFER_SIZE as u64,
            });
        }
        buf.put_u8(self.flexmux_channel);
        buf.put_u24(self.buffer_size);
        Ok(())
    }

    fn to_xml(&self, parent: &mut Element, name: &str) {
        let e = parent.add_element(name);
        e.set_int_attribute("flexMuxChannel", self.flexmux_channel);
        e.set_int_attribute("FB_BufferSize", self.buffer_size);
    }

    fn from_xml(element: &Element) -> Result<Self, XmlError> {
        Ok(FlexMuxBuffer {
            flexmux_channel: element.get_int_attribute::<u8>("flexMuxChannel", 0, u8::MAX)?,
            buffer_size: element.get_int_attribute::<u32>("FB_BufferSize", 0, MAX_BUFFER_SIZE)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FmxBufferSizeDescriptor {
    pub default_buffer: FlexMuxBuffer,
    pub buffers: Vec<FlexMuxBuffer>,
    valid: Validity,
}

impl AbstractDescriptor for FmxBufferSizeDescriptor {
    descriptor_identity!(XML_NAME, EDID);

    fn clear_content(&mut self) {
        self.default_buffer = FlexMuxBuffer::default();
        self.buffers.clear();
    }

    fn serialize_payload(&self, buf: &mut PsiBuffer) -> Result<(), EncodeError> {
        self.default_buffer.write(buf)?;
        for b in &self.buffers {
            b.write(buf)?;
        }
        Ok(())
    }

    // Entries are read while whole; trailing bytes are left unread and make
    // the descriptor invalid.
    fn deserialize_payload(&mut self, buf: &mut PsiBuffer) {
        if buf.can_read_bytes(ENTRY_SIZE) {
            self.default_buffer = FlexMuxBuffer::read(buf);
        }
        while buf.can_read_bytes(ENTRY_SIZE) {
            self.buffers.push(FlexMuxBuffer::read(buf));
        }
    }

    fn build_xml(&self, root: &mut Element) {
        self.default_buffer.to_xml(root, "DefaultFlexMuxBufferDescriptor");
        for b in &self.buffers {
            b.to_xml(root, "FlexMuxBufferDescriptor");
        }
    }

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        let default = element.get_children("DefaultFlexMuxBufferDescriptor", 1, 1)?;
        self.default_buffer = FlexMuxBuffer::from_xml(default[0])?;
        for e in element.get_children("FlexMuxBufferDescriptor", 0, usize::MAX)? {
            self.buffers.push(FlexMuxBuffer::from_xml(e)?);
        }
        Ok(())
    }
}

fn display(disp: &mut TablesDisplay, buf: &mut PsiBuffer, margin: &str, _edid: &Edid) {
    if buf.can_read_bytes(ENTRY_SIZE) {
        let b = FlexMuxBuffer::read(buf);
        disp.line(
            margin,
            format_args!("FlexMuxBuffer(default) channel: {}, size: {}", b.flexmux_channel, b.buffer_size),
        );
    }
    let mut i = 0;
    while buf.can_read_bytes(ENTRY_SIZE) {
        let b = FlexMuxBuffer::read(buf);
        disp.line(
            margin,
            format_args!("FlexMuxBuffer({}) channel: {}, size: {}", i, b.flexmux_channel, b.buffer_size),
        );
        i += 1;
    }
}

fn factory() -> Box<dyn AbstractDescriptor> {
    Box::<FmxBufferSizeDescriptor>::default()
}

pub fn register(builder: &mut RepositoryBuilder) {
    builder.register(factory, &[EDID], XML_NAME, Some(display));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Descriptor;

    fn sample() -> FmxBufferSizeDescriptor {
        FmxBufferSizeDescriptor {
            default_buffer: FlexMuxBuffer {
                flexmux_channel: 0,
                buffer_size: 0x001000,
            },
            buffers: vec![
                FlexMuxBuffer {
                    flexmux_channel: 1,
                    buffer_size: 0x002000,
                },
                FlexMuxBuffer {
                    flexmux_channel: 2,
                    buffer_size: 0xFFFFFF,
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_fmx_buffer_size_binary() {
        let d = sample();
        let bin = d.serialize().unwrap();
        assert_eq!(bin.payload_size(), 12);
        let mut back = FmxBufferSizeDescriptor::default();
        back.deserialize(&bin);
        assert!(back.is_valid());
        assert_eq!(back, d);
    }

    #[test]
    fn test_fmx_buffer_size_truncated() {
        let bin = sample().serialize().unwrap();
        let short = Descriptor::new(bin.tag(), bin.payload()[..11].to_vec()).unwrap();
        let mut back = FmxBufferSizeDescriptor::default();
        back.deserialize(&short);
        assert!(!back.is_valid());
        assert_eq!(back.default_buffer, sample().default_buffer);
        assert_eq!(back.buffers, sample().buffers[..1].to_vec());

        // Deterministic: decoding again gives the same content.
        let mut again = FmxBufferSizeDescriptor::default();
        again.deserialize(&short);
        assert_eq!(again, back);
    }

    #[test]
    fn test_fmx_buffer_size_out_of_range() {
        let mut d = sample();
        d.buffers[0].buffer_size = 0x0100_0000;
        assert!(matches!(
            d.serialize(),
            Err(EncodeError::FieldOutOfRange { field: "FB_BufferSize", .. })
        ));
    }

    #[test]
    fn test_fmx_buffer_size_xml() {
        let d = sample();
        let mut root = Element::new("root");
        d.to_xml(&mut root);
        let mut back = FmxBufferSizeDescriptor::default();
        back.from_xml(&root.children()[0]).unwrap();
        assert_eq!(back, d);

        let missing_default = Element::new(XML_NAME);
        let err = back.from_xml(&missing_default).unwrap_err();
        assert!(matches!(err, XmlError::Cardinality { actual: 0, .. }));
        assert!(!back.is_valid());
    }

    #[test]
    fn test_fmx_buffer_size_display() {
        let bin = sample().serialize().unwrap();
        let mut disp = TablesDisplay::new();
        let mut buf = PsiBuffer::from_bytes(bin.payload());
        display(&mut disp, &mut buf, "", &EDID);
        assert_eq!(
            disp.output(),
            "FlexMuxBuffer(default) channel: 0, size: 4096\n\
             FlexMuxBuffer(0) channel: 1, size: 8192\n\
             FlexMuxBuffer(1) channel: 2, size: 16777215\n"
        );
    }
}
