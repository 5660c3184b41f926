//! DVB cell_frequency_link_descriptor.
//!
//! ```text
//! for each cell:
//!   cell_id                  16
//!   frequency                32   (10 Hz units)
//!   subcell_info_loop_length  8
//!   for each subcell:
//!     cell_id_extension       8
//!     transposer_frequency   32   (10 Hz units)
//! ```

use crate::abstract_descriptor::{AbstractDescriptor, Validity};
use crate::buffer::PsiBuffer;
use crate::display::TablesDisplay;
use crate::edid::{did, Edid, Standards};
use crate::error::{EncodeError, XmlError};
use crate::repository::RepositoryBuilder;
use crate::xml::Element;

pub const XML_NAME: &str = "cell_frequency_link_descriptor";
const EDID: Edid = Edid::standard(did::CELL_FREQUENCY_LINK, Standards::DVB);

/// Largest frequency in Hz that fits the 32-bit field.
const MAX_FREQUENCY: u64 = u32::MAX as u64 * 10;

/// cell_id, frequency and subcell_info_loop_length.
const CELL_HEADER_SIZE: usize = 7;
const SUBCELL_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Subcell {
    pub cell_id_extension: u8,
    /// Hz.
    pub transposer_frequency: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    pub cell_id: u16,
    /// Hz.
    pub frequency: u64,
    pub subcells: Vec<Subcell>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellFrequencyLinkDescriptor {
    pub cells: Vec<Cell>,
    valid: Validity,
}

fn put_frequency(buf: &mut PsiBuffer, field: &'static str, hz: u64) -> Result<(), EncodeError> {
    if hz > MAX_FREQUENCY {
        return Err(EncodeError::FieldOutOfRange {
            descriptor: XML_NAME,
            field,
            value: hz,
            max: MAX_FREQUENCY,
        });
    }
    if hz % 10 != 0 {
        return Err(EncodeError::Inconsistent {
            descriptor: XML_NAME,
            message: "frequency is not a multiple of 10 Hz",
        });
    }
    buf.put_u32((hz / 10) as u32);
    Ok(())
}

fn get_frequency_attribute(e: &Element, name: &str) -> Result<u64, XmlError> {
    let hz = e.get_int_attribute::<u64>(name, 0, MAX_FREQUENCY)?;
    if hz % 10 != 0 {
        return Err(XmlError::Inconsistent {
            element: e.name().to_string(),
            message: format!("{} {} Hz is not a multiple of 10 Hz", name, hz),
        });
    }
    Ok(hz)
}

fn get_frequency(buf: &mut PsiBuffer) -> u64 {
    buf.get_u32() as u64 * 10
}

impl AbstractDescriptor for CellFrequencyLinkDescriptor {
    descriptor_identity!(XML_NAME, EDID);

    fn clear_content(&mut self) {
        self.cells.clear();
    }

    fn serialize_payload(&self, buf: &mut PsiBuffer) -> Result<(), EncodeError> {
        for cell in &self.cells {
            buf.put_u16(cell.cell_id);
            put_frequency(buf, "frequency", cell.frequency)?;
            buf.push_write_sequence_with_leading_length(8);
            for sub in &cell.subcells {
                buf.put_u8(sub.cell_id_extension);
                put_frequency(buf, "transposer_frequency", sub.transposer_frequency)?;
            }
            buf.pop_state();
        }
        Ok(())
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer) {
        while buf.can_read_bytes(CELL_HEADER_SIZE) {
            let mut cell = Cell {
                cell_id: buf.get_u16(),
                frequency: get_frequency(buf),
                subcells: Vec::new(),
            };
            buf.push_read_size_from_length(8);
            while buf.can_read_bytes(SUBCELL_SIZE) {
                let cell_id_extension = buf.get_u8();
                let transposer_frequency = get_frequency(buf);
                cell.subcells.push(Subcell {
                    cell_id_extension,
                    transposer_frequency,
                });
            }
            // Subcell loop length not a multiple of the entry size.
            if buf.can_read() {
                buf.set_user_error();
            }
            buf.pop_state();
            self.cells.push(cell);
        }
    }

    fn build_xml(&self, root: &mut Element) {
        for cell in &self.cells {
            let e = root.add_element("cell");
            e.set_hex_int_attribute("cell_id", cell.cell_id as u64, 4);
            e.set_int_attribute("frequency", cell.frequency);
            for sub in &cell.subcells {
                let s = e.add_element("subcell");
                s.set_hex_int_attribute("cell_id_extension", sub.cell_id_extension as u64, 2);
                s.set_int_attribute("transposer_frequency", sub.transposer_frequency);
            }
        }
    }

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        for e in element.get_children("cell", 0, usize::MAX)? {
            let mut cell = Cell {
                cell_id: e.get_int_attribute::<u16>("cell_id", 0, u16::MAX)?,
                frequency: get_frequency_attribute(e, "frequency")?,
                subcells: Vec::new(),
            };
            for s in e.get_children("subcell", 0, usize::MAX)? {
                cell.subcells.push(Subcell {
                    cell_id_extension: s.get_int_attribute::<u8>("cell_id_extension", 0, u8::MAX)?,
                    transposer_frequency: get_frequency_attribute(s, "transposer_frequency")?,
                });
            }
            self.cells.push(cell);
        }
        Ok(())
    }
}

fn display(disp: &mut TablesDisplay, buf: &mut PsiBuffer, margin: &str, _edid: &Edid) {
    while buf.can_read_bytes(CELL_HEADER_SIZE) {
        let cell_id = buf.get_u16();
        let frequency = get_frequency(buf);
        disp.line(
            margin,
            format_args!("- Cell id: 0x{:04X}, frequency: {} Hz", cell_id, frequency),
        );
        let inner = disp.nested(margin);
        buf.push_read_size_from_length(8);
        while buf.can_read_bytes(SUBCELL_SIZE) {
            let ext = buf.get_u8();
            let transposer = get_frequency(buf);
            disp.line(
                &inner,
                format_args!("Subcell id ext: 0x{:02X}, frequency: {} Hz", ext, transposer),
            );
        }
        buf.pop_state();
    }
}

fn factory() -> Box<dyn AbstractDescriptor> {
    Box::<CellFrequencyLinkDescriptor>::default()
}

pub fn register(builder: &mut RepositoryBuilder) {
    builder.register(factory, &[EDID], XML_NAME, Some(display));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Descriptor;

    fn two_cells() -> CellFrequencyLinkDescriptor {
        CellFrequencyLinkDescriptor {
            cells: vec![
                Cell {
                    cell_id: 0x0102,
                    frequency: 474_000_000,
                    subcells: vec![Subcell {
                        cell_id_extension: 0x05,
                        transposer_frequency: 482_000_000,
                    }],
                },
                Cell {
                    cell_id: 0x0304,
                    frequency: 490_000_000,
                    subcells: Vec::new(),
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_cell_list_binary() {
        let d = two_cells();
        let bin = d.serialize().unwrap();
        assert_eq!(bin.payload_size(), (2 + 4 + 1 + 5) + (2 + 4 + 1));
        assert_eq!(
            bin.payload(),
            &[
                0x01, 0x02, 0x02, 0xD3, 0x44, 0x40, 0x05, // cell 1
                0x05, 0x02, 0xDF, 0x79, 0x40, // subcell
                0x03, 0x04, 0x02, 0xEB, 0xAE, 0x40, 0x00, // cell 2
            ]
        );

        let mut back = CellFrequencyLinkDescriptor::default();
        back.deserialize(&bin);
        assert!(back.is_valid());
        assert_eq!(back, d);
        assert_eq!(back.cells[0].subcells.len(), 1);
        assert!(back.cells[1].subcells.is_empty());
    }

    #[test]
    fn test_cell_list_truncated() {
        let bin = two_cells().serialize().unwrap();
        for len in 0..bin.payload_size() {
            let short = Descriptor::new(bin.tag(), bin.payload()[..len].to_vec()).unwrap();
            let mut d = CellFrequencyLinkDescriptor::default();
            d.deserialize(&short);
            assert_eq!(d.is_valid(), len == 0 || len == 12, "length {}", len);
        }
    }

    #[test]
    fn test_frequency_out_of_range() {
        let mut d = two_cells();
        d.cells[1].frequency = MAX_FREQUENCY + 10;
        assert!(matches!(
            d.serialize(),
            Err(EncodeError::FieldOutOfRange { field: "frequency", .. })
        ));
    }

    #[test]
    fn test_partial_entries_not_decoded() {
        let bin = two_cells().serialize().unwrap();
        // Complete first cell followed by 3 bytes of the second one.
        let short = Descriptor::new(bin.tag(), bin.payload()[..15].to_vec()).unwrap();
        let mut d = CellFrequencyLinkDescriptor::default();
        d.deserialize(&short);
        assert!(!d.is_valid());
        assert_eq!(d.cells, two_cells().cells[..1].to_vec());

        // Subcell loop of 3 bytes: no complete subcell.
        let odd = Descriptor::new(did::CELL_FREQUENCY_LINK, vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x0A, 0x03, 0x01, 0x02, 0x03])
            .unwrap();
        d.deserialize(&odd);
        assert!(!d.is_valid());
        assert_eq!(d.cells.len(), 1);
        assert!(d.cells[0].subcells.is_empty());
    }

    #[test]
    fn test_frequency_not_multiple_of_10() {
        let mut d = two_cells();
        d.cells[0].frequency = 474_000_005;
        assert!(matches!(d.serialize(), Err(EncodeError::Inconsistent { .. })));

        let mut d = two_cells();
        d.cells[0].subcells[0].transposer_frequency = 482_000_001;
        assert!(matches!(d.serialize(), Err(EncodeError::Inconsistent { .. })));

        let element = Element::parse(
            r#"<cell_frequency_link_descriptor><cell cell_id="1" frequency="474000007"/></cell_frequency_link_descriptor>"#,
        )
        .unwrap();
        let mut d = CellFrequencyLinkDescriptor::default();
        assert!(matches!(d.from_xml(&element), Err(XmlError::Inconsistent { .. })));
        assert!(!d.is_valid());
    }

    #[test]
    fn test_cell_list_xml() {
        let d = two_cells();
        let mut root = Element::new("root");
        d.to_xml(&mut root);
        let text = root.children()[0].to_xml_string();
        let parsed = Element::parse(&text).unwrap();
        assert_eq!(parsed.children()[0].attribute("cell_id"), Some("0x0102"));
        assert_eq!(parsed.children()[0].attribute("frequency"), Some("474000000"));

        let mut back = CellFrequencyLinkDescriptor::default();
        back.from_xml(&parsed).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn test_cell_list_display() {
        let bin = two_cells().serialize().unwrap();
        let mut disp = TablesDisplay::new();
        let mut buf = PsiBuffer::from_bytes(bin.payload());
        display(&mut disp, &mut buf, "", &EDID);
        assert_eq!(
            disp.output(),
            "- Cell id: 0x0102, frequency: 474000000 Hz\n  \
             Subcell id ext: 0x05, frequency: 482000000 Hz\n\
             - Cell id: 0x0304, frequency: 490000000 Hz\n"
        );
    }
}
