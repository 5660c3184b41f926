//! DVB terrestrial_delivery_system_descriptor (DVB-T), 11 bytes.
//!
//! ```text
//! centre_frequency                 32  (10 Hz units)
//! bandwidth                         3
//! priority                          1
//! time_slicing_indicator            1
//! MPE-FEC_indicator                 1
//! reserved                          2
//! constellation                     2
//! hierarchy_information             3
//! code_rate-HP_stream               3
//! code_rate-LP_stream               3
//! guard_interval                    2
//! transmission_mode                 2
//! other_frequency_flag              1
//! reserved                         32
//! ```

use crate::abstract_descriptor::{check_bits, AbstractDescriptor, Validity};
use crate::buffer::PsiBuffer;
use crate::display::TablesDisplay;
use crate::edid::{did, Edid, Standards};
use crate::error::{EncodeError, XmlError};
use crate::repository::RepositoryBuilder;
use crate::xml::Element;

pub const XML_NAME: &str = "terrestrial_delivery_system_descriptor";
const EDID: Edid = Edid::standard(did::TERRESTRIAL_DELIVERY, Standards::DVB);

const MAX_FREQUENCY: u64 = u32::MAX as u64 * 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerrestrialDeliverySystemDescriptor {
    /// Hz.
    pub centre_frequency: u64,
    /// 3 bits.
    pub bandwidth: u8,
    /// Must be set when hierarchy is 0.
    pub high_priority: bool,
    pub no_time_slicing: bool,
    pub no_mpe_fec: bool,
    /// 2 bits.
    pub constellation: u8,
    /// 3 bits.
    pub hierarchy: u8,
    /// 3 bits.
    pub code_rate_hp: u8,
    /// 3 bits.
    pub code_rate_lp: u8,
    /// 2 bits.
    pub guard_interval: u8,
    /// 2 bits.
    pub transmission_mode: u8,
    pub other_frequency: bool,
    valid: Validity,
}

fn bandwidth_name(value: u8) -> &'static str {
    match value {
        0 => "8 MHz",
        1 => "7 MHz",
        2 => "6 MHz",
        3 => "5 MHz",
        _ => "reserved",
    }
}

fn constellation_name(value: u8) -> &'static str {
    match value {
        0 => "QPSK",
        1 => "16-QAM",
        2 => "64-QAM",
        _ => "reserved",
    }
}

fn code_rate_name(value: u8) -> &'static str {
    match value {
        0 => "1/2",
        1 => "2/3",
        2 => "3/4",
        3 => "5/6",
        4 => "7/8",
        _ => "reserved",
    }
}

fn guard_interval_name(value: u8) -> &'static str {
    match value {
        0 => "1/32",
        1 => "1/16",
        2 => "1/8",
        _ => "1/4",
    }
}

fn transmission_mode_name(value: u8) -> &'static str {
    match value {
        0 => "2k",
        1 => "8k",
        2 => "4k",
        _ => "reserved",
    }
}

impl AbstractDescriptor for TerrestrialDeliverySystemDescriptor {
    descriptor_identity!(XML_NAME, EDID);

    fn clear_content(&mut self) {
        let valid = self.valid;
        *self = TerrestrialDeliverySystemDescriptor {
            valid,
            ..Default::default()
        };
    }

    fn serialize_payload(&self, buf: &mut PsiBuffer) -> Result<(), EncodeError> {
        if self.centre_frequency > MAX_FREQUENCY {
            return Err(EncodeError::FieldOutOfRange {
                descriptor: XML_NAME,
                field: "centre_frequency",
                value: self.centre_frequency,
                max: MAX_FREQUENCY,
            });
        }
        if self.centre_frequency % 10 != 0 {
            return Err(EncodeError::Inconsistent {
                descriptor: XML_NAME,
                message: "centre_frequency is not a multiple of 10 Hz",
            });
        }
        let fields = [
            ("bandwidth", self.bandwidth, 3),
            ("constellation", self.constellation, 2),
            ("hierarchy_information", self.hierarchy, 3),
            ("code_rate_HP_stream", self.code_rate_hp, 3),
            ("code_rate_LP_stream", self.code_rate_lp, 3),
            ("guard_interval", self.guard_interval, 2),
            ("transmission_mode", self.transmission_mode, 2),
        ];
        for (field, value, bits) in fields {
            check_bits(XML_NAME, field, value as u64, bits)?;
        }

        buf.put_u32((self.centre_frequency / 10) as u32);
        buf.put_bits(self.bandwidth as u64, 3);
        buf.put_bit(self.high_priority);
        buf.put_bit(self.no_time_slicing);
        buf.put_bit(self.no_mpe_fec);
        buf.put_reserved(2);
        buf.put_bits(self.constellation as u64, 2);
        buf.put_bits(self.hierarchy as u64, 3);
        buf.put_bits(self.code_rate_hp as u64, 3);
        buf.put_bits(self.code_rate_lp as u64, 3);
        buf.put_bits(self.guard_interval as u64, 2);
        buf.put_bits(self.transmission_mode as u64, 2);
        buf.put_bit(self.other_frequency);
        buf.put_reserved(32);
        Ok(())
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer) {
        self.centre_frequency = buf.get_u32() as u64 * 10;
        self.bandwidth = buf.get_bits(3) as u8;
        self.high_priority = buf.get_bit();
        self.no_time_slicing = buf.get_bit();
        self.no_mpe_fec = buf.get_bit();
        buf.skip_reserved_bits(2);
        self.constellation = buf.get_bits(2) as u8;
        self.hierarchy = buf.get_bits(3) as u8;
        self.code_rate_hp = buf.get_bits(3) as u8;
        self.code_rate_lp = buf.get_bits(3) as u8;
        self.guard_interval = buf.get_bits(2) as u8;
        self.transmission_mode = buf.get_bits(2) as u8;
        self.other_frequency = buf.get_bit();
        buf.skip_reserved_bits(32);
    }

    fn build_xml(&self, root: &mut Element) {
        root.set_int_attribute("centre_frequency", self.centre_frequency);
        root.set_int_attribute("bandwidth", self.bandwidth);
        root.set_bool_attribute("priority", self.high_priority);
        root.set_bool_attribute("no_time_slicing", self.no_time_slicing);
        root.set_bool_attribute("no_MPE_FEC", self.no_mpe_fec);
        root.set_int_attribute("constellation", self.constellation);
        root.set_int_attribute("hierarchy_information", self.hierarchy);
        root.set_int_attribute("code_rate_HP_stream", self.code_rate_hp);
        root.set_int_attribute("code_rate_LP_stream", self.code_rate_lp);
        root.set_int_attribute("guard_interval", self.guard_interval);
        root.set_int_attribute("transmission_mode", self.transmission_mode);
        root.set_bool_attribute("other_frequency", self.other_frequency);
    }

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        self.centre_frequency = element.get_int_attribute::<u64>("centre_frequency", 0, MAX_FREQUENCY)?;
        if self.centre_frequency % 10 != 0 {
            return Err(XmlError::Inconsistent {
                element: element.name().to_string(),
                message: format!("centre_frequency {} Hz is not a multiple of 10 Hz", self.centre_frequency),
            });
        }
        self.bandwidth = element.get_int_attribute::<u8>("bandwidth", 0, 7)?;
        self.high_priority = element.get_bool_attribute("priority")?;
        self.no_time_slicing = element.get_bool_attribute("no_time_slicing")?;
        self.no_mpe_fec = element.get_bool_attribute("no_MPE_FEC")?;
        self.constellation = element.get_int_attribute::<u8>("constellation", 0, 3)?;
        self.hierarchy = element.get_int_attribute::<u8>("hierarchy_information", 0, 7)?;
        self.code_rate_hp = element.get_int_attribute::<u8>("code_rate_HP_stream", 0, 7)?;
        self.code_rate_lp = element.get_int_attribute::<u8>("code_rate_LP_stream", 0, 7)?;
        self.guard_interval = element.get_int_attribute::<u8>("guard_interval", 0, 3)?;
        self.transmission_mode = element.get_int_attribute::<u8>("transmission_mode", 0, 3)?;
        self.other_frequency = element.get_bool_attribute("other_frequency")?;
        Ok(())
    }
}

fn display(disp: &mut TablesDisplay, buf: &mut PsiBuffer, margin: &str, _edid: &Edid) {
    if !buf.can_read_bytes(11) {
        return;
    }
    disp.line(margin, format_args!("Centre frequency: {} Hz", buf.get_u32() as u64 * 10));
    let bandwidth = buf.get_bits(3) as u8;
    disp.line(margin, format_args!("Bandwidth: {}", bandwidth_name(bandwidth)));
    let priority = if buf.get_bit() { "high" } else { "low" };
    disp.line(margin, format_args!("Priority: {}", priority));
    let time_slicing = buf.get_bit();
    let mpe_fec = buf.get_bit();
    disp.line(
        margin,
        format_args!("Time slicing: {}, MPE-FEC: {}", !time_slicing, !mpe_fec),
    );
    buf.skip_reserved_bits(2);
    let constellation = buf.get_bits(2) as u8;
    disp.line(margin, format_args!("Constellation pattern: {}", constellation_name(constellation)));
    disp.line(margin, format_args!("Hierarchy: {}", buf.get_bits(3)));
    let hp = buf.get_bits(3) as u8;
    let lp = buf.get_bits(3) as u8;
    disp.line(
        margin,
        format_args!("Code rate: high prio: {}, low prio: {}", code_rate_name(hp), code_rate_name(lp)),
    );
    let guard = buf.get_bits(2) as u8;
    disp.line(margin, format_args!("Guard interval: {}", guard_interval_name(guard)));
    let mode = buf.get_bits(2) as u8;
    disp.line(margin, format_args!("Transmission mode: {}", transmission_mode_name(mode)));
    disp.line(margin, format_args!("Other frequencies: {}", buf.get_bit()));
    buf.skip_reserved_bits(32);
}

fn factory() -> Box<dyn AbstractDescriptor> {
    Box::<TerrestrialDeliverySystemDescriptor>::default()
}

pub fn register(builder: &mut RepositoryBuilder) {
    builder.register(factory, &[EDID], XML_NAME, Some(display));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_max() -> TerrestrialDeliverySystemDescriptor {
        TerrestrialDeliverySystemDescriptor {
            centre_frequency: MAX_FREQUENCY,
            bandwidth: 7,
            high_priority: true,
            no_time_slicing: true,
            no_mpe_fec: true,
            constellation: 3,
            hierarchy: 7,
            code_rate_hp: 7,
            code_rate_lp: 7,
            guard_interval: 3,
            transmission_mode: 3,
            other_frequency: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_bit_packing_at_maximum() {
        let d = all_max();
        let bin = d.serialize().unwrap();
        assert_eq!(
            bin.payload(),
            &[0xFF, 0xFF, 0xFF, 0xFF, 0xFC, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00]
        );
        let mut back = TerrestrialDeliverySystemDescriptor::default();
        back.deserialize(&bin);
        assert!(back.is_valid());
        assert_eq!(back, d);
    }

    #[test]
    fn test_bit_packing_isolated_fields() {
        // One field at a time, so a shift error in a shared byte shows up.
        let mut d = TerrestrialDeliverySystemDescriptor {
            code_rate_hp: 5,
            ..Default::default()
        };
        assert_eq!(&d.serialize().unwrap().payload()[4..7], &[0x00, 0x05, 0x00]);

        d.code_rate_hp = 0;
        d.code_rate_lp = 5;
        assert_eq!(&d.serialize().unwrap().payload()[4..7], &[0x00, 0x00, 0xA0]);

        d.code_rate_lp = 0;
        d.hierarchy = 4;
        d.other_frequency = true;
        assert_eq!(&d.serialize().unwrap().payload()[4..7], &[0x00, 0x20, 0x01]);

        d.hierarchy = 0;
        d.other_frequency = false;
        d.bandwidth = 2;
        d.no_mpe_fec = true;
        assert_eq!(&d.serialize().unwrap().payload()[4..7], &[0x44, 0x00, 0x00]);
    }

    #[test]
    fn test_reserved_bits_ignored_on_read() {
        let mut bytes = all_max().serialize().unwrap().payload().to_vec();
        bytes[4] |= 0x03;
        bytes[7..].copy_from_slice(&[0xFF; 4]);
        let bin = crate::descriptor::Descriptor::new(0x5A, bytes).unwrap();
        let mut d = TerrestrialDeliverySystemDescriptor::default();
        d.deserialize(&bin);
        assert!(d.is_valid());
        assert_eq!(d, all_max());
        // Re-encoding normalizes reserved bits to zero.
        assert_eq!(d.serialize().unwrap(), all_max().serialize().unwrap());
    }

    #[test]
    fn test_field_too_wide() {
        let d = TerrestrialDeliverySystemDescriptor {
            constellation: 4,
            ..Default::default()
        };
        assert_eq!(
            d.serialize(),
            Err(EncodeError::FieldOutOfRange {
                descriptor: XML_NAME,
                field: "constellation",
                value: 4,
                max: 3
            })
        );
    }

    #[test]
    fn test_centre_frequency_not_multiple_of_10() {
        let d = TerrestrialDeliverySystemDescriptor {
            centre_frequency: 474_000_005,
            ..Default::default()
        };
        assert!(matches!(d.serialize(), Err(EncodeError::Inconsistent { .. })));

        let mut root = Element::new("root");
        all_max().to_xml(&mut root);
        let mut e = root.children()[0].clone();
        e.set_attribute("centre_frequency", "474000007");
        let mut back = TerrestrialDeliverySystemDescriptor::default();
        assert!(matches!(back.from_xml(&e), Err(XmlError::Inconsistent { .. })));
        assert!(!back.is_valid());
    }

    #[test]
    fn test_terrestrial_xml() {
        let d = all_max();
        let mut root = Element::new("root");
        d.to_xml(&mut root);
        let mut back = TerrestrialDeliverySystemDescriptor::default();
        back.from_xml(&root.children()[0]).unwrap();
        assert_eq!(back, d);
    }
}
