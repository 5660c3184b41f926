//! MPEG HEVC_video_descriptor.
//!
//! 13 bytes, or 15 when the temporal layer subset is described. The
//! temporal_id_min and temporal_id_max fields are both present or both
//! absent.

use crate::abstract_descriptor::{check_bits, AbstractDescriptor, Validity};
use crate::buffer::PsiBuffer;
use crate::display::TablesDisplay;
use crate::edid::{did, Edid, Standards};
use crate::error::{EncodeError, XmlError};
use crate::repository::RepositoryBuilder;
use crate::xml::Element;

pub const XML_NAME: &str = "HEVC_video_descriptor";
const EDID: Edid = Edid::standard(did::HEVC_VIDEO, Standards::MPEG);

const MAX_COPIED_44BITS: u64 = (1 << 44) - 1;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HevcVideoDescriptor {
    /// 2 bits.
    pub profile_space: u8,
    pub tier: bool,
    /// 5 bits.
    pub profile_idc: u8,
    pub profile_compatibility_indication: u32,
    pub progressive_source: bool,
    pub interlaced_source: bool,
    pub non_packed_constraint: bool,
    pub frame_only_constraint: bool,
    /// 44 bits.
    pub copied_44bits: u64,
    pub level_idc: u8,
    pub hevc_still_present: bool,
    pub hevc_24hr_picture_present: bool,
    pub sub_pic_hrd_params_not_present: bool,
    /// 2 bits.
    pub hdr_wcg_idc: u8,
    /// 3 bits.
    pub temporal_id_min: Option<u8>,
    /// 3 bits.
    pub temporal_id_max: Option<u8>,
    valid: Validity,
}

impl AbstractDescriptor for HevcVideoDescriptor {
    descriptor_identity!(XML_NAME, EDID);

    fn clear_content(&mut self) {
        let valid = self.valid;
        *self = HevcVideoDescriptor {
            valid,
            ..Default::default()
        };
    }

    fn serialize_payload(&self, buf: &mut PsiBuffer) -> Result<(), EncodeError> {
        let temporal = match (self.temporal_id_min, self.temporal_id_max) {
            (Some(min), Some(max)) => Some((min, max)),
            (None, None) => None,
            _ => {
                return Err(EncodeError::Inconsistent {
                    descriptor: XML_NAME,
                    message: "temporal_id_min and temporal_id_max must be both set or both unset",
                })
            }
        };
        check_bits(XML_NAME, "profile_space", self.profile_space as u64, 2)?;
        check_bits(XML_NAME, "profile_idc", self.profile_idc as u64, 5)?;
        check_bits(XML_NAME, "copied_44bits", self.copied_44bits, 44)?;
        check_bits(XML_NAME, "HDR_WCG_idc", self.hdr_wcg_idc as u64, 2)?;
        if let Some((min, max)) = temporal {
            check_bits(XML_NAME, "temporal_id_min", min as u64, 3)?;
            check_bits(XML_NAME, "temporal_id_max", max as u64, 3)?;
        }

        buf.put_bits(self.profile_space as u64, 2);
        buf.put_bit(self.tier);
        buf.put_bits(self.profile_idc as u64, 5);
        buf.put_u32(self.profile_compatibility_indication);
        buf.put_bit(self.progressive_source);
        buf.put_bit(self.interlaced_source);
        buf.put_bit(self.non_packed_constraint);
        buf.put_bit(self.frame_only_constraint);
        buf.put_bits(self.copied_44bits, 44);
        buf.put_u8(self.level_idc);
        buf.put_bit(temporal.is_some());
        buf.put_bit(self.hevc_still_present);
        buf.put_bit(self.hevc_24hr_picture_present);
        buf.put_bit(self.sub_pic_hrd_params_not_present);
        buf.put_reserved(2);
        buf.put_bits(self.hdr_wcg_idc as u64, 2);
        if let Some((min, max)) = temporal {
            buf.put_bits(min as u64, 3);
            buf.put_reserved(5);
            buf.put_bits(max as u64, 3);
            buf.put_reserved(5);
        }
        Ok(())
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer) {
        self.profile_space = buf.get_bits(2) as u8;
        self.tier = buf.get_bit();
        self.profile_idc = buf.get_bits(5) as u8;
        self.profile_compatibility_indication = buf.get_u32();
        self.progressive_source = buf.get_bit();
        self.interlaced_source = buf.get_bit();
        self.non_packed_constraint = buf.get_bit();
        self.frame_only_constraint = buf.get_bit();
        self.copied_44bits = buf.get_bits(44);
        self.level_idc = buf.get_u8();
        let temporal = buf.get_bit();
        self.hevc_still_present = buf.get_bit();
        self.hevc_24hr_picture_present = buf.get_bit();
        self.sub_pic_hrd_params_not_present = buf.get_bit();
        buf.skip_reserved_bits(2);
        self.hdr_wcg_idc = buf.get_bits(2) as u8;
        if temporal {
            self.temporal_id_min = Some(buf.get_bits(3) as u8);
            buf.skip_reserved_bits(5);
            self.temporal_id_max = Some(buf.get_bits(3) as u8);
            buf.skip_reserved_bits(5);
        }
    }

    fn build_xml(&self, root: &mut Element) {
        root.set_int_attribute("profile_space", self.profile_space);
        root.set_bool_attribute("tier_flag", self.tier);
        root.set_int_attribute("profile_idc", self.profile_idc);
        root.set_hex_int_attribute(
            "profile_compatibility_indication",
            self.profile_compatibility_indication as u64,
            8,
        );
        root.set_bool_attribute("progressive_source_flag", self.progressive_source);
        root.set_bool_attribute("interlaced_source_flag", self.interlaced_source);
        root.set_bool_attribute("non_packed_constraint_flag", self.non_packed_constraint);
        root.set_bool_attribute("frame_only_constraint_flag", self.frame_only_constraint);
        root.set_hex_int_attribute("copied_44bits", self.copied_44bits, 11);
        root.set_int_attribute("level_idc", self.level_idc);
        root.set_bool_attribute("HEVC_still_present_flag", self.hevc_still_present);
        root.set_bool_attribute("HEVC_24hr_picture_present_flag", self.hevc_24hr_picture_present);
        root.set_bool_attribute("sub_pic_hrd_params_not_present_flag", self.sub_pic_hrd_params_not_present);
        root.set_int_attribute("HDR_WCG_idc", self.hdr_wcg_idc);
        root.set_optional_int_attribute("temporal_id_min", self.temporal_id_min);
        root.set_optional_int_attribute("temporal_id_max", self.temporal_id_max);
    }

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        self.profile_space = element.get_int_attribute::<u8>("profile_space", 0, 3)?;
        self.tier = element.get_bool_attribute("tier_flag")?;
        self.profile_idc = element.get_int_attribute::<u8>("profile_idc", 0, 0x1F)?;
        self.profile_compatibility_indication =
            element.get_int_attribute::<u32>("profile_compatibility_indication", 0, u32::MAX)?;
        self.progressive_source = element.get_bool_attribute("progressive_source_flag")?;
        self.interlaced_source = element.get_bool_attribute("interlaced_source_flag")?;
        self.non_packed_constraint = element.get_bool_attribute("non_packed_constraint_flag")?;
        self.frame_only_constraint = element.get_bool_attribute("frame_only_constraint_flag")?;
        self.copied_44bits = element.get_int_attribute_or::<u64>("copied_44bits", 0, 0, MAX_COPIED_44BITS)?;
        self.level_idc = element.get_int_attribute::<u8>("level_idc", 0, u8::MAX)?;
        self.hevc_still_present = element.get_bool_attribute("HEVC_still_present_flag")?;
        self.hevc_24hr_picture_present = element.get_bool_attribute("HEVC_24hr_picture_present_flag")?;
        self.sub_pic_hrd_params_not_present =
            element.get_bool_attribute_or("sub_pic_hrd_params_not_present_flag", false)?;
        self.hdr_wcg_idc = element.get_int_attribute_or::<u8>("HDR_WCG_idc", 3, 0, 3)?;
        self.temporal_id_min = element.get_optional_int_attribute::<u8>("temporal_id_min", 0, 7)?;
        self.temporal_id_max = element.get_optional_int_attribute::<u8>("temporal_id_max", 0, 7)?;
        if self.temporal_id_min.is_some() != self.temporal_id_max.is_some() {
            return Err(XmlError::Inconsistent {
                element: element.name().to_string(),
                message: "temporal_id_min and temporal_id_max must be both set or both unset".to_string(),
            });
        }
        Ok(())
    }
}

fn display(disp: &mut TablesDisplay, buf: &mut PsiBuffer, margin: &str, _edid: &Edid) {
    if !buf.can_read_bytes(13) {
        return;
    }
    let space = buf.get_bits(2);
    let tier = buf.get_bit();
    let idc = buf.get_bits(5);
    disp.line(
        margin,
        format_args!("Profile space: {}, tier: {}, profile IDC: {}", space, u8::from(tier), idc),
    );
    disp.line(
        margin,
        format_args!("Profile compatibility: 0x{:08X}", buf.get_u32()),
    );
    let progressive = buf.get_bit();
    let interlaced = buf.get_bit();
    let non_packed = buf.get_bit();
    let frame_only = buf.get_bit();
    disp.line(
        margin,
        format_args!(
            "Progressive source: {}, interlaced source: {}, non packed: {}, frame only: {}",
            progressive, interlaced, non_packed, frame_only
        ),
    );
    disp.line(margin, format_args!("Copied 44 bits: 0x{:011X}", buf.get_bits(44)));
    disp.line(margin, format_args!("Level IDC: {}", buf.get_u8()));
    let temporal = buf.get_bit();
    let still = buf.get_bit();
    let hr24 = buf.get_bit();
    disp.line(
        margin,
        format_args!("Still pictures: {}, 24-hour pictures: {}", still, hr24),
    );
    let no_sub_pic_hrd = buf.get_bit();
    buf.skip_reserved_bits(2);
    disp.line(
        margin,
        format_args!("No sub-pic HRD params: {}, HDR WCG idc: {}", no_sub_pic_hrd, buf.get_bits(2)),
    );
    if temporal && buf.can_read_bytes(2) {
        let min = buf.get_bits(3);
        buf.skip_reserved_bits(5);
        let max = buf.get_bits(3);
        buf.skip_reserved_bits(5);
        disp.line(margin, format_args!("Temporal id min: {}, max: {}", min, max));
    }
}

fn factory() -> Box<dyn AbstractDescriptor> {
    Box::<HevcVideoDescriptor>::default()
}

pub fn register(builder: &mut RepositoryBuilder) {
    builder.register(factory, &[EDID], XML_NAME, Some(display));
}
