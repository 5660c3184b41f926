//! DVB DTS-HD_audio_stream_descriptor, a member of the extension_descriptor
//! family (tag 0x7F, extended tag 0x0E).
//!
//! ```text
//! substream_core_flag 1, substream_0_flag 1, ... substream_3_flag 1, reserved 3
//! for each present substream:
//!   substream_length        8
//!   num_assets - 1          3
//!   channel_count           5
//!   LFE_flag                1
//!   sampling_frequency      4
//!   sample_resolution       1
//!   reserved                2
//!   for each asset:
//!     asset_construction    5
//!     vbr_flag              1
//!     post_encode_br_scaling_flag 1
//!     component_type_flag   1
//!     ISO_639_language_code_flag 1
//!     bit_rate             13
//!     reserved              2
//!     component_type        8   (if flag)
//!     ISO_639_language_code 24  (if flag)
//! additional_info           remaining bytes
//! ```

use crate::abstract_descriptor::{check_bits, AbstractDescriptor, Validity};
use crate::buffer::{PsiBuffer, MAX_DESCRIPTOR_PAYLOAD};
use crate::display::TablesDisplay;
use crate::edid::{did, xdid, Edid, Standards};
use crate::error::{EncodeError, XmlError};
use crate::repository::RepositoryBuilder;
use crate::xml::Element;

pub const XML_NAME: &str = "DTS_HD_descriptor";
const EDID: Edid = Edid::extension(did::DVB_EXTENSION, xdid::DTS_HD_AUDIO, Standards::DVB);

/// Substream names, in flag order.
pub const SUBSTREAM_NAMES: [&str; 5] = [
    "substream_core",
    "substream_0",
    "substream_1",
    "substream_2",
    "substream_3",
];

const MAX_ASSETS: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DtsHdAssetInfo {
    /// 5 bits, bit mask.
    pub asset_construction: u8,
    pub vbr: bool,
    /// The bit rate is coded as 10.3 bits.
    pub post_encode_br_scaling: bool,
    /// 13 bits.
    pub bit_rate: u16,
    pub component_type: Option<u8>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DtsHdSubstreamInfo {
    /// 5 bits.
    pub channel_count: u8,
    pub lfe: bool,
    /// 4 bits.
    pub sampling_frequency: u8,
    /// More than 16 bits per sample.
    pub sample_resolution: bool,
    /// 1 to 8 assets.
    pub asset_info: Vec<DtsHdAssetInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DtsHdDescriptor {
    /// Core substream, then substreams 0 to 3.
    pub substreams: [Option<DtsHdSubstreamInfo>; 5],
    pub additional_info: Vec<u8>,
    valid: Validity,
}

impl DtsHdAssetInfo {
    fn write(&self, buf: &mut PsiBuffer) -> Result<(), EncodeError> {
        check_bits(XML_NAME, "asset_construction", self.asset_construction as u64, 5)?;
        check_bits(XML_NAME, "bit_rate", self.bit_rate as u64, 13)?;
        buf.put_bits(self.asset_construction as u64, 5);
        buf.put_bit(self.vbr);
        buf.put_bit(self.post_encode_br_scaling);
        buf.put_bit(self.component_type.is_some());
        buf.put_bit(self.language.is_some());
        buf.put_bits(self.bit_rate as u64, 13);
        buf.put_reserved(2);
        if let Some(ct) = self.component_type {
            buf.put_u8(ct);
        }
        if let Some(lang) = &self.language {
            buf.put_language_code(lang);
        }
        Ok(())
    }

    fn read(buf: &mut PsiBuffer) -> Self {
        let asset_construction = buf.get_bits(5) as u8;
        let vbr = buf.get_bit();
        let post_encode_br_scaling = buf.get_bit();
        let has_component_type = buf.get_bit();
        let has_language = buf.get_bit();
        let bit_rate = buf.get_bits(13) as u16;
        buf.skip_reserved_bits(2);
        let component_type = has_component_type.then(|| buf.get_u8());
        let language = has_language.then(|| buf.get_language_code());
        DtsHdAssetInfo {
            asset_construction,
            vbr,
            post_encode_br_scaling,
            bit_rate,
            component_type,
            language,
        }
    }

    fn to_xml(&self, parent: &mut Element) {
        let e = parent.add_element("asset_info");
        e.set_hex_int_attribute("asset_construction", self.asset_construction as u64, 2);
        e.set_bool_attribute("vbr", self.vbr);
        e.set_bool_attribute("post_encode_br_scaling", self.post_encode_br_scaling);
        e.set_int_attribute("bit_rate", self.bit_rate);
        if let Some(ct) = self.component_type {
            e.set_hex_int_attribute("component_type", ct as u64, 2);
        }
        if let Some(lang) = &self.language {
            e.set_attribute("ISO_639_language_code", lang.as_str());
        }
    }

    fn from_xml(e: &Element) -> Result<Self, XmlError> {
        let language = match e.attribute("ISO_639_language_code") {
            Some(code) if code.chars().count() == 3 && code.chars().all(|c| (c as u32) < 0x100) => {
                Some(code.to_string())
            }
            Some(code) => {
                return Err(XmlError::InvalidAttribute {
                    element: e.name().to_string(),
                    attribute: "ISO_639_language_code".to_string(),
                    value: code.to_string(),
                })
            }
            None => None,
        };
        Ok(DtsHdAssetInfo {
            asset_construction: e.get_int_attribute::<u8>("asset_construction", 0, 0x1F)?,
            vbr: e.get_bool_attribute("vbr")?,
            post_encode_br_scaling: e.get_bool_attribute("post_encode_br_scaling")?,
            bit_rate: e.get_int_attribute::<u16>("bit_rate", 0, 0x1FFF)?,
            component_type: e.get_optional_int_attribute::<u8>("component_type", 0, u8::MAX)?,
            language,
        })
    }
}

impl DtsHdSubstreamInfo {
    fn write(&self, buf: &mut PsiBuffer) -> Result<(), EncodeError> {
        if self.asset_info.is_empty() || self.asset_info.len() > MAX_ASSETS {
            return Err(EncodeError::Inconsistent {
                descriptor: XML_NAME,
                message: "a substream has 1 to 8 assets",
            });
        }
        check_bits(XML_NAME, "channel_count", self.channel_count as u64, 5)?;
        check_bits(XML_NAME, "sampling_frequency", self.sampling_frequency as u64, 4)?;
        buf.push_write_sequence_with_leading_length(8);
        buf.put_bits(self.asset_info.len() as u64 - 1, 3);
        buf.put_bits(self.channel_count as u64, 5);
        buf.put_bit(self.lfe);
        buf.put_bits(self.sampling_frequency as u64, 4);
        buf.put_bit(self.sample_resolution);
        buf.put_reserved(2);
        for asset in &self.asset_info {
            asset.write(buf)?;
        }
        buf.pop_state();
        Ok(())
    }

    fn read(buf: &mut PsiBuffer) -> Self {
        buf.push_read_size_from_length(8);
        let num_assets = buf.get_bits(3) as usize + 1;
        let mut info = DtsHdSubstreamInfo {
            channel_count: buf.get_bits(5) as u8,
            lfe: buf.get_bit(),
            sampling_frequency: buf.get_bits(4) as u8,
            sample_resolution: buf.get_bit(),
            asset_info: Vec::with_capacity(num_assets),
        };
        buf.skip_reserved_bits(2);
        for _ in 0..num_assets {
            if buf.read_error() {
                break;
            }
            info.asset_info.push(DtsHdAssetInfo::read(buf));
        }
        // substream_length must cover exactly the declared assets.
        if !buf.read_error() && buf.can_read() {
            buf.set_user_error();
        }
        buf.pop_state();
        info
    }

    fn to_xml(&self, parent: &mut Element, name: &str) {
        let e = parent.add_element(name);
        e.set_int_attribute("channel_count", self.channel_count);
        e.set_bool_attribute("LFE", self.lfe);
        e.set_hex_int_attribute("sampling_frequency", self.sampling_frequency as u64, 1);
        e.set_bool_attribute("sample_resolution", self.sample_resolution);
        for asset in &self.asset_info {
            asset.to_xml(e);
        }
    }

    fn from_xml(e: &Element) -> Result<Self, XmlError> {
        let mut info = DtsHdSubstreamInfo {
            channel_count: e.get_int_attribute::<u8>("channel_count", 0, 0x1F)?,
            lfe: e.get_bool_attribute("LFE")?,
            sampling_frequency: e.get_int_attribute::<u8>("sampling_frequency", 0, 0x0F)?,
            sample_resolution: e.get_bool_attribute("sample_resolution")?,
            asset_info: Vec::new(),
        };
        for asset in e.get_children("asset_info", 1, MAX_ASSETS)? {
            info.asset_info.push(DtsHdAssetInfo::from_xml(asset)?);
        }
        Ok(info)
    }
}

impl AbstractDescriptor for DtsHdDescriptor {
    descriptor_identity!(XML_NAME, EDID);

    fn display_name(&self) -> &'static str {
        "DTS-HD audio stream descriptor"
    }

    fn clear_content(&mut self) {
        self.substreams = Default::default();
        self.additional_info.clear();
    }

    fn serialize_payload(&self, buf: &mut PsiBuffer) -> Result<(), EncodeError> {
        for s in &self.substreams {
            buf.put_bit(s.is_some());
        }
        buf.put_reserved(3);
        for s in self.substreams.iter().flatten() {
            s.write(buf)?;
        }
        buf.put_bytes(&self.additional_info);
        Ok(())
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer) {
        let mut present = [false; 5];
        for p in present.iter_mut() {
            *p = buf.get_bit();
        }
        buf.skip_reserved_bits(3);
        for (slot, present) in self.substreams.iter_mut().zip(present) {
            if present && !buf.read_error() {
                *slot = Some(DtsHdSubstreamInfo::read(buf));
            }
        }
        self.additional_info = buf.get_remaining_bytes();
    }

    fn build_xml(&self, root: &mut Element) {
        for (s, name) in self.substreams.iter().zip(SUBSTREAM_NAMES) {
            if let Some(s) = s {
                s.to_xml(root, name);
            }
        }
        if !self.additional_info.is_empty() {
            root.set_bytes_attribute("additional_info", &self.additional_info);
        }
    }

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        for (slot, name) in self.substreams.iter_mut().zip(SUBSTREAM_NAMES) {
            *slot = match element.get_optional_child(name)? {
                Some(e) => Some(DtsHdSubstreamInfo::from_xml(e)?),
                None => None,
            };
        }
        self.additional_info = element
            .get_optional_bytes_attribute("additional_info", MAX_DESCRIPTOR_PAYLOAD)?
            .unwrap_or_default();
        Ok(())
    }
}

fn display_substream(disp: &mut TablesDisplay, buf: &mut PsiBuffer, margin: &str, name: &str) {
    let info = DtsHdSubstreamInfo::read(buf);
    if buf.read_error() {
        return;
    }
    disp.line(
        margin,
        format_args!(
            "{}: {} channels, LFE: {}, sampling frequency: {}, sample resolution > 16 bits: {}",
            name, info.channel_count, info.lfe, info.sampling_frequency, info.sample_resolution
        ),
    );
    let inner = disp.nested(margin);
    for (i, asset) in info.asset_info.iter().enumerate() {
        disp.line(
            &inner,
            format_args!(
                "Asset {}: construction: 0x{:02X}, VBR: {}, post encode BR scaling: {}, bit rate: {}",
                i, asset.asset_construction, asset.vbr, asset.post_encode_br_scaling, asset.bit_rate
            ),
        );
        if let Some(ct) = asset.component_type {
            disp.line(&inner, format_args!("Component type: 0x{:02X}", ct));
        }
        if let Some(lang) = &asset.language {
            disp.line(&inner, format_args!("Language: \"{}\"", lang));
        }
    }
}

fn display(disp: &mut TablesDisplay, buf: &mut PsiBuffer, margin: &str, _edid: &Edid) {
    if !buf.can_read_bytes(1) {
        return;
    }
    let mut present = [false; 5];
    for p in present.iter_mut() {
        *p = buf.get_bit();
    }
    buf.skip_reserved_bits(3);
    for (name, present) in SUBSTREAM_NAMES.iter().zip(present) {
        if present {
            display_substream(disp, buf, margin, name);
        }
    }
    if !buf.read_error() {
        let extra = buf.get_remaining_bytes();
        if !extra.is_empty() {
            disp.line(margin, format_args!("Additional info: {} bytes", extra.len()));
            let inner = disp.nested(margin);
            disp.hexa(&inner, &extra);
        }
    }
}

fn factory() -> Box<dyn AbstractDescriptor> {
    Box::<DtsHdDescriptor>::default()
}

pub fn register(builder: &mut RepositoryBuilder) {
    builder.register(factory, &[EDID], XML_NAME, Some(display));
}
