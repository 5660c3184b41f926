//! Raw binary descriptors, descriptor loops and their resolution context.
//!
//! Descriptor format:
//! ```text
//! +--------+--------+------------------+
//! |  Tag   | Length |     Payload      |
//! |  u8    |   u8   |  Length bytes    |
//! +--------+--------+------------------+
//! ```
//!
//! A [`DescriptorList`] is the descriptor loop of an enclosing table. It
//! tracks the private data specifier established by
//! `private_data_specifier_descriptor`s so that later private descriptors
//! can be resolved in the right vendor scope.

use bytes::{BufMut, Bytes, BytesMut};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::abstract_descriptor::AbstractDescriptor;
use crate::buffer::MAX_DESCRIPTOR_PAYLOAD;
use crate::edid::{did, Standards};
use crate::error::{DescriptorError, XmlError};
use crate::generic::GenericDescriptor;
use crate::repository::PsiRepository;
use crate::xml::Element;

/// Descriptor header size: tag + length.
pub const DESCRIPTOR_HEADER_SIZE: usize = 2;

/// One binary descriptor: a tag and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    tag: u8,
    payload: Bytes,
}

impl Descriptor {
    /// Build a descriptor from a tag and a payload of at most 255 bytes.
    pub fn new(tag: u8, payload: impl Into<Bytes>) -> Result<Self, DescriptorError> {
        let payload = payload.into();
        if payload.len() > MAX_DESCRIPTOR_PAYLOAD {
            return Err(DescriptorError::PayloadTooLarge {
                tag,
                size: payload.len(),
            });
        }
        Ok(Descriptor { tag, payload })
    }

    /// Parse one descriptor at the start of `data`.
    ///
    /// Returns the descriptor and the number of bytes it occupies.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), DescriptorError> {
        if data.len() < DESCRIPTOR_HEADER_SIZE {
            return Err(DescriptorError::TruncatedHeader(data.len()));
        }
        let tag = data[0];
        let length = data[1] as usize;
        let end = DESCRIPTOR_HEADER_SIZE + length;
        if data.len() < end {
            return Err(DescriptorError::TruncatedPayload {
                tag,
                expected: length,
                actual: data.len() - DESCRIPTOR_HEADER_SIZE,
            });
        }
        let payload = Bytes::copy_from_slice(&data[DESCRIPTOR_HEADER_SIZE..end]);
        Ok((Descriptor { tag, payload }, end))
    }

    pub fn tag(&self) -> u8 {
        self.tag
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }

    /// Total size including the header.
    pub fn size(&self) -> usize {
        DESCRIPTOR_HEADER_SIZE + self.payload.len()
    }

    /// Encode with tag and length header.
    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.size());
        self.put_into(&mut out);
        out.freeze()
    }

    fn put_into(&self, out: &mut BytesMut) {
        out.put_u8(self.tag);
        out.put_u8(self.payload.len() as u8);
        out.put_slice(&self.payload);
    }

    /// Value carried by a private_data_specifier_descriptor, if this is one.
    pub fn private_data_specifier(&self) -> Option<u32> {
        if self.tag != did::PRIVATE_DATA_SPECIFIER || self.payload.len() < 4 {
            return None;
        }
        let p = &self.payload;
        Some(u32::from_be_bytes([p[0], p[1], p[2], p[3]]))
    }
}

/// Context supplied by the enclosing table for schema resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorContext {
    /// Standards in effect for the table. MPEG is always implied.
    pub standards: Standards,
    /// Private data specifier assumed before any explicit one.
    pub default_pds: Option<u32>,
    /// Table id of the enclosing table, when known.
    pub table_id: Option<u8>,
}

impl Default for DescriptorContext {
    fn default() -> Self {
        DescriptorContext {
            standards: Standards::DVB,
            default_pds: None,
            table_id: None,
        }
    }
}

impl DescriptorContext {
    pub fn new(standards: Standards) -> Self {
        DescriptorContext {
            standards,
            ..Default::default()
        }
    }

    pub fn with_default_pds(mut self, pds: u32) -> Self {
        self.default_pds = Some(pds);
        self
    }
}

/// Ordered list of binary descriptors from one descriptor loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorList {
    descriptors: Vec<Descriptor>,
}

impl DescriptorList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a descriptor loop.
    ///
    /// Parsing stops at a truncated trailing descriptor; the descriptors
    /// before it are kept and the framing error is returned alongside.
    pub fn from_loop_bytes(data: &[u8]) -> (Self, Option<DescriptorError>) {
        let mut list = DescriptorList::new();
        let mut offset = 0;
        while offset < data.len() {
            match Descriptor::from_bytes(&data[offset..]) {
                Ok((desc, size)) => {
                    list.descriptors.push(desc);
                    offset += size;
                }
                Err(e) => {
                    warn!("Descriptor loop truncated at offset {}: {}", offset, e);
                    return (list, Some(e));
                }
            }
        }
        (list, None)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Descriptor> {
        self.descriptors.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.iter()
    }

    pub fn push(&mut self, desc: Descriptor) {
        self.descriptors.push(desc);
    }

    /// Private data specifier in effect for the descriptor at `index`.
    ///
    /// It is the value of the last private_data_specifier_descriptor before
    /// `index` (DVB only), or the context default. A zero PDS means none.
    pub fn private_data_specifier(&self, index: usize, ctx: &DescriptorContext) -> Option<u32> {
        let mut pds = ctx.default_pds;
        if ctx.standards.contains(Standards::DVB) {
            for desc in self.descriptors.iter().take(index) {
                if let Some(p) = desc.private_data_specifier() {
                    pds = Some(p);
                }
            }
        }
        pds.filter(|p| *p != 0)
    }

    /// Add a descriptor, inserting a private_data_specifier_descriptor first
    /// when the descriptor belongs to a vendor scope other than the current
    /// one.
    ///
    /// Outside DVB, private_data_specifier_descriptors do not set the scope,
    /// so none is inserted.
    pub fn add_with_pds(&mut self, desc: Descriptor, required_pds: Option<u32>, ctx: &DescriptorContext) {
        let required_pds = required_pds.filter(|_| ctx.standards.contains(Standards::DVB));
        if let Some(required) = required_pds {
            let current = self.private_data_specifier(self.len(), ctx);
            if current != Some(required) {
                let payload = Bytes::copy_from_slice(&required.to_be_bytes());
                self.descriptors.push(Descriptor {
                    tag: did::PRIVATE_DATA_SPECIFIER,
                    payload,
                });
            }
        }
        self.descriptors.push(desc);
    }

    /// Encode the whole loop, without any loop length prefix.
    pub fn to_loop_bytes(&self) -> Bytes {
        let total: usize = self.descriptors.iter().map(Descriptor::size).sum();
        let mut out = BytesMut::with_capacity(total);
        for desc in &self.descriptors {
            desc.put_into(&mut out);
        }
        out.freeze()
    }

    /// Decode every descriptor under its own private data specifier.
    pub fn decode_all(
        &self,
        repo: &PsiRepository,
        ctx: &DescriptorContext,
    ) -> Vec<Box<dyn AbstractDescriptor>> {
        self.descriptors
            .iter()
            .enumerate()
            .map(|(i, desc)| {
                let pds = self.private_data_specifier(i, ctx);
                repo.decode_descriptor(desc, ctx, pds)
            })
            .collect()
    }

    /// Append one XML element per descriptor to `parent`.
    ///
    /// Descriptors that fail to decode are emitted as generic descriptors so
    /// that their bytes are preserved.
    pub fn to_xml(&self, parent: &mut Element, repo: &PsiRepository, ctx: &DescriptorContext) {
        for (i, desc) in self.descriptors.iter().enumerate() {
            let pds = self.private_data_specifier(i, ctx);
            let decoded = repo.decode_descriptor(desc, ctx, pds);
            if decoded.is_valid() {
                decoded.to_xml(parent);
            } else {
                warn!(
                    "Descriptor {} (tag 0x{:02X}) is invalid, emitted as generic",
                    i,
                    desc.tag()
                );
                let edid = repo.resolve(desc.tag(), desc.payload(), ctx.standards, pds).edid;
                GenericDescriptor::from_descriptor(desc, edid).to_xml(parent);
            }
        }
    }

    /// Build a list from the children of `parent`.
    ///
    /// Every child is analyzed independently: a faulty element is reported
    /// in the returned error list and skipped, its siblings are still added.
    pub fn from_xml(
        parent: &Element,
        repo: &PsiRepository,
        ctx: &DescriptorContext,
    ) -> (Self, Vec<XmlError>) {
        let mut list = DescriptorList::new();
        let mut errors = Vec::new();
        for child in parent.children() {
            let result = repo.descriptor_from_xml(child).and_then(|desc| {
                desc.serialize()
                    .map(|bin| (bin, desc.edid().pds))
                    .map_err(|e| XmlError::Inconsistent {
                        element: child.name().to_string(),
                        message: e.to_string(),
                    })
            });
            match result {
                Ok((bin, pds)) => {
                    // A type registered under several specifiers needs no new
                    // private_data_specifier_descriptor if the current one
                    // already resolves to it.
                    let current = list.private_data_specifier(list.len(), ctx);
                    let resolved = repo
                        .resolve(bin.tag(), bin.payload(), ctx.standards, current)
                        .entry
                        .map(|e| e.xml_name);
                    let required = if resolved == Some(child.name()) { None } else { pds };
                    list.add_with_pds(bin, required, ctx);
                }
                Err(e) => {
                    debug!("Skipping XML descriptor: {}", e);
                    errors.push(e);
                }
            }
        }
        (list, errors)
    }
}

impl<'a> IntoIterator for &'a DescriptorList {
    type Item = &'a Descriptor;
    type IntoIter = std::slice::Iter<'a, Descriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.descriptors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edid::pds;

    #[test]
    fn test_descriptor_framing() {
        let (desc, size) = Descriptor::from_bytes(&[0x66, 0x02, 0x00, 0x05, 0xFF]).unwrap();
        assert_eq!(size, 4);
        assert_eq!(desc.tag(), 0x66);
        assert_eq!(desc.payload(), &[0x00, 0x05]);
        assert_eq!(&desc.to_bytes()[..], &[0x66, 0x02, 0x00, 0x05]);

        assert_eq!(
            Descriptor::from_bytes(&[0x66]),
            Err(DescriptorError::TruncatedHeader(1))
        );
        assert_eq!(
            Descriptor::from_bytes(&[0x66, 0x03, 0x00]),
            Err(DescriptorError::TruncatedPayload {
                tag: 0x66,
                expected: 3,
                actual: 1
            })
        );
        assert!(Descriptor::new(0x66, vec![0u8; 256]).is_err());
    }

    #[test]
    fn test_loop_parsing_is_lenient() {
        let data = [0x5F, 0x04, 0x00, 0x00, 0x00, 0x28, 0x85, 0x01, 0x07, 0x40, 0x05, 0x41];
        let (list, err) = DescriptorList::from_loop_bytes(&data);
        assert_eq!(list.len(), 2);
        assert!(matches!(err, Some(DescriptorError::TruncatedPayload { tag: 0x40, .. })));
        assert_eq!(&list.to_loop_bytes()[..], &data[..9]);
    }

    #[test]
    fn test_private_data_specifier_tracking() {
        let data = [
            0x85, 0x01, 0x01, // before any PDS
            0x5F, 0x04, 0x00, 0x00, 0x00, 0x28, // PDS = EACEM
            0x85, 0x01, 0x02, // EACEM scope
            0x5F, 0x04, 0x00, 0x00, 0x00, 0x00, // PDS reset
            0x85, 0x01, 0x03,
        ];
        let (list, err) = DescriptorList::from_loop_bytes(&data);
        assert!(err.is_none());
        let ctx = DescriptorContext::new(Standards::DVB);
        assert_eq!(list.private_data_specifier(0, &ctx), None);
        assert_eq!(list.private_data_specifier(2, &ctx), Some(pds::EACEM));
        assert_eq!(list.private_data_specifier(4, &ctx), None);

        let with_default = ctx.with_default_pds(pds::TPS);
        assert_eq!(list.private_data_specifier(0, &with_default), Some(pds::TPS));

        // Outside DVB, private_data_specifier_descriptors have no meaning.
        let isdb = DescriptorContext::new(Standards::ISDB);
        assert_eq!(list.private_data_specifier(2, &isdb), None);
    }

    #[test]
    fn test_add_with_pds_inserts_specifier_once() {
        let ctx = DescriptorContext::default();
        let mut list = DescriptorList::new();
        let d = Descriptor::new(0x85, vec![0x01]).unwrap();
        list.add_with_pds(d.clone(), Some(pds::EACEM), &ctx);
        list.add_with_pds(d.clone(), Some(pds::EACEM), &ctx);
        list.add_with_pds(d, None, &ctx);
        assert_eq!(list.len(), 4);
        assert_eq!(list.get(0).unwrap().private_data_specifier(), Some(pds::EACEM));
        assert_eq!(list.get(1).unwrap().tag(), 0x85);
        assert_eq!(list.get(2).unwrap().tag(), 0x85);
    }

    #[test]
    fn test_add_with_pds_outside_dvb() {
        let ctx = DescriptorContext::new(Standards::ISDB);
        let mut list = DescriptorList::new();
        let d = Descriptor::new(0x85, vec![0x01]).unwrap();
        list.add_with_pds(d.clone(), Some(pds::EACEM), &ctx);
        list.add_with_pds(d, Some(pds::EACEM), &ctx);
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|desc| desc.tag() == 0x85));
    }
}
