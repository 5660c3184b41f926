//! Registry of descriptor schemas, keyed by identity and by XML name.
//!
//! Registrations are collected by a [`RepositoryBuilder`] and frozen into an
//! immutable [`PsiRepository`]. The process-wide repository is built once, on
//! first use, by [`build_default_repository`]; after that it is only read and
//! can be shared freely between threads.

use std::collections::btree_map::Entry as EdidEntry;
use std::collections::hash_map::Entry as NameEntry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use log::{debug, warn};
use once_cell::sync::Lazy;

use crate::abstract_descriptor::AbstractDescriptor;
use crate::descriptor::{Descriptor, DescriptorContext};
use crate::display::DisplayFn;
use crate::edid::{did, Edid, Standards};
use crate::error::XmlError;
use crate::generic::GenericDescriptor;
use crate::xml::Element;

/// Creates a default instance of a schema.
pub type Factory = fn() -> Box<dyn AbstractDescriptor>;

/// One schema registration.
pub struct RegisteredDescriptor {
    pub factory: Factory,
    pub edids: Vec<Edid>,
    pub xml_name: &'static str,
    pub display: Option<DisplayFn>,
}

impl fmt::Debug for RegisteredDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredDescriptor")
            .field("edids", &self.edids)
            .field("xml_name", &self.xml_name)
            .field("display", &self.display.is_some())
            .finish()
    }
}

/// Outcome of resolving a binary descriptor.
#[derive(Debug, Clone, Copy)]
pub struct Resolution<'a> {
    /// Effective identity. For an unresolved descriptor, the standard is
    /// empty and the tag, extended tag and PDS are those found.
    pub edid: Edid,
    /// Matching registration, `None` for the generic fallback.
    pub entry: Option<&'a RegisteredDescriptor>,
}

/// Collects registrations before freezing them.
#[derive(Debug, Default)]
pub struct RepositoryBuilder {
    entries: Vec<RegisteredDescriptor>,
    by_edid: BTreeMap<Edid, usize>,
    by_xml_name: HashMap<&'static str, usize>,
}

impl RepositoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema under zero or more identities.
    ///
    /// An identity or XML name that is already taken keeps its first
    /// registration; the conflict is logged.
    pub fn register(
        &mut self,
        factory: Factory,
        edids: &[Edid],
        xml_name: &'static str,
        display: Option<DisplayFn>,
    ) {
        let index = self.entries.len();
        for edid in edids {
            match self.by_edid.entry(*edid) {
                EdidEntry::Vacant(v) => {
                    v.insert(index);
                }
                EdidEntry::Occupied(o) => {
                    warn!(
                        "Duplicate registration of {} by {}, keeping {}",
                        edid,
                        xml_name,
                        self.entries[*o.get()].xml_name
                    );
                }
            }
        }
        match self.by_xml_name.entry(xml_name) {
            NameEntry::Vacant(v) => {
                v.insert(index);
            }
            NameEntry::Occupied(_) => {
                warn!("Duplicate XML name {}, keeping first registration", xml_name);
            }
        }
        self.entries.push(RegisteredDescriptor {
            factory,
            edids: edids.to_vec(),
            xml_name,
            display,
        });
    }

    pub fn build(self) -> PsiRepository {
        debug!(
            "PSI repository built: {} schemas, {} identities",
            self.entries.len(),
            self.by_edid.len()
        );
        PsiRepository {
            entries: self.entries,
            by_edid: self.by_edid,
            by_xml_name: self.by_xml_name,
        }
    }
}

/// Immutable schema registry.
#[derive(Debug)]
pub struct PsiRepository {
    entries: Vec<RegisteredDescriptor>,
    by_edid: BTreeMap<Edid, usize>,
    by_xml_name: HashMap<&'static str, usize>,
}

static DEFAULT: Lazy<PsiRepository> = Lazy::new(build_default_repository);

/// Build a repository holding every schema of this crate.
pub fn build_default_repository() -> PsiRepository {
    let mut builder = RepositoryBuilder::new();
    crate::generic::register(&mut builder);
    crate::descriptors::register_all(&mut builder);
    builder.build()
}

/// Tags whose first payload byte selects the schema.
fn is_extension_family(tag: u8, standards: Standards) -> bool {
    tag == did::MPEG_EXTENSION || (tag == did::DVB_EXTENSION && standards.contains(Standards::DVB))
}

impl PsiRepository {
    /// The process-wide repository.
    pub fn instance() -> &'static PsiRepository {
        &DEFAULT
    }

    pub fn lookup(&self, edid: &Edid) -> Option<&RegisteredDescriptor> {
        self.by_edid.get(edid).map(|&i| &self.entries[i])
    }

    pub fn lookup_xml(&self, name: &str) -> Option<&RegisteredDescriptor> {
        self.by_xml_name.get(name).map(|&i| &self.entries[i])
    }

    /// Find the schema of a descriptor in a given context.
    ///
    /// Every standard in scope is tried with the active PDS first, then
    /// every standard again as a plain standard mapping. Standards are tried
    /// in the fixed order of [`Standards::ALL`].
    pub fn resolve(&self, tag: u8, payload: &[u8], standards: Standards, pds: Option<u32>) -> Resolution<'_> {
        let fallback = |extended_tag| Resolution {
            edid: Edid {
                tag,
                extended_tag,
                pds,
                standard: Standards::NONE,
            },
            entry: None,
        };

        let extended_tag = if is_extension_family(tag, standards) {
            match payload.first() {
                Some(&ext) => Some(ext),
                None => {
                    debug!("Empty extension descriptor, tag 0x{:02X}", tag);
                    return fallback(None);
                }
            }
        } else {
            None
        };

        let scope = standards.in_scope();
        let scoped = pds.into_iter().flat_map(|p| scope.iter().map(move |s| (Some(p), s)));
        let global = scope.iter().map(|s| (None, s));
        for (pds, standard) in scoped.chain(global) {
            let key = Edid {
                tag,
                extended_tag,
                pds,
                standard,
            };
            if let Some(entry) = self.lookup(&key) {
                return Resolution {
                    edid: key,
                    entry: Some(entry),
                };
            }
        }

        let unresolved = fallback(extended_tag);
        debug!("No schema for {}, using generic descriptor", unresolved.edid);
        unresolved
    }

    /// Decode a binary descriptor into its schema, or into a generic
    /// descriptor when none matches. The result may be invalid.
    pub fn decode_descriptor(
        &self,
        desc: &Descriptor,
        ctx: &DescriptorContext,
        pds: Option<u32>,
    ) -> Box<dyn AbstractDescriptor> {
        let resolution = self.resolve(desc.tag(), desc.payload(), ctx.standards, pds);
        match resolution.entry {
            Some(entry) => {
                let mut decoded = (entry.factory)();
                decoded.deserialize(desc);
                if !decoded.is_valid() {
                    debug!("Invalid {} ({} bytes)", entry.xml_name, desc.payload_size());
                }
                decoded
            }
            None => Box::new(GenericDescriptor::from_descriptor(desc, resolution.edid)),
        }
    }

    /// Build a descriptor from an XML element, selected by element name.
    pub fn descriptor_from_xml(&self, element: &Element) -> Result<Box<dyn AbstractDescriptor>, XmlError> {
        let entry = self
            .lookup_xml(element.name())
            .ok_or_else(|| XmlError::UnknownElement(element.name().to_string()))?;
        let mut desc = (entry.factory)();
        desc.from_xml(element)?;
        Ok(desc)
    }

    /// Every registered identity, in key order.
    pub fn registered_edids(&self) -> impl Iterator<Item = &Edid> {
        self.by_edid.keys()
    }

    /// Every registered XML name, sorted.
    pub fn xml_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.by_xml_name.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::{dts_hd, eacem_preferred_name_identifier};
    use crate::edid::{pds, xdid};

    fn generic_factory() -> Box<dyn AbstractDescriptor> {
        Box::<GenericDescriptor>::default()
    }

    fn collision_repository() -> PsiRepository {
        let mut builder = RepositoryBuilder::new();
        eacem_preferred_name_identifier::register(&mut builder);
        builder.register(
            generic_factory,
            &[Edid::standard(0x85, Standards::ISDB)],
            "isdb_0x85",
            None,
        );
        builder.build()
    }

    fn resolved_name(repo: &PsiRepository, standards: Standards, pds: Option<u32>) -> Option<&'static str> {
        repo.resolve(0x85, &[0x01], standards, pds).entry.map(|e| e.xml_name)
    }

    #[test]
    fn test_private_resolution() {
        let repo = collision_repository();
        let eacem = Some(eacem_preferred_name_identifier::XML_NAME);
        assert_eq!(resolved_name(&repo, Standards::DVB, Some(pds::EACEM)), eacem);
        assert_eq!(resolved_name(&repo, Standards::DVB, Some(pds::TPS)), eacem);
        assert_eq!(resolved_name(&repo, Standards::DVB, Some(pds::OFCOM)), None);
        assert_eq!(resolved_name(&repo, Standards::DVB, None), None);

        // A PDS-scoped mapping wins over a standard one; without a PDS the
        // standard mapping applies.
        let both = Standards::DVB | Standards::ISDB;
        assert_eq!(resolved_name(&repo, both, Some(pds::EACEM)), eacem);
        assert_eq!(resolved_name(&repo, both, None), Some("isdb_0x85"));
        assert_eq!(resolved_name(&repo, both, Some(pds::OFCOM)), Some("isdb_0x85"));

        let res = repo.resolve(0x85, &[0x01], Standards::DVB, Some(pds::TPS));
        assert_eq!(res.edid, Edid::private(0x85, pds::TPS, Standards::DVB));
    }

    #[test]
    fn test_same_tag_under_two_specifiers() {
        let mut builder = RepositoryBuilder::new();
        builder.register(
            generic_factory,
            &[Edid::private(0x85, pds::EACEM, Standards::DVB)],
            "eacem_0x85",
            None,
        );
        builder.register(
            generic_factory,
            &[Edid::private(0x85, pds::EUTELSAT, Standards::DVB)],
            "eutelsat_0x85",
            None,
        );
        let repo = builder.build();
        assert_eq!(resolved_name(&repo, Standards::DVB, Some(pds::EACEM)), Some("eacem_0x85"));
        assert_eq!(resolved_name(&repo, Standards::DVB, Some(pds::EUTELSAT)), Some("eutelsat_0x85"));

        let unscoped = repo.resolve(0x85, &[0x01], Standards::DVB, None);
        assert!(unscoped.entry.is_none());
        assert_eq!(unscoped.edid.standard, Standards::NONE);
        assert_eq!(unscoped.edid.pds, None);
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let mut builder = RepositoryBuilder::new();
        eacem_preferred_name_identifier::register(&mut builder);
        builder.register(
            generic_factory,
            &[Edid::private(0x85, pds::EACEM, Standards::DVB)],
            "other_0x85",
            None,
        );
        let repo = builder.build();
        let entry = repo.lookup(&Edid::private(0x85, pds::EACEM, Standards::DVB)).unwrap();
        assert_eq!(entry.xml_name, eacem_preferred_name_identifier::XML_NAME);
        assert_eq!(repo.registered_edids().count(), 2);
        assert_eq!(repo.xml_names().len(), 2);
    }

    #[test]
    fn test_extension_dispatch() {
        let repo = PsiRepository::instance();
        let res = repo.resolve(did::DVB_EXTENSION, &[xdid::DTS_HD_AUDIO, 0x00], Standards::DVB, None);
        assert_eq!(res.edid, Edid::extension(did::DVB_EXTENSION, xdid::DTS_HD_AUDIO, Standards::DVB));
        assert_eq!(res.entry.map(|e| e.xml_name), Some(dts_hd::XML_NAME));

        let unknown = repo.resolve(did::DVB_EXTENSION, &[xdid::T2_DELIVERY], Standards::DVB, None);
        assert!(unknown.entry.is_none());
        assert_eq!(unknown.edid.extended_tag, Some(xdid::T2_DELIVERY));

        assert!(repo.resolve(did::DVB_EXTENSION, &[], Standards::DVB, None).entry.is_none());
        // Tag 0x7F is not an extension descriptor outside DVB.
        assert!(repo
            .resolve(did::DVB_EXTENSION, &[xdid::DTS_HD_AUDIO], Standards::ISDB, None)
            .entry
            .is_none());
    }

    #[test]
    fn test_decode_falls_back_to_generic() {
        let repo = PsiRepository::instance();
        let ctx = DescriptorContext::default();
        let bin = Descriptor::new(0xC7, vec![0xDE, 0xAD]).unwrap();
        let decoded = repo.decode_descriptor(&bin, &ctx, None);
        assert!(decoded.is_valid());
        let generic = decoded.downcast_ref::<GenericDescriptor>().unwrap();
        assert_eq!(generic.payload, vec![0xDE, 0xAD]);
        assert_eq!(decoded.serialize().unwrap(), bin);

        // Empty extension descriptor.
        let empty = Descriptor::new(did::DVB_EXTENSION, Vec::new()).unwrap();
        let decoded = repo.decode_descriptor(&empty, &ctx, None);
        assert!(decoded.downcast_ref::<GenericDescriptor>().is_some());
        assert_eq!(decoded.serialize().unwrap(), empty);
    }

    #[test]
    fn test_descriptor_from_xml_unknown_name() {
        let repo = PsiRepository::instance();
        let element = Element::new("no_such_descriptor");
        assert_eq!(
            repo.descriptor_from_xml(&element).unwrap_err(),
            XmlError::UnknownElement("no_such_descriptor".to_string())
        );
    }

    #[test]
    fn test_default_repository_contents() {
        let repo = PsiRepository::instance();
        let names = repo.xml_names();
        for name in [
            "generic_descriptor",
            "cell_frequency_link_descriptor",
            "terrestrial_delivery_system_descriptor",
            "FmxBufferSize_descriptor",
            "FMC_descriptor",
            "flexmux_timing_descriptor",
            "HEVC_video_descriptor",
            "data_broadcast_id_descriptor",
            "private_data_specifier_descriptor",
            "eacem_preferred_name_identifier_descriptor",
            "DTS_HD_descriptor",
        ] {
            assert!(names.contains(&name), "{} not registered", name);
        }
        let edids: Vec<&Edid> = repo.registered_edids().collect();
        let mut sorted = edids.clone();
        sorted.sort();
        assert_eq!(edids, sorted);
    }

    #[test]
    fn test_concurrent_resolution() {
        let bin = Descriptor::new(did::CELL_FREQUENCY_LINK, vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x0A, 0x00]).unwrap();
        let ctx = DescriptorContext::default();
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        let decoded = PsiRepository::instance().decode_descriptor(&bin, &ctx, None);
                        (decoded.xml_name(), decoded.is_valid())
                    })
                })
                .collect();
            for h in handles {
                assert_eq!(h.join().unwrap(), ("cell_frequency_link_descriptor", true));
            }
        });
    }
}
