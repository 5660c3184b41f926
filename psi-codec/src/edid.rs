//! Identity keys of descriptor schemas.
//!
//! A descriptor's binary schema is not named by its tag alone. The same tag
//! can mean different things in different broadcasting standards, under
//! different private data specifiers, or (for extension families) with a
//! different second tag byte. [`Edid`] bundles all of these.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Set of broadcasting standards in effect.
///
/// MPEG is the base of every other standard and is always considered in
/// scope during resolution, see [`Standards::in_scope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Standards(u16);

impl Standards {
    pub const NONE: Standards = Standards(0x0000);
    pub const MPEG: Standards = Standards(0x0001);
    pub const DVB: Standards = Standards(0x0002);
    pub const SCTE: Standards = Standards(0x0004);
    pub const ATSC: Standards = Standards(0x0008);
    pub const ISDB: Standards = Standards(0x0010);
    pub const JAPAN: Standards = Standards(0x0020);
    pub const ABNT: Standards = Standards(0x0040);

    /// Individual standards in resolution order.
    pub const ALL: [(Standards, &'static str); 7] = [
        (Standards::MPEG, "MPEG"),
        (Standards::DVB, "DVB"),
        (Standards::SCTE, "SCTE"),
        (Standards::ATSC, "ATSC"),
        (Standards::ISDB, "ISDB"),
        (Standards::JAPAN, "Japan"),
        (Standards::ABNT, "ABNT"),
    ];

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, other: Standards) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// This set plus MPEG.
    pub fn in_scope(self) -> Standards {
        self | Standards::MPEG
    }

    /// Single standards contained in this set, in resolution order.
    pub fn iter(self) -> impl Iterator<Item = Standards> {
        Standards::ALL
            .into_iter()
            .map(|(s, _)| s)
            .filter(move |s| self.contains(*s))
    }

    /// Parse a case-insensitive standard name such as `dvb` or `ISDB`.
    pub fn from_name(name: &str) -> Option<Standards> {
        Standards::ALL
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name.trim()))
            .map(|(s, _)| *s)
    }
}

impl BitOr for Standards {
    type Output = Standards;

    fn bitor(self, rhs: Standards) -> Standards {
        Standards(self.0 | rhs.0)
    }
}

impl BitOrAssign for Standards {
    fn bitor_assign(&mut self, rhs: Standards) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Standards {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<&str> = Standards::ALL
            .iter()
            .filter(|(s, _)| self.contains(*s))
            .map(|(_, n)| *n)
            .collect();
        write!(f, "{}", names.join(", "))
    }
}

impl Serialize for Standards {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let names: Vec<&str> = Standards::ALL
            .iter()
            .filter(|(s, _)| self.contains(*s))
            .map(|(_, n)| *n)
            .collect();
        names.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Standards {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        let mut standards = Standards::NONE;
        for name in names {
            standards |= Standards::from_name(&name)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown standard: {name}")))?;
        }
        Ok(standards)
    }
}

/// Extended descriptor identity: tag, extended tag, private data specifier
/// and the standard the schema belongs to.
///
/// Two keys are equal only if every component matches. A key without a PDS
/// is a standard mapping, distinct from any PDS-scoped mapping of the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edid {
    pub tag: u8,
    pub extended_tag: Option<u8>,
    pub pds: Option<u32>,
    pub standard: Standards,
}

impl Edid {
    /// Descriptor defined by a standard.
    pub const fn standard(tag: u8, standard: Standards) -> Self {
        Edid {
            tag,
            extended_tag: None,
            pds: None,
            standard,
        }
    }

    /// Private descriptor, meaningful under one private data specifier.
    pub const fn private(tag: u8, pds: u32, standard: Standards) -> Self {
        Edid {
            tag,
            extended_tag: None,
            pds: Some(pds),
            standard,
        }
    }

    /// Member of an extension family, selected by its extended tag.
    pub const fn extension(tag: u8, extended_tag: u8, standard: Standards) -> Self {
        Edid {
            tag,
            extended_tag: Some(extended_tag),
            pds: None,
            standard,
        }
    }

    pub fn is_private(&self) -> bool {
        self.pds.is_some()
    }

    pub fn is_extension(&self) -> bool {
        self.extended_tag.is_some()
    }
}

impl fmt::Display for Edid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag 0x{:02X}", self.tag)?;
        if let Some(ext) = self.extended_tag {
            write!(f, ", ext 0x{:02X}", ext)?;
        }
        if let Some(pds) = self.pds {
            write!(f, ", pds 0x{:08X}", pds)?;
        }
        write!(f, " ({})", self.standard)
    }
}

/// Descriptor tags.
pub mod did {
    // MPEG
    pub const FMC: u8 = 0x1F;
    pub const FMX_BUFFER_SIZE: u8 = 0x22;
    pub const FLEX_MUX_TIMING: u8 = 0x2C;
    pub const HEVC_VIDEO: u8 = 0x38;
    pub const MPEG_EXTENSION: u8 = 0x3F;

    // DVB
    pub const TERRESTRIAL_DELIVERY: u8 = 0x5A;
    pub const PRIVATE_DATA_SPECIFIER: u8 = 0x5F;
    pub const DATA_BROADCAST_ID: u8 = 0x66;
    pub const CELL_FREQUENCY_LINK: u8 = 0x6D;
    pub const DVB_EXTENSION: u8 = 0x7F;

    // EACEM / EICTA private
    pub const EACEM_PREFERRED_NAME_ID: u8 = 0x85;
}

/// Extended tags of the DVB extension_descriptor family.
pub mod xdid {
    pub const IMAGE_ICON: u8 = 0x00;
    pub const T2_DELIVERY: u8 = 0x04;
    pub const SUPPLEMENTARY_AUDIO: u8 = 0x06;
    pub const DTS_HD_AUDIO: u8 = 0x0E;
    pub const DTS_NEURAL: u8 = 0x0F;
}

/// Registered private data specifier values.
pub mod pds {
    pub const BSKYB: u32 = 0x0000_0002;
    pub const NAGRA: u32 = 0x0000_0009;
    pub const TPS: u32 = 0x0000_0010;
    pub const EACEM: u32 = 0x0000_0028;
    pub const EICTA: u32 = EACEM;
    pub const EUTELSAT: u32 = 0x0000_0055;
    pub const OFCOM: u32 = 0x0000_233A;

    /// Registered owner of a private data specifier value.
    pub fn name(pds: u32) -> Option<&'static str> {
        match pds {
            BSKYB => Some("BskyB"),
            NAGRA => Some("Nagra"),
            TPS => Some("TPS"),
            EACEM => Some("EACEM/EICTA"),
            EUTELSAT => Some("Eutelsat"),
            OFCOM => Some("Ofcom"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standards_set() {
        let s = Standards::DVB | Standards::ISDB;
        assert!(s.contains(Standards::DVB));
        assert!(!s.contains(Standards::MPEG));
        assert!(s.in_scope().contains(Standards::MPEG));
        assert_eq!(
            s.in_scope().iter().collect::<Vec<_>>(),
            vec![Standards::MPEG, Standards::DVB, Standards::ISDB]
        );
        assert_eq!(s.to_string(), "DVB, ISDB");
        assert_eq!(Standards::from_name("japan"), Some(Standards::JAPAN));
        assert_eq!(Standards::from_name("foo"), None);
    }

    #[test]
    fn test_edid_equality() {
        let global = Edid::standard(0x85, Standards::DVB);
        let eacem = Edid::private(0x85, pds::EACEM, Standards::DVB);
        let tps = Edid::private(0x85, pds::TPS, Standards::DVB);
        assert_ne!(global, eacem);
        assert_ne!(eacem, tps);
        assert_eq!(eacem, Edid::private(0x85, 0x28, Standards::DVB));
        assert!(eacem.is_private());
        assert!(!global.is_private());
        assert_eq!(pds::name(pds::EICTA), Some("EACEM/EICTA"));
        assert_eq!(pds::name(0x1234_5678), None);
    }

    #[test]
    fn test_edid_display() {
        let e = Edid::extension(did::DVB_EXTENSION, xdid::DTS_HD_AUDIO, Standards::DVB);
        assert_eq!(e.to_string(), "tag 0x7F, ext 0x0E (DVB)");
        let p = Edid::private(0x85, pds::EACEM, Standards::DVB);
        assert_eq!(p.to_string(), "tag 0x85, pds 0x00000028 (DVB)");
    }
}
