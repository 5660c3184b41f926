//! Binary and XML codec framework for MPEG-TS PSI/SI descriptors.
//!
//! Descriptors are the tag-length-value records found in the descriptor
//! loops of PSI/SI tables. The meaning of a tag depends on the broadcasting
//! standards in effect, on the private data specifier established earlier in
//! the loop, and for extension families on a second tag byte. This crate
//! resolves a descriptor to its schema, decodes it into a typed structure,
//! displays it, and converts it to and from XML.
//!
//! # Descriptor Format
//!
//! ```text
//! +--------+--------+------------------------------+
//! |  Tag   | Length |           Payload            |
//! |   u8   |   u8   | [extended tag] fields ...    |
//! +--------+--------+------------------------------+
//! ```
//!
//! # Example
//!
//! ```rust
//! use psi_codec::{AbstractDescriptor, DescriptorContext, DescriptorList, PsiRepository, TablesDisplay};
//!
//! // private_data_specifier_descriptor (EACEM), then an EACEM private descriptor
//! let data = [0x5F, 0x04, 0x00, 0x00, 0x00, 0x28, 0x85, 0x01, 0x07];
//! let (list, error) = DescriptorList::from_loop_bytes(&data);
//! assert!(error.is_none());
//!
//! let repo = PsiRepository::instance();
//! let ctx = DescriptorContext::default();
//! let decoded = list.decode_all(repo, &ctx);
//! assert_eq!(decoded[1].xml_name(), "eacem_preferred_name_identifier_descriptor");
//!
//! let mut disp = TablesDisplay::new();
//! disp.display_descriptor_list(&list, "", repo, &ctx);
//! assert!(disp.output().contains("Name identifier: 7"));
//! ```
//!
//! # Schemas
//!
//! Each schema implements [`AbstractDescriptor`] and registers itself with a
//! [`RepositoryBuilder`]. Descriptors without a matching schema decode to a
//! [`GenericDescriptor`] which keeps the payload unchanged.

pub mod abstract_descriptor;
pub mod buffer;
pub mod descriptor;
pub mod descriptors;
pub mod display;
pub mod edid;
pub mod error;
pub mod generic;
pub mod repository;
pub mod xml;

pub use abstract_descriptor::{AbstractDescriptor, Validity};
pub use buffer::{PsiBuffer, MAX_DESCRIPTOR_PAYLOAD};
pub use descriptor::{Descriptor, DescriptorContext, DescriptorList, DESCRIPTOR_HEADER_SIZE};
pub use display::{DisplayFn, TablesDisplay};
pub use edid::{Edid, Standards};
pub use error::{DescriptorError, EncodeError, XmlError};
pub use generic::GenericDescriptor;
pub use repository::{
    build_default_repository, PsiRepository, RegisteredDescriptor, RepositoryBuilder, Resolution,
};
pub use xml::Element;
