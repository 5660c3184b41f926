//! Descriptor schemas.
//!
//! Each module defines one descriptor type, its display function and a
//! `register` function adding it to a [`RepositoryBuilder`].

use crate::repository::RepositoryBuilder;

/// Identity and validity accessors shared by every schema with a
/// `valid: Validity` field.
macro_rules! descriptor_identity {
    ($xml_name:expr, $edid:expr) => {
        fn xml_name(&self) -> &'static str {
            $xml_name
        }

        fn edid(&self) -> $crate::edid::Edid {
            $edid
        }

        fn is_valid(&self) -> bool {
            self.valid.get()
        }

        fn set_valid(&mut self, valid: bool) {
            self.valid.set(valid);
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    };
}

pub mod cell_frequency_link;
pub mod data_broadcast_id;
pub mod dts_hd;
pub mod eacem_preferred_name_identifier;
pub mod flexmux_timing;
pub mod fmc;
pub mod fmx_buffer_size;
pub mod hevc_video;
pub mod private_data_specifier;
pub mod terrestrial_delivery_system;

pub use cell_frequency_link::{Cell, CellFrequencyLinkDescriptor, Subcell};
pub use data_broadcast_id::DataBroadcastIdDescriptor;
pub use dts_hd::{DtsHdAssetInfo, DtsHdDescriptor, DtsHdSubstreamInfo};
pub use eacem_preferred_name_identifier::EacemPreferredNameIdentifierDescriptor;
pub use flexmux_timing::FlexMuxTimingDescriptor;
pub use fmc::{FmcDescriptor, FmcEntry};
pub use fmx_buffer_size::{FlexMuxBuffer, FmxBufferSizeDescriptor};
pub use hevc_video::HevcVideoDescriptor;
pub use private_data_specifier::PrivateDataSpecifierDescriptor;
pub use terrestrial_delivery_system::TerrestrialDeliverySystemDescriptor;

/// Register every schema of this module.
pub fn register_all(builder: &mut RepositoryBuilder) {
    // MPEG
    fmc::register(builder);
    fmx_buffer_size::register(builder);
    flexmux_timing::register(builder);
    hevc_video::register(builder);
    // DVB
    terrestrial_delivery_system::register(builder);
    private_data_specifier::register(builder);
    data_broadcast_id::register(builder);
    cell_frequency_link::register(builder);
    dts_hd::register(builder);
    // DVB private
    eacem_preferred_name_identifier::register(builder);
}
