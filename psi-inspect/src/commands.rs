//! Subcommand implementations.
//!
//! Each command returns its output instead of printing it, so that `main`
//! decides where it goes.

use std::path::Path;

use log::{error, info, warn};
use psi_codec::{DescriptorContext, DescriptorList, Element, PsiRepository, TablesDisplay};

/// Root element of descriptor loop documents.
pub const XML_ROOT: &str = "descriptors";

/// Options shared by all commands.
#[derive(Debug, Clone)]
pub struct Session {
    pub repo: &'static PsiRepository,
    pub ctx: DescriptorContext,
    pub indent: usize,
    pub hex_uppercase: bool,
}

impl Session {
    pub fn new(ctx: DescriptorContext) -> Self {
        Session {
            repo: PsiRepository::instance(),
            ctx,
            indent: 2,
            hex_uppercase: true,
        }
    }

    fn parse_loop(&self, data: &[u8]) -> DescriptorList {
        let (list, err) = DescriptorList::from_loop_bytes(data);
        if let Some(e) = err {
            warn!("Ignoring trailing bytes of descriptor loop: {}", e);
        }
        info!("{} descriptors, {} bytes", list.len(), data.len());
        list
    }

    /// Text display of a binary descriptor loop.
    pub fn display(&self, data: &[u8]) -> String {
        let list = self.parse_loop(data);
        let mut disp = TablesDisplay::new()
            .with_indent(self.indent)
            .with_hex_uppercase(self.hex_uppercase);
        disp.display_descriptor_list(&list, "", self.repo, &self.ctx);
        disp.into_string()
    }

    /// XML document for a binary descriptor loop.
    pub fn to_xml(&self, data: &[u8]) -> String {
        let list = self.parse_loop(data);
        let mut root = Element::new(XML_ROOT);
        list.to_xml(&mut root, self.repo, &self.ctx);
        root.to_xml_string()
    }

    /// Binary descriptor loop from an XML document.
    ///
    /// Every faulty element is logged; any of them fails the command.
    pub fn from_xml(&self, text: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let root = Element::parse(text)?;
        if root.name() != XML_ROOT {
            warn!("Unexpected root element <{}>, expected <{}>", root.name(), XML_ROOT);
        }
        let (list, errors) = DescriptorList::from_xml(&root, self.repo, &self.ctx);
        for e in &errors {
            error!("{}", e);
        }
        if !errors.is_empty() {
            return Err(format!("{} invalid descriptors in XML input", errors.len()).into());
        }
        Ok(list.to_loop_bytes().to_vec())
    }
}

/// Read a binary input, either from a file or from a hexadecimal string.
pub fn load_binary(file: Option<&Path>, hex: Option<&str>) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    match (file, hex) {
        (_, Some(text)) => {
            let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            Ok(hex::decode(compact)?)
        }
        (Some(path), None) => Ok(std::fs::read(path)?),
        (None, None) => Err("no input: give a file or --hex".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psi_codec::Standards;

    const LOOP_HEX: &str = "5F0400000028 850107 6D07000100002710 00 C70201FF";

    fn session() -> Session {
        Session::new(DescriptorContext::new(Standards::DVB))
    }

    #[test]
    fn test_load_binary_hex() {
        let data = load_binary(None, Some("5f 04 00000028")).unwrap();
        assert_eq!(data, vec![0x5F, 0x04, 0x00, 0x00, 0x00, 0x28]);
        assert!(load_binary(None, Some("5F0")).is_err());
        assert!(load_binary(None, None).is_err());
    }

    #[test]
    fn test_display_command() {
        let data = load_binary(None, Some(LOOP_HEX)).unwrap();
        let text = session().display(&data);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "- Descriptor 0: private_data_specifier_descriptor (0x5F, 95), 4 bytes"
        );
        assert_eq!(lines[1], "  Specifier: 0x00000028 (EACEM/EICTA)");
        assert!(text.contains("- Descriptor 1: eacem_preferred_name_identifier_descriptor"));
        assert!(text.contains("- Cell id: 0x0001, frequency: 100000 Hz"));
        assert!(text.contains("- Descriptor 3: unknown descriptor (0xC7, 199), 2 bytes"));
    }

    #[test]
    fn test_xml_round_trip() {
        let s = session();
        let data = load_binary(None, Some(LOOP_HEX)).unwrap();
        let xml = s.to_xml(&data);
        assert!(xml.contains("<descriptors>"));
        assert!(xml.contains("generic_descriptor"));
        assert_eq!(s.from_xml(&xml).unwrap(), data);
    }

    #[test]
    fn test_from_xml_reports_errors() {
        let xml = r#"<descriptors>
            <data_broadcast_id_descriptor data_broadcast_id="0x10000"/>
            <eacem_preferred_name_identifier_descriptor name_id="1"/>
        </descriptors>"#;
        assert!(session().from_xml(xml).is_err());
    }
}
