//! Human-readable rendering of descriptors.
//!
//! Each schema registers a display function which decodes its payload
//! straight from a [`PsiBuffer`] and writes one line per field. The display
//! functions never need a valid descriptor: they print what can be read and
//! the surrounding code reports truncation and extraneous bytes.

use std::fmt::{Display, Write};

use crate::buffer::PsiBuffer;
use crate::descriptor::{Descriptor, DescriptorContext, DescriptorList};
use crate::edid::Edid;
use crate::repository::PsiRepository;

/// Display function of a schema: payload cursor (after the extended tag of
/// extension families), margin of the lines and resolved identity.
pub type DisplayFn = fn(&mut TablesDisplay, &mut PsiBuffer, &str, &Edid);

const HEXA_BYTES_PER_LINE: usize = 16;

/// Text sink for descriptor displays.
#[derive(Debug, Clone)]
pub struct TablesDisplay {
    out: String,
    indent: usize,
    hex_uppercase: bool,
}

impl Default for TablesDisplay {
    fn default() -> Self {
        TablesDisplay {
            out: String::new(),
            indent: 2,
            hex_uppercase: true,
        }
    }
}

impl TablesDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Width of one indentation level.
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_hex_uppercase(mut self, uppercase: bool) -> Self {
        self.hex_uppercase = uppercase;
        self
    }

    /// Margin one level deeper than `margin`.
    pub fn nested(&self, margin: &str) -> String {
        format!("{}{}", margin, " ".repeat(self.indent))
    }

    pub fn output(&self) -> &str {
        &self.out
    }

    pub fn into_string(self) -> String {
        self.out
    }

    /// Write one line.
    pub fn line(&mut self, margin: &str, text: impl Display) {
        let _ = writeln!(self.out, "{}{}", margin, text);
    }

    fn hex_byte(&self, b: u8) -> String {
        if self.hex_uppercase {
            format!("{:02X}", b)
        } else {
            format!("{:02x}", b)
        }
    }

    /// Hexadecimal and ASCII dump, 16 bytes per line.
    pub fn hexa(&mut self, margin: &str, data: &[u8]) {
        for (i, chunk) in data.chunks(HEXA_BYTES_PER_LINE).enumerate() {
            let hex: Vec<String> = chunk.iter().map(|b| self.hex_byte(*b)).collect();
            let ascii: String = chunk
                .iter()
                .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
                .collect();
            let _ = writeln!(
                self.out,
                "{}{:04X}:  {:<width$}  {}",
                margin,
                i * HEXA_BYTES_PER_LINE,
                hex.join(" "),
                ascii,
                width = HEXA_BYTES_PER_LINE * 3 - 1
            );
        }
    }

    /// Dump the bytes a display function left unread.
    pub fn display_extra_data(&mut self, buf: &mut PsiBuffer, margin: &str) {
        let extra = buf.get_remaining_bytes();
        if !extra.is_empty() {
            self.line(margin, format_args!("Extraneous {} bytes:", extra.len()));
            let inner = self.nested(margin);
            self.hexa(&inner, &extra);
        }
    }

    /// Display a descriptor with its header line.
    ///
    /// `pds` is the private data specifier in effect at the descriptor's
    /// position in its list.
    pub fn display_descriptor(
        &mut self,
        index: usize,
        desc: &Descriptor,
        margin: &str,
        repo: &PsiRepository,
        ctx: &DescriptorContext,
        pds: Option<u32>,
    ) {
        let tag = desc.tag();
        let resolution = repo.resolve(tag, desc.payload(), ctx.standards, pds);
        let name = resolution
            .entry
            .map(|e| (e.factory)().display_name())
            .unwrap_or("unknown descriptor");
        self.line(
            margin,
            format_args!(
                "- Descriptor {}: {} (0x{:02X}, {}), {} bytes",
                index,
                name,
                tag,
                tag,
                desc.payload_size()
            ),
        );

        let inner = self.nested(margin);
        let edid = resolution.edid;
        match resolution.entry.and_then(|e| e.display) {
            Some(display) => {
                let mut buf = PsiBuffer::from_bytes(desc.payload());
                if let Some(ext) = edid.extended_tag {
                    buf.skip_bits(8);
                    self.line(&inner, format_args!("Extended tag: 0x{:02X}", ext));
                }
                display(self, &mut buf, &inner, &edid);
                if buf.read_error() {
                    self.line(&inner, "*** truncated descriptor");
                } else {
                    self.display_extra_data(&mut buf, &inner);
                }
            }
            None => self.hexa(&inner, desc.payload()),
        }
    }

    /// Display every descriptor of a list under its own private data specifier.
    pub fn display_descriptor_list(
        &mut self,
        list: &DescriptorList,
        margin: &str,
        repo: &PsiRepository,
        ctx: &DescriptorContext,
    ) {
        for (i, desc) in list.iter().enumerate() {
            let pds = list.private_data_specifier(i, ctx);
            self.display_descriptor(i, desc, margin, repo, ctx, pds);
        }
    }
}
