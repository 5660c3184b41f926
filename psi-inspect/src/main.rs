//! psi-inspect: display and convert MPEG-TS descriptor loops.
//!
//! Binary input is a raw descriptor loop (concatenated descriptors, without
//! the loop length), given as a file or as a hexadecimal string.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::{debug, error, info};
use psi_codec::{DescriptorContext, Standards};

mod commands;
mod logging;

use commands::{load_binary, Session};

/// psi-inspect - MPEG-TS descriptor display and XML conversion
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Configuration file path
    #[arg(short = 'f', long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Broadcasting standard in effect (mpeg, dvb, scte, atsc, isdb, japan, abnt), repeatable
    #[arg(short, long = "standard", global = true)]
    standards: Vec<String>,

    /// Private data specifier assumed before any private_data_specifier_descriptor
    #[arg(long, global = true, value_parser = parse_pds)]
    pds: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Display a binary descriptor loop
    Display {
        #[command(flatten)]
        input: BinaryInput,
    },
    /// Convert a binary descriptor loop to XML
    ToXml {
        #[command(flatten)]
        input: BinaryInput,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Convert an XML document to a binary descriptor loop
    FromXml {
        /// XML input file
        input: PathBuf,

        /// Binary output file (default: hexadecimal on stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct BinaryInput {
    /// Binary file containing a descriptor loop
    #[arg(required_unless_present = "hex")]
    file: Option<PathBuf>,

    /// Descriptor loop as a hexadecimal string
    #[arg(long, conflicts_with = "file")]
    hex: Option<String>,
}

/// Configuration file format.
#[derive(Debug, serde::Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    context: DescriptorContext,
    #[serde(default)]
    output: OutputSection,
    #[serde(default)]
    logging: LoggingSection,
}

#[derive(Debug, serde::Deserialize, Default)]
struct OutputSection {
    indent: Option<usize>,
    hex_uppercase: Option<bool>,
}

#[derive(Debug, serde::Deserialize, Default)]
struct LoggingSection {
    level: Option<String>,
}

fn parse_pds(text: &str) -> Result<u32, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse::<u32>(),
    };
    parsed.map_err(|e| format!("invalid private data specifier {}: {}", text, e))
}

fn load_config(path: &Path) -> Result<ConfigFile, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: ConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Merge command line values over file values.
fn build_session(args: &Args, file_config: &ConfigFile) -> Result<Session, Box<dyn std::error::Error>> {
    let mut ctx = file_config.context;
    if !args.standards.is_empty() {
        let mut standards = Standards::NONE;
        for name in &args.standards {
            standards |= Standards::from_name(name).ok_or_else(|| format!("unknown standard: {}", name))?;
        }
        ctx.standards = standards;
    }
    if args.pds.is_some() {
        ctx.default_pds = args.pds;
    }

    let mut session = Session::new(ctx);
    if let Some(indent) = file_config.output.indent {
        session.indent = indent;
    }
    if let Some(uppercase) = file_config.output.hex_uppercase {
        session.hex_uppercase = uppercase;
    }
    Ok(session)
}

fn write_or_print(output: Option<&Path>, text: &str) -> std::io::Result<()> {
    match output {
        Some(path) => std::fs::write(path, text),
        None => {
            print!("{}", text);
            Ok(())
        }
    }
}

fn run(args: &Args, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    match &args.command {
        Command::Display { input } => {
            let data = load_binary(input.file.as_deref(), input.hex.as_deref())?;
            print!("{}", session.display(&data));
        }
        Command::ToXml { input, output } => {
            let data = load_binary(input.file.as_deref(), input.hex.as_deref())?;
            write_or_print(output.as_deref(), &session.to_xml(&data))?;
        }
        Command::FromXml { input, output } => {
            let text = std::fs::read_to_string(input)?;
            let data = session.from_xml(&text)?;
            match output {
                Some(path) => {
                    std::fs::write(path, &data)?;
                    info!("Wrote {} bytes to {}", data.len(), path.display());
                }
                None => println!("{}", hex::encode_upper(&data)),
            }
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();

    // Load config file: explicit path > auto-detect > default
    let config_path = args.config.clone().or_else(|| {
        let default_path = PathBuf::from("psi-inspect.toml");
        if default_path.exists() {
            Some(default_path)
        } else {
            None
        }
    });
    let file_config = match &config_path {
        Some(path) => load_config(path).map_err(|e| {
            eprintln!("Failed to load config file {}: {}", path.display(), e);
            e
        })?,
        None => ConfigFile::default(),
    };

    logging::init_logging(args.verbose, file_config.logging.level.as_deref())?;
    if let Some(path) = &config_path {
        debug!("Loaded config from: {}", path.display());
    }

    let session = build_session(&args, &file_config)?;
    debug!(
        "Standards: {}, default PDS: {:?}",
        session.ctx.standards, session.ctx.default_pds
    );

    if let Err(e) = run(&args, &session) {
        error!("{}", e);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file() {
        let config: ConfigFile = toml::from_str(
            r#"
            [context]
            standards = ["dvb", "isdb"]
            default_pds = 0x28

            [output]
            indent = 4
            hex_uppercase = false

            [logging]
            level = "warn"
            "#,
        )
        .unwrap();
        assert_eq!(config.context.standards, Standards::DVB | Standards::ISDB);
        assert_eq!(config.context.default_pds, Some(0x28));
        assert_eq!(config.context.table_id, None);
        assert_eq!(config.output.indent, Some(4));
        assert_eq!(config.output.hex_uppercase, Some(false));
        assert_eq!(config.logging.level.as_deref(), Some("warn"));
    }

    #[test]
    fn test_config_defaults() {
        let config: ConfigFile = toml::from_str("").unwrap();
        assert_eq!(config.context, DescriptorContext::default());
        assert!(toml::from_str::<ConfigFile>("[context]\nstandards = [\"foo\"]").is_err());
    }

    #[test]
    fn test_command_line_overrides() {
        let config: ConfigFile = toml::from_str("[context]\nstandards = [\"isdb\"]\n[output]\nindent = 8").unwrap();
        let args = Args::parse_from(["psi-inspect", "display", "--hex", "00", "-s", "atsc", "--pds", "0x10"]);
        let session = build_session(&args, &config).unwrap();
        assert_eq!(session.ctx.standards, Standards::ATSC);
        assert_eq!(session.ctx.default_pds, Some(0x10));
        assert_eq!(session.indent, 8);

        let args = Args::parse_from(["psi-inspect", "display", "--hex", "00"]);
        let session = build_session(&args, &config).unwrap();
        assert_eq!(session.ctx.standards, Standards::ISDB);

        let args = Args::parse_from(["psi-inspect", "display", "--hex", "00", "-s", "nope"]);
        assert!(build_session(&args, &config).is_err());
    }

    #[test]
    fn test_parse_pds() {
        assert_eq!(parse_pds("0x28"), Ok(0x28));
        assert_eq!(parse_pds("16"), Ok(16));
        assert!(parse_pds("x").is_err());
    }
}
