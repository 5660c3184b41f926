//! Error types for the PSI/SI codec.
//!
//! Binary decoding never fails with an error value: truncated or malformed
//! payloads produce a descriptor whose `is_valid()` is false. The types here
//! cover the hard failures: XML analysis, encoding and raw framing.

use thiserror::Error;

/// Errors raised while converting an XML element into a descriptor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XmlError {
    /// No descriptor is registered under this element name.
    #[error("<{0}>: unknown descriptor element")]
    UnknownElement(String),

    /// The element does not have the name the descriptor expects.
    #[error("<{actual}>: expected element <{expected}>")]
    UnexpectedElement { expected: String, actual: String },

    /// A required attribute is absent.
    #[error("<{element}>: missing required attribute '{attribute}'")]
    MissingAttribute { element: String, attribute: String },

    /// An attribute could not be parsed.
    #[error("<{element}>: invalid value '{value}' for attribute '{attribute}'")]
    InvalidAttribute {
        element: String,
        attribute: String,
        value: String,
    },

    /// A numeric attribute is outside its legal range.
    #[error("<{element}>: attribute '{attribute}' value {value} out of range {min}..={max}")]
    OutOfRange {
        element: String,
        attribute: String,
        value: i128,
        min: i128,
        max: i128,
    },

    /// Wrong number of child elements with a given name.
    #[error("<{element}>: expected {min}..={max} <{child}> children, found {actual}")]
    Cardinality {
        element: String,
        child: String,
        min: usize,
        max: usize,
        actual: usize,
    },

    /// Schema-specific inconsistency between attributes or children.
    #[error("<{element}>: {message}")]
    Inconsistent { element: String, message: String },

    /// The document text itself is not well-formed.
    #[error("XML syntax error: {0}")]
    Syntax(String),
}

impl XmlError {
    /// Name of the element the error refers to, when there is one.
    pub fn element(&self) -> Option<&str> {
        match self {
            XmlError::UnknownElement(name) => Some(name),
            XmlError::UnexpectedElement { actual, .. } => Some(actual),
            XmlError::MissingAttribute { element, .. }
            | XmlError::InvalidAttribute { element, .. }
            | XmlError::OutOfRange { element, .. }
            | XmlError::Cardinality { element, .. }
            | XmlError::Inconsistent { element, .. } => Some(element),
            XmlError::Syntax(_) => None,
        }
    }
}

/// Errors raised while serializing a descriptor to binary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The descriptor is in the invalid state and cannot be serialized.
    #[error("cannot serialize invalid {0}")]
    InvalidDescriptor(&'static str),

    /// A field value does not fit in its binary width.
    #[error("{descriptor}: field {field} value {value} exceeds maximum {max}")]
    FieldOutOfRange {
        descriptor: &'static str,
        field: &'static str,
        value: u64,
        max: u64,
    },

    /// Optional fields are present in a combination the schema forbids.
    #[error("{descriptor}: {message}")]
    Inconsistent {
        descriptor: &'static str,
        message: &'static str,
    },

    /// The payload overflowed the buffer or a length field.
    #[error("{0}: payload overflows descriptor capacity")]
    Overflow(&'static str),
}

/// Errors raised while parsing the raw framing of a single descriptor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// Fewer than the two header bytes are available.
    #[error("descriptor header truncated: {0} bytes")]
    TruncatedHeader(usize),

    /// The payload is shorter than the declared length.
    #[error("descriptor 0x{tag:02X} truncated: expected {expected} payload bytes, got {actual}")]
    TruncatedPayload { tag: u8, expected: usize, actual: usize },

    /// The payload is longer than a one-byte length can express.
    #[error("descriptor 0x{tag:02X} payload too large: {size} bytes")]
    PayloadTooLarge { tag: u8, size: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_error_names_element() {
        let err = XmlError::MissingAttribute {
            element: "FMC_descriptor".to_string(),
            attribute: "ES_ID".to_string(),
        };
        assert_eq!(err.element(), Some("FMC_descriptor"));
        assert!(err.to_string().contains("ES_ID"));
        assert_eq!(XmlError::Syntax("eof".into()).element(), None);
    }

    #[test]
    fn test_encode_error_message() {
        let err = EncodeError::FieldOutOfRange {
            descriptor: "FMC_descriptor",
            field: "entries",
            value: 86,
            max: 85,
        };
        assert_eq!(
            err.to_string(),
            "FMC_descriptor: field entries value 86 exceeds maximum 85"
        );
    }
}
