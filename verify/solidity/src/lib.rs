//! Solidity contract generation for the PDM attestation ceremony
//!
//! The proving system emits a generic Groth16 verifier. This crate turns that
//! text into a system-specific verifier and appends the model registry that
//! consumes it.
//!
//! ## Core Components
//!
//! - **Verifier Template**: renames the generated verifier and pins its pragma
//! - **Registry Contract**: renders the companion model registry
//! - **Contract Source**: the combined text plus structural markers for inspection

pub mod errors;
pub mod registry;
pub mod source;
pub mod verifier;

pub use errors::*;
pub use registry::*;
pub use source::*;
pub use verifier::*;

/// Pragma applied to every generated contract unless configured otherwise
pub const DEFAULT_PRAGMA: &str = "^0.8.19";

/// Returns true when `name` is a valid Solidity identifier
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(is_identifier_char)
}

pub(crate) fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert!(is_identifier("PDMProductionVerifier"));
        assert!(is_identifier("_Registry2"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("2Fast"));
        assert!(!is_identifier("My Verifier"));
        assert!(!is_identifier("Verifier;"));
    }
}
