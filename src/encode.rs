//! Unicode normalization and IRI-safe percent-encoding.
//!
//! Template hole values that end up inside an IRI are normalized to a
//! configurable Unicode form and percent-encoded so the resulting term is a
//! valid IRI regardless of what the source data contains.

use unicode_normalization::UnicodeNormalization;

/// Unicode normalization form applied before IRI percent-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalizationForm {
    /// Canonical decomposition followed by canonical composition.
    #[default]
    Nfc,
    /// Canonical decomposition.
    Nfd,
    /// Compatibility decomposition followed by canonical composition.
    Nfkc,
    /// Compatibility decomposition.
    Nfkd,
}

impl NormalizationForm {
    /// Applies this normalization form to a string.
    #[must_use]
    pub fn apply(&self, value: &str) -> String {
        match self {
            Self::Nfc => value.nfc().collect(),
            Self::Nfd => value.nfd().collect(),
            Self::Nfkc => value.nfkc().collect(),
            Self::Nfkd => value.nfkd().collect(),
        }
    }
}

/// Unreserved IRI characters that pass through unencoded.
const fn is_iri_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}

/// Percent-encodes every byte outside the IRI-unreserved set.
///
/// `upper_case` selects the hex digit case; upper-case is the default, the
/// lower-case form exists for backward compatibility with output produced
/// by older tool chains.
#[must_use]
pub fn percent_encode_iri(value: &str, upper_case: bool) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if is_iri_unreserved(byte) {
            out.push(byte as char);
        } else if upper_case {
            out.push_str(&format!("%{byte:02X}"));
        } else {
            out.push_str(&format!("%{byte:02x}"));
        }
    }
    out
}

/// Normalizes then percent-encodes a template hole value for use in an IRI.
#[must_use]
pub fn iri_safe(value: &str, form: NormalizationForm, upper_case: bool) -> String {
    percent_encode_iri(&form.apply(value), upper_case)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreserved_passthrough() {
        assert_eq!(percent_encode_iri("AZaz09-._~", true), "AZaz09-._~");
    }

    #[test]
    fn test_reserved_encoded() {
        assert_eq!(percent_encode_iri("a b/c", true), "a%20b%2Fc");
        assert_eq!(percent_encode_iri("a b/c", false), "a%20b%2fc");
    }

    #[test]
    fn test_utf8_bytes_encoded() {
        // é is 0xC3 0xA9 in UTF-8
        assert_eq!(percent_encode_iri("héllo", true), "h%C3%A9llo");
        assert_eq!(percent_encode_iri("héllo", false), "h%c3%a9llo");
    }

    #[test]
    fn test_nfc_composes_before_encoding() {
        // e + combining acute accent composes to é under NFC
        let decomposed = "he\u{0301}llo";
        assert_eq!(
            iri_safe(decomposed, NormalizationForm::Nfc, true),
            "h%C3%A9llo"
        );
        // NFD keeps the combining form: e (plain) + U+0301 (0xCC 0x81)
        assert_eq!(
            iri_safe(decomposed, NormalizationForm::Nfd, true),
            "he%CC%81llo"
        );
    }

    #[test]
    fn test_nfkc_folds_compatibility_chars() {
        // U+FB01 LATIN SMALL LIGATURE FI folds to "fi" under NFKC
        assert_eq!(iri_safe("\u{FB01}n", NormalizationForm::Nfkc, true), "fin");
    }
}
