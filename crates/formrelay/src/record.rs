//! Decoding of URL-encoded form submissions.
//!
//! A submission is the raw body of a posted HTML form,
//! `key1=value1&key2=value2`. The whole body is URL-decoded first and then
//! split into pairs, so an encoded `&` or `=` acts as a separator. Decoding
//! turns it into a [`DecodedRecord`] or a [`DecodeError`] saying why the
//! payload was rejected.

use indexmap::IndexMap;
use percent_encoding::percent_decode;
use thiserror::Error;

/// Field name to field value mapping produced from one submission.
///
/// Fields keep the order they were submitted in. A key that appears more
/// than once keeps its first position and its last value.
pub type DecodedRecord = IndexMap<String, String>;

/// Why a submission could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The payload is not UTF-8 text.
    #[error("submission is not valid UTF-8: {0}")]
    InvalidText(#[from] std::str::Utf8Error),

    /// Percent escapes decode to bytes that are not UTF-8.
    #[error("submission {text:?} does not decode to UTF-8 text")]
    MalformedEscape {
        /// The submission as received.
        text: String,
    },

    /// A decoded pair has no `=` between key and value.
    #[error("pair {pair:?} has no '=' separator")]
    MissingSeparator {
        /// The offending pair after decoding.
        pair: String,
    },

    /// A decoded pair has more than one `=`.
    #[error("pair {pair:?} has more than one '=' separator")]
    ExtraSeparator {
        /// The offending pair after decoding.
        pair: String,
    },
}

/// Decode form text: `+` is a space, `%XX` is a byte.
///
/// Escapes that are not followed by two hex digits are kept literally.
fn decode_form_text(text: &str) -> Result<String, DecodeError> {
    let spaced = text.replace('+', " ");
    percent_decode(spaced.as_bytes())
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .map_err(|_| DecodeError::MalformedEscape {
            text: text.to_string(),
        })
}

/// Decode a URL-encoded submission into a record.
///
/// After decoding, every `&`-separated pair must contain exactly one `=`,
/// so an empty payload or a bare word such as `justtext` is rejected.
///
/// # Errors
///
/// Returns a [`DecodeError`] describing the first pair that failed.
pub fn decode(payload: &[u8]) -> Result<DecodedRecord, DecodeError> {
    let decoded = decode_form_text(std::str::from_utf8(payload)?)?;

    let mut record = DecodedRecord::new();
    for pair in decoded.split('&') {
        let mut parts = pair.split('=');
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            return Err(DecodeError::MissingSeparator {
                pair: pair.to_string(),
            });
        };
        if parts.next().is_some() {
            return Err(DecodeError::ExtraSeparator {
                pair: pair.to_string(),
            });
        }

        record.insert(key.to_string(), value.to_string());
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

    fn record(pairs: &[(&str, &str)]) -> DecodedRecord {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_decode_simple_pairs() {
        let decoded = decode(b"a=1&b=2").unwrap();
        assert_eq!(decoded, record(&[("a", "1"), ("b", "2")]));
    }

    #[test]
    fn test_decode_plus_and_percent_escapes() {
        let decoded = decode(b"name=Alice+Smith&msg=Hi%21%20there").unwrap();
        assert_eq!(decoded["name"], "Alice Smith");
        assert_eq!(decoded["msg"], "Hi! there");
    }

    #[test]
    fn test_decode_utf8_escapes() {
        let decoded = decode(b"city=Z%C3%BCrich").unwrap();
        assert_eq!(decoded["city"], "Zürich");
    }

    #[test]
    fn test_decode_encoded_equals_is_a_separator() {
        assert_eq!(
            decode(b"q=a%3Db").unwrap_err(),
            DecodeError::ExtraSeparator {
                pair: "q=a=b".to_string()
            }
        );
    }

    #[test]
    fn test_decode_encoded_ampersand_is_a_separator() {
        assert_eq!(
            decode(b"msg=Tom%20%26%20Jerry").unwrap_err(),
            DecodeError::MissingSeparator {
                pair: " Jerry".to_string()
            }
        );
    }

    #[test]
    fn test_decode_encoded_separators_can_form_pairs() {
        let decoded = decode(b"a%3D1%26b%3D2").unwrap();
        assert_eq!(decoded, record(&[("a", "1"), ("b", "2")]));
    }

    #[test]
    fn test_decode_empty_value() {
        let decoded = decode(b"a=&b=2").unwrap();
        assert_eq!(decoded["a"], "");
        assert_eq!(decoded["b"], "2");
    }

    #[test]
    fn test_decode_repeated_key_keeps_last() {
        let decoded = decode(b"a=1&a=2").unwrap();
        assert_eq!(decoded, record(&[("a", "2")]));
    }

    #[test]
    fn test_decode_incomplete_escape_kept_literally() {
        let decoded = decode(b"pct=100%").unwrap();
        assert_eq!(decoded["pct"], "100%");
    }

    #[test]
    fn test_decode_missing_separator() {
        let err = decode(b"justtext").unwrap_err();
        assert_eq!(
            err,
            DecodeError::MissingSeparator {
                pair: "justtext".to_string()
            }
        );
    }

    #[test]
    fn test_decode_empty_payload_rejected() {
        assert!(matches!(
            decode(b""),
            Err(DecodeError::MissingSeparator { .. })
        ));
    }

    #[test]
    fn test_decode_trailing_ampersand_rejected() {
        assert!(matches!(
            decode(b"a=1&"),
            Err(DecodeError::MissingSeparator { .. })
        ));
    }

    #[test]
    fn test_decode_extra_separator() {
        assert!(matches!(
            decode(b"a=1=2"),
            Err(DecodeError::ExtraSeparator { .. })
        ));
    }

    #[test]
    fn test_decode_invalid_utf8_payload() {
        assert!(matches!(
            decode(&[b'a', b'=', 0xff, 0xfe]),
            Err(DecodeError::InvalidText(_))
        ));
    }

    #[test]
    fn test_decode_escape_to_invalid_utf8() {
        assert!(matches!(
            decode(b"a=%FF"),
            Err(DecodeError::MalformedEscape { .. })
        ));
    }

    #[test]
    fn test_decode_keeps_submission_order() {
        let decoded = decode(b"name=Alice&msg=Hi&age=30").unwrap();
        let keys: Vec<_> = decoded.keys().map(String::as_str).collect();
        assert_eq!(keys, ["name", "msg", "age"]);
    }

    #[test]
    fn test_decode_round_trip() {
        let original = decode(b"name=Alice+Smith&msg=Hi%21&city=Z%C3%BCrich&empty=").unwrap();

        // Re-encode in reverse field order; `+` for spaces as browsers do.
        let reencoded = original
            .iter()
            .rev()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(k, NON_ALPHANUMERIC),
                    utf8_percent_encode(v, NON_ALPHANUMERIC)
                        .to_string()
                        .replace("%20", "+")
                )
            })
            .collect::<Vec<_>>()
            .join("&");

        let decoded = decode(reencoded.as_bytes()).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded["name"], "Alice Smith");
        assert_eq!(decoded["city"], "Zürich");
    }

    #[test]
    fn test_decode_error_display() {
        let err = decode(b"justtext").unwrap_err();
        assert!(err.to_string().contains("justtext"));
    }
}
