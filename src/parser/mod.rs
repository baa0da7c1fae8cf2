/// Multipart boundary parsing helpers.
pub mod boundary;
/// Multipart part header parsing helpers.
pub mod headers;
/// Streaming multipart parser state machine.
pub mod stream;

pub use boundary::extract_multipart_boundary;
pub use headers::{Disposition, PartHeaders, PartKind, parse_content_disposition, parse_part_headers};
pub use stream::{MultipartStream, PartEvent};

use percent_encoding::percent_decode_str;

use crate::error::ParseError;

/// Strictly percent-decodes `value` into UTF-8.
///
/// `%` must always be followed by two hex digits.
pub(crate) fn percent_decode_utf8(
    value: &str,
    invalid_encoding_message: &'static str,
    invalid_utf8_message: &'static str,
) -> Result<String, ParseError> {
    let raw = value.as_bytes();
    for (index, byte) in raw.iter().enumerate() {
        if *byte != b'%' {
            continue;
        }
        let escape = raw.get(index + 1..index + 3);
        if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
            return Err(ParseError::new(invalid_encoding_message));
        }
    }

    percent_decode_str(value)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ParseError::new(invalid_utf8_message))
}
