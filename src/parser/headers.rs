//! Part header decoding: the `Content-Disposition` parameters and the part media type.

use std::{iter::Peekable, str::Chars};

use http::{HeaderMap, header};
use mime::Mime;

use crate::{error::ParseError, storage::FileMeta};

use super::percent_decode_utf8;

/// Whether a part carries a scalar form value or a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    /// Plain text form value.
    Field,
    /// File attachment.
    File,
}

/// Decoded `Content-Disposition: form-data` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposition {
    /// Form field name.
    pub name: String,
    /// Client filename. `filename*` wins over `filename` when both are sent.
    pub file_name: Option<String>,
}

/// Headers of one multipart part, reduced to what the upload path consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartHeaders {
    /// Form field name.
    pub field_name: String,
    /// Client filename; present for file parts only.
    pub file_name: Option<String>,
    /// Declared media type, `application/octet-stream` when absent.
    pub content_type: Mime,
}

impl PartHeaders {
    /// A part is a file exactly when it declares a filename, even an empty one.
    pub fn kind(&self) -> PartKind {
        match self.file_name {
            Some(_) => PartKind::File,
            None => PartKind::Field,
        }
    }

    /// Storage metadata for a file part; `None` for scalar fields.
    pub fn file_meta(&self) -> Option<FileMeta> {
        let file_name = self.file_name.as_ref()?;
        Some(FileMeta {
            field_name: self.field_name.clone(),
            file_name: file_name.clone(),
            content_type: self.content_type.to_string(),
        })
    }
}

/// Decodes the header block of one part.
///
/// `Content-Disposition` is read as UTF-8 since browsers put raw UTF-8
/// filenames there.
pub fn parse_part_headers(headers: &HeaderMap) -> Result<PartHeaders, ParseError> {
    let disposition = headers
        .get(header::CONTENT_DISPOSITION)
        .ok_or_else(|| ParseError::new("missing Content-Disposition header"))?;
    let disposition = std::str::from_utf8(disposition.as_bytes())
        .map_err(|_| ParseError::new("Content-Disposition header must be UTF-8"))?;
    let Disposition { name, file_name } = parse_content_disposition(disposition)?;

    let content_type = match headers.get(header::CONTENT_TYPE) {
        None => mime::APPLICATION_OCTET_STREAM,
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|raw| raw.trim().parse::<Mime>().ok())
            .ok_or_else(|| ParseError::new("invalid part Content-Type header"))?,
    };

    Ok(PartHeaders {
        field_name: name,
        file_name,
        content_type,
    })
}

/// Decodes a `form-data` disposition value such as
/// `form-data; name="avatar"; filename="me.png"`.
///
/// Quoted values honour `\"` and `\\` escapes; any other backslash is kept,
/// so Windows paths survive. `filename` is taken literally while
/// `filename*` is RFC 5987 decoded.
pub fn parse_content_disposition(value: &str) -> Result<Disposition, ParseError> {
    let (kind, params) = value.split_once(';').unwrap_or((value, ""));
    if !kind.trim().eq_ignore_ascii_case("form-data") {
        return Err(ParseError::new("part Content-Disposition must be `form-data`"));
    }

    let mut name = None;
    let mut plain = None;
    let mut extended = None;
    for (key, raw) in disposition_params(params)? {
        match key.as_str() {
            "name" => name = Some(raw),
            "filename" => plain = Some(raw),
            "filename*" => extended = Some(decode_extended_value(&raw)?),
            _ => {}
        }
    }

    let name = name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ParseError::new("form-data part is missing a `name`"))?;

    Ok(Disposition {
        name,
        file_name: extended.or(plain),
    })
}

fn disposition_params(input: &str) -> Result<Vec<(String, String)>, ParseError> {
    let mut params = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars
            .next_if(|ch| *ch == ';' || ch.is_ascii_whitespace())
            .is_some()
        {}
        if chars.peek().is_none() {
            return Ok(params);
        }

        let mut key = String::new();
        loop {
            match chars.next() {
                Some('=') => break,
                Some(';') | None => {
                    return Err(ParseError::new("malformed Content-Disposition parameter"));
                }
                Some(ch) => key.push(ch),
            }
        }

        while chars.next_if(|ch| ch.is_ascii_whitespace()).is_some() {}
        let value = if chars.next_if_eq(&'"').is_some() {
            quoted_value(&mut chars)?
        } else {
            let mut raw = String::new();
            while let Some(ch) = chars.next_if(|ch| *ch != ';') {
                raw.push(ch);
            }
            raw.trim_end().to_owned()
        };

        params.push((key.trim().to_ascii_lowercase(), value));
    }
}

fn quoted_value(chars: &mut Peekable<Chars<'_>>) -> Result<String, ParseError> {
    let mut out = String::new();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => return Ok(out),
            '\\' => match chars.next_if(|next| matches!(next, '"' | '\\')) {
                Some(escaped) => out.push(escaped),
                None => out.push('\\'),
            },
            _ => out.push(ch),
        }
    }
    Err(ParseError::new("unterminated quoted Content-Disposition parameter"))
}

// `charset'language'percent-encoded`
fn decode_extended_value(raw: &str) -> Result<String, ParseError> {
    let mut pieces = raw.splitn(3, '\'');
    let (Some(charset), Some(_language), Some(encoded)) =
        (pieces.next(), pieces.next(), pieces.next())
    else {
        return Err(ParseError::new("malformed filename* parameter"));
    };

    if !charset.eq_ignore_ascii_case("utf-8") {
        return Err(ParseError::new(format!(
            "unsupported filename* charset `{charset}`"
        )));
    }

    percent_decode_utf8(
        encoded,
        "invalid percent-encoding in filename*",
        "filename* is not valid UTF-8",
    )
}
