//! `multipart/form-data` body parsing (RFC 7578 subset, no nesting).
//!
//! # Responsibilities
//! - Extract the boundary from the `Content-Type` header
//! - Split the body on `--<boundary>` markers by exact byte search
//! - Parse each part's headers and keep its raw content
//!
//! # Design Decisions
//! - Never fails: a missing boundary or malformed body yields an empty
//!   result, which callers treat the same as "no multipart data"
//! - Content before the first marker is preamble and discarded
//! - A marker followed by `--` ends the body; anything after is epilogue
//! - Parts without `Content-Disposition`, without a header/content split or
//!   with an empty field name are dropped individually

use axum::body::Bytes;

const CRLF: &[u8] = b"\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// True when the media type of `content_type` is `multipart/form-data`.
pub fn is_multipart(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|media| media.trim().eq_ignore_ascii_case("multipart/form-data"))
}

/// The `boundary` parameter of a `Content-Type` value, unquoted.
pub fn boundary(content_type: &str) -> Option<String> {
    split_params(content_type)
        .into_iter()
        .skip(1)
        .find_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("boundary")
                .then(|| unquote(value.trim()))
        })
        .filter(|b| !b.is_empty())
}

/// One part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
    pub name: String,
    /// Present for file uploads, absent for plain fields.
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub content: Bytes,
}

impl MultipartPart {
    pub fn is_file(&self) -> bool {
        self.filename.is_some()
    }

    /// Content as text, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}

/// Parsed multipart body, parts in body order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartData {
    parts: Vec<MultipartPart>,
}

impl MultipartData {
    /// Parse `body` using the boundary from `content_type`.
    pub fn parse(content_type: &str, body: &[u8]) -> Self {
        let Some(boundary) = boundary(content_type) else {
            tracing::debug!("Multipart body without boundary parameter");
            return Self::default();
        };
        Self {
            parts: split_parts(&boundary, body),
        }
    }

    pub fn parts(&self) -> &[MultipartPart] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// First plain field called `name`, as text.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.parts
            .iter()
            .filter(|p| !p.is_file() && p.name == name)
            .find_map(MultipartPart::text)
    }

    /// Every plain field called `name` (multi-select inputs).
    pub fn fields(&self, name: &str) -> Vec<&str> {
        self.parts
            .iter()
            .filter(|p| !p.is_file() && p.name == name)
            .filter_map(MultipartPart::text)
            .collect()
    }

    /// First file part called `name`.
    pub fn file(&self, name: &str) -> Option<&MultipartPart> {
        self.parts.iter().find(|p| p.is_file() && p.name == name)
    }

    /// Every file part called `name` (multi-file uploads).
    pub fn files(&self, name: &str) -> Vec<&MultipartPart> {
        self.parts
            .iter()
            .filter(|p| p.is_file() && p.name == name)
            .collect()
    }

    /// Plain text fields as name/value pairs, for merging into request params.
    pub fn field_pairs(&self) -> Vec<(String, String)> {
        self.parts
            .iter()
            .filter(|p| !p.is_file())
            .filter_map(|p| Some((p.name.clone(), p.text()?.to_string())))
            .collect()
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

fn split_parts(boundary: &str, body: &[u8]) -> Vec<MultipartPart> {
    let marker = format!("--{boundary}").into_bytes();
    let mut parts = Vec::new();

    let Some(first) = find(body, &marker, 0) else {
        return parts;
    };
    let mut cursor = first + marker.len();

    loop {
        if body[cursor..].starts_with(b"--") {
            break;
        }
        let Some(next) = find(body, &marker, cursor) else {
            // No closing marker: the trailing fragment is not a complete part.
            break;
        };

        let mut chunk = &body[cursor..next];
        if chunk.starts_with(CRLF) {
            chunk = &chunk[CRLF.len()..];
        }
        if chunk.ends_with(CRLF) {
            chunk = &chunk[..chunk.len() - CRLF.len()];
        }
        if let Some(part) = parse_part(chunk) {
            parts.push(part);
        }
        cursor = next + marker.len();
    }

    parts
}

fn parse_part(chunk: &[u8]) -> Option<MultipartPart> {
    let split = find(chunk, HEADER_END, 0)?;
    let header_block = String::from_utf8_lossy(&chunk[..split]);
    let content = Bytes::copy_from_slice(&chunk[split + HEADER_END.len()..]);

    let mut disposition = None;
    let mut content_type = None;
    for line in header_block.split("\r\n") {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        if name.eq_ignore_ascii_case("content-disposition") {
            disposition = Some(value.trim().to_string());
        } else if name.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.trim().to_string());
        }
    }

    let disposition = disposition?;
    let mut name = None;
    let mut filename = None;
    for param in split_params(&disposition).into_iter().skip(1) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("name") {
            name = Some(unquote(value.trim()));
        } else if key.eq_ignore_ascii_case("filename") {
            filename = Some(unquote(value.trim()));
        }
    }

    let name = name.filter(|n| !n.is_empty())?;
    Some(MultipartPart {
        name,
        filename,
        content_type,
        content,
    })
}

/// Split a header value on `;` outside of double quotes.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                params.push(value[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(value[start..].trim());
    params
}

fn unquote(value: &str) -> String {
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => {
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else {
                    out.push(c);
                }
            }
            out
        }
        None => value.to_string(),
    }
}
