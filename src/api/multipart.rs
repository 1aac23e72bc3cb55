//! `multipart/form-data` body parsing for video uploads.

use anyhow::{anyhow, Result};

use super::http::find_subslice;

/// One form field. `data` borrows from the request body.
#[derive(Debug)]
pub(crate) struct Part<'a> {
    pub name: String,
    pub filename: Option<String>,
    pub data: &'a [u8],
}

/// Boundary from a `Content-Type` header, or `None` when the request is not
/// multipart form data.
pub(crate) fn boundary(content_type: &str) -> Option<String> {
    let mut params = content_type.split(';');
    let mime = params.next()?.trim();
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    params.find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}

pub(crate) fn parse<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<Part<'a>>> {
    let delimiter = format!("--{}", boundary).into_bytes();
    let start = find_subslice(body, &delimiter)
        .ok_or_else(|| anyhow!("multipart boundary not found"))?;
    let mut rest = &body[start + delimiter.len()..];
    let mut parts = Vec::new();
    loop {
        if rest.starts_with(b"--") {
            return Ok(parts);
        }
        rest = rest
            .strip_prefix(b"\r\n")
            .ok_or_else(|| anyhow!("malformed multipart delimiter"))?;
        let header_end = find_subslice(rest, b"\r\n\r\n")
            .ok_or_else(|| anyhow!("multipart part has no header terminator"))?;
        let headers = String::from_utf8_lossy(&rest[..header_end]).into_owned();
        rest = &rest[header_end + 4..];

        let mut closing = b"\r\n".to_vec();
        closing.extend_from_slice(&delimiter);
        let data_end = find_subslice(rest, &closing)
            .ok_or_else(|| anyhow!("multipart body is not terminated"))?;
        let data = &rest[..data_end];
        rest = &rest[data_end + closing.len()..];

        if let Some(part) = part_from_headers(&headers, data) {
            parts.push(part);
        }
    }
}

fn part_from_headers<'a>(headers: &str, data: &'a [u8]) -> Option<Part<'a>> {
    let disposition = headers.split("\r\n").find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case("content-disposition")
            .then(|| value.trim().to_string())
    })?;
    let mut name = None;
    let mut filename = None;
    for param in disposition.split(';').skip(1) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').to_string();
        match key.trim().to_ascii_lowercase().as_str() {
            "name" => name = Some(value),
            "filename" => filename = Some(value),
            _ => {}
        }
    }
    Some(Part {
        name: name?,
        filename,
        data,
    })
}

/// First part named `name` that was sent as a file.
pub(crate) fn file_part<'p, 'a>(parts: &'p [Part<'a>], name: &str) -> Option<&'p Part<'a>> {
    parts
        .iter()
        .find(|part| part.name == name && part.filename.is_some())
}
