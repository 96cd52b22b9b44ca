use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum MultipartError {
    BoundaryNotFound,
    InvalidFormat,
    Utf8Error,
}

impl fmt::Display for MultipartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MultipartError::BoundaryNotFound => write!(f, "missing multipart boundary"),
            MultipartError::InvalidFormat => write!(f, "malformed multipart body"),
            MultipartError::Utf8Error => write!(f, "part headers are not valid UTF-8"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

pub(crate) fn extract_boundary(content_type: &str) -> Result<String, MultipartError> {
    content_type
        .split(';')
        .find_map(|s| s.trim().strip_prefix("boundary="))
        .map(|s| s.trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
        .ok_or(MultipartError::BoundaryNotFound)
}

/// Splits a `multipart/form-data` body into named parts. Parts without a
/// `name` in their content disposition are dropped.
pub(crate) fn parse(body: &Bytes, boundary: &str) -> Result<Vec<Part>, MultipartError> {
    let delimiter = format!("--{}", boundary);
    let closing = format!("\r\n--{}", boundary);

    let mut pos = find_subsequence(body, delimiter.as_bytes()).ok_or(MultipartError::InvalidFormat)?
        + delimiter.len();
    let mut parts = Vec::new();

    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            return Ok(parts);
        }
        if !rest.starts_with(b"\r\n") {
            return Err(MultipartError::InvalidFormat);
        }
        pos += 2;

        let end = find_subsequence(&body[pos..], closing.as_bytes())
            .ok_or(MultipartError::InvalidFormat)?;
        if let Some(part) = parse_part(body.slice(pos..pos + end))? {
            parts.push(part);
        }
        pos += end + closing.len();
    }
}

fn parse_part(raw: Bytes) -> Result<Option<Part>, MultipartError> {
    let sep = b"\r\n\r\n";
    let split = find_subsequence(&raw, sep).ok_or(MultipartError::InvalidFormat)?;
    let headers = parse_headers(&raw[..split])?;
    let data = raw.slice(split + sep.len()..);

    let Some(name) = headers.get("name") else {
        return Ok(None);
    };
    Ok(Some(Part {
        name: name.clone(),
        filename: headers.get("filename").cloned(),
        content_type: headers.get("content-type").cloned(),
        data,
    }))
}

fn parse_headers(headers: &[u8]) -> Result<HashMap<String, String>, MultipartError> {
    let mut map = HashMap::new();
    let headers_str = std::str::from_utf8(headers).map_err(|_| MultipartError::Utf8Error)?;

    for line in headers_str.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();

        // name and filename live in the content disposition parameters
        if key == "content-disposition" {
            for param in value.split(';').skip(1) {
                if let Some((k, v)) = param.trim().split_once('=') {
                    map.insert(k.trim().to_ascii_lowercase(), v.trim().trim_matches('"').to_string());
                }
            }
        } else {
            map.insert(key, value.trim().to_string());
        }
    }

    Ok(map)
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "--XyZ\r\n\
        Content-Disposition: form-data; name=\"title\"\r\n\
        \r\n\
        Quarterly report\r\n\
        --XyZ\r\n\
        Content-Disposition: form-data; name=\"doc\"; filename=\"report.txt\"\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        line one\r\nline two\r\n\
        --XyZ--\r\n";

    #[test]
    fn boundary_is_read_from_content_type() {
        assert_eq!(
            extract_boundary("multipart/form-data; boundary=\"XyZ\"").unwrap(),
            "XyZ"
        );
        assert_eq!(
            extract_boundary("multipart/form-data").unwrap_err(),
            MultipartError::BoundaryNotFound
        );
    }

    #[test]
    fn fields_and_files_are_split() {
        let parts = parse(&Bytes::from_static(BODY.as_bytes()), "XyZ").unwrap();
        assert_eq!(parts.len(), 2);

        assert_eq!(parts[0].name, "title");
        assert_eq!(parts[0].filename, None);
        assert_eq!(&parts[0].data[..], b"Quarterly report");

        assert_eq!(parts[1].name, "doc");
        assert_eq!(parts[1].filename.as_deref(), Some("report.txt"));
        assert_eq!(parts[1].content_type.as_deref(), Some("text/plain"));
        assert_eq!(&parts[1].data[..], b"line one\r\nline two");
    }

    #[test]
    fn truncated_bodies_are_rejected() {
        let body = Bytes::from_static(b"--XyZ\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nvalue");
        assert_eq!(parse(&body, "XyZ").unwrap_err(), MultipartError::InvalidFormat);
        assert_eq!(
            parse(&Bytes::from_static(b"no delimiter"), "XyZ").unwrap_err(),
            MultipartError::InvalidFormat
        );
    }
}
