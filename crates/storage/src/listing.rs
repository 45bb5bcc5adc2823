//! Azure "List Blobs" response parsing.

use crate::error::StorageError;

/// One page of a container listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Blob names in the order the service returned them.
    pub names: Vec<String>,
    /// Continuation marker; `None` when the listing is exhausted.
    pub next_marker: Option<String>,
}

/// Parse an `EnumerationResults` XML document.
///
/// This is a small tag scanner rather than a general XML parser. It handles:
/// - `<Blob>` elements anywhere in the document, taking each one's `<Name>`
/// - `<NextMarker>value</NextMarker>` and the empty forms `<NextMarker/>`,
///   `<NextMarker />` and `<NextMarker></NextMarker>`
/// - the five predefined XML entities and numeric character references in text
///
/// Namespace prefixes are not used by the service and are not supported.
pub fn parse_list_page(xml: &str) -> Result<ListPage, StorageError> {
    if !xml.contains("<EnumerationResults") {
        let preview: String = xml.chars().take(120).collect();
        return Err(StorageError::MalformedListing(format!(
            "missing EnumerationResults element (body starts with {:?})",
            preview
        )));
    }

    let mut names = Vec::new();
    let mut rest = xml;
    while let Some(start) = find_open_tag(rest, "Blob") {
        let after_open = &rest[start..];
        let end = after_open.find("</Blob>").ok_or_else(|| {
            StorageError::MalformedListing("unterminated <Blob> element".to_string())
        })?;
        let blob = &after_open[..end];
        if let Some(name) = element_text(blob, "Name") {
            if !name.is_empty() {
                names.push(name);
            }
        }
        rest = &after_open[end + "</Blob>".len()..];
    }

    let next_marker = element_text(xml, "NextMarker").filter(|m| !m.is_empty());

    Ok(ListPage { names, next_marker })
}

/// Find `<tag>` or `<tag attr=...>`, but not `<tagSuffix>`.
fn find_open_tag(haystack: &str, tag: &str) -> Option<usize> {
    let needle = format!("<{}", tag);
    let mut offset = 0;
    while let Some(pos) = haystack[offset..].find(&needle) {
        let abs = offset + pos;
        let next = haystack[abs + needle.len()..].chars().next();
        match next {
            Some('>') | Some(' ') | Some('/') | Some('\t') | Some('\n') | Some('\r') => {
                return Some(abs)
            }
            _ => offset = abs + needle.len(),
        }
    }
    None
}

/// Text content of the first `<tag>` element, entity-decoded.
fn element_text(haystack: &str, tag: &str) -> Option<String> {
    let start = find_open_tag(haystack, tag)?;
    let open = &haystack[start..];
    let close_bracket = open.find('>')?;
    if open[..close_bracket].ends_with('/') {
        return Some(String::new());
    }
    let body = &open[close_bracket + 1..];
    let end = body.find(&format!("</{}>", tag))?;
    Some(decode_entities(body[..end].trim()))
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let entity = &tail[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
