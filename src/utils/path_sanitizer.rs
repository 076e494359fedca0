// SPDX-License-Identifier: GPL-3.0-only
use anyhow::Result;
use std::fmt::Write;

const MAX_FILE_NAME_LEN: usize = 200;

/// Map a URL path onto a flat, safe file name inside the asset cache
///
/// Path separators become `__`. Bytes outside `[A-Za-z0-9.-]`, `_` included,
/// are written as `_XX` hex escapes, so distinct paths never share a name.
/// Parent directory references are rejected. The root path maps to `index`.
pub fn cache_file_name(url_path: &str) -> Result<String> {
    let path = url_path.split(['?', '#']).next().unwrap_or("");

    let mut segments = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." {
            return Err(anyhow::anyhow!("Asset path contains a relative segment: {}", url_path));
        }
        segments.push(escape_segment(segment));
    }

    if segments.is_empty() {
        return Ok("index".to_string());
    }

    let name = segments.join("__");
    if name.starts_with('.') {
        return Err(anyhow::anyhow!("Asset file name cannot start with '.'"));
    }
    if name.len() > MAX_FILE_NAME_LEN {
        return Err(anyhow::anyhow!("Asset path too long (max {} characters)", MAX_FILE_NAME_LEN));
    }

    Ok(name)
}

fn escape_segment(segment: &str) -> String {
    let mut escaped = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'-') {
            escaped.push(char::from(byte));
        } else {
            let _ = write!(escaped, "_{byte:02X}");
        }
    }
    escaped
}
