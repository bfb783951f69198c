//! # utils.rs - Utility functions for rkl
//!
//! This module contains small helpers shared across the highlighting engine:
//! ASCII word-boundary tests, file-extension matching for language inference,
//! and source-position recovery for loader diagnostics.

/// Check whether the byte at `idx` is a word character.
///
/// A word character is an ASCII letter, digit, or underscore. Positions
/// outside the buffer count as non-word, so callers can probe `pos - 1` and
/// `pos + len` without bounds checks of their own (out-of-range lookups at
/// the edges of the buffer simply report "no word character there").
///
/// # Examples
///
/// ```
/// use rkl::utils::word_char;
///
/// assert!(word_char(b"a_1", 1));
/// assert!(!word_char(b"a-1", 1));
/// assert!(!word_char(b"abc", 17));
/// ```
pub fn word_char(buf: &[u8], idx: usize) -> bool {
    match buf.get(idx) {
        Some(&b) => b.is_ascii_alphanumeric() || b == b'_',
        None => false,
    }
}

/// Check whether the byte immediately before `pos` is a word character.
/// Position 0 has no predecessor and reports false.
pub fn word_char_before(buf: &[u8], pos: usize) -> bool {
    match pos.checked_sub(1) {
        Some(idx) => word_char(buf, idx),
        None => false,
    }
}

/// Whitespace test used by the match gates: space, tab, and the vertical
/// whitespace controls. Bytes past the end of the buffer are not
/// whitespace.
pub fn space(buf: &[u8], idx: usize) -> bool {
    matches!(
        buf.get(idx).copied(),
        Some(b' ' | b'\t' | 0x0a | 0x0b | 0x0c | 0x0d)
    )
}

/// Return the extension of `path` (the part after the last `.` in the file
/// name), or None when the file name has no extension.
pub fn file_extension(path: &str) -> Option<&str> {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let dot = name.rfind('.')?;
    if dot + 1 >= name.len() {
        return None;
    }
    Some(&name[dot + 1..])
}

/// Match an extension against one `extensions` glob from a language
/// definition root element.
///
/// Kate definitions carry globs like `*.cpp` or `*.py`; a handful use bare
/// suffix forms. A glob matches exactly when its suffix after `*.` equals
/// the extension; `glob_prefix_match` additionally accepts globs whose
/// suffix merely starts with the extension, the fallback used for
/// versioned extensions such as `*.html4`.
pub fn glob_matches(glob: &str, ext: &str) -> bool {
    match glob.strip_prefix("*.") {
        Some(suffix) => suffix == ext,
        None => glob == ext,
    }
}

/// Loose fallback match: the glob's suffix starts with the extension.
pub fn glob_prefix_match(glob: &str, ext: &str) -> bool {
    match glob.strip_prefix("*.") {
        Some(suffix) => suffix.starts_with(ext),
        None => glob.starts_with(ext),
    }
}

/// Recover the 1-based (line, column) of the first occurrence of `needle`
/// within `source`.
///
/// Loader diagnostics use this to point at the offending definition: the
/// parsed element tree no longer knows where it came from, so the raw file
/// text is re-scanned for a distinctive fragment (an attribute value, a
/// keyword). Returns None when the fragment cannot be found, in which case
/// the error is reported without a position.
pub fn locate(source: &str, needle: &str) -> Option<(usize, usize)> {
    if needle.is_empty() {
        return None;
    }
    let at = source.find(needle)?;
    let prefix = &source[..at];
    let line = prefix.bytes().filter(|&b| b == b'\n').count() + 1;
    let column = at - prefix.rfind('\n').map(|i| i + 1).unwrap_or(0) + 1;
    Some((line, column))
}
