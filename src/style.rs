//! # style.rs - Styles and the default-style palette
//!
//! A [`Style`] is a named record of colours and typographic attributes that
//! the LaTeX emitter turns into formatting directives. Styles come from two
//! places:
//!
//! 1. **Default styles** (the palette): a JSON document mapping base names
//!    (`Normal`, `Keyword`, `Comment`, ...) to colours and attributes. Each
//!    entry is exposed under a `ds` prefix (`dsNormal`, `dsKeyword`, ...).
//! 2. **Item datas**: per-language styles in a definition's `<itemDatas>`
//!    section. Each names a default style to fall back on; attributes it
//!    does not set inherit from that fallback. Resolution happens at load
//!    time, so a `Style` always carries concrete values.
//!
//! Colours are normalized at load to uppercase 6-digit `RRGGBB`.

use std::collections::HashMap;

use serde_json::Value;

use crate::LoadError;

/// Identifier of a style in a [`crate::LanguageSet`] registry: the owning
/// language's index plus the style's index within that language's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleId {
    pub lang: usize,
    pub style: usize,
}

/// A fully resolved style record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Style {
    /// Style name; default styles are prefixed with `ds`
    pub name: String,
    /// Name of the default style this one fell back on, if any
    pub fallback: Option<String>,
    /// Foreground colour, uppercase `RRGGBB`
    pub fg_colour: String,
    /// Background colour, uppercase `RRGGBB`
    pub bg_colour: String,
    pub italic: bool,
    pub bold: bool,
    pub underline: bool,
    pub strikethrough: bool,
}

impl Style {
    /// Normalize a colour specification to uppercase `RRGGBB`.
    ///
    /// Accepts `#rrggbb`, `#rgb` (each digit lands in the high nibble, low
    /// nibble zero), and the same forms without the leading `#`.
    ///
    /// # Examples
    ///
    /// ```
    /// use rkl::Style;
    ///
    /// assert_eq!(Style::format_colour("#1f2c3d").unwrap(), "1F2C3D");
    /// assert_eq!(Style::format_colour("#abc").unwrap(), "A0B0C0");
    /// assert!(Style::format_colour("#12345").is_err());
    /// ```
    pub fn format_colour(col: &str) -> Result<String, String> {
        let err = || {
            format!(
                "invalid colour \"{}\" (colours must be \"#rgb\" or \"#rrggbb\" \
                 where r,g,b are hexadecimal digits)",
                col
            )
        };

        let digits = col.strip_prefix('#').unwrap_or(col);
        let mut result = [b'0'; 6];

        match digits.len() {
            6 => {
                for (i, b) in digits.bytes().enumerate() {
                    if !b.is_ascii_hexdigit() {
                        return Err(err());
                    }
                    result[i] = b.to_ascii_uppercase();
                }
            }
            3 => {
                for (i, b) in digits.bytes().enumerate() {
                    if !b.is_ascii_hexdigit() {
                        return Err(err());
                    }
                    result[2 * i] = b.to_ascii_uppercase();
                }
            }
            _ => return Err(err()),
        }

        // result only ever holds ASCII hex digits
        Ok(String::from_utf8_lossy(&result).into_owned())
    }
}

/// Parse the default-style palette from its JSON text.
///
/// The document holds a `text-styles` object whose children each describe
/// one base style. Per the palette schema, `text-color` and
/// `background-color` are colour strings, and the boolean attributes are
/// either plain booleans or typed children of the form
/// `{"type": "true"}` / `{"type": "false"}`; both spellings are accepted.
/// Missing colours default to black on white; missing attributes are off.
///
/// Each entry is returned under its `ds`-prefixed name.
///
/// ## Arguments
///
/// * `json` - Raw text of the palette file
///
/// ## Returns
///
/// A map from `ds<Name>` to the resolved [`Style`], or a [`LoadError`]
/// describing the first malformed entry.
pub fn load_default_styles(json: &str) -> Result<HashMap<String, Style>, LoadError> {
    let root: Value = serde_json::from_str(json)
        .map_err(|e| LoadError::new(format!("malformed style palette: {}", e)))?;

    let text_styles = root
        .get("text-styles")
        .and_then(Value::as_object)
        .ok_or_else(|| LoadError::new("style palette has no \"text-styles\" object"))?;

    let mut styles = HashMap::new();

    for (name, def) in text_styles {
        let def = def
            .as_object()
            .ok_or_else(|| LoadError::new(format!("style \"{}\" is not an object", name)))?;

        let colour = |key: &str, fallback: &str| -> Result<String, LoadError> {
            let raw = match def.get(key) {
                Some(Value::String(s)) => s.as_str(),
                // The typed-child form wraps the value in a "text" field
                Some(Value::Object(o)) => o
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or(fallback),
                None => fallback,
                Some(other) => {
                    return Err(LoadError::new(format!(
                        "style \"{}\": \"{}\" must be a colour string, got {}",
                        name, key, other
                    )));
                }
            };
            Style::format_colour(raw)
                .map_err(|e| LoadError::new(format!("style \"{}\": {}", name, e)))
        };

        let flag = |key: &str| -> Result<bool, LoadError> {
            match def.get(key) {
                None => Ok(false),
                Some(Value::Bool(b)) => Ok(*b),
                Some(Value::Object(o)) => match o.get("type").and_then(Value::as_str) {
                    Some("true") => Ok(true),
                    Some("false") | None => Ok(false),
                    Some(other) => Err(LoadError::new(format!(
                        "style \"{}\": \"{}\" has invalid type \"{}\"",
                        name, key, other
                    ))),
                },
                Some(Value::String(s)) => Ok(s == "true"),
                Some(other) => Err(LoadError::new(format!(
                    "style \"{}\": \"{}\" must be a boolean, got {}",
                    name, key, other
                ))),
            }
        };

        let style = Style {
            name: format!("ds{}", name),
            fallback: None,
            fg_colour: colour("text-color", "#000000")?,
            bg_colour: colour("background-color", "#ffffff")?,
            italic: flag("italic")?,
            bold: flag("bold")?,
            underline: flag("underline")?,
            strikethrough: flag("strikethrough")?,
        };

        styles.insert(style.name.clone(), style);
    }

    Ok(styles)
}
