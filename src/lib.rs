//! # lib.rs - Core Library for rkl
//!
//! This module provides the core functionality of rkl (Rusty Kate Listings),
//! a tool that converts source code into syntax-highlighted LaTeX by running
//! a stack-based, context-driven pattern matcher over the input.
//!
//! ## Architecture
//!
//! The library is organized into the following components:
//!
//! - **Rules** (`rules`): atomic matchers tried against a buffer position
//! - **Contexts** (`context`): ordered rule lists plus the context-switch
//!   machinery and the runtime context stack
//! - **Languages** (`language`): the loaded-definition registry, the
//!   line-by-line highlight driver and the LaTeX emission layer
//! - **Loading** (`loader`, `style`): Kate-syntax XML definitions and the
//!   JSON default-style palette, turned into the in-memory registry
//! - **Submodules**:
//!   - `keywords`: length-bucketed keyword sets with longest-match lookup
//!   - `args`: command-line argument parsing for the `rkl` binary
//!   - `utils`: word-boundary tests, extension matching, error positions
//!
//! ## Regex Engine
//!
//! Rule patterns in Kate definitions use an ECMAScript-flavoured syntax with
//! lookarounds, so rules are matched with `fancy-regex`. Patterns without
//! dynamic `%N` placeholders are compiled once at load time; dynamic rules
//! are compiled per substitution at match time. A pattern that fails to
//! compile is diagnosed once, when it is built, and matches nothing from
//! then on; loaded rules carry no mutable state and are safely shareable
//! across concurrent jobs.
//!
//! ## Usage Example
//!
//! ```ignore
//! use rkl::{LanguageSet, HighlightOptions, load_default_styles, load_language};
//!
//! let styles = load_default_styles(rkl::EMBEDDED_DEFAULT_STYLES)?;
//! let mut set = LanguageSet::new();
//! load_language(&mut set, &styles, &xml_text, None)?;
//!
//! let mut out = Vec::new();
//! set.highlight("C++", input.as_bytes(), &mut out, HighlightOptions::default())?;
//! ```

pub mod style;
// Re-export Style for easier access
pub use style::Style;

pub mod args;
pub mod context;
pub mod keywords;
pub mod language;
pub mod loader;
pub mod rules;
pub mod utils;

pub use language::{HighlightOptions, Language, LanguageSet};
pub use loader::load_language;
pub use style::load_default_styles;

use std::path::PathBuf;

/// The bundled default-style palette used when no `--styles` file is given.
/// This mirrors the on-disk `assets/default-styles.json` file.
pub const EMBEDDED_DEFAULT_STYLES: &str = include_str!("../assets/default-styles.json");

/// A fatal error raised while loading a definition file.
///
/// Load-time errors (malformed definitions, undefined name references,
/// duplicate definitions, circular dependencies, invalid colours) abort the
/// job; no partially loaded language is ever observable. Where possible the
/// error carries the definition file and a source position recovered by
/// re-scanning the file text.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", render_load_error(.file, .position, .message))]
pub struct LoadError {
    /// Definition file the error was raised for, when known
    pub file: Option<PathBuf>,
    /// 1-based (line, column) within that file, when recoverable
    pub position: Option<(usize, usize)>,
    /// Human-readable description of the problem
    pub message: String,
}

impl LoadError {
    /// Create a new error with no file or position attached.
    pub fn new(message: impl Into<String>) -> Self {
        LoadError {
            file: None,
            position: None,
            message: message.into(),
        }
    }

    /// Attach the definition file the error belongs to.
    pub fn in_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Attach a recovered 1-based source position.
    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.position = Some((line, column));
        self
    }
}

fn render_load_error(
    file: &Option<PathBuf>,
    position: &Option<(usize, usize)>,
    message: &str,
) -> String {
    match (file, position) {
        (Some(f), Some((line, col))) => format!(
            "in \"{}\", line {}, column {}: {}",
            f.display(),
            line,
            col,
            message
        ),
        (Some(f), None) => format!("in \"{}\": {}", f.display(), message),
        (None, Some((line, col))) => format!("line {}, column {}: {}", line, col, message),
        (None, None) => message.to_string(),
    }
}

/// Errors produced by the library entry points.
///
/// `Load` is fatal per job; `Io` covers input/output stream failures during
/// highlighting. There are no recoverable failures inside the dispatch loop
/// itself.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Definition loading failed
    #[error(transparent)]
    Load(#[from] LoadError),
    /// A highlight job referenced a language that was never loaded
    #[error("unknown language \"{0}\"")]
    UnknownLanguage(String),
    /// Reading the input or writing the output failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod lib_test {
    use super::*;

    #[test]
    fn test_load_error_rendering() {
        let plain = LoadError::new("duplicate style \"Comment\"");
        assert_eq!(plain.to_string(), "duplicate style \"Comment\"");

        let with_file = LoadError::new("undefined context \"Str\"").in_file("cpp.xml");
        assert_eq!(
            with_file.to_string(),
            "in \"cpp.xml\": undefined context \"Str\""
        );

        let located = LoadError::new("invalid colour \"#zz0000\"")
            .in_file("python.xml")
            .at(12, 31);
        assert_eq!(
            located.to_string(),
            "in \"python.xml\", line 12, column 31: invalid colour \"#zz0000\""
        );
    }

    #[test]
    fn test_embedded_palette_parses() {
        let styles = load_default_styles(EMBEDDED_DEFAULT_STYLES).expect("embedded palette");
        assert!(styles.contains_key("dsNormal"));
        assert!(styles.contains_key("dsKeyword"));
        assert!(styles.contains_key("dsComment"));
    }
}
