//! # language.rs - The language registry and the highlight driver
//!
//! A [`Language`] is a loaded definition: styles, contexts, and keyword
//! lists in index-addressed tables, plus the default context and the
//! empty-line rules. A [`LanguageSet`] owns every loaded language; rules
//! address styles, contexts, and keyword lists with two-level ids
//! (language index, item index) so that rules cloned across languages by
//! `IncludeRules` keep working. The whole registry is immutable after
//! loading and can be shared by any number of highlight jobs.
//!
//! ## The highlight loop
//!
//! `highlight` consumes the input line by line. At each position the top
//! context's rules are tried in declaration order; the first match wins,
//! its context switch is applied, and the matched span is emitted under
//! the winning style. When no rule matches, one character is emitted under
//! the current context's attribute. End-of-line and empty-line hooks fire
//! the corresponding context switches.
//!
//! ## LaTeX emission
//!
//! Two modes. Inline mode wraps each span in a stack of braces
//! (`\colorbox` when the background is not white, `\textcolor`, then one
//! group per set attribute). Command mode emits a single
//! `\<Language><Style>{...}` call per span and relies on the definitions
//! written by [`LanguageSet::generate_commands`].

use std::collections::HashMap;
use std::io::{self, BufRead, Write};

use log::{debug, warn};

use crate::context::{Context, ContextId, ContextStack};
use crate::keywords::{KeywordSet, ListId};
use crate::rules::Rule;
use crate::style::{Style, StyleId};
use crate::Error;

/// A fallthrough chain longer than this is cycling, not progressing.
const MAX_FALLTHROUGH_HOPS: usize = 128;

/// Options controlling the emitted LaTeX.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighlightOptions {
    /// Emit `\<Language><Style>{...}` commands instead of inline braces
    pub use_commands: bool,
}

/// One loaded language definition.
///
/// All tables are index-addressed; the `*_index` maps translate definition
/// names to indices at load time. Instances are only built by the loader
/// and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Language {
    pub name: String,
    /// Controls keyword case folding (general/keywords casesensitive)
    pub case_sensitive: bool,
    pub styles: Vec<Style>,
    pub style_index: HashMap<String, usize>,
    pub contexts: Vec<Context>,
    pub context_index: HashMap<String, usize>,
    pub keyword_lists: Vec<KeywordSet>,
    pub list_index: HashMap<String, usize>,
    /// Index of the default context (the first one declared)
    pub default_context: usize,
    /// Anchored regex rules deciding whether a non-blank line counts as empty
    pub empty_line_rules: Vec<Rule>,
    /// Extension globs from the definition root, for language inference
    pub extensions: Vec<String>,
    /// Languages whose rules this one includes via `##`
    pub dependencies: Vec<String>,
}

/// The registry of loaded languages.
#[derive(Debug, Clone, Default)]
pub struct LanguageSet {
    languages: Vec<Language>,
    by_name: HashMap<String, usize>,
}

impl LanguageSet {
    pub fn new() -> Self {
        LanguageSet::default()
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&Language> {
        self.index_of(name).map(|i| &self.languages[i])
    }

    /// The language at `idx`. Ids handed out by the loader are always valid.
    pub fn language(&self, idx: usize) -> &Language {
        &self.languages[idx]
    }

    pub fn context(&self, id: ContextId) -> &Context {
        &self.languages[id.lang].contexts[id.ctx]
    }

    pub fn style(&self, id: StyleId) -> &Style {
        &self.languages[id.lang].styles[id.style]
    }

    pub fn keyword_list(&self, id: ListId) -> &KeywordSet {
        &self.languages[id.lang].keyword_lists[id.list]
    }

    /// Register a fully built language. Used by the loader, which has
    /// already rejected duplicate names.
    pub(crate) fn insert(&mut self, lang: Language) -> usize {
        let idx = self.languages.len();
        self.by_name.insert(lang.name.clone(), idx);
        self.languages.push(lang);
        idx
    }

    /// Highlight `input` as `language`, writing LaTeX spans to `output`.
    ///
    /// The output is a bare span sequence; the caller adds the
    /// `\begin{alltt}` frame for standalone documents. Each input line
    /// produces exactly one output line.
    ///
    /// ## Arguments
    ///
    /// * `language` - Name of a loaded language
    /// * `input` - Source text, consumed line by line
    /// * `output` - Destination for the highlighted spans
    /// * `opts` - Inline braces versus command mode
    pub fn highlight<R: BufRead, W: Write>(
        &self,
        language: &str,
        input: R,
        mut output: W,
        opts: HighlightOptions,
    ) -> Result<(), Error> {
        let lang_idx = self
            .index_of(language)
            .ok_or_else(|| Error::UnknownLanguage(language.to_string()))?;
        let lang = &self.languages[lang_idx];

        let mut lines = input.lines();
        let mut buf = match lines.next() {
            Some(line) => line?,
            None => return Ok(()),
        };

        let mut stack = ContextStack::new(ContextId {
            lang: lang_idx,
            ctx: lang.default_context,
        });
        let mut pos = 0usize;
        let mut leading_space = true;
        // Whether a brace scope for fallback characters is currently open,
        // and how many braces close it
        let mut normal_output = false;
        let mut open_braces = 0usize;

        loop {
            // Lines judged empty bypass rule dispatch and the end-of-line
            // switch entirely
            if pos == 0 && self.empty_line(lang_idx, &buf, &mut stack) {
                writeln!(output)?;
                match lines.next() {
                    Some(line) => buf = line?,
                    None => break,
                }
                continue;
            }

            if pos >= buf.len() {
                if normal_output {
                    normal_output = false;
                    close_braces(&mut output, open_braces)?;
                }
                self.end_of_line(&mut stack);
                writeln!(output)?;
                pos = 0;
                leading_space = true;
                match lines.next() {
                    Some(line) => buf = line?,
                    None => break,
                }
                continue;
            }

            let depth_before = stack.depth();
            let top_before = stack.top().context;

            match self.dispatch(&buf, pos, leading_space, &mut stack) {
                Some((len, style)) if len > 0 => {
                    if normal_output {
                        normal_output = false;
                        close_braces(&mut output, open_braces)?;
                    }
                    let braces =
                        latex_format(&mut output, &lang.name, self.style(style), opts.use_commands)?;
                    if latex_escape(&mut output, &buf[pos..pos + len])? {
                        leading_space = false;
                    }
                    close_braces(&mut output, braces)?;
                    pos += len;
                }
                outcome => {
                    let zero_length = outcome.is_some();
                    let stack_changed = stack.depth() != depth_before
                        || stack.top().context != top_before;
                    if zero_length && stack_changed {
                        // Lookahead or zero-width match: the switch already
                        // ran; re-dispatch at the same position
                        continue;
                    }
                    if zero_length {
                        // Zero-length match that left the stack untouched
                        // cannot make progress; treat it as unmatched
                        debug!("zero-length match without a stack change at column {}", pos);
                    }
                    if !normal_output {
                        normal_output = true;
                        let attr = self.context(stack.top().context).attribute;
                        open_braces = latex_format(
                            &mut output,
                            &lang.name,
                            self.style(attr),
                            opts.use_commands,
                        )?;
                    }
                    if let Some(ch) = buf[pos..].chars().next() {
                        if latex_escape_char(&mut output, ch)? {
                            leading_space = false;
                        }
                        pos += ch.len_utf8();
                    } else {
                        pos += 1;
                    }
                }
            }
        }

        Ok(())
    }

    /// Try the top context's rules at `pos`. The first matching rule has
    /// its context switch applied and its style returned (the dispatching
    /// context's attribute when the rule names none). On fall-through the
    /// fall switch is applied and dispatch restarts in the new top context
    /// at the same position.
    ///
    /// Returns None when no rule matched and the caller should emit one
    /// character under the current attribute.
    fn dispatch(
        &self,
        buf: &str,
        pos: usize,
        leading_space: bool,
        stack: &mut ContextStack,
    ) -> Option<(usize, StyleId)> {
        let mut hops = 0usize;
        loop {
            let ctx_id = stack.top().context;
            let parent = stack.top().captures.clone();
            let ctx = self.context(ctx_id);

            for rule in &ctx.rules {
                if let Some(m) = rule.try_match(self, buf, pos, &parent, leading_space) {
                    let style = rule.style.unwrap_or(ctx.attribute);
                    stack.switch(rule.switch, m.captures.unwrap_or_default());
                    return Some((m.len, style));
                }
            }

            if !ctx.fallthrough || ctx.fall_context.is_noop() {
                return None;
            }
            hops += 1;
            if hops > MAX_FALLTHROUGH_HOPS {
                warn!(
                    "fallthrough chain exceeded {} hops in context \"{}\"",
                    MAX_FALLTHROUGH_HOPS, ctx.name
                );
                return None;
            }
            // Fall through, keeping the current captures live
            stack.switch(ctx.fall_context, parent);
        }
    }

    /// Decide whether the current line is empty and, if so, apply the top
    /// context's empty-line switch. A zero-length buffer is always empty;
    /// a non-blank buffer is empty only when one of the language's
    /// empty-line regex rules matches at column 0.
    fn empty_line(&self, lang_idx: usize, buf: &str, stack: &mut ContextStack) -> bool {
        if !buf.is_empty() {
            let matched = self.languages[lang_idx]
                .empty_line_rules
                .iter()
                .any(|rule| rule.try_match(self, buf, 0, &[], true).is_some());
            if !matched {
                return false;
            }
        }
        let sw = self.context(stack.top().context).empty_context;
        let captures = stack.top().captures.clone();
        stack.switch(sw, captures);
        true
    }

    /// Apply the top context's end-of-line switch.
    fn end_of_line(&self, stack: &mut ContextStack) {
        let sw = self.context(stack.top().context).end_context;
        let captures = stack.top().captures.clone();
        stack.switch(sw, captures);
    }

    /// Write the LaTeX package backing command mode: one
    /// `\newcommand{\<Language><Style>}` per style, plus `\RequirePackage`
    /// lines for every language this one includes rules from.
    pub fn generate_commands<W: Write>(&self, language: &str, mut out: W) -> Result<(), Error> {
        let lang = self
            .get(language)
            .ok_or_else(|| Error::UnknownLanguage(language.to_string()))?;

        writeln!(out, "% Generated by rkl {}", env!("CARGO_PKG_VERSION"))?;
        writeln!(out, "\\NeedsTeXFormat{{LaTeX2e}}")?;
        writeln!(out, "\\ProvidesPackage{{{}.lst}}", lang.name)?;
        writeln!(out)?;
        for dep in &lang.dependencies {
            writeln!(out, "\\RequirePackage{{{}.lst}}", dep)?;
        }
        writeln!(out)?;

        for style in &lang.styles {
            write!(
                out,
                "\\newcommand{{{}}}[1]{{\\texttt{{",
                command_name(&lang.name, &style.name)
            )?;
            let braces = latex_format(&mut out, &lang.name, style, false)?;
            write!(out, "#1")?;
            close_braces(&mut out, braces)?;
            writeln!(out, "}}}}")?;
        }
        Ok(())
    }
}

/// Open the formatting scope for one span and return how many closing
/// braces end it.
///
/// Inline mode emits `\colorbox[HTML]{..}{` (skipped on a white
/// background), `\textcolor[HTML]{..}{`, then one group per set attribute.
/// Command mode emits `\<Language><Style>{` and always returns 1.
pub fn latex_format<W: Write>(
    out: &mut W,
    language: &str,
    style: &Style,
    use_commands: bool,
) -> io::Result<usize> {
    if use_commands {
        write!(out, "{}{{", command_name(language, &style.name))?;
        return Ok(1);
    }

    let mut braces = 0;
    if style.bg_colour != "FFFFFF" {
        braces += 1;
        write!(out, "\\colorbox[HTML]{{{}}}{{", style.bg_colour)?;
    }
    braces += 1;
    write!(out, "\\textcolor[HTML]{{{}}}{{", style.fg_colour)?;
    if style.bold {
        braces += 1;
        write!(out, "\\textbf{{")?;
    }
    if style.italic {
        braces += 1;
        write!(out, "\\textit{{")?;
    }
    if style.underline {
        braces += 1;
        write!(out, "\\underline{{")?;
    }
    if style.strikethrough {
        braces += 1;
        write!(out, "\\sout{{")?;
    }
    Ok(braces)
}

fn close_braces<W: Write>(out: &mut W, n: usize) -> io::Result<()> {
    for _ in 0..n {
        write!(out, "}}")?;
    }
    Ok(())
}

/// Escape one character for the `alltt` environment.
///
/// Backslash and braces become their text commands; NUL, form feed,
/// vertical tab, and carriage return are dropped. The return value is true
/// for characters that count as visible content (and therefore end the
/// line's leading whitespace).
pub fn latex_escape_char<W: Write>(out: &mut W, ch: char) -> io::Result<bool> {
    match ch {
        '\\' => {
            write!(out, "\\textbackslash{{}}")?;
            Ok(true)
        }
        '{' => {
            write!(out, "\\{{")?;
            Ok(true)
        }
        '}' => {
            write!(out, "\\}}")?;
            Ok(true)
        }
        '\0' | '\x0b' | '\x0c' | '\r' => Ok(false),
        '\t' | '\n' | ' ' => {
            write!(out, "{}", ch)?;
            Ok(false)
        }
        _ => {
            write!(out, "{}", ch)?;
            Ok(true)
        }
    }
}

/// Escape a whole span; true when it contained any visible character.
pub fn latex_escape<W: Write>(out: &mut W, span: &str) -> io::Result<bool> {
    let mut visible = false;
    for ch in span.chars() {
        if latex_escape_char(out, ch)? {
            visible = true;
        }
    }
    Ok(visible)
}

/// Escape a language or style name for use in a LaTeX command name:
/// digits become English words, `+` becomes `X`, `#` becomes `Sharp`, and
/// every other non-alphabetic character is stripped.
pub fn name_escape(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphabetic() {
            out.push(ch);
        } else {
            out.push_str(match ch {
                '0' => "Zero",
                '1' => "One",
                '2' => "Two",
                '3' => "Three",
                '4' => "Four",
                '5' => "Five",
                '6' => "Six",
                '7' => "Seven",
                '8' => "Eight",
                '9' => "Nine",
                '+' => "X",
                '#' => "Sharp",
                _ => "",
            });
        }
    }
    out
}

/// The command-mode name for a style: `\<Language><Style>`, both escaped.
pub fn command_name(language: &str, style: &str) -> String {
    format!("\\{}{}", name_escape(language), name_escape(style))
}
