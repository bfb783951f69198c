//! # rules.rs - Atomic match rules
//!
//! A [`Rule`] is a single matcher tried against a buffer position. The
//! envelope carries what every rule shares: an optional style, a context
//! switch, and the `dynamic` / `lookahead` / `firstNonSpace` / `column`
//! gates. The variant payload in [`RuleKind`] does the actual matching.
//!
//! ## Match protocol
//!
//! `try_match` applies the universal gates, dispatches to the variant body,
//! and post-processes the result:
//!
//! 1. `firstNonSpace` rules only fire at the first non-space column
//! 2. `column` rules only fire at their exact column
//! 3. A successful `lookAhead` match reports length 0 but keeps any capture
//!    groups, so the context switch still applies without consuming input
//!
//! Dynamic rules substitute `%N` placeholders from the capture groups of
//! the match that pushed the current context before matching.

use fancy_regex::Regex;
use log::warn;

use crate::context::ContextSwitch;
use crate::keywords::ListId;
use crate::language::LanguageSet;
use crate::style::StyleId;
use crate::utils::{space, word_char, word_char_before};

/// Outcome of a successful rule match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    /// Number of bytes matched (0 for lookahead rules)
    pub len: usize,
    /// Capture groups produced by the match; only regex rules set this
    pub captures: Option<Vec<String>>,
}

impl RuleMatch {
    fn plain(len: usize) -> Self {
        RuleMatch {
            len,
            captures: None,
        }
    }
}

/// A match rule: common envelope plus the variant-specific payload.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Style for matched spans; falls back to the context attribute
    pub style: Option<StyleId>,
    /// Applied to the stack when the rule matches
    pub switch: ContextSwitch,
    /// Enables `%N` substitution from the parent match
    pub dynamic: bool,
    /// Report a successful match as length 0
    pub lookahead: bool,
    /// Only match at the first non-space column of the line
    pub first_non_space: bool,
    /// Only match at this exact column, if set
    pub column: Option<usize>,
    pub kind: RuleKind,
}

/// The variant-specific payload of a rule.
#[derive(Debug, Clone)]
pub enum RuleKind {
    /// A single character; the string form keeps `%N` placeholders intact
    /// for dynamic rules
    DetectChar { chr: String },
    Detect2Chars { chr0: char, chr1: char },
    /// Any one character from the set
    AnyChar { set: String },
    StringDetect { string: String, insensitive: bool },
    /// A substring with word boundaries on both sides
    WordDetect { string: String, insensitive: bool },
    /// A regular expression anchored at the match position
    RegExpr {
        pattern: String,
        insensitive: bool,
        /// Pre-compiled pattern; None for dynamic rules and for patterns
        /// that failed to compile (diagnosed at load, never match)
        compiled: Option<Regex>,
    },
    /// Longest match from a named keyword list
    Keyword { list: ListId, insensitive: bool },
    Int,
    Float,
    HlCOct,
    HlCHex,
    HlCStringChar,
    HlCChar,
    /// `chr0` followed by the first subsequent `chr1` on the same line
    RangeDetect { chr0: char, chr1: char },
    /// `chr` as the final character of the line
    LineContinue { chr: char },
    DetectSpaces,
    DetectIdentifier,
}

impl Rule {
    /// A bare rule around a payload: no style, `#stay`, no gates. The
    /// loader fills in the envelope from the definition attributes.
    pub fn new(kind: RuleKind) -> Self {
        Rule {
            style: None,
            switch: ContextSwitch::stay(),
            dynamic: false,
            lookahead: false,
            first_non_space: false,
            column: None,
            kind,
        }
    }

    /// Try this rule at `pos` in `buf`.
    ///
    /// ## Arguments
    ///
    /// * `set` - Registry, for keyword-list resolution
    /// * `buf` - The current line, without its newline
    /// * `pos` - Byte position to match at
    /// * `parent` - Capture groups of the match that pushed the current
    ///   context (`%N` sources for dynamic rules)
    /// * `leading_space` - Whether only whitespace precedes `pos` on this
    ///   line
    ///
    /// ## Returns
    ///
    /// The match length and any new capture groups, or None.
    pub fn try_match(
        &self,
        set: &LanguageSet,
        buf: &str,
        pos: usize,
        parent: &[String],
        leading_space: bool,
    ) -> Option<RuleMatch> {
        let bytes = buf.as_bytes();

        if self.first_non_space && (!leading_space || space(bytes, pos)) {
            return None;
        }
        if let Some(column) = self.column {
            if column != pos {
                return None;
            }
        }

        let mut m = self.match_impl(set, buf, pos, parent)?;

        if self.lookahead {
            m.len = 0;
        }
        Some(m)
    }

    fn match_impl(
        &self,
        set: &LanguageSet,
        buf: &str,
        pos: usize,
        parent: &[String],
    ) -> Option<RuleMatch> {
        let bytes = buf.as_bytes();
        let rest = buf.get(pos..)?;

        match &self.kind {
            RuleKind::DetectChar { chr } => {
                let want = if self.dynamic {
                    substitute_dynamic(chr, parent).chars().next()?
                } else {
                    chr.chars().next()?
                };
                let got = rest.chars().next()?;
                (got == want).then(|| RuleMatch::plain(want.len_utf8()))
            }

            RuleKind::Detect2Chars { chr0, chr1 } => {
                let mut it = rest.chars();
                if it.next() == Some(*chr0) && it.next() == Some(*chr1) {
                    Some(RuleMatch::plain(chr0.len_utf8() + chr1.len_utf8()))
                } else {
                    None
                }
            }

            RuleKind::AnyChar { set: chars } => {
                let got = rest.chars().next()?;
                chars.contains(got).then(|| RuleMatch::plain(got.len_utf8()))
            }

            RuleKind::StringDetect {
                string,
                insensitive,
            } => {
                let needle = if self.dynamic {
                    substitute_dynamic(string, parent)
                } else {
                    string.clone()
                };
                match_literal(rest, &needle, *insensitive).map(RuleMatch::plain)
            }

            RuleKind::WordDetect {
                string,
                insensitive,
            } => {
                if word_char_before(bytes, pos) || word_char(bytes, pos + string.len()) {
                    return None;
                }
                match_literal(rest, string, *insensitive).map(RuleMatch::plain)
            }

            RuleKind::RegExpr {
                pattern,
                insensitive,
                compiled,
            } => {
                if self.dynamic {
                    let substituted = substitute_dynamic(pattern, parent);
                    match compile_pattern(&substituted, *insensitive) {
                        Ok(re) => run_regex(&re, buf, pos),
                        Err(e) => {
                            warn!("malformed dynamic regex \"{}\": {}", substituted, e);
                            None
                        }
                    }
                } else {
                    // A pattern that failed to compile was diagnosed at
                    // load and never matches
                    compiled.as_ref().and_then(|re| run_regex(re, buf, pos))
                }
            }

            RuleKind::Keyword { list, insensitive } => set
                .keyword_list(*list)
                .match_at(buf, pos, true, *insensitive)
                .map(RuleMatch::plain),

            RuleKind::Int => {
                // \b[0-9]+
                if word_char_before(bytes, pos) {
                    return None;
                }
                let len = count_while(bytes, pos, |b| b.is_ascii_digit());
                (len > 0).then(|| RuleMatch::plain(len))
            }

            RuleKind::Float => match_float(bytes, pos).map(RuleMatch::plain),

            RuleKind::HlCOct => {
                // \b0[0-7]+
                if word_char_before(bytes, pos) || bytes.get(pos) != Some(&b'0') {
                    return None;
                }
                let len = count_while(bytes, pos + 1, |b| (b'0'..=b'7').contains(&b));
                (len > 0).then(|| RuleMatch::plain(len + 1))
            }

            RuleKind::HlCHex => {
                // \b0[xX][0-9A-Fa-f]+
                if word_char_before(bytes, pos) || bytes.get(pos) != Some(&b'0') {
                    return None;
                }
                if !matches!(bytes.get(pos + 1).copied(), Some(b'x' | b'X')) {
                    return None;
                }
                let len = count_while(bytes, pos + 2, |b| b.is_ascii_hexdigit());
                (len > 0).then(|| RuleMatch::plain(len + 2))
            }

            RuleKind::HlCStringChar => escape_len(bytes, pos).map(RuleMatch::plain),

            RuleKind::HlCChar => match_c_char(bytes, pos).map(RuleMatch::plain),

            RuleKind::RangeDetect { chr0, chr1 } => {
                if !rest.starts_with(*chr0) {
                    return None;
                }
                let body = &rest[chr0.len_utf8()..];
                body.find(*chr1)
                    .map(|at| RuleMatch::plain(chr0.len_utf8() + at + chr1.len_utf8()))
            }

            RuleKind::LineContinue { chr } => {
                if rest.chars().next() == Some(*chr) && pos + chr.len_utf8() == buf.len() {
                    Some(RuleMatch::plain(chr.len_utf8()))
                } else {
                    None
                }
            }

            RuleKind::DetectSpaces => {
                // \s+
                let len = count_while(bytes, pos, |b| {
                    matches!(b, b' ' | b'\t' | 0x0a | 0x0b | 0x0c | 0x0d)
                });
                (len > 0).then(|| RuleMatch::plain(len))
            }

            RuleKind::DetectIdentifier => {
                // [a-zA-Z_][a-zA-Z0-9_]*
                let first = *bytes.get(pos)?;
                if !first.is_ascii_alphabetic() && first != b'_' {
                    return None;
                }
                let len = 1 + count_while(bytes, pos + 1, |b| {
                    b.is_ascii_alphanumeric() || b == b'_'
                });
                Some(RuleMatch::plain(len))
            }
        }
    }
}

/// Build a `RegExpr` payload, pre-compiling non-dynamic patterns.
///
/// A pattern that fails to compile does not abort loading; it is
/// diagnosed here, once, and the rule matches nothing from then on. The
/// built payload never changes afterwards, so loaded rules stay safely
/// shareable across jobs and threads.
pub fn new_reg_expr(pattern: String, insensitive: bool, dynamic: bool) -> RuleKind {
    let compiled = if dynamic {
        None
    } else {
        match compile_pattern(&pattern, insensitive) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("malformed regex \"{}\": {}; rule will never match", pattern, e);
                None
            }
        }
    };
    RuleKind::RegExpr {
        pattern,
        insensitive,
        compiled,
    }
}

fn compile_pattern(pattern: &str, insensitive: bool) -> Result<Regex, Box<fancy_regex::Error>> {
    let result = if insensitive {
        Regex::new(&format!("(?i){}", pattern))
    } else {
        Regex::new(pattern)
    };
    result.map_err(Box::new)
}

/// Run a compiled regex at `pos`, rejecting matches that start later.
fn run_regex(re: &Regex, buf: &str, pos: usize) -> Option<RuleMatch> {
    match re.captures_from_pos(buf, pos) {
        Ok(Some(caps)) => {
            let whole = caps.get(0)?;
            if whole.start() != pos {
                return None;
            }
            let groups = (0..caps.len())
                .map(|i| {
                    caps.get(i)
                        .map(|g| g.as_str().to_string())
                        .unwrap_or_default()
                })
                .collect();
            Some(RuleMatch {
                len: whole.end() - pos,
                captures: Some(groups),
            })
        }
        Ok(None) => None,
        Err(e) => {
            warn!("regex runtime failure: {}", e);
            None
        }
    }
}

/// Fixed-string prefix match, optionally ASCII case-insensitive. An empty
/// needle matches with length 0.
fn match_literal(rest: &str, needle: &str, insensitive: bool) -> Option<usize> {
    if insensitive {
        let candidate = rest.get(..needle.len())?;
        candidate
            .eq_ignore_ascii_case(needle)
            .then_some(needle.len())
    } else {
        rest.starts_with(needle).then_some(needle.len())
    }
}

fn count_while(bytes: &[u8], from: usize, pred: impl Fn(u8) -> bool) -> usize {
    bytes[from.min(bytes.len())..]
        .iter()
        .take_while(|&&b| pred(b))
        .count()
}

/// `(\b[0-9]+\.[0-9]*|\.[0-9]+)([eE][-+]?[0-9]+)?`
fn match_float(bytes: &[u8], pos: usize) -> Option<usize> {
    if word_char_before(bytes, pos) {
        return None;
    }

    let mut len;
    if bytes.get(pos) == Some(&b'.') {
        let frac = count_while(bytes, pos + 1, |b| b.is_ascii_digit());
        if frac == 0 {
            return None;
        }
        len = 1 + frac;
    } else {
        let whole = count_while(bytes, pos, |b| b.is_ascii_digit());
        if whole == 0 || bytes.get(pos + whole) != Some(&b'.') {
            return None;
        }
        len = whole + 1 + count_while(bytes, pos + whole + 1, |b| b.is_ascii_digit());
    }

    // The exponent only counts when it is complete
    if matches!(bytes.get(pos + len).copied(), Some(b'e' | b'E')) {
        let mut elen = 1;
        if matches!(bytes.get(pos + len + elen).copied(), Some(b'+' | b'-')) {
            elen += 1;
        }
        let digits = count_while(bytes, pos + len + elen, |b| b.is_ascii_digit());
        if digits > 0 {
            len += elen + digits;
        }
    }

    Some(len)
}

/// A C escape sequence starting at `pos`:
/// `\a b e f n r t v " ' ? \`, `\xH+`, `\uHHHH`, `\UHHHHHHHH`, or up to
/// three octal digits.
fn escape_len(bytes: &[u8], pos: usize) -> Option<usize> {
    if bytes.get(pos) != Some(&b'\\') {
        return None;
    }
    match *bytes.get(pos + 1)? {
        b'a' | b'b' | b'e' | b'f' | b'n' | b'r' | b't' | b'v' | b'"' | b'\'' | b'?' | b'\\' => {
            Some(2)
        }
        b'x' => {
            let digits = count_while(bytes, pos + 2, |b| b.is_ascii_hexdigit());
            (digits > 0).then_some(digits + 2)
        }
        b'u' => hex_run(bytes, pos + 2, 4).then_some(6),
        b'U' => hex_run(bytes, pos + 2, 8).then_some(10),
        _ => {
            let digits =
                count_while(bytes, pos + 1, |b| (b'0'..=b'7').contains(&b)).min(3);
            (digits > 0).then_some(digits + 1)
        }
    }
}

fn hex_run(bytes: &[u8], from: usize, want: usize) -> bool {
    bytes.len() >= from + want && bytes[from..from + want].iter().all(u8::is_ascii_hexdigit)
}

/// A C character literal at `pos`: `'c'` with any non-backslash `c`, or
/// `'<esc>'`. When the escape is valid but the closing quote is missing or
/// mismatched, the escape length alone is reported.
fn match_c_char(bytes: &[u8], pos: usize) -> Option<usize> {
    if bytes.get(pos) != Some(&b'\'') {
        return None;
    }
    if bytes.get(pos + 1) != Some(&b'\\') && bytes.get(pos + 2) == Some(&b'\'') {
        return Some(3);
    }
    let len = escape_len(bytes, pos + 1)?;
    if bytes.get(pos + 1 + len) == Some(&b'\'') {
        Some(len + 2)
    } else {
        Some(len)
    }
}

/// Substitute `%N` placeholders from the parent match's capture groups.
/// `%%` is a literal `%`; groups beyond the capture count substitute empty.
pub fn substitute_dynamic(pattern: &str, captures: &[String]) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some(d) if d.is_ascii_digit() => {
                let n = (d as u8 - b'0') as usize;
                if let Some(group) = captures.get(n) {
                    out.push_str(group);
                }
            }
            // Validated at load time; tolerate and drop at match time
            _ => {}
        }
    }

    out
}

/// Check a definition string for `%N` placeholders.
///
/// ## Returns
///
/// - `Ok(true)` when the string contains at least one placeholder
/// - `Ok(false)` when it contains none
/// - `Err` when a `%` is not followed by a digit or a second `%`
pub fn check_dynamic(pattern: &str) -> Result<bool, String> {
    let mut is_dynamic = false;
    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            continue;
        }
        match chars.next() {
            Some('%') => is_dynamic = true,
            Some(d) if d.is_ascii_digit() => is_dynamic = true,
            _ => return Err(format!("malformed dynamic rule: \"{}\"", pattern)),
        }
    }

    Ok(is_dynamic)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> LanguageSet {
        LanguageSet::new()
    }

    fn m(rule: &Rule, buf: &str, pos: usize) -> Option<usize> {
        rule.try_match(&set(), buf, pos, &[], true).map(|m| m.len)
    }

    #[test]
    fn test_detect_char() {
        let rule = Rule::new(RuleKind::DetectChar {
            chr: "/".to_string(),
        });
        assert_eq!(m(&rule, "a/b", 1), Some(1));
        assert_eq!(m(&rule, "a/b", 0), None);
    }

    #[test]
    fn test_detect_char_dynamic() {
        let mut rule = Rule::new(RuleKind::DetectChar {
            chr: "%1".to_string(),
        });
        rule.dynamic = true;
        let parent = vec!["q\"".to_string(), "\"".to_string()];
        assert_eq!(
            rule.try_match(&set(), "\"tail", 0, &parent, true)
                .map(|m| m.len),
            Some(1)
        );
        // Group missing: empty substitution never matches
        assert_eq!(rule.try_match(&set(), "\"tail", 0, &[], true), None);
    }

    #[test]
    fn test_detect_2_chars_and_any_char() {
        let two = Rule::new(RuleKind::Detect2Chars {
            chr0: '/',
            chr1: '*',
        });
        assert_eq!(m(&two, "/* c", 0), Some(2));
        assert_eq!(m(&two, "/x", 0), None);
        assert_eq!(m(&two, "/", 0), None);

        let any = Rule::new(RuleKind::AnyChar {
            set: "+-*/".to_string(),
        });
        assert_eq!(m(&any, "a-b", 1), Some(1));
        assert_eq!(m(&any, "a=b", 1), None);
    }

    #[test]
    fn test_string_detect() {
        let rule = Rule::new(RuleKind::StringDetect {
            string: "begin".to_string(),
            insensitive: false,
        });
        assert_eq!(m(&rule, "begin x", 0), Some(5));
        assert_eq!(m(&rule, "Begin x", 0), None);
        // No boundary requirement, unlike WordDetect
        assert_eq!(m(&rule, "xbeginx", 1), Some(5));

        let ins = Rule::new(RuleKind::StringDetect {
            string: "begin".to_string(),
            insensitive: true,
        });
        assert_eq!(m(&ins, "BeGiN x", 0), Some(5));
    }

    #[test]
    fn test_word_detect() {
        let rule = Rule::new(RuleKind::WordDetect {
            string: "int".to_string(),
            insensitive: false,
        });
        assert_eq!(m(&rule, "int x", 0), Some(3));
        assert_eq!(m(&rule, "(int)", 1), Some(3));
        assert_eq!(m(&rule, "print", 2), None);
        assert_eq!(m(&rule, "ints", 0), None);
    }

    #[test]
    fn test_reg_expr_anchoring() {
        let rule = Rule::new(new_reg_expr("[a-z]+".to_string(), false, false));
        assert_eq!(m(&rule, "abc1", 0), Some(3));
        // The pattern matches later in the line, but not at pos: rejected
        assert_eq!(m(&rule, "1abc", 0), None);
        assert_eq!(m(&rule, "1abc", 1), Some(3));
    }

    #[test]
    fn test_reg_expr_captures() {
        let rule = Rule::new(new_reg_expr("([a-z]+)=([0-9]+)".to_string(), false, false));
        let got = rule.try_match(&set(), "key=42;", 0, &[], true).unwrap();
        assert_eq!(got.len, 6);
        assert_eq!(
            got.captures.unwrap(),
            vec!["key=42".to_string(), "key".to_string(), "42".to_string()]
        );
    }

    #[test]
    fn test_reg_expr_insensitive_and_broken() {
        let ins = Rule::new(new_reg_expr("end".to_string(), true, false));
        assert_eq!(m(&ins, "END", 0), Some(3));

        // Unbalanced parenthesis: compile fails at load, rule never matches
        let broken = Rule::new(new_reg_expr("(".to_string(), false, false));
        assert_eq!(m(&broken, "(((", 0), None);
        assert_eq!(m(&broken, "(((", 0), None);
    }

    #[test]
    fn test_reg_expr_dynamic() {
        let mut rule = Rule::new(new_reg_expr("%1+".to_string(), false, true));
        rule.dynamic = true;
        let parent = vec!["aaa".to_string(), "a".to_string()];
        assert_eq!(
            rule.try_match(&set(), "aaab", 0, &parent, true)
                .map(|m| m.len),
            Some(3)
        );
    }

    #[test]
    fn test_int() {
        let rule = Rule::new(RuleKind::Int);
        assert_eq!(m(&rule, "123 x", 0), Some(3));
        assert_eq!(m(&rule, "x 9", 2), Some(1));
        // \b: a preceding word character blocks the match
        assert_eq!(m(&rule, "x123", 1), None);
        assert_eq!(m(&rule, "abc", 0), None);
    }

    #[test]
    fn test_float() {
        let rule = Rule::new(RuleKind::Float);
        assert_eq!(m(&rule, "3.25", 0), Some(4));
        assert_eq!(m(&rule, "3.", 0), Some(2));
        assert_eq!(m(&rule, ".5", 0), Some(2));
        assert_eq!(m(&rule, "1e5", 0), None);
        assert_eq!(m(&rule, "1.5e10", 0), Some(6));
        assert_eq!(m(&rule, "1.5E-3", 0), Some(6));
        // Incomplete exponent is left unconsumed
        assert_eq!(m(&rule, "1.5e+", 0), Some(3));
        assert_eq!(m(&rule, "x.5", 1), None);
        assert_eq!(m(&rule, "5", 0), None);
    }

    #[test]
    fn test_hlc_oct_and_hex() {
        let oct = Rule::new(RuleKind::HlCOct);
        assert_eq!(m(&oct, "0755", 0), Some(4));
        assert_eq!(m(&oct, "0", 0), None);
        assert_eq!(m(&oct, "08", 0), None);
        assert_eq!(m(&oct, "x0755", 1), None);

        let hex = Rule::new(RuleKind::HlCHex);
        assert_eq!(m(&hex, "0xFF", 0), Some(4));
        assert_eq!(m(&hex, "0X1a2b", 0), Some(6));
        assert_eq!(m(&hex, "0x", 0), None);
        assert_eq!(m(&hex, "0xg", 0), None);
        assert_eq!(m(&hex, "a0x1", 1), None);
    }

    #[test]
    fn test_hlc_string_char() {
        let rule = Rule::new(RuleKind::HlCStringChar);
        assert_eq!(m(&rule, "\\n", 0), Some(2));
        assert_eq!(m(&rule, "\\\\", 0), Some(2));
        assert_eq!(m(&rule, "\\x41", 0), Some(4));
        assert_eq!(m(&rule, "\\xZ", 0), None);
        assert_eq!(m(&rule, "\\u0041", 0), Some(6));
        assert_eq!(m(&rule, "\\u004", 0), None);
        assert_eq!(m(&rule, "\\U00000041", 0), Some(10));
        assert_eq!(m(&rule, "\\012", 0), Some(4));
        // At most three octal digits
        assert_eq!(m(&rule, "\\01234", 0), Some(4));
        assert_eq!(m(&rule, "\\8", 0), None);
        assert_eq!(m(&rule, "x\\t", 1), Some(2));
    }

    #[test]
    fn test_hlc_char() {
        let rule = Rule::new(RuleKind::HlCChar);
        assert_eq!(m(&rule, "'a'", 0), Some(3));
        assert_eq!(m(&rule, "'\\n'", 0), Some(4));
        assert_eq!(m(&rule, "'\\x41'", 0), Some(6));
        // Mismatched closing quote: the escape length alone (quirk)
        assert_eq!(m(&rule, "'\\nx", 0), Some(2));
        assert_eq!(m(&rule, "'ab'", 0), None);
        assert_eq!(m(&rule, "a'", 0), None);
    }

    #[test]
    fn test_range_detect() {
        let rule = Rule::new(RuleKind::RangeDetect {
            chr0: '"',
            chr1: '"',
        });
        assert_eq!(m(&rule, "\"hello\" x", 0), Some(7));
        assert_eq!(m(&rule, "\"\"", 0), Some(2));
        // No closing character on this line
        assert_eq!(m(&rule, "\"unterminated", 0), None);
        assert_eq!(m(&rule, "x\"a\"", 0), None);
    }

    #[test]
    fn test_line_continue() {
        let rule = Rule::new(RuleKind::LineContinue { chr: '\\' });
        assert_eq!(m(&rule, "foo \\", 4), Some(1));
        // Only as the final character of the line
        assert_eq!(m(&rule, "foo \\ ", 4), None);
        assert_eq!(m(&rule, "\\", 0), Some(1));
    }

    #[test]
    fn test_detect_spaces_and_identifier() {
        let sp = Rule::new(RuleKind::DetectSpaces);
        assert_eq!(m(&sp, "  \tx", 0), Some(3));
        assert_eq!(m(&sp, "x ", 0), None);

        let ident = Rule::new(RuleKind::DetectIdentifier);
        assert_eq!(m(&ident, "foo_1 bar", 0), Some(5));
        assert_eq!(m(&ident, "_x", 0), Some(2));
        assert_eq!(m(&ident, "1x", 0), None);
    }

    #[test]
    fn test_first_non_space_gate() {
        let mut rule = Rule::new(RuleKind::DetectChar {
            chr: "#".to_string(),
        });
        rule.first_non_space = true;

        assert_eq!(
            rule.try_match(&set(), "  #x", 2, &[], true).map(|m| m.len),
            Some(1)
        );
        // leading_space already consumed: no match
        assert_eq!(rule.try_match(&set(), "x #", 2, &[], false), None);
        // Probe position is itself whitespace: no match
        assert_eq!(rule.try_match(&set(), " # ", 0, &[], true), None);
    }

    #[test]
    fn test_column_gate() {
        let mut rule = Rule::new(RuleKind::DetectChar {
            chr: "*".to_string(),
        });
        rule.column = Some(0);
        assert_eq!(m(&rule, "*b*", 0), Some(1));
        assert_eq!(m(&rule, "b*", 1), None);
    }

    #[test]
    fn test_lookahead_reports_zero() {
        let mut rule = Rule::new(new_reg_expr("[0-9]+".to_string(), false, false));
        rule.lookahead = true;
        let got = rule.try_match(&set(), "42", 0, &[], true).unwrap();
        assert_eq!(got.len, 0);
        // Captures survive the zero-length rewrite
        assert_eq!(got.captures.unwrap()[0], "42");
    }

    #[test]
    fn test_substitute_dynamic() {
        let caps = vec!["whole".to_string(), "one".to_string(), "two".to_string()];
        assert_eq!(substitute_dynamic("a%1b", &caps), "aoneb");
        assert_eq!(substitute_dynamic("%1%2", &caps), "onetwo");
        assert_eq!(substitute_dynamic("%0", &caps), "whole");
        assert_eq!(substitute_dynamic("100%%", &caps), "100%");
        // Out-of-range groups substitute empty
        assert_eq!(substitute_dynamic("<%7>", &caps), "<>");
        assert_eq!(substitute_dynamic("plain", &caps), "plain");
    }

    #[test]
    fn test_check_dynamic() {
        assert_eq!(check_dynamic("abc"), Ok(false));
        assert_eq!(check_dynamic("a%1c"), Ok(true));
        assert_eq!(check_dynamic("%%"), Ok(true));
        assert!(check_dynamic("50%").is_err());
        assert!(check_dynamic("%x").is_err());
    }
}
