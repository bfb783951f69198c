//! # loader.rs - Kate-syntax XML definition loading
//!
//! Turns a Kate syntax definition (the XML schema used by the KDE Kate
//! editor) into a [`Language`] registered in a [`LanguageSet`]. Loading is
//! all-or-nothing: any malformed definition, undefined name reference,
//! duplicate definition, or circular dependency aborts with a
//! [`LoadError`], and no partially loaded language is observable.
//!
//! ## Definition shape
//!
//! ```text
//! <language name="..." extensions="*.x;*.y">
//!   <highlighting>
//!     <list name="..."> <item>kw</item> ... </list>
//!     <itemDatas> <itemData name="..." defStyleNum="ds..." .../> </itemDatas>
//!     <contexts> <context name="..." attribute="..." lineEndContext="...">
//!       ...rules...
//!     </context> </contexts>
//!   </highlighting>
//!   <general>
//!     <keywords casesensitive="..."/>
//!     <emptyLines> <emptyLine String="regex"/> </emptyLines>
//!   </general>
//! </language>
//! ```
//!
//! ## Rule inclusion
//!
//! `IncludeRules context="Name"` clones the rules of another context in
//! declaration position. Intra-language includes are resolved in
//! topological order via a postponement queue; a circular dependency is
//! fatal. Cross-language includes (`Name##Lang`) require `Lang` to be
//! loaded already; with `includeAttrib="true"` each cloned rule's style is
//! re-resolved by name against the including language's style table.
//!
//! ## Diagnostics
//!
//! The element tree has no source positions, so errors re-scan the raw
//! file text for a distinctive fragment (an attribute value, a name) and
//! report the recovered line and column on a best-effort basis.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use log::debug;
use minidom::Element;

use crate::context::{Context, ContextId, ContextSwitch};
use crate::keywords::{KeywordSet, ListId};
use crate::language::{Language, LanguageSet};
use crate::rules::{check_dynamic, new_reg_expr, Rule, RuleKind};
use crate::style::{Style, StyleId};
use crate::utils::locate;
use crate::LoadError;

/// Root-element metadata, readable without a full load. Used by the
/// language-discovery scan to build the extension map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageMeta {
    pub name: String,
    pub extensions: Vec<String>,
}

/// Load a language definition into `set`.
///
/// ## Arguments
///
/// * `set` - Registry the language is appended to; languages referenced by
///   `##` includes must already be present
/// * `default_styles` - The `ds*` palette item datas fall back on
/// * `xml` - Raw definition text
/// * `source` - Definition file path, attached to diagnostics when given
///
/// ## Returns
///
/// The index of the loaded language within `set`.
pub fn load_language(
    set: &mut LanguageSet,
    default_styles: &HashMap<String, Style>,
    xml: &str,
    source: Option<&Path>,
) -> Result<usize, LoadError> {
    if default_styles.is_empty() {
        return Err(LoadError::new("no default styles loaded"));
    }

    let root = parse_root(xml, source)?;

    let name = root
        .attr("name")
        .ok_or_else(|| attach(LoadError::new("unnamed language"), source))?
        .to_string();
    if set.index_of(&name).is_some() {
        return Err(attach(
            LoadError::new(format!("language \"{}\" is already loaded", name)),
            source,
        ));
    }

    let extensions = split_globs(root.attr("extensions").unwrap_or_default());

    let general = child(&root, "general");
    let keywords_el = general.and_then(|g| child(g, "keywords"));
    let case_attr = keywords_el
        .and_then(|k| k.attr("casesensitive"))
        .or_else(|| root.attr("casesensitive"));

    let mut builder = LangBuilder {
        set: &*set,
        default_styles,
        source,
        xml,
        lang_idx: 0,
        name,
        case_sensitive: true,
        styles: Vec::new(),
        style_index: HashMap::new(),
        keyword_lists: Vec::new(),
        list_index: HashMap::new(),
        context_index: HashMap::new(),
        contexts: Vec::new(),
        dependencies: Vec::new(),
    };
    builder.lang_idx = builder.set.len();
    builder.case_sensitive = match case_attr {
        Some(v) => builder.parse_bool(v, "casesensitive")?,
        None => true,
    };

    let highlighting = child(&root, "highlighting")
        .ok_or_else(|| builder.err("missing <highlighting> section", None))?;

    builder.parse_keyword_lists(highlighting)?;

    let item_datas = child(highlighting, "itemDatas")
        .ok_or_else(|| builder.err("missing <itemDatas> section", None))?;
    builder.parse_styles(item_datas)?;

    let contexts_el = child(highlighting, "contexts")
        .ok_or_else(|| builder.err("missing <contexts> section", None))?;
    builder.parse_contexts(contexts_el)?;

    let mut empty_line_rules = Vec::new();
    if let Some(el) = general.and_then(|g| child(g, "emptyLines")) {
        for empty_line in children(el, "emptyLine") {
            let pattern = builder.req_attr(empty_line, "String", "emptyLine")?;
            empty_line_rules.push(Rule::new(new_reg_expr(pattern.to_string(), false, false)));
        }
    }

    let LangBuilder {
        name,
        case_sensitive,
        styles,
        style_index,
        keyword_lists,
        list_index,
        context_index,
        contexts,
        dependencies,
        ..
    } = builder;

    let contexts = contexts
        .into_iter()
        .map(|c| c.expect("every registered context is parsed by the dependency loop"))
        .collect();

    Ok(set.insert(Language {
        name,
        case_sensitive,
        styles,
        style_index,
        contexts,
        context_index,
        keyword_lists,
        list_index,
        default_context: 0,
        empty_line_rules,
        extensions,
        dependencies,
    }))
}

/// Read the root element's name and extension globs without building the
/// language. The discovery scan uses this to map files to languages.
pub fn peek_language_meta(xml: &str, source: Option<&Path>) -> Result<LanguageMeta, LoadError> {
    let root = parse_root(xml, source)?;
    let name = root
        .attr("name")
        .ok_or_else(|| attach(LoadError::new("unnamed language"), source))?
        .to_string();
    Ok(LanguageMeta {
        name,
        extensions: split_globs(root.attr("extensions").unwrap_or_default()),
    })
}

/// Collect the names of languages a definition includes rules from
/// (`IncludeRules context="...##Name"`). These must be loaded first.
pub fn cross_language_deps(xml: &str, source: Option<&Path>) -> Result<Vec<String>, LoadError> {
    let root = parse_root(xml, source)?;
    let mut deps = Vec::new();
    collect_deps(&root, &mut deps);
    Ok(deps)
}

fn collect_deps(el: &Element, deps: &mut Vec<String>) {
    if el.name() == "IncludeRules" {
        if let Some(spec) = el.attr("context") {
            if let Some((_, lang)) = spec.split_once("##") {
                if !lang.is_empty() && !deps.iter().any(|d| d == lang) {
                    deps.push(lang.to_string());
                }
            }
        }
    }
    for c in el.children() {
        collect_deps(c, deps);
    }
}

/// Strip the XML declaration and DOCTYPE, which Kate definitions carry and
/// the strict element parser rejects.
fn strip_prolog(xml: &str) -> &str {
    let mut rest = xml.trim_start();
    loop {
        if rest.starts_with("<?") {
            match rest.find("?>") {
                Some(i) => rest = rest[i + 2..].trim_start(),
                None => return rest,
            }
        } else if rest.starts_with("<!") && !rest.starts_with("<!--") {
            match rest.find('>') {
                Some(i) => rest = rest[i + 1..].trim_start(),
                None => return rest,
            }
        } else {
            return rest;
        }
    }
}

fn parse_root(xml: &str, source: Option<&Path>) -> Result<Element, LoadError> {
    let root = Element::from_reader_with_prefixes(strip_prolog(xml).as_bytes(), String::new())
        .map_err(|e: minidom::Error| attach(LoadError::new(format!("malformed XML: {}", e)), source))?;
    if root.name() != "language" {
        return Err(attach(
            LoadError::new(format!(
                "root element must be <language>, got <{}>",
                root.name()
            )),
            source,
        ));
    }
    Ok(root)
}

fn attach(err: LoadError, source: Option<&Path>) -> LoadError {
    match source {
        Some(f) => err.in_file(f),
        None => err,
    }
}

fn split_globs(spec: &str) -> Vec<String> {
    spec.split(';')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect()
}

/// First child element with the given local name, namespace-agnostic.
fn child<'a>(el: &'a Element, name: &str) -> Option<&'a Element> {
    el.children().find(|c| c.name() == name)
}

fn children<'a>(el: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
    el.children().filter(move |c| c.name() == name)
}

/// Mutable state while one language is being built. The language occupies
/// index `lang_idx` of the set once loading succeeds, so ids minted here
/// already point at the right slot.
struct LangBuilder<'a> {
    set: &'a LanguageSet,
    default_styles: &'a HashMap<String, Style>,
    source: Option<&'a Path>,
    /// Raw definition text, for position recovery in diagnostics
    xml: &'a str,
    lang_idx: usize,
    name: String,
    case_sensitive: bool,
    styles: Vec<Style>,
    style_index: HashMap<String, usize>,
    keyword_lists: Vec<KeywordSet>,
    list_index: HashMap<String, usize>,
    context_index: HashMap<String, usize>,
    /// None until the dependency loop parses the context
    contexts: Vec<Option<Context>>,
    dependencies: Vec<String>,
}

impl<'a> LangBuilder<'a> {
    fn err(&self, message: impl Into<String>, needle: Option<&str>) -> LoadError {
        let mut e = LoadError::new(message);
        if let Some(f) = self.source {
            e = e.in_file(f);
        }
        if let Some(n) = needle {
            if let Some((line, col)) = locate(self.xml, n) {
                e = e.at(line, col);
            }
        }
        e
    }

    fn req_attr(&self, el: &'a Element, name: &'a str, what: &str) -> Result<&'a str, LoadError> {
        el.attr(name).ok_or_else(|| {
            self.err(
                format!("{} is missing the \"{}\" attribute", what, name),
                el.attr("name"),
            )
        })
    }

    fn parse_bool(&self, value: &str, what: &str) -> Result<bool, LoadError> {
        match value {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(self.err(
                format!("invalid boolean \"{}\" for {}", other, what),
                Some(other),
            )),
        }
    }

    fn bool_attr(&self, el: &Element, name: &str) -> Result<bool, LoadError> {
        match el.attr(name) {
            Some(v) => self.parse_bool(v, name),
            None => Ok(false),
        }
    }

    fn char_attr(&self, el: &'a Element, name: &str, what: &str) -> Result<char, LoadError> {
        let value = self.req_attr(el, name, what)?;
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(self.err(
                format!("single character expected, got \"{}\"", value),
                Some(value),
            )),
        }
    }

    fn get_style(&self, name: &str) -> Result<StyleId, LoadError> {
        if name.is_empty() {
            return Err(self.err("empty style reference", None));
        }
        match self.style_index.get(name) {
            Some(&style) => Ok(StyleId {
                lang: self.lang_idx,
                style,
            }),
            None => Err(self.err(format!("style \"{}\" not defined", name), Some(name))),
        }
    }

    fn parse_keyword_lists(&mut self, highlighting: &'a Element) -> Result<(), LoadError> {
        for list_el in children(highlighting, "list") {
            let name = self.req_attr(list_el, "name", "keyword list")?;
            if self.list_index.contains_key(name) {
                return Err(self.err(
                    format!("keyword list \"{}\" already exists", name),
                    Some(name),
                ));
            }
            debug!("parsing keyword list \"{}\"", name);

            let mut keywords = KeywordSet::new();
            for item in children(list_el, "item") {
                let keyword = item.text().trim().to_string();
                if keyword.is_empty() {
                    return Err(self.err(
                        format!("empty keyword in list \"{}\"", name),
                        Some(name),
                    ));
                }
                // Duplicate keywords are tolerated; cpp.xml relies on it
                keywords.insert(if self.case_sensitive {
                    keyword
                } else {
                    keyword.to_ascii_lowercase()
                });
            }

            self.list_index.insert(name.to_string(), self.keyword_lists.len());
            self.keyword_lists.push(keywords);
        }
        Ok(())
    }

    fn parse_styles(&mut self, item_datas: &'a Element) -> Result<(), LoadError> {
        for item in children(item_datas, "itemData") {
            let name = self.req_attr(item, "name", "itemData")?;
            if name.is_empty() {
                return Err(self.err("empty style name", None));
            }
            if name.starts_with("ds") {
                return Err(self.err(
                    format!(
                        "style name \"{}\" is invalid: the \"ds\" prefix is reserved for default styles",
                        name
                    ),
                    Some(name),
                ));
            }
            if self.style_index.contains_key(name) {
                return Err(self.err(format!("style \"{}\" already exists", name), Some(name)));
            }

            let def_name = self.req_attr(item, "defStyleNum", "itemData")?;
            let fallback = self.default_styles.get(def_name).ok_or_else(|| {
                self.err(
                    format!("default style \"{}\" not defined", def_name),
                    Some(def_name),
                )
            })?;

            let colour = |attr: Option<&str>, inherited: &str| -> Result<String, LoadError> {
                match attr {
                    Some(c) => Style::format_colour(c).map_err(|e| self.err(e, Some(c))),
                    None => Ok(inherited.to_string()),
                }
            };
            let flag = |attr: Option<&str>, what: &str, inherited: bool| -> Result<bool, LoadError> {
                match attr {
                    Some(v) => self.parse_bool(v, what),
                    None => Ok(inherited),
                }
            };

            let style = Style {
                name: name.to_string(),
                fallback: Some(def_name.to_string()),
                fg_colour: colour(item.attr("color"), &fallback.fg_colour)?,
                bg_colour: colour(item.attr("backgroundColor"), &fallback.bg_colour)?,
                italic: flag(item.attr("italic"), "italic", fallback.italic)?,
                bold: flag(item.attr("bold"), "bold", fallback.bold)?,
                underline: flag(item.attr("underline"), "underline", fallback.underline)?,
                strikethrough: flag(
                    item.attr("strikethrough"),
                    "strikethrough",
                    fallback.strikethrough,
                )?,
            };

            self.style_index.insert(name.to_string(), self.styles.len());
            self.styles.push(style);
        }
        Ok(())
    }

    /// Register every context name, then parse bodies in an order where
    /// each intra-language `IncludeRules` source is parsed first. The
    /// first declared context is the default.
    fn parse_contexts(&mut self, contexts_el: &'a Element) -> Result<(), LoadError> {
        let mut todo: VecDeque<(String, &Element)> = VecDeque::new();

        for def in children(contexts_el, "context") {
            let name = self.req_attr(def, "name", "context")?;
            if self.context_index.contains_key(name) {
                return Err(self.err(
                    format!("context \"{}\" already exists", name),
                    Some(name),
                ));
            }
            self.context_index.insert(name.to_string(), self.contexts.len());
            self.contexts.push(None);
            todo.push_back((name.to_string(), def));
        }

        if self.contexts.is_empty() {
            return Err(self.err("language defines no contexts", None));
        }

        // Postponement queue: a context blocked on an unparsed include is
        // pushed to the back. Seeing the same blocker come around again
        // means the dependencies form a cycle.
        let mut done: HashSet<String> = HashSet::new();
        let mut first_postponed = String::new();

        while let Some((name, def)) = todo.pop_front() {
            let mut blocker: Option<String> = None;
            for incl in children(def, "IncludeRules") {
                let spec = self.req_attr(incl, "context", "IncludeRules")?;
                // Cross-language sources live in the already-loaded set
                if spec.contains("##") {
                    continue;
                }
                if done.contains(spec) {
                    continue;
                }
                if !self.context_index.contains_key(spec) {
                    return Err(
                        self.err(format!("context \"{}\" not defined", spec), Some(spec))
                    );
                }
                if spec == first_postponed {
                    return Err(self.err(
                        "circular IncludeRules dependency detected",
                        Some(spec),
                    ));
                }
                blocker = Some(spec.to_string());
                break;
            }

            match blocker {
                None => {
                    first_postponed.clear();
                    debug!("parsing context \"{}\"", name);
                    let parsed = self.parse_context(&name, def)?;
                    let idx = self.context_index[&name];
                    self.contexts[idx] = Some(parsed);
                    done.insert(name);
                }
                Some(dep) => {
                    debug!("context \"{}\" depends on \"{}\", postponing", name, dep);
                    if first_postponed.is_empty() {
                        first_postponed = name.clone();
                    }
                    todo.push_back((name, def));
                }
            }
        }

        Ok(())
    }

    fn parse_context(&mut self, name: &str, def: &'a Element) -> Result<Context, LoadError> {
        let attr_name = self.req_attr(def, "attribute", "context")?;
        let attribute = self.get_style(attr_name)?;

        let end_spec = self.req_attr(def, "lineEndContext", "context")?;
        let end_context = self.parse_switch(end_spec)?;
        let empty_context = self.parse_switch(def.attr("lineEmptyContext").unwrap_or("#stay"))?;

        let fallthrough = self.bool_attr(def, "fallthrough")?;
        let fall_context = if fallthrough {
            let spec = self.req_attr(def, "fallthroughContext", "context")?;
            self.parse_switch(spec)?
        } else {
            ContextSwitch::stay()
        };

        let mut rules = Vec::new();
        for rule_el in def.children() {
            if rule_el.name() == "IncludeRules" {
                self.include_rules(rule_el, &mut rules)?;
            } else {
                rules.push(self.parse_rule(rule_el)?);
            }
        }

        Ok(Context {
            name: name.to_string(),
            attribute,
            rules,
            end_context,
            empty_context,
            fall_context,
            fallthrough,
        })
    }

    /// Parse one context-switch string: a run of `#pop` tokens, optionally
    /// followed by `#stay` (alone), `!name`, or a bare name (only at the
    /// start). An empty string switches to the default context.
    fn parse_switch(&self, def: &str) -> Result<ContextSwitch, LoadError> {
        if def.is_empty() {
            return Ok(ContextSwitch::to(ContextId {
                lang: self.lang_idx,
                ctx: 0,
            }));
        }

        let prefix = || format!("in context switch \"{}\"", def);

        if let Some(rest) = def.strip_prefix("#stay") {
            if !rest.is_empty() {
                return Err(self.err(
                    format!(
                        "{}: \"#stay\" may not be combined with other context-switch specifications",
                        prefix()
                    ),
                    Some(def),
                ));
            }
            return Ok(ContextSwitch::stay());
        }

        let mut pops = 0usize;
        let mut target_name = "";
        let bytes = def.as_bytes();
        let mut pos = 0usize;

        while pos < def.len() {
            if bytes[pos] == b'#' {
                if !def[pos + 1..].starts_with("pop") {
                    return Err(self.err(
                        format!("{}: malformed context-switch, \"#pop\" expected", prefix()),
                        Some(def),
                    ));
                }
                pops += 1;
                pos += 4;
            } else if bytes[pos] == b'!' {
                target_name = &def[pos + 1..];
                if target_name.is_empty() {
                    return Err(self.err(
                        format!("{}: expected context name after '!'", prefix()),
                        Some(def),
                    ));
                }
                break;
            } else if pos == 0 {
                target_name = def;
                break;
            } else {
                return Err(self.err(
                    format!("{}: final context-switch must be preceded by '!'", prefix()),
                    Some(def),
                ));
            }
        }

        let target = if target_name.is_empty() {
            None
        } else {
            match self.context_index.get(target_name) {
                Some(&ctx) => Some(ContextId {
                    lang: self.lang_idx,
                    ctx,
                }),
                None => {
                    return Err(self.err(
                        format!("{}: undefined context: \"{}\"", prefix(), target_name),
                        Some(target_name),
                    ));
                }
            }
        };

        Ok(ContextSwitch { pops, target })
    }

    fn parse_rule(&self, el: &'a Element) -> Result<Rule, LoadError> {
        let kind_name = el.name();

        let style = match el.attr("attribute") {
            Some(a) if !a.is_empty() => Some(self.get_style(a)?),
            _ => None,
        };
        let switch = self.parse_switch(el.attr("context").unwrap_or("#stay"))?;
        let dynamic = self.bool_attr(el, "dynamic")?;
        let lookahead = self.bool_attr(el, "lookAhead")?;
        let first_non_space = self.bool_attr(el, "firstNonSpace")?;
        let column = match el.attr("column") {
            Some(v) => Some(v.parse::<usize>().map_err(|_| {
                self.err(format!("invalid column \"{}\"", v), Some(v))
            })?),
            None => None,
        };

        let allow_dynamic = matches!(kind_name, "DetectChar" | "StringDetect" | "RegExpr");
        if dynamic && !allow_dynamic {
            return Err(self.err(
                format!("rule \"{}\" can not be dynamic", kind_name),
                None,
            ));
        }

        let kind = match kind_name {
            "DetectChar" => {
                let chr = self.req_attr(el, "char", "DetectChar")?;
                if chr.chars().count() != 1 {
                    let placeholder = dynamic
                        && check_dynamic(chr).map_err(|e| self.err(e, Some(chr)))?;
                    if !placeholder {
                        return Err(self.err(
                            format!("single character expected, got \"{}\"", chr),
                            Some(chr),
                        ));
                    }
                }
                RuleKind::DetectChar {
                    chr: chr.to_string(),
                }
            }
            "Detect2Chars" => RuleKind::Detect2Chars {
                chr0: self.char_attr(el, "char", "Detect2Chars")?,
                chr1: self.char_attr(el, "char1", "Detect2Chars")?,
            },
            "AnyChar" => RuleKind::AnyChar {
                set: self.req_attr(el, "String", "AnyChar")?.to_string(),
            },
            "StringDetect" => {
                let string = self.req_attr(el, "String", "StringDetect")?;
                check_dynamic(string).map_err(|e| self.err(e, Some(string)))?;
                RuleKind::StringDetect {
                    string: string.to_string(),
                    insensitive: self.bool_attr(el, "insensitive")?,
                }
            }
            "WordDetect" => RuleKind::WordDetect {
                string: self.req_attr(el, "String", "WordDetect")?.to_string(),
                insensitive: self.bool_attr(el, "insensitive")?,
            },
            "RegExpr" => {
                let pattern = self.req_attr(el, "String", "RegExpr")?;
                if dynamic {
                    check_dynamic(pattern).map_err(|e| self.err(e, Some(pattern)))?;
                }
                new_reg_expr(
                    pattern.to_string(),
                    self.bool_attr(el, "insensitive")?,
                    dynamic,
                )
            }
            "keyword" => {
                let key = self.req_attr(el, "String", "keyword")?;
                let list = *self.list_index.get(key).ok_or_else(|| {
                    self.err(format!("undefined keyword list \"{}\"", key), Some(key))
                })?;
                RuleKind::Keyword {
                    list: ListId {
                        lang: self.lang_idx,
                        list,
                    },
                    insensitive: !self.case_sensitive,
                }
            }
            "Int" => RuleKind::Int,
            "Float" => RuleKind::Float,
            "HlCOct" => RuleKind::HlCOct,
            "HlCHex" => RuleKind::HlCHex,
            "HlCStringChar" => RuleKind::HlCStringChar,
            "HlCChar" => RuleKind::HlCChar,
            "RangeDetect" => RuleKind::RangeDetect {
                chr0: self.char_attr(el, "char", "RangeDetect")?,
                chr1: self.char_attr(el, "char1", "RangeDetect")?,
            },
            "LineContinue" => RuleKind::LineContinue {
                chr: match el.attr("char") {
                    Some(_) => self.char_attr(el, "char", "LineContinue")?,
                    None => '\\',
                },
            },
            "DetectSpaces" => RuleKind::DetectSpaces,
            "DetectIdentifier" => RuleKind::DetectIdentifier,
            other => {
                return Err(self.err(
                    format!("unknown rule type: \"{}\"", other),
                    Some(other),
                ));
            }
        };

        Ok(Rule {
            style,
            switch,
            dynamic,
            lookahead,
            first_non_space,
            column,
            kind,
        })
    }

    /// Clone another context's rules in place of the `IncludeRules`
    /// element. The clones are deep copies; the cycle a back-reference
    /// would otherwise form is broken by value.
    fn include_rules(&mut self, el: &'a Element, out: &mut Vec<Rule>) -> Result<(), LoadError> {
        let spec = self.req_attr(el, "context", "IncludeRules")?;
        let include_attrib = self.bool_attr(el, "includeAttrib")?;

        let (con_name, lang_name) = match spec.split_once("##") {
            Some((c, l)) => (c, Some(l)),
            None => (spec, None),
        };

        match lang_name {
            Some(other) if other != self.name => {
                // Cross-language: the source must be loaded already
                let set = self.set;
                let src_idx = set.index_of(other).ok_or_else(|| {
                    self.err(format!("language \"{}\" not defined", other), Some(other))
                })?;
                let src_lang = set.language(src_idx);

                let src_ctx = if con_name.is_empty() {
                    src_lang.default_context
                } else {
                    *src_lang.context_index.get(con_name).ok_or_else(|| {
                        self.err(
                            format!(
                                "context \"{}\" not defined in language \"{}\"",
                                con_name, other
                            ),
                            Some(con_name),
                        )
                    })?
                };
                let src_con = &src_lang.contexts[src_ctx];
                debug!(
                    "including rules from context \"{}\" in language \"{}\"",
                    src_con.name, other
                );

                for rule in &src_con.rules {
                    let mut clone = rule.clone();
                    if include_attrib {
                        // Re-point the style through this language's table
                        let attr_name = match clone.style {
                            Some(sid) => set.style(sid).name.clone(),
                            None => set.style(src_con.attribute).name.clone(),
                        };
                        clone.style = Some(self.get_style(&attr_name)?);
                    }
                    out.push(clone);
                }

                if !self.dependencies.iter().any(|d| d == other) {
                    self.dependencies.push(other.to_string());
                }
            }
            _ => {
                // Intra-language (also `##<own name>`): topological order
                // guarantees the source is parsed
                let src_ctx = if con_name.is_empty() {
                    0
                } else {
                    *self.context_index.get(con_name).ok_or_else(|| {
                        self.err(format!("context \"{}\" not defined", con_name), Some(con_name))
                    })?
                };
                let src_con = self.contexts[src_ctx].as_ref().ok_or_else(|| {
                    self.err(
                        format!("context \"{}\" is not resolved yet", con_name),
                        Some(con_name),
                    )
                })?;
                out.extend(src_con.rules.iter().cloned());
            }
        }

        Ok(())
    }
}
