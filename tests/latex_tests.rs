//! LaTeX emission tests: escaping through the engine, command mode, and
//! the generated `.sty` package.

use std::collections::HashMap;

use rkl::language::{command_name, name_escape};
use rkl::{load_default_styles, load_language, HighlightOptions, LanguageSet, Style};

const PALETTE: &str = r##"{
    "text-styles": {
        "Normal":  { "text-color": "#000000", "background-color": "#ffffff" },
        "Keyword": { "text-color": "#0000ff", "bold": { "type": "true" } },
        "Alert":   {
            "text-color": "#bf0303",
            "background-color": "#f7e6e6",
            "bold": { "type": "true" },
            "italic": { "type": "true" }
        }
    }
}"##;

fn palette() -> HashMap<String, Style> {
    load_default_styles(PALETTE).expect("test palette")
}

const LANG: &str = r##"<language name="C++">
  <highlighting>
    <itemDatas>
      <itemData name="Normal" defStyleNum="dsNormal"/>
      <itemData name="Key" defStyleNum="dsKeyword"/>
      <itemData name="Bad" defStyleNum="dsAlert"/>
    </itemDatas>
    <contexts>
      <context name="Base" attribute="Normal" lineEndContext="#stay">
        <StringDetect String="new" attribute="Key"/>
        <StringDetect String="XXX" attribute="Bad"/>
      </context>
    </contexts>
  </highlighting>
</language>"##;

fn loaded() -> LanguageSet {
    let mut set = LanguageSet::new();
    load_language(&mut set, &palette(), LANG, None).expect("test language");
    set
}

fn highlight(set: &LanguageSet, input: &str, use_commands: bool) -> String {
    let mut out = Vec::new();
    set.highlight(
        "C++",
        input.as_bytes(),
        &mut out,
        HighlightOptions { use_commands },
    )
    .expect("highlight");
    String::from_utf8(out).unwrap()
}

#[cfg(test)]
mod escaping {
    use super::*;

    #[test]
    fn test_braces_and_backslash() {
        let set = loaded();
        assert_eq!(
            highlight(&set, "a{b}\\c", false),
            "\\textcolor[HTML]{000000}{a\\{b\\}\\textbackslash{}c}\n"
        );
    }

    #[test]
    fn test_control_characters_dropped() {
        let set = loaded();
        // Form feed, vertical tab, carriage return and NUL vanish
        assert_eq!(
            highlight(&set, "a\x0cb\x0bc\rd\0e", false),
            "\\textcolor[HTML]{000000}{abcde}\n"
        );
    }

    #[test]
    fn test_tabs_and_spaces_pass_through() {
        let set = loaded();
        assert_eq!(
            highlight(&set, "\ta b", false),
            "\\textcolor[HTML]{000000}{\ta b}\n"
        );
    }

    #[test]
    fn test_attribute_stack_order() {
        let set = loaded();
        // Alert carries background, bold and italic: colorbox first, then
        // textcolor, then the attribute groups
        assert_eq!(
            highlight(&set, "XXX", false),
            "\\colorbox[HTML]{F7E6E6}{\\textcolor[HTML]{BF0303}{\
             \\textbf{\\textit{XXX}}}}\n"
        );
    }

    #[test]
    fn test_white_background_omits_colorbox() {
        let set = loaded();
        let out = highlight(&set, "plain", false);
        assert!(!out.contains("colorbox"));
    }
}

#[cfg(test)]
mod command_mode {
    use super::*;

    #[test]
    fn test_name_escaping_rules() {
        assert_eq!(name_escape("C++"), "CXX");
        assert_eq!(name_escape("C#"), "CSharp");
        assert_eq!(name_escape("Python3"), "PythonThree");
        assert_eq!(name_escape("Objective-C"), "ObjectiveC");
        assert_eq!(command_name("C++", "Key"), "\\CXXKey");
    }

    #[test]
    fn test_command_mode_spans() {
        let set = loaded();
        assert_eq!(
            highlight(&set, "x new y", true),
            "\\CXXNormal{x }\\CXXKey{new}\\CXXNormal{ y}\n"
        );
    }

    #[test]
    fn test_generate_commands_package() {
        let set = loaded();
        let mut out = Vec::new();
        set.generate_commands("C++", &mut out).expect("sty");
        let sty = String::from_utf8(out).unwrap();

        assert!(sty.contains("\\NeedsTeXFormat{LaTeX2e}"));
        assert!(sty.contains("\\ProvidesPackage{C++.lst}"));
        assert!(sty.contains(
            "\\newcommand{\\CXXNormal}[1]{\\texttt{\\textcolor[HTML]{000000}{#1}}}"
        ));
        assert!(sty.contains(
            "\\newcommand{\\CXXKey}[1]{\\texttt{\\textcolor[HTML]{0000FF}{\\textbf{#1}}}}"
        ));
        // Alert: colorbox, colour, bold, italic
        assert!(sty.contains(
            "\\newcommand{\\CXXBad}[1]{\\texttt{\\colorbox[HTML]{F7E6E6}{\
             \\textcolor[HTML]{BF0303}{\\textbf{\\textit{#1}}}}}}"
        ));
    }

    #[test]
    fn test_generate_commands_lists_dependencies() {
        let base = r##"<language name="Base">
          <highlighting>
            <itemDatas><itemData name="N" defStyleNum="dsNormal"/></itemDatas>
            <contexts>
              <context name="M" attribute="N" lineEndContext="#stay">
                <DetectChar char="q"/>
              </context>
            </contexts>
          </highlighting>
        </language>"##;
        let derived = r##"<language name="Derived">
          <highlighting>
            <itemDatas><itemData name="N" defStyleNum="dsNormal"/></itemDatas>
            <contexts>
              <context name="T" attribute="N" lineEndContext="#stay">
                <IncludeRules context="M##Base"/>
              </context>
            </contexts>
          </highlighting>
        </language>"##;

        let mut set = LanguageSet::new();
        load_language(&mut set, &palette(), base, None).unwrap();
        load_language(&mut set, &palette(), derived, None).unwrap();

        let mut out = Vec::new();
        set.generate_commands("Derived", &mut out).unwrap();
        let sty = String::from_utf8(out).unwrap();
        assert!(sty.contains("\\RequirePackage{Base.lst}"));
    }

    #[test]
    fn test_unknown_language_errors() {
        let set = loaded();
        let mut out = Vec::new();
        let err = set.generate_commands("Nope", &mut out).unwrap_err();
        assert!(err.to_string().contains("unknown language"));
        assert!(matches!(
            set.highlight("Nope", "x".as_bytes(), &mut out, HighlightOptions::default()),
            Err(rkl::Error::UnknownLanguage(_))
        ));
    }
}
