//! # args.rs - Command-line argument parsing for rkl
//!
//! This module handles parsing command-line arguments and provides
//! structured access to the parsed options.

/// Parsed command-line arguments for the `rkl` binary.
///
/// This structure contains the semantic options extracted from the raw
/// command-line invocation. It is returned by `parse_args()` for use by
/// the main application logic.
///
/// # Fields
///
/// - `language`: Explicit language name (otherwise inferred per input file
///   from its extension).
/// - `styles_file`: Default-style palette to load instead of the embedded
///   one.
/// - `syntax_dirs`: Directories scanned for `*.xml` syntax definitions.
/// - `use_commands`: Emit `\<Language><Style>{...}` commands and write the
///   backing `.sty` package.
/// - `inline`: Emit a bare span sequence without the `alltt` frame.
/// - `output`: Output file (`-` for stdout); only valid with one input.
/// - `inputs`: Files to highlight; empty means standard input.
/// - `show_version`: Print the CLI version and exit.
#[derive(Debug, PartialEq, Default)]
pub struct Args {
    /// Explicit language choice
    pub language: Option<String>,
    /// Palette file overriding the embedded default styles
    pub styles_file: Option<String>,
    /// Syntax-definition search directories
    pub syntax_dirs: Vec<String>,
    /// Command-mode output plus `.sty` emission
    pub use_commands: bool,
    /// Skip the `\begin{alltt}` frame
    pub inline: bool,
    /// Output target; None derives `<input stem>.lst`
    pub output: Option<String>,
    /// Input files; empty means stdin
    pub inputs: Vec<String>,
    /// Print the CLI version and exit
    pub show_version: bool,
}

/// Parse command-line arguments and return an `Args` structure.
///
/// This function reads `std::env::args()` (skipping the program name) and
/// supports the flags documented in the CLI help. On invalid usage it
/// returns an `Err(String)` describing the problem.
///
/// # Examples
///
/// ```ignore
/// // Simulated invocation: rkl -l C++ --syntax ./syntax main.cpp
/// let args = rkl::args::parse_args().expect("valid args");
/// ```
pub fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    parse_args_impl(args)
}

/// Internal implementation of argument parsing
///
/// This function contains the core argument parsing logic and can be used
/// both by `parse_args()` (which gets args from the environment) and by
/// tests (which pass args directly).
fn parse_args_impl(args: Vec<String>) -> Result<Args, String> {
    // Helper to read an option value from "--arg value" or "--arg=value"
    fn parse_arg_value<'a>(
        args: &'a [String],
        index: usize,
        arg_name: &str,
    ) -> Result<(&'a str, usize), String> {
        let arg = args[index].as_str();
        let prefix = format!("--{}=", arg_name);

        if let Some(value) = arg.strip_prefix(&prefix) {
            if value.is_empty() {
                return Err(format!("Missing value for --{}", arg_name));
            }
            Ok((value, index + 1))
        } else if arg == format!("--{}", arg_name) {
            if index + 1 >= args.len() {
                return Err(format!("Missing value for --{}", arg_name));
            }
            Ok((args[index + 1].as_str(), index + 2))
        } else {
            Err(format!("Unexpected argument format: {}", arg))
        }
    }

    let mut parsed = Args::default();

    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                parsed.show_version = true;
                i += 1;
            }
            "--commands" => {
                parsed.use_commands = true;
                i += 1;
            }
            "--inline" => {
                parsed.inline = true;
                i += 1;
            }
            "-l" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for -l".to_string());
                }
                parsed.language = Some(args[i + 1].clone());
                i += 2;
            }
            arg if arg.starts_with("--language") => {
                let (value, next_i) = parse_arg_value(&args, i, "language")?;
                parsed.language = Some(value.to_string());
                i = next_i;
            }
            arg if arg.starts_with("--styles") => {
                let (value, next_i) = parse_arg_value(&args, i, "styles")?;
                parsed.styles_file = Some(value.to_string());
                i = next_i;
            }
            arg if arg.starts_with("--syntax") => {
                let (value, next_i) = parse_arg_value(&args, i, "syntax")?;
                parsed.syntax_dirs.push(value.to_string());
                i = next_i;
            }
            "-o" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for -o".to_string());
                }
                parsed.output = Some(args[i + 1].clone());
                i += 2;
            }
            arg if arg.starts_with("--output") => {
                let (value, next_i) = parse_arg_value(&args, i, "output")?;
                parsed.output = Some(value.to_string());
                i = next_i;
            }
            arg if arg.starts_with('-') && arg.len() > 1 && arg != "-" => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                parsed.inputs.push(arg.to_string());
                i += 1;
            }
        }
    }

    if parsed.output.is_some() && parsed.inputs.len() > 1 {
        return Err("--output can only be combined with a single input file".to_string());
    }

    Ok(parsed)
}

/// Print usage information for the rkl command
fn print_help() {
    println!("rkl - Rusty Kate Listings");
    println!();
    println!("Usage: rkl [OPTIONS] [FILE]...");
    println!();
    println!("Highlights source files as LaTeX using Kate syntax definitions.");
    println!("With no FILE, standard input is highlighted (requires -l).");
    println!();
    println!("Options:");
    println!("  -l, --language NAME   Language to highlight as (otherwise inferred");
    println!("                        from the file extension)");
    println!("      --styles FILE     Default-style palette (JSON); the embedded");
    println!("                        palette is used when omitted");
    println!("      --syntax DIR      Directory to scan for syntax definitions");
    println!("                        (repeatable; default: ./syntax)");
    println!("      --commands        Emit \\<Language><Style> commands and write");
    println!("                        the backing .sty package");
    println!("      --inline          Emit bare spans without \\begin{{alltt}}");
    println!("  -o, --output FILE     Output file, '-' for stdout");
    println!("                        (default: <input stem>.lst)");
    println!("  -h, --help            Show this help");
    println!("  -V, --version         Show version");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(list: &[&str]) -> Result<Args, String> {
        parse_args_impl(list.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_empty_args() {
        let args = parse(&[]).unwrap();
        assert_eq!(args, Args::default());
    }

    #[test]
    fn test_language_forms() {
        assert_eq!(
            parse(&["-l", "C++"]).unwrap().language,
            Some("C++".to_string())
        );
        assert_eq!(
            parse(&["--language", "C++"]).unwrap().language,
            Some("C++".to_string())
        );
        assert_eq!(
            parse(&["--language=C++"]).unwrap().language,
            Some("C++".to_string())
        );
        assert!(parse(&["-l"]).is_err());
        assert!(parse(&["--language="]).is_err());
    }

    #[test]
    fn test_syntax_dirs_accumulate() {
        let args = parse(&["--syntax", "a", "--syntax=b"]).unwrap();
        assert_eq!(args.syntax_dirs, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_flags_and_inputs() {
        let args = parse(&["--commands", "--inline", "x.cpp", "y.py"]).unwrap();
        assert!(args.use_commands);
        assert!(args.inline);
        assert_eq!(args.inputs, vec!["x.cpp".to_string(), "y.py".to_string()]);
    }

    #[test]
    fn test_output_restrictions() {
        let args = parse(&["-o", "-", "x.cpp"]).unwrap();
        assert_eq!(args.output, Some("-".to_string()));
        assert!(parse(&["-o", "out.lst", "x.cpp", "y.cpp"]).is_err());
    }

    #[test]
    fn test_unknown_option() {
        assert!(parse(&["--bogus"]).is_err());
        assert!(parse(&["-z"]).is_err());
    }

    #[test]
    fn test_version_flag() {
        assert!(parse(&["--version"]).unwrap().show_version);
        assert!(parse(&["-V"]).unwrap().show_version);
    }
}
