// Import testable components from lib
use rkl::{
    args::parse_args,
    loader::{self, LanguageMeta},
    utils::{file_extension, glob_matches, glob_prefix_match},
    Error, HighlightOptions, LanguageSet, LoadError, Style,
};

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};

// Use mimalloc for faster memory allocation (reduces startup overhead)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// One discovered syntax-definition file.
struct SyntaxFile {
    name: String,
    path: PathBuf,
    extensions: Vec<String>,
}

/// Main entry point for the rkl (Rusty Kate Listings) program.
///
/// This tool converts source code into syntax-highlighted LaTeX using
/// Kate syntax definitions. It works by:
/// 1. Parsing command-line arguments and the default-style palette.
/// 2. Scanning the syntax directories for language definitions and
///    building the extension map.
/// 3. Loading the requested language (and every language it includes
///    rules from) into the registry.
/// 4. Running the highlight engine over each input and writing the
///    `.lst` output (plus the `.sty` package in command mode).
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Parse command-line arguments
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    if args.show_version {
        println!("rkl {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Load the default-style palette; item datas resolve against it
    let palette_text = match &args.styles_file {
        Some(file) => fs::read_to_string(file)
            .map_err(|e| format!("cannot read styles file \"{}\": {}", file, e))?,
        None => rkl::EMBEDDED_DEFAULT_STYLES.to_string(),
    };
    let default_styles = rkl::load_default_styles(&palette_text)?;

    // Discover language definitions. Directories are searched in order;
    // the first definition of a language name wins.
    let dirs: Vec<String> = if args.syntax_dirs.is_empty() {
        vec!["./syntax".to_string()]
    } else {
        args.syntax_dirs.clone()
    };
    let catalog = scan_syntax_dirs(&dirs);

    let mut set = LanguageSet::new();

    // Empty input list means stdin; "-" also selects stdin
    let inputs: Vec<Option<String>> = if args.inputs.is_empty() {
        vec![None]
    } else {
        args.inputs
            .iter()
            .map(|f| if f == "-" { None } else { Some(f.clone()) })
            .collect()
    };

    for input in inputs {
        let lang_name = match (&args.language, &input) {
            (Some(lang), _) => lang.clone(),
            (None, Some(file)) => infer_language(file, &catalog).unwrap_or_else(|e| {
                eprintln!("Error: {}", e);
                std::process::exit(2);
            }),
            (None, None) => {
                eprintln!(
                    "Error: cannot infer language from stream input,\n       \
                     explicit language choice (-l <language>) required"
                );
                std::process::exit(2);
            }
        };

        let mut loading = HashSet::new();
        load_language_recursive(&mut set, &default_styles, &lang_name, &catalog, &mut loading)?;

        // Resolve the output target: explicit path, stdout, or the input
        // file name with its extension replaced by .lst
        let out_path: Option<PathBuf> = match &args.output {
            Some(o) if o == "-" => None,
            Some(o) => Some(PathBuf::from(o)),
            None => Some(match &input {
                Some(file) => {
                    let stem = Path::new(file)
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "stdin".to_string());
                    PathBuf::from(format!("{}.lst", stem))
                }
                None => PathBuf::from("stdin.lst"),
            }),
        };

        let reader: Box<dyn BufRead> = match &input {
            Some(file) => {
                if !Path::new(file).exists() {
                    eprintln!("Error: input file \"{}\" does not exist", file);
                    std::process::exit(2);
                }
                info!("highlighting \"{}\" as \"{}\"", file, lang_name);
                Box::new(BufReader::new(fs::File::open(file)?))
            }
            None => {
                info!("highlighting standard input as \"{}\"", lang_name);
                Box::new(BufReader::new(io::stdin()))
            }
        };

        let opts = HighlightOptions {
            use_commands: args.use_commands,
        };

        match &out_path {
            Some(path) => {
                let mut writer = BufWriter::new(fs::File::create(path)?);
                emit(&set, &lang_name, reader, &mut writer, args.inline, opts)?;
                writer.flush()?;
                info!("output written to \"{}\"", path.display());
            }
            None => {
                let stdout = io::stdout();
                let mut writer = BufWriter::new(stdout.lock());
                emit(&set, &lang_name, reader, &mut writer, args.inline, opts)?;
                writer.flush()?;
            }
        }

        // Command mode also needs the package defining the commands
        if args.use_commands {
            let dir = out_path
                .as_ref()
                .and_then(|p| p.parent())
                .filter(|d| !d.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            let sty_path = dir.join(format!(
                "{}.lst.sty",
                rkl::language::name_escape(&lang_name)
            ));
            let mut sty = BufWriter::new(fs::File::create(&sty_path)?);
            set.generate_commands(&lang_name, &mut sty)?;
            sty.flush()?;
            info!("commands written to \"{}\"", sty_path.display());
        }
    }

    Ok(())
}

/// Write one highlighted document: the `alltt` frame (unless inline) around
/// the engine's span stream.
fn emit<W: Write>(
    set: &LanguageSet,
    language: &str,
    reader: Box<dyn BufRead>,
    writer: &mut W,
    inline: bool,
    opts: HighlightOptions,
) -> Result<(), Error> {
    if !inline {
        writeln!(writer, "\\begin{{alltt}}")?;
    }
    set.highlight(language, reader, &mut *writer, opts)?;
    if !inline {
        writeln!(writer, "\\end{{alltt}}")?;
    }
    Ok(())
}

/// Scan the syntax directories for `*.xml` definitions, reading only each
/// root element's metadata. Unreadable or malformed files are skipped with
/// a warning so one broken definition does not hide the rest.
fn scan_syntax_dirs(dirs: &[String]) -> Vec<SyntaxFile> {
    let mut catalog: Vec<SyntaxFile> = Vec::new();

    for dir in dirs {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::debug!("skipping syntax dir \"{}\": {}", dir, e);
                continue;
            }
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("xml"))
            .collect();
        paths.sort();

        for path in paths {
            let xml = match fs::read_to_string(&path) {
                Ok(xml) => xml,
                Err(e) => {
                    warn!("skipping \"{}\": {}", path.display(), e);
                    continue;
                }
            };
            match loader::peek_language_meta(&xml, Some(&path)) {
                Ok(LanguageMeta { name, extensions }) => {
                    // Earlier directories take priority for a given name
                    if !catalog.iter().any(|f| f.name == name) {
                        catalog.push(SyntaxFile {
                            name,
                            path,
                            extensions,
                        });
                    }
                }
                Err(e) => warn!("skipping \"{}\": {}", path.display(), e),
            }
        }
    }

    catalog
}

/// Infer the language of `file` from its extension against the discovered
/// extension globs. Exact glob matches win; a prefix match is the
/// fallback. No match or several matching languages are errors that ask
/// for an explicit `-l`.
fn infer_language(file: &str, catalog: &[SyntaxFile]) -> Result<String, String> {
    let ext = file_extension(file).ok_or_else(|| {
        format!(
            "cannot infer language from file without extension \"{}\",\n       \
             explicit language choice (-l <language>) required",
            file
        )
    })?;

    let names_matching = |loose: bool| -> Vec<&str> {
        catalog
            .iter()
            .filter(|f| {
                f.extensions.iter().any(|g| {
                    if loose {
                        glob_prefix_match(g, ext)
                    } else {
                        glob_matches(g, ext)
                    }
                })
            })
            .map(|f| f.name.as_str())
            .collect()
    };

    let mut candidates = names_matching(false);
    if candidates.is_empty() {
        candidates = names_matching(true);
    }

    match candidates.len() {
        0 => Err(format!(
            "no language associated with file extension \"{}\",\n       \
             explicit language choice (-l <language>) required",
            ext
        )),
        1 => Ok(candidates[0].to_string()),
        _ => Err(format!(
            "several languages are associated with extension \"{}\": {},\n       \
             explicit language choice (-l <language>) required",
            ext,
            candidates.join(", ")
        )),
    }
}

/// Load `name` and, first, every language it includes rules from.
/// `loading` tracks the chain currently being resolved so circular
/// language dependencies fail instead of recursing forever.
fn load_language_recursive(
    set: &mut LanguageSet,
    default_styles: &HashMap<String, Style>,
    name: &str,
    catalog: &[SyntaxFile],
    loading: &mut HashSet<String>,
) -> Result<(), Error> {
    if set.index_of(name).is_some() {
        return Ok(());
    }
    if !loading.insert(name.to_string()) {
        return Err(Error::Load(LoadError::new(format!(
            "circular language dependency detected at \"{}\"",
            name
        ))));
    }

    let file = catalog
        .iter()
        .find(|f| f.name == name)
        .ok_or_else(|| Error::UnknownLanguage(name.to_string()))?;
    let xml = fs::read_to_string(&file.path).map_err(Error::Io)?;

    for dep in loader::cross_language_deps(&xml, Some(&file.path))? {
        if dep != name {
            load_language_recursive(set, default_styles, &dep, catalog, loading)?;
        }
    }

    loader::load_language(set, default_styles, &xml, Some(&file.path))?;
    Ok(())
}
