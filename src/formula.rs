//! Reading recipes from disk.
//!
//! Two formats are accepted: JSON recipes (see [`crate::recipe`]) and the
//! subset of the Homebrew Ruby formula DSL that prebuilt-binary formulae use:
//!
//! ```ruby
//! class Embree < Formula
//!   desc "Ray tracing kernels"
//!   homepage "http://embree.github.io/"
//!   url "https://github.com/embree/embree/releases/download/v2.7.0/embree-2.7.0.x86_64.macosx.tar.gz"
//!   sha256 "..."
//!
//!   def install
//!     lib.install Dir["lib/libembree.2.dylib"]
//!     include.install Dir["include/*"]
//!     system "ln", "-s", (lib/"libembree.2.dylib"), (lib/"libembree.dylib")
//!   end
//! end
//! ```
//!
//! Class-level statements other than `desc`, `homepage`, `url`, `sha256` and
//! `version` are skipped, along with blocks such as `bottle do ... end` and
//! `def caveats`. Inside `def install` every statement must be understood;
//! an unknown one is an error rather than a silently incomplete keg.
//!
//! `Dir[...]` patterns are glob patterns, not Ruby globs: `*` never matches a
//! leading dot, and a pattern ending in `**` is refused because it would only
//! match directories. `include/**/*.h` works as in Ruby.

use crate::error::{PourError, Result};
use crate::recipe::{InstallRecipe, InstallStep, LocatedPath, Location, RecipeDraft};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Load a recipe from a `.rb` formula or a `.json` recipe file
pub fn load_recipe(path: &Path) -> Result<InstallRecipe> {
    let source = fs::read_to_string(path).map_err(|e| PourError::fs(path, e))?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("rb") => {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            parse_formula(&source, &name)
        }
        Some("json") => Ok(serde_json::from_str(&source)?),
        _ => Err(PourError::InvalidRecipe(format!(
            "expected a .rb formula or .json recipe: {}",
            path.display()
        ))),
    }
}

enum State {
    BeforeClass,
    InClass,
    InInstall,
    Skipping(usize),
    AfterClass,
}

/// Parse Ruby formula source into a recipe named `name`
pub fn parse_formula(source: &str, name: &str) -> Result<InstallRecipe> {
    let mut draft = RecipeDraft {
        name: name.to_string(),
        ..Default::default()
    };
    let mut state = State::BeforeClass;
    let mut saw_install = false;

    for (index, raw) in source.lines().enumerate() {
        let line_no = index + 1;
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }

        state = match state {
            State::BeforeClass => {
                if is_formula_class(line) {
                    State::InClass
                } else {
                    State::BeforeClass
                }
            }
            State::InClass => {
                if line == "end" {
                    State::AfterClass
                } else if line == "def install" {
                    saw_install = true;
                    State::InInstall
                } else if opens_block(line) {
                    debug!("Skipping block on line {}: {}", line_no, line);
                    State::Skipping(1)
                } else {
                    parse_class_statement(line, line_no, &mut draft)?;
                    State::InClass
                }
            }
            State::InInstall => {
                if line == "end" {
                    State::InClass
                } else {
                    draft
                        .steps
                        .extend(parse_install_statement(line, line_no)?);
                    State::InInstall
                }
            }
            State::Skipping(depth) => {
                if line == "end" {
                    if depth == 1 {
                        State::InClass
                    } else {
                        State::Skipping(depth - 1)
                    }
                } else if opens_block(line) {
                    State::Skipping(depth + 1)
                } else {
                    State::Skipping(depth)
                }
            }
            State::AfterClass => State::AfterClass,
        };
    }

    match state {
        State::BeforeClass => {
            return Err(PourError::FormulaParse {
                line: 0,
                message: "no `class ... < Formula` definition found".to_string(),
            });
        }
        State::AfterClass => {}
        _ => {
            return Err(PourError::FormulaParse {
                line: source.lines().count(),
                message: "unexpected end of file, missing `end`".to_string(),
            });
        }
    }

    if !saw_install {
        return Err(PourError::InvalidRecipe(format!(
            "formula '{}' has no `def install` block",
            name
        )));
    }
    if draft.url.is_empty() {
        return Err(PourError::InvalidRecipe(format!(
            "formula '{}' declares no url",
            name
        )));
    }
    if draft.sha256.is_empty() {
        return Err(PourError::InvalidRecipe(format!(
            "formula '{}' declares no sha256",
            name
        )));
    }

    draft.build()
}

fn is_formula_class(line: &str) -> bool {
    line.strip_prefix("class ")
        .and_then(|rest| rest.split_once('<'))
        .map(|(_, parent)| parent.trim() == "Formula")
        .unwrap_or(false)
}

/// Does this line start a construct closed by its own `end`?
fn opens_block(line: &str) -> bool {
    let first = line.split_whitespace().next().unwrap_or("");
    matches!(
        first,
        "def" | "if" | "unless" | "case" | "begin" | "while" | "until" | "class" | "module"
    ) || line.ends_with(" do")
        || line == "do"
        || (line.contains(" do |") && line.ends_with('|'))
}

fn parse_class_statement(line: &str, line_no: usize, draft: &mut RecipeDraft) -> Result<()> {
    let (keyword, rest) = split_keyword(line);
    let field = match keyword {
        "desc" => &mut draft.desc,
        "homepage" => &mut draft.homepage,
        "version" => &mut draft.version,
        "url" => {
            draft.url = first_string(rest, line_no)?;
            return Ok(());
        }
        "sha256" => {
            draft.sha256 = first_string(rest, line_no)?;
            return Ok(());
        }
        _ => {
            debug!("Ignoring formula statement on line {}: {}", line_no, line);
            return Ok(());
        }
    };
    *field = Some(first_string(rest, line_no)?);
    Ok(())
}

fn parse_install_statement(line: &str, line_no: usize) -> Result<Vec<InstallStep>> {
    let err = |message: String| PourError::FormulaParse {
        line: line_no,
        message,
    };
    let (keyword, rest) = split_keyword(line);

    if let Some((receiver, method)) = keyword.split_once('.') {
        let location = Location::from_name(receiver)
            .ok_or_else(|| err(format!("unknown install location `{}`", receiver)))?;
        if method != "install" {
            return Err(err(format!("unsupported method `{}.{}`", receiver, method)));
        }
        let mut steps = Vec::new();
        for arg in split_args(rest) {
            for pattern in install_patterns(&arg, line_no)? {
                steps.push(InstallStep::copy(pattern, location));
            }
        }
        if steps.is_empty() {
            return Err(err(format!("`{}` has nothing to install", keyword)));
        }
        return Ok(steps);
    }

    match keyword {
        "system" => {
            let args = split_args(rest);
            let words: Vec<Option<String>> =
                args.iter().take(2).map(|a| parse_string(a).ok()).collect();
            match words.as_slice() {
                [Some(cmd), Some(flag)] if cmd == "ln" && flag == "-s" && args.len() == 4 => {
                    symlink_step(&args[2], &args[3], line_no)
                }
                [Some(cmd), Some(flag)] if cmd == "ln" && flag.starts_with('-') => Err(err(
                    format!("unsupported ln flags `{}`, only -s is allowed", flag),
                )),
                _ => Err(err(format!("unsupported system call: {}", rest))),
            }
        }
        "ln_s" => {
            let args = split_args(rest);
            if args.len() != 2 {
                return Err(err("ln_s takes a target and a link path".to_string()));
            }
            symlink_step(&args[0], &args[1], line_no)
        }
        _ => Err(err(format!("unsupported install statement: {}", line))),
    }
}

fn symlink_step(target: &str, link: &str, line_no: usize) -> Result<Vec<InstallStep>> {
    Ok(vec![InstallStep::symlink(
        parse_path_expr(target, line_no)?,
        parse_path_expr(link, line_no)?,
    )])
}

/// Glob patterns named by one `.install` argument: `Dir["..."]`, `Dir.glob("...")` or `"..."`
fn install_patterns(arg: &str, line_no: usize) -> Result<Vec<String>> {
    let arg = arg.trim();
    let inner = arg
        .strip_prefix("Dir[")
        .and_then(|s| s.strip_suffix(']'))
        .or_else(|| {
            arg.strip_prefix("Dir.glob(")
                .and_then(|s| s.strip_suffix(')'))
        });

    match inner {
        Some(inner) => split_args(inner)
            .iter()
            .map(|a| parse_string(a).map_err(|m| parse_err(line_no, m)))
            .collect(),
        None if arg.contains("=>") => Err(parse_err(
            line_no,
            format!("renaming installs are not supported: {}", arg),
        )),
        None => {
            // A plain path names exactly one entry, never a pattern
            let literal = parse_string(arg).map_err(|m| parse_err(line_no, m))?;
            Ok(vec![glob::Pattern::escape(&literal)])
        }
    }
}

/// `lib/"libfoo.dylib"`, `(lib/"libfoo.dylib")` or a bare `lib`
fn parse_path_expr(expr: &str, line_no: usize) -> Result<LocatedPath> {
    let mut expr = expr.trim();
    while let Some(inner) = expr.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        expr = inner.trim();
    }

    let mut parts = split_top_level(expr, '/').into_iter();
    let head = parts.next().unwrap_or_default();
    let location = Location::from_name(head.trim()).ok_or_else(|| {
        parse_err(
            line_no,
            format!("path must start with a location like lib or include: {}", expr),
        )
    })?;

    let mut relative = String::new();
    for part in parts {
        let segment = parse_string(&part).map_err(|m| parse_err(line_no, m))?;
        if !relative.is_empty() {
            relative.push('/');
        }
        relative.push_str(segment.trim_matches('/'));
    }

    LocatedPath::new(location, relative).map_err(|e| parse_err(line_no, e.to_string()))
}

fn parse_err(line: usize, message: String) -> PourError {
    PourError::FormulaParse { line, message }
}

fn split_keyword(line: &str) -> (&str, &str) {
    match line.find(|c: char| c.is_whitespace() || c == '(') {
        // `url("...")`: the parentheses belong to the call
        Some(pos) if line[pos..].starts_with('(') => {
            let rest = line[pos + 1..].trim_end();
            (&line[..pos], rest.strip_suffix(')').unwrap_or(rest).trim())
        }
        Some(pos) => (&line[..pos], line[pos..].trim()),
        None => (line, ""),
    }
}

fn first_string(args: &str, line_no: usize) -> Result<String> {
    let first = split_args(args).into_iter().next().unwrap_or_default();
    parse_string(&first).map_err(|m| parse_err(line_no, m))
}

/// Decode a single- or double-quoted Ruby string literal
fn parse_string(token: &str) -> std::result::Result<String, String> {
    let token = token.trim();
    let quote = token
        .chars()
        .next()
        .filter(|c| *c == '"' || *c == '\'')
        .ok_or_else(|| format!("expected a string literal, found `{}`", token))?;
    let body = token[1..]
        .strip_suffix(quote)
        .ok_or_else(|| format!("unterminated string: {}", token))?;

    if quote == '"' && body.contains("#{") {
        return Err(format!("string interpolation is not supported: {}", token));
    }

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') if quote == '"' => out.push('\n'),
                Some('t') if quote == '"' => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

/// Remove a trailing `# comment`, leaving `#` inside strings alone
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (None, '"' | '\'') => quote = Some(c),
            (None, '#') => return &line[..i],
            _ => {}
        }
    }
    line
}

fn split_args(args: &str) -> Vec<String> {
    split_top_level(args, ',')
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect()
}

/// Split on `sep` outside quotes and brackets
fn split_top_level(input: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in input.chars() {
        if escaped {
            escaped = false;
            current.push(c);
            continue;
        }
        match quote {
            Some(q) => {
                if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                current.push(c);
            }
            None => match c {
                '"' | '\'' => {
                    quote = Some(c);
                    current.push(c);
                }
                '(' | '[' | '{' => {
                    depth += 1;
                    current.push(c);
                }
                ')' | ']' | '}' => {
                    depth = depth.saturating_sub(1);
                    current.push(c);
                }
                c if c == sep && depth == 0 => parts.push(std::mem::take(&mut current)),
                _ => current.push(c),
            },
        }
    }
    parts.push(current);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_comment() {
        assert_eq!(strip_comment(r#"url "a#b" # comment"#), r#"url "a#b" "#);
        assert_eq!(strip_comment("# whole line"), "");
        assert_eq!(strip_comment(r#"desc "it's \"quoted\"""#), r#"desc "it's \"quoted\"""#);
    }

    #[test]
    fn test_split_args() {
        assert_eq!(
            split_args(r#""ln", "-s", (lib/"a, b"), (lib/"c")"#),
            vec![r#""ln""#, r#""-s""#, r#"(lib/"a, b")"#, r#"(lib/"c")"#]
        );
        assert_eq!(split_args(r#"Dir["a", "b"]"#), vec![r#"Dir["a", "b"]"#]);
    }

    #[test]
    fn test_parse_string() {
        assert_eq!(parse_string(r#""hello""#).unwrap(), "hello");
        assert_eq!(parse_string("'single'").unwrap(), "single");
        assert_eq!(parse_string(r#""a\"b""#).unwrap(), "a\"b");
        assert!(parse_string("lib").is_err());
        assert!(parse_string(r##""#{lib}/foo""##).is_err());
    }

    #[test]
    fn test_parse_path_expr() {
        let path = parse_path_expr(r#"(lib/"libembree.2.dylib")"#, 1).unwrap();
        assert_eq!(path.to_string(), "lib/libembree.2.dylib");

        let nested = parse_path_expr(r#"share/"doc"/"foo""#, 1).unwrap();
        assert_eq!(nested.to_string(), "share/doc/foo");

        assert!(parse_path_expr(r#"buildpath/"foo""#, 1).is_err());
    }

    #[test]
    fn test_install_statements() {
        let steps = parse_install_statement(r#"lib.install Dir["lib/libembree.2.dylib"]"#, 1)
            .unwrap();
        assert_eq!(steps, vec![InstallStep::copy("lib/libembree.2.dylib", Location::Lib)]);

        let steps = parse_install_statement(r#"bin.install "bin/tool[1]""#, 1).unwrap();
        assert_eq!(steps, vec![InstallStep::copy("bin/tool[[]1[]]", Location::Bin)]);

        let steps =
            parse_install_statement(r#"include.install Dir.glob("include/*.h")"#, 1).unwrap();
        assert_eq!(steps, vec![InstallStep::copy("include/*.h", Location::Include)]);
    }

    #[test]
    fn test_unsupported_install_statements() {
        for line in [
            r#"system "make", "install""#,
            r#"system "ln", "-sf", (lib/"a"), (lib/"b")"#,
            r#"bin.install "foo" => "bar""#,
            r#"lib.install_symlink lib/"a""#,
            r#"inreplace "Makefile", "a", "b""#,
            r#"buildpath.install Dir["*"]"#,
        ] {
            let err = parse_install_statement(line, 7).unwrap_err();
            assert!(
                matches!(err, PourError::FormulaParse { line: 7, .. }),
                "{} gave {:?}",
                line,
                err
            );
        }
    }

    #[test]
    fn test_opens_block() {
        assert!(opens_block("bottle do"));
        assert!(opens_block("def caveats"));
        assert!(opens_block("on_macos do"));
        assert!(opens_block("resource(\"x\") do |r|"));
        assert!(!opens_block(r#"depends_on "cmake" => :build"#));
        assert!(!opens_block("odie \"x\" if OS.linux?"));
    }
}
