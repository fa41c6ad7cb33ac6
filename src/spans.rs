//! Splitting files into indexable spans.
//!
//! Every file is indexed whole; on top of that:
//! - **code** gets one span per top-level `def` / `class` / `fn` / `struct` /
//!   `impl` / `function`, plus one per method directly inside a class-like
//!   container, named `Container.method`;
//! - **documentation** is split on paragraph boundaries (`\n\n`) into
//!   chunks of at most `max_chars`, each carrying its line range.
//!
//! Header detection is line-based (regex); span ends come from indentation
//! for Python and from brace matching for Rust and JS/TS. This is a
//! heuristic, not a parser: the goal is stable, useful embedding units.

use regex::Regex;
use std::sync::OnceLock;

use holo_index_core::models::ArtifactKind;

/// A contiguous piece of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub symbol: Option<String>,
    /// 1-based, inclusive.
    pub start: u32,
    pub end: u32,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Syntax {
    Python,
    Rust,
    Script,
}

impl Syntax {
    fn for_path(rel_path: &str) -> Option<Self> {
        match extension(rel_path).as_str() {
            "py" => Some(Syntax::Python),
            "rs" => Some(Syntax::Rust),
            "js" | "jsx" | "ts" | "tsx" | "mjs" | "cjs" => Some(Syntax::Script),
            _ => None,
        }
    }

    fn header_regex(self) -> &'static Regex {
        static PYTHON: OnceLock<Regex> = OnceLock::new();
        static RUST: OnceLock<Regex> = OnceLock::new();
        static SCRIPT: OnceLock<Regex> = OnceLock::new();
        match self {
            Syntax::Python => PYTHON.get_or_init(|| {
                Regex::new(
                    r"^(?P<indent>[ \t]*)(?:async[ \t]+)?(?P<kw>def|class)[ \t]+(?P<name>[A-Za-z_]\w*)",
                )
                .expect("static regex")
            }),
            Syntax::Rust => RUST.get_or_init(|| {
                Regex::new(concat!(
                    r"^(?P<indent>[ \t]*)(?:pub(?:\([^)]*\))?[ \t]+)?(?:(?:async|unsafe|const|default)[ \t]+)*",
                    r"(?:(?P<kw>fn|struct|enum|trait|mod)[ \t]+(?P<name>[A-Za-z_]\w*)",
                    r"|(?P<impl>impl)\b(?:[ \t]*<[^{]*?>)?[ \t]+(?:[\w:]+(?:<[^{]*?>)?[ \t]+for[ \t]+)?(?P<iname>[A-Za-z_]\w*))",
                ))
                .expect("static regex")
            }),
            Syntax::Script => SCRIPT.get_or_init(|| {
                Regex::new(concat!(
                    r"^(?P<indent>[ \t]*)(?:export[ \t]+)?(?:default[ \t]+)?(?:(?:async|abstract)[ \t]+)*",
                    r"(?:(?P<kw>function\*?|class|interface)[ \t]+(?P<name>[A-Za-z_$][\w$]*)",
                    r"|(?:const|let)[ \t]+(?P<aname>[A-Za-z_$][\w$]*)[ \t]*(?::[^=]*)?=[ \t]*(?:async[ \t]*)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)[ \t]*(?::[^=]*)?=>",
                    r"|(?:(?:public|private|protected|static|async|readonly|get|set)[ \t]+)*(?P<mname>[A-Za-z_$][\w$]*)[ \t]*\([^)]*\)[ \t]*(?::[^{]*)?\{)",
                ))
                .expect("static regex")
            }),
        }
    }
}

const SCRIPT_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "function", "else", "do", "with",
];

struct Header {
    line: usize,
    indent: usize,
    name: String,
    container: bool,
    /// Only valid as a member of a container (a bare `name(...) {` line).
    member_only: bool,
}

/// Artifact kind for a repository-relative path.
pub fn artifact_kind(rel_path: &str) -> ArtifactKind {
    let is_wsp = rel_path
        .split('/')
        .any(|seg| seg == "WSP_framework" || seg == "WSP_knowledge")
        || rel_path
            .rsplit('/')
            .next()
            .map(|name| name.starts_with("WSP_") && name.ends_with(".md"))
            .unwrap_or(false);
    if is_wsp {
        return ArtifactKind::WspProtocol;
    }
    match extension(rel_path).as_str() {
        "md" | "markdown" | "txt" | "rst" => ArtifactKind::Documentation,
        _ => ArtifactKind::Code,
    }
}

/// Sub-file spans of `text`. The whole-file artifact is not included.
pub fn extract_spans(rel_path: &str, text: &str, doc_chunk_chars: usize) -> Vec<Span> {
    match artifact_kind(rel_path) {
        ArtifactKind::Code => code_spans(rel_path, text),
        ArtifactKind::Documentation | ArtifactKind::WspProtocol => {
            let chunks = doc_chunks(text, doc_chunk_chars);
            // A single chunk is the whole file again.
            if chunks.len() <= 1 {
                Vec::new()
            } else {
                chunks
            }
        }
    }
}

/// The span of `symbol` (`Name` or `Container.method`) in a code file.
pub fn find_symbol(rel_path: &str, text: &str, symbol: &str) -> Option<Span> {
    code_spans(rel_path, text)
        .into_iter()
        .find(|s| s.symbol.as_deref() == Some(symbol))
}

/// Leading `max_chars` characters of `text`, trimmed.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => trimmed[..idx].trim_end().to_string(),
        None => trimmed.to_string(),
    }
}

fn extension(rel_path: &str) -> String {
    rel_path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

fn code_spans(rel_path: &str, text: &str) -> Vec<Span> {
    let Some(syntax) = Syntax::for_path(rel_path) else {
        return Vec::new();
    };
    let lines: Vec<&str> = text.lines().collect();
    let headers = find_headers(syntax, &lines);

    // (end line, container name) of enclosing scopes; `None` = function body.
    let mut stack: Vec<(usize, Option<String>)> = Vec::new();
    let mut spans = Vec::new();

    for h in headers {
        while stack.last().map(|(end, _)| *end < h.line).unwrap_or(false) {
            stack.pop();
        }
        let end = match syntax {
            Syntax::Python => python_end(&lines, h.line, h.indent),
            Syntax::Rust | Syntax::Script => brace_end(syntax, &lines, h.line),
        };

        let symbol = match stack.as_slice() {
            [] if !h.member_only => h.name.clone(),
            [(_, Some(container))] => format!("{}.{}", container, h.name),
            _ => continue,
        };

        spans.push(Span {
            symbol: Some(symbol),
            start: h.line as u32 + 1,
            end: end as u32 + 1,
            text: lines[h.line..=end].join("\n"),
        });
        let scope = if h.container && stack.is_empty() {
            Some(h.name)
        } else {
            None
        };
        stack.push((end, scope));
    }
    spans
}

fn find_headers(syntax: Syntax, lines: &[&str]) -> Vec<Header> {
    let re = syntax.header_regex();
    let mut headers = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let Some(caps) = re.captures(line) else {
            continue;
        };
        let indent = caps.name("indent").map(|m| m.as_str().len()).unwrap_or(0);
        let kw = caps.name("kw").map(|m| m.as_str()).unwrap_or("");

        let (name, container, member_only) = if let Some(n) = caps.name("name") {
            let container = matches!(kw, "class" | "trait" | "mod" | "interface");
            (n.as_str(), container, false)
        } else if let Some(n) = caps.name("iname") {
            (n.as_str(), true, false)
        } else if let Some(n) = caps.name("aname") {
            (n.as_str(), false, false)
        } else if let Some(n) = caps.name("mname") {
            if SCRIPT_KEYWORDS.contains(&n.as_str()) {
                continue;
            }
            (n.as_str(), false, true)
        } else {
            continue;
        };

        headers.push(Header {
            line: i,
            indent,
            name: name.to_string(),
            container,
            member_only,
        });
    }
    headers
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn python_end(lines: &[&str], start: usize, indent: usize) -> usize {
    let mut end = start;
    for (i, line) in lines.iter().enumerate().skip(start + 1) {
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            continue;
        }
        // Closing brackets of a multi-line signature.
        let closes = trimmed.starts_with(')') || trimmed.starts_with(']');
        if indent_of(line) <= indent && !closes {
            break;
        }
        end = i;
    }
    end
}

fn brace_end(syntax: Syntax, lines: &[&str], start: usize) -> usize {
    let mut depth = 0i32;
    let mut opened = false;
    for (i, line) in lines.iter().enumerate().skip(start) {
        let chars: Vec<char> = line.chars().collect();
        let mut quote: Option<char> = None;
        let mut j = 0;
        while j < chars.len() {
            let c = chars[j];
            j += 1;
            if let Some(q) = quote {
                if c == '\\' {
                    j += 1;
                } else if c == q {
                    quote = None;
                }
                continue;
            }
            match c {
                '"' | '`' => quote = Some(c),
                '\'' if syntax == Syntax::Script => quote = Some(c),
                '\'' => j += char_literal_len(&chars[j..]),
                '/' if chars.get(j) == Some(&'/') => break,
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => {
                    depth -= 1;
                    if opened && depth <= 0 {
                        return i;
                    }
                }
                ';' if !opened && depth == 0 => return i,
                _ => {}
            }
        }
    }
    lines.len().saturating_sub(1).max(start)
}

/// Length of a Rust char literal after its opening `'`, closing quote
/// included. Zero for a lifetime.
fn char_literal_len(rest: &[char]) -> usize {
    match rest {
        ['\\', ..] => rest
            .iter()
            .skip(2)
            .position(|&c| c == '\'')
            .map(|p| p + 3)
            .unwrap_or(0),
        [_, '\'', ..] => 2,
        _ => 0,
    }
}

/// Paragraph-bounded chunks with line ranges.
pub fn doc_chunks(text: &str, max_chars: usize) -> Vec<Span> {
    let lines: Vec<&str> = text.lines().collect();

    // (start, end) line indices of each paragraph.
    let mut paragraphs: Vec<(usize, usize)> = Vec::new();
    let mut current: Option<(usize, usize)> = None;
    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            if let Some(p) = current.take() {
                paragraphs.push(p);
            }
        } else {
            current = Some(match current {
                Some((s, _)) => (s, i),
                None => (i, i),
            });
        }
    }
    if let Some(p) = current {
        paragraphs.push(p);
    }

    let mut chunks = Vec::new();
    let mut buf: Option<(usize, usize)> = None;
    let mut buf_len = 0usize;

    for (p_start, p_end) in paragraphs {
        let p_len: usize = lines[p_start..=p_end].iter().map(|l| l.len() + 1).sum();

        if let Some((s, e)) = buf {
            if buf_len + 1 + p_len > max_chars {
                chunks.push(make_chunk(&lines, s, e));
                buf = None;
                buf_len = 0;
            }
        }

        if p_len > max_chars {
            // Oversized paragraph: split on line boundaries.
            let mut s = p_start;
            let mut len = 0usize;
            for i in p_start..=p_end {
                let l = lines[i].len() + 1;
                if len > 0 && len + l > max_chars {
                    chunks.push(make_chunk(&lines, s, i - 1));
                    s = i;
                    len = 0;
                }
                len += l;
            }
            chunks.push(make_chunk(&lines, s, p_end));
            continue;
        }

        buf = Some(match buf {
            Some((s, _)) => (s, p_end),
            None => (p_start, p_end),
        });
        buf_len += p_len + 1;
    }
    if let Some((s, e)) = buf {
        chunks.push(make_chunk(&lines, s, e));
    }
    chunks
}

fn make_chunk(lines: &[&str], start: usize, end: usize) -> Span {
    Span {
        symbol: None,
        start: start as u32 + 1,
        end: end as u32 + 1,
        text: lines[start..=end].join("\n"),
    }
}
