// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Chunker
//!
//! Decomposes file text into language-aware chunks. Rather than dispatching
//! on a language tag string everywhere, language maps once at the edge
//! (`Language::detect`) onto a tagged-variant `Strategy`, which carries
//! `max_lines`/`overlap_lines` in its context instead of threading them
//! through every call.

use codesync_domain::ChunkBody;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

pub const DEFAULT_MAX_LINES: usize = 100;
pub const DEFAULT_OVERLAP_LINES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Python,
    TypeScript,
    JavaScript,
    Markdown,
    Generic(&'static str),
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
            Self::Markdown => "markdown",
            Self::Generic(name) => name,
        }
    }

    /// Detects the language from a file's extension using a fixed table.
    /// Unknown suffixes fall back to a generic strategy but still carry
    /// their own tag, e.g. `rust`, `go`.
    pub fn detect(path: &Path) -> Self {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
        match ext.as_str() {
            "py" => Self::Python,
            "ts" | "tsx" => Self::TypeScript,
            "js" | "jsx" => Self::JavaScript,
            "md" | "mdx" => Self::Markdown,
            "rs" => Self::Generic("rust"),
            "go" => Self::Generic("go"),
            "java" => Self::Generic("java"),
            "cpp" | "cc" | "hpp" => Self::Generic("cpp"),
            "c" | "h" => Self::Generic("c"),
            "cs" => Self::Generic("csharp"),
            "rb" => Self::Generic("ruby"),
            "php" => Self::Generic("php"),
            "swift" => Self::Generic("swift"),
            "kt" => Self::Generic("kotlin"),
            _ => Self::Generic("generic"),
        }
    }

    fn strategy(self) -> Strategy {
        match self {
            Self::Python => Strategy::Structured(&PYTHON_RULES),
            Self::TypeScript | Self::JavaScript => Strategy::Structured(&TS_RULES),
            Self::Markdown => Strategy::Markdown,
            Self::Generic(_) => Strategy::Generic,
        }
    }
}

enum Strategy {
    Structured(&'static [DeclarationRule]),
    Markdown,
    Generic,
}

struct DeclarationRule {
    regex: &'static Lazy<Regex>,
    section_type: &'static str,
}

static PYTHON_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^class\s+(\w+)").unwrap());
static PYTHON_DEF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^def\s+(\w+)").unwrap());
static PYTHON_RULES: [DeclarationRule; 2] = [
    DeclarationRule { regex: &PYTHON_CLASS, section_type: "class" },
    DeclarationRule { regex: &PYTHON_DEF, section_type: "function" },
];

static TS_INTERFACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:export\s+)?interface\s+(\w+)").unwrap());
static TS_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:export\s+)?class\s+(\w+)").unwrap());
static TS_FUNCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:export\s+)?(?:async\s+)?function\s+(\w+)").unwrap());
static TS_ARROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:export\s+)?const\s+(\w+)\s*=\s*(?:async\s*)?\(").unwrap());
static TS_RULES: [DeclarationRule; 4] = [
    DeclarationRule { regex: &TS_INTERFACE, section_type: "interface" },
    DeclarationRule { regex: &TS_CLASS, section_type: "class" },
    DeclarationRule { regex: &TS_FUNCTION, section_type: "function" },
    DeclarationRule { regex: &TS_ARROW, section_type: "function" },
];

static MARKDOWN_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s+(.+)$").unwrap());

/// Splits `content` into chunk bodies per `language`'s strategy.
pub fn chunk_file(content: &str, language: Language, max_lines: usize, overlap_lines: usize) -> Vec<ChunkBody> {
    match language.strategy() {
        Strategy::Structured(rules) => chunk_structured(content, rules, max_lines, overlap_lines),
        Strategy::Markdown => chunk_markdown(content, max_lines),
        Strategy::Generic => chunk_generic(content, max_lines, overlap_lines),
    }
}

fn matching_rule<'a>(rules: &'a [DeclarationRule], line: &str) -> Option<(&'a DeclarationRule, String)> {
    for rule in rules {
        if let Some(caps) = rule.regex.captures(line) {
            let name = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
            return Some((rule, name));
        }
    }
    None
}

fn chunk_structured(
    content: &str,
    rules: &'static [DeclarationRule],
    max_lines: usize,
    overlap_lines: usize,
) -> Vec<ChunkBody> {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut start_line = 1usize;
    let mut section_type: Option<String> = None;
    let mut section_name: Option<String> = None;

    for (zero_idx, &line) in lines.iter().enumerate() {
        let idx = zero_idx + 1;
        if let Some((rule, name)) = matching_rule(rules, line) {
            if !current.is_empty() {
                chunks.push(ChunkBody {
                    text: current.join("\n"),
                    start_line,
                    end_line: idx - 1,
                    section_type: section_type.clone(),
                    section_name: section_name.clone(),
                });
            }
            current = vec![line];
            start_line = idx;
            section_type = Some(rule.section_type.to_string());
            section_name = Some(name);
        } else {
            current.push(line);
        }

        if current.len() >= max_lines {
            chunks.push(ChunkBody {
                text: current.join("\n"),
                start_line,
                end_line: idx,
                section_type: section_type.clone(),
                section_name: section_name.clone(),
            });
            let overlap_start = current.len().saturating_sub(overlap_lines);
            current = current[overlap_start..].to_vec();
            start_line = idx + 1 - overlap_lines.min(idx);
        }
    }

    if !current.is_empty() {
        chunks.push(ChunkBody {
            text: current.join("\n"),
            start_line,
            end_line: lines.len(),
            section_type,
            section_name,
        });
    }
    chunks
}

fn chunk_markdown(content: &str, max_lines: usize) -> Vec<ChunkBody> {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut start_line = 1usize;
    let mut section_name: Option<String> = None;

    for (zero_idx, &line) in lines.iter().enumerate() {
        let idx = zero_idx + 1;
        if let Some(caps) = MARKDOWN_HEADING.captures(line) {
            if !current.is_empty() {
                chunks.push(ChunkBody {
                    text: current.join("\n"),
                    start_line,
                    end_line: idx - 1,
                    section_type: Some("section".to_string()),
                    section_name: section_name.clone(),
                });
            }
            current = vec![line];
            start_line = idx;
            section_name = caps.get(1).map(|m| m.as_str().to_string());
        } else {
            current.push(line);
        }

        if current.len() >= max_lines {
            chunks.push(ChunkBody {
                text: current.join("\n"),
                start_line,
                end_line: idx,
                section_type: Some("section".to_string()),
                section_name: section_name.clone(),
            });
            current.clear();
            start_line = idx + 1;
        }
    }

    if !current.is_empty() {
        chunks.push(ChunkBody {
            text: current.join("\n"),
            start_line,
            end_line: lines.len(),
            section_type: Some("section".to_string()),
            section_name,
        });
    }
    chunks
}

fn chunk_generic(content: &str, max_lines: usize, overlap_lines: usize) -> Vec<ChunkBody> {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut chunks = Vec::new();
    let mut idx = 0usize;
    let step = max_lines.saturating_sub(overlap_lines).max(1);

    while idx < lines.len() {
        let end = (idx + max_lines).min(lines.len());
        let window = &lines[idx..end];
        chunks.push(ChunkBody {
            text: window.join("\n"),
            start_line: idx + 1,
            end_line: end,
            section_type: None,
            section_name: None,
        });
        idx += step;
    }
    chunks
}
