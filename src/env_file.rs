//! Line-oriented `KEY=value` configuration files.
//!
//! A file is parsed into an ordered list of records. Lines that are not
//! active assignments (blank lines, comments, anything unparseable) are kept
//! verbatim, and assignments that are never touched render exactly as they
//! were read, so substituting one key leaves every other byte of the file
//! alone.

use std::borrow::Cow;
use std::fmt;

/// One line of a configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvLine {
    /// An active `KEY=value` assignment
    Entry {
        key: String,
        value: String,
        /// Written as `export KEY=value`
        exported: bool,
        /// Original text, rendered as-is until the entry is modified
        raw: Option<String>,
    },
    /// Any other line, reproduced verbatim
    Raw(String),
}

/// What `EnvDocument::set` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// An existing assignment was rewritten
    Replaced,
    /// The key was not present and was added at the end
    Appended,
}

/// Ordered, lossless view of a `KEY=value` file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnvDocument {
    lines: Vec<EnvLine>,
    line_ending: LineEnding,
    trailing_newline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }
}

impl EnvDocument {
    /// Parse file contents. Never fails: unrecognised lines become `Raw`.
    pub fn parse(text: &str) -> Self {
        let line_ending = if text.contains("\r\n") {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        };
        let trailing_newline = text.ends_with('\n');

        let body = text
            .strip_suffix(line_ending.as_str())
            .or_else(|| text.strip_suffix('\n'))
            .unwrap_or(text);

        let lines = if text.is_empty() {
            Vec::new()
        } else {
            body.split(line_ending.as_str()).map(parse_line).collect()
        };

        Self {
            lines,
            line_ending,
            trailing_newline,
        }
    }

    pub fn lines(&self) -> &[EnvLine] {
        &self.lines
    }

    /// Value of the first active assignment of `key`, with quoting and
    /// escapes undone
    pub fn get(&self, key: &str) -> Option<Cow<'_, str>> {
        self.lines.iter().find_map(|line| match line {
            EnvLine::Entry { key: k, value, .. } if k == key => Some(unquote(value)),
            _ => None,
        })
    }

    /// Keys of all active assignments, in file order (duplicates included)
    pub fn keys(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                EnvLine::Entry { key, .. } => Some(key.as_str()),
                EnvLine::Raw(_) => None,
            })
            .collect()
    }

    /// Set `key` to `value`.
    ///
    /// The first active assignment is rewritten in place and any later active
    /// assignments of the same key are removed, so the key is active exactly
    /// once afterwards. Commented-out assignments are not touched. A key that
    /// is not present is appended.
    pub fn set(&mut self, key: &str, value: &str) -> SetOutcome {
        let rendered = format_value(value);
        let mut replaced = false;

        self.lines.retain_mut(|line| match line {
            EnvLine::Entry {
                key: k, value: v, raw, ..
            } if k == key => {
                if replaced {
                    return false;
                }
                *v = rendered.clone();
                *raw = None;
                replaced = true;
                true
            }
            _ => true,
        });

        if replaced {
            SetOutcome::Replaced
        } else {
            if self.lines.is_empty() {
                self.trailing_newline = true;
            }
            self.lines.push(EnvLine::Entry {
                key: key.to_string(),
                value: rendered,
                exported: false,
                raw: None,
            });
            SetOutcome::Appended
        }
    }

    /// Serialize back to text
    pub fn render(&self) -> String {
        let sep = self.line_ending.as_str();
        let mut out = self
            .lines
            .iter()
            .map(|line| match line {
                EnvLine::Entry {
                    raw: Some(raw), ..
                } => raw.clone(),
                EnvLine::Entry {
                    key,
                    value,
                    exported,
                    ..
                } => {
                    let prefix = if *exported { "export " } else { "" };
                    format!("{}{}={}", prefix, key, value)
                }
                EnvLine::Raw(raw) => raw.clone(),
            })
            .collect::<Vec<_>>()
            .join(sep);
        if self.trailing_newline && !self.lines.is_empty() {
            out.push_str(sep);
        }
        out
    }
}

impl fmt::Display for EnvDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn parse_line(line: &str) -> EnvLine {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return EnvLine::Raw(line.to_string());
    }

    let (exported, assignment) = match trimmed.strip_prefix("export ") {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let Some((key, value)) = assignment.split_once('=') else {
        return EnvLine::Raw(line.to_string());
    };

    let key = key.trim_end();
    if !is_valid_key(key) {
        return EnvLine::Raw(line.to_string());
    }

    EnvLine::Entry {
        key: key.to_string(),
        value: value.trim().to_string(),
        exported,
        raw: Some(line.to_string()),
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Single quotes are literal; double quotes undo the escapes `format_value`
/// writes (`\"`, `\\`, `\n`) and keep any other backslash as-is
fn unquote(value: &str) -> Cow<'_, str> {
    if value.len() >= 2 {
        if let Some(inner) = value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
            return Cow::Borrowed(inner);
        }
        if let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
            if !inner.contains('\\') {
                return Cow::Borrowed(inner);
            }
            return Cow::Owned(unescape(inner));
        }
    }
    Cow::Borrowed(value)
}

fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(escaped @ ('"' | '\\')) => out.push(escaped),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Values with whitespace, quotes, `#`, `$`, backticks or backslashes are
/// quoted. Single quotes are preferred since nothing inside them expands;
/// values that contain a single quote or a newline are double-quoted with
/// only `"`, `\` and newline escaped.
fn format_value(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '#' | '$' | '\\' | '`'));
    if !needs_quotes {
        return value.to_string();
    }
    if !value.contains(['\'', '\n']) {
        return format!("'{}'", value);
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                quoted.push('\\');
                quoted.push(c);
            }
            '\n' => quoted.push_str("\\n"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
