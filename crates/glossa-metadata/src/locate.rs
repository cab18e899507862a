//! Character spans of flattened keys in the raw file text
//!
//! A key is located by searching for its leaf token on the first matching
//! line. Ancestor segments narrow the search: each one found moves the
//! starting line forward, so `a.title` and `b.title` land on different lines.
//! Multi-line values report the key line only.

use crate::flatten::segments;
use crate::format::Format;
use glossa_core::CharRange;
use regex::Regex;
use std::collections::HashMap;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Role {
    Parent,
    Leaf,
}

/// Locates keys within one file
#[derive(Debug)]
pub struct SpanLocator<'a> {
    lines: Vec<&'a str>,
    window: Range<usize>,
    format: Format,
    patterns: HashMap<(String, Role), Option<Regex>>,
}

impl<'a> SpanLocator<'a> {
    /// Locator over `content`, searching only lines in `window`
    #[must_use]
    pub fn new(content: &'a str, format: Format, window: Range<usize>) -> Self {
        let lines: Vec<&str> = content.lines().collect();
        let window = window.start.min(lines.len())..window.end.min(lines.len());
        Self {
            lines,
            window,
            format,
            patterns: HashMap::new(),
        }
    }

    /// Span of `key`, or a zero-width range at (0,0) when its token is absent
    pub fn locate(&mut self, key: &str) -> CharRange {
        let parts: Vec<&str> = segments(key).collect();
        let Some((leaf, parents)) = parts.split_last() else {
            return CharRange::default();
        };

        let mut from = self.window.start;
        for parent in parents {
            if let Some((line, _)) = self.find(parent, Role::Parent, from) {
                from = line;
            }
        }

        let hit = self
            .find(leaf, Role::Leaf, from)
            .or_else(|| self.find(leaf, Role::Leaf, self.window.start));
        match hit {
            Some((line, column)) => {
                let end = value_end(self.lines[line]).max(column);
                CharRange::on_line(to_u32(line), to_u32(column), to_u32(end))
            }
            None => CharRange::default(),
        }
    }

    /// First `(line, column)` at or after `from` holding the segment token
    fn find(&mut self, segment: &str, role: Role, from: usize) -> Option<(usize, usize)> {
        let needle = if self.format.is_toml() {
            segment.to_string()
        } else {
            json_quoted(segment)
        };
        let format = self.format;
        let pattern = self
            .patterns
            .entry((segment.to_string(), role))
            .or_insert_with(|| token_pattern(format, segment, role))
            .as_ref()?;

        (from..self.window.end).find_map(|line_no| {
            let line = self.lines[line_no];
            if !line.contains(needle.as_str()) {
                return None;
            }
            let token = pattern.captures(line)?.name("tok")?;
            Some((line_no, line[..token.start()].chars().count()))
        })
    }
}

/// Convenience wrapper locating a single key
#[must_use]
pub fn locate(content: &str, format: Format, key: &str) -> CharRange {
    let lines = content.lines().count();
    SpanLocator::new(content, format, 0..lines).locate(key)
}

fn token_pattern(format: Format, segment: &str, role: Role) -> Option<Regex> {
    let pattern = if format.is_toml() {
        let e = regex::escape(segment);
        match role {
            Role::Leaf => format!(r#"(?:^|[\s.{{,])(?P<tok>{e}|"{e}"|'{e}')\s*="#),
            Role::Parent => format!(r#"(?:^|[\s.{{,\[])(?P<tok>{e}|"{e}"|'{e}')\s*[=.\]]"#),
        }
    } else {
        format!(r"(?P<tok>{})\s*:", regex::escape(&json_quoted(segment)))
    };
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::warn!(segment, error = %err, "cannot build key pattern");
            None
        }
    }
}

fn json_quoted(segment: &str) -> String {
    serde_json::to_string(segment).unwrap_or_else(|_| format!("\"{segment}\""))
}

/// Column just past the value: trailing whitespace and one comma dropped
fn value_end(line: &str) -> usize {
    let trimmed = line.trim_end();
    let trimmed = trimmed.strip_suffix(',').unwrap_or(trimmed).trim_end();
    trimmed.chars().count()
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
