use std::fmt;

/// One `key value...` directive. Keys may span several tokens, e.g.
/// `sentinel resolve-hostnames`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub key: String,
    pub value: String,
}

impl Directive {
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The key plus, for repeatable keys, the argument that tells
    /// occurrences apart.
    fn identity(&self) -> String {
        let repeatable = KEYED_BY_FIRST_ARGUMENT
            .iter()
            .any(|key| key.eq_ignore_ascii_case(self.key.trim()));
        match self.value.split_whitespace().next() {
            Some(first) if repeatable => format!("{} {first}", self.key),
            _ => self.key.clone(),
        }
    }

    fn line(&self) -> String {
        if self.value.is_empty() {
            self.key.clone()
        } else {
            format!("{} {}", self.key, self.value)
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.line())
    }
}

/// Keys that may repeat, told apart by their first argument.
const KEYED_BY_FIRST_ARGUMENT: &[&str] = &["loadmodule"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    /// Blank lines and comments, kept verbatim
    Text(String),
    Directive { tokens: Vec<String>, raw: String },
}

/// Line-oriented directive file. Unknown lines survive untouched; keys are
/// matched case-insensitively on whole tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    lines: Vec<Line>,
}

impl ConfigDocument {
    pub fn parse(text: &str) -> Self {
        let lines = text
            .lines()
            .map(|raw| {
                let trimmed = raw.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    Line::Text(raw.to_string())
                } else {
                    Line::Directive {
                        tokens: trimmed.split_whitespace().map(str::to_ascii_lowercase).collect(),
                        raw: raw.to_string(),
                    }
                }
            })
            .collect();
        Self { lines }
    }

    fn matches(
        tokens: &[String],
        key: &str,
    ) -> bool {
        let key_tokens: Vec<String> = key.split_whitespace().map(str::to_ascii_lowercase).collect();
        !key_tokens.is_empty() && tokens.len() >= key_tokens.len() && tokens[..key_tokens.len()] == key_tokens[..]
    }

    fn positions(
        &self,
        key: &str,
    ) -> Vec<usize> {
        self.lines
            .iter()
            .enumerate()
            .filter_map(|(i, line)| match line {
                Line::Directive { tokens, .. } if Self::matches(tokens, key) => Some(i),
                _ => None,
            })
            .collect()
    }

    /// Replaces the first occurrence of the key and drops any later ones;
    /// appends when absent. `loadmodule` lines are matched per module path.
    pub fn set(
        &mut self,
        directive: &Directive,
    ) {
        let new_line = ConfigDocument::parse(&directive.line()).lines.into_iter().next();
        let Some(new_line) = new_line else {
            return;
        };
        let positions = self.positions(&directive.identity());
        match positions.split_first() {
            None => self.lines.push(new_line),
            Some((first, rest)) => {
                self.lines[*first] = new_line;
                for i in rest.iter().rev() {
                    self.lines.remove(*i);
                }
            }
        }
    }

    /// Removes every occurrence; returns how many were removed.
    pub fn remove(
        &mut self,
        key: &str,
    ) -> usize {
        let positions = self.positions(key);
        for i in positions.iter().rev() {
            self.lines.remove(*i);
        }
        positions.len()
    }

    /// Arguments after the key of its first occurrence.
    pub fn get(
        &self,
        key: &str,
    ) -> Option<String> {
        let key_len = key.split_whitespace().count();
        self.positions(key).first().and_then(|i| match &self.lines[*i] {
            Line::Directive { raw, .. } => Some(raw.split_whitespace().skip(key_len).collect::<Vec<_>>().join(" ")),
            Line::Text(_) => None,
        })
    }

    pub fn count(
        &self,
        key: &str,
    ) -> usize {
        self.positions(key).len()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                Line::Text(raw) | Line::Directive { raw, .. } => out.push_str(raw),
            }
            out.push('\n');
        }
        out
    }
}
