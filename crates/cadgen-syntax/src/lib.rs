//! Static structural check of generated construction code. Catches the cheap
//! failures (unbalanced delimiters, unterminated strings) before any
//! execution resource is spent. Never executes anything.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ValidationResult {
    Pass,
    Fail { line: usize, message: String },
}

impl ValidationResult {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn diagnostic(&self) -> Option<String> {
        match self {
            Self::Pass => None,
            Self::Fail { line, message } => Some(format!("line {line}: {message}")),
        }
    }
}

/// Structural scan: delimiter balance across the whole source, string
/// termination per line, tabs-vs-spaces consistency. Comments and string
/// bodies are skipped so code-looking text inside them cannot trip it.
pub fn check(code: &str) -> ValidationResult {
    if code.trim().is_empty() {
        return ValidationResult::Fail {
            line: 1,
            message: "empty source".to_string(),
        };
    }

    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut indent_style: Option<char> = None;

    for (idx, raw_line) in code.lines().enumerate() {
        let line_no = idx + 1;

        if let Some(first) = raw_line.chars().next()
            && (first == ' ' || first == '\t')
        {
            match indent_style {
                None => indent_style = Some(first),
                Some(style) if style != first => {
                    return ValidationResult::Fail {
                        line: line_no,
                        message: "mixed tab and space indentation".to_string(),
                    };
                }
                Some(_) => {}
            }
        }

        let mut in_string: Option<char> = None;
        let mut escaped = false;
        for ch in raw_line.chars() {
            if let Some(quote) = in_string {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == quote {
                    in_string = None;
                }
                continue;
            }

            match ch {
                '#' => break,
                '\'' | '"' => in_string = Some(ch),
                '(' | '[' | '{' => stack.push((ch, line_no)),
                ')' | ']' | '}' => {
                    let expected = match ch {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    match stack.pop() {
                        Some((open, _)) if open == expected => {}
                        Some((open, open_line)) => {
                            return ValidationResult::Fail {
                                line: line_no,
                                message: format!(
                                    "mismatched '{ch}' closing '{open}' from line {open_line}"
                                ),
                            };
                        }
                        None => {
                            return ValidationResult::Fail {
                                line: line_no,
                                message: format!("unmatched closing '{ch}'"),
                            };
                        }
                    }
                }
                _ => {}
            }
        }

        if in_string.is_some() {
            return ValidationResult::Fail {
                line: line_no,
                message: "unterminated string literal".to_string(),
            };
        }
    }

    if let Some((open, open_line)) = stack.pop() {
        return ValidationResult::Fail {
            line: open_line,
            message: format!("unclosed '{open}'"),
        };
    }

    ValidationResult::Pass
}
