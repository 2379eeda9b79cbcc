//! Heuristic code-quality checks over Python-style source text.

use kairo_core::WorkflowError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const MAX_FILE_CHARS: usize = 5000;
const MAX_LINE_CHARS: usize = 120;
const MAX_FUNCTION_LINES: usize = 100;
const MIN_NAME_CHARS: usize = 3;

/// A function header found in the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    /// 1-based line of the `def` header.
    pub lineno: usize,
    pub args: usize,
    /// Body length, excluding the header and trailing blank lines.
    pub lines: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityScore {
    pub name: String,
    pub complexity: u32,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexityReport {
    pub scores: Vec<ComplexityScore>,
    pub average: f64,
    pub high_complexity: Vec<ComplexityScore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub message: String,
}

impl Issue {
    fn new(kind: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            severity,
            function: None,
            line: None,
            message: message.into(),
        }
    }

    fn in_function(mut self, name: &str) -> Self {
        self.function = Some(name.to_string());
        self
    }

    fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub category: String,
    pub suggestion: String,
    pub priority: Priority,
}

fn def_pattern() -> Result<&'static Regex, WorkflowError> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\s*)def\s+(\w+)\s*\((.*)"))
        .as_ref()
        .map_err(|e| WorkflowError::transform(format!("invalid def pattern: {}", e)))
}

/// Counts the plain positional parameters of a single-line header.
///
/// `params` is the text after the opening parenthesis. Counting stops at the
/// matching close or at the first `*`/`**` entry, since everything after it is
/// variadic or keyword-only. The positional-only marker `/` is not a parameter.
fn count_positional_args(params: &str) -> usize {
    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in params.chars() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' if depth == 0 => break,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                entries.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    entries.push(current);

    entries
        .iter()
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty() && *entry != "/")
        .take_while(|entry| !entry.starts_with('*'))
        .count()
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Finds `def` headers and measures each function body.
pub fn extract_functions(code: &str) -> Result<Vec<FunctionInfo>, WorkflowError> {
    let pattern = def_pattern()?;
    let lines: Vec<&str> = code.lines().collect();
    let mut functions = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let Some(caps) = pattern.captures(line) else {
            continue;
        };
        let header_indent = caps.get(1).map_or(0, |m| m.as_str().len());
        let name = caps.get(2).map_or("", |m| m.as_str());
        let args = caps.get(3).map_or(0, |m| count_positional_args(m.as_str()));

        let mut body = 0;
        let mut last_content = 0;
        for next in &lines[i + 1..] {
            if next.trim().is_empty() {
                body += 1;
                continue;
            }
            if indent_of(next) <= header_indent {
                break;
            }
            body += 1;
            last_content = body;
        }

        functions.push(FunctionInfo {
            name: name.to_string(),
            lineno: i + 1,
            args,
            lines: last_content,
        });
    }

    Ok(functions)
}

/// Scores each function by length and arity.
pub fn check_complexity(functions: &[FunctionInfo]) -> ComplexityReport {
    let scores: Vec<ComplexityScore> = functions
        .iter()
        .map(|f| {
            let mut score = 1;
            score += match f.lines {
                n if n > 50 => 3,
                n if n > 20 => 2,
                n if n > 10 => 1,
                _ => 0,
            };
            score += match f.args {
                n if n > 5 => 2,
                n if n > 3 => 1,
                _ => 0,
            };
            ComplexityScore {
                name: f.name.clone(),
                complexity: score,
                reason: format!("lines={}, args={}", f.lines, f.args),
            }
        })
        .collect();

    let average = if scores.is_empty() {
        0.0
    } else {
        scores.iter().map(|s| f64::from(s.complexity)).sum::<f64>() / scores.len() as f64
    };
    let high_complexity = scores
        .iter()
        .filter(|s| s.complexity > 3)
        .cloned()
        .collect();

    ComplexityReport {
        scores,
        average,
        high_complexity,
    }
}

/// Flags oversized files, short names, long functions, and long lines.
pub fn detect_issues(code: &str, functions: &[FunctionInfo]) -> Vec<Issue> {
    let mut issues = Vec::new();

    if code.chars().count() > MAX_FILE_CHARS {
        issues.push(Issue::new(
            "file_too_large",
            Severity::Warning,
            "File is too large",
        ));
    }

    for f in functions {
        if f.name.chars().count() < MIN_NAME_CHARS {
            issues.push(
                Issue::new(
                    "naming",
                    Severity::Info,
                    format!("Function name '{}' is too short", f.name),
                )
                .in_function(&f.name),
            );
        }
        if f.lines > MAX_FUNCTION_LINES {
            issues.push(
                Issue::new(
                    "complexity",
                    Severity::Warning,
                    format!("Function has {} lines, consider breaking it down", f.lines),
                )
                .in_function(&f.name),
            );
        }
    }

    for (i, line) in code.lines().enumerate() {
        if line.chars().count() > MAX_LINE_CHARS {
            issues.push(
                Issue::new(
                    "line_length",
                    Severity::Info,
                    format!("Line exceeds {} characters", MAX_LINE_CHARS),
                )
                .at_line(i + 1),
            );
        }
    }

    issues
}

fn count_severity(issues: &[Issue], severity: Severity) -> usize {
    issues.iter().filter(|i| i.severity == severity).count()
}

pub fn suggest_improvements(complexity: &ComplexityReport, issues: &[Issue]) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();

    if complexity.average > 3.0 {
        suggestions.push(Suggestion {
            category: "complexity".to_string(),
            suggestion: "Consider refactoring functions with high complexity".to_string(),
            priority: Priority::High,
        });
    }

    for item in &complexity.high_complexity {
        suggestions.push(Suggestion {
            category: "refactor".to_string(),
            suggestion: format!("Refactor {} - {}", item.name, item.reason),
            priority: Priority::Medium,
        });
    }

    let warnings = count_severity(issues, Severity::Warning);
    if warnings > 5 {
        suggestions.push(Suggestion {
            category: "quality".to_string(),
            suggestion: format!("Address {} warnings to improve code quality", warnings),
            priority: Priority::High,
        });
    }

    suggestions
}

/// Returns a score in `[0, 100]`; higher is better.
pub fn calculate_quality_score(complexity: &ComplexityReport, issues: &[Issue]) -> f64 {
    let mut score = 100.0;
    score -= complexity.average * 5.0;
    score -= complexity.high_complexity.len() as f64 * 8.0;
    score -= count_severity(issues, Severity::Warning) as f64 * 3.0;
    score -= count_severity(issues, Severity::Info) as f64;
    score.clamp(0.0, 100.0)
}
