/// Parameter substitution and SQL escaping for ClickHouse
///
/// This module provides safe parameter substitution by replacing $paramName placeholders
/// with properly escaped values in SQL strings, plus the best-effort placeholder scan used
/// to derive bind-parameter names for child queries.
use serde_json::Value;

use super::QueryParams;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterSubstitutionError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter name: {0} (must be alphanumeric or underscore)")]
    InvalidParameterName(String),

    #[error("Unsupported parameter type for value: {0}")]
    UnsupportedType(String),
}

/// Escape a string value for use in ClickHouse SQL
///
/// ClickHouse string escaping rules:
/// - Backslash \ escapes special characters
/// - Single quotes must be escaped as \'
/// - Backslashes must be escaped as \\
/// - Newlines, tabs, etc. must be escaped
fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\") // Must be first!
        .replace('\'', "\\'")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
        .replace('\0', "\\0")
}

/// Format a parameter value as SQL literal
fn format_parameter(value: &Value) -> Result<String, ParameterSubstitutionError> {
    match value {
        Value::String(s) => Ok(format!("'{}'", escape_string(s))),

        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Ok(u.to_string())
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() => Ok(f.to_string()),
                    _ => Err(ParameterSubstitutionError::UnsupportedType(format!(
                        "Non-finite number: {}",
                        n
                    ))),
                }
            }
        }

        Value::Bool(b) => Ok(if *b { "1".to_string() } else { "0".to_string() }),

        Value::Array(arr) => {
            let items: Result<Vec<String>, _> = arr.iter().map(format_parameter).collect();
            Ok(format!("[{}]", items?.join(", ")))
        }

        Value::Null => Ok("NULL".to_string()),

        Value::Object(_) => Err(ParameterSubstitutionError::UnsupportedType(
            "Object/Map parameters not supported. Consider converting to JSON string.".to_string(),
        )),
    }
}

/// Scan placeholders in order, calling `visit` with the literal text between them
/// and each placeholder name. A lone `$` is passed through as literal text.
fn scan_placeholders<F>(sql: &str, mut visit: F) -> Result<(), ParameterSubstitutionError>
where
    F: FnMut(Segment<'_>) -> Result<bool, ParameterSubstitutionError>,
{
    let mut chars = sql.char_indices().peekable();
    let mut literal_start = 0;

    while let Some((pos, ch)) = chars.next() {
        if ch != '$' {
            continue;
        }

        let name_start = pos + 1;
        let mut name_end = name_start;
        while let Some(&(next_pos, next_ch)) = chars.peek() {
            if next_ch.is_alphanumeric() || next_ch == '_' {
                name_end = next_pos + next_ch.len_utf8();
                chars.next();
            } else {
                break;
            }
        }

        if name_end == name_start {
            // Just a lone $ character
            continue;
        }

        if !visit(Segment::Literal(&sql[literal_start..pos]))? {
            return Ok(());
        }
        if !visit(Segment::Placeholder(&sql[name_start..name_end]))? {
            return Ok(());
        }
        literal_start = name_end;
    }

    visit(Segment::Literal(&sql[literal_start..]))?;
    Ok(())
}

enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

/// First `$name` placeholder textually present in `sql`.
///
/// This is a heuristic, not a SQL parser: placeholders inside string literals or
/// comments are found too. Callers with non-conforming SQL pass names explicitly.
pub fn first_parameter_name(sql: &str) -> Option<String> {
    let mut found = None;
    // The visitor never fails
    let _ = scan_placeholders(sql, |segment| match segment {
        Segment::Literal(_) => Ok(true),
        Segment::Placeholder(name) => {
            found = Some(name.to_string());
            Ok(false)
        }
    });
    found
}

/// Substitute parameters in SQL string
///
/// Replaces all $paramName placeholders with properly escaped values. Parameters
/// that no placeholder references are ignored, so one shared parameter set can be
/// used for every statement of a batch.
///
/// # Errors
/// - `MissingParameter` if a placeholder is found but no value provided
/// - `UnsupportedType` if a value cannot be formatted as SQL
///
/// # Example
/// ```ignore
/// let mut params = QueryParams::new();
/// params.insert("parentId".to_string(), json!(1));
///
/// let sql = "SELECT * FROM children WHERE ParentId = $parentId";
/// let result = substitute_parameters(sql, &params).unwrap();
/// // Result: "SELECT * FROM children WHERE ParentId = 1"
/// ```
pub fn substitute_parameters(
    sql: &str,
    parameters: &QueryParams,
) -> Result<String, ParameterSubstitutionError> {
    let mut result = String::with_capacity(sql.len() * 2);

    scan_placeholders(sql, |segment| {
        match segment {
            Segment::Literal(text) => result.push_str(text),
            Segment::Placeholder(name) => match parameters.get(name) {
                Some(value) => result.push_str(&format_parameter(value)?),
                None => {
                    return Err(ParameterSubstitutionError::MissingParameter(
                        name.to_string(),
                    ))
                }
            },
        }
        Ok(true)
    })?;

    Ok(result)
}

/// Validate parameter name (alphanumeric + underscore only)
pub fn validate_parameter_name(name: &str) -> Result<(), ParameterSubstitutionError> {
    if !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(ParameterSubstitutionError::InvalidParameterName(
            name.to_string(),
        ))
    }
}
