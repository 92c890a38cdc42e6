//! Joining and splitting `;`-separated statement batches.
//!
//! Multi-result-set execution sends the parent query and every child query as one
//! batch. Sources that multiplex result sets split the batch back into statements.

/// Join statements into one batch, separated by `;` and a newline.
///
/// Trailing semicolons and surrounding whitespace are trimmed from each statement.
pub fn join_statements<S: AsRef<str>>(statements: &[S]) -> String {
    statements
        .iter()
        .map(|s| s.as_ref().trim().trim_end_matches(';').trim_end())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(";\n")
}

/// Split a batch on `;` outside of quoted strings and identifiers.
///
/// Handles `'...'` (with backslash escapes), `"..."` and backtick quoting. Empty
/// statements are dropped.
pub fn split_statements(batch: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in batch.chars() {
        match quote {
            Some(q) => {
                current.push(ch);
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' | '`' => {
                    quote = Some(ch);
                    current.push(ch);
                }
                ';' => {
                    push_statement(&mut statements, &current);
                    current.clear();
                }
                _ => current.push(ch),
            },
        }
    }
    push_statement(&mut statements, &current);

    statements
}

fn push_statement(statements: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
}

/// Collapse whitespace so logically identical SQL compares equal
pub fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<&str>>().join(" ")
}
