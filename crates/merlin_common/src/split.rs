/// Split a SQL script into individual statements, respecting:
/// - Single-quoted string literals (don't split on `;` inside)
/// - Double-quoted identifiers (don't split on `;` inside)
/// - `--` line comments and `/* ... */` block comments (stripped from
///   the output, so a comment-only segment yields no statement)
/// - Empty / whitespace-only statements are skipped
pub fn split_statements(input: &str) -> Vec<String> {
    let mut statements: Vec<String> = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = input.chars().collect();
    let len = chars.len();
    let mut i = 0;

    while i < len {
        let ch = chars[i];

        // -- line comment: drop until end of line, keep the newline
        if ch == '-' && i + 1 < len && chars[i + 1] == '-' {
            while i < len && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        // /* block comment */: drop, leaving a space so adjacent
        // tokens stay separated
        if ch == '/' && i + 1 < len && chars[i + 1] == '*' {
            i += 2;
            while i < len {
                if chars[i] == '*' && i + 1 < len && chars[i + 1] == '/' {
                    i += 2;
                    break;
                }
                i += 1;
            }
            current.push(' ');
            continue;
        }

        // single-quoted string literal, '' escapes a quote
        if ch == '\'' {
            current.push(ch);
            i += 1;
            while i < len {
                let c = chars[i];
                current.push(c);
                i += 1;
                if c == '\'' {
                    if i < len && chars[i] == '\'' {
                        current.push(chars[i]);
                        i += 1;
                    } else {
                        break;
                    }
                }
            }
            continue;
        }

        // double-quoted identifier, "" escapes a quote
        if ch == '"' {
            current.push(ch);
            i += 1;
            while i < len {
                let c = chars[i];
                current.push(c);
                i += 1;
                if c == '"' {
                    if i < len && chars[i] == '"' {
                        current.push(chars[i]);
                        i += 1;
                    } else {
                        break;
                    }
                }
            }
            continue;
        }

        // statement terminator
        if ch == ';' {
            let stmt = current.trim().to_string();
            if !stmt.is_empty() {
                statements.push(stmt);
            }
            current.clear();
            i += 1;
            continue;
        }

        current.push(ch);
        i += 1;
    }

    // trailing statement without terminator
    let stmt = current.trim().to_string();
    if !stmt.is_empty() {
        statements.push(stmt);
    }

    statements
}
