//! Rejects statements that modify data or schema.
//!
//! Keywords count only as whole words in executable SQL: text inside string
//! literals, quoted identifiers and comments is skipped, so a column named
//! `updated_at` or a filter on `'DELETED'` does not trip the guard.

pub const FORBIDDEN_KEYWORDS: [&str; 6] = ["DROP", "DELETE", "TRUNCATE", "ALTER", "CREATE", "UPDATE"];

/// The first forbidden keyword found, if any.
pub fn find_forbidden_keyword(sql: &str) -> Option<&'static str> {
    let chars: Vec<char> = sql.chars().collect();
    let mut i = 0;
    let mut word = String::new();

    let check = |word: &mut String| -> Option<&'static str> {
        let found = FORBIDDEN_KEYWORDS
            .iter()
            .copied()
            .find(|kw| kw.eq_ignore_ascii_case(word.as_str()));
        word.clear();
        found
    };

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if c.is_alphanumeric() || c == '_' {
            word.push(c);
            i += 1;
            continue;
        }
        if let Some(kw) = check(&mut word) {
            return Some(kw);
        }

        match (c, next) {
            ('-', Some('-')) | ('#', _) => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            ('/', Some('*')) => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            ('\'' | '"' | '`', _) => {
                i += 1;
                while i < chars.len() && chars[i] != c {
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    check(&mut word)
}

pub fn is_dangerous_sql(sql: &str) -> bool {
    find_forbidden_keyword(sql).is_some()
}
