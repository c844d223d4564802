/// Splits a script into statements on top-level semicolons.
///
/// Quoted strings and identifiers (`'..'`, `".."`, `` `..` ``, `[..]`) and
/// comments (`-- ..`, `/* .. */`) are skipped over, so a semicolon inside
/// them does not end a statement. Each statement keeps its original text,
/// trimmed, without the terminating semicolon. Blank statements are dropped.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut start = 0;
    let mut chars = script.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                // A doubled quote is an escaped quote and keeps the literal open.
                while let Some((_, next)) = chars.next() {
                    if next == c {
                        if matches!(chars.peek(), Some((_, q)) if *q == c) {
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
            }
            '[' => {
                for (_, next) in chars.by_ref() {
                    if next == ']' {
                        break;
                    }
                }
            }
            '-' if matches!(chars.peek(), Some((_, '-'))) => {
                for (_, next) in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            }
            '/' if matches!(chars.peek(), Some((_, '*'))) => {
                chars.next();
                let mut previous = '\0';
                for (_, next) in chars.by_ref() {
                    if previous == '*' && next == '/' {
                        break;
                    }
                    previous = next;
                }
            }
            ';' => {
                push_statement(&mut statements, &script[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    push_statement(&mut statements, &script[start..]);

    statements
}

fn push_statement(statements: &mut Vec<String>, text: &str) {
    let text = text.trim();
    if !is_blank(text) {
        statements.push(text.to_string());
    }
}

// True when the text holds nothing but comments.
fn is_blank(text: &str) -> bool {
    let mut rest = text.trim_start();
    loop {
        if rest.is_empty() {
            return true;
        }
        if let Some(line_comment) = rest.strip_prefix("--") {
            rest = match line_comment.find('\n') {
                Some(end) => line_comment[end..].trim_start(),
                None => "",
            };
        } else if let Some(block) = rest.strip_prefix("/*") {
            rest = match block.find("*/") {
                Some(end) => block[end + 2..].trim_start(),
                None => "",
            };
        } else {
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::split_statements;

    #[test]
    fn splits_on_top_level_semicolons() {
        let statements = split_statements(
            "CREATE TABLE t (id INTEGER);\nINSERT INTO t VALUES (1);\n\nSELECT * FROM t",
        );
        assert_eq!(
            statements,
            vec![
                "CREATE TABLE t (id INTEGER)",
                "INSERT INTO t VALUES (1)",
                "SELECT * FROM t",
            ]
        );
    }

    #[test]
    fn semicolons_inside_literals_do_not_split() {
        let statements =
            split_statements("INSERT INTO t VALUES ('a;b', 'it''s; fine'); SELECT \"x;y\" FROM t;");
        assert_eq!(
            statements,
            vec![
                "INSERT INTO t VALUES ('a;b', 'it''s; fine')",
                "SELECT \"x;y\" FROM t",
            ]
        );
    }

    #[test]
    fn comments_are_skipped_and_blank_pieces_dropped() {
        let statements = split_statements(
            "-- seed data; not a statement\nINSERT INTO t VALUES (1); /* a; b */ ;\n-- trailing",
        );
        assert_eq!(
            statements,
            vec!["-- seed data; not a statement\nINSERT INTO t VALUES (1)"]
        );
    }
}
