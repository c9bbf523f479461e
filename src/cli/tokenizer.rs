//! Shell-style command-line tokenizer
//!
//! Splits a raw command line into words the way a POSIX shell groups them,
//! keeping enough metadata (start index, quote character, closing quote) for
//! the completion engine to reason about the word under the cursor.

/// One word of a command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Unquoted, unescaped content; `$(...)` regions are kept verbatim
    pub content: String,
    /// Byte index of the token's first character in the input
    pub index: usize,
    /// Quote character of the most recent quoted region, if any
    pub quote: Option<char>,
    /// Whether that quoted region was closed
    pub closed: bool,
    /// Whether the token ends inside an unbalanced `$(`
    pub open_subshell: bool,
}

impl Token {
    fn start(index: usize) -> Self {
        Token {
            content: String::new(),
            index,
            quote: None,
            closed: false,
            open_subshell: false,
        }
    }

    /// A quote was opened and never closed
    pub fn unterminated(&self) -> bool {
        self.quote.is_some() && !self.closed
    }
}

/// Split `line` into tokens
pub fn tokenize(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current: Option<Token> = None;
    let mut in_quote: Option<char> = None;
    let mut depth = 0usize;
    let mut chars = line.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if depth > 0 {
            let tok = current.get_or_insert_with(|| Token::start(i));
            tok.content.push(c);
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                '\\' => {
                    if let Some((_, next)) = chars.next() {
                        tok.content.push(next);
                    }
                }
                _ => {}
            }
            continue;
        }

        match in_quote {
            Some('\'') => {
                let tok = current.get_or_insert_with(|| Token::start(i));
                if c == '\'' {
                    in_quote = None;
                    tok.closed = true;
                } else {
                    tok.content.push(c);
                }
                continue;
            }
            Some(_) => {
                let tok = current.get_or_insert_with(|| Token::start(i));
                match c {
                    '"' => {
                        in_quote = None;
                        tok.closed = true;
                    }
                    '\\' => match chars.next() {
                        Some((_, next)) => tok.content.push(next),
                        None => tok.content.push('\\'),
                    },
                    '$' if chars.peek().map(|&(_, n)| n) == Some('(') => {
                        chars.next();
                        tok.content.push_str("$(");
                        depth = 1;
                    }
                    _ => tok.content.push(c),
                }
                continue;
            }
            None => {}
        }

        if c.is_whitespace() {
            if let Some(tok) = current.take() {
                tokens.push(tok);
            }
            continue;
        }

        let tok = current.get_or_insert_with(|| Token::start(i));
        match c {
            '\'' | '"' => {
                in_quote = Some(c);
                tok.quote = Some(c);
                tok.closed = false;
            }
            '\\' => match chars.next() {
                Some((_, next)) => tok.content.push(next),
                None => tok.content.push('\\'),
            },
            '$' if chars.peek().map(|&(_, n)| n) == Some('(') => {
                chars.next();
                tok.content.push_str("$(");
                depth = 1;
            }
            _ => tok.content.push(c),
        }
    }

    if let Some(mut tok) = current.take() {
        tok.open_subshell = depth > 0;
        tokens.push(tok);
    }
    tokens
}

/// Words of a command line, for running it without a shell
pub fn split_words(line: &str) -> Vec<String> {
    tokenize(line).into_iter().map(|t| t.content).collect()
}

/// Quote a word for `sh -c` when it contains anything special
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(line: &str) -> Vec<String> {
        split_words(line)
    }

    #[test]
    fn test_subshell_inside_double_quotes() {
        let tokens = tokenize(r#"echo "User: $(whoami)""#);
        assert_eq!(tokens.len(), 2);
        assert_eq!(
            tokens[0],
            Token {
                content: "echo".into(),
                index: 0,
                quote: None,
                closed: false,
                open_subshell: false,
            }
        );
        assert_eq!(tokens[1].content, "User: $(whoami)");
        assert_eq!(tokens[1].index, 5);
        assert_eq!(tokens[1].quote, Some('"'));
        assert!(tokens[1].closed);
    }

    #[test]
    fn test_whitespace_and_quotes() {
        assert_eq!(contents("  a  'b c'   d"), vec!["a", "b c", "d"]);
        assert_eq!(contents(r#"--name="x y""#), vec!["--name=x y"]);
        assert_eq!(contents("a''b"), vec!["ab"]);
    }

    #[test]
    fn test_backslash_escapes() {
        assert_eq!(contents(r"a\ b c"), vec!["a b", "c"]);
        assert_eq!(contents(r#""a\"b""#), vec![r#"a"b"#]);
        assert_eq!(contents(r"'a\b'"), vec![r"a\b"]);
    }

    #[test]
    fn test_unquoted_subshell_is_one_token() {
        let tokens = tokenize("x $(echo (a b)) y");
        let words: Vec<&str> = tokens.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(words, vec!["x", "$(echo (a b))", "y"]);
        assert_eq!(tokens[1].index, 2);
    }

    #[test]
    fn test_unterminated_quote() {
        let tokens = tokenize("cmd 'abc");
        let last = tokens.last().unwrap();
        assert_eq!(last.content, "abc");
        assert!(last.unterminated());
    }

    #[test]
    fn test_open_subshell_flag() {
        let tokens = tokenize("cmd --x $(ls -");
        assert!(tokens.last().unwrap().open_subshell);
        assert!(!tokenize("cmd $(ls)")[1].open_subshell);
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("abc"), "abc");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }
}
