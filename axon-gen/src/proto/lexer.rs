//! Tokenizer for proto source text
//!
//! Produces a flat token stream with line numbers for diagnostics. Comments
//! (`//` and `/* */`) and whitespace are dropped here.

/// One lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier or keyword, possibly one segment of a dotted name.
    Ident(String),
    /// String literal, quotes stripped.
    Str(String),
    /// Integer literal.
    Int(i64),
    /// Single punctuation character: `{ } ( ) [ ] < > = ; , . : -`.
    Symbol(char),
}

/// A token plus the 1-based line it started on.
#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
}

/// Tokenization failure, reported with the offending line.
#[derive(Debug)]
pub struct LexError {
    pub line: u32,
    pub message: String,
}

const SYMBOLS: &[char] = &[
    '{', '}', '(', ')', '[', ']', '<', '>', '=', ';', ',', '.', ':', '-',
];

/// Tokenize a whole source file.
pub fn tokenize(src: &str) -> Result<Vec<Spanned>, LexError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();
    let mut line: u32 = 1;

    while let Some(&(start, ch)) = chars.peek() {
        match ch {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '/' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, '/')) => {
                        for (_, c) in chars.by_ref() {
                            if c == '\n' {
                                line += 1;
                                break;
                            }
                        }
                    }
                    Some(&(_, '*')) => {
                        chars.next();
                        let mut prev = '\0';
                        let mut closed = false;
                        for (_, c) in chars.by_ref() {
                            if c == '\n' {
                                line += 1;
                            }
                            if prev == '*' && c == '/' {
                                closed = true;
                                break;
                            }
                            prev = c;
                        }
                        if !closed {
                            return Err(LexError {
                                line,
                                message: "unterminated block comment".to_string(),
                            });
                        }
                    }
                    _ => {
                        return Err(LexError {
                            line,
                            message: "unexpected `/`".to_string(),
                        });
                    }
                }
            }
            '"' | '\'' => {
                let quote = ch;
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    if c == quote {
                        closed = true;
                        break;
                    }
                    if c == '\n' {
                        break;
                    }
                    if c == '\\' {
                        match chars.next() {
                            Some((_, 'n')) => value.push('\n'),
                            Some((_, 't')) => value.push('\t'),
                            Some((_, other)) => value.push(other),
                            None => break,
                        }
                    } else {
                        value.push(c);
                    }
                }
                if !closed {
                    return Err(LexError {
                        line,
                        message: "unterminated string literal".to_string(),
                    });
                }
                tokens.push(Spanned {
                    token: Token::Str(value),
                    line,
                });
            }
            c if c.is_ascii_digit() => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '.' {
                        end = i + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let text = &src[start..end];
                // Floats only appear in option values, which are skipped
                // wholesale by the parser; integer parse failures there are
                // tolerated as 0.
                let value = text.split('.').next().unwrap_or("0").parse().unwrap_or(0);
                tokens.push(Spanned {
                    token: Token::Int(value),
                    line,
                });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        end = i + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Spanned {
                    token: Token::Ident(src[start..end].to_string()),
                    line,
                });
            }
            c if SYMBOLS.contains(&c) => {
                chars.next();
                tokens.push(Spanned {
                    token: Token::Symbol(c),
                    line,
                });
            }
            other => {
                return Err(LexError {
                    line,
                    message: format!("unexpected character `{other}`"),
                });
            }
        }
    }

    Ok(tokens)
}
