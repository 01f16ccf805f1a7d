//! Lexer for the expression language.

use crate::error::CompileError;

/// A lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    /// Identifier (binding name, member name, or function name).
    Ident(String),
    /// String literal (single- or double-quoted).
    Str(String),
    /// Integer literal.
    Int(i64),
    /// `true` keyword.
    True,
    /// `false` keyword.
    False,
    /// `null` keyword.
    Null,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    /// `!`
    Bang,
    /// `.`
    Dot,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
}

impl Token {
    /// Renders the token for error messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Ident(name) => format!("identifier `{name}`"),
            Self::Str(s) => format!("string \"{s}\""),
            Self::Int(n) => format!("integer {n}"),
            Self::True => "true".to_string(),
            Self::False => "false".to_string(),
            Self::Null => "null".to_string(),
            Self::EqEq => "==".to_string(),
            Self::NotEq => "!=".to_string(),
            Self::Lt => "<".to_string(),
            Self::Le => "<=".to_string(),
            Self::Gt => ">".to_string(),
            Self::Ge => ">=".to_string(),
            Self::AndAnd => "&&".to_string(),
            Self::OrOr => "||".to_string(),
            Self::Bang => "!".to_string(),
            Self::Dot => ".".to_string(),
            Self::LBracket => "[".to_string(),
            Self::RBracket => "]".to_string(),
            Self::LParen => "(".to_string(),
            Self::RParen => ")".to_string(),
            Self::Comma => ",".to_string(),
        }
    }
}

/// Tokenizes an expression source string.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut pos = 0;

    while pos < chars.len() {
        let ch = chars[pos];
        match ch {
            c if c.is_whitespace() => pos += 1,
            '(' => {
                tokens.push(Token::LParen);
                pos += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                pos += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                pos += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                pos += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                pos += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                pos += 1;
            }
            '=' if chars.get(pos + 1) == Some(&'=') => {
                tokens.push(Token::EqEq);
                pos += 2;
            }
            '!' if chars.get(pos + 1) == Some(&'=') => {
                tokens.push(Token::NotEq);
                pos += 2;
            }
            '!' => {
                tokens.push(Token::Bang);
                pos += 1;
            }
            '<' if chars.get(pos + 1) == Some(&'=') => {
                tokens.push(Token::Le);
                pos += 2;
            }
            '<' => {
                tokens.push(Token::Lt);
                pos += 1;
            }
            '>' if chars.get(pos + 1) == Some(&'=') => {
                tokens.push(Token::Ge);
                pos += 2;
            }
            '>' => {
                tokens.push(Token::Gt);
                pos += 1;
            }
            '&' if chars.get(pos + 1) == Some(&'&') => {
                tokens.push(Token::AndAnd);
                pos += 2;
            }
            '|' if chars.get(pos + 1) == Some(&'|') => {
                tokens.push(Token::OrOr);
                pos += 2;
            }
            '\'' | '"' => {
                let (literal, consumed) = lex_string(&chars[pos..], ch)?;
                tokens.push(Token::Str(literal));
                pos += consumed;
            }
            c if c.is_ascii_digit() || (c == '-' && starts_number(&tokens)) => {
                let (literal, consumed) = lex_int(&chars[pos..])?;
                tokens.push(Token::Int(literal));
                pos += consumed;
            }
            c if c.is_alphabetic() || c == '_' => {
                let (word, consumed) = lex_word(&chars[pos..]);
                tokens.push(match word.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Ident(word),
                });
                pos += consumed;
            }
            other => {
                return Err(CompileError::UnexpectedChar {
                    ch: other,
                    offset: pos,
                });
            }
        }
    }

    Ok(tokens)
}

/// A leading `-` only starts a number when the previous token cannot end an
/// operand (so `a - 1` is rejected while `x == -1` lexes).
fn starts_number(tokens: &[Token]) -> bool {
    !matches!(
        tokens.last(),
        Some(Token::Ident(_) | Token::Str(_) | Token::Int(_) | Token::RBracket | Token::RParen)
    )
}

/// Lexes a quoted string starting at `chars[0]`, returning the unescaped
/// content and the number of characters consumed including both quotes.
fn lex_string(chars: &[char], quote: char) -> Result<(String, usize), CompileError> {
    let mut literal = String::new();
    let mut pos = 1;
    while pos < chars.len() {
        match chars[pos] {
            '\\' if pos + 1 < chars.len() => {
                literal.push(chars[pos + 1]);
                pos += 2;
            }
            c if c == quote => return Ok((literal, pos + 1)),
            c => {
                literal.push(c);
                pos += 1;
            }
        }
    }
    Err(CompileError::UnterminatedString)
}

/// Lexes an integer literal starting at `chars[0]`.
fn lex_int(chars: &[char]) -> Result<(i64, usize), CompileError> {
    let mut end = usize::from(chars[0] == '-');
    while end < chars.len() && chars[end].is_ascii_digit() {
        end += 1;
    }
    let literal: String = chars[..end].iter().collect();
    let value = literal
        .parse::<i64>()
        .map_err(|_| CompileError::IntOutOfRange(literal))?;
    Ok((value, end))
}

/// Lexes an identifier or keyword starting at `chars[0]`.
fn lex_word(chars: &[char]) -> (String, usize) {
    let mut end = 0;
    while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
        end += 1;
    }
    (chars[..end].iter().collect(), end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_attribute_access() {
        let tokens = tokenize("input.attributes['uid']").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("input".to_string()),
                Token::Dot,
                Token::Ident("attributes".to_string()),
                Token::LBracket,
                Token::Str("uid".to_string()),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn tokenizes_operators_and_keywords() {
        let tokens = tokenize("a == 'x' && !b || c != null").unwrap();
        assert!(tokens.contains(&Token::EqEq));
        assert!(tokens.contains(&Token::AndAnd));
        assert!(tokens.contains(&Token::Bang));
        assert!(tokens.contains(&Token::OrOr));
        assert!(tokens.contains(&Token::NotEq));
        assert!(tokens.contains(&Token::Null));
    }

    #[test]
    fn string_escapes_and_both_quote_styles() {
        let tokens = tokenize(r#"'it\'s' "a\"b""#).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Str("it's".to_string()),
                Token::Str("a\"b".to_string()),
            ]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert_eq!(tokenize("'oops"), Err(CompileError::UnterminatedString));
    }

    #[test]
    fn negative_integers_lex_after_operators() {
        let tokens = tokenize("x == -12").unwrap();
        assert_eq!(tokens[2], Token::Int(-12));
    }

    #[test]
    fn rejects_unknown_characters() {
        assert!(matches!(
            tokenize("a # b"),
            Err(CompileError::UnexpectedChar { ch: '#', .. })
        ));
    }
}
