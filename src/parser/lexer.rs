use crate::error::FormulaError;

/// A lexical token of the arithmetic formula language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    LeftParen,
    RightParen,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Identifier(name) => format!("identifier '{}'", name),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::LeftParen => "'('".to_string(),
            Token::RightParen => "')'".to_string(),
        }
    }
}

/// A token together with the character offset it started at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Returns `true` for the characters a formula may contain once references
/// have been substituted: digits, `+ - * /`, parentheses, `.`, whitespace and
/// word characters.
pub fn is_allowed_char(c: char) -> bool {
    is_word_char(c) || c.is_whitespace() || matches!(c, '+' | '-' | '*' | '/' | '(' | ')' | '.')
}

/// Rejects the input if any character falls outside the allow-list.
/// Runs before tokenization so that nothing else ever sees unsafe input.
pub fn check_allowed_characters(input: &str) -> Result<(), FormulaError> {
    match input.chars().enumerate().find(|(_, c)| !is_allowed_char(*c)) {
        Some((position, character)) => Err(FormulaError::UnsafeCharacters {
            character,
            position,
        }),
        None => Ok(()),
    }
}

/// Splits an allow-listed formula into tokens.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, FormulaError> {
    check_allowed_characters(input)?;

    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let token = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '(' => Token::LeftParen,
            ')' => Token::RightParen,
            c if c.is_ascii_digit() || c == '.' => {
                let (value, end) = scan_number(&chars, pos)?;
                pos = end;
                tokens.push(Spanned {
                    token: Token::Number(value),
                    position: start,
                });
                continue;
            }
            _ => {
                while pos < chars.len() && is_word_char(chars[pos]) {
                    pos += 1;
                }
                tokens.push(Spanned {
                    token: Token::Identifier(chars[start..pos].iter().collect()),
                    position: start,
                });
                continue;
            }
        };
        tokens.push(Spanned {
            token,
            position: start,
        });
        pos += 1;
    }

    Ok(tokens)
}

/// Scans a decimal literal (`12`, `1.5`, `.5`, `5.`, `2e-3`) starting at `start`.
fn scan_number(chars: &[char], start: usize) -> Result<(f64, usize), FormulaError> {
    let mut pos = start;
    let mut mantissa_digits = 0;

    while pos < chars.len() && chars[pos].is_ascii_digit() {
        pos += 1;
        mantissa_digits += 1;
    }
    if pos < chars.len() && chars[pos] == '.' {
        pos += 1;
        while pos < chars.len() && chars[pos].is_ascii_digit() {
            pos += 1;
            mantissa_digits += 1;
        }
    }
    if mantissa_digits == 0 {
        return Err(FormulaError::Syntax {
            message: "expected digits around '.'".to_string(),
            position: start,
        });
    }

    if pos < chars.len() && matches!(chars[pos], 'e' | 'E') {
        let mut exp_end = pos + 1;
        if exp_end < chars.len() && matches!(chars[exp_end], '+' | '-') {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while exp_end < chars.len() && chars[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end == digits_start {
            return Err(FormulaError::Syntax {
                message: "malformed exponent in numeric literal".to_string(),
                position: pos,
            });
        }
        pos = exp_end;
    }

    if pos < chars.len() && is_word_char(chars[pos]) {
        return Err(FormulaError::Syntax {
            message: "identifier starts immediately after numeric literal".to_string(),
            position: pos,
        });
    }

    let text: String = chars[start..pos].iter().collect();
    let value = text.parse::<f64>().map_err(|_| FormulaError::Syntax {
        message: format!("invalid numeric literal '{}'", text),
        position: start,
    })?;
    Ok((value, pos))
}
