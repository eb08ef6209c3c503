//! Tokenization of Conflake source text.
//!
//! The lexer turns a source string into a flat token stream ending in
//! [`Token::Eof`]. Comments are recognised but never reach the parser.

mod token;

pub use token::*;

use std::{error::Error, fmt::Display, fs, iter::Peekable, path::Path, str::Chars};

/// Characters that lex to a single [`Token::Operator`].
const OPERATORS: &[char] = &[
    '+', '-', '*', '<', '>', '(', ')', '[', ']', ',', ';', ':', '=',
];

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LexError(String);

pub type LexResult<T> = Result<T, LexError>;

impl Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl Error for LexError {}

#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    tokens: Vec<Token>,
    iterator: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            tokens: vec![],
            iterator: input.chars().peekable(),
        }
    }

    /// Lexes the contents of a file.
    pub fn from_path(path: &Path) -> LexResult<Vec<Token>> {
        let input = fs::read_to_string(path)
            .map_err(|e| LexError(format!("could not read '{}': {e}", path.display())))?;
        Lexer::new(&input).lex()
    }

    pub fn lex(mut self) -> LexResult<Vec<Token>> {
        loop {
            while self.iterator.next_if(|c| c.is_whitespace()).is_some() {}

            let Some(next) = self.iterator.peek() else {
                self.tokens.push(Token::Eof);
                return Ok(self.tokens);
            };

            let token = match next {
                'a'..='z' | 'A'..='Z' => self.lex_word(),
                '0'..='9' | '.' => self.lex_number()?,
                '#' => self.lex_comment(),
                _ => self.lex_operator()?,
            };

            if token != Token::Comment {
                self.tokens.push(token);
            }
        }
    }

    fn lex_word(&mut self) -> Token {
        let mut word = String::new();
        while let Some(next) = self.iterator.next_if(|c| c.is_ascii_alphanumeric()) {
            word.push(next);
        }

        match word.as_str() {
            "def" => Token::Keyword(Keyword::Def),
            "extern" => Token::Keyword(Keyword::Extern),
            "True" => Token::BooleanLit(true),
            "False" => Token::BooleanLit(false),
            _ => Token::Identifier(word),
        }
    }

    /// Numbers are `[0-9.]+` with an optional trailing `i` turning the
    /// literal into an integer. The `i` suffix is what separates the two
    /// literal forms; a dotted integer literal is rejected.
    fn lex_number(&mut self) -> LexResult<Token> {
        let mut digits = String::new();
        while let Some(next) = self.iterator.next_if(|c| c.is_ascii_digit() || *c == '.') {
            digits.push(next);
        }

        if self.iterator.next_if(|c| *c == 'i').is_some() {
            if digits.contains('.') {
                return Err(LexError(format!(
                    "integer literal '{digits}i' may not contain '.'"
                )));
            }
            let value = digits
                .parse::<i64>()
                .map_err(|_| LexError(format!("failed to parse integer literal '{digits}i'")))?;
            return Ok(Token::IntegerLit(value));
        }

        let value = digits
            .parse::<f64>()
            .map_err(|_| LexError(format!("failed to parse real literal '{digits}'")))?;
        Ok(Token::RealLit(value))
    }

    fn lex_comment(&mut self) -> Token {
        while self.iterator.next_if(|c| *c != '\n').is_some() {}
        Token::Comment
    }

    fn lex_operator(&mut self) -> LexResult<Token> {
        let Some(next) = self.iterator.next() else {
            return Err(LexError("unexpected end of input".into()));
        };
        if OPERATORS.contains(&next) {
            Ok(Token::Operator(next))
        } else {
            Err(LexError(format!("unrecognized character '{next}'")))
        }
    }
}
