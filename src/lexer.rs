use std::{
    fmt,
    io::{self, BufRead},
    vec,
};

use log::warn;

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    EndOfInput,
    Def,
    Extern,
    Identifier(String),
    Number(f64),
    Operator(char),
    LeftParen,
    Semicolon,
    /// cursor value before the first pull, or after a lexical error ate the token
    Undefined,
}

impl Token {
    /// the literal character of a single character token
    pub fn as_char(&self) -> Option<char> {
        match self {
            Token::Operator(op) => Some(*op),
            Token::LeftParen => Some('('),
            Token::Semicolon => Some(';'),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::EndOfInput => write!(f, "<eof>"),
            Token::Def => write!(f, "def"),
            Token::Extern => write!(f, "extern"),
            Token::Identifier(name) => write!(f, "{}", name),
            Token::Number(value) => write!(f, "{}", value),
            Token::Operator(op) => write!(f, "{}", op),
            Token::LeftParen => write!(f, "("),
            Token::Semicolon => write!(f, ";"),
            Token::Undefined => write!(f, "<undefined>"),
        }
    }
}

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum LexError {
    #[error("invalid numeric value `{0}`: more than one decimal point")]
    MultipleDecimalPoints(String),
    #[error("invalid numeric value `{0}`")]
    InvalidNumber(String),
    #[error("numeric value is out of range: `{0}`")]
    OutOfRange(String),
    #[error("failed to read input: {0}")]
    Io(String),
}

/// Where the lexer pulls characters from. `Ok(None)` is end of stream.
pub trait CharStream {
    fn next_char(&mut self) -> Result<Option<char>, LexError>;
}

impl<I: Iterator<Item = char>> CharStream for I {
    fn next_char(&mut self) -> Result<Option<char>, LexError> {
        Ok(self.next())
    }
}

/// Characters of a line reader, read lazily one line at a time.
///
/// A line that is not valid UTF-8 is reported once and dropped; reading goes on
/// with the next line. Any other read error ends the stream after it is reported.
#[derive(Debug)]
pub struct ReaderChars<R> {
    lines: io::Lines<R>,
    line: vec::IntoIter<char>,
    done: bool,
}

impl<R: BufRead> CharStream for ReaderChars<R> {
    fn next_char(&mut self) -> Result<Option<char>, LexError> {
        loop {
            if let Some(c) = self.line.next() {
                return Ok(Some(c));
            }
            if self.done {
                return Ok(None);
            }

            match self.lines.next() {
                Some(Ok(line)) => {
                    self.line = line
                        .chars()
                        .chain(std::iter::once('\n'))
                        .collect::<Vec<_>>()
                        .into_iter();
                }
                Some(Err(err)) => {
                    if err.kind() != io::ErrorKind::InvalidData {
                        warn!("stopped reading input: {}", err);
                        self.done = true;
                    }
                    return Err(LexError::Io(err.to_string()));
                }
                None => self.done = true,
            }
        }
    }
}

pub fn reader_chars<R: BufRead>(reader: R) -> ReaderChars<R> {
    ReaderChars {
        lines: reader.lines(),
        line: Vec::new().into_iter(),
        done: false,
    }
}

/// Pull based tokenizer over any character stream.
///
/// Holds exactly one character of lookahead between calls, so nothing past the
/// end of the current token is read until the next token is requested.
#[derive(Debug)]
pub struct Lexer<I: CharStream> {
    chars: I,
    last_char: Option<char>,
}

impl<I: CharStream> Lexer<I> {
    pub fn new(chars: I) -> Self {
        Self {
            chars,
            last_char: Some(' '),
        }
    }

    // only called while `last_char` is `Some`, so the stream is never polled past its end
    fn bump(&mut self) -> Result<Option<char>, LexError> {
        match self.chars.next_char() {
            Ok(c) => {
                self.last_char = c;
                Ok(c)
            }
            Err(err) => {
                // resume as if at a line break on the next call
                self.last_char = Some(' ');
                Err(err)
            }
        }
    }

    /// lex the next token - returns `Token::EndOfInput` forever once the stream is drained
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            while let Some(c) = self.last_char {
                if !c.is_whitespace() {
                    break;
                }
                self.bump()?;
            }

            let c = match self.last_char {
                Some(c) => c,
                None => return Ok(Token::EndOfInput),
            };

            if c.is_alphabetic() {
                return self.lex_word(c);
            }

            if c.is_ascii_digit() || c == '.' {
                return self.lex_number(c);
            }

            if c == '#' {
                self.skip_comment()?;
                continue;
            }

            self.bump()?;
            return Ok(match c {
                '(' => Token::LeftParen,
                ';' => Token::Semicolon,
                op => Token::Operator(op),
            });
        }
    }

    fn lex_word(&mut self, first: char) -> Result<Token, LexError> {
        let mut word = first.to_string();
        while let Some(c) = self.bump()? {
            if !c.is_alphanumeric() {
                break;
            }
            word.push(c);
        }

        Ok(match word.as_str() {
            "def" => Token::Def,
            "extern" => Token::Extern,
            _ => Token::Identifier(word),
        })
    }

    fn lex_number(&mut self, first: char) -> Result<Token, LexError> {
        let mut text = first.to_string();
        while let Some(c) = self.bump()? {
            if !(c.is_ascii_digit() || c == '.') {
                break;
            }
            text.push(c);
        }

        parse_number(text).map(Token::Number)
    }

    fn skip_comment(&mut self) -> Result<(), LexError> {
        while let Some(c) = self.bump()? {
            if c == '\n' || c == '\r' {
                break;
            }
        }
        Ok(())
    }
}

fn parse_number(text: String) -> Result<f64, LexError> {
    match text.parse::<f64>() {
        Ok(value) if value.is_infinite() => Err(LexError::OutOfRange(text)),
        // underflow to zero
        Ok(value) if value == 0.0 && text.chars().any(|c| ('1'..='9').contains(&c)) => {
            Err(LexError::OutOfRange(text))
        }
        Ok(value) => Ok(value),
        Err(_) if text.matches('.').count() > 1 => Err(LexError::MultipleDecimalPoints(text)),
        Err(_) => Err(LexError::InvalidNumber(text)),
    }
}

/// lex a whole string - the trailing `Token::EndOfInput` is not included
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new(input.chars());
    let mut tokens = Vec::new();
    loop {
        match lexer.next_token()? {
            Token::EndOfInput => break,
            token => tokens.push(token),
        }
    }
    Ok(tokens)
}
