//! Análisis léxico.
//!
//! Primera fase del compilador. El escáner recorre un [`InputStream`] con
//! un carácter de anticipación y lo reduce a tokens, cada uno con el rango
//! de código fuente que ocupa. Espacios en blanco y comentarios no llegan
//! al parser.
//!
//! # Tokens
//! Operadores, puntuación y palabras clave no guardan lexema. Los
//! identificadores sí, y las constantes enteras o de carácter se entregan
//! ya resueltas a su valor.
//!
//! # Reglas de SNL
//! - Las palabras clave no distinguen mayúsculas: `begin`, `BEGIN` y `Begin`
//!   resultan en [`Keyword::Begin`]. Los identificadores sí las distinguen.
//! - Los comentarios van entre `{` y `}` y pueden abarcar varias líneas.
//! - Un literal de carácter es exactamente un carácter entre comillas simples.
//!
//! # Errores
//! Tras un error se descarta el resto de la línea y el escaneo continúa en
//! la siguiente. Así se reportan varios errores por ejecución, aunque
//! ninguno permite avanzar a las fases siguientes.

use crate::source::{InputStream, Located, Location};
use std::{
    fmt::{self, Display},
    iter::Peekable,
    rc::Rc,
    str::FromStr,
};

use thiserror::Error;

// Case-insensitive
pub use unicase::Ascii as NoCase;

/// Literal entero máximo.
const INT_MAX: i32 = i32::MAX;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Error de E/S originado por el [`InputStream`].
    #[error("I/O error")]
    Input(#[from] std::io::Error),

    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream")]
    BadChar(char),

    /// Se esperaba un carácter específico en esta posición.
    #[error("Expected {0:?}")]
    Expected(char),

    /// Una constante entera se encuentra fuera de rango.
    #[error("Integer literal overflow, valid range is [0, {}]", INT_MAX)]
    IntOverflow,

    /// El archivo terminó dentro de un comentario.
    #[error("Unterminated comment, expected `}}`")]
    UnterminatedComment,
}

/// Un identificador.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(Rc<str>);

impl Identifier {
    /// Construye un identificador a partir de su lexema.
    pub fn new(name: &str) -> Self {
        Identifier(Rc::from(name))
    }

    /// Obtiene el lexema compartido.
    pub fn name(&self) -> Rc<str> {
        Rc::clone(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

/// Objeto resultante del análisis léxico.
///
/// Un token contiene suficiente información para describir completamente
/// a una entidad léxica en el programa fuente.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identificador.
    Id(Identifier),

    /// Palabra clave.
    Keyword(Keyword),

    /// Literal de entero.
    IntLiteral(i32),

    /// Literal de carácter.
    CharLiteral(char),

    /// `:=`
    Assign,

    /// `=`
    Equal,

    /// `<`
    Less,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Times,

    /// `/`
    Over,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `[`
    OpenSquare,

    /// `]`
    CloseSquare,

    /// `..`
    Range,

    /// `;`
    Semicolon,

    /// `,`
    Comma,

    /// `.`
    Period,
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Id(id) => write!(fmt, "identifier `{}`", id),
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            IntLiteral(integer) => write!(fmt, "literal `{}`", integer),
            CharLiteral(c) => write!(fmt, "literal `'{}'`", c),
            Assign => fmt.write_str("`:=`"),
            Equal => fmt.write_str("`=`"),
            Less => fmt.write_str("`<`"),
            Plus => fmt.write_str("`+`"),
            Minus => fmt.write_str("`-`"),
            Times => fmt.write_str("`*`"),
            Over => fmt.write_str("`/`"),
            OpenParen => fmt.write_str("`(`"),
            CloseParen => fmt.write_str("`)`"),
            OpenSquare => fmt.write_str("`[`"),
            CloseSquare => fmt.write_str("`]`"),
            Range => fmt.write_str("`..`"),
            Semicolon => fmt.write_str("`;`"),
            Comma => fmt.write_str("`,`"),
            Period => fmt.write_str("`.`"),
        }
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Program,
    Procedure,
    Type,
    Var,
    If,
    Then,
    Else,
    Fi,
    While,
    Do,
    Endwh,
    Begin,
    End,
    Read,
    Write,
    Array,
    Of,
    Record,
    Return,
    Integer,
    Char,
}

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Keyword::*;
        let string = match self {
            Program   => "program",
            Procedure => "procedure",
            Type      => "type",
            Var       => "var",
            If        => "if",
            Then      => "then",
            Else      => "else",
            Fi        => "fi",
            While     => "while",
            Do        => "do",
            Endwh     => "endwh",
            Begin     => "begin",
            End       => "end",
            Read      => "read",
            Write     => "write",
            Array     => "array",
            Of        => "of",
            Record    => "record",
            Return    => "return",
            Integer   => "integer",
            Char      => "char",
        };

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        use Keyword::*;

        const KEYWORDS: &[(NoCase<&str>, Keyword)] = &[
            (NoCase::new("program"),   Program),
            (NoCase::new("procedure"), Procedure),
            (NoCase::new("type"),      Type),
            (NoCase::new("var"),       Var),
            (NoCase::new("if"),        If),
            (NoCase::new("then"),      Then),
            (NoCase::new("else"),      Else),
            (NoCase::new("fi"),        Fi),
            (NoCase::new("while"),     While),
            (NoCase::new("do"),        Do),
            (NoCase::new("endwh"),     Endwh),
            (NoCase::new("begin"),     Begin),
            (NoCase::new("end"),       End),
            (NoCase::new("read"),      Read),
            (NoCase::new("write"),     Write),
            (NoCase::new("array"),     Array),
            (NoCase::new("of"),        Of),
            (NoCase::new("record"),    Record),
            (NoCase::new("return"),    Return),
            (NoCase::new("integer"),   Integer),
            (NoCase::new("char"),      Char),
        ];

        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == NoCase::new(string))
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Escáner de tokens.
pub struct Lexer<S: Iterator> {
    chars: Peekable<S>,

    // Ubicación del siguiente carácter sin consumir
    here: Location,

    // Ubicación del último carácter consumido
    last: Location,

    // Primer carácter del token en curso
    start: Location,
}

impl<S: InputStream> Lexer<S> {
    pub fn new(start: Location, source: S) -> Self {
        Lexer {
            chars: source.peekable(),
            here: start.clone(),
            last: start.clone(),
            start,
        }
    }

    /// Escanea la entrada completa.
    ///
    /// Retorna todos los tokens o, si hubo al menos un error, todos los
    /// errores encontrados. Los tokens posteriores al primer error se
    /// descartan.
    pub fn try_exhaustive(self) -> Result<Vec<Located<Token>>, Vec<Located<LexerError>>> {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();

        for result in self {
            match result {
                Ok(token) if errors.is_empty() => tokens.push(token),
                Ok(_) => (),
                Err(error) => errors.push(error),
            }
        }

        if errors.is_empty() {
            Ok(tokens)
        } else {
            Err(errors)
        }
    }

    fn scan(&mut self) -> Result<Option<Token>, Located<LexerError>> {
        use Token::*;

        loop {
            match self.peek()? {
                Some('{') => self.comment()?,
                Some(c) if c.is_ascii_whitespace() => self.bump(),
                _ => break,
            }
        }

        self.start = self.here.clone();
        let c = match self.peek()? {
            Some(c) => c,
            None => return Ok(None),
        };

        if c.is_ascii_alphabetic() {
            return self.word().map(Some);
        } else if c.is_ascii_digit() {
            return self.integer().map(Some);
        }

        self.bump();
        let token = match c {
            ',' => Comma,
            ';' => Semicolon,
            '+' => Plus,
            '-' => Minus,
            '*' => Times,
            '/' => Over,
            '=' => Equal,
            '<' => Less,
            '(' => OpenParen,
            ')' => CloseParen,
            '[' => OpenSquare,
            ']' => CloseSquare,
            '\'' => self.char_literal()?,

            // `:` solo existe como parte de `:=`
            ':' if self.eat('=')? => Assign,
            ':' => return Err(self.error(LexerError::Expected('='))),

            // `..` separa límites de arreglos, `.` a solas termina el programa
            '.' if self.eat('.')? => Range,
            '.' => Period,

            c => return Err(Located::at(LexerError::BadChar(c), self.start.clone())),
        };

        Ok(Some(token))
    }

    fn word(&mut self) -> Result<Token, Located<LexerError>> {
        let mut word = String::new();
        while let Some(c) = self.peek()?.filter(|c| is_word_char(*c)) {
            word.push(c);
            self.bump();
        }

        let token = match word.parse() {
            Ok(keyword) => Token::Keyword(keyword),
            Err(()) => Token::Id(Identifier::new(&word)),
        };

        Ok(token)
    }

    fn integer(&mut self) -> Result<Token, Located<LexerError>> {
        let mut value: i32 = 0;
        while let Some(digit) = self.peek()?.and_then(|c| c.to_digit(10)) {
            value = value
                .checked_mul(10)
                .and_then(|value| value.checked_add(digit as i32))
                .ok_or_else(|| self.error(LexerError::IntOverflow))?;

            self.bump();
        }

        Ok(Token::IntLiteral(value))
    }

    /// Resto de un literal de carácter, tras la comilla de apertura.
    fn char_literal(&mut self) -> Result<Token, Located<LexerError>> {
        let c = match self.peek()? {
            Some(c) if c != '\'' && c != '\n' => c,
            Some(c) => return Err(self.error(LexerError::BadChar(c))),
            None => return Err(self.error(LexerError::Expected('\''))),
        };

        self.bump();
        if self.eat('\'')? {
            Ok(Token::CharLiteral(c))
        } else {
            Err(self.error(LexerError::Expected('\'')))
        }
    }

    fn comment(&mut self) -> Result<(), Located<LexerError>> {
        self.bump();
        loop {
            match self.peek()? {
                Some('}') => {
                    self.bump();
                    break Ok(());
                }

                Some(_) => self.bump(),
                None => break Err(self.error(LexerError::UnterminatedComment)),
            }
        }
    }

    /// Observa el siguiente carácter sin consumirlo.
    fn peek(&mut self) -> Result<Option<char>, Located<LexerError>> {
        match self.chars.peek() {
            None => Ok(None),
            Some(Ok((c, _))) => Ok(Some(*c)),
            Some(Err(_)) => match self.chars.next() {
                Some(Err(error)) => Err(self.error(error.into())),
                _ => Ok(None),
            },
        }
    }

    fn bump(&mut self) {
        if let Some(Ok((_, after))) = self.chars.next() {
            self.last = std::mem::replace(&mut self.here, after);
        }
    }

    /// Consume `expected` solo si es el siguiente carácter.
    fn eat(&mut self, expected: char) -> Result<bool, Located<LexerError>> {
        let found = self.peek()? == Some(expected);
        if found {
            self.bump();
        }

        Ok(found)
    }

    /// Descarta lo que resta de la línea, incluyendo su fin.
    fn recover(&mut self) {
        while let Some(Ok((c, _))) = self.chars.peek() {
            let newline = *c == '\n';
            self.bump();

            if newline {
                break;
            }
        }
    }

    fn error(&self, error: LexerError) -> Located<LexerError> {
        Located::at(error, self.here.clone())
    }
}

impl<S: InputStream> Iterator for Lexer<S> {
    type Item = Result<Located<Token>, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.scan() {
            Ok(None) => None,
            Ok(Some(token)) => {
                let location = Location::span(self.start.clone(), &self.last);
                Some(Ok(Located::at(token, location)))
            }

            Err(error) => {
                self.recover();
                Some(Err(error))
            }
        }
    }
}

/// Determina si un carácter puede pertenecer a un término.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source;
    use pretty_assertions::assert_eq;

    fn tokens(text: &str) -> Vec<Token> {
        let (start, chars) = source::consume(text.as_bytes(), "test.snl");
        Lexer::new(start, chars)
            .try_exhaustive()
            .unwrap()
            .into_iter()
            .map(Located::into_inner)
            .collect()
    }

    fn errors(text: &str) -> Vec<String> {
        let (start, chars) = source::consume(text.as_bytes(), "test.snl");
        match Lexer::new(start, chars).try_exhaustive() {
            Ok(_) => Vec::new(),
            Err(errors) => errors.iter().map(|e| e.as_ref().to_string()).collect(),
        }
    }

    #[test]
    fn assignment_and_ranges() {
        use Token::*;

        assert_eq!(
            tokens("a[1..10] := x + 'c';"),
            vec![
                Id(Identifier::new("a")),
                OpenSquare,
                IntLiteral(1),
                Range,
                IntLiteral(10),
                CloseSquare,
                Assign,
                Id(Identifier::new("x")),
                Plus,
                CharLiteral('c'),
                Semicolon,
            ]
        );
    }

    #[test]
    fn keywords_ignore_case() {
        assert_eq!(
            tokens("BEGIN EndWh fi"),
            vec![
                Token::Keyword(Keyword::Begin),
                Token::Keyword(Keyword::Endwh),
                Token::Keyword(Keyword::Fi),
            ]
        );

        // Los identificadores sí conservan su forma
        assert_eq!(tokens("Count"), vec![Token::Id(Identifier::new("Count"))]);
    }

    #[test]
    fn comments_span_lines() {
        assert_eq!(
            tokens("x { uno\n dos } ."),
            vec![Token::Id(Identifier::new("x")), Token::Period]
        );
    }

    #[test]
    fn recovers_at_end_of_line() {
        let errors = errors("x # y\ny : z\nw");
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("Bad character '#'"));
        assert!(errors[1].contains("Expected '='"));
    }

    #[test]
    fn unterminated_comment() {
        assert_eq!(errors("x { nunca"), vec!["Unterminated comment, expected `}`"]);
    }

    #[test]
    fn integer_overflow() {
        assert_eq!(errors("99999999999").len(), 1);
    }
}
