//! Rastreo de ubicaciones originales en código fuente.
//!
//! Tokens, nodos del AST y diagnósticos de un programa SNL llevan
//! consigo el rango de posiciones del cual provienen. Así, tanto un
//! carácter inválido como un tipo incompatible en una asignación
//! pueden señalarse con exactitud al reportarse.

use std::{
    cell::RefCell,
    collections::VecDeque,
    fmt::{self, Debug, Display, Formatter},
    io::{self, BufRead},
    rc::Rc,
};

/// Las tabulaciones avanzan hasta el siguiente múltiplo de este ancho.
const TAB_WIDTH: u32 = 4;

/// Flujo de caracteres junto a la ubicación que sigue a cada uno.
pub trait InputStream: Iterator<Item = Result<(char, Location), io::Error>> {}

impl<I> InputStream for I where I: Iterator<Item = Result<(char, Location), io::Error>> {}

/// Un valor etiquetado con el rango de código fuente que lo originó.
#[derive(Debug, Clone)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    pub fn at(value: T, location: Location) -> Self {
        Located { location, value }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn split(self) -> (Location, T) {
        let Located { location, value } = self;
        (location, value)
    }

    /// Transforma el valor sin alterar su ubicación.
    pub fn map<U>(self, map: impl FnOnce(T) -> U) -> Located<U> {
        let (location, value) = self.split();
        Located::at(map(value), location)
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Rango semiabierto de posiciones dentro de un mismo origen.
#[derive(Clone)]
pub struct Location {
    source: Rc<Source>,
    start: Position,
    end: Position,
}

impl Location {
    /// Ubicación que cubre desde el inicio de `from` hasta el final de `to`.
    pub fn span(from: Location, to: &Location) -> Self {
        Location { end: to.end, ..from }
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    fn single(source: Rc<Source>, at: Position) -> Self {
        Location {
            source,
            start: at,
            end: at.advance(),
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Location::single(Rc::new(Source::new(String::from("<unknown>"))), Position::default())
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        let last = self.end.back();
        if last == self.start {
            write!(formatter, "{}:{}", self.source.name, self.start)
        } else {
            write!(formatter, "{}:[{}-{}]", self.source.name, self.start, last)
        }
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

/// Línea y columna, ambas a partir de 1.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    /// Columna siguiente en la misma línea.
    pub fn advance(self) -> Position {
        Position {
            column: self.column + 1,
            ..self
        }
    }

    /// Columna anterior en la misma línea.
    pub fn back(self) -> Position {
        Position {
            column: self.column.saturating_sub(1).max(1),
            ..self
        }
    }

    /// Primera columna de la línea siguiente.
    pub fn newline(self) -> Position {
        Position {
            line: self.line + 1,
            column: 1,
        }
    }

    /// Siguiente parada de tabulador.
    pub fn tab(self) -> Position {
        let stops = (self.column - 1) / TAB_WIDTH + 1;
        Position {
            column: stops * TAB_WIDTH + 1,
            ..self
        }
    }

    fn after(self, c: char) -> Position {
        match c {
            '\n' => self.newline(),
            '\t' => self.tab(),
            _ => self.advance(),
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

/// Nombre de un origen junto a las líneas que se han leído de él.
pub struct Source {
    name: String,
    lines: RefCell<Vec<String>>,
}

impl Source {
    fn new(name: String) -> Self {
        Source {
            name,
            lines: RefCell::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoca a `callback` con el contenido de una línea ya leída.
    ///
    /// Las líneas se numeran a partir de 1. Una línea que aún no se
    /// ha consumido se presenta como vacía.
    pub fn with_line<F, R>(&self, line: u32, callback: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        let lines = self.lines.borrow();
        let text = match (line as usize).checked_sub(1) {
            Some(index) => lines.get(index).map_or("", String::as_str),
            None => "",
        };

        callback(text)
    }
}

/// Descompone un lector en caracteres con ubicación.
///
/// La ubicación retornada aparte corresponde al primer carácter. Cada
/// carácter emitido viene acompañado por la ubicación del siguiente, de
/// forma que un token puede cerrarse en cuanto se acepta su último
/// carácter. Todo fin de línea se normaliza a `'\n'`, incluso al final
/// del archivo.
pub fn consume<R, S>(reader: R, name: S) -> (Location, impl InputStream)
where
    R: BufRead,
    S: Into<String>,
{
    let source = Rc::new(Source::new(name.into()));
    let start = Location::single(Rc::clone(&source), Position::default());

    let chars = Chars {
        reader,
        source,
        position: Position::default(),
        pending: VecDeque::new(),
        done: false,
    };

    (start, chars)
}

/// Iterador interno de [`consume`], lee una línea a la vez.
struct Chars<R> {
    reader: R,
    source: Rc<Source>,
    position: Position,
    pending: VecDeque<char>,
    done: bool,
}

impl<R: BufRead> Chars<R> {
    /// Carga la siguiente línea. Retorna `false` al final de la entrada.
    fn refill(&mut self) -> io::Result<bool> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(false);
        }

        let line = line.trim_end_matches(&['\n', '\r'][..]).to_owned();
        self.pending.extend(line.chars().chain(Some('\n')));
        self.source.lines.borrow_mut().push(line);

        Ok(true)
    }
}

impl<R: BufRead> Iterator for Chars<R> {
    type Item = Result<(char, Location), io::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pending.is_empty() && !self.done {
            match self.refill() {
                Ok(true) => (),
                Ok(false) => self.done = true,
                Err(error) => {
                    self.done = true;
                    return Some(Err(error));
                }
            }
        }

        let c = self.pending.pop_front()?;
        self.position = self.position.after(c);

        let location = Location::single(Rc::clone(&self.source), self.position);
        Some(Ok((c, location)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_stops() {
        let start = Position::default();
        assert_eq!(start.tab().column(), 5);
        assert_eq!(start.advance().advance().tab().column(), 5);
        assert_eq!(start.tab().tab().column(), 9);
    }

    #[test]
    fn consumed_lines_are_kept() {
        let (start, chars) = consume("var\r\n  x\n".as_bytes(), "lines.snl");
        let chars: Vec<_> = chars.collect::<Result<_, _>>().unwrap();

        assert_eq!(chars.len(), 3 + 1 + 3 + 1);
        assert_eq!(start.source().name(), "lines.snl");
        start.source().with_line(1, |line| assert_eq!(line, "var"));
        start.source().with_line(2, |line| assert_eq!(line, "  x"));
        start.source().with_line(7, |line| assert_eq!(line, ""));

        // Cada carácter lleva la posición del siguiente
        let (c, after) = &chars[4];
        assert_eq!(*c, ' ');
        assert_eq!(after.start().line(), 2);
        assert_eq!(after.start().column(), 2);
    }

    #[test]
    fn ranges() {
        let (start, chars) = consume("abc".as_bytes(), "range.snl");
        let chars: Vec<_> = chars.collect::<Result<_, _>>().unwrap();

        assert_eq!(start.to_string(), "range.snl:1:1");

        // `b` está en la ubicación que acompaña a `a`
        let ab = Location::span(start, &chars[0].1);
        assert_eq!(ab.to_string(), "range.snl:[1:1-1:2]");
    }
}
