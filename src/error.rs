//! Presentación de errores ubicados.
//!
//! Errores léxicos, sintácticos y semánticos se reportan con un extracto
//! del código fuente original, señalando con `^` el rango exacto en el
//! cual ocurrieron.

use crate::source::{Located, Location};
use std::{
    error::Error,
    fmt::{self, Debug, Display},
};

/// Colección de errores lista para mostrarse al usuario.
///
/// Los mensajes se producen al construirse, de modo que errores de fases
/// distintas pueden mezclarse en una misma colección.
#[derive(Default)]
pub struct Diagnostics {
    entries: Vec<Entry>,
}

struct Entry {
    message: String,
    location: Location,
}

impl Diagnostics {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E: Error> From<Located<E>> for Diagnostics {
    fn from(error: Located<E>) -> Self {
        std::iter::once(error).collect()
    }
}

impl<E: Error> From<Vec<Located<E>>> for Diagnostics {
    fn from(errors: Vec<Located<E>>) -> Self {
        errors.into_iter().collect()
    }
}

impl<E: Error> FromIterator<Located<E>> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Located<E>>>(errors: I) -> Self {
        let entries = errors
            .into_iter()
            .map(|error| {
                let (location, error) = error.split();
                Entry {
                    message: error.to_string(),
                    location,
                }
            })
            .collect();

        Diagnostics { entries }
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.entries.len();
        if count == 0 {
            return writeln!(fmt, "No errors were reported");
        }

        for Entry { message, location } in &self.entries {
            writeln!(fmt, "error: {}", message)?;
            excerpt(fmt, location)?;
            writeln!(fmt)?;
        }

        let noun = match count {
            1 => "error",
            _ => "errors",
        };

        writeln!(fmt, "Build failed with {} {}", count, noun)
    }
}

impl Debug for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, fmt)
    }
}

/// Muestra las líneas que abarca una ubicación y subraya su rango.
fn excerpt(fmt: &mut fmt::Formatter<'_>, location: &Location) -> fmt::Result {
    let (start, end) = (location.start(), location.end());
    let width = end.line().to_string().len();

    writeln!(fmt, " --> {}", location)?;
    writeln!(fmt, "{:width$} |", "", width = width)?;

    for number in start.line()..=end.line() {
        location
            .source()
            .with_line(number, |line| writeln!(fmt, "{:>width$} | {}", number, line, width = width))?;
    }

    // Un rango que termina en la columna 1 no debe desbordar
    let last = end.column().max(2) - 1;
    let (low, high) = (start.column().min(last), start.column().max(last));

    let marker = "^".repeat((high - low + 1) as usize);
    writeln!(
        fmt,
        "{:width$} | {:indent$}{}",
        "",
        "",
        marker,
        width = width,
        indent = (low - 1) as usize
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse, source};
    use pretty_assertions::assert_eq;

    #[test]
    fn excerpt_with_highlight() {
        let diagnostics =
            parse::from_reader("program p\nbegin\n  x := 1 <\nend.".as_bytes(), "bad.snl")
                .unwrap_err();

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics.to_string(),
            "error: Expected keyword `end`, found `<` instead\n \
             --> bad.snl:3:10\n  \
             |\n\
             3 |   x := 1 <\n  \
             |          ^\n\
             \n\
             Build failed with 1 error\n"
        );
    }

    #[test]
    fn lexer_errors_are_grouped() {
        let (start, chars) = source::consume("x # $\n".as_bytes(), "lex.snl");
        let errors = crate::lex::Lexer::new(start, chars)
            .try_exhaustive()
            .unwrap_err();

        let diagnostics = Diagnostics::from(errors);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics.to_string().ends_with("Build failed with 1 error\n"));
    }
}
