//! Representación intermedia.
//!
//! El IR es un flujo lineal de cuádruplos `(operador, arg1, arg2, resultado)`.
//! Algunos operadores son marcadores estructurales (`THEN`, `WHILE`,
//! `PROCEDURE`, ...) que delimitan regiones de control; el generador de
//! código los consume sin traducirlos directamente a una instrucción.
//! Los tamaños y desplazamientos que aparecen en el IR se expresan en
//! unidades abstractas, no en bytes.

use std::{
    fmt::{self, Display},
    rc::Rc,
};

pub use crate::parse::Passing;

/// Temporal generado por el compilador, de un solo uso.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Temp(pub u32);

impl Display for Temp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "t{}", self.0)
    }
}

/// Etiqueta de control de flujo a nivel de IR.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Label(pub u32);

impl Display for Label {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "L{}", self.0)
    }
}

/// Operando de un cuádruplo.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    None,
    Int(i32),
    Name(Rc<str>),
    Temp(Temp),
    Label(Label),
}

impl Operand {
    /// Construye un operando que nombra a una variable o procedimiento.
    pub fn name(name: &str) -> Self {
        Operand::Name(Rc::from(name))
    }

    /// Obtiene la constante, si lo es.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Operand::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Obtiene el nombre, si lo es.
    pub fn as_name(&self) -> Option<&Rc<str>> {
        match self {
            Operand::Name(name) => Some(name),
            _ => None,
        }
    }
}

impl Display for Operand {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => fmt.write_str("_"),
            Operand::Int(value) => write!(fmt, "{}", value),
            Operand::Name(name) => fmt.write_str(name),
            Operand::Temp(temp) => write!(fmt, "{}", temp),
            Operand::Label(label) => write!(fmt, "{}", label),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operator {
    /// `:=(valor, _, destino)`
    Assign,

    /// `:=:(valor, _, dirección)`, almacena a través de una dirección calculada.
    Store,

    Add,
    Sub,
    Mul,
    Div,
    Less,
    Equal,

    /// `[](base, desplazamiento, dirección)`
    Address,

    /// `load(dirección, _, destino)`
    Load,

    Then,
    Else,
    EndIf,
    While,
    Do,
    EndWhile,

    /// `IN(_, _, variable)`
    Input,

    /// `OUT(valor, _, _)`
    Output,

    /// `PROCEDURE(símbolo, _, parámetros)`
    Procedure,
    EndProcedure,

    /// `DECLARE(desplazamiento, tamaño, nombre)`
    Declare,

    /// `get(desplazamiento, tamaño, nombre)` para cada parámetro formal.
    Get(Passing),

    /// Argumento real de una llamada.
    Param(Passing),

    /// `call(símbolo, _, _)`
    Call,

    /// `label(L, _, _)`
    Label,

    /// `Go(L, _, _)`, salto incondicional.
    Go,
}

impl Operator {
    /// Determina si el operador es un marcador estructural.
    pub fn is_marker(self) -> bool {
        use Operator::*;
        matches!(
            self,
            Then | Else | EndIf | While | Do | EndWhile | Procedure | EndProcedure
        )
    }

    /// Operadores aritméticos que el plegado de constantes puede evaluar.
    pub fn is_arithmetic(self) -> bool {
        matches!(self, Operator::Add | Operator::Sub | Operator::Mul | Operator::Div)
    }
}

impl Display for Operator {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Operator::*;
        let string = match self {
            Assign                       => ":=",
            Store                        => ":=:",
            Add                          => "+",
            Sub                          => "-",
            Mul                          => "*",
            Div                          => "/",
            Less                         => "<",
            Equal                        => "=",
            Address                      => "[]",
            Load                         => "load",
            Then                         => "THEN",
            Else                         => "ELSE",
            EndIf                        => "ENDIF",
            While                        => "WHILE",
            Do                           => "DO",
            EndWhile                     => "ENDWHILE",
            Input                        => "IN",
            Output                       => "OUT",
            Procedure                    => "PROCEDURE",
            EndProcedure                 => "ENDPROCEDURE",
            Declare                      => "DECLARE",
            Get(Passing::Value)          => "get",
            Get(Passing::Reference)      => "get&",
            Param(Passing::Value)        => "param",
            Param(Passing::Reference)    => "param&",
            Call                         => "call",
            Label                        => "label",
            Go                           => "Go",
        };

        fmt.write_str(string)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quadruple {
    pub operator: Operator,
    pub arg1: Operand,
    pub arg2: Operand,
    pub result: Operand,
}

impl Quadruple {
    pub fn new(operator: Operator, arg1: Operand, arg2: Operand, result: Operand) -> Self {
        Quadruple {
            operator,
            arg1,
            arg2,
            result,
        }
    }

    /// Cuádruplo sin operandos, típico de marcadores.
    pub fn marker(operator: Operator) -> Self {
        Quadruple::new(operator, Operand::None, Operand::None, Operand::None)
    }
}

impl Display for Quadruple {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            fmt,
            "({}, {}, {}, {})",
            self.operator, self.arg1, self.arg2, self.result
        )
    }
}

/// Tabla de cuatro columnas para inspección de un flujo de cuádruplos.
pub struct Listing<'a>(pub &'a [Quadruple]);

impl Display for Listing<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, quad) in self.0.iter().enumerate() {
            writeln!(
                fmt,
                "{:>4}  {:<14}{:<10}{:<10}{}",
                index,
                quad.operator.to_string(),
                quad.arg1.to_string(),
                quad.arg2.to_string(),
                quad.result
            )?;
        }

        Ok(())
    }
}
