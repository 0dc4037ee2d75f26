//! Descriptores de tipo.

use indexmap::IndexMap;
use std::{
    fmt::{self, Display},
    rc::Rc,
};

use crate::parse::Passing;

/// Ningún tipo ni alcance puede ocupar más unidades que esta cota, de
/// modo que todo tamaño y desplazamiento cabe en un operando entero.
pub const MAX_SIZE: u32 = i32::MAX as u32;

/// Tipos escalares. `boolean` no es declarable, solo lo producen
/// las comparaciones.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Scalar {
    Integer,
    Char,
    Boolean,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    Scalar(Scalar),
    Array(Rc<ArrayType>),
    Record(Rc<RecordType>),
    Procedure(Rc<ProcType>),
}

#[derive(Debug, PartialEq)]
pub struct ArrayType {
    pub low: i32,
    pub high: i32,
    pub of: Type,
}

#[derive(Debug, PartialEq)]
pub struct RecordType {
    pub fields: IndexMap<Rc<str>, Field>,
}

#[derive(Debug, PartialEq)]
pub struct Field {
    pub of: Type,
    pub offset: u32,
}

/// Firma de un procedimiento.
///
/// Un parámetro cuyo tipo no pudo resolverse se registra como `None`
/// para conservar la aridad sin provocar errores en cascada.
#[derive(Debug, PartialEq)]
pub struct ProcType {
    pub params: Vec<(Option<Type>, Passing)>,
    pub symbol: Rc<str>,
}

impl Type {
    pub const INTEGER: Type = Type::Scalar(Scalar::Integer);
    pub const CHAR: Type = Type::Scalar(Scalar::Char);
    pub const BOOLEAN: Type = Type::Scalar(Scalar::Boolean);

    /// Tamaño en unidades abstractas.
    pub fn size(&self) -> u32 {
        match self {
            Type::Scalar(_) => 1,
            Type::Array(array) => array.len() * array.of.size(),
            Type::Record(record) => record.fields.values().map(|field| field.of.size()).sum(),
            Type::Procedure(_) => 0,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Type::Scalar(_))
    }

    /// Escalares sobre los cuales opera la aritmética.
    pub fn is_arithmetic(&self) -> bool {
        matches!(self, Type::Scalar(Scalar::Integer | Scalar::Char))
    }
}

impl ArrayType {
    /// Cantidad de elementos.
    pub fn len(&self) -> u32 {
        (i64::from(self.high) - i64::from(self.low) + 1) as u32
    }
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Scalar(Scalar::Integer) => fmt.write_str("integer"),
            Type::Scalar(Scalar::Char) => fmt.write_str("char"),
            Type::Scalar(Scalar::Boolean) => fmt.write_str("boolean"),
            Type::Array(array) => write!(fmt, "array [{}..{}] of {}", array.low, array.high, array.of),
            Type::Record(record) => {
                fmt.write_str("record")?;
                for (name, field) in &record.fields {
                    write!(fmt, " {} {};", field.of, name)?;
                }

                fmt.write_str(" end")
            }

            Type::Procedure(procedure) => write!(fmt, "procedure `{}`", procedure.symbol),
        }
    }
}
