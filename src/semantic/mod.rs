//! Análisis semántico y emisión de IR.
//!
//! El análisis recorre el AST una única vez. Mientras verifica reglas de
//! alcance y de tipos emite el flujo de cuádruplos que consumen las fases
//! posteriores. Los errores no detienen el recorrido: se acumulan junto a
//! su ubicación y el análisis continúa con el mejor tipo disponible, de
//! forma que una sola ejecución reporte todo lo posible. Un tipo que no
//! pudo determinarse se representa como `None` y suprime errores en
//! cascada.
//!
//! # Disposición del IR
//! - Cada variable declarada produce `DECLARE(desplazamiento, tamaño, nombre)`.
//! - Cada procedimiento queda entre `PROCEDURE` y `ENDPROCEDURE`, con un
//!   `get` por parámetro formal inmediatamente después de `PROCEDURE`.
//! - Si una parte declarativa incluye procedimientos, un `Go` salta por
//!   encima de sus cuerpos hasta un `label` colocado justo antes del cuerpo
//!   de quien los declara.

use std::{collections::HashMap, rc::Rc};
use thiserror::Error;
use tracing::trace;

use crate::{
    ir::{Label, Operand, Operator, Quadruple, Temp},
    lex::Identifier,
    parse::{self, DeclarePart, Passing, ProcDec, TypeName},
    source::Located,
};

mod expr;
mod stmt;

pub mod scope;
pub mod types;

use scope::{Category, ScopeTree};
use types::{ArrayType, Field, ProcType, RecordType, Type, MAX_SIZE};

pub type Semantic<T> = Result<T, Located<SemanticError>>;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SemanticError {
    #[error("Symbol `{0}` is already defined in this scope")]
    Duplicate(Identifier),

    #[error("Type `{0}` is already defined in this scope")]
    DuplicateType(Identifier),

    #[error("Field `{0}` appears more than once in this record")]
    DuplicateField(Identifier),

    #[error("Symbol `{0}` is undefined")]
    Undefined(Identifier),

    #[error("Type `{0}` is undefined")]
    UndefinedType(Identifier),

    #[error("Invalid array bounds: upper bound {1} is less than lower bound {0}")]
    BadBounds(i32, i32),

    #[error("Storage of {0} units exceeds the limit of {} units", MAX_SIZE)]
    TooLarge(u64),

    #[error("Type mismatch: expected `{0}`, found `{1}`")]
    ExpectedType(Type, Type),

    #[error("Expected `integer` or `char`, found `{0}`")]
    ExpectedScalar(Type),

    #[error("Conditions must be comparisons, found `{0}`")]
    ExpectedBoolean(Type),

    #[error("Expected variable, found procedure `{0}`")]
    ExpectedVar(Identifier),

    #[error("`{0}` is not a procedure")]
    ExpectedProcedure(Identifier),

    #[error("Cannot index into a value of type `{0}`")]
    NotAnArray(Type),

    #[error("Type `{0}` has no fields")]
    NotARecord(Type),

    #[error("No field named `{0}`")]
    NoSuchField(Identifier),

    #[error("Procedure `{0}` expects {1} arguments, found {2}")]
    ArgumentCount(Identifier, usize, usize),

    #[error("Parameter `{0}` has aggregate type and must be passed by reference")]
    AggregateByValue(Identifier),

    #[error("Arguments for reference parameters must be variables")]
    ExpectedReference,

    #[error("Cannot assign values of aggregate type `{0}`")]
    AggregateAssignment(Type),
}

/// Resultado del análisis de un programa.
pub struct Analysis {
    pub quads: Vec<Quadruple>,
    pub errors: Vec<Located<SemanticError>>,
    pub scopes: ScopeTree,
}

impl Analysis {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errores en forma de texto, en el orden en que se encontraron.
    pub fn messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|error| format!("{}: {}", error.location(), error.as_ref()))
            .collect()
    }
}

impl parse::Program {
    /// Analiza el programa completo y emite su IR.
    pub fn analyze(&self) -> Analysis {
        let mut context = Context {
            scopes: ScopeTree::new(self.name.as_ref().as_ref()),
            quads: Vec::new(),
            errors: Vec::new(),
            next_temp: 0,
            next_label: 0,
            symbols: HashMap::new(),
        };

        context.declarations(&self.declarations);
        context.statements(&self.body);

        Analysis {
            quads: context.quads,
            errors: context.errors,
            scopes: context.scopes,
        }
    }
}

/// Estado del análisis, explícito en lugar de global.
struct Context {
    scopes: ScopeTree,
    quads: Vec<Quadruple>,
    errors: Vec<Located<SemanticError>>,
    next_temp: u32,
    next_label: u32,
    symbols: HashMap<Rc<str>, u32>,
}

impl Context {
    fn declarations(&mut self, part: &DeclarePart) {
        for alias in &part.types {
            if let Some(of) = self.resolve(&alias.of) {
                if let Err(error) = self.scopes.define_type(alias.name.as_ref(), of) {
                    self.error(error, &alias.name);
                }
            }
        }

        for var in &part.vars {
            let of = match self.resolve(&var.of) {
                Some(of) => of,
                None => continue,
            };

            for name in &var.names {
                match self.scopes.declare(name.as_ref(), of.clone(), Category::Variable) {
                    Ok(declared) => self.emit(
                        Operator::Declare,
                        Operand::Int(declared.offset as i32),
                        Operand::Int(declared.size as i32),
                        Operand::Name(declared.name),
                    ),

                    Err(error) => self.error(error, name),
                }
            }
        }

        if !part.procedures.is_empty() {
            let skip = self.label();
            self.emit(Operator::Go, Operand::Label(skip), Operand::None, Operand::None);

            for procedure in &part.procedures {
                self.procedure(procedure);
            }

            self.emit(Operator::Label, Operand::Label(skip), Operand::None, Operand::None);
        }
    }

    fn procedure(&mut self, procedure: &ProcDec) {
        let name = procedure.name.as_ref();
        let symbol = self.symbol_for(name);

        let header = self.quads.len();
        self.emit(
            Operator::Procedure,
            Operand::Name(Rc::clone(&symbol)),
            Operand::None,
            Operand::None,
        );

        let parent = self.scopes.current();
        self.scopes.enter(name.as_ref());

        let mut params = Vec::new();
        for group in &procedure.params {
            let of = self.resolve(&group.of);
            for param in &group.names {
                params.push((of.clone(), group.passing));

                let of = match &of {
                    Some(of) => of.clone(),
                    None => continue,
                };

                if group.passing == Passing::Value && !of.is_scalar() {
                    self.error(SemanticError::AggregateByValue(param.as_ref().clone()), param);
                }

                let category = Category::Param(group.passing);
                match self.scopes.declare(param.as_ref(), of, category) {
                    Ok(declared) => self.emit(
                        Operator::Get(group.passing),
                        Operand::Int(declared.offset as i32),
                        Operand::Int(declared.size as i32),
                        Operand::Name(declared.name),
                    ),

                    Err(error) => self.error(error, param),
                }
            }
        }

        self.quads[header].result = Operand::Int(params.len() as i32);

        // Se registra en el alcance padre antes del cuerpo para permitir recursión
        let signature = Type::Procedure(Rc::new(ProcType { params, symbol }));
        if let Err(error) = self
            .scopes
            .declare_in(parent, name, signature, Category::Procedure)
        {
            self.error(error, &procedure.name);
        }

        self.declarations(&procedure.declarations);
        self.statements(&procedure.body);

        self.scopes.exit();
        self.emit_marker(Operator::EndProcedure);
    }

    /// Determina un símbolo de ensamblador único para un procedimiento.
    ///
    /// Procedimientos homónimos en alcances distintos reciben un sufijo.
    fn symbol_for(&mut self, name: &Identifier) -> Rc<str> {
        let seen = self.symbols.entry(name.name()).or_insert(0);
        *seen += 1;

        match *seen {
            1 => name.name(),
            n => Rc::from(format!("{}.{}", name, n - 1)),
        }
    }

    /// Resuelve una referencia sintáctica a tipo.
    fn resolve(&mut self, name: &Located<TypeName>) -> Option<Type> {
        match name.as_ref() {
            TypeName::Integer => Some(Type::INTEGER),
            TypeName::Char => Some(Type::CHAR),

            TypeName::Array { low, high, of } => {
                let (low, high) = (*low.as_ref(), *high.as_ref());
                if high < low {
                    self.error(SemanticError::BadBounds(low, high), name);
                    return None;
                }

                let of = self.resolve(of)?;
                let len = (i64::from(high) - i64::from(low) + 1) as u64;
                let units = len * u64::from(of.size());
                if units > u64::from(MAX_SIZE) {
                    self.error(SemanticError::TooLarge(units), name);
                    return None;
                }

                Some(Type::Array(Rc::new(ArrayType { low, high, of })))
            }

            TypeName::Record(decs) => {
                let mut record = RecordType {
                    fields: Default::default(),
                };

                let mut offset: u32 = 0;
                for dec in decs {
                    let of = match self.resolve(&dec.of) {
                        Some(of) => of,
                        None => continue,
                    };

                    for field in &dec.names {
                        if record.fields.contains_key(field.as_ref().as_ref()) {
                            self.error(SemanticError::DuplicateField(field.as_ref().clone()), field);
                            continue;
                        }

                        let size = of.size();
                        let end = u64::from(offset) + u64::from(size);
                        if end > u64::from(MAX_SIZE) {
                            self.error(SemanticError::TooLarge(end), field);
                            return None;
                        }

                        let of = of.clone();
                        record.fields.insert(field.as_ref().name(), Field { of, offset });

                        offset += size;
                    }
                }

                Some(Type::Record(Rc::new(record)))
            }

            TypeName::Alias(alias) => match self.scopes.resolve_type(alias.as_ref()) {
                Some(of) => Some(of.clone()),
                None => {
                    self.error(SemanticError::UndefinedType(alias.clone()), name);
                    None
                }
            },
        }
    }

    fn emit(&mut self, operator: Operator, arg1: Operand, arg2: Operand, result: Operand) {
        let quad = Quadruple::new(operator, arg1, arg2, result);
        trace!(%quad, "emit");

        self.quads.push(quad);
    }

    fn emit_marker(&mut self, operator: Operator) {
        self.emit(operator, Operand::None, Operand::None, Operand::None);
    }

    fn temp(&mut self) -> Temp {
        self.next_temp += 1;
        Temp(self.next_temp)
    }

    fn label(&mut self) -> Label {
        self.next_label += 1;
        Label(self.next_label)
    }

    fn error<T>(&mut self, error: SemanticError, at: &Located<T>) {
        self.errors.push(Located::at(error, at.location().clone()));
    }
}

#[cfg(test)]
mod tests;
