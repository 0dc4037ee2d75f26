//! Expresiones y accesos a variables.

use super::{
    scope::Category,
    types::{Scalar, Type},
    Context, SemanticError,
};
use crate::{
    ir::{Operand, Operator, Temp},
    parse::{Accessor, BinOp, Expr, Variable},
    source::Located,
};

/// Ubicación de almacenamiento resuelta a partir de un acceso.
pub(super) enum Place {
    /// Variable con nombre, se accede directamente.
    Direct(Operand),

    /// Dirección calculada en un temporal.
    Indirect(Temp),
}

impl Place {
    pub fn operand(&self) -> Operand {
        match self {
            Place::Direct(name) => name.clone(),
            Place::Indirect(address) => Operand::Temp(*address),
        }
    }
}

impl Context {
    /// Evalúa una expresión, emitiendo su cálculo.
    pub(super) fn eval(&mut self, expr: &Located<Expr>) -> (Operand, Option<Type>) {
        match expr.as_ref() {
            Expr::Integer(integer) => (Operand::Int(*integer), Some(Type::INTEGER)),
            Expr::Char(c) => (Operand::Int(*c as i32), Some(Type::CHAR)),
            Expr::Var(var) => self.value(var),

            Expr::Binary(lhs, op, rhs) => {
                let (lhs_value, lhs_type) = self.eval(lhs);
                let (rhs_value, rhs_type) = self.eval(rhs);

                let (operator, comparison) = match op {
                    BinOp::Add => (Operator::Add, false),
                    BinOp::Sub => (Operator::Sub, false),
                    BinOp::Mul => (Operator::Mul, false),
                    BinOp::Div => (Operator::Div, false),
                    BinOp::Less => (Operator::Less, true),
                    BinOp::Equal => (Operator::Equal, true),
                };

                let operand_type = self.check_operands((lhs, lhs_type), (rhs, rhs_type));
                let result_type = if comparison {
                    Some(Type::BOOLEAN)
                } else {
                    operand_type
                };

                let result = self.temp();
                self.emit(operator, lhs_value, rhs_value, Operand::Temp(result));

                (Operand::Temp(result), result_type)
            }
        }
    }

    /// Lee el valor de una variable, desreferenciando direcciones calculadas.
    pub(super) fn value(&mut self, var: &Variable) -> (Operand, Option<Type>) {
        match self.place(var) {
            (Place::Direct(name), of) => (name, of),

            (Place::Indirect(address), of) => {
                let loaded = self.temp();
                self.emit(
                    Operator::Load,
                    Operand::Temp(address),
                    Operand::None,
                    Operand::Temp(loaded),
                );

                (Operand::Temp(loaded), of)
            }
        }
    }

    /// Resuelve la ubicación de una variable a través de índices y campos.
    ///
    /// Los desplazamientos emitidos se expresan en unidades; el
    /// generador de código los escala al tamaño de palabra.
    pub(super) fn place(&mut self, var: &Variable) -> (Place, Option<Type>) {
        let name = &var.name;
        let mut place = Place::Direct(Operand::Name(name.as_ref().name()));

        let mut of = match self.scopes.lookup(name.as_ref().as_ref()).cloned() {
            Some(symbol) if symbol.category == Category::Procedure => {
                self.error(SemanticError::ExpectedVar(name.as_ref().clone()), name);
                None
            }

            Some(symbol) => Some(symbol.of),
            None => {
                self.error(SemanticError::Undefined(name.as_ref().clone()), name);
                None
            }
        };

        for accessor in &var.path {
            let aggregate = match of.take() {
                Some(aggregate) => aggregate,
                None => break,
            };

            match (accessor.as_ref(), aggregate) {
                (Accessor::Index(index), Type::Array(array)) => {
                    let (index_value, index_type) = self.eval(index);
                    match index_type {
                        Some(Type::Scalar(Scalar::Integer)) | None => (),
                        Some(other) => {
                            self.error(SemanticError::ExpectedType(Type::INTEGER, other), index)
                        }
                    }

                    // Los índices se rebasan a cero cuando el límite inferior no lo es
                    let index_value = match array.low {
                        0 => index_value,
                        low => {
                            let rebased = self.temp();
                            self.emit(
                                Operator::Sub,
                                index_value,
                                Operand::Int(low),
                                Operand::Temp(rebased),
                            );

                            Operand::Temp(rebased)
                        }
                    };

                    let size = self.temp();
                    let element_size = array.of.size() as i32;
                    self.emit(
                        Operator::Assign,
                        Operand::Int(element_size),
                        Operand::None,
                        Operand::Temp(size),
                    );

                    let offset = self.temp();
                    self.emit(
                        Operator::Mul,
                        index_value,
                        Operand::Temp(size),
                        Operand::Temp(offset),
                    );

                    let address = self.temp();
                    self.emit(
                        Operator::Address,
                        place.operand(),
                        Operand::Temp(offset),
                        Operand::Temp(address),
                    );

                    place = Place::Indirect(address);
                    of = Some(array.of.clone());
                }

                (Accessor::Field(field), Type::Record(record)) => {
                    match record.fields.get(field.as_ref().as_ref()) {
                        Some(found) => {
                            let address = self.temp();
                            self.emit(
                                Operator::Address,
                                place.operand(),
                                Operand::Int(found.offset as i32),
                                Operand::Temp(address),
                            );

                            place = Place::Indirect(address);
                            of = Some(found.of.clone());
                        }

                        None => {
                            self.error(SemanticError::NoSuchField(field.as_ref().clone()), field)
                        }
                    }
                }

                (Accessor::Index(_), other) => {
                    self.error(SemanticError::NotAnArray(other), accessor)
                }

                (Accessor::Field(_), other) => {
                    self.error(SemanticError::NotARecord(other), accessor)
                }
            }
        }

        (place, of)
    }

    /// Verifica los operandos de un operador binario.
    ///
    /// Ambos deben ser `integer` o `char` y coincidir entre sí.
    fn check_operands(
        &mut self,
        (lhs, lhs_type): (&Located<Expr>, Option<Type>),
        (rhs, rhs_type): (&Located<Expr>, Option<Type>),
    ) -> Option<Type> {
        let lhs_type = self.arithmetic(lhs, lhs_type);
        let rhs_type = self.arithmetic(rhs, rhs_type);

        match (lhs_type, rhs_type) {
            (Some(lhs_type), Some(rhs_type)) if lhs_type != rhs_type => {
                self.error(SemanticError::ExpectedType(lhs_type.clone(), rhs_type), rhs);
                Some(lhs_type)
            }

            (Some(known), _) | (None, Some(known)) => Some(known),
            (None, None) => None,
        }
    }

    fn arithmetic(&mut self, expr: &Located<Expr>, of: Option<Type>) -> Option<Type> {
        match of {
            Some(of) if of.is_arithmetic() => Some(of),
            Some(of) => {
                self.error(SemanticError::ExpectedScalar(of), expr);
                None
            }

            None => None,
        }
    }
}
