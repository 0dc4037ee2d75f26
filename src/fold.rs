//! Plegado de constantes sobre el flujo de cuádruplos.
//!
//! Es una única pasada hacia adelante que recuerda qué nombres y
//! temporales tienen valor constante conocido. El conocimiento nunca
//! cruza un límite de control: todo marcador estructural, etiqueta,
//! salto o llamada lo descarta por completo.

use std::{
    collections::{HashMap, HashSet},
    rc::Rc,
};

use thiserror::Error;
use tracing::{debug, warn};

use crate::ir::{Operand, Operator, Passing, Quadruple, Temp};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FoldWarning {
    #[error("Division by zero in quadruple {index} `{quad}`, left for run time")]
    DivisionByZero { index: usize, quad: Quadruple },
}

/// Resultado del plegado.
pub struct Folded {
    pub quads: Vec<Quadruple>,
    pub warnings: Vec<FoldWarning>,
}

/// Pliega constantes en un flujo de cuádruplos.
///
/// Aplicar la pasada sobre su propia salida no produce cambios.
pub fn fold(quads: &[Quadruple]) -> Folded {
    let mut folder = Folder::default();
    for (index, quad) in quads.iter().enumerate() {
        folder.quad(index, quad);
    }

    debug!(before = quads.len(), after = folder.output.len(), "constants folded");

    Folded {
        quads: folder.output,
        warnings: folder.warnings,
    }
}

#[derive(Default)]
struct Folder {
    known: HashMap<Operand, i32>,

    // Temporales cuya definición se eliminó y que aún no se han leído
    dropped: HashMap<Temp, i32>,

    references: HashSet<Rc<str>>,
    output: Vec<Quadruple>,
    warnings: Vec<FoldWarning>,
}

impl Folder {
    fn quad(&mut self, index: usize, quad: &Quadruple) {
        let operator = quad.operator;
        match operator {
            _ if operator.is_marker() => {
                self.materialize(quad);
                self.known.clear();
                self.output.push(quad.clone());
            }

            Operator::Label | Operator::Go | Operator::Call => {
                self.known.clear();
                self.output.push(quad.clone());
            }

            Operator::Get(Passing::Reference) => {
                if let Some(name) = quad.result.as_name() {
                    self.references.insert(Rc::clone(name));
                }

                self.output.push(quad.clone());
            }

            _ if operator.is_arithmetic() => self.arithmetic(index, quad),

            Operator::Assign => match self.constant(&quad.arg1) {
                Some(value) => self.define(&quad.result, value),
                None => self.keep(quad),
            },

            _ => self.keep(quad),
        }
    }

    fn arithmetic(&mut self, index: usize, quad: &Quadruple) {
        if quad.operator == Operator::Div && self.constant(&quad.arg2) == Some(0) {
            let warning = FoldWarning::DivisionByZero {
                index,
                quad: quad.clone(),
            };

            warn!("{}", warning);
            self.warnings.push(warning);

            return self.keep(quad);
        }

        let (lhs, rhs) = match (self.constant(&quad.arg1), self.constant(&quad.arg2)) {
            (Some(lhs), Some(rhs)) => (lhs, rhs),
            _ => return self.keep(quad),
        };

        let value = match quad.operator {
            Operator::Add => lhs.wrapping_add(rhs),
            Operator::Sub => lhs.wrapping_sub(rhs),
            Operator::Mul => lhs.wrapping_mul(rhs),
            _ => lhs.wrapping_div(rhs),
        };

        self.define(&quad.result, value);
    }

    /// Registra un destino con valor conocido.
    ///
    /// Un temporal desaparece del flujo; un nombre recibe un `:=` directo.
    fn define(&mut self, destination: &Operand, value: i32) {
        match destination {
            Operand::Temp(temp) => {
                self.dropped.insert(*temp, value);
                self.known.insert(destination.clone(), value);
            }

            _ => {
                let quad = Quadruple::new(
                    Operator::Assign,
                    Operand::Int(value),
                    Operand::None,
                    destination.clone(),
                );

                self.keep(&quad);
                if !self.is_reference(destination) {
                    self.known.insert(destination.clone(), value);
                }
            }
        }
    }

    /// Conserva un cuádruplo e invalida lo que este escribe.
    fn keep(&mut self, quad: &Quadruple) {
        self.materialize(quad);

        let writes = match quad.operator {
            Operator::Store
            | Operator::Output
            | Operator::Param(_)
            | Operator::Declare
            | Operator::Get(_) => None,

            _ => Some(&quad.result),
        };

        if let Some(destination) = writes {
            if self.is_reference(destination) {
                // Una referencia puede ser alias de cualquier nombre
                self.known
                    .retain(|operand, _| !matches!(operand, Operand::Name(_)));
            } else {
                self.known.remove(destination);
            }
        }

        self.output.push(quad.clone());
    }

    /// Reconstruye los temporales eliminados que este cuádruplo lee.
    fn materialize(&mut self, quad: &Quadruple) {
        for operand in [&quad.arg1, &quad.arg2] {
            let temp = match operand {
                Operand::Temp(temp) => *temp,
                _ => continue,
            };

            if let Some(value) = self.dropped.remove(&temp) {
                self.output.push(Quadruple::new(
                    Operator::Assign,
                    Operand::Int(value),
                    Operand::None,
                    Operand::Temp(temp),
                ));
            }
        }
    }

    fn constant(&self, operand: &Operand) -> Option<i32> {
        match operand {
            Operand::Int(value) => Some(*value),
            Operand::Name(_) | Operand::Temp(_) => self.known.get(operand).copied(),
            _ => None,
        }
    }

    fn is_reference(&self, operand: &Operand) -> bool {
        match operand {
            Operand::Name(name) => self.references.contains(name),
            _ => false,
        }
    }
}
