//! Marcos de pila reconstruidos a partir de `DECLARE` y `get`.
//!
//! El generador nunca ve la tabla de alcances. La forma de cada marco se
//! deriva de los cuádruplos de declaración que siguen inmediatamente a
//! `PROCEDURE` (o que abren el programa, para el marco global).
//!
//! # Limitación
//! Un nombre que no pertenece al marco actual se busca en los marcos
//! léxicamente envolventes, sumando el tamaño de cada marco saltado más
//! [`FRAME_OVERHEAD`]. Esto supone que la profundidad de la cadena de
//! llamadas activa coincide con la profundidad léxica, lo cual solo se
//! cumple si cada procedimiento es invocado desde quien lo declara.
//! Recursión y llamadas entre hermanos que acceden a nombres no locales
//! calculan direcciones incorrectas.

use std::{collections::HashMap, iter, rc::Rc};

use super::CodegenError;
use crate::{
    arch::{FRAME_OVERHEAD, WORD_SIZE},
    ir::{Operand, Operator, Passing, Quadruple},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Slot {
    /// Desplazamiento desde la base del marco, en palabras.
    pub offset: u32,

    /// El espacio guarda la dirección de la variable y no su valor.
    pub reference: bool,
}

/// Ubicación de una variable relativa a `$sp`, en bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Home {
    Direct(i32),

    /// El valor está en la dirección guardada en este desplazamiento.
    Indirect(i32),
}

#[derive(Default, Debug)]
pub struct Frame {
    slots: HashMap<Rc<str>, Slot>,
    params: Vec<Slot>,
    size: u32,
}

impl Frame {
    /// Recorre los `DECLARE` y `get` al inicio de `quads`.
    ///
    /// Retorna el marco y la cantidad de cuádruplos consumidos. `first`
    /// es el índice absoluto de `quads[0]`, usado solo para reportar errores.
    pub fn scan(quads: &[Quadruple], first: usize) -> Result<(Frame, usize), CodegenError> {
        let mut frame = Frame::default();

        let mut consumed = 0;
        for quad in quads {
            let reference = match quad.operator {
                Operator::Declare | Operator::Get(Passing::Value) => false,
                Operator::Get(Passing::Reference) => true,
                _ => break,
            };

            let (offset, size, name) = match (&quad.arg1, &quad.arg2, &quad.result) {
                (Operand::Int(offset), Operand::Int(size), Operand::Name(name))
                    if *offset >= 0 && *size >= 0 =>
                {
                    (*offset as u32, *size as u32, name)
                }

                _ => {
                    return Err(CodegenError::BadOperands {
                        index: first + consumed,
                        quad: quad.clone(),
                    })
                }
            };

            let slot = Slot { offset, reference };
            if let Operator::Get(_) = quad.operator {
                frame.params.push(slot);
            }

            let end = u64::from(offset) + u64::from(size);
            bytes(end)?;

            frame.slots.insert(Rc::clone(name), slot);
            frame.size = frame.size.max(end as u32);

            consumed += 1;
        }

        Ok((frame, consumed))
    }

    /// Tamaño total en palabras.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Parámetros formales, en el orden de la convención de llamada.
    pub fn params(&self) -> &[Slot] {
        &self.params
    }

    pub fn slot(&self, name: &str) -> Option<Slot> {
        self.slots.get(name).copied()
    }
}

/// Marco actual junto a la pila de marcos ancestros.
pub struct Frames {
    current: Frame,
    ancestors: Vec<Frame>,
}

impl Frames {
    pub fn new(global: Frame) -> Self {
        Frames {
            current: global,
            ancestors: Vec::new(),
        }
    }

    pub fn current(&self) -> &Frame {
        &self.current
    }

    /// Cantidad de procedimientos abiertos.
    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    pub fn enter(&mut self, frame: Frame) {
        let caller = std::mem::replace(&mut self.current, frame);
        self.ancestors.push(caller);
    }

    /// Restaura el marco de quien declaró al procedimiento que termina.
    pub fn exit(&mut self) -> bool {
        match self.ancestors.pop() {
            Some(caller) => {
                self.current = caller;
                true
            }

            None => false,
        }
    }

    /// Ubica una variable desde el marco actual hacia afuera.
    pub fn resolve(&self, name: &str) -> Result<Home, CodegenError> {
        let mut base = 0u64;

        let frames = iter::once(&self.current).chain(self.ancestors.iter().rev());
        for frame in frames {
            if let Some(slot) = frame.slot(name) {
                let bytes = bytes(base + u64::from(slot.offset))?;
                let home = if slot.reference {
                    Home::Indirect(bytes)
                } else {
                    Home::Direct(bytes)
                };

                return Ok(home);
            }

            base += u64::from(frame.size + FRAME_OVERHEAD);
        }

        Err(CodegenError::UndefinedSymbol(Rc::from(name)))
    }
}

/// Convierte palabras a un desplazamiento en bytes relativo a `$sp`.
pub fn bytes(words: u64) -> Result<i32, CodegenError> {
    words
        .checked_mul(WORD_SIZE as u64)
        .and_then(|bytes| i32::try_from(bytes).ok())
        .ok_or(CodegenError::FrameTooLarge(words))
}
