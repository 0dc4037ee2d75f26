//! Detalles específicos de la arquitectura objetivo.
//!
//! El generador en [`crate::codegen`] es agnóstico a la sintaxis concreta
//! del ensamblador. Este módulo expone los registros, constantes de ABI y
//! el listado de líneas que se escribe como texto al final.

use std::fmt::Display;

mod mips;

pub use mips::{Line, Reg, Syscall, Target, FRAME_OVERHEAD, WORD_SIZE};

/// Registro de procesador.
pub trait Register: Copy + Eq + Display + 'static {
    /// Registros que el asignador puede repartir libremente.
    const FILE: &'static [Self];
}
