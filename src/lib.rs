//! Compilador para SNL (Small Nested Language).
//!
//! # Front end
//! Un programa SNL ocupa un solo archivo. [`lex`] lo reduce a tokens con
//! ubicación y [`parse`] los organiza en un AST por descenso recursivo.
//! [`semantic`] recorre ese árbol una vez, verifica alcances y tipos, y
//! en el mismo recorrido emite los cuádruplos descritos en [`ir`]. Los
//! errores de estas fases se muestran con extractos del código fuente por
//! medio de [`error`].
//!
//! # Optimización
//! [`fold`] pliega constantes sobre el flujo de cuádruplos. La pasada es
//! opcional y su salida es a su vez un flujo válido.
//!
//! # Back end
//! En [`codegen`] el compilador deja de ser agnóstico al sistema objetivo.
//! Ahí se asignan registros y marcos de pila, y se emite un listado de
//! ensamblador MIPS32 para SPIM o MARS. Los tipos de ese listado se
//! reexportan en [`target`]. El crate `runtime` de este mismo workspace
//! ejecuta dicho listado sin herramientas externas.

#[macro_use]
mod macros;

pub mod codegen;
pub mod error;
pub mod fold;
pub mod ir;
pub mod lex;
pub mod parse;
pub mod semantic;
pub mod source;

mod arch;

/// Listados de ensamblador.
///
/// Este módulo reexporta los ítems de la arquitectura objetivo necesarios
/// para inspeccionar un listado sin depender de su representación interna.
pub mod target {
    pub use crate::arch::{Line, Reg, Target};
}
