//! Simulador del subconjunto MIPS32 que emite `snlc`.
//!
//! # Propósito
//! Los programas compilados no se ensamblan ni se enlazan: el compilador
//! produce texto para SPIM o MARS. Esta biblioteca carga ese mismo texto y
//! lo ejecuta directamente, lo cual permite probar el compilador de punta
//! a punta sin herramientas externas.
//!
//! # Modelo
//! El simulador mantiene 32 registros de propósito general, `HI`/`LO` y una
//! memoria dispersa direccionable por byte, en little-endian. Las
//! instrucciones viven fuera de la memoria de datos; las direcciones de
//! código existen solo para `jal` y `jr`. Se reconocen las llamadas al
//! sistema de SPIM para leer y escribir enteros, escribir cadenas y
//! caracteres, y terminar el programa. La entrada es una cola de enteros
//! y la salida se acumula en memoria.
//!
//! # Uso
//! ```
//! let program = runtime::Program::parse("main:\n li $a0, 42\n li $v0, 1\n syscall\n li $v0, 10\n syscall\n")?;
//! let exit = runtime::Machine::new(&program).run()?;
//! assert_eq!(exit.output, "42");
//! # Ok::<(), runtime::Error>(())
//! ```

use thiserror::Error;

mod machine;
mod program;

pub use machine::{ExecError, Exit, Machine};
pub use program::{LoadError, Program};

/// Cualquier falla al cargar o ejecutar un programa.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Carga y ejecuta un programa con la entrada indicada.
pub fn run<I: IntoIterator<Item = i32>>(source: &str, input: I) -> Result<Exit, Error> {
    let program = Program::parse(source)?;
    let exit = Machine::new(&program).input(input).run()?;

    Ok(exit)
}
