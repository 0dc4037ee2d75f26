//! MIPS32, en el dialecto que aceptan SPIM y MARS.

use std::fmt;

/// Tamaño de una unidad del IR, en bytes.
pub const WORD_SIZE: i32 = 4;

/// Palabras que ocupan `$ra` y `$fp` guardados entre dos marcos.
pub const FRAME_OVERHEAD: u32 = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reg {
    V0,
    V1,
    A0,
    A1,
    A2,
    A3,
    T0,
    T1,
    T2,
    T3,
    T4,
    T5,
    T6,
    T7,
    T8,
    T9,
    Sp,
    Fp,
    Ra,
}

impl Reg {
    /// Registros de argumentos, en el orden de la convención de llamada.
    pub const ARGUMENTS: [Reg; 4] = [Reg::A0, Reg::A1, Reg::A2, Reg::A3];
}

impl super::Register for Reg {
    const FILE: &'static [Reg] = &[
        Reg::T0,
        Reg::T1,
        Reg::T2,
        Reg::T3,
        Reg::T4,
        Reg::T5,
        Reg::T6,
        Reg::T7,
        Reg::T8,
        Reg::T9,
    ];
}

impl fmt::Display for Reg {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Reg::*;

        let name = match self {
            V0 => "$v0",
            V1 => "$v1",
            A0 => "$a0",
            A1 => "$a1",
            A2 => "$a2",
            A3 => "$a3",
            T0 => "$t0",
            T1 => "$t1",
            T2 => "$t2",
            T3 => "$t3",
            T4 => "$t4",
            T5 => "$t5",
            T6 => "$t6",
            T7 => "$t7",
            T8 => "$t8",
            T9 => "$t9",
            Sp => "$sp",
            Fp => "$fp",
            Ra => "$ra",
        };

        formatter.write_str(name)
    }
}

/// Servicios del sistema que usa el código generado, según `$v0`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Syscall {
    PrintInt = 1,
    PrintString = 4,
    ReadInt = 5,
    Exit = 10,
}

/// Destino de un salto.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// Aún no se conoce, debe resolverse antes de escribir el listado.
    Pending,
    Resolved(String),
}

/// Una línea del listado de ensamblador.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Line {
    Directive(String),
    Label(String),
    Instr(&'static str, String),
    Branch {
        opcode: &'static str,
        condition: Option<Reg>,
        target: Target,
    },
    Comment(String),
}

impl Line {
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Line::Branch {
                target: Target::Pending,
                ..
            }
        )
    }
}

impl fmt::Display for Line {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Directive(directive) => writeln!(fmt, "{}", directive),
            Line::Label(label) => writeln!(fmt, "{}:", label),
            Line::Comment(comment) => writeln!(fmt, "\t# {}", comment),

            Line::Instr(opcode, operands) if operands.is_empty() => emit!(fmt, opcode),
            Line::Instr(opcode, operands) => emit!(fmt, opcode, "{}", operands),

            Line::Branch {
                opcode,
                condition,
                target: Target::Resolved(label),
            } => match condition {
                Some(reg) => emit!(fmt, opcode, "{}, {}", reg, label),
                None => emit!(fmt, opcode, "{}", label),
            },

            // Un salto sin resolver no tiene representación válida
            Line::Branch { .. } => Err(fmt::Error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fmt::Write;

    fn text(line: &Line) -> String {
        let mut output = String::new();
        write!(output, "{}", line).unwrap();
        output
    }

    #[test]
    fn line_layout() {
        assert_eq!(text(&Line::Label(String::from("main"))), "main:\n");
        assert_eq!(text(&Line::Instr("syscall", String::new())), "\tsyscall\n");
        assert_eq!(
            text(&Line::Instr("addiu", format!("{}, {}, -8", Reg::Sp, Reg::Sp))),
            "\taddiu   $sp, $sp, -8\n"
        );

        let branch = Line::Branch {
            opcode: "beqz",
            condition: Some(Reg::T3),
            target: Target::Resolved(String::from("label0")),
        };

        assert_eq!(text(&branch), "\tbeqz    $t3, label0\n");
    }

    #[test]
    fn pending_branches_are_rejected() {
        let branch = Line::Branch {
            opcode: "j",
            condition: None,
            target: Target::Pending,
        };

        assert!(branch.is_pending());
        assert!(write!(String::new(), "{}", branch).is_err());
    }
}
