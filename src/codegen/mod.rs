//! Generación de código MIPS a partir de cuádruplos.
//!
//! El generador es una máquina de estados de una sola pasada sobre el
//! flujo de cuádruplos. Las instrucciones se acumulan en un listado en
//! memoria: los saltos cuyo destino todavía no existe se emiten con un
//! destino pendiente y se corrigen ("backpatching") cuando el marcador
//! estructural correspondiente aparece. Nada se escribe hasta que la
//! generación completa termina sin errores.
//!
//! Cada unidad del IR ocupa una palabra de [`WORD_SIZE`] bytes. Las
//! variables se direccionan relativas a `$sp`, ver [`frame`] para la
//! disposición de marcos y su limitación conocida.

use std::{
    collections::HashSet,
    fmt::{self, Display},
    rc::Rc,
};

use bitflags::bitflags;
use thiserror::Error;
use tracing::{debug, error, trace};

use crate::{
    arch::{Line, Reg, Syscall, Target, WORD_SIZE},
    ir::{Operand, Operator, Passing, Quadruple, Temp},
};

mod frame;
mod regs;

use frame::{Frame, Frames, Home};
use regs::Allocations;

bitflags! {
    /// Opciones de generación.
    pub struct Options: u32 {
        /// Precede las instrucciones de cada cuádruplo con un comentario
        /// que lo reproduce.
        const ANNOTATE = 0x01;
    }
}

/// Falla fatal de generación.
///
/// Todas indican un flujo de cuádruplos malformado, nunca un defecto del
/// programa fuente; ninguna produce ensamblador.
#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("`{operator}` at quadruple {index} has no pending branch to patch")]
    BackpatchUnderflow { index: usize, operator: Operator },

    #[error("`ENDWHILE` at quadruple {0} has no loop header")]
    LoopLabelUnderflow(usize),

    #[error("`ENDPROCEDURE` at quadruple {0} closes no procedure")]
    UnbalancedProcedure(usize),

    #[error("{0} procedures were never closed")]
    UnclosedProcedures(usize),

    #[error("{0} loop headers were never closed")]
    UnclosedLoops(usize),

    #[error("{0} branches were never resolved")]
    UnresolvedBranch(usize),

    #[error("Symbol `{0}` has no stack slot in any enclosing frame")]
    UndefinedSymbol(Rc<str>),

    #[error("Temporary `{0}` is read before being defined")]
    UndefinedTemporary(Temp),

    #[error("Declaration `{quad}` at quadruple {index} is not at the start of a frame")]
    MisplacedDeclaration { index: usize, quad: Quadruple },

    #[error("Quadruple {index} `{quad}` has malformed operands")]
    BadOperands { index: usize, quad: Quadruple },

    #[error("Unexpected operand `{0}`")]
    UnexpectedOperand(Operand),

    #[error("Every register is in use by the current instruction")]
    RegisterExhaustion,

    #[error("Quadruple {index} passes more than four arguments")]
    TooManyArguments { index: usize },

    #[error("Procedure `{0}` takes more than four parameters")]
    TooManyParameters(Rc<str>),

    #[error("Stack offset of {0} words is out of range")]
    FrameTooLarge(u64),
}

/// Situación que no impide generar código, pero que el usuario debe conocer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodegenWarning {
    #[error("Temporary `{0}` was evicted from its register and its value is lost")]
    LostTemporary(Temp),
}

/// Programa ensamblador completo.
pub struct Listing {
    lines: Vec<Line>,
    warnings: Vec<CodegenWarning>,
}

impl Listing {
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn warnings(&self) -> &[CodegenWarning] {
        &self.warnings
    }
}

impl Display for Listing {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            write!(fmt, "{}", line)?;
        }

        Ok(())
    }
}

/// Traduce un flujo de cuádruplos a ensamblador MIPS.
pub fn generate(quads: &[Quadruple], options: Options) -> Result<Listing, CodegenError> {
    let (global, declarations) = Frame::scan(quads, 0)?;

    let mut generator = Generator {
        quads,
        options,
        lines: Vec::new(),
        regs: Default::default(),
        frames: Frames::new(global),
        backpatch: Vec::new(),
        loops: Vec::new(),
        next_label: 0,
        arguments: 0,
        consumed: Vec::new(),
        lost: HashSet::new(),
        warnings: Vec::new(),
    };

    generator.header()?;
    generator.body(declarations)?;
    generator.finish()
}

pub(crate) struct Generator<'a> {
    quads: &'a [Quadruple],
    options: Options,
    lines: Vec<Line>,
    regs: Allocations<Reg>,
    frames: Frames,

    // Índices en `lines` de saltos con destino pendiente
    backpatch: Vec<usize>,

    loops: Vec<String>,
    next_label: u32,
    arguments: usize,
    consumed: Vec<Temp>,
    lost: HashSet<Temp>,
    warnings: Vec<CodegenWarning>,
}

impl<'a> Generator<'a> {
    fn header(&mut self) -> Result<(), CodegenError> {
        for directive in [".data", "newline: .asciiz \"\\n\"", ".text", ".globl main"] {
            self.lines.push(Line::Directive(String::from(directive)));
        }

        self.label(String::from("main"));

        let size = self.frames.current().size();
        if size > 0 {
            self.reserve(size)?;
        }

        Ok(())
    }

    fn body(&mut self, start: usize) -> Result<(), CodegenError> {
        let quads = self.quads;

        let mut index = start;
        while let Some(quad) = quads.get(index) {
            trace!(index, %quad, "lowering");
            if self.options.contains(Options::ANNOTATE) {
                self.comment(quad.to_string());
            }

            index = self
                .quad(index, quad)
                .and_then(|next| self.settle().map(|()| next))
                .map_err(|fault| {
                    error!(index, %quad, "code generation failed");
                    fault
                })?;
        }

        Ok(())
    }

    fn finish(mut self) -> Result<Listing, CodegenError> {
        self.syscall(Syscall::Exit);

        if !self.backpatch.is_empty() {
            return Err(CodegenError::UnresolvedBranch(self.backpatch.len()));
        } else if !self.loops.is_empty() {
            return Err(CodegenError::UnclosedLoops(self.loops.len()));
        } else if self.frames.depth() > 0 {
            return Err(CodegenError::UnclosedProcedures(self.frames.depth()));
        }

        let pending = self.lines.iter().filter(|line| line.is_pending()).count();
        if pending > 0 {
            return Err(CodegenError::UnresolvedBranch(pending));
        }

        debug!(lines = self.lines.len(), warnings = self.warnings.len(), "assembly generated");

        Ok(Listing {
            lines: self.lines,
            warnings: self.warnings,
        })
    }

    /// Traduce un cuádruplo y retorna el índice del siguiente.
    fn quad(&mut self, index: usize, quad: &Quadruple) -> Result<usize, CodegenError> {
        use Operator::*;

        let Quadruple {
            operator,
            arg1,
            arg2,
            result,
        } = quad;

        match operator {
            Declare | Get(_) => {
                return Err(CodegenError::MisplacedDeclaration {
                    index,
                    quad: quad.clone(),
                })
            }

            Procedure => return self.procedure(index, quad),

            EndProcedure => {
                self.clear()?;
                self.epilogue();

                if !self.frames.exit() {
                    return Err(CodegenError::UnbalancedProcedure(index));
                }
            }

            Assign => {
                if let Operand::Int(value) = arg1 {
                    let target = self.write(result)?;
                    self.instr("li", format!("{}, {}", target, value));
                } else {
                    let value = self.read(arg1)?;
                    let target = self.write(result)?;
                    self.instr("move", format!("{}, {}", target, value));
                }
            }

            Add | Sub | Mul | Div | Less | Equal => self.binary(*operator, arg1, arg2, result)?,

            Address => self.address(index, quad)?,

            Load => {
                let address = self.read(arg1)?;
                let target = self.write(result)?;
                self.instr("lw", format!("{}, 0({})", target, address));
            }

            Store => {
                let value = self.read(arg1)?;
                let address = self.read(result)?;
                self.instr("sw", format!("{}, 0({})", value, address));
            }

            Then | Do => {
                let condition = self.read(arg1)?;
                let line = self.branch("beqz", Some(condition));
                self.backpatch.push(line);
            }

            Else => {
                let jump = self.branch("j", None);
                self.patch_here(index, *operator)?;
                self.backpatch.push(jump);
            }

            EndIf => self.patch_here(index, *operator)?,

            While => {
                let header = self.fresh_label();
                self.label(header.clone());
                self.loops.push(header);
            }

            EndWhile => {
                let header = self
                    .loops
                    .pop()
                    .ok_or(CodegenError::LoopLabelUnderflow(index))?;

                self.jump(header);
                self.patch_here(index, *operator)?;
            }

            Input => {
                self.syscall(Syscall::ReadInt);
                let target = self.write(result)?;
                self.instr("move", format!("{}, {}", target, Reg::V0));
            }

            Output => {
                match arg1 {
                    Operand::Int(value) => self.instr("li", format!("{}, {}", Reg::A0, value)),
                    _ => {
                        let value = self.read(arg1)?;
                        self.instr("move", format!("{}, {}", Reg::A0, value));
                    }
                }

                self.syscall(Syscall::PrintInt);
                self.instr("la", format!("{}, newline", Reg::A0));
                self.syscall(Syscall::PrintString);
            }

            Param(passing) => self.argument(index, quad, *passing)?,

            Call => {
                let symbol = arg1.as_name().ok_or_else(|| CodegenError::BadOperands {
                    index,
                    quad: quad.clone(),
                })?;

                self.clear()?;
                self.arguments = 0;
                self.instr("jal", procedure_label(symbol));
            }

            Label => match arg1 {
                Operand::Label(label) => self.label(label.to_string()),
                _ => return Err(CodegenError::UnexpectedOperand(arg1.clone())),
            },

            Go => match arg1 {
                Operand::Label(label) => self.jump(label.to_string()),
                _ => return Err(CodegenError::UnexpectedOperand(arg1.clone())),
            },
        }

        Ok(index + 1)
    }

    /// Prólogo de un procedimiento y disposición de su marco.
    fn procedure(&mut self, index: usize, quad: &Quadruple) -> Result<usize, CodegenError> {
        let symbol = quad.arg1.as_name().ok_or_else(|| CodegenError::BadOperands {
            index,
            quad: quad.clone(),
        })?;

        let quads = self.quads;
        let (frame, declarations) = Frame::scan(&quads[index + 1..], index + 1)?;
        if frame.params().len() > Reg::ARGUMENTS.len() {
            return Err(CodegenError::TooManyParameters(Rc::clone(symbol)));
        }

        self.clear()?;
        self.label(procedure_label(symbol));

        // Se guardan dirección de retorno y frame pointer del invocador
        self.instr("addiu", format!("{0}, {0}, -8", Reg::Sp));
        self.instr("sw", format!("{}, 4({})", Reg::Ra, Reg::Sp));
        self.instr("sw", format!("{}, 0({})", Reg::Fp, Reg::Sp));
        self.instr("move", format!("{}, {}", Reg::Fp, Reg::Sp));

        if frame.size() > 0 {
            self.reserve(frame.size())?;
        }

        for (param, reg) in frame.params().iter().zip(Reg::ARGUMENTS.iter()) {
            let offset = frame::bytes(u64::from(param.offset))?;
            self.instr("sw", format!("{}, {}({})", reg, offset, Reg::Sp));
        }

        debug!(%symbol, size = frame.size(), params = frame.params().len(), "frame laid out");
        self.frames.enter(frame);

        Ok(index + 1 + declarations)
    }

    fn epilogue(&mut self) {
        self.instr("move", format!("{}, {}", Reg::Sp, Reg::Fp));
        self.instr("lw", format!("{}, 0({})", Reg::Fp, Reg::Sp));
        self.instr("lw", format!("{}, 4({})", Reg::Ra, Reg::Sp));
        self.instr("addiu", format!("{0}, {0}, 8", Reg::Sp));
        self.instr("jr", Reg::Ra.to_string());
    }

    fn binary(
        &mut self,
        operator: Operator,
        lhs: &Operand,
        rhs: &Operand,
        result: &Operand,
    ) -> Result<(), CodegenError> {
        let lhs = self.read(lhs)?;

        // Formas con inmediato cuando el operando derecho cabe en 16 bits
        let immediate = match (operator, rhs) {
            (Operator::Add, Operand::Int(value)) => Some(("addiu", *value)),
            (Operator::Sub, Operand::Int(value)) => value.checked_neg().map(|value| ("addiu", value)),
            (Operator::Less, Operand::Int(value)) => Some(("slti", *value)),
            _ => None,
        };

        if let Some((opcode, value)) = immediate.filter(|(_, value)| i16::try_from(*value).is_ok()) {
            let target = self.write(result)?;
            self.instr(opcode, format!("{}, {}, {}", target, lhs, value));
            return Ok(());
        }

        let rhs = self.read(rhs)?;
        let target = self.write(result)?;

        match operator {
            Operator::Add => self.instr("addu", format!("{}, {}, {}", target, lhs, rhs)),
            Operator::Sub => self.instr("subu", format!("{}, {}, {}", target, lhs, rhs)),
            Operator::Mul => self.instr("mul", format!("{}, {}, {}", target, lhs, rhs)),
            Operator::Less => self.instr("slt", format!("{}, {}, {}", target, lhs, rhs)),

            Operator::Div => {
                self.instr("div", format!("{}, {}", lhs, rhs));
                self.instr("mflo", target.to_string());
            }

            _ => {
                self.instr("xor", format!("{}, {}, {}", target, lhs, rhs));
                self.instr("sltiu", format!("{0}, {0}, 1", target));
            }
        }

        Ok(())
    }

    /// `[](base, desplazamiento, dirección)`, en bytes absolutos.
    fn address(&mut self, index: usize, quad: &Quadruple) -> Result<(), CodegenError> {
        enum Base {
            Stack(Home),
            Computed(Reg),
        }

        enum Offset {
            Units(i32),
            Index(Reg),
        }

        let base = match &quad.arg1 {
            Operand::Name(name) => Base::Stack(self.home(name)?),
            Operand::Temp(_) => Base::Computed(self.read(&quad.arg1)?),
            _ => {
                return Err(CodegenError::BadOperands {
                    index,
                    quad: quad.clone(),
                })
            }
        };

        let offset = match &quad.arg2 {
            Operand::Int(units) => Offset::Units(*units),
            other => Offset::Index(self.read(other)?),
        };

        let target = self.write(&quad.result)?;
        match base {
            Base::Computed(reg) => self.instr("move", format!("{}, {}", target, reg)),
            Base::Stack(Home::Direct(offset)) => {
                self.instr("addiu", format!("{}, {}, {}", target, Reg::Sp, offset))
            }

            // La referencia ya guarda la dirección del agregado
            Base::Stack(Home::Indirect(pointer)) => {
                self.instr("lw", format!("{}, {}({})", target, pointer, Reg::Sp))
            }
        }

        match offset {
            Offset::Units(0) => (),
            Offset::Units(units) => {
                let bytes = units.wrapping_mul(WORD_SIZE);
                self.instr("addiu", format!("{0}, {0}, {1}", target, bytes));
            }

            Offset::Index(reg) => {
                let scaled = self.scratch()?;
                self.instr("sll", format!("{}, {}, 2", scaled, reg));
                self.instr("addu", format!("{0}, {0}, {1}", target, scaled));
            }
        }

        Ok(())
    }

    /// Coloca un argumento real en su registro de la convención de llamada.
    fn argument(&mut self, index: usize, quad: &Quadruple, passing: Passing) -> Result<(), CodegenError> {
        let reg = *Reg::ARGUMENTS
            .get(self.arguments)
            .ok_or(CodegenError::TooManyArguments { index })?;

        self.arguments += 1;
        match (passing, &quad.arg1) {
            (Passing::Value, Operand::Int(value)) => self.instr("li", format!("{}, {}", reg, value)),
            (Passing::Value, value) => {
                let value = self.read(value)?;
                self.instr("move", format!("{}, {}", reg, value));
            }

            (Passing::Reference, Operand::Name(name)) => match self.home(name)? {
                Home::Direct(offset) => {
                    self.instr("addiu", format!("{}, {}, {}", reg, Reg::Sp, offset))
                }

                Home::Indirect(pointer) => {
                    self.instr("lw", format!("{}, {}({})", reg, pointer, Reg::Sp))
                }
            },

            (Passing::Reference, address @ Operand::Temp(_)) => {
                let address = self.read(address)?;
                self.instr("move", format!("{}, {}", reg, address));
            }

            (Passing::Reference, _) => {
                return Err(CodegenError::BadOperands {
                    index,
                    quad: quad.clone(),
                })
            }
        }

        Ok(())
    }

    /// Resuelve el salto pendiente más reciente hacia una etiqueta nueva
    /// colocada en este punto.
    fn patch_here(&mut self, index: usize, operator: Operator) -> Result<(), CodegenError> {
        let line = self
            .backpatch
            .pop()
            .ok_or(CodegenError::BackpatchUnderflow { index, operator })?;

        let label = self.fresh_label();
        if let Some(Line::Branch { target, .. }) = self.lines.get_mut(line) {
            *target = Target::Resolved(label.clone());
        }

        self.label(label);
        Ok(())
    }

    fn home(&self, name: &str) -> Result<Home, CodegenError> {
        self.frames.resolve(name)
    }

    fn fresh_label(&mut self) -> String {
        let label = format!("label{}", self.next_label);
        self.next_label += 1;

        label
    }

    fn reserve(&mut self, words: u32) -> Result<(), CodegenError> {
        let bytes = frame::bytes(u64::from(words))?;
        self.instr("addiu", format!("{0}, {0}, -{1}", Reg::Sp, bytes));

        Ok(())
    }

    fn syscall(&mut self, call: Syscall) {
        self.instr("li", format!("{}, {}", Reg::V0, call as i32));
        self.instr("syscall", String::new());
    }

    fn branch(&mut self, opcode: &'static str, condition: Option<Reg>) -> usize {
        self.lines.push(Line::Branch {
            opcode,
            condition,
            target: Target::Pending,
        });

        self.lines.len() - 1
    }

    fn jump(&mut self, label: String) {
        self.lines.push(Line::Branch {
            opcode: "j",
            condition: None,
            target: Target::Resolved(label),
        });
    }

    fn instr(&mut self, opcode: &'static str, operands: String) {
        self.lines.push(Line::Instr(opcode, operands));
    }

    fn label(&mut self, label: String) {
        self.lines.push(Line::Label(label));
    }

    fn comment(&mut self, comment: String) {
        self.lines.push(Line::Comment(comment));
    }
}

fn procedure_label(symbol: &str) -> String {
    format!("user_{}", symbol)
}
