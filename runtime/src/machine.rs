//! Ejecución de programas cargados.

use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tracing::{debug, trace};

use crate::program::{Instr, Program, Reg, DATA_BASE, TEXT_BASE};

/// Valor inicial de `$sp`, igual al de SPIM.
pub const STACK_TOP: u32 = 0x7FFF_EFFC;

const GLOBAL_POINTER: u32 = 0x1000_8000;
const DEFAULT_STEP_LIMIT: u64 = 10_000_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("Misaligned word access at 0x{0:08x}")]
    Misaligned(u32),

    #[error("Program requested input but none is left")]
    InputExhausted,

    #[error("Division by zero at instruction {0}")]
    DivisionByZero(usize),

    #[error("Unknown syscall {0}")]
    UnknownSyscall(i32),

    #[error("Step limit of {0} instructions exceeded")]
    StepLimit(u64),

    #[error("Jump to 0x{0:08x}, outside of the program text")]
    BadJump(u32),

    #[error("Execution ran past the last instruction")]
    RanOffEnd,
}

/// Resultado de un programa que terminó con la llamada `exit`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Exit {
    pub output: String,
    pub steps: u64,
}

pub struct Machine<'p> {
    program: &'p Program,
    regs: [i32; 32],
    hi: i32,
    lo: i32,
    pc: usize,
    memory: HashMap<u32, u8>,
    input: VecDeque<i32>,
    output: String,
    steps: u64,
    step_limit: u64,
}

enum Flow {
    Next,
    Jump(usize),
    Exit,
}

impl<'p> Machine<'p> {
    pub fn new(program: &'p Program) -> Self {
        let memory = program
            .data
            .iter()
            .enumerate()
            .map(|(offset, byte)| (DATA_BASE + offset as u32, *byte))
            .collect();

        let mut machine = Machine {
            program,
            regs: [0; 32],
            hi: 0,
            lo: 0,
            pc: program.entry,
            memory,
            input: VecDeque::new(),
            output: String::new(),
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
        };

        machine.set(Reg::SP, STACK_TOP as i32);
        machine.set(Reg::GP, GLOBAL_POINTER as i32);
        machine
    }

    /// Agrega enteros a la cola que consume la llamada `read_int`.
    pub fn input<I: IntoIterator<Item = i32>>(mut self, input: I) -> Self {
        self.input.extend(input);
        self
    }

    /// Cantidad máxima de instrucciones a ejecutar antes de abortar.
    pub fn step_limit(mut self, limit: u64) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn run(mut self) -> Result<Exit, ExecError> {
        loop {
            if self.steps >= self.step_limit {
                return Err(ExecError::StepLimit(self.step_limit));
            }

            let program = self.program;
            let instr = program.text.get(self.pc).ok_or(ExecError::RanOffEnd)?;

            trace!(pc = self.pc, ?instr);
            self.steps += 1;

            match self.step(instr)? {
                Flow::Next => self.pc += 1,
                Flow::Jump(target) => self.pc = target,
                Flow::Exit => break,
            }
        }

        debug!(steps = self.steps, "program exited");
        Ok(Exit {
            output: self.output,
            steps: self.steps,
        })
    }

    fn step(&mut self, instr: &Instr) -> Result<Flow, ExecError> {
        use Instr::*;

        match *instr {
            Li(rd, value) => self.set(rd, value),
            La(rd, address) => self.set(rd, address as i32),
            Move(rd, rs) => self.set(rd, self.get(rs)),
            Addiu(rd, rs, imm) => self.set(rd, self.get(rs).wrapping_add(imm)),
            Addu(rd, rs, rt) => self.set(rd, self.get(rs).wrapping_add(self.get(rt))),
            Subu(rd, rs, rt) => self.set(rd, self.get(rs).wrapping_sub(self.get(rt))),
            Mul(rd, rs, rt) => self.set(rd, self.get(rs).wrapping_mul(self.get(rt))),
            Slt(rd, rs, rt) => self.set(rd, (self.get(rs) < self.get(rt)) as i32),
            Slti(rd, rs, imm) => self.set(rd, (self.get(rs) < imm) as i32),
            Sltiu(rd, rs, imm) => self.set(rd, ((self.get(rs) as u32) < imm as u32) as i32),
            Xor(rd, rs, rt) => self.set(rd, self.get(rs) ^ self.get(rt)),
            Sll(rd, rs, shift) => self.set(rd, ((self.get(rs) as u32) << shift) as i32),
            Mflo(rd) => self.set(rd, self.lo),
            Mfhi(rd) => self.set(rd, self.hi),

            Div(rs, rt) => {
                let (dividend, divisor) = (self.get(rs), self.get(rt));
                if divisor == 0 {
                    return Err(ExecError::DivisionByZero(self.pc));
                }

                self.lo = dividend.wrapping_div(divisor);
                self.hi = dividend.wrapping_rem(divisor);
            }

            Lw(rt, offset, base) => {
                let address = self.get(base).wrapping_add(offset) as u32;
                let word = self.load_word(address)?;
                self.set(rt, word);
            }

            Sw(rt, offset, base) => {
                let address = self.get(base).wrapping_add(offset) as u32;
                self.store_word(address, self.get(rt))?;
            }

            Beqz(rs, target) => return Ok(self.branch(self.get(rs) == 0, target)),
            Bnez(rs, target) => return Ok(self.branch(self.get(rs) != 0, target)),
            Beq(rs, rt, target) => return Ok(self.branch(self.get(rs) == self.get(rt), target)),
            Bne(rs, rt, target) => return Ok(self.branch(self.get(rs) != self.get(rt), target)),
            J(target) => return Ok(Flow::Jump(target)),

            Jal(target) => {
                let link = TEXT_BASE + 4 * (self.pc as u32 + 1);
                self.set(Reg::RA, link as i32);
                return Ok(Flow::Jump(target));
            }

            Jr(rs) => {
                let address = self.get(rs) as u32;
                let index = address.wrapping_sub(TEXT_BASE) / 4;

                let valid = address >= TEXT_BASE
                    && address % 4 == 0
                    && index as usize <= self.program.text.len();

                if !valid {
                    return Err(ExecError::BadJump(address));
                }

                return Ok(Flow::Jump(index as usize));
            }

            Syscall => return self.syscall(),
            Nop => (),
        }

        Ok(Flow::Next)
    }

    fn syscall(&mut self) -> Result<Flow, ExecError> {
        let argument = self.get(Reg::A0);

        match self.get(Reg::V0) {
            1 => self.output.push_str(&argument.to_string()),

            4 => {
                let mut address = argument as u32;
                loop {
                    let byte = self.memory.get(&address).copied().unwrap_or(0);
                    if byte == 0 {
                        break;
                    }

                    self.output.push(byte as char);
                    address = address.wrapping_add(1);
                }
            }

            5 => {
                let value = self.input.pop_front().ok_or(ExecError::InputExhausted)?;
                self.set(Reg::V0, value);
            }

            10 => return Ok(Flow::Exit),
            11 => self.output.push(argument as u8 as char),

            code => return Err(ExecError::UnknownSyscall(code)),
        }

        Ok(Flow::Next)
    }

    fn branch(&self, taken: bool, target: usize) -> Flow {
        if taken {
            Flow::Jump(target)
        } else {
            Flow::Next
        }
    }

    fn get(&self, reg: Reg) -> i32 {
        self.regs[reg.0 as usize]
    }

    fn set(&mut self, reg: Reg, value: i32) {
        // `$zero` ignora escrituras
        if reg != Reg::ZERO {
            self.regs[reg.0 as usize] = value;
        }
    }

    fn load_word(&self, address: u32) -> Result<i32, ExecError> {
        if address % 4 != 0 {
            return Err(ExecError::Misaligned(address));
        }

        let mut bytes = [0; 4];
        for (offset, byte) in bytes.iter_mut().enumerate() {
            *byte = self
                .memory
                .get(&(address + offset as u32))
                .copied()
                .unwrap_or(0);
        }

        Ok(i32::from_le_bytes(bytes))
    }

    fn store_word(&mut self, address: u32, value: i32) -> Result<(), ExecError> {
        if address % 4 != 0 {
            return Err(ExecError::Misaligned(address));
        }

        for (offset, byte) in value.to_le_bytes().iter().enumerate() {
            self.memory.insert(address + offset as u32, *byte);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn execute(source: &str, input: &[i32]) -> Result<Exit, ExecError> {
        let program = Program::parse(source).unwrap();
        Machine::new(&program).input(input.iter().copied()).run()
    }

    #[test]
    fn sums_input() {
        // Suma enteros leídos hasta encontrar un cero
        let exit = execute(
            ".data
             newline: .asciiz \"\\n\"
             .text
             main:
                li $t0, 0
             loop:
                li $v0, 5
                syscall
                beqz $v0, done
                addu $t0, $t0, $v0
                j loop
             done:
                move $a0, $t0
                li $v0, 1
                syscall
                la $a0, newline
                li $v0, 4
                syscall
                li $v0, 10
                syscall",
            &[3, 4, -2, 0],
        )
        .unwrap();

        assert_eq!(exit.output, "5\n");
    }

    #[test]
    fn stack_and_calls() {
        let exit = execute(
            "main:
                addiu $sp, $sp, -4
                li $t0, 6
                sw $t0, 0($sp)
                jal square
                move $a0, $v0
                li $v0, 1
                syscall
                li $v0, 10
                syscall
             square:
                lw $t1, 0($sp)
                mul $v0, $t1, $t1
                jr $ra",
            &[],
        )
        .unwrap();

        assert_eq!(exit.output, "36");
        assert_eq!(exit.steps, 12);
    }

    #[test]
    fn arithmetic() {
        let exit = execute(
            "main:
                li $t0, -7
                li $t1, 2
                div $t0, $t1
                mflo $a0
                li $v0, 1
                syscall
                mfhi $a0
                syscall
                slt $a0, $t0, $t1
                syscall
                xor $t2, $t1, $t1
                sltiu $a0, $t2, 1
                syscall
                sll $a0, $t1, 2
                syscall
                li $zero, 5
                move $a0, $zero
                syscall
                li $v0, 10
                syscall",
            &[],
        )
        .unwrap();

        assert_eq!(exit.output, "-3-11180");
    }

    #[test]
    fn runtime_errors() {
        assert_eq!(
            execute("main:\n li $v0, 5\n syscall", &[]).err(),
            Some(ExecError::InputExhausted)
        );

        assert_eq!(
            execute("main:\n li $t0, 1\n div $t0, $zero", &[]).err(),
            Some(ExecError::DivisionByZero(1))
        );

        assert_eq!(
            execute("main:\n lw $t0, 2($sp)", &[]).err(),
            Some(ExecError::Misaligned(STACK_TOP + 2))
        );

        assert_eq!(
            execute("main:\n li $v0, 99\n syscall", &[]).err(),
            Some(ExecError::UnknownSyscall(99))
        );

        assert_eq!(
            execute("main:\n li $t0, 8\n jr $t0", &[]).err(),
            Some(ExecError::BadJump(8))
        );

        assert_eq!(execute("main:\n nop", &[]).err(), Some(ExecError::RanOffEnd));
    }

    #[test]
    fn step_limit() {
        let program = Program::parse("main:\n j main").unwrap();
        let result = Machine::new(&program).step_limit(100).run();

        assert_eq!(result.err(), Some(ExecError::StepLimit(100)));
    }
}
