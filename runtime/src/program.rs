//! Carga de texto ensamblador.
//!
//! La carga ocurre en dos pasadas. La primera separa etiquetas,
//! directivas e instrucciones y dispone el segmento de datos; la segunda
//! traduce cada instrucción, ya con todas las etiquetas conocidas.

use std::collections::HashMap;
use thiserror::Error;

/// Dirección de la primera instrucción.
pub const TEXT_BASE: u32 = 0x0040_0000;

/// Dirección del inicio del segmento `.data`.
pub const DATA_BASE: u32 = 0x1001_0000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Reg(pub u8);

impl Reg {
    pub const ZERO: Reg = Reg(0);
    pub const V0: Reg = Reg(2);
    pub const A0: Reg = Reg(4);
    pub const GP: Reg = Reg(28);
    pub const SP: Reg = Reg(29);
    pub const RA: Reg = Reg(31);
}

/// Instrucción ya decodificada. Los saltos apuntan a índices de `text`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instr {
    Li(Reg, i32),
    La(Reg, u32),
    Move(Reg, Reg),
    Addiu(Reg, Reg, i32),
    Addu(Reg, Reg, Reg),
    Subu(Reg, Reg, Reg),
    Mul(Reg, Reg, Reg),
    Div(Reg, Reg),
    Mflo(Reg),
    Mfhi(Reg),
    Slt(Reg, Reg, Reg),
    Slti(Reg, Reg, i32),
    Sltiu(Reg, Reg, i32),
    Xor(Reg, Reg, Reg),
    Sll(Reg, Reg, u32),
    Lw(Reg, i32, Reg),
    Sw(Reg, i32, Reg),
    Beqz(Reg, usize),
    Bnez(Reg, usize),
    Beq(Reg, Reg, usize),
    Bne(Reg, Reg, usize),
    J(usize),
    Jal(usize),
    Jr(Reg),
    Syscall,
    Nop,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("line {line}: unknown instruction `{opcode}`")]
    UnknownInstruction { line: usize, opcode: String },

    #[error("line {line}: unknown directive `{directive}`")]
    UnknownDirective { line: usize, directive: String },

    #[error("line {line}: bad register `{name}`")]
    BadRegister { line: usize, name: String },

    #[error("line {line}: bad operand `{operand}`")]
    BadOperand { line: usize, operand: String },

    #[error("line {line}: `{opcode}` expects {expected} operands, found {found}")]
    OperandCount {
        line: usize,
        opcode: String,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: label `{label}` is undefined")]
    UndefinedLabel { line: usize, label: String },

    #[error("line {line}: label `{label}` is defined more than once")]
    DuplicateLabel { line: usize, label: String },

    #[error("Program has no `main` label")]
    NoEntry,
}

/// Programa cargado, listo para ejecutarse.
pub struct Program {
    pub(crate) text: Vec<Instr>,
    pub(crate) data: Vec<u8>,
    pub(crate) entry: usize,
}

#[derive(Copy, Clone)]
enum Symbol {
    Text(usize),
    Data(u32),
}

impl Symbol {
    fn address(self) -> u32 {
        match self {
            Symbol::Text(index) => TEXT_BASE + 4 * index as u32,
            Symbol::Data(address) => address,
        }
    }
}

/// Instrucción vista en la primera pasada, aún sin traducir.
struct Statement<'a> {
    line: usize,
    opcode: &'a str,
    operands: Vec<&'a str>,
}

impl Program {
    pub fn parse(source: &str) -> Result<Program, LoadError> {
        let mut labels = HashMap::new();
        let mut statements = Vec::new();
        let mut data = Vec::new();
        let mut in_data = false;

        for (number, line) in source.lines().enumerate() {
            let line_number = number + 1;
            let mut rest = strip_comment(line).trim();

            while let Some((label, tail)) = split_label(rest) {
                let symbol = if in_data {
                    Symbol::Data(DATA_BASE + data.len() as u32)
                } else {
                    Symbol::Text(statements.len())
                };

                if labels.insert(label, symbol).is_some() {
                    return Err(LoadError::DuplicateLabel {
                        line: line_number,
                        label: label.to_owned(),
                    });
                }

                rest = tail.trim_start();
            }

            if rest.is_empty() {
                continue;
            }

            let (head, tail) = match rest.find(char::is_whitespace) {
                Some(split) => (&rest[..split], rest[split..].trim()),
                None => (rest, ""),
            };

            if head.starts_with('.') {
                directive(line_number, head, tail, &mut in_data, &mut data)?;
                continue;
            }

            let operands = match tail {
                "" => Vec::new(),
                _ => tail.split(',').map(str::trim).collect(),
            };

            statements.push(Statement {
                line: line_number,
                opcode: head,
                operands,
            });
        }

        let entry = match labels.get("main") {
            Some(Symbol::Text(entry)) => *entry,
            _ => return Err(LoadError::NoEntry),
        };

        let text = statements
            .iter()
            .map(|statement| decode(statement, &labels))
            .collect::<Result<_, _>>()?;

        Ok(Program { text, data, entry })
    }

    /// Cantidad de instrucciones en el segmento de texto.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

fn directive(
    line: usize,
    name: &str,
    operands: &str,
    in_data: &mut bool,
    data: &mut Vec<u8>,
) -> Result<(), LoadError> {
    let bad_operand = || LoadError::BadOperand {
        line,
        operand: operands.to_owned(),
    };

    match name {
        ".data" => *in_data = true,
        ".text" => *in_data = false,
        ".globl" | ".global" | ".align" => (),

        ".asciiz" | ".ascii" => {
            let string = unquote(operands).ok_or_else(bad_operand)?;
            data.extend(string.bytes());

            if name == ".asciiz" {
                data.push(0);
            }
        }

        ".word" => {
            for word in operands.split(',') {
                let word = immediate(word.trim()).ok_or_else(bad_operand)?;
                data.extend_from_slice(&word.to_le_bytes());
            }
        }

        ".space" => {
            let size = immediate(operands).filter(|size| *size >= 0).ok_or_else(bad_operand)?;
            data.resize(data.len() + size as usize, 0);
        }

        _ => {
            return Err(LoadError::UnknownDirective {
                line,
                directive: name.to_owned(),
            })
        }
    }

    Ok(())
}

fn decode(statement: &Statement, labels: &HashMap<&str, Symbol>) -> Result<Instr, LoadError> {
    let Statement {
        line,
        opcode,
        operands,
    } = statement;

    let line = *line;
    let expect = |expected: usize| {
        if operands.len() == expected {
            return Ok(());
        }

        Err(LoadError::OperandCount {
            line,
            opcode: opcode.to_string(),
            expected,
            found: operands.len(),
        })
    };

    let reg = |index: usize| register(operands[index]).ok_or_else(|| LoadError::BadRegister {
        line,
        name: operands[index].to_owned(),
    });

    let bad_operand = |index: usize| LoadError::BadOperand {
        line,
        operand: operands[index].to_owned(),
    };

    let imm = |index: usize| immediate(operands[index]).ok_or_else(|| bad_operand(index));

    let symbol = |index: usize| {
        labels
            .get(operands[index])
            .copied()
            .ok_or_else(|| LoadError::UndefinedLabel {
                line,
                label: operands[index].to_owned(),
            })
    };

    let target = |index: usize| -> Result<usize, LoadError> {
        match symbol(index)? {
            Symbol::Text(target) => Ok(target),
            Symbol::Data(_) => Err(bad_operand(index)),
        }
    };

    let memory = |index: usize| -> Result<(i32, Reg), LoadError> {
        let operand = operands[index];
        let open = operand.find('(').ok_or_else(|| bad_operand(index))?;
        let base = operand[open + 1..]
            .strip_suffix(')')
            .and_then(register)
            .ok_or_else(|| bad_operand(index))?;

        let offset = match operand[..open].trim() {
            "" => 0,
            offset => immediate(offset).ok_or_else(|| bad_operand(index))?,
        };

        Ok((offset, base))
    };

    let instr = match *opcode {
        "nop" => expect(0).map(|()| Instr::Nop)?,
        "syscall" => expect(0).map(|()| Instr::Syscall)?,

        "li" => {
            expect(2)?;
            Instr::Li(reg(0)?, imm(1)?)
        }

        "la" => {
            expect(2)?;
            Instr::La(reg(0)?, symbol(1)?.address())
        }

        "move" => {
            expect(2)?;
            Instr::Move(reg(0)?, reg(1)?)
        }

        "addiu" | "addi" => {
            expect(3)?;
            Instr::Addiu(reg(0)?, reg(1)?, imm(2)?)
        }

        "slti" => {
            expect(3)?;
            Instr::Slti(reg(0)?, reg(1)?, imm(2)?)
        }

        "sltiu" => {
            expect(3)?;
            Instr::Sltiu(reg(0)?, reg(1)?, imm(2)?)
        }

        "sll" => {
            expect(3)?;
            let shift = imm(2)?;
            if !(0..32).contains(&shift) {
                return Err(bad_operand(2));
            }

            Instr::Sll(reg(0)?, reg(1)?, shift as u32)
        }

        "addu" | "add" | "subu" | "sub" | "mul" | "slt" | "xor" => {
            expect(3)?;
            let (rd, rs, rt) = (reg(0)?, reg(1)?, reg(2)?);

            match *opcode {
                "addu" | "add" => Instr::Addu(rd, rs, rt),
                "subu" | "sub" => Instr::Subu(rd, rs, rt),
                "mul" => Instr::Mul(rd, rs, rt),
                "slt" => Instr::Slt(rd, rs, rt),
                _ => Instr::Xor(rd, rs, rt),
            }
        }

        "div" => {
            expect(2)?;
            Instr::Div(reg(0)?, reg(1)?)
        }

        "mflo" => {
            expect(1)?;
            Instr::Mflo(reg(0)?)
        }

        "mfhi" => {
            expect(1)?;
            Instr::Mfhi(reg(0)?)
        }

        "lw" | "sw" => {
            expect(2)?;
            let (rt, (offset, base)) = (reg(0)?, memory(1)?);

            match *opcode {
                "lw" => Instr::Lw(rt, offset, base),
                _ => Instr::Sw(rt, offset, base),
            }
        }

        "beqz" => {
            expect(2)?;
            Instr::Beqz(reg(0)?, target(1)?)
        }

        "bnez" => {
            expect(2)?;
            Instr::Bnez(reg(0)?, target(1)?)
        }

        "beq" => {
            expect(3)?;
            Instr::Beq(reg(0)?, reg(1)?, target(2)?)
        }

        "bne" => {
            expect(3)?;
            Instr::Bne(reg(0)?, reg(1)?, target(2)?)
        }

        "j" | "b" => {
            expect(1)?;
            Instr::J(target(0)?)
        }

        "jal" => {
            expect(1)?;
            Instr::Jal(target(0)?)
        }

        "jr" => {
            expect(1)?;
            Instr::Jr(reg(0)?)
        }

        _ => {
            return Err(LoadError::UnknownInstruction {
                line,
                opcode: opcode.to_string(),
            })
        }
    };

    Ok(instr)
}

/// Separa una etiqueta al inicio de la línea.
fn split_label(line: &str) -> Option<(&str, &str)> {
    let (label, tail) = line.split_once(':')?;
    let mut chars = label.chars();

    let valid_start = chars
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_' || c == '.');

    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if valid_start && valid_rest {
        Some((label, tail))
    } else {
        None
    }
}

fn strip_comment(line: &str) -> &str {
    let mut quoted = false;
    let mut escaped = false;

    for (index, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            '#' if !quoted => return &line[..index],
            _ => (),
        }
    }

    line
}

fn unquote(literal: &str) -> Option<String> {
    let inner = literal.strip_prefix('"')?.strip_suffix('"')?;

    let mut string = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        let c = match c {
            '\\' => match chars.next()? {
                'n' => '\n',
                't' => '\t',
                '0' => '\0',
                '\\' => '\\',
                '"' => '"',
                _ => return None,
            },

            c => c,
        };

        string.push(c);
    }

    Some(string)
}

fn immediate(text: &str) -> Option<i32> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, text),
    };

    let value = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()? as i32,
        None => digits.parse::<u32>().ok()? as i32,
    };

    Some(if negative { value.wrapping_neg() } else { value })
}

fn register(name: &str) -> Option<Reg> {
    const NAMES: [&str; 32] = [
        "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5",
        "t6", "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp",
        "sp", "fp", "ra",
    ];

    let name = name.strip_prefix('$')?;
    let number = match name.parse::<u8>() {
        Ok(number) => number,
        Err(_) => NAMES.iter().position(|known| *known == name)? as u8,
    };

    (number < 32).then(|| Reg(number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn labels_and_data() {
        let program = Program::parse(
            ".data
             newline: .asciiz \"#\\n\"   # no es comentario dentro de comillas
             table: .word 1, -2, 0x10
             .text
             .globl main
             main: li $v0, 10
             loop:
                beqz $t0, loop
                la $a0, table
                lw $t1, -4($sp)
                sw $t1, ($a0)
                syscall",
        )
        .unwrap();

        assert_eq!(program.entry, 0);
        assert_eq!(program.len(), 6);
        assert_eq!(&program.data[..3], b"#\n\0");
        assert_eq!(&program.data[3..7], &1i32.to_le_bytes());
        assert_eq!(&program.data[7..11], &(-2i32).to_le_bytes());

        assert_eq!(
            program.text,
            vec![
                Instr::Li(Reg::V0, 10),
                Instr::Beqz(Reg(8), 1),
                Instr::La(Reg::A0, DATA_BASE + 3),
                Instr::Lw(Reg(9), -4, Reg::SP),
                Instr::Sw(Reg(9), 0, Reg::A0),
                Instr::Syscall,
            ]
        );
    }

    #[test]
    fn dotted_labels() {
        let program = Program::parse("main:\n jal user_f.1\n syscall\nuser_f.1:\n jr $ra").unwrap();
        assert_eq!(program.text[0], Instr::Jal(2));
        assert_eq!(program.text[2], Instr::Jr(Reg::RA));
    }

    #[test]
    fn load_errors() {
        let cases = [
            ("main:\n frob $t0", LoadError::UnknownInstruction { line: 2, opcode: "frob".into() }),
            ("main:\n li $t77, 1", LoadError::BadRegister { line: 2, name: "$t77".into() }),
            ("main:\n j nowhere", LoadError::UndefinedLabel { line: 2, label: "nowhere".into() }),
            ("main:\nmain:", LoadError::DuplicateLabel { line: 2, label: "main".into() }),
            ("start:\n nop", LoadError::NoEntry),
            (
                "main:\n addu $t0, $t1",
                LoadError::OperandCount {
                    line: 2,
                    opcode: "addu".into(),
                    expected: 3,
                    found: 2,
                },
            ),
            ("main:\n lw $t0, 4[$sp]", LoadError::BadOperand { line: 2, operand: "4[$sp]".into() }),
            (".section x\nmain:", LoadError::UnknownDirective { line: 1, directive: ".section".into() }),
        ];

        for (source, expected) in cases.iter() {
            assert_eq!(Program::parse(source).err().as_ref(), Some(expected));
        }
    }

    #[test]
    fn immediates() {
        assert_eq!(immediate("42"), Some(42));
        assert_eq!(immediate("-8"), Some(-8));
        assert_eq!(immediate("0x7FFFFFFC"), Some(0x7FFF_FFFC));
        assert_eq!(immediate("-2147483648"), Some(i32::MIN));
        assert_eq!(immediate("ten"), None);
    }
}
