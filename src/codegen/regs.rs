//! Asignación de registros.
//!
//! Los temporales permanecen en un registro desde su definición hasta su
//! único uso. Las variables con nombre solo se cargan durante el cuádruplo
//! que las usa y, si fueron modificadas, se devuelven a su espacio en pila
//! al terminar este. Cuando no queda un registro libre se desaloja la
//! asignación menos recientemente usada. Desalojar un temporal pierde su
//! valor, ya que los temporales no tienen espacio en pila.

use std::rc::Rc;
use tracing::warn;

use super::{CodegenError, CodegenWarning, Generator, Home};
use crate::{
    arch::{Reg, Register},
    ir::{Operand, Temp},
};

pub struct Allocations<R: Register> {
    slots: Vec<Slot<R>>,
    next_id: usize,
}

struct Slot<R: Register> {
    reg: R,
    entry: Option<Entry>,
}

struct Entry {
    holder: Holder,
    dirty: bool,
    sequence: usize,

    // En uso por el cuádruplo actual, no puede desalojarse
    pinned: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Holder {
    Temp(Temp),
    Name(Rc<str>),
    Scratch,
}

impl<'a> Generator<'a> {
    /// Obtiene un registro con el valor de un operando.
    pub(super) fn read(&mut self, operand: &Operand) -> Result<Reg, CodegenError> {
        match operand {
            Operand::Int(value) => {
                let reg = self.scratch()?;
                self.instr("li", format!("{}, {}", reg, value));

                Ok(reg)
            }

            Operand::Temp(temp) => {
                if let Some(reg) = self.regs.pin(&Holder::Temp(*temp)) {
                    self.consumed.push(*temp);
                    return Ok(reg);
                }

                if !self.lost.contains(temp) {
                    return Err(CodegenError::UndefinedTemporary(*temp));
                }

                // El valor se perdió en un desalojo previo, ya fue advertido
                self.scratch()
            }

            Operand::Name(name) => {
                let holder = Holder::Name(Rc::clone(name));
                if let Some(reg) = self.regs.pin(&holder) {
                    return Ok(reg);
                }

                let home = self.home(name)?;
                let reg = self.take_slot(holder, false)?;
                self.load(reg, home);

                Ok(reg)
            }

            Operand::None | Operand::Label(_) => Err(CodegenError::UnexpectedOperand(operand.clone())),
        }
    }

    /// Obtiene un registro que recibirá el nuevo valor de un operando.
    pub(super) fn write(&mut self, operand: &Operand) -> Result<Reg, CodegenError> {
        let holder = match operand {
            Operand::Temp(temp) => Holder::Temp(*temp),
            Operand::Name(name) => {
                self.home(name)?;
                Holder::Name(Rc::clone(name))
            }

            _ => return Err(CodegenError::UnexpectedOperand(operand.clone())),
        };

        if let Some(reg) = self.regs.pin(&holder) {
            self.regs.mark_dirty(reg);
            return Ok(reg);
        }

        self.take_slot(holder, true)
    }

    /// Registro libre durante el cuádruplo actual.
    pub(super) fn scratch(&mut self) -> Result<Reg, CodegenError> {
        self.take_slot(Holder::Scratch, false)
    }

    /// Cierra un cuádruplo.
    ///
    /// Las variables modificadas regresan a pila y los temporales leídos
    /// liberan su registro.
    pub(super) fn settle(&mut self) -> Result<(), CodegenError> {
        for temp in std::mem::take(&mut self.consumed) {
            self.regs.release(&Holder::Temp(temp));
        }

        let mut stores = Vec::new();
        for slot in self.regs.slots.iter_mut() {
            let entry = match &mut slot.entry {
                Some(entry) => entry,
                None => continue,
            };

            entry.pinned = false;
            match &entry.holder {
                Holder::Temp(_) => continue,
                Holder::Name(name) if entry.dirty => stores.push((slot.reg, Rc::clone(name))),
                _ => (),
            }

            slot.entry = None;
        }

        for (reg, name) in stores {
            let home = self.home(&name)?;
            self.store(reg, home);
        }

        Ok(())
    }

    /// Olvida toda asignación, como ocurre al cruzar una llamada o un
    /// límite de procedimiento.
    pub(super) fn clear(&mut self) -> Result<(), CodegenError> {
        self.settle()?;

        let live: Vec<Temp> = self
            .regs
            .slots
            .iter_mut()
            .filter_map(|slot| match slot.entry.take() {
                Some(Entry {
                    holder: Holder::Temp(temp),
                    ..
                }) => Some(temp),
                _ => None,
            })
            .collect();

        for temp in live {
            self.lose(temp);
        }

        Ok(())
    }

    fn take_slot(&mut self, holder: Holder, dirty: bool) -> Result<Reg, CodegenError> {
        let sequence = self.regs.next_sequence();
        let entry = Entry {
            holder,
            dirty,
            sequence,
            pinned: true,
        };

        let slot = self.find_slot()?;
        let evicted = self.regs.slots[slot].entry.replace(entry);

        let reg = self.regs.slots[slot].reg;
        match evicted {
            Some(Entry {
                holder: Holder::Temp(temp),
                ..
            }) => self.lose(temp),

            Some(Entry {
                holder: Holder::Name(name),
                dirty: true,
                ..
            }) => {
                let home = self.home(&name)?;
                self.store(reg, home);
            }

            _ => (),
        }

        Ok(reg)
    }

    fn find_slot(&mut self) -> Result<usize, CodegenError> {
        let slots = &self.regs.slots;
        if let Some(free) = slots.iter().position(|slot| slot.entry.is_none()) {
            return Ok(free);
        }

        // Todos los registros están ocupados, se desaloja alguno
        slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match &slot.entry {
                Some(entry) if !entry.pinned => Some((index, entry.sequence)),
                _ => None,
            })
            .min_by_key(|(_, sequence)| *sequence)
            .map(|(index, _)| index)
            .ok_or(CodegenError::RegisterExhaustion)
    }

    fn lose(&mut self, temp: Temp) {
        let warning = CodegenWarning::LostTemporary(temp);
        warn!("{}", warning);

        self.comment(warning.to_string());
        self.warnings.push(warning);
        self.lost.insert(temp);
    }

    fn load(&mut self, reg: Reg, home: Home) {
        match home {
            Home::Direct(offset) => self.instr("lw", format!("{}, {}({})", reg, offset, Reg::Sp)),
            Home::Indirect(pointer) => {
                self.instr("lw", format!("{}, {}({})", Reg::V1, pointer, Reg::Sp));
                self.instr("lw", format!("{}, 0({})", reg, Reg::V1));
            }
        }
    }

    pub(super) fn store(&mut self, reg: Reg, home: Home) {
        match home {
            Home::Direct(offset) => self.instr("sw", format!("{}, {}({})", reg, offset, Reg::Sp)),
            Home::Indirect(pointer) => {
                self.instr("lw", format!("{}, {}({})", Reg::V1, pointer, Reg::Sp));
                self.instr("sw", format!("{}, 0({})", reg, Reg::V1));
            }
        }
    }
}

impl<R: Register> Allocations<R> {
    /// Marca como en uso al registro que ya guarda a `holder`, si existe.
    fn pin(&mut self, holder: &Holder) -> Option<R> {
        let sequence = self.next_sequence();
        let slot = self.slots.iter_mut().find(|slot| match &slot.entry {
            Some(entry) => entry.holder == *holder,
            None => false,
        })?;

        if let Some(entry) = &mut slot.entry {
            entry.pinned = true;
            entry.sequence = sequence;
        }

        Some(slot.reg)
    }

    fn mark_dirty(&mut self, reg: R) {
        for slot in self.slots.iter_mut().filter(|slot| slot.reg == reg) {
            if let Some(entry) = &mut slot.entry {
                entry.dirty = true;
            }
        }
    }

    fn release(&mut self, holder: &Holder) {
        for slot in self.slots.iter_mut() {
            if matches!(&slot.entry, Some(entry) if entry.holder == *holder) {
                slot.entry = None;
            }
        }
    }

    fn next_sequence(&mut self) -> usize {
        let next = self.next_id;
        self.next_id += 1;

        next
    }
}

impl<R: Register> Default for Allocations<R> {
    fn default() -> Self {
        let slots = R::FILE
            .iter()
            .copied()
            .map(|reg| Slot { reg, entry: None })
            .collect::<Vec<_>>();

        Allocations { slots, next_id: 0 }
    }
}
