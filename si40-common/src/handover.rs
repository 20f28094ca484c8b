// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Transfer of control from the bootloader to the application image.

use crate::layout::{Region, APP_ADDR};
use crate::storage::{ReadStorage, StorageError};

/// The two leading entries of a Cortex-M vector table.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VectorTable {
    pub initial_sp: u32,
    pub reset_vector: u32,
}

impl VectorTable {
    pub fn read<S: ReadStorage + ?Sized>(storage: &mut S) -> Result<Self, StorageError> {
        let mut words = [0u32; 2];
        storage.read_words(Region::Application, 0, &mut words)?;
        Ok(Self {
            initial_sp: words[0],
            reset_vector: words[1],
        })
    }
}

/// CPU operations needed to start another image. Only the hardware
/// implementation actually leaves the bootloader; `jump` does not return
/// there.
pub trait Handover {
    fn disable_interrupts(&mut self);
    fn set_stack_pointer(&mut self, addr: u32);
    fn set_vector_table_base(&mut self, addr: u32);
    fn jump(&mut self, entry: u32);
}

/// Run the handover sequence in its required order: interrupts off, stack
/// pointer, vector table base, entry.
pub fn start_application<H: Handover + ?Sized>(cpu: &mut H, vt: VectorTable) {
    cpu.disable_interrupts();
    cpu.set_stack_pointer(vt.initial_sp);
    cpu.set_vector_table_base(APP_ADDR);
    cpu.jump(vt.reset_vector);
}
