//! ARM32 register context.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!
use scroll::{Pread, Pwrite, LE};

use super::{ArchContext, Architecture, RawRegisters};
use crate::error::SwResult;

const CONTEXT_SIZE: usize = 0x1A0;
// Padding, D registers and the debug registers past Fpscr.
const FLOAT_STATE_SIZE: usize = CONTEXT_SIZE - 0x4C;

/// ARM `CONTEXT`. R11 is the frame pointer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArmContext {
    pub context_flags: u32,
    pub r: [u32; 13],
    pub sp: u32,
    pub lr: u32,
    pub pc: u32,
    pub cpsr: u32,
    pub fpscr: u32,
    pub float_state: RawRegisters<FLOAT_STATE_SIZE>,
}

named_registers!(ArmContext, u32, {
    "R0" => r[0],
    "R1" => r[1],
    "R2" => r[2],
    "R3" => r[3],
    "R4" => r[4],
    "R5" => r[5],
    "R6" => r[6],
    "R7" => r[7],
    "R8" => r[8],
    "R9" => r[9],
    "R10" => r[10],
    "R11" => r[11],
    "R12" => r[12],
    "Sp" => sp,
    "Lr" => lr,
    "Pc" => pc,
    "Cpsr" => cpsr,
});

impl ArchContext for ArmContext {
    const ARCHITECTURE: Architecture = Architecture::Arm;
    const SIZE: usize = CONTEXT_SIZE;
    const CALLEE_SAVED_REGISTERS: &'static [&'static str] =
        &["R4", "R5", "R6", "R7", "R8", "R9", "R10", "R11", "Lr"];
    const XSTATE_FLAGS: u32 = 0;

    fn from_bytes(bytes: &[u8]) -> SwResult<Self> {
        let offset = &mut 0usize;
        let mut context = ArmContext { context_flags: bytes.gread_with(offset, LE)?, ..Default::default() };
        for register in context.r.iter_mut() {
            *register = bytes.gread_with(offset, LE)?;
        }
        context.sp = bytes.gread_with(offset, LE)?;
        context.lr = bytes.gread_with(offset, LE)?;
        context.pc = bytes.gread_with(offset, LE)?;
        context.cpsr = bytes.gread_with(offset, LE)?;
        context.fpscr = bytes.gread_with(offset, LE)?;
        context.float_state = RawRegisters::read(bytes, offset)?;
        Ok(context)
    }

    fn write_to(&self, buffer: &mut [u8]) -> SwResult<()> {
        let offset = &mut 0usize;
        buffer.gwrite_with(self.context_flags, offset, LE)?;
        for register in self.r.iter().chain([self.sp, self.lr, self.pc, self.cpsr, self.fpscr].iter()) {
            buffer.gwrite_with(*register, offset, LE)?;
        }
        self.float_state.write(buffer, offset)
    }

    fn instruction_pointer(&self) -> u64 {
        self.pc as u64
    }

    fn set_instruction_pointer(&mut self, value: u64) {
        self.pc = value as u32;
    }

    fn stack_pointer(&self) -> u64 {
        self.sp as u64
    }

    fn set_stack_pointer(&mut self, value: u64) {
        self.sp = value as u32;
    }

    fn frame_pointer(&self) -> u64 {
        self.r[11] as u64
    }

    fn set_frame_pointer(&mut self, value: u64) {
        self.r[11] = value as u32;
    }

    fn context_flags(&self) -> u32 {
        self.context_flags
    }

    fn set_context_flags(&mut self, value: u32) {
        self.context_flags = value;
    }

    fn register(&self, name: &str) -> Option<u64> {
        self.slot(name).map(|value| *value as u64)
    }

    fn set_register(&mut self, name: &str, value: u64) -> bool {
        match self.slot_mut(name) {
            Some(slot) => {
                *slot = value as u32;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_offsets() {
        let mut context =
            ArmContext { context_flags: 0x0020_0007, sp: 0x100, lr: 0x200, pc: 0x300, ..Default::default() };
        context.r[4] = 0x44;
        context.r[11] = 0xBB;
        let bytes = context.to_bytes().unwrap();
        assert_eq!(bytes.pread_with::<u32>(0x14, LE).unwrap(), 0x44);
        assert_eq!(bytes.pread_with::<u32>(0x30, LE).unwrap(), 0xBB);
        assert_eq!(bytes.pread_with::<u32>(0x38, LE).unwrap(), 0x100);
        assert_eq!(bytes.pread_with::<u32>(0x3C, LE).unwrap(), 0x200);
        assert_eq!(bytes.pread_with::<u32>(0x40, LE).unwrap(), 0x300);
        assert_eq!(ArmContext::from_bytes(&bytes).unwrap(), context);
        assert_eq!(context.frame_pointer(), 0xBB);
    }

    #[test]
    fn test_d_registers_survive() {
        let mut bytes = ArmContext::default().to_bytes().unwrap();
        bytes[0x50..0x58].copy_from_slice(&1.5f64.to_le_bytes());
        bytes[0x19C] = 0x7F;
        let context = ArmContext::from_bytes(&bytes).unwrap();
        assert_eq!(context.to_bytes().unwrap(), bytes);
    }
}
