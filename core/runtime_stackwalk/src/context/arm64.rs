//! ARM64 register context.
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

const CONTEXT_SIZE: usize = 0x390;
// V registers, Fpcr, Fpsr and the debug registers past Pc.
const FLOAT_STATE_SIZE: usize = CONTEXT_SIZE - 0x110;

/// ARM64 `CONTEXT`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Arm64Context {
    pub context_flags: u32,
    pub cpsr: u32,
    /// X0 - X28
    pub x: [u64; 29],
    pub fp: u64,
    pub lr: u64,
    pub sp: u64,
    pub pc: u64,
    pub float_state: RawRegisters<FLOAT_STATE_SIZE>,
}

named_registers!(Arm64Context, u64, {
    "X0" => x[0],
    "X1" => x[1],
    "X2" => x[2],
    "X3" => x[3],
    "X4" => x[4],
    "X5" => x[5],
    "X6" => x[6],
    "X7" => x[7],
    "X8" => x[8],
    "X9" => x[9],
    "X10" => x[10],
    "X11" => x[11],
    "X12" => x[12],
    "X13" => x[13],
    "X14" => x[14],
    "X15" => x[15],
    "X16" => x[16],
    "X17" => x[17],
    "X18" => x[18],
    "X19" => x[19],
    "X20" => x[20],
    "X21" => x[21],
    "X22" => x[22],
    "X23" => x[23],
    "X24" => x[24],
    "X25" => x[25],
    "X26" => x[26],
    "X27" => x[27],
    "X28" => x[28],
    "Fp" => fp,
    "Lr" => lr,
    "Sp" => sp,
    "Pc" => pc,
});

impl ArchContext for Arm64Context {
    const ARCHITECTURE: Architecture = Architecture::Arm64;
    const SIZE: usize = CONTEXT_SIZE;
    const CALLEE_SAVED_REGISTERS: &'static [&'static str] =
        &["X19", "X20", "X21", "X22", "X23", "X24", "X25", "X26", "X27", "X28", "Fp", "Lr"];
    const XSTATE_FLAGS: u32 = 0;

    fn from_bytes(bytes: &[u8]) -> SwResult<Self> {
        let offset = &mut 0usize;
        let mut context = Arm64Context {
            context_flags: bytes.gread_with(offset, LE)?,
            cpsr: bytes.gread_with(offset, LE)?,
            ..Default::default()
        };
        for register in context.x.iter_mut() {
            *register = bytes.gread_with(offset, LE)?;
        }
        context.fp = bytes.gread_with(offset, LE)?;
        context.lr = bytes.gread_with(offset, LE)?;
        context.sp = bytes.gread_with(offset, LE)?;
        context.pc = bytes.gread_with(offset, LE)?;
        context.float_state = RawRegisters::read(bytes, offset)?;
        Ok(context)
    }

    fn write_to(&self, buffer: &mut [u8]) -> SwResult<()> {
        let offset = &mut 0usize;
        buffer.gwrite_with(self.context_flags, offset, LE)?;
        buffer.gwrite_with(self.cpsr, offset, LE)?;
        for register in self.x.iter().chain([self.fp, self.lr, self.sp, self.pc].iter()) {
            buffer.gwrite_with(*register, offset, LE)?;
        }
        self.float_state.write(buffer, offset)
    }

    fn instruction_pointer(&self) -> u64 {
        self.pc
    }

    fn set_instruction_pointer(&mut self, value: u64) {
        self.pc = value;
    }

    fn stack_pointer(&self) -> u64 {
        self.sp
    }

    fn set_stack_pointer(&mut self, value: u64) {
        self.sp = value;
    }

    fn frame_pointer(&self) -> u64 {
        self.fp
    }

    fn set_frame_pointer(&mut self, value: u64) {
        self.fp = value;
    }

    fn context_flags(&self) -> u32 {
        self.context_flags
    }

    fn set_context_flags(&mut self, value: u32) {
        self.context_flags = value;
    }

    fn register(&self, name: &str) -> Option<u64> {
        self.slot(name).copied()
    }

    fn set_register(&mut self, name: &str, value: u64) -> bool {
        match self.slot_mut(name) {
            Some(slot) => {
                *slot = value;
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
        let mut context = Arm64Context { fp: 0xF0, lr: 0x1E, sp: 0x5F, pc: 0x9C, ..Default::default() };
        context.x[19] = 0x19;
        context.x[28] = 0x28;
        let bytes = context.to_bytes().unwrap();
        assert_eq!(bytes.pread_with::<u64>(0xA0, LE).unwrap(), 0x19);
        assert_eq!(bytes.pread_with::<u64>(0xE8, LE).unwrap(), 0x28);
        assert_eq!(bytes.pread_with::<u64>(0xF0, LE).unwrap(), 0xF0);
        assert_eq!(bytes.pread_with::<u64>(0xF8, LE).unwrap(), 0x1E);
        assert_eq!(bytes.pread_with::<u64>(0x100, LE).unwrap(), 0x5F);
        assert_eq!(bytes.pread_with::<u64>(0x108, LE).unwrap(), 0x9C);
        assert_eq!(Arm64Context::from_bytes(&bytes).unwrap(), context);
    }

    #[test]
    fn test_v_registers_survive() {
        let mut bytes = Arm64Context::default().to_bytes().unwrap();
        bytes[0x110..0x120].fill(0xAB);
        bytes[0x38F] = 0x01;
        let context = Arm64Context::from_bytes(&bytes).unwrap();
        assert_eq!(context.float_state.0[0], 0xAB);
        assert_eq!(context.to_bytes().unwrap(), bytes);
    }
}
