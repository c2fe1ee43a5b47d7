//! x86 register context.
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

const CONTEXT_SIZE: usize = 0x2CC;
const CONTEXT_I386: u32 = 0x0001_0000;
const CONTEXT_XSTATE: u32 = CONTEXT_I386 | 0x40;
// FLOATING_SAVE_AREA between the debug registers and the segment registers.
const FLOAT_SAVE_SIZE: usize = 0x70;
// ExtendedRegisters past SegSs.
const EXTENDED_REGISTERS_SIZE: usize = CONTEXT_SIZE - 0xCC;

/// x86 `CONTEXT`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct X86Context {
    pub context_flags: u32,
    pub dr0: u32,
    pub dr1: u32,
    pub dr2: u32,
    pub dr3: u32,
    pub dr6: u32,
    pub dr7: u32,
    pub float_save: RawRegisters<FLOAT_SAVE_SIZE>,
    pub seg_gs: u32,
    pub seg_fs: u32,
    pub seg_es: u32,
    pub seg_ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub ebp: u32,
    pub eip: u32,
    pub seg_cs: u32,
    pub e_flags: u32,
    pub esp: u32,
    pub seg_ss: u32,
    pub extended_registers: RawRegisters<EXTENDED_REGISTERS_SIZE>,
}

named_registers!(X86Context, u32, {
    "Edi" => edi,
    "Esi" => esi,
    "Ebx" => ebx,
    "Edx" => edx,
    "Ecx" => ecx,
    "Eax" => eax,
    "Ebp" => ebp,
    "Eip" => eip,
    "Esp" => esp,
    "EFlags" => e_flags,
});

impl ArchContext for X86Context {
    const ARCHITECTURE: Architecture = Architecture::X86;
    const SIZE: usize = CONTEXT_SIZE;
    const CALLEE_SAVED_REGISTERS: &'static [&'static str] = &["Edi", "Esi", "Ebx", "Ebp"];
    const XSTATE_FLAGS: u32 = CONTEXT_XSTATE & !CONTEXT_I386;

    fn from_bytes(bytes: &[u8]) -> SwResult<Self> {
        let mut offset = 0usize;
        let mut context = X86Context {
            context_flags: bytes.gread_with(&mut offset, LE)?,
            dr0: bytes.gread_with(&mut offset, LE)?,
            dr1: bytes.gread_with(&mut offset, LE)?,
            dr2: bytes.gread_with(&mut offset, LE)?,
            dr3: bytes.gread_with(&mut offset, LE)?,
            dr6: bytes.gread_with(&mut offset, LE)?,
            dr7: bytes.gread_with(&mut offset, LE)?,
            float_save: RawRegisters::read(bytes, &mut offset)?,
            ..Default::default()
        };
        context.seg_gs = bytes.gread_with(&mut offset, LE)?;
        context.seg_fs = bytes.gread_with(&mut offset, LE)?;
        context.seg_es = bytes.gread_with(&mut offset, LE)?;
        context.seg_ds = bytes.gread_with(&mut offset, LE)?;
        context.edi = bytes.gread_with(&mut offset, LE)?;
        context.esi = bytes.gread_with(&mut offset, LE)?;
        context.ebx = bytes.gread_with(&mut offset, LE)?;
        context.edx = bytes.gread_with(&mut offset, LE)?;
        context.ecx = bytes.gread_with(&mut offset, LE)?;
        context.eax = bytes.gread_with(&mut offset, LE)?;
        context.ebp = bytes.gread_with(&mut offset, LE)?;
        context.eip = bytes.gread_with(&mut offset, LE)?;
        context.seg_cs = bytes.gread_with(&mut offset, LE)?;
        context.e_flags = bytes.gread_with(&mut offset, LE)?;
        context.esp = bytes.gread_with(&mut offset, LE)?;
        context.seg_ss = bytes.gread_with(&mut offset, LE)?;
        context.extended_registers = RawRegisters::read(bytes, &mut offset)?;
        Ok(context)
    }

    fn write_to(&self, buffer: &mut [u8]) -> SwResult<()> {
        let mut offset = 0usize;
        for value in [self.context_flags, self.dr0, self.dr1, self.dr2, self.dr3, self.dr6, self.dr7] {
            buffer.gwrite_with(value, &mut offset, LE)?;
        }
        self.float_save.write(buffer, &mut offset)?;
        for value in [
            self.seg_gs,
            self.seg_fs,
            self.seg_es,
            self.seg_ds,
            self.edi,
            self.esi,
            self.ebx,
            self.edx,
            self.ecx,
            self.eax,
            self.ebp,
            self.eip,
            self.seg_cs,
            self.e_flags,
            self.esp,
            self.seg_ss,
        ] {
            buffer.gwrite_with(value, &mut offset, LE)?;
        }
        self.extended_registers.write(buffer, &mut offset)
    }

    fn instruction_pointer(&self) -> u64 {
        self.eip as u64
    }

    fn set_instruction_pointer(&mut self, value: u64) {
        self.eip = value as u32;
    }

    fn stack_pointer(&self) -> u64 {
        self.esp as u64
    }

    fn set_stack_pointer(&mut self, value: u64) {
        self.esp = value as u32;
    }

    fn frame_pointer(&self) -> u64 {
        self.ebp as u64
    }

    fn set_frame_pointer(&mut self, value: u64) {
        self.ebp = value as u32;
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
        let context = X86Context { context_flags: CONTEXT_I386, edi: 0x11, eip: 0x22, esp: 0x33, ..Default::default() };
        let bytes = context.to_bytes().unwrap();
        assert_eq!(bytes.len(), 0x2CC);
        assert_eq!(bytes.pread_with::<u32>(0x00, LE).unwrap(), CONTEXT_I386);
        assert_eq!(bytes.pread_with::<u32>(0x9C, LE).unwrap(), 0x11);
        assert_eq!(bytes.pread_with::<u32>(0xB8, LE).unwrap(), 0x22);
        assert_eq!(bytes.pread_with::<u32>(0xC4, LE).unwrap(), 0x33);
        assert_eq!(X86Context::from_bytes(&bytes).unwrap(), context);
    }

    #[test]
    fn test_float_and_extended_state_survive() {
        let mut bytes = X86Context::default().to_bytes().unwrap();
        // FloatSave.ControlWord and the first XMM register of ExtendedRegisters.
        bytes[0x1C..0x20].copy_from_slice(&0x037Fu32.to_le_bytes());
        bytes[0x16C..0x17C].fill(0xAB);
        let context = X86Context::from_bytes(&bytes).unwrap();
        assert_eq!(context.float_save.0[0], 0x7F);
        assert_eq!(context.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_register_truncates_to_32_bits() {
        let mut context = X86Context::default();
        assert!(context.set_register("Ebx", 0x1_2345_6789));
        assert_eq!(context.ebx, 0x2345_6789);
        assert!(!context.set_register("Rbx", 0));
    }

    #[test]
    fn test_short_buffer() {
        assert!(X86Context::from_bytes(&[0u8; 0x20]).is_err());
    }
}
