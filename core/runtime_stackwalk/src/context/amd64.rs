//! AMD64 register context.
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

const CONTEXT_SIZE: usize = 0x4D0;
const CONTEXT_AMD64: u32 = 0x0010_0000;
const CONTEXT_XSTATE: u32 = CONTEXT_AMD64 | 0x40;
// Everything past Rip.
const EXTENDED_STATE_SIZE: usize = CONTEXT_SIZE - 0x100;

/// AMD64 `CONTEXT`. Only the integer state is broken out into fields.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Amd64Context {
    pub p1_home: u64,
    pub p2_home: u64,
    pub p3_home: u64,
    pub p4_home: u64,
    pub p5_home: u64,
    pub p6_home: u64,
    pub context_flags: u32,
    pub mx_csr: u32,
    pub seg_cs: u16,
    pub seg_ds: u16,
    pub seg_es: u16,
    pub seg_fs: u16,
    pub seg_gs: u16,
    pub seg_ss: u16,
    pub e_flags: u32,
    pub dr0: u64,
    pub dr1: u64,
    pub dr2: u64,
    pub dr3: u64,
    pub dr6: u64,
    pub dr7: u64,
    pub rax: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rbx: u64,
    pub rsp: u64,
    pub rbp: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub rip: u64,
    /// Floating point, vector and last branch state from `FltSave` onwards.
    pub extended_state: RawRegisters<EXTENDED_STATE_SIZE>,
}

named_registers!(Amd64Context, u64, {
    "Rax" => rax,
    "Rcx" => rcx,
    "Rdx" => rdx,
    "Rbx" => rbx,
    "Rsp" => rsp,
    "Rbp" => rbp,
    "Rsi" => rsi,
    "Rdi" => rdi,
    "R8" => r8,
    "R9" => r9,
    "R10" => r10,
    "R11" => r11,
    "R12" => r12,
    "R13" => r13,
    "R14" => r14,
    "R15" => r15,
    "Rip" => rip,
});

impl ArchContext for Amd64Context {
    const ARCHITECTURE: Architecture = Architecture::Amd64;
    const SIZE: usize = CONTEXT_SIZE;
    const CALLEE_SAVED_REGISTERS: &'static [&'static str] =
        &["Rbx", "Rbp", "Rsi", "Rdi", "R12", "R13", "R14", "R15"];
    const XSTATE_FLAGS: u32 = CONTEXT_XSTATE & !CONTEXT_AMD64;

    fn from_bytes(bytes: &[u8]) -> SwResult<Self> {
        let offset = &mut 0usize;
        Ok(Amd64Context {
            p1_home: bytes.gread_with(offset, LE)?,
            p2_home: bytes.gread_with(offset, LE)?,
            p3_home: bytes.gread_with(offset, LE)?,
            p4_home: bytes.gread_with(offset, LE)?,
            p5_home: bytes.gread_with(offset, LE)?,
            p6_home: bytes.gread_with(offset, LE)?,
            context_flags: bytes.gread_with(offset, LE)?,
            mx_csr: bytes.gread_with(offset, LE)?,
            seg_cs: bytes.gread_with(offset, LE)?,
            seg_ds: bytes.gread_with(offset, LE)?,
            seg_es: bytes.gread_with(offset, LE)?,
            seg_fs: bytes.gread_with(offset, LE)?,
            seg_gs: bytes.gread_with(offset, LE)?,
            seg_ss: bytes.gread_with(offset, LE)?,
            e_flags: bytes.gread_with(offset, LE)?,
            dr0: bytes.gread_with(offset, LE)?,
            dr1: bytes.gread_with(offset, LE)?,
            dr2: bytes.gread_with(offset, LE)?,
            dr3: bytes.gread_with(offset, LE)?,
            dr6: bytes.gread_with(offset, LE)?,
            dr7: bytes.gread_with(offset, LE)?,
            rax: bytes.gread_with(offset, LE)?,
            rcx: bytes.gread_with(offset, LE)?,
            rdx: bytes.gread_with(offset, LE)?,
            rbx: bytes.gread_with(offset, LE)?,
            rsp: bytes.gread_with(offset, LE)?,
            rbp: bytes.gread_with(offset, LE)?,
            rsi: bytes.gread_with(offset, LE)?,
            rdi: bytes.gread_with(offset, LE)?,
            r8: bytes.gread_with(offset, LE)?,
            r9: bytes.gread_with(offset, LE)?,
            r10: bytes.gread_with(offset, LE)?,
            r11: bytes.gread_with(offset, LE)?,
            r12: bytes.gread_with(offset, LE)?,
            r13: bytes.gread_with(offset, LE)?,
            r14: bytes.gread_with(offset, LE)?,
            r15: bytes.gread_with(offset, LE)?,
            rip: bytes.gread_with(offset, LE)?,
            extended_state: RawRegisters::read(bytes, offset)?,
        })
    }

    fn write_to(&self, buffer: &mut [u8]) -> SwResult<()> {
        let offset = &mut 0usize;
        for value in [self.p1_home, self.p2_home, self.p3_home, self.p4_home, self.p5_home, self.p6_home] {
            buffer.gwrite_with(value, offset, LE)?;
        }
        buffer.gwrite_with(self.context_flags, offset, LE)?;
        buffer.gwrite_with(self.mx_csr, offset, LE)?;
        for value in [self.seg_cs, self.seg_ds, self.seg_es, self.seg_fs, self.seg_gs, self.seg_ss] {
            buffer.gwrite_with(value, offset, LE)?;
        }
        buffer.gwrite_with(self.e_flags, offset, LE)?;
        for value in [
            self.dr0, self.dr1, self.dr2, self.dr3, self.dr6, self.dr7, self.rax, self.rcx, self.rdx, self.rbx,
            self.rsp, self.rbp, self.rsi, self.rdi, self.r8, self.r9, self.r10, self.r11, self.r12, self.r13,
            self.r14, self.r15, self.rip,
        ] {
            buffer.gwrite_with(value, offset, LE)?;
        }
        self.extended_state.write(buffer, offset)
    }

    fn instruction_pointer(&self) -> u64 {
        self.rip
    }

    fn set_instruction_pointer(&mut self, value: u64) {
        self.rip = value;
    }

    fn stack_pointer(&self) -> u64 {
        self.rsp
    }

    fn set_stack_pointer(&mut self, value: u64) {
        self.rsp = value;
    }

    fn frame_pointer(&self) -> u64 {
        self.rbp
    }

    fn set_frame_pointer(&mut self, value: u64) {
        self.rbp = value;
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
        let context = Amd64Context {
            context_flags: CONTEXT_XSTATE,
            e_flags: 0x246,
            rsp: 0x7FF0,
            rbp: 0x7FF8,
            r15: 0x1515,
            rip: 0x4000_1000,
            ..Default::default()
        };
        let bytes = context.to_bytes().unwrap();
        assert_eq!(bytes.pread_with::<u32>(0x30, LE).unwrap(), CONTEXT_XSTATE);
        assert_eq!(bytes.pread_with::<u32>(0x44, LE).unwrap(), 0x246);
        assert_eq!(bytes.pread_with::<u64>(0x98, LE).unwrap(), 0x7FF0);
        assert_eq!(bytes.pread_with::<u64>(0xA0, LE).unwrap(), 0x7FF8);
        assert_eq!(bytes.pread_with::<u64>(0xF0, LE).unwrap(), 0x1515);
        assert_eq!(bytes.pread_with::<u64>(0xF8, LE).unwrap(), 0x4000_1000);
        assert_eq!(Amd64Context::from_bytes(&bytes).unwrap(), context);
    }

    #[test]
    fn test_vector_state_survives() {
        let mut bytes = Amd64Context::default().to_bytes().unwrap();
        bytes[0x1A0..0x1B0].fill(0xAB);
        bytes[0x4C8] = 0xCD;
        let context = Amd64Context::from_bytes(&bytes).unwrap();
        assert_eq!(context.extended_state.0[0xA0], 0xAB);
        assert_eq!(context.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_xstate_flags() {
        assert_eq!(Amd64Context::XSTATE_FLAGS, 0x40);
    }
}
