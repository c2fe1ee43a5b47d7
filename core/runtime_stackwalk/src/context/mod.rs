//! Register Contexts
//!
//! A register context is the CPU state being unwound frame by frame. Each
//! supported architecture has its own context type mirroring the native
//! `CONTEXT` record, so a context can be read straight out of target memory
//! and written back out byte for byte. Only the integer state is modelled; the
//! floating point and vector areas are carried through as [`RawRegisters`].
//!
//! The [`ArchContext`] trait is the architecture agnostic surface the frame
//! handlers use. [`PlatformContext`] is the closed set of the four contexts a
//! walk can carry.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!
use alloc::{vec, vec::Vec};
use core::fmt::{self, Debug};

use scroll::{Pread, Pwrite, LE};

use crate::{
    error::SwResult,
    target::{Target, TargetPointer},
};

pub use amd64::Amd64Context;
pub use arm::ArmContext;
pub use arm64::Arm64Context;
pub use x86::X86Context;

/// Maps descriptor register names onto context fields.
macro_rules! named_registers {
    ($context:ty, $width:ty, { $($name:literal => $field:ident $([$index:literal])?),* $(,)? }) => {
        impl $context {
            fn slot(&self, name: &str) -> Option<&$width> {
                match name {
                    $($name => Some(&self.$field $([$index])?),)*
                    _ => None,
                }
            }

            fn slot_mut(&mut self, name: &str) -> Option<&mut $width> {
                match name {
                    $($name => Some(&mut self.$field $([$index])?),)*
                    _ => None,
                }
            }
        }
    };
}

mod amd64;
mod arm;
mod arm64;
mod x86;

/// A block of `CONTEXT` state the walker never interprets, kept as raw bytes
/// so a context written back out matches the record it was read from.
#[derive(Clone, PartialEq, Eq)]
pub struct RawRegisters<const N: usize>(pub [u8; N]);

impl<const N: usize> RawRegisters<N> {
    pub(crate) fn read(bytes: &[u8], offset: &mut usize) -> SwResult<Self> {
        let mut raw = Self::default();
        bytes.gread_inout_with(offset, &mut raw.0, LE)?;
        Ok(raw)
    }

    pub(crate) fn write(&self, buffer: &mut [u8], offset: &mut usize) -> SwResult<()> {
        buffer.gwrite_with(&self.0[..], offset, ())?;
        Ok(())
    }
}

impl<const N: usize> Default for RawRegisters<N> {
    fn default() -> Self {
        Self([0; N])
    }
}

impl<const N: usize> Debug for RawRegisters<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nonzero = self.0.iter().filter(|byte| **byte != 0).count();
        write!(f, "RawRegisters<{N:#x}>({nonzero} nonzero)")
    }
}

/// CPU architectures a target process can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Architecture {
    X86,
    Amd64,
    Arm,
    Arm64,
}

impl Architecture {
    pub const fn pointer_size(self) -> usize {
        match self {
            Architecture::X86 | Architecture::Arm => 4,
            Architecture::Amd64 | Architecture::Arm64 => 8,
        }
    }
}

/// Architecture agnostic access to a register context.
pub trait ArchContext: Debug + Default + Clone + PartialEq {
    const ARCHITECTURE: Architecture;

    /// Size of the native `CONTEXT` record.
    const SIZE: usize;

    /// Registers a callee preserves under the runtime's calling convention.
    const CALLEE_SAVED_REGISTERS: &'static [&'static str];

    /// Context flag bits describing extended state a plain context cannot hold.
    const XSTATE_FLAGS: u32;

    /// Parses a native `CONTEXT` record.
    fn from_bytes(bytes: &[u8]) -> SwResult<Self>;

    /// Serializes the context into a native `CONTEXT` record of `SIZE` bytes.
    fn write_to(&self, buffer: &mut [u8]) -> SwResult<()>;

    fn instruction_pointer(&self) -> u64;
    fn set_instruction_pointer(&mut self, value: u64);
    fn stack_pointer(&self) -> u64;
    fn set_stack_pointer(&mut self, value: u64);
    fn frame_pointer(&self) -> u64;
    fn set_frame_pointer(&mut self, value: u64);
    fn context_flags(&self) -> u32;
    fn set_context_flags(&mut self, value: u32);

    /// Reads a register by its descriptor name.
    fn register(&self, name: &str) -> Option<u64>;

    /// Writes a register by its descriptor name. Returns false if the
    /// architecture has no such register.
    fn set_register(&mut self, name: &str, value: u64) -> bool;

    fn to_bytes(&self) -> SwResult<Vec<u8>> {
        let mut buffer = vec![0u8; Self::SIZE];
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }

    /// Replaces the whole context with the `CONTEXT` record at `address`.
    fn read_from_address<T: Target + ?Sized>(&mut self, target: &T, address: TargetPointer) -> SwResult<()> {
        let mut buffer = vec![0u8; Self::SIZE];
        target.read_bytes(address, &mut buffer)?;
        *self = Self::from_bytes(&buffer)?;
        Ok(())
    }
}

/// A register context of one of the supported architectures.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformContext {
    X86(X86Context),
    Amd64(Amd64Context),
    Arm(ArmContext),
    Arm64(Arm64Context),
}

macro_rules! with_context {
    ($self:expr, $context:ident => $body:expr) => {
        match $self {
            PlatformContext::X86($context) => $body,
            PlatformContext::Amd64($context) => $body,
            PlatformContext::Arm($context) => $body,
            PlatformContext::Arm64($context) => $body,
        }
    };
}

impl PlatformContext {
    /// An all-zero context for `architecture`.
    pub fn new(architecture: Architecture) -> Self {
        match architecture {
            Architecture::X86 => PlatformContext::X86(X86Context::default()),
            Architecture::Amd64 => PlatformContext::Amd64(Amd64Context::default()),
            Architecture::Arm => PlatformContext::Arm(ArmContext::default()),
            Architecture::Arm64 => PlatformContext::Arm64(Arm64Context::default()),
        }
    }

    pub fn architecture(&self) -> Architecture {
        match self {
            PlatformContext::X86(_) => Architecture::X86,
            PlatformContext::Amd64(_) => Architecture::Amd64,
            PlatformContext::Arm(_) => Architecture::Arm,
            PlatformContext::Arm64(_) => Architecture::Arm64,
        }
    }

    pub fn instruction_pointer(&self) -> u64 {
        with_context!(self, context => context.instruction_pointer())
    }

    pub fn stack_pointer(&self) -> u64 {
        with_context!(self, context => context.stack_pointer())
    }

    pub fn frame_pointer(&self) -> u64 {
        with_context!(self, context => context.frame_pointer())
    }

    pub fn context_flags(&self) -> u32 {
        with_context!(self, context => context.context_flags())
    }

    pub fn register(&self, name: &str) -> Option<u64> {
        with_context!(self, context => context.register(name))
    }

    pub fn set_register(&mut self, name: &str, value: u64) -> bool {
        with_context!(self, context => context.set_register(name, value))
    }

    pub fn read_from_address<T: Target + ?Sized>(&mut self, target: &T, address: TargetPointer) -> SwResult<()> {
        with_context!(self, context => context.read_from_address(target, address))
    }

    pub fn to_bytes(&self) -> SwResult<Vec<u8>> {
        with_context!(self, context => context.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_matches_architecture() {
        for arch in [Architecture::X86, Architecture::Amd64, Architecture::Arm, Architecture::Arm64] {
            let context = PlatformContext::new(arch);
            assert_eq!(context.architecture(), arch);
            assert_eq!(context.instruction_pointer(), 0);
        }
    }

    #[test]
    fn test_to_bytes_size() {
        assert_eq!(PlatformContext::new(Architecture::X86).to_bytes().unwrap().len(), 0x2CC);
        assert_eq!(PlatformContext::new(Architecture::Amd64).to_bytes().unwrap().len(), 0x4D0);
        assert_eq!(PlatformContext::new(Architecture::Arm).to_bytes().unwrap().len(), 0x1A0);
        assert_eq!(PlatformContext::new(Architecture::Arm64).to_bytes().unwrap().len(), 0x390);
    }

    #[test]
    fn test_raw_registers_short_buffer() {
        let mut offset = 0x10;
        assert!(RawRegisters::<0x20>::read(&[0u8; 0x28], &mut offset).is_err());

        let mut offset = 0x8;
        let raw = RawRegisters::<0x20>::read(&[0x5Au8; 0x28], &mut offset).unwrap();
        assert_eq!(offset, 0x28);
        assert!(raw.0.iter().all(|byte| *byte == 0x5A));
    }

    #[test]
    fn test_named_register_access() {
        let mut context = PlatformContext::new(Architecture::Arm64);
        assert!(context.set_register("X19", 0x1919));
        assert!(context.set_register("Fp", 0xF0F0));
        assert!(!context.set_register("Rax", 1));
        assert_eq!(context.register("X19"), Some(0x1919));
        assert_eq!(context.frame_pointer(), 0xF0F0);
    }
}
