//! Register save areas referenced by frames.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!
use alloc::{rc::Rc, string::String, vec::Vec};

use super::{DataType, FieldReader};
use crate::{
    error::SwResult,
    target::{FromTarget, Target, TargetExt, TargetPointer},
};

/// Registers a callee must preserve, saved by a runtime stub.
///
/// Each descriptor field is one pointer-sized register named after the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalleeSavedRegisters {
    pub address: TargetPointer,
    pub registers: Vec<(String, u64)>,
}

impl FromTarget for CalleeSavedRegisters {
    fn read<T: Target + ?Sized>(target: &T, address: TargetPointer) -> SwResult<Self> {
        let fields = FieldReader::new(target, DataType::CalleeSavedRegisters, address)?;
        let mut registers = Vec::with_capacity(fields.info().fields.len());
        for (name, field) in fields.info().fields.iter() {
            let value = target.read_pointer(address + field.offset as u64)?;
            registers.push((name.clone(), value.0));
        }
        Ok(Self { address, registers })
    }
}

/// Register block that sits right above a transition frame's caller stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionBlock {
    pub address: TargetPointer,
    pub return_address: TargetPointer,
    /// Address of the embedded callee-saved register block.
    pub callee_saved_registers: TargetPointer,
    pub size: u32,
}

impl FromTarget for TransitionBlock {
    fn read<T: Target + ?Sized>(target: &T, address: TargetPointer) -> SwResult<Self> {
        let fields = FieldReader::new(target, DataType::TransitionBlock, address)?;
        Ok(Self {
            address,
            return_address: fields.pointer("ReturnAddress")?,
            callee_saved_registers: fields.address_of("CalleeSavedRegisters")?,
            size: fields.size()?,
        })
    }
}

/// Debugger bookkeeping for a function evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebuggerEval {
    pub address: TargetPointer,
    /// Address of the embedded CONTEXT the evaluation returns to.
    pub target_context: TargetPointer,
    pub eval_during_exception: bool,
}

impl FromTarget for DebuggerEval {
    fn read<T: Target + ?Sized>(target: &T, address: TargetPointer) -> SwResult<Self> {
        let fields = FieldReader::new(target, DataType::DebuggerEval, address)?;
        Ok(Self {
            address,
            target_context: fields.address_of("TargetContext")?,
            eval_during_exception: fields.u8("EvalDuringException")? != 0,
        })
    }
}

/// Fields of a hijack argument block that are not plain saved registers.
const HIJACK_ARGS_SPECIAL_FIELDS: &[&str] = &["CalleeSavedRegisters", "ReturnAddress", "Rsp"];

/// Registers spilled by the hijack stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HijackArgs {
    pub address: TargetPointer,
    pub size: u32,
    /// Caller stack pointer, recorded by the Windows AMD64 stub.
    pub stack_pointer: Option<TargetPointer>,
    pub callee_saved_registers: Option<Rc<CalleeSavedRegisters>>,
    /// Every remaining pointer-sized field, by register name.
    pub registers: Vec<(String, u64)>,
}

impl FromTarget for HijackArgs {
    fn read<T: Target + ?Sized>(target: &T, address: TargetPointer) -> SwResult<Self> {
        let fields = FieldReader::new(target, DataType::HijackArgs, address)?;
        let callee_saved_registers = match fields.optional_address("CalleeSavedRegisters") {
            Some(nested) => Some(target.get_or_add::<CalleeSavedRegisters>(nested)?),
            None => None,
        };

        let mut registers = Vec::new();
        for (name, field) in fields.info().fields.iter() {
            if HIJACK_ARGS_SPECIAL_FIELDS.contains(&name.as_str()) {
                continue;
            }
            let value = target.read_pointer(address + field.offset as u64)?;
            registers.push((name.clone(), value.0));
        }

        Ok(Self {
            address,
            size: fields.size()?,
            stack_pointer: fields.optional_pointer("Rsp")?,
            callee_saved_registers,
            registers,
        })
    }
}

impl HijackArgs {
    /// All saved registers, the nested callee-saved block first.
    pub fn all_registers(&self) -> impl Iterator<Item = &(String, u64)> {
        self.callee_saved_registers.iter().flat_map(|block| block.registers.iter()).chain(self.registers.iter())
    }
}
