//! Frame records pushed by the runtime onto a thread's frame chain.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!
use super::{DataType, FieldReader};
use crate::{
    error::SwResult,
    target::{FromTarget, Target, TargetPointer},
};

/// Fields common to every frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub address: TargetPointer,
    /// Type tag compared against the `<Kind>Identifier` globals.
    pub identifier: TargetPointer,
    /// The next frame in unwind order, or the terminator.
    pub next: TargetPointer,
}

impl FromTarget for Frame {
    fn read<T: Target + ?Sized>(target: &T, address: TargetPointer) -> SwResult<Self> {
        let fields = FieldReader::new(target, DataType::Frame, address)?;
        Ok(Self { address, identifier: fields.pointer("Identifier")?, next: fields.pointer("Next")? })
    }
}

/// Frame marking a P/Invoke call made from jitted code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlinedCallFrame {
    pub address: TargetPointer,
    /// Zero unless the native call is in flight.
    pub caller_return_address: TargetPointer,
    pub call_site_sp: TargetPointer,
    pub callee_saved_fp: TargetPointer,
    /// Only recorded on ARM32.
    pub sp_after_prolog: Option<TargetPointer>,
}

impl FromTarget for InlinedCallFrame {
    fn read<T: Target + ?Sized>(target: &T, address: TargetPointer) -> SwResult<Self> {
        let fields = FieldReader::new(target, DataType::InlinedCallFrame, address)?;
        Ok(Self {
            address,
            caller_return_address: fields.pointer("CallerReturnAddress")?,
            call_site_sp: fields.pointer("CallSiteSP")?,
            callee_saved_fp: fields.pointer("CalleeSavedFP")?,
            sp_after_prolog: fields.optional_pointer("SPAfterProlog")?,
        })
    }
}

impl InlinedCallFrame {
    pub fn has_active_call(&self) -> bool {
        !self.caller_return_address.is_null()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwareExceptionFrame {
    pub address: TargetPointer,
    /// Address of the CONTEXT embedded in the frame.
    pub target_context: TargetPointer,
    pub return_address: TargetPointer,
}

impl FromTarget for SoftwareExceptionFrame {
    fn read<T: Target + ?Sized>(target: &T, address: TargetPointer) -> SwResult<Self> {
        let fields = FieldReader::new(target, DataType::SoftwareExceptionFrame, address)?;
        Ok(Self {
            address,
            target_context: fields.address_of("TargetContext")?,
            return_address: fields.pointer("ReturnAddress")?,
        })
    }
}

/// Shared shape of every transition frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedMethodFrame {
    pub address: TargetPointer,
    pub transition_block_ptr: TargetPointer,
    pub method_desc_ptr: TargetPointer,
}

impl FromTarget for FramedMethodFrame {
    fn read<T: Target + ?Sized>(target: &T, address: TargetPointer) -> SwResult<Self> {
        let fields = FieldReader::new(target, DataType::FramedMethodFrame, address)?;
        Ok(Self {
            address,
            transition_block_ptr: fields.pointer("TransitionBlockPtr")?,
            method_desc_ptr: fields.pointer("MethodDescPtr")?,
        })
    }
}

/// Frame pushed while the debugger evaluates a function on the thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncEvalFrame {
    pub address: TargetPointer,
    pub debugger_eval_ptr: TargetPointer,
}

impl FromTarget for FuncEvalFrame {
    fn read<T: Target + ?Sized>(target: &T, address: TargetPointer) -> SwResult<Self> {
        let fields = FieldReader::new(target, DataType::FuncEvalFrame, address)?;
        Ok(Self { address, debugger_eval_ptr: fields.pointer("DebuggerEvalPtr")? })
    }
}

/// Frame holding a full CONTEXT to resume a redirected thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumableFrame {
    pub address: TargetPointer,
    pub target_context_ptr: TargetPointer,
}

impl FromTarget for ResumableFrame {
    fn read<T: Target + ?Sized>(target: &T, address: TargetPointer) -> SwResult<Self> {
        let fields = FieldReader::new(target, DataType::ResumableFrame, address)?;
        Ok(Self { address, target_context_ptr: fields.pointer("TargetContextPtr")? })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultingExceptionFrame {
    pub address: TargetPointer,
    /// Address of the embedded CONTEXT, if this runtime build records one.
    pub target_context: Option<TargetPointer>,
}

impl FromTarget for FaultingExceptionFrame {
    fn read<T: Target + ?Sized>(target: &T, address: TargetPointer) -> SwResult<Self> {
        let fields = FieldReader::new(target, DataType::FaultingExceptionFrame, address)?;
        Ok(Self { address, target_context: fields.optional_address("TargetContext") })
    }
}

/// Frame installed when a thread's return address was hijacked for a GC suspension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HijackFrame {
    pub address: TargetPointer,
    pub return_address: TargetPointer,
    pub hijack_args_ptr: TargetPointer,
}

impl FromTarget for HijackFrame {
    fn read<T: Target + ?Sized>(target: &T, address: TargetPointer) -> SwResult<Self> {
        let fields = FieldReader::new(target, DataType::HijackFrame, address)?;
        Ok(Self {
            address,
            return_address: fields.pointer("ReturnAddress")?,
            hijack_args_ptr: fields.pointer("HijackArgsPtr")?,
        })
    }
}

/// x86 only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailCallFrame {
    pub address: TargetPointer,
    /// Address of the embedded callee-saved register block.
    pub callee_saved_registers: TargetPointer,
    pub return_address: TargetPointer,
    pub size: u32,
}

impl FromTarget for TailCallFrame {
    fn read<T: Target + ?Sized>(target: &T, address: TargetPointer) -> SwResult<Self> {
        let fields = FieldReader::new(target, DataType::TailCallFrame, address)?;
        Ok(Self {
            address,
            callee_saved_registers: fields.address_of("CalleeSavedRegisters")?,
            return_address: fields.pointer("ReturnAddress")?,
            size: fields.size()?,
        })
    }
}
