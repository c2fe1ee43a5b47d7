//! Platform Frame Handlers
//!
//! A frame handler applies one frame's recorded unwind state to a register
//! context. [`PlatformFrameHandler`] is the architecture agnostic interface
//! the dispatcher calls; each architecture implements it on top of
//! [`BaseFrameHandler`], which holds the behaviour the architectures share.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!
use alloc::{rc::Rc, string::String};

#[cfg(any(test, feature = "mockall"))]
use mockall::automock;

use crate::{
    context::ArchContext,
    data::{
        CalleeSavedRegisters, DataType, DebuggerEval, FaultingExceptionFrame, FramedMethodFrame, FuncEvalFrame,
        HijackArgs, HijackFrame, InlinedCallFrame, ResumableFrame, SoftwareExceptionFrame, TailCallFrame,
        TransitionBlock,
    },
    error::{Error, SwResult},
    target::{Target, TargetExt, TargetPointer},
};

/// Updates a register context from one frame.
///
/// Exactly one method runs per frame; which one is decided by the frame's
/// kind, see [`FramePayload::dispatch`](super::FramePayload::dispatch).
#[cfg_attr(any(test, feature = "mockall"), automock)]
pub trait PlatformFrameHandler {
    fn handle_inlined_call_frame(&mut self, frame: &InlinedCallFrame) -> SwResult<()>;
    fn handle_software_exception_frame(&mut self, frame: &SoftwareExceptionFrame) -> SwResult<()>;
    /// Handles every frame kind with the transition frame layout.
    fn handle_transition_frame(&mut self, frame: &FramedMethodFrame) -> SwResult<()>;
    fn handle_func_eval_frame(&mut self, frame: &FuncEvalFrame) -> SwResult<()>;
    fn handle_resumable_frame(&mut self, frame: &ResumableFrame) -> SwResult<()>;
    fn handle_faulting_exception_frame(&mut self, frame: &FaultingExceptionFrame) -> SwResult<()>;
    fn handle_hijack_frame(&mut self, frame: &HijackFrame) -> SwResult<()>;
    fn handle_tail_call_frame(&mut self, frame: &TailCallFrame) -> SwResult<()>;
}

/// Frame handling shared by every architecture.
pub(crate) struct BaseFrameHandler<'a, T: Target + ?Sized, C: ArchContext> {
    pub(crate) target: &'a T,
    pub(crate) context: &'a mut C,
}

impl<'a, T: Target + ?Sized, C: ArchContext> BaseFrameHandler<'a, T, C> {
    pub(crate) fn new(target: &'a T, context: &'a mut C) -> Self {
        Self { target, context }
    }

    /// Returns whether the frame had a call in flight and was applied.
    pub(crate) fn handle_inlined_call_frame(&mut self, frame: &InlinedCallFrame) -> bool {
        // No call in flight, nothing to unwind to.
        if !frame.has_active_call() {
            return false;
        }

        self.context.set_instruction_pointer(frame.caller_return_address.value());
        self.context.set_stack_pointer(frame.call_site_sp.value());
        self.context.set_frame_pointer(frame.callee_saved_fp.value());
        true
    }

    pub(crate) fn handle_software_exception_frame(&mut self, frame: &SoftwareExceptionFrame) -> SwResult<()> {
        let mut thrown_context = C::default();
        thrown_context.read_from_address(self.target, frame.target_context)?;

        self.update_callee_saved_registers_from(&thrown_context);
        self.context.set_instruction_pointer(thrown_context.instruction_pointer());
        self.context.set_stack_pointer(thrown_context.stack_pointer());
        Ok(())
    }

    pub(crate) fn handle_transition_frame(&mut self, frame: &FramedMethodFrame) -> SwResult<()> {
        let transition_block = self.target.get_or_add::<TransitionBlock>(frame.transition_block_ptr)?;
        let callee_saved =
            self.target.get_or_add::<CalleeSavedRegisters>(transition_block.callee_saved_registers)?;

        // The caller's stack starts right above the transition block.
        self.unwind_to(
            transition_block.return_address,
            frame.transition_block_ptr + transition_block.size as u64,
            callee_saved.registers.iter(),
        )
    }

    pub(crate) fn handle_func_eval_frame(&mut self, frame: &FuncEvalFrame) -> SwResult<()> {
        let debugger_eval = self.target.get_or_add::<DebuggerEval>(frame.debugger_eval_ptr)?;

        // An evaluation started during exception processing has no context to
        // return to.
        if debugger_eval.eval_during_exception {
            return Ok(());
        }
        self.context.read_from_address(self.target, debugger_eval.target_context)
    }

    pub(crate) fn handle_resumable_frame(&mut self, frame: &ResumableFrame) -> SwResult<()> {
        self.context.read_from_address(self.target, frame.target_context_ptr)
    }

    pub(crate) fn handle_faulting_exception_frame(&mut self, frame: &FaultingExceptionFrame) -> SwResult<()> {
        let target_context =
            frame.target_context.ok_or(Error::MissingField(DataType::FaultingExceptionFrame, "TargetContext"))?;
        self.context.read_from_address(self.target, target_context)?;

        // The unwound context is a plain CONTEXT and cannot carry extended state.
        let flags = self.context.context_flags() & !C::XSTATE_FLAGS;
        self.context.set_context_flags(flags);
        Ok(())
    }

    /// Applies the hijack stub's saved state and returns the argument block so
    /// an architecture can apply what else it records.
    pub(crate) fn handle_hijack_frame(&mut self, frame: &HijackFrame) -> SwResult<Rc<HijackArgs>> {
        let hijack_args = self.target.get_or_add::<HijackArgs>(frame.hijack_args_ptr)?;

        // The stack pointer is the address immediately following the arguments.
        self.unwind_to(
            frame.return_address,
            frame.hijack_args_ptr + hijack_args.size as u64,
            hijack_args.all_registers(),
        )?;
        Ok(hijack_args)
    }

    /// Moves the context to `ip` and `sp` and writes the saved registers by
    /// name. Nothing is written if any register is unknown.
    pub(crate) fn unwind_to<'r>(
        &mut self,
        ip: TargetPointer,
        sp: TargetPointer,
        registers: impl IntoIterator<Item = &'r (String, u64)>,
    ) -> SwResult<()> {
        let mut unwound = self.context.clone();
        unwound.set_instruction_pointer(ip.value());
        unwound.set_stack_pointer(sp.value());
        for (name, value) in registers {
            if !unwound.set_register(name, *value) {
                return Err(Error::UnexpectedRegister(name.clone()));
            }
        }
        *self.context = unwound;
        Ok(())
    }

    fn update_callee_saved_registers_from(&mut self, other: &C) {
        for name in C::CALLEE_SAVED_REGISTERS {
            if let Some(value) = other.register(name) {
                self.context.set_register(name, value);
            }
        }
    }
}
