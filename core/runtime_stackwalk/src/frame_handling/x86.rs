//! x86 frame handler.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!
use super::handler::{BaseFrameHandler, PlatformFrameHandler};
use crate::{
    context::X86Context,
    data::{
        CalleeSavedRegisters, FaultingExceptionFrame, FramedMethodFrame, FuncEvalFrame, HijackFrame, InlinedCallFrame,
        ResumableFrame, SoftwareExceptionFrame, TailCallFrame,
    },
    error::SwResult,
    target::{Target, TargetExt},
};

/// Unwinds an [`X86Context`]. x86 is the only architecture with tail call frames.
pub struct X86FrameHandler<'a, T: Target + ?Sized> {
    base: BaseFrameHandler<'a, T, X86Context>,
}

impl<'a, T: Target + ?Sized> X86FrameHandler<'a, T> {
    pub fn new(target: &'a T, context: &'a mut X86Context) -> Self {
        Self { base: BaseFrameHandler::new(target, context) }
    }
}

impl<T: Target + ?Sized> PlatformFrameHandler for X86FrameHandler<'_, T> {
    fn handle_inlined_call_frame(&mut self, frame: &InlinedCallFrame) -> SwResult<()> {
        self.base.handle_inlined_call_frame(frame);
        Ok(())
    }

    fn handle_software_exception_frame(&mut self, frame: &SoftwareExceptionFrame) -> SwResult<()> {
        self.base.handle_software_exception_frame(frame)
    }

    fn handle_transition_frame(&mut self, frame: &FramedMethodFrame) -> SwResult<()> {
        self.base.handle_transition_frame(frame)
    }

    fn handle_func_eval_frame(&mut self, frame: &FuncEvalFrame) -> SwResult<()> {
        self.base.handle_func_eval_frame(frame)
    }

    fn handle_resumable_frame(&mut self, frame: &ResumableFrame) -> SwResult<()> {
        self.base.handle_resumable_frame(frame)
    }

    fn handle_faulting_exception_frame(&mut self, frame: &FaultingExceptionFrame) -> SwResult<()> {
        self.base.handle_faulting_exception_frame(frame)
    }

    fn handle_hijack_frame(&mut self, frame: &HijackFrame) -> SwResult<()> {
        self.base.handle_hijack_frame(frame).map(|_| ())
    }

    fn handle_tail_call_frame(&mut self, frame: &TailCallFrame) -> SwResult<()> {
        let callee_saved = self.base.target.get_or_add::<CalleeSavedRegisters>(frame.callee_saved_registers)?;

        self.base.unwind_to(frame.return_address, frame.address + frame.size as u64, callee_saved.registers.iter())
    }
}
