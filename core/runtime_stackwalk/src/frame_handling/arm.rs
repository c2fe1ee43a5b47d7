//! ARM32 frame handler.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!
use super::{
    handler::{BaseFrameHandler, PlatformFrameHandler},
    FrameType,
};
use crate::{
    context::{Architecture, ArmContext},
    data::{
        FaultingExceptionFrame, FramedMethodFrame, FuncEvalFrame, HijackFrame, InlinedCallFrame, ResumableFrame,
        SoftwareExceptionFrame, TailCallFrame,
    },
    error::{Error, SwResult},
    target::Target,
};

/// Unwinds an [`ArmContext`].
pub struct ArmFrameHandler<'a, T: Target + ?Sized> {
    base: BaseFrameHandler<'a, T, ArmContext>,
}

impl<'a, T: Target + ?Sized> ArmFrameHandler<'a, T> {
    pub fn new(target: &'a T, context: &'a mut ArmContext) -> Self {
        Self { base: BaseFrameHandler::new(target, context) }
    }
}

impl<T: Target + ?Sized> PlatformFrameHandler for ArmFrameHandler<'_, T> {
    fn handle_inlined_call_frame(&mut self, frame: &InlinedCallFrame) -> SwResult<()> {
        if !self.base.handle_inlined_call_frame(frame) {
            return Ok(());
        }

        // Methods with a P/Invoke keep the post-prolog stack pointer in R9.
        if let Some(sp_after_prolog) = frame.sp_after_prolog {
            self.base.context.r[9] = sp_after_prolog.value() as u32;
        }
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

    fn handle_tail_call_frame(&mut self, _frame: &TailCallFrame) -> SwResult<()> {
        Err(Error::UnsupportedFrame(FrameType::TailCallFrame, Architecture::Arm))
    }
}
