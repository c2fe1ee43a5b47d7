//! ARM64 frame handler.
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
    context::{Architecture, Arm64Context},
    data::{
        FaultingExceptionFrame, FramedMethodFrame, FuncEvalFrame, HijackFrame, InlinedCallFrame, ResumableFrame,
        SoftwareExceptionFrame, TailCallFrame,
    },
    error::{Error, SwResult},
    target::Target,
};

/// Unwinds an [`Arm64Context`].
pub struct Arm64FrameHandler<'a, T: Target + ?Sized> {
    base: BaseFrameHandler<'a, T, Arm64Context>,
}

impl<'a, T: Target + ?Sized> Arm64FrameHandler<'a, T> {
    pub fn new(target: &'a T, context: &'a mut Arm64Context) -> Self {
        Self { base: BaseFrameHandler::new(target, context) }
    }
}

impl<T: Target + ?Sized> PlatformFrameHandler for Arm64FrameHandler<'_, T> {
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

    fn handle_tail_call_frame(&mut self, _frame: &TailCallFrame) -> SwResult<()> {
        Err(Error::UnsupportedFrame(FrameType::TailCallFrame, Architecture::Arm64))
    }
}
