//! Frame payloads and handler dispatch.
//!
//! A [`FramePayload`] is a frame's kind together with the record that kind
//! needs to unwind. Kinds sharing a record layout share a variant and keep the
//! discriminating [`FrameType`] alongside.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!
use alloc::rc::Rc;

use super::{FrameType, PlatformFrameHandler};
use crate::{
    data::{
        FaultingExceptionFrame, FramedMethodFrame, FuncEvalFrame, HijackFrame, InlinedCallFrame, ResumableFrame,
        SoftwareExceptionFrame, TailCallFrame,
    },
    error::SwResult,
    target::{Target, TargetExt, TargetPointer},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    InlinedCall(Rc<InlinedCallFrame>),
    SoftwareException(Rc<SoftwareExceptionFrame>),
    /// Any of the kinds with the transition frame layout.
    Transition(FrameType, Rc<FramedMethodFrame>),
    FuncEval(Rc<FuncEvalFrame>),
    /// `ResumableFrame` or `RedirectedThreadFrame`.
    Resumable(FrameType, Rc<ResumableFrame>),
    FaultingException(Rc<FaultingExceptionFrame>),
    Hijack(Rc<HijackFrame>),
    TailCall(Rc<TailCallFrame>),
    /// A kind that never changes the context, including `Unknown`.
    Passive(FrameType),
}

impl FramePayload {
    /// Reads the record `frame_type` needs from the frame at `address`.
    ///
    /// Passive kinds read nothing.
    pub fn fetch<T: Target + ?Sized>(target: &T, frame_type: FrameType, address: TargetPointer) -> SwResult<Self> {
        let payload = match frame_type {
            FrameType::InlinedCallFrame => FramePayload::InlinedCall(target.get_or_add(address)?),
            FrameType::SoftwareExceptionFrame => FramePayload::SoftwareException(target.get_or_add(address)?),
            FrameType::FramedMethodFrame
            | FrameType::CLRToCOMMethodFrame
            | FrameType::PInvokeCalliFrame
            | FrameType::PrestubMethodFrame
            | FrameType::StubDispatchFrame
            | FrameType::CallCountingHelperFrame
            | FrameType::ExternalMethodFrame
            | FrameType::DynamicHelperFrame => FramePayload::Transition(frame_type, target.get_or_add(address)?),
            FrameType::FuncEvalFrame => FramePayload::FuncEval(target.get_or_add(address)?),
            FrameType::ResumableFrame | FrameType::RedirectedThreadFrame => {
                FramePayload::Resumable(frame_type, target.get_or_add(address)?)
            }
            FrameType::FaultingExceptionFrame => FramePayload::FaultingException(target.get_or_add(address)?),
            FrameType::HijackFrame => FramePayload::Hijack(target.get_or_add(address)?),
            FrameType::TailCallFrame => FramePayload::TailCall(target.get_or_add(address)?),
            FrameType::Unknown
            | FrameType::UnmanagedToManagedFrame
            | FrameType::ComMethodFrame
            | FrameType::ComPrestubMethodFrame
            | FrameType::ProtectValueClassFrame
            | FrameType::DebuggerClassInitMarkFrame
            | FrameType::DebuggerExitFrame
            | FrameType::DebuggerU2MCatchHandlerFrame
            | FrameType::ExceptionFilterFrame => FramePayload::Passive(frame_type),
        };
        Ok(payload)
    }

    pub fn frame_type(&self) -> FrameType {
        match self {
            FramePayload::InlinedCall(_) => FrameType::InlinedCallFrame,
            FramePayload::SoftwareException(_) => FrameType::SoftwareExceptionFrame,
            FramePayload::Transition(frame_type, _) => *frame_type,
            FramePayload::FuncEval(_) => FrameType::FuncEvalFrame,
            FramePayload::Resumable(frame_type, _) => *frame_type,
            FramePayload::FaultingException(_) => FrameType::FaultingExceptionFrame,
            FramePayload::Hijack(_) => FrameType::HijackFrame,
            FramePayload::TailCall(_) => FrameType::TailCallFrame,
            FramePayload::Passive(frame_type) => *frame_type,
        }
    }

    /// Invokes the one handler method for this payload; passive payloads
    /// invoke none.
    pub fn dispatch<H: PlatformFrameHandler + ?Sized>(&self, handler: &mut H) -> SwResult<()> {
        match self {
            FramePayload::InlinedCall(frame) => handler.handle_inlined_call_frame(frame),
            FramePayload::SoftwareException(frame) => handler.handle_software_exception_frame(frame),
            FramePayload::Transition(_, frame) => handler.handle_transition_frame(frame),
            FramePayload::FuncEval(frame) => handler.handle_func_eval_frame(frame),
            FramePayload::Resumable(_, frame) => handler.handle_resumable_frame(frame),
            FramePayload::FaultingException(frame) => handler.handle_faulting_exception_frame(frame),
            FramePayload::Hijack(frame) => handler.handle_hijack_frame(frame),
            FramePayload::TailCall(frame) => handler.handle_tail_call_frame(frame),
            FramePayload::Passive(_) => Ok(()),
        }
    }
}
