//! Frame Iterator
//!
//! Walks the singly linked chain of frames the runtime pushes onto a thread.
//! The chain starts at the thread's head pointer and ends at a terminator
//! value of all ones sized to the target's pointer width. Every record is read
//! lazily through the target, so an iterator costs nothing until it is used.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!
use alloc::rc::Rc;
use core::cell::OnceCell;

use super::{
    Amd64FrameHandler, Arm64FrameHandler, ArmFrameHandler, FrameClassifier, FramePayload, FrameType,
    PlatformFrameHandler, X86FrameHandler,
};
use crate::{
    context::PlatformContext,
    data::{Frame, InlinedCallFrame, ThreadData},
    error::{Error, SwResult},
    target::{Target, TargetExt, TargetPointer},
};

/// Iterator over the frames of one thread.
///
/// The iterator is positioned while the current pointer differs from the
/// terminator and terminated once it reaches it. Advancing a terminated
/// iterator does nothing.
pub struct FrameIterator<'a, T: Target + ?Sized> {
    target: &'a T,
    shared_classifier: Option<&'a FrameClassifier>,
    classifier: OnceCell<FrameClassifier>,
    terminator: TargetPointer,
    current: TargetPointer,
    position: usize,
    frame_limit: Option<usize>,
}

impl<'a, T: Target + ?Sized> FrameIterator<'a, T> {
    /// Positions a new iterator at the head of `thread`'s frame chain.
    ///
    /// No target memory is read.
    pub fn new(target: &'a T, thread: &ThreadData) -> SwResult<Self> {
        let pointer_size = target.pointer_size();
        if pointer_size != 4 && pointer_size != 8 {
            return Err(Error::InvalidPointerSize(pointer_size));
        }

        Ok(Self {
            target,
            shared_classifier: None,
            classifier: OnceCell::new(),
            terminator: TargetPointer::max_for(pointer_size),
            current: thread.frame,
            position: 0,
            frame_limit: None,
        })
    }

    /// Uses an already resolved classifier instead of resolving one on first use.
    pub fn with_classifier(mut self, classifier: &'a FrameClassifier) -> Self {
        self.shared_classifier = Some(classifier);
        self
    }

    /// Fails the walk once more than `limit` frames would be visited.
    ///
    /// The limit is checked when advancing onto another frame. The frame the
    /// walk starts on is always visible, so a limit of 0 behaves like 1.
    pub fn with_frame_limit(mut self, limit: usize) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    pub fn classifier(&self) -> &FrameClassifier {
        match self.shared_classifier {
            Some(classifier) => classifier,
            None => self.classifier.get_or_init(|| FrameClassifier::resolve(self.target)),
        }
    }

    pub fn terminator(&self) -> TargetPointer {
        self.terminator
    }

    pub fn is_valid(&self) -> bool {
        self.current != self.terminator
    }

    pub fn current_frame_address(&self) -> TargetPointer {
        self.current
    }

    /// The base record of the current frame.
    pub fn current_frame(&self) -> SwResult<Rc<Frame>> {
        if !self.is_valid() {
            return Err(Error::IteratorTerminated);
        }
        self.target.get_or_add::<Frame>(self.current)
    }

    /// Moves to the next frame. Returns whether the iterator is still
    /// positioned afterwards.
    pub fn advance(&mut self) -> SwResult<bool> {
        if !self.is_valid() {
            return Ok(false);
        }

        let next = self.current_frame()?.next;
        if next != self.terminator {
            if let Some(limit) = self.frame_limit {
                if self.position + 1 >= limit {
                    log::warn!("Stopping stack walk at frame {:#x} after {} frames", self.current, limit);
                    return Err(Error::FrameLimitExceeded(limit));
                }
            }
        }

        log::trace!("Advancing from frame {:#x} to {:#x}", self.current, next);
        self.current = next;
        self.position += 1;
        Ok(self.is_valid())
    }

    pub fn current_frame_type(&self) -> SwResult<FrameType> {
        let frame = self.current_frame()?;
        Ok(self.classifier().classify(frame.identifier))
    }

    /// The current frame's kind together with the record that kind unwinds from.
    pub fn current_frame_payload(&self) -> SwResult<FramePayload> {
        let frame = self.current_frame()?;
        let frame_type = self.classifier().classify(frame.identifier);
        FramePayload::fetch(self.target, frame_type, frame.address)
    }

    /// True if the current frame is an inlined call frame whose native call is
    /// still in flight.
    pub fn is_inlined_call_frame_with_active_call(&self) -> SwResult<bool> {
        if self.current_frame_type()? != FrameType::InlinedCallFrame {
            return Ok(false);
        }
        let frame = self.target.get_or_add::<InlinedCallFrame>(self.current)?;
        Ok(frame.has_active_call())
    }

    /// Applies the current frame's unwind state to `context`.
    ///
    /// Frame kinds that carry no unwind state leave the context untouched.
    pub fn update_context_from_frame(&self, context: &mut PlatformContext) -> SwResult<()> {
        match context {
            PlatformContext::X86(context) => self.dispatch(&mut X86FrameHandler::new(self.target, context)),
            PlatformContext::Amd64(context) => self.dispatch(&mut Amd64FrameHandler::new(self.target, context)),
            PlatformContext::Arm(context) => self.dispatch(&mut ArmFrameHandler::new(self.target, context)),
            PlatformContext::Arm64(context) => self.dispatch(&mut Arm64FrameHandler::new(self.target, context)),
        }
    }

    /// Hands the current frame to `handler`.
    pub fn dispatch<H: PlatformFrameHandler + ?Sized>(&self, handler: &mut H) -> SwResult<()> {
        let payload = self.current_frame_payload()?;
        log::trace!("Updating context from {} at {:#x}", payload.frame_type(), self.current);
        payload.dispatch(handler)
    }

    /// Name of the frame kind `identifier` denotes, empty if it denotes none.
    pub fn frame_name(target: &T, identifier: TargetPointer) -> &'static str {
        match FrameClassifier::resolve(target).classify(identifier) {
            FrameType::Unknown => "",
            frame_type => frame_type.name(),
        }
    }

    /// Walks the remaining frames, yielding each frame's address and kind.
    ///
    /// Iteration stops after the first error.
    pub fn frames(&mut self) -> Frames<'_, 'a, T> {
        Frames { iterator: self, started: false, failed: false }
    }
}

/// [`Iterator`] adapter returned by [`FrameIterator::frames`].
pub struct Frames<'i, 'a, T: Target + ?Sized> {
    iterator: &'i mut FrameIterator<'a, T>,
    started: bool,
    failed: bool,
}

impl<T: Target + ?Sized> Iterator for Frames<'_, '_, T> {
    type Item = SwResult<(TargetPointer, FrameType)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        if self.started {
            match self.iterator.advance() {
                Ok(true) => {}
                Ok(false) => return None,
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        } else {
            self.started = true;
            if !self.iterator.is_valid() {
                return None;
            }
        }

        let address = self.iterator.current_frame_address();
        match self.iterator.current_frame_type() {
            Ok(frame_type) => Some(Ok((address, frame_type))),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}
