//! # Runtime Stack Walk Library
//!
//! ## Introduction
//!
//! This library walks the frames a managed runtime pushes onto its threads'
//! stacks, reading everything out of process through a [`Target`]. Each frame
//! is a record in a singly linked list hanging off the thread object. Frames
//! do not carry a trustworthy type; instead each stores an identifier that is
//! compared against the runtime's `<Kind>Identifier` globals.
//!
//! Besides iterating the chain, the library unwinds a CPU register context
//! across a frame: the frame's kind decides which record is read and which
//! [`PlatformFrameHandler`] method updates the context, and the context's
//! architecture decides which handler runs.
//!
//! Supported architectures are x86, AMD64, ARM and ARM64. Targets are little
//! endian with 4 or 8 byte pointers.
//!
//! ## Public API
//!
//! ```ignore
//!     /// Positions a new iterator at the head of the thread's frame chain.
//!     pub fn FrameIterator::new(target: &T, thread: &ThreadData) -> SwResult<FrameIterator<T>>;
//!     pub fn is_valid(&self) -> bool;
//!     pub fn advance(&mut self) -> SwResult<bool>;
//!     pub fn current_frame_address(&self) -> TargetPointer;
//!     pub fn current_frame_type(&self) -> SwResult<FrameType>;
//!     pub fn update_context_from_frame(&self, context: &mut PlatformContext) -> SwResult<()>;
//!     pub fn is_inlined_call_frame_with_active_call(&self) -> SwResult<bool>;
//!     pub fn FrameIterator::frame_name(target: &T, identifier: TargetPointer) -> &'static str;
//! ```
//!
//! ## API usage
//!
//! ```ignore
//!     let thread = target.get_or_add::<ThreadData>(thread_address)?;
//!     let mut context = PlatformContext::new(Architecture::Amd64);
//!     let mut frames = FrameIterator::new(&target, &thread)?;
//!     while frames.is_valid() {
//!         log::info!("{:016X} {}", frames.current_frame_address(), frames.current_frame_type()?);
//!         frames.update_context_from_frame(&mut context)?;
//!         frames.advance()?;
//!     }
//! ```
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!
#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

extern crate alloc;

pub mod context;
pub mod data;
pub mod error;
pub mod frame_handling;
pub mod snapshot;
pub mod target;

#[cfg(test)]
mod tests;

pub use context::{Architecture, PlatformContext};
pub use error::{Error, SwResult};
pub use frame_handling::{FrameClassifier, FrameIterator, FramePayload, FrameType, PlatformFrameHandler};
pub use snapshot::MemorySnapshot;
pub use target::{Target, TargetExt, TargetPointer};
