//! Thread snapshot.
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

/// The part of a runtime thread object the frame walker needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadData {
    pub address: TargetPointer,
    /// Head of the thread's frame chain.
    pub frame: TargetPointer,
}

impl ThreadData {
    /// A thread whose frame chain starts at `frame`, for callers that already
    /// located the head pointer.
    pub fn with_frame(frame: TargetPointer) -> Self {
        Self { address: TargetPointer::NULL, frame }
    }
}

impl FromTarget for ThreadData {
    fn read<T: Target + ?Sized>(target: &T, address: TargetPointer) -> SwResult<Self> {
        let fields = FieldReader::new(target, DataType::Thread, address)?;
        Ok(Self { address, frame: fields.pointer("Frame")? })
    }
}
