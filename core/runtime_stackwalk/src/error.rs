//! Error codes for the runtime_stackwalk crate
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
use alloc::string::String;
use core::fmt;

use crate::context::Architecture;
use crate::data::DataType;
use crate::frame_handling::FrameType;

/// The error type for stack walk operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Target memory at the given address could not be read
    MemoryReadFailed(u64, usize),

    /// A buffer was too short to hold the record being parsed
    BufferTooShort(usize),

    /// The target reports a pointer width other than 4 or 8 bytes
    InvalidPointerSize(usize),

    /// The target's data descriptor has no entry for the type
    MissingTypeInfo(DataType),

    /// A required field is absent from the type's descriptor
    MissingField(DataType, &'static str),

    /// The type's descriptor does not record its size
    MissingTypeSize(DataType),

    /// The iterator has reached the terminator and has no current frame
    IteratorTerminated,

    /// The walk visited more frames than the configured limit
    FrameLimitExceeded(usize),

    /// A saved register has no counterpart in the architecture's context
    UnexpectedRegister(String),

    /// The frame kind cannot be unwound on this architecture
    UnsupportedFrame(FrameType, Architecture),
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MemoryReadFailed(address, len) => {
                write!(fmt, "Failed to read {len:#x} bytes of target memory at {address:016X}")
            }
            Error::BufferTooShort(index) => write!(fmt, "Buffer is too short {index}"),
            Error::InvalidPointerSize(size) => write!(fmt, "Unsupported target pointer size: {size}"),
            Error::MissingTypeInfo(data_type) => write!(fmt, "No type information for {data_type:?}"),
            Error::MissingField(data_type, field) => write!(fmt, "Type {data_type:?} has no field {field}"),
            Error::MissingTypeSize(data_type) => write!(fmt, "Type {data_type:?} has no recorded size"),
            Error::IteratorTerminated => write!(fmt, "The frame iterator is past the last frame"),
            Error::FrameLimitExceeded(limit) => write!(fmt, "Stack walk exceeded the limit of {limit} frames"),
            Error::UnexpectedRegister(name) => write!(fmt, "Unexpected register {name} in saved registers"),
            Error::UnsupportedFrame(frame_type, arch) => {
                write!(fmt, "{frame_type} frames are not supported on {arch:?}")
            }
        }
    }
}

impl From<scroll::Error> for Error {
    fn from(err: scroll::Error) -> Self {
        match err {
            scroll::Error::TooBig { size, .. } => Error::BufferTooShort(size),
            scroll::Error::BadOffset(offset) => Error::BufferTooShort(offset),
            _ => Error::BufferTooShort(0),
        }
    }
}

/// A specialized result type for the runtime_stackwalk crate.
pub type SwResult<T> = Result<T, Error>;
