//! Runtime Data Records
//!
//! The runtime publishes a data descriptor: for every logical type it records
//! the type size and the offset of each named field. Records in this module are
//! read through that descriptor rather than through a fixed layout, so the same
//! walker works across runtime builds whose structures differ.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!
mod frames;
mod registers;
mod thread;

use alloc::{collections::BTreeMap, string::String};

use crate::{
    error::{Error, SwResult},
    target::{Target, TargetPointer},
};

pub use frames::{
    FaultingExceptionFrame, Frame, FramedMethodFrame, FuncEvalFrame, HijackFrame, InlinedCallFrame, ResumableFrame,
    SoftwareExceptionFrame, TailCallFrame,
};
pub use registers::{CalleeSavedRegisters, DebuggerEval, HijackArgs, TransitionBlock};
pub use thread::ThreadData;

/// Logical types the walker reads from the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataType {
    Thread,
    Frame,
    InlinedCallFrame,
    SoftwareExceptionFrame,
    FramedMethodFrame,
    TransitionBlock,
    CalleeSavedRegisters,
    FuncEvalFrame,
    DebuggerEval,
    ResumableFrame,
    FaultingExceptionFrame,
    HijackFrame,
    HijackArgs,
    TailCallFrame,
}

/// Location of one field within a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    pub offset: u32,
}

/// Descriptor entry for one type.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub size: Option<u32>,
    pub fields: BTreeMap<String, FieldInfo>,
}

impl TypeInfo {
    pub fn new(size: Option<u32>) -> Self {
        Self { size, fields: BTreeMap::new() }
    }

    pub fn with_field(mut self, name: &str, offset: u32) -> Self {
        self.fields.insert(String::from(name), FieldInfo { offset });
        self
    }

    pub fn field_offset(&self, name: &str) -> Option<u32> {
        self.fields.get(name).map(|field| field.offset)
    }
}

/// Reads the fields of one record through its descriptor entry.
pub(crate) struct FieldReader<'t, T: Target + ?Sized> {
    target: &'t T,
    data_type: DataType,
    info: &'t TypeInfo,
    address: TargetPointer,
}

impl<'t, T: Target + ?Sized> FieldReader<'t, T> {
    pub(crate) fn new(target: &'t T, data_type: DataType, address: TargetPointer) -> SwResult<Self> {
        let info = target.type_info(data_type)?;
        Ok(Self { target, data_type, info, address })
    }

    pub(crate) fn info(&self) -> &'t TypeInfo {
        self.info
    }

    pub(crate) fn size(&self) -> SwResult<u32> {
        self.info.size.ok_or(Error::MissingTypeSize(self.data_type))
    }

    /// Address of an embedded field, or `None` if the descriptor omits it.
    pub(crate) fn optional_address(&self, name: &str) -> Option<TargetPointer> {
        self.info.field_offset(name).map(|offset| self.address + offset as u64)
    }

    /// Address of an embedded field.
    pub(crate) fn address_of(&self, name: &'static str) -> SwResult<TargetPointer> {
        self.optional_address(name).ok_or(Error::MissingField(self.data_type, name))
    }

    pub(crate) fn pointer(&self, name: &'static str) -> SwResult<TargetPointer> {
        self.target.read_pointer(self.address_of(name)?)
    }

    pub(crate) fn optional_pointer(&self, name: &str) -> SwResult<Option<TargetPointer>> {
        self.optional_address(name).map(|address| self.target.read_pointer(address)).transpose()
    }

    pub(crate) fn u8(&self, name: &'static str) -> SwResult<u8> {
        self.target.read_u8(self.address_of(name)?)
    }
}
