//! Target Accessor
//!
//! The [`Target`] trait is the only door into the inspected process. It reads
//! raw memory, resolves named global pointers and hands out the runtime's data
//! descriptor, which names the fields of every record the walker reads. Typed
//! records are read through [`TargetExt::get_or_add`] and cached per address in
//! the target's [`ProcessedData`].
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!
use alloc::{collections::BTreeMap, rc::Rc};
use core::{
    any::{Any, TypeId},
    cell::RefCell,
    fmt,
    ops::Add,
};

use crate::{
    data::{DataType, TypeInfo},
    error::{Error, SwResult},
};

/// An address in the target process.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetPointer(pub u64);

impl TargetPointer {
    pub const NULL: TargetPointer = TargetPointer(0);

    /// The all-ones value for a target with the given pointer width.
    pub const fn max_for(pointer_size: usize) -> TargetPointer {
        if pointer_size == 4 { TargetPointer(u32::MAX as u64) } else { TargetPointer(u64::MAX) }
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl Add<u64> for TargetPointer {
    type Output = TargetPointer;

    fn add(self, offset: u64) -> TargetPointer {
        TargetPointer(self.0.wrapping_add(offset))
    }
}

impl From<u64> for TargetPointer {
    fn from(value: u64) -> Self {
        TargetPointer(value)
    }
}

impl fmt::Display for TargetPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for TargetPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::UpperHex for TargetPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.0, f)
    }
}

/// Read-only view of the inspected process.
///
/// All multi-byte values in the target are little endian.
pub trait Target {
    /// Width of a pointer in the target, 4 or 8 bytes.
    fn pointer_size(&self) -> usize;

    /// Fills `buffer` with the target memory starting at `address`.
    fn read_bytes(&self, address: TargetPointer, buffer: &mut [u8]) -> SwResult<()>;

    /// Resolves a named global pointer. A symbol that this build of the
    /// runtime does not export yields `None`.
    fn try_read_global_pointer(&self, name: &str) -> Option<TargetPointer>;

    /// The data descriptor entry for `data_type`.
    fn type_info(&self, data_type: DataType) -> SwResult<&TypeInfo>;

    /// Cache of records already read from this target.
    fn processed_data(&self) -> &ProcessedData;

    fn read_u8(&self, address: TargetPointer) -> SwResult<u8> {
        let mut buffer = [0u8; 1];
        self.read_bytes(address, &mut buffer)?;
        Ok(buffer[0])
    }

    fn read_u32(&self, address: TargetPointer) -> SwResult<u32> {
        let mut buffer = [0u8; 4];
        self.read_bytes(address, &mut buffer)?;
        Ok(u32::from_le_bytes(buffer))
    }

    fn read_u64(&self, address: TargetPointer) -> SwResult<u64> {
        let mut buffer = [0u8; 8];
        self.read_bytes(address, &mut buffer)?;
        Ok(u64::from_le_bytes(buffer))
    }

    /// Reads a pointer-width value, zero extended to 64 bits.
    fn read_pointer(&self, address: TargetPointer) -> SwResult<TargetPointer> {
        match self.pointer_size() {
            4 => self.read_u32(address).map(|value| TargetPointer(value as u64)),
            8 => self.read_u64(address).map(TargetPointer),
            size => Err(Error::InvalidPointerSize(size)),
        }
    }
}

/// A record that can be materialized from target memory.
pub trait FromTarget: Sized + 'static {
    fn read<T: Target + ?Sized>(target: &T, address: TargetPointer) -> SwResult<Self>;
}

/// Read-through cache of typed records, keyed by record type and address.
///
/// The cache assumes the target does not change while it is alive; a snapshot
/// that is written to must call [`ProcessedData::clear`].
#[derive(Default)]
pub struct ProcessedData {
    cache: RefCell<BTreeMap<(TypeId, u64), Rc<dyn Any>>>,
}

impl ProcessedData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached `D` at `address`, reading it from `target` on a miss.
    pub fn get_or_add<D: FromTarget, T: Target + ?Sized>(&self, target: &T, address: TargetPointer) -> SwResult<Rc<D>> {
        let key = (TypeId::of::<D>(), address.0);
        let cached = self.cache.borrow().get(&key).cloned();
        if let Some(entry) = cached {
            if let Ok(record) = entry.downcast::<D>() {
                return Ok(record);
            }
        }

        // Reading may recurse into the cache for nested records, so no borrow
        // is held here.
        let record = Rc::new(D::read(target, address)?);
        self.cache.borrow_mut().insert(key, record.clone());
        Ok(record)
    }

    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }
}

impl fmt::Debug for ProcessedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessedData").field("entries", &self.len()).finish()
    }
}

/// Typed access on top of any [`Target`].
pub trait TargetExt: Target {
    /// Reads (or returns the cached) record of type `D` at `address`.
    fn get_or_add<D: FromTarget>(&self, address: TargetPointer) -> SwResult<Rc<D>> {
        self.processed_data().get_or_add::<D, Self>(self, address)
    }

    /// The recorded size of `data_type`.
    fn type_size(&self, data_type: DataType) -> SwResult<u32> {
        self.type_info(data_type)?.size.ok_or(Error::MissingTypeSize(data_type))
    }
}

impl<T: Target + ?Sized> TargetExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_for_pointer_size() {
        assert_eq!(TargetPointer::max_for(4), TargetPointer(0xFFFF_FFFF));
        assert_eq!(TargetPointer::max_for(8), TargetPointer(0xFFFF_FFFF_FFFF_FFFF));
    }

    #[test]
    fn test_pointer_add_wraps() {
        assert_eq!(TargetPointer(0x1000) + 0x10, TargetPointer(0x1010));
        assert_eq!(TargetPointer(u64::MAX) + 1, TargetPointer::NULL);
    }

    #[test]
    fn test_pointer_formatting() {
        assert_eq!(alloc::format!("{}", TargetPointer(0xABC)), "0xabc");
        assert_eq!(alloc::format!("{:016X}", TargetPointer(0xABC)), "0000000000000ABC");
    }
}
