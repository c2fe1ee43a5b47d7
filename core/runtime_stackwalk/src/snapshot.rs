//! Memory Snapshot
//!
//! A [`Target`] over memory captured from a process: a set of byte regions,
//! the runtime's exported global pointers and its data descriptor. Used to
//! analyze dumps and to drive walks in tests.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!
use alloc::{collections::BTreeMap, string::String, vec::Vec};

use crate::{
    data::{DataType, TypeInfo},
    error::{Error, SwResult},
    target::{ProcessedData, Target, TargetPointer},
};

/// Captured process memory.
#[derive(Debug)]
pub struct MemorySnapshot {
    pointer_size: usize,
    /// Regions keyed by base address. Regions never overlap.
    regions: BTreeMap<u64, Vec<u8>>,
    globals: BTreeMap<String, TargetPointer>,
    types: BTreeMap<DataType, TypeInfo>,
    processed_data: ProcessedData,
}

impl MemorySnapshot {
    pub fn new(pointer_size: usize) -> SwResult<Self> {
        if pointer_size != 4 && pointer_size != 8 {
            return Err(Error::InvalidPointerSize(pointer_size));
        }
        Ok(Self {
            pointer_size,
            regions: BTreeMap::new(),
            globals: BTreeMap::new(),
            types: BTreeMap::new(),
            processed_data: ProcessedData::new(),
        })
    }

    /// Adds a region of memory starting at `base`, replacing any region it
    /// overlaps. An empty region covers nothing and is ignored.
    pub fn add_region(&mut self, base: TargetPointer, bytes: Vec<u8>) {
        if bytes.is_empty() {
            return;
        }
        let end = base.0.saturating_add(bytes.len() as u64);
        self.regions.retain(|start, data| {
            let region_end = start.saturating_add(data.len() as u64);
            region_end <= base.0 || *start >= end
        });
        self.regions.insert(base.0, bytes);
        self.processed_data.clear();
    }

    pub fn add_global(&mut self, name: &str, value: TargetPointer) {
        self.globals.insert(String::from(name), value);
    }

    pub fn add_type(&mut self, data_type: DataType, info: TypeInfo) {
        self.types.insert(data_type, info);
        self.processed_data.clear();
    }

    /// Overwrites captured memory. The range must lie within one region.
    pub fn write_bytes(&mut self, address: TargetPointer, bytes: &[u8]) -> SwResult<()> {
        let (start, region) = self.region_for_mut(address, bytes.len())?;
        region[start..start + bytes.len()].copy_from_slice(bytes);
        self.processed_data.clear();
        Ok(())
    }

    /// Writes a pointer-width value.
    pub fn write_pointer(&mut self, address: TargetPointer, value: TargetPointer) -> SwResult<()> {
        match self.pointer_size {
            4 => self.write_bytes(address, &(value.0 as u32).to_le_bytes()),
            _ => self.write_bytes(address, &value.0.to_le_bytes()),
        }
    }

    fn region_for(&self, address: TargetPointer, len: usize) -> SwResult<(usize, &Vec<u8>)> {
        let (base, region) = self
            .regions
            .range(..=address.0)
            .next_back()
            .ok_or(Error::MemoryReadFailed(address.0, len))?;
        let start = (address.0 - base) as usize;
        match start.checked_add(len) {
            Some(end) if end <= region.len() => Ok((start, region)),
            _ => Err(Error::MemoryReadFailed(address.0, len)),
        }
    }

    fn region_for_mut(&mut self, address: TargetPointer, len: usize) -> SwResult<(usize, &mut Vec<u8>)> {
        let (start, _) = self.region_for(address, len)?;
        let base = address.0 - start as u64;
        self.regions.get_mut(&base).map(|region| (start, region)).ok_or(Error::MemoryReadFailed(address.0, len))
    }
}

impl Target for MemorySnapshot {
    fn pointer_size(&self) -> usize {
        self.pointer_size
    }

    fn read_bytes(&self, address: TargetPointer, buffer: &mut [u8]) -> SwResult<()> {
        let (start, region) = self.region_for(address, buffer.len())?;
        buffer.copy_from_slice(&region[start..start + buffer.len()]);
        Ok(())
    }

    fn try_read_global_pointer(&self, name: &str) -> Option<TargetPointer> {
        self.globals.get(name).copied()
    }

    fn type_info(&self, data_type: DataType) -> SwResult<&TypeInfo> {
        self.types.get(&data_type).ok_or(Error::MissingTypeInfo(data_type))
    }

    fn processed_data(&self) -> &ProcessedData {
        &self.processed_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::Frame, target::TargetExt};
    use alloc::vec;

    #[test]
    fn test_rejects_bad_pointer_size() {
        assert_eq!(MemorySnapshot::new(2).unwrap_err(), Error::InvalidPointerSize(2));
        assert!(MemorySnapshot::new(4).is_ok());
    }

    #[test]
    fn test_read_bounds() {
        let mut snapshot = MemorySnapshot::new(8).unwrap();
        snapshot.add_region(TargetPointer(0x1000), vec![0xAA; 0x10]);

        let mut buffer = [0u8; 8];
        assert!(snapshot.read_bytes(TargetPointer(0x1008), &mut buffer).is_ok());
        assert_eq!(buffer, [0xAA; 8]);
        assert_eq!(
            snapshot.read_bytes(TargetPointer(0x1009), &mut buffer),
            Err(Error::MemoryReadFailed(0x1009, 8))
        );
        assert_eq!(snapshot.read_bytes(TargetPointer(0xFFF), &mut buffer), Err(Error::MemoryReadFailed(0xFFF, 8)));
        assert_eq!(snapshot.read_bytes(TargetPointer(0x2000), &mut buffer), Err(Error::MemoryReadFailed(0x2000, 8)));
    }

    #[test]
    fn test_pointer_width() {
        let mut snapshot = MemorySnapshot::new(4).unwrap();
        snapshot.add_region(TargetPointer(0x100), vec![0; 8]);
        snapshot.write_pointer(TargetPointer(0x100), TargetPointer(0x1122_3344)).unwrap();
        snapshot.write_pointer(TargetPointer(0x104), TargetPointer(0xFFFF_FFFF)).unwrap();
        assert_eq!(snapshot.read_pointer(TargetPointer(0x100)).unwrap(), TargetPointer(0x1122_3344));
        assert_eq!(snapshot.read_pointer(TargetPointer(0x104)).unwrap(), TargetPointer(0xFFFF_FFFF));
    }

    #[test]
    fn test_overlapping_region_replaces() {
        let mut snapshot = MemorySnapshot::new(8).unwrap();
        snapshot.add_region(TargetPointer(0x1000), vec![1; 0x20]);
        snapshot.add_region(TargetPointer(0x1010), vec![2; 0x20]);
        assert_eq!(snapshot.read_u8(TargetPointer(0x1010)).unwrap(), 2);
        assert!(snapshot.read_u8(TargetPointer(0x1000)).is_err());
    }

    #[test]
    fn test_empty_region_ignored() {
        let mut snapshot = MemorySnapshot::new(4).unwrap();
        snapshot.add_region(TargetPointer(0x1000), vec![7; 0x20]);
        snapshot.add_region(TargetPointer(0x1010), Vec::new());
        assert_eq!(snapshot.read_u8(TargetPointer(0x1000)).unwrap(), 7);
        assert_eq!(snapshot.read_u8(TargetPointer(0x1010)).unwrap(), 7);
    }

    #[test]
    fn test_write_clears_cache() {
        let mut snapshot = MemorySnapshot::new(8).unwrap();
        snapshot.add_type(DataType::Frame, TypeInfo::new(Some(0x10)).with_field("Identifier", 0).with_field("Next", 8));
        snapshot.add_region(TargetPointer(0x1000), vec![0; 0x10]);
        snapshot.write_pointer(TargetPointer(0x1000), TargetPointer(0x42)).unwrap();

        let frame = snapshot.get_or_add::<Frame>(TargetPointer(0x1000)).unwrap();
        assert_eq!(frame.identifier, TargetPointer(0x42));
        assert_eq!(snapshot.processed_data().len(), 1);

        snapshot.write_pointer(TargetPointer(0x1000), TargetPointer(0x43)).unwrap();
        assert!(snapshot.processed_data().is_empty());
        let frame = snapshot.get_or_add::<Frame>(TargetPointer(0x1000)).unwrap();
        assert_eq!(frame.identifier, TargetPointer(0x43));
    }

    #[test]
    fn test_missing_type_info() {
        let snapshot = MemorySnapshot::new(8).unwrap();
        assert_eq!(snapshot.type_info(DataType::Frame).unwrap_err(), Error::MissingTypeInfo(DataType::Frame));
        assert_eq!(snapshot.try_read_global_pointer("HijackFrameIdentifier"), None);
    }
}
