//! Frame type identity and classification.
//!
//! Frames carry no type information of their own that the reader can trust.
//! Instead each frame stores an identifier value, and the runtime exports one
//! `<Kind>Identifier` global per frame kind holding the value frames of that
//! kind carry. Frame kinds come and go between runtime versions, so a missing
//! global only means "not this kind".
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!
use alloc::{collections::BTreeMap, format};
use core::fmt;

use crate::target::{Target, TargetPointer};

/// Kinds of frames the runtime pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FrameType {
    Unknown,

    InlinedCallFrame,
    SoftwareExceptionFrame,

    // Transition frames
    FramedMethodFrame,
    CLRToCOMMethodFrame,
    PInvokeCalliFrame,
    PrestubMethodFrame,
    StubDispatchFrame,
    CallCountingHelperFrame,
    ExternalMethodFrame,
    DynamicHelperFrame,

    FuncEvalFrame,

    // Resumable frames
    ResumableFrame,
    RedirectedThreadFrame,

    FaultingExceptionFrame,

    HijackFrame,

    TailCallFrame,

    // Frames that never update a context
    UnmanagedToManagedFrame,
    ComMethodFrame,
    ComPrestubMethodFrame,
    ProtectValueClassFrame,
    DebuggerClassInitMarkFrame,
    DebuggerExitFrame,
    DebuggerU2MCatchHandlerFrame,
    ExceptionFilterFrame,
}

impl FrameType {
    /// Every kind except `Unknown`, in declaration order.
    pub const KNOWN: [FrameType; 24] = [
        FrameType::InlinedCallFrame,
        FrameType::SoftwareExceptionFrame,
        FrameType::FramedMethodFrame,
        FrameType::CLRToCOMMethodFrame,
        FrameType::PInvokeCalliFrame,
        FrameType::PrestubMethodFrame,
        FrameType::StubDispatchFrame,
        FrameType::CallCountingHelperFrame,
        FrameType::ExternalMethodFrame,
        FrameType::DynamicHelperFrame,
        FrameType::FuncEvalFrame,
        FrameType::ResumableFrame,
        FrameType::RedirectedThreadFrame,
        FrameType::FaultingExceptionFrame,
        FrameType::HijackFrame,
        FrameType::TailCallFrame,
        FrameType::UnmanagedToManagedFrame,
        FrameType::ComMethodFrame,
        FrameType::ComPrestubMethodFrame,
        FrameType::ProtectValueClassFrame,
        FrameType::DebuggerClassInitMarkFrame,
        FrameType::DebuggerExitFrame,
        FrameType::DebuggerU2MCatchHandlerFrame,
        FrameType::ExceptionFilterFrame,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            FrameType::Unknown => "Unknown",
            FrameType::InlinedCallFrame => "InlinedCallFrame",
            FrameType::SoftwareExceptionFrame => "SoftwareExceptionFrame",
            FrameType::FramedMethodFrame => "FramedMethodFrame",
            FrameType::CLRToCOMMethodFrame => "CLRToCOMMethodFrame",
            FrameType::PInvokeCalliFrame => "PInvokeCalliFrame",
            FrameType::PrestubMethodFrame => "PrestubMethodFrame",
            FrameType::StubDispatchFrame => "StubDispatchFrame",
            FrameType::CallCountingHelperFrame => "CallCountingHelperFrame",
            FrameType::ExternalMethodFrame => "ExternalMethodFrame",
            FrameType::DynamicHelperFrame => "DynamicHelperFrame",
            FrameType::FuncEvalFrame => "FuncEvalFrame",
            FrameType::ResumableFrame => "ResumableFrame",
            FrameType::RedirectedThreadFrame => "RedirectedThreadFrame",
            FrameType::FaultingExceptionFrame => "FaultingExceptionFrame",
            FrameType::HijackFrame => "HijackFrame",
            FrameType::TailCallFrame => "TailCallFrame",
            FrameType::UnmanagedToManagedFrame => "UnmanagedToManagedFrame",
            FrameType::ComMethodFrame => "ComMethodFrame",
            FrameType::ComPrestubMethodFrame => "ComPrestubMethodFrame",
            FrameType::ProtectValueClassFrame => "ProtectValueClassFrame",
            FrameType::DebuggerClassInitMarkFrame => "DebuggerClassInitMarkFrame",
            FrameType::DebuggerExitFrame => "DebuggerExitFrame",
            FrameType::DebuggerU2MCatchHandlerFrame => "DebuggerU2MCatchHandlerFrame",
            FrameType::ExceptionFilterFrame => "ExceptionFilterFrame",
        }
    }

    /// True for the kinds that share the transition frame register layout.
    pub const fn is_transition_frame(self) -> bool {
        matches!(
            self,
            FrameType::FramedMethodFrame
                | FrameType::CLRToCOMMethodFrame
                | FrameType::PInvokeCalliFrame
                | FrameType::PrestubMethodFrame
                | FrameType::StubDispatchFrame
                | FrameType::CallCountingHelperFrame
                | FrameType::ExternalMethodFrame
                | FrameType::DynamicHelperFrame
        )
    }

    pub const fn is_resumable_frame(self) -> bool {
        matches!(self, FrameType::ResumableFrame | FrameType::RedirectedThreadFrame)
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifier value to frame kind table for one target.
///
/// Resolving reads every `<Kind>Identifier` global once, so the table can be
/// built when a target is attached and shared by every walk on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameClassifier {
    identifiers: BTreeMap<TargetPointer, FrameType>,
}

impl FrameClassifier {
    pub fn resolve<T: Target + ?Sized>(target: &T) -> Self {
        let mut identifiers = BTreeMap::new();
        for frame_type in FrameType::KNOWN {
            let global = format!("{}Identifier", frame_type.name());
            let Some(identifier) = target.try_read_global_pointer(&global) else {
                continue;
            };

            if let Some(existing) = identifiers.get(&identifier) {
                log::warn!("{} shares identifier {:#x} with {}, ignoring it", frame_type, identifier, existing);
                continue;
            }
            identifiers.insert(identifier, frame_type);
        }

        log::debug!("Resolved {} frame type identifiers", identifiers.len());
        Self { identifiers }
    }

    /// The kind of a frame carrying `identifier`, `Unknown` if none matches.
    pub fn classify(&self, identifier: TargetPointer) -> FrameType {
        self.identifiers.get(&identifier).copied().unwrap_or(FrameType::Unknown)
    }

    /// Number of frame kinds this target exports an identifier for.
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::MemorySnapshot;

    fn snapshot_with(globals: &[(&str, u64)]) -> MemorySnapshot {
        let mut snapshot = MemorySnapshot::new(8).unwrap();
        for (name, value) in globals {
            snapshot.add_global(name, TargetPointer(*value));
        }
        snapshot
    }

    #[test]
    fn test_known_kinds() {
        assert!(!FrameType::KNOWN.contains(&FrameType::Unknown));
        assert_eq!(FrameType::KNOWN.iter().filter(|t| t.is_transition_frame()).count(), 8);
        assert_eq!(FrameType::KNOWN.iter().filter(|t| t.is_resumable_frame()).count(), 2);
    }

    #[test]
    fn test_classify_match_and_miss() {
        let snapshot = snapshot_with(&[("HijackFrameIdentifier", 0x10), ("TailCallFrameIdentifier", 0x20)]);
        let classifier = FrameClassifier::resolve(&snapshot);
        assert_eq!(classifier.len(), 2);
        assert_eq!(classifier.classify(TargetPointer(0x10)), FrameType::HijackFrame);
        assert_eq!(classifier.classify(TargetPointer(0x20)), FrameType::TailCallFrame);
        assert_eq!(classifier.classify(TargetPointer(0x30)), FrameType::Unknown);
        assert_eq!(classifier.classify(TargetPointer::NULL), FrameType::Unknown);
    }

    #[test]
    fn test_absent_globals_do_not_stop_resolution() {
        // Only the last kind in declaration order is exported.
        let snapshot = snapshot_with(&[("ExceptionFilterFrameIdentifier", 0x99)]);
        let classifier = FrameClassifier::resolve(&snapshot);
        assert_eq!(classifier.classify(TargetPointer(0x99)), FrameType::ExceptionFilterFrame);
    }

    #[test]
    fn test_unknown_identifier_global_is_ignored() {
        let snapshot = snapshot_with(&[("UnknownIdentifier", 0x42)]);
        let classifier = FrameClassifier::resolve(&snapshot);
        assert!(classifier.is_empty());
        assert_eq!(classifier.classify(TargetPointer(0x42)), FrameType::Unknown);
    }

    #[test]
    fn test_duplicate_identifier_keeps_first_declared() {
        let snapshot = snapshot_with(&[("ResumableFrameIdentifier", 0x50), ("InlinedCallFrameIdentifier", 0x50)]);
        let classifier = FrameClassifier::resolve(&snapshot);
        assert_eq!(classifier.classify(TargetPointer(0x50)), FrameType::InlinedCallFrame);
    }
}
