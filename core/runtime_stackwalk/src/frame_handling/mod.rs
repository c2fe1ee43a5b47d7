//! Frame Handling
//!
//! Classifying, walking and unwinding the frames the runtime pushes onto a
//! thread's stack.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!
mod amd64;
mod arm;
mod arm64;
mod frame_iterator;
mod frame_type;
mod handler;
mod payload;
mod x86;

pub use amd64::Amd64FrameHandler;
pub use arm::ArmFrameHandler;
pub use arm64::Arm64FrameHandler;
pub use frame_iterator::{FrameIterator, Frames};
pub use frame_type::{FrameClassifier, FrameType};
#[cfg(any(test, feature = "mockall"))]
pub use handler::MockPlatformFrameHandler;
pub use handler::PlatformFrameHandler;
pub use payload::FramePayload;
pub use x86::X86FrameHandler;
