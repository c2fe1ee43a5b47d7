use super::fixture::Fixture;
use crate::{
    context::{Architecture, PlatformContext},
    frame_handling::{FrameIterator, FramePayload, FrameType, MockPlatformFrameHandler},
    target::TargetPointer,
};

/// Expects the one handler method `frame_type` routes to. Returns false for
/// kinds that route to none.
fn expect_single_call(handler: &mut MockPlatformFrameHandler, frame_type: FrameType, address: TargetPointer) -> bool {
    match frame_type {
        FrameType::InlinedCallFrame => {
            handler
                .expect_handle_inlined_call_frame()
                .withf(move |frame| frame.address == address)
                .times(1)
                .returning(|_| Ok(()));
        }
        FrameType::SoftwareExceptionFrame => {
            handler
                .expect_handle_software_exception_frame()
                .withf(move |frame| frame.address == address)
                .times(1)
                .returning(|_| Ok(()));
        }
        t if t.is_transition_frame() => {
            handler
                .expect_handle_transition_frame()
                .withf(move |frame| frame.address == address)
                .times(1)
                .returning(|_| Ok(()));
        }
        FrameType::FuncEvalFrame => {
            handler
                .expect_handle_func_eval_frame()
                .withf(move |frame| frame.address == address)
                .times(1)
                .returning(|_| Ok(()));
        }
        t if t.is_resumable_frame() => {
            handler
                .expect_handle_resumable_frame()
                .withf(move |frame| frame.address == address)
                .times(1)
                .returning(|_| Ok(()));
        }
        FrameType::FaultingExceptionFrame => {
            handler
                .expect_handle_faulting_exception_frame()
                .withf(move |frame| frame.address == address)
                .times(1)
                .returning(|_| Ok(()));
        }
        FrameType::HijackFrame => {
            handler
                .expect_handle_hijack_frame()
                .withf(move |frame| frame.address == address)
                .times(1)
                .returning(|_| Ok(()));
        }
        FrameType::TailCallFrame => {
            handler
                .expect_handle_tail_call_frame()
                .withf(move |frame| frame.address == address)
                .times(1)
                .returning(|_| Ok(()));
        }
        _ => return false,
    }
    true
}

#[test]
fn test_each_kind_invokes_exactly_one_handler_method() {
    let mut fixture = Fixture::new(Architecture::Amd64);
    let (thread, addresses) = fixture.chain(&FrameType::KNOWN);

    let mut frames = FrameIterator::new(&fixture.snapshot, &thread).unwrap();
    let mut handled = 0;
    for (frame_type, address) in FrameType::KNOWN.iter().zip(addresses.iter()) {
        assert_eq!(frames.current_frame_type().unwrap(), *frame_type);

        // A mock without expectations panics on any call.
        let mut handler = MockPlatformFrameHandler::new();
        if expect_single_call(&mut handler, *frame_type, *address) {
            handled += 1;
        }
        frames.dispatch(&mut handler).unwrap();
        handler.checkpoint();
        frames.advance().unwrap();
    }
    assert_eq!(handled, 16);
    assert!(!frames.is_valid());
}

#[test]
fn test_handler_error_is_returned() {
    let mut fixture = Fixture::new(Architecture::X86);
    let (thread, _) = fixture.chain(&[FrameType::ResumableFrame]);

    let mut handler = MockPlatformFrameHandler::new();
    handler
        .expect_handle_resumable_frame()
        .times(1)
        .returning(|_| Err(crate::error::Error::MemoryReadFailed(0x10, 4)));

    let frames = FrameIterator::new(&fixture.snapshot, &thread).unwrap();
    assert_eq!(frames.dispatch(&mut handler), Err(crate::error::Error::MemoryReadFailed(0x10, 4)));
}

#[test]
fn test_passive_kinds_leave_context_unchanged() {
    let passive = [
        FrameType::Unknown,
        FrameType::UnmanagedToManagedFrame,
        FrameType::ComMethodFrame,
        FrameType::ComPrestubMethodFrame,
        FrameType::ProtectValueClassFrame,
        FrameType::DebuggerClassInitMarkFrame,
        FrameType::DebuggerExitFrame,
        FrameType::DebuggerU2MCatchHandlerFrame,
        FrameType::ExceptionFilterFrame,
    ];

    for arch in [Architecture::X86, Architecture::Amd64, Architecture::Arm, Architecture::Arm64] {
        let mut fixture = Fixture::new(arch);
        let (thread, _) = fixture.chain(&passive);

        let mut context = PlatformContext::new(arch);
        for (index, name) in ["Pc", "Rip", "Eip", "Sp", "Rsp", "Esp", "R4", "X19", "Rbx", "Ebx"].iter().enumerate() {
            context.set_register(name, 0x1000 + index as u64);
        }
        let before = context.to_bytes().unwrap();

        let mut frames = FrameIterator::new(&fixture.snapshot, &thread).unwrap();
        while frames.is_valid() {
            assert!(matches!(frames.current_frame_payload().unwrap(), FramePayload::Passive(_)));
            frames.update_context_from_frame(&mut context).unwrap();
            assert_eq!(context.to_bytes().unwrap(), before);
            frames.advance().unwrap();
        }
    }
}

#[test]
fn test_payload_keeps_discriminating_kind() {
    let mut fixture = Fixture::new(Architecture::Arm64);
    let kinds = [FrameType::PInvokeCalliFrame, FrameType::RedirectedThreadFrame, FrameType::DynamicHelperFrame];
    let (thread, addresses) = fixture.chain(&kinds);

    let mut frames = FrameIterator::new(&fixture.snapshot, &thread).unwrap();
    for (frame_type, address) in kinds.iter().zip(addresses.iter()) {
        let payload = frames.current_frame_payload().unwrap();
        assert_eq!(payload.frame_type(), *frame_type);
        match payload {
            FramePayload::Transition(kind, frame) => {
                assert_eq!(kind, *frame_type);
                assert_eq!(frame.address, *address);
            }
            FramePayload::Resumable(kind, frame) => {
                assert_eq!(kind, FrameType::RedirectedThreadFrame);
                assert_eq!(frame.address, *address);
            }
            other => panic!("unexpected payload {other:?}"),
        }
        frames.advance().unwrap();
    }
}
