// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Tests for the operator session state machine and the handover sequence.

mod support;

use si40_common::config::{read_channel, read_id, read_mode, write_channel, write_id};
use si40_common::handover::{start_application, VectorTable};
use si40_common::image::ImageBuffer;
use si40_common::layout::{Region, APP_ADDR};
use si40_common::session::{InputMode, Session, Step, SPACE_ACK};
use si40_common::timer::{POWER_ON_GRACE_MS, SESSION_WINDOW_MS};
use support::{
    encode, valid_image, HandoverCall, RamFlash, RecordingHandover, ScriptedChannel, TEST_ENTRY,
    TEST_SP,
};

type TestSession<'a> = Session<'a, ScriptedChannel, RamFlash>;

fn feed(session: &mut TestSession<'_>, bytes: &[u8]) -> Step {
    let mut step = Step::Stay;
    for &b in bytes {
        step = session.handle_byte(b);
    }
    step
}

fn output(session: &mut TestSession<'_>) -> String {
    session.channel_mut().take_output()
}

// =============================================================================
// Start-up
// =============================================================================

#[test]
fn test_start_banner_on_blank_device() {
    let mut image = ImageBuffer::new();
    let mut session = Session::new(ScriptedChannel::new(), RamFlash::new(), &mut image);
    session.start();

    let text = output(&mut session);
    assert!(text.starts_with("\n\r Start bootloader software"));
    assert!(text.contains(" Device ID doesn't exist.\n\r"));
    assert!(text.contains(" Channel isn't set.\n\r"));
    assert!(text.contains(" Bootloader version 3.2 build 104.\n\r"));
    assert!(text.ends_with(" Application doesn't exist.\n\r"));
    assert_eq!(session.input_mode(), InputMode::Initial);
}

#[test]
fn test_device_info_on_configured_device() {
    let mut flash = RamFlash::with_app(&valid_image());
    write_id(&mut flash, 7).unwrap();
    write_channel(&mut flash, 33).unwrap();
    let mut image = ImageBuffer::new();
    let mut session = Session::new(ScriptedChannel::new(), flash, &mut image);

    session.handle_byte(b'p');

    let text = output(&mut session);
    assert!(text.contains(" Device ID 0007.\n\r"));
    assert!(text.contains(" Channel BoatCode/Ch: C3/Ch6.\n\r"));
    assert!(text.contains(" Frequency 43000Hz.\n\r"));
    assert!(text.contains(" Marport mode .\n\r"));
    assert!(text.contains(" Application version 2.8 build 82.\n\r"));
}

#[test]
fn test_device_info_reports_missing_mode() {
    let mut flash = RamFlash::new();
    write_channel(&mut flash, 3).unwrap();
    let mut image = ImageBuffer::new();
    let mut session = Session::new(ScriptedChannel::new(), flash, &mut image);

    session.handle_byte(b'p');

    let text = output(&mut session);
    assert!(text.contains(" Channel Ch 03.\n\r"));
    assert!(text.contains(" Frequency 44000Hz.\n\r"));
    assert!(text.contains(" Mode isn't set.\n\r"));
}

// =============================================================================
// Simple commands
// =============================================================================

#[test]
fn test_space_is_acknowledged() {
    let mut image = ImageBuffer::new();
    let mut session = Session::new(ScriptedChannel::new(), RamFlash::new(), &mut image);
    session.handle_byte(b' ');
    assert_eq!(session.channel_mut().output, vec![SPACE_ACK]);
}

#[test]
fn test_carriage_return_acknowledges_connection() {
    let mut image = ImageBuffer::new();
    let mut session = Session::new(ScriptedChannel::new(), RamFlash::new(), &mut image);
    session.handle_byte(b'\r');
    assert_eq!(output(&mut session), " connection OK\n\r");
}

#[test]
fn test_unknown_bytes_are_ignored() {
    let mut image = ImageBuffer::new();
    let mut session = Session::new(ScriptedChannel::new(), RamFlash::new(), &mut image);
    assert_eq!(feed(&mut session, b"xzD7!"), Step::Stay);
    assert!(output(&mut session).is_empty());
    assert_eq!(session.input_mode(), InputMode::Initial);
}

#[test]
fn test_help_lists_commands() {
    let mut image = ImageBuffer::new();
    let mut session = Session::new(ScriptedChannel::new(), RamFlash::new(), &mut image);
    session.handle_byte(b'h');
    let text = output(&mut session);
    for line in [
        "d - Download image",
        "j - Start application",
        "i - Enter Device ID",
        "m - Enter mode",
        "c - Enter channel",
        "p - Print device information",
        "return - check connection",
    ] {
        assert!(text.contains(line), "missing {line:?}");
    }
}

// =============================================================================
// Guided entry
// =============================================================================

#[test]
fn test_device_id_entry_scenario() {
    let mut image = ImageBuffer::new();
    let mut session = Session::new(ScriptedChannel::new(), RamFlash::new(), &mut image);

    session.handle_byte(b'i');
    assert_eq!(session.input_mode(), InputMode::EnterId);
    feed(&mut session, b"1234");
    assert_eq!(session.input_mode(), InputMode::EnterId);
    session.handle_byte(b'\r');

    assert_eq!(session.input_mode(), InputMode::Initial);
    assert_eq!(read_id(session.storage_mut()), Some(1234));
    assert_eq!(output(&mut session), "\n\r New device ID is 1234 \n\r");
}

#[test]
fn test_channel_entry_reports_frequency() {
    let mut image = ImageBuffer::new();
    let mut session = Session::new(ScriptedChannel::new(), RamFlash::new(), &mut image);

    feed(&mut session, b"c17\r");

    assert_eq!(read_channel(session.storage_mut()), Some(17));
    let text = output(&mut session);
    assert!(text.contains("New frequency channel is Ch 17 "));
    assert!(text.contains("New frequency 46800Hz."));
}

#[test]
fn test_rejected_channel_returns_to_initial() {
    let mut image = ImageBuffer::new();
    let mut session = Session::new(ScriptedChannel::new(), RamFlash::new(), &mut image);

    feed(&mut session, b"c36\r");

    assert_eq!(session.input_mode(), InputMode::Initial);
    assert_eq!(read_channel(session.storage_mut()), None);
    assert_eq!(output(&mut session), "\n\r Error. \n\r");
}

#[test]
fn test_mode_entry() {
    let mut image = ImageBuffer::new();
    let mut session = Session::new(ScriptedChannel::new(), RamFlash::new(), &mut image);

    feed(&mut session, b"m");
    assert_eq!(session.input_mode(), InputMode::EnterMode);
    feed(&mut session, b"2\n");

    assert_eq!(read_mode(session.storage_mut()), Some(2));
    assert_eq!(output(&mut session), "\n\r New Mode is PI_NORMAL ,\n\r");
}

#[test]
fn test_commands_are_data_during_entry() {
    let mut image = ImageBuffer::new();
    let mut session = Session::new(ScriptedChannel::new(), RamFlash::new(), &mut image);

    // 'j' and 'p' reset the digit buffer instead of running.
    assert_eq!(feed(&mut session, b"i12jp34\r"), Step::Stay);
    assert_eq!(read_id(session.storage_mut()), Some(34));
}

// =============================================================================
// Download, commit and jump
// =============================================================================

#[test]
fn test_download_commit_and_jump() {
    let sent = valid_image();
    let mut image = ImageBuffer::new();
    let mut session = Session::new(ScriptedChannel::new(), RamFlash::new(), &mut image);

    session.channel_mut().push(&encode(sent.bytes()));
    assert_eq!(session.handle_byte(b'd'), Step::Stay);
    let text = output(&mut session);
    assert!(text.contains("\n\r read 16384 bytes.\n\r"));
    assert!(text.contains(" Application version 2.8 build 82.\n\r"));

    session.handle_byte(b'y');
    assert_eq!(
        output(&mut session),
        "\n\r Data was successfully written in Flash memory.\n\r"
    );
    assert_eq!(session.storage_mut().region(Region::Application), sent.words());

    let step = session.handle_byte(b'j');
    assert_eq!(
        step,
        Step::HandOver(VectorTable {
            initial_sp: TEST_SP,
            reset_vector: TEST_ENTRY,
        })
    );
    assert_eq!(
        output(&mut session),
        "\n\r Exit from bootloader.\n\r Go to application.\n\r"
    );
}

#[test]
fn test_download_timeout_reported() {
    let mut image = ImageBuffer::new();
    let mut session = Session::new(ScriptedChannel::new(), RamFlash::new(), &mut image);
    session.handle_byte(b'd');
    assert_eq!(output(&mut session), "\n\r time out.\n\r");
}

#[test]
fn test_download_wrong_header_reported() {
    let mut image = ImageBuffer::new();
    let mut session = Session::new(ScriptedChannel::new(), RamFlash::new(), &mut image);
    session.channel_mut().push(b"@08000000\r41 q");
    session.handle_byte(b'd');
    assert_eq!(output(&mut session), "\n\r inappropriate file.\n\r");
}

#[test]
fn test_download_framing_error_code_reported() {
    let mut image = ImageBuffer::new();
    let mut session = Session::new(ScriptedChannel::new(), RamFlash::new(), &mut image);
    session.channel_mut().push(b"@08010000\r41 4x ");
    session.handle_byte(b'd');
    assert_eq!(output(&mut session), "\n\r error -4 .\n\r");
}

#[test]
fn test_download_of_corrupt_image_reported() {
    let mut sent = valid_image();
    sent.words_mut()[10] ^= 0xFF;
    let mut image = ImageBuffer::new();
    let mut session = Session::new(ScriptedChannel::new(), RamFlash::new(), &mut image);

    session.channel_mut().push(&encode(sent.bytes()));
    session.handle_byte(b'd');

    let text = output(&mut session);
    assert!(text.contains("read 16384 bytes."));
    assert!(text.ends_with("CRC or Version number of downladed file is not correct.\n\r"));
}

#[test]
fn test_commit_refuses_invalid_buffer() {
    let mut image = ImageBuffer::new();
    let mut session = Session::new(ScriptedChannel::new(), RamFlash::new(), &mut image);
    session.handle_byte(b'y');
    assert_eq!(
        output(&mut session),
        "\n\r File doesn't contain valid application code.\n\r"
    );
    assert_eq!(session.storage_mut().writes, 0);
}

#[test]
fn test_commit_reports_erase_failure() {
    let mut image = valid_image();
    let mut flash = RamFlash::new();
    flash.fail_erase = true;
    let mut session = Session::new(ScriptedChannel::new(), flash, &mut image);
    session.handle_byte(b'y');
    assert!(output(&mut session).contains("Error occurred while Flash erase."));
}

#[test]
fn test_commit_reports_program_failure() {
    let mut image = valid_image();
    let mut flash = RamFlash::new();
    flash.fail_program = true;
    let mut session = Session::new(ScriptedChannel::new(), flash, &mut image);
    session.handle_byte(b'y');
    assert!(output(&mut session).contains("Error occurred while writing data in Flash memory."));
}

#[test]
fn test_jump_without_application() {
    let mut image = valid_image();
    let mut session = Session::new(ScriptedChannel::new(), RamFlash::new(), &mut image);
    // A valid download alone is not enough; the flashed copy is checked.
    assert_eq!(session.handle_byte(b'j'), Step::Stay);
    assert_eq!(output(&mut session), "\n\r Application doesn't exist.\n\r");
}

// =============================================================================
// Deadlines
// =============================================================================

#[test]
fn test_power_on_grace_hands_over_valid_application() {
    let mut image = ImageBuffer::new();
    let flash = RamFlash::with_app(&valid_image());
    let mut session = Session::new(ScriptedChannel::new(), flash, &mut image);
    session.start();
    output(&mut session);

    session.advance(POWER_ON_GRACE_MS);
    assert_eq!(session.poll_deadline(), Step::Stay);
    session.advance(1);
    assert!(matches!(session.poll_deadline(), Step::HandOver(_)));
}

#[test]
fn test_expired_deadline_without_application_extends_session() {
    let mut image = ImageBuffer::new();
    let mut session = Session::new(ScriptedChannel::new(), RamFlash::new(), &mut image);
    session.start();
    output(&mut session);

    session.advance(POWER_ON_GRACE_MS + 1);
    assert_eq!(session.poll_deadline(), Step::Stay);
    assert_eq!(output(&mut session), "\n\r Application doesn't exist.\n\r");

    session.advance(SESSION_WINDOW_MS);
    assert_eq!(session.poll_deadline(), Step::Stay);
    assert!(output(&mut session).is_empty());

    session.advance(1);
    assert_eq!(session.poll_deadline(), Step::Stay);
    assert!(output(&mut session).contains("Application doesn't exist."));
}

#[test]
fn test_operator_activity_keeps_bootloader_alive() {
    let mut image = ImageBuffer::new();
    let flash = RamFlash::with_app(&valid_image());
    let mut session = Session::new(ScriptedChannel::new(), flash, &mut image);
    session.start();

    session.advance(500);
    session.handle_byte(b' ');
    session.advance(POWER_ON_GRACE_MS + 1);
    assert_eq!(session.poll_deadline(), Step::Stay);

    session.advance(SESSION_WINDOW_MS);
    assert!(matches!(session.poll_deadline(), Step::HandOver(_)));
}

#[test]
fn test_indicator_toggles_every_period() {
    let mut image = ImageBuffer::new();
    let mut session = Session::new(ScriptedChannel::new(), RamFlash::new(), &mut image);
    session.start();

    session.advance(500);
    assert!(!session.indicator_due());
    session.advance(1);
    assert!(session.indicator_due());
    assert!(!session.indicator_due());
    session.advance(501);
    assert!(session.indicator_due());
}

// =============================================================================
// Handover sequence
// =============================================================================

#[test]
fn test_handover_sequence_order() {
    let mut cpu = RecordingHandover::default();
    let vt = VectorTable {
        initial_sp: TEST_SP,
        reset_vector: TEST_ENTRY,
    };

    start_application(&mut cpu, vt);

    assert_eq!(
        cpu.calls,
        vec![
            HandoverCall::DisableInterrupts,
            HandoverCall::StackPointer(TEST_SP),
            HandoverCall::VectorTableBase(APP_ADDR),
            HandoverCall::Jump(TEST_ENTRY),
        ]
    );
}

#[test]
fn test_vector_table_read_from_application_region() {
    let mut flash = RamFlash::with_app(&valid_image());
    assert_eq!(
        VectorTable::read(&mut flash),
        Ok(VectorTable {
            initial_sp: TEST_SP,
            reset_vector: TEST_ENTRY,
        })
    );
}
