use std::fs;
use std::time::Duration;

use termtape::recorder::FrameMetadata;
use termtape::tape::{Command, ParseErrorKind, TokenKind, WaitScope};
use termtape::trim::{frame_file_name, keep_window, trim_frames, KeepWindow};
use termtape::{parse, tokenize, SessionOptions};

fn literals_of(source: &str, kind: TokenKind) -> Vec<String> {
    tokenize(source)
        .expect("source should tokenize")
        .into_iter()
        .filter(|token| token.kind == kind)
        .map(|token| token.literal)
        .collect()
}

#[test]
fn end_buffer_is_one_identifier_in_any_context() {
    for source in [
        "Set EndBuffer 100ms",
        "Set EndBuffer 100ms\nType \"x\"",
        "# leading comment\n  Set   EndBuffer\t1s\n",
        "Set StartBuffer 10ms\nSet EndBuffer 2m",
    ] {
        let identifiers = literals_of(source, TokenKind::Identifier);
        assert!(
            identifiers.iter().any(|word| word == "EndBuffer"),
            "{source:?} -> {identifiers:?}"
        );
        assert!(!identifiers.iter().any(|word| word == "Buffer"), "{source:?}");
        assert!(literals_of(source, TokenKind::Key).is_empty(), "{source:?}");
    }
}

#[test]
fn minute_literal_is_one_duration() {
    for source in ["Sleep 2m", "Set TypingSpeed 2m", "Type@2m \"x\""] {
        assert_eq!(literals_of(source, TokenKind::Duration), vec!["2m"], "{source:?}");
        assert!(literals_of(source, TokenKind::Number).is_empty(), "{source:?}");
    }
    let tape = parse("Sleep 2m").expect("sleep should parse");
    assert_eq!(
        tape.statements[0].command,
        Command::Sleep {
            duration: Duration::from_secs(120)
        }
    );
}

#[test]
fn duplicate_font_size_names_setting_on_line_two() {
    let error = parse("Set FontSize 32\nSet FontSize 24").expect_err("duplicate should fail");
    assert_eq!(error.kind, ParseErrorKind::Duplicate);
    assert_eq!(error.line, 2);
    assert!(error.message.contains("FontSize"), "{}", error.message);
}

#[test]
fn setting_after_sleep_is_ordering_error_on_line_two() {
    let error = parse("Sleep 1s\nSet FontSize 32").expect_err("late Set should fail");
    assert_eq!(error.kind, ParseErrorKind::Ordering);
    assert_eq!(error.line, 2);
}

#[test]
fn type_enter_sleep_parse_in_order() {
    let tape = parse("Type \"echo hi\"\nEnter\nSleep 1s").expect("tape should parse");
    let commands = tape.commands().cloned().collect::<Vec<_>>();
    assert_eq!(
        commands,
        vec![
            Command::Type {
                text: "echo hi".to_owned(),
                speed: None
            },
            Command::Key {
                key: "Enter".to_owned(),
                speed: None,
                repeat: 1
            },
            Command::Sleep {
                duration: Duration::from_secs(1)
            },
        ]
    );
}

#[test]
fn wait_line_with_timeout_and_pattern() {
    let tape = parse("Wait+Line@10ms /pattern/").expect("wait should parse");
    assert_eq!(
        tape.statements[0].command,
        Command::Wait {
            scope: WaitScope::Line,
            timeout: Some(Duration::from_millis(10)),
            pattern: Some("pattern".to_owned()),
        }
    );
}

#[test]
fn keep_window_from_session_buffers() {
    let tape = parse("Set Framerate 50\nSet StartBuffer 500ms\nSet EndBuffer 100ms")
        .expect("settings should parse");
    let options = SessionOptions::from_tape(&tape).expect("options should resolve");
    assert_eq!(options.start_buffer_frames(), 25);
    assert_eq!(options.end_buffer_frames(), 5);
    assert_eq!(
        keep_window(
            Some(30),
            Some(200),
            options.start_buffer_frames(),
            options.end_buffer_frames()
        ),
        Some(KeepWindow {
            first: 5,
            last: 205
        })
    );
}

#[test]
fn keep_window_never_starts_before_first_frame() {
    for first_activity in 1..=30 {
        let window = keep_window(Some(first_activity), Some(40), 25, 5).expect("window");
        assert!(window.first >= 1);
        assert_eq!(window.first, first_activity.saturating_sub(25).max(1));
    }
}

#[test]
fn trimmed_frames_are_contiguous_for_every_window() {
    const CAPTURED: u64 = 12;
    for first in 1..=CAPTURED {
        for last in first..=CAPTURED + 3 {
            let dir = tempfile::tempdir().expect("tempdir should create");
            let frames = (1..=CAPTURED)
                .map(|frame_number| FrameMetadata {
                    frame_number,
                    timestamp: Duration::from_millis(frame_number * 20),
                    is_visible: frame_number % 5 != 0,
                })
                .collect::<Vec<_>>();
            for frame in &frames {
                fs::write(dir.path().join(frame_file_name("frame", frame.frame_number)), b"")
                    .expect("frame should write");
            }

            let report = trim_frames(dir.path(), &frames, Some(KeepWindow { first, last }))
                .expect("trim should succeed");

            let expected_count = (first..=last.min(CAPTURED))
                .filter(|number| number % 5 != 0)
                .count();
            let numbers = report
                .frames
                .iter()
                .map(|frame| frame.frame_number)
                .collect::<Vec<_>>();
            assert_eq!(numbers, (1..=expected_count as u64).collect::<Vec<_>>());

            let mut on_disk = fs::read_dir(dir.path())
                .expect("dir should list")
                .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
                .collect::<Vec<_>>();
            on_disk.sort();
            let expected_files = (1..=expected_count as u64)
                .map(|number| frame_file_name("frame", number))
                .collect::<Vec<_>>();
            assert_eq!(on_disk, expected_files, "window [{first}, {last}]");
        }
    }
}
