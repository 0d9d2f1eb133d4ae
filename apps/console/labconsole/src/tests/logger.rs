// Unit tests for logger module initialization logic

use crate::error::ConsoleError;
use crate::logger::initialize;

use std::path::PathBuf;

use tempfile::TempDir;

/// **VALUE**: Verifies that calling initialize() multiple times doesn't panic or fail.
///
/// **WHY THIS MATTERS**: The binary and the tests may both install the logger; fern
/// refuses a second global logger.
///
/// **BUG THIS CATCHES**: Would catch the Once or AtomicBool guards being removed.
#[test]
fn given_logger_initialized_when_called_again_then_returns_ok() {
    // GIVEN: A valid temporary directory
    let temp_dir = TempDir::new().expect("temp dir");

    // WHEN: Calling initialize twice
    let first = initialize(temp_dir.path());
    let second = initialize(temp_dir.path());

    // THEN: Both return Ok
    assert!(first.is_ok(), "First initialization should succeed");
    assert!(second.is_ok(), "Second initialization should be a no-op");
}

/// **VALUE**: Verifies an unusable log directory is reported, not panicked on.
///
/// **WHY THIS MATTERS**: A read-only data directory must produce a clear startup error.
///
/// **BUG THIS CATCHES**: Would catch `fern::log_file()` being unwrapped, or the failed
/// attempt being counted as an installed logger.
#[test]
fn given_invalid_log_dir_when_initialize_called_then_returns_error() {
    // GIVEN: A path under a file, which can never be a directory
    let invalid_dir = PathBuf::from("/dev/null/invalid-path");

    // WHEN: Calling initialize
    let result = initialize(&invalid_dir);

    // THEN: A console error naming the file
    match result {
        Err(ConsoleError::Console { message, .. }) => {
            assert!(message.contains("labconsole.log"));
        }
        other => panic!("Expected ConsoleError::Console, got {other:?}"),
    }
}
