use crate::ErrorLocation;

use std::panic::Location;

/// **VALUE**: Verifies that `ErrorLocation::from()` captures the constructing file and a real position.
///
/// **WHY THIS MATTERS**: Every error in the workspace carries an `ErrorLocation`. If it stops
/// pointing at the construction site, log lines about dropped frames or failed persistence
/// lose their debugging value.
///
/// **BUG THIS CATCHES**: Would catch if `Location::caller()` propagation breaks or the
/// file/line/column fields are swapped or zeroed.
#[test]
fn given_location_caller_when_error_location_created_then_captures_file_line_column() {
    // GIVEN/WHEN: An ErrorLocation built from the current position
    let expected_line = line!() + 1;
    let location = ErrorLocation::from(Location::caller());

    // THEN: File, line and column reflect this test
    assert!(
        location.file.contains("error_location.rs"),
        "Should capture file path, got {}",
        location.file
    );
    assert_eq!(location.line, expected_line, "Should capture line number");
    assert!(location.column > 0, "Should capture column number");
}

/// **VALUE**: Verifies the `[file:line:column]` display format.
///
/// **WHY THIS MATTERS**: Error messages embed the location through `Display`; a format change
/// silently breaks log grepping.
///
/// **BUG THIS CATCHES**: Would catch if the brackets or separators change.
#[test]
fn given_error_location_when_displayed_then_uses_bracketed_format() {
    // GIVEN: A hand-built location
    let location = ErrorLocation {
        file: "src/transport/multiplexer.rs",
        line: 42,
        column: 7,
    };

    // WHEN: Formatting it
    let rendered = location.to_string();

    // THEN: Format is [file:line:column]
    assert_eq!(rendered, "[src/transport/multiplexer.rs:42:7]");
}
