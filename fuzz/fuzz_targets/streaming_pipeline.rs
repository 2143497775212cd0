#![no_main]

//! Drives a DecodeSession row by row, stopping at an arbitrary point and
//! poking at out-of-order calls along the way.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use strict_png::{DecodeConfig, DecodeSession, ErrorKind, SessionState, TransformSet};

#[derive(Arbitrary, Debug)]
struct StreamInput {
    data: Vec<u8>,
    transforms: u32,
    stop_after: Option<u16>,
    early_finalize: bool,
}

fuzz_target!(|input: StreamInput| {
    let config =
        DecodeConfig::fuzzing().with_transforms(TransformSet::from_bits_truncate(input.transforms));
    let Ok(mut session) = DecodeSession::new(&input.data, config) else {
        return;
    };
    if session.read_header().is_err() {
        assert_eq!(session.state(), SessionState::Failed);
        return;
    }
    let line_size = match session.begin_rows() {
        Ok(info) => info.line_size,
        Err(_) => return,
    };

    if input.early_finalize && session.rows_remaining() > 0 {
        let err = session.finalize().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(session.state(), SessionState::RowsReading);
    }

    let mut rows = 0u32;
    loop {
        if input.stop_after.is_some_and(|n| rows >= u32::from(n)) {
            return;
        }
        match session.read_row() {
            Ok(Some(row)) => {
                assert!(row.data.len() <= line_size);
                rows += 1;
            }
            Ok(None) => break,
            Err(_) => {
                assert_eq!(session.state(), SessionState::Failed);
                return;
            }
        }
    }
    assert_eq!(session.rows_remaining(), 0);
    if session.finalize().is_ok() {
        assert_eq!(session.state(), SessionState::Finalized);
    }
});
