#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use strict_png::{decode_batch, DecodeConfig, DecodePolicy, DecodeTask, ErrorKind};

#[derive(Arbitrary, Debug)]
struct Input {
    items: Vec<Vec<u8>>,
    policy_byte: u8,
}

fn policy_from_byte(b: u8) -> DecodePolicy {
    match b % 3 {
        0 => DecodePolicy::Fuzzing,
        1 => DecodePolicy::Strict,
        _ => DecodePolicy::Lenient,
    }
}

fuzz_target!(|input: Input| {
    // Cap items to keep each run short.
    let config = DecodeConfig::apply_policy(policy_from_byte(input.policy_byte));
    let tasks: Vec<DecodeTask> = input
        .items
        .into_iter()
        .take(16)
        .map(|bytes| DecodeTask::new(bytes, config.clone()))
        .collect();

    let results = decode_batch(&tasks);
    assert_eq!(results.len(), tasks.len());
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.index, i);
        assert_eq!(result.success, result.image.is_some());
        assert_ne!(result.error_code, Some(ErrorKind::Internal));
    }
});
