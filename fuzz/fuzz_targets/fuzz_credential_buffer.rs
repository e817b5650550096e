#![no_main]

use arbitrary::Arbitrary;
use fancylock_core::SecureCredentialBuffer;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Byte(u8),
    Char(char),
    Erase,
    Clear,
}

#[derive(Debug, Arbitrary)]
struct Input {
    max_len: u8,
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    let mut buffer = SecureCredentialBuffer::with_max_len(input.max_len as usize);
    // The buffer holds at least one byte whatever was requested
    let max_len = buffer.max_len();
    let mut chars_only = true;

    for op in input.ops {
        match op {
            Op::Byte(byte) => {
                let before = buffer.len();
                let accepted = buffer.append(byte);
                assert_eq!(accepted, before < max_len);
                chars_only &= !accepted;
            }
            Op::Char(c) => {
                let before = buffer.len();
                let accepted = buffer.push_char(c);
                assert_eq!(accepted, before + c.len_utf8() <= max_len);
            }
            Op::Erase => {
                let before = buffer.len();
                assert_eq!(buffer.remove_last(), before > 0);
                assert!(buffer.len() < before || before == 0);
            }
            Op::Clear => {
                buffer.clear();
                assert!(buffer.is_empty());
                chars_only = true;
            }
        }

        // The cap always holds
        assert!(buffer.len() <= max_len);

        // Typed text stays valid UTF-8 through edits
        if chars_only {
            assert!(std::str::from_utf8(buffer.expose()).is_ok());
            assert_eq!(
                buffer.char_count(),
                std::str::from_utf8(buffer.expose()).map_or(0, |s| s.chars().count())
            );
        }
    }
});
