//! Template source: text plus a filename label used only in messages.

use teng_core::{ErrorLog, Pos};

/// One template source. Positions inside it are counted in Unicode
/// characters from `1:0`.
#[derive(Debug, Clone)]
pub struct Source {
    pub text: String,
    pub filename: String,
}

impl Source {
    pub fn new(text: impl Into<String>, filename: impl Into<String>) -> Self {
        Self { text: text.into(), filename: filename.into() }
    }

    /// Build a source from raw bytes. Stray bytes that are not valid UTF-8
    /// are replaced with U+FFFD, count as one column each, and produce a
    /// warning with their position.
    pub fn from_bytes(bytes: &[u8], filename: impl Into<String>, log: &mut ErrorLog) -> Self {
        let mut text = String::with_capacity(bytes.len());
        let mut pos = Pos::start();
        let mut rest = bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(err) => {
                    let valid = &rest[..err.valid_up_to()];
                    // from_utf8 guarantees this prefix is valid
                    let valid = unsafe { std::str::from_utf8_unchecked(valid) };
                    text.push_str(valid);
                    pos.advance_str(valid);

                    let bad_len = err.error_len().unwrap_or(rest.len() - err.valid_up_to());
                    let bad = &rest[err.valid_up_to()..err.valid_up_to() + bad_len];
                    for byte in bad {
                        log.warning(
                            pos,
                            format!("Invalid utf-8 byte '0x{byte:02x}' in template; \
                                     replacing it with the replacement character"),
                        );
                        text.push('\u{FFFD}');
                        pos.advance('\u{FFFD}');
                    }
                    rest = &rest[err.valid_up_to() + bad_len..];
                }
            }
        }
        Self { text, filename: filename.into() }
    }
}
