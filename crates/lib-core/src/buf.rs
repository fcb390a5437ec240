use std::io;

/// Growable byte buffer used by the decoder while accumulating tokens.
///
/// The only operation that is not a plain `Vec` passthrough is
/// [`Buf::rewind`], which undoes the last `n` pushes; the parser uses it to
/// drop value terminators it only recognises one byte too late.
#[derive(Debug, Default)]
pub struct Buf {
    data: Vec<u8>,
}

impl Buf {
    pub fn new() -> Self {
        Buf::default()
    }

    pub fn push(&mut self, byte: u8) {
        self.data.push(byte);
    }

    pub fn push_str(&mut self, s: &str) {
        self.data.extend_from_slice(s.as_bytes());
    }

    /// Undo the last `n` pushes. Rewinding past the start empties the
    /// buffer instead of failing.
    pub fn rewind(&mut self, n: usize) {
        let new_len = self.data.len().saturating_sub(n);
        self.data.truncate(new_len);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn last(&self) -> Option<u8> {
        self.data.last().copied()
    }

    /// Finalize into an owned string. The rec format is line oriented text;
    /// byte sequences that are not valid UTF-8 are rejected as data errors.
    pub fn into_string(self) -> io::Result<String> {
        String::from_utf8(self.data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.utf8_error()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_push_rewind_finalize() {
        let mut buf = Buf::new();
        buf.push_str("value");
        buf.push(b'\n');
        assert_eq!(buf.len(), 6);

        buf.rewind(1);
        assert_eq!(buf.into_string().unwrap(), "value");
    }

    #[test]
    fn test_rewind_past_start() {
        let mut buf = Buf::new();
        buf.push(b'x');
        buf.rewind(10);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_a_data_error() {
        let mut buf = Buf::new();
        buf.push(0xff);
        assert!(buf.into_string().is_err());
    }
}
