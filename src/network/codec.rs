//! Line framing for the chat transport.
//!
//! Frames are `\n`-terminated; a CR before the LF is stripped. The decoder
//! enforces the hard line cap (including the LF) and replaces invalid UTF-8
//! with U+FFFD instead of dropping the line.

use crate::proto::MAX_LINE_BYTES;
use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

#[derive(Debug, Error)]
pub enum LineCodecError {
    /// A frame exceeded [`MAX_LINE_BYTES`]. Grounds for disconnect.
    #[error("line exceeds {MAX_LINE_BYTES} bytes")]
    LineTooLong,

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

/// Codec for `<prefix><content>\n` lines, bounded at [`MAX_LINE_BYTES`].
#[derive(Debug, Default)]
pub struct LineCodec;

impl Decoder for LineCodec {
    type Item = String;
    type Error = LineCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, LineCodecError> {
        match src.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                // pos + 1 is the frame length including the LF.
                if pos + 1 > MAX_LINE_BYTES {
                    return Err(LineCodecError::LineTooLong);
                }
                let frame = src.split_to(pos + 1);
                let mut content = &frame[..pos];
                if content.ends_with(b"\r") {
                    content = &content[..content.len() - 1];
                }
                Ok(Some(String::from_utf8_lossy(content).into_owned()))
            }
            None => {
                // Enough buffered that any completed line must exceed the cap.
                if src.len() >= MAX_LINE_BYTES {
                    return Err(LineCodecError::LineTooLong);
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = LineCodecError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), LineCodecError> {
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: &[u8]) -> Vec<Result<String, LineCodecError>> {
        let mut codec = LineCodec;
        let mut buf = BytesMut::from(input);
        let mut out = Vec::new();
        loop {
            match codec.decode(&mut buf) {
                Ok(Some(line)) => out.push(Ok(line)),
                Ok(None) => break,
                Err(e) => {
                    out.push(Err(e));
                    break;
                }
            }
        }
        out
    }

    #[test]
    fn splits_lines_and_strips_cr() {
        let lines = decode_all(b"NAlice\r\nMHello\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].as_ref().unwrap(), "NAlice");
        assert_eq!(lines[1].as_ref().unwrap(), "MHello");
    }

    #[test]
    fn partial_line_waits_for_more() {
        let mut codec = LineCodec;
        let mut buf = BytesMut::from(&b"NAli"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"ce\n");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), "NAlice");
    }

    #[test]
    fn exactly_max_bytes_including_lf_is_accepted() {
        // 'M' + 1022 payload bytes + LF = 1024 bytes.
        let mut line = vec![b'M'];
        line.extend(std::iter::repeat_n(b'a', MAX_LINE_BYTES - 2));
        line.push(b'\n');
        assert_eq!(line.len(), MAX_LINE_BYTES);
        let decoded = decode_all(&line);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].as_ref().unwrap().len(), MAX_LINE_BYTES - 1);
    }

    #[test]
    fn one_byte_over_is_rejected() {
        let mut line = vec![b'M'];
        line.extend(std::iter::repeat_n(b'a', MAX_LINE_BYTES - 1));
        line.push(b'\n');
        assert_eq!(line.len(), MAX_LINE_BYTES + 1);
        let decoded = decode_all(&line);
        assert!(matches!(decoded[0], Err(LineCodecError::LineTooLong)));
    }

    #[test]
    fn unterminated_run_at_cap_is_rejected() {
        let decoded = decode_all(&vec![b'a'; MAX_LINE_BYTES]);
        assert!(matches!(decoded[0], Err(LineCodecError::LineTooLong)));
    }

    #[test]
    fn invalid_utf8_is_replaced_not_dropped() {
        let decoded = decode_all(b"M\xff\xfehi\n");
        let line = decoded[0].as_ref().unwrap();
        assert!(line.starts_with('M'));
        assert!(line.contains('\u{fffd}'));
        assert!(line.ends_with("hi"));
    }

    #[test]
    fn encoder_appends_lf() {
        let mut codec = LineCodec;
        let mut buf = BytesMut::new();
        codec.encode("YAlice".to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"YAlice\n");
    }
}
