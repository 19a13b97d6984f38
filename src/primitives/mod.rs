//! Field-level helpers shared by every binary codec.
//!
//! Decoders measure the remaining stream once, then grow a [`MinLength`]
//! as header counts become known. A call fails with `Truncated` before any
//! body data is read if the declared sizes cannot fit.

pub mod text;

use std::io::{Read, Seek, SeekFrom};

use binrw::{BinRead, BinWrite};

use crate::error::{ErrorContext, Result};

/// Bytes left between the current position and the end of the stream.
pub fn remaining_len<S: Seek>(stream: &mut S) -> std::io::Result<u64> {
    let pos = stream.stream_position()?;
    let end = stream.seek(SeekFrom::End(0))?;
    stream.seek(SeekFrom::Start(pos))?;
    Ok(end.saturating_sub(pos))
}

/// Running minimum-length check for one decode call.
#[derive(Debug, Clone)]
pub struct MinLength {
    ctx: ErrorContext,
    available: u64,
    required: u64,
}

impl MinLength {
    /// Measures the stream and checks the fixed header size.
    pub fn start<S: Seek>(stream: &mut S, ctx: ErrorContext, header: u64) -> Result<Self> {
        let available = remaining_len(stream).map_err(|e| ctx.io(e))?;
        let mut this = Self {
            ctx,
            available,
            required: 0,
        };
        this.add("header", 1, header)?;
        Ok(this)
    }

    /// Adds `count` records of `size` bytes to the required length.
    pub fn add(&mut self, what: &'static str, count: u64, size: u64) -> Result<()> {
        self.required = self.required.saturating_add(count.saturating_mul(size));
        self.check(what)
    }

    /// Requires the stream to hold at least `total` bytes from its start.
    pub fn at_least(&mut self, what: &'static str, total: u64) -> Result<()> {
        self.required = self.required.max(total);
        self.check(what)
    }

    fn check(&self, what: &'static str) -> Result<()> {
        if self.required > self.available {
            return Err(self.ctx.truncated(what, self.required, self.available));
        }
        Ok(())
    }

    pub fn available(&self) -> u64 {
        self.available
    }

    pub fn required(&self) -> u64 {
        self.required
    }
}

/// Reads a little-endian value, mapping binrw failures onto codec errors.
pub fn read_le<T, R>(reader: &mut R, ctx: ErrorContext) -> Result<T>
where
    R: Read + Seek,
    T: for<'a> BinRead<Args<'a> = ()>,
{
    T::read_options(reader, binrw::Endian::Little, ()).map_err(|e| ctx.binrw(e))
}

/// Reads `count` consecutive little-endian records.
pub fn read_vec_le<T, R>(reader: &mut R, ctx: ErrorContext, count: usize) -> Result<Vec<T>>
where
    R: Read + Seek,
    T: for<'a> BinRead<Args<'a> = ()> + 'static,
{
    Vec::<T>::read_options(
        reader,
        binrw::Endian::Little,
        binrw::VecArgs {
            count,
            inner: (),
        },
    )
    .map_err(|e| ctx.binrw(e))
}

pub fn write_le<T, W>(value: &T, writer: &mut W, ctx: ErrorContext) -> Result<()>
where
    W: std::io::Write + Seek,
    T: for<'a> BinWrite<Args<'a> = ()>,
{
    value
        .write_options(writer, binrw::Endian::Little, ())
        .map_err(|e| ctx.binrw(e))
}

/// Checks an exact magic sequence at the current position.
pub fn expect_magic<R: Read>(reader: &mut R, ctx: ErrorContext, magic: &[u8]) -> Result<()> {
    let mut found = vec![0u8; magic.len()];
    reader.read_exact(&mut found).map_err(|e| ctx.io(e))?;
    if found != magic {
        return Err(ctx.malformed(format!(
            "expected magic {:?}, found {:?}",
            String::from_utf8_lossy(magic),
            String::from_utf8_lossy(&found)
        )));
    }
    Ok(())
}

/// Decodes a NUL-padded name, stopping at the first NUL.
pub fn parse_fixed_name(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).to_string()
}

/// Encodes a name into a NUL-padded buffer of `N` bytes.
///
/// Names that do not leave room for the terminating NUL are cut at the
/// last char boundary that fits.
pub fn fixed_name<const N: usize>(name: &str) -> [u8; N] {
    let mut raw = [0u8; N];
    let fitted = truncate_str(name, N.saturating_sub(1));
    if fitted.len() < name.len() {
        log::warn!("name `{}` truncated to {} bytes", name, fitted.len());
    }
    raw[..fitted.len()].copy_from_slice(fitted.as_bytes());
    raw
}

/// Longest prefix of `s` that is at most `max` bytes and ends on a char boundary.
pub fn truncate_str(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Reads a NUL-terminated string of at most `max` bytes from `blob`.
///
/// Returns the name and the byte stride to the next entry, which is the
/// consumed length plus the terminator rounded up to 4.
pub fn read_nul_string(blob: &[u8], max: usize) -> (String, usize) {
    let len = blob
        .iter()
        .take(max)
        .position(|&b| b == 0)
        .unwrap_or(max.min(blob.len()));
    let name = String::from_utf8_lossy(&blob[..len]).to_string();
    (name, (len + 4) & !3)
}

/// True when the three corners are pairwise distinct and inside `0..vertex_count`.
pub fn valid_triangle(corners: [i64; 3], vertex_count: usize) -> bool {
    let [a, b, c] = corners;
    let in_range = |i: i64| i >= 0 && (i as u64) < vertex_count as u64;
    a != b && a != c && b != c && in_range(a) && in_range(b) && in_range(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CodecError, Format};
    use std::io::Cursor;

    #[test]
    fn test_valid_triangle() {
        assert!(valid_triangle([0, 1, 2], 3));
        assert!(!valid_triangle([0, 1, 1], 3));
        assert!(!valid_triangle([0, 1, 3], 3));
        assert!(!valid_triangle([-1, 1, 2], 3));
    }

    #[test]
    fn test_min_length_fails_before_body() {
        let mut cursor = Cursor::new(vec![0u8; 30]);
        let ctx = ErrorContext::decode(Format::Skeleton);
        let mut min = MinLength::start(&mut cursor, ctx, 20).unwrap();
        let err = min.add("bones", 1, 0x58).unwrap_err();
        match err {
            CodecError::Truncated {
                required,
                available,
                what,
                ..
            } => {
                assert_eq!(required, 20 + 0x58);
                assert_eq!(available, 30);
                assert_eq!(what, "bones");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_remaining_len_keeps_position() {
        let mut cursor = Cursor::new(vec![0u8; 16]);
        cursor.set_position(6);
        assert_eq!(remaining_len(&mut cursor).unwrap(), 10);
        assert_eq!(cursor.position(), 6);
    }

    #[test]
    fn test_fixed_name_keeps_terminator() {
        let raw: [u8; 8] = fixed_name("abcdefghij");
        assert_eq!(&raw, b"abcdefg\0");
        assert_eq!(parse_fixed_name(&raw), "abcdefg");

        let raw: [u8; 8] = fixed_name("ab");
        assert_eq!(&raw, b"ab\0\0\0\0\0\0");
    }

    #[test]
    fn test_truncate_str_respects_char_boundary() {
        assert_eq!(truncate_str("héllo", 2), "h");
        assert_eq!(truncate_str("héllo", 3), "hé");
    }

    #[test]
    fn test_nul_string_stride_is_aligned() {
        let blob = b"root\0\0\0\0spine\0\0\0";
        let (name, stride) = read_nul_string(blob, 31);
        assert_eq!(name, "root");
        assert_eq!(stride, 8);
        let (name, stride) = read_nul_string(&blob[stride..], 31);
        assert_eq!(name, "spine");
        assert_eq!(stride, 8);

        let (_, stride) = read_nul_string(b"abc\0", 31);
        assert_eq!(stride, 4);
    }

    #[test]
    fn test_bad_magic_is_malformed() {
        let mut cursor = Cursor::new(b"r3d2xxxx".to_vec());
        let err = expect_magic(&mut cursor, ErrorContext::decode(Format::Animation), b"r3d2anmd")
            .unwrap_err();
        assert!(matches!(err, CodecError::MalformedHeader { .. }));
    }
}
