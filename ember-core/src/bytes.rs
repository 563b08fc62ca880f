use std::ops::{Deref, DerefMut};

/// Growable byte buffer with little-endian fixed-width writers.
#[repr(transparent)]
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct ByteBuf(Vec<u8>);

impl ByteBuf {
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self(Vec::with_capacity(cap))
    }

    #[inline]
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }

    #[inline]
    pub fn put_i64(&mut self, n: i64) {
        self.put_bytes(&n.to_le_bytes());
    }

    #[inline]
    pub fn put_f64(&mut self, n: f64) {
        self.put_bytes(&n.to_le_bytes());
    }

    #[inline]
    pub fn put_bool(&mut self, b: bool) {
        self.0.push(u8::from(b));
    }

    /// Writes the UTF-8 encoding of `c` (1 to 4 bytes).
    #[inline]
    pub fn put_char(&mut self, c: char) {
        let mut tmp = [0u8; 4];
        self.put_bytes(c.encode_utf8(&mut tmp).as_bytes());
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for ByteBuf {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for ByteBuf {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<ByteBuf> for Vec<u8> {
    fn from(value: ByteBuf) -> Self {
        value.0
    }
}

/// Copies the first `N` bytes of `bytes`, or None when the slice is too short.
#[inline]
fn leading<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
    let head = bytes.get(..N)?;
    let mut buf = [0u8; N];
    buf.copy_from_slice(head);
    Some(buf)
}

pub fn read_i64_le(bytes: &[u8]) -> Option<i64> {
    leading::<8>(bytes).map(i64::from_le_bytes)
}

pub fn read_i32_le(bytes: &[u8]) -> Option<i32> {
    leading::<4>(bytes).map(i32::from_le_bytes)
}

pub fn read_f64_le(bytes: &[u8]) -> Option<f64> {
    leading::<8>(bytes).map(f64::from_le_bytes)
}

pub fn read_f32_le(bytes: &[u8]) -> Option<f32> {
    leading::<4>(bytes).map(f32::from_le_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_little_endian() {
        let mut buf = ByteBuf::new();
        buf.put_i64(1);
        buf.put_bool(true);
        buf.put_char('é');
        assert_eq!(buf.as_slice(), &[1, 0, 0, 0, 0, 0, 0, 0, 1, 0xC3, 0xA9]);
    }

    #[test]
    fn short_input_reads_none() {
        assert_eq!(read_i64_le(&[1, 2, 3]), None);
        assert_eq!(read_i32_le(&[0xff, 0xff, 0xff, 0xff, 9]), Some(-1));
        assert_eq!(read_f64_le(&2.5f64.to_le_bytes()), Some(2.5));
        assert_eq!(read_f32_le(&1.5f32.to_le_bytes()), Some(1.5));
    }
}
