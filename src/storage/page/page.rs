use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageError {
    #[error("value at offset {offset} overruns the page (length {len}, page size {page_size})")]
    OutOfBounds {
        offset: usize,
        len: usize,
        page_size: usize,
    },
    #[error("string at offset {0} is not valid UTF-8")]
    InvalidUtf8(usize),
}

/// An in-memory buffer of exactly one disk block. A page is just bytes
/// until bound to a [`crate::storage::page::BlockId`] by a read or write;
/// typed accessors interpret the buffer at caller-specified byte offsets.
///
/// Fixed-width accessors (`get_int`, `get_u64`) treat an out-of-range
/// offset as a caller bug and panic; the variable-length accessors return
/// an error instead, because their lengths are read from disk and may be
/// garbage in a corrupt block.
pub struct Page {
    buf: Box<[u8]>,
}

impl Page {
    /// Bytes of overhead a length-prefixed value adds to its payload.
    const LEN_PREFIX: usize = 4;

    pub fn new(block_size: usize) -> Self {
        Self {
            buf: vec![0; block_size].into_boxed_slice(),
        }
    }

    /// Wrap an existing byte buffer, e.g. a log record.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            buf: bytes.into_boxed_slice(),
        }
    }

    pub fn size(&self) -> usize {
        self.buf.len()
    }

    pub fn get_int(&self, offset: usize) -> i32 {
        LittleEndian::read_i32(&self.buf[offset..offset + 4])
    }

    pub fn set_int(&mut self, offset: usize, value: i32) {
        LittleEndian::write_i32(&mut self.buf[offset..offset + 4], value);
    }

    pub fn get_u64(&self, offset: usize) -> u64 {
        LittleEndian::read_u64(&self.buf[offset..offset + 8])
    }

    pub fn set_u64(&mut self, offset: usize, value: u64) {
        LittleEndian::write_u64(&mut self.buf[offset..offset + 8], value);
    }

    /// Read a length-prefixed byte slice stored at `offset`.
    pub fn get_bytes(&self, offset: usize) -> Result<&[u8], PageError> {
        if offset + Self::LEN_PREFIX > self.buf.len() {
            return Err(PageError::OutOfBounds {
                offset,
                len: Self::LEN_PREFIX,
                page_size: self.buf.len(),
            });
        }
        let len = self.get_int(offset) as usize;
        let start = offset + Self::LEN_PREFIX;
        if start + len > self.buf.len() {
            return Err(PageError::OutOfBounds {
                offset,
                len,
                page_size: self.buf.len(),
            });
        }
        Ok(&self.buf[start..start + len])
    }

    /// Store `bytes` at `offset`, prefixed with their length.
    pub fn set_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.set_int(offset, bytes.len() as i32);
        let start = offset + Self::LEN_PREFIX;
        self.buf[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Read a length-prefixed UTF-8 string stored at `offset`.
    pub fn get_string(&self, offset: usize) -> Result<String, PageError> {
        let bytes = self.get_bytes(offset)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| PageError::InvalidUtf8(offset))
    }

    pub fn set_string(&mut self, offset: usize, value: &str) {
        self.set_bytes(offset, value.as_bytes());
    }

    /// The number of bytes needed to store a string of `strlen` bytes.
    pub fn max_length(strlen: usize) -> usize {
        Self::LEN_PREFIX + strlen
    }

    pub(crate) fn contents(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn contents_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}
