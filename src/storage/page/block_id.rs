use std::fmt;

/// Identifies a fixed-size unit of disk storage: a file name plus a
/// zero-based block number within that file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId {
    filename: String,
    num: u64,
}

impl BlockId {
    /// Sentinel block number standing for "the end of the file". Locking
    /// this pseudo-block serializes file extension against readers of the
    /// file size; it is never read or written.
    const END_OF_FILE: u64 = u64::MAX;

    pub fn new(filename: impl Into<String>, num: u64) -> Self {
        Self {
            filename: filename.into(),
            num,
        }
    }

    /// The pseudo-block used to lock the size of `filename`.
    pub fn end_of_file(filename: impl Into<String>) -> Self {
        Self::new(filename, Self::END_OF_FILE)
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn number(&self) -> u64 {
        self.num
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[file {}, block {}]", self.filename, self.num)
    }
}
