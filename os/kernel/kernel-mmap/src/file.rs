use thiserror::Error;

#[derive(Debug, Copy, Clone, Error, Eq, PartialEq)]
pub enum FileError {
    #[error("I/O error on the backing file")]
    Io,
    #[error("short transfer: {actual} of {expected} bytes")]
    ShortTransfer { expected: usize, actual: usize },
}

/// An open file that can back a memory mapping.
///
/// A handle owns one reference to the underlying open-file object:
/// [`dup`](Self::dup) takes another, dropping the handle releases it. A
/// mapping therefore keeps its file alive after the process closes the
/// descriptor it was created from.
///
/// `read_at` and `write_at` address the underlying inode directly and do not
/// move any descriptor offset. The open mode is only reported through
/// [`readable`](Self::readable) and [`writable`](Self::writable); the mapping
/// layer checks it when a region is created.
pub trait MappedFile {
    fn readable(&self) -> bool;

    fn writable(&self) -> bool;

    /// Take another reference to the same open file.
    #[must_use]
    fn dup(&self) -> Self
    where
        Self: Sized;

    /// Read up to `buf.len()` bytes at `offset`. Returns the number of bytes
    /// read, which is short at end of file.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, FileError>;

    /// Write `buf` at `offset`. Returns the number of bytes written.
    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<usize, FileError>;
}
