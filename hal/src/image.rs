//! Executable image source abstraction
//!
//! The kernel only ever needs positional reads from an executable; how
//! images are named and stored belongs to the file system.

/// An open executable image
///
/// The handle is closed when dropped.
pub trait OpenFile {
    /// Reads up to `buf.len()` bytes starting at `offset`
    ///
    /// Returns the number of bytes read, which is short (possibly zero)
    /// when the read runs past the end of the image.
    fn read_at(&mut self, buf: &mut [u8], offset: usize) -> usize;

    /// Total length of the image in bytes
    fn length(&self) -> usize;
}

/// Named executable images
pub trait ImageSource {
    /// Opens an image by name, or returns `None` if it does not exist
    fn open(&self, name: &str) -> Option<Box<dyn OpenFile + '_>>;
}
