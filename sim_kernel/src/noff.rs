//! NOFF executable header
//!
//! User programs ship in a minimal object format: a fixed header followed
//! by raw segment bytes.
//!
//! ## Format
//!
//! The header is ten 32-bit words:
//! - Magic number: 0x00badfad
//! - Code segment descriptor
//! - Initialized data segment descriptor
//! - Uninitialized data segment descriptor
//!
//! Each descriptor is three words, in order: virtual address, offset in
//! the file, size in bytes. Words are little-endian. An image written on a
//! big-endian host is recognised by its byte-swapped magic and corrected
//! word by word.

/// NOFF magic number
pub const NOFF_MAGIC: u32 = 0x00ba_dfad;

/// Size of the on-disk header in bytes
pub const NOFF_HEADER_SIZE: usize = 40;

/// One segment descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Segment {
    /// Where the segment starts in the virtual address space
    pub virtual_addr: u32,
    /// Where the segment's bytes start in the file
    pub in_file_addr: u32,
    /// Segment size in bytes
    pub size: u32,
}

impl Segment {
    fn swapped(self) -> Self {
        Self {
            virtual_addr: self.virtual_addr.swap_bytes(),
            in_file_addr: self.in_file_addr.swap_bytes(),
            size: self.size.swap_bytes(),
        }
    }

    fn write_words(&self, buf: &mut Vec<u8>, to_bytes: fn(u32) -> [u8; 4]) {
        buf.extend_from_slice(&to_bytes(self.virtual_addr));
        buf.extend_from_slice(&to_bytes(self.in_file_addr));
        buf.extend_from_slice(&to_bytes(self.size));
    }
}

/// Decoded executable header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoffHeader {
    pub magic: u32,
    pub code: Segment,
    pub init_data: Segment,
    pub uninit_data: Segment,
}

fn word(bytes: &[u8; NOFF_HEADER_SIZE], index: usize) -> u32 {
    let at = index * 4;
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn segment(bytes: &[u8; NOFF_HEADER_SIZE], first_word: usize) -> Segment {
    Segment {
        virtual_addr: word(bytes, first_word),
        in_file_addr: word(bytes, first_word + 1),
        size: word(bytes, first_word + 2),
    }
}

impl NoffHeader {
    /// Decodes a header, correcting byte order if needed
    ///
    /// # Panics
    ///
    /// Panics if the magic number does not match in either byte order. A
    /// bad magic means the image is corrupt, not merely missing.
    pub fn parse(bytes: &[u8; NOFF_HEADER_SIZE]) -> Self {
        let mut header = Self {
            magic: word(bytes, 0),
            code: segment(bytes, 1),
            init_data: segment(bytes, 4),
            uninit_data: segment(bytes, 7),
        };

        if header.magic != NOFF_MAGIC && header.magic.swap_bytes() == NOFF_MAGIC {
            header = header.swapped();
        }

        assert_eq!(
            header.magic, NOFF_MAGIC,
            "corrupt executable: bad NOFF magic {:#x}",
            header.magic
        );
        header
    }

    fn swapped(self) -> Self {
        Self {
            magic: self.magic.swap_bytes(),
            code: self.code.swapped(),
            init_data: self.init_data.swapped(),
            uninit_data: self.uninit_data.swapped(),
        }
    }

    /// Bytes of address space the segments need, stack excluded
    pub fn image_size(&self) -> usize {
        self.code.size as usize + self.init_data.size as usize + self.uninit_data.size as usize
    }
}

/// Builds NOFF images for tests and demos
///
/// Segments are laid out in the file directly after the header, code
/// first. Code is mapped at virtual address 0 and initialized data right
/// after it unless placed explicitly.
#[derive(Debug, Clone, Default)]
pub struct NoffImageBuilder {
    code: Vec<u8>,
    init_data: Vec<u8>,
    init_data_addr: Option<u32>,
    uninit_size: u32,
    big_endian: bool,
}

impl NoffImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn code(mut self, code: Vec<u8>) -> Self {
        self.code = code;
        self
    }

    pub fn init_data(mut self, data: Vec<u8>) -> Self {
        self.init_data = data;
        self
    }

    /// Maps initialized data at `addr` instead of right after the code
    pub fn init_data_at(mut self, addr: u32) -> Self {
        self.init_data_addr = Some(addr);
        self
    }

    pub fn uninit_size(mut self, size: u32) -> Self {
        self.uninit_size = size;
        self
    }

    /// Writes every header word byte-swapped
    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    /// Returns the header the built image will carry
    pub fn header(&self) -> NoffHeader {
        let code_size = self.code.len() as u32;
        let data_size = self.init_data.len() as u32;
        let header_size = NOFF_HEADER_SIZE as u32;

        NoffHeader {
            magic: NOFF_MAGIC,
            code: Segment {
                virtual_addr: 0,
                in_file_addr: header_size,
                size: code_size,
            },
            init_data: Segment {
                virtual_addr: self.init_data_addr.unwrap_or(code_size),
                in_file_addr: header_size + code_size,
                size: data_size,
            },
            uninit_data: Segment {
                virtual_addr: code_size + data_size,
                in_file_addr: 0,
                size: self.uninit_size,
            },
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let header = self.header();
        let to_bytes: fn(u32) -> [u8; 4] = if self.big_endian {
            u32::to_be_bytes
        } else {
            u32::to_le_bytes
        };

        let mut buf = Vec::with_capacity(NOFF_HEADER_SIZE + self.code.len() + self.init_data.len());
        buf.extend_from_slice(&to_bytes(header.magic));
        header.code.write_words(&mut buf, to_bytes);
        header.init_data.write_words(&mut buf, to_bytes);
        header.uninit_data.write_words(&mut buf, to_bytes);
        buf.extend_from_slice(&self.code);
        buf.extend_from_slice(&self.init_data);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(image: &[u8]) -> [u8; NOFF_HEADER_SIZE] {
        let mut bytes = [0u8; NOFF_HEADER_SIZE];
        bytes.copy_from_slice(&image[..NOFF_HEADER_SIZE]);
        bytes
    }

    #[test]
    fn test_parse_native_header() {
        let builder = NoffImageBuilder::new()
            .code(vec![0xAA; 300])
            .init_data(vec![0xBB; 20])
            .uninit_size(64);
        let image = builder.build();

        let header = NoffHeader::parse(&header_bytes(&image));
        assert_eq!(header, builder.header());
        assert_eq!(header.code.size, 300);
        assert_eq!(header.code.in_file_addr, 40);
        assert_eq!(header.init_data.virtual_addr, 300);
        assert_eq!(header.init_data.in_file_addr, 340);
        assert_eq!(header.uninit_data.size, 64);
        assert_eq!(header.image_size(), 384);
    }

    #[test]
    fn test_parse_swapped_header() {
        let builder = NoffImageBuilder::new().code(vec![1; 10]).big_endian();
        let image = builder.build();

        // Raw magic is byte-swapped on disk
        assert_eq!(word(&header_bytes(&image), 0), NOFF_MAGIC.swap_bytes());

        let header = NoffHeader::parse(&header_bytes(&image));
        assert_eq!(header.magic, NOFF_MAGIC);
        assert_eq!(header.code.size, 10);
        assert_eq!(header.code.in_file_addr, 40);
    }

    #[test]
    #[should_panic(expected = "bad NOFF magic")]
    fn test_corrupt_magic_panics() {
        let mut image = NoffImageBuilder::new().code(vec![1; 4]).build();
        image[0] = 0x42;
        NoffHeader::parse(&header_bytes(&image));
    }

    #[test]
    fn test_segment_bytes_follow_header() {
        let image = NoffImageBuilder::new()
            .code(vec![7, 8, 9])
            .init_data(vec![5])
            .build();
        assert_eq!(image.len(), NOFF_HEADER_SIZE + 4);
        assert_eq!(&image[40..], &[7, 8, 9, 5]);
    }

    #[test]
    fn test_explicit_init_data_address() {
        let header = NoffImageBuilder::new()
            .code(vec![0; 8])
            .init_data(vec![1; 8])
            .init_data_at(256)
            .header();
        assert_eq!(header.init_data.virtual_addr, 256);
        assert_eq!(header.init_data.in_file_addr, 48);
    }
}
