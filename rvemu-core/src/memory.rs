//! Flat, byte-addressable guest address space.

use crate::Config;
use log::debug;
use thiserror::Error;

macro_rules! access_fns {
    ( $( $read_fn:ident, $write_fn:ident => $u:ident ),* $(,)? ) => {
        $(
            /// Reads a little-endian value at the specified address.
            ///
            /// The address doesn't need to be naturally aligned.
            pub fn $read_fn(&self, address: u64) -> Result<$u, MemoryError> {
                let mut buf = [0u8; std::mem::size_of::<$u>()];
                self.read(&mut buf, address).map(|()| $u::from_le_bytes(buf))
            }

            /// Writes a little-endian value at the specified address.
            ///
            /// The address doesn't need to be naturally aligned.
            pub fn $write_fn(&mut self, address: u64, value: $u) -> Result<(), MemoryError> {
                self.write(address, &value.to_le_bytes())
            }
        )*
    };
}

/// Guest memory: a single zero-initialized buffer addressed by virtual addresses starting at `0`.
///
/// Virtual addresses map one-to-one onto offsets in the buffer. Every access is bounds checked
/// through [`translate`](Self::translate), and misaligned accesses are supported.
///
/// The heap break is pure bookkeeping: it only decides what `brk` reports, memory above it is as
/// accessible as memory below it.
#[derive(Debug, Clone)]
pub struct Memory {
    data: Vec<u8>,
    /// Initial break, the lowest value the heap break can be moved back to.
    heap_start: u64,
    heap_break: u64,
    /// The break can't move past this address, which marks the bottom of the stack region.
    heap_limit: u64,
}

impl Memory {
    /// Allocates a zeroed address space of `config.memory_size` bytes.
    pub fn new(config: &Config) -> Result<Self, MemoryError> {
        let size = config.memory_size;
        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| MemoryError::Allocation { size })?;
        data.resize(size, 0);
        let heap_limit = config
            .initial_stack_pointer()
            .saturating_sub(config.stack_size);
        Ok(Self {
            data,
            heap_start: 0,
            heap_break: 0,
            heap_limit,
        })
    }

    /// Returns the size of the address space in bytes.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Maps the access of `size` bytes at virtual `address` to an offset in the backing buffer.
    ///
    /// Fails if any of the accessed bytes lies outside the address space.
    pub fn translate(&self, address: u64, size: usize) -> Result<usize, MemoryError> {
        usize::try_from(address)
            .ok()
            .filter(|&offset| {
                offset
                    .checked_add(size)
                    .is_some_and(|end| end <= self.data.len())
            })
            .ok_or(MemoryError::OutOfBounds { address, size })
    }

    pub fn read(&self, buf: &mut [u8], address: u64) -> Result<(), MemoryError> {
        buf.copy_from_slice(self.slice(address, buf.len())?);
        Ok(())
    }

    pub fn write(&mut self, address: u64, buf: &[u8]) -> Result<(), MemoryError> {
        self.slice_mut(address, buf.len())?.copy_from_slice(buf);
        Ok(())
    }

    /// Borrows `len` bytes of guest memory starting at `address`.
    pub fn slice(&self, address: u64, len: usize) -> Result<&[u8], MemoryError> {
        let offset = self.translate(address, len)?;
        Ok(&self.data[offset..offset + len])
    }

    /// Mutably borrows `len` bytes of guest memory starting at `address`.
    pub fn slice_mut(&mut self, address: u64, len: usize) -> Result<&mut [u8], MemoryError> {
        let offset = self.translate(address, len)?;
        Ok(&mut self.data[offset..offset + len])
    }

    pub fn read_byte(&self, address: u64) -> Result<u8, MemoryError> {
        let mut buf = [0];
        self.read(&mut buf, address).map(|()| buf[0])
    }

    pub fn write_byte(&mut self, address: u64, value: u8) -> Result<(), MemoryError> {
        self.write(address, &[value])
    }

    access_fns! {
        read_halfword, write_halfword => u16,
        read_word, write_word => u32,
        read_doubleword, write_doubleword => u64,
    }

    /// Copies a loadable segment into memory: `bytes` go to `address`, and the remainder of the
    /// `length` bytes long segment is zeroed.
    ///
    /// Nothing is written if the segment doesn't fit.
    pub fn write_segment(
        &mut self,
        address: u64,
        length: usize,
        bytes: &[u8],
    ) -> Result<(), MemoryError> {
        let length = length.max(bytes.len());
        let segment = self.slice_mut(address, length)?;
        let (initialized, zeroed) = segment.split_at_mut(bytes.len());
        initialized.copy_from_slice(bytes);
        zeroed.fill(0);
        debug!(
            "loaded segment [{:#x}..{:#x}] ({} bytes from image)",
            address,
            address + length as u64,
            bytes.len()
        );
        Ok(())
    }

    pub fn heap_break(&self) -> u64 {
        self.heap_break
    }

    /// Seeds both the initial and the current heap break, typically with the end of the loaded
    /// image's data.
    pub fn set_heap_start(&mut self, address: u64) {
        self.heap_start = address;
        self.heap_break = address;
    }

    /// Moves the heap break to `address` if it lies between the initial break and the stack
    /// region. Returns the break in effect afterwards.
    pub fn move_heap_break(&mut self, address: u64) -> u64 {
        if (self.heap_start..=self.heap_limit).contains(&address) {
            debug!("heap break moved from {:#x} to {:#x}", self.heap_break, address);
            self.heap_break = address;
        } else {
            debug!("refusing to move heap break to {address:#x}");
        }
        self.heap_break
    }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum MemoryError {
    #[error("access of {size} byte(s) at {address:#x} is out of bounds")]
    OutOfBounds { address: u64, size: usize },
    #[error("unable to allocate {size} bytes of guest memory")]
    Allocation { size: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(size: usize) -> Memory {
        let config = Config {
            memory_size: size,
            stack_top: size as u64,
            stack_size: 0x100,
        };
        Memory::new(&config).unwrap()
    }

    #[test]
    fn test_bounds() {
        let mut memory = memory(0x1000);
        assert_eq!(0x1000, memory.len());
        assert_eq!(Ok(0), memory.read_byte(0xFFF));
        assert_eq!(Ok(()), memory.write_byte(0xFFF, 0xAB));
        assert_eq!(Ok(0xAB), memory.read_byte(0xFFF));
        assert_eq!(
            Err(MemoryError::OutOfBounds {
                address: 0x1000,
                size: 1
            }),
            memory.read_byte(0x1000)
        );
        assert!(memory.write_byte(0x1000, 0).is_err());
        // straddling the end
        assert!(memory.read_word(0xFFE).is_err());
        assert!(memory.write_doubleword(0xFF9, 0).is_err());
        assert!(memory.read_doubleword(u64::MAX).is_err());
        assert_eq!(Ok(0xFF8), memory.translate(0xFF8, 8));
    }

    #[test]
    fn test_little_endian_misaligned() {
        let mut memory = memory(0x100);
        memory.write_word(0x11, 0xDEAD_BEEF).unwrap();
        assert_eq!(Ok(0xEF), memory.read_byte(0x11));
        assert_eq!(Ok(0xBE), memory.read_byte(0x12));
        assert_eq!(Ok(0xBEEF), memory.read_halfword(0x11));
        assert_eq!(Ok(0xDEAD), memory.read_halfword(0x13));
        memory
            .write_doubleword(0x21, 0x0123_4567_89AB_CDEF)
            .unwrap();
        assert_eq!(Ok(0x0123_4567_89AB_CDEF), memory.read_doubleword(0x21));
        assert_eq!(Ok(0x89AB_CDEF), memory.read_word(0x21));
    }

    #[test]
    fn test_write_segment() {
        let mut memory = memory(0x100);
        memory.write(0x10, &[0xFF; 16]).unwrap();
        memory.write_segment(0x10, 8, &[1, 2, 3, 4]).unwrap();
        assert_eq!(Ok(&[1, 2, 3, 4, 0, 0, 0, 0, 0xFF][..]), memory.slice(0x10, 9));
        assert!(memory.write_segment(0xF0, 0x20, &[1]).is_err());
        assert_eq!(Ok(0), memory.read_byte(0xF0));
    }

    #[test]
    fn test_heap_break() {
        let mut memory = memory(0x1000);
        memory.set_heap_start(0x400);
        assert_eq!(0x400, memory.heap_break());
        assert_eq!(0x800, memory.move_heap_break(0x800));
        // below the initial break
        assert_eq!(0x800, memory.move_heap_break(0x3FF));
        // into the stack region
        assert_eq!(0x800, memory.move_heap_break(0xF01));
        assert_eq!(0xF00, memory.move_heap_break(0xF00));
        assert_eq!(0x400, memory.move_heap_break(0x400));
    }

    #[test]
    fn test_heap_limit_follows_clamped_stack() {
        // the stack starts at the end of memory rather than at `stack_top`
        let config = Config {
            memory_size: 0x1_0000,
            stack_top: 0x2_0000,
            stack_size: 0x1000,
        };
        let mut memory = Memory::new(&config).unwrap();
        memory.set_heap_start(0x8000);
        assert_eq!(0x8000, memory.move_heap_break(0x1_0000));
        assert_eq!(0x8000, memory.move_heap_break(0xF001));
        assert_eq!(0xF000, memory.move_heap_break(0xF000));
    }
}
