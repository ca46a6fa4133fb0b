//! Plumbing shared by the range list and location list readers: the
//! DWARF 5 offset tables at the front of the list sections, the
//! pre-DWARF-5 address pair encoding, and base address tracking.

use crate::common::{DebugAddrBase, DebugAddrIndex, Encoding};
use crate::read::{DebugAddr, Error, Reader, Result};

/// Look up an entry in the offset table a `DW_AT_*lists_base` points
/// into, returning a section offset.
pub(crate) fn offset_table_entry<R: Reader>(
    section: &R,
    encoding: Encoding,
    base: usize,
    index: usize,
) -> Result<usize> {
    let entry = index
        .checked_mul(usize::from(encoding.format.word_size()))
        .ok_or(Error::InvalidOffset)?;
    let mut input = section.clone();
    input.skip(base)?;
    input.skip(entry)?;
    let offset = input.read_offset(encoding.format)?;
    base.checked_add(offset).ok_or(Error::InvalidOffset)
}

/// A begin/end address pair, the whole entry vocabulary of the
/// pre-DWARF-5 list sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AddressPair {
    pub begin: u64,
    pub end: u64,
}

impl AddressPair {
    pub(crate) fn parse<R: Reader>(input: &mut R, address_size: u8) -> Result<AddressPair> {
        Ok(AddressPair {
            begin: input.read_address(address_size)?,
            end: input.read_address(address_size)?,
        })
    }

    /// Two zeros close the list.
    pub(crate) fn is_terminator(&self) -> bool {
        self.begin == 0 && self.end == 0
    }

    /// An all-ones begin address makes `end` the new base address.
    pub(crate) fn is_base_selection(&self, address_size: u8) -> bool {
        self.begin == !0 >> (64 - u64::from(address_size) * 8)
    }
}

/// The base address offset-pair entries are relative to, plus what is
/// needed to resolve `.debug_addr` indices.
#[derive(Debug)]
pub(crate) struct AddressContext<R: Reader> {
    pub(crate) base_address: u64,
    pub(crate) address_size: u8,
    pub(crate) debug_addr: DebugAddr<R>,
    pub(crate) debug_addr_base: DebugAddrBase,
}

impl<R: Reader> AddressContext<R> {
    pub(crate) fn lookup(&self, index: DebugAddrIndex) -> Result<u64> {
        self.debug_addr
            .get_address(self.address_size, self.debug_addr_base, index)
    }
}
