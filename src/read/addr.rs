//! `.debug_addr`: per-unit address tables, indexed by the
//! `DW_FORM_addrx*` forms and the `*x` list entries.

use crate::common::{DebugAddrBase, DebugAddrIndex, SectionId};
use crate::endianity::Endianity;
use crate::read::{EndianSlice, Error, Reader, Result, Section};

/// The `.debug_addr` section.
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugAddr<R> {
    section: R,
}

impl<'input, Endian> DebugAddr<EndianSlice<'input, Endian>>
where
    Endian: Endianity,
{
    /// Wrap the raw bytes of a loaded `.debug_addr` section.
    pub fn new(section: &'input [u8], endian: Endian) -> Self {
        Self::from(EndianSlice::new(section, endian))
    }
}

impl<R: Reader> DebugAddr<R> {
    /// The address stored at `index` in the table that starts at `base`.
    ///
    /// `base` comes from the unit's `DW_AT_addr_base` (or its default)
    /// and already points past the table header; GNU's pre-standard
    /// tables have no header at all, so it is never parsed here.
    pub fn get_address(
        &self,
        address_size: u8,
        base: DebugAddrBase,
        index: DebugAddrIndex,
    ) -> Result<u64> {
        let entry = index
            .0
            .checked_mul(usize::from(address_size))
            .ok_or(Error::InvalidOffset)?;
        let mut input = self.section.clone();
        input.skip(base.0)?;
        input.skip(entry)?;
        input.read_address(address_size)
    }
}

impl<R> Section<R> for DebugAddr<R> {
    fn id() -> SectionId {
        SectionId::DebugAddr
    }

    fn reader(&self) -> &R
    where
        R: Reader,
    {
        &self.section
    }
}

impl<R> From<R> for DebugAddr<R> {
    fn from(section: R) -> Self {
        DebugAddr { section }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LittleEndian;
    use test_assembler::{Endian, Section};

    #[test]
    fn address_lookup() {
        for address_size in [4u8, 8] {
            let header_len = 8;
            let mut section = Section::with_endian(Endian::Little)
                // Stand-in for the set header, so the base is nonzero.
                .append_repeated(0, header_len);
            for i in 0..10u64 {
                section = match address_size {
                    4 => section.L32(1000 + i as u32),
                    _ => section.L64(1000 + i),
                };
            }
            let buf = section.get_contents().unwrap();

            let debug_addr = DebugAddr::new(&buf, LittleEndian);
            let base = DebugAddrBase(header_len);

            assert_eq!(
                debug_addr.get_address(address_size, base, DebugAddrIndex(0)),
                Ok(1000)
            );
            assert_eq!(
                debug_addr.get_address(address_size, base, DebugAddrIndex(9)),
                Ok(1009)
            );
            assert!(debug_addr
                .get_address(address_size, base, DebugAddrIndex(10))
                .is_err());
        }
    }
}
