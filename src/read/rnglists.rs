//! Address range lists, merged over `.debug_ranges` (DWARF 4 and
//! earlier) and `.debug_rnglists` (DWARF 5).

use crate::common::{
    DebugAddrBase, DebugAddrIndex, DebugRngListsBase, DebugRngListsIndex, Encoding,
    RangeListsOffset, SectionId,
};
use crate::constants;
use crate::endianity::Endianity;
use crate::read::lists::{offset_table_entry, AddressContext, AddressPair};
use crate::read::{DebugAddr, EndianSlice, Error, Reader, Result, Section};

/// The `.debug_ranges` section.
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugRanges<R> {
    pub(crate) section: R,
}

impl<'input, Endian> DebugRanges<EndianSlice<'input, Endian>>
where
    Endian: Endianity,
{
    /// Wrap the raw bytes of a loaded `.debug_ranges` section.
    pub fn new(section: &'input [u8], endian: Endian) -> Self {
        Self::from(EndianSlice::new(section, endian))
    }
}

impl<R> Section<R> for DebugRanges<R> {
    fn id() -> SectionId {
        SectionId::DebugRanges
    }

    fn reader(&self) -> &R
    where
        R: Reader,
    {
        &self.section
    }
}

impl<R> From<R> for DebugRanges<R> {
    fn from(section: R) -> Self {
        DebugRanges { section }
    }
}

/// The `.debug_rnglists` section.
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugRngLists<R> {
    pub(crate) section: R,
}

impl<'input, Endian> DebugRngLists<EndianSlice<'input, Endian>>
where
    Endian: Endianity,
{
    /// Wrap the raw bytes of a loaded `.debug_rnglists` section.
    pub fn new(section: &'input [u8], endian: Endian) -> Self {
        Self::from(EndianSlice::new(section, endian))
    }
}

impl<R> Section<R> for DebugRngLists<R> {
    fn id() -> SectionId {
        SectionId::DebugRngLists
    }

    fn reader(&self) -> &R
    where
        R: Reader,
    {
        &self.section
    }
}

impl<R> From<R> for DebugRngLists<R> {
    fn from(section: R) -> Self {
        DebugRngLists { section }
    }
}

/// Both range list sections as one lookup surface.
///
/// The referencing unit's version decides which section a list offset
/// points into: 4 and earlier read `.debug_ranges`, 5 reads
/// `.debug_rnglists`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RangeLists<R> {
    debug_ranges: DebugRanges<R>,
    debug_rnglists: DebugRngLists<R>,
}

impl<R> RangeLists<R> {
    /// Bundle the two sections.
    pub fn new(debug_ranges: DebugRanges<R>, debug_rnglists: DebugRngLists<R>) -> RangeLists<R> {
        RangeLists {
            debug_ranges,
            debug_rnglists,
        }
    }

    /// The wrapped `.debug_ranges` section.
    pub fn debug_ranges(&self) -> &DebugRanges<R> {
        &self.debug_ranges
    }

    /// The wrapped `.debug_rnglists` section.
    pub fn debug_rnglists(&self) -> &DebugRngLists<R> {
        &self.debug_rnglists
    }
}

impl<R: Reader> RangeLists<R> {
    /// Iterate the resolved [`Range`]s of the list at `offset`.
    ///
    /// `base_address` is the unit's base (usually its `DW_AT_low_pc`);
    /// offset-pair entries are relative to it. Indexed entries resolve
    /// through `debug_addr` at `debug_addr_base`.
    ///
    /// Can be used as a
    /// [`FallibleIterator`](./index.html#using-with-fallibleiterator).
    pub fn ranges(
        &self,
        offset: RangeListsOffset,
        unit_encoding: Encoding,
        base_address: u64,
        debug_addr: &DebugAddr<R>,
        debug_addr_base: DebugAddrBase,
    ) -> Result<RngListIter<R>> {
        Ok(RngListIter {
            raw: self.raw_ranges(offset, unit_encoding)?,
            ctx: AddressContext {
                base_address,
                address_size: unit_encoding.address_size,
                debug_addr: debug_addr.clone(),
                debug_addr_base,
            },
        })
    }

    /// Iterate the list at `offset` without resolving base addresses or
    /// address indices; for tools that show entries as encoded.
    pub fn raw_ranges(
        &self,
        offset: RangeListsOffset,
        unit_encoding: Encoding,
    ) -> Result<RawRngListIter<R>> {
        let mut input = if unit_encoding.version < 5 {
            self.debug_ranges.section.clone()
        } else {
            self.debug_rnglists.section.clone()
        };
        input.skip(offset.0)?;
        Ok(RawRngListIter {
            input,
            encoding: unit_encoding,
        })
    }

    /// Resolve a `DW_FORM_rnglistx` index through the offset table at
    /// `base`.
    pub fn get_offset(
        &self,
        unit_encoding: Encoding,
        base: DebugRngListsBase,
        index: DebugRngListsIndex,
    ) -> Result<RangeListsOffset> {
        offset_table_entry(&self.debug_rnglists.section, unit_encoding, base.0, index.0)
            .map(RangeListsOffset)
    }
}

/// One entry of a range list, as encoded.
#[derive(Clone, Debug)]
pub enum RawRangeEntry {
    /// A pre-DWARF-5 pair: either offsets relative to the base address,
    /// or absolute addresses; the format cannot tell them apart.
    AddressOrOffsetPair {
        /// Begin address or offset.
        begin: u64,
        /// End address or offset.
        end: u64,
    },
    /// `DW_RLE_base_address`, or a pre-DWARF-5 base selection entry.
    BaseAddress {
        /// The new base address.
        addr: u64,
    },
    /// `DW_RLE_base_addressx`.
    BaseAddressx {
        /// Index of the new base address.
        addr: DebugAddrIndex,
    },
    /// `DW_RLE_startx_endx`.
    StartxEndx {
        /// Index of the begin address.
        begin: DebugAddrIndex,
        /// Index of the end address.
        end: DebugAddrIndex,
    },
    /// `DW_RLE_startx_length`.
    StartxLength {
        /// Index of the begin address.
        begin: DebugAddrIndex,
        /// Length of the range.
        length: u64,
    },
    /// `DW_RLE_offset_pair`.
    OffsetPair {
        /// Begin offset from the base address.
        begin: u64,
        /// End offset from the base address.
        end: u64,
    },
    /// `DW_RLE_start_end`.
    StartEnd {
        /// Begin address.
        begin: u64,
        /// End address.
        end: u64,
    },
    /// `DW_RLE_start_length`.
    StartLength {
        /// Begin address.
        begin: u64,
        /// Length of the range.
        length: u64,
    },
}

impl RawRangeEntry {
    // Returns None at the end-of-list marker.
    fn parse<R: Reader>(input: &mut R, encoding: Encoding) -> Result<Option<Self>> {
        if encoding.version < 5 {
            let pair = AddressPair::parse(input, encoding.address_size)?;
            return Ok(if pair.is_terminator() {
                None
            } else if pair.is_base_selection(encoding.address_size) {
                Some(RawRangeEntry::BaseAddress { addr: pair.end })
            } else {
                Some(RawRangeEntry::AddressOrOffsetPair {
                    begin: pair.begin,
                    end: pair.end,
                })
            });
        }

        let kind = constants::DwRle(input.read_u8()?);
        Ok(match kind {
            constants::DW_RLE_end_of_list => None,
            constants::DW_RLE_base_addressx => Some(RawRangeEntry::BaseAddressx {
                addr: DebugAddrIndex(input.read_uleb128_usize()?),
            }),
            constants::DW_RLE_startx_endx => Some(RawRangeEntry::StartxEndx {
                begin: DebugAddrIndex(input.read_uleb128_usize()?),
                end: DebugAddrIndex(input.read_uleb128_usize()?),
            }),
            constants::DW_RLE_startx_length => Some(RawRangeEntry::StartxLength {
                begin: DebugAddrIndex(input.read_uleb128_usize()?),
                length: input.read_uleb128()?,
            }),
            constants::DW_RLE_offset_pair => Some(RawRangeEntry::OffsetPair {
                begin: input.read_uleb128()?,
                end: input.read_uleb128()?,
            }),
            constants::DW_RLE_base_address => Some(RawRangeEntry::BaseAddress {
                addr: input.read_address(encoding.address_size)?,
            }),
            constants::DW_RLE_start_end => Some(RawRangeEntry::StartEnd {
                begin: input.read_address(encoding.address_size)?,
                end: input.read_address(encoding.address_size)?,
            }),
            constants::DW_RLE_start_length => Some(RawRangeEntry::StartLength {
                begin: input.read_address(encoding.address_size)?,
                length: input.read_uleb128()?,
            }),
            other => return Err(Error::UnknownRangeListEntry(other)),
        })
    }
}

/// Iterator over [`RawRangeEntry`]s, from [`RangeLists::raw_ranges`].
#[derive(Debug)]
pub struct RawRngListIter<R: Reader> {
    input: R,
    encoding: Encoding,
}

impl<R: Reader> RawRngListIter<R> {
    /// The next raw entry, or `None` at the end of the list.
    pub fn next(&mut self) -> Result<Option<RawRangeEntry>> {
        if self.input.is_empty() {
            return Ok(None);
        }
        match RawRangeEntry::parse(&mut self.input, self.encoding) {
            Ok(Some(entry)) => Ok(Some(entry)),
            Ok(None) => {
                self.input.empty();
                Ok(None)
            }
            Err(e) => {
                self.input.empty();
                Err(e)
            }
        }
    }
}

#[cfg(feature = "fallible-iterator")]
impl<R: Reader> fallible_iterator::FallibleIterator for RawRngListIter<R> {
    type Item = RawRangeEntry;
    type Error = Error;

    fn next(&mut self) -> core::result::Result<Option<Self::Item>, Self::Error> {
        RawRngListIter::next(self)
    }
}

/// Iterator over resolved [`Range`]s, from [`RangeLists::ranges`].
///
/// Base-address entries are applied rather than yielded, and indexed
/// addresses are resolved, so every item is a concrete range.
#[derive(Debug)]
pub struct RngListIter<R: Reader> {
    raw: RawRngListIter<R>,
    ctx: AddressContext<R>,
}

impl<R: Reader> RngListIter<R> {
    // Returns None for entries that only update iteration state.
    fn resolve(&mut self, entry: RawRangeEntry) -> Result<Option<Range>> {
        let range = match entry {
            RawRangeEntry::BaseAddress { addr } => {
                self.ctx.base_address = addr;
                return Ok(None);
            }
            RawRangeEntry::BaseAddressx { addr } => {
                self.ctx.base_address = self.ctx.lookup(addr)?;
                return Ok(None);
            }
            RawRangeEntry::StartxEndx { begin, end } => Range {
                begin: self.ctx.lookup(begin)?,
                end: self.ctx.lookup(end)?,
            },
            RawRangeEntry::StartxLength { begin, length } => {
                let begin = self.ctx.lookup(begin)?;
                Range {
                    begin,
                    end: begin.wrapping_add(length),
                }
            }
            RawRangeEntry::AddressOrOffsetPair { begin, end }
            | RawRangeEntry::OffsetPair { begin, end } => Range {
                begin: self.ctx.base_address.wrapping_add(begin),
                end: self.ctx.base_address.wrapping_add(end),
            },
            RawRangeEntry::StartEnd { begin, end } => Range { begin, end },
            RawRangeEntry::StartLength { begin, length } => Range {
                begin,
                end: begin.wrapping_add(length),
            },
        };
        Ok(Some(range))
    }

    /// The next range, or `None` at the end of the list.
    pub fn next(&mut self) -> Result<Option<Range>> {
        while let Some(entry) = self.raw.next()? {
            if let Some(range) = self.resolve(entry)? {
                if range.begin > range.end {
                    self.raw.input.empty();
                    return Err(Error::InvalidAddressRange);
                }
                return Ok(Some(range));
            }
        }
        Ok(None)
    }
}

#[cfg(feature = "fallible-iterator")]
impl<R: Reader> fallible_iterator::FallibleIterator for RngListIter<R> {
    type Item = Range;
    type Error = Error;

    fn next(&mut self) -> core::result::Result<Option<Self::Item>, Self::Error> {
        RngListIter::next(self)
    }
}

/// A half-open address range: `begin` is covered, `end` is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Range {
    /// First covered address.
    pub begin: u64,
    /// First address past the range.
    pub end: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Format;
    use crate::endianity::LittleEndian;
    use crate::test_util::SectionMethods;
    use test_assembler::{Endian, Label, LabelMaker, Section};

    fn encoding(version: u16, address_size: u8) -> Encoding {
        Encoding {
            format: Format::Dwarf32,
            version,
            address_size,
        }
    }

    #[test]
    fn address_pair_classification() {
        let pair = AddressPair { begin: 0, end: 0 };
        assert!(pair.is_terminator());

        let pair = AddressPair {
            begin: 0xffff_ffff,
            end: 0,
        };
        assert!(pair.is_base_selection(4));
        assert!(!pair.is_base_selection(8));

        let pair = AddressPair {
            begin: u64::MAX,
            end: 0,
        };
        assert!(!pair.is_base_selection(4));
        assert!(pair.is_base_selection(8));
    }

    #[test]
    fn bare_lists() {
        #[rustfmt::skip]
        let section = Section::with_endian(Endian::Little)
            // A range before the requested offset.
            .L32(0x10000).L32(0x10100)
            // A plain offset pair.
            .L32(0x10200).L32(0x10300)
            // Select a new base address, then a pair under it.
            .L32(0xffff_ffff).L32(0x0200_0000)
            .L32(0x100).L32(0x200)
            // An empty range, then a plain one.
            .L32(0x300).L32(0x300)
            .L32(0x400).L32(0x500)
            // Terminator, then trailing garbage.
            .L32(0).L32(0)
            .L32(0x10400).L32(0x10500);
        let buf = section.get_contents().unwrap();

        let lists = RangeLists::new(
            DebugRanges::new(&buf, LittleEndian),
            DebugRngLists::default(),
        );
        let debug_addr = DebugAddr::from(EndianSlice::new(&[], LittleEndian));
        let mut ranges = lists
            .ranges(
                RangeListsOffset(8),
                encoding(4, 4),
                0x0100_0000,
                &debug_addr,
                DebugAddrBase(0),
            )
            .unwrap();

        assert_eq!(
            ranges.next(),
            Ok(Some(Range {
                begin: 0x0101_0200,
                end: 0x0101_0300,
            }))
        );
        assert_eq!(
            ranges.next(),
            Ok(Some(Range {
                begin: 0x0200_0100,
                end: 0x0200_0200,
            }))
        );
        // Empty ranges still come through.
        assert_eq!(
            ranges.next(),
            Ok(Some(Range {
                begin: 0x0200_0300,
                end: 0x0200_0300,
            }))
        );
        assert_eq!(
            ranges.next(),
            Ok(Some(Range {
                begin: 0x0200_0400,
                end: 0x0200_0500,
            }))
        );
        assert_eq!(ranges.next(), Ok(None));
        assert_eq!(ranges.next(), Ok(None));
    }

    #[test]
    fn backwards_ranges_are_rejected() {
        #[rustfmt::skip]
        let section = Section::with_endian(Endian::Little)
            .L32(0x20000).L32(0x10000)
            .L32(0).L32(0);
        let buf = section.get_contents().unwrap();

        let lists = RangeLists::new(
            DebugRanges::new(&buf, LittleEndian),
            DebugRngLists::default(),
        );
        let debug_addr = DebugAddr::from(EndianSlice::new(&[], LittleEndian));
        let mut ranges = lists
            .ranges(
                RangeListsOffset(0),
                encoding(4, 4),
                0,
                &debug_addr,
                DebugAddrBase(0),
            )
            .unwrap();

        assert_eq!(ranges.next(), Err(Error::InvalidAddressRange));
        assert_eq!(ranges.next(), Ok(None));
    }

    #[test]
    fn rle_lists() {
        let addresses = Section::with_endian(Endian::Little)
            .L32(0x0300_0000)
            .L32(0x0301_0100)
            .L32(0x0301_0300)
            .get_contents()
            .unwrap();
        let debug_addr = DebugAddr::new(&addresses, LittleEndian);

        let length = Label::new();
        let start = Label::new();
        let first = Label::new();
        let end = Label::new();
        #[rustfmt::skip]
        let section = Section::with_endian(Endian::Little)
            .D32(&length)
            .mark(&start)
            .L16(5)
            .D8(4)
            .D8(0)
            .L32(0)
            .mark(&first)
            .D8(constants::DW_RLE_offset_pair.0).uleb(0x100).uleb(0x200)
            .D8(constants::DW_RLE_base_address.0).L32(0x0200_0000)
            .D8(constants::DW_RLE_offset_pair.0).uleb(0x100).uleb(0x200)
            .D8(constants::DW_RLE_base_addressx.0).uleb(0)
            .D8(constants::DW_RLE_offset_pair.0).uleb(0x100).uleb(0x200)
            .D8(constants::DW_RLE_start_end.0).L32(0x0202_0100).L32(0x0202_0200)
            .D8(constants::DW_RLE_start_length.0).L32(0x0203_0100).uleb(0x100)
            .D8(constants::DW_RLE_startx_endx.0).uleb(1).uleb(2)
            .D8(constants::DW_RLE_startx_length.0).uleb(1).uleb(0x100)
            .D8(constants::DW_RLE_end_of_list.0)
            .mark(&end);
        section.start().set_const(0);
        length.set_const((&end - &start) as u64);
        let buf = section.get_contents().unwrap();

        let lists = RangeLists::new(
            DebugRanges::default(),
            DebugRngLists::new(&buf, LittleEndian),
        );
        let offset = RangeListsOffset(first.value().unwrap() as usize);
        let mut ranges = lists
            .ranges(
                offset,
                encoding(5, 4),
                0x0100_0000,
                &debug_addr,
                DebugAddrBase(0),
            )
            .unwrap();

        let expected = [
            (0x0100_0100, 0x0100_0200),
            (0x0200_0100, 0x0200_0200),
            (0x0300_0100, 0x0300_0200),
            (0x0202_0100, 0x0202_0200),
            (0x0203_0100, 0x0203_0200),
            (0x0301_0100, 0x0301_0300),
            (0x0301_0100, 0x0301_0200),
        ];
        for (begin, end) in expected {
            assert_eq!(ranges.next(), Ok(Some(Range { begin, end })));
        }
        assert_eq!(ranges.next(), Ok(None));
    }

    #[test]
    fn offset_table() {
        for format in [Format::Dwarf32, Format::Dwarf64] {
            let encoding = Encoding {
                format,
                version: 5,
                address_size: 4,
            };

            let length = Label::new();
            let start = Label::new();
            let first = Label::new();
            let end = Label::new();
            let mut section = Section::with_endian(Endian::Little)
                .initial_length(format, &length, &start)
                .L16(5)
                .D8(4)
                .D8(0)
                .L32(20)
                .mark(&first);
            for i in 0..20 {
                section = section.word(format.word_size(), 1000 + i);
            }
            let section = section.mark(&end);
            section.start().set_const(0);
            length.set_const((&end - &start) as u64);
            let buf = section.get_contents().unwrap();

            let lists = RangeLists::new(
                DebugRanges::default(),
                DebugRngLists::new(&buf, LittleEndian),
            );
            let base = DebugRngListsBase(first.value().unwrap() as usize);

            assert_eq!(
                lists.get_offset(encoding, base, DebugRngListsIndex(0)),
                Ok(RangeListsOffset(base.0 + 1000))
            );
            assert_eq!(
                lists.get_offset(encoding, base, DebugRngListsIndex(19)),
                Ok(RangeListsOffset(base.0 + 1019))
            );
            assert!(lists
                .get_offset(encoding, base, DebugRngListsIndex(20))
                .is_err());
        }
    }
}
