//! Location lists, merged over `.debug_loc` (DWARF 4 and earlier) and
//! `.debug_loclists` (DWARF 5). Each entry pairs an address range with
//! the expression describing where a value lives over that range.

use crate::common::{
    DebugAddrBase, DebugAddrIndex, DebugLocListsBase, DebugLocListsIndex, Encoding,
    LocationListsOffset, SectionId,
};
use crate::constants;
use crate::endianity::Endianity;
use crate::read::lists::{offset_table_entry, AddressContext, AddressPair};
use crate::read::{DebugAddr, EndianSlice, Error, Expression, Range, Reader, Result, Section};

/// The `.debug_loc` section.
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugLoc<R> {
    pub(crate) section: R,
}

impl<'input, Endian> DebugLoc<EndianSlice<'input, Endian>>
where
    Endian: Endianity,
{
    /// Wrap the raw bytes of a loaded `.debug_loc` section.
    pub fn new(section: &'input [u8], endian: Endian) -> Self {
        Self::from(EndianSlice::new(section, endian))
    }
}

impl<R> Section<R> for DebugLoc<R> {
    fn id() -> SectionId {
        SectionId::DebugLoc
    }

    fn reader(&self) -> &R
    where
        R: Reader,
    {
        &self.section
    }
}

impl<R> From<R> for DebugLoc<R> {
    fn from(section: R) -> Self {
        DebugLoc { section }
    }
}

/// The `.debug_loclists` section.
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugLocLists<R> {
    pub(crate) section: R,
}

impl<'input, Endian> DebugLocLists<EndianSlice<'input, Endian>>
where
    Endian: Endianity,
{
    /// Wrap the raw bytes of a loaded `.debug_loclists` section.
    pub fn new(section: &'input [u8], endian: Endian) -> Self {
        Self::from(EndianSlice::new(section, endian))
    }
}

impl<R> Section<R> for DebugLocLists<R> {
    fn id() -> SectionId {
        SectionId::DebugLocLists
    }

    fn reader(&self) -> &R
    where
        R: Reader,
    {
        &self.section
    }
}

impl<R> From<R> for DebugLocLists<R> {
    fn from(section: R) -> Self {
        DebugLocLists { section }
    }
}

/// Both location list sections as one lookup surface.
///
/// The referencing unit's version decides which section a list offset
/// points into: 4 and earlier read `.debug_loc`, 5 reads
/// `.debug_loclists`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocationLists<R> {
    debug_loc: DebugLoc<R>,
    debug_loclists: DebugLocLists<R>,
}

impl<R> LocationLists<R> {
    /// Bundle the two sections.
    pub fn new(debug_loc: DebugLoc<R>, debug_loclists: DebugLocLists<R>) -> LocationLists<R> {
        LocationLists {
            debug_loc,
            debug_loclists,
        }
    }

    /// The wrapped `.debug_loc` section.
    pub fn debug_loc(&self) -> &DebugLoc<R> {
        &self.debug_loc
    }

    /// The wrapped `.debug_loclists` section.
    pub fn debug_loclists(&self) -> &DebugLocLists<R> {
        &self.debug_loclists
    }
}

impl<R: Reader> LocationLists<R> {
    /// Iterate the resolved [`LocationListEntry`]s of the list at
    /// `offset`.
    ///
    /// `base_address` is the unit's base (usually its `DW_AT_low_pc`);
    /// offset-pair entries are relative to it. Indexed entries resolve
    /// through `debug_addr` at `debug_addr_base`.
    ///
    /// Can be used as a
    /// [`FallibleIterator`](./index.html#using-with-fallibleiterator).
    pub fn locations(
        &self,
        offset: LocationListsOffset,
        unit_encoding: Encoding,
        base_address: u64,
        debug_addr: &DebugAddr<R>,
        debug_addr_base: DebugAddrBase,
    ) -> Result<LocListIter<R>> {
        Ok(LocListIter {
            raw: self.raw_locations(offset, unit_encoding)?,
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
    pub fn raw_locations(
        &self,
        offset: LocationListsOffset,
        unit_encoding: Encoding,
    ) -> Result<RawLocListIter<R>> {
        let mut input = if unit_encoding.version < 5 {
            self.debug_loc.section.clone()
        } else {
            self.debug_loclists.section.clone()
        };
        input.skip(offset.0)?;
        Ok(RawLocListIter {
            input,
            encoding: unit_encoding,
        })
    }

    /// Resolve a `DW_FORM_loclistx` index through the offset table at
    /// `base`.
    pub fn get_offset(
        &self,
        unit_encoding: Encoding,
        base: DebugLocListsBase,
        index: DebugLocListsIndex,
    ) -> Result<LocationListsOffset> {
        offset_table_entry(&self.debug_loclists.section, unit_encoding, base.0, index.0)
            .map(LocationListsOffset)
    }
}

/// One entry of a location list, as encoded.
#[derive(Clone, Debug)]
pub enum RawLocationEntry<R: Reader> {
    /// A pre-DWARF-5 pair: either offsets relative to the base address,
    /// or absolute addresses; the format cannot tell them apart.
    AddressOrOffsetPair {
        /// Begin address or offset.
        begin: u64,
        /// End address or offset.
        end: u64,
        /// The location description.
        data: Expression<R>,
    },
    /// `DW_LLE_base_address`, or a pre-DWARF-5 base selection entry.
    BaseAddress {
        /// The new base address.
        addr: u64,
    },
    /// `DW_LLE_base_addressx`.
    BaseAddressx {
        /// Index of the new base address.
        addr: DebugAddrIndex,
    },
    /// `DW_LLE_startx_endx`.
    StartxEndx {
        /// Index of the begin address.
        begin: DebugAddrIndex,
        /// Index of the end address.
        end: DebugAddrIndex,
        /// The location description.
        data: Expression<R>,
    },
    /// `DW_LLE_startx_length`.
    StartxLength {
        /// Index of the begin address.
        begin: DebugAddrIndex,
        /// Length of the range.
        length: u64,
        /// The location description.
        data: Expression<R>,
    },
    /// `DW_LLE_offset_pair`.
    OffsetPair {
        /// Begin offset from the base address.
        begin: u64,
        /// End offset from the base address.
        end: u64,
        /// The location description.
        data: Expression<R>,
    },
    /// `DW_LLE_default_location`.
    DefaultLocation {
        /// The location description used wherever no other entry
        /// applies.
        data: Expression<R>,
    },
    /// `DW_LLE_start_end`.
    StartEnd {
        /// Begin address.
        begin: u64,
        /// End address.
        end: u64,
        /// The location description.
        data: Expression<R>,
    },
    /// `DW_LLE_start_length`.
    StartLength {
        /// Begin address.
        begin: u64,
        /// Length of the range.
        length: u64,
        /// The location description.
        data: Expression<R>,
    },
}

// DWARF 5 counted location descriptions are ULEB-length prefixed; the
// bare format uses a u16 prefix.
fn read_expression<R: Reader>(input: &mut R) -> Result<Expression<R>> {
    let len = input.read_uleb128_usize()?;
    input.split(len).map(Expression)
}

impl<R: Reader> RawLocationEntry<R> {
    // Returns None at the end-of-list marker.
    fn parse(input: &mut R, encoding: Encoding) -> Result<Option<Self>> {
        if encoding.version < 5 {
            let pair = AddressPair::parse(input, encoding.address_size)?;
            return Ok(if pair.is_terminator() {
                None
            } else if pair.is_base_selection(encoding.address_size) {
                Some(RawLocationEntry::BaseAddress { addr: pair.end })
            } else {
                let len = input.read_u16()?;
                let data = Expression(input.split(usize::from(len))?);
                Some(RawLocationEntry::AddressOrOffsetPair {
                    begin: pair.begin,
                    end: pair.end,
                    data,
                })
            });
        }

        let kind = constants::DwLle(input.read_u8()?);
        Ok(match kind {
            constants::DW_LLE_end_of_list => None,
            constants::DW_LLE_base_addressx => Some(RawLocationEntry::BaseAddressx {
                addr: DebugAddrIndex(input.read_uleb128_usize()?),
            }),
            constants::DW_LLE_startx_endx => Some(RawLocationEntry::StartxEndx {
                begin: DebugAddrIndex(input.read_uleb128_usize()?),
                end: DebugAddrIndex(input.read_uleb128_usize()?),
                data: read_expression(input)?,
            }),
            constants::DW_LLE_startx_length => Some(RawLocationEntry::StartxLength {
                begin: DebugAddrIndex(input.read_uleb128_usize()?),
                length: input.read_uleb128()?,
                data: read_expression(input)?,
            }),
            constants::DW_LLE_offset_pair => Some(RawLocationEntry::OffsetPair {
                begin: input.read_uleb128()?,
                end: input.read_uleb128()?,
                data: read_expression(input)?,
            }),
            constants::DW_LLE_default_location => Some(RawLocationEntry::DefaultLocation {
                data: read_expression(input)?,
            }),
            constants::DW_LLE_base_address => Some(RawLocationEntry::BaseAddress {
                addr: input.read_address(encoding.address_size)?,
            }),
            constants::DW_LLE_start_end => Some(RawLocationEntry::StartEnd {
                begin: input.read_address(encoding.address_size)?,
                end: input.read_address(encoding.address_size)?,
                data: read_expression(input)?,
            }),
            constants::DW_LLE_start_length => Some(RawLocationEntry::StartLength {
                begin: input.read_address(encoding.address_size)?,
                length: input.read_uleb128()?,
                data: read_expression(input)?,
            }),
            other => return Err(Error::UnknownLocListEntry(other)),
        })
    }
}

/// Iterator over [`RawLocationEntry`]s, from
/// [`LocationLists::raw_locations`].
#[derive(Debug)]
pub struct RawLocListIter<R: Reader> {
    input: R,
    encoding: Encoding,
}

impl<R: Reader> RawLocListIter<R> {
    /// The next raw entry, or `None` at the end of the list.
    pub fn next(&mut self) -> Result<Option<RawLocationEntry<R>>> {
        if self.input.is_empty() {
            return Ok(None);
        }
        match RawLocationEntry::parse(&mut self.input, self.encoding) {
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
impl<R: Reader> fallible_iterator::FallibleIterator for RawLocListIter<R> {
    type Item = RawLocationEntry<R>;
    type Error = Error;

    fn next(&mut self) -> core::result::Result<Option<Self::Item>, Self::Error> {
        RawLocListIter::next(self)
    }
}

/// Iterator over resolved [`LocationListEntry`]s, from
/// [`LocationLists::locations`].
///
/// Base-address entries are applied rather than yielded, and indexed
/// addresses are resolved, so every item carries a concrete range.
#[derive(Debug)]
pub struct LocListIter<R: Reader> {
    raw: RawLocListIter<R>,
    ctx: AddressContext<R>,
}

impl<R: Reader> LocListIter<R> {
    // Returns None for entries that only update iteration state.
    fn resolve(&mut self, entry: RawLocationEntry<R>) -> Result<Option<LocationListEntry<R>>> {
        let (range, data) = match entry {
            RawLocationEntry::BaseAddress { addr } => {
                self.ctx.base_address = addr;
                return Ok(None);
            }
            RawLocationEntry::BaseAddressx { addr } => {
                self.ctx.base_address = self.ctx.lookup(addr)?;
                return Ok(None);
            }
            RawLocationEntry::StartxEndx { begin, end, data } => (
                Range {
                    begin: self.ctx.lookup(begin)?,
                    end: self.ctx.lookup(end)?,
                },
                data,
            ),
            RawLocationEntry::StartxLength {
                begin,
                length,
                data,
            } => {
                let begin = self.ctx.lookup(begin)?;
                (
                    Range {
                        begin,
                        end: begin.wrapping_add(length),
                    },
                    data,
                )
            }
            RawLocationEntry::DefaultLocation { data } => (
                Range {
                    begin: 0,
                    end: u64::MAX,
                },
                data,
            ),
            RawLocationEntry::AddressOrOffsetPair { begin, end, data }
            | RawLocationEntry::OffsetPair { begin, end, data } => (
                Range {
                    begin: self.ctx.base_address.wrapping_add(begin),
                    end: self.ctx.base_address.wrapping_add(end),
                },
                data,
            ),
            RawLocationEntry::StartEnd { begin, end, data } => (Range { begin, end }, data),
            RawLocationEntry::StartLength {
                begin,
                length,
                data,
            } => (
                Range {
                    begin,
                    end: begin.wrapping_add(length),
                },
                data,
            ),
        };
        Ok(Some(LocationListEntry { range, data }))
    }

    /// The next location, or `None` at the end of the list.
    pub fn next(&mut self) -> Result<Option<LocationListEntry<R>>> {
        while let Some(entry) = self.raw.next()? {
            if let Some(location) = self.resolve(entry)? {
                if location.range.begin > location.range.end {
                    self.raw.input.empty();
                    return Err(Error::InvalidAddressRange);
                }
                return Ok(Some(location));
            }
        }
        Ok(None)
    }
}

#[cfg(feature = "fallible-iterator")]
impl<R: Reader> fallible_iterator::FallibleIterator for LocListIter<R> {
    type Item = LocationListEntry<R>;
    type Error = Error;

    fn next(&mut self) -> core::result::Result<Option<Self::Item>, Self::Error> {
        LocListIter::next(self)
    }
}

/// A resolved location list entry: where a value lives over one address
/// range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationListEntry<R: Reader> {
    /// The addresses this location applies to.
    pub range: Range,
    /// The location description.
    pub data: Expression<R>,
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
    fn bare_lists() {
        #[rustfmt::skip]
        let section = Section::with_endian(Endian::Little)
            // A plain entry: range then u16-counted expression.
            .L32(0x100).L32(0x200).L16(2).D8(0x30).D8(0x9f)
            // Select a new base address, then an entry under it.
            .L32(0xffff_ffff).L32(0x0200_0000)
            .L32(0x100).L32(0x200).L16(1).D8(0x30)
            // Terminator.
            .L32(0).L32(0);
        let buf = section.get_contents().unwrap();

        let lists = LocationLists::new(
            DebugLoc::new(&buf, LittleEndian),
            DebugLocLists::default(),
        );
        let debug_addr = DebugAddr::from(EndianSlice::new(&[], LittleEndian));
        let mut locations = lists
            .locations(
                LocationListsOffset(0),
                encoding(4, 4),
                0x0100_0000,
                &debug_addr,
                DebugAddrBase(0),
            )
            .unwrap();

        let entry = locations.next().unwrap().unwrap();
        assert_eq!(
            entry.range,
            Range {
                begin: 0x0100_0100,
                end: 0x0100_0200,
            }
        );
        assert_eq!(entry.data.0.slice(), &[0x30, 0x9f]);

        let entry = locations.next().unwrap().unwrap();
        assert_eq!(
            entry.range,
            Range {
                begin: 0x0200_0100,
                end: 0x0200_0200,
            }
        );

        assert_eq!(locations.next(), Ok(None));
    }

    #[test]
    fn lle_lists() {
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
            .D8(constants::DW_LLE_offset_pair.0)
                .uleb(0x100).uleb(0x200).uleb(1).D8(0x30)
            .D8(constants::DW_LLE_base_address.0).L32(0x0200_0000)
            .D8(constants::DW_LLE_offset_pair.0)
                .uleb(0x100).uleb(0x200).uleb(1).D8(0x30)
            .D8(constants::DW_LLE_base_addressx.0).uleb(0)
            .D8(constants::DW_LLE_offset_pair.0)
                .uleb(0x100).uleb(0x200).uleb(1).D8(0x30)
            .D8(constants::DW_LLE_startx_endx.0).uleb(1).uleb(2).uleb(1).D8(0x30)
            .D8(constants::DW_LLE_startx_length.0).uleb(1).uleb(0x100).uleb(1).D8(0x30)
            .D8(constants::DW_LLE_start_end.0)
                .L32(0x0202_0100).L32(0x0202_0200).uleb(1).D8(0x30)
            .D8(constants::DW_LLE_start_length.0)
                .L32(0x0203_0100).uleb(0x100).uleb(1).D8(0x30)
            .D8(constants::DW_LLE_default_location.0).uleb(1).D8(0x30)
            .D8(constants::DW_LLE_end_of_list.0)
            .mark(&end);
        section.start().set_const(0);
        length.set_const((&end - &start) as u64);
        let buf = section.get_contents().unwrap();

        let lists = LocationLists::new(
            DebugLoc::default(),
            DebugLocLists::new(&buf, LittleEndian),
        );
        let offset = LocationListsOffset(first.value().unwrap() as usize);
        let mut locations = lists
            .locations(
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
            (0x0301_0100, 0x0301_0300),
            (0x0301_0100, 0x0301_0200),
            (0x0202_0100, 0x0202_0200),
            (0x0203_0100, 0x0203_0200),
            (0, u64::MAX),
        ];
        for (begin, end) in expected {
            let entry = locations.next().unwrap().unwrap();
            assert_eq!(entry.range, Range { begin, end });
            assert_eq!(entry.data.0.slice(), &[0x30]);
        }
        assert_eq!(locations.next(), Ok(None));
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
                .L32(4)
                .mark(&first);
            for i in 0..4 {
                section = section.word(format.word_size(), 1000 + i);
            }
            let section = section.mark(&end);
            section.start().set_const(0);
            length.set_const((&end - &start) as u64);
            let buf = section.get_contents().unwrap();

            let lists = LocationLists::new(
                DebugLoc::default(),
                DebugLocLists::new(&buf, LittleEndian),
            );
            let base = DebugLocListsBase(first.value().unwrap() as usize);

            assert_eq!(
                lists.get_offset(encoding, base, DebugLocListsIndex(0)),
                Ok(LocationListsOffset(base.0 + 1000))
            );
            assert_eq!(
                lists.get_offset(encoding, base, DebugLocListsIndex(3)),
                Ok(LocationListsOffset(base.0 + 1003))
            );
            assert!(lists
                .get_offset(encoding, base, DebugLocListsIndex(4))
                .is_err());
        }
    }
}
