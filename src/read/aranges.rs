//! `.debug_aranges`: the per-unit address range lookup table, one set
//! of address/length tuples per unit.

use crate::common::{DebugArangesOffset, DebugInfoOffset, Encoding, SectionId};
use crate::endianity::Endianity;
use crate::read::{EndianSlice, Error, Range, Reader, Result, Section};

/// The `.debug_aranges` section.
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugAranges<R> {
    section: R,
}

impl<'input, Endian> DebugAranges<EndianSlice<'input, Endian>>
where
    Endian: Endianity,
{
    /// Wrap the raw bytes of a loaded `.debug_aranges` section.
    pub fn new(section: &'input [u8], endian: Endian) -> Self {
        Self::from(EndianSlice::new(section, endian))
    }
}

impl<R: Reader> DebugAranges<R> {
    /// Walk the sets in this section; each belongs to one unit.
    pub fn headers(&self) -> ArangeHeaders<R> {
        ArangeHeaders {
            input: self.section.clone(),
            offset: DebugArangesOffset(0),
        }
    }

    /// Parse the set header that starts at `offset`.
    pub fn header(&self, offset: DebugArangesOffset) -> Result<ArangeHeader<R>> {
        let mut input = self.section.clone();
        input.skip(offset.0)?;
        ArangeHeader::parse(&mut input, offset)
    }
}

impl<R> Section<R> for DebugAranges<R> {
    fn id() -> SectionId {
        SectionId::DebugAranges
    }

    fn reader(&self) -> &R
    where
        R: Reader,
    {
        &self.section
    }
}

impl<R> From<R> for DebugAranges<R> {
    fn from(section: R) -> Self {
        DebugAranges { section }
    }
}

/// The lazy set iterator returned by [`DebugAranges::headers`].
#[derive(Clone, Debug)]
pub struct ArangeHeaders<R: Reader> {
    input: R,
    offset: DebugArangesOffset,
}

impl<R: Reader> ArangeHeaders<R> {
    /// Parse the next set header. A parse failure poisons the iterator.
    pub fn next(&mut self) -> Result<Option<ArangeHeader<R>>> {
        if self.input.is_empty() {
            return Ok(None);
        }
        let before = self.input.len();
        match ArangeHeader::parse(&mut self.input, self.offset) {
            Ok(header) => {
                self.offset = DebugArangesOffset(self.offset.0 + before - self.input.len());
                Ok(Some(header))
            }
            Err(e) => {
                self.input.empty();
                Err(e)
            }
        }
    }
}

#[cfg(feature = "fallible-iterator")]
impl<R: Reader> fallible_iterator::FallibleIterator for ArangeHeaders<R> {
    type Item = ArangeHeader<R>;
    type Error = Error;

    fn next(&mut self) -> core::result::Result<Option<Self::Item>, Self::Error> {
        ArangeHeaders::next(self)
    }
}

/// The header of one set of entries, naming the unit the entries
/// describe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArangeHeader<R: Reader> {
    offset: DebugArangesOffset,
    encoding: Encoding,
    length: usize,
    debug_info_offset: DebugInfoOffset,
    entries: R,
}

impl<R: Reader> ArangeHeader<R> {
    fn parse(input: &mut R, offset: DebugArangesOffset) -> Result<ArangeHeader<R>> {
        let (length, format) = input.read_initial_length()?;
        let mut rest = input.split(length)?;

        // DWARF 5 kept this section at version 2.
        let version = rest.read_u16()?;
        if version != 2 {
            return Err(Error::UnsupportedVersion(version));
        }

        let debug_info_offset = DebugInfoOffset(rest.read_offset(format)?);
        let address_size = rest.read_u8()?;
        if address_size == 0 {
            return Err(Error::UnsupportedAddressSize(address_size));
        }
        let segment_size = rest.read_u8()?;
        if segment_size != 0 {
            return Err(Error::NonZeroSegmentSize(segment_size));
        }

        // Entries are aligned to twice the address size, counting from
        // the start of the set (initial length included).
        let tuple_size = 2 * usize::from(address_size);
        let header_size = usize::from(format.initial_length_size())
            + 2
            + usize::from(format.word_size())
            + 1
            + 1;
        rest.skip((tuple_size - header_size % tuple_size) % tuple_size)?;

        Ok(ArangeHeader {
            offset,
            encoding: Encoding {
                format,
                version,
                address_size,
            },
            length,
            debug_info_offset,
            entries: rest,
        })
    }

    /// Where this set starts within `.debug_aranges`.
    #[inline]
    pub fn offset(&self) -> DebugArangesOffset {
        self.offset
    }

    /// The set's length field, header included.
    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    /// The set's decoding parameters.
    #[inline]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// The unit these entries describe, as a `.debug_info` offset.
    #[inline]
    pub fn debug_info_offset(&self) -> DebugInfoOffset {
        self.debug_info_offset
    }

    /// Walk this set's entries.
    ///
    /// Can be used as a
    /// [`FallibleIterator`](./index.html#using-with-fallibleiterator).
    #[inline]
    pub fn entries(&self) -> ArangeEntries<R> {
        ArangeEntries {
            input: self.entries.clone(),
            address_size: self.encoding.address_size,
        }
    }
}

/// The lazy entry iterator returned by [`ArangeHeader::entries`].
#[derive(Debug, Clone)]
pub struct ArangeEntries<R: Reader> {
    input: R,
    address_size: u8,
}

impl<R: Reader> ArangeEntries<R> {
    /// Parse the next entry; `None` at the all-zero terminator. A parse
    /// failure poisons the iterator.
    pub fn next(&mut self) -> Result<Option<ArangeEntry>> {
        if self.input.is_empty() {
            return Ok(None);
        }
        let result = (|| {
            let address = self.input.read_address(self.address_size)?;
            let length = self.input.read_address(self.address_size)?;
            Ok((address, length))
        })();
        match result {
            Ok((0, 0)) => {
                self.input.empty();
                Ok(None)
            }
            Ok((address, length)) => Ok(Some(ArangeEntry { address, length })),
            Err(e) => {
                self.input.empty();
                Err(e)
            }
        }
    }
}

#[cfg(feature = "fallible-iterator")]
impl<R: Reader> fallible_iterator::FallibleIterator for ArangeEntries<R> {
    type Item = ArangeEntry;
    type Error = Error;

    fn next(&mut self) -> core::result::Result<Option<Self::Item>, Self::Error> {
        ArangeEntries::next(self)
    }
}

/// One address/length tuple from a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ArangeEntry {
    address: u64,
    length: u64,
}

impl ArangeEntry {
    /// The first covered address.
    #[inline]
    pub fn address(&self) -> u64 {
        self.address
    }

    /// How many bytes are covered.
    #[inline]
    pub fn length(&self) -> u64 {
        self.length
    }

    /// The tuple as a half-open [`Range`].
    #[inline]
    pub fn range(&self) -> Range {
        Range {
            begin: self.address,
            end: self.address.wrapping_add(self.length),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Format;
    use crate::endianity::LittleEndian;
    use test_assembler::{Endian, Label, LabelMaker, Section};

    fn assemble_set(address_size: u8, entries: &[(u64, u64)]) -> Vec<u8> {
        let length = Label::new();
        let start = Label::new();
        let end = Label::new();
        let mut section = Section::with_endian(Endian::Little)
            .D32(&length)
            .mark(&start)
            .L16(2)
            .L32(0x0102_0304)
            .D8(address_size)
            .D8(0);
        // Pad to the entry alignment.
        let header_size = 4 + 2 + 4 + 1 + 1;
        let tuple_size = 2 * usize::from(address_size);
        section = section.append_repeated(0, (tuple_size - header_size % tuple_size) % tuple_size);
        for &(address, len) in entries {
            section = match address_size {
                4 => section.L32(address as u32).L32(len as u32),
                _ => section.L64(address).L64(len),
            };
        }
        // Terminator.
        section = match address_size {
            4 => section.L32(0).L32(0),
            _ => section.L64(0).L64(0),
        };
        let section = section.mark(&end);
        length.set_const((&end - &start) as u64);
        section.get_contents().unwrap()
    }

    #[test]
    fn headers_and_entries() {
        for address_size in [4u8, 8] {
            let buf = assemble_set(address_size, &[(0x1000, 0x100), (0x2000, 0x200)]);
            let debug_aranges = DebugAranges::new(&buf, LittleEndian);

            let mut headers = debug_aranges.headers();
            let header = headers.next().unwrap().unwrap();
            assert_eq!(header.offset(), DebugArangesOffset(0));
            assert_eq!(header.debug_info_offset(), DebugInfoOffset(0x0102_0304));
            assert_eq!(header.encoding().address_size, address_size);

            let mut entries = header.entries();
            let entry = entries.next().unwrap().unwrap();
            assert_eq!(entry.address(), 0x1000);
            assert_eq!(entry.length(), 0x100);
            assert_eq!(
                entry.range(),
                Range {
                    begin: 0x1000,
                    end: 0x1100,
                }
            );
            let entry = entries.next().unwrap().unwrap();
            assert_eq!(entry.address(), 0x2000);
            assert!(entries.next().unwrap().is_none());

            assert!(headers.next().unwrap().is_none());

            // Direct header lookup matches iteration.
            let direct = debug_aranges.header(DebugArangesOffset(0)).unwrap();
            assert_eq!(direct, header);
        }
    }

    #[test]
    fn bad_version_is_rejected() {
        let length = Label::new();
        let start = Label::new();
        let end = Label::new();
        let section = Section::with_endian(Endian::Little)
            .D32(&length)
            .mark(&start)
            .L16(3)
            .L32(0)
            .D8(4)
            .D8(0)
            .mark(&end);
        length.set_const((&end - &start) as u64);
        let buf = section.get_contents().unwrap();

        let debug_aranges = DebugAranges::new(&buf, LittleEndian);
        assert_eq!(
            debug_aranges.headers().next().unwrap_err(),
            Error::UnsupportedVersion(3)
        );
    }

    #[test]
    fn segmented_sets_are_rejected() {
        let length = Label::new();
        let start = Label::new();
        let end = Label::new();
        let section = Section::with_endian(Endian::Little)
            .D32(&length)
            .mark(&start)
            .L16(2)
            .L32(0)
            .D8(4)
            .D8(4)
            .mark(&end);
        length.set_const((&end - &start) as u64);
        let buf = section.get_contents().unwrap();

        let debug_aranges = DebugAranges::new(&buf, LittleEndian);
        assert_eq!(
            debug_aranges.headers().next().unwrap_err(),
            Error::NonZeroSegmentSize(4)
        );
    }
}
