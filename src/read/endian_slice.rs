//! The borrowed, zero-copy [`Reader`] implementation.

use std::borrow::Cow;
use std::fmt;
use std::ops::{Deref, Range, RangeFrom, RangeTo};
use std::str;

use crate::endianity::Endianity;
use crate::read::{Error, Reader, Result};

/// A borrowed byte slice paired with the byte order its contents use.
///
/// This is the reader the whole crate decodes through. It never copies:
/// splitting, truncating and reading all just narrow the borrowed
/// slice, so readers derived from one section share its backing buffer.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndianSlice<'input, Endian>
where
    Endian: Endianity,
{
    slice: &'input [u8],
    endian: Endian,
}

impl<'input, Endian> EndianSlice<'input, Endian>
where
    Endian: Endianity,
{
    /// Wrap `slice`, declaring its byte order.
    #[inline]
    pub fn new(slice: &'input [u8], endian: Endian) -> EndianSlice<'input, Endian> {
        EndianSlice { slice, endian }
    }

    /// The borrowed bytes.
    #[inline]
    pub fn slice(&self) -> &'input [u8] {
        self.slice
    }

    /// Split into `[..index)` and `[index..)`. Panics if `index` is out
    /// of bounds.
    #[inline]
    pub fn split_at(
        &self,
        index: usize,
    ) -> (EndianSlice<'input, Endian>, EndianSlice<'input, Endian>) {
        (self.range_to(..index), self.range_from(index..))
    }

    /// Position of the first occurrence of `byte`, if any.
    #[inline]
    pub fn find(&self, byte: u8) -> Option<usize> {
        self.slice.iter().position(|&b| b == byte)
    }

    /// How far this slice starts past the start of `base`, which must
    /// contain it.
    #[inline]
    pub fn offset_from(&self, base: EndianSlice<'input, Endian>) -> usize {
        let start = base.slice.as_ptr() as usize;
        let here = self.slice.as_ptr() as usize;
        debug_assert!(start <= here);
        debug_assert!(here + self.slice.len() <= start + base.slice.len());
        here - start
    }

    /// The bytes as UTF-8, or an error if they are not.
    #[inline]
    pub fn to_string(&self) -> Result<&'input str> {
        str::from_utf8(self.slice).map_err(|_| Error::InvalidUtf8)
    }

    /// The bytes as UTF-8, substituting replacement characters.
    #[inline]
    pub fn to_string_lossy(&self) -> Cow<'input, str> {
        String::from_utf8_lossy(self.slice)
    }

    /// A sub-slice for the given range. Panics when out of bounds.
    pub fn range(&self, range: Range<usize>) -> EndianSlice<'input, Endian> {
        EndianSlice {
            slice: &self.slice[range],
            endian: self.endian,
        }
    }

    /// A sub-slice from `range.start` to the end. Panics when out of
    /// bounds.
    pub fn range_from(&self, range: RangeFrom<usize>) -> EndianSlice<'input, Endian> {
        EndianSlice {
            slice: &self.slice[range],
            endian: self.endian,
        }
    }

    /// A sub-slice from the start to `range.end`. Panics when out of
    /// bounds.
    pub fn range_to(&self, range: RangeTo<usize>) -> EndianSlice<'input, Endian> {
        EndianSlice {
            slice: &self.slice[range],
            endian: self.endian,
        }
    }

    #[inline]
    fn take(&mut self, len: usize) -> Result<&'input [u8]> {
        if len > self.slice.len() {
            return Err(Error::UnexpectedEof);
        }
        let (taken, rest) = self.slice.split_at(len);
        self.slice = rest;
        Ok(taken)
    }
}

impl<'input, Endian> fmt::Debug for EndianSlice<'input, Endian>
where
    Endian: Endianity,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndianSlice")
            .field("endian", &self.endian)
            .field("len", &self.slice.len())
            .field("slice", &self.slice)
            .finish()
    }
}

impl<'input, Endian> Deref for EndianSlice<'input, Endian>
where
    Endian: Endianity,
{
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        self.slice
    }
}

impl<'input, Endian> From<EndianSlice<'input, Endian>> for &'input [u8]
where
    Endian: Endianity,
{
    fn from(slice: EndianSlice<'input, Endian>) -> &'input [u8] {
        slice.slice
    }
}

impl<'input, Endian> Reader for EndianSlice<'input, Endian>
where
    Endian: Endianity,
{
    type Endian = Endian;

    #[inline]
    fn endian(&self) -> Endian {
        self.endian
    }

    #[inline]
    fn len(&self) -> usize {
        self.slice.len()
    }

    #[inline]
    fn empty(&mut self) {
        self.slice = &[];
    }

    #[inline]
    fn truncate(&mut self, len: usize) -> Result<()> {
        if len > self.slice.len() {
            return Err(Error::UnexpectedEof);
        }
        self.slice = &self.slice[..len];
        Ok(())
    }

    #[inline]
    fn offset_from(&self, base: &Self) -> usize {
        EndianSlice::offset_from(self, *base)
    }

    #[inline]
    fn find(&self, byte: u8) -> Result<usize> {
        EndianSlice::find(self, byte).ok_or(Error::UnexpectedEof)
    }

    #[inline]
    fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(drop)
    }

    #[inline]
    fn split(&mut self, len: usize) -> Result<Self> {
        let slice = self.take(len)?;
        Ok(EndianSlice::new(slice, self.endian))
    }

    #[inline]
    fn read_slice(&mut self, buf: &mut [u8]) -> Result<()> {
        buf.copy_from_slice(self.take(buf.len())?);
        Ok(())
    }

    #[inline]
    fn to_slice(&self) -> Result<Cow<'_, [u8]>> {
        Ok(self.slice.into())
    }

    #[inline]
    fn to_string(&self) -> Result<Cow<'_, str>> {
        EndianSlice::to_string(self).map(Cow::Borrowed)
    }

    #[inline]
    fn to_string_lossy(&self) -> Result<Cow<'_, str>> {
        Ok(EndianSlice::to_string_lossy(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Format;
    use crate::endianity::{LittleEndian, NativeEndian};

    #[test]
    fn narrowing() {
        let bytes = &[1, 2, 3, 4, 5][..];
        let slice = EndianSlice::new(bytes, NativeEndian);
        let (head, tail) = slice.split_at(2);
        assert_eq!(head.slice(), &bytes[..2]);
        assert_eq!(tail.slice(), &bytes[2..]);
        assert_eq!(tail.offset_from(slice), 2);
        assert_eq!(slice.range(1..3).slice(), &bytes[1..3]);
    }

    #[test]
    fn reads_consume() {
        let bytes = [0x12, 0x34, 0x56, 0x78];
        let mut r = EndianSlice::new(&bytes, LittleEndian);
        assert_eq!(r.read_u16(), Ok(0x3412));
        assert_eq!(r.len(), 2);
        assert_eq!(r.read_u16(), Ok(0x7856));
        assert_eq!(r.read_u8(), Err(Error::UnexpectedEof));
    }

    #[test]
    fn initial_lengths() {
        let mut r = EndianSlice::new(&[0x12, 0x34, 0x56, 0x78], LittleEndian);
        assert_eq!(r.read_initial_length(), Ok((0x7856_3412, Format::Dwarf32)));
        assert!(r.is_empty());

        let bytes = [
            0xff, 0xff, 0xff, 0xff, 0x12, 0x34, 0x56, 0x78, 0x00, 0x00, 0x00, 0x00,
        ];
        let mut r = EndianSlice::new(&bytes, LittleEndian);
        assert_eq!(r.read_initial_length(), Ok((0x7856_3412, Format::Dwarf64)));

        let mut r = EndianSlice::new(&[0xfe, 0xff, 0xff, 0xff], LittleEndian);
        assert_eq!(
            r.read_initial_length(),
            Err(Error::ReservedUnitLength(0xffff_fffe))
        );

        let mut r = EndianSlice::new(&[0xff, 0xff], LittleEndian);
        assert_eq!(r.read_initial_length(), Err(Error::UnexpectedEof));
    }

    #[test]
    fn offsets_and_addresses() {
        let bytes = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let mut r = EndianSlice::new(&bytes, LittleEndian);
        assert_eq!(r.read_offset(Format::Dwarf32), Ok(0x0403_0201));
        let mut r = EndianSlice::new(&bytes, LittleEndian);
        assert_eq!(r.read_offset(Format::Dwarf64), Ok(0x0807_0605_0403_0201));

        let mut r = EndianSlice::new(&bytes, LittleEndian);
        assert_eq!(r.read_address(2), Ok(0x0201));
        assert_eq!(r.read_address(3), Err(Error::UnsupportedAddressSize(3)));
    }

    #[test]
    fn cstr_reads() {
        let bytes = [0x66, 0x6f, 0x6f, 0x00, 0x01];
        let mut r = EndianSlice::new(&bytes, LittleEndian);
        let s = r.read_cstr().expect("string");
        assert_eq!(s.slice(), b"foo");
        assert_eq!(r.len(), 1);

        let mut r = EndianSlice::new(&[0x66, 0x6f], LittleEndian);
        assert_eq!(r.read_cstr().unwrap_err(), Error::UnexpectedEof);
    }

    #[test]
    fn arrays() {
        let bytes = [1, 2, 3, 4];
        let mut r = EndianSlice::new(&bytes, LittleEndian);
        assert_eq!(r.read_array::<3>(), Ok([1, 2, 3]));
        assert_eq!(r.read_array::<2>(), Err(Error::UnexpectedEof));
    }
}
