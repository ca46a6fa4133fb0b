use std::borrow::Cow;
use std::fmt::Debug;

use crate::common::Format;
use crate::endianity::Endianity;
use crate::leb128;
use crate::read::{Error, Result};

// Section offsets are kept as usize. 64-bit DWARF read on a 32-bit host
// can name offsets the host cannot address; reject those early.
#[inline]
pub(crate) fn cast_offset(value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::InvalidOffset)
}

/// A cursor over a section's bytes.
///
/// Every `read_*` method consumes what it decodes; the inspection
/// methods (`len`, `find`, `to_*`) leave the cursor alone. Cloning a
/// reader is required to be cheap, and clones advance independently,
/// which is what makes lazy iteration over shared section data work.
///
/// [`EndianSlice`](super::EndianSlice) is the borrowed implementation;
/// the parsing code only ever goes through this trait.
pub trait Reader: Debug + Clone {
    /// The byte order used to decode multi-byte values.
    type Endian: Endianity;

    /// This reader's byte order.
    fn endian(&self) -> Self::Endian;

    /// How many bytes remain.
    fn len(&self) -> usize;

    /// Consume everything that remains.
    fn empty(&mut self);

    /// Shorten the remaining data to `len` bytes.
    fn truncate(&mut self, len: usize) -> Result<()>;

    /// How far this reader's position is past `base`'s position.
    ///
    /// Both readers must view the same underlying data.
    fn offset_from(&self, base: &Self) -> usize;

    /// The distance to the next occurrence of `byte`, without consuming
    /// anything.
    fn find(&self, byte: u8) -> Result<usize>;

    /// Consume `len` bytes without decoding them.
    fn skip(&mut self, len: usize) -> Result<()>;

    /// Carve off the next `len` bytes as their own reader and advance
    /// past them.
    fn split(&mut self, len: usize) -> Result<Self>;

    /// Fill `buf` from the next `buf.len()` bytes.
    fn read_slice(&mut self, buf: &mut [u8]) -> Result<()>;

    /// The remaining bytes, without consuming them.
    fn to_slice(&self) -> Result<Cow<'_, [u8]>>;

    /// The remaining bytes as UTF-8, without consuming them. Errors on
    /// invalid UTF-8.
    fn to_string(&self) -> Result<Cow<'_, str>>;

    /// The remaining bytes as UTF-8 with replacement characters, without
    /// consuming them.
    fn to_string_lossy(&self) -> Result<Cow<'_, str>>;

    /// Whether no bytes remain.
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read a fixed-size byte array.
    #[inline]
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0; N];
        self.read_slice(&mut buf)?;
        Ok(buf)
    }

    /// Read one byte.
    #[inline]
    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read one signed byte.
    #[inline]
    fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Read a `u16`.
    #[inline]
    fn read_u16(&mut self) -> Result<u16> {
        let buf = self.read_array::<2>()?;
        Ok(self.endian().read_u16(&buf))
    }

    /// Read an `i16`.
    #[inline]
    fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    /// Read a `u32`.
    #[inline]
    fn read_u32(&mut self) -> Result<u32> {
        let buf = self.read_array::<4>()?;
        Ok(self.endian().read_u32(&buf))
    }

    /// Read an `i32`.
    #[inline]
    fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// Read a `u64`.
    #[inline]
    fn read_u64(&mut self) -> Result<u64> {
        let buf = self.read_array::<8>()?;
        Ok(self.endian().read_u64(&buf))
    }

    /// Read an `i64`.
    #[inline]
    fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    /// Read an unsigned integer of `size` bytes, where `size` is between
    /// 1 and 8.
    fn read_uint(&mut self, size: usize) -> Result<u64> {
        let mut buf = [0; 8];
        self.read_slice(&mut buf[..size])?;
        let endian = self.endian();
        Ok(endian.read_uint(&buf[..size]))
    }

    /// Read up to and over a NUL terminator, returning the bytes before
    /// it.
    fn read_cstr(&mut self) -> Result<Self> {
        let len = self.find(0)?;
        let bytes = self.split(len)?;
        self.skip(1)?;
        Ok(bytes)
    }

    /// Read an unsigned LEB128 value.
    #[inline]
    fn read_uleb128(&mut self) -> Result<u64> {
        leb128::read_unsigned(self)
    }

    /// Read an unsigned LEB128 value that must fit in 16 bits.
    #[inline]
    fn read_uleb128_u16(&mut self) -> Result<u16> {
        leb128::read_u16(self)
    }

    /// Read an unsigned LEB128 value for use as an offset or length.
    #[inline]
    fn read_uleb128_usize(&mut self) -> Result<usize> {
        cast_offset(self.read_uleb128()?)
    }

    /// Read a signed LEB128 value.
    #[inline]
    fn read_sleb128(&mut self) -> Result<i64> {
        leb128::read_signed(self)
    }

    /// Consume a LEB128 value without decoding it.
    #[inline]
    fn skip_leb128(&mut self) -> Result<()> {
        self.read_uleb128().map(drop)
    }

    /// Read a target address of `address_size` bytes.
    fn read_address(&mut self, address_size: u8) -> Result<u64> {
        match address_size {
            1 => self.read_u8().map(u64::from),
            2 => self.read_u16().map(u64::from),
            4 => self.read_u32().map(u64::from),
            8 => self.read_u64(),
            other => Err(Error::UnsupportedAddressSize(other)),
        }
    }

    /// Read a format-sized unsigned integer as a `u64`.
    fn read_word(&mut self, format: Format) -> Result<u64> {
        match format {
            Format::Dwarf32 => self.read_u32().map(u64::from),
            Format::Dwarf64 => self.read_u64(),
        }
    }

    /// Read a format-sized section offset.
    #[inline]
    fn read_offset(&mut self, format: Format) -> Result<usize> {
        cast_offset(self.read_word(format)?)
    }

    /// Read an initial length field, giving the length and the format it
    /// announced.
    ///
    /// A value below `0xffff_fff0` is a 32-bit DWARF length. The escape
    /// `0xffff_ffff` announces 64-bit DWARF, with the real length in the
    /// following 8 bytes. Everything in between is reserved.
    fn read_initial_length(&mut self) -> Result<(usize, Format)> {
        match self.read_u32()? {
            0xffff_ffff => Ok((cast_offset(self.read_u64()?)?, Format::Dwarf64)),
            value if value < 0xffff_fff0 => Ok((value as usize, Format::Dwarf32)),
            reserved => Err(Error::ReservedUnitLength(u64::from(reserved))),
        }
    }
}
