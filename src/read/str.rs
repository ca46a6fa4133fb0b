//! The three string sections: `.debug_str`, `.debug_line_str`, and the
//! `.debug_str_offsets` table that DWARF 5 indexed string forms go
//! through.

use crate::common::{
    DebugLineStrOffset, DebugStrOffset, DebugStrOffsetsBase, DebugStrOffsetsIndex, Format,
    SectionId,
};
use crate::endianity::Endianity;
use crate::read::{EndianSlice, Error, Reader, Result, Section};

/// The `.debug_str` section: NUL-terminated strings, addressed by byte
/// offset.
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugStr<R> {
    section: R,
}

impl<'input, Endian> DebugStr<EndianSlice<'input, Endian>>
where
    Endian: Endianity,
{
    /// Wrap the raw bytes of a loaded `.debug_str` section.
    pub fn new(section: &'input [u8], endian: Endian) -> Self {
        Self::from(EndianSlice::new(section, endian))
    }
}

impl<R: Reader> DebugStr<R> {
    /// The string starting at `offset`, without its terminator.
    pub fn get_str(&self, offset: DebugStrOffset) -> Result<R> {
        let mut input = self.section.clone();
        input.skip(offset.0)?;
        input.read_cstr()
    }
}

impl<R> Section<R> for DebugStr<R> {
    fn id() -> SectionId {
        SectionId::DebugStr
    }

    fn reader(&self) -> &R
    where
        R: Reader,
    {
        &self.section
    }
}

impl<R> From<R> for DebugStr<R> {
    fn from(section: R) -> Self {
        DebugStr { section }
    }
}

/// The `.debug_line_str` section, holding the path strings referenced
/// by DWARF 5 line headers.
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugLineStr<R> {
    section: R,
}

impl<'input, Endian> DebugLineStr<EndianSlice<'input, Endian>>
where
    Endian: Endianity,
{
    /// Wrap the raw bytes of a loaded `.debug_line_str` section.
    pub fn new(section: &'input [u8], endian: Endian) -> Self {
        Self::from(EndianSlice::new(section, endian))
    }
}

impl<R: Reader> DebugLineStr<R> {
    /// The string starting at `offset`, without its terminator.
    pub fn get_str(&self, offset: DebugLineStrOffset) -> Result<R> {
        let mut input = self.section.clone();
        input.skip(offset.0)?;
        input.read_cstr()
    }
}

impl<R> Section<R> for DebugLineStr<R> {
    fn id() -> SectionId {
        SectionId::DebugLineStr
    }

    fn reader(&self) -> &R
    where
        R: Reader,
    {
        &self.section
    }
}

impl<R> From<R> for DebugLineStr<R> {
    fn from(section: R) -> Self {
        DebugLineStr { section }
    }
}

/// The `.debug_str_offsets` section: per-unit tables of `.debug_str`
/// offsets, indexed by the `DW_FORM_strx*` forms.
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugStrOffsets<R> {
    section: R,
}

impl<R: Reader> DebugStrOffsets<R> {
    /// The `.debug_str` offset stored at `index` in the table that
    /// starts at `base`.
    ///
    /// `base` comes from the unit's `DW_AT_str_offsets_base` (or its
    /// default) and already points past the table header. The header is
    /// deliberately never parsed here: GNU's pre-standard tables do not
    /// have one.
    pub fn get_str_offset(
        &self,
        format: Format,
        base: DebugStrOffsetsBase,
        index: DebugStrOffsetsIndex,
    ) -> Result<DebugStrOffset> {
        let entry = index
            .0
            .checked_mul(usize::from(format.word_size()))
            .ok_or(Error::InvalidOffset)?;
        let mut input = self.section.clone();
        input.skip(base.0)?;
        input.skip(entry)?;
        input.read_offset(format).map(DebugStrOffset)
    }
}

impl<R> Section<R> for DebugStrOffsets<R> {
    fn id() -> SectionId {
        SectionId::DebugStrOffsets
    }

    fn reader(&self) -> &R
    where
        R: Reader,
    {
        &self.section
    }
}

impl<R> From<R> for DebugStrOffsets<R> {
    fn from(section: R) -> Self {
        DebugStrOffsets { section }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::SectionMethods;
    use crate::LittleEndian;
    use test_assembler::{Endian, Label, LabelMaker, Section};

    #[test]
    fn string_lookup() {
        let debug_str = DebugStr::new(b"abc\0def\0", LittleEndian);
        assert_eq!(
            debug_str.get_str(DebugStrOffset(0)).map(|r| r.slice()),
            Ok(&b"abc"[..])
        );
        assert_eq!(
            debug_str.get_str(DebugStrOffset(4)).map(|r| r.slice()),
            Ok(&b"def"[..])
        );
        // Offsets may land inside a string.
        assert_eq!(
            debug_str.get_str(DebugStrOffset(5)).map(|r| r.slice()),
            Ok(&b"ef"[..])
        );
        assert!(debug_str.get_str(DebugStrOffset(8)).is_err());
    }

    #[test]
    fn str_offsets_lookup() {
        for format in [Format::Dwarf32, Format::Dwarf64] {
            let length = Label::new();
            let start = Label::new();
            let first = Label::new();
            let end = Label::new();
            let mut section = Section::with_endian(Endian::Little)
                .initial_length(format, &length, &start)
                .L16(5)
                .L16(0)
                .mark(&first);
            for i in 0..20 {
                section = section.word(format.word_size(), 1000 + i);
            }
            let section = section.mark(&end);
            section.start().set_const(0);
            length.set_const((&end - &start) as u64);
            let buf = section.get_contents().unwrap();

            let table = DebugStrOffsets::from(EndianSlice::new(&buf, LittleEndian));
            let base = DebugStrOffsetsBase(first.value().unwrap() as usize);

            assert_eq!(
                table.get_str_offset(format, base, DebugStrOffsetsIndex(0)),
                Ok(DebugStrOffset(1000))
            );
            assert_eq!(
                table.get_str_offset(format, base, DebugStrOffsetsIndex(19)),
                Ok(DebugStrOffset(1019))
            );
            assert!(table
                .get_str_offset(format, base, DebugStrOffsetsIndex(20))
                .is_err());
        }
    }
}
