//! `.debug_info`: unit headers and the DIE trees inside them.
//!
//! A unit is parsed in three layers. [`DebugInfo::units`] walks the raw
//! unit headers. A [`UnitHeader`] plus its abbreviation table gives
//! access to the unit's DIEs, either through the flat [`DieCursor`] or
//! the recursive [`DieTree`] view. Each [`Die`] finally decodes its
//! attributes on demand.

use core::cell::Cell;
use core::ops::{Range, RangeFrom, RangeTo};

use crate::common::{
    DebugAbbrevOffset, DebugAddrIndex, DebugInfoOffset, DebugLineOffset, DebugLineStrOffset,
    DebugLocListsIndex, DebugStrOffset, DebugStrOffsetsIndex, DebugTypeSignature, DwoId, Encoding,
    Format, LocationListsOffset, RangeListsOffset, SectionId,
};
use crate::constants;
use crate::read::reader::cast_offset;
use crate::read::{
    Abbrev, AbbrevTable, AttrSpec, DebugAbbrev, EndianSlice, Error, Expression, Reader, Result,
    Section, UnitOffset,
};

impl DebugInfoOffset {
    /// Rebase this section offset onto `unit`, if it falls inside it.
    pub fn to_unit_offset<R: Reader>(&self, unit: &UnitHeader<R>) -> Option<UnitOffset> {
        let relative = self.0.checked_sub(unit.offset().0)?;
        (relative < unit.total_length()).then_some(UnitOffset(relative))
    }
}

impl UnitOffset {
    /// Rebase this unit-relative offset onto the `.debug_info` section.
    pub fn to_debug_info_offset<R: Reader>(&self, unit: &UnitHeader<R>) -> DebugInfoOffset {
        DebugInfoOffset(unit.offset().0 + self.0)
    }
}

/// The `.debug_info` section.
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugInfo<R> {
    section: R,
}

impl<'input, Endian> DebugInfo<EndianSlice<'input, Endian>>
where
    Endian: crate::endianity::Endianity,
{
    /// Wrap the raw bytes of a loaded `.debug_info` section.
    pub fn new(section: &'input [u8], endian: Endian) -> Self {
        Self::from(EndianSlice::new(section, endian))
    }
}

impl<R: Reader> DebugInfo<R> {
    /// Walk the unit headers in this section, in order.
    ///
    /// Can be used as a
    /// [`FallibleIterator`](./index.html#using-with-fallibleiterator).
    pub fn units(&self) -> UnitHeaders<R> {
        UnitHeaders {
            input: self.section.clone(),
            offset: DebugInfoOffset(0),
        }
    }

    /// Parse the unit header that starts at `offset`.
    pub fn header_from_offset(&self, offset: DebugInfoOffset) -> Result<UnitHeader<R>> {
        let mut input = self.section.clone();
        input.skip(offset.0)?;
        UnitHeader::parse(&mut input, offset)
    }
}

impl<R> Section<R> for DebugInfo<R> {
    fn id() -> SectionId {
        SectionId::DebugInfo
    }

    fn reader(&self) -> &R
    where
        R: Reader,
    {
        &self.section
    }
}

impl<R> From<R> for DebugInfo<R> {
    fn from(section: R) -> Self {
        DebugInfo { section }
    }
}

/// The lazy unit header iterator returned by [`DebugInfo::units`].
#[derive(Clone, Debug)]
pub struct UnitHeaders<R: Reader> {
    input: R,
    offset: DebugInfoOffset,
}

impl<R: Reader> UnitHeaders<R> {
    /// Parse the next unit header. A parse failure poisons the iterator.
    pub fn next(&mut self) -> Result<Option<UnitHeader<R>>> {
        if self.input.is_empty() {
            return Ok(None);
        }
        match UnitHeader::parse(&mut self.input, self.offset) {
            Ok(header) => {
                self.offset = DebugInfoOffset(self.offset.0 + header.total_length());
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
impl<R: Reader> fallible_iterator::FallibleIterator for UnitHeaders<R> {
    type Item = UnitHeader<R>;
    type Error = Error;

    fn next(&mut self) -> core::result::Result<Option<Self::Item>, Self::Error> {
        UnitHeaders::next(self)
    }
}

/// What kind of unit a header introduces, with the kind-specific header
/// fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitType {
    /// An ordinary compilation unit.
    Compilation,
    /// A type unit, shareable between compilation units.
    Type {
        /// The signature other units use to refer to this type.
        type_signature: DebugTypeSignature,
        /// Where inside this unit the type's DIE lives.
        type_offset: UnitOffset,
    },
    /// A partial unit, importable by other units.
    Partial,
    /// The stub that stays in the executable when the real debug info
    /// moved to a split DWARF object.
    Skeleton(DwoId),
    /// The compilation unit inside a split DWARF object.
    SplitCompilation(DwoId),
    /// A type unit inside a split DWARF object.
    SplitType {
        /// The signature other units use to refer to this type.
        type_signature: DebugTypeSignature,
        /// Where inside this unit the type's DIE lives.
        type_offset: UnitOffset,
    },
}

impl UnitType {
    /// The corresponding `DW_UT_*` value.
    pub fn dw_ut(&self) -> constants::DwUt {
        match *self {
            UnitType::Compilation => constants::DW_UT_compile,
            UnitType::Type { .. } => constants::DW_UT_type,
            UnitType::Partial => constants::DW_UT_partial,
            UnitType::Skeleton(_) => constants::DW_UT_skeleton,
            UnitType::SplitCompilation(_) => constants::DW_UT_split_compile,
            UnitType::SplitType { .. } => constants::DW_UT_split_type,
        }
    }

    /// The split DWARF id carried in the header, for the unit kinds that
    /// have one.
    pub fn dwo_id(&self) -> Option<DwoId> {
        match *self {
            UnitType::Skeleton(id) | UnitType::SplitCompilation(id) => Some(id),
            _ => None,
        }
    }
}

/// A parsed unit header together with the unit's raw DIE bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitHeader<R: Reader> {
    encoding: Encoding,
    unit_length: usize,
    unit_type: UnitType,
    debug_abbrev_offset: DebugAbbrevOffset,
    unit_offset: DebugInfoOffset,
    dies: R,
}

impl<R: Reader> UnitHeader<R> {
    /// Assemble a header from its parts. `dies` is the data between the
    /// end of the header and the end of the unit.
    pub fn new(
        encoding: Encoding,
        unit_length: usize,
        unit_type: UnitType,
        debug_abbrev_offset: DebugAbbrevOffset,
        unit_offset: DebugInfoOffset,
        dies: R,
    ) -> UnitHeader<R> {
        UnitHeader {
            encoding,
            unit_length,
            unit_type,
            debug_abbrev_offset,
            unit_offset,
            dies,
        }
    }

    fn parse(input: &mut R, unit_offset: DebugInfoOffset) -> Result<UnitHeader<R>> {
        let (unit_length, format) = input.read_initial_length()?;
        let mut rest = input.split(unit_length)?;

        let version = rest.read_u16()?;
        let (unit_type, address_size, debug_abbrev_offset);
        match version {
            2..=4 => {
                // Pre-5 units put the abbrev offset first and have no
                // unit type byte; only compilation units exist.
                unit_type = UnitType::Compilation;
                debug_abbrev_offset = DebugAbbrevOffset(rest.read_offset(format)?);
                address_size = rest.read_u8()?;
            }
            5 => {
                let kind = constants::DwUt(rest.read_u8()?);
                address_size = rest.read_u8()?;
                debug_abbrev_offset = DebugAbbrevOffset(rest.read_offset(format)?);
                unit_type = match kind {
                    constants::DW_UT_compile => UnitType::Compilation,
                    constants::DW_UT_partial => UnitType::Partial,
                    constants::DW_UT_skeleton => UnitType::Skeleton(DwoId(rest.read_u64()?)),
                    constants::DW_UT_split_compile => {
                        UnitType::SplitCompilation(DwoId(rest.read_u64()?))
                    }
                    constants::DW_UT_type => UnitType::Type {
                        type_signature: DebugTypeSignature(rest.read_u64()?),
                        type_offset: UnitOffset(rest.read_offset(format)?),
                    },
                    constants::DW_UT_split_type => UnitType::SplitType {
                        type_signature: DebugTypeSignature(rest.read_u64()?),
                        type_offset: UnitOffset(rest.read_offset(format)?),
                    },
                    other => return Err(Error::UnsupportedUnitType(other)),
                };
            }
            other => return Err(Error::UnsupportedVersion(other)),
        }

        Ok(UnitHeader {
            encoding: Encoding {
                format,
                version,
                address_size,
            },
            unit_length,
            unit_type,
            debug_abbrev_offset,
            unit_offset,
            dies: rest,
        })
    }

    /// Where this unit starts within `.debug_info`.
    pub fn offset(&self) -> DebugInfoOffset {
        self.unit_offset
    }

    /// The encoded size of this unit's header.
    pub fn header_size(&self) -> usize {
        let format = self.encoding.format;
        let mut size = usize::from(format.initial_length_size()) + 2 /* version */;
        if self.encoding.version >= 5 {
            size += 1; // unit type
        }
        size += 1 /* address size */ + usize::from(format.word_size());
        size += match self.unit_type {
            UnitType::Skeleton(_) | UnitType::SplitCompilation(_) => 8,
            UnitType::Type { .. } | UnitType::SplitType { .. } => {
                8 + usize::from(format.word_size())
            }
            _ => 0,
        };
        size
    }

    /// The unit length field: everything after the initial length.
    pub fn unit_length(&self) -> usize {
        self.unit_length
    }

    /// The unit's size including the initial length field itself.
    pub fn total_length(&self) -> usize {
        usize::from(self.encoding.format.initial_length_size()) + self.unit_length
    }

    /// One past the last section offset belonging to this unit.
    pub fn end_offset(&self) -> DebugInfoOffset {
        DebugInfoOffset(self.unit_offset.0 + self.total_length())
    }

    /// The unit's decoding parameters.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// The unit's DWARF version.
    pub fn version(&self) -> u16 {
        self.encoding.version
    }

    /// What kind of unit this is.
    pub fn unit_type(&self) -> UnitType {
        self.unit_type
    }

    /// Where this unit's abbreviation table lives in `.debug_abbrev`.
    pub fn debug_abbrev_offset(&self) -> DebugAbbrevOffset {
        self.debug_abbrev_offset
    }

    /// The unit's target address size in bytes.
    pub fn address_size(&self) -> u8 {
        self.encoding.address_size
    }

    /// Whether the unit uses 32-bit or 64-bit DWARF.
    pub fn format(&self) -> Format {
        self.encoding.format
    }

    // A unit offset is usable if it lands inside the DIE data, past the
    // header.
    fn die_bytes_at(&self, offset: UnitOffset) -> Result<usize> {
        let relative = offset
            .0
            .checked_sub(self.header_size())
            .ok_or(Error::InvalidOffset)?;
        if relative >= self.dies.len() {
            return Err(Error::InvalidOffset);
        }
        Ok(relative)
    }

    /// The raw bytes for `range` of this unit.
    pub fn range(&self, range: Range<UnitOffset>) -> Result<R> {
        let start = self.die_bytes_at(range.start)?;
        let end = self.die_bytes_at(range.end)?;
        let mut input = self.dies.clone();
        input.skip(start)?;
        input.truncate(end.checked_sub(start).ok_or(Error::InvalidOffset)?)?;
        Ok(input)
    }

    /// The raw bytes from `range.start` to the end of this unit.
    pub fn range_from(&self, range: RangeFrom<UnitOffset>) -> Result<R> {
        let start = self.die_bytes_at(range.start)?;
        let mut input = self.dies.clone();
        input.skip(start)?;
        Ok(input)
    }

    /// The raw bytes from the first DIE to `range.end`.
    pub fn range_to(&self, range: RangeTo<UnitOffset>) -> Result<R> {
        let end = self.die_bytes_at(range.end)?;
        let mut input = self.dies.clone();
        input.truncate(end)?;
        Ok(input)
    }

    /// Parse the single DIE at `offset`.
    pub fn die_at<'me, 'abbrev>(
        &'me self,
        abbrevs: &'abbrev AbbrevTable,
        offset: UnitOffset,
    ) -> Result<Die<'abbrev, 'me, R>> {
        let mut input = self.range_from(offset..)?;
        Die::parse(&mut input, self, abbrevs)?.ok_or(Error::NoEntryAtOffset(offset.0 as u64))
    }

    /// A cursor over this unit's DIEs, starting at the root.
    pub fn entries<'me, 'abbrev>(
        &'me self,
        abbrevs: &'abbrev AbbrevTable,
    ) -> DieCursor<'abbrev, 'me, R> {
        DieCursor {
            unit: self,
            abbrevs,
            input: self.dies.clone(),
            current: None,
            next_depth_delta: 0,
        }
    }

    /// A cursor over this unit's DIEs, starting at `offset`.
    pub fn entries_at<'me, 'abbrev>(
        &'me self,
        abbrevs: &'abbrev AbbrevTable,
        offset: UnitOffset,
    ) -> Result<DieCursor<'abbrev, 'me, R>> {
        let input = self.range_from(offset..)?;
        Ok(DieCursor {
            unit: self,
            abbrevs,
            input,
            current: None,
            next_depth_delta: 0,
        })
    }

    /// A tree view of this unit's DIEs, rooted at `offset` or at the
    /// unit root.
    pub fn entries_tree<'me, 'abbrev>(
        &'me self,
        abbrevs: &'abbrev AbbrevTable,
        offset: Option<UnitOffset>,
    ) -> Result<DieTree<'abbrev, 'me, R>> {
        let root = match offset {
            Some(offset) => self.range_from(offset..)?,
            None => self.dies.clone(),
        };
        Ok(DieTree::new(root, self, abbrevs))
    }

    /// Parse this unit's abbreviation table.
    pub fn abbreviations(&self, debug_abbrev: &DebugAbbrev<R>) -> Result<AbbrevTable> {
        debug_abbrev.abbreviations(self.debug_abbrev_offset)
    }
}

/// One debugging information entry: a tag plus attributes, at a known
/// offset in its unit.
///
/// The attribute bytes are decoded lazily; the decoded span length is
/// remembered so later traversal does not re-parse it.
#[derive(Clone, Debug)]
pub struct Die<'abbrev, 'unit, R: Reader> {
    offset: UnitOffset,
    attr_bytes: R,
    attr_bytes_len: Cell<Option<usize>>,
    abbrev: &'abbrev Abbrev,
    unit: &'unit UnitHeader<R>,
}

impl<'abbrev, 'unit, R: Reader> Die<'abbrev, 'unit, R> {
    /// This DIE's offset within its unit.
    pub fn offset(&self) -> UnitOffset {
        self.offset
    }

    /// This DIE's tag.
    pub fn tag(&self) -> constants::DwTag {
        self.abbrev.tag()
    }

    /// Whether this DIE owns a subtree of children.
    pub fn has_children(&self) -> bool {
        self.abbrev.has_children()
    }

    /// Iterate this DIE's attributes in on-disk order.
    ///
    /// Can be used as a
    /// [`FallibleIterator`](./index.html#using-with-fallibleiterator).
    pub fn attrs<'me>(&'me self) -> DieAttrs<'abbrev, 'me, 'unit, R> {
        DieAttrs {
            input: self.attr_bytes.clone(),
            specs: self.abbrev.attrs(),
            die: self,
        }
    }

    /// The first attribute named `name`, if present.
    pub fn attr(&self, name: constants::DwAt) -> Result<Option<Attribute<R>>> {
        let mut attrs = self.attrs();
        while let Some(attr) = attrs.next()? {
            if attr.name() == name {
                return Ok(Some(attr));
            }
        }
        Ok(None)
    }

    /// The normalized value of the first attribute named `name`, if
    /// present.
    pub fn attr_value(&self, name: constants::DwAt) -> Result<Option<AttributeValue<R>>> {
        Ok(self.attr(name)?.map(|attr| attr.value()))
    }

    // The input positioned after this DIE's attributes, where its first
    // child (or the next sibling) begins. Fixed-size attributes are
    // skipped arithmetically; only variable-width forms get parsed.
    pub(crate) fn skip_attrs(&self) -> Result<R> {
        let mut input = self.attr_bytes.clone();
        if let Some(len) = self.attr_bytes_len.get() {
            input.skip(len)?;
            return Ok(input);
        }

        let encoding = self.unit.encoding();
        let mut pending = 0;
        for spec in self.abbrev.attrs() {
            match spec.fixed_size(encoding) {
                Some(size) => pending += size,
                None => {
                    input.skip(pending)?;
                    pending = 0;
                    decode_form(&mut input, encoding, *spec)?;
                }
            }
        }
        input.skip(pending)?;

        self.attr_bytes_len
            .set(Some(input.offset_from(&self.attr_bytes)));
        Ok(input)
    }

    // The remainder of the unit starting at this DIE's next sibling, if
    // a usable DW_AT_sibling attribute says where that is.
    fn sibling(&self) -> Option<R> {
        match self.attr_value(constants::DW_AT_sibling) {
            Ok(Some(AttributeValue::UnitRef(offset))) if offset.0 > self.offset.0 => {
                self.unit.range_from(offset..).ok()
            }
            _ => None,
        }
    }

    // Returns None for a null entry.
    fn parse(
        input: &mut R,
        unit: &'unit UnitHeader<R>,
        abbrevs: &'abbrev AbbrevTable,
    ) -> Result<Option<Self>> {
        let offset = unit.header_size() + input.offset_from(&unit.dies);
        let code = input.read_uleb128()?;
        if code == 0 {
            return Ok(None);
        }
        let abbrev = abbrevs.get(code).ok_or(Error::UnknownAbbrevCode(code))?;
        Ok(Some(Die {
            offset: UnitOffset(offset),
            attr_bytes: input.clone(),
            attr_bytes_len: Cell::new(None),
            abbrev,
            unit,
        }))
    }
}

/// A decoded attribute value.
///
/// Raw decoding keeps the on-disk flavor (`Data4`, `SecOffset`, ...);
/// [`Attribute::value`] then maps those onto the attribute-specific
/// variants where the attribute name determines the meaning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeValue<R: Reader> {
    /// A target address.
    Addr(u64),
    /// Uninterpreted bytes.
    Block(R),
    /// A 1-byte constant; meaning depends on the attribute.
    Data1(u8),
    /// A 2-byte constant; meaning depends on the attribute.
    Data2(u16),
    /// A 4-byte constant; meaning depends on the attribute.
    Data4(u32),
    /// An 8-byte constant; meaning depends on the attribute.
    Data8(u64),
    /// A signed constant.
    Sdata(i64),
    /// An unsigned constant.
    Udata(u64),
    /// A DWARF expression or location description.
    Exprloc(Expression<R>),
    /// A boolean flag.
    Flag(bool),
    /// An offset into some section; which one depends on the attribute.
    SecOffset(usize),
    /// A `DW_AT_addr_base` value.
    DebugAddrBase(crate::common::DebugAddrBase),
    /// An index into the unit's address table.
    DebugAddrIndex(DebugAddrIndex),
    /// A reference to a DIE in the same unit.
    UnitRef(UnitOffset),
    /// A reference to a DIE anywhere in `.debug_info`.
    DebugInfoRef(DebugInfoOffset),
    /// A reference into the supplementary object's `.debug_info`.
    DebugInfoRefSup(DebugInfoOffset),
    /// The unit's line program in `.debug_line`.
    DebugLineRef(DebugLineOffset),
    /// A string in `.debug_line_str`.
    DebugLineStrRef(DebugLineStrOffset),
    /// A location list.
    LocationListsRef(LocationListsOffset),
    /// A `DW_AT_loclists_base` value.
    DebugLocListsBase(crate::common::DebugLocListsBase),
    /// An index into the unit's location list offset table.
    DebugLocListsIndex(DebugLocListsIndex),
    /// A range list.
    RangeListsRef(RangeListsOffset),
    /// A `DW_AT_rnglists_base` value.
    DebugRngListsBase(crate::common::DebugRngListsBase),
    /// An index into the unit's range list offset table.
    DebugRngListsIndex(crate::common::DebugRngListsIndex),
    /// A reference to a type unit by signature.
    DebugTypesRef(DebugTypeSignature),
    /// A string in `.debug_str`.
    DebugStrRef(DebugStrOffset),
    /// A string in the supplementary object's `.debug_str`.
    DebugStrRefSup(DebugStrOffset),
    /// A `DW_AT_str_offsets_base` value.
    DebugStrOffsetsBase(crate::common::DebugStrOffsetsBase),
    /// An index into the unit's string offset table.
    DebugStrOffsetsIndex(DebugStrOffsetsIndex),
    /// An inline string, without its NUL terminator and with no promise
    /// of being UTF-8.
    String(R),
    /// A base type encoding, from `DW_AT_encoding`.
    Encoding(constants::DwAte),
    /// A source language, from `DW_AT_language`.
    Language(constants::DwLang),
    /// An inlining state, from `DW_AT_inline`.
    Inline(constants::DwInl),
    /// A calling convention, from `DW_AT_calling_convention`.
    CallingConvention(constants::DwCc),
    /// An index into the unit's line program file table.
    FileIndex(u64),
    /// A split DWARF id, from `DW_AT_GNU_dwo_id`.
    DwoId(DwoId),
}

/// One attribute of a [`Die`]: its name and decoded value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute<R: Reader> {
    pub(crate) name: constants::DwAt,
    pub(crate) value: AttributeValue<R>,
}

impl<R: Reader> Attribute<R> {
    /// The attribute's name.
    pub fn name(&self) -> constants::DwAt {
        self.name
    }

    /// The value exactly as its form encoded it.
    pub fn raw_value(&self) -> AttributeValue<R> {
        self.value.clone()
    }

    /// The value reinterpreted according to what this attribute means.
    ///
    /// For example a `DW_AT_stmt_list` section offset becomes a
    /// [`AttributeValue::DebugLineRef`], and a `DW_AT_language` constant
    /// becomes its [`constants::DwLang`]. Values whose name implies no
    /// reinterpretation come back unchanged.
    pub fn value(&self) -> AttributeValue<R> {
        self.normalized().unwrap_or_else(|| self.value.clone())
    }

    fn normalized(&self) -> Option<AttributeValue<R>> {
        use crate::constants::*;
        use AttributeValue as V;

        let exprloc = || self.exprloc_value().map(V::Exprloc);
        let loclist = || {
            self.offset_value()
                .map(|offset| V::LocationListsRef(LocationListsOffset(offset)))
        };
        let udata = || self.udata_value().map(V::Udata);

        match self.name {
            DW_AT_location | DW_AT_string_length | DW_AT_return_addr | DW_AT_frame_base
            | DW_AT_segment | DW_AT_static_link | DW_AT_use_location
            | DW_AT_vtable_elem_location => exprloc().or_else(loclist),
            // The constant class must win here so that DW_FORM_data4/8
            // are not mistaken for pre-DWARF-4 section offsets.
            DW_AT_data_member_location => udata().or_else(exprloc).or_else(loclist),
            DW_AT_data_location | DW_AT_allocated | DW_AT_associated => exprloc(),
            DW_AT_stmt_list => self
                .offset_value()
                .map(|offset| V::DebugLineRef(DebugLineOffset(offset))),
            DW_AT_ranges | DW_AT_start_scope => self
                .offset_value()
                .map(|offset| V::RangeListsRef(RangeListsOffset(offset))),
            DW_AT_high_pc | DW_AT_byte_size | DW_AT_bit_size | DW_AT_bit_offset
            | DW_AT_byte_stride | DW_AT_bit_stride | DW_AT_count | DW_AT_decl_column
            | DW_AT_decl_line | DW_AT_call_column | DW_AT_call_line | DW_AT_data_bit_offset
            | DW_AT_digit_count | DW_AT_alignment => udata().or_else(exprloc),
            DW_AT_language => self.u16_value().map(|v| V::Language(DwLang(v))),
            DW_AT_encoding => self.u8_value().map(|v| V::Encoding(DwAte(v))),
            DW_AT_inline => self.u8_value().map(|v| V::Inline(DwInl(v))),
            DW_AT_calling_convention => self.u8_value().map(|v| V::CallingConvention(DwCc(v))),
            DW_AT_decl_file | DW_AT_call_file => self.udata_value().map(V::FileIndex),
            DW_AT_str_offsets_base => self
                .offset_value()
                .map(|o| V::DebugStrOffsetsBase(crate::common::DebugStrOffsetsBase(o))),
            DW_AT_addr_base | DW_AT_GNU_addr_base => self
                .offset_value()
                .map(|o| V::DebugAddrBase(crate::common::DebugAddrBase(o))),
            DW_AT_rnglists_base | DW_AT_GNU_ranges_base => self
                .offset_value()
                .map(|o| V::DebugRngListsBase(crate::common::DebugRngListsBase(o))),
            DW_AT_loclists_base => self
                .offset_value()
                .map(|o| V::DebugLocListsBase(crate::common::DebugLocListsBase(o))),
            DW_AT_GNU_dwo_id => self.udata_value().map(|id| V::DwoId(DwoId(id))),
            _ => None,
        }
    }

    /// The value as a `u8` constant, if it is one and fits.
    pub fn u8_value(&self) -> Option<u8> {
        self.udata_value().and_then(|v| u8::try_from(v).ok())
    }

    /// The value as a `u16` constant, if it is one and fits.
    pub fn u16_value(&self) -> Option<u16> {
        self.udata_value().and_then(|v| u16::try_from(v).ok())
    }

    /// The value as an unsigned constant, if it has a constant form and
    /// is not negative.
    pub fn udata_value(&self) -> Option<u64> {
        match self.value {
            AttributeValue::Data1(v) => Some(u64::from(v)),
            AttributeValue::Data2(v) => Some(u64::from(v)),
            AttributeValue::Data4(v) => Some(u64::from(v)),
            AttributeValue::Data8(v) | AttributeValue::Udata(v) => Some(v),
            AttributeValue::Sdata(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// The value as a signed constant, if it has a constant form. The
    /// fixed-width `Data*` forms are sign extended.
    pub fn sdata_value(&self) -> Option<i64> {
        match self.value {
            AttributeValue::Data1(v) => Some(i64::from(v as i8)),
            AttributeValue::Data2(v) => Some(i64::from(v as i16)),
            AttributeValue::Data4(v) => Some(i64::from(v as i32)),
            AttributeValue::Data8(v) => Some(v as i64),
            AttributeValue::Sdata(v) => Some(v),
            AttributeValue::Udata(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// The value as a raw section offset, if its form was
    /// `DW_FORM_sec_offset`.
    pub fn offset_value(&self) -> Option<usize> {
        match self.value {
            AttributeValue::SecOffset(offset) => Some(offset),
            _ => None,
        }
    }

    /// The value as an expression, accepting the block forms some
    /// producers use instead of `DW_FORM_exprloc`.
    pub fn exprloc_value(&self) -> Option<Expression<R>> {
        match self.value {
            AttributeValue::Exprloc(ref expression) => Some(expression.clone()),
            AttributeValue::Block(ref block) => Some(Expression(block.clone())),
            _ => None,
        }
    }
}

fn read_block<R: Reader>(input: &mut R, len: usize) -> Result<AttributeValue<R>> {
    Ok(AttributeValue::Block(input.split(len)?))
}

fn read_index<R: Reader>(input: &mut R, bytes: usize) -> Result<usize> {
    cast_offset(input.read_uint(bytes)?)
}

/// Decode one attribute value, following `spec`'s form.
///
/// DWARF 5 line headers reuse the form encodings for their directory and
/// file tables, so this works from an [`Encoding`] alone rather than a
/// unit header.
pub(crate) fn decode_form<R: Reader>(
    input: &mut R,
    encoding: Encoding,
    spec: AttrSpec,
) -> Result<Attribute<R>> {
    use crate::constants::*;
    use AttributeValue as V;

    let mut form = spec.form();
    // An indirect form spells the real form inline, possibly repeatedly.
    while form == DW_FORM_indirect {
        form = DwForm(input.read_uleb128_u16()?);
        // The implicit constant lives in the abbreviation, so there is
        // nothing an indirect occurrence could mean.
        if form == DW_FORM_implicit_const {
            return Err(Error::InvalidIndirectForm(form));
        }
    }

    let value = match form {
        DW_FORM_addr => V::Addr(input.read_address(encoding.address_size)?),
        DW_FORM_block1 => {
            let len = input.read_u8()?;
            read_block(input, usize::from(len))?
        }
        DW_FORM_block2 => {
            let len = input.read_u16()?;
            read_block(input, usize::from(len))?
        }
        DW_FORM_block4 => {
            let len = input.read_u32()?;
            read_block(input, cast_offset(u64::from(len))?)?
        }
        DW_FORM_block => {
            let len = input.read_uleb128_usize()?;
            read_block(input, len)?
        }
        DW_FORM_data1 => V::Data1(input.read_u8()?),
        DW_FORM_data2 => V::Data2(input.read_u16()?),
        DW_FORM_data4 => V::Data4(input.read_u32()?),
        DW_FORM_data8 => V::Data8(input.read_u64()?),
        DW_FORM_data16 => read_block(input, 16)?,
        DW_FORM_udata => V::Udata(input.read_uleb128()?),
        DW_FORM_sdata => V::Sdata(input.read_sleb128()?),
        DW_FORM_exprloc => {
            let len = input.read_uleb128_usize()?;
            V::Exprloc(Expression(input.split(len)?))
        }
        DW_FORM_flag => V::Flag(input.read_u8()? != 0),
        // Present by virtue of being listed; no bytes on disk.
        DW_FORM_flag_present => V::Flag(true),
        DW_FORM_implicit_const => V::Sdata(
            spec.implicit_const()
                .ok_or(Error::InvalidIndirectForm(form))?,
        ),
        DW_FORM_sec_offset => V::SecOffset(input.read_offset(encoding.format)?),
        DW_FORM_ref1 => V::UnitRef(UnitOffset(read_index(input, 1)?)),
        DW_FORM_ref2 => V::UnitRef(UnitOffset(read_index(input, 2)?)),
        DW_FORM_ref4 => V::UnitRef(UnitOffset(read_index(input, 4)?)),
        DW_FORM_ref8 => V::UnitRef(UnitOffset(cast_offset(input.read_u64()?)?)),
        DW_FORM_ref_udata => V::UnitRef(UnitOffset(input.read_uleb128_usize()?)),
        // DWARF 2 sized this like an address; version 3 changed it to an
        // offset.
        DW_FORM_ref_addr => {
            let offset = if encoding.version == 2 {
                cast_offset(input.read_address(encoding.address_size)?)?
            } else {
                input.read_offset(encoding.format)?
            };
            V::DebugInfoRef(DebugInfoOffset(offset))
        }
        DW_FORM_ref_sig8 => V::DebugTypesRef(DebugTypeSignature(input.read_u64()?)),
        DW_FORM_ref_sup4 => V::DebugInfoRefSup(DebugInfoOffset(read_index(input, 4)?)),
        DW_FORM_ref_sup8 => V::DebugInfoRefSup(DebugInfoOffset(cast_offset(input.read_u64()?)?)),
        DW_FORM_GNU_ref_alt => {
            V::DebugInfoRefSup(DebugInfoOffset(input.read_offset(encoding.format)?))
        }
        DW_FORM_string => V::String(input.read_cstr()?),
        DW_FORM_strp => V::DebugStrRef(DebugStrOffset(input.read_offset(encoding.format)?)),
        DW_FORM_strp_sup | DW_FORM_GNU_strp_alt => {
            V::DebugStrRefSup(DebugStrOffset(input.read_offset(encoding.format)?))
        }
        DW_FORM_line_strp => {
            V::DebugLineStrRef(DebugLineStrOffset(input.read_offset(encoding.format)?))
        }
        DW_FORM_strx => V::DebugStrOffsetsIndex(DebugStrOffsetsIndex(input.read_uleb128_usize()?)),
        DW_FORM_strx1 => V::DebugStrOffsetsIndex(DebugStrOffsetsIndex(read_index(input, 1)?)),
        DW_FORM_strx2 => V::DebugStrOffsetsIndex(DebugStrOffsetsIndex(read_index(input, 2)?)),
        DW_FORM_strx3 => V::DebugStrOffsetsIndex(DebugStrOffsetsIndex(read_index(input, 3)?)),
        DW_FORM_strx4 => V::DebugStrOffsetsIndex(DebugStrOffsetsIndex(read_index(input, 4)?)),
        DW_FORM_addrx => V::DebugAddrIndex(DebugAddrIndex(input.read_uleb128_usize()?)),
        DW_FORM_addrx1 => V::DebugAddrIndex(DebugAddrIndex(read_index(input, 1)?)),
        DW_FORM_addrx2 => V::DebugAddrIndex(DebugAddrIndex(read_index(input, 2)?)),
        DW_FORM_addrx3 => V::DebugAddrIndex(DebugAddrIndex(read_index(input, 3)?)),
        DW_FORM_addrx4 => V::DebugAddrIndex(DebugAddrIndex(read_index(input, 4)?)),
        DW_FORM_loclistx => V::DebugLocListsIndex(DebugLocListsIndex(input.read_uleb128_usize()?)),
        DW_FORM_rnglistx => V::DebugRngListsIndex(crate::common::DebugRngListsIndex(
            input.read_uleb128_usize()?,
        )),
        other => return Err(Error::UnknownForm(other)),
    };

    Ok(Attribute {
        name: spec.name(),
        value,
    })
}

/// The lazy attribute iterator returned by [`Die::attrs`].
#[derive(Clone, Copy, Debug)]
pub struct DieAttrs<'abbrev, 'die, 'unit, R: Reader> {
    input: R,
    specs: &'abbrev [AttrSpec],
    die: &'die Die<'abbrev, 'unit, R>,
}

impl<'abbrev, 'die, 'unit, R: Reader> DieAttrs<'abbrev, 'die, 'unit, R> {
    /// Decode the next attribute. A decode failure poisons the iterator.
    pub fn next(&mut self) -> Result<Option<Attribute<R>>> {
        let Some((spec, rest)) = self.specs.split_first() else {
            // Completing the walk tells the DIE where its attributes
            // end, saving the separate skip later.
            if self.die.attr_bytes_len.get().is_none() {
                let len = self.input.offset_from(&self.die.attr_bytes);
                self.die.attr_bytes_len.set(Some(len));
            }
            return Ok(None);
        };
        match decode_form(&mut self.input, self.die.unit.encoding(), *spec) {
            Ok(attr) => {
                self.specs = rest;
                Ok(Some(attr))
            }
            Err(e) => {
                self.input.empty();
                Err(e)
            }
        }
    }
}

#[cfg(feature = "fallible-iterator")]
impl<'abbrev, 'die, 'unit, R: Reader> fallible_iterator::FallibleIterator
    for DieAttrs<'abbrev, 'die, 'unit, R>
{
    type Item = Attribute<R>;
    type Error = Error;

    fn next(&mut self) -> core::result::Result<Option<Self::Item>, Self::Error> {
        DieAttrs::next(self)
    }
}

/// A flat cursor over a unit's DIEs.
///
/// [`DieCursor::next_dfs`] walks the whole tree in prefix order,
/// reporting how far the depth changed at each step;
/// [`DieCursor::next_sibling`] skips a subtree, using `DW_AT_sibling`
/// pointers when the producer wrote them. [`DieCursor::next_entry`] is
/// the raw layer underneath both: it also stops on the null entries
/// that close each sibling list.
#[derive(Clone, Debug)]
pub struct DieCursor<'abbrev, 'unit, R: Reader> {
    unit: &'unit UnitHeader<R>,
    abbrevs: &'abbrev AbbrevTable,
    input: R,
    current: Option<Die<'abbrev, 'unit, R>>,
    next_depth_delta: isize,
}

impl<'abbrev, 'unit, R: Reader> DieCursor<'abbrev, 'unit, R> {
    /// The DIE the cursor sits on, unless it sits on a null entry or has
    /// not started yet.
    #[inline]
    pub fn current(&self) -> Option<&Die<'abbrev, 'unit, R>> {
        self.current.as_ref()
    }

    /// Step to the next entry in the flat encoding order, null entries
    /// included. `Ok(Some(()))` means the cursor moved; inspect
    /// [`Self::current`] to see onto what.
    pub fn next_entry(&mut self) -> Result<Option<()>> {
        if let Some(ref die) = self.current {
            self.input = die.skip_attrs()?;
        }

        if self.input.is_empty() {
            self.current = None;
            self.next_depth_delta = 0;
            return Ok(None);
        }

        match Die::parse(&mut self.input, self.unit, self.abbrevs) {
            Ok(Some(die)) => {
                self.next_depth_delta = die.has_children() as isize;
                self.current = Some(die);
                Ok(Some(()))
            }
            Ok(None) => {
                self.next_depth_delta = -1;
                self.current = None;
                Ok(Some(()))
            }
            Err(e) => {
                self.input.empty();
                self.next_depth_delta = 0;
                self.current = None;
                Err(e)
            }
        }
    }

    /// Step to the next DIE in prefix order, returning how far the tree
    /// depth changed along with it: `1` moved into a child, `0` moved to
    /// a sibling, `-n` climbed `n` levels before moving sideways.
    pub fn next_dfs(&mut self) -> Result<Option<(isize, &Die<'abbrev, 'unit, R>)>> {
        let mut delta = self.next_depth_delta;
        loop {
            if self.next_entry()?.is_none() {
                return Ok(None);
            }
            if let Some(ref die) = self.current {
                return Ok(Some((delta, die)));
            }
            // That was a null entry; fold its depth change in and keep
            // going.
            delta += self.next_depth_delta;
        }
    }

    /// Step to the current DIE's next sibling, skipping over its whole
    /// subtree. The cursor's depth is unchanged on success; `Ok(None)`
    /// means the sibling list is exhausted.
    pub fn next_sibling(&mut self) -> Result<Option<&Die<'abbrev, 'unit, R>>> {
        if self.current.is_none() {
            return Ok(None);
        }

        let mut depth = 0isize;
        loop {
            // If the current DIE has children they must be passed over,
            // either via its sibling pointer or by descending.
            let shortcut = match self.current {
                Some(ref die) if die.has_children() => {
                    let shortcut = die.sibling();
                    if shortcut.is_none() {
                        depth += 1;
                    }
                    shortcut
                }
                _ => None,
            };
            if let Some(input) = shortcut {
                self.input = input;
                self.current = None;
            }

            if self.next_entry()?.is_none() {
                return Ok(None);
            }
            if depth == 0 {
                return Ok(self.current());
            }
            if self.current.is_none() {
                // A null entry closed one nesting level.
                depth -= 1;
            }
        }
    }
}

/// A tree view over a unit's DIEs, for recursive traversal.
///
/// Get the root with [`DieTree::root`], then walk [`DieTreeNode`]s and
/// their [`DieTreeNode::children`]. Skipped subtrees are never parsed
/// beyond what sibling detection needs.
#[derive(Clone, Debug)]
pub struct DieTree<'abbrev, 'unit, R: Reader> {
    root: R,
    unit: &'unit UnitHeader<R>,
    abbrevs: &'abbrev AbbrevTable,
    input: R,
    current: Option<Die<'abbrev, 'unit, R>>,
    depth: isize,
}

impl<'abbrev, 'unit, R: Reader> DieTree<'abbrev, 'unit, R> {
    fn new(root: R, unit: &'unit UnitHeader<R>, abbrevs: &'abbrev AbbrevTable) -> Self {
        DieTree {
            input: root.clone(),
            root,
            unit,
            abbrevs,
            current: None,
            depth: 0,
        }
    }

    /// Position the tree at its root DIE and return the root node.
    pub fn root<'me>(&'me mut self) -> Result<DieTreeNode<'abbrev, 'unit, 'me, R>> {
        self.input = self.root.clone();
        self.current = Die::parse(&mut self.input, self.unit, self.abbrevs)?;
        self.depth = 0;
        if self.current.is_none() {
            return Err(Error::UnexpectedNull);
        }
        Ok(DieTreeNode { tree: self, depth: 1 })
    }

    // Move to the next DIE at `depth`, which must be at most one level
    // below the current position. Returns whether one was found.
    fn move_to_next_at(&mut self, depth: isize) -> Result<bool> {
        if self.depth < depth {
            // Descending: only possible from a DIE with children.
            debug_assert_eq!(self.depth + 1, depth);
            match self.current {
                Some(ref die) if die.has_children() => {
                    self.input = die.skip_attrs()?;
                    self.depth += 1;
                }
                _ => return Ok(false),
            }
            self.current = Die::parse(&mut self.input, self.unit, self.abbrevs)?;
            return Ok(self.current.is_some());
        }

        // Same level or above: keep stepping until the depth drops back
        // to the requested level.
        loop {
            match self.current {
                Some(ref die) => {
                    if die.has_children() {
                        if let Some(shortcut) = die.sibling() {
                            self.input = shortcut;
                        } else {
                            self.depth += 1;
                            self.input = die.skip_attrs()?;
                        }
                    } else {
                        self.input = die.skip_attrs()?;
                    }
                }
                // A null entry ends the current sibling list.
                None => self.depth -= 1,
            }

            if self.depth < depth {
                return Ok(false);
            }

            self.current = Die::parse(&mut self.input, self.unit, self.abbrevs)?;
            if self.depth == depth {
                return Ok(self.current.is_some());
            }
        }
    }
}

/// One node of a [`DieTree`].
#[derive(Debug)]
pub struct DieTreeNode<'abbrev, 'unit, 'tree, R: Reader> {
    tree: &'tree mut DieTree<'abbrev, 'unit, R>,
    depth: isize,
}

impl<'abbrev, 'unit, 'tree, R: Reader> DieTreeNode<'abbrev, 'unit, 'tree, R> {
    /// The DIE at this node.
    pub fn entry(&self) -> &Die<'abbrev, 'unit, R> {
        // Nodes are only handed out when positioned on a DIE.
        self.tree.current.as_ref().unwrap()
    }

    /// Iterate this node's children, consuming the node.
    pub fn children(self) -> DieTreeChildren<'abbrev, 'unit, 'tree, R> {
        DieTreeChildren {
            tree: self.tree,
            depth: self.depth,
            done: false,
        }
    }
}

/// Sibling iterator for one level of a [`DieTree`].
#[derive(Debug)]
pub struct DieTreeChildren<'abbrev, 'unit, 'tree, R: Reader> {
    tree: &'tree mut DieTree<'abbrev, 'unit, R>,
    depth: isize,
    done: bool,
}

impl<'abbrev, 'unit, 'tree, R: Reader> DieTreeChildren<'abbrev, 'unit, 'tree, R> {
    /// The next child, or `None` when the level is exhausted.
    pub fn next<'me>(&'me mut self) -> Result<Option<DieTreeNode<'abbrev, 'unit, 'me, R>>> {
        if self.done {
            return Ok(None);
        }
        if self.tree.move_to_next_at(self.depth)? {
            Ok(Some(DieTreeNode {
                tree: self.tree,
                depth: self.depth + 1,
            }))
        } else {
            self.done = true;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{DebugAddrBase, DebugStrOffsetsBase};
    use crate::constants::*;
    use crate::endianity::LittleEndian;
    use crate::test_util::SectionMethods;
    use test_assembler::{Endian, Label, LabelMaker, Section};

    #[test]
    fn unit_header_v4_dwarf32() {
        let length = Label::new();
        let start = Label::new();
        let end = Label::new();
        let section = Section::with_endian(Endian::Little)
            .D32(&length)
            .mark(&start)
            .L16(4)
            .L32(0x0102_0304)
            .D8(8)
            // One null entry as placeholder DIE data.
            .D8(0)
            .mark(&end);
        length.set_const((&end - &start) as u64);
        let buf = section.get_contents().unwrap();

        let mut input = EndianSlice::new(&buf, LittleEndian);
        let header = UnitHeader::parse(&mut input, DebugInfoOffset(0)).unwrap();
        assert_eq!(header.version(), 4);
        assert_eq!(header.format(), Format::Dwarf32);
        assert_eq!(header.address_size(), 8);
        assert_eq!(header.debug_abbrev_offset(), DebugAbbrevOffset(0x0102_0304));
        assert_eq!(header.unit_type(), UnitType::Compilation);
        assert_eq!(header.header_size(), 4 + 2 + 4 + 1);
        assert_eq!(header.total_length(), buf.len());
    }

    #[test]
    fn unit_header_v4_dwarf64() {
        let length = Label::new();
        let start = Label::new();
        let end = Label::new();
        let section = Section::with_endian(Endian::Little)
            .D32(0xffff_ffff)
            .D64(&length)
            .mark(&start)
            .L16(4)
            .L64(0x0102_0304_0506_0708)
            .D8(8)
            .mark(&end);
        length.set_const((&end - &start) as u64);
        let buf = section.get_contents().unwrap();

        let mut input = EndianSlice::new(&buf, LittleEndian);
        let header = UnitHeader::parse(&mut input, DebugInfoOffset(0)).unwrap();
        assert_eq!(header.format(), Format::Dwarf64);
        assert_eq!(
            header.debug_abbrev_offset(),
            DebugAbbrevOffset(0x0102_0304_0506_0708)
        );
    }

    #[test]
    fn unit_header_v5_skeleton() {
        let length = Label::new();
        let start = Label::new();
        let end = Label::new();
        let section = Section::with_endian(Endian::Little)
            .D32(&length)
            .mark(&start)
            .L16(5)
            .D8(DW_UT_skeleton.0)
            .D8(8)
            .L32(0x0102_0304)
            .L64(0x0506_0708_090a_0b0c)
            .mark(&end);
        length.set_const((&end - &start) as u64);
        let buf = section.get_contents().unwrap();

        let mut input = EndianSlice::new(&buf, LittleEndian);
        let header = UnitHeader::parse(&mut input, DebugInfoOffset(0)).unwrap();
        assert_eq!(header.version(), 5);
        assert_eq!(
            header.unit_type(),
            UnitType::Skeleton(DwoId(0x0506_0708_090a_0b0c))
        );
        assert_eq!(
            header.unit_type().dwo_id(),
            Some(DwoId(0x0506_0708_090a_0b0c))
        );
        assert_eq!(header.header_size(), 4 + 2 + 1 + 1 + 4 + 8);
    }

    #[test]
    fn unit_header_v5_type() {
        let length = Label::new();
        let start = Label::new();
        let end = Label::new();
        let section = Section::with_endian(Endian::Little)
            .D32(&length)
            .mark(&start)
            .L16(5)
            .D8(DW_UT_type.0)
            .D8(4)
            .L32(0)
            .L64(0xdead_beef_dead_beef)
            .L32(0x30)
            .mark(&end);
        length.set_const((&end - &start) as u64);
        let buf = section.get_contents().unwrap();

        let mut input = EndianSlice::new(&buf, LittleEndian);
        let header = UnitHeader::parse(&mut input, DebugInfoOffset(0)).unwrap();
        assert_eq!(
            header.unit_type(),
            UnitType::Type {
                type_signature: DebugTypeSignature(0xdead_beef_dead_beef),
                type_offset: UnitOffset(0x30),
            }
        );
    }

    #[test]
    fn unit_header_bad_version() {
        let length = Label::new();
        let start = Label::new();
        let end = Label::new();
        let section = Section::with_endian(Endian::Little)
            .D32(&length)
            .mark(&start)
            .L16(99)
            .L32(0)
            .D8(4)
            .mark(&end);
        length.set_const((&end - &start) as u64);
        let buf = section.get_contents().unwrap();

        let mut input = EndianSlice::new(&buf, LittleEndian);
        assert_eq!(
            UnitHeader::parse(&mut input, DebugInfoOffset(0)).unwrap_err(),
            Error::UnsupportedVersion(99)
        );
    }

    // Abbrevs: 1 = compile_unit (name), 2 = subprogram (name, sibling),
    // 3 = variable (name); 1 and 2 have children.
    fn tree_abbrevs() -> AbbrevTable {
        #[rustfmt::skip]
        let buf = [
            0x01, 0x11, 0x01,
                0x03, 0x08,
                0x00, 0x00,
            0x02, 0x2e, 0x01,
                0x03, 0x08,
                0x01, 0x13,
                0x00, 0x00,
            0x03, 0x34, 0x00,
                0x03, 0x08,
                0x00, 0x00,
            0x00,
        ];
        DebugAbbrev::new(&buf, LittleEndian)
            .abbreviations(DebugAbbrevOffset(0))
            .unwrap()
    }

    // compile_unit "unit"
    //     subprogram "f1" (sibling -> f2)
    //         variable "v1"
    //     subprogram "f2" (sibling -> after f2)
    //     variable "v2"
    fn tree_info() -> Vec<u8> {
        let length = Label::new();
        let start = Label::new();
        let end = Label::new();
        let f2 = Label::new();
        let after_f2 = Label::new();
        #[rustfmt::skip]
        let section = Section::with_endian(Endian::Little)
            .D32(&length)
            .mark(&start)
            .L16(4)
            .L32(0)
            .D8(4)
            .uleb(1).append_bytes(b"unit\0")
                .uleb(2).append_bytes(b"f1\0").D32(&f2)
                    .uleb(3).append_bytes(b"v1\0")
                    .D8(0)
                .mark(&f2)
                .uleb(2).append_bytes(b"f2\0").D32(&after_f2)
                    .D8(0)
                .mark(&after_f2)
                .uleb(3).append_bytes(b"v2\0")
                .D8(0)
            .mark(&end);
        length.set_const((&end - &start) as u64);
        // Sibling pointers are unit relative; the unit begins the
        // section, so section offsets work directly.
        section.start().set_const(0);
        section.get_contents().unwrap()
    }

    fn die_name<R: Reader>(die: &Die<'_, '_, R>) -> String {
        match die.attr_value(DW_AT_name).unwrap().unwrap() {
            AttributeValue::String(s) => s.to_string().unwrap().into_owned(),
            other => panic!("unexpected name value: {:?}", other),
        }
    }

    #[test]
    fn cursor_walks_depth_first() {
        let info = tree_info();
        let debug_info = DebugInfo::new(&info, LittleEndian);
        let abbrevs = tree_abbrevs();

        let unit = debug_info.units().next().unwrap().unwrap();
        let mut cursor = unit.entries(&abbrevs);

        for (depth, name) in [(0, "unit"), (1, "f1"), (1, "v1"), (-1, "f2"), (0, "v2")] {
            let (delta, die) = cursor.next_dfs().unwrap().unwrap();
            assert_eq!(delta, depth);
            assert_eq!(die_name(die), name);
        }
        assert!(cursor.next_dfs().unwrap().is_none());
    }

    #[test]
    fn cursor_skips_siblings() {
        let info = tree_info();
        let debug_info = DebugInfo::new(&info, LittleEndian);
        let abbrevs = tree_abbrevs();

        let unit = debug_info.units().next().unwrap().unwrap();
        let mut cursor = unit.entries(&abbrevs);

        cursor.next_dfs().unwrap().unwrap();
        let (delta, die) = cursor.next_dfs().unwrap().unwrap();
        assert_eq!(delta, 1);
        assert_eq!(die_name(die), "f1");

        // f1 -> f2 goes through the sibling pointer; v1 is never
        // decoded.
        let die = cursor.next_sibling().unwrap().unwrap();
        assert_eq!(die_name(die), "f2");

        let die = cursor.next_sibling().unwrap().unwrap();
        assert_eq!(die_name(die), "v2");

        assert!(cursor.next_sibling().unwrap().is_none());
        assert!(cursor.next_sibling().unwrap().is_none());
    }

    #[test]
    fn cursor_positions_at_offset() {
        let info = tree_info();
        let debug_info = DebugInfo::new(&info, LittleEndian);
        let abbrevs = tree_abbrevs();
        let unit = debug_info.units().next().unwrap().unwrap();

        let offset = UnitOffset(unit.header_size());
        let mut cursor = unit.entries_at(&abbrevs, offset).unwrap();
        cursor.next_entry().unwrap().unwrap();
        assert_eq!(die_name(cursor.current().unwrap()), "unit");

        let die = unit.die_at(&abbrevs, offset).unwrap();
        assert_eq!(die_name(&die), "unit");

        assert!(unit.die_at(&abbrevs, UnitOffset(0)).is_err());
    }

    #[test]
    fn tree_traversal() {
        let info = tree_info();
        let debug_info = DebugInfo::new(&info, LittleEndian);
        let abbrevs = tree_abbrevs();
        let unit = debug_info.units().next().unwrap().unwrap();

        let mut tree = unit.entries_tree(&abbrevs, None).unwrap();
        let root = tree.root().unwrap();
        assert_eq!(die_name(root.entry()), "unit");

        let mut children = root.children();

        let f1 = children.next().unwrap().unwrap();
        assert_eq!(die_name(f1.entry()), "f1");
        {
            let mut grandchildren = f1.children();
            let v1 = grandchildren.next().unwrap().unwrap();
            assert_eq!(die_name(v1.entry()), "v1");
            assert!(grandchildren.next().unwrap().is_none());
        }

        let f2 = children.next().unwrap().unwrap();
        assert_eq!(die_name(f2.entry()), "f2");
        // f2's (empty) subtree is skipped without visiting it.

        let v2 = children.next().unwrap().unwrap();
        assert_eq!(die_name(v2.entry()), "v2");

        assert!(children.next().unwrap().is_none());
    }

    fn encoding4() -> Encoding {
        Encoding {
            format: Format::Dwarf32,
            version: 4,
            address_size: 4,
        }
    }

    fn encoding5() -> Encoding {
        Encoding {
            format: Format::Dwarf32,
            version: 5,
            address_size: 8,
        }
    }

    fn decode<'input>(
        buf: &'input [u8],
        form: DwForm,
        encoding: Encoding,
    ) -> (
        Attribute<EndianSlice<'input, LittleEndian>>,
        EndianSlice<'input, LittleEndian>,
    ) {
        let spec = AttrSpec::new(DW_AT_low_pc, form, None);
        let mut input = EndianSlice::new(buf, LittleEndian);
        let attr = decode_form(&mut input, encoding, spec).expect("form should decode");
        (attr, input)
    }

    #[test]
    fn decode_fixed_forms() {
        let (attr, rest) = decode(&[0x01, 0x02, 0x03, 0x04, 0x99], DW_FORM_addr, encoding4());
        assert_eq!(attr.raw_value(), AttributeValue::Addr(0x0403_0201));
        assert_eq!(rest.len(), 1);

        let (attr, _) = decode(&[0x01, 0x02, 0x03, 0x04], DW_FORM_sec_offset, encoding4());
        assert_eq!(attr.raw_value(), AttributeValue::SecOffset(0x0403_0201));

        let (attr, _) = decode(&[0x01, 0x02, 0x03, 0x04], DW_FORM_ref4, encoding4());
        assert_eq!(
            attr.raw_value(),
            AttributeValue::UnitRef(UnitOffset(0x0403_0201))
        );
    }

    #[test]
    fn decode_variable_forms() {
        let (attr, rest) = decode(&[0x02, 0x99, 0x99], DW_FORM_block, encoding4());
        match attr.raw_value() {
            AttributeValue::Block(block) => assert_eq!(block.slice(), &[0x99, 0x99]),
            other => panic!("unexpected value: {:?}", other),
        }
        assert!(rest.is_empty());

        let (attr, rest) = decode(&[0x02, 0x99, 0x99, 0x11], DW_FORM_exprloc, encoding4());
        match attr.raw_value() {
            AttributeValue::Exprloc(Expression(data)) => assert_eq!(data.slice(), &[0x99, 0x99]),
            other => panic!("unexpected value: {:?}", other),
        }
        assert_eq!(rest.len(), 1);

        let (attr, rest) = decode(&[0x66, 0x6f, 0x6f, 0x00, 0x99], DW_FORM_string, encoding4());
        match attr.raw_value() {
            AttributeValue::String(s) => assert_eq!(s.slice(), b"foo"),
            other => panic!("unexpected value: {:?}", other),
        }
        assert_eq!(rest.len(), 1);
    }

    #[test]
    fn decode_index_forms() {
        let (attr, _) = decode(&[0x42], DW_FORM_strx1, encoding5());
        assert_eq!(
            attr.raw_value(),
            AttributeValue::DebugStrOffsetsIndex(DebugStrOffsetsIndex(0x42))
        );

        let (attr, _) = decode(&[0x10], DW_FORM_addrx, encoding5());
        assert_eq!(
            attr.raw_value(),
            AttributeValue::DebugAddrIndex(DebugAddrIndex(0x10))
        );
    }

    #[test]
    fn decode_implicit_const() {
        let spec = AttrSpec::new(DW_AT_decl_line, DW_FORM_implicit_const, Some(-42));
        let mut input = EndianSlice::new(&[], LittleEndian);
        let attr = decode_form(&mut input, encoding4(), spec).unwrap();
        assert_eq!(attr.raw_value(), AttributeValue::Sdata(-42));
    }

    #[test]
    fn decode_indirect() {
        // DW_FORM_udata, then the value.
        let (attr, rest) = decode(&[0x0f, 0x83, 0x02], DW_FORM_indirect, encoding4());
        assert_eq!(attr.raw_value(), AttributeValue::Udata(0x103));
        assert!(rest.is_empty());
    }

    #[test]
    fn decode_unknown_form() {
        let spec = AttrSpec::new(DW_AT_low_pc, DwForm(0x3fff), None);
        let mut input = EndianSlice::new(&[], LittleEndian);
        assert_eq!(
            decode_form(&mut input, encoding4(), spec).unwrap_err(),
            Error::UnknownForm(DwForm(0x3fff))
        );
    }

    fn attr(
        name: DwAt,
        value: AttributeValue<EndianSlice<'static, LittleEndian>>,
    ) -> Attribute<EndianSlice<'static, LittleEndian>> {
        Attribute { name, value }
    }

    #[test]
    fn value_normalization() {
        assert_eq!(
            attr(DW_AT_stmt_list, AttributeValue::SecOffset(0x40)).value(),
            AttributeValue::DebugLineRef(DebugLineOffset(0x40))
        );
        assert_eq!(
            attr(DW_AT_ranges, AttributeValue::SecOffset(0x10)).value(),
            AttributeValue::RangeListsRef(RangeListsOffset(0x10))
        );
        assert_eq!(
            attr(DW_AT_location, AttributeValue::SecOffset(0x20)).value(),
            AttributeValue::LocationListsRef(LocationListsOffset(0x20))
        );
        assert_eq!(
            attr(DW_AT_high_pc, AttributeValue::Data4(0x100)).value(),
            AttributeValue::Udata(0x100)
        );
        assert_eq!(
            attr(DW_AT_language, AttributeValue::Data2(DW_LANG_Rust.0)).value(),
            AttributeValue::Language(DW_LANG_Rust)
        );
        assert_eq!(
            attr(DW_AT_str_offsets_base, AttributeValue::SecOffset(8)).value(),
            AttributeValue::DebugStrOffsetsBase(DebugStrOffsetsBase(8))
        );
        assert_eq!(
            attr(DW_AT_addr_base, AttributeValue::SecOffset(8)).value(),
            AttributeValue::DebugAddrBase(DebugAddrBase(8))
        );
    }

    #[test]
    fn constant_conversions() {
        let a = |value| attr(DW_AT_decl_line, value);
        assert_eq!(a(AttributeValue::Data1(42)).udata_value(), Some(42));
        assert_eq!(a(AttributeValue::Udata(42)).udata_value(), Some(42));
        assert_eq!(a(AttributeValue::Sdata(-1)).udata_value(), None);
        assert_eq!(a(AttributeValue::Sdata(-1)).sdata_value(), Some(-1));
        assert_eq!(a(AttributeValue::Data1(0xff)).sdata_value(), Some(-1));
        assert_eq!(a(AttributeValue::Flag(true)).udata_value(), None);
    }

    #[test]
    fn offset_rebasing() {
        let info = tree_info();
        let debug_info = DebugInfo::new(&info, LittleEndian);
        let unit = debug_info.units().next().unwrap().unwrap();

        let unit_offset = UnitOffset(unit.header_size());
        let info_offset = unit_offset.to_debug_info_offset(&unit);
        assert_eq!(info_offset.0, unit.offset().0 + unit.header_size());
        assert_eq!(info_offset.to_unit_offset(&unit), Some(unit_offset));

        let outside = DebugInfoOffset(unit.total_length() + 1);
        assert_eq!(outside.to_unit_offset(&unit), None);
    }

    #[test]
    fn header_lookup_by_offset() {
        let info = tree_info();
        let debug_info = DebugInfo::new(&info, LittleEndian);
        let header = debug_info.header_from_offset(DebugInfoOffset(0)).unwrap();
        assert_eq!(header.version(), 4);
        assert!(debug_info
            .header_from_offset(DebugInfoOffset(info.len() + 1))
            .is_err());
    }
}
