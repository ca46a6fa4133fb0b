use std::sync::Arc;

use crate::common::{
    DebugAddrBase, DebugAddrIndex, DebugLocListsBase, DebugRngListsBase, DebugStrOffsetsBase,
    DwarfFileType, DwoId, Encoding, LocationListsOffset, RangeListsOffset, SectionId,
};
use crate::constants;
use crate::read::{
    AbbrevCache, AbbrevTable, AttributeValue, DebugAbbrev, DebugAddr, DebugAranges, DebugInfo,
    DebugLine, DebugLineStr, DebugStr, DebugStrOffsets, Die, DieCursor, DieTree, Error,
    LineProgram, LocListIter, LocationLists, Range, RangeLists, Reader, Result,
    RngListIter, Section, UnitHeader, UnitHeaders, UnitOffset, UnitType,
};

/// All of the commonly used DWARF sections, and other common information.
#[derive(Debug, Default)]
pub struct Dwarf<R> {
    /// The `.debug_abbrev` section.
    pub debug_abbrev: DebugAbbrev<R>,

    /// The `.debug_addr` section.
    pub debug_addr: DebugAddr<R>,

    /// The `.debug_aranges` section.
    pub debug_aranges: DebugAranges<R>,

    /// The `.debug_info` section.
    pub debug_info: DebugInfo<R>,

    /// The `.debug_line` section.
    pub debug_line: DebugLine<R>,

    /// The `.debug_line_str` section.
    pub debug_line_str: DebugLineStr<R>,

    /// The `.debug_str` section.
    pub debug_str: DebugStr<R>,

    /// The `.debug_str_offsets` section.
    pub debug_str_offsets: DebugStrOffsets<R>,

    /// The location lists in the `.debug_loc` and `.debug_loclists`
    /// sections.
    pub locations: LocationLists<R>,

    /// The range lists in the `.debug_ranges` and `.debug_rnglists`
    /// sections.
    pub ranges: RangeLists<R>,

    /// The type of this file.
    pub file_type: DwarfFileType,

    /// The DWARF sections for a supplementary object file.
    pub sup: Option<Arc<Dwarf<R>>>,

    /// A cache of previously parsed abbreviations for units in this
    /// file.
    pub abbreviations_cache: AbbrevCache,
}

impl<R> Dwarf<R> {
    /// Try to load the DWARF sections using the given loader function.
    ///
    /// `section` loads a DWARF section from the object file. It should
    /// return an empty section if the section does not exist.
    ///
    /// After loading, the user should provide support for loading the
    /// supplementary object file and the split DWARF object file as
    /// needed, using [`load_sup`](#method.load_sup) and
    /// [`DwarfFileType`](../enum.DwarfFileType.html).
    ///
    /// ```rust,no_run
    /// # fn example() -> Result<(), dwarfling::Error> {
    /// # type R = dwarfling::EndianSlice<'static, dwarfling::LittleEndian>;
    /// # let get_file_section_reader = |name| -> Result<R, dwarfling::Error> { unimplemented!() };
    /// let loader = |section: dwarfling::SectionId| get_file_section_reader(section.name());
    /// let dwarf = dwarfling::Dwarf::load(loader)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load<F, E>(mut section: F) -> core::result::Result<Self, E>
    where
        F: FnMut(SectionId) -> core::result::Result<R, E>,
    {
        Ok(Dwarf {
            debug_abbrev: Section::load(&mut section)?,
            debug_addr: Section::load(&mut section)?,
            debug_aranges: Section::load(&mut section)?,
            debug_info: Section::load(&mut section)?,
            debug_line: Section::load(&mut section)?,
            debug_line_str: Section::load(&mut section)?,
            debug_str: Section::load(&mut section)?,
            debug_str_offsets: Section::load(&mut section)?,
            locations: LocationLists::new(
                Section::load(&mut section)?,
                Section::load(&mut section)?,
            ),
            ranges: RangeLists::new(Section::load(&mut section)?, Section::load(&mut section)?),
            file_type: DwarfFileType::Main,
            sup: None,
            abbreviations_cache: AbbrevCache::new(),
        })
    }

    /// Load the DWARF sections from the supplementary object file.
    ///
    /// `section` operates the same as for [`load`](#method.load).
    ///
    /// Sets `self.sup`, replacing any previous value.
    pub fn load_sup<F, E>(&mut self, section: F) -> core::result::Result<(), E>
    where
        F: FnMut(SectionId) -> core::result::Result<R, E>,
    {
        self.sup = Some(Arc::new(Self::load(section)?));
        Ok(())
    }

    /// Return a reference to the DWARF sections for the supplementary
    /// object file.
    pub fn sup(&self) -> Option<&Dwarf<R>> {
        self.sup.as_ref().map(Arc::as_ref)
    }
}

impl<R: Reader> Dwarf<R> {
    /// Iterate the unit headers in the `.debug_info` section.
    ///
    /// Can be [used with
    /// `FallibleIterator`](./index.html#using-with-fallibleiterator).
    #[inline]
    pub fn units(&self) -> UnitHeaders<R> {
        self.debug_info.units()
    }

    /// Construct a new `Unit` from the given unit header.
    #[inline]
    pub fn unit(&self, header: UnitHeader<R>) -> Result<Unit<R>> {
        Unit::new(self, header)
    }

    /// Parse the abbreviations for a compilation unit.
    #[inline]
    pub fn abbreviations(&self, unit: &UnitHeader<R>) -> Result<Arc<AbbrevTable>> {
        self.abbreviations_cache
            .get(&self.debug_abbrev, unit.debug_abbrev_offset())
    }

    /// Return the string offset at the given index.
    #[inline]
    pub fn string_offset(
        &self,
        unit: &Unit<R>,
        index: crate::common::DebugStrOffsetsIndex,
    ) -> Result<crate::common::DebugStrOffset> {
        self.debug_str_offsets
            .get_str_offset(unit.header.format(), unit.str_offsets_base, index)
    }

    /// Return the string at the given offset in `.debug_str`.
    #[inline]
    pub fn string(&self, offset: crate::common::DebugStrOffset) -> Result<R> {
        self.debug_str.get_str(offset)
    }

    /// Return the string at the given offset in `.debug_line_str`.
    #[inline]
    pub fn line_string(&self, offset: crate::common::DebugLineStrOffset) -> Result<R> {
        self.debug_line_str.get_str(offset)
    }

    /// Try to return an attribute value as a string slice.
    ///
    /// If the attribute value is one of:
    ///
    /// - an inline `DW_FORM_string` string
    /// - a `DW_FORM_strp` reference to an offset into the `.debug_str`
    ///   section
    /// - a `DW_FORM_strp_sup` reference to an offset into a
    ///   supplementary object file
    /// - a `DW_FORM_line_strp` reference to an offset into the
    ///   `.debug_line_str` section
    /// - a `DW_FORM_strx` index into the `.debug_str_offsets` entries
    ///   for the unit
    ///
    /// then return the attribute's string value. Returns an error if the
    /// attribute value does not have a string form, or if a string form
    /// has an invalid value.
    pub fn attr_string(&self, unit: &Unit<R>, attr: AttributeValue<R>) -> Result<R> {
        match attr {
            AttributeValue::String(string) => Ok(string),
            AttributeValue::DebugStrRef(offset) => self.debug_str.get_str(offset),
            AttributeValue::DebugStrRefSup(offset) => {
                if let Some(sup) = self.sup() {
                    sup.debug_str.get_str(offset)
                } else {
                    Err(Error::ExpectedStringValue)
                }
            }
            AttributeValue::DebugLineStrRef(offset) => self.debug_line_str.get_str(offset),
            AttributeValue::DebugStrOffsetsIndex(index) => {
                let offset = self.debug_str_offsets.get_str_offset(
                    unit.header.format(),
                    unit.str_offsets_base,
                    index,
                )?;
                self.debug_str.get_str(offset)
            }
            _ => Err(Error::ExpectedStringValue),
        }
    }

    /// Return the address at the given index.
    pub fn address(&self, unit: &Unit<R>, index: DebugAddrIndex) -> Result<u64> {
        self.debug_addr
            .get_address(unit.encoding().address_size, unit.addr_base, index)
    }

    /// Try to return an attribute value as an address.
    ///
    /// If the attribute value is one of:
    ///
    /// - a `DW_FORM_addr`
    /// - a `DW_FORM_addrx` index into the `.debug_addr` entries for the
    ///   unit
    ///
    /// then return the address. Returns `None` for other forms.
    pub fn attr_address(&self, unit: &Unit<R>, attr: AttributeValue<R>) -> Result<Option<u64>> {
        match attr {
            AttributeValue::Addr(addr) => Ok(Some(addr)),
            AttributeValue::DebugAddrIndex(index) => self.address(unit, index).map(Some),
            _ => Ok(None),
        }
    }

    /// Try to return an attribute value as a location list offset.
    ///
    /// If the attribute value is one of:
    ///
    /// - a `DW_FORM_sec_offset` reference to the `.debug_loc` or
    ///   `.debug_loclists` sections
    /// - a `DW_FORM_loclistx` index into the `.debug_loclists` entries
    ///   for the unit
    ///
    /// then return the location list offset of the list. Returns `None`
    /// for other forms.
    pub fn attr_locations_offset(
        &self,
        unit: &Unit<R>,
        attr: AttributeValue<R>,
    ) -> Result<Option<LocationListsOffset>> {
        match attr {
            AttributeValue::LocationListsRef(offset) => Ok(Some(offset)),
            AttributeValue::DebugLocListsIndex(index) => self
                .locations
                .get_offset(unit.encoding(), unit.loclists_base, index)
                .map(Some),
            _ => Ok(None),
        }
    }

    /// Try to return an attribute value as a location list entry
    /// iterator.
    ///
    /// If the attribute value is one of the location list forms, then
    /// return an iterator over the entries in the location list.
    /// Returns `None` for other forms.
    pub fn attr_locations(
        &self,
        unit: &Unit<R>,
        attr: AttributeValue<R>,
    ) -> Result<Option<LocListIter<R>>> {
        match self.attr_locations_offset(unit, attr)? {
            Some(offset) => self.locations(unit, offset).map(Some),
            None => Ok(None),
        }
    }

    /// Iterate over the `LocationListEntry`s starting at the given
    /// offset.
    pub fn locations(&self, unit: &Unit<R>, offset: LocationListsOffset) -> Result<LocListIter<R>> {
        self.locations.locations(
            offset,
            unit.encoding(),
            unit.low_pc,
            &self.debug_addr,
            unit.addr_base,
        )
    }

    /// Try to return an attribute value as a range list offset.
    ///
    /// If the attribute value is one of:
    ///
    /// - a `DW_FORM_sec_offset` reference to the `.debug_ranges` or
    ///   `.debug_rnglists` sections
    /// - a `DW_FORM_rnglistx` index into the `.debug_rnglists` entries
    ///   for the unit
    ///
    /// then return the range list offset of the list. Returns `None` for
    /// other forms.
    pub fn attr_ranges_offset(
        &self,
        unit: &Unit<R>,
        attr: AttributeValue<R>,
    ) -> Result<Option<RangeListsOffset>> {
        match attr {
            AttributeValue::RangeListsRef(offset) => Ok(Some(offset)),
            AttributeValue::DebugRngListsIndex(index) => self
                .ranges
                .get_offset(unit.encoding(), unit.rnglists_base, index)
                .map(Some),
            _ => Ok(None),
        }
    }

    /// Try to return an attribute value as a range list entry iterator.
    ///
    /// If the attribute value is one of the range list forms, then
    /// return an iterator over the entries in the range list. Returns
    /// `None` for other forms.
    pub fn attr_ranges(
        &self,
        unit: &Unit<R>,
        attr: AttributeValue<R>,
    ) -> Result<Option<RngListIter<R>>> {
        match self.attr_ranges_offset(unit, attr)? {
            Some(offset) => self.ranges(unit, offset).map(Some),
            None => Ok(None),
        }
    }

    /// Iterate over the `Range`s starting at the given offset.
    pub fn ranges(&self, unit: &Unit<R>, offset: RangeListsOffset) -> Result<RngListIter<R>> {
        self.ranges.ranges(
            offset,
            unit.encoding(),
            unit.low_pc,
            &self.debug_addr,
            unit.addr_base,
        )
    }

    /// Return an iterator for the address ranges of a
    /// `Die`.
    ///
    /// This uses `DW_AT_low_pc`, `DW_AT_high_pc` and `DW_AT_ranges`.
    /// Attributes with unexpected forms are ignored.
    pub fn die_ranges(
        &self,
        unit: &Unit<R>,
        entry: &Die<'_, '_, R>,
    ) -> Result<RangeIter<R>> {
        let mut low_pc = None;
        let mut high_pc = None;
        let mut size = None;
        let mut attrs = entry.attrs();
        while let Some(attr) = attrs.next()? {
            match attr.name() {
                constants::DW_AT_low_pc => {
                    low_pc = self.attr_address(unit, attr.value())?;
                }
                constants::DW_AT_high_pc => {
                    if let Some(addr) = self.attr_address(unit, attr.value())? {
                        high_pc = Some(addr);
                    } else if let Some(val) = attr.udata_value() {
                        size = Some(val);
                    }
                }
                constants::DW_AT_ranges => {
                    if let Some(list) = self.attr_ranges(unit, attr.value())? {
                        return Ok(RangeIter(RangeIterInner::List(list)));
                    }
                }
                _ => {}
            }
        }
        let range = match (low_pc, high_pc, size) {
            (Some(begin), Some(end), _) => Some(Range { begin, end }),
            (Some(begin), _, Some(size)) => Some(Range {
                begin,
                end: begin.checked_add(size).ok_or(Error::AddressOverflow)?,
            }),
            _ => None,
        };
        Ok(RangeIter(RangeIterInner::Single(range)))
    }

    /// Return an iterator for the address ranges of a `Unit`.
    ///
    /// This uses `DW_AT_low_pc`, `DW_AT_high_pc` and `DW_AT_ranges` of
    /// the root `Die`.
    pub fn unit_ranges(&self, unit: &Unit<R>) -> Result<RangeIter<R>> {
        let mut cursor = unit.header.entries(&unit.abbreviations);
        cursor.next_dfs()?.ok_or(Error::MissingUnitDie)?;
        let root = cursor.current().ok_or(Error::MissingUnitDie)?;
        self.die_ranges(unit, root)
    }
}

/// All of the commonly used information for a unit in the `.debug_info`
/// section.
#[derive(Debug)]
pub struct Unit<R: Reader> {
    /// The header of the unit.
    pub header: UnitHeader<R>,

    /// The parsed abbreviations for the unit.
    pub abbreviations: Arc<AbbrevTable>,

    /// The `DW_AT_name` attribute of the unit.
    pub name: Option<R>,

    /// The `DW_AT_comp_dir` attribute of the unit.
    pub comp_dir: Option<R>,

    /// The `DW_AT_low_pc` attribute of the unit. Defaults to 0.
    pub low_pc: u64,

    /// The `DW_AT_str_offsets_base` attribute of the unit. Defaults to 0.
    pub str_offsets_base: DebugStrOffsetsBase,

    /// The `DW_AT_addr_base` attribute of the unit. Defaults to 0.
    pub addr_base: DebugAddrBase,

    /// The `DW_AT_loclists_base` attribute of the unit. Defaults to 0.
    pub loclists_base: DebugLocListsBase,

    /// The `DW_AT_rnglists_base` attribute of the unit. Defaults to 0.
    pub rnglists_base: DebugRngListsBase,

    /// The line number program of the unit.
    pub line_program: Option<LineProgram<R>>,

    /// The DWO ID of a skeleton unit or split compilation unit.
    pub dwo_id: Option<DwoId>,
}

impl<R: Reader> Unit<R> {
    /// Construct a new `Unit` from the given unit header.
    pub fn new(dwarf: &Dwarf<R>, header: UnitHeader<R>) -> Result<Self> {
        let abbreviations = dwarf.abbreviations(&header)?;
        let file_type = dwarf.file_type;
        let encoding = header.encoding();
        let mut unit = Unit {
            abbreviations,
            name: None,
            comp_dir: None,
            low_pc: 0,
            str_offsets_base: DebugStrOffsetsBase::default_for(encoding, file_type),
            addr_base: DebugAddrBase::default_for(encoding, file_type),
            loclists_base: DebugLocListsBase::default_for(encoding, file_type),
            rnglists_base: DebugRngListsBase::default_for(encoding, file_type),
            line_program: None,
            dwo_id: match header.unit_type() {
                UnitType::Skeleton(dwo_id) | UnitType::SplitCompilation(dwo_id) => Some(dwo_id),
                _ => None,
            },
            header,
        };

        let mut name = None;
        let mut comp_dir = None;
        let mut line_program_offset = None;
        let mut low_pc_attr = None;

        {
            let mut cursor = unit.header.entries(&unit.abbreviations);
            cursor.next_dfs()?.ok_or(Error::MissingUnitDie)?;
            let root = cursor.current().ok_or(Error::MissingUnitDie)?;
            let mut attrs = root.attrs();
            while let Some(attr) = attrs.next()? {
                match attr.name() {
                    constants::DW_AT_name => {
                        name = Some(attr.value());
                    }
                    constants::DW_AT_comp_dir => {
                        comp_dir = Some(attr.value());
                    }
                    constants::DW_AT_low_pc => {
                        low_pc_attr = Some(attr.value());
                    }
                    constants::DW_AT_stmt_list => {
                        if let AttributeValue::DebugLineRef(offset) = attr.value() {
                            line_program_offset = Some(offset);
                        }
                    }
                    constants::DW_AT_str_offsets_base => {
                        if let AttributeValue::DebugStrOffsetsBase(base) = attr.value() {
                            unit.str_offsets_base = base;
                        }
                    }
                    constants::DW_AT_addr_base | constants::DW_AT_GNU_addr_base => {
                        if let AttributeValue::DebugAddrBase(base) = attr.value() {
                            unit.addr_base = base;
                        }
                    }
                    constants::DW_AT_rnglists_base | constants::DW_AT_GNU_ranges_base => {
                        if let AttributeValue::DebugRngListsBase(base) = attr.value() {
                            unit.rnglists_base = base;
                        }
                    }
                    constants::DW_AT_loclists_base => {
                        if let AttributeValue::DebugLocListsBase(base) = attr.value() {
                            unit.loclists_base = base;
                        }
                    }
                    constants::DW_AT_GNU_dwo_id => {
                        if unit.dwo_id.is_none() {
                            if let AttributeValue::DwoId(dwo_id) = attr.value() {
                                unit.dwo_id = Some(dwo_id);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        unit.name = match name {
            Some(val) => dwarf.attr_string(&unit, val).ok(),
            None => None,
        };
        unit.comp_dir = match comp_dir {
            Some(val) => dwarf.attr_string(&unit, val).ok(),
            None => None,
        };
        if let Some(val) = low_pc_attr {
            if let Some(addr) = dwarf.attr_address(&unit, val)? {
                unit.low_pc = addr;
            }
        }
        if let Some(offset) = line_program_offset {
            unit.line_program = Some(dwarf.debug_line.program(
                offset,
                unit.header.address_size(),
                unit.comp_dir.clone(),
                unit.name.clone(),
            )?);
        }

        Ok(unit)
    }

    /// Return the encoding parameters for this unit.
    #[inline]
    pub fn encoding(&self) -> Encoding {
        self.header.encoding()
    }

    /// Read the `Die` at the given offset.
    pub fn entry(
        &self,
        offset: UnitOffset,
    ) -> Result<Die<'_, '_, R>> {
        self.header.die_at(&self.abbreviations, offset)
    }

    /// Navigate this unit's `Die`s.
    #[inline]
    pub fn entries(&self) -> DieCursor<'_, '_, R> {
        self.header.entries(&self.abbreviations)
    }

    /// Navigate this unit's `Die`s starting at the
    /// given offset.
    #[inline]
    pub fn entries_at(&self, offset: UnitOffset) -> Result<DieCursor<'_, '_, R>> {
        self.header.entries_at(&self.abbreviations, offset)
    }

    /// Navigate this unit's `Die`s as a tree
    /// starting at the given offset.
    #[inline]
    pub fn entries_tree(&self, offset: Option<UnitOffset>) -> Result<DieTree<'_, '_, R>> {
        self.header.entries_tree(&self.abbreviations, offset)
    }
}

#[derive(Debug)]
enum RangeIterInner<R: Reader> {
    Single(Option<Range>),
    List(RngListIter<R>),
}

/// An iterator for the address ranges of a
/// `Die`.
///
/// Returned by `Dwarf::die_ranges` and `Dwarf::unit_ranges`.
#[derive(Debug)]
pub struct RangeIter<R: Reader>(RangeIterInner<R>);

impl<R: Reader> Default for RangeIter<R> {
    fn default() -> Self {
        RangeIter(RangeIterInner::Single(None))
    }
}

impl<R: Reader> RangeIter<R> {
    /// Advance the iterator to the next range.
    pub fn next(&mut self) -> Result<Option<Range>> {
        match self.0 {
            RangeIterInner::Single(ref mut range) => Ok(range.take()),
            RangeIterInner::List(ref mut list) => list.next(),
        }
    }
}

#[cfg(feature = "fallible-iterator")]
impl<R: Reader> fallible_iterator::FallibleIterator for RangeIter<R> {
    type Item = Range;
    type Error = Error;

    fn next(&mut self) -> ::core::result::Result<Option<Self::Item>, Self::Error> {
        RangeIter::next(self)
    }
}
