//! `.debug_abbrev`: the tables that give each DIE its shape.
//!
//! A unit header names an offset in this section; the table found there
//! maps abbreviation codes to a tag, a children flag, and the list of
//! attribute name/form pairs every DIE using that code carries.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::common::{DebugAbbrevOffset, Encoding, SectionId};
use crate::constants;
use crate::endianity::Endianity;
use crate::read::{EndianSlice, Error, Reader, Result, Section};

/// The `.debug_abbrev` section.
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugAbbrev<R> {
    section: R,
}

impl<'input, Endian> DebugAbbrev<EndianSlice<'input, Endian>>
where
    Endian: Endianity,
{
    /// Wrap the raw bytes of a loaded `.debug_abbrev` section.
    pub fn new(section: &'input [u8], endian: Endian) -> Self {
        Self::from(EndianSlice::new(section, endian))
    }
}

impl<R: Reader> DebugAbbrev<R> {
    /// Parse the abbreviation table starting at `offset`, which normally
    /// comes out of a unit header.
    pub fn abbreviations(&self, offset: DebugAbbrevOffset) -> Result<AbbrevTable> {
        let mut input = self.section.clone();
        input.skip(offset.0)?;
        AbbrevTable::parse(&mut input)
    }
}

impl<R> Section<R> for DebugAbbrev<R> {
    fn id() -> SectionId {
        SectionId::DebugAbbrev
    }

    fn reader(&self) -> &R
    where
        R: Reader,
    {
        &self.section
    }
}

impl<R> From<R> for DebugAbbrev<R> {
    fn from(section: R) -> Self {
        DebugAbbrev { section }
    }
}

/// One parsed abbreviation table: a code-to-[`Abbrev`] mapping.
#[derive(Debug, Default, Clone)]
pub struct AbbrevTable {
    by_code: HashMap<u64, Abbrev>,
}

impl AbbrevTable {
    /// Look up the abbreviation declared with `code`.
    #[inline]
    pub fn get(&self, code: u64) -> Option<&Abbrev> {
        self.by_code.get(&code)
    }

    // Declarations run until a zero code.
    fn parse<R: Reader>(input: &mut R) -> Result<AbbrevTable> {
        let mut by_code = HashMap::new();
        while let Some(abbrev) = Abbrev::parse(input)? {
            match by_code.entry(abbrev.code) {
                Entry::Occupied(_) => return Err(Error::DuplicateAbbrevCode(abbrev.code)),
                Entry::Vacant(slot) => slot.insert(abbrev),
            };
        }
        Ok(AbbrevTable { by_code })
    }
}

/// A single abbreviation declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abbrev {
    code: u64,
    tag: constants::DwTag,
    has_children: bool,
    attrs: Vec<AttrSpec>,
}

impl Abbrev {
    /// Build an abbreviation by hand. `code` must be nonzero.
    pub fn new(
        code: u64,
        tag: constants::DwTag,
        has_children: bool,
        attrs: Vec<AttrSpec>,
    ) -> Abbrev {
        assert_ne!(code, 0);
        Abbrev {
            code,
            tag,
            has_children,
            attrs,
        }
    }

    /// The code DIEs use to select this abbreviation.
    #[inline]
    pub fn code(&self) -> u64 {
        self.code
    }

    /// The tag of DIEs using this abbreviation.
    #[inline]
    pub fn tag(&self) -> constants::DwTag {
        self.tag
    }

    /// Whether DIEs using this abbreviation own a subtree.
    #[inline]
    pub fn has_children(&self) -> bool {
        self.has_children
    }

    /// The attribute name/form pairs, in on-disk order.
    #[inline]
    pub fn attrs(&self) -> &[AttrSpec] {
        &self.attrs
    }

    fn parse<R: Reader>(input: &mut R) -> Result<Option<Abbrev>> {
        let code = input.read_uleb128()?;
        if code == 0 {
            return Ok(None);
        }

        let tag = input.read_uleb128_u16()?;
        if tag == 0 {
            return Err(Error::NullAbbrevTag);
        }

        let children = constants::DwChildren(input.read_u8()?);
        let has_children = match children {
            constants::DW_CHILDREN_no => false,
            constants::DW_CHILDREN_yes => true,
            other => return Err(Error::InvalidChildrenValue(other)),
        };

        let mut attrs = Vec::new();
        while let Some(spec) = AttrSpec::parse(input)? {
            attrs.push(spec);
        }

        Ok(Some(Abbrev {
            code,
            tag: constants::DwTag(tag),
            has_children,
            attrs,
        }))
    }
}

/// One attribute slot in an abbreviation: which attribute, and how its
/// value is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrSpec {
    name: constants::DwAt,
    form: constants::DwForm,
    implicit_const: Option<i64>,
}

impl AttrSpec {
    /// Build a specification by hand. `implicit_const` must be given
    /// exactly when the form is `DW_FORM_implicit_const`.
    pub fn new(
        name: constants::DwAt,
        form: constants::DwForm,
        implicit_const: Option<i64>,
    ) -> AttrSpec {
        debug_assert_eq!(
            form == constants::DW_FORM_implicit_const,
            implicit_const.is_some()
        );
        AttrSpec {
            name,
            form,
            implicit_const,
        }
    }

    /// The attribute this slot holds.
    #[inline]
    pub fn name(&self) -> constants::DwAt {
        self.name
    }

    /// How the value is encoded.
    #[inline]
    pub fn form(&self) -> constants::DwForm {
        self.form
    }

    /// The value baked into the abbreviation itself, for
    /// `DW_FORM_implicit_const`.
    #[inline]
    pub fn implicit_const(&self) -> Option<i64> {
        self.implicit_const
    }

    /// The encoded size of a value in this form, when the form is fixed
    /// width. Variable-width forms return `None` and must be parsed to
    /// be skipped.
    pub fn fixed_size(&self, encoding: Encoding) -> Option<usize> {
        use crate::constants::*;
        match self.form {
            DW_FORM_implicit_const | DW_FORM_flag_present => Some(0),
            DW_FORM_data1 | DW_FORM_flag | DW_FORM_ref1 | DW_FORM_strx1 | DW_FORM_addrx1 => {
                Some(1)
            }
            DW_FORM_data2 | DW_FORM_ref2 | DW_FORM_strx2 | DW_FORM_addrx2 => Some(2),
            DW_FORM_strx3 | DW_FORM_addrx3 => Some(3),
            DW_FORM_data4 | DW_FORM_ref4 | DW_FORM_ref_sup4 | DW_FORM_strx4 | DW_FORM_addrx4 => {
                Some(4)
            }
            DW_FORM_data8 | DW_FORM_ref8 | DW_FORM_ref_sig8 | DW_FORM_ref_sup8 => Some(8),
            DW_FORM_data16 => Some(16),
            DW_FORM_addr => Some(usize::from(encoding.address_size)),
            DW_FORM_sec_offset | DW_FORM_strp | DW_FORM_line_strp | DW_FORM_strp_sup
            | DW_FORM_GNU_ref_alt | DW_FORM_GNU_strp_alt => {
                Some(usize::from(encoding.format.word_size()))
            }
            // In DWARF 2 a ref_addr was address sized; version 3 changed
            // it to offset sized.
            DW_FORM_ref_addr => {
                if encoding.version == 2 {
                    Some(usize::from(encoding.address_size))
                } else {
                    Some(usize::from(encoding.format.word_size()))
                }
            }
            _ => None,
        }
    }

    fn parse<R: Reader>(input: &mut R) -> Result<Option<AttrSpec>> {
        let name = input.read_uleb128_u16()?;
        let form = input.read_uleb128_u16()?;
        match (name, form) {
            (0, 0) => Ok(None),
            (0, _) => Err(Error::NullAttrName),
            (_, 0) => Err(Error::NullAttrForm),
            _ => {
                let form = constants::DwForm(form);
                let implicit_const = if form == constants::DW_FORM_implicit_const {
                    Some(input.read_sleb128()?)
                } else {
                    None
                };
                Ok(Some(AttrSpec {
                    name: constants::DwAt(name),
                    form,
                    implicit_const,
                }))
            }
        }
    }
}

/// Caches parsed abbreviation tables by section offset.
///
/// Producers typically share one table across every unit, so the cache
/// turns per-unit parsing into a single parse plus lookups.
#[derive(Debug, Default)]
pub struct AbbrevCache {
    tables: Mutex<HashMap<usize, Arc<AbbrevTable>>>,
}

impl AbbrevCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The table at `offset`, parsed at most once.
    pub fn get<R: Reader>(
        &self,
        debug_abbrev: &DebugAbbrev<R>,
        offset: DebugAbbrevOffset,
    ) -> Result<Arc<AbbrevTable>> {
        let mut tables = self.tables.lock().unwrap();
        match tables.entry(offset.0) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(slot) => {
                let table = Arc::new(debug_abbrev.abbreviations(offset)?);
                slot.insert(table.clone());
                Ok(table)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use crate::endianity::LittleEndian;

    #[test]
    fn parses_a_table() {
        #[rustfmt::skip]
        let buf = [
            // Code 1: compile_unit, children, producer/strp + language/data2.
            0x01, 0x11, 0x01, 0x25, 0x0e, 0x13, 0x05, 0x00, 0x00,
            // Code 2: subprogram, no children, name/string.
            0x02, 0x2e, 0x00, 0x03, 0x08, 0x00, 0x00,
            // Table terminator.
            0x00,
        ];

        let table = DebugAbbrev::new(&buf, LittleEndian)
            .abbreviations(DebugAbbrevOffset(0))
            .expect("table should parse");

        let cu = table.get(1).expect("code 1");
        assert_eq!(cu.tag(), DW_TAG_compile_unit);
        assert!(cu.has_children());
        assert_eq!(
            cu.attrs(),
            &[
                AttrSpec::new(DW_AT_producer, DW_FORM_strp, None),
                AttrSpec::new(DW_AT_language, DW_FORM_data2, None),
            ]
        );

        let sub = table.get(2).expect("code 2");
        assert_eq!(sub.tag(), DW_TAG_subprogram);
        assert!(!sub.has_children());

        assert!(table.get(0).is_none());
        assert!(table.get(3).is_none());
    }

    #[test]
    fn implicit_const_is_in_the_abbrev() {
        let buf = [
            0x01, 0x11, 0x00, // compile_unit, no children
            0x13, 0x21, 0x7e, // language, implicit_const, -2
            0x00, 0x00, // end of attrs
            0x00, // end of table
        ];

        let table = DebugAbbrev::new(&buf, LittleEndian)
            .abbreviations(DebugAbbrevOffset(0))
            .expect("table should parse");
        let abbrev = table.get(1).expect("code 1");
        assert_eq!(abbrev.attrs()[0].implicit_const(), Some(-2));
        assert_eq!(abbrev.attrs()[0].fixed_size(test_encoding()), Some(0));
    }

    fn test_encoding() -> Encoding {
        Encoding {
            format: crate::common::Format::Dwarf32,
            version: 4,
            address_size: 8,
        }
    }

    #[test]
    fn duplicate_codes_are_rejected() {
        let buf = [
            0x01, 0x11, 0x00, 0x00, 0x00, //
            0x01, 0x2e, 0x00, 0x00, 0x00, //
            0x00,
        ];
        assert_eq!(
            DebugAbbrev::new(&buf, LittleEndian)
                .abbreviations(DebugAbbrevOffset(0))
                .unwrap_err(),
            Error::DuplicateAbbrevCode(1)
        );
    }

    #[test]
    fn zero_tag_is_rejected() {
        let buf = [0x01, 0x00];
        assert_eq!(
            DebugAbbrev::new(&buf, LittleEndian)
                .abbreviations(DebugAbbrevOffset(0))
                .unwrap_err(),
            Error::NullAbbrevTag
        );
    }

    #[test]
    fn ref_addr_size_depends_on_version() {
        let spec = AttrSpec::new(DW_AT_type, DW_FORM_ref_addr, None);
        let mut encoding = test_encoding();
        assert_eq!(spec.fixed_size(encoding), Some(4));
        encoding.version = 2;
        assert_eq!(spec.fixed_size(encoding), Some(8));
    }

    #[test]
    fn cache_returns_the_same_table() {
        let buf = [0x01, 0x11, 0x00, 0x00, 0x00, 0x00];
        let debug_abbrev = DebugAbbrev::new(&buf, LittleEndian);
        let cache = AbbrevCache::new();
        let first = cache.get(&debug_abbrev, DebugAbbrevOffset(0)).unwrap();
        let second = cache.get(&debug_abbrev, DebugAbbrevOffset(0)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
