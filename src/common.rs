//! Shared vocabulary: the 32/64-bit format flag, per-unit encoding
//! parameters, and one newtype per section offset so that an offset into
//! one section cannot be used to index another.

/// The width of offsets in a unit: 32-bit DWARF or 64-bit DWARF.
///
/// Note that this is independent of the target address size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Offsets are 4 bytes; the initial length is a plain `u32`.
    Dwarf32,
    /// Offsets are 8 bytes; the initial length starts with the
    /// `0xffff_ffff` escape.
    Dwarf64,
}

impl Format {
    /// The encoded size of an initial length field.
    #[inline]
    pub fn initial_length_size(self) -> u8 {
        match self {
            Format::Dwarf32 => 4,
            Format::Dwarf64 => 12,
        }
    }

    /// The encoded size of a section offset.
    #[inline]
    pub fn word_size(self) -> u8 {
        match self {
            Format::Dwarf32 => 4,
            Format::Dwarf64 => 8,
        }
    }
}

/// The parameters that govern how a unit's data is decoded: offset
/// width, version, and target address size. Copied around by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Encoding {
    /// Target address size in bytes for this unit.
    pub address_size: u8,

    /// 32-bit or 64-bit DWARF.
    pub format: Format,

    /// The unit's DWARF version.
    pub version: u16,
}

/// A DWARF register number, as assigned by the target ABI.
///
/// Encoded as ULEB128 on disk; no supported ABI needs more than 16 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Register(pub u16);

/// Whether a loaded object is a regular executable or a split DWARF
/// (`.dwo`) companion.
///
/// Split DWARF files use different section names and different defaults
/// for the per-unit base offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DwarfFileType {
    /// An executable or relocatable object.
    #[default]
    Main,
    /// A split DWARF object file.
    Dwo,
}

/// The 64-bit id tying a skeleton unit to its split DWARF counterpart
/// (`DW_AT_GNU_dwo_id`, or the header field in DWARF 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DwoId(pub u64);

/// The 8-byte signature of a type unit, as referenced by
/// `DW_FORM_ref_sig8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DebugTypeSignature(pub u64);

macro_rules! offset_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub usize);
    };
}

offset_type!(
    /// An offset into `.debug_abbrev`.
    DebugAbbrevOffset
);
offset_type!(
    /// An offset into `.debug_aranges`.
    DebugArangesOffset
);
offset_type!(
    /// An offset into `.debug_info`.
    DebugInfoOffset
);
offset_type!(
    /// An offset into `.debug_line`.
    DebugLineOffset
);
offset_type!(
    /// An offset into `.debug_line_str`.
    DebugLineStrOffset
);
offset_type!(
    /// An offset into `.debug_str`.
    DebugStrOffset
);
offset_type!(
    /// An offset into `.debug_loc` or `.debug_loclists`, whichever the
    /// referencing unit's version selects.
    LocationListsOffset
);
offset_type!(
    /// An offset into `.debug_ranges` or `.debug_rnglists`, whichever
    /// the referencing unit's version selects.
    RangeListsOffset
);
offset_type!(
    /// An offset into `.debug_frame`.
    DebugFrameOffset
);
offset_type!(
    /// An offset into `.eh_frame`.
    EhFrameOffset
);

impl From<usize> for DebugFrameOffset {
    fn from(offset: usize) -> Self {
        DebugFrameOffset(offset)
    }
}

impl From<usize> for EhFrameOffset {
    fn from(offset: usize) -> Self {
        EhFrameOffset(offset)
    }
}

macro_rules! index_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub usize);
    };
}

index_type!(
    /// An index into the address table selected by a unit's
    /// `DW_AT_addr_base`.
    DebugAddrIndex
);
index_type!(
    /// An index into the offset table selected by a unit's
    /// `DW_AT_loclists_base`.
    DebugLocListsIndex
);
index_type!(
    /// An index into the offset table selected by a unit's
    /// `DW_AT_rnglists_base`.
    DebugRngListsIndex
);
index_type!(
    /// An index into the offset table selected by a unit's
    /// `DW_AT_str_offsets_base`.
    DebugStrOffsetsIndex
);

// The base offsets point at the first entry of a unit's table within the
// owning section, skipping that table's header. When a producer omits the
// base attribute the consumer must assume a default: zero for GNU split
// DWARF (which writes no header), or the header size for DWARF 5.
macro_rules! base_type {
    ($(#[$doc:meta])* $name:ident, $header:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name(pub usize);

        impl $name {
            /// The base to assume when the unit carries no base
            /// attribute.
            pub fn default_for(encoding: Encoding, _file_type: DwarfFileType) -> $name {
                if encoding.version >= 5 {
                    $name(encoding.format.initial_length_size() as usize + $header)
                } else {
                    $name(0)
                }
            }
        }
    };
}

/// A unit's `DW_AT_addr_base`: where its address table starts inside
/// `.debug_addr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugAddrBase(pub usize);

impl DebugAddrBase {
    /// The base to assume when the unit carries no base attribute.
    ///
    /// `.debug_addr` stays in the executable even for split DWARF, and
    /// GNU pre-5 producers index it from the start of the section, so
    /// the file type does not matter here.
    pub fn default_for(encoding: Encoding, _file_type: DwarfFileType) -> DebugAddrBase {
        if encoding.version >= 5 {
            // version, padding, address size, segment selector size
            DebugAddrBase(encoding.format.initial_length_size() as usize + 4)
        } else {
            DebugAddrBase(0)
        }
    }
}

base_type!(
    /// A unit's `DW_AT_loclists_base` inside `.debug_loclists`.
    DebugLocListsBase,
    8 // version, address size, segment selector size, offset count
);
base_type!(
    /// A unit's `DW_AT_rnglists_base` inside `.debug_rnglists`.
    DebugRngListsBase,
    8 // version, address size, segment selector size, offset count
);
base_type!(
    /// A unit's `DW_AT_str_offsets_base` inside `.debug_str_offsets`.
    DebugStrOffsetsBase,
    4 // version, padding
);

/// Names the DWARF sections this crate can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionId {
    /// `.debug_abbrev`
    DebugAbbrev,
    /// `.debug_addr`
    DebugAddr,
    /// `.debug_aranges`
    DebugAranges,
    /// `.debug_frame`
    DebugFrame,
    /// `.eh_frame`
    EhFrame,
    /// `.debug_info`
    DebugInfo,
    /// `.debug_line`
    DebugLine,
    /// `.debug_line_str`
    DebugLineStr,
    /// `.debug_loc`
    DebugLoc,
    /// `.debug_loclists`
    DebugLocLists,
    /// `.debug_ranges`
    DebugRanges,
    /// `.debug_rnglists`
    DebugRngLists,
    /// `.debug_str`
    DebugStr,
    /// `.debug_str_offsets`
    DebugStrOffsets,
}

impl SectionId {
    /// The section's name in an executable or relocatable object.
    pub fn name(self) -> &'static str {
        match self {
            SectionId::DebugAbbrev => ".debug_abbrev",
            SectionId::DebugAddr => ".debug_addr",
            SectionId::DebugAranges => ".debug_aranges",
            SectionId::DebugFrame => ".debug_frame",
            SectionId::EhFrame => ".eh_frame",
            SectionId::DebugInfo => ".debug_info",
            SectionId::DebugLine => ".debug_line",
            SectionId::DebugLineStr => ".debug_line_str",
            SectionId::DebugLoc => ".debug_loc",
            SectionId::DebugLocLists => ".debug_loclists",
            SectionId::DebugRanges => ".debug_ranges",
            SectionId::DebugRngLists => ".debug_rnglists",
            SectionId::DebugStr => ".debug_str",
            SectionId::DebugStrOffsets => ".debug_str_offsets",
        }
    }

    /// The section's name in a split DWARF object, or `None` for
    /// sections that stay in the executable.
    pub fn dwo_name(self) -> Option<&'static str> {
        match self {
            SectionId::DebugAbbrev => Some(".debug_abbrev.dwo"),
            SectionId::DebugInfo => Some(".debug_info.dwo"),
            SectionId::DebugLine => Some(".debug_line.dwo"),
            SectionId::DebugLineStr => Some(".debug_line_str.dwo"),
            SectionId::DebugLoc => Some(".debug_loc.dwo"),
            SectionId::DebugLocLists => Some(".debug_loclists.dwo"),
            SectionId::DebugRngLists => Some(".debug_rnglists.dwo"),
            SectionId::DebugStr => Some(".debug_str.dwo"),
            SectionId::DebugStrOffsets => Some(".debug_str_offsets.dwo"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_field_sizes() {
        assert_eq!(Format::Dwarf32.initial_length_size(), 4);
        assert_eq!(Format::Dwarf64.initial_length_size(), 12);
        assert_eq!(Format::Dwarf32.word_size(), 4);
        assert_eq!(Format::Dwarf64.word_size(), 8);
    }

    #[test]
    fn base_defaults_skip_the_header() {
        let v5 = Encoding {
            format: Format::Dwarf32,
            version: 5,
            address_size: 8,
        };
        assert_eq!(
            DebugAddrBase::default_for(v5, DwarfFileType::Main),
            DebugAddrBase(8)
        );
        assert_eq!(
            DebugStrOffsetsBase::default_for(v5, DwarfFileType::Main),
            DebugStrOffsetsBase(8)
        );
        assert_eq!(
            DebugRngListsBase::default_for(v5, DwarfFileType::Main),
            DebugRngListsBase(12)
        );

        let v4 = Encoding {
            format: Format::Dwarf32,
            version: 4,
            address_size: 8,
        };
        assert_eq!(
            DebugAddrBase::default_for(v4, DwarfFileType::Main),
            DebugAddrBase(0)
        );
        assert_eq!(
            DebugRngListsBase::default_for(v4, DwarfFileType::Dwo),
            DebugRngListsBase(0)
        );
    }
}
