//! Call frame information: the `.debug_frame` and `.eh_frame` sections.
//!
//! Both sections hold a sequence of entries. A Common Information Entry
//! (CIE) holds state shared between many Frame Description Entries
//! (FDEs); each FDE describes, for one contiguous address range, how to
//! compute the canonical frame address and recover the caller's
//! registers. The two sections share most of their structure but differ
//! in a handful of encoding details, which the [`UnwindSection`] trait
//! captures.

use core::fmt::Debug;
use core::mem;

use crate::common::{DebugFrameOffset, EhFrameOffset, Encoding, Format, Register, SectionId};
use crate::constants;
use crate::endianity::Endianity;
use crate::read::reader::cast_offset;
use crate::read::{EndianSlice, Error, Expression, Reader, Result, Section};

/// The `.debug_frame` section.
///
/// The useful methods live on the [`UnwindSection`] trait, which this
/// type shares with [`EhFrame`]. `.debug_frame` carries strictly more
/// information than `.eh_frame`, but unlike `.eh_frame` it is routinely
/// stripped from shipped binaries.
#[derive(Debug, Clone, Copy)]
pub struct DebugFrame<R> {
    section: R,
    address_size: u8,
}

impl<'input, Endian> DebugFrame<EndianSlice<'input, Endian>>
where
    Endian: Endianity,
{
    /// Wrap the raw bytes of a loaded `.debug_frame` section.
    ///
    /// Getting those bytes out of the object file is the caller's
    /// business, via whatever ELF or Mach-O loader is in use.
    ///
    /// ```
    /// use dwarfling::{DebugFrame, NativeEndian};
    ///
    /// // Use with `.debug_frame`
    /// # let buf = [0x00, 0x01, 0x02, 0x03];
    /// # let read_debug_frame_section_somehow = || &buf;
    /// let debug_frame = DebugFrame::new(read_debug_frame_section_somehow(), NativeEndian);
    /// ```
    pub fn new(section: &'input [u8], endian: Endian) -> Self {
        Self::from(EndianSlice::new(section, endian))
    }
}

impl<R> DebugFrame<R> {
    /// Set the size of a target address in bytes.
    ///
    /// This defaults to the native word size. This is only used if a CIE
    /// version does not specify the address size itself.
    pub fn set_address_size(&mut self, address_size: u8) {
        self.address_size = address_size;
    }
}

impl<R> Section<R> for DebugFrame<R> {
    fn id() -> SectionId {
        SectionId::DebugFrame
    }

    fn reader(&self) -> &R
    where
        R: Reader,
    {
        &self.section
    }
}

impl<R> From<R> for DebugFrame<R> {
    fn from(section: R) -> Self {
        // Default to the native word size.
        DebugFrame {
            section,
            address_size: mem::size_of::<usize>() as u8,
        }
    }
}

/// The `.eh_frame` section: the unwind tables the exception-handling
/// runtime uses, kept loadable at run time.
///
/// The useful methods live on the [`UnwindSection`] trait; see
/// [`DebugFrame`] for how the two sections differ.
#[derive(Debug, Clone, Copy)]
pub struct EhFrame<R> {
    section: R,
    address_size: u8,
}

impl<'input, Endian> EhFrame<EndianSlice<'input, Endian>>
where
    Endian: Endianity,
{
    /// Wrap the raw bytes of a loaded `.eh_frame` section.
    ///
    /// ```
    /// use dwarfling::{EhFrame, NativeEndian};
    ///
    /// # let buf = [0x00, 0x01, 0x02, 0x03];
    /// # let read_eh_frame_section_somehow = || &buf;
    /// let eh_frame = EhFrame::new(read_eh_frame_section_somehow(), NativeEndian);
    /// ```
    pub fn new(section: &'input [u8], endian: Endian) -> Self {
        Self::from(EndianSlice::new(section, endian))
    }
}

impl<R> EhFrame<R> {
    /// Set the size of a target address in bytes.
    ///
    /// This defaults to the native word size.
    pub fn set_address_size(&mut self, address_size: u8) {
        self.address_size = address_size;
    }
}

impl<R> Section<R> for EhFrame<R> {
    fn id() -> SectionId {
        SectionId::EhFrame
    }

    fn reader(&self) -> &R
    where
        R: Reader,
    {
        &self.section
    }
}

impl<R> From<R> for EhFrame<R> {
    fn from(section: R) -> Self {
        // Default to the native word size.
        EhFrame {
            section,
            address_size: mem::size_of::<usize>() as u8,
        }
    }
}

// This has to be `pub` to silence a warning (that is deny(..)'d by
// default) in rustc. Eventually, not having this `pub` will become a
// hard error.
#[doc(hidden)]
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug)]
pub enum CieOffsetEncoding {
    U32,
    U64,
}

// `.debug_frame` version 1 stored the return address register as one
// byte; every later version uses ULEB128.
#[doc(hidden)]
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug)]
pub enum ReturnAddressRegisterEncoding {
    U8,
    Uleb,
}

/// A typed offset into one of the two unwind sections.
//
// A separate trait rather than `Into<usize>` to dodge the blanket
// `Into` impls.
pub trait UnwindOffset: Copy + Debug + Eq + From<usize> {
    /// The plain byte offset.
    fn into(self) -> usize;
}

impl UnwindOffset for DebugFrameOffset {
    #[inline]
    fn into(self) -> usize {
        self.0
    }
}

impl UnwindOffset for EhFrameOffset {
    #[inline]
    fn into(self) -> usize {
        self.0
    }
}

/// This trait completely encapsulates everything that is different
/// between `.eh_frame` and `.debug_frame`, as well as all the bits that
/// can change between DWARF versions.
#[doc(hidden)]
pub trait _UnwindSectionPrivate<R: Reader> {
    /// The section's bytes.
    fn section(&self) -> &R;

    /// Whether this length value is the terminator that ends the
    /// section's entries.
    fn length_value_is_end_of_entries(length: usize) -> bool;

    /// Return true if the given offset if the CIE sentinel, false
    /// otherwise.
    fn is_cie(format: Format, id: u64) -> bool;

    /// Return the CIE offset/ID encoding used by this unwind section with
    /// the given DWARF format.
    fn cie_offset_encoding(format: Format) -> CieOffsetEncoding;

    /// For `.eh_frame`, CIE offsets are relative to the current position.
    /// For `.debug_frame`, they are relative to the start of the section.
    /// We always internally store them relative to the section, so we
    /// handle translating `.eh_frame`'s relative offsets in this method.
    /// If the offset calculation underflows, return `None`.
    fn resolve_cie_offset(&self, base: usize, offset: usize) -> Option<usize>;

    /// Does this version of this unwind section encode address and
    /// segment sizes in its CIEs?
    fn has_address_and_segment_sizes(version: u8) -> bool;

    /// The address size to use if `has_address_and_segment_sizes`
    /// returns false.
    fn address_size(&self) -> u8;

    /// The encoding used for the return address register in this unwind
    /// section's CIEs.
    fn return_address_register_encoding(version: u8) -> ReturnAddressRegisterEncoding;
}

/// What [`DebugFrame`] and [`EhFrame`] have in common: entry
/// iteration, offset lookup, and address-based unwind queries.
pub trait UnwindSection<R: Reader>: Clone + Debug + _UnwindSectionPrivate<R> {
    /// [`DebugFrameOffset`] or [`EhFrameOffset`], matching the
    /// section.
    type Offset: UnwindOffset;

    /// Return true if the given version number is compatible with this
    /// unwind section's entries.
    fn compatible_version(version: u8) -> bool;

    /// Iterate over the `CommonInformationEntry`s and
    /// `FrameDescriptionEntry`s in this `.debug_frame` section.
    ///
    /// Can be [used with
    /// `FallibleIterator`](./index.html#using-with-fallibleiterator).
    fn entries<'bases>(&self, bases: &'bases BaseAddresses) -> CfiEntriesIter<'bases, Self, R> {
        CfiEntriesIter {
            section: self.clone(),
            bases,
            input: self.section().clone(),
        }
    }

    /// Parse the CIE that starts at `offset`.
    fn cie_from_offset(
        &self,
        bases: &BaseAddresses,
        offset: Self::Offset,
    ) -> Result<CommonInformationEntry<R>> {
        let offset = UnwindOffset::into(offset);
        let input = &mut self.section().clone();
        input.skip(offset)?;
        if let Some(entry) = CommonInformationEntry::parse(bases, self, input)? {
            debug_assert_eq!(entry.offset(), offset);
            Ok(entry)
        } else {
            Err(Error::NoEntryAtOffset(offset as u64))
        }
    }

    /// Parse the FDE at `offset`, stopping short of resolving its
    /// CIE.
    fn partial_fde_from_offset<'bases>(
        &self,
        bases: &'bases BaseAddresses,
        offset: Self::Offset,
    ) -> Result<PartialFrameDescriptionEntry<'bases, Self, R>> {
        let offset = UnwindOffset::into(offset);
        let input = &mut self.section().clone();
        input.skip(offset)?;
        match parse_cfi_entry(bases, self, input)? {
            Some(CieOrFde::Fde(partial)) => Ok(partial),
            _ => Err(Error::NoEntryAtOffset(offset as u64)),
        }
    }

    /// Parse the FDE at `offset`, CIE included.
    fn fde_from_offset<F>(
        &self,
        bases: &BaseAddresses,
        offset: Self::Offset,
        get_cie: F,
    ) -> Result<FrameDescriptionEntry<R>>
    where
        F: FnMut(&Self, &BaseAddresses, Self::Offset) -> Result<CommonInformationEntry<R>>,
    {
        let partial = self.partial_fde_from_offset(bases, offset)?;
        partial.parse(get_cie)
    }

    /// The FDE covering `address`, or
    /// `Err(Error::NoUnwindInfoForAddress)` when none does. `get_cie`
    /// resolves CIE pointers as in
    /// [`PartialFrameDescriptionEntry::parse`].
    ///
    /// Every lookup scans the section from the start; cache the result
    /// rather than calling this per frame in a hot path.
    fn fde_for_address<F>(
        &self,
        bases: &BaseAddresses,
        address: u64,
        mut get_cie: F,
    ) -> Result<FrameDescriptionEntry<R>>
    where
        F: FnMut(&Self, &BaseAddresses, Self::Offset) -> Result<CommonInformationEntry<R>>,
    {
        let mut entries = self.entries(bases);
        while let Some(entry) = entries.next()? {
            match entry {
                CieOrFde::Cie(_) => {}
                CieOrFde::Fde(partial) => {
                    let fde = partial.parse(&mut get_cie)?;
                    if fde.contains(address) {
                        return Ok(fde);
                    }
                }
            }
        }
        Err(Error::NoUnwindInfoForAddress)
    }

    /// Look up the FDE covering `address` and evaluate it into the
    /// unwind rules in force there; `Err(Error::NoUnwindInfoForAddress)`
    /// when no FDE covers it.
    ///
    /// ```
    /// use dwarfling::{
    ///     BaseAddresses, EhFrame, EndianSlice, NativeEndian, UnwindContext, UnwindSection,
    /// };
    ///
    /// # fn foo() -> dwarfling::Result<()> {
    /// # let read_eh_frame_section = || unimplemented!();
    /// // Get the `.eh_frame` section from the object file. Alternatively,
    /// // use `DebugFrame` with the `.debug_frame` section of the object file.
    /// let eh_frame = EhFrame::new(read_eh_frame_section(), NativeEndian);
    ///
    /// # let get_frame_pc = || unimplemented!();
    /// // Get the address of the PC for a frame you'd like to unwind.
    /// let address = get_frame_pc();
    ///
    /// // This context is reusable, which cuts down on heap allocations.
    /// let ctx = &mut UnwindContext::new();
    ///
    /// // Optionally provide base addresses for any relative pointers. If a
    /// // base address isn't provided and a pointer is found that is relative
    /// // to it, we will return an `Err`.
    /// # let address_of_eh_frame_section_in_memory = unimplemented!();
    /// # let address_of_text_section_in_memory = unimplemented!();
    /// let bases = BaseAddresses::default()
    ///     .set_cfi(address_of_eh_frame_section_in_memory)
    ///     .set_text(address_of_text_section_in_memory);
    ///
    /// let unwind_info = eh_frame.unwind_info_for_address(
    ///     &bases,
    ///     ctx,
    ///     address,
    ///     EhFrame::cie_from_offset,
    /// )?;
    ///
    /// # let do_stuff_with = |_| unimplemented!();
    /// do_stuff_with(unwind_info);
    /// # unreachable!()
    /// # }
    /// ```
    fn unwind_info_for_address<'ctx, F>(
        &self,
        bases: &BaseAddresses,
        ctx: &'ctx mut UnwindContext<R>,
        address: u64,
        get_cie: F,
    ) -> Result<&'ctx UnwindTableRow<R>>
    where
        F: FnMut(&Self, &BaseAddresses, Self::Offset) -> Result<CommonInformationEntry<R>>,
    {
        let fde = self.fde_for_address(bases, address, get_cie)?;
        fde.unwind_info_for_address(self, bases, ctx, address)
    }
}

impl<R: Reader> _UnwindSectionPrivate<R> for DebugFrame<R> {
    fn section(&self) -> &R {
        &self.section
    }

    fn length_value_is_end_of_entries(_: usize) -> bool {
        false
    }

    fn is_cie(format: Format, id: u64) -> bool {
        match format {
            Format::Dwarf32 => id == 0xffff_ffff,
            Format::Dwarf64 => id == 0xffff_ffff_ffff_ffff,
        }
    }

    fn cie_offset_encoding(format: Format) -> CieOffsetEncoding {
        match format {
            Format::Dwarf32 => CieOffsetEncoding::U32,
            Format::Dwarf64 => CieOffsetEncoding::U64,
        }
    }

    fn resolve_cie_offset(&self, _base: usize, offset: usize) -> Option<usize> {
        Some(offset)
    }

    fn has_address_and_segment_sizes(version: u8) -> bool {
        version == 4
    }

    fn address_size(&self) -> u8 {
        self.address_size
    }

    fn return_address_register_encoding(version: u8) -> ReturnAddressRegisterEncoding {
        if version == 1 {
            ReturnAddressRegisterEncoding::U8
        } else {
            ReturnAddressRegisterEncoding::Uleb
        }
    }
}

impl<R: Reader> UnwindSection<R> for DebugFrame<R> {
    type Offset = DebugFrameOffset;

    fn compatible_version(version: u8) -> bool {
        // Version 1 of `.debug_frame` corresponds to DWARF 2, and then
        // for DWARF 3 and 4, they decided to just match the standard's
        // version.
        matches!(version, 1 | 3 | 4)
    }
}

impl<R: Reader> _UnwindSectionPrivate<R> for EhFrame<R> {
    fn section(&self) -> &R {
        &self.section
    }

    fn length_value_is_end_of_entries(length: usize) -> bool {
        length == 0
    }

    fn is_cie(_: Format, id: u64) -> bool {
        id == 0
    }

    fn cie_offset_encoding(_format: Format) -> CieOffsetEncoding {
        // `.eh_frame` offsets are always 4 bytes, regardless of the DWARF
        // format.
        CieOffsetEncoding::U32
    }

    fn resolve_cie_offset(&self, base: usize, offset: usize) -> Option<usize> {
        base.checked_sub(offset)
    }

    fn has_address_and_segment_sizes(_version: u8) -> bool {
        false
    }

    fn address_size(&self) -> u8 {
        self.address_size
    }

    fn return_address_register_encoding(_version: u8) -> ReturnAddressRegisterEncoding {
        ReturnAddressRegisterEncoding::Uleb
    }
}

impl<R: Reader> UnwindSection<R> for EhFrame<R> {
    type Offset = EhFrameOffset;

    fn compatible_version(version: u8) -> bool {
        version == 1
    }
}

/// Optional base addresses for the relative `DW_EH_PE_*` encoded
/// pointers.
///
/// During CIE/FDE parsing, if a relative pointer is encountered for a
/// base address that is unknown, an `Err` will be returned.
///
/// ```
/// use dwarfling::BaseAddresses;
///
/// # fn foo() {
/// # let address_of_cfi_section_in_memory = unimplemented!();
/// # let address_of_text_section_in_memory = unimplemented!();
/// # let address_of_data_section_in_memory = unimplemented!();
/// let bases = BaseAddresses::default()
///     .set_cfi(address_of_cfi_section_in_memory)
///     .set_text(address_of_text_section_in_memory)
///     .set_data(address_of_data_section_in_memory);
/// # let _ = bases;
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseAddresses {
    /// Where the unwind section itself (`.eh_frame` or `.debug_frame`)
    /// is loaded.
    pub cfi: Option<u64>,

    /// Where `.text` is loaded.
    pub text: Option<u64>,

    /// Where `.data` is loaded.
    pub data: Option<u64>,
}

impl BaseAddresses {
    /// Record where the CFI section is loaded in memory.
    #[inline]
    pub fn set_cfi(mut self, addr: u64) -> Self {
        self.cfi = Some(addr);
        self
    }

    /// Record where the `.text` section is loaded in memory.
    #[inline]
    pub fn set_text(mut self, addr: u64) -> Self {
        self.text = Some(addr);
        self
    }

    /// Record where the `.data` section is loaded in memory.
    #[inline]
    pub fn set_data(mut self, addr: u64) -> Self {
        self.data = Some(addr);
        self
    }
}

/// An iterator over CIE and FDE entries in a `.debug_frame` or
/// `.eh_frame` section.
///
/// Some pointers may be encoded relative to various base addresses. Use
/// the [`BaseAddresses`](./struct.BaseAddresses.html) parameter to
/// provide them. By default, none are provided. If a relative pointer is
/// encountered for a base address that is unknown, an `Err` will be
/// returned and iteration will abort.
///
/// Can be [used with
/// `FallibleIterator`](./index.html#using-with-fallibleiterator).
///
/// ```
/// use dwarfling::{BaseAddresses, EhFrame, EndianSlice, NativeEndian, UnwindSection};
///
/// # fn foo() -> dwarfling::Result<()> {
/// # let read_eh_frame_somehow = || unimplemented!();
/// let eh_frame = EhFrame::new(read_eh_frame_somehow(), NativeEndian);
///
/// # let address_of_eh_frame_section_in_memory = unimplemented!();
/// # let address_of_text_section_in_memory = unimplemented!();
/// // Provide base addresses for relative pointers.
/// let bases = BaseAddresses::default()
///     .set_cfi(address_of_eh_frame_section_in_memory)
///     .set_text(address_of_text_section_in_memory);
///
/// let mut entries = eh_frame.entries(&bases);
///
/// # let do_stuff_with = |_| unimplemented!();
/// while let Some(entry) = entries.next()? {
///     do_stuff_with(entry)
/// }
/// # unreachable!()
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct CfiEntriesIter<'bases, Section, R>
where
    R: Reader,
    Section: UnwindSection<R>,
{
    section: Section,
    bases: &'bases BaseAddresses,
    input: R,
}

impl<'bases, Section, R> CfiEntriesIter<'bases, Section, R>
where
    R: Reader,
    Section: UnwindSection<R>,
{
    /// The next entry, or `None` at the end of the section.
    pub fn next(&mut self) -> Result<Option<CieOrFde<'bases, Section, R>>> {
        if self.input.is_empty() {
            return Ok(None);
        }

        match parse_cfi_entry(self.bases, &self.section, &mut self.input) {
            Err(e) => {
                self.input.empty();
                Err(e)
            }
            Ok(None) => {
                self.input.empty();
                Ok(None)
            }
            Ok(Some(entry)) => Ok(Some(entry)),
        }
    }
}

#[cfg(feature = "fallible-iterator")]
impl<'bases, Section, R> fallible_iterator::FallibleIterator for CfiEntriesIter<'bases, Section, R>
where
    R: Reader,
    Section: UnwindSection<R>,
{
    type Item = CieOrFde<'bases, Section, R>;
    type Error = Error;

    fn next(&mut self) -> ::core::result::Result<Option<Self::Item>, Self::Error> {
        CfiEntriesIter::next(self)
    }
}

/// Either a `CommonInformationEntry` (CIE) or a `FrameDescriptionEntry`
/// (FDE).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CieOrFde<'bases, Section, R>
where
    R: Reader,
    Section: UnwindSection<R>,
{
    /// A CIE.
    Cie(CommonInformationEntry<R>),
    /// An FDE, left partially parsed because finishing it needs its CIE
    /// resolved first.
    Fde(PartialFrameDescriptionEntry<'bases, Section, R>),
}

fn parse_cfi_entry<'bases, Section, R>(
    bases: &'bases BaseAddresses,
    section: &Section,
    input: &mut R,
) -> Result<Option<CieOrFde<'bases, Section, R>>>
where
    R: Reader,
    Section: UnwindSection<R>,
{
    let offset = input.offset_from(section.section());
    let (length, format) = input.read_initial_length()?;

    if Section::length_value_is_end_of_entries(length) {
        return Ok(None);
    }

    let mut rest = input.split(length)?;
    let cie_offset_base = rest.offset_from(section.section());
    let cie_id_or_offset = match Section::cie_offset_encoding(format) {
        CieOffsetEncoding::U32 => rest.read_u32().map(u64::from)?,
        CieOffsetEncoding::U64 => rest.read_u64()?,
    };

    if Section::is_cie(format, cie_id_or_offset) {
        let cie = CommonInformationEntry::parse_rest(offset, length, format, bases, section, rest)?;
        Ok(Some(CieOrFde::Cie(cie)))
    } else {
        let cie_offset = cast_offset(cie_id_or_offset)?;
        let cie_offset = match section.resolve_cie_offset(cie_offset_base, cie_offset) {
            None => return Err(Error::InvalidOffset),
            Some(cie_offset) => cie_offset,
        };

        let fde = PartialFrameDescriptionEntry {
            offset,
            length,
            format,
            cie_offset: cie_offset.into(),
            rest,
            section: section.clone(),
            bases,
        };

        Ok(Some(CieOrFde::Fde(fde)))
    }
}

/// A parsed `.eh_frame` `z`-style augmentation string, as specified by
/// the Linux Standard Base.
///
/// The string is a sequence of flag characters; each one announces a
/// field in the CIE's (and sometimes each FDE's) augmentation data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Augmentation {
    /// `L`: every FDE's augmentation data carries the address of its
    /// language-specific data area, in this pointer encoding.
    lsda: Option<constants::DwEhPe>,

    /// `P`: the CIE's augmentation data carries the personality
    /// routine's address, stored here along with its pointer encoding.
    personality: Option<(constants::DwEhPe, Pointer)>,

    /// `R`: the FDEs encode their address fields with this pointer
    /// encoding instead of plain target addresses.
    fde_address_encoding: Option<constants::DwEhPe>,

    /// `S`: this CIE's FDEs are signal handler trampolines.
    is_signal_trampoline: bool,
}

impl Augmentation {
    fn parse<Section, R>(
        augmentation_str: &mut R,
        bases: &BaseAddresses,
        address_size: u8,
        section: &Section,
        input: &mut R,
    ) -> Result<Augmentation>
    where
        R: Reader,
        Section: UnwindSection<R>,
    {
        debug_assert!(
            !augmentation_str.is_empty(),
            "Augmentation::parse should only be called if we have an augmentation"
        );

        let first = augmentation_str.read_u8()?;
        if first != b'z' {
            return Err(Error::UnknownAugmentation);
        }

        let mut augmentation = Augmentation::default();

        let augmentation_length = input.read_uleb128_usize()?;
        let rest = &mut input.split(augmentation_length)?;

        while !augmentation_str.is_empty() {
            let ch = augmentation_str.read_u8()?;
            match ch {
                b'L' => {
                    let encoding = parse_pointer_encoding(rest)?;
                    augmentation.lsda = Some(encoding);
                }
                b'P' => {
                    let encoding = parse_pointer_encoding(rest)?;
                    let parameters = PointerEncodingParameters {
                        bases,
                        func_base: None,
                        address_size,
                        section: section.section(),
                    };

                    let personality = parse_encoded_pointer(encoding, &parameters, rest)?;
                    augmentation.personality = Some((encoding, personality));
                }
                b'R' => {
                    let encoding = parse_pointer_encoding(rest)?;
                    augmentation.fde_address_encoding = Some(encoding);
                }
                b'S' => augmentation.is_signal_trampoline = true,
                _ => return Err(Error::UnknownAugmentation),
            }
        }

        Ok(augmentation)
    }
}

/// Parsed augmentation data for a `FrameDescriptionEntry`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct AugmentationData {
    lsda: Option<Pointer>,
}

impl AugmentationData {
    fn parse<R: Reader>(
        augmentation: &Augmentation,
        parameters: &PointerEncodingParameters<'_, R>,
        input: &mut R,
    ) -> Result<AugmentationData> {
        // In theory, we should be iterating over the original
        // augmentation string, interpreting each character, and reading
        // the appropriate bits out of the augmentation data as we go.
        // However, the only character that defines augmentation data in
        // the FDE is the 'L' character, so we can just check for its
        // presence directly.

        let aug_data_len = input.read_uleb128_usize()?;
        let rest = &mut input.split(aug_data_len)?;
        let mut augmentation_data = AugmentationData::default();
        if let Some(encoding) = augmentation.lsda {
            let lsda = parse_encoded_pointer(encoding, parameters, rest)?;
            augmentation_data.lsda = Some(lsda);
        }
        Ok(augmentation_data)
    }
}

/// The state shared by every FDE that points at this entry: alignment
/// factors, the return address column, and the instructions that set up
/// each row's initial register rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommonInformationEntry<R: Reader> {
    /// Where this entry starts within its section.
    offset: usize,

    /// The entry's length field: the byte count after the field itself.
    length: usize,

    format: Format,

    /// The CFI version, which is numbered independently of the DWARF
    /// standard version.
    version: u8,

    /// The parsed augmentation, when the entry carried one.
    augmentation: Option<Augmentation>,

    /// Target address size in bytes for this CIE and its FDEs.
    address_size: u8,

    /// The factor every advance-location delta is scaled by.
    code_alignment_factor: u64,

    /// The factor the factored-offset instructions are scaled by.
    data_alignment_factor: i64,

    /// Which rule table column holds the return address. Not necessarily
    /// a real machine register.
    return_address_register: Register,

    /// The instructions establishing each register's initial rule,
    /// padded to `length` bytes with `DW_CFA_nop`. Every rule not set
    /// here starts out undefined.
    initial_instructions: R,
}

impl<R: Reader> CommonInformationEntry<R> {
    fn parse<Section: UnwindSection<R>>(
        bases: &BaseAddresses,
        section: &Section,
        input: &mut R,
    ) -> Result<Option<CommonInformationEntry<R>>> {
        let offset = input.offset_from(section.section());
        let (length, format) = input.read_initial_length()?;

        if Section::length_value_is_end_of_entries(length) {
            return Ok(None);
        }

        let mut rest = input.split(length)?;
        let cie_id = match Section::cie_offset_encoding(format) {
            CieOffsetEncoding::U32 => rest.read_u32().map(u64::from)?,
            CieOffsetEncoding::U64 => rest.read_u64()?,
        };

        if !Section::is_cie(format, cie_id) {
            return Err(Error::BadCieId(cie_id));
        }

        let entry = Self::parse_rest(offset, length, format, bases, section, rest)?;
        Ok(Some(entry))
    }

    fn parse_rest<Section: UnwindSection<R>>(
        offset: usize,
        length: usize,
        format: Format,
        bases: &BaseAddresses,
        section: &Section,
        mut rest: R,
    ) -> Result<CommonInformationEntry<R>> {
        let version = rest.read_u8()?;
        if !Section::compatible_version(version) {
            return Err(Error::UnsupportedVersion(u16::from(version)));
        }

        let mut augmentation_string = rest.read_cstr()?;

        let address_size = if Section::has_address_and_segment_sizes(version) {
            let address_size = rest.read_u8()?;
            let segment_size = rest.read_u8()?;
            if segment_size != 0 {
                return Err(Error::NonZeroSegmentSize(segment_size));
            }
            address_size
        } else {
            section.address_size()
        };
        if !matches!(address_size, 1 | 2 | 4 | 8) {
            return Err(Error::UnsupportedAddressSize(address_size));
        }

        let code_alignment_factor = rest.read_uleb128()?;
        let data_alignment_factor = rest.read_sleb128()?;

        let return_address_register = match Section::return_address_register_encoding(version) {
            ReturnAddressRegisterEncoding::U8 => Register(rest.read_u8()?.into()),
            ReturnAddressRegisterEncoding::Uleb => {
                rest.read_uleb128().and_then(Register::from_u64)?
            }
        };

        let augmentation = if augmentation_string.is_empty() {
            None
        } else {
            Some(Augmentation::parse(
                &mut augmentation_string,
                bases,
                address_size,
                section,
                &mut rest,
            )?)
        };

        let entry = CommonInformationEntry {
            offset,
            length,
            format,
            version,
            augmentation,
            address_size,
            code_alignment_factor,
            data_alignment_factor,
            return_address_register,
            initial_instructions: rest,
        };

        Ok(entry)
    }
}

/// # Signal Safe Methods
///
/// These methods are guaranteed not to allocate, acquire locks, or
/// perform any other signal-unsafe operations.
impl<R: Reader> CommonInformationEntry<R> {
    /// Get the offset of this entry from the start of its containing
    /// section.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Return the encoding parameters for this CIE.
    pub fn encoding(&self) -> Encoding {
        Encoding {
            format: self.format,
            version: u16::from(self.version),
            address_size: self.address_size,
        }
    }

    /// The size of addresses (in bytes) in this CIE.
    pub fn address_size(&self) -> u8 {
        self.address_size
    }

    /// Walk the instructions that set up this CIE's initial register
    /// rules.
    ///
    /// Can be [used with
    /// `FallibleIterator`](./index.html#using-with-fallibleiterator).
    pub fn instructions<'a, Section>(
        &self,
        section: &'a Section,
        bases: &'a BaseAddresses,
    ) -> CallFrameInstructionIter<'a, R>
    where
        Section: UnwindSection<R>,
    {
        CallFrameInstructionIter {
            input: self.initial_instructions.clone(),
            address_encoding: None,
            parameters: PointerEncodingParameters {
                bases,
                func_base: None,
                address_size: self.address_size,
                section: section.section(),
            },
        }
    }

    /// The entry's length field: the byte count after the field
    /// itself.
    pub fn entry_len(&self) -> usize {
        self.length
    }

    /// The CFI version, numbered independently of the DWARF standard
    /// version.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// The parsed augmentation, when the entry carried one. Only the
    /// `.eh_frame` `z`-style augmentations are understood.
    pub fn augmentation(&self) -> Option<&Augmentation> {
        self.augmentation.as_ref()
    }

    /// True if this CIE's FDEs have a LSDA.
    pub fn has_lsda(&self) -> bool {
        self.augmentation.map_or(false, |a| a.lsda.is_some())
    }

    /// Return the encoding of the LSDA address for this CIE's FDEs.
    pub fn lsda_encoding(&self) -> Option<constants::DwEhPe> {
        self.augmentation.and_then(|a| a.lsda)
    }

    /// Return the encoding and address of the personality routine handler
    /// for this CIE's FDEs.
    pub fn personality_with_encoding(&self) -> Option<(constants::DwEhPe, Pointer)> {
        self.augmentation.as_ref().and_then(|a| a.personality)
    }

    /// Return the address of the personality routine handler for this
    /// CIE's FDEs.
    pub fn personality(&self) -> Option<Pointer> {
        self.augmentation
            .as_ref()
            .and_then(|a| a.personality)
            .map(|(_, p)| p)
    }

    /// Return the encoding of the addresses for this CIE's FDEs.
    pub fn fde_address_encoding(&self) -> Option<constants::DwEhPe> {
        self.augmentation.and_then(|a| a.fde_address_encoding)
    }

    /// Whether this CIE's FDEs describe signal handler trampolines.
    pub fn is_signal_trampoline(&self) -> bool {
        self.augmentation.map_or(false, |a| a.is_signal_trampoline)
    }

    /// The factor every advance-location delta is scaled by.
    pub fn code_alignment_factor(&self) -> u64 {
        self.code_alignment_factor
    }

    /// The factor the factored-offset instructions are scaled by.
    pub fn data_alignment_factor(&self) -> i64 {
        self.data_alignment_factor
    }

    /// Which rule table column holds the return address. Not
    /// necessarily a real machine register.
    pub fn return_address_register(&self) -> Register {
        self.return_address_register
    }
}

/// An FDE whose header has been read but whose CIE has not been
/// chased yet; [`PartialFrameDescriptionEntry::parse`] finishes the
/// job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartialFrameDescriptionEntry<'bases, Section, R>
where
    R: Reader,
    Section: UnwindSection<R>,
{
    offset: usize,
    length: usize,
    format: Format,
    cie_offset: Section::Offset,
    rest: R,
    section: Section,
    bases: &'bases BaseAddresses,
}

impl<'bases, Section, R> PartialFrameDescriptionEntry<'bases, Section, R>
where
    R: Reader,
    Section: UnwindSection<R>,
{
    /// Fully parse this FDE.
    ///
    /// You must provide a function to get its associated CIE (either by
    /// parsing it on demand, or looking it up in some table mapping
    /// offsets to CIEs that you've already parsed, etc.)
    ///
    /// ```
    /// use dwarfling::{BaseAddresses, CieOrFde, EhFrame, NativeEndian, UnwindSection};
    ///
    /// # fn foo() -> dwarfling::Result<()> {
    /// # let read_eh_frame_section = || unimplemented!();
    /// let eh_frame = EhFrame::new(read_eh_frame_section(), NativeEndian);
    /// let bases = BaseAddresses::default();
    /// let mut entries = eh_frame.entries(&bases);
    /// while let Some(entry) = entries.next()? {
    ///     match entry {
    ///         CieOrFde::Cie(_) => {}
    ///         CieOrFde::Fde(partial) => {
    ///             // Here, only the FDE's offset within the section and its
    ///             // CIE pointer have been parsed.
    ///             let fde = partial.parse(EhFrame::cie_from_offset)?;
    ///             // Now we have a fully parsed FDE.
    ///         }
    ///     }
    /// }
    /// # unreachable!()
    /// # }
    /// ```
    pub fn parse<F>(&self, get_cie: F) -> Result<FrameDescriptionEntry<R>>
    where
        F: FnMut(&Section, &BaseAddresses, Section::Offset) -> Result<CommonInformationEntry<R>>,
    {
        FrameDescriptionEntry::parse_rest(
            self.offset,
            self.length,
            self.format,
            self.cie_offset,
            self.rest.clone(),
            &self.section,
            self.bases,
            get_cie,
        )
    }
}

/// The unwind rules for one contiguous address range, expressed as
/// instructions that build on an associated CIE.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameDescriptionEntry<R: Reader> {
    /// Where this entry starts within its section.
    offset: usize,

    /// The entry's length field: the byte count after the field itself.
    length: usize,

    format: Format,

    /// The CIE this FDE's pointer field named, already parsed.
    cie: CommonInformationEntry<R>,

    /// The first address this entry covers.
    initial_address: u64,

    /// How many bytes of code this entry covers.
    address_range: u64,

    /// The augmentation fields announced by the CIE, when present.
    augmentation: Option<AugmentationData>,

    /// The row-building instructions, padded to `length` bytes with
    /// `DW_CFA_nop`.
    instructions: R,
}

impl<R: Reader> FrameDescriptionEntry<R> {
    #[allow(clippy::too_many_arguments)]
    fn parse_rest<Section, F>(
        offset: usize,
        length: usize,
        format: Format,
        cie_pointer: Section::Offset,
        mut rest: R,
        section: &Section,
        bases: &BaseAddresses,
        mut get_cie: F,
    ) -> Result<FrameDescriptionEntry<R>>
    where
        Section: UnwindSection<R>,
        F: FnMut(&Section, &BaseAddresses, Section::Offset) -> Result<CommonInformationEntry<R>>,
    {
        let cie = get_cie(section, bases, cie_pointer)?;

        let mut parameters = PointerEncodingParameters {
            bases,
            func_base: None,
            address_size: cie.address_size,
            section: section.section(),
        };

        let (initial_address, address_range) = Self::parse_addresses(&mut rest, &cie, &parameters)?;
        parameters.func_base = Some(initial_address);

        let aug_data = if let Some(ref augmentation) = cie.augmentation {
            Some(AugmentationData::parse(
                augmentation,
                &parameters,
                &mut rest,
            )?)
        } else {
            None
        };

        let entry = FrameDescriptionEntry {
            offset,
            length,
            format,
            cie,
            initial_address,
            address_range,
            augmentation: aug_data,
            instructions: rest,
        };

        Ok(entry)
    }

    fn parse_addresses(
        input: &mut R,
        cie: &CommonInformationEntry<R>,
        parameters: &PointerEncodingParameters<'_, R>,
    ) -> Result<(u64, u64)> {
        let encoding = cie.augmentation().and_then(|a| a.fde_address_encoding);
        if let Some(encoding) = encoding {
            // Ignore indirection.
            let initial_address = parse_encoded_pointer(encoding, parameters, input)?.pointer();

            // Address ranges cannot be relative to anything, so just grab
            // the data format bits from the encoding.
            let address_range = parse_encoded_pointer(encoding.format(), parameters, input)?;
            Ok((initial_address, address_range.pointer()))
        } else {
            let initial_address = input.read_address(cie.address_size)?;
            let address_range = input.read_address(cie.address_size)?;
            Ok((initial_address, address_range))
        }
    }

    /// Return the table of unwind information for this FDE.
    #[inline]
    pub fn rows<'a, 'ctx, Section: UnwindSection<R>>(
        &self,
        section: &'a Section,
        bases: &'a BaseAddresses,
        ctx: &'ctx mut UnwindContext<R>,
    ) -> Result<UnwindTable<'a, 'ctx, R>> {
        UnwindTable::new(section, bases, ctx, self)
    }

    /// Evaluate this FDE's program just far enough to produce the row
    /// covering `address`, or `Err(Error::NoUnwindInfoForAddress)` when
    /// the FDE's rows never reach it.
    pub fn unwind_info_for_address<'ctx, Section: UnwindSection<R>>(
        &self,
        section: &Section,
        bases: &BaseAddresses,
        ctx: &'ctx mut UnwindContext<R>,
        address: u64,
    ) -> Result<&'ctx UnwindTableRow<R>> {
        let mut table = self.rows(section, bases, ctx)?;
        while let Some(row) = table.next_row()? {
            if row.contains(address) {
                return Ok(table.into_current_row().expect("just found a row"));
            }
        }
        Err(Error::NoUnwindInfoForAddress)
    }
}

/// # Signal Safe Methods
///
/// These methods are guaranteed not to allocate, acquire locks, or
/// perform any other signal-unsafe operations.
impl<R: Reader> FrameDescriptionEntry<R> {
    /// Get the offset of this entry from the start of its containing
    /// section.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The CIE this FDE builds on.
    pub fn cie(&self) -> &CommonInformationEntry<R> {
        &self.cie
    }

    /// The entry's length field: the byte count after the field
    /// itself.
    pub fn entry_len(&self) -> usize {
        self.length
    }

    /// Walk this FDE's own instructions. The CIE's initial instructions
    /// are separate; take `fde.cie().instructions()` for those.
    ///
    /// Can be [used with
    /// `FallibleIterator`](./index.html#using-with-fallibleiterator).
    pub fn instructions<'a, Section>(
        &self,
        section: &'a Section,
        bases: &'a BaseAddresses,
    ) -> CallFrameInstructionIter<'a, R>
    where
        Section: UnwindSection<R>,
    {
        CallFrameInstructionIter {
            input: self.instructions.clone(),
            address_encoding: self.cie.augmentation().and_then(|a| a.fde_address_encoding),
            parameters: PointerEncodingParameters {
                bases,
                func_base: None,
                address_size: self.cie.address_size,
                section: section.section(),
            },
        }
    }

    /// The first address this entry covers.
    pub fn initial_address(&self) -> u64 {
        self.initial_address
    }

    /// The first address past this entry's coverage.
    pub fn end_address(&self) -> u64 {
        self.initial_address.wrapping_add(self.address_range)
    }

    /// How many bytes of code this entry covers.
    pub fn len(&self) -> u64 {
        self.address_range
    }

    /// Whether `initial_address() <= address < end_address()`.
    pub fn contains(&self, address: u64) -> bool {
        let start = self.initial_address();
        let end = self.end_address();
        start <= address && address < end
    }

    /// The address of this FDE's language-specific data area (LSDA), if
    /// it has any.
    pub fn lsda(&self) -> Option<Pointer> {
        self.augmentation.as_ref().and_then(|a| a.lsda)
    }

    /// Return true if this FDE's function is a trampoline for a signal
    /// handler.
    #[inline]
    pub fn is_signal_trampoline(&self) -> bool {
        self.cie().is_signal_trampoline()
    }

    /// The personality routine for this FDE's function: the
    /// language-specific hook that cleans a frame up when unwinding
    /// will not resume it.
    #[inline]
    pub fn personality(&self) -> Option<Pointer> {
        self.cie().personality()
    }
}

/// Common context needed when evaluating the call frame unwinding
/// information.
///
/// This structure can be large so it is advisable to place it on the
/// heap. To avoid re-allocating the context multiple times when
/// evaluating multiple CFI programs, it can be reused.
///
/// ```
/// use dwarfling::{UnwindContext, UnwindTable};
///
/// # fn foo<'a>(
/// #     some_fde: dwarfling::FrameDescriptionEntry<
/// #         dwarfling::EndianSlice<'a, dwarfling::LittleEndian>,
/// #     >,
/// #     eh_frame: dwarfling::EhFrame<dwarfling::EndianSlice<'a, dwarfling::LittleEndian>>,
/// #     bases: dwarfling::BaseAddresses,
/// # ) -> dwarfling::Result<()> {
/// // An uninitialized context.
/// let mut ctx = Box::new(UnwindContext::new());
///
/// // Initialize the context by evaluating the CIE's initial instruction
/// // program, and generate the unwind table.
/// let mut table = some_fde.rows(&eh_frame, &bases, &mut ctx)?;
/// while let Some(row) = table.next_row()? {
///     # let _ = row;
///     // Do stuff with each row...
/// }
/// # unreachable!()
/// # }
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnwindContext<R: Reader> {
    // Stack of rows. The last row is the row currently being built by
    // the program. There is always at least one row. The vast majority
    // of CFI programs will only ever have one row on the stack.
    stack: Vec<UnwindTableRow<R>>,

    // If we are evaluating an FDE's instructions, then `is_initialized`
    // will be `true` and `initial_rules` will contain the initial
    // register rules described by the CIE's initial instructions. These
    // rules are used by `DW_CFA_restore`. Otherwise, when we are
    // currently evaluating a CIE's initial instructions,
    // `is_initialized` will be `false` and `initial_rules` is not used.
    initial_rules: RegisterRuleMap<R>,
    is_initialized: bool,
}

impl<R: Reader> Default for UnwindContext<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// # Signal Safe Methods
///
/// These methods are guaranteed not to allocate, acquire locks, or
/// perform any other signal-unsafe operations, if an non-allocating
/// storage is used.
impl<R: Reader> UnwindContext<R> {
    /// A fresh, reusable unwinding context.
    pub fn new() -> UnwindContext<R> {
        let mut ctx = UnwindContext {
            stack: Vec::with_capacity(1),
            initial_rules: Default::default(),
            is_initialized: false,
        };
        ctx.reset();
        ctx
    }

    /// Run the CIE's initial instructions and initialize this
    /// `UnwindContext`.
    fn initialize<Section: UnwindSection<R>>(
        &mut self,
        section: &Section,
        bases: &BaseAddresses,
        cie: &CommonInformationEntry<R>,
    ) -> Result<()> {
        if self.is_initialized {
            self.reset();
        }

        let mut table = UnwindTable::new_for_cie(section, bases, self, cie);
        while table.next_row()?.is_some() {}

        self.save_initial_rules();
        Ok(())
    }

    fn reset(&mut self) {
        self.stack.clear();
        self.stack.push(UnwindTableRow::default());
        debug_assert!(self.stack.last().map_or(false, |row| row.is_default()));

        self.initial_rules.clear();
        self.is_initialized = false;
    }

    fn row(&self) -> &UnwindTableRow<R> {
        self.stack.last().unwrap()
    }

    fn row_mut(&mut self) -> &mut UnwindTableRow<R> {
        self.stack.last_mut().unwrap()
    }

    fn save_initial_rules(&mut self) {
        debug_assert!(!self.is_initialized);
        self.initial_rules = self.stack.last().unwrap().registers.clone();
        self.is_initialized = true;
    }

    fn start_address(&self) -> u64 {
        self.row().start_address
    }

    fn set_start_address(&mut self, start_address: u64) {
        let row = self.row_mut();
        row.start_address = start_address;
    }

    fn set_register_rule(&mut self, register: Register, rule: RegisterRule<R>) {
        let row = self.row_mut();
        row.registers.set(register, rule);
    }

    /// Returns `None` if we have not completed evaluation of a CIE's
    /// initial instructions.
    fn get_initial_rule(&self, register: Register) -> Option<RegisterRule<R>> {
        if !self.is_initialized {
            return None;
        }
        Some(self.initial_rules.get(register))
    }

    fn set_cfa(&mut self, cfa: CfaRule<R>) {
        self.row_mut().cfa = cfa;
    }

    fn cfa_mut(&mut self) -> &mut CfaRule<R> {
        &mut self.row_mut().cfa
    }

    fn push_row(&mut self) {
        let new_row = self.row().clone();
        self.stack.push(new_row);
    }

    fn pop_row(&mut self) {
        debug_assert!(self.stack.len() > 1);
        self.stack.pop();
    }
}

/// Evaluates an FDE's instruction program into [`UnwindTableRow`]s, one
/// row per call to [`UnwindTable::next_row`].
///
/// Conceptually the call frame information describes a table with one
/// row per code address and one column per register (plus the CFA): the
/// cell says how to recover that register's caller-frame value at that
/// address. Writing the table out would dwarf the program it describes,
/// so the format instead encodes instructions that say how each row
/// differs from the previous one; this type replays them.
#[derive(Debug)]
pub struct UnwindTable<'a, 'ctx, R: Reader> {
    code_alignment_factor: u64,
    data_alignment_factor: i64,
    next_start_address: u64,
    last_end_address: u64,
    returned_last_row: bool,
    current_row_valid: bool,
    instructions: CallFrameInstructionIter<'a, R>,
    ctx: &'ctx mut UnwindContext<R>,
}

/// # Signal Safe Methods
///
/// These methods are guaranteed not to allocate, acquire locks, or
/// perform any other signal-unsafe operations.
impl<'a, 'ctx, R: Reader> UnwindTable<'a, 'ctx, R> {
    /// Run `fde`'s CIE initial instructions into `ctx`, then set up to
    /// iterate the FDE's own program.
    pub fn new<Section: UnwindSection<R>>(
        section: &'a Section,
        bases: &'a BaseAddresses,
        ctx: &'ctx mut UnwindContext<R>,
        fde: &FrameDescriptionEntry<R>,
    ) -> Result<UnwindTable<'a, 'ctx, R>> {
        ctx.initialize(section, bases, fde.cie())?;
        Ok(Self::new_for_fde(section, bases, ctx, fde))
    }

    fn new_for_fde<Section: UnwindSection<R>>(
        section: &'a Section,
        bases: &'a BaseAddresses,
        ctx: &'ctx mut UnwindContext<R>,
        fde: &FrameDescriptionEntry<R>,
    ) -> UnwindTable<'a, 'ctx, R> {
        debug_assert!(!ctx.stack.is_empty());
        UnwindTable {
            code_alignment_factor: fde.cie().code_alignment_factor(),
            data_alignment_factor: fde.cie().data_alignment_factor(),
            next_start_address: fde.initial_address(),
            last_end_address: fde.end_address(),
            returned_last_row: false,
            current_row_valid: false,
            instructions: fde.instructions(section, bases),
            ctx,
        }
    }

    fn new_for_cie<Section: UnwindSection<R>>(
        section: &'a Section,
        bases: &'a BaseAddresses,
        ctx: &'ctx mut UnwindContext<R>,
        cie: &CommonInformationEntry<R>,
    ) -> UnwindTable<'a, 'ctx, R> {
        debug_assert!(!ctx.stack.is_empty());
        UnwindTable {
            code_alignment_factor: cie.code_alignment_factor(),
            data_alignment_factor: cie.data_alignment_factor(),
            next_start_address: 0,
            last_end_address: 0,
            returned_last_row: false,
            current_row_valid: false,
            instructions: cie.instructions(section, bases),
            ctx,
        }
    }

    /// Evaluate call frame instructions until the next row of the table
    /// is completed, and return it.
    ///
    /// Unfortunately, this cannot be used with `FallibleIterator` because
    /// of the restricted lifetime of the yielded item.
    pub fn next_row(&mut self) -> Result<Option<&UnwindTableRow<R>>> {
        debug_assert!(!self.ctx.stack.is_empty());
        self.ctx.set_start_address(self.next_start_address);
        self.current_row_valid = false;

        loop {
            match self.instructions.next() {
                Err(e) => return Err(e),

                Ok(None) => {
                    if self.returned_last_row {
                        return Ok(None);
                    }

                    let row = self.ctx.row_mut();
                    row.end_address = self.last_end_address;

                    self.returned_last_row = true;
                    self.current_row_valid = true;
                    return Ok(Some(row));
                }

                Ok(Some(instruction)) => {
                    if self.evaluate(instruction)? {
                        self.current_row_valid = true;
                        return Ok(Some(self.ctx.row()));
                    }
                }
            };
        }
    }

    /// Returns the current row with the lifetime of the context.
    pub fn into_current_row(self) -> Option<&'ctx UnwindTableRow<R>> {
        if self.current_row_valid {
            let ctx: &'ctx UnwindContext<R> = self.ctx;
            Some(ctx.row())
        } else {
            None
        }
    }

    /// Evaluate one call frame instruction. Return `Ok(true)` if the row
    /// is complete, `Ok(false)` otherwise.
    fn evaluate(&mut self, instruction: CallFrameInstruction<R>) -> Result<bool> {
        use crate::read::cfi::CallFrameInstruction::*;

        match instruction {
            // Instructions that complete the current row and advance the
            // address for the next row.
            SetLoc { address } => {
                if address < self.ctx.start_address() {
                    return Err(Error::InvalidAddressRange);
                }

                self.next_start_address = address;
                self.ctx.row_mut().end_address = self.next_start_address;
                return Ok(true);
            }
            AdvanceLoc { delta } => {
                let delta = u64::from(delta)
                    .checked_mul(self.code_alignment_factor)
                    .ok_or(Error::AddressOverflow)?;
                self.next_start_address = self
                    .ctx
                    .start_address()
                    .checked_add(delta)
                    .ok_or(Error::AddressOverflow)?;
                self.ctx.row_mut().end_address = self.next_start_address;
                return Ok(true);
            }

            // Instructions that modify the CFA.
            DefCfa { register, offset } => {
                self.ctx.set_cfa(CfaRule::RegisterAndOffset {
                    register,
                    offset: offset as i64,
                });
            }
            DefCfaSf {
                register,
                factored_offset,
            } => {
                let data_align = self.data_alignment_factor;
                self.ctx.set_cfa(CfaRule::RegisterAndOffset {
                    register,
                    offset: factored_offset.wrapping_mul(data_align),
                });
            }
            DefCfaRegister { register } => {
                if let CfaRule::RegisterAndOffset {
                    register: ref mut reg,
                    ..
                } = *self.ctx.cfa_mut()
                {
                    *reg = register;
                } else {
                    return Err(Error::MisplacedCfiInstruction);
                }
            }
            DefCfaOffset { offset } => {
                if let CfaRule::RegisterAndOffset {
                    offset: ref mut off,
                    ..
                } = *self.ctx.cfa_mut()
                {
                    *off = offset as i64;
                } else {
                    return Err(Error::MisplacedCfiInstruction);
                }
            }
            DefCfaOffsetSf { factored_offset } => {
                if let CfaRule::RegisterAndOffset {
                    offset: ref mut off,
                    ..
                } = *self.ctx.cfa_mut()
                {
                    let data_align = self.data_alignment_factor;
                    *off = factored_offset.wrapping_mul(data_align);
                } else {
                    return Err(Error::MisplacedCfiInstruction);
                }
            }
            DefCfaExpression { expression } => {
                self.ctx.set_cfa(CfaRule::Expression(expression));
            }

            // Instructions that define register rules.
            Undefined { register } => {
                self.ctx
                    .set_register_rule(register, RegisterRule::Undefined);
            }
            SameValue { register } => {
                self.ctx
                    .set_register_rule(register, RegisterRule::SameValue);
            }
            Offset {
                register,
                factored_offset,
            } => {
                let offset = (factored_offset as i64).wrapping_mul(self.data_alignment_factor);
                self.ctx
                    .set_register_rule(register, RegisterRule::Offset(offset));
            }
            OffsetExtendedSf {
                register,
                factored_offset,
            } => {
                let offset = factored_offset.wrapping_mul(self.data_alignment_factor);
                self.ctx
                    .set_register_rule(register, RegisterRule::Offset(offset));
            }
            ValOffset {
                register,
                factored_offset,
            } => {
                let offset = (factored_offset as i64).wrapping_mul(self.data_alignment_factor);
                self.ctx
                    .set_register_rule(register, RegisterRule::ValOffset(offset));
            }
            ValOffsetSf {
                register,
                factored_offset,
            } => {
                let offset = factored_offset.wrapping_mul(self.data_alignment_factor);
                self.ctx
                    .set_register_rule(register, RegisterRule::ValOffset(offset));
            }
            Register {
                dest_register,
                src_register,
            } => {
                self.ctx
                    .set_register_rule(dest_register, RegisterRule::Register(src_register));
            }
            Expression {
                register,
                expression,
            } => {
                let expression = RegisterRule::Expression(expression);
                self.ctx.set_register_rule(register, expression);
            }
            ValExpression {
                register,
                expression,
            } => {
                let expression = RegisterRule::ValExpression(expression);
                self.ctx.set_register_rule(register, expression);
            }
            Restore { register } => {
                let initial_rule = if let Some(rule) = self.ctx.get_initial_rule(register) {
                    rule
                } else {
                    // Can't restore the initial rule when we are
                    // evaluating the initial rules!
                    return Err(Error::MisplacedCfiInstruction);
                };

                self.ctx.set_register_rule(register, initial_rule);
            }

            // Row push and pop instructions.
            RememberState => {
                self.ctx.push_row();
            }
            RestoreState => {
                // The stack always contains the initial row.
                debug_assert!(!self.ctx.stack.is_empty());
                if self.ctx.stack.len() == 1 {
                    return Err(Error::EmptyStateStack);
                }
                // Pop state while preserving current location.
                let start_address = self.ctx.start_address();
                self.ctx.pop_row();
                self.ctx.set_start_address(start_address);
            }

            // GNU Extension. Save the size somewhere so the unwinder can
            // use it when restoring IP.
            ArgsSize { size } => {
                self.ctx.row_mut().saved_args_size = size;
            }

            // No operation.
            Nop => {}
        };

        Ok(false)
    }
}

// We tend to have very few register rules: usually only a couple. Even
// if we have a rule for every register, on x86-64 with SSE and
// everything we're talking about ~100 rules. So rather than keeping the
// rules in a hash map, or a vector indexed by register number (which
// would lead to filling lots of empty entries), we store them as a vec
// of (register number, register rule) pairs.
//
// Additionally, because every register's default rule is implicitly
// `RegisterRule::Undefined`, we never store a register's rule in this
// vec if it is undefined and save a little bit more space and do a
// little fewer comparisons that way.
#[derive(Clone, Debug)]
struct RegisterRuleMap<R: Reader> {
    rules: Vec<(Register, RegisterRule<R>)>,
}

impl<R: Reader> Default for RegisterRuleMap<R> {
    fn default() -> Self {
        RegisterRuleMap {
            rules: Default::default(),
        }
    }
}

/// # Signal Safe Methods
///
/// These methods are guaranteed not to allocate, acquire locks, or
/// perform any other signal-unsafe operations.
impl<R: Reader> RegisterRuleMap<R> {
    fn is_default(&self) -> bool {
        self.rules.is_empty()
    }

    fn get(&self, register: Register) -> RegisterRule<R> {
        self.rules
            .iter()
            .find(|rule| rule.0 == register)
            .map(|r| r.1.clone())
            .unwrap_or(RegisterRule::Undefined)
    }

    fn set(&mut self, register: Register, rule: RegisterRule<R>) {
        if !rule.is_defined() {
            let idx = self
                .rules
                .iter()
                .enumerate()
                .find(|&(_, r)| r.0 == register)
                .map(|(i, _)| i);
            if let Some(idx) = idx {
                self.rules.swap_remove(idx);
            }
            return;
        }

        for r in &mut self.rules {
            if r.0 == register {
                r.1 = rule;
                return;
            }
        }

        self.rules.push((register, rule));
    }

    fn clear(&mut self) {
        self.rules.clear();
    }

    fn iter(&self) -> RegisterRuleIter<'_, R> {
        RegisterRuleIter(self.rules.iter())
    }
}

impl<'a, R> FromIterator<&'a (Register, RegisterRule<R>)> for RegisterRuleMap<R>
where
    R: 'a + Reader,
{
    fn from_iter<T>(iter: T) -> RegisterRuleMap<R>
    where
        T: IntoIterator<Item = &'a (Register, RegisterRule<R>)>,
    {
        let iter = iter.into_iter();
        let mut rules = RegisterRuleMap::default();
        for &(reg, ref rule) in iter {
            rules.set(reg, rule.clone());
        }
        rules
    }
}

impl<R> PartialEq for RegisterRuleMap<R>
where
    R: Reader + PartialEq,
{
    fn eq(&self, rhs: &Self) -> bool {
        for &(reg, ref rule) in &self.rules {
            debug_assert!(rule.is_defined());
            if *rule != rhs.get(reg) {
                return false;
            }
        }

        for &(reg, ref rhs_rule) in &rhs.rules {
            debug_assert!(rhs_rule.is_defined());
            if *rhs_rule != self.get(reg) {
                return false;
            }
        }

        true
    }
}

impl<R> Eq for RegisterRuleMap<R> where R: Reader + Eq {}

/// Iterator over a row's defined register rules, in no set order.
#[derive(Debug, Clone)]
pub struct RegisterRuleIter<'iter, R: Reader>(
    ::core::slice::Iter<'iter, (Register, RegisterRule<R>)>,
);

impl<'iter, R: Reader> Iterator for RegisterRuleIter<'iter, R> {
    type Item = &'iter (Register, RegisterRule<R>);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }
}

/// A row in the virtual unwind table that describes how to find the
/// values of the registers in the *previous* frame for a range of PC
/// addresses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnwindTableRow<R: Reader> {
    start_address: u64,
    end_address: u64,
    saved_args_size: u64,
    cfa: CfaRule<R>,
    registers: RegisterRuleMap<R>,
}

impl<R: Reader> Default for UnwindTableRow<R> {
    fn default() -> Self {
        UnwindTableRow {
            start_address: 0,
            end_address: 0,
            saved_args_size: 0,
            cfa: Default::default(),
            registers: Default::default(),
        }
    }
}

impl<R: Reader> UnwindTableRow<R> {
    fn is_default(&self) -> bool {
        self.start_address == 0
            && self.end_address == 0
            && self.cfa.is_default()
            && self.registers.is_default()
    }

    /// The first address this row covers.
    pub fn start_address(&self) -> u64 {
        self.start_address
    }

    /// The first address past this row: its rules apply for
    /// `start_address() <= pc < end_address()`, the end itself
    /// excluded.
    pub fn end_address(&self) -> u64 {
        self.end_address
    }

    /// Return `true` if the given `address` is within this row's address
    /// range, `false` otherwise.
    pub fn contains(&self, address: u64) -> bool {
        self.start_address <= address && address < self.end_address
    }

    /// Returns the amount of args currently on the stack.
    ///
    /// When unwinding, if the personality function requested a change in
    /// IP, the SP needs to be adjusted by saved_args_size.
    pub fn saved_args_size(&self) -> u64 {
        self.saved_args_size
    }

    /// How to compute the CFA over this row's addresses.
    pub fn cfa(&self) -> &CfaRule<R> {
        &self.cfa
    }

    /// The recovery rule for one register.
    ///
    /// Register numbering is assigned by the target ABI; on x86-64, for
    /// example, 6 is `%rbp`, 7 is `%rsp`, and 16 is the return address
    /// column.
    pub fn register(&self, register: Register) -> RegisterRule<R> {
        self.registers.get(register)
    }

    /// Every defined `(register, rule)` pair, in no particular order.
    /// Registers that never appear are implicitly
    /// [`RegisterRule::Undefined`].
    ///
    /// ```
    /// # use dwarfling::{EndianSlice, LittleEndian, UnwindTableRow};
    /// # fn foo<'input>(unwind_table_row: UnwindTableRow<EndianSlice<'input, LittleEndian>>) {
    /// for &(register, ref rule) in unwind_table_row.registers() {
    ///     // ...
    ///     # drop(register); drop(rule);
    /// }
    /// # }
    /// ```
    pub fn registers(&self) -> RegisterRuleIter<'_, R> {
        self.registers.iter()
    }
}

/// How to compute the canonical frame address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CfaRule<R: Reader> {
    /// The CFA is a register's value plus an offset.
    RegisterAndOffset {
        /// The base register.
        register: Register,
        /// The offset added to its value.
        offset: i64,
    },
    /// The CFA is the result of evaluating this expression.
    Expression(Expression<R>),
}

impl<R: Reader> Default for CfaRule<R> {
    fn default() -> Self {
        CfaRule::RegisterAndOffset {
            register: Register(0),
            offset: 0,
        }
    }
}

impl<R: Reader> CfaRule<R> {
    fn is_default(&self) -> bool {
        match *self {
            CfaRule::RegisterAndOffset { register, offset } => {
                register == Register(0) && offset == 0
            }
            _ => false,
        }
    }
}

/// An entry in the abstract CFI table that describes how to find the
/// value of a register.
///
/// "The register columns contain rules that describe whether a given
/// register has been saved and the rule to find the value for the
/// register in the previous frame."
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegisterRule<R: Reader> {
    /// The previous value is not recoverable; callees are not expected
    /// to preserve this register.
    Undefined,

    /// The register still holds its previous value.
    SameValue,

    /// The previous value is saved in memory at CFA plus this offset.
    Offset(i64),

    /// The previous value *is* CFA plus this offset.
    ValOffset(i64),

    /// The previous value was moved into another register.
    Register(Register),

    /// The previous value is saved at the address this expression
    /// computes.
    Expression(Expression<R>),

    /// The previous value *is* what this expression computes.
    ValExpression(Expression<R>),

    /// The rule comes from the platform ABI, outside the DWARF data.
    Architectural,
}

impl<R: Reader> RegisterRule<R> {
    fn is_defined(&self) -> bool {
        !matches!(*self, RegisterRule::Undefined)
    }
}

/// One decoded call frame instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallFrameInstruction<R: Reader> {
    // Row creation.
    /// `DW_CFA_set_loc`: finish the current row and start the next one
    /// at `address`, carrying every rule over.
    SetLoc {
        /// The next row's start address.
        address: u64,
    },

    /// `DW_CFA_advance_loc` and its 1/2/4-byte-operand forms: finish the
    /// current row and start the next one `delta * code_alignment_factor`
    /// bytes later.
    AdvanceLoc {
        /// The delta, before code alignment scaling.
        delta: u32,
    },

    // CFA definition.
    /// `DW_CFA_def_cfa`: the CFA is now `register + offset`.
    DefCfa {
        /// The base register.
        register: Register,
        /// The offset, already unfactored.
        offset: u64,
    },

    /// `DW_CFA_def_cfa_sf`: like `DefCfa`, with the offset given as a
    /// signed multiple of the data alignment factor.
    DefCfaSf {
        /// The base register.
        register: Register,
        /// The offset, before data alignment scaling.
        factored_offset: i64,
    },

    /// `DW_CFA_def_cfa_register`: swap the CFA rule's base register,
    /// keeping its offset. Only valid while the CFA rule is
    /// register-plus-offset.
    DefCfaRegister {
        /// The new base register.
        register: Register,
    },

    /// `DW_CFA_def_cfa_offset`: replace the CFA rule's offset, keeping
    /// its register. Only valid while the CFA rule is
    /// register-plus-offset.
    DefCfaOffset {
        /// The new offset, already unfactored.
        offset: u64,
    },

    /// `DW_CFA_def_cfa_offset_sf`: like `DefCfaOffset`, with the offset
    /// given as a signed multiple of the data alignment factor.
    DefCfaOffsetSf {
        /// The new offset, before data alignment scaling.
        factored_offset: i64,
    },

    /// `DW_CFA_def_cfa_expression`: the CFA is now the result of
    /// evaluating this expression.
    DefCfaExpression {
        /// The expression that computes the CFA.
        expression: Expression<R>,
    },

    // Register rules.
    /// `DW_CFA_undefined`: the register's previous value is not
    /// recoverable.
    Undefined {
        /// The affected register.
        register: Register,
    },

    /// `DW_CFA_same_value`: the register still holds its previous
    /// value.
    SameValue {
        /// The affected register.
        register: Register,
    },

    /// `DW_CFA_offset` and `DW_CFA_offset_extended`: the register's
    /// previous value is saved at `CFA + factored_offset *
    /// data_alignment_factor`.
    Offset {
        /// The affected register.
        register: Register,
        /// The offset, before data alignment scaling.
        factored_offset: u64,
    },

    /// `DW_CFA_offset_extended_sf`: like `Offset`, with a signed
    /// factored offset.
    OffsetExtendedSf {
        /// The affected register.
        register: Register,
        /// The offset, before data alignment scaling.
        factored_offset: i64,
    },

    /// `DW_CFA_val_offset`: the register's previous value *is*
    /// `CFA + factored_offset * data_alignment_factor`, not stored
    /// there.
    ValOffset {
        /// The affected register.
        register: Register,
        /// The offset, before data alignment scaling.
        factored_offset: u64,
    },

    /// `DW_CFA_val_offset_sf`: like `ValOffset`, with a signed factored
    /// offset.
    ValOffsetSf {
        /// The affected register.
        register: Register,
        /// The offset, before data alignment scaling.
        factored_offset: i64,
    },

    /// `DW_CFA_register`: the register's previous value now lives in
    /// another register.
    Register {
        /// The register whose rule changes.
        dest_register: Register,
        /// The register holding its previous value.
        src_register: Register,
    },

    /// `DW_CFA_expression`: the register's previous value is saved at
    /// the address this expression computes. The CFA is pushed before
    /// the expression runs.
    Expression {
        /// The affected register.
        register: Register,
        /// The expression that computes the save address.
        expression: Expression<R>,
    },

    /// `DW_CFA_val_expression`: the register's previous value *is* what
    /// this expression computes. The CFA is pushed before the expression
    /// runs.
    ValExpression {
        /// The affected register.
        register: Register,
        /// The expression that computes the value.
        expression: Expression<R>,
    },

    /// `DW_CFA_restore` and `DW_CFA_restore_extended`: reset the
    /// register's rule to what the CIE's initial instructions gave it.
    Restore {
        /// The affected register.
        register: Register,
    },

    // Row state.
    /// `DW_CFA_remember_state`: push every current rule onto the
    /// implicit state stack.
    RememberState,

    /// `DW_CFA_restore_state`: pop the implicit state stack into the
    /// current row.
    RestoreState,

    /// `DW_CFA_GNU_args_size`: record how many bytes of outgoing
    /// arguments are currently on the stack.
    ArgsSize {
        /// The outgoing argument area size.
        size: u64,
    },

    /// `DW_CFA_nop`: padding.
    Nop,
}

const CFI_INSTRUCTION_HIGH_BITS_MASK: u8 = 0b1100_0000;
const CFI_INSTRUCTION_LOW_BITS_MASK: u8 = !CFI_INSTRUCTION_HIGH_BITS_MASK;

impl<R: Reader> CallFrameInstruction<R> {
    fn parse(
        input: &mut R,
        address_encoding: Option<constants::DwEhPe>,
        parameters: &PointerEncodingParameters<'_, R>,
    ) -> Result<CallFrameInstruction<R>> {
        let instruction = input.read_u8()?;
        let high_bits = instruction & CFI_INSTRUCTION_HIGH_BITS_MASK;

        if high_bits == constants::DW_CFA_advance_loc.0 {
            let delta = instruction & CFI_INSTRUCTION_LOW_BITS_MASK;
            return Ok(CallFrameInstruction::AdvanceLoc {
                delta: u32::from(delta),
            });
        }

        if high_bits == constants::DW_CFA_offset.0 {
            let register = Register((instruction & CFI_INSTRUCTION_LOW_BITS_MASK).into());
            let offset = input.read_uleb128()?;
            return Ok(CallFrameInstruction::Offset {
                register,
                factored_offset: offset,
            });
        }

        if high_bits == constants::DW_CFA_restore.0 {
            let register = Register((instruction & CFI_INSTRUCTION_LOW_BITS_MASK).into());
            return Ok(CallFrameInstruction::Restore { register });
        }

        debug_assert_eq!(high_bits, 0);
        let instruction = constants::DwCfa(instruction);

        match instruction {
            constants::DW_CFA_nop => Ok(CallFrameInstruction::Nop),

            constants::DW_CFA_set_loc => {
                let address = if let Some(encoding) = address_encoding {
                    parse_encoded_pointer(encoding, parameters, input)?.pointer()
                } else {
                    input.read_address(parameters.address_size)?
                };
                Ok(CallFrameInstruction::SetLoc { address })
            }

            constants::DW_CFA_advance_loc1 => {
                let delta = input.read_u8()?;
                Ok(CallFrameInstruction::AdvanceLoc {
                    delta: u32::from(delta),
                })
            }

            constants::DW_CFA_advance_loc2 => {
                let delta = input.read_u16()?;
                Ok(CallFrameInstruction::AdvanceLoc {
                    delta: u32::from(delta),
                })
            }

            constants::DW_CFA_advance_loc4 => {
                let delta = input.read_u32()?;
                Ok(CallFrameInstruction::AdvanceLoc { delta })
            }

            constants::DW_CFA_offset_extended => {
                let register = input.read_uleb128().and_then(Register::from_u64)?;
                let offset = input.read_uleb128()?;
                Ok(CallFrameInstruction::Offset {
                    register,
                    factored_offset: offset,
                })
            }

            constants::DW_CFA_restore_extended => {
                let register = input.read_uleb128().and_then(Register::from_u64)?;
                Ok(CallFrameInstruction::Restore { register })
            }

            constants::DW_CFA_undefined => {
                let register = input.read_uleb128().and_then(Register::from_u64)?;
                Ok(CallFrameInstruction::Undefined { register })
            }

            constants::DW_CFA_same_value => {
                let register = input.read_uleb128().and_then(Register::from_u64)?;
                Ok(CallFrameInstruction::SameValue { register })
            }

            constants::DW_CFA_register => {
                let dest = input.read_uleb128().and_then(Register::from_u64)?;
                let src = input.read_uleb128().and_then(Register::from_u64)?;
                Ok(CallFrameInstruction::Register {
                    dest_register: dest,
                    src_register: src,
                })
            }

            constants::DW_CFA_remember_state => Ok(CallFrameInstruction::RememberState),

            constants::DW_CFA_restore_state => Ok(CallFrameInstruction::RestoreState),

            constants::DW_CFA_def_cfa => {
                let register = input.read_uleb128().and_then(Register::from_u64)?;
                let offset = input.read_uleb128()?;
                Ok(CallFrameInstruction::DefCfa { register, offset })
            }

            constants::DW_CFA_def_cfa_register => {
                let register = input.read_uleb128().and_then(Register::from_u64)?;
                Ok(CallFrameInstruction::DefCfaRegister { register })
            }

            constants::DW_CFA_def_cfa_offset => {
                let offset = input.read_uleb128()?;
                Ok(CallFrameInstruction::DefCfaOffset { offset })
            }

            constants::DW_CFA_def_cfa_expression => {
                let len = input.read_uleb128_usize()?;
                let expression = input.split(len)?;
                Ok(CallFrameInstruction::DefCfaExpression {
                    expression: Expression(expression),
                })
            }

            constants::DW_CFA_expression => {
                let register = input.read_uleb128().and_then(Register::from_u64)?;
                let len = input.read_uleb128_usize()?;
                let expression = input.split(len)?;
                Ok(CallFrameInstruction::Expression {
                    register,
                    expression: Expression(expression),
                })
            }

            constants::DW_CFA_offset_extended_sf => {
                let register = input.read_uleb128().and_then(Register::from_u64)?;
                let offset = input.read_sleb128()?;
                Ok(CallFrameInstruction::OffsetExtendedSf {
                    register,
                    factored_offset: offset,
                })
            }

            constants::DW_CFA_def_cfa_sf => {
                let register = input.read_uleb128().and_then(Register::from_u64)?;
                let offset = input.read_sleb128()?;
                Ok(CallFrameInstruction::DefCfaSf {
                    register,
                    factored_offset: offset,
                })
            }

            constants::DW_CFA_def_cfa_offset_sf => {
                let offset = input.read_sleb128()?;
                Ok(CallFrameInstruction::DefCfaOffsetSf {
                    factored_offset: offset,
                })
            }

            constants::DW_CFA_val_offset => {
                let register = input.read_uleb128().and_then(Register::from_u64)?;
                let offset = input.read_uleb128()?;
                Ok(CallFrameInstruction::ValOffset {
                    register,
                    factored_offset: offset,
                })
            }

            constants::DW_CFA_val_offset_sf => {
                let register = input.read_uleb128().and_then(Register::from_u64)?;
                let offset = input.read_sleb128()?;
                Ok(CallFrameInstruction::ValOffsetSf {
                    register,
                    factored_offset: offset,
                })
            }

            constants::DW_CFA_val_expression => {
                let register = input.read_uleb128().and_then(Register::from_u64)?;
                let len = input.read_uleb128_usize()?;
                let expression = input.split(len)?;
                Ok(CallFrameInstruction::ValExpression {
                    register,
                    expression: Expression(expression),
                })
            }

            constants::DW_CFA_GNU_args_size => {
                let size = input.read_uleb128()?;
                Ok(CallFrameInstruction::ArgsSize { size })
            }

            constants::DW_CFA_GNU_negative_offset_extended => {
                let register = input.read_uleb128().and_then(Register::from_u64)?;
                let offset = input.read_uleb128()?;
                Ok(CallFrameInstruction::OffsetExtendedSf {
                    register,
                    factored_offset: -(offset as i64),
                })
            }

            otherwise => Err(Error::UnknownCallFrameInstruction(otherwise)),
        }
    }
}

/// Decodes call frame instructions on demand.
///
/// Can be [used with
/// `FallibleIterator`](./index.html#using-with-fallibleiterator).
#[derive(Clone, Debug)]
pub struct CallFrameInstructionIter<'a, R: Reader> {
    input: R,
    address_encoding: Option<constants::DwEhPe>,
    parameters: PointerEncodingParameters<'a, R>,
}

impl<'a, R: Reader> CallFrameInstructionIter<'a, R> {
    /// Decode the next instruction.
    pub fn next(&mut self) -> Result<Option<CallFrameInstruction<R>>> {
        if self.input.is_empty() {
            return Ok(None);
        }

        match CallFrameInstruction::parse(&mut self.input, self.address_encoding, &self.parameters)
        {
            Ok(instruction) => Ok(Some(instruction)),
            Err(e) => {
                self.input.empty();
                Err(e)
            }
        }
    }
}

#[cfg(feature = "fallible-iterator")]
impl<'a, R: Reader> fallible_iterator::FallibleIterator for CallFrameInstructionIter<'a, R> {
    type Item = CallFrameInstruction<R>;
    type Error = Error;

    fn next(&mut self) -> ::core::result::Result<Option<Self::Item>, Self::Error> {
        CallFrameInstructionIter::next(self)
    }
}

/// Parse a `DW_EH_PE_*` pointer encoding.
#[inline]
fn parse_pointer_encoding<R: Reader>(input: &mut R) -> Result<constants::DwEhPe> {
    let eh_pe = input.read_u8()?;
    let eh_pe = constants::DwEhPe(eh_pe);

    if eh_pe.is_valid_encoding() {
        Ok(eh_pe)
    } else {
        Err(Error::InvalidPointerEncoding(eh_pe))
    }
}

/// A decoded pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pointer {
    /// This value is the decoded pointer value.
    Direct(u64),

    /// This value is *not* the pointer value, but points to the address
    /// of where the real pointer value lives. In other words, deref this
    /// pointer to get the real pointer value.
    ///
    /// Chase this pointer at your own risk: do you trust the DWARF data
    /// it came from?
    Indirect(u64),
}

impl Default for Pointer {
    #[inline]
    fn default() -> Self {
        Pointer::Direct(0)
    }
}

impl Pointer {
    #[inline]
    fn new(encoding: constants::DwEhPe, address: u64) -> Pointer {
        if encoding.is_indirect() {
            Pointer::Indirect(address)
        } else {
            Pointer::Direct(address)
        }
    }

    /// Return the direct pointer value.
    #[inline]
    pub fn direct(self) -> Result<u64> {
        match self {
            Pointer::Direct(p) => Ok(p),
            Pointer::Indirect(_) => Err(Error::IndirectPointer),
        }
    }

    /// Return the pointer value, discarding indirectness information.
    #[inline]
    pub fn pointer(self) -> u64 {
        match self {
            Pointer::Direct(p) | Pointer::Indirect(p) => p,
        }
    }
}

#[derive(Clone, Debug)]
struct PointerEncodingParameters<'a, R: Reader> {
    bases: &'a BaseAddresses,
    func_base: Option<u64>,
    address_size: u8,
    section: &'a R,
}

fn parse_encoded_pointer<R: Reader>(
    encoding: constants::DwEhPe,
    parameters: &PointerEncodingParameters<'_, R>,
    input: &mut R,
) -> Result<Pointer> {
    if !encoding.is_valid_encoding() {
        return Err(Error::InvalidPointerEncoding(encoding));
    }

    if encoding == constants::DW_EH_PE_omit {
        return Err(Error::OmitPointer);
    }

    let base = match encoding.application() {
        constants::DW_EH_PE_absptr => 0,
        constants::DW_EH_PE_pcrel => {
            if let Some(section_base) = parameters.bases.cfi {
                let offset_from_section = input.offset_from(parameters.section);
                section_base.wrapping_add(offset_from_section as u64)
            } else {
                return Err(Error::MissingBaseAddress(encoding));
            }
        }
        constants::DW_EH_PE_textrel => {
            if let Some(text) = parameters.bases.text {
                text
            } else {
                return Err(Error::MissingBaseAddress(encoding));
            }
        }
        constants::DW_EH_PE_datarel => {
            if let Some(data) = parameters.bases.data {
                data
            } else {
                return Err(Error::MissingBaseAddress(encoding));
            }
        }
        constants::DW_EH_PE_funcrel => {
            if let Some(func) = parameters.func_base {
                func
            } else {
                return Err(Error::FuncRelativeInBadContext);
            }
        }
        constants::DW_EH_PE_aligned => return Err(Error::UnsupportedPointerEncoding(encoding)),
        _ => unreachable!(),
    };

    let offset = match encoding.format() {
        // Unsigned variants.
        constants::DW_EH_PE_absptr => input.read_address(parameters.address_size),
        constants::DW_EH_PE_uleb128 => input.read_uleb128(),
        constants::DW_EH_PE_udata2 => input.read_u16().map(u64::from),
        constants::DW_EH_PE_udata4 => input.read_u32().map(u64::from),
        constants::DW_EH_PE_udata8 => input.read_u64(),

        // Signed variants. Here we sign extend the values (happens by
        // default when casting a signed integer to a larger range
        // integer in Rust), return them as u64, and rely on wrapping
        // addition to do the right thing when adding these offsets to
        // their bases.
        constants::DW_EH_PE_sleb128 => input.read_sleb128().map(|a| a as u64),
        constants::DW_EH_PE_sdata2 => input.read_i16().map(|a| a as u64),
        constants::DW_EH_PE_sdata4 => input.read_i32().map(|a| a as u64),
        constants::DW_EH_PE_sdata8 => input.read_i64().map(|a| a as u64),

        // That was all of the valid encoding formats.
        _ => unreachable!(),
    }?;

    Ok(Pointer::new(encoding, base.wrapping_add(offset)))
}

#[cfg(test)]
mod tests {
    use test_assembler::{Endian, Label, LabelMaker, Section};

    use super::*;
    use crate::common::Format;
    use crate::constants;
    use crate::endianity::{BigEndian, LittleEndian, NativeEndian};
    use crate::read::EndianSlice;
    use crate::test_util::SectionMethods;

    type DebugFrameCie<'input, E = LittleEndian> = CommonInformationEntry<EndianSlice<'input, E>>;
    type DebugFrameFde<'input, E = LittleEndian> = FrameDescriptionEntry<EndianSlice<'input, E>>;

    /// Extensions for building CFI entries with `test_assembler`.
    ///
    /// Augmented entries are assembled by hand in the tests that need
    /// them; these builders only handle the common unaugmented layout.
    trait CfiSectionMethods: Sized {
        fn cie<'input, E>(self, cie: &mut DebugFrameCie<'input, E>) -> Self
        where
            E: Endianity;
        fn fde<'a, 'input, E, L>(self, cie_offset: L, fde: &mut DebugFrameFde<'input, E>) -> Self
        where
            E: Endianity,
            L: ToLabelOrNum<'a, u64>;
    }

    trait ToLabelOrNum<'a, T> {
        fn to_labelornum(self) -> LabelOrNum<'a, T>;
    }

    enum LabelOrNum<'a, T> {
        Label(&'a Label),
        Num(T),
    }

    impl<'a> ToLabelOrNum<'a, u64> for u64 {
        fn to_labelornum(self) -> LabelOrNum<'a, u64> {
            LabelOrNum::Num(self)
        }
    }

    impl<'a> ToLabelOrNum<'a, u64> for &'a Label {
        fn to_labelornum(self) -> LabelOrNum<'a, u64> {
            LabelOrNum::Label(self)
        }
    }

    impl CfiSectionMethods for Section {
        fn cie<'input, E>(self, cie: &mut DebugFrameCie<'input, E>) -> Self
        where
            E: Endianity,
        {
            assert!(cie.augmentation.is_none());

            cie.offset = self.size() as usize;
            let length = Label::new();
            let start = Label::new();
            let end = Label::new();

            let section = match cie.format {
                Format::Dwarf32 => self.D32(&length).mark(&start).D32(0xffff_ffff),
                Format::Dwarf64 => {
                    let section = self.D32(0xffff_ffff);
                    section.D64(&length).mark(&start).D64(0xffff_ffff_ffff_ffff)
                }
            };

            // Version, then a null augmentation string.
            let mut section = section.D8(cie.version).D8(0);

            if DebugFrame::<EndianSlice<'_, E>>::has_address_and_segment_sizes(cie.version) {
                section = section.D8(cie.address_size).D8(0);
            }

            let section = section
                .uleb(cie.code_alignment_factor)
                .sleb(cie.data_alignment_factor)
                .uleb(cie.return_address_register.0.into())
                .append_bytes(cie.initial_instructions.slice())
                .mark(&end);

            cie.length = (&end - &start) as usize;
            length.set_const(cie.length as u64);

            section
        }

        fn fde<'a, 'input, E, L>(self, cie_offset: L, fde: &mut DebugFrameFde<'input, E>) -> Self
        where
            E: Endianity,
            L: ToLabelOrNum<'a, u64>,
        {
            assert!(fde.augmentation.is_none());

            fde.offset = self.size() as usize;
            let length = Label::new();
            let start = Label::new();
            let end = Label::new();

            let section = match fde.format {
                Format::Dwarf32 => {
                    let section = self.D32(&length).mark(&start);
                    match cie_offset.to_labelornum() {
                        LabelOrNum::Label(l) => section.D32(l),
                        LabelOrNum::Num(o) => section.D32(o as u32),
                    }
                }
                Format::Dwarf64 => {
                    let section = self.D32(0xffff_ffff);
                    let section = section.D64(&length).mark(&start);
                    match cie_offset.to_labelornum() {
                        LabelOrNum::Label(l) => section.D64(l),
                        LabelOrNum::Num(o) => section.D64(o),
                    }
                }
            };

            let section = section
                .word(fde.cie.address_size, fde.initial_address)
                .word(fde.cie.address_size, fde.address_range)
                .append_bytes(fde.instructions.slice())
                .mark(&end);

            fde.length = (&end - &start) as usize;
            length.set_const(fde.length as u64);

            section
        }
    }

    fn make_test_cie<'input>() -> DebugFrameCie<'input> {
        CommonInformationEntry {
            offset: 0,
            length: 0,
            format: Format::Dwarf32,
            version: 4,
            augmentation: None,
            address_size: 4,
            code_alignment_factor: 1,
            data_alignment_factor: 2,
            return_address_register: Register(3),
            initial_instructions: EndianSlice::new(&[], LittleEndian),
        }
    }

    fn parse_cfi_entry_of<'bases, 'input, Section>(
        bases: &'bases BaseAddresses,
        section: &Section,
    ) -> Result<Option<CieOrFde<'bases, Section, EndianSlice<'input, LittleEndian>>>>
    where
        Section: UnwindSection<EndianSlice<'input, LittleEndian>>,
    {
        let input = &mut section.section().clone();
        parse_cfi_entry(bases, section, input)
    }

    #[test]
    fn test_parse_cie() {
        let expected_instrs: Vec<_> = (0..4).map(|_| constants::DW_CFA_nop.0).collect();

        let mut cie = make_test_cie();
        cie.initial_instructions = EndianSlice::new(&expected_instrs, LittleEndian);

        let section = Section::with_endian(Endian::Little)
            .cie(&mut cie)
            .get_contents()
            .unwrap();

        let debug_frame = DebugFrame::new(&section, LittleEndian);
        let bases = Default::default();

        match parse_cfi_entry_of(&bases, &debug_frame) {
            Ok(Some(CieOrFde::Cie(actual))) => assert_eq!(actual, cie),
            otherwise => panic!("Unexpected result: {otherwise:#?}"),
        }
    }

    #[test]
    fn test_parse_cie_bad_version() {
        let mut cie = make_test_cie();
        cie.version = 2;

        let section = Section::with_endian(Endian::Little)
            .cie(&mut cie)
            .get_contents()
            .unwrap();

        let debug_frame = DebugFrame::new(&section, LittleEndian);
        let bases = Default::default();

        match parse_cfi_entry_of(&bases, &debug_frame) {
            Err(Error::UnsupportedVersion(2)) => {}
            otherwise => panic!("Unexpected result: {otherwise:#?}"),
        }
    }

    #[test]
    fn test_parse_cie_unknown_augmentation() {
        // An augmentation string that does not start with 'z'.
        let section = Section::with_endian(Endian::Little)
            // Initial length.
            .L32(16)
            // CIE id.
            .L32(0xffff_ffff)
            // Version.
            .D8(4)
            // Augmentation.
            .append_bytes(b"bogus\x00")
            // Address size, segment size.
            .D8(4)
            .D8(0)
            // Code alignment, data alignment, return address register.
            .uleb(1)
            .sleb(2)
            .uleb(3)
            // Padding.
            .append_bytes(&[constants::DW_CFA_nop.0; 2])
            .get_contents()
            .unwrap();

        let debug_frame = DebugFrame::new(&section, LittleEndian);
        let bases = Default::default();

        match parse_cfi_entry_of(&bases, &debug_frame) {
            Err(Error::UnknownAugmentation) => {}
            otherwise => panic!("Unexpected result: {otherwise:#?}"),
        }
    }

    #[test]
    fn test_parse_cie_segment_size_unsupported() {
        let section = Section::with_endian(Endian::Little)
            .L32(10)
            .L32(0xffff_ffff)
            .D8(4)
            // No augmentation.
            .D8(0)
            // Address size, segment size.
            .D8(4)
            .D8(4)
            .uleb(1)
            .sleb(2)
            .uleb(3)
            .get_contents()
            .unwrap();

        let debug_frame = DebugFrame::new(&section, LittleEndian);
        let bases = Default::default();

        match parse_cfi_entry_of(&bases, &debug_frame) {
            Err(Error::NonZeroSegmentSize(4)) => {}
            otherwise => panic!("Unexpected result: {otherwise:#?}"),
        }
    }

    #[test]
    fn test_parse_fde_and_cie() {
        let expected_instrs: Vec<_> = (0..4).map(|_| constants::DW_CFA_nop.0).collect();

        let cie_location = Label::new();

        let mut cie = make_test_cie();
        let mut fde = DebugFrameFde {
            offset: 0,
            length: 0,
            format: Format::Dwarf32,
            cie: cie.clone(),
            initial_address: 0xfeed_beef,
            address_range: 100,
            augmentation: None,
            instructions: EndianSlice::new(&expected_instrs, LittleEndian),
        };

        let section = Section::with_endian(Endian::Little)
            .mark(&cie_location)
            .cie(&mut cie)
            .fde(&cie_location, &mut fde);
        section.start().set_const(0);
        let section = section.get_contents().unwrap();

        // The FDE's CIE must match the CIE as parsed from the section.
        fde.cie = cie.clone();

        let debug_frame = DebugFrame::new(&section, LittleEndian);
        let bases = Default::default();
        let mut entries = debug_frame.entries(&bases);

        match entries.next() {
            Ok(Some(CieOrFde::Cie(actual))) => assert_eq!(actual, cie),
            otherwise => panic!("Unexpected result: {otherwise:#?}"),
        }

        match entries.next() {
            Ok(Some(CieOrFde::Fde(partial))) => {
                let actual = partial
                    .parse(|_, _, offset| {
                        assert_eq!(offset, DebugFrameOffset(0));
                        Ok(cie.clone())
                    })
                    .unwrap();
                assert_eq!(actual, fde);
                assert!(actual.contains(0xfeed_beef));
                assert!(actual.contains(0xfeed_beef + 99));
                assert!(!actual.contains(0xfeed_beef + 100));
            }
            otherwise => panic!("Unexpected result: {otherwise:#?}"),
        }

        assert!(matches!(entries.next(), Ok(None)));
    }

    #[test]
    fn test_eh_frame_resolve_cie_offset() {
        let buf = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let section = EhFrame::new(&buf, BigEndian);
        // `base` is the offset of the CIE pointer field within the
        // section; the CIE offset is subtracted from it.
        assert_eq!(section.resolve_cie_offset(8, 4), Some(4));
        assert_eq!(section.resolve_cie_offset(8, 8), Some(0));
        assert_eq!(section.resolve_cie_offset(8, 9), None);
    }

    #[test]
    fn test_eh_frame_stops_at_zero_length() {
        let section = Section::with_endian(Endian::Little)
            .L32(0)
            .get_contents()
            .unwrap();
        let eh_frame = EhFrame::new(&section, LittleEndian);
        let bases = Default::default();

        let mut entries = eh_frame.entries(&bases);
        assert!(matches!(entries.next(), Ok(None)));
    }

    fn parse_cfi_instruction<'input>(
        input: &mut EndianSlice<'input, LittleEndian>,
    ) -> Result<CallFrameInstruction<EndianSlice<'input, LittleEndian>>> {
        let section = input.clone();
        let parameters = &PointerEncodingParameters {
            bases: &BaseAddresses::default(),
            func_base: None,
            address_size: 8,
            section: &section,
        };
        CallFrameInstruction::parse(input, None, parameters)
    }

    #[test]
    fn test_parse_cfi_instruction_advance_loc() {
        let expected_rest = [1, 2, 3, 4];
        let section = Section::with_endian(Endian::Little)
            .D8(constants::DW_CFA_advance_loc.0 | 0x2a)
            .append_bytes(&expected_rest)
            .get_contents()
            .unwrap();
        let input = &mut EndianSlice::new(&section, LittleEndian);
        assert_eq!(
            parse_cfi_instruction(input),
            Ok(CallFrameInstruction::AdvanceLoc { delta: 0x2a })
        );
        assert_eq!(*input, EndianSlice::new(&expected_rest, LittleEndian));
    }

    #[test]
    fn test_parse_cfi_instruction_offset() {
        let expected_rest = [1, 2, 3, 4];
        let section = Section::with_endian(Endian::Little)
            .D8(constants::DW_CFA_offset.0 | 0x03)
            .uleb(0x1997)
            .append_bytes(&expected_rest)
            .get_contents()
            .unwrap();
        let input = &mut EndianSlice::new(&section, LittleEndian);
        assert_eq!(
            parse_cfi_instruction(input),
            Ok(CallFrameInstruction::Offset {
                register: Register(3),
                factored_offset: 0x1997,
            })
        );
        assert_eq!(*input, EndianSlice::new(&expected_rest, LittleEndian));
    }

    #[test]
    fn test_parse_cfi_instruction_def_cfa() {
        let section = Section::with_endian(Endian::Little)
            .D8(constants::DW_CFA_def_cfa.0)
            .uleb(6)
            .uleb(16)
            .get_contents()
            .unwrap();
        let input = &mut EndianSlice::new(&section, LittleEndian);
        assert_eq!(
            parse_cfi_instruction(input),
            Ok(CallFrameInstruction::DefCfa {
                register: Register(6),
                offset: 16,
            })
        );
    }

    #[test]
    fn test_parse_cfi_instruction_expression() {
        let expected_expr = [2, 2, 1, 1, 5, 5];
        let section = Section::with_endian(Endian::Little)
            .D8(constants::DW_CFA_expression.0)
            .uleb(0x04)
            .uleb(expected_expr.len() as u64)
            .append_bytes(&expected_expr)
            .get_contents()
            .unwrap();
        let input = &mut EndianSlice::new(&section, LittleEndian);
        assert_eq!(
            parse_cfi_instruction(input),
            Ok(CallFrameInstruction::Expression {
                register: Register(4),
                expression: Expression(EndianSlice::new(&expected_expr, LittleEndian)),
            })
        );
    }

    #[test]
    fn test_parse_cfi_instruction_negative_offset_extended() {
        let section = Section::with_endian(Endian::Little)
            .D8(constants::DW_CFA_GNU_negative_offset_extended.0)
            .uleb(0x08)
            .uleb(0x10)
            .get_contents()
            .unwrap();
        let input = &mut EndianSlice::new(&section, LittleEndian);
        assert_eq!(
            parse_cfi_instruction(input),
            Ok(CallFrameInstruction::OffsetExtendedSf {
                register: Register(8),
                factored_offset: -0x10,
            })
        );
    }

    #[test]
    fn test_parse_cfi_instruction_unknown() {
        let section = Section::with_endian(Endian::Little)
            .D8(0x3d)
            .get_contents()
            .unwrap();
        let input = &mut EndianSlice::new(&section, LittleEndian);
        assert_eq!(
            parse_cfi_instruction(input),
            Err(Error::UnknownCallFrameInstruction(constants::DwCfa(0x3d)))
        );
    }

    #[test]
    fn test_callframe_instruction_iter() {
        let expected_expr = [1, 2, 3, 4];
        let section = Section::with_endian(Endian::Little)
            .D8(constants::DW_CFA_def_cfa.0)
            .uleb(7)
            .uleb(8)
            .D8(constants::DW_CFA_advance_loc1.0)
            .D8(0x40)
            .D8(constants::DW_CFA_def_cfa_expression.0)
            .uleb(expected_expr.len() as u64)
            .append_bytes(&expected_expr)
            .get_contents()
            .unwrap();

        let input = EndianSlice::new(&section, LittleEndian);
        let parameters = PointerEncodingParameters {
            bases: &BaseAddresses::default(),
            func_base: None,
            address_size: 8,
            section: &input,
        };
        let mut iter = CallFrameInstructionIter {
            input,
            address_encoding: None,
            parameters,
        };

        assert_eq!(
            iter.next(),
            Ok(Some(CallFrameInstruction::DefCfa {
                register: Register(7),
                offset: 8,
            }))
        );
        assert_eq!(
            iter.next(),
            Ok(Some(CallFrameInstruction::AdvanceLoc { delta: 0x40 }))
        );
        assert_eq!(
            iter.next(),
            Ok(Some(CallFrameInstruction::DefCfaExpression {
                expression: Expression(EndianSlice::new(&expected_expr, LittleEndian)),
            }))
        );
        assert_eq!(iter.next(), Ok(None));
    }

    fn assert_table<'input>(
        fde: DebugFrameFde<'input>,
        section: Section,
        expected_rows: &[UnwindTableRow<EndianSlice<'input, LittleEndian>>],
    ) {
        let section = section.get_contents().unwrap();
        let debug_frame = DebugFrame::new(&section, LittleEndian);
        let bases = Default::default();

        let mut ctx = UnwindContext::new();
        let mut table = fde
            .rows(&debug_frame, &bases, &mut ctx)
            .expect("can create unwind table");

        for expected in expected_rows {
            let actual = table
                .next_row()
                .expect("can evaluate next row")
                .expect("have expected row");
            assert_eq!(actual, expected);
        }

        assert!(table.next_row().expect("evaluate to end").is_none());
    }

    #[test]
    fn test_unwind_table_next_row() {
        // A CIE whose initial instructions define the CFA and a couple of
        // register rules, followed by an FDE that advances the location
        // and adjusts rules.
        #[rustfmt::skip]
        let initial_instructions = Section::with_endian(Endian::Little)
            // The CFA is in r6, offset 16.
            .D8(constants::DW_CFA_def_cfa.0)
            .uleb(6)
            .uleb(16)
            // r0 is saved at CFA-8 (factored offset 4, data alignment -2).
            .D8(constants::DW_CFA_offset.0 | 0)
            .uleb(4)
            .get_contents()
            .unwrap();

        let mut cie = DebugFrameCie {
            offset: 0,
            length: 0,
            format: Format::Dwarf32,
            version: 4,
            augmentation: None,
            address_size: 8,
            code_alignment_factor: 1,
            data_alignment_factor: -2,
            return_address_register: Register(16),
            initial_instructions: EndianSlice::new(&initial_instructions, LittleEndian),
        };

        #[rustfmt::skip]
        let instructions = Section::with_endian(Endian::Little)
            // After 8 bytes of code, r1 is saved at CFA-16.
            .D8(constants::DW_CFA_advance_loc.0 | 8)
            .D8(constants::DW_CFA_offset.0 | 1)
            .uleb(8)
            // After another 8 bytes, the CFA offset grows.
            .D8(constants::DW_CFA_advance_loc.0 | 8)
            .D8(constants::DW_CFA_def_cfa_offset.0)
            .uleb(32)
            .get_contents()
            .unwrap();

        let mut fde = DebugFrameFde {
            offset: 0,
            length: 0,
            format: Format::Dwarf32,
            cie: cie.clone(),
            initial_address: 0x1000,
            address_range: 0x40,
            augmentation: None,
            instructions: EndianSlice::new(&instructions, LittleEndian),
        };

        let cie_location = Label::new();
        let section = Section::with_endian(Endian::Little)
            .mark(&cie_location)
            .cie(&mut cie)
            .fde(&cie_location, &mut fde);
        section.start().set_const(0);

        let initial_registers: RegisterRuleMap<EndianSlice<'_, LittleEndian>> =
            [(Register(0), RegisterRule::Offset(-8))].iter().collect();

        let mut second_registers = initial_registers.clone();
        second_registers.set(Register(1), RegisterRule::Offset(-16));

        let expected_rows = [
            UnwindTableRow {
                start_address: 0x1000,
                end_address: 0x1008,
                saved_args_size: 0,
                cfa: CfaRule::RegisterAndOffset {
                    register: Register(6),
                    offset: 16,
                },
                registers: initial_registers,
            },
            UnwindTableRow {
                start_address: 0x1008,
                end_address: 0x1010,
                saved_args_size: 0,
                cfa: CfaRule::RegisterAndOffset {
                    register: Register(6),
                    offset: 16,
                },
                registers: second_registers.clone(),
            },
            UnwindTableRow {
                start_address: 0x1010,
                end_address: 0x1040,
                saved_args_size: 0,
                cfa: CfaRule::RegisterAndOffset {
                    register: Register(6),
                    offset: 32,
                },
                registers: second_registers,
            },
        ];

        assert_table(fde, section, &expected_rows);
    }

    #[test]
    fn test_unwind_table_remember_and_restore_state() {
        let initial_instructions = Section::with_endian(Endian::Little)
            .D8(constants::DW_CFA_def_cfa.0)
            .uleb(7)
            .uleb(8)
            .get_contents()
            .unwrap();

        let mut cie = DebugFrameCie {
            offset: 0,
            length: 0,
            format: Format::Dwarf32,
            version: 4,
            augmentation: None,
            address_size: 8,
            code_alignment_factor: 1,
            data_alignment_factor: 1,
            return_address_register: Register(16),
            initial_instructions: EndianSlice::new(&initial_instructions, LittleEndian),
        };

        #[rustfmt::skip]
        let instructions = Section::with_endian(Endian::Little)
            // Save the initial state.
            .D8(constants::DW_CFA_remember_state.0)
            // Change a register rule and complete a row.
            .D8(constants::DW_CFA_offset.0 | 2)
            .uleb(8)
            .D8(constants::DW_CFA_advance_loc.0 | 4)
            // Restore the remembered state.
            .D8(constants::DW_CFA_restore_state.0)
            .get_contents()
            .unwrap();

        let mut fde = DebugFrameFde {
            offset: 0,
            length: 0,
            format: Format::Dwarf32,
            cie: cie.clone(),
            initial_address: 0,
            address_range: 0x10,
            augmentation: None,
            instructions: EndianSlice::new(&instructions, LittleEndian),
        };

        let cie_location = Label::new();
        let section = Section::with_endian(Endian::Little)
            .mark(&cie_location)
            .cie(&mut cie)
            .fde(&cie_location, &mut fde);
        section.start().set_const(0);

        let cfa = CfaRule::RegisterAndOffset {
            register: Register(7),
            offset: 8,
        };

        let expected_rows = [
            UnwindTableRow {
                start_address: 0,
                end_address: 4,
                saved_args_size: 0,
                cfa: cfa.clone(),
                registers: [(Register(2), RegisterRule::Offset(8))].iter().collect(),
            },
            UnwindTableRow {
                start_address: 4,
                end_address: 0x10,
                saved_args_size: 0,
                cfa,
                registers: Default::default(),
            },
        ];

        assert_table(fde, section, &expected_rows);
    }

    #[test]
    fn test_unwind_table_restore_state_with_empty_stack() {
        let initial_instructions = Section::with_endian(Endian::Little)
            .D8(constants::DW_CFA_def_cfa.0)
            .uleb(7)
            .uleb(8)
            .get_contents()
            .unwrap();

        let mut cie = make_test_cie();
        cie.initial_instructions = EndianSlice::new(&initial_instructions, LittleEndian);

        let instructions = Section::with_endian(Endian::Little)
            .D8(constants::DW_CFA_restore_state.0)
            .get_contents()
            .unwrap();

        let mut fde = DebugFrameFde {
            offset: 0,
            length: 0,
            format: Format::Dwarf32,
            cie: cie.clone(),
            initial_address: 0,
            address_range: 0x10,
            augmentation: None,
            instructions: EndianSlice::new(&instructions, LittleEndian),
        };

        let cie_location = Label::new();
        let section = Section::with_endian(Endian::Little)
            .mark(&cie_location)
            .cie(&mut cie)
            .fde(&cie_location, &mut fde);
        section.start().set_const(0);
        let section = section.get_contents().unwrap();

        let debug_frame = DebugFrame::new(&section, LittleEndian);
        let bases = Default::default();

        let mut ctx = UnwindContext::new();
        let mut table = fde.rows(&debug_frame, &bases, &mut ctx).unwrap();
        assert_eq!(table.next_row(), Err(Error::EmptyStateStack));
    }

    #[test]
    fn test_unwind_table_restore_register() {
        // `DW_CFA_restore` restores the rule from the CIE's initial
        // instructions.
        let initial_instructions = Section::with_endian(Endian::Little)
            .D8(constants::DW_CFA_def_cfa.0)
            .uleb(7)
            .uleb(8)
            .D8(constants::DW_CFA_offset.0 | 2)
            .uleb(4)
            .get_contents()
            .unwrap();

        let mut cie = DebugFrameCie {
            offset: 0,
            length: 0,
            format: Format::Dwarf32,
            version: 4,
            augmentation: None,
            address_size: 8,
            code_alignment_factor: 1,
            data_alignment_factor: -4,
            return_address_register: Register(16),
            initial_instructions: EndianSlice::new(&initial_instructions, LittleEndian),
        };

        #[rustfmt::skip]
        let instructions = Section::with_endian(Endian::Little)
            // Override the rule for r2, complete a row, then restore it.
            .D8(constants::DW_CFA_same_value.0)
            .uleb(2)
            .D8(constants::DW_CFA_advance_loc.0 | 4)
            .D8(constants::DW_CFA_restore.0 | 2)
            .get_contents()
            .unwrap();

        let mut fde = DebugFrameFde {
            offset: 0,
            length: 0,
            format: Format::Dwarf32,
            cie: cie.clone(),
            initial_address: 0,
            address_range: 0x10,
            augmentation: None,
            instructions: EndianSlice::new(&instructions, LittleEndian),
        };

        let cie_location = Label::new();
        let section = Section::with_endian(Endian::Little)
            .mark(&cie_location)
            .cie(&mut cie)
            .fde(&cie_location, &mut fde);
        section.start().set_const(0);

        let cfa = CfaRule::RegisterAndOffset {
            register: Register(7),
            offset: 8,
        };

        let expected_rows = [
            UnwindTableRow {
                start_address: 0,
                end_address: 4,
                saved_args_size: 0,
                cfa: cfa.clone(),
                registers: [(Register(2), RegisterRule::SameValue)].iter().collect(),
            },
            UnwindTableRow {
                start_address: 4,
                end_address: 0x10,
                saved_args_size: 0,
                cfa,
                registers: [(Register(2), RegisterRule::Offset(-16))].iter().collect(),
            },
        ];

        assert_table(fde, section, &expected_rows);
    }

    #[test]
    fn test_unwind_info_for_address_ok() {
        let instrs1 = Section::with_endian(Endian::Little)
            // The CFA is -12 from register 4.
            .D8(constants::DW_CFA_def_cfa_sf.0)
            .uleb(4)
            .sleb(-12)
            .get_contents()
            .unwrap();

        let instrs2: Vec<_> = (0..8).map(|_| constants::DW_CFA_nop.0).collect();

        let cie_location = Label::new();

        let mut cie = DebugFrameCie {
            offset: 0,
            length: 0,
            format: Format::Dwarf32,
            version: 4,
            augmentation: None,
            address_size: 8,
            code_alignment_factor: 1,
            data_alignment_factor: 1,
            return_address_register: Register(16),
            initial_instructions: EndianSlice::new(&instrs1, LittleEndian),
        };

        let mut fde = DebugFrameFde {
            offset: 0,
            length: 0,
            format: Format::Dwarf32,
            cie: cie.clone(),
            initial_address: 0xfeed_face,
            address_range: 9000,
            augmentation: None,
            instructions: EndianSlice::new(&instrs2, LittleEndian),
        };

        let section = Section::with_endian(Endian::Little)
            .mark(&cie_location)
            .cie(&mut cie)
            .fde(&cie_location, &mut fde);
        section.start().set_const(0);
        let section = section.get_contents().unwrap();

        let debug_frame = DebugFrame::new(&section, LittleEndian);
        let bases = Default::default();
        let mut ctx = UnwindContext::new();
        let unwind_info = debug_frame
            .unwind_info_for_address(
                &bases,
                &mut ctx,
                0xfeed_face + 150,
                DebugFrame::cie_from_offset,
            )
            .unwrap();

        assert_eq!(
            *unwind_info,
            UnwindTableRow {
                start_address: fde.initial_address(),
                end_address: fde.end_address(),
                saved_args_size: 0,
                cfa: CfaRule::RegisterAndOffset {
                    register: Register(4),
                    offset: -12,
                },
                registers: Default::default(),
            }
        );
    }

    #[test]
    fn test_unwind_info_for_address_not_found() {
        let debug_frame = DebugFrame::new(&[], NativeEndian);
        let bases = Default::default();
        let mut ctx = UnwindContext::new();
        let result = debug_frame.unwind_info_for_address(
            &bases,
            &mut ctx,
            0xbadb_ad99,
            DebugFrame::cie_from_offset,
        );
        assert!(result.is_err());
        assert_eq!(result.unwrap_err(), Error::NoUnwindInfoForAddress);
    }

    #[test]
    fn test_register_rule_map() {
        let mut map: RegisterRuleMap<EndianSlice<'_, LittleEndian>> = Default::default();

        assert_eq!(map.get(Register(0)), RegisterRule::Undefined);
        map.set(Register(0), RegisterRule::SameValue);
        assert_eq!(map.get(Register(0)), RegisterRule::SameValue);

        // Setting a register back to undefined removes the rule.
        map.set(Register(0), RegisterRule::Undefined);
        assert!(map.is_default());

        map.set(Register(1), RegisterRule::Offset(8));
        map.set(Register(2), RegisterRule::Offset(-8));
        assert_eq!(map.iter().count(), 2);
    }

    #[test]
    fn test_parse_pointer_encoding_ok() {
        let expected_rest = [1, 2, 3, 4];
        let input = Section::with_endian(Endian::Little)
            .D8(constants::DW_EH_PE_uleb128.0 | constants::DW_EH_PE_pcrel.0)
            .append_bytes(&expected_rest)
            .get_contents()
            .unwrap();
        let input = &mut EndianSlice::new(&input, LittleEndian);
        assert_eq!(
            parse_pointer_encoding(input),
            Ok(constants::DwEhPe(
                constants::DW_EH_PE_uleb128.0 | constants::DW_EH_PE_pcrel.0
            ))
        );
        assert_eq!(*input, EndianSlice::new(&expected_rest, LittleEndian));
    }

    #[test]
    fn test_parse_pointer_encoding_bad_encoding() {
        let expected_rest = [1, 2, 3, 4];
        let input = Section::with_endian(Endian::Little)
            .D8(0x05)
            .append_bytes(&expected_rest)
            .get_contents()
            .unwrap();
        let input = &mut EndianSlice::new(&input, LittleEndian);
        assert_eq!(
            parse_pointer_encoding(input),
            Err(Error::InvalidPointerEncoding(constants::DwEhPe(0x05)))
        );
    }

    #[test]
    fn test_parse_encoded_pointer_absptr() {
        let encoding = constants::DW_EH_PE_absptr;
        let expected_rest = [1, 2, 3, 4];

        let input = Section::with_endian(Endian::Little)
            .L32(0xf00d_f00d)
            .append_bytes(&expected_rest)
            .get_contents()
            .unwrap();
        let input = EndianSlice::new(&input, LittleEndian);
        let mut rest = input;

        let parameters = PointerEncodingParameters {
            bases: &BaseAddresses::default(),
            func_base: None,
            address_size: 4,
            section: &input,
        };
        assert_eq!(
            parse_encoded_pointer(encoding, &parameters, &mut rest),
            Ok(Pointer::Direct(0xf00d_f00d))
        );
        assert_eq!(rest, EndianSlice::new(&expected_rest, LittleEndian));
    }

    #[test]
    fn test_parse_encoded_pointer_pcrel() {
        let encoding = constants::DW_EH_PE_pcrel;

        let input = Section::with_endian(Endian::Little)
            .append_repeated(0, 0x10)
            .L32(0x1)
            .get_contents()
            .unwrap();
        let input = EndianSlice::new(&input, LittleEndian);
        let mut rest = input.range_from(0x10..);

        let parameters = PointerEncodingParameters {
            bases: &BaseAddresses::default().set_cfi(0x100),
            func_base: None,
            address_size: 4,
            section: &input,
        };
        assert_eq!(
            parse_encoded_pointer(encoding, &parameters, &mut rest),
            Ok(Pointer::Direct(0x111))
        );
    }

    #[test]
    fn test_parse_encoded_pointer_pcrel_undefined() {
        let encoding = constants::DW_EH_PE_pcrel;

        let input = Section::with_endian(Endian::Little)
            .L32(0x1)
            .get_contents()
            .unwrap();
        let input = EndianSlice::new(&input, LittleEndian);
        let mut rest = input;

        let parameters = PointerEncodingParameters {
            bases: &BaseAddresses::default(),
            func_base: None,
            address_size: 4,
            section: &input,
        };
        assert_eq!(
            parse_encoded_pointer(encoding, &parameters, &mut rest),
            Err(Error::MissingBaseAddress(encoding))
        );
    }

    #[test]
    fn test_parse_encoded_pointer_datarel_sdata2() {
        let encoding =
            constants::DwEhPe(constants::DW_EH_PE_datarel.0 | constants::DW_EH_PE_sdata2.0);

        let input = Section::with_endian(Endian::Little)
            .L16((-0x10i16) as u16)
            .get_contents()
            .unwrap();
        let input = EndianSlice::new(&input, LittleEndian);
        let mut rest = input;

        let parameters = PointerEncodingParameters {
            bases: &BaseAddresses::default().set_data(0x1000),
            func_base: None,
            address_size: 4,
            section: &input,
        };
        assert_eq!(
            parse_encoded_pointer(encoding, &parameters, &mut rest),
            Ok(Pointer::Direct(0xff0))
        );
    }

    #[test]
    fn test_parse_encoded_pointer_indirect() {
        let encoding =
            constants::DwEhPe(constants::DW_EH_PE_indirect.0 | constants::DW_EH_PE_udata4.0);

        let input = Section::with_endian(Endian::Little)
            .L32(0x1234)
            .get_contents()
            .unwrap();
        let input = EndianSlice::new(&input, LittleEndian);
        let mut rest = input;

        let parameters = PointerEncodingParameters {
            bases: &BaseAddresses::default(),
            func_base: None,
            address_size: 4,
            section: &input,
        };
        assert_eq!(
            parse_encoded_pointer(encoding, &parameters, &mut rest),
            Ok(Pointer::Indirect(0x1234))
        );
        assert_eq!(Pointer::Indirect(0x1234).pointer(), 0x1234);
        assert_eq!(
            Pointer::Indirect(0x1234).direct(),
            Err(Error::IndirectPointer)
        );
    }

    #[test]
    fn test_parse_encoded_pointer_omit() {
        let encoding = constants::DW_EH_PE_omit;

        let input = Section::with_endian(Endian::Little)
            .L32(0x1)
            .get_contents()
            .unwrap();
        let input = EndianSlice::new(&input, LittleEndian);
        let mut rest = input;

        let parameters = PointerEncodingParameters {
            bases: &BaseAddresses::default(),
            func_base: None,
            address_size: 4,
            section: &input,
        };
        assert_eq!(
            parse_encoded_pointer(encoding, &parameters, &mut rest),
            Err(Error::OmitPointer)
        );
        assert_eq!(rest, input);
    }
}
