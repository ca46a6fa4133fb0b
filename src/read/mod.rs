//! The read half of the crate: one entry type per DWARF section, the
//! [`Dwarf`] bundle that ties them together, and the shared [`Reader`]
//! abstraction they all decode through.
//!
//! Typical use goes through [`Dwarf::load`], which pulls every section
//! from a caller-supplied loader closure. Callers that only care about
//! one section can construct just that section type instead, e.g.
//! [`DebugLine`] for `.debug_line`. Offsets into different sections have
//! different types, so they cannot be mixed up.
//!
//! Parsing is lazy throughout: constructing a section type or an
//! iterator costs nothing, and data is decoded only as the caller walks
//! it.

use core::fmt;
use std::io;

use crate::common::{Register, SectionId};
use crate::constants;

mod abbrev;
pub use self::abbrev::*;

mod addr;
pub use self::addr::*;

mod aranges;
pub use self::aranges::*;

mod cfi;
pub use self::cfi::*;

mod dwarf;
pub use self::dwarf::*;

mod endian_slice;
pub use self::endian_slice::*;

mod line;
pub use self::line::*;

mod lists;

mod loclists;
pub use self::loclists::*;

mod op;
pub use self::op::*;

mod reader;
pub use self::reader::*;

mod rnglists;
pub use self::rnglists::*;

mod str;
pub use self::str::*;

mod unit;
pub use self::unit::*;

/// An offset relative to the start of a unit's header, as used by
/// unit-local DIE references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Ord, PartialOrd, Hash)]
pub struct UnitOffset(pub usize);

/// Everything that can go wrong while decoding DWARF data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Reading from the underlying input failed.
    Io,
    /// The input ended in the middle of a value.
    UnexpectedEof,
    /// A LEB128 value was malformed or does not fit in 64 bits.
    BadLeb128,
    /// A string was not valid UTF-8.
    InvalidUtf8,
    /// An initial length used one of the reserved escape values.
    ReservedUnitLength(u64),
    /// A header declared a DWARF version this crate does not read.
    UnsupportedVersion(u16),
    /// A header declared an address size other than 1, 2, 4 or 8.
    UnsupportedAddressSize(u8),
    /// Segmented addressing is not supported.
    NonZeroSegmentSize(u8),
    /// A DWARF 5 unit header had an unknown or unsupported unit type.
    UnsupportedUnitType(constants::DwUt),
    /// A unit contained no root DIE.
    MissingUnitDie,
    /// A null entry appeared where a real DIE was required.
    UnexpectedNull,
    /// An offset or length pointed outside the data it indexes.
    InvalidOffset,
    /// An abbreviation declaration used the reserved tag zero.
    NullAbbrevTag,
    /// An attribute specification paired the reserved name zero with a
    /// real form.
    NullAttrName,
    /// An attribute specification used the reserved form zero.
    NullAttrForm,
    /// An abbreviation's children flag was neither `DW_CHILDREN_no` nor
    /// `DW_CHILDREN_yes`.
    InvalidChildrenValue(constants::DwChildren),
    /// An abbreviation table assigned the same code twice.
    DuplicateAbbrevCode(u64),
    /// A DIE referenced an abbreviation code the table does not define.
    UnknownAbbrevCode(u64),
    /// An attribute used a form this crate does not know.
    UnknownForm(constants::DwForm),
    /// `DW_FORM_indirect` resolved to a form that is not allowed to be
    /// indirect.
    InvalidIndirectForm(constants::DwForm),
    /// A string was requested from an attribute whose form is not a
    /// string form.
    ExpectedStringValue,
    /// A line header's minimum instruction length was zero.
    ZeroInstructionLength,
    /// A line header's maximum operations per instruction was zero.
    ZeroMaxOperations,
    /// A line header's line range was zero.
    ZeroLineRange,
    /// A line header's opcode base was zero.
    ZeroOpcodeBase,
    /// A DWARF 5 line header's file entry format has no `DW_LNCT_path`.
    MissingPathContentType,
    /// A location list contained an unknown entry kind.
    UnknownLocListEntry(constants::DwLle),
    /// A range list contained an unknown entry kind.
    UnknownRangeListEntry(constants::DwRle),
    /// A list entry's begin address was greater than its end address.
    InvalidAddressRange,
    /// Address arithmetic wrapped around.
    AddressOverflow,
    /// A CIE's id field held something other than the CIE id.
    BadCieId(u64),
    /// A CIE augmentation string was not understood.
    UnknownAugmentation,
    /// An `.eh_frame` pointer encoding was malformed.
    InvalidPointerEncoding(constants::DwEhPe),
    /// An `.eh_frame` pointer encoding is valid but not supported.
    UnsupportedPointerEncoding(constants::DwEhPe),
    /// Tried to read a pointer whose encoding is `DW_EH_PE_omit`.
    OmitPointer,
    /// A relative pointer was found but the caller supplied no base
    /// address for it.
    MissingBaseAddress(constants::DwEhPe),
    /// A function-relative pointer appeared outside an FDE.
    FuncRelativeInBadContext,
    /// Indirect (`DW_EH_PE_indirect`) pointers cannot be dereferenced
    /// from section data alone.
    IndirectPointer,
    /// An unknown `DW_CFA_*` opcode.
    UnknownCallFrameInstruction(constants::DwCfa),
    /// A call frame instruction appeared where it is not allowed.
    MisplacedCfiInstruction,
    /// `DW_CFA_restore_state` with no remembered state to restore.
    EmptyStateStack,
    /// No FDE covers the requested address.
    NoUnwindInfoForAddress,
    /// No CIE or FDE starts at the given offset.
    NoEntryAtOffset(u64),
    /// A register number does not fit in 16 bits.
    UnsupportedRegister(u64),
    /// An unknown `DW_OP_*` opcode.
    UnknownExpressionOp(constants::DwOp),
    /// The expression uses typed operations, which this evaluator does
    /// not implement.
    UnsupportedEvaluation,
    /// A piece operation was mixed with non-piece results.
    MisplacedPiece,
    /// An operation followed a terminating operation without an
    /// intervening piece.
    TrailingOperations(u64),
    /// A branch target outside the expression, or not at an operation
    /// boundary.
    BadBranchTarget(u64),
    /// `DW_OP_push_object_address` was used but no object address was
    /// supplied.
    MissingObjectAddress,
    /// An operation needed more stack entries than were present.
    StackUnderflow,
    /// Evaluation exceeded the configured iteration limit.
    TooManyIterations,
    /// Division or remainder by zero during evaluation.
    DivisionByZero,
    /// A deref size of zero, or wider than an address.
    BadDerefSize(u8),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Error::*;
        match *self {
            Io => write!(f, "read failed"),
            UnexpectedEof => write!(f, "input ended early"),
            BadLeb128 => write!(f, "malformed LEB128 value"),
            InvalidUtf8 => write!(f, "string is not UTF-8"),
            ReservedUnitLength(value) => write!(f, "reserved initial length {value:#x}"),
            UnsupportedVersion(version) => write!(f, "DWARF version {version} not supported"),
            UnsupportedAddressSize(size) => write!(f, "address size {size} not supported"),
            NonZeroSegmentSize(size) => write!(f, "segment selector size {size} not supported"),
            UnsupportedUnitType(kind) => write!(f, "unit type {kind} not supported"),
            MissingUnitDie => write!(f, "unit has no root DIE"),
            UnexpectedNull => write!(f, "null entry where a DIE was required"),
            InvalidOffset => write!(f, "offset out of bounds"),
            NullAbbrevTag => write!(f, "abbreviation tag is zero"),
            NullAttrName => write!(f, "attribute name is zero"),
            NullAttrForm => write!(f, "attribute form is zero"),
            InvalidChildrenValue(value) => write!(f, "bad children flag {:#x}", value.0),
            DuplicateAbbrevCode(code) => write!(f, "abbreviation code {code} defined twice"),
            UnknownAbbrevCode(code) => write!(f, "abbreviation code {code} not defined"),
            UnknownForm(form) => write!(f, "unknown form {:#x}", form.0),
            InvalidIndirectForm(form) => write!(f, "form {:#x} may not be indirect", form.0),
            ExpectedStringValue => write!(f, "attribute does not hold a string"),
            ZeroInstructionLength => write!(f, "minimum instruction length is zero"),
            ZeroMaxOperations => write!(f, "maximum operations per instruction is zero"),
            ZeroLineRange => write!(f, "line range is zero"),
            ZeroOpcodeBase => write!(f, "opcode base is zero"),
            MissingPathContentType => write!(f, "file entry format lacks DW_LNCT_path"),
            UnknownLocListEntry(kind) => write!(f, "unknown location list entry {:#x}", kind.0),
            UnknownRangeListEntry(kind) => write!(f, "unknown range list entry {:#x}", kind.0),
            InvalidAddressRange => write!(f, "range begins after it ends"),
            AddressOverflow => write!(f, "address arithmetic overflow"),
            BadCieId(value) => write!(f, "expected CIE id, found {value:#x}"),
            UnknownAugmentation => write!(f, "unknown augmentation string"),
            InvalidPointerEncoding(enc) => write!(f, "bad pointer encoding {:#x}", enc.0),
            UnsupportedPointerEncoding(enc) => {
                write!(f, "unsupported pointer encoding {:#x}", enc.0)
            }
            OmitPointer => write!(f, "pointer encoding is DW_EH_PE_omit"),
            MissingBaseAddress(enc) => {
                write!(f, "no base address supplied for encoding {:#x}", enc.0)
            }
            FuncRelativeInBadContext => write!(f, "function-relative pointer outside an FDE"),
            IndirectPointer => write!(f, "indirect pointers are not supported"),
            UnknownCallFrameInstruction(op) => {
                write!(f, "unknown call frame instruction {:#x}", op.0)
            }
            MisplacedCfiInstruction => write!(f, "call frame instruction not valid here"),
            EmptyStateStack => write!(f, "restore_state with no remembered state"),
            NoUnwindInfoForAddress => write!(f, "no unwind information for address"),
            NoEntryAtOffset(offset) => write!(f, "no entry at offset {offset:#x}"),
            UnsupportedRegister(value) => write!(f, "register {value} does not fit in 16 bits"),
            UnknownExpressionOp(op) => write!(f, "unknown expression opcode {:#x}", op.0),
            UnsupportedEvaluation => write!(f, "typed expression evaluation not supported"),
            MisplacedPiece => write!(f, "piece mixed with non-piece results"),
            TrailingOperations(offset) => {
                write!(f, "operation at {offset:#x} follows a terminating operation")
            }
            BadBranchTarget(target) => write!(f, "branch target {target:#x} is invalid"),
            MissingObjectAddress => write!(f, "no object address supplied"),
            StackUnderflow => write!(f, "expression stack underflow"),
            TooManyIterations => write!(f, "expression iteration limit reached"),
            DivisionByZero => write!(f, "expression divides by zero"),
            BadDerefSize(size) => write!(f, "deref size {size} is invalid"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(_: io::Error) -> Self {
        Error::Io
    }
}

/// The result type every reader in this crate returns.
pub type Result<T> = core::result::Result<T, Error>;

/// Implemented by each section type so that [`Dwarf::load`] can fetch
/// all of them through one closure keyed by [`SectionId`].
pub trait Section<R>: From<R> {
    /// Which section this type reads.
    fn id() -> SectionId;

    /// The section's name in an executable object.
    fn section_name() -> &'static str {
        Self::id().name()
    }

    /// The section's name in a split DWARF object, if it has one there.
    fn dwo_section_name() -> Option<&'static str> {
        Self::id().dwo_name()
    }

    /// Fetch this section's data from `loader` and wrap it.
    fn load<F, E>(loader: F) -> core::result::Result<Self, E>
    where
        F: FnOnce(SectionId) -> core::result::Result<R, E>,
    {
        loader(Self::id()).map(From::from)
    }

    /// The reader over this section's bytes.
    fn reader(&self) -> &R
    where
        R: Reader;
}

impl Register {
    pub(crate) fn from_u64(value: u64) -> Result<Register> {
        u16::try_from(value)
            .map(Register)
            .map_err(|_| Error::UnsupportedRegister(value))
    }
}
