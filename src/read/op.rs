//! DWARF expressions: a stack-machine bytecode that computes where a
//! value lives (or what it is). [`Operation::parse`] decodes one
//! operation; [`Evaluation`] runs a whole expression, pausing whenever
//! it needs a register, memory, or other outside knowledge.

use core::mem;

use crate::common::{DebugAddrIndex, DebugInfoOffset, Encoding, Register};
use crate::constants;
use crate::read::reader::cast_offset;
use crate::read::{Error, Reader, Result, UnitOffset};

/// A reference to a DIE, resolvable either within the referencing unit
/// or across the whole `.debug_info` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DieReference {
    /// An offset within the referencing unit.
    UnitRef(UnitOffset),
    /// An offset from the start of `.debug_info`.
    DebugInfoRef(DebugInfoOffset),
}

/// One decoded expression operation.
///
/// Decoding and evaluation are separate steps, so tools that only want
/// to display an expression can parse it without building an
/// [`Evaluation`]. Opcodes that differ only in operand encoding collapse
/// into one variant; `DW_OP_deref` and `DW_OP_xderef`, for example, both
/// decode to [`Operation::Deref`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation<R: Reader> {
    /// Pop an address and load the value it points at.
    Deref {
        /// The base type DIE, or `UnitOffset(0)` for the generic type.
        base_type: UnitOffset,
        /// How many bytes to load.
        size: u8,
        /// Whether an address space selector is popped along with the
        /// address (`DW_OP_xderef*`).
        space: bool,
    },
    /// Pop and discard the top entry.
    Drop,
    /// Re-push the entry `index` slots down; covers `DW_OP_pick`,
    /// `DW_OP_dup` and `DW_OP_over`.
    Pick {
        /// Distance from the top of the stack, 0 meaning the top.
        index: u8,
    },
    /// Exchange the two top entries.
    Swap,
    /// Rotate the three top entries.
    Rot,
    /// Replace the top entry with its absolute value.
    Abs,
    /// Pop two entries, push their bitwise and.
    And,
    /// Pop two entries, push the signed quotient.
    Div,
    /// Pop two entries, push their difference.
    Minus,
    /// Pop two entries, push the remainder.
    Mod,
    /// Pop two entries, push their product.
    Mul,
    /// Two's-complement negate the top entry.
    Neg,
    /// Bitwise invert the top entry.
    Not,
    /// Pop two entries, push their bitwise or.
    Or,
    /// Pop two entries, push their sum.
    Plus,
    /// Add an embedded constant to the top entry.
    PlusConstant {
        /// The constant to add.
        value: u64,
    },
    /// Shift the second entry left by the top entry's bit count.
    Shl,
    /// Shift the second entry right, zero filling.
    Shr,
    /// Shift the second entry right, sign filling.
    Shra,
    /// Pop two entries, push their bitwise exclusive or.
    Xor,
    /// Jump to `target` when the popped top entry is nonzero.
    Bra {
        /// The expression from the branch target onward.
        target: R,
    },
    /// Pop two entries, push 1 if they are equal, else 0.
    Eq,
    /// Signed `>=` comparison of the two top entries.
    Ge,
    /// Signed `>` comparison of the two top entries.
    Gt,
    /// Signed `<=` comparison of the two top entries.
    Le,
    /// Signed `<` comparison of the two top entries.
    Lt,
    /// Signed `!=` comparison of the two top entries.
    Ne,
    /// Unconditional jump to `target`.
    Skip {
        /// The expression from the branch target onward.
        target: R,
    },
    /// Push a constant; covers the `DW_OP_lit*`, `DW_OP_const*` and
    /// `DW_OP_constu`/`DW_OP_consts` opcodes.
    Literal {
        /// The constant, with signed forms already sign extended.
        value: u64,
    },
    /// Push a constant carrying an explicit base type
    /// (`DW_OP_const_type`).
    TypedLiteral {
        /// The base type DIE.
        base_type: UnitOffset,
        /// The constant's bytes, in target byte order.
        value: R,
    },
    /// The value lives in a register. Ends the current piece or the
    /// expression.
    Register {
        /// Which register.
        register: Register,
    },
    /// Push a register's value plus a constant offset.
    RegisterOffset {
        /// Which register.
        register: Register,
        /// The signed offset added to its value.
        offset: i64,
        /// The base type DIE, or `UnitOffset(0)` for the generic type.
        base_type: UnitOffset,
    },
    /// Push the frame base (the result of the subprogram's
    /// `DW_AT_frame_base`) plus a constant offset.
    FrameOffset {
        /// The signed offset added to the frame base.
        offset: i64,
    },
    /// Do nothing.
    Nop,
    /// Push the address of the enclosing object
    /// (`DW_OP_push_object_address`).
    PushObjectAddress,
    /// Run the `DW_AT_location` of another DIE as a subroutine.
    Call {
        /// Which DIE's location to run.
        offset: DieReference,
    },
    /// Pop a TLS index and push the thread-local address it names.
    Tls,
    /// Push the call frame's CFA.
    CallFrameCfa,
    /// Close the current piece of a composite location.
    Piece {
        /// The piece's width in bits.
        size_in_bits: u64,
        /// Where the piece starts within its location; `None` (from
        /// `DW_OP_piece`) means the next byte boundary.
        bit_offset: Option<u64>,
    },
    /// The value has no location; these bytes are its contents
    /// (`DW_OP_implicit_value`). Ends the current piece or the
    /// expression.
    ImplicitValue {
        /// The value's bytes.
        data: R,
    },
    /// The value has no location; it is whatever is on top of the stack
    /// (`DW_OP_stack_value`). Ends the current piece or the expression.
    StackValue,
    /// A pointer into a value that itself has no location
    /// (`DW_OP_implicit_pointer`). Ends the current piece or the
    /// expression.
    ImplicitPointer {
        /// The DIE describing the pointed-to value, as a `.debug_info`
        /// offset.
        value: DebugInfoOffset,
        /// How far into that value the pointer points.
        byte_offset: i64,
    },
    /// Push the value `expression` had on entry to the current
    /// subprogram (`DW_OP_entry_value`).
    EntryValue {
        /// The sub-expression to evaluate in the entry state.
        expression: R,
    },
    /// Push the value of an optimized-out parameter, identified by its
    /// defining DIE (`DW_OP_GNU_parameter_ref`). The caller's
    /// `DW_TAG_GNU_call_site_parameter` points at the same DIE.
    ParameterRef {
        /// The parameter's defining DIE.
        offset: UnitOffset,
    },
    /// Push an address after applying any needed relocation
    /// (`DW_OP_addr`).
    Address {
        /// The address as stored in the expression.
        address: u64,
    },
    /// Push the `.debug_addr` entry at `index`, relocated
    /// (`DW_OP_addrx`).
    AddressIndex {
        /// Index into the unit's address table.
        index: DebugAddrIndex,
    },
    /// Push the `.debug_addr` entry at `index` without relocation
    /// (`DW_OP_constx`).
    ConstantIndex {
        /// Index into the unit's address table.
        index: DebugAddrIndex,
    },
    /// Reinterpret the top entry as a constant of the named type
    /// (`DW_OP_convert`).
    Convert {
        /// The target base type DIE, or `UnitOffset(0)` for the generic
        /// type.
        base_type: UnitOffset,
    },
    /// Reinterpret the top entry's bits in the named type
    /// (`DW_OP_reinterpret`).
    Reinterpret {
        /// The target base type DIE, or `UnitOffset(0)` for the generic
        /// type.
        base_type: UnitOffset,
    },
}

#[derive(Debug, Clone)]
enum OperationEvaluationResult<R: Reader> {
    Complete {
        terminated: bool,
        piece_end: bool,
        current_location: Location<R>,
    },
    AwaitingMemory {
        address: u64,
        size: u8,
        space: Option<u64>,
    },
    AwaitingRegister {
        register: Register,
        offset: u64,
    },
    AwaitingFrameBase {
        offset: u64,
    },
    AwaitingTls {
        index: u64,
    },
    AwaitingCfa,
    AwaitingAtLocation {
        location: DieReference,
    },
    AwaitingEntryValue {
        expression: Expression<R>,
    },
    AwaitingParameterRef {
        parameter: UnitOffset,
    },
    AwaitingRelocatedAddress {
        address: u64,
    },
    AwaitingIndexedAddress {
        index: DebugAddrIndex,
        relocate: bool,
    },
}

/// Where one piece of an evaluated value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location<R: Reader> {
    /// Nowhere; the piece was optimized away.
    Empty,
    /// In a register.
    Register {
        /// Which register.
        register: Register,
    },
    /// In memory.
    Address {
        /// The memory address.
        address: u64,
    },
    /// Nowhere, but the value itself is known.
    Value {
        /// The known value.
        value: u64,
    },
    /// Nowhere, but these bytes are the value's contents.
    Bytes {
        /// The value's bytes.
        value: R,
    },
    /// A pointer into a value that itself has no location.
    ImplicitPointer {
        /// The DIE describing the pointed-to value, as a `.debug_info`
        /// offset.
        value: DebugInfoOffset,
        /// How far into that value the pointer points.
        byte_offset: i64,
    },
}

impl<R: Reader> Location<R> {
    /// Whether the piece was optimized away.
    pub fn is_empty(&self) -> bool {
        matches!(*self, Location::Empty)
    }
}

/// One piece of the result of evaluating an expression. Simple results
/// are a single piece; composite locations have several.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece<R: Reader> {
    /// The piece's width in bits; `None` means the width of its
    /// location.
    pub size_in_bits: Option<u64>,
    /// Where the piece starts within its location; `None` means the next
    /// byte boundary.
    pub bit_offset: Option<u64>,
    /// Where the piece lives.
    pub location: Location<R>,
}

// Branch targets are self-relative and must land inside the expression.
fn compute_pc<R: Reader>(pc: &R, bytecode: &R, offset: i16) -> Result<R> {
    let pc_offset = pc.offset_from(bytecode);
    let new_pc_offset = pc_offset.wrapping_add(offset as usize);
    if new_pc_offset > bytecode.len() {
        Err(Error::BadBranchTarget(new_pc_offset as u64))
    } else {
        let mut new_pc = bytecode.clone();
        new_pc.skip(new_pc_offset)?;
        Ok(new_pc)
    }
}

impl<R: Reader> Operation<R> {
    /// Decode the operation at the front of `bytes`.
    ///
    /// `bytecode` must be the whole expression that `bytes` points into;
    /// branch operations need it to validate and resolve their targets.
    pub fn parse(bytes: &mut R, bytecode: &R, encoding: Encoding) -> Result<Operation<R>> {
        let opcode = bytes.read_u8()?;
        let name = constants::DwOp(opcode);
        match name {
            constants::DW_OP_addr => {
                let address = bytes.read_address(encoding.address_size)?;
                Ok(Operation::Address { address })
            }
            constants::DW_OP_deref => Ok(Operation::Deref {
                base_type: generic_type(),
                size: encoding.address_size,
                space: false,
            }),
            constants::DW_OP_const1u => {
                let value = bytes.read_u8()?;
                Ok(Operation::Literal {
                    value: u64::from(value),
                })
            }
            constants::DW_OP_const1s => {
                let value = bytes.read_i8()?;
                Ok(Operation::Literal {
                    value: value as u64,
                })
            }
            constants::DW_OP_const2u => {
                let value = bytes.read_u16()?;
                Ok(Operation::Literal {
                    value: u64::from(value),
                })
            }
            constants::DW_OP_const2s => {
                let value = bytes.read_i16()?;
                Ok(Operation::Literal {
                    value: value as u64,
                })
            }
            constants::DW_OP_const4u => {
                let value = bytes.read_u32()?;
                Ok(Operation::Literal {
                    value: u64::from(value),
                })
            }
            constants::DW_OP_const4s => {
                let value = bytes.read_i32()?;
                Ok(Operation::Literal {
                    value: value as u64,
                })
            }
            constants::DW_OP_const8u => {
                let value = bytes.read_u64()?;
                Ok(Operation::Literal { value })
            }
            constants::DW_OP_const8s => {
                let value = bytes.read_i64()?;
                Ok(Operation::Literal {
                    value: value as u64,
                })
            }
            constants::DW_OP_constu => {
                let value = bytes.read_uleb128()?;
                Ok(Operation::Literal { value })
            }
            constants::DW_OP_consts => {
                let value = bytes.read_sleb128()?;
                Ok(Operation::Literal {
                    value: value as u64,
                })
            }
            constants::DW_OP_dup => Ok(Operation::Pick { index: 0 }),
            constants::DW_OP_drop => Ok(Operation::Drop),
            constants::DW_OP_over => Ok(Operation::Pick { index: 1 }),
            constants::DW_OP_pick => {
                let value = bytes.read_u8()?;
                Ok(Operation::Pick { index: value })
            }
            constants::DW_OP_swap => Ok(Operation::Swap),
            constants::DW_OP_rot => Ok(Operation::Rot),
            constants::DW_OP_xderef => Ok(Operation::Deref {
                base_type: generic_type(),
                size: encoding.address_size,
                space: true,
            }),
            constants::DW_OP_abs => Ok(Operation::Abs),
            constants::DW_OP_and => Ok(Operation::And),
            constants::DW_OP_div => Ok(Operation::Div),
            constants::DW_OP_minus => Ok(Operation::Minus),
            constants::DW_OP_mod => Ok(Operation::Mod),
            constants::DW_OP_mul => Ok(Operation::Mul),
            constants::DW_OP_neg => Ok(Operation::Neg),
            constants::DW_OP_not => Ok(Operation::Not),
            constants::DW_OP_or => Ok(Operation::Or),
            constants::DW_OP_plus => Ok(Operation::Plus),
            constants::DW_OP_plus_uconst => {
                let value = bytes.read_uleb128()?;
                Ok(Operation::PlusConstant { value })
            }
            constants::DW_OP_shl => Ok(Operation::Shl),
            constants::DW_OP_shr => Ok(Operation::Shr),
            constants::DW_OP_shra => Ok(Operation::Shra),
            constants::DW_OP_xor => Ok(Operation::Xor),
            constants::DW_OP_bra => {
                let value = bytes.read_i16()?;
                Ok(Operation::Bra {
                    target: compute_pc(bytes, bytecode, value)?,
                })
            }
            constants::DW_OP_eq => Ok(Operation::Eq),
            constants::DW_OP_ge => Ok(Operation::Ge),
            constants::DW_OP_gt => Ok(Operation::Gt),
            constants::DW_OP_le => Ok(Operation::Le),
            constants::DW_OP_lt => Ok(Operation::Lt),
            constants::DW_OP_ne => Ok(Operation::Ne),
            constants::DW_OP_skip => {
                let value = bytes.read_i16()?;
                Ok(Operation::Skip {
                    target: compute_pc(bytes, bytecode, value)?,
                })
            }
            constants::DW_OP_lit0
            | constants::DW_OP_lit1
            | constants::DW_OP_lit2
            | constants::DW_OP_lit3
            | constants::DW_OP_lit4
            | constants::DW_OP_lit5
            | constants::DW_OP_lit6
            | constants::DW_OP_lit7
            | constants::DW_OP_lit8
            | constants::DW_OP_lit9
            | constants::DW_OP_lit10
            | constants::DW_OP_lit11
            | constants::DW_OP_lit12
            | constants::DW_OP_lit13
            | constants::DW_OP_lit14
            | constants::DW_OP_lit15
            | constants::DW_OP_lit16
            | constants::DW_OP_lit17
            | constants::DW_OP_lit18
            | constants::DW_OP_lit19
            | constants::DW_OP_lit20
            | constants::DW_OP_lit21
            | constants::DW_OP_lit22
            | constants::DW_OP_lit23
            | constants::DW_OP_lit24
            | constants::DW_OP_lit25
            | constants::DW_OP_lit26
            | constants::DW_OP_lit27
            | constants::DW_OP_lit28
            | constants::DW_OP_lit29
            | constants::DW_OP_lit30
            | constants::DW_OP_lit31 => Ok(Operation::Literal {
                value: u64::from(opcode - constants::DW_OP_lit0.0),
            }),
            constants::DW_OP_reg0
            | constants::DW_OP_reg1
            | constants::DW_OP_reg2
            | constants::DW_OP_reg3
            | constants::DW_OP_reg4
            | constants::DW_OP_reg5
            | constants::DW_OP_reg6
            | constants::DW_OP_reg7
            | constants::DW_OP_reg8
            | constants::DW_OP_reg9
            | constants::DW_OP_reg10
            | constants::DW_OP_reg11
            | constants::DW_OP_reg12
            | constants::DW_OP_reg13
            | constants::DW_OP_reg14
            | constants::DW_OP_reg15
            | constants::DW_OP_reg16
            | constants::DW_OP_reg17
            | constants::DW_OP_reg18
            | constants::DW_OP_reg19
            | constants::DW_OP_reg20
            | constants::DW_OP_reg21
            | constants::DW_OP_reg22
            | constants::DW_OP_reg23
            | constants::DW_OP_reg24
            | constants::DW_OP_reg25
            | constants::DW_OP_reg26
            | constants::DW_OP_reg27
            | constants::DW_OP_reg28
            | constants::DW_OP_reg29
            | constants::DW_OP_reg30
            | constants::DW_OP_reg31 => Ok(Operation::Register {
                register: Register(u16::from(opcode - constants::DW_OP_reg0.0)),
            }),
            constants::DW_OP_breg0
            | constants::DW_OP_breg1
            | constants::DW_OP_breg2
            | constants::DW_OP_breg3
            | constants::DW_OP_breg4
            | constants::DW_OP_breg5
            | constants::DW_OP_breg6
            | constants::DW_OP_breg7
            | constants::DW_OP_breg8
            | constants::DW_OP_breg9
            | constants::DW_OP_breg10
            | constants::DW_OP_breg11
            | constants::DW_OP_breg12
            | constants::DW_OP_breg13
            | constants::DW_OP_breg14
            | constants::DW_OP_breg15
            | constants::DW_OP_breg16
            | constants::DW_OP_breg17
            | constants::DW_OP_breg18
            | constants::DW_OP_breg19
            | constants::DW_OP_breg20
            | constants::DW_OP_breg21
            | constants::DW_OP_breg22
            | constants::DW_OP_breg23
            | constants::DW_OP_breg24
            | constants::DW_OP_breg25
            | constants::DW_OP_breg26
            | constants::DW_OP_breg27
            | constants::DW_OP_breg28
            | constants::DW_OP_breg29
            | constants::DW_OP_breg30
            | constants::DW_OP_breg31 => {
                let value = bytes.read_sleb128()?;
                Ok(Operation::RegisterOffset {
                    register: Register(u16::from(opcode - constants::DW_OP_breg0.0)),
                    offset: value,
                    base_type: generic_type(),
                })
            }
            constants::DW_OP_regx => {
                let register = bytes.read_uleb128().and_then(Register::from_u64)?;
                Ok(Operation::Register { register })
            }
            constants::DW_OP_fbreg => {
                let value = bytes.read_sleb128()?;
                Ok(Operation::FrameOffset { offset: value })
            }
            constants::DW_OP_bregx => {
                let register = bytes.read_uleb128().and_then(Register::from_u64)?;
                let offset = bytes.read_sleb128()?;
                Ok(Operation::RegisterOffset {
                    register,
                    offset,
                    base_type: generic_type(),
                })
            }
            constants::DW_OP_piece => {
                let size = bytes.read_uleb128()?;
                Ok(Operation::Piece {
                    size_in_bits: 8 * size,
                    bit_offset: None,
                })
            }
            constants::DW_OP_deref_size => {
                let size = bytes.read_u8()?;
                if size > encoding.address_size {
                    return Err(Error::BadDerefSize(size));
                }
                Ok(Operation::Deref {
                    base_type: generic_type(),
                    size,
                    space: false,
                })
            }
            constants::DW_OP_xderef_size => {
                let size = bytes.read_u8()?;
                if size > encoding.address_size {
                    return Err(Error::BadDerefSize(size));
                }
                Ok(Operation::Deref {
                    base_type: generic_type(),
                    size,
                    space: true,
                })
            }
            constants::DW_OP_nop => Ok(Operation::Nop),
            constants::DW_OP_push_object_address => Ok(Operation::PushObjectAddress),
            constants::DW_OP_call2 => {
                let value = bytes.read_u16()?;
                Ok(Operation::Call {
                    offset: DieReference::UnitRef(UnitOffset(value as usize)),
                })
            }
            constants::DW_OP_call4 => {
                let value = bytes.read_u32()?;
                Ok(Operation::Call {
                    offset: DieReference::UnitRef(UnitOffset(value as usize)),
                })
            }
            constants::DW_OP_call_ref => {
                let value = bytes.read_offset(encoding.format)?;
                Ok(Operation::Call {
                    offset: DieReference::DebugInfoRef(DebugInfoOffset(value)),
                })
            }
            constants::DW_OP_form_tls_address | constants::DW_OP_GNU_push_tls_address => {
                Ok(Operation::Tls)
            }
            constants::DW_OP_call_frame_cfa => Ok(Operation::CallFrameCfa),
            constants::DW_OP_bit_piece => {
                let size = bytes.read_uleb128()?;
                let offset = bytes.read_uleb128()?;
                Ok(Operation::Piece {
                    size_in_bits: size,
                    bit_offset: Some(offset),
                })
            }
            constants::DW_OP_implicit_value => {
                let len = bytes.read_uleb128_usize()?;
                let data = bytes.split(len)?;
                Ok(Operation::ImplicitValue { data })
            }
            constants::DW_OP_stack_value => Ok(Operation::StackValue),
            constants::DW_OP_implicit_pointer | constants::DW_OP_GNU_implicit_pointer => {
                let value = if encoding.version == 2 {
                    bytes
                        .read_address(encoding.address_size)
                        .and_then(cast_offset)?
                } else {
                    bytes.read_offset(encoding.format)?
                };
                let byte_offset = bytes.read_sleb128()?;
                Ok(Operation::ImplicitPointer {
                    value: DebugInfoOffset(value),
                    byte_offset,
                })
            }
            constants::DW_OP_addrx | constants::DW_OP_GNU_addr_index => {
                let index = bytes.read_uleb128_usize()?;
                Ok(Operation::AddressIndex {
                    index: DebugAddrIndex(index),
                })
            }
            constants::DW_OP_constx | constants::DW_OP_GNU_const_index => {
                let index = bytes.read_uleb128_usize()?;
                Ok(Operation::ConstantIndex {
                    index: DebugAddrIndex(index),
                })
            }
            constants::DW_OP_entry_value | constants::DW_OP_GNU_entry_value => {
                let len = bytes.read_uleb128_usize()?;
                let expression = bytes.split(len)?;
                Ok(Operation::EntryValue { expression })
            }
            constants::DW_OP_GNU_parameter_ref => {
                let value = bytes.read_u32()?;
                Ok(Operation::ParameterRef {
                    offset: UnitOffset(value as usize),
                })
            }
            constants::DW_OP_const_type | constants::DW_OP_GNU_const_type => {
                let base_type = bytes.read_uleb128_usize()?;
                let len = bytes.read_u8()?;
                let value = bytes.split(len as usize)?;
                Ok(Operation::TypedLiteral {
                    base_type: UnitOffset(base_type),
                    value,
                })
            }
            constants::DW_OP_regval_type | constants::DW_OP_GNU_regval_type => {
                let register = bytes.read_uleb128().and_then(Register::from_u64)?;
                let base_type = bytes.read_uleb128_usize()?;
                Ok(Operation::RegisterOffset {
                    register,
                    offset: 0,
                    base_type: UnitOffset(base_type),
                })
            }
            constants::DW_OP_deref_type | constants::DW_OP_GNU_deref_type => {
                let size = bytes.read_u8()?;
                if size > encoding.address_size {
                    return Err(Error::BadDerefSize(size));
                }
                let base_type = bytes.read_uleb128_usize()?;
                Ok(Operation::Deref {
                    base_type: UnitOffset(base_type),
                    size,
                    space: false,
                })
            }
            constants::DW_OP_xderef_type => {
                let size = bytes.read_u8()?;
                if size > encoding.address_size {
                    return Err(Error::BadDerefSize(size));
                }
                let base_type = bytes.read_uleb128_usize()?;
                Ok(Operation::Deref {
                    base_type: UnitOffset(base_type),
                    size,
                    space: true,
                })
            }
            constants::DW_OP_convert | constants::DW_OP_GNU_convert => {
                let base_type = bytes.read_uleb128_usize()?;
                Ok(Operation::Convert {
                    base_type: UnitOffset(base_type),
                })
            }
            constants::DW_OP_reinterpret | constants::DW_OP_GNU_reinterpret => {
                let base_type = bytes.read_uleb128_usize()?;
                Ok(Operation::Reinterpret {
                    base_type: UnitOffset(base_type),
                })
            }
            _ => Err(Error::UnknownExpressionOp(name)),
        }
    }
}

/// Stands in for the generic type, the only type the untyped stack can
/// hold.
#[inline]
fn generic_type() -> UnitOffset {
    UnitOffset(0)
}

#[derive(Debug)]
enum EvaluationState<R: Reader> {
    Start(Option<u64>),
    Ready,
    Error(Error),
    Complete,
    Waiting(OperationEvaluationResult<R>),
}

/// What an [`Evaluation`] needs next: nothing (`Complete`), or one
/// piece of outside knowledge, named by the variant.
#[derive(Debug, PartialEq)]
pub enum EvaluationResult<R: Reader> {
    /// Evaluation finished; call [`Evaluation::result`].
    Complete,
    /// A memory load is needed; answer with
    /// [`Evaluation::resume_with_memory`].
    RequiresMemory {
        /// The address to load from.
        address: u64,
        /// How many bytes to load; never wider than the target word.
        size: u8,
        /// A target-specific address space selector, when one was given.
        space: Option<u64>,
    },
    /// A register's value is needed; answer with
    /// [`Evaluation::resume_with_register`].
    RequiresRegister(Register),
    /// The frame base (the evaluated `DW_AT_frame_base` of the current
    /// subprogram) is needed; answer with
    /// [`Evaluation::resume_with_frame_base`].
    RequiresFrameBase,
    /// The thread-local address for this module offset is needed; answer
    /// with [`Evaluation::resume_with_tls`].
    RequiresTls(u64),
    /// The call frame's CFA is needed; answer with
    /// [`Evaluation::resume_with_call_frame_cfa`].
    RequiresCallFrameCfa,
    /// The `DW_AT_location` expression of this DIE is needed; answer
    /// with [`Evaluation::resume_with_at_location`].
    RequiresAtLocation(DieReference),
    /// This sub-expression's value in the subprogram's entry state is
    /// needed; answer with [`Evaluation::resume_with_entry_value`].
    RequiresEntryValue(Expression<R>),
    /// The caller-side value of the parameter defined at this DIE is
    /// needed; answer with [`Evaluation::resume_with_parameter_ref`].
    RequiresParameterRef(UnitOffset),
    /// This address must be relocated; answer with
    /// [`Evaluation::resume_with_relocated_address`].
    RequiresRelocatedAddress(u64),
    /// A `.debug_addr` entry is needed; answer with
    /// [`Evaluation::resume_with_indexed_address`].
    RequiresIndexedAddress {
        /// The index, relative to the unit's `DW_AT_addr_base`.
        index: DebugAddrIndex,
        /// Whether the caller should also relocate the address.
        relocate: bool,
    },
}

/// The raw bytes of an expression or location description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Expression<R: Reader>(pub R);

impl<R: Reader> Expression<R> {
    /// Build an [`Evaluation`] of this expression, decoding with the
    /// owning unit's `encoding`.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use dwarfling::Expression;
    /// # let endian = dwarfling::LittleEndian;
    /// # let debug_info = dwarfling::DebugInfo::from(dwarfling::EndianSlice::new(&[], endian));
    /// # let unit = debug_info.units().next().unwrap().unwrap();
    /// # let bytecode = dwarfling::EndianSlice::new(&[], endian);
    /// let expression = dwarfling::Expression(bytecode);
    /// let mut eval = expression.evaluation(unit.encoding());
    /// let mut result = eval.evaluate().unwrap();
    /// ```
    #[inline]
    pub fn evaluation(self, encoding: Encoding) -> Evaluation<R> {
        Evaluation::new(self.0, encoding)
    }
}

/// A resumable expression evaluator.
///
/// # Usage
/// Expressions routinely need knowledge only the debugger has: register
/// contents, target memory, the frame base. Rather than taking a bundle
/// of callbacks, [`Evaluation::evaluate`] runs until it either completes
/// or returns an [`EvaluationResult::Requires*`][EvaluationResult]
/// value naming the missing datum; the caller supplies it through the
/// matching `resume_with_*` method and evaluation picks up where it
/// stopped. When `Complete` is returned, [`Evaluation::result`] yields
/// the pieces.
///
/// Because the evaluator never calls out, the caller decides how to
/// produce each answer, synchronously as below or from an async
/// executor.
///
/// # Examples
/// ```rust,no_run
/// use dwarfling::{Evaluation, EvaluationResult, EndianSlice, LittleEndian, Format};
/// # let bytecode = EndianSlice::new(&[], LittleEndian);
/// # let encoding = dwarfling::Encoding {
/// #     format: Format::Dwarf32,
/// #     version: 4,
/// #     address_size: 8,
/// # };
/// # let get_register_value = |_| 42;
/// # let get_frame_base = || 0xdeadbeef_u64;
///
/// let mut eval = Evaluation::new(bytecode, encoding);
/// let mut result = eval.evaluate().unwrap();
/// while result != EvaluationResult::Complete {
///     match result {
///         EvaluationResult::RequiresRegister(regno) => {
///             let value = get_register_value(regno);
///             result = eval.resume_with_register(value).unwrap();
///         }
///         EvaluationResult::RequiresFrameBase => {
///             let frame_base = get_frame_base();
///             result = eval.resume_with_frame_base(frame_base).unwrap();
///         }
///         _ => unimplemented!(),
///     };
/// }
///
/// let result = eval.result();
/// println!("{:?}", result);
/// ```
#[derive(Debug)]
pub struct Evaluation<R: Reader> {
    bytecode: R,
    encoding: Encoding,
    object_address: Option<u64>,
    max_iterations: Option<u32>,
    iteration: u32,
    state: EvaluationState<R>,

    // Stack operations are done on word-sized values. We do all
    // operations on 64-bit values, and then mask the results
    // appropriately when popping.
    addr_mask: u64,

    // The stack.
    stack: Vec<u64>,

    // The next operation to decode and evaluate.
    pc: R,

    // If we see a DW_OP_call* operation, the previous PC and bytecode
    // is stored here while evaluating the subroutine.
    expression_stack: Vec<(R, R)>,

    result: Vec<Piece<R>>,
}

impl<R: Reader> Evaluation<R> {
    /// An evaluator over `bytecode` with nothing preset: no initial
    /// stack value, no object address, no iteration bound.
    pub fn new(bytecode: R, encoding: Encoding) -> Evaluation<R> {
        let pc = bytecode.clone();
        Evaluation {
            bytecode,
            encoding,
            object_address: None,
            max_iterations: None,
            iteration: 0,
            state: EvaluationState::Start(None),
            addr_mask: if encoding.address_size == 8 {
                !0u64
            } else {
                (1 << (8 * u64::from(encoding.address_size))) - 1
            },
            stack: Vec::new(),
            expression_stack: Vec::new(),
            pc,
            result: Vec::new(),
        }
    }

    /// Seed the stack with one value before evaluation starts.
    ///
    /// Some attributes, `DW_AT_vtable_elem_location` among them, define
    /// their expressions to consume a value that is already on the
    /// stack.
    ///
    /// # Panics
    /// Panics when called twice, or after `evaluate`.
    pub fn set_initial_value(&mut self, value: u64) {
        match self.state {
            EvaluationState::Start(None) => {
                self.state = EvaluationState::Start(Some(value));
            }
            _ => panic!(
                "`Evaluation::set_initial_value` was called twice, or after evaluation began."
            ),
        };
    }

    /// Supply the enclosing object's address for
    /// `DW_OP_push_object_address`. Expressions that use that opcode
    /// fail with [`Error::MissingObjectAddress`] if none was set.
    pub fn set_object_address(&mut self, value: u64) {
        self.object_address = Some(value);
    }

    /// Bound how many operations may execute.
    ///
    /// Expressions can branch backwards, so hostile bytecode can loop
    /// forever; a limit turns that into [`Error::TooManyIterations`].
    /// There is no limit until one is set, and setting one cannot be
    /// undone.
    pub fn set_max_iterations(&mut self, value: u32) {
        self.max_iterations = Some(value);
    }

    fn pop(&mut self) -> Result<u64> {
        match self.stack.pop() {
            Some(value) => Ok(value & self.addr_mask),
            None => Err(Error::StackUnderflow),
        }
    }

    fn pop_signed(&mut self) -> Result<i64> {
        match self.stack.pop() {
            Some(value) => {
                let mut value = value & self.addr_mask;
                let address_size = self.encoding.address_size;
                if address_size < 8 && (value & (1u64 << (8 * address_size - 1))) != 0 {
                    // Sign extend.
                    value |= !self.addr_mask;
                }
                Ok(value as i64)
            }
            None => Err(Error::StackUnderflow),
        }
    }

    fn push(&mut self, value: u64) {
        self.stack.push(value);
    }

    fn evaluate_one_operation(
        &mut self,
        operation: &Operation<R>,
    ) -> Result<OperationEvaluationResult<R>> {
        let mut terminated = false;
        let mut piece_end = false;
        let mut current_location = Location::Empty;

        match *operation {
            Operation::Deref {
                base_type,
                size,
                space,
            } => {
                if base_type != generic_type() {
                    return Err(Error::UnsupportedEvaluation);
                }
                let addr = self.pop()?;
                let addr_space = if space { Some(self.pop()?) } else { None };
                return Ok(OperationEvaluationResult::AwaitingMemory {
                    address: addr,
                    size,
                    space: addr_space,
                });
            }

            Operation::Drop => {
                self.pop()?;
            }
            Operation::Pick { index } => {
                let len = self.stack.len();
                let index = index as usize;
                if index >= len {
                    return Err(Error::StackUnderflow);
                }
                let value = self.stack[len - index - 1];
                self.push(value);
            }
            Operation::Swap => {
                let top = self.pop()?;
                let next = self.pop()?;
                self.push(top);
                self.push(next);
            }
            Operation::Rot => {
                let one = self.pop()?;
                let two = self.pop()?;
                let three = self.pop()?;
                self.push(one);
                self.push(three);
                self.push(two);
            }

            Operation::Abs => {
                let value = self.pop_signed()?;
                self.push(value.wrapping_abs() as u64);
            }
            Operation::And => {
                let v1 = self.pop()?;
                let v2 = self.pop()?;
                self.push(v2 & v1);
            }
            Operation::Div => {
                let v1 = self.pop_signed()?;
                let v2 = self.pop_signed()?;
                if v1 == 0 {
                    return Err(Error::DivisionByZero);
                }
                self.push(v2.wrapping_div(v1) as u64);
            }
            Operation::Minus => {
                let v1 = self.pop()?;
                let v2 = self.pop()?;
                self.push(v2.wrapping_sub(v1));
            }
            Operation::Mod => {
                let v1 = self.pop()?;
                let v2 = self.pop()?;
                if v1 == 0 {
                    return Err(Error::DivisionByZero);
                }
                self.push(v2.wrapping_rem(v1));
            }
            Operation::Mul => {
                let v1 = self.pop()?;
                let v2 = self.pop()?;
                self.push(v2.wrapping_mul(v1));
            }
            Operation::Neg => {
                let v = self.pop()?;
                self.push(v.wrapping_neg());
            }
            Operation::Not => {
                let value = self.pop()?;
                self.push(!value);
            }
            Operation::Or => {
                let v1 = self.pop()?;
                let v2 = self.pop()?;
                self.push(v2 | v1);
            }
            Operation::Plus => {
                let v1 = self.pop()?;
                let v2 = self.pop()?;
                self.push(v2.wrapping_add(v1));
            }
            Operation::PlusConstant { value } => {
                let v = self.pop()?;
                self.push(v.wrapping_add(value));
            }
            Operation::Shl => {
                let v1 = self.pop()?;
                let v2 = self.pop()?;
                // The number of bits is all of the 64-bit stack slot, so
                // the check is done by hand.
                if v1 >= 64 {
                    self.push(0);
                } else {
                    self.push(v2 << v1);
                }
            }
            Operation::Shr => {
                let v1 = self.pop()?;
                let v2 = self.pop()?;
                if v1 >= 64 {
                    self.push(0);
                } else {
                    self.push(v2 >> v1);
                }
            }
            Operation::Shra => {
                let v1 = self.pop()?;
                let v2 = self.pop_signed()?;
                if v1 >= 64 {
                    if v2 < 0 {
                        self.push(!0u64);
                    } else {
                        self.push(0);
                    }
                } else {
                    self.push((v2 >> v1) as u64);
                }
            }
            Operation::Xor => {
                let v1 = self.pop()?;
                let v2 = self.pop()?;
                self.push(v2 ^ v1);
            }

            Operation::Bra { ref target } => {
                let v = self.pop()?;
                if v != 0 {
                    self.pc = target.clone();
                }
            }

            Operation::Eq => {
                let v1 = self.pop_signed()?;
                let v2 = self.pop_signed()?;
                self.push(u64::from(v2 == v1));
            }
            Operation::Ge => {
                let v1 = self.pop_signed()?;
                let v2 = self.pop_signed()?;
                self.push(u64::from(v2 >= v1));
            }
            Operation::Gt => {
                let v1 = self.pop_signed()?;
                let v2 = self.pop_signed()?;
                self.push(u64::from(v2 > v1));
            }
            Operation::Le => {
                let v1 = self.pop_signed()?;
                let v2 = self.pop_signed()?;
                self.push(u64::from(v2 <= v1));
            }
            Operation::Lt => {
                let v1 = self.pop_signed()?;
                let v2 = self.pop_signed()?;
                self.push(u64::from(v2 < v1));
            }
            Operation::Ne => {
                let v1 = self.pop_signed()?;
                let v2 = self.pop_signed()?;
                self.push(u64::from(v2 != v1));
            }

            Operation::Skip { ref target } => {
                self.pc = target.clone();
            }

            Operation::Literal { value } => {
                self.push(value);
            }

            Operation::TypedLiteral { .. }
            | Operation::Convert { .. }
            | Operation::Reinterpret { .. } => {
                // The untyped stack cannot represent typed values.
                return Err(Error::UnsupportedEvaluation);
            }

            Operation::RegisterOffset {
                register,
                offset,
                base_type,
            } => {
                if base_type != generic_type() {
                    return Err(Error::UnsupportedEvaluation);
                }
                return Ok(OperationEvaluationResult::AwaitingRegister {
                    register,
                    offset: offset as u64,
                });
            }

            Operation::FrameOffset { offset } => {
                return Ok(OperationEvaluationResult::AwaitingFrameBase {
                    offset: offset as u64,
                });
            }

            Operation::Nop => {}

            Operation::PushObjectAddress => {
                if let Some(value) = self.object_address {
                    self.push(value);
                } else {
                    return Err(Error::MissingObjectAddress);
                }
            }

            Operation::Call { offset } => {
                return Ok(OperationEvaluationResult::AwaitingAtLocation { location: offset });
            }

            Operation::Tls => {
                let value = self.pop()?;
                return Ok(OperationEvaluationResult::AwaitingTls { index: value });
            }

            Operation::CallFrameCfa => {
                return Ok(OperationEvaluationResult::AwaitingCfa);
            }

            Operation::Register { register } => {
                terminated = true;
                current_location = Location::Register { register };
            }

            Operation::ImplicitValue { ref data } => {
                terminated = true;
                current_location = Location::Bytes {
                    value: data.clone(),
                };
            }

            Operation::StackValue => {
                terminated = true;
                current_location = Location::Value {
                    value: self.pop()?,
                };
            }

            Operation::ImplicitPointer { value, byte_offset } => {
                terminated = true;
                current_location = Location::ImplicitPointer { value, byte_offset };
            }

            Operation::EntryValue { ref expression } => {
                return Ok(OperationEvaluationResult::AwaitingEntryValue {
                    expression: Expression(expression.clone()),
                });
            }

            Operation::ParameterRef { offset } => {
                return Ok(OperationEvaluationResult::AwaitingParameterRef { parameter: offset });
            }

            Operation::Address { address } => {
                return Ok(OperationEvaluationResult::AwaitingRelocatedAddress { address });
            }

            Operation::AddressIndex { index } => {
                return Ok(OperationEvaluationResult::AwaitingIndexedAddress {
                    index,
                    relocate: true,
                });
            }

            Operation::ConstantIndex { index } => {
                return Ok(OperationEvaluationResult::AwaitingIndexedAddress {
                    index,
                    relocate: false,
                });
            }

            Operation::Piece { .. } => {
                piece_end = true;
            }
        }

        Ok(OperationEvaluationResult::Complete {
            terminated,
            piece_end,
            current_location,
        })
    }

    /// The evaluated pieces.
    ///
    /// # Panics
    /// Panics unless evaluation has returned
    /// [`EvaluationResult::Complete`].
    pub fn result(self) -> Vec<Piece<R>> {
        match self.state {
            EvaluationState::Complete => self.result,
            _ => {
                panic!("Called `Evaluation::result` on an `Evaluation` that has not been completed")
            }
        }
    }

    /// Start evaluating, running until completion or the first missing
    /// datum. Call once; afterwards use the `resume_with_*` method named
    /// by the returned [`EvaluationResult`].
    pub fn evaluate(&mut self) -> Result<EvaluationResult<R>> {
        match self.state {
            EvaluationState::Start(initial_value) => {
                if let Some(value) = initial_value {
                    self.push(value);
                }
                self.state = EvaluationState::Ready;
            }
            EvaluationState::Ready => {}
            EvaluationState::Error(err) => return Err(err),
            EvaluationState::Complete => return Ok(EvaluationResult::Complete),
            EvaluationState::Waiting(_) => panic!(),
        };

        match self.evaluate_internal() {
            Ok(r) => Ok(r),
            Err(e) => {
                self.state = EvaluationState::Error(e);
                Err(e)
            }
        }
    }

    /// Answer a [`EvaluationResult::RequiresMemory`] with the loaded
    /// value and continue evaluating.
    ///
    /// # Panics
    /// Panics if the last result was not `RequiresMemory`.
    pub fn resume_with_memory(&mut self, value: u64) -> Result<EvaluationResult<R>> {
        match self.state {
            EvaluationState::Error(err) => return Err(err),
            EvaluationState::Waiting(OperationEvaluationResult::AwaitingMemory { .. }) => {
                self.push(value);
            }
            _ => panic!(
                "Called `Evaluation::resume_with_memory` without a preceding `EvaluationResult::RequiresMemory`"
            ),
        };

        self.evaluate_internal()
    }

    /// Answer a [`EvaluationResult::RequiresRegister`] with the
    /// register's value and continue evaluating.
    ///
    /// # Panics
    /// Panics if the last result was not `RequiresRegister`.
    pub fn resume_with_register(&mut self, value: u64) -> Result<EvaluationResult<R>> {
        match self.state {
            EvaluationState::Error(err) => return Err(err),
            EvaluationState::Waiting(OperationEvaluationResult::AwaitingRegister {
                offset, ..
            }) => {
                self.push(value.wrapping_add(offset));
            }
            _ => panic!(
                "Called `Evaluation::resume_with_register` without a preceding `EvaluationResult::RequiresRegister`"
            ),
        };

        self.evaluate_internal()
    }

    /// Answer a [`EvaluationResult::RequiresFrameBase`] and continue
    /// evaluating.
    ///
    /// # Panics
    /// Panics if the last result was not `RequiresFrameBase`.
    pub fn resume_with_frame_base(&mut self, frame_base: u64) -> Result<EvaluationResult<R>> {
        match self.state {
            EvaluationState::Error(err) => return Err(err),
            EvaluationState::Waiting(OperationEvaluationResult::AwaitingFrameBase { offset }) => {
                self.push(frame_base.wrapping_add(offset));
            }
            _ => panic!(
                "Called `Evaluation::resume_with_frame_base` without a preceding `EvaluationResult::RequiresFrameBase`"
            ),
        };

        self.evaluate_internal()
    }

    /// Answer a [`EvaluationResult::RequiresTls`] with the resolved
    /// thread-local address and continue evaluating.
    ///
    /// # Panics
    /// Panics if the last result was not `RequiresTls`.
    pub fn resume_with_tls(&mut self, value: u64) -> Result<EvaluationResult<R>> {
        match self.state {
            EvaluationState::Error(err) => return Err(err),
            EvaluationState::Waiting(OperationEvaluationResult::AwaitingTls { .. }) => {
                self.push(value);
            }
            _ => panic!(
                "Called `Evaluation::resume_with_tls` without a preceding `EvaluationResult::RequiresTls`"
            ),
        };

        self.evaluate_internal()
    }

    /// Answer a [`EvaluationResult::RequiresCallFrameCfa`] and continue
    /// evaluating.
    ///
    /// # Panics
    /// Panics if the last result was not `RequiresCallFrameCfa`.
    pub fn resume_with_call_frame_cfa(&mut self, cfa: u64) -> Result<EvaluationResult<R>> {
        match self.state {
            EvaluationState::Error(err) => return Err(err),
            EvaluationState::Waiting(OperationEvaluationResult::AwaitingCfa) => {
                self.push(cfa);
            }
            _ => panic!(
                "Called `Evaluation::resume_with_call_frame_cfa` without a preceding `EvaluationResult::RequiresCallFrameCfa`"
            ),
        };

        self.evaluate_internal()
    }

    /// Answer a [`EvaluationResult::RequiresAtLocation`] with the
    /// referenced DIE's location bytes; they run as a subroutine before
    /// the outer expression continues.
    ///
    /// # Panics
    /// Panics if the last result was not `RequiresAtLocation`.
    pub fn resume_with_at_location(&mut self, mut bytes: R) -> Result<EvaluationResult<R>> {
        match self.state {
            EvaluationState::Error(err) => return Err(err),
            EvaluationState::Waiting(OperationEvaluationResult::AwaitingAtLocation { .. }) => {
                if !bytes.is_empty() {
                    let mut pc = bytes.clone();
                    mem::swap(&mut pc, &mut self.pc);
                    mem::swap(&mut bytes, &mut self.bytecode);
                    self.expression_stack.push((pc, bytes));
                }
            }
            _ => panic!(
                "Called `Evaluation::resume_with_at_location` without a preceding `EvaluationResult::RequiresAtLocation`"
            ),
        };

        self.evaluate_internal()
    }

    /// Answer a [`EvaluationResult::RequiresEntryValue`] and continue
    /// evaluating.
    ///
    /// # Panics
    /// Panics if the last result was not `RequiresEntryValue`.
    pub fn resume_with_entry_value(&mut self, entry_value: u64) -> Result<EvaluationResult<R>> {
        match self.state {
            EvaluationState::Error(err) => return Err(err),
            EvaluationState::Waiting(OperationEvaluationResult::AwaitingEntryValue { .. }) => {
                self.push(entry_value);
            }
            _ => panic!(
                "Called `Evaluation::resume_with_entry_value` without a preceding `EvaluationResult::RequiresEntryValue`"
            ),
        };

        self.evaluate_internal()
    }

    /// Answer a [`EvaluationResult::RequiresParameterRef`] and continue
    /// evaluating.
    ///
    /// # Panics
    /// Panics if the last result was not `RequiresParameterRef`.
    pub fn resume_with_parameter_ref(
        &mut self,
        parameter_value: u64,
    ) -> Result<EvaluationResult<R>> {
        match self.state {
            EvaluationState::Error(err) => return Err(err),
            EvaluationState::Waiting(OperationEvaluationResult::AwaitingParameterRef { .. }) => {
                self.push(parameter_value);
            }
            _ => panic!(
                "Called `Evaluation::resume_with_parameter_ref` without a preceding `EvaluationResult::RequiresParameterRef`"
            ),
        };

        self.evaluate_internal()
    }

    /// Answer a [`EvaluationResult::RequiresRelocatedAddress`] and
    /// continue evaluating.
    ///
    /// # Panics
    /// Panics if the last result was not `RequiresRelocatedAddress`.
    pub fn resume_with_relocated_address(&mut self, address: u64) -> Result<EvaluationResult<R>> {
        match self.state {
            EvaluationState::Error(err) => return Err(err),
            EvaluationState::Waiting(OperationEvaluationResult::AwaitingRelocatedAddress {
                ..
            }) => {
                self.push(address);
            }
            _ => panic!(
                "Called `Evaluation::resume_with_relocated_address` without a preceding `EvaluationResult::RequiresRelocatedAddress`"
            ),
        };

        self.evaluate_internal()
    }

    /// Answer a [`EvaluationResult::RequiresIndexedAddress`] with the
    /// `.debug_addr` entry (relocated when asked for) and continue
    /// evaluating.
    ///
    /// # Panics
    /// Panics if the last result was not `RequiresIndexedAddress`.
    pub fn resume_with_indexed_address(&mut self, address: u64) -> Result<EvaluationResult<R>> {
        match self.state {
            EvaluationState::Error(err) => return Err(err),
            EvaluationState::Waiting(OperationEvaluationResult::AwaitingIndexedAddress {
                ..
            }) => {
                self.push(address);
            }
            _ => panic!(
                "Called `Evaluation::resume_with_indexed_address` without a preceding `EvaluationResult::RequiresIndexedAddress`"
            ),
        };

        self.evaluate_internal()
    }

    fn evaluate_internal(&mut self) -> Result<EvaluationResult<R>> {
        'eval: loop {
            while self.pc.is_empty() {
                match self.expression_stack.pop() {
                    Some((newpc, newbytes)) => {
                        self.pc = newpc;
                        self.bytecode = newbytes;
                    }
                    None => break 'eval,
                }
            }

            self.iteration += 1;
            if let Some(max_iterations) = self.max_iterations {
                if self.iteration > max_iterations {
                    return Err(Error::TooManyIterations);
                }
            }

            let operation = Operation::parse(&mut self.pc, &self.bytecode, self.encoding)?;

            let op_result = self.evaluate_one_operation(&operation)?;
            match op_result {
                OperationEvaluationResult::Complete {
                    terminated,
                    piece_end,
                    mut current_location,
                } => {
                    if piece_end || terminated {
                        // If we saw a piece end, like Piece, then we want
                        // to use the operation we already decoded to see
                        // what to do. Otherwise, we saw something like
                        // Register, so we want to decode the next
                        // operation.
                        let eof = !piece_end && self.pc.is_empty();
                        let mut pieceop = operation;
                        if !terminated {
                            // We saw a piece operation without something
                            // terminating the expression. This means the
                            // result is the address on the stack.
                            debug_assert!(current_location.is_empty());
                            if !self.stack.is_empty() {
                                current_location = Location::Address {
                                    address: self.pop()?,
                                };
                            }
                        } else if !eof {
                            pieceop =
                                Operation::parse(&mut self.pc, &self.bytecode, self.encoding)?;
                        }
                        match pieceop {
                            _ if eof => {
                                if !self.result.is_empty() {
                                    // We saw a piece earlier and then
                                    // some unterminated piece. It's not
                                    // clear this is well-defined.
                                    return Err(Error::MisplacedPiece);
                                }
                                self.result.push(Piece {
                                    size_in_bits: None,
                                    bit_offset: None,
                                    location: current_location,
                                });
                            }

                            Operation::Piece {
                                size_in_bits,
                                bit_offset,
                            } => {
                                self.result.push(Piece {
                                    size_in_bits: Some(size_in_bits),
                                    bit_offset,
                                    location: current_location,
                                });
                            }

                            _ => {
                                let value = self.bytecode.len() - self.pc.len() - 1;
                                return Err(Error::TrailingOperations(value as u64));
                            }
                        }
                    }
                }
                OperationEvaluationResult::AwaitingMemory {
                    address,
                    size,
                    space,
                } => {
                    self.state = EvaluationState::Waiting(op_result);
                    return Ok(EvaluationResult::RequiresMemory {
                        address,
                        size,
                        space,
                    });
                }
                OperationEvaluationResult::AwaitingRegister { register, .. } => {
                    self.state = EvaluationState::Waiting(op_result);
                    return Ok(EvaluationResult::RequiresRegister(register));
                }
                OperationEvaluationResult::AwaitingFrameBase { .. } => {
                    self.state = EvaluationState::Waiting(op_result);
                    return Ok(EvaluationResult::RequiresFrameBase);
                }
                OperationEvaluationResult::AwaitingTls { index } => {
                    self.state = EvaluationState::Waiting(op_result);
                    return Ok(EvaluationResult::RequiresTls(index));
                }
                OperationEvaluationResult::AwaitingCfa => {
                    self.state = EvaluationState::Waiting(op_result);
                    return Ok(EvaluationResult::RequiresCallFrameCfa);
                }
                OperationEvaluationResult::AwaitingAtLocation { location } => {
                    self.state = EvaluationState::Waiting(op_result);
                    return Ok(EvaluationResult::RequiresAtLocation(location));
                }
                OperationEvaluationResult::AwaitingEntryValue { ref expression } => {
                    let expression = expression.clone();
                    self.state = EvaluationState::Waiting(op_result.clone());
                    return Ok(EvaluationResult::RequiresEntryValue(expression));
                }
                OperationEvaluationResult::AwaitingParameterRef { parameter } => {
                    self.state = EvaluationState::Waiting(op_result);
                    return Ok(EvaluationResult::RequiresParameterRef(parameter));
                }
                OperationEvaluationResult::AwaitingRelocatedAddress { address } => {
                    self.state = EvaluationState::Waiting(op_result);
                    return Ok(EvaluationResult::RequiresRelocatedAddress(address));
                }
                OperationEvaluationResult::AwaitingIndexedAddress { index, relocate } => {
                    self.state = EvaluationState::Waiting(op_result);
                    return Ok(EvaluationResult::RequiresIndexedAddress { index, relocate });
                }
            };
        }

        // If no pieces have been seen, use the stack top as the result.
        if self.result.is_empty() {
            let addr = self.pop()?;
            self.result.push(Piece {
                size_in_bits: None,
                bit_offset: None,
                location: Location::Address { address: addr },
            });
        }

        self.state = EvaluationState::Complete;
        Ok(EvaluationResult::Complete)
    }
}
