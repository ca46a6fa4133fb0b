//! `.debug_line`: the line number programs that map machine addresses
//! back to source file, line and column.
//!
//! A [`LineProgram`] owns a parsed [`LineHeader`]. Executing it with
//! [`LineProgram::rows`] replays the state machine and yields one
//! [`LineRow`] per matrix row. For address lookup, a program can be
//! split into [`LineSequence`]s once and a single sequence replayed
//! later with [`LineProgram::resume`], so only the covering sequence is
//! ever executed.
//!
//! The program itself is never mutated during execution;
//! `DW_LNE_define_file` entries (DWARF 4 and earlier) accumulate in a
//! side table owned by the row iterator.

use core::fmt;
use core::num::NonZeroU64;

use crate::common::{DebugLineOffset, DebugLineStrOffset, DebugStrOffset, Encoding, SectionId};
use crate::constants;
use crate::endianity::Endianity;
use crate::read::unit::decode_form;
use crate::read::{AttrSpec, AttributeValue, EndianSlice, Error, Reader, Result, Section};

/// The `.debug_line` section.
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugLine<R> {
    section: R,
}

impl<'input, Endian> DebugLine<EndianSlice<'input, Endian>>
where
    Endian: Endianity,
{
    /// Wrap the raw bytes of a loaded `.debug_line` section.
    pub fn new(section: &'input [u8], endian: Endian) -> Self {
        Self::from(EndianSlice::new(section, endian))
    }
}

impl<R: Reader> DebugLine<R> {
    /// Parse the line number program at `offset`, normally found in a
    /// unit's `DW_AT_stmt_list`.
    ///
    /// `address_size` must be the referencing unit's address size; it is
    /// only used for versions before 5, which did not record it in the
    /// line header. `comp_dir` and `comp_name` likewise come from the
    /// unit and fill in the zero entries that early versions leave
    /// implicit.
    pub fn program(
        &self,
        offset: DebugLineOffset,
        address_size: u8,
        comp_dir: Option<R>,
        comp_name: Option<R>,
    ) -> Result<LineProgram<R>> {
        let mut input = self.section.clone();
        input.skip(offset.0)?;
        let header = LineHeader::parse(&mut input, offset, address_size, comp_dir, comp_name)?;
        Ok(LineProgram { header })
    }
}

impl<R> Section<R> for DebugLine<R> {
    fn id() -> SectionId {
        SectionId::DebugLine
    }

    fn reader(&self) -> &R
    where
        R: Reader,
    {
        &self.section
    }
}

impl<R> From<R> for DebugLine<R> {
    fn from(section: R) -> Self {
        DebugLine { section }
    }
}

/// A parsed line number program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineProgram<R: Reader> {
    header: LineHeader<R>,
}

impl<R: Reader> LineProgram<R> {
    /// The program's header.
    pub fn header(&self) -> &LineHeader<R> {
        &self.header
    }

    /// Execute the whole program, yielding every row of the line matrix.
    pub fn rows(&self) -> LineRows<'_, R> {
        LineRows::new(&self.header, self.header.instructions())
    }

    /// Execute the program once to find its sequences: the contiguous
    /// address ranges it describes, each with the instructions that
    /// rebuild its rows.
    ///
    /// The sequences are returned in program order, which is not
    /// necessarily address order.
    pub fn sequences(&self) -> Result<Vec<LineSequence<R>>> {
        let mut sequences = Vec::new();
        let mut rows = self.rows();
        let mut first_instruction = rows.instructions.clone();
        let mut start = None;
        while rows.next_row()?.is_some() {
            if rows.row.end_sequence() {
                sequences.push(LineSequence {
                    // A producer may emit several end_sequence markers
                    // in a row; the later ones get empty sequences.
                    start: start.take().unwrap_or(0),
                    end: rows.row.address(),
                    instructions: first_instruction.up_to(&rows.instructions)?,
                });
                first_instruction = rows.instructions.clone();
            } else if start.is_none() {
                start = Some(rows.row.address());
            }
        }
        Ok(sequences)
    }

    /// Re-execute just `sequence`, which must have come from
    /// [`Self::sequences`] on this same program.
    pub fn resume(&self, sequence: &LineSequence<R>) -> LineRows<'_, R> {
        LineRows::new(&self.header, sequence.instructions.clone())
    }
}

/// One contiguous address range of a program, with the instructions
/// that cover it.
#[derive(Clone, Debug)]
pub struct LineSequence<R: Reader> {
    /// The first address the sequence covers.
    pub start: u64,
    /// The first address past the sequence.
    pub end: u64,
    instructions: LineInstructions<R>,
}

/// The state machine that turns line instructions into matrix rows.
///
/// Returned by [`LineProgram::rows`] and [`LineProgram::resume`]; the
/// program is borrowed, not consumed.
#[derive(Debug)]
pub struct LineRows<'program, R: Reader> {
    header: &'program LineHeader<R>,
    instructions: LineInstructions<R>,
    row: LineRow,
    // Files appended by DW_LNE_define_file, which this crate keeps out
    // of the shared header.
    extra_files: Vec<FileEntry<R>>,
    row_pending_reset: bool,
    done: bool,
}

impl<'program, R: Reader> LineRows<'program, R> {
    fn new(header: &'program LineHeader<R>, instructions: LineInstructions<R>) -> Self {
        LineRows {
            header,
            instructions,
            row: LineRow::new(header),
            extra_files: Vec::new(),
            row_pending_reset: false,
            done: false,
        }
    }

    /// The header of the program being executed.
    pub fn header(&self) -> &'program LineHeader<R> {
        self.header
    }

    /// Run the program until it completes the next row.
    ///
    /// The returned row borrow is only valid until the next call; copy
    /// out what you need.
    pub fn next_row(&mut self) -> Result<Option<&LineRow>> {
        if self.done {
            return Ok(None);
        }
        if self.row_pending_reset {
            self.row.reset(self.header);
            self.row_pending_reset = false;
        }
        loop {
            match self.instructions.next_instruction(self.header) {
                Ok(Some(instruction)) => {
                    if self.execute(instruction)? {
                        self.row_pending_reset = true;
                        return Ok(Some(&self.row));
                    }
                }
                Ok(None) => {
                    self.done = true;
                    return Ok(None);
                }
                Err(e) => {
                    self.done = true;
                    return Err(e);
                }
            }
        }
    }

    /// Look up a row's file index, including files added by
    /// `DW_LNE_define_file` while executing.
    pub fn file_entry(&self, index: u64) -> Option<&FileEntry<R>> {
        if let Some(entry) = self.header.file(index) {
            return Some(entry);
        }
        if self.header.encoding().version <= 4 {
            let index = usize::try_from(index).ok()?;
            let extra = index.checked_sub(self.header.file_names().len() + 1)?;
            self.extra_files.get(extra)
        } else {
            None
        }
    }

    // Returns true when the instruction completed a row.
    fn execute(&mut self, instruction: LineInstruction<R>) -> Result<bool> {
        if let LineInstruction::DefineFile(entry) = instruction {
            self.extra_files.push(entry);
            return Ok(false);
        }
        self.row.execute(instruction, self.header)
    }
}

/// One row of the line number matrix: the source position assigned to
/// one machine address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineRow {
    address: u64,
    op_index: u64,
    file: u64,
    line: u64,
    column: u64,
    is_stmt: bool,
    basic_block: bool,
    end_sequence: bool,
    prologue_end: bool,
    epilogue_begin: bool,
    isa: u64,
    discriminator: u64,
}

impl LineRow {
    /// The register state at the start of a sequence (DWARF v5 §6.2.2).
    pub fn new<R: Reader>(header: &LineHeader<R>) -> Self {
        LineRow {
            address: 0,
            op_index: 0,
            file: 1,
            line: 1,
            column: 0,
            is_stmt: header.line_encoding.default_is_stmt,
            basic_block: false,
            end_sequence: false,
            prologue_end: false,
            epilogue_begin: false,
            isa: 0,
            discriminator: 0,
        }
    }

    /// The machine address this row describes.
    #[inline]
    pub fn address(&self) -> u64 {
        self.address
    }

    /// The operation index within a VLIW bundle; always 0 on ordinary
    /// architectures.
    #[inline]
    pub fn op_index(&self) -> u64 {
        self.op_index
    }

    /// The index of the source file, resolvable through
    /// [`LineHeader::file`] or [`LineRows::file_entry`].
    #[inline]
    pub fn file_index(&self) -> u64 {
        self.file
    }

    /// The source file, looked up in `header`'s file table.
    #[inline]
    pub fn file<'header, R: Reader>(
        &self,
        header: &'header LineHeader<R>,
    ) -> Option<&'header FileEntry<R>> {
        header.file(self.file)
    }

    /// The source line, or `None` for rows no source line claims.
    #[inline]
    pub fn line(&self) -> Option<NonZeroU64> {
        NonZeroU64::new(self.line)
    }

    /// The source column; zero on disk means the left edge.
    #[inline]
    pub fn column(&self) -> ColumnType {
        match NonZeroU64::new(self.column) {
            Some(column) => ColumnType::Column(column),
            None => ColumnType::LeftEdge,
        }
    }

    /// Whether this address is a recommended breakpoint location.
    #[inline]
    pub fn is_stmt(&self) -> bool {
        self.is_stmt
    }

    /// Whether this address begins a basic block.
    #[inline]
    pub fn basic_block(&self) -> bool {
        self.basic_block
    }

    /// Whether this row only marks the first address past a sequence;
    /// its other registers are meaningless if so.
    #[inline]
    pub fn end_sequence(&self) -> bool {
        self.end_sequence
    }

    /// Whether this address is where a function's prologue ends.
    #[inline]
    pub fn prologue_end(&self) -> bool {
        self.prologue_end
    }

    /// Whether this address is where a function's epilogue begins.
    #[inline]
    pub fn epilogue_begin(&self) -> bool {
        self.epilogue_begin
    }

    /// The instruction set in effect, 0 meaning the target default.
    #[inline]
    pub fn isa(&self) -> u64 {
        self.isa
    }

    /// Distinguishes blocks compiled from the same source position.
    #[inline]
    pub fn discriminator(&self) -> u64 {
        self.discriminator
    }

    /// Apply one instruction; returns true when a row just completed.
    pub fn execute<R: Reader>(
        &mut self,
        instruction: LineInstruction<R>,
        header: &LineHeader<R>,
    ) -> Result<bool> {
        match instruction {
            LineInstruction::Special(opcode) => {
                let adjusted = opcode - header.opcode_base;
                let line_range = header.line_encoding.line_range;
                self.advance_line(
                    i64::from(header.line_encoding.line_base) + i64::from(adjusted % line_range),
                );
                self.advance_operation(u64::from(adjusted / line_range), header)?;
                Ok(true)
            }
            LineInstruction::Copy => Ok(true),
            LineInstruction::EndSequence => {
                self.end_sequence = true;
                Ok(true)
            }
            LineInstruction::AdvancePc(advance) => {
                self.advance_operation(advance, header)?;
                Ok(false)
            }
            LineInstruction::AdvanceLine(increment) => {
                self.advance_line(increment);
                Ok(false)
            }
            LineInstruction::SetFile(file) => {
                self.file = file;
                Ok(false)
            }
            LineInstruction::SetColumn(column) => {
                self.column = column;
                Ok(false)
            }
            LineInstruction::NegateStatement => {
                self.is_stmt = !self.is_stmt;
                Ok(false)
            }
            LineInstruction::SetBasicBlock => {
                self.basic_block = true;
                Ok(false)
            }
            LineInstruction::ConstAddPc => {
                // The advance special opcode 255 would make.
                let adjusted = 255 - header.opcode_base;
                self.advance_operation(
                    u64::from(adjusted / header.line_encoding.line_range),
                    header,
                )?;
                Ok(false)
            }
            LineInstruction::FixedAddPc(advance) => {
                self.address = self
                    .address
                    .checked_add(u64::from(advance))
                    .ok_or(Error::AddressOverflow)?;
                self.op_index = 0;
                Ok(false)
            }
            LineInstruction::SetPrologueEnd => {
                self.prologue_end = true;
                Ok(false)
            }
            LineInstruction::SetEpilogueBegin => {
                self.epilogue_begin = true;
                Ok(false)
            }
            LineInstruction::SetIsa(isa) => {
                self.isa = isa;
                Ok(false)
            }
            LineInstruction::SetAddress(address) => {
                self.address = address;
                self.op_index = 0;
                Ok(false)
            }
            LineInstruction::SetDiscriminator(discriminator) => {
                self.discriminator = discriminator;
                Ok(false)
            }
            // Handled by the caller.
            LineInstruction::DefineFile(_) => Ok(false),
            // Unknown opcodes carry their operands and change nothing.
            LineInstruction::UnknownStandard0(_)
            | LineInstruction::UnknownStandard1(..)
            | LineInstruction::UnknownStandardN(..)
            | LineInstruction::UnknownExtended(..) => Ok(false),
        }
    }

    /// The register reset that follows an emitted row (DWARF v5
    /// §6.2.5.1-2, or the full sequence reset after end_sequence).
    pub fn reset<R: Reader>(&mut self, header: &LineHeader<R>) {
        if self.end_sequence {
            *self = Self::new(header);
        } else {
            self.discriminator = 0;
            self.basic_block = false;
            self.prologue_end = false;
            self.epilogue_begin = false;
        }
    }

    fn advance_line(&mut self, increment: i64) {
        self.line = if increment < 0 {
            self.line.saturating_sub(increment.unsigned_abs())
        } else {
            self.line.wrapping_add(increment as u64)
        };
    }

    fn advance_operation<R: Reader>(
        &mut self,
        operation_advance: u64,
        header: &LineHeader<R>,
    ) -> Result<()> {
        let instruction_length = u64::from(header.line_encoding.minimum_instruction_length);
        let max_ops = u64::from(header.line_encoding.maximum_operations_per_instruction);

        let (instructions, new_op_index) = if max_ops == 1 {
            (operation_advance, 0)
        } else {
            let ops = self
                .op_index
                .checked_add(operation_advance)
                .ok_or(Error::AddressOverflow)?;
            (ops / max_ops, ops % max_ops)
        };
        self.address = instruction_length
            .checked_mul(instructions)
            .and_then(|bytes| self.address.checked_add(bytes))
            .ok_or(Error::AddressOverflow)?;
        self.op_index = new_op_index;
        Ok(())
    }
}

/// How a row's column is reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Ord, PartialOrd)]
pub enum ColumnType {
    /// The statement starts at the beginning of the line.
    LeftEdge,
    /// A 1-based column number.
    Column(NonZeroU64),
}

/// The state machine parameters from a line header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LineEncoding {
    /// The byte size of the smallest machine instruction.
    pub minimum_instruction_length: u8,
    /// Operations per VLIW instruction bundle; 1 everywhere else.
    pub maximum_operations_per_instruction: u8,
    /// The initial value of the `is_stmt` register.
    pub default_is_stmt: bool,
    /// The smallest line advance a special opcode can encode.
    pub line_base: i8,
    /// How many line advances the special opcodes distinguish.
    pub line_range: u8,
}

/// A parsed line program header: encoding parameters plus the directory
/// and file tables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineHeader<R: Reader> {
    encoding: Encoding,
    offset: DebugLineOffset,
    unit_length: usize,
    header_length: usize,
    line_encoding: LineEncoding,
    opcode_base: u8,
    standard_opcode_lengths: R,
    directory_entry_format: Vec<FileEntryFormat>,
    include_directories: Vec<AttributeValue<R>>,
    file_name_entry_format: Vec<FileEntryFormat>,
    file_names: Vec<FileEntry<R>>,
    program_buf: R,
    comp_dir: Option<R>,
    comp_file: Option<FileEntry<R>>,
}

impl<R: Reader> LineHeader<R> {
    fn parse(
        input: &mut R,
        offset: DebugLineOffset,
        mut address_size: u8,
        comp_dir: Option<R>,
        comp_name: Option<R>,
    ) -> Result<LineHeader<R>> {
        let (unit_length, format) = input.read_initial_length()?;
        let rest = &mut input.split(unit_length)?;

        let version = rest.read_u16()?;
        if !(2..=5).contains(&version) {
            return Err(Error::UnsupportedVersion(version));
        }
        if version >= 5 {
            address_size = rest.read_u8()?;
            let segment_size = rest.read_u8()?;
            if segment_size != 0 {
                return Err(Error::NonZeroSegmentSize(segment_size));
            }
        }
        let encoding = Encoding {
            format,
            version,
            address_size,
        };

        let header_length = rest.read_offset(format)?;
        let mut program_buf = rest.clone();
        program_buf.skip(header_length)?;
        rest.truncate(header_length)?;

        let minimum_instruction_length = rest.read_u8()?;
        if minimum_instruction_length == 0 {
            return Err(Error::ZeroInstructionLength);
        }
        // Not a field before DWARF 4; specified to read as 1.
        let maximum_operations_per_instruction = if version >= 4 { rest.read_u8()? } else { 1 };
        if maximum_operations_per_instruction == 0 {
            return Err(Error::ZeroMaxOperations);
        }
        let default_is_stmt = rest.read_u8()? != 0;
        let line_base = rest.read_i8()?;
        let line_range = rest.read_u8()?;
        if line_range == 0 {
            return Err(Error::ZeroLineRange);
        }
        let opcode_base = rest.read_u8()?;
        if opcode_base == 0 {
            return Err(Error::ZeroOpcodeBase);
        }
        let standard_opcode_lengths = rest.split(usize::from(opcode_base) - 1)?;

        let mut directory_entry_format = Vec::new();
        let mut include_directories = Vec::new();
        let mut file_name_entry_format = Vec::new();
        let mut file_names = Vec::new();
        if version <= 4 {
            loop {
                let directory = rest.read_cstr()?;
                if directory.is_empty() {
                    break;
                }
                include_directories.push(AttributeValue::String(directory));
            }
            loop {
                let path = rest.read_cstr()?;
                if path.is_empty() {
                    break;
                }
                file_names.push(FileEntry::parse_v4(rest, path)?);
            }
        } else {
            directory_entry_format = FileEntryFormat::parse(rest)?;
            for _ in 0..rest.read_uleb128()? {
                include_directories.push(parse_directory_entry(
                    rest,
                    encoding,
                    &directory_entry_format,
                )?);
            }
            file_name_entry_format = FileEntryFormat::parse(rest)?;
            for _ in 0..rest.read_uleb128()? {
                file_names.push(parse_file_entry(rest, encoding, &file_name_entry_format)?);
            }
        }

        // Index 0 refers to the unit's primary file, which pre-5
        // versions leave out of the table.
        let comp_file = comp_name.map(|name| FileEntry {
            path_name: AttributeValue::String(name),
            directory_index: 0,
            timestamp: 0,
            size: 0,
            md5: [0; 16],
        });

        Ok(LineHeader {
            encoding,
            offset,
            unit_length,
            header_length,
            line_encoding: LineEncoding {
                minimum_instruction_length,
                maximum_operations_per_instruction,
                default_is_stmt,
                line_base,
                line_range,
            },
            opcode_base,
            standard_opcode_lengths,
            directory_entry_format,
            include_directories,
            file_name_entry_format,
            file_names,
            program_buf,
            comp_dir,
            comp_file,
        })
    }

    /// Where this program starts within `.debug_line`.
    pub fn offset(&self) -> DebugLineOffset {
        self.offset
    }

    /// The unit length field of this program.
    pub fn unit_length(&self) -> usize {
        self.unit_length
    }

    /// This program's decoding parameters.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// This program's version.
    pub fn version(&self) -> u16 {
        self.encoding.version
    }

    /// The header length field: the distance from just after it to the
    /// first instruction.
    pub fn header_length(&self) -> usize {
        self.header_length
    }

    /// The target address size for this program.
    pub fn address_size(&self) -> u8 {
        self.encoding.address_size
    }

    /// Whether the program uses 32-bit or 64-bit DWARF.
    pub fn format(&self) -> crate::common::Format {
        self.encoding.format
    }

    /// The state machine parameters.
    pub fn line_encoding(&self) -> LineEncoding {
        self.line_encoding
    }

    /// The byte size of the smallest machine instruction.
    pub fn minimum_instruction_length(&self) -> u8 {
        self.line_encoding.minimum_instruction_length
    }

    /// Operations per VLIW instruction bundle.
    pub fn maximum_operations_per_instruction(&self) -> u8 {
        self.line_encoding.maximum_operations_per_instruction
    }

    /// The initial value of the `is_stmt` register.
    pub fn default_is_stmt(&self) -> bool {
        self.line_encoding.default_is_stmt
    }

    /// The smallest line advance a special opcode can encode.
    pub fn line_base(&self) -> i8 {
        self.line_encoding.line_base
    }

    /// How many line advances the special opcodes distinguish.
    pub fn line_range(&self) -> u8 {
        self.line_encoding.line_range
    }

    /// The first special opcode value.
    pub fn opcode_base(&self) -> u8 {
        self.opcode_base
    }

    /// The operand counts of the standard opcodes, indexed by opcode
    /// minus one.
    pub fn standard_opcode_lengths(&self) -> &R {
        &self.standard_opcode_lengths
    }

    /// The entry format of the DWARF 5 directory table.
    pub fn directory_entry_format(&self) -> &[FileEntryFormat] {
        &self.directory_entry_format
    }

    /// The include directories, as written.
    ///
    /// Before DWARF 5 the compilation directory is implicit and not in
    /// this list.
    pub fn include_directories(&self) -> &[AttributeValue<R>] {
        &self.include_directories
    }

    /// The directory at `index`. Directory 0 is the compilation
    /// directory, which pre-5 versions do not store.
    pub fn directory(&self, index: u64) -> Option<AttributeValue<R>> {
        let table_index = if self.encoding.version <= 4 {
            usize::try_from(index).ok()?.checked_sub(1)?
        } else {
            usize::try_from(index).ok()?
        };
        self.include_directories.get(table_index).cloned()
    }

    /// The entry format of the DWARF 5 file table.
    pub fn file_name_entry_format(&self) -> &[FileEntryFormat] {
        &self.file_name_entry_format
    }

    /// Whether file entries may carry meaningful timestamps.
    pub fn file_has_timestamp(&self) -> bool {
        self.encoding.version <= 4
            || self
                .file_name_entry_format
                .iter()
                .any(|f| f.content_type == constants::DW_LNCT_timestamp)
    }

    /// Whether file entries may carry meaningful sizes.
    pub fn file_has_size(&self) -> bool {
        self.encoding.version <= 4
            || self
                .file_name_entry_format
                .iter()
                .any(|f| f.content_type == constants::DW_LNCT_size)
    }

    /// Whether file entries carry MD5 digests.
    pub fn file_has_md5(&self) -> bool {
        self.file_name_entry_format
            .iter()
            .any(|f| f.content_type == constants::DW_LNCT_MD5)
    }

    /// The file table, as written.
    pub fn file_names(&self) -> &[FileEntry<R>] {
        &self.file_names
    }

    /// The file at `index`. File 0 is the unit's primary file, which
    /// pre-5 versions do not store; it is synthesized from the unit
    /// name when one was supplied.
    pub fn file(&self, index: u64) -> Option<&FileEntry<R>> {
        if self.encoding.version <= 4 {
            match usize::try_from(index).ok()?.checked_sub(1) {
                Some(table_index) => self.file_names.get(table_index),
                None => self.comp_file.as_ref(),
            }
        } else {
            self.file_names.get(usize::try_from(index).ok()?)
        }
    }

    /// The raw bytes of the program's instructions.
    pub fn raw_program_buf(&self) -> R {
        self.program_buf.clone()
    }

    /// Iterate the program's instructions without executing them.
    pub fn instructions(&self) -> LineInstructions<R> {
        LineInstructions {
            input: self.program_buf.clone(),
        }
    }

    /// The referencing unit's compilation directory, when supplied.
    pub fn comp_dir(&self) -> Option<&R> {
        self.comp_dir.as_ref()
    }
}

/// One decoded line number instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineInstruction<R: Reader> {
    /// A special opcode: advances the address and the line together and
    /// emits a row.
    Special(u8),
    /// `DW_LNS_copy`: emit a row from the current registers.
    Copy,
    /// `DW_LNS_advance_pc` by this operation advance.
    AdvancePc(u64),
    /// `DW_LNS_advance_line` by this amount.
    AdvanceLine(i64),
    /// `DW_LNS_set_file`.
    SetFile(u64),
    /// `DW_LNS_set_column`.
    SetColumn(u64),
    /// `DW_LNS_negate_stmt`.
    NegateStatement,
    /// `DW_LNS_set_basic_block`.
    SetBasicBlock,
    /// `DW_LNS_const_add_pc`: the address advance of special opcode
    /// 255, without emitting a row.
    ConstAddPc,
    /// `DW_LNS_fixed_advance_pc`: an unscaled 2-byte address advance.
    FixedAddPc(u16),
    /// `DW_LNS_set_prologue_end`.
    SetPrologueEnd,
    /// `DW_LNS_set_epilogue_begin`.
    SetEpilogueBegin,
    /// `DW_LNS_set_isa`.
    SetIsa(u64),
    /// `DW_LNE_end_sequence`: emit the sequence-terminating row and
    /// reset the registers.
    EndSequence,
    /// `DW_LNE_set_address`.
    SetAddress(u64),
    /// `DW_LNE_define_file` (retired in DWARF 5).
    DefineFile(FileEntry<R>),
    /// `DW_LNE_set_discriminator`.
    SetDiscriminator(u64),
    /// A standard opcode this crate does not know, with no operands.
    UnknownStandard0(constants::DwLns),
    /// A standard opcode this crate does not know, with one operand.
    UnknownStandard1(constants::DwLns, u64),
    /// A standard opcode this crate does not know, with its operands.
    UnknownStandardN(constants::DwLns, Box<[u64]>),
    /// An extended opcode this crate does not know, with its bytes.
    UnknownExtended(constants::DwLne, R),
}

impl<R: Reader> LineInstruction<R> {
    fn parse(input: &mut R, header: &LineHeader<R>) -> Result<LineInstruction<R>> {
        use crate::constants::*;
        use LineInstruction as I;

        let opcode = input.read_u8()?;
        if opcode >= header.opcode_base {
            return Ok(I::Special(opcode));
        }
        if opcode == 0 {
            // Extended opcodes are length prefixed.
            let len = input.read_uleb128_usize()?;
            let mut operands = input.split(len)?;
            let sub_opcode = DwLne(operands.read_u8()?);
            return Ok(match sub_opcode {
                DW_LNE_end_sequence => I::EndSequence,
                DW_LNE_set_address => {
                    I::SetAddress(operands.read_address(header.address_size())?)
                }
                DW_LNE_set_discriminator => I::SetDiscriminator(operands.read_uleb128()?),
                DW_LNE_define_file if header.version() <= 4 => {
                    let path = operands.read_cstr()?;
                    I::DefineFile(FileEntry::parse_v4(&mut operands, path)?)
                }
                other => I::UnknownExtended(other, operands),
            });
        }

        match constants::DwLns(opcode) {
            DW_LNS_copy => Ok(I::Copy),
            DW_LNS_advance_pc => Ok(I::AdvancePc(input.read_uleb128()?)),
            DW_LNS_advance_line => Ok(I::AdvanceLine(input.read_sleb128()?)),
            DW_LNS_set_file => Ok(I::SetFile(input.read_uleb128()?)),
            DW_LNS_set_column => Ok(I::SetColumn(input.read_uleb128()?)),
            DW_LNS_negate_stmt => Ok(I::NegateStatement),
            DW_LNS_set_basic_block => Ok(I::SetBasicBlock),
            DW_LNS_const_add_pc => Ok(I::ConstAddPc),
            DW_LNS_fixed_advance_pc => Ok(I::FixedAddPc(input.read_u16()?)),
            DW_LNS_set_prologue_end => Ok(I::SetPrologueEnd),
            DW_LNS_set_epilogue_begin => Ok(I::SetEpilogueBegin),
            DW_LNS_set_isa => Ok(I::SetIsa(input.read_uleb128()?)),
            unknown => {
                // The operand count table lets us skip opcodes from
                // future standards.
                let mut lengths = header.standard_opcode_lengths().clone();
                lengths.skip(usize::from(opcode) - 1)?;
                let count = lengths.read_u8()?;
                match count {
                    0 => Ok(I::UnknownStandard0(unknown)),
                    1 => Ok(I::UnknownStandard1(unknown, input.read_uleb128()?)),
                    n => {
                        let mut operands = Vec::with_capacity(usize::from(n));
                        for _ in 0..n {
                            operands.push(input.read_uleb128()?);
                        }
                        Ok(I::UnknownStandardN(unknown, operands.into_boxed_slice()))
                    }
                }
            }
        }
    }
}

impl<R: Reader> fmt::Display for LineInstruction<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use crate::constants::*;
        use LineInstruction as I;
        match *self {
            I::Special(opcode) => write!(f, "special opcode {opcode}"),
            I::Copy => write!(f, "{DW_LNS_copy}"),
            I::AdvancePc(advance) => write!(f, "{DW_LNS_advance_pc} by {advance}"),
            I::AdvanceLine(increment) => write!(f, "{DW_LNS_advance_line} by {increment}"),
            I::SetFile(file) => write!(f, "{DW_LNS_set_file} to {file}"),
            I::SetColumn(column) => write!(f, "{DW_LNS_set_column} to {column}"),
            I::NegateStatement => write!(f, "{DW_LNS_negate_stmt}"),
            I::SetBasicBlock => write!(f, "{DW_LNS_set_basic_block}"),
            I::ConstAddPc => write!(f, "{DW_LNS_const_add_pc}"),
            I::FixedAddPc(advance) => write!(f, "{DW_LNS_fixed_advance_pc} by {advance}"),
            I::SetPrologueEnd => write!(f, "{DW_LNS_set_prologue_end}"),
            I::SetEpilogueBegin => write!(f, "{DW_LNS_set_epilogue_begin}"),
            I::SetIsa(isa) => write!(f, "{DW_LNS_set_isa} to {isa}"),
            I::EndSequence => write!(f, "{DW_LNE_end_sequence}"),
            I::SetAddress(address) => write!(f, "{DW_LNE_set_address} to {address:#x}"),
            I::DefineFile(_) => write!(f, "{DW_LNE_define_file}"),
            I::SetDiscriminator(d) => write!(f, "{DW_LNE_set_discriminator} to {d}"),
            I::UnknownStandard0(op) => write!(f, "unknown standard opcode {op}"),
            I::UnknownStandard1(op, arg) => write!(f, "unknown standard opcode {op} ({arg})"),
            I::UnknownStandardN(op, ref args) => {
                write!(f, "unknown standard opcode {op} ({args:?})")
            }
            I::UnknownExtended(op, _) => write!(f, "unknown extended opcode {op}"),
        }
    }
}

/// The lazy instruction iterator returned by [`LineHeader::instructions`].
#[derive(Clone, Debug)]
pub struct LineInstructions<R: Reader> {
    input: R,
}

impl<R: Reader> LineInstructions<R> {
    /// Decode the next instruction. Takes the header because special
    /// and unknown opcodes cannot be decoded without it.
    pub fn next_instruction(&mut self, header: &LineHeader<R>) -> Result<Option<LineInstruction<R>>> {
        if self.input.is_empty() {
            return Ok(None);
        }
        match LineInstruction::parse(&mut self.input, header) {
            Ok(instruction) => Ok(Some(instruction)),
            Err(e) => {
                self.input.empty();
                Err(e)
            }
        }
    }

    // A copy of self that stops where `later` has advanced to.
    fn up_to(&self, later: &LineInstructions<R>) -> Result<LineInstructions<R>> {
        let len = later.input.offset_from(&self.input);
        let mut input = self.input.clone();
        input.truncate(len)?;
        Ok(LineInstructions { input })
    }
}

/// The name/form layout of DWARF 5 directory and file table entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileEntryFormat {
    /// What this field holds.
    pub content_type: constants::DwLnct,
    /// How it is encoded.
    pub form: constants::DwForm,
}

impl FileEntryFormat {
    fn parse<R: Reader>(input: &mut R) -> Result<Vec<FileEntryFormat>> {
        let count = input.read_u8()?;
        let mut format = Vec::with_capacity(usize::from(count));
        let mut path_fields = 0;
        for _ in 0..count {
            let content_type = constants::DwLnct(input.read_uleb128_u16()?);
            if content_type == constants::DW_LNCT_path {
                path_fields += 1;
            }
            let form = constants::DwForm(input.read_uleb128_u16()?);
            format.push(FileEntryFormat { content_type, form });
        }
        if path_fields != 1 {
            return Err(Error::MissingPathContentType);
        }
        Ok(format)
    }
}

fn parse_directory_entry<R: Reader>(
    input: &mut R,
    encoding: Encoding,
    format: &[FileEntryFormat],
) -> Result<AttributeValue<R>> {
    let mut path = None;
    for field in format {
        let spec = AttrSpec::new(constants::DW_AT_null, field.form, None);
        let value = decode_form(input, encoding, spec)?.raw_value();
        if field.content_type == constants::DW_LNCT_path {
            path = Some(value);
        }
    }
    // FileEntryFormat::parse guarantees exactly one path field.
    Ok(path.unwrap())
}

fn parse_file_entry<R: Reader>(
    input: &mut R,
    encoding: Encoding,
    format: &[FileEntryFormat],
) -> Result<FileEntry<R>> {
    let mut entry = FileEntry {
        path_name: AttributeValue::String(input.clone()),
        directory_index: 0,
        timestamp: 0,
        size: 0,
        md5: [0; 16],
    };
    let mut path = None;
    for field in format {
        let spec = AttrSpec::new(constants::DW_AT_null, field.form, None);
        let attr = decode_form(input, encoding, spec)?;
        match field.content_type {
            constants::DW_LNCT_path => path = Some(attr.raw_value()),
            constants::DW_LNCT_directory_index => {
                if let Some(value) = attr.udata_value() {
                    entry.directory_index = value;
                }
            }
            constants::DW_LNCT_timestamp => {
                if let Some(value) = attr.udata_value() {
                    entry.timestamp = value;
                }
            }
            constants::DW_LNCT_size => {
                if let Some(value) = attr.udata_value() {
                    entry.size = value;
                }
            }
            constants::DW_LNCT_MD5 => {
                if let AttributeValue::Block(ref bytes) = attr.raw_value() {
                    if bytes.len() == 16 {
                        bytes.clone().read_slice(&mut entry.md5)?;
                    }
                }
            }
            // Vendor content types are skipped by their form.
            _ => {}
        }
    }
    // FileEntryFormat::parse guarantees exactly one path field.
    entry.path_name = path.unwrap();
    Ok(entry)
}

/// One file in a line program's file table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry<R: Reader> {
    path_name: AttributeValue<R>,
    directory_index: u64,
    timestamp: u64,
    size: u64,
    md5: [u8; 16],
}

impl<R: Reader> FileEntry<R> {
    fn parse_v4(input: &mut R, path: R) -> Result<FileEntry<R>> {
        Ok(FileEntry {
            path_name: AttributeValue::String(path),
            directory_index: input.read_uleb128()?,
            timestamp: input.read_uleb128()?,
            size: input.read_uleb128()?,
            md5: [0; 16],
        })
    }

    /// The file's path, absolute or relative to its directory.
    pub fn path_name(&self) -> AttributeValue<R> {
        self.path_name.clone()
    }

    /// Which directory the path is relative to; 0 is the compilation
    /// directory.
    pub fn directory_index(&self) -> u64 {
        self.directory_index
    }

    /// The directory the path is relative to, from `header`'s table.
    pub fn directory(&self, header: &LineHeader<R>) -> Option<AttributeValue<R>> {
        header.directory(self.directory_index)
    }

    /// Modification time, or 0 when not recorded.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// File size in bytes, or 0 when not recorded.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The file's MD5 digest; only meaningful when
    /// [`LineHeader::file_has_md5`] is true.
    pub fn md5(&self) -> &[u8; 16] {
        &self.md5
    }
}
