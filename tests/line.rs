//! Assemble a `.debug_line` program and execute it into rows.

use dwarfling::{AttributeValue, ColumnType, DebugLine, DebugLineOffset, EndianSlice, LittleEndian};
use test_assembler::{Endian, Label, LabelMaker, Section};

/// A DWARF version 4 line number program with a single sequence:
///
/// ```text
/// 0x1000  line 3  (DW_LNS_copy)
/// 0x1010  line 3  (DW_LNS_copy after DW_LNS_advance_pc)
/// 0x1011  line 4  (special opcode)
/// 0x1018  end_sequence
/// ```
fn assemble_line_program() -> Vec<u8> {
    let length = Label::new();
    let start = Label::new();
    let header_length = Label::new();
    let header_start = Label::new();
    let end = Label::new();

    let section = Section::with_endian(Endian::Little)
        .D32(&length)
        .mark(&start)
        // Version.
        .L16(4)
        .D32(&header_length)
        .mark(&header_start)
        // Minimum instruction length.
        .D8(1)
        // Maximum operations per instruction.
        .D8(1)
        // Default is_stmt.
        .D8(1)
        // Line base.
        .D8(-3i8 as u8)
        // Line range.
        .D8(12)
        // Opcode base.
        .D8(13)
        // Standard opcode lengths.
        .append_bytes(&[0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1])
        // Include directories.
        .append_bytes(b"inc1\0")
        .append_bytes(b"inc2\0")
        .D8(0)
        // File names.
        .append_bytes(b"foo.c\0")
        .D8(0)
        .D8(0)
        .D8(0)
        .append_bytes(b"bar.h\0")
        .D8(1)
        .D8(0)
        .D8(0)
        .D8(0);
    header_length.set_const((&section.here() - &header_start) as u64);

    let section = section
        // DW_LNE_set_address(0x1000)
        .D8(0)
        .D8(9)
        .D8(dwarfling::DW_LNE_set_address.0)
        .L64(0x1000)
        // DW_LNS_advance_line(2)
        .D8(dwarfling::DW_LNS_advance_line.0)
        .D8(2)
        // DW_LNS_copy
        .D8(dwarfling::DW_LNS_copy.0)
        // DW_LNS_advance_pc(16)
        .D8(dwarfling::DW_LNS_advance_pc.0)
        .D8(16)
        // DW_LNS_copy
        .D8(dwarfling::DW_LNS_copy.0)
        // Special opcode: advance the address by 1 and the line by 1.
        .D8(13 + (1 + 3) + 12)
        // DW_LNS_advance_pc(7)
        .D8(dwarfling::DW_LNS_advance_pc.0)
        .D8(7)
        // DW_LNE_end_sequence
        .D8(0)
        .D8(1)
        .D8(dwarfling::DW_LNE_end_sequence.0)
        .mark(&end);

    length.set_const((&end - &start) as u64);
    section.get_contents().unwrap()
}

#[test]
fn test_line_program_header() {
    let buf = assemble_line_program();
    let debug_line = DebugLine::new(&buf, LittleEndian);
    let program = debug_line
        .program(DebugLineOffset(0), 8, None, None)
        .expect("Should parse the line program");
    let header = program.header();

    assert_eq!(header.version(), 4);
    assert_eq!(header.minimum_instruction_length(), 1);
    assert_eq!(header.maximum_operations_per_instruction(), 1);
    assert!(header.default_is_stmt());
    assert_eq!(header.line_base(), -3);
    assert_eq!(header.line_range(), 12);
    assert_eq!(header.opcode_base(), 13);

    assert_eq!(header.include_directories().len(), 2);
    assert_eq!(
        header.directory(1),
        Some(AttributeValue::String(EndianSlice::new(
            b"inc1",
            LittleEndian
        )))
    );

    assert_eq!(header.file_names().len(), 2);
    let file = header.file(1).expect("Should have file 1");
    assert_eq!(
        file.path_name(),
        AttributeValue::String(EndianSlice::new(b"foo.c", LittleEndian))
    );
    assert_eq!(file.directory_index(), 0);
    let file = header.file(2).expect("Should have file 2");
    assert_eq!(file.directory_index(), 1);
}

#[test]
fn test_line_program_rows() {
    let buf = assemble_line_program();
    let debug_line = DebugLine::new(&buf, LittleEndian);
    let program = debug_line
        .program(DebugLineOffset(0), 8, None, None)
        .expect("Should parse the line program");

    let mut rows = program.rows();

    let row = rows
        .next_row()
        .expect("Should parse first row")
        .expect("Should have first row")
        .clone();
    assert_eq!(row.address(), 0x1000);
    assert_eq!(row.line().map(|line| line.get()), Some(3));
    assert_eq!(row.file_index(), 1);
    assert!(row.is_stmt());
    assert!(!row.end_sequence());
    assert_eq!(row.column(), ColumnType::LeftEdge);

    let row = rows
        .next_row()
        .expect("Should parse second row")
        .expect("Should have second row")
        .clone();
    assert_eq!(row.address(), 0x1010);
    assert_eq!(row.line().map(|line| line.get()), Some(3));

    let row = rows
        .next_row()
        .expect("Should parse third row")
        .expect("Should have third row")
        .clone();
    assert_eq!(row.address(), 0x1011);
    assert_eq!(row.line().map(|line| line.get()), Some(4));

    let row = rows
        .next_row()
        .expect("Should parse end sequence row")
        .expect("Should have end sequence row")
        .clone();
    assert_eq!(row.address(), 0x1018);
    assert!(row.end_sequence());

    assert!(rows.next_row().expect("Should parse end").is_none());
}

#[test]
fn test_line_sequences_and_resume() {
    let buf = assemble_line_program();
    let debug_line = DebugLine::new(&buf, LittleEndian);
    let program = debug_line
        .program(DebugLineOffset(0), 8, None, None)
        .expect("Should parse the line program");

    let sequences = program.sequences().expect("Should partition sequences");
    assert_eq!(sequences.len(), 1);
    let sequence = &sequences[0];
    assert_eq!(sequence.start, 0x1000);
    assert_eq!(sequence.end, 0x1018);

    // The address lookup path: replay the sequence and take the last row
    // at or before the target address.
    let addr = 0x1011;
    let mut rows = program.resume(sequence);
    let mut found = None;
    while let Some(row) = rows.next_row().expect("Should parse row") {
        if row.address() > addr {
            break;
        }
        if !row.end_sequence() {
            found = Some((row.address(), row.line().map(|line| line.get())));
        }
    }
    assert_eq!(found, Some((0x1011, Some(4))));
}

/// A DWARF version 5 header with entry format tables and an empty
/// program.
fn assemble_line_program_v5() -> Vec<u8> {
    let length = Label::new();
    let start = Label::new();
    let header_length = Label::new();
    let header_start = Label::new();
    let end = Label::new();

    let section = Section::with_endian(Endian::Little)
        .D32(&length)
        .mark(&start)
        // Version.
        .L16(5)
        // Address size.
        .D8(8)
        // Segment selector size.
        .D8(0)
        .D32(&header_length)
        .mark(&header_start)
        // Minimum instruction length.
        .D8(1)
        // Maximum operations per instruction.
        .D8(1)
        // Default is_stmt.
        .D8(1)
        // Line base.
        .D8(-5i8 as u8)
        // Line range.
        .D8(14)
        // Opcode base.
        .D8(13)
        // Standard opcode lengths.
        .append_bytes(&[0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1])
        // Directory entry format count.
        .D8(1)
        .D8(dwarfling::DW_LNCT_path.0 as u8)
        .D8(dwarfling::DW_FORM_string.0 as u8)
        // Directories count.
        .D8(2)
        .append_bytes(b"/comp/dir\0")
        .append_bytes(b"/comp/dir/include\0")
        // File name entry format count.
        .D8(2)
        .D8(dwarfling::DW_LNCT_path.0 as u8)
        .D8(dwarfling::DW_FORM_string.0 as u8)
        .D8(dwarfling::DW_LNCT_directory_index.0 as u8)
        .D8(dwarfling::DW_FORM_udata.0 as u8)
        // File names count.
        .D8(2)
        .append_bytes(b"main.c\0")
        .D8(0)
        .append_bytes(b"util.h\0")
        .D8(1);
    header_length.set_const((&section.here() - &header_start) as u64);
    let section = section.mark(&end);

    length.set_const((&end - &start) as u64);
    section.get_contents().unwrap()
}

#[test]
fn test_line_program_v5_header() {
    let buf = assemble_line_program_v5();
    let debug_line = DebugLine::new(&buf, LittleEndian);
    let program = debug_line
        .program(DebugLineOffset(0), 8, None, None)
        .expect("Should parse the line program");
    let header = program.header();

    assert_eq!(header.version(), 5);
    assert_eq!(header.address_size(), 8);
    assert_eq!(header.directory_entry_format().len(), 1);
    assert_eq!(header.file_name_entry_format().len(), 2);
    assert!(!header.file_has_md5());

    // Version 5 directory and file indices begin at 0.
    assert_eq!(
        header.directory(0),
        Some(AttributeValue::String(EndianSlice::new(
            b"/comp/dir",
            LittleEndian
        )))
    );
    let file = header.file(0).expect("Should have file 0");
    assert_eq!(
        file.path_name(),
        AttributeValue::String(EndianSlice::new(b"main.c", LittleEndian))
    );
    let file = header.file(1).expect("Should have file 1");
    assert_eq!(file.directory_index(), 1);

    // An empty program yields no rows.
    let mut rows = program.rows();
    assert!(rows.next_row().expect("Should parse end").is_none());
}
