//! Assemble a `.debug_abbrev`/`.debug_info` pair and walk the entries
//! with `DieCursor` and `DieTree`.

use dwarfling::{
    AttributeValue, DebugAbbrev, DebugInfo, Die, DieCursor, EndianSlice, LittleEndian, UnitOffset,
};
use test_assembler::{Endian, Label, LabelMaker, Section};

fn assert_entry_name(entry: &Die<'_, '_, EndianSlice<'_, LittleEndian>>, name: &str) {
    let value = entry
        .attr_value(dwarfling::DW_AT_name)
        .expect("Should parse the name attribute")
        .expect("Should have found the name attribute");

    assert_eq!(
        value,
        AttributeValue::String(EndianSlice::new(name.as_bytes(), LittleEndian))
    );
}

fn assert_current_name(cursor: &DieCursor<'_, '_, EndianSlice<'_, LittleEndian>>, name: &str) {
    let entry = cursor.current().expect("Should have an entry result");
    assert_entry_name(entry, name);
}

fn assert_next_entry(cursor: &mut DieCursor<'_, '_, EndianSlice<'_, LittleEndian>>, name: &str) {
    cursor
        .next_entry()
        .expect("Should parse next entry")
        .expect("Should have an entry");
    assert_current_name(cursor, name);
}

fn assert_next_entry_null(cursor: &mut DieCursor<'_, '_, EndianSlice<'_, LittleEndian>>) {
    cursor
        .next_entry()
        .expect("Should parse next entry")
        .expect("Should have an entry");
    assert!(cursor.current().is_none());
}

fn assert_next_dfs(
    cursor: &mut DieCursor<'_, '_, EndianSlice<'_, LittleEndian>>,
    name: &str,
    depth: isize,
) {
    {
        let (val, entry) = cursor
            .next_dfs()
            .expect("Should parse next dfs")
            .expect("Should not be done with traversal");
        assert_eq!(val, depth);
        assert_entry_name(entry, name);
    }
    assert_current_name(cursor, name);
}

fn assert_next_sibling(cursor: &mut DieCursor<'_, '_, EndianSlice<'_, LittleEndian>>, name: &str) {
    {
        let entry = cursor
            .next_sibling()
            .expect("Should parse next sibling")
            .expect("Should not be done with traversal");
        assert_entry_name(entry, name);
    }
    assert_current_name(cursor, name);
}

/// Abbreviation code 1 is a subprogram with children and a name.
/// Abbreviation code 2 additionally carries a `DW_AT_sibling` pointer.
fn assemble_abbrev() -> Vec<u8> {
    Section::with_endian(Endian::Little)
        // Code 1.
        .D8(1)
        .D8(dwarfling::DW_TAG_subprogram.0 as u8)
        .D8(dwarfling::DW_CHILDREN_yes.0)
        .D8(dwarfling::DW_AT_name.0 as u8)
        .D8(dwarfling::DW_FORM_string.0 as u8)
        .D8(0)
        .D8(0)
        // Code 2.
        .D8(2)
        .D8(dwarfling::DW_TAG_subprogram.0 as u8)
        .D8(dwarfling::DW_CHILDREN_yes.0)
        .D8(dwarfling::DW_AT_name.0 as u8)
        .D8(dwarfling::DW_FORM_string.0 as u8)
        .D8(dwarfling::DW_AT_sibling.0 as u8)
        .D8(dwarfling::DW_FORM_ref4.0 as u8)
        .D8(0)
        .D8(0)
        // End of abbreviations.
        .D8(0)
        .get_contents()
        .unwrap()
}

/// The entries form this tree:
///
/// ```text
/// 001
/// ├── 002
/// │   └── 003
/// ├── 004  (has a DW_AT_sibling pointer to 006)
/// │   └── 005
/// └── 006
/// ```
fn assemble_info() -> Vec<u8> {
    let length = Label::new();
    let start = Label::new();
    let end = Label::new();
    let entry_004 = Label::new();
    let entry_006 = Label::new();

    let section = Section::with_endian(Endian::Little)
        // 32-bit unit length.
        .D32(&length)
        .mark(&start)
        // Version.
        .L16(4)
        // Abbreviation table offset.
        .L32(0)
        // Address size.
        .D8(4)
        // 001, depth 0.
        .D8(1)
        .append_bytes(b"001\0")
        // 002, depth 1.
        .D8(1)
        .append_bytes(b"002\0")
        // 003, depth 2.
        .D8(1)
        .append_bytes(b"003\0")
        // End of 003's children.
        .D8(0)
        // End of 002's children.
        .D8(0)
        // 004, depth 1, with a sibling pointer.
        .mark(&entry_004)
        .D8(2)
        .append_bytes(b"004\0")
        .D32(&entry_006)
        // 005, depth 2.
        .D8(1)
        .append_bytes(b"005\0")
        // End of 005's children.
        .D8(0)
        // End of 004's children.
        .D8(0)
        // 006, depth 1.
        .mark(&entry_006)
        .D8(1)
        .append_bytes(b"006\0")
        // End of 006's children.
        .D8(0)
        // End of 001's children.
        .D8(0)
        .mark(&end);

    // Sibling pointers are unit-relative; the unit starts at offset 0, so
    // the section offsets marked above are usable directly.
    section.start().set_const(0);
    length.set_const((&end - &start) as u64);
    section.get_contents().unwrap()
}

fn parse_unit<'input>(
    abbrev: &'input [u8],
    info: &'input [u8],
) -> (
    dwarfling::UnitHeader<EndianSlice<'input, LittleEndian>>,
    dwarfling::AbbrevTable,
) {
    let debug_abbrev = DebugAbbrev::new(abbrev, LittleEndian);
    let debug_info = DebugInfo::new(info, LittleEndian);

    let unit = debug_info
        .units()
        .next()
        .expect("Should parse the unit header")
        .expect("Should have a unit");
    let abbrevs = unit
        .abbreviations(&debug_abbrev)
        .expect("Should parse the abbreviations");
    (unit, abbrevs)
}

#[test]
fn test_cursor_next_entry() {
    let abbrev = assemble_abbrev();
    let info = assemble_info();
    let (unit, abbrevs) = parse_unit(&abbrev, &info);

    let mut cursor = unit.entries(&abbrevs);
    assert_next_entry(&mut cursor, "001");
    assert_next_entry(&mut cursor, "002");
    assert_next_entry(&mut cursor, "003");
    assert_next_entry_null(&mut cursor);
    assert_next_entry_null(&mut cursor);
    assert_next_entry(&mut cursor, "004");
    assert_next_entry(&mut cursor, "005");
    assert_next_entry_null(&mut cursor);
    assert_next_entry_null(&mut cursor);
    assert_next_entry(&mut cursor, "006");
    assert_next_entry_null(&mut cursor);
    assert_next_entry_null(&mut cursor);

    assert!(cursor
        .next_entry()
        .expect("Should parse next entry")
        .is_none());
    assert!(cursor.current().is_none());
}

#[test]
fn test_cursor_next_dfs() {
    let abbrev = assemble_abbrev();
    let info = assemble_info();
    let (unit, abbrevs) = parse_unit(&abbrev, &info);

    let mut cursor = unit.entries(&abbrevs);
    assert_next_dfs(&mut cursor, "001", 0);
    assert_next_dfs(&mut cursor, "002", 1);
    assert_next_dfs(&mut cursor, "003", 1);
    assert_next_dfs(&mut cursor, "004", -1);
    assert_next_dfs(&mut cursor, "005", 1);
    assert_next_dfs(&mut cursor, "006", -1);

    assert!(cursor.next_dfs().expect("Should parse next dfs").is_none());
}

#[test]
fn test_cursor_next_sibling() {
    let abbrev = assemble_abbrev();
    let info = assemble_info();
    let (unit, abbrevs) = parse_unit(&abbrev, &info);

    let mut cursor = unit.entries(&abbrevs);
    assert_next_dfs(&mut cursor, "001", 0);

    // Down to 001's first child, then across the sibling list.
    assert_next_dfs(&mut cursor, "002", 1);
    assert_next_sibling(&mut cursor, "004");

    // 004 carries a sibling pointer, so the jump to 006 does not need to
    // parse 005 at all.
    let sibling_ptr = cursor
        .current()
        .expect("Should have current entry")
        .attr_value(dwarfling::DW_AT_sibling)
        .expect("Should parse sibling attribute")
        .expect("Should have a sibling attribute");
    assert!(matches!(sibling_ptr, AttributeValue::UnitRef(_)));

    assert_next_sibling(&mut cursor, "006");
    assert!(cursor
        .next_sibling()
        .expect("Should parse next sibling")
        .is_none());
}

#[test]
fn test_cursor_entries_at() {
    let abbrev = assemble_abbrev();
    let info = assemble_info();
    let (unit, abbrevs) = parse_unit(&abbrev, &info);

    // Find 004's offset by walking, then restart a cursor there.
    let mut cursor = unit.entries(&abbrevs);
    let mut offset_004 = None;
    while let Some((_, entry)) = cursor.next_dfs().expect("Should parse next dfs") {
        let value = entry
            .attr_value(dwarfling::DW_AT_name)
            .expect("Should parse name")
            .expect("Should have name");
        if value == AttributeValue::String(EndianSlice::new(b"004", LittleEndian)) {
            offset_004 = Some(entry.offset());
            break;
        }
    }
    let offset_004 = offset_004.expect("Should have found 004");

    let mut cursor = unit
        .entries_at(&abbrevs, offset_004)
        .expect("Should create cursor at offset");
    assert_next_entry(&mut cursor, "004");
    assert_next_entry(&mut cursor, "005");
}

#[test]
fn test_cursor_entries_at_invalid_offset() {
    let abbrev = assemble_abbrev();
    let info = assemble_info();
    let (unit, abbrevs) = parse_unit(&abbrev, &info);

    assert!(unit
        .entries_at(&abbrevs, UnitOffset(info.len() + 1))
        .is_err());
}

#[test]
fn test_entries_tree() {
    let abbrev = assemble_abbrev();
    let info = assemble_info();
    let (unit, abbrevs) = parse_unit(&abbrev, &info);

    let mut tree = unit
        .entries_tree(&abbrevs, None)
        .expect("Should create the tree");
    let root = tree.root().expect("Should parse the root entry");
    assert_entry_name(root.entry(), "001");

    let mut children = root.children();

    {
        let child = children
            .next()
            .expect("Should parse child")
            .expect("Should have a child");
        assert_entry_name(child.entry(), "002");

        let mut grandchildren = child.children();
        let grandchild = grandchildren
            .next()
            .expect("Should parse grandchild")
            .expect("Should have a grandchild");
        assert_entry_name(grandchild.entry(), "003");
        assert!(grandchildren
            .next()
            .expect("Should parse grandchild")
            .is_none());
    }

    {
        let child = children
            .next()
            .expect("Should parse child")
            .expect("Should have a child");
        assert_entry_name(child.entry(), "004");

        let mut grandchildren = child.children();
        let grandchild = grandchildren
            .next()
            .expect("Should parse grandchild")
            .expect("Should have a grandchild");
        assert_entry_name(grandchild.entry(), "005");
        assert!(grandchildren
            .next()
            .expect("Should parse grandchild")
            .is_none());
    }

    {
        let child = children
            .next()
            .expect("Should parse child")
            .expect("Should have a child");
        assert_entry_name(child.entry(), "006");
    }

    assert!(children.next().expect("Should parse child").is_none());
}
