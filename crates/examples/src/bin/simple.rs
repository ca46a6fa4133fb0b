//! A simple example of parsing `.debug_info`.
//!
//! This example demonstrates how to load the DWARF sections of an object
//! file and iterate over the compilation units and their DIEs.

use object::{Object, ObjectSection};
use std::{env, fs};

fn main() {
    let mut args = env::args();
    if args.len() != 2 {
        println!("Usage: {} <file>", args.next().unwrap());
        return;
    }
    args.next().unwrap();
    let path = args.next().unwrap();

    let file = fs::File::open(path).unwrap();
    let mmap = unsafe { memmap2::Mmap::map(&file).unwrap() };
    let object = object::File::parse(&*mmap).unwrap();
    let endian = if object.is_little_endian() {
        dwarfling::RunTimeEndian::Little
    } else {
        dwarfling::RunTimeEndian::Big
    };

    dump_file(&object, endian).unwrap();
}

fn load_section<'data>(
    object: &object::File<'data>,
    endian: dwarfling::RunTimeEndian,
    id: dwarfling::SectionId,
) -> dwarfling::EndianSlice<'data, dwarfling::RunTimeEndian> {
    let data = object
        .section_by_name(id.name())
        .and_then(|section| section.data().ok())
        .unwrap_or(&[]);
    dwarfling::EndianSlice::new(data, endian)
}

fn dump_file(
    object: &object::File,
    endian: dwarfling::RunTimeEndian,
) -> Result<(), dwarfling::Error> {
    // Load all of the sections.
    let dwarf = dwarfling::Dwarf::load(|id| -> Result<_, dwarfling::Error> {
        Ok(load_section(object, endian, id))
    })?;

    // Iterate over the compilation units.
    let mut iter = dwarf.units();
    while let Some(header) = iter.next()? {
        println!("Unit at <.debug_info+0x{:x}>", header.offset().0);
        let unit = dwarf.unit(header)?;

        // Iterate over the Debugging Information Entries (DIEs) in the unit.
        let mut depth = 0;
        let mut entries = unit.entries();
        while let Some((delta_depth, entry)) = entries.next_dfs()? {
            depth += delta_depth;
            println!("<{}><{:x}> {}", depth, entry.offset().0, entry.tag());

            // Iterate over the attributes in the DIE.
            let mut attrs = entry.attrs();
            while let Some(attr) = attrs.next()? {
                println!("   {}: {:?}", attr.name(), attr.value());
            }
        }
    }

    Ok(())
}
