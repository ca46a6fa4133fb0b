//! Map addresses in a debuggee back to function, file and line, in the
//! style of binutils' `addr2line`.
//!
//! This reproduces the crash-address symbolication workflow: find the
//! compilation unit covering an address, walk its DIEs for the enclosing
//! subprogram, then replay the matching line number sequence.

use fallible_iterator::FallibleIterator;
use object::{Object, ObjectSection};
use std::borrow::Cow;
use std::{env, fs, process};

fn main() {
    let args: Vec<String> = env::args().collect();
    let mut opts = getopts::Options::new();
    opts.optopt(
        "e",
        "exe",
        "Set the input file name (default is a.out)",
        "<executable>",
    );

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let file_path = matches.opt_str("e").unwrap_or_else(|| "a.out".to_string());
    let file = fs::File::open(&file_path).expect("Should open file");
    let mmap = unsafe { memmap2::Mmap::map(&file).expect("Should create a mmap for file") };
    let object = object::File::parse(&*mmap).expect("Should parse object file");
    let endian = if object.is_little_endian() {
        dwarfling::RunTimeEndian::Little
    } else {
        dwarfling::RunTimeEndian::Big
    };

    let addrs: Vec<u64> = matches
        .free
        .iter()
        .map(|x| parse_uint_from_hex_string(x))
        .collect();

    let load_section = |id: dwarfling::SectionId| -> Result<_, dwarfling::Error> {
        let data = object
            .section_by_name(id.name())
            .and_then(|section| section.data().ok())
            .unwrap_or(&[]);
        Ok(dwarfling::EndianSlice::new(data, endian))
    };
    let dwarf = dwarfling::Dwarf::load(load_section).expect("Should load DWARF sections");

    for addr in addrs {
        if let Err(e) = find_address(&dwarf, addr) {
            eprintln!("Error looking up 0x{:x}: {}", addr, e);
        }
    }
}

fn parse_uint_from_hex_string(string: &str) -> u64 {
    let hex = string.strip_prefix("0x").unwrap_or(string);
    u64::from_str_radix(hex, 16).expect("Failed to parse address")
}

type Reader<'input> = dwarfling::EndianSlice<'input, dwarfling::RunTimeEndian>;

fn find_address(dwarf: &dwarfling::Dwarf<Reader<'_>>, addr: u64) -> dwarfling::Result<()> {
    let mut headers = dwarf.units();
    while let Some(header) = headers.next()? {
        let unit = dwarf.unit(header)?;
        if !unit_contains_address(dwarf, &unit, addr)? {
            continue;
        }

        if let Some(name) = find_function_name(dwarf, &unit, addr)? {
            println!("{}", name.to_string_lossy());
        } else {
            println!("??");
        }
        if !display_line(dwarf, &unit, addr)? {
            println!("??:0");
        }
        return Ok(());
    }
    println!("Failed to find matching unit for 0x{:x}", addr);
    Ok(())
}

fn unit_contains_address(
    dwarf: &dwarfling::Dwarf<Reader<'_>>,
    unit: &dwarfling::Unit<Reader<'_>>,
    addr: u64,
) -> dwarfling::Result<bool> {
    dwarf
        .unit_ranges(unit)?
        .any(|range| Ok(range.begin <= addr && addr < range.end))
}

/// Walk the unit's DIEs for a subprogram whose ranges cover `addr`.
fn find_function_name<'input>(
    dwarf: &dwarfling::Dwarf<Reader<'input>>,
    unit: &dwarfling::Unit<Reader<'input>>,
    addr: u64,
) -> dwarfling::Result<Option<Reader<'input>>> {
    let mut entries = unit.entries();
    while let Some((_, entry)) = entries.next_dfs()? {
        if entry.tag() != dwarfling::DW_TAG_subprogram {
            continue;
        }
        let found = dwarf
            .die_ranges(unit, entry)?
            .any(|range| Ok(range.begin <= addr && addr < range.end))?;
        if !found {
            continue;
        }
        if let Some(attr) = entry.attr(dwarfling::DW_AT_name)? {
            return Ok(Some(dwarf.attr_string(unit, attr.value())?));
        }
        return Ok(None);
    }
    Ok(None)
}

/// Replay the line sequence covering `addr` and print the source
/// location of the last row at or before it.
fn display_line(
    dwarf: &dwarfling::Dwarf<Reader<'_>>,
    unit: &dwarfling::Unit<Reader<'_>>,
    addr: u64,
) -> dwarfling::Result<bool> {
    let program = match &unit.line_program {
        Some(program) => program.clone(),
        None => return Ok(false),
    };
    let sequences = program.sequences()?;
    let sequence = match sequences
        .iter()
        .find(|sequence| sequence.start <= addr && addr < sequence.end)
    {
        Some(sequence) => sequence,
        None => return Ok(false),
    };

    let mut rows = program.resume(sequence);
    let mut current: Option<(u64, Option<core::num::NonZeroU64>)> = None;
    while let Some(row) = rows.next_row()? {
        if row.address() > addr {
            break;
        }
        if row.end_sequence() {
            current = None;
        } else {
            current = Some((row.file_index(), row.line()));
        }
    }

    let (file_index, line) = match current {
        Some(row) => row,
        None => return Ok(false),
    };

    let header = program.header();
    let file = match header.file(file_index) {
        Some(file) => file,
        None => return Ok(false),
    };

    let mut path = String::new();
    if let Some(directory) = file.directory(header) {
        let directory = dwarf.attr_string(unit, directory)?;
        let directory = directory.to_string_lossy();
        if !directory.starts_with('/') {
            if let Some(comp_dir) = &unit.comp_dir {
                path.push_str(&comp_dir.to_string_lossy());
                path.push('/');
            }
        }
        path.push_str(&directory);
        path.push('/');
    }
    let file_name: Cow<'_, str> = dwarf
        .attr_string(unit, file.path_name())?
        .to_string_lossy();
    println!(
        "{}{}:{}",
        path,
        file_name,
        line.map(|line| line.get()).unwrap_or(0)
    );
    Ok(true)
}
