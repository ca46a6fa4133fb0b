//! A `dwarfdump` clone: print the DWARF sections of an object file in a
//! human readable form.

use object::{Object, ObjectSection};
use std::env;
use std::fs;
use std::io::{self, Write};
use std::process;

type Reader<'input> = dwarfling::EndianSlice<'input, dwarfling::RunTimeEndian>;

#[derive(Default)]
struct Flags {
    info: bool,
    line: bool,
    aranges: bool,
    frames: bool,
    eh_frames: bool,
    raw: bool,
}

fn print_usage(opts: &getopts::Options) -> ! {
    let brief = format!("Usage: {} <options> <file>", env::args().next().unwrap());
    write!(&mut io::stderr(), "{}", opts.usage(&brief)).ok();
    process::exit(1);
}

fn main() {
    let mut opts = getopts::Options::new();
    opts.optflag("i", "", "print .debug_info section");
    opts.optflag("l", "", "print .debug_line section");
    opts.optflag("r", "", "print .debug_aranges section");
    opts.optflag("f", "", "print .debug_frame section");
    opts.optflag("", "eh-frame", "print .eh_frame section");
    opts.optflag("", "raw", "print raw attribute values");

    let matches = match opts.parse(env::args().skip(1)) {
        Ok(m) => m,
        Err(e) => {
            writeln!(&mut io::stderr(), "{}\n", e).ok();
            print_usage(&opts);
        }
    };
    if matches.free.is_empty() {
        print_usage(&opts);
    }

    let mut all = true;
    let mut flags = Flags::default();
    if matches.opt_present("i") {
        flags.info = true;
        all = false;
    }
    if matches.opt_present("l") {
        flags.line = true;
        all = false;
    }
    if matches.opt_present("r") {
        flags.aranges = true;
        all = false;
    }
    if matches.opt_present("f") {
        flags.frames = true;
        all = false;
    }
    if matches.opt_present("eh-frame") {
        flags.eh_frames = true;
        all = false;
    }
    if matches.opt_present("raw") {
        flags.raw = true;
    }
    if all {
        flags.info = true;
        flags.line = true;
        flags.aranges = true;
    }

    for file_path in &matches.free {
        if matches.free.len() != 1 {
            println!("{}", file_path);
            println!();
        }

        let file = fs::File::open(file_path).expect("Should open file");
        let mmap = unsafe { memmap2::Mmap::map(&file).expect("Should create a mmap for file") };
        let object = object::File::parse(&*mmap).expect("Should parse object file");
        let endian = if object.is_little_endian() {
            dwarfling::RunTimeEndian::Little
        } else {
            dwarfling::RunTimeEndian::Big
        };

        if let Err(e) = dump_file(&object, endian, &flags) {
            writeln!(&mut io::stderr(), "{}: {}", file_path, e).ok();
        }
    }
}

fn load_section<'data>(
    object: &object::File<'data>,
    endian: dwarfling::RunTimeEndian,
    name: &str,
) -> Reader<'data> {
    let data = object
        .section_by_name(name)
        .and_then(|section| section.data().ok())
        .unwrap_or(&[]);
    dwarfling::EndianSlice::new(data, endian)
}

fn dump_file(
    object: &object::File,
    endian: dwarfling::RunTimeEndian,
    flags: &Flags,
) -> dwarfling::Result<()> {
    let dwarf = dwarfling::Dwarf::load(|id| -> dwarfling::Result<_> {
        Ok(load_section(object, endian, id.name()))
    })?;

    if flags.info {
        dump_info(&dwarf, flags)?;
    }
    if flags.line {
        dump_line(&dwarf)?;
    }
    if flags.aranges {
        dump_aranges(&dwarf)?;
    }
    if flags.frames {
        let debug_frame = dwarfling::DebugFrame::from(load_section(object, endian, ".debug_frame"));
        println!(".debug_frame");
        println!();
        let bases = dwarfling::BaseAddresses::default();
        dump_cfi_entries(&debug_frame, &bases)?;
    }
    if flags.eh_frames {
        let mut eh_frame = dwarfling::EhFrame::from(load_section(object, endian, ".eh_frame"));
        if let Some(address_size) = object.architecture().address_size() {
            eh_frame.set_address_size(address_size.bytes());
        }
        println!(".eh_frame");
        println!();
        let mut bases = dwarfling::BaseAddresses::default();
        if let Some(section) = object.section_by_name(".eh_frame") {
            bases = bases.set_cfi(section.address());
        }
        if let Some(section) = object.section_by_name(".text") {
            bases = bases.set_text(section.address());
        }
        if let Some(section) = object.section_by_name(".got") {
            bases = bases.set_data(section.address());
        }
        dump_cfi_entries(&eh_frame, &bases)?;
    }
    Ok(())
}

fn dump_info(dwarf: &dwarfling::Dwarf<Reader<'_>>, flags: &Flags) -> dwarfling::Result<()> {
    println!(".debug_info");
    println!();

    let mut iter = dwarf.units();
    while let Some(header) = iter.next()? {
        println!(
            "COMPILE_UNIT<header overall offset = 0x{:08x}>:",
            header.offset().0
        );
        let unit = dwarf.unit(header)?;
        dump_entries(dwarf, &unit, flags)?;
        println!();
    }
    Ok(())
}

fn dump_entries(
    dwarf: &dwarfling::Dwarf<Reader<'_>>,
    unit: &dwarfling::Unit<Reader<'_>>,
    flags: &Flags,
) -> dwarfling::Result<()> {
    let mut depth = 0;
    let mut entries = unit.entries();
    while let Some((delta_depth, entry)) = entries.next_dfs()? {
        depth += delta_depth;
        let indent = depth as usize * 2 + 2;
        println!(
            "<{:2}><0x{:08x}>{:indent$}{}",
            depth,
            entry.offset().0,
            "",
            entry.tag(),
            indent = indent
        );

        let mut attrs = entry.attrs();
        while let Some(attr) = attrs.next()? {
            print!("{:indent$}{:28}", "", attr.name().to_string(), indent = indent + 18);
            if flags.raw {
                println!("{:?}", attr.raw_value());
            } else {
                dump_attr_value(dwarf, unit, &attr)?;
            }
        }
    }
    Ok(())
}

fn dump_attr_value(
    dwarf: &dwarfling::Dwarf<Reader<'_>>,
    unit: &dwarfling::Unit<Reader<'_>>,
    attr: &dwarfling::Attribute<Reader<'_>>,
) -> dwarfling::Result<()> {
    let value = attr.value();
    match value {
        dwarfling::AttributeValue::Addr(address) => {
            println!("0x{:08x}", address);
        }
        dwarfling::AttributeValue::Sdata(data) => {
            println!("{}", data);
        }
        dwarfling::AttributeValue::Udata(data) => match attr.name() {
            dwarfling::DW_AT_high_pc => {
                println!("<offset-from-lowpc>{}", data);
            }
            dwarfling::DW_AT_data_member_location
            | dwarfling::DW_AT_lower_bound
            | dwarfling::DW_AT_upper_bound => {
                println!("{}", data);
            }
            _ => {
                println!("0x{:08x}", data);
            }
        },
        dwarfling::AttributeValue::Flag(true) => {
            println!("yes(1)");
        }
        dwarfling::AttributeValue::Flag(false) => {
            println!("no(0)");
        }
        dwarfling::AttributeValue::SecOffset(offset) => {
            println!("0x{:08x}", offset);
        }
        dwarfling::AttributeValue::UnitRef(offset) => {
            println!("<0x{:08x}>", offset.0);
        }
        dwarfling::AttributeValue::DebugInfoRef(offset) => {
            println!("0x{:08x}", offset.0);
        }
        dwarfling::AttributeValue::DebugLineRef(offset) => {
            println!("0x{:08x}", offset.0);
        }
        dwarfling::AttributeValue::LocationListsRef(offset) => {
            println!("0x{:08x}", offset.0);
        }
        dwarfling::AttributeValue::RangeListsRef(offset) => {
            println!("0x{:08x}", offset.0);
        }
        dwarfling::AttributeValue::Exprloc(expression) => {
            println!("expr len 0x{:04x}", expression.0.len());
        }
        dwarfling::AttributeValue::Encoding(value) => {
            println!("{}", value);
        }
        dwarfling::AttributeValue::Language(value) => {
            println!("{}", value);
        }
        dwarfling::AttributeValue::Inline(value) => {
            println!("{}", value);
        }
        dwarfling::AttributeValue::String(_)
        | dwarfling::AttributeValue::DebugStrRef(_)
        | dwarfling::AttributeValue::DebugStrRefSup(_)
        | dwarfling::AttributeValue::DebugLineStrRef(_)
        | dwarfling::AttributeValue::DebugStrOffsetsIndex(_) => {
            match dwarf.attr_string(unit, value.clone()) {
                Ok(s) => println!("\"{}\"", s.to_string_lossy()),
                Err(_) => println!("{:?}", value),
            }
        }
        dwarfling::AttributeValue::DebugAddrIndex(index) => {
            match dwarf.address(unit, index) {
                Ok(address) => println!("0x{:08x}", address),
                Err(_) => println!("{:?}", value),
            }
        }
        _ => println!("{:?}", value),
    }
    Ok(())
}

fn dump_line(dwarf: &dwarfling::Dwarf<Reader<'_>>) -> dwarfling::Result<()> {
    println!(".debug_line");
    println!();

    let mut iter = dwarf.units();
    while let Some(header) = iter.next()? {
        let unit = dwarf.unit(header)?;
        let program = match &unit.line_program {
            Some(program) => program.clone(),
            None => continue,
        };
        let header = program.header();

        println!();
        println!("Offset:                             0x{:x}", header.offset().0);
        println!("Length:                             {}", header.unit_length());
        println!("DWARF version:                      {}", header.version());
        println!("Prologue length:                    {}", header.header_length());
        println!(
            "Minimum instruction length:         {}",
            header.minimum_instruction_length()
        );
        println!(
            "Maximum operations per instruction: {}",
            header.maximum_operations_per_instruction()
        );
        println!("Default is_stmt:                    {}", header.default_is_stmt());
        println!("Line base:                          {}", header.line_base());
        println!("Line range:                         {}", header.line_range());
        println!("Opcode base:                        {}", header.opcode_base());

        println!();
        println!("The Directory Table:");
        for (i, dir) in header.include_directories().iter().enumerate() {
            let dir = dwarf.attr_string(&unit, dir.clone())?;
            println!("  {} {}", i + 1, dir.to_string_lossy());
        }

        println!();
        println!("The File Name Table");
        println!("  Entry\tDir\tTime\tSize\tName");
        for (i, file) in header.file_names().iter().enumerate() {
            let name = dwarf.attr_string(&unit, file.path_name())?;
            println!(
                "  {}\t{}\t{}\t{}\t{}",
                i + 1,
                file.directory_index(),
                file.timestamp(),
                file.size(),
                name.to_string_lossy()
            );
        }

        println!();
        println!("Line Number Instructions:");
        let mut instructions = header.instructions();
        while let Some(instruction) = instructions.next_instruction(header)? {
            println!("  {}", instruction);
        }

        println!();
        println!("Line Number Rows:");
        println!("<pc>        [lno,col]");
        let mut rows = program.rows();
        let mut file_index = u64::MAX;
        while let Some(row) = rows.next_row()? {
            let line = row.line().map(|line| line.get()).unwrap_or(0);
            let column = match row.column() {
                dwarfling::ColumnType::Column(column) => column.get(),
                dwarfling::ColumnType::LeftEdge => 0,
            };
            print!("0x{:08x}  [{:4},{:2}]", row.address(), line, column);
            if row.is_stmt() {
                print!(" NS");
            }
            if row.basic_block() {
                print!(" BB");
            }
            if row.end_sequence() {
                print!(" ET");
            }
            if row.prologue_end() {
                print!(" PE");
            }
            if row.epilogue_begin() {
                print!(" EB");
            }
            if row.isa() != 0 {
                print!(" IS={}", row.isa());
            }
            if row.discriminator() != 0 {
                print!(" DI={}", row.discriminator());
            }
            if file_index != row.file_index() {
                file_index = row.file_index();
                if let Some(file) = row.file(header) {
                    let name = dwarf.attr_string(&unit, file.path_name())?;
                    if let Some(directory) = file.directory(header) {
                        let directory = dwarf.attr_string(&unit, directory)?;
                        print!(
                            " uri: \"{}/{}\"",
                            directory.to_string_lossy(),
                            name.to_string_lossy()
                        );
                    } else {
                        print!(" uri: \"{}\"", name.to_string_lossy());
                    }
                }
            }
            println!();
        }
    }
    Ok(())
}

fn dump_aranges(dwarf: &dwarfling::Dwarf<Reader<'_>>) -> dwarfling::Result<()> {
    println!(".debug_aranges");
    println!();

    let mut headers = dwarf.debug_aranges.headers();
    while let Some(header) = headers.next()? {
        let cu_offset = header.debug_info_offset();
        let cu = dwarf.debug_info.header_from_offset(cu_offset)?;
        let cu_die_offset = cu_offset.0 + cu.header_size();

        let mut entries = header.entries();
        while let Some(entry) = entries.next()? {
            println!(
                "arange starts at 0x{:08x}, length of 0x{:08x}, cu_die_offset = 0x{:08x}",
                entry.address(),
                entry.length(),
                cu_die_offset
            );
        }
    }
    Ok(())
}

fn dump_cfi_entries<'input, Section>(
    section: &Section,
    bases: &dwarfling::BaseAddresses,
) -> dwarfling::Result<()>
where
    Section: dwarfling::UnwindSection<Reader<'input>>,
{
    let mut entries = section.entries(bases);
    while let Some(entry) = entries.next()? {
        match entry {
            dwarfling::CieOrFde::Cie(cie) => {
                println!("{:#010x}: CIE", cie.offset());
                println!("        length: {:#010x}", cie.entry_len());
                println!("       version: {:#04x}", cie.version());
                println!("    code_align: {}", cie.code_alignment_factor());
                println!("    data_align: {}", cie.data_alignment_factor());
                println!("   ra_register: {}", cie.return_address_register().0);
                let mut instructions = cie.instructions(section, bases);
                while let Some(instruction) = instructions.next()? {
                    println!("                {:?}", instruction);
                }
                println!();
            }
            dwarfling::CieOrFde::Fde(partial) => {
                let fde = match partial.parse(Section::cie_from_offset) {
                    Ok(fde) => fde,
                    Err(e) => {
                        println!("Failed to parse FDE: {}", e);
                        continue;
                    }
                };
                println!("{:#010x}: FDE", fde.offset());
                println!("        length: {:#010x}", fde.entry_len());
                println!("   CIE_pointer: {:#010x}", fde.cie().offset());
                println!("    start_addr: {:#x}", fde.initial_address());
                println!(
                    "    range_size: {:#x} (end_addr = {:#x})",
                    fde.len(),
                    fde.end_address()
                );
                let mut instructions = fde.instructions(section, bases);
                while let Some(instruction) = instructions.next()? {
                    println!("                {:?}", instruction);
                }
                println!();
            }
        }
    }
    Ok(())
}
