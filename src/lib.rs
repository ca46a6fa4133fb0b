//! `dwarfling` is a lazy, zero-copy reader for the DWARF debugging
//! information format.
//!
//! * **Zero-copy:** everything is just a reference to the original input
//!   buffer. No copies of the input data ever get made.
//!
//! * **Lazy:** only the compilation units' entries that you iterate over
//!   get parsed, and only as deep as you ask. Skip over a compilation unit
//!   and its entries don't get parsed.
//!
//! * **Cross-platform:** `dwarfling` isn't coupled to any platform or
//!   object file format. Use your own ELF parser on Linux or a Mach-O
//!   parser on macOS. Unsure which object file parser to use? Try the
//!   cross-platform [`object`](https://crates.io/crates/object) crate.
//!
//! This library targets the second through fifth editions of the DWARF
//! standard.
//!
//! ## Example Usage
//!
//! Print out all of the functions in the debuggee program:
//!
//! ```rust,no_run
//! # fn example() -> Result<(), dwarfling::Error> {
//! # type R = dwarfling::EndianSlice<'static, dwarfling::LittleEndian>;
//! # let get_file_section_reader = |name| -> Result<R, dwarfling::Error> { unimplemented!() };
//! // Read the DWARF sections with whatever object loader you're using.
//! // The closure should return a `Reader` instance (e.g. `EndianSlice`).
//! let loader = |section: dwarfling::SectionId| get_file_section_reader(section.name());
//! let dwarf = dwarfling::Dwarf::load(loader)?;
//!
//! // Iterate over all compilation units.
//! let mut iter = dwarf.units();
//! while let Some(header) = iter.next()? {
//!     // Parse the abbreviations and other information for this unit.
//!     let unit = dwarf.unit(header)?;
//!
//!     // Iterate over all of this unit's entries.
//!     let mut entries = unit.entries();
//!     while let Some((_, entry)) = entries.next_dfs()? {
//!         // If we find an entry for a function, print it.
//!         if entry.tag() == dwarfling::DW_TAG_subprogram {
//!             println!("Found a function: {:?}", entry.offset());
//!         }
//!     }
//! }
//! # unreachable!()
//! # }
//! ```
//!
//! See the example binaries in `crates/examples` for complete programs,
//! including `addr2line` and `dwarfdump` clones.
//!
//! ## API Structure
//!
//! * Basic familiarity with DWARF is assumed.
//!
//! * The [`Dwarf`](./struct.Dwarf.html) type contains the commonly used
//!   DWARF sections and has methods that simplify access to debugging data
//!   that spans multiple sections. Use of this type is optional, but
//!   recommended.
//!
//! * Each section gets its own type, e.g. [`DebugInfo`](./struct.DebugInfo.html)
//!   for `.debug_info` and [`DebugLine`](./struct.DebugLine.html) for
//!   `.debug_line`. Section types expose methods for accessing the
//!   debugging data encoded in that section, and are the entry points to
//!   the library for callers that don't use `Dwarf`.
//!
//! * Offsets into a section are strongly typed: an offset into
//!   `.debug_info` is a [`DebugInfoOffset`](./struct.DebugInfoOffset.html)
//!   and cannot be used to index into `.debug_line`.
//!
//! ## Using with `FallibleIterator`
//!
//! The standard library's `Iterator` trait does not play well with
//! iterators where the `next` operation is fallible. With the default
//! `fallible-iterator` feature enabled, the lazy parsing iterators in this
//! crate implement the
//! [`fallible-iterator`](https://crates.io/crates/fallible-iterator)
//! crate's `FallibleIterator` trait, which provides the combinators you
//! have come to expect (`map`, `filter`, and so on) for iterators that can
//! fail.

#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_arguments)]

pub mod constants;
// Re-export all of the DW_* constants for convenience.
pub use crate::constants::*;

mod common;
pub use crate::common::*;

mod endianity;
pub use crate::endianity::{BigEndian, Endianity, LittleEndian, NativeEndian, RunTimeEndian};

pub mod leb128;

pub mod read;
// Most callers use the flat namespace.
pub use crate::read::*;

#[cfg(test)]
mod test_util;
