//! A layout engine for building byte-exact ELF object files.
//!
//! Callers build an editable [`ElfFile`] out of [`DataRegion`]s — headers,
//! segments, sections, string tables, symbol tables, raw bytes — in file
//! order, call [`layout`] to resolve every offset and forward reference into
//! a [`Layout`], then call [`emit`] (or [`emit_to`] to stream straight to a
//! writer) to produce the final bytes.
//!
//! Parsing an existing ELF image back into this tree, relocation
//! application, dynamic-section interpretation, and decoding enumerated
//! constants (segment types, section types, machine IDs) are all out of
//! scope: this crate only builds images from an already-decided tree, it
//! doesn't read or interpret them.

#![warn(missing_docs)]

pub mod class;
pub mod error;
pub mod got;
pub mod header;
pub mod layout;
pub mod record;
pub mod region;
pub mod strtab;
pub mod symtab;
pub mod traverse;

mod emit;

pub use class::{Class, DataEncoding};
pub use emit::{emit, emit_to};
pub use error::{Error, Result};
pub use got::{got_to_section, section_as_got, GotError};
pub use header::ElfHeader;
pub use layout::{layout, Layout, Phdr, Shdr};
pub use region::{
    DataRegion, ElfFile, GnuRelroRegion, GnuStack, Got, MemSize, Section, SectionFlags, Segment,
    SegmentFlags, SymbolTable, SymbolTableEntry,
};
pub use strtab::Strtab;
pub use traverse::{update_regions, update_sections, update_segments, SectionRegion};
