//! The ELF header: the identification block plus the fixed fields that
//! follow it. A header is immutable once built; the layout planner only
//! ever reads `class`/`data_encoding` off of it to pick field widths and
//! byte order, and fills in `phoff`/`shoff`/`phnum`/`shnum`/`shstrndx`
//! itself once the rest of the layout is known.

use typed_builder::TypedBuilder;

use crate::class::{Class, DataEncoding};

/// `EI_OSABI`. Consumed as an opaque byte; the engine never interprets it.
pub type OsAbi = u8;

/// The fixed-size ELF header, independent of where in the file it lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct ElfHeader {
    /// `EI_CLASS`.
    pub class: Class,
    /// `EI_DATA`.
    pub data_encoding: DataEncoding,
    /// `EI_VERSION`. Always 1 in practice; carried through unvalidated.
    #[builder(default = 1)]
    pub version: u8,
    /// `EI_OSABI`.
    #[builder(default)]
    pub os_abi: OsAbi,
    /// `EI_ABIVERSION`.
    #[builder(default)]
    pub abi_version: u8,
    /// `e_type`, consumed as an opaque half-word (`ET_REL`, `ET_EXEC`, ...).
    pub e_type: u16,
    /// `e_machine`, consumed as an opaque half-word.
    pub e_machine: u16,
    /// `e_version`.
    #[builder(default = 1)]
    pub e_version: u32,
    /// `e_entry`.
    #[builder(default)]
    pub entry: u64,
    /// `e_flags`.
    #[builder(default)]
    pub flags: u32,
}

impl ElfHeader {
    /// `e_ident[EI_MAG0..EI_MAG3]`.
    pub const MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];
}
