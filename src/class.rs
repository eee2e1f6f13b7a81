//! Runtime ELF class and data-encoding tags, and the width/alignment tables
//! the rest of the layout engine consults instead of re-deriving a field
//! width every time it needs one.
//!
//! The original notion of "class" as a type-level parameter (as you'd see in
//! a parser generic over `ELFCLASS32`/`ELFCLASS64`) is deliberately not used
//! here: the layout engine decides everything about a file's shape at
//! runtime, from a single `ElfFile` value, so `Class` is a plain two-variant
//! enum consulted at each width-dependent decision point.

use num_derive::{FromPrimitive, ToPrimitive};

/// The file's class: the address width used throughout the file.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
pub enum Class {
    /// 32-bit addresses (`ELFCLASS32`).
    Elf32 = 1,
    /// 64-bit addresses (`ELFCLASS64`).
    Elf64 = 2,
}

impl Class {
    /// Size in bytes of the ELF header for this class (`e_ehsize`).
    pub const fn ehdr_size(self) -> u64 {
        match self {
            Class::Elf32 => 52,
            Class::Elf64 => 64,
        }
    }

    /// Required alignment of the program-header table's file offset.
    pub const fn phdr_align(self) -> u64 {
        match self {
            Class::Elf32 => 4,
            Class::Elf64 => 8,
        }
    }

    /// Size in bytes of a single program-header table entry (`e_phentsize`).
    pub const fn phdr_entry_size(self) -> u64 {
        match self {
            Class::Elf32 => 32,
            Class::Elf64 => 56,
        }
    }

    /// Required alignment of the section-header table's file offset.
    pub const fn shdr_align(self) -> u64 {
        match self {
            Class::Elf32 => 4,
            Class::Elf64 => 8,
        }
    }

    /// Size in bytes of a single section-header table entry (`e_shentsize`).
    pub const fn shdr_entry_size(self) -> u64 {
        match self {
            Class::Elf32 => 40,
            Class::Elf64 => 64,
        }
    }

    /// Size in bytes of a single `.symtab` entry.
    pub const fn symtab_entry_size(self) -> u64 {
        match self {
            Class::Elf32 => 16,
            Class::Elf64 => 24,
        }
    }

    /// Required alignment of a `.symtab` section.
    pub const fn symtab_align(self) -> u64 {
        match self {
            Class::Elf32 => 4,
            Class::Elf64 => 8,
        }
    }

    /// Width in bytes of an address/offset field (`Elf32_Addr`/`Elf64_Addr`).
    pub const fn addr_width(self) -> usize {
        match self {
            Class::Elf32 => 4,
            Class::Elf64 => 8,
        }
    }
}

/// The file's data encoding: byte order of every multi-byte field in the file.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
pub enum DataEncoding {
    /// Little-endian (`ELFDATA2LSB`).
    Little = 1,
    /// Big-endian (`ELFDATA2MSB`).
    Big = 2,
}

impl DataEncoding {
    /// Write a 16-bit field in this encoding.
    pub fn write_u16(self, out: &mut Vec<u8>, value: u16) {
        match self {
            DataEncoding::Little => out.extend_from_slice(&value.to_le_bytes()),
            DataEncoding::Big => out.extend_from_slice(&value.to_be_bytes()),
        }
    }

    /// Write a 32-bit field in this encoding.
    pub fn write_u32(self, out: &mut Vec<u8>, value: u32) {
        match self {
            DataEncoding::Little => out.extend_from_slice(&value.to_le_bytes()),
            DataEncoding::Big => out.extend_from_slice(&value.to_be_bytes()),
        }
    }

    /// Write a 64-bit field in this encoding.
    pub fn write_u64(self, out: &mut Vec<u8>, value: u64) {
        match self {
            DataEncoding::Little => out.extend_from_slice(&value.to_le_bytes()),
            DataEncoding::Big => out.extend_from_slice(&value.to_be_bytes()),
        }
    }

    /// Write an address/offset field, width-dispatched on `class`.
    pub fn write_addr(self, out: &mut Vec<u8>, class: Class, value: u64) {
        match class {
            Class::Elf32 => self.write_u32(out, value as u32),
            Class::Elf64 => self.write_u64(out, value),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn widths_match_the_elf_spec() {
        assert_eq!(Class::Elf32.ehdr_size(), 52);
        assert_eq!(Class::Elf64.ehdr_size(), 64);
        assert_eq!(Class::Elf32.phdr_entry_size(), 32);
        assert_eq!(Class::Elf64.phdr_entry_size(), 56);
        assert_eq!(Class::Elf32.shdr_entry_size(), 40);
        assert_eq!(Class::Elf64.shdr_entry_size(), 64);
        assert_eq!(Class::Elf32.symtab_entry_size(), 16);
        assert_eq!(Class::Elf64.symtab_entry_size(), 24);
    }

    #[test]
    fn write_addr_dispatches_on_class() {
        let mut out = Vec::new();
        DataEncoding::Little.write_addr(&mut out, Class::Elf32, 0x1234);
        assert_eq!(out, vec![0x34, 0x12, 0x00, 0x00]);

        let mut out = Vec::new();
        DataEncoding::Big.write_addr(&mut out, Class::Elf64, 0x1234);
        assert_eq!(
            out,
            vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x12, 0x34]
        );
    }
}
