//! Symbol-table entry serialization: turning a [`SymbolTableEntry`] list
//! into the byte payload of a `.symtab`/`.dynsym` section, and building the
//! section wrapper the layout planner synthesizes to hold it.

use crate::class::{Class, DataEncoding};
use crate::error::Result;
use crate::region::{Section, SectionFlags, SymbolTableEntry};
use crate::strtab::Strtab;

const SHT_SYMTAB: u32 = 2;

fn info(entry: &SymbolTableEntry) -> u8 {
    (entry.bind << 4) | (entry.sym_type & 0x0F)
}

/// Serialize `entries` into a `.symtab` section's byte payload, resolving
/// each entry's name through `names`.
pub fn write_symtab(
    class: Class,
    encoding: DataEncoding,
    names: &Strtab,
    entries: &[SymbolTableEntry],
) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(entries.len() * class.symtab_entry_size() as usize);
    for entry in entries {
        let name_offset = names.offset(&entry.name)?;
        match class {
            Class::Elf32 => {
                encoding.write_u32(&mut out, name_offset);
                encoding.write_u32(&mut out, entry.value as u32);
                encoding.write_u32(&mut out, entry.size as u32);
                out.push(info(entry));
                out.push(entry.visibility);
                encoding.write_u16(&mut out, entry.shndx);
            }
            Class::Elf64 => {
                encoding.write_u32(&mut out, name_offset);
                out.push(info(entry));
                out.push(entry.visibility);
                encoding.write_u16(&mut out, entry.shndx);
                encoding.write_u64(&mut out, entry.value);
                encoding.write_u64(&mut out, entry.size);
            }
        }
    }
    Ok(out)
}

/// Build the backing `.symtab` [`Section`] for an already-serialized payload.
pub fn symtab_section(index: u16, class: Class, strtab_index: u16, local_count: u32, data: Vec<u8>) -> Section {
    Section {
        index,
        name: b".symtab".to_vec(),
        sh_type: SHT_SYMTAB,
        flags: SectionFlags::empty(),
        addr: 0,
        size: data.len() as u64,
        link: strtab_index as u32,
        info: local_count,
        addr_align: class.symtab_align(),
        entsize: class.symtab_entry_size(),
        data,
    }
}
