//! Wire-format records: the byte-exact, class/order-specific serialization
//! of the ELF header, program headers, and section headers.
//!
//! Field access is just plain struct fields, per-class write methods pick
//! the right widths and (for `Phdr`) the right field order — no reflection
//! or generic `Field<T>` machinery. The 32-bit and 64-bit `Phdr` layouts
//! intentionally do not share a code path: `p_flags` sits at a different
//! position in the two (position 7 of 8 in `Elf32_Phdr`, position 2 of 8 in
//! `Elf64_Phdr`), and genericizing the write would obscure that rather than
//! make it clearer.

use crate::class::{Class, DataEncoding};
use crate::header::ElfHeader;
use crate::region::SegmentFlags;

/// Resolved field values for one `Elf32_Ehdr`/`Elf64_Ehdr`.
pub struct EhdrFields {
    /// The header's fixed fields.
    pub header: ElfHeader,
    /// `e_phoff`.
    pub phoff: u64,
    /// `e_shoff`.
    pub shoff: u64,
    /// `e_phnum`.
    pub phnum: u16,
    /// `e_shnum`.
    pub shnum: u16,
    /// `e_shstrndx`.
    pub shstrndx: u16,
}

impl EhdrFields {
    /// Write the full identification block plus fixed header fields.
    pub fn write(&self, out: &mut Vec<u8>) {
        let class = self.header.class;
        let enc = self.header.data_encoding;

        out.extend_from_slice(&ElfHeader::MAGIC);
        out.push(class as u8);
        out.push(enc as u8);
        out.push(self.header.version);
        out.push(self.header.os_abi);
        out.push(self.header.abi_version);
        out.extend_from_slice(&[0u8; 7]); // EI_PAD

        enc.write_u16(out, self.header.e_type);
        enc.write_u16(out, self.header.e_machine);
        enc.write_u32(out, self.header.e_version);
        enc.write_addr(out, class, self.header.entry);
        enc.write_addr(out, class, self.phoff);
        enc.write_addr(out, class, self.shoff);
        enc.write_u32(out, self.header.flags);
        enc.write_u16(out, class.ehdr_size() as u16);
        enc.write_u16(out, class.phdr_entry_size() as u16);
        enc.write_u16(out, self.phnum);
        enc.write_u16(out, class.shdr_entry_size() as u16);
        enc.write_u16(out, self.shnum);
        enc.write_u16(out, self.shstrndx);
    }
}

/// Resolved field values for one program-header table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhdrFields {
    /// `p_type`.
    pub seg_type: u32,
    /// `p_flags`.
    pub flags: SegmentFlags,
    /// `p_offset`.
    pub offset: u64,
    /// `p_vaddr`.
    pub virt_addr: u64,
    /// `p_paddr`.
    pub phys_addr: u64,
    /// `p_filesz`.
    pub file_size: u64,
    /// `p_memsz`.
    pub mem_size: u64,
    /// `p_align`.
    pub align: u64,
}

impl PhdrFields {
    /// Write this entry, in the field order the given class uses.
    pub fn write(&self, class: Class, enc: DataEncoding, out: &mut Vec<u8>) {
        match class {
            Class::Elf32 => {
                enc.write_u32(out, self.seg_type);
                enc.write_addr(out, class, self.offset);
                enc.write_addr(out, class, self.virt_addr);
                enc.write_addr(out, class, self.phys_addr);
                enc.write_addr(out, class, self.file_size);
                enc.write_addr(out, class, self.mem_size);
                enc.write_u32(out, self.flags.bits());
                enc.write_addr(out, class, self.align);
            }
            Class::Elf64 => {
                enc.write_u32(out, self.seg_type);
                enc.write_u32(out, self.flags.bits());
                enc.write_addr(out, class, self.offset);
                enc.write_addr(out, class, self.virt_addr);
                enc.write_addr(out, class, self.phys_addr);
                enc.write_addr(out, class, self.file_size);
                enc.write_addr(out, class, self.mem_size);
                enc.write_addr(out, class, self.align);
            }
        }
    }
}

/// Resolved field values for one section-header table entry. Field order is
/// the same across both classes; only widths differ.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShdrFields {
    /// `sh_name`.
    pub name_offset: u32,
    /// `sh_type`.
    pub sh_type: u32,
    /// `sh_flags`.
    pub flags: u64,
    /// `sh_addr`.
    pub addr: u64,
    /// `sh_offset`.
    pub offset: u64,
    /// `sh_size`.
    pub size: u64,
    /// `sh_link`.
    pub link: u32,
    /// `sh_info`.
    pub info: u32,
    /// `sh_addralign`.
    pub addr_align: u64,
    /// `sh_entsize`.
    pub entsize: u64,
}

impl ShdrFields {
    /// Write this entry at the given class's widths.
    pub fn write(&self, class: Class, enc: DataEncoding, out: &mut Vec<u8>) {
        enc.write_u32(out, self.name_offset);
        enc.write_u32(out, self.sh_type);
        enc.write_addr(out, class, self.flags);
        enc.write_addr(out, class, self.addr);
        enc.write_addr(out, class, self.offset);
        enc.write_addr(out, class, self.size);
        enc.write_u32(out, self.link);
        enc.write_u32(out, self.info);
        enc.write_addr(out, class, self.addr_align);
        enc.write_addr(out, class, self.entsize);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::class::DataEncoding;

    #[test]
    fn null_shdr_is_all_zero() {
        let mut out = Vec::new();
        ShdrFields::default().write(Class::Elf64, DataEncoding::Little, &mut out);
        assert_eq!(out, vec![0u8; Class::Elf64.shdr_entry_size() as usize]);
    }

    #[test]
    fn phdr_field_order_differs_by_class() {
        let fields = PhdrFields {
            seg_type: 1,
            flags: SegmentFlags::READ | SegmentFlags::EXEC,
            offset: 0,
            virt_addr: 0x1000,
            phys_addr: 0x1000,
            file_size: 0x20,
            mem_size: 0x20,
            align: 0x1000,
        };

        let mut out32 = Vec::new();
        fields.write(Class::Elf32, DataEncoding::Little, &mut out32);
        assert_eq!(out32.len(), Class::Elf32.phdr_entry_size() as usize);
        // p_flags sits at byte offset 24 in Elf32_Phdr.
        assert_eq!(&out32[24..28], &fields.flags.bits().to_le_bytes());

        let mut out64 = Vec::new();
        fields.write(Class::Elf64, DataEncoding::Little, &mut out64);
        assert_eq!(out64.len(), Class::Elf64.phdr_entry_size() as usize);
        // p_flags sits at byte offset 4 in Elf64_Phdr.
        assert_eq!(&out64[4..8], &fields.flags.bits().to_le_bytes());
    }

    macro_rules! shdr_size_test {
        ($class:ident, $enc:ident) => {
            paste::paste! {
                #[test]
                fn [<shdr_write_len_matches_ $class:lower _ $enc:lower>]() {
                    let mut out = Vec::new();
                    ShdrFields::default().write(Class::$class, DataEncoding::$enc, &mut out);
                    assert_eq!(out.len() as u64, Class::$class.shdr_entry_size());
                }
            }
        };
    }

    shdr_size_test!(Elf32, Little);
    shdr_size_test!(Elf32, Big);
    shdr_size_test!(Elf64, Little);
    shdr_size_test!(Elf64, Big);
}
