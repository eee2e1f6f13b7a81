//! The byte emitter: the second walk over the region tree, consuming a
//! previously computed [`Layout`] to produce the final image. It never
//! re-validates anything the planner already checked; an offset mismatch
//! here would be an engine bug, not a caller mistake, so it's guarded with
//! `debug_assert!`/`unreachable!` rather than a fallible `Result`.

use std::io::{self, Write};

use crate::layout::{Layout, Shdr};
use crate::record::{EhdrFields, PhdrFields, ShdrFields};
use crate::region::DataRegion;

/// Produce the complete byte image `layout` describes. Infallible: a
/// successfully computed `Layout` always has a well-defined byte image.
pub fn emit(layout: &Layout) -> Vec<u8> {
    let mut out = Vec::with_capacity(layout.size() as usize);
    emit_regions(layout, layout.regions(), false, &mut out);
    debug_assert_eq!(out.len() as u64, layout.size());
    out
}

/// Stream the same bytes [`emit`] would produce straight to `writer`.
pub fn emit_to<W: Write>(layout: &Layout, writer: &mut W) -> io::Result<()> {
    writer.write_all(&emit(layout))
}

fn emit_regions(layout: &Layout, regions: &[DataRegion], in_load: bool, out: &mut Vec<u8>) {
    for region in regions {
        match region {
            DataRegion::ElfHeader => emit_ehdr(layout, out),
            DataRegion::SegmentHeaders => emit_phdrs(layout, out),
            DataRegion::Segment(seg) => emit_regions(layout, &seg.regions, true, out),
            DataRegion::SectionHeaders => emit_shdrs(layout, out),
            DataRegion::SectionNameTable(idx) => emit_section(layout, *idx, in_load, out),
            DataRegion::Strtab(idx) => emit_section(layout, *idx, in_load, out),
            DataRegion::Symtab(table) => emit_section(layout, table.index, in_load, out),
            DataRegion::Got(g) => emit_section(layout, g.index, in_load, out),
            DataRegion::Section(s) => emit_section(layout, s.index, in_load, out),
            DataRegion::Raw(bytes) => out.extend_from_slice(bytes),
        }
    }
}

fn shdr_for(layout: &Layout, index: u16) -> &Shdr {
    layout
        .shdrs()
        .get(&index)
        .unwrap_or_else(|| unreachable!("layout invariant: section {index} has no Shdr entry"))
}

fn emit_section(layout: &Layout, index: u16, in_load: bool, out: &mut Vec<u8>) {
    let shdr = shdr_for(layout, index);
    if !shdr.section.data.is_empty() && !in_load {
        let align = shdr.section.addr_align.max(1);
        let target = (out.len() as u64).div_ceil(align) * align;
        out.resize(target as usize, 0);
    }
    out.extend_from_slice(&shdr.section.data);
}

fn emit_ehdr(layout: &Layout, out: &mut Vec<u8>) {
    let fields = EhdrFields {
        header: *layout.header(),
        phoff: layout.phdr_table_offset(),
        shoff: layout.shdr_table_offset(),
        phnum: layout.phdr_count() as u16,
        shnum: layout.shdr_count() as u16,
        shstrndx: layout.shstrndx(),
    };
    fields.write(out);
}

fn emit_phdrs(layout: &Layout, out: &mut Vec<u8>) {
    let class = layout.header().class;
    let encoding = layout.header().data_encoding;
    for phdr in layout.phdrs().values() {
        let fields = PhdrFields {
            seg_type: phdr.seg_type,
            flags: phdr.flags,
            offset: phdr.file_start,
            virt_addr: phdr.virt_addr,
            phys_addr: phdr.phys_addr,
            file_size: phdr.file_size,
            mem_size: phdr.mem_size,
            align: phdr.align,
        };
        fields.write(class, encoding, out);
    }
}

fn emit_shdrs(layout: &Layout, out: &mut Vec<u8>) {
    let class = layout.header().class;
    let encoding = layout.header().data_encoding;

    let align = class.shdr_align();
    let target = (out.len() as u64).div_ceil(align) * align;
    out.resize(target as usize, 0);

    // Index 0: the reserved null section, SHT_NULL, all-zero entry.
    ShdrFields::default().write(class, encoding, out);

    for shdr in layout.shdrs().values() {
        let mut fields = ShdrFields {
            name_offset: shdr.name_offset,
            sh_type: shdr.section.sh_type,
            flags: shdr.section.flags.bits(),
            addr: shdr.section.addr,
            offset: shdr.file_offset,
            size: shdr.section.size,
            link: shdr.section.link,
            info: shdr.section.info,
            addr_align: shdr.section.addr_align,
            entsize: shdr.section.entsize,
        };

        // An empty section's file offset carries no real placement
        // constraint, but some consumers still expect it congruent to
        // sh_addr modulo sh_addralign. The planner never pads an empty
        // section's offset to achieve this, so the emitter fixes up the
        // field here, bit-exact, without touching anything else's offset.
        if shdr.section.data.is_empty() {
            let sec_align = shdr.section.addr_align.max(1);
            let base = fields.offset - fields.offset % sec_align;
            fields.offset = base + shdr.section.addr % sec_align;
        }

        fields.write(class, encoding, out);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::class::{Class, DataEncoding};
    use crate::header::ElfHeader;
    use crate::layout::layout;
    use crate::region::ElfFile;

    #[test]
    fn empty_elf_round_trips_to_the_expected_byte_count() {
        let header = ElfHeader::builder()
            .class(Class::Elf64)
            .data_encoding(DataEncoding::Little)
            .e_type(2)
            .e_machine(0x3E)
            .build();
        let file = ElfFile::builder()
            .header(header)
            .regions(vec![
                DataRegion::ElfHeader,
                DataRegion::SegmentHeaders,
                DataRegion::SectionHeaders,
            ])
            .build();

        let laid_out = layout(&file).unwrap();
        let bytes = emit(&laid_out);
        assert_eq!(bytes.len() as u64, laid_out.size());
        assert_eq!(&bytes[0..4], &ElfHeader::MAGIC);
        assert_eq!(bytes[4], Class::Elf64 as u8);
        assert_eq!(bytes[5], DataEncoding::Little as u8);
    }

    #[test]
    fn emit_to_a_writer_matches_emit() {
        let header = ElfHeader::builder()
            .class(Class::Elf32)
            .data_encoding(DataEncoding::Big)
            .e_type(2)
            .e_machine(0x28)
            .build();
        let file = ElfFile::builder()
            .header(header)
            .regions(vec![
                DataRegion::ElfHeader,
                DataRegion::Raw(b"hi\n".to_vec()),
                DataRegion::SectionHeaders,
            ])
            .build();

        let laid_out = layout(&file).unwrap();
        let via_vec = emit(&laid_out);
        let mut via_writer = Vec::new();
        emit_to(&laid_out, &mut via_writer).unwrap();
        assert_eq!(via_vec, via_writer);
    }
}
