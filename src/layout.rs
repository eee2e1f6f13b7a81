//! The layout planner: walks an [`ElfFile`]'s region tree once, computing
//! every file offset, validating ELF's alignment/ordering/uniqueness
//! invariants as it goes, and producing a [`Layout`] the byte emitter can
//! turn into bytes without ever having to make another decision.
//!
//! Program-header and section-header counts are forward references: the
//! `SegmentHeaders`/`SectionHeaders` sentinels need to know how many entries
//! they'll hold before the segments/sections that produce those entries have
//! necessarily been walked. A read-only pre-scan over the tree resolves both
//! counts (and collects every section/symbol name, so the `.shstrtab`/
//! `.strtab` payloads can be built once, up front) before the real walk
//! begins.

use std::collections::BTreeMap;

use crate::class::{Class, DataEncoding};
use crate::error::{Error, Result};
use crate::got;
use crate::header::ElfHeader;
use crate::region::{
    DataRegion, ElfFile, GnuRelroRegion, GnuStack, MemSize, Section, SectionFlags, Segment,
    SegmentFlags, SymbolTable,
};
use crate::strtab::Strtab;
use crate::symtab;

const SHT_STRTAB: u32 = 3;
const PT_GNU_STACK: u32 = 0x6474_e551;
const PT_GNU_RELRO: u32 = 0x6474_e552;

/// A resolved program-header table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phdr {
    /// `p_type`.
    pub seg_type: u32,
    /// `p_flags`.
    pub flags: SegmentFlags,
    /// `p_offset`.
    pub file_start: u64,
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

/// A resolved section-header table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shdr {
    /// The fully materialized section this entry describes, including its
    /// on-disk payload.
    pub section: Section,
    /// `sh_name`, already resolved through `.shstrtab`.
    pub name_offset: u32,
    /// `sh_offset`, as computed by the planner.
    pub file_offset: u64,
}

/// The output of the layout planner: every offset the byte emitter needs,
/// plus the region tree it was computed from.
#[derive(Debug, Clone)]
pub struct Layout {
    header: ElfHeader,
    regions: Vec<DataRegion>,
    phdr_count: usize,
    shdr_count: usize,
    shstrtab: Strtab,
    strtab: Strtab,
    size: u64,
    phdr_table_offset: u64,
    shdr_table_offset: u64,
    shstrndx: u16,
    phdrs: BTreeMap<u32, Phdr>,
    shdrs: BTreeMap<u16, Shdr>,
}

impl Layout {
    /// Total size in bytes of the image this layout describes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The header this layout was computed for.
    pub fn header(&self) -> &ElfHeader {
        &self.header
    }

    /// The original region tree this layout was computed from.
    pub fn regions(&self) -> &[DataRegion] {
        &self.regions
    }

    /// Resolved program headers, keyed by segment/descriptor index.
    pub fn phdrs(&self) -> &BTreeMap<u32, Phdr> {
        &self.phdrs
    }

    /// Resolved section headers, keyed by section index. Does not include
    /// the implicit null section at index 0.
    pub fn shdrs(&self) -> &BTreeMap<u16, Shdr> {
        &self.shdrs
    }

    /// `e_phnum`.
    pub fn phdr_count(&self) -> usize {
        self.phdr_count
    }

    /// `e_shnum`: includes the implicit null section.
    pub fn shdr_count(&self) -> usize {
        self.shdr_count
    }

    /// `e_phoff`.
    pub fn phdr_table_offset(&self) -> u64 {
        self.phdr_table_offset
    }

    /// `e_shoff`.
    pub fn shdr_table_offset(&self) -> u64 {
        self.shdr_table_offset
    }

    /// `e_shstrndx`.
    pub fn shstrndx(&self) -> u16 {
        self.shstrndx
    }

    /// The built `.shstrtab`.
    pub fn shstrtab(&self) -> &Strtab {
        &self.shstrtab
    }

    /// The built `.strtab` (symbol names).
    pub fn strtab(&self) -> &Strtab {
        &self.strtab
    }
}

#[derive(Default)]
struct PreScan {
    segment_count: usize,
    section_count: usize,
    section_names: Vec<Vec<u8>>,
    symbol_names: Vec<Vec<u8>>,
    strtab_section_index: Option<u16>,
}

fn prescan(regions: &[DataRegion], acc: &mut PreScan) {
    for region in regions {
        match region {
            DataRegion::Segment(seg) => {
                acc.segment_count += 1;
                prescan(&seg.regions, acc);
            }
            DataRegion::Section(s) => {
                acc.section_count += 1;
                acc.section_names.push(s.name.clone());
            }
            DataRegion::SectionNameTable(_) => {
                acc.section_count += 1;
                acc.section_names.push(b".shstrtab".to_vec());
            }
            DataRegion::Strtab(idx) => {
                acc.section_count += 1;
                acc.section_names.push(b".strtab".to_vec());
                acc.strtab_section_index.get_or_insert(*idx);
            }
            DataRegion::Symtab(table) => {
                acc.section_count += 1;
                acc.section_names.push(b".symtab".to_vec());
                for entry in &table.entries {
                    acc.symbol_names.push(entry.name.clone());
                }
            }
            DataRegion::Got(g) => {
                acc.section_count += 1;
                acc.section_names.push(g.name.clone());
            }
            DataRegion::ElfHeader
            | DataRegion::SegmentHeaders
            | DataRegion::SectionHeaders
            | DataRegion::Raw(_) => {}
        }
    }
}

struct Planner<'a> {
    class: Class,
    encoding: DataEncoding,
    output_size: u64,
    phnum: u64,
    shnum: u64,
    phdr_table_offset: u64,
    shdr_table_offset: u64,
    shstrndx: u16,
    strtab_section_index: Option<u16>,
    shstrtab: &'a Strtab,
    strtab: &'a Strtab,
    phdrs: BTreeMap<u32, Phdr>,
    shdrs: BTreeMap<u16, Shdr>,
}

/// Compute the full layout of `file`: every offset, every header, every
/// validation ELF's structure requires.
pub fn layout(file: &ElfFile) -> Result<Layout> {
    let class = file.header.class;
    let encoding = file.header.data_encoding;

    let mut scan = PreScan::default();
    prescan(&file.regions, &mut scan);

    let phnum = scan.segment_count + usize::from(file.gnu_stack.is_some()) + file.gnu_relro.len();
    let shnum = scan.section_count + 1;

    if phnum > 65_535 {
        return Err(Error::TooManyProgramHeaders(phnum));
    }
    if shnum > 65_535 {
        return Err(Error::TooManySectionHeaders(shnum));
    }

    let shstrtab = Strtab::build(scan.section_names.iter().map(Vec::as_slice));
    let strtab = Strtab::build(scan.symbol_names.iter().map(Vec::as_slice));

    let mut p = Planner {
        class,
        encoding,
        output_size: 0,
        phnum: phnum as u64,
        shnum: shnum as u64,
        phdr_table_offset: 0,
        shdr_table_offset: 0,
        shstrndx: 0,
        strtab_section_index: scan.strtab_section_index,
        shstrtab: &shstrtab,
        strtab: &strtab,
        phdrs: BTreeMap::new(),
        shdrs: BTreeMap::new(),
    };

    walk_regions(&mut p, &file.regions, false)?;

    if let Some(stack) = &file.gnu_stack {
        attach_gnu_stack(&mut p, stack)?;
    }
    for relro in &file.gnu_relro {
        attach_gnu_relro(&mut p, relro)?;
    }

    debug_assert_eq!(p.phdrs.len(), phnum, "phdr count drifted from its pre-scanned reservation");
    debug_assert_eq!(p.shdrs.len() + 1, shnum, "shdr count drifted from its pre-scanned reservation");

    log::debug!(
        "layout: class={:?} phnum={} shnum={} size={}",
        class,
        phnum,
        shnum,
        p.output_size
    );

    Ok(Layout {
        header: file.header,
        regions: file.regions.clone(),
        phdr_count: p.phdrs.len(),
        shdr_count: p.shdrs.len() + 1,
        shstrtab,
        strtab,
        size: p.output_size,
        phdr_table_offset: p.phdr_table_offset,
        shdr_table_offset: p.shdr_table_offset,
        shstrndx: p.shstrndx,
        phdrs: p.phdrs,
        shdrs: p.shdrs,
    })
}

fn walk_regions(p: &mut Planner<'_>, regions: &[DataRegion], in_load: bool) -> Result<()> {
    for region in regions {
        match region {
            DataRegion::ElfHeader => {
                if p.output_size != 0 {
                    return Err(Error::HeaderNotAtZero);
                }
                p.output_size += p.class.ehdr_size();
            }
            DataRegion::SegmentHeaders => {
                let align = p.class.phdr_align();
                if p.output_size % align != 0 {
                    return Err(Error::MisalignedPhdrTable {
                        offset: p.output_size,
                        align,
                    });
                }
                p.phdr_table_offset = p.output_size;
                p.output_size += p.phnum * p.class.phdr_entry_size();
            }
            DataRegion::SectionHeaders => {
                if in_load {
                    return Err(Error::SectionHeadersInsideSegment);
                }
                let align = p.class.shdr_align();
                p.output_size = p.output_size.div_ceil(align) * align;
                p.shdr_table_offset = p.output_size;
                p.output_size += p.shnum * p.class.shdr_entry_size();
            }
            DataRegion::Segment(seg) => walk_segment(p, seg)?,
            DataRegion::SectionNameTable(idx) => {
                p.shstrndx = *idx;
                let data = p.shstrtab.payload().to_vec();
                let section = Section {
                    index: *idx,
                    name: b".shstrtab".to_vec(),
                    sh_type: SHT_STRTAB,
                    flags: SectionFlags::empty(),
                    addr: 0,
                    size: data.len() as u64,
                    link: 0,
                    info: 0,
                    addr_align: 1,
                    entsize: 0,
                    data,
                };
                add_section(p, section, in_load)?;
            }
            DataRegion::Strtab(idx) => {
                let data = p.strtab.payload().to_vec();
                let section = Section {
                    index: *idx,
                    name: b".strtab".to_vec(),
                    sh_type: SHT_STRTAB,
                    flags: SectionFlags::empty(),
                    addr: 0,
                    size: data.len() as u64,
                    link: 0,
                    info: 0,
                    addr_align: 1,
                    entsize: 0,
                    data,
                };
                add_section(p, section, in_load)?;
            }
            DataRegion::Symtab(table) => {
                let local_count = table
                    .entries
                    .iter()
                    .filter(|e| e.bind == crate::region::SymbolTableEntry::STB_LOCAL)
                    .count() as u32;
                let data = symtab::write_symtab(p.class, p.encoding, p.strtab, &table.entries)?;
                let strtab_index = p.strtab_section_index.unwrap_or(0);
                let section = symtab::symtab_section(table.index, p.class, strtab_index, local_count, data);
                add_section(p, section, in_load)?;
            }
            DataRegion::Got(g) => {
                let section = got::got_to_section(g, p.class, p.encoding);
                add_section(p, section, in_load)?;
            }
            DataRegion::Section(s) => {
                add_section(p, s.clone(), in_load)?;
            }
            DataRegion::Raw(bytes) => {
                p.output_size += bytes.len() as u64;
            }
        }
    }
    Ok(())
}

fn walk_segment(p: &mut Planner<'_>, seg: &Segment) -> Result<()> {
    if p.phdrs.contains_key(&seg.index) {
        return Err(Error::DuplicateSegmentIndex { index: seg.index });
    }

    let start = p.output_size;
    walk_regions(p, &seg.regions, true)?;
    let file_size = p.output_size - start;

    if file_size > 0 {
        let align = seg.align.max(1);
        if start % align != seg.virt_addr % align {
            return Err(Error::SegmentOffsetAddressCongruence { index: seg.index });
        }
    }

    let mem_size = match seg.mem_size {
        MemSize::Absolute(w) => file_size.max(w),
        MemSize::Relative(d) => file_size + d,
    };

    p.phdrs.insert(
        seg.index,
        Phdr {
            seg_type: seg.seg_type,
            flags: seg.flags,
            file_start: start,
            virt_addr: seg.virt_addr,
            phys_addr: seg.phys_addr,
            file_size,
            mem_size,
            align: seg.align,
        },
    );
    Ok(())
}

fn add_section(p: &mut Planner<'_>, section: Section, in_load: bool) -> Result<()> {
    if p.shdrs.contains_key(&section.index) {
        return Err(Error::DuplicateSectionIndex { index: section.index });
    }

    let align = section.addr_align.max(1);
    if !section.data.is_empty() && section.addr % align != 0 {
        return Err(Error::MisalignedSectionAddress {
            index: section.index,
            addr: section.addr,
            align: section.addr_align,
        });
    }

    let mut offset = p.output_size;
    if !section.data.is_empty() {
        if in_load {
            if offset % align != 0 {
                return Err(Error::UnalignedSectionInSegment {
                    index: section.index,
                    offset,
                    align: section.addr_align,
                });
            }
        } else {
            let padded = offset.div_ceil(align) * align;
            p.output_size += padded - offset;
            offset = padded;
        }
    }

    let name_offset = p.shstrtab.offset(&section.name)?;
    p.output_size += section.data.len() as u64;

    let index = section.index;
    p.shdrs.insert(
        index,
        Shdr {
            section,
            name_offset,
            file_offset: offset,
        },
    );
    Ok(())
}

fn attach_gnu_stack(p: &mut Planner<'_>, stack: &GnuStack) -> Result<()> {
    if p.phdrs.contains_key(&stack.index) {
        return Err(Error::DuplicateSegmentIndex { index: stack.index });
    }
    let mut flags = SegmentFlags::READ | SegmentFlags::WRITE;
    if stack.executable {
        flags |= SegmentFlags::EXEC;
    }
    p.phdrs.insert(
        stack.index,
        Phdr {
            seg_type: PT_GNU_STACK,
            flags,
            file_start: 0,
            virt_addr: 0,
            phys_addr: 0,
            file_size: 0,
            mem_size: 0,
            align: 8,
        },
    );
    Ok(())
}

fn attach_gnu_relro(p: &mut Planner<'_>, relro: &GnuRelroRegion) -> Result<()> {
    if p.phdrs.contains_key(&relro.index) {
        return Err(Error::DuplicateRelroIndex { index: relro.index });
    }
    let referenced = p
        .phdrs
        .get(&relro.ref_segment)
        .ok_or(Error::DanglingRelroSegment {
            segment_index: relro.ref_segment,
        })?;
    let file_start = referenced.file_start + relro.virt_addr.wrapping_sub(referenced.virt_addr);
    p.phdrs.insert(
        relro.index,
        Phdr {
            seg_type: PT_GNU_RELRO,
            flags: SegmentFlags::READ,
            file_start,
            virt_addr: relro.virt_addr,
            phys_addr: relro.virt_addr,
            file_size: 0,
            mem_size: 0,
            align: 1,
        },
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::class::{Class, DataEncoding};
    use crate::header::ElfHeader;

    fn header(class: Class) -> ElfHeader {
        ElfHeader::builder()
            .class(class)
            .data_encoding(DataEncoding::Little)
            .e_type(2)
            .e_machine(0x3E)
            .build()
    }

    #[test]
    fn empty_elf_is_128_bytes_at_class64() {
        let file = ElfFile::builder()
            .header(header(Class::Elf64))
            .regions(vec![
                DataRegion::ElfHeader,
                DataRegion::SegmentHeaders,
                DataRegion::SectionHeaders,
            ])
            .build();

        let laid_out = layout(&file).unwrap();
        assert_eq!(laid_out.size(), 128);
        assert_eq!(laid_out.shdr_table_offset(), 64);
        assert_eq!(laid_out.phdr_table_offset(), 64);
        assert_eq!(laid_out.shdr_count(), 1);
        assert_eq!(laid_out.phdr_count(), 0);
    }

    #[test]
    fn single_raw_region_is_96_bytes_at_class32() {
        let file = ElfFile::builder()
            .header(header(Class::Elf32))
            .regions(vec![
                DataRegion::ElfHeader,
                DataRegion::Raw(b"hi\n".to_vec()),
                DataRegion::SectionHeaders,
            ])
            .build();

        let laid_out = layout(&file).unwrap();
        assert_eq!(laid_out.size(), 96);
    }

    #[test]
    fn duplicate_section_index_is_fatal() {
        let section = |index| {
            Section::builder()
                .index(index)
                .name(b"a".to_vec())
                .sh_type(1)
                .size(0)
                .addr_align(1)
                .build()
        };
        let file = ElfFile::builder()
            .header(header(Class::Elf64))
            .regions(vec![
                DataRegion::ElfHeader,
                DataRegion::Section(section(5)),
                DataRegion::Section(section(5)),
                DataRegion::SectionHeaders,
            ])
            .build();

        assert!(matches!(
            layout(&file),
            Err(Error::DuplicateSectionIndex { index: 5 })
        ));
    }

    #[test]
    fn section_headers_inside_a_segment_is_fatal() {
        let segment = Segment::builder()
            .index(0)
            .seg_type(1)
            .flags(SegmentFlags::READ)
            .virt_addr(0)
            .align(0x1000)
            .mem_size(MemSize::Absolute(0))
            .regions(vec![DataRegion::SectionHeaders])
            .build();
        let file = ElfFile::builder()
            .header(header(Class::Elf64))
            .regions(vec![DataRegion::ElfHeader, DataRegion::Segment(segment)])
            .build();

        assert!(matches!(
            layout(&file),
            Err(Error::SectionHeadersInsideSegment)
        ));
    }

    #[test]
    fn unaligned_section_inside_segment_is_fatal() {
        let section = Section::builder()
            .index(1)
            .name(b"x".to_vec())
            .sh_type(1)
            .size(4)
            .addr(0x1000)
            .addr_align(0x1000)
            .data(vec![1, 2, 3, 4])
            .build();
        let segment = Segment::builder()
            .index(0)
            .seg_type(1)
            .flags(SegmentFlags::READ)
            .virt_addr(0)
            .align(0x1000)
            .mem_size(MemSize::Absolute(0))
            .regions(vec![DataRegion::Raw(vec![0]), DataRegion::Section(section)])
            .build();
        let file = ElfFile::builder()
            .header(header(Class::Elf64))
            .regions(vec![DataRegion::ElfHeader, DataRegion::Segment(segment)])
            .build();

        assert!(matches!(
            layout(&file),
            Err(Error::UnalignedSectionInSegment { index: 1, .. })
        ));
    }

    fn empty_load_segment(index: u32, virt_addr: u64) -> Segment {
        Segment::builder()
            .index(index)
            .seg_type(1)
            .flags(SegmentFlags::READ)
            .virt_addr(virt_addr)
            .align(0x1000)
            .mem_size(MemSize::Absolute(0))
            .build()
    }

    #[test]
    fn gnu_stack_is_attached_as_a_phdr() {
        let file = ElfFile::builder()
            .header(header(Class::Elf64))
            .regions(vec![
                DataRegion::ElfHeader,
                DataRegion::SegmentHeaders,
                DataRegion::SectionHeaders,
            ])
            .gnu_stack(Some(GnuStack::builder().index(0).executable(true).build()))
            .build();

        let laid_out = layout(&file).unwrap();
        assert_eq!(laid_out.phdr_count(), 1);
        let phdr = laid_out.phdrs().get(&0).unwrap();
        assert_eq!(phdr.seg_type, PT_GNU_STACK);
        assert_eq!(
            phdr.flags,
            SegmentFlags::READ | SegmentFlags::WRITE | SegmentFlags::EXEC
        );
        assert_eq!(phdr.file_size, 0);
    }

    #[test]
    fn gnu_relro_derives_its_file_start_from_the_referenced_segment() {
        let file = ElfFile::builder()
            .header(header(Class::Elf64))
            .regions(vec![
                DataRegion::ElfHeader,
                DataRegion::Segment(empty_load_segment(0, 0x1000)),
                DataRegion::SectionHeaders,
            ])
            .gnu_relro(vec![GnuRelroRegion::builder()
                .index(1)
                .ref_segment(0)
                .virt_addr(0x1500)
                .build()])
            .build();

        let laid_out = layout(&file).unwrap();
        let segment_phdr = *laid_out.phdrs().get(&0).unwrap();
        let relro_phdr = laid_out.phdrs().get(&1).unwrap();
        assert_eq!(relro_phdr.seg_type, PT_GNU_RELRO);
        assert_eq!(relro_phdr.flags, SegmentFlags::READ);
        assert_eq!(
            relro_phdr.file_start,
            segment_phdr.file_start + (0x1500 - segment_phdr.virt_addr)
        );
    }

    #[test]
    fn gnu_relro_referencing_a_nonexistent_segment_is_fatal() {
        let file = ElfFile::builder()
            .header(header(Class::Elf64))
            .regions(vec![
                DataRegion::ElfHeader,
                DataRegion::SegmentHeaders,
                DataRegion::SectionHeaders,
            ])
            .gnu_relro(vec![GnuRelroRegion::builder()
                .index(0)
                .ref_segment(7)
                .virt_addr(0x1500)
                .build()])
            .build();

        assert!(matches!(
            layout(&file),
            Err(Error::DanglingRelroSegment { segment_index: 7 })
        ));
    }

    #[test]
    fn gnu_relro_index_colliding_with_a_segment_index_is_fatal() {
        let file = ElfFile::builder()
            .header(header(Class::Elf64))
            .regions(vec![
                DataRegion::ElfHeader,
                DataRegion::Segment(empty_load_segment(0, 0x1000)),
                DataRegion::SectionHeaders,
            ])
            .gnu_relro(vec![GnuRelroRegion::builder()
                .index(0)
                .ref_segment(0)
                .virt_addr(0x1500)
                .build()])
            .build();

        assert!(matches!(
            layout(&file),
            Err(Error::DuplicateRelroIndex { index: 0 })
        ));
    }
}
