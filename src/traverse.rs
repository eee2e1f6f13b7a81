//! Tree-walking helpers for editing an [`ElfFile`] without hand-rolling the
//! segment recursion every caller would otherwise need. Each helper descends
//! into segments, preserves sibling order, and rebuilds the tree bottom-up;
//! none of them reorder siblings.

use crate::region::{DataRegion, ElfFile, Got, Section, Segment, SymbolTable};

/// A region that ends up as a section in the final layout: a plain
/// [`Section`], or one of the sentinel/synthesized kinds (`.shstrtab`,
/// `.strtab`, `.symtab`, a GOT) the planner turns into one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionRegion {
    /// An ordinary section.
    Section(Section),
    /// The `.shstrtab` sentinel, by its assigned index.
    SectionNameTable(u16),
    /// The `.strtab` sentinel, by its assigned index.
    Strtab(u16),
    /// The `.symtab` sentinel and its entries.
    Symtab(SymbolTable),
    /// A Global Offset Table section.
    Got(Got),
}

impl SectionRegion {
    fn from_region(region: DataRegion) -> std::result::Result<SectionRegion, DataRegion> {
        match region {
            DataRegion::Section(s) => Ok(SectionRegion::Section(s)),
            DataRegion::SectionNameTable(i) => Ok(SectionRegion::SectionNameTable(i)),
            DataRegion::Strtab(i) => Ok(SectionRegion::Strtab(i)),
            DataRegion::Symtab(t) => Ok(SectionRegion::Symtab(t)),
            DataRegion::Got(g) => Ok(SectionRegion::Got(g)),
            other => Err(other),
        }
    }

    fn into_region(self) -> DataRegion {
        match self {
            SectionRegion::Section(s) => DataRegion::Section(s),
            SectionRegion::SectionNameTable(i) => DataRegion::SectionNameTable(i),
            SectionRegion::Strtab(i) => DataRegion::Strtab(i),
            SectionRegion::Symtab(t) => DataRegion::Symtab(t),
            SectionRegion::Got(g) => DataRegion::Got(g),
        }
    }
}

/// Visit every section-adjacent region in `file` (including nested ones
/// inside segments), replacing or deleting it per `f`'s return value.
pub fn update_sections<F>(file: &ElfFile, mut f: F) -> ElfFile
where
    F: FnMut(SectionRegion) -> Option<SectionRegion>,
{
    update_regions(file, move |region| match SectionRegion::from_region(region) {
        Ok(section) => f(section).map(SectionRegion::into_region),
        Err(other) => Some(other),
    })
}

/// Visit every [`Segment`] in `file` (including nested ones), replacing or
/// deleting it per `f`'s return value. `f` receives each segment with its
/// own nested regions already updated by this same traversal.
pub fn update_segments<F>(file: &ElfFile, mut f: F) -> ElfFile
where
    F: FnMut(Segment) -> Option<Segment>,
{
    update_regions(file, move |region| match region {
        DataRegion::Segment(s) => f(s).map(DataRegion::Segment),
        other => Some(other),
    })
}

/// Visit every region in `file`, at every nesting depth, replacing or
/// deleting it per `f`'s return value. This is the most general traversal;
/// [`update_sections`] and [`update_segments`] are built on it.
pub fn update_regions<F>(file: &ElfFile, mut f: F) -> ElfFile
where
    F: FnMut(DataRegion) -> Option<DataRegion>,
{
    ElfFile {
        header: file.header,
        regions: update_regions_list(&file.regions, &mut f),
        gnu_stack: file.gnu_stack,
        gnu_relro: file.gnu_relro.clone(),
    }
}

fn update_regions_list(
    regions: &[DataRegion],
    f: &mut dyn FnMut(DataRegion) -> Option<DataRegion>,
) -> Vec<DataRegion> {
    let mut out = Vec::with_capacity(regions.len());
    for region in regions.iter().cloned() {
        let region = match region {
            DataRegion::Segment(mut seg) => {
                seg.regions = update_regions_list(&seg.regions, f);
                DataRegion::Segment(seg)
            }
            other => other,
        };
        if let Some(region) = f(region) {
            out.push(region);
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::class::{Class, DataEncoding};
    use crate::header::ElfHeader;
    use crate::region::{MemSize, SegmentFlags};

    fn header() -> ElfHeader {
        ElfHeader::builder()
            .class(Class::Elf64)
            .data_encoding(DataEncoding::Little)
            .e_type(2)
            .e_machine(0x3E)
            .build()
    }

    fn section(index: u16, name: &str) -> Section {
        Section::builder()
            .index(index)
            .name(name.as_bytes().to_vec())
            .sh_type(1)
            .size(0)
            .addr_align(1)
            .build()
    }

    #[test]
    fn update_sections_descends_into_segments_preserving_order() {
        let segment = Segment::builder()
            .index(0)
            .seg_type(1)
            .flags(SegmentFlags::READ)
            .virt_addr(0)
            .align(1)
            .mem_size(MemSize::Absolute(0))
            .regions(vec![DataRegion::Section(section(1, "a"))])
            .build();
        let file = ElfFile::builder()
            .header(header())
            .regions(vec![
                DataRegion::ElfHeader,
                DataRegion::Segment(segment),
                DataRegion::Section(section(2, "b")),
            ])
            .build();

        let mut seen = Vec::new();
        let updated = update_sections(&file, |region| {
            if let SectionRegion::Section(s) = &region {
                seen.push(s.index);
            }
            Some(region)
        });

        assert_eq!(seen, vec![1, 2]);
        assert_eq!(updated.regions.len(), 3);
    }

    #[test]
    fn update_sections_can_delete() {
        let file = ElfFile::builder()
            .header(header())
            .regions(vec![
                DataRegion::ElfHeader,
                DataRegion::Section(section(1, "a")),
                DataRegion::Section(section(2, "b")),
            ])
            .build();

        let updated = update_sections(&file, |region| match &region {
            SectionRegion::Section(s) if s.index == 1 => None,
            _ => Some(region),
        });

        assert_eq!(updated.regions.len(), 2);
    }

    #[test]
    fn update_segments_leaves_non_segments_untouched() {
        let file = ElfFile::builder()
            .header(header())
            .regions(vec![DataRegion::ElfHeader, DataRegion::Section(section(1, "a"))])
            .build();

        let updated = update_segments(&file, Some);
        assert_eq!(updated.regions, file.regions);
    }
}
