//! The editable in-memory ELF region tree: [`ElfFile`], [`DataRegion`], and
//! the concrete region kinds (`Segment`, `Section`, `Got`, `SymbolTable`, the
//! GNU stack/relro descriptors) the layout planner walks to compute a
//! [`crate::layout::Layout`].

use bitflags::bitflags;
use typed_builder::TypedBuilder;

use crate::header::ElfHeader;

bitflags! {
    /// Section header flags (`sh_flags`). Only the bits this engine's own
    /// invariants (GOT recognition, alloc/write checks) consult are named;
    /// unrecognized bits still round-trip through `bits()`/`from_bits_truncate`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SectionFlags: u64 {
        /// `SHF_WRITE`.
        const WRITE = 0x1;
        /// `SHF_ALLOC`.
        const ALLOC = 0x2;
        /// `SHF_EXECINSTR`.
        const EXECINSTR = 0x4;
        /// `SHF_MERGE`.
        const MERGE = 0x10;
        /// `SHF_STRINGS`.
        const STRINGS = 0x20;
        /// `SHF_INFO_LINK`.
        const INFO_LINK = 0x40;
        /// `SHF_LINK_ORDER`.
        const LINK_ORDER = 0x80;
        /// `SHF_GROUP`.
        const GROUP = 0x200;
        /// `SHF_TLS`.
        const TLS = 0x400;
        /// `SHF_COMPRESSED`.
        const COMPRESSED = 0x800;
    }
}

bitflags! {
    /// Program header flags (`p_flags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SegmentFlags: u32 {
        /// `PF_X`.
        const EXEC = 0x1;
        /// `PF_W`.
        const WRITE = 0x2;
        /// `PF_R`.
        const READ = 0x4;
    }
}

/// A named, sized, ordinary ELF section and its byte payload.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct Section {
    /// This section's index in the eventual section-header table.
    pub index: u16,
    /// `sh_name`, resolved through `.shstrtab` at layout time.
    #[builder(setter(into))]
    pub name: Vec<u8>,
    /// `sh_type`, consumed as an opaque word.
    pub sh_type: u32,
    /// `sh_flags`.
    #[builder(default)]
    pub flags: SectionFlags,
    /// `sh_addr`.
    #[builder(default)]
    pub addr: u64,
    /// `sh_size`. Independent of `data.len()` for `SHT_NOBITS` sections,
    /// which declare a size but occupy no file bytes.
    pub size: u64,
    /// `sh_link`.
    #[builder(default)]
    pub link: u32,
    /// `sh_info`.
    #[builder(default)]
    pub info: u32,
    /// `sh_addralign`.
    pub addr_align: u64,
    /// `sh_entsize`.
    #[builder(default)]
    pub entsize: u64,
    /// The section's on-disk payload. Empty for `SHT_NOBITS` sections.
    #[builder(default)]
    pub data: Vec<u8>,
}

/// One `.symtab`/`.dynsym` entry, independent of class.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct SymbolTableEntry {
    /// `st_name`, resolved through the symbol table's `.strtab` at layout time.
    #[builder(setter(into))]
    pub name: Vec<u8>,
    /// The low nibble of `st_info`: `STT_*`.
    pub sym_type: u8,
    /// The high nibble of `st_info`: `STB_*`.
    pub bind: u8,
    /// `st_other`.
    #[builder(default)]
    pub visibility: u8,
    /// `st_shndx`.
    pub shndx: u16,
    /// `st_value`.
    #[builder(default)]
    pub value: u64,
    /// `st_size`.
    #[builder(default)]
    pub size: u64,
}

impl SymbolTableEntry {
    /// `STB_LOCAL`: local symbols must precede all others and are counted
    /// separately into the synthesized `.symtab` section's `sh_info`.
    pub const STB_LOCAL: u8 = 0;
}

/// A symbol table and the index of the section it will be synthesized into.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct SymbolTable {
    /// This table's `.symtab` section index.
    pub index: u16,
    /// The table's entries, in the order they'll be written.
    #[builder(default)]
    pub entries: Vec<SymbolTableEntry>,
}

/// A Global Offset Table section, expressed as entry values rather than raw,
/// class-width-resolved bytes. See [`crate::got`] for the conversions to and
/// from a plain [`Section`].
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct Got {
    /// This GOT's section index.
    pub index: u16,
    /// `sh_name`.
    #[builder(setter(into))]
    pub name: Vec<u8>,
    /// `sh_addr`.
    #[builder(default)]
    pub addr: u64,
    /// `sh_addralign`.
    pub addr_align: u64,
    /// `sh_flags`. Must include `WRITE | ALLOC` to round-trip through
    /// [`crate::got::section_as_got`].
    #[builder(default)]
    pub flags: SectionFlags,
    /// Entry values, each one GOT slot wide.
    #[builder(default)]
    pub entries: Vec<u64>,
}

/// How a segment's `p_memsz` is derived from its computed file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemSize {
    /// `p_memsz = max(file_size, w)`.
    Absolute(u64),
    /// `p_memsz = file_size + d`: `d` extra bytes of zero-filled memory
    /// beyond what's backed by the file (the common `.bss` pattern).
    Relative(u64),
}

/// A loadable segment and the ordered sub-tree of regions it contains.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct Segment {
    /// This segment's index in the eventual program-header table.
    pub index: u32,
    /// `p_type`, consumed as an opaque word (`PT_LOAD`, `PT_DYNAMIC`, ...).
    pub seg_type: u32,
    /// `p_flags`.
    pub flags: SegmentFlags,
    /// `p_vaddr`.
    pub virt_addr: u64,
    /// `p_paddr`.
    #[builder(default)]
    pub phys_addr: u64,
    /// `p_align`.
    pub align: u64,
    /// How `p_memsz` is derived once the segment's file size is known.
    pub mem_size: MemSize,
    /// The regions nested inside this segment, in file order.
    #[builder(default)]
    pub regions: Vec<DataRegion>,
}

/// One element of the ordered top-level (or nested-segment) region sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataRegion {
    /// Sentinel marking the ELF header's position. Must be the first region
    /// in the file.
    ElfHeader,
    /// Sentinel marking the program-header table's position.
    SegmentHeaders,
    /// A loadable segment and its nested regions.
    Segment(Segment),
    /// Sentinel marking the section-header table's position. Forbidden
    /// inside a segment.
    SectionHeaders,
    /// Sentinel for the `.shstrtab` section, by its assigned index.
    SectionNameTable(u16),
    /// Sentinel for the `.strtab` (symbol name) section, by its assigned index.
    Strtab(u16),
    /// Sentinel for the `.symtab` section and its full entry list.
    Symtab(SymbolTable),
    /// A Global Offset Table section.
    Got(Got),
    /// An ordinary section.
    Section(Section),
    /// Uninterpreted bytes, emitted verbatim and counted toward the running
    /// file offset.
    Raw(Vec<u8>),
}

/// A `PT_GNU_STACK` descriptor: the executable-stack marker segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct GnuStack {
    /// The Phdr index assigned to this entry; must not collide with any
    /// segment or relro index.
    pub index: u32,
    /// Whether the stack should be mapped executable (sets `PF_X`).
    #[builder(default = false)]
    pub executable: bool,
}

/// A `PT_GNU_RELRO` descriptor, overlaying part of an existing segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct GnuRelroRegion {
    /// The Phdr index assigned to this entry; must not collide with any
    /// existing segment index.
    pub index: u32,
    /// Index of the segment this relro region overlays.
    pub ref_segment: u32,
    /// Virtual address the relro region begins at; must fall inside the
    /// referenced segment's address range.
    pub virt_addr: u64,
}

/// Root of the editable ELF region tree.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct ElfFile {
    /// The fixed header fields.
    pub header: ElfHeader,
    /// Top-level regions, in file order.
    #[builder(default)]
    pub regions: Vec<DataRegion>,
    /// The executable-stack marker, if any.
    #[builder(default)]
    pub gnu_stack: Option<GnuStack>,
    /// `PT_GNU_RELRO` descriptors, if any.
    #[builder(default)]
    pub gnu_relro: Vec<GnuRelroRegion>,
}
