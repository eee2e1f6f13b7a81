//! Fatal, structural layout errors. Every variant carries the context needed
//! to build an actionable message; `thiserror` renders that context straight
//! into `Display`, the idiom the rest of this corpus's ELF crates use for
//! their own error enums.
//!
//! These are distinct from [`crate::got::GotError`], which reports a
//! recoverable validation failure on a single section rather than aborting
//! an entire layout.

use thiserror::Error;

/// Something about the region tree could not be turned into a valid ELF layout.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The `ElfHeader` region was not the first thing written.
    #[error("ElfHeader region must be the first region in the file")]
    HeaderNotAtZero,
    /// The program-header table's file offset was not aligned for the class.
    #[error("program-header table at offset {offset:#x} is not aligned to {align:#x}")]
    MisalignedPhdrTable {
        /// The unaligned offset the table would have landed at.
        offset: u64,
        /// The class's required alignment.
        align: u64,
    },
    /// A `SectionHeaders` region appeared inside a loadable segment.
    #[error("Section headers should not be within a segment")]
    SectionHeadersInsideSegment,
    /// A section's virtual address was not a multiple of its own alignment.
    #[error("section {index} data at addr {addr:#x} is not aligned to {align:#x}")]
    MisalignedSectionAddress {
        /// The section's index.
        index: u16,
        /// The section's declared address.
        addr: u64,
        /// The section's declared alignment.
        align: u64,
    },
    /// A non-empty section landed at an unaligned offset inside a loadable
    /// segment, where the engine cannot pad to fix it without shifting
    /// everything after it in the segment.
    #[error("section {index} at file offset {offset:#x} inside a loadable segment is not aligned to {align:#x}; insert padding before it")]
    UnalignedSectionInSegment {
        /// The section's index.
        index: u16,
        /// The offset the section landed at.
        offset: u64,
        /// The section's declared alignment.
        align: u64,
    },
    /// Two sections were given the same index.
    #[error("Section index {index} already exists")]
    DuplicateSectionIndex {
        /// The colliding index.
        index: u16,
    },
    /// Two segments were given the same index.
    #[error("segment index {index} already exists")]
    DuplicateSegmentIndex {
        /// The colliding index.
        index: u32,
    },
    /// A segment's file offset and virtual address disagreed modulo its alignment.
    #[error("segment {index} file offset and virtual address are not congruent modulo its alignment")]
    SegmentOffsetAddressCongruence {
        /// The segment's index.
        index: u32,
    },
    /// A `GnuRelroRegion` referenced a segment index that does not exist.
    #[error("GNU_RELRO region references nonexistent segment {segment_index}")]
    DanglingRelroSegment {
        /// The missing segment index.
        segment_index: u32,
    },
    /// A `GnuRelroRegion`'s own index collided with an existing segment index.
    #[error("GNU_RELRO index {index} collides with an existing segment index")]
    DuplicateRelroIndex {
        /// The colliding index.
        index: u32,
    },
    /// A name was looked up in a string table that never recorded it.
    #[error("string {name:?} was not found in the string table")]
    StringNotFound {
        /// The name that was looked up.
        name: String,
    },
    /// More than 65535 program headers would be required.
    #[error("program-header count {0} exceeds 65535")]
    TooManyProgramHeaders(usize),
    /// More than 65535 section headers would be required.
    #[error("section-header count {0} exceeds 65535")]
    TooManySectionHeaders(usize),
}

/// Convenience alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, Error>;
