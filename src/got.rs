//! Conversions between a [`Got`] region and its backing [`Section`].
//!
//! This is the crate's worked example of a recoverable validation: a
//! malformed GOT section is the caller's problem to fix, not a reason to
//! abort an entire layout, so these functions return [`GotError`] rather
//! than [`crate::Error`].

use thiserror::Error;

use crate::class::{Class, DataEncoding};
use crate::region::{Got, Section, SectionFlags};

const SHT_PROGBITS: u32 = 1;

/// Why a section failed to decode as a GOT.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GotError {
    /// `sh_type` was not `SHT_PROGBITS`.
    #[error("section {index} has type {actual}, expected SHT_PROGBITS ({expected})")]
    WrongType {
        /// The section's index.
        index: u16,
        /// The section's actual `sh_type`.
        actual: u32,
        /// The expected `sh_type` (`SHT_PROGBITS`).
        expected: u32,
    },
    /// `sh_flags` did not include `SHF_WRITE | SHF_ALLOC`.
    #[error("section {index} is missing the WRITE|ALLOC flags a GOT requires")]
    WrongFlags {
        /// The section's index.
        index: u16,
    },
    /// The section's data length was not a multiple of its entry width.
    #[error("section {index} data length {actual} is not a multiple of its entry size {entsize}")]
    SizeMismatch {
        /// The section's index.
        index: u16,
        /// The actual data length.
        actual: usize,
        /// The entry size the data length should divide evenly by.
        entsize: u64,
    },
    /// `sh_entsize` did not match the class's address width.
    #[error("section {index} has entsize {entsize}, which is not a supported GOT entry width")]
    UnexpectedEntrySize {
        /// The section's index.
        index: u16,
        /// The section's actual `sh_entsize`.
        entsize: u64,
    },
    /// `sh_link`/`sh_info` were non-zero. A GOT has no associated table to
    /// link against and carries no `sh_info`-encoded count.
    #[error("section {index} has link {link} / info {info}, expected both 0 for a GOT")]
    UnexpectedLink {
        /// The section's index.
        index: u16,
        /// The section's actual `sh_link`.
        link: u32,
        /// The section's actual `sh_info`.
        info: u32,
    },
}

/// Validate `section` as a GOT and decode its entries.
pub fn section_as_got(section: &Section, class: Class, encoding: DataEncoding) -> Result<Got, GotError> {
    if section.sh_type != SHT_PROGBITS {
        return Err(GotError::WrongType {
            index: section.index,
            actual: section.sh_type,
            expected: SHT_PROGBITS,
        });
    }

    let required = SectionFlags::WRITE | SectionFlags::ALLOC;
    if !section.flags.contains(required) {
        return Err(GotError::WrongFlags { index: section.index });
    }

    if section.link != 0 || section.info != 0 {
        return Err(GotError::UnexpectedLink {
            index: section.index,
            link: section.link,
            info: section.info,
        });
    }

    let width = class.addr_width() as u64;
    let entsize = if section.entsize == 0 { width } else { section.entsize };
    if entsize != width {
        return Err(GotError::UnexpectedEntrySize {
            index: section.index,
            entsize,
        });
    }

    if section.data.len() as u64 % entsize != 0 {
        return Err(GotError::SizeMismatch {
            index: section.index,
            actual: section.data.len(),
            entsize,
        });
    }

    let entries = section
        .data
        .chunks(entsize as usize)
        .map(|chunk| decode_entry(chunk, class, encoding))
        .collect();

    Ok(Got {
        index: section.index,
        name: section.name.clone(),
        addr: section.addr,
        addr_align: section.addr_align,
        flags: section.flags,
        entries,
    })
}

fn decode_entry(chunk: &[u8], class: Class, encoding: DataEncoding) -> u64 {
    match class {
        Class::Elf32 => {
            let bytes: [u8; 4] = chunk.try_into().unwrap_or_default();
            match encoding {
                DataEncoding::Little => u32::from_le_bytes(bytes) as u64,
                DataEncoding::Big => u32::from_be_bytes(bytes) as u64,
            }
        }
        Class::Elf64 => {
            let bytes: [u8; 8] = chunk.try_into().unwrap_or_default();
            match encoding {
                DataEncoding::Little => u64::from_le_bytes(bytes),
                DataEncoding::Big => u64::from_be_bytes(bytes),
            }
        }
    }
}

/// Build the backing [`Section`] for a [`Got`]. Infallible: every `Got`
/// value is already a valid section by construction.
pub fn got_to_section(got: &Got, class: Class, encoding: DataEncoding) -> Section {
    let width = class.addr_width();
    let mut data = Vec::with_capacity(got.entries.len() * width);
    for entry in &got.entries {
        match class {
            Class::Elf32 => encoding.write_u32(&mut data, *entry as u32),
            Class::Elf64 => encoding.write_u64(&mut data, *entry),
        }
    }

    Section {
        index: got.index,
        name: got.name.clone(),
        sh_type: SHT_PROGBITS,
        flags: got.flags,
        addr: got.addr,
        size: data.len() as u64,
        link: 0,
        info: 0,
        addr_align: got.addr_align,
        entsize: width as u64,
        data,
    }
}
