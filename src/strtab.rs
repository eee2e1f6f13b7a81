//! String-table construction with suffix merging: a string that is a suffix
//! of another already-placed string is never duplicated in the payload,
//! just pointed at the right offset inside the longer one. GNU `as`/`ld` do
//! the same thing to `.strtab`/`.shstrtab`, and this is the same algorithm.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// A built string table: its final byte payload, and every name's (and
/// every suffix's) offset into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strtab {
    payload: Vec<u8>,
    offsets: HashMap<Vec<u8>, u32>,
}

impl Strtab {
    /// Build a string table out of `names`, merging suffixes.
    ///
    /// The empty string always maps to offset 0, whether or not it appears
    /// in `names`.
    pub fn build<I, S>(names: I) -> Strtab
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let mut unique: Vec<Vec<u8>> = Vec::new();
        let mut seen: std::collections::HashSet<Vec<u8>> = std::collections::HashSet::new();
        for name in names {
            let bytes = name.as_ref().to_vec();
            if seen.insert(bytes.clone()) {
                unique.push(bytes);
            }
        }

        // Sort ascending by reversed bytes: adjacent entries then share a
        // common suffix exactly when one is a suffix of the other.
        unique.sort_by(|a, b| a.iter().rev().cmp(b.iter().rev()));

        let mut kept: Vec<Vec<u8>> = Vec::with_capacity(unique.len());
        for (i, s) in unique.iter().enumerate() {
            let redundant = unique
                .get(i + 1)
                .is_some_and(|next| is_suffix_of(s, next));
            if !redundant {
                kept.push(s.clone());
            }
        }

        // Insert survivors in descending order, so a longer string is placed
        // before any shorter suffix of it could need merging into it.
        kept.reverse();

        let mut payload = vec![0u8];
        let mut offsets = HashMap::new();
        offsets.insert(Vec::new(), 0u32);
        for s in &kept {
            let start = payload.len() as u32;
            payload.extend_from_slice(s);
            payload.push(0);
            for suffix_start in 0..=s.len() {
                let suffix = s[suffix_start..].to_vec();
                let offset = start + suffix_start as u32;
                offsets.entry(suffix).or_insert(offset);
            }
        }

        Strtab { payload, offsets }
    }

    /// The table's final byte payload, starting with a leading NUL.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Look up the offset of `name` (or one of its suffixes merged into a
    /// longer string), failing if it was never recorded by [`Strtab::build`].
    pub fn offset(&self, name: &[u8]) -> Result<u32> {
        self.offsets
            .get(name)
            .copied()
            .ok_or_else(|| Error::StringNotFound {
                name: String::from_utf8_lossy(name).into_owned(),
            })
    }
}

fn is_suffix_of(s: &[u8], other: &[u8]) -> bool {
    other.len() >= s.len() && &other[other.len() - s.len()..] == s
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn merges_suffixes_and_records_every_suffix_offset() {
        let table = Strtab::build(["foo", "o", "bar"]);
        assert_eq!(table.payload(), b"\0bar\0foo\0");
        assert_eq!(table.offset(b"").unwrap(), 0);
        assert_eq!(table.offset(b"foo").unwrap(), 5);
        assert_eq!(table.offset(b"o").unwrap(), 7);
        assert_eq!(table.offset(b"bar").unwrap(), 1);
    }

    #[test]
    fn unknown_name_is_an_error() {
        let table = Strtab::build(["foo"]);
        assert!(table.offset(b"nope").is_err());
    }

    #[test]
    fn empty_table_still_has_the_leading_nul() {
        let table = Strtab::build(Vec::<Vec<u8>>::new());
        assert_eq!(table.payload(), b"\0");
        assert_eq!(table.offset(b"").unwrap(), 0);
    }

    #[test]
    fn duplicate_names_do_not_duplicate_payload_bytes() {
        let table = Strtab::build(["dup", "dup"]);
        assert_eq!(table.payload(), b"\0dup\0");
    }
}
