/*
 * Copyright 2021-2022 Capypara and the SkyTemple Contributors
 *
 * This file is part of SkyTemple.
 *
 * SkyTemple is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * SkyTemple is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with SkyTemple.  If not, see <https://www.gnu.org/licenses/>.
 */

//! FAT (File Allocation Table) codec: an array of 8-byte `(start, end)`
//! records, one per file ID, giving each file's byte range in the ROM image.

use crate::error::{RomError, RomResult};
use crate::util::align_up;

const RECORD_SIZE: usize = 8;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FatEntry {
    pub start: u32,
    pub end: u32,
}

impl FatEntry {
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Parses a raw FAT region into one entry per file ID (file ID == array index).
pub fn decode(fat_bytes: &[u8]) -> RomResult<Vec<FatEntry>> {
    if fat_bytes.len() % RECORD_SIZE != 0 {
        return Err(RomError::SizeMismatch {
            what: "FAT",
            expected: align_up(fat_bytes.len() as u32, RECORD_SIZE as u32) as usize,
            actual: fat_bytes.len(),
        });
    }
    Ok(fat_bytes
        .chunks_exact(RECORD_SIZE)
        .map(|rec| FatEntry {
            start: u32::from_le_bytes([rec[0], rec[1], rec[2], rec[3]]),
            end: u32::from_le_bytes([rec[4], rec[5], rec[6], rec[7]]),
        })
        .collect())
}

/// Returns FAT indices (file IDs) ordered by ascending `start`: the physical
/// placement order of the payloads within the image.
pub fn physical_order(entries: &[FatEntry]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..entries.len()).collect();
    order.sort_by_key(|&i| entries[i].start);
    order
}

/// Serialises a full set of already-placed entries (file ID == array index) into
/// one FAT region, for callers that assemble entries from several sub-tables
/// (overlay payloads, then regular files) before writing the table out.
pub fn encode_table(entries: &[FatEntry]) -> Vec<u8> {
    encode_records(entries)
}

fn encode_records(entries: &[FatEntry]) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.len() * RECORD_SIZE);
    for e in entries {
        out.extend_from_slice(&e.start.to_le_bytes());
        out.extend_from_slice(&e.end.to_le_bytes());
    }
    out
}

pub struct EncodedFat {
    /// The 8-byte-per-entry FAT region, indexed by file ID (not layout order).
    pub fat_bytes: Vec<u8>,
    /// The payloads laid end-to-end with alignment padding, relative to `base_offset`.
    pub packed: Vec<u8>,
    /// One entry per input payload, in file-ID order, with absolute ROM offsets.
    pub entries: Vec<FatEntry>,
}

/// Lays `payloads` out end-to-end starting at `base_offset` (which the caller
/// must already have aligned), rounding each payload's start up to its
/// requested alignment, and emits the FAT records for them. `payloads` is
/// indexed by file ID: record `i` in the output corresponds to `payloads[i]`.
pub fn encode(payloads: &[(&[u8], u32)], base_offset: u32, fill_with: u8) -> EncodedFat {
    let mut packed = Vec::new();
    let mut entries = Vec::with_capacity(payloads.len());
    let mut cursor = base_offset;
    for (data, align) in payloads {
        let aligned = align_up(cursor, *align);
        let pad = (aligned - cursor) as usize;
        packed.resize(packed.len() + pad, fill_with);
        let start = aligned;
        packed.extend_from_slice(data);
        let end = start + data.len() as u32;
        entries.push(FatEntry { start, end });
        cursor = end;
    }
    EncodedFat {
        fat_bytes: encode_records(&entries),
        packed,
        entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_empty_fat() {
        assert_eq!(decode(&[]).unwrap(), vec![]);
    }

    #[test]
    fn decode_rejects_misaligned_size() {
        let err = decode(&[0u8; 5]).unwrap_err();
        assert!(matches!(err, RomError::SizeMismatch { .. }));
    }

    #[test]
    fn decode_one_record() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&100u32.to_le_bytes());
        bytes.extend_from_slice(&150u32.to_le_bytes());
        let entries = decode(&bytes).unwrap();
        assert_eq!(entries, vec![FatEntry { start: 100, end: 150 }]);
    }

    #[test]
    fn physical_order_sorts_by_start() {
        let entries = vec![
            FatEntry { start: 300, end: 310 },
            FatEntry { start: 100, end: 110 },
            FatEntry { start: 200, end: 210 },
        ];
        assert_eq!(physical_order(&entries), vec![1, 2, 0]);
    }

    #[test]
    fn encode_aligns_each_payload_to_512() {
        let a = [1u8, 2, 3];
        let b = [4u8; 10];
        let encoded = encode(&[(&a[..], 512), (&b[..], 512)], 0, 0xFF);
        assert_eq!(encoded.entries[0], FatEntry { start: 0, end: 3 });
        assert_eq!(encoded.entries[1], FatEntry { start: 512, end: 522 });
        assert_eq!(encoded.packed.len(), 522);
        assert_eq!(&encoded.packed[3..512], &vec![0xFFu8; 509][..]);
    }

    #[test]
    fn encode_then_decode_roundtrips_entries() {
        let a = [9u8; 7];
        let encoded = encode(&[(&a[..], 512)], 0x4000, 0xFF);
        let decoded = decode(&encoded.fat_bytes).unwrap();
        assert_eq!(decoded, encoded.entries);
    }
}
