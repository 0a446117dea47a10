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

//! Overlay codec (OVT): per-processor tables of relocatable code chunks
//! loaded at runtime, each backed by a file payload referenced by file ID.

use crate::bytes_ext::StBytes;
use crate::error::{OvtError, OvtResult};
use std::collections::HashMap;

const ENTRY_SIZE: usize = 32;

/// One overlay: the table fields preserved verbatim plus its code payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Overlay {
    pub id: u32,
    pub ram_address: u32,
    pub ram_size: u32,
    pub bss_size: u32,
    pub static_init_start: u32,
    pub static_init_end: u32,
    pub reserved_or_compressed_flags: u32,
    pub data: StBytes,
}

struct RawEntry {
    id: u32,
    ram_address: u32,
    ram_size: u32,
    bss_size: u32,
    static_init_start: u32,
    static_init_end: u32,
    file_id: u32,
    reserved_or_compressed_flags: u32,
}

fn read_entry(bytes: &[u8]) -> RawEntry {
    let u32_at = |off: usize| u32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]]);
    RawEntry {
        id: u32_at(0),
        ram_address: u32_at(4),
        ram_size: u32_at(8),
        bss_size: u32_at(12),
        static_init_start: u32_at(16),
        static_init_end: u32_at(20),
        file_id: u32_at(24),
        reserved_or_compressed_flags: u32_at(28),
    }
}

fn write_entry(out: &mut Vec<u8>, e: &RawEntry) {
    out.extend_from_slice(&e.id.to_le_bytes());
    out.extend_from_slice(&e.ram_address.to_le_bytes());
    out.extend_from_slice(&e.ram_size.to_le_bytes());
    out.extend_from_slice(&e.bss_size.to_le_bytes());
    out.extend_from_slice(&e.static_init_start.to_le_bytes());
    out.extend_from_slice(&e.static_init_end.to_le_bytes());
    out.extend_from_slice(&e.file_id.to_le_bytes());
    out.extend_from_slice(&e.reserved_or_compressed_flags.to_le_bytes());
}

/// Parses an OVT region into [`Overlay`] records, in table order, resolving
/// each entry's payload from `files` (keyed by file ID) and removing it from
/// `files` so the caller's remaining file list no longer carries overlay
/// payloads as ordinary files.
pub fn decode(ovt_bytes: &[u8], files: &mut HashMap<u32, StBytes>) -> OvtResult<Vec<Overlay>> {
    if ovt_bytes.len() % ENTRY_SIZE != 0 {
        return Err(OvtError::Misaligned {
            size: ovt_bytes.len(),
        });
    }
    let mut seen: HashMap<u32, usize> = HashMap::new();
    let mut overlays = Vec::with_capacity(ovt_bytes.len() / ENTRY_SIZE);
    for (index, chunk) in ovt_bytes.chunks_exact(ENTRY_SIZE).enumerate() {
        let raw = read_entry(chunk);
        if let Some(&first) = seen.get(&raw.file_id) {
            return Err(OvtError::DuplicateFileId {
                file_id: raw.file_id,
                first,
                second: index,
            });
        }
        seen.insert(raw.file_id, index);
        let data = files.remove(&raw.file_id).ok_or(OvtError::MissingFile {
            index,
            file_id: raw.file_id,
        })?;
        overlays.push(Overlay {
            id: raw.id,
            ram_address: raw.ram_address,
            ram_size: raw.ram_size,
            bss_size: raw.bss_size,
            static_init_start: raw.static_init_start,
            static_init_end: raw.static_init_end,
            reserved_or_compressed_flags: raw.reserved_or_compressed_flags,
            data,
        });
    }
    Ok(overlays)
}

pub struct EncodedOverlayTable {
    pub ovt_bytes: Vec<u8>,
    /// Payloads in overlay (table) order, ready to be placed right after the OVT.
    pub payloads: Vec<StBytes>,
}

/// Rewrites each overlay's `file_id` to a fresh, sequential ID starting at
/// `file_id_off`, and packs the OVT bytes together with the ordered payloads.
pub fn encode(overlays: &[Overlay], file_id_off: u32) -> EncodedOverlayTable {
    let mut ovt_bytes = Vec::with_capacity(overlays.len() * ENTRY_SIZE);
    let mut payloads = Vec::with_capacity(overlays.len());
    for (i, ov) in overlays.iter().enumerate() {
        let raw = RawEntry {
            id: ov.id,
            ram_address: ov.ram_address,
            ram_size: ov.ram_size,
            bss_size: ov.bss_size,
            static_init_start: ov.static_init_start,
            static_init_end: ov.static_init_end,
            file_id: file_id_off + i as u32,
            reserved_or_compressed_flags: ov.reserved_or_compressed_flags,
        };
        write_entry(&mut ovt_bytes, &raw);
        payloads.push(ov.data.clone());
    }
    EncodedOverlayTable { ovt_bytes, payloads }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_bytes(id: u32, file_id: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        write_entry(
            &mut buf,
            &RawEntry {
                id,
                ram_address: 0x02000000,
                ram_size: 0x1000,
                bss_size: 0,
                static_init_start: 0,
                static_init_end: 0,
                file_id,
                reserved_or_compressed_flags: 0,
            },
        );
        buf
    }

    #[test]
    fn decode_rejects_misaligned_table() {
        let err = decode(&[0u8; 10], &mut HashMap::new()).unwrap_err();
        assert!(matches!(err, OvtError::Misaligned { .. }));
    }

    #[test]
    fn decode_rejects_missing_file() {
        let bytes = entry_bytes(0, 5);
        let err = decode(&bytes, &mut HashMap::new()).unwrap_err();
        assert!(matches!(err, OvtError::MissingFile { .. }));
    }

    #[test]
    fn decode_rejects_duplicate_file_id() {
        let mut bytes = entry_bytes(0, 0);
        bytes.extend(entry_bytes(1, 0));
        let mut files = HashMap::new();
        files.insert(0u32, StBytes::from(&b"x"[..]));
        let err = decode(&bytes, &mut files).unwrap_err();
        assert!(matches!(err, OvtError::DuplicateFileId { .. }));
    }

    #[test]
    fn decode_detaches_payload_from_files() {
        let bytes = entry_bytes(0, 3);
        let mut files = HashMap::new();
        files.insert(3u32, StBytes::from(&b"overlay-code"[..]));
        let overlays = decode(&bytes, &mut files).unwrap();
        assert_eq!(overlays.len(), 1);
        assert_eq!(overlays[0].data.as_ref(), b"overlay-code");
        assert!(!files.contains_key(&3));
    }

    #[test]
    fn encode_assigns_sequential_file_ids() {
        let overlays = vec![
            Overlay {
                id: 0,
                ram_address: 0,
                ram_size: 0,
                bss_size: 0,
                static_init_start: 0,
                static_init_end: 0,
                reserved_or_compressed_flags: 0,
                data: StBytes::from(&b"a"[..]),
            },
            Overlay {
                id: 1,
                ram_address: 0,
                ram_size: 0,
                bss_size: 0,
                static_init_start: 0,
                static_init_end: 0,
                reserved_or_compressed_flags: 0,
                data: StBytes::from(&b"bb"[..]),
            },
        ];
        let encoded = encode(&overlays, 5);
        assert_eq!(encoded.payloads.len(), 2);
        let first = read_entry(&encoded.ovt_bytes[0..ENTRY_SIZE]);
        let second = read_entry(&encoded.ovt_bytes[ENTRY_SIZE..2 * ENTRY_SIZE]);
        assert_eq!(first.file_id, 5);
        assert_eq!(second.file_id, 6);
    }

    #[test]
    fn encode_then_decode_roundtrips() {
        let overlays = vec![Overlay {
            id: 7,
            ram_address: 0x02001000,
            ram_size: 0x40,
            bss_size: 4,
            static_init_start: 1,
            static_init_end: 2,
            reserved_or_compressed_flags: 0xAB,
            data: StBytes::from(&b"payload"[..]),
        }];
        let encoded = encode(&overlays, 0);
        let mut files = HashMap::new();
        files.insert(0u32, encoded.payloads[0].clone());
        let decoded = decode(&encoded.ovt_bytes, &mut files).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].id, 7);
        assert_eq!(decoded[0].ram_address, 0x02001000);
        assert_eq!(decoded[0].reserved_or_compressed_flags, 0xAB);
        assert_eq!(decoded[0].data.as_ref(), b"payload");
    }
}
