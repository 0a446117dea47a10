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

//! Decomposer and composer: turns a flat cartridge image into a [`Rom`] and
//! back, tying the header, FAT, FNT and overlay codecs together.

use crate::bytes_ext::StBytes;
use crate::error::{RomError, RomResult};
use crate::fat::{self, FatEntry};
use crate::header::{Header, HeaderField, HEADER_SIZE};
use crate::overlay::{self, Overlay};
use crate::storage::{self, StorageType};
use crate::util::align_up;
use std::collections::{BTreeMap, HashMap, HashSet};

use HeaderField::*;

/// Fixed size of the banner region, covering all known banner versions'
/// largest defined layout plus their trailing padding.
pub const BANNER_SIZE: usize = 0xA00;

/// Magic marking a 12-byte nitrocode debug footer appended after the ARM9
/// binary's declared size by some devkit toolchains.
const NITROCODE_MAGIC: u32 = 0xDEC0_0621;
const NITROCODE_FOOTER_SIZE: usize = 12;

/// A fully decomposed cartridge image: every region the header, FAT, FNT and
/// overlay tables describe, as owned, independently editable values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rom {
    pub header: Header,
    pub arm9: StBytes,
    pub arm7: StBytes,
    pub arm9_overlays: Vec<Overlay>,
    pub arm7_overlays: Vec<Overlay>,
    /// Every non-overlay file, keyed by its absolute path (e.g. `/data/a.bin`).
    pub files: BTreeMap<String, StBytes>,
    /// The physical placement order of `files`' paths. Entries present in
    /// `files` but missing here are appended, in `files`' iteration order,
    /// when composing.
    pub file_order: Vec<String>,
    pub banner: StBytes,
}

/// Parameters the composer can't recover from a decomposed [`Rom`] alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComposeOptions {
    pub storage_type: StorageType,
    /// Byte boundary every FAT-placed region (overlay payload, regular file)
    /// starts on.
    pub alignment: u32,
    /// Padding byte used for inter-region alignment gaps.
    pub fill_with: u8,
    /// When set, the image is padded out to its chip capacity; otherwise it
    /// ends right after the last file payload.
    pub fill_tail: bool,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            storage_type: StorageType::default(),
            alignment: 512,
            fill_with: 0xFF,
            fill_tail: true,
        }
    }
}

fn region_at<'a>(image: &'a [u8], what: &'static str, start: u64, len: u64) -> RomResult<&'a [u8]> {
    let end = start + len;
    if end > image.len() as u64 {
        return Err(RomError::TruncatedImage {
            what,
            start,
            end,
            len: image.len(),
        });
    }
    Ok(&image[start as usize..end as usize])
}

fn nitrocode_declared_size(arm9: &[u8]) -> usize {
    if arm9.len() > NITROCODE_FOOTER_SIZE {
        let tail = &arm9[arm9.len() - NITROCODE_FOOTER_SIZE..];
        if u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]) == NITROCODE_MAGIC {
            return arm9.len() - NITROCODE_FOOTER_SIZE;
        }
    }
    arm9.len()
}

impl Rom {
    /// Decomposes a flat cartridge image into its constituent regions.
    pub fn from_bytes(image: &[u8]) -> RomResult<Rom> {
        let header_bytes = region_at(image, "header", 0, HEADER_SIZE as u64)?;
        let header = Header::from_bytes(header_bytes)?;

        let arm9_rom_offset = header.get_u32(Arm9RomOffset) as u64;
        let arm9_size = header.get_u32(Arm9Size) as u64;
        let mut arm9_bytes = region_at(image, "ARM9 binary", arm9_rom_offset, arm9_size)?.to_vec();
        let arm9_footer_start = arm9_rom_offset + arm9_size;
        if let Ok(tail) = region_at(image, "ARM9 nitrocode footer", arm9_footer_start, NITROCODE_FOOTER_SIZE as u64) {
            if u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]) == NITROCODE_MAGIC {
                arm9_bytes.extend_from_slice(tail);
            }
        }

        let arm7_rom_offset = header.get_u32(Arm7RomOffset) as u64;
        let arm7_size = header.get_u32(Arm7Size) as u64;
        let arm7_bytes = region_at(image, "ARM7 binary", arm7_rom_offset, arm7_size)?.to_vec();

        let banner_offset = header.get_u32(BannerOffset) as u64;
        let banner_bytes = region_at(image, "banner", banner_offset, BANNER_SIZE as u64)?.to_vec();

        let fat_offset = header.get_u32(FatOffset) as u64;
        let fat_size = header.get_u32(FatSize) as u64;
        let fat_bytes = region_at(image, "FAT", fat_offset, fat_size)?;
        let fat_entries = fat::decode(fat_bytes)?;

        let fnt_offset = header.get_u32(FntOffset) as u64;
        let fnt_size = header.get_u32(FntSize) as u64;
        let fnt_bytes = region_at(image, "FNT", fnt_offset, fnt_size)?;
        let path_to_id = crate::fnt::decode(fnt_bytes, fat_entries.len())?;

        let mut files_by_id: HashMap<u32, StBytes> = HashMap::with_capacity(fat_entries.len());
        for (id, entry) in fat_entries.iter().enumerate() {
            let payload = region_at(
                image,
                "file payload",
                entry.start as u64,
                entry.len() as u64,
            )?;
            files_by_id.insert(id as u32, StBytes::from(payload));
        }

        let arm9_ovt_offset = header.get_u32(Arm9OverlayOffset) as u64;
        let arm9_ovt_size = header.get_u32(Arm9OverlaySize) as u64;
        let arm9_ovt_bytes = region_at(image, "ARM9 overlay table", arm9_ovt_offset, arm9_ovt_size)?;
        let arm9_overlays = overlay::decode(arm9_ovt_bytes, &mut files_by_id)?;

        let arm7_ovt_offset = header.get_u32(Arm7OverlayOffset) as u64;
        let arm7_ovt_size = header.get_u32(Arm7OverlaySize) as u64;
        let arm7_ovt_bytes = region_at(image, "ARM7 overlay table", arm7_ovt_offset, arm7_ovt_size)?;
        let arm7_overlays = overlay::decode(arm7_ovt_bytes, &mut files_by_id)?;

        let id_to_path: HashMap<u32, &String> = path_to_id.iter().map(|(path, &id)| (id, path)).collect();

        let physical_order = fat::physical_order(&fat_entries);
        let mut files = BTreeMap::new();
        let mut file_order = Vec::new();
        for id in physical_order {
            if let Some(&path) = id_to_path.get(&(id as u32)) {
                if let Some(data) = files_by_id.get(&(id as u32)) {
                    files.insert(path.clone(), data.clone());
                    file_order.push(path.clone());
                }
            }
        }

        log::debug!(
            "decomposed ROM \"{}\": {} files, {} ARM9 overlays, {} ARM7 overlays",
            header.title(),
            files.len(),
            arm9_overlays.len(),
            arm7_overlays.len()
        );

        Ok(Rom {
            header,
            arm9: StBytes::from(arm9_bytes),
            arm7: StBytes::from(arm7_bytes),
            arm9_overlays,
            arm7_overlays,
            files,
            file_order,
            banner: StBytes::from(banner_bytes),
        })
    }

    /// Recomposes a flat cartridge image, deriving every offset/size header
    /// field and the header CRC from the regions' actual placement.
    pub fn to_bytes(&self, options: &ComposeOptions) -> RomResult<Vec<u8>> {
        if self.banner.len() != BANNER_SIZE {
            return Err(RomError::BadBanner {
                expected: BANNER_SIZE,
                actual: self.banner.len(),
            });
        }

        let align = options.alignment;
        let fill = options.fill_with;

        let mut file_order = self.file_order.clone();
        {
            let present: HashSet<&str> = file_order.iter().map(|s| s.as_str()).collect();
            let mut to_add: Vec<String> = Vec::new();
            for path in self.files.keys() {
                if !present.contains(path.as_str()) && !to_add.iter().any(|p| p == path) {
                    to_add.push(path.clone());
                }
            }
            file_order.extend(to_add);
        }
        file_order.retain(|path| self.files.contains_key(path));

        let n9 = self.arm9_overlays.len() as u32;
        let n7 = self.arm7_overlays.len() as u32;
        let regular_off = n9 + n7;

        let mut header = self.header.clone();
        let mut image: Vec<u8> = vec![fill; HEADER_SIZE];
        let mut cursor = HEADER_SIZE as u32;

        // ARM9 binary (with its nitrocode footer, if any, carried verbatim).
        let arm9_rom_offset = cursor;
        image.extend_from_slice(&self.arm9);
        cursor += self.arm9.len() as u32;
        let arm9_size = nitrocode_declared_size(&self.arm9) as u32;

        cursor = align_up(cursor, align);
        image.resize(cursor as usize, fill);

        // ARM9 overlay table + payloads.
        let arm9_ovt_offset = cursor;
        let ovt9 = overlay::encode(&self.arm9_overlays, 0);
        image.extend_from_slice(&ovt9.ovt_bytes);
        cursor += ovt9.ovt_bytes.len() as u32;
        let arm9_ovt_size = ovt9.ovt_bytes.len() as u32;

        cursor = align_up(cursor, align);
        image.resize(cursor as usize, fill);
        let ovt9_refs: Vec<(&[u8], u32)> = ovt9.payloads.iter().map(|p| (p.as_ref(), align)).collect();
        let packed9 = fat::encode(&ovt9_refs, cursor, fill);
        image.extend_from_slice(&packed9.packed);
        cursor += packed9.packed.len() as u32;

        // ARM7 binary.
        cursor = align_up(cursor, align);
        image.resize(cursor as usize, fill);
        let arm7_rom_offset = cursor;
        image.extend_from_slice(&self.arm7);
        cursor += self.arm7.len() as u32;
        let arm7_size = self.arm7.len() as u32;

        cursor = align_up(cursor, align);
        image.resize(cursor as usize, fill);

        // ARM7 overlay table + payloads.
        let arm7_ovt_offset = cursor;
        let ovt7 = overlay::encode(&self.arm7_overlays, n9);
        image.extend_from_slice(&ovt7.ovt_bytes);
        cursor += ovt7.ovt_bytes.len() as u32;
        let arm7_ovt_size = ovt7.ovt_bytes.len() as u32;

        cursor = align_up(cursor, align);
        image.resize(cursor as usize, fill);
        let ovt7_refs: Vec<(&[u8], u32)> = ovt7.payloads.iter().map(|p| (p.as_ref(), align)).collect();
        let packed7 = fat::encode(&ovt7_refs, cursor, fill);
        image.extend_from_slice(&packed7.packed);
        cursor += packed7.packed.len() as u32;

        // Filename table.
        cursor = align_up(cursor, align);
        image.resize(cursor as usize, fill);
        let fnt_offset = cursor;
        let (fnt_bytes, path_to_id) = crate::fnt::encode(file_order.iter(), regular_off)?;
        image.extend_from_slice(&fnt_bytes);
        cursor += fnt_bytes.len() as u32;
        let fnt_size = fnt_bytes.len() as u32;

        // FAT, banner and regular file payloads are mutually positioned: the
        // FAT's byte size depends only on the file count (known already), so
        // the banner and file-payload base offsets can be derived before the
        // regular files' own FAT entries are computed.
        cursor = align_up(cursor, align);
        let fat_offset = cursor;
        let total_files = regular_off as usize + file_order.len();
        let fat_size = (total_files * 8) as u32;

        let after_fat = fat_offset + fat_size;
        let banner_offset = align_up(after_fat, align);
        let banner_end = banner_offset + BANNER_SIZE as u32;
        let regular_base = align_up(banner_end, align);

        let regular_refs: Vec<(&[u8], u32)> = file_order
            .iter()
            .map(|path| (self.files[path].as_ref(), align))
            .collect();
        let regular = fat::encode(&regular_refs, regular_base, fill);

        // FAT records are indexed by file ID, not by physical placement order:
        // overlay IDs are already sequential (0..n9, n9..n9+n7) and line up with
        // `packed9`/`packed7`'s entry order, but regular files are placed in
        // `file_order` while the FNT assigns their IDs in lexicographic,
        // depth-first order, so each entry must be scattered to its real ID.
        let mut all_entries = vec![FatEntry { start: 0, end: 0 }; total_files];
        all_entries[..packed9.entries.len()].copy_from_slice(&packed9.entries);
        all_entries[packed9.entries.len()..packed9.entries.len() + packed7.entries.len()]
            .copy_from_slice(&packed7.entries);
        for (k, path) in file_order.iter().enumerate() {
            let id = path_to_id[path] as usize;
            all_entries[id] = regular.entries[k];
        }
        let fat_bytes = fat::encode_table(&all_entries);
        debug_assert_eq!(fat_bytes.len(), fat_size as usize);

        image.resize(fat_offset as usize, fill);
        image.extend_from_slice(&fat_bytes);
        image.resize(banner_offset as usize, fill);
        image.extend_from_slice(&self.banner);
        image.resize(regular_base as usize, fill);
        image.extend_from_slice(&regular.packed);
        cursor = regular_base + regular.packed.len() as u32;

        let used_size = cursor as u64;
        let shift = storage::chip_capacity(used_size).ok_or(RomError::CapacityExceeded {
            size: used_size,
            max: storage::max_capacity_bytes(),
        })?;
        if options.fill_tail {
            let capacity = storage::capacity_bytes(shift);
            image.resize(capacity as usize, fill);
        }

        header.write_uint(Arm9RomOffset, arm9_rom_offset as u64)?;
        header.write_uint(Arm9Size, arm9_size as u64)?;
        header.write_uint(Arm7RomOffset, arm7_rom_offset as u64)?;
        header.write_uint(Arm7Size, arm7_size as u64)?;
        header.write_uint(FntOffset, fnt_offset as u64)?;
        header.write_uint(FntSize, fnt_size as u64)?;
        header.write_uint(FatOffset, fat_offset as u64)?;
        header.write_uint(FatSize, fat_size as u64)?;
        header.write_uint(
            Arm9OverlayOffset,
            if arm9_ovt_size == 0 { 0 } else { arm9_ovt_offset as u64 },
        )?;
        header.write_uint(Arm9OverlaySize, arm9_ovt_size as u64)?;
        header.write_uint(
            Arm7OverlayOffset,
            if arm7_ovt_size == 0 { 0 } else { arm7_ovt_offset as u64 },
        )?;
        header.write_uint(Arm7OverlaySize, arm7_ovt_size as u64)?;
        header.write_uint(BannerOffset, banner_offset as u64)?;
        header.write_uint(HeaderSize, HEADER_SIZE as u64)?;
        header.write_uint(TotalRomSize, used_size)?;
        header.write_uint(DeviceCapacity, shift as u64)?;
        header.write_uint(SecureAreaDelay, storage::SECURE_AREA_DELAY as u64)?;

        let (rom_control_normal, rom_control_key1) = options.storage_type.rom_control_words();
        header.write_uint(RomControlNormal, rom_control_normal as u64)?;
        header.write_uint(RomControlKey1, rom_control_key1 as u64)?;

        let crc_region_len = HeaderCrc.offset() as usize;
        let crc = crate::crc::crc16(&header.as_bytes()[..crc_region_len], crate::crc::HEADER_CRC_SEED);
        header.write_uint(HeaderCrc, crc as u64)?;

        image[..HEADER_SIZE].copy_from_slice(header.as_bytes());

        log::debug!(
            "composed ROM: {} bytes ({} files, {} ARM9 overlays, {} ARM7 overlays)",
            image.len(),
            file_order.len(),
            self.arm9_overlays.len(),
            self.arm7_overlays.len()
        );

        Ok(image)
    }
}
