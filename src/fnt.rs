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

//! Directory codec (FNT): parses and emits the filename table, a radix tree
//! of directory records followed by concatenated, nul-terminated sub-tables
//! naming each directory's files and child directories.

use crate::error::{FntError, FntResult, RomError, RomResult};
use encoding::all::ISO_8859_1;
use encoding::{EncoderTrap, Encoding};
use itertools::{Either, Itertools};
use std::collections::BTreeMap;

/// The root directory always has this ID; later directories are assigned
/// `0xF001, 0xF002, ...` in depth-first pre-order as they're discovered.
pub const ROOT_DIR_ID: u16 = 0xF000;

const DIR_RECORD_SIZE: usize = 8;

struct DirRecord {
    sub_table_offset: u32,
    first_file_id: u16,
    parent_or_count: u16,
}

fn read_record(fnt_bytes: &[u8], dir_id: u16) -> FntResult<DirRecord> {
    let idx = (dir_id - ROOT_DIR_ID) as usize;
    let off = idx * DIR_RECORD_SIZE;
    let rec = fnt_bytes
        .get(off..off + DIR_RECORD_SIZE)
        .ok_or(FntError::UnterminatedSubTable { dir_id })?;
    Ok(DirRecord {
        sub_table_offset: u32::from_le_bytes([rec[0], rec[1], rec[2], rec[3]]),
        first_file_id: u16::from_le_bytes([rec[4], rec[5]]),
        parent_or_count: u16::from_le_bytes([rec[6], rec[7]]),
    })
}

fn validate_name_bytes(name: &[u8]) -> FntResult<()> {
    for &b in name {
        if b == 0 || b == b'/' {
            return Err(FntError::ForbiddenNameByte { byte: b });
        }
    }
    Ok(())
}

fn walk_dir(
    fnt_bytes: &[u8],
    dir_id: u16,
    dir_count: usize,
    fat_len: usize,
    prefix: &str,
    map: &mut BTreeMap<String, u32>,
) -> FntResult<()> {
    let rec = read_record(fnt_bytes, dir_id)?;
    let mut cursor = rec.sub_table_offset as usize;
    let mut next_file_id = rec.first_file_id as u32;
    loop {
        let t = *fnt_bytes
            .get(cursor)
            .ok_or(FntError::UnterminatedSubTable { dir_id })?;
        cursor += 1;
        if t == 0 {
            break;
        }
        if t <= 0x7F {
            let name_len = t as usize;
            let name_bytes = fnt_bytes
                .get(cursor..cursor + name_len)
                .ok_or(FntError::UnterminatedSubTable { dir_id })?;
            validate_name_bytes(name_bytes)?;
            cursor += name_len;
            if next_file_id as usize >= fat_len {
                return Err(FntError::FileIdExceedsFat {
                    file_id: next_file_id,
                    fat_len,
                });
            }
            let name = String::from_utf8_lossy(name_bytes);
            map.insert(format!("{prefix}/{name}"), next_file_id);
            next_file_id += 1;
        } else {
            let name_len = (t & 0x7F) as usize;
            let name_bytes = fnt_bytes
                .get(cursor..cursor + name_len)
                .ok_or(FntError::UnterminatedSubTable { dir_id })?;
            validate_name_bytes(name_bytes)?;
            cursor += name_len;
            let id_bytes = fnt_bytes
                .get(cursor..cursor + 2)
                .ok_or(FntError::UnterminatedSubTable { dir_id })?;
            cursor += 2;
            let child_id = u16::from_le_bytes([id_bytes[0], id_bytes[1]]);
            if child_id < ROOT_DIR_ID || (child_id - ROOT_DIR_ID) as usize >= dir_count {
                return Err(FntError::SubDirIdOutOfRange {
                    id: child_id,
                    count: dir_count,
                });
            }
            let name = String::from_utf8_lossy(name_bytes);
            let child_prefix = format!("{prefix}/{name}");
            walk_dir(fnt_bytes, child_id, dir_count, fat_len, &child_prefix, map)?;
        }
    }
    Ok(())
}

/// Reconstructs the `path -> file_id` mapping stored in `fnt_bytes`. File IDs
/// are read verbatim, never reassigned. `fat_len` bounds the accepted file
/// IDs (pass `usize::MAX` to skip that check when the FAT isn't known yet).
pub fn decode(fnt_bytes: &[u8], fat_len: usize) -> FntResult<BTreeMap<String, u32>> {
    if fnt_bytes.len() < DIR_RECORD_SIZE {
        return Err(FntError::UnterminatedSubTable { dir_id: ROOT_DIR_ID });
    }
    let root = read_record(fnt_bytes, ROOT_DIR_ID)?;
    let dir_count = root.parent_or_count as usize;
    let mut map = BTreeMap::new();
    walk_dir(fnt_bytes, ROOT_DIR_ID, dir_count, fat_len, "", &mut map)?;
    Ok(map)
}

// --- encoding -----------------------------------------------------------

enum Child {
    File,
    Dir(DirNode),
}

#[derive(Default)]
struct DirNode {
    children: BTreeMap<String, Child>,
}

fn split_path<'a>(path: &'a str) -> RomResult<Vec<&'a str>> {
    if !path.starts_with('/') {
        return Err(RomError::InvalidPath {
            path: path.to_string(),
            reason: "path must start with '/'",
        });
    }
    let parts: Vec<&str> = path[1..].split('/').collect();
    for p in &parts {
        if p.is_empty() {
            return Err(RomError::InvalidPath {
                path: path.to_string(),
                reason: "path contains an empty component",
            });
        }
        if p.len() > 127 {
            return Err(RomError::NameTooLong {
                component: p.to_string(),
                len: p.len(),
            });
        }
        if !p.is_ascii() || p.as_bytes().contains(&0) {
            return Err(RomError::InvalidPath {
                path: path.to_string(),
                reason: "component is not ASCII or contains a NUL byte",
            });
        }
    }
    Ok(parts)
}

fn insert(node: &mut DirNode, components: &[&str], full_path: &str) -> RomResult<()> {
    let (head, rest) = components
        .split_first()
        .expect("split_path never returns an empty component list");
    if rest.is_empty() {
        use std::collections::btree_map::Entry as MapEntry;
        match node.children.entry(head.to_string()) {
            MapEntry::Occupied(_) => Err(RomError::DuplicatePath(full_path.to_string())),
            MapEntry::Vacant(slot) => {
                slot.insert(Child::File);
                Ok(())
            }
        }
    } else {
        match node.children.get_mut(*head) {
            Some(Child::Dir(child)) => insert(child, rest, full_path),
            Some(Child::File) => Err(RomError::InvalidPath {
                path: full_path.to_string(),
                reason: "path names both a file and a directory",
            }),
            None => {
                let mut child = DirNode::default();
                insert(&mut child, rest, full_path)?;
                node.children.insert(head.to_string(), Child::Dir(child));
                Ok(())
            }
        }
    }
}

enum ChildOut {
    File(u32),
    Dir(u16),
}

struct DirOut {
    parent_or_count: u16,
    first_file_id: u32,
    children: Vec<(String, ChildOut)>,
}

struct AssignState {
    next_dir_id: u16,
    next_file_id: u32,
}

/// Depth-first pre-order: assigns this directory's own ID and file IDs
/// before recursing into its subdirectories, so `first_file_id` in each
/// directory's record is always a valid, consecutive starting point.
fn assign(node: &DirNode, parent: u16, state: &mut AssignState, out: &mut Vec<DirOut>) -> u16 {
    let this_id = state.next_dir_id;
    state.next_dir_id += 1;
    let first_file_id = state.next_file_id;

    let file_names: Vec<String> = node
        .children
        .iter()
        .partition_map::<Vec<String>, Vec<()>, _, String, ()>(|(name, child)| match child {
            Child::File => Either::Left(name.clone()),
            Child::Dir(_) => Either::Right(()),
        })
        .0;
    let mut file_ids = BTreeMap::new();
    for name in file_names {
        file_ids.insert(name, state.next_file_id);
        state.next_file_id += 1;
    }

    let idx = out.len();
    out.push(DirOut {
        parent_or_count: parent,
        first_file_id,
        children: Vec::new(),
    });

    let mut children = Vec::with_capacity(node.children.len());
    for (name, child) in &node.children {
        match child {
            Child::File => {
                children.push((name.clone(), ChildOut::File(file_ids[name])));
            }
            Child::Dir(dir) => {
                let child_id = assign(dir, this_id, state, out);
                children.push((name.clone(), ChildOut::Dir(child_id)));
            }
        }
    }
    out[idx].children = children;
    this_id
}

fn collect_paths(out: &[DirOut], idx: usize, prefix: &str, map: &mut BTreeMap<String, u32>) {
    for (name, child) in &out[idx].children {
        match child {
            ChildOut::File(file_id) => {
                map.insert(format!("{prefix}/{name}"), *file_id);
            }
            ChildOut::Dir(id) => {
                let child_idx = (*id - ROOT_DIR_ID) as usize;
                let child_prefix = format!("{prefix}/{name}");
                collect_paths(out, child_idx, &child_prefix, map);
            }
        }
    }
}

fn encode_name(name: &str) -> Vec<u8> {
    ISO_8859_1
        .encode(name, EncoderTrap::Strict)
        .expect("path components are validated ASCII before reaching here")
}

/// Builds a filename table from a set of absolute leaf-file paths, assigning
/// file IDs starting at `file_id_off`. Returns the packed FNT bytes and the
/// `path -> file_id` mapping the caller should use for FAT placement.
pub fn encode<I, S>(paths: I, file_id_off: u32) -> RomResult<(Vec<u8>, BTreeMap<String, u32>)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut root = DirNode::default();
    for path in paths {
        let path = path.as_ref();
        let components = split_path(path)?;
        insert(&mut root, &components, path)?;
    }

    let mut state = AssignState {
        next_dir_id: ROOT_DIR_ID,
        next_file_id: file_id_off,
    };
    let mut out = Vec::new();
    assign(&root, ROOT_DIR_ID, &mut state, &mut out);
    let dir_count = out.len();

    let mut subtables: Vec<Vec<u8>> = Vec::with_capacity(dir_count);
    for dir in &out {
        let mut buf = Vec::new();
        for (name, child) in &dir.children {
            let name_bytes = encode_name(name);
            match child {
                ChildOut::File(_) => {
                    buf.push(name_bytes.len() as u8);
                    buf.extend_from_slice(&name_bytes);
                }
                ChildOut::Dir(id) => {
                    buf.push((name_bytes.len() as u8) | 0x80);
                    buf.extend_from_slice(&name_bytes);
                    buf.extend_from_slice(&id.to_le_bytes());
                }
            }
        }
        buf.push(0);
        subtables.push(buf);
    }

    let table_size = (dir_count * DIR_RECORD_SIZE) as u32;
    let mut cumulative = table_size;
    let mut dir_table = Vec::with_capacity(table_size as usize);
    for (i, dir) in out.iter().enumerate() {
        let sub_offset = cumulative;
        cumulative += subtables[i].len() as u32;
        let parent_or_count = if i == 0 {
            dir_count as u16
        } else {
            dir.parent_or_count
        };
        dir_table.extend_from_slice(&sub_offset.to_le_bytes());
        dir_table.extend_from_slice(&(dir.first_file_id as u16).to_le_bytes());
        dir_table.extend_from_slice(&parent_or_count.to_le_bytes());
    }

    let mut fnt_bytes = dir_table;
    for sub in &subtables {
        fnt_bytes.extend_from_slice(sub);
    }

    let mut map = BTreeMap::new();
    collect_paths(&out, 0, "", &mut map);
    Ok((fnt_bytes, map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_rom_has_one_root_record_and_empty_subtable() {
        let (bytes, map) = encode(Vec::<&str>::new(), 0).unwrap();
        assert_eq!(bytes.len(), 8 + 1);
        assert_eq!(&bytes[8..], &[0u8]);
        assert!(map.is_empty());
        let decoded = decode(&bytes, usize::MAX).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn single_root_file() {
        let (bytes, map) = encode(["/a"], 0).unwrap();
        assert_eq!(&bytes[8..], &[0x01, b'a', 0x00]);
        assert_eq!(map.get("/a"), Some(&0));
        let decoded = decode(&bytes, usize::MAX).unwrap();
        assert_eq!(decoded, map);
    }

    #[test]
    fn nested_file() {
        let (bytes, map) = encode(["/d/f"], 0).unwrap();
        // two directory records, 16 bytes, then root subtable then d's subtable.
        assert_eq!(&bytes[16..21], &[0x81, b'd', 0x01, 0xF0, 0x00]);
        assert_eq!(&bytes[21..24], &[0x01, b'f', 0x00]);
        assert_eq!(map.get("/d/f"), Some(&0));
        let decoded = decode(&bytes, usize::MAX).unwrap();
        assert_eq!(decoded, map);
    }

    #[test]
    fn siblings_are_ordered_lexicographically() {
        let (bytes_ba, _) = encode(["/b", "/a"], 0).unwrap();
        let (bytes_ab, _) = encode(["/a", "/b"], 0).unwrap();
        assert_eq!(bytes_ba, bytes_ab);
        assert_eq!(&bytes_ab[8..], &[0x01, b'a', 0x01, b'b', 0x00]);
    }

    #[test]
    fn swapping_names_changes_bytes_when_order_changes() {
        let (bytes1, _) = encode(["/apple", "/banana"], 0).unwrap();
        let (bytes2, _) = encode(["/banana", "/apple"], 0).unwrap();
        assert_eq!(bytes1, bytes2, "physical input order must not matter");

        let (bytes3, _) = encode(["/zebra", "/apple"], 0).unwrap();
        assert_ne!(bytes1, bytes3);
    }

    #[test]
    fn file_ids_are_consecutive_and_depth_first() {
        let (_, map) = encode(["/a", "/d/f", "/b"], 0).unwrap();
        // lexicographic children of root: a, b, d -- a and b are files (ids 0, 1),
        // d is a directory and is recursed into last, so its file f gets id 2.
        assert_eq!(map.get("/a"), Some(&0));
        assert_eq!(map.get("/b"), Some(&1));
        assert_eq!(map.get("/d/f"), Some(&2));
    }

    #[test]
    fn file_id_offset_is_respected() {
        let (_, map) = encode(["/a"], 42).unwrap();
        assert_eq!(map.get("/a"), Some(&42));
    }

    #[test]
    fn rejects_missing_leading_slash() {
        let err = encode(["a"], 0).unwrap_err();
        assert!(matches!(err, RomError::InvalidPath { .. }));
    }

    #[test]
    fn rejects_empty_component() {
        let err = encode(["/a//b"], 0).unwrap_err();
        assert!(matches!(err, RomError::InvalidPath { .. }));
    }

    #[test]
    fn rejects_name_too_long() {
        let long_name = "x".repeat(128);
        let path = format!("/{long_name}");
        let err = encode([path], 0).unwrap_err();
        assert!(matches!(err, RomError::NameTooLong { .. }));
    }

    #[test]
    fn rejects_duplicate_path() {
        let err = encode(["/a", "/a"], 0).unwrap_err();
        assert!(matches!(err, RomError::DuplicatePath(_)));
    }

    #[test]
    fn rejects_file_directory_collision() {
        let err = encode(["/a", "/a/b"], 0).unwrap_err();
        assert!(matches!(err, RomError::InvalidPath { .. }));
    }

    #[test]
    fn decode_rejects_unterminated_subtable() {
        let mut bytes = vec![0u8; 8];
        bytes[6] = 1; // dir_count = 1
        // sub_table_offset points past the end of the buffer.
        bytes[0..4].copy_from_slice(&100u32.to_le_bytes());
        let err = decode(&bytes, usize::MAX).unwrap_err();
        assert!(matches!(err, FntError::UnterminatedSubTable { .. }));
    }

    #[test]
    fn decode_rejects_out_of_range_subdir_id() {
        let mut bytes = vec![0u8; 8];
        bytes[6] = 1; // dir_count = 1
        bytes[0..4].copy_from_slice(&8u32.to_le_bytes());
        // subdir entry pointing at F005, but only one directory (F000) exists.
        bytes.extend_from_slice(&[0x81, b'x']);
        bytes.extend_from_slice(&0xF005u16.to_le_bytes());
        bytes.push(0);
        let err = decode(&bytes, usize::MAX).unwrap_err();
        assert!(matches!(err, FntError::SubDirIdOutOfRange { .. }));
    }

    #[test]
    fn decode_rejects_file_id_past_fat_len() {
        let (bytes, _) = encode(["/a", "/b"], 0).unwrap();
        let err = decode(&bytes, 1).unwrap_err();
        assert!(matches!(err, FntError::FileIdExceedsFat { .. }));
    }
}
