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

//! Crate-wide error type. Every subsystem that has genuinely distinct
//! failure modes gets its own `thiserror` enum; they all fold into
//! [`RomError`] via `#[from]` so callers driving the top-level [`crate::Rom`]
//! API only ever match on one type.

use thiserror::Error;

pub type RomResult<T> = Result<T, RomError>;
pub type FntResult<T> = Result<T, FntError>;
pub type OvtResult<T> = Result<T, OvtError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FntError {
    #[error("unterminated FNT sub-table for directory {dir_id:#06x}")]
    UnterminatedSubTable { dir_id: u16 },
    #[error("FNT sub-directory id {id:#06x} is out of range (have {count} directories)")]
    SubDirIdOutOfRange { id: u16, count: usize },
    #[error("FNT references file id {file_id}, but only {fat_len} FAT entries exist")]
    FileIdExceedsFat { file_id: u32, fat_len: usize },
    #[error("FNT entry name contains a forbidden byte {byte:#04x}")]
    ForbiddenNameByte { byte: u8 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OvtError {
    #[error("overlay table entry {index} references nonexistent file id {file_id}")]
    MissingFile { index: usize, file_id: u32 },
    #[error("overlay table entries {first} and {second} both claim file id {file_id}")]
    DuplicateFileId {
        file_id: u32,
        first: usize,
        second: usize,
    },
    #[error("overlay table size {size} is not a multiple of the 32-byte entry size")]
    Misaligned { size: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RomError {
    #[error("expected a buffer of {expected} bytes for {what}, got {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("value {value} does not fit in the {field_bytes}-byte field {field}")]
    Overflow {
        field: &'static str,
        field_bytes: usize,
        value: u64,
    },
    #[error("region [{start}..{end}) is out of bounds for a buffer of {len} bytes")]
    OutOfBounds { start: u64, end: u64, len: usize },
    #[error("header references {what} at [{start}..{end}), past the end of the image ({len} bytes)")]
    TruncatedImage {
        what: &'static str,
        start: u64,
        end: u64,
        len: usize,
    },
    #[error("malformed filename table: {0}")]
    MalformedFnt(#[from] FntError),
    #[error("malformed overlay table: {0}")]
    MalformedOvt(#[from] OvtError),
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },
    #[error("path component {component:?} is {len} bytes, longer than the 127-byte limit")]
    NameTooLong { component: String, len: usize },
    #[error("duplicate path {0:?}")]
    DuplicatePath(String),
    #[error("banner must be exactly {expected} bytes, got {actual}")]
    BadBanner { expected: usize, actual: usize },
    #[error("composed ROM size {size} exceeds the largest supported cartridge capacity ({max})")]
    CapacityExceeded { size: u64, max: u64 },
}
