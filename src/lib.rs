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

//! Bidirectional codec for the Nintendo DS cartridge ROM container format:
//! decomposes a flat image into its header, ARM9/ARM7 binaries, overlay
//! tables, filename table, file allocation table, banner and file payloads,
//! and recomposes a valid image from them.

pub mod bytes_ext;
pub(crate) mod crc;
pub mod error;
pub(crate) mod fat;
pub(crate) mod fnt;
pub mod header;
pub mod overlay;
mod rom;
pub mod storage;
pub(crate) mod util;

pub use crate::bytes_ext::StBytes;
pub use crate::error::{RomError, RomResult};
pub use crate::header::{Header, HeaderField};
pub use crate::overlay::Overlay;
pub use crate::rom::{ComposeOptions, Rom, BANNER_SIZE};
pub use crate::storage::StorageType;
