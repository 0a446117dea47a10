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

//! Cartridge chip family and the constants derived from it: the chip
//! capacity byte and the two ROM control words, written deterministically by
//! the composer rather than carrying caller intent (see Design Notes).

/// The two cartridge chip families the composer knows how to derive
/// ROM-control-word constants for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum StorageType {
    /// Mask ROM, used by the overwhelming majority of retail cartridges.
    #[default]
    Mrom,
    /// One-time-programmable ROM, used by some flash-cart and devkit images.
    Prom,
}

impl StorageType {
    /// `(RomControlNormal, RomControlKey1)` for this storage type.
    pub fn rom_control_words(self) -> (u32, u32) {
        match self {
            StorageType::Mrom => (0x00586000, 0x001808F8),
            StorageType::Prom => (0x00416657, 0x081808F8),
        }
    }
}

/// Standard secure-area load delay, in 131 kHz units, used by both chip
/// families on retail cartridges.
pub const SECURE_AREA_DELAY: u16 = 0x0D7E;

const CHIP_CAPACITY_UNIT: u64 = 0x20000;
/// Largest chip capacity shift the header's single-byte `DeviceCapacity`
/// field can express while still denoting a size the composer will accept.
const MAX_CHIP_CAPACITY_SHIFT: u8 = 24;

/// The smallest `n` such that `CHIP_CAPACITY_UNIT << n >= rom_size`.
pub fn chip_capacity(rom_size: u64) -> Option<u8> {
    for n in 0..=MAX_CHIP_CAPACITY_SHIFT {
        if let Some(capacity) = CHIP_CAPACITY_UNIT.checked_shl(n as u32) {
            if capacity >= rom_size {
                return Some(n);
            }
        }
    }
    None
}

/// The byte size implied by a given chip-capacity shift.
pub fn capacity_bytes(shift: u8) -> u64 {
    CHIP_CAPACITY_UNIT << shift
}

/// The largest ROM size the composer can express in the header's capacity field.
pub fn max_capacity_bytes() -> u64 {
    capacity_bytes(MAX_CHIP_CAPACITY_SHIFT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chip_capacity_rounds_up_to_the_smallest_fit() {
        assert_eq!(chip_capacity(0), Some(0));
        assert_eq!(chip_capacity(CHIP_CAPACITY_UNIT), Some(0));
        assert_eq!(chip_capacity(CHIP_CAPACITY_UNIT + 1), Some(1));
        assert_eq!(chip_capacity(CHIP_CAPACITY_UNIT * 2), Some(1));
    }

    #[test]
    fn chip_capacity_rejects_sizes_past_the_largest_supported_cartridge() {
        assert_eq!(chip_capacity(capacity_bytes(MAX_CHIP_CAPACITY_SHIFT) + 1), None);
    }

    #[test]
    fn rom_control_words_are_distinct_per_storage_type() {
        assert_ne!(
            StorageType::Mrom.rom_control_words(),
            StorageType::Prom.rom_control_words()
        );
    }
}
