//! Persistent storage for the load-cell calibration factor.
//!
//! Uses the nRF52840's internal flash via `sequential-storage` (key-value
//! map) in the pages reserved at the top of flash by `memory.x`. The
//! record is the 4-byte little-endian encoding from
//! [`ble_scale::calibration`]; `sequential-storage` handles wear levelling
//! and garbage collection.

use ble_scale::calibration::{self, RECORD_SIZE};
use ble_scale::config::{DEFAULT_SCALE_FACTOR, STORAGE_FLASH_PAGE_COUNT, STORAGE_FLASH_PAGE_START};
use ble_scale::error::{Error, Result};
use defmt::{error, info, warn};
use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::cache::NoCache;
use sequential_storage::map;

/// Flash page size for nRF52840 (4 KB).
const FLASH_PAGE_SIZE: u32 = 4096;

const STORAGE_START: u32 = STORAGE_FLASH_PAGE_START * FLASH_PAGE_SIZE;
const STORAGE_END: u32 = (STORAGE_FLASH_PAGE_START + STORAGE_FLASH_PAGE_COUNT) * FLASH_PAGE_SIZE;

/// Map key of the scale-factor record.
const KEY_SCALE_FACTOR: u8 = 0x01;

/// Scratch buffer for `sequential-storage` (key + item + word alignment).
const BUF_SIZE: usize = 32;

pub struct CalibrationStore<F> {
    flash: F,
}

impl<F: NorFlash> CalibrationStore<F> {
    pub fn new(flash: F) -> Self {
        Self { flash }
    }

    /// Stored scale factor, or `None` if nothing valid is stored.
    pub async fn load(&mut self) -> Result<Option<f32>> {
        let mut buf = [0u8; BUF_SIZE];
        let item = map::fetch_item::<u8, &[u8], _>(
            &mut self.flash,
            STORAGE_START..STORAGE_END,
            &mut NoCache::new(),
            &mut buf,
            &KEY_SCALE_FACTOR,
        )
        .await
        .map_err(|e| {
            error!("storage: flash read error: {:?}", defmt::Debug2Format(&e));
            Error::Storage
        })?;

        match item {
            Some(bytes) => calibration::decode(bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Stored scale factor, falling back to the compiled-in default.
    pub async fn load_or_default(&mut self) -> f32 {
        match self.load().await {
            Ok(Some(factor)) => {
                info!("storage: scale factor {} from flash", factor);
                factor
            }
            Ok(None) => {
                info!("storage: no calibration stored, using {}", DEFAULT_SCALE_FACTOR);
                DEFAULT_SCALE_FACTOR
            }
            Err(e) => {
                warn!("storage: calibration unreadable ({:?}), using default", e);
                DEFAULT_SCALE_FACTOR
            }
        }
    }

    pub async fn save(&mut self, factor: f32) -> Result<()> {
        let record: [u8; RECORD_SIZE] = calibration::encode(calibration::validate(factor)?);
        let mut buf = [0u8; BUF_SIZE];
        map::store_item::<u8, &[u8], _>(
            &mut self.flash,
            STORAGE_START..STORAGE_END,
            &mut NoCache::new(),
            &mut buf,
            &KEY_SCALE_FACTOR,
            &&record[..],
        )
        .await
        .map_err(|e| {
            error!("storage: flash write error: {:?}", defmt::Debug2Format(&e));
            Error::Storage
        })?;
        info!("storage: saved scale factor {}", factor);
        Ok(())
    }
}
