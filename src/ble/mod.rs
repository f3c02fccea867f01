//! Bluetooth Low Energy subsystem.
//!
//! This module drives the Nordic SoftDevice S140 in **Peripheral** role:
//!
//! 1. **GATT server** - Battery Service (0x180F) and Weight Scale Service
//!    (0x181D), both readable and notifiable.
//! 2. **Advertiser** - connectable undirected advertising; restarts as
//!    soon as the central disconnects.
//! 3. **Service handle** - [`BleScale`], the `WeightService` the sampling
//!    loop pushes values into without ever waiting on the radio.

use core::cell::RefCell;

use ble_scale::drivers::WeightService;
use ble_scale::error::Error;
use ble_scale::weight::ble_encode;
use defmt::{debug, info, warn};
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use nrf_softdevice::ble::{gatt_server, peripheral, Connection};
use nrf_softdevice::Softdevice;

#[nrf_softdevice::gatt_service(uuid = "180f")]
pub struct BatteryService {
    #[characteristic(uuid = "2a19", read, notify)]
    battery_level: u8,
}

#[nrf_softdevice::gatt_service(uuid = "181d")]
pub struct WeightScaleService {
    /// Quantised weight in hundredths of a gram.
    #[characteristic(uuid = "2a9d", read, notify)]
    weight: i32,
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub battery: BatteryService,
    pub scale: WeightScaleService,
}

/// The single central currently connected, if any.
static CONNECTION: Mutex<ThreadModeRawMutex, RefCell<Option<Connection>>> =
    Mutex::new(RefCell::new(None));

#[rustfmt::skip]
const ADV_DATA: &[u8] = &[
    0x02, 0x01, 0x06,                   // Flags: LE General Discoverable, BR/EDR not supported
    0x05, 0x03, 0x1D, 0x18, 0x0F, 0x18, // Complete 16-bit UUIDs: Weight Scale, Battery
    0x0A, 0x09, b'B', b'L', b'E', b'-', b'S', b'c', b'a', b'l', b'e',
];

const SCAN_DATA: &[u8] = &[];

/// SoftDevice event loop.
#[embassy_executor::task]
pub async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

/// Advertise, serve one central until it disconnects, repeat.
#[embassy_executor::task]
pub async fn advertise_task(sd: &'static Softdevice, server: &'static Server) -> ! {
    let config = peripheral::Config::default();
    loop {
        let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: ADV_DATA,
            scan_data: SCAN_DATA,
        };
        let conn = match peripheral::advertise_connectable(sd, adv, &config).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("ble: advertising failed: {:?}", e);
                continue;
            }
        };
        info!("ble: central connected");
        CONNECTION.lock(|c| c.replace(Some(conn.clone())));

        let reason = gatt_server::run(&conn, server, |event| match event {
            ServerEvent::Battery(BatteryServiceEvent::BatteryLevelCccdWrite { notifications }) => {
                debug!("ble: battery notifications {}", notifications);
            }
            ServerEvent::Scale(WeightScaleServiceEvent::WeightCccdWrite { notifications }) => {
                debug!("ble: weight notifications {}", notifications);
            }
        })
        .await;

        CONNECTION.lock(|c| c.replace(None));
        info!("ble: central disconnected: {:?}", reason);
    }
}

/// `WeightService` backed by the GATT server.
///
/// Values are written to the attribute table immediately; a notification
/// is queued on the current connection if there is one. Nothing here waits
/// for the radio.
pub struct BleScale {
    server: &'static Server,
}

impl BleScale {
    pub fn new(server: &'static Server) -> Self {
        Self { server }
    }

    fn connection() -> Option<Connection> {
        CONNECTION.lock(|c| c.borrow().clone())
    }

    fn publish_battery(&self, percent: u8) -> ble_scale::Result<()> {
        self.server.battery.battery_level_set(&percent).map_err(gatt_error)?;
        if let Some(conn) = Self::connection() {
            self.server
                .battery
                .battery_level_notify(&conn, &percent)
                .map_err(gatt_error)?;
        }
        Ok(())
    }

    fn publish_weight(&self, centigrams: i32, notify: bool) -> ble_scale::Result<()> {
        self.server.scale.weight_set(&centigrams).map_err(gatt_error)?;
        if !notify {
            return Ok(());
        }
        if let Some(conn) = Self::connection() {
            // Fails while the central has notifications disabled.
            self.server
                .scale
                .weight_notify(&conn, &centigrams)
                .map_err(gatt_error)?;
        }
        Ok(())
    }
}

fn gatt_error<E: defmt::Format>(e: E) -> Error {
    debug!("ble: gatt: {:?}", e);
    Error::Ble
}

impl WeightService for BleScale {
    fn set_battery_level(&mut self, percent: u8) {
        if let Err(e) = self.publish_battery(percent.min(100)) {
            warn!("ble: battery level not published: {:?}", e);
        }
    }

    fn set_weight(&mut self, value: f32, notify: bool) {
        // Dropped updates are replaced by the next tick's value.
        if let Err(e) = self.publish_weight(ble_encode(value), notify) {
            debug!("ble: weight update dropped: {:?}", e);
        }
    }
}
