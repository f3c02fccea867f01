//! ble-scale firmware for the nRF52840.
//!
//! Boot sequence:
//!
//! 1. latch the reset cause, show the logo, measure the battery
//! 2. bring up the SoftDevice and GATT server
//! 3. load the calibration factor from flash and tare the load cell
//!    (or enter calibration mode if RESET is held)
//! 4. spawn the button tasks (interrupt executor) and the display task
//! 5. run the sampling loop here until sleep is requested
//!
//! Pin map (Seeed XIAO nRF52840):
//!   P0.04 / P0.05 - OLED SDA / SCL
//!   P0.03 / P0.02 - HX711 DOUT / SCK
//!   P0.15         - RESET button (tare, wake)
//!   P0.27         - SLEEP button
//!   P0.31 / P0.14 - VBAT sense (AIN7) / sense enable

#![no_std]
#![no_main]

mod ble;
mod hx711;
mod power;
mod storage;
mod ui;

use core::cell::RefCell;
use core::mem;

use ble_scale::app::{ScaleApp, Step};
use ble_scale::calibration;
use ble_scale::config::{
    BLE_DEVICE_NAME, BOOT_TARE_SAMPLES, CALIBRATION_REFERENCE_GRAMS, CALIBRATION_SAMPLES,
    DISPATCH_QUEUE_DEPTH, KALMAN_PROCESS_NOISE, NOTIFY_INTERVAL_MS, RESET_DEBOUNCE_MS,
    SAMPLE_YIELD_MS, SLEEP_DEBOUNCE_MS,
};
use ble_scale::debounce::{Binding, DebouncedSwitch, DispatchQueue};
use ble_scale::drivers::{LoadCell, PowerPlatform, ResetCause, WeightService};
use ble_scale::estimator::Estimator;
use ble_scale::sampling::Sampler;
use ble_scale::ui::layout::render_logo;
use ble_scale::weight::SharedWeight;
use defmt::{debug, error, info, unwrap, warn};
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_futures::select::{select, Either};
use embassy_futures::yield_now;
use embassy_nrf::gpio::{Input, Level, Output, OutputDrive, Pull};
use embassy_nrf::interrupt;
use embassy_nrf::interrupt::{InterruptExt, Priority};
use embassy_nrf::{bind_interrupts, peripherals, saadc, twim};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Instant, Timer};
use nrf_softdevice::{raw, Flash, Softdevice};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::ble::{BleScale, Server};
use crate::hx711::Hx711;
use crate::power::NrfPower;
use crate::storage::CalibrationStore;
use crate::ui::buttons::{ButtonPin, DeadlineTimer};
use crate::ui::display::{OledHandle, SharedPanel};

// ═══════════════════════════════════════════════════════════════════════════
// Application types
// ═══════════════════════════════════════════════════════════════════════════

pub type App = ScaleApp<'static, Hx711, BleScale, OledHandle, NrfPower>;
pub type AppQueue = DispatchQueue<App, (), DISPATCH_QUEUE_DEPTH>;
pub type AppSwitch = DebouncedSwitch<ButtonPin, DeadlineTimer, App, ()>;
pub type RebindSignal = Signal<CriticalSectionRawMutex, Option<Binding<App, ()>>>;

static WEIGHT: SharedWeight = SharedWeight::new();
static DISPATCH: AppQueue = DispatchQueue::new();
static RESET_REBIND: RebindSignal = Signal::new();
static SLEEP_REBIND: RebindSignal = Signal::new();

static PANEL: StaticCell<SharedPanel> = StaticCell::new();
static SERVER: StaticCell<Server> = StaticCell::new();

/// Runs the button tasks above thread mode.
static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn EGU1_SWI1() {
    EXECUTOR_HIGH.on_interrupt()
}

bind_interrupts!(struct Irqs {
    SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0 => twim::InterruptHandler<peripherals::TWISPI0>;
    SAADC => saadc::InterruptHandler;
});

fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_XTAL as u8,
            rc_ctiv: 0,
            rc_temp_ctiv: 0,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_20_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 128 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: BLE_DEVICE_NAME.as_ptr() as _,
            current_len: BLE_DEVICE_NAME.len() as u16,
            max_len: BLE_DEVICE_NAME.len() as u16,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("ble-scale starting");

    // The SoftDevice reserves priorities 0, 1 and 4.
    let mut config = embassy_nrf::config::Config::default();
    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(config);

    // ── Reset cause (before the SoftDevice takes POWER) ──────────────────
    let platform = NrfPower::new();
    match platform.reset_cause() {
        ResetCause::DeepSleepWake => info!("boot: woke from deep sleep"),
        cause => info!("boot: reset cause {:?}", cause),
    }

    // ── Display ──────────────────────────────────────────────────────────
    let i2c = twim::Twim::new(p.TWISPI0, Irqs, p.P0_04, p.P0_05, twim::Config::default());
    let panel = PANEL.init(Mutex::new(RefCell::new(unwrap!(ui::display::init(i2c)))));
    let mut oled = OledHandle::new(panel);
    if let Err(e) = render_logo(&mut oled) {
        warn!("boot: logo not shown: {:?}", e);
    }

    // ── Battery ──────────────────────────────────────────────────────────
    let mut saadc = saadc::Saadc::new(
        p.SAADC,
        Irqs,
        saadc::Config::default(),
        [saadc::ChannelConfig::single_ended(p.P0_31)],
    );
    saadc.calibrate().await;
    let mut vbat_enable = Output::new(p.P0_14, Level::High, OutputDrive::Standard);
    let battery = power::read_battery(&mut saadc, &mut vbat_enable).await;

    // ── BLE ──────────────────────────────────────────────────────────────
    let sd = Softdevice::enable(&softdevice_config());
    let server: &'static Server = SERVER.init(unwrap!(Server::new(sd)));
    unwrap!(spawner.spawn(ble::softdevice_task(sd)));

    let mut service = BleScale::new(server);
    service.set_battery_level(battery.percent());

    // ── Load cell ────────────────────────────────────────────────────────
    let mut store = CalibrationStore::new(Flash::take(sd));
    let factor = store.load_or_default().await;
    let mut load_cell = Hx711::new(
        Input::new(p.P0_03, Pull::None),
        Output::new(p.P0_02, Level::Low, OutputDrive::Standard),
    );
    load_cell.set_scale(factor);
    let mut reset_input = Input::new(p.P0_15, Pull::Down);

    // First conversion after power-up takes a few hundred ms.
    for _ in 0..4 {
        if load_cell.wait_ready().await.is_ok() {
            break;
        }
    }

    if reset_input.is_high() {
        calibrate(&mut load_cell, &mut store, &mut reset_input).await;
    }

    if let Err(e) = load_cell.tare_now(BOOT_TARE_SAMPLES).await {
        warn!("boot: tare failed: {:?}", e);
    }
    unwrap!(spawner.spawn(ble::advertise_task(sd, server)));

    // ── Application ──────────────────────────────────────────────────────
    let sampler = Sampler::new(Estimator::new(0.0, KALMAN_PROCESS_NOISE), NOTIFY_INTERVAL_MS);
    let mut app: App = ScaleApp::new(load_cell, service, oled, platform, sampler, &WEIGHT);
    if let Err(e) = app.load_cell_mut().wait_ready().await {
        debug!("boot: load cell not ready for seed: {:?}", e);
    }
    app.seed();

    interrupt::EGU1_SWI1.set_priority(Priority::P6);
    let high = EXECUTOR_HIGH.start(interrupt::EGU1_SWI1);

    let reset = AppSwitch::new(
        ButtonPin::new(reset_input),
        DeadlineTimer::new(),
        Some(App::tare_binding()),
        RESET_DEBOUNCE_MS,
    );
    let sleep = AppSwitch::new(
        ButtonPin::new(Input::new(p.P0_27, Pull::Down)),
        DeadlineTimer::new(),
        Some(App::sleep_binding()),
        SLEEP_DEBOUNCE_MS,
    );
    unwrap!(high.spawn(ui::buttons::switch_task("reset", reset, &DISPATCH, &RESET_REBIND)));
    unwrap!(high.spawn(ui::buttons::switch_task("sleep", sleep, &DISPATCH, &SLEEP_REBIND)));
    unwrap!(spawner.spawn(ui::display_task(oled, &WEIGHT, battery)));

    info!("boot: running");

    // ── Sampling loop ────────────────────────────────────────────────────
    loop {
        if let Err(e) = app.load_cell_mut().wait_ready().await {
            debug!("sampling: load cell not ready: {:?}", e);
        }
        if app.step(&DISPATCH, Instant::now().as_millis()) == Step::Sleep {
            break;
        }
        Timer::after_millis(SAMPLE_YIELD_MS).await;
    }

    // No further presses while the peripherals go down. Unbinding drops
    // the switches' pending pin waits, which clears their SENSE setting.
    RESET_REBIND.signal(None);
    SLEEP_REBIND.signal(None);
    yield_now().await;
    app.sleep()
}

/// Two-point calibration: zero, then a reference mass on RESET.
///
/// Persists the resulting factor and resets; never returns.
async fn calibrate(
    load_cell: &mut Hx711,
    store: &mut CalibrationStore<Flash>,
    button: &mut Input<'static>,
) -> ! {
    info!("calibration: release RESET and clear the platform");
    button.wait_for_low().await;
    Timer::after_millis(u64::from(RESET_DEBOUNCE_MS)).await;

    let zero = read_raw_retrying(load_cell).await;
    info!(
        "calibration: zero {}, place {} g and press RESET",
        zero, CALIBRATION_REFERENCE_GRAMS
    );

    loop {
        match select(button.wait_for_rising_edge(), Timer::after_secs(1)).await {
            Either::First(()) => {
                Timer::after_millis(u64::from(RESET_DEBOUNCE_MS)).await;
                if button.is_high() {
                    break;
                }
            }
            Either::Second(()) => match load_cell.read_raw_async(1).await {
                Ok(raw) => info!("calibration: raw {} (delta {})", raw, raw - zero),
                Err(e) => warn!("calibration: read failed: {:?}", e),
            },
        }
    }

    let loaded = read_raw_retrying(load_cell).await;
    match calibration::scale_factor(zero, loaded, CALIBRATION_REFERENCE_GRAMS) {
        Ok(factor) => {
            info!("calibration: loaded {}, factor {}", loaded, factor);
            if let Err(e) = store.save(factor).await {
                error!("calibration: not saved: {:?}", e);
            }
        }
        Err(e) => error!("calibration: rejected: {:?}", e),
    }

    info!("calibration: restarting");
    Timer::after_millis(100).await;
    cortex_m::peripheral::SCB::sys_reset()
}

async fn read_raw_retrying(load_cell: &mut Hx711) -> i32 {
    loop {
        match load_cell.read_raw_async(CALIBRATION_SAMPLES).await {
            Ok(raw) => return raw,
            Err(e) => {
                warn!("calibration: read failed: {:?}", e);
                Timer::after_millis(100).await;
            }
        }
    }
}
