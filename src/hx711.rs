//! Bit-banged HX711 load-cell amplifier.
//!
//! DOUT goes low when a conversion is ready; 24 clock pulses shift the
//! two's-complement sample out MSB first, and 1-3 extra pulses select the
//! channel/gain of the *next* conversion. Holding SCK high for more than
//! 60 µs powers the chip down.
//!
//! The chip converts at 10 SPS, so nothing here may wait for DOUT on the
//! synchronous [`LoadCell`] path: those reads take a conversion only if
//! one is already waiting and report `SensorFault::Timeout` otherwise.
//! Waiting happens in the `async` methods, which yield to the executor.

use ble_scale::config::{DEFAULT_SCALE_FACTOR, HX711_GAIN_PULSES, SENSOR_READY_TIMEOUT_MS};
use ble_scale::drivers::LoadCell;
use ble_scale::error::{Error, Peripheral, Result, SensorFault};
use defmt::{debug, trace};
use embassy_nrf::gpio::{Input, Output};
use embassy_time::{with_timeout, Duration};

/// Half period of the serial clock, in CPU cycles (~1 µs at 64 MHz).
const HALF_PERIOD_CYCLES: u32 = 64;

/// Zero offset being collected from ordinary reads, one conversion each.
struct TareRun {
    samples: u8,
    remaining: u8,
    sum: i64,
}

impl TareRun {
    fn new(samples: u8) -> Self {
        let samples = samples.max(1);
        Self {
            samples,
            remaining: samples,
            sum: 0,
        }
    }

    /// Add one conversion; yields the mean once the last one is in.
    fn push(&mut self, raw: i32) -> Option<i32> {
        self.sum += i64::from(raw);
        self.remaining -= 1;
        (self.remaining == 0).then(|| (self.sum / i64::from(self.samples)) as i32)
    }
}

pub struct Hx711 {
    dout: Input<'static>,
    sck: Output<'static>,
    offset: i32,
    scale: f32,
    pending_tare: Option<TareRun>,
}

impl Hx711 {
    pub fn new(dout: Input<'static>, mut sck: Output<'static>) -> Self {
        sck.set_low();
        Self {
            dout,
            sck,
            offset: 0,
            scale: DEFAULT_SCALE_FACTOR,
            pending_tare: None,
        }
    }

    /// Wait until a conversion is ready without blocking the executor.
    pub async fn wait_ready(&mut self) -> Result<()> {
        if self.dout.is_low() {
            return Ok(());
        }
        with_timeout(
            Duration::from_millis(SENSOR_READY_TIMEOUT_MS),
            self.dout.wait_for_low(),
        )
        .await
        .map_err(|_| Error::Sensor(SensorFault::Timeout))
    }

    /// Average of `times` fresh conversions, awaiting each one.
    pub async fn read_raw_async(&mut self, times: u8) -> Result<i32> {
        let times = times.max(1);
        let mut sum: i64 = 0;
        for _ in 0..times {
            self.wait_ready().await?;
            sum += i64::from(self.read_once()?);
        }
        Ok((sum / i64::from(times)) as i32)
    }

    /// Take the zero offset from `samples` fresh conversions right now.
    pub async fn tare_now(&mut self, samples: u8) -> Result<()> {
        self.pending_tare = None;
        self.offset = self.read_raw_async(samples).await?;
        debug!("hx711: offset {}", self.offset);
        Ok(())
    }

    fn pulse(&mut self) {
        self.sck.set_high();
        cortex_m::asm::delay(HALF_PERIOD_CYCLES);
        self.sck.set_low();
        cortex_m::asm::delay(HALF_PERIOD_CYCLES);
    }

    /// Shift one 24-bit sample out of the chip, if one is ready.
    fn read_once(&mut self) -> Result<i32> {
        if self.dout.is_high() {
            return Err(SensorFault::Timeout.into());
        }

        // SCK must not stay high long enough to trigger power-down.
        let raw = critical_section::with(|_| {
            let mut value: u32 = 0;
            for _ in 0..24 {
                self.sck.set_high();
                cortex_m::asm::delay(HALF_PERIOD_CYCLES);
                value = (value << 1) | u32::from(self.dout.is_high());
                self.sck.set_low();
                cortex_m::asm::delay(HALF_PERIOD_CYCLES);
            }
            for _ in 0..HX711_GAIN_PULSES {
                self.pulse();
            }
            value
        });

        // Sign-extend from 24 bits.
        let value = ((raw << 8) as i32) >> 8;
        trace!("hx711: raw {}", value);
        Ok(value)
    }

    fn average(&mut self, times: u8) -> Result<i32> {
        let times = times.max(1);
        let mut sum: i64 = 0;
        for _ in 0..times {
            sum += i64::from(self.read_once()?);
        }
        Ok((sum / i64::from(times)) as i32)
    }
}

impl LoadCell for Hx711 {
    fn set_scale(&mut self, factor: f32) {
        self.scale = factor;
    }

    /// Starts collecting the offset from the next `samples` reads; those
    /// reads report `SensorFault::Settling`.
    fn tare(&mut self, samples: u8) -> Result<()> {
        self.pending_tare = Some(TareRun::new(samples));
        debug!("hx711: tare over next {} conversions", samples);
        Ok(())
    }

    fn read_raw(&mut self, times: u8) -> Result<i32> {
        self.average(times)
    }

    fn read_calibrated(&mut self, times: u8) -> Result<f32> {
        let raw = self.average(times)?;
        if let Some(run) = self.pending_tare.as_mut() {
            if let Some(offset) = run.push(raw) {
                self.offset = offset;
                self.pending_tare = None;
                debug!("hx711: offset {}", offset);
            }
            return Err(SensorFault::Settling.into());
        }

        let grams = (raw as f32 - self.offset as f32) / self.scale;
        if grams.is_finite() {
            Ok(grams)
        } else {
            Err(SensorFault::NotFinite.into())
        }
    }

    fn power_down(&mut self) -> Result<()> {
        self.sck.set_low();
        self.sck.set_high();
        // 60 µs minimum; keep SCK high through System OFF.
        cortex_m::asm::delay(HALF_PERIOD_CYCLES * 80);
        if self.dout.is_high() {
            Ok(())
        } else {
            Err(Error::PowerDown(Peripheral::LoadCell))
        }
    }
}
