//! GPIO button input driving the debounce state machine.
//!
//! Two physical buttons (active-high with internal pull-down):
//!   - RESET - tare; also the wake source from deep sleep
//!   - SLEEP - long press (1 s) enters deep sleep
//!
//! Each button is owned by one `switch_task` on the high-priority
//! interrupt executor. The task only turns GPIO edges, timer expiries and
//! rebind requests into calls on its `DebouncedSwitch`; callbacks run
//! later when the sampling loop drains the dispatch queue.

use ble_scale::debounce::{OneShotTimer, Outcome, SwitchInput};
use defmt::{debug, info};
use embassy_futures::select::{select3, Either3};
use embassy_nrf::gpio::Input;
use embassy_time::{Duration, Instant, Timer};

use crate::{AppQueue, AppSwitch, RebindSignal};

/// Button pin whose edge interrupt can be masked.
pub struct ButtonPin {
    input: Input<'static>,
    irq_enabled: bool,
}

impl ButtonPin {
    pub fn new(input: Input<'static>) -> Self {
        Self {
            input,
            irq_enabled: false,
        }
    }

    /// Resolves on the next press edge; never resolves while masked.
    pub async fn wait_for_edge(&mut self) {
        if !self.irq_enabled {
            core::future::pending::<()>().await;
        }
        self.input.wait_for_rising_edge().await;
    }
}

impl SwitchInput for ButtonPin {
    fn is_asserted(&mut self) -> bool {
        self.input.is_high()
    }

    fn set_edge_interrupt(&mut self, enabled: bool) {
        self.irq_enabled = enabled;
    }
}

/// One-shot deadline on the embassy time driver.
pub struct DeadlineTimer {
    deadline: Option<Instant>,
}

impl DeadlineTimer {
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Resolves once the armed deadline passes; never resolves when idle.
    pub async fn expired(&mut self) {
        match self.deadline {
            Some(at) => {
                Timer::at(at).await;
                self.deadline = None;
            }
            None => core::future::pending().await,
        }
    }
}

impl OneShotTimer for DeadlineTimer {
    fn start(&mut self, delay_ms: u32) {
        self.deadline = Some(Instant::now() + Duration::from_millis(u64::from(delay_ms)));
    }

    fn cancel(&mut self) {
        self.deadline = None;
    }
}

#[embassy_executor::task(pool_size = 2)]
pub async fn switch_task(
    name: &'static str,
    mut switch: AppSwitch,
    queue: &'static AppQueue,
    rebind: &'static RebindSignal,
) -> ! {
    info!("buttons: {} armed ({} ms)", name, switch.delay_ms());
    loop {
        let event = {
            let (pin, timer) = switch.io();
            select3(pin.wait_for_edge(), timer.expired(), rebind.wait()).await
        };
        match event {
            Either3::First(()) => {
                switch.on_edge();
            }
            Either3::Second(()) => match switch.on_timer_expired(queue) {
                Outcome::Dispatched => info!("buttons: {} pressed", name),
                outcome => debug!("buttons: {} {:?}", name, outcome),
            },
            Either3::Third(binding) => {
                debug!("buttons: {} rebound", name);
                switch.rebind(binding);
            }
        }
    }
}
