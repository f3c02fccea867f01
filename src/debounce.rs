//! Debounce-and-dispatch for mechanical push buttons.
//!
//! A [`DebouncedSwitch`] turns the raw edge interrupt of one input pin into
//! at most one deferred callback per physical press:
//!
//! ```text
//!   Idle ──edge──▶ Debouncing ──timer, pin asserted──▶ (enqueue) ──▶ Idle
//!                      │
//!                      └──────timer, pin released────────────────▶ Idle
//! ```
//!
//! `on_edge` and `on_timer_expired` are meant to be called from restricted
//! contexts (interrupt handler, timer expiry). They never run user code:
//! a qualifying press only pushes the bound callback onto a
//! [`DispatchQueue`], which the application drains from normal context.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Deque;

use crate::error::Error;

/// Input pin with a raw edge interrupt the switch can mask.
pub trait SwitchInput {
    /// Current (pressed) level of the pin.
    fn is_asserted(&mut self) -> bool;

    /// Enable or disable the raw edge interrupt.
    fn set_edge_interrupt(&mut self, enabled: bool);
}

/// One-shot timer that calls back into the switch after a delay.
pub trait OneShotTimer {
    /// (Re)start the timer; any earlier deadline is replaced.
    fn start(&mut self, delay_ms: u32);

    /// Stop the timer. A cancelled timer must not expire.
    fn cancel(&mut self);
}

/// Callback plus argument bound to a switch.
///
/// The callback receives the application context `C` when the dispatch
/// queue is drained.
pub struct Binding<C, A> {
    pub callback: fn(&mut C, A),
    pub arg: A,
}

impl<C, A: Copy> Binding<C, A> {
    pub const fn new(callback: fn(&mut C, A), arg: A) -> Self {
        Self { callback, arg }
    }

    fn invoke(self, ctx: &mut C) {
        (self.callback)(ctx, self.arg)
    }
}

impl<C, A: Copy> Clone for Binding<C, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C, A: Copy> Copy for Binding<C, A> {}

/// Debounce window state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SwitchState {
    /// Waiting for a raw edge.
    Idle,
    /// Raw interrupt masked, timer running.
    Debouncing,
}

/// What happened when the debounce timer expired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Pin still asserted; callback enqueued.
    Dispatched,
    /// Pin released before the window closed (bounce / short press).
    Rejected,
    /// Pin asserted but the dispatch queue had no room.
    QueueFull,
    /// No window was open (timer raced a rebind).
    Stale,
}

/// Fixed-capacity queue of callbacks waiting to run outside interrupt context.
///
/// `schedule` is safe to call from any priority; `drain` runs the
/// callbacks one by one with the lock released.
pub struct DispatchQueue<C, A, const N: usize> {
    pending: Mutex<RefCell<Deque<Binding<C, A>, N>>>,
}

impl<C, A: Copy, const N: usize> DispatchQueue<C, A, N> {
    pub const fn new() -> Self {
        Self {
            pending: Mutex::new(RefCell::new(Deque::new())),
        }
    }

    /// Enqueue a callback. Fails with [`Error::QueueFull`] if there is no room.
    pub fn schedule(&self, binding: Binding<C, A>) -> crate::error::Result<()> {
        critical_section::with(|cs| self.pending.borrow_ref_mut(cs).push_back(binding))
            .map_err(|_| Error::QueueFull)
    }

    /// Run every queued callback against `ctx`. Returns how many ran.
    ///
    /// Callbacks scheduled while draining are run in the same call.
    pub fn drain(&self, ctx: &mut C) -> usize {
        let mut ran = 0;
        while let Some(binding) =
            critical_section::with(|cs| self.pending.borrow_ref_mut(cs).pop_front())
        {
            binding.invoke(ctx);
            ran += 1;
        }
        ran
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.pending.borrow_ref(cs).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C, A: Copy, const N: usize> Default for DispatchQueue<C, A, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// A push button with a debounce window and a rebindable callback.
pub struct DebouncedSwitch<P, T, C, A> {
    pin: P,
    timer: T,
    binding: Option<Binding<C, A>>,
    delay_ms: u32,
    state: SwitchState,
}

impl<P, T, C, A> DebouncedSwitch<P, T, C, A>
where
    P: SwitchInput,
    T: OneShotTimer,
    A: Copy,
{
    /// Take ownership of `pin` and `timer`. The raw interrupt is enabled
    /// only while a callback is bound.
    pub fn new(pin: P, timer: T, binding: Option<Binding<C, A>>, delay_ms: u32) -> Self {
        let mut switch = Self {
            pin,
            timer,
            binding: None,
            delay_ms,
            state: SwitchState::Idle,
        };
        switch.rebind(binding);
        switch
    }

    /// Raw edge handler.
    ///
    /// Masks the raw interrupt so contact bounce cannot re-enter, then
    /// opens the debounce window. Returns `false` if the edge was ignored.
    pub fn on_edge(&mut self) -> bool {
        if self.state == SwitchState::Debouncing || self.binding.is_none() {
            return false;
        }
        self.pin.set_edge_interrupt(false);
        self.timer.start(self.delay_ms);
        self.state = SwitchState::Debouncing;
        true
    }

    /// Timer expiry handler: sample the pin and enqueue on a real press.
    ///
    /// The raw interrupt is re-armed afterwards whatever the outcome, as
    /// long as a callback is still bound.
    pub fn on_timer_expired<const N: usize>(&mut self, queue: &DispatchQueue<C, A, N>) -> Outcome {
        if self.state != SwitchState::Debouncing {
            return Outcome::Stale;
        }
        self.state = SwitchState::Idle;

        let outcome = match self.binding {
            Some(binding) if self.pin.is_asserted() => match queue.schedule(binding) {
                Ok(()) => Outcome::Dispatched,
                Err(e) => {
                    warn!("debounce: press dropped: {:?}", e);
                    Outcome::QueueFull
                }
            },
            _ => Outcome::Rejected,
        };

        self.pin.set_edge_interrupt(self.binding.is_some());
        outcome
    }

    /// Replace callback and argument. Cancels an open debounce window first,
    /// so the previous callback can no longer be dispatched by it.
    pub fn rebind(&mut self, binding: Option<Binding<C, A>>) {
        self.timer.cancel();
        self.pin.set_edge_interrupt(false);
        self.state = SwitchState::Idle;
        self.binding = binding;
        self.pin.set_edge_interrupt(self.binding.is_some());
    }

    pub fn state(&self) -> SwitchState {
        self.state
    }

    pub fn delay_ms(&self) -> u32 {
        self.delay_ms
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Split borrow of the pin and timer, for drivers that wait on them.
    pub fn io(&mut self) -> (&mut P, &mut T) {
        (&mut self.pin, &mut self.timer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Pin {
        level: bool,
        irq: bool,
        irq_writes: usize,
    }

    impl SwitchInput for Pin {
        fn is_asserted(&mut self) -> bool {
            self.level
        }

        fn set_edge_interrupt(&mut self, enabled: bool) {
            self.irq = enabled;
            self.irq_writes += 1;
        }
    }

    #[derive(Default)]
    struct Timer {
        armed: Option<u32>,
        starts: usize,
    }

    impl OneShotTimer for Timer {
        fn start(&mut self, delay_ms: u32) {
            self.armed = Some(delay_ms);
            self.starts += 1;
        }

        fn cancel(&mut self) {
            self.armed = None;
        }
    }

    #[derive(Default)]
    struct Ctx {
        hits: [u32; 2],
    }

    fn hit(ctx: &mut Ctx, which: usize) {
        ctx.hits[which] += 1;
    }

    type Switch = DebouncedSwitch<Pin, Timer, Ctx, usize>;

    fn switch(delay: u32) -> Switch {
        DebouncedSwitch::new(Pin::default(), Timer::default(), Some(Binding::new(hit, 0)), delay)
    }

    #[test]
    fn new_switch_is_armed_when_bound() {
        let mut sw = switch(50);
        assert_eq!(sw.state(), SwitchState::Idle);
        assert!(sw.io().0.irq);

        let mut unbound: Switch = DebouncedSwitch::new(Pin::default(), Timer::default(), None, 50);
        assert!(!unbound.io().0.irq);
        assert!(!unbound.on_edge());
    }

    #[test]
    fn edge_masks_interrupt_and_starts_timer() {
        let mut sw = switch(50);
        assert!(sw.on_edge());
        assert_eq!(sw.state(), SwitchState::Debouncing);
        let (pin, timer) = sw.io();
        assert!(!pin.irq);
        assert_eq!(timer.armed, Some(50));
    }

    #[test]
    fn edges_inside_window_are_coalesced() {
        let mut sw = switch(50);
        assert!(sw.on_edge());
        assert!(!sw.on_edge());
        assert!(!sw.on_edge());
        assert_eq!(sw.io().1.starts, 1);
    }

    #[test]
    fn held_press_dispatches_once_and_rearms() {
        let queue: DispatchQueue<Ctx, usize, 4> = DispatchQueue::new();
        let mut sw = switch(50);
        sw.on_edge();
        sw.io().0.level = true;

        assert_eq!(sw.on_timer_expired(&queue), Outcome::Dispatched);
        assert!(sw.io().0.irq);
        assert_eq!(queue.len(), 1);

        let mut ctx = Ctx::default();
        assert_eq!(queue.drain(&mut ctx), 1);
        assert_eq!(ctx.hits, [1, 0]);
        assert!(queue.is_empty());
    }

    #[test]
    fn released_press_is_rejected_and_rearms() {
        let queue: DispatchQueue<Ctx, usize, 4> = DispatchQueue::new();
        let mut sw = switch(50);
        sw.on_edge();

        assert_eq!(sw.on_timer_expired(&queue), Outcome::Rejected);
        assert!(queue.is_empty());
        assert!(sw.io().0.irq);
        assert_eq!(sw.state(), SwitchState::Idle);
    }

    #[test]
    fn expiry_without_window_is_stale() {
        let queue: DispatchQueue<Ctx, usize, 4> = DispatchQueue::new();
        let mut sw = switch(50);
        sw.io().0.level = true;
        assert_eq!(sw.on_timer_expired(&queue), Outcome::Stale);
        assert!(queue.is_empty());
    }

    #[test]
    fn rebind_cancels_pending_window() {
        let queue: DispatchQueue<Ctx, usize, 4> = DispatchQueue::new();
        let mut sw = switch(50);
        sw.on_edge();
        sw.io().0.level = true;

        sw.rebind(Some(Binding::new(hit, 1)));
        assert_eq!(sw.io().1.armed, None);
        assert!(sw.io().0.irq);

        // A late expiry from the cancelled window must not dispatch anything.
        assert_eq!(sw.on_timer_expired(&queue), Outcome::Stale);

        // The next press goes to the new callback.
        sw.on_edge();
        assert_eq!(sw.on_timer_expired(&queue), Outcome::Dispatched);
        let mut ctx = Ctx::default();
        queue.drain(&mut ctx);
        assert_eq!(ctx.hits, [0, 1]);
    }

    #[test]
    fn unbinding_leaves_interrupt_disabled() {
        let mut sw = switch(50);
        sw.on_edge();
        sw.rebind(None);
        assert!(!sw.is_bound());
        assert!(!sw.io().0.irq);
        assert_eq!(sw.state(), SwitchState::Idle);
    }

    #[test]
    fn full_queue_drops_press_but_rearms() {
        let queue: DispatchQueue<Ctx, usize, 1> = DispatchQueue::new();
        let mut sw = switch(50);
        sw.io().0.level = true;

        sw.on_edge();
        assert_eq!(sw.on_timer_expired(&queue), Outcome::Dispatched);
        sw.on_edge();
        assert_eq!(sw.on_timer_expired(&queue), Outcome::QueueFull);
        assert!(sw.io().0.irq);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn schedule_reports_queue_full() {
        let queue: DispatchQueue<Ctx, usize, 1> = DispatchQueue::new();
        assert_eq!(queue.schedule(Binding::new(hit, 0)), Ok(()));
        assert_eq!(queue.schedule(Binding::new(hit, 1)), Err(Error::QueueFull));

        let mut ctx = Ctx::default();
        queue.drain(&mut ctx);
        assert_eq!(ctx.hits, [1, 0]);
    }
}
