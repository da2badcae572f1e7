//! Debounced limit switches
//!
//! The oscillation axis uses normally-closed switches wired to ground with
//! a pull-up, so a broken wire looks like a pressed switch. A press pulls
//! the line low in the configured polarity; `inverted` flips that for
//! switches wired the other way round.

use fairfan_hal::InputPin;

/// Stable-for-N-milliseconds filter
///
/// The debounced state only follows the raw level once the raw level has
/// held for `window_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Debouncer {
    window_ms: u32,
    stable: bool,
    candidate: bool,
    since_ms: u32,
}

impl Debouncer {
    pub fn new(window_ms: u32, initial: bool) -> Self {
        Self {
            window_ms,
            stable: initial,
            candidate: initial,
            since_ms: 0,
        }
    }

    /// Feed a raw sample taken at `now_ms`
    ///
    /// Returns the debounced state.
    pub fn update(&mut self, raw: bool, now_ms: u32) -> bool {
        if raw != self.candidate {
            self.candidate = raw;
            self.since_ms = now_ms;
        }
        if self.candidate != self.stable && now_ms.wrapping_sub(self.since_ms) >= self.window_ms {
            self.stable = self.candidate;
        }
        self.stable
    }

    pub fn state(&self) -> bool {
        self.stable
    }
}

/// Debounced switch on an input pin
pub struct LimitSwitch<P> {
    pin: P,
    inverted: bool,
    debouncer: Debouncer,
}

impl<P: InputPin> LimitSwitch<P> {
    /// Switch that reads pressed when the line is low
    pub fn new(pin: P, debounce_ms: u32) -> Self {
        Self::with_polarity(pin, false, debounce_ms)
    }

    /// `inverted` makes a high line read as pressed
    pub fn with_polarity(pin: P, inverted: bool, debounce_ms: u32) -> Self {
        let mut switch = Self {
            pin,
            inverted,
            debouncer: Debouncer::new(debounce_ms, false),
        };
        let initial = switch.raw_pressed();
        switch.debouncer = Debouncer::new(debounce_ms, initial);
        switch
    }

    /// Undebounced level, polarity applied
    pub fn raw_pressed(&self) -> bool {
        self.pin.is_low() != self.inverted
    }

    /// Sample the pin and return the debounced state
    pub fn poll(&mut self, now_ms: u32) -> bool {
        let raw = self.raw_pressed();
        self.debouncer.update(raw, now_ms)
    }

    /// Debounced state as of the last poll
    pub fn is_pressed(&self) -> bool {
        self.debouncer.state()
    }
}
