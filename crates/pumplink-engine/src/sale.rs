//! Sale window and preset tracking.
//!
//! All one-shot guards of a sale live in [`SaleWindow`]:
//!
//! | flag                   | set by                      | cleared by                                         |
//! |------------------------|-----------------------------|----------------------------------------------------|
//! | `active`               | entering Authorized/Filling | terminal entry                                     |
//! | `stop_sent`            | auto-stop firing            | new preset, reset-class terminal, STOP not sent    |
//! | `preset_sent`          | preset frame sent           | terminal entry                                     |
//! | `bumped`               | counters bumped             | window open, reset-class terminal                  |
//! | `authorize_after_busy` | `start_fill`                | next Busy, Stop/SwitchOff, failed authorize, fault |
//! | `authorize_pending`    | AUTHORIZE sent              | pump status, Stop/SwitchOff, failed authorize      |
//!
//! The preset guard only holds inside an active window: outside one, a
//! retried fill (for example after a refused AUTHORIZE) sends its preset again.

use pumplink_protocol::{FillRecord, VolumeSample};

/// What closing a window amounts to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SaleOutcome {
    /// First close with a sample: counters must be bumped once.
    Completed { liters: f64, amount: f64 },
    /// The sale ended without any volume sample.
    NoSample,
    /// Counters were already bumped for this sale.
    AlreadyCounted,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaleWindow {
    active: bool,
    has_sample: bool,
    last_liters: f64,
    last_amount: f64,
    preset_target_ml: Option<u32>,
    stop_sent: bool,
    preset_sent: bool,
    bumped: bool,
    authorize_after_busy: bool,
    authorize_pending: bool,
}

impl SaleWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn has_sample(&self) -> bool {
        self.has_sample
    }

    /// Last fill figures, kept after a normal completion.
    pub fn last_fill(&self) -> (f64, f64) {
        (self.last_liters, self.last_amount)
    }

    pub fn preset_target_ml(&self) -> Option<u32> {
        self.preset_target_ml
    }

    pub fn stop_sent(&self) -> bool {
        self.stop_sent
    }

    pub fn preset_sent(&self) -> bool {
        self.preset_sent
    }

    pub fn authorize_after_busy(&self) -> bool {
        self.authorize_after_busy
    }

    pub fn authorize_pending(&self) -> bool {
        self.authorize_pending
    }

    /// Either kind of authorization is still awaited.
    pub fn any_authorize_pending(&self) -> bool {
        self.authorize_after_busy || self.authorize_pending
    }

    /// Enter the sale window. Preset arming made before the window is kept.
    pub fn open(&mut self) {
        self.active = true;
        self.has_sample = false;
        self.last_liters = 0.0;
        self.last_amount = 0.0;
        self.bumped = false;
    }

    /// Arm the auto-stop watch.
    pub fn arm_preset(&mut self, target_ml: u32) {
        self.preset_target_ml = Some(target_ml);
        self.stop_sent = false;
    }

    pub fn disarm_preset(&mut self) {
        self.preset_target_ml = None;
        self.stop_sent = false;
    }

    /// Mark the preset frame as sent. Returns `false` if the window is
    /// active and its preset already went out.
    pub fn mark_preset_sent(&mut self) -> bool {
        if self.active && self.preset_sent {
            return false;
        }
        self.preset_sent = true;
        true
    }

    pub fn defer_authorize(&mut self) {
        self.authorize_after_busy = true;
    }

    /// Consume the deferred AUTHORIZE. Returns `true` exactly once.
    pub fn take_deferred_authorize(&mut self) -> bool {
        std::mem::take(&mut self.authorize_after_busy)
    }

    pub fn mark_authorize_sent(&mut self) {
        self.authorize_pending = true;
    }

    pub fn clear_authorize_pending(&mut self) {
        self.authorize_pending = false;
    }

    /// The auto-stop fired but STOP could not be sent; let the next sample
    /// fire it again.
    pub fn retry_stop(&mut self) {
        self.stop_sent = false;
    }

    pub fn clear_pending(&mut self) {
        self.authorize_after_busy = false;
        self.authorize_pending = false;
    }

    /// Record a live volume sample.
    ///
    /// Returns `true` when the sample reaches the armed preset and no STOP
    /// was sent yet; the STOP guard is set before returning.
    pub fn record_sample(&mut self, sample: &VolumeSample) -> bool {
        self.has_sample = true;
        self.last_liters = sample.liters;
        self.last_amount = sample.amount;

        match self.preset_target_ml {
            Some(target) if !self.stop_sent && sample.reaches(target) => {
                self.stop_sent = true;
                true
            }
            _ => false,
        }
    }

    /// Record a reported fill; not a live sample.
    pub fn record_fill(&mut self, fill: &FillRecord) {
        self.last_liters = fill.liters;
        self.last_amount = fill.amount;
    }

    /// Close the window on terminal entry.
    ///
    /// Returns `None` when no window was open. Reset-class terminals also
    /// clear sample memory and the preset.
    pub fn close(&mut self, reset_class: bool) -> Option<SaleOutcome> {
        let outcome = self.active.then(|| {
            if !self.has_sample {
                SaleOutcome::NoSample
            } else if self.bumped {
                SaleOutcome::AlreadyCounted
            } else {
                self.bumped = true;
                SaleOutcome::Completed {
                    liters: self.last_liters,
                    amount: self.last_amount,
                }
            }
        });

        self.active = false;
        self.preset_sent = false;

        if reset_class {
            self.has_sample = false;
            self.last_liters = 0.0;
            self.last_amount = 0.0;
            self.preset_target_ml = None;
            self.stop_sent = false;
            self.bumped = false;
        }
        outcome
    }
}

/// Liters to the internal milliliter target.
pub fn liters_to_ml(liters: f64) -> u32 {
    (liters * 1000.0).round().max(0.0) as u32
}
