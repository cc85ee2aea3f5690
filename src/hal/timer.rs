//! Timing source abstraction
//!
//! Break, mark-after-break and the RDM response/idle windows are all
//! timed by a single one-shot timer per port. This module defines the
//! [`TimingSource`] trait over that timer.
//!
//! Expiry is observed by polling [`TimingSource::poll_expired`]; a
//! hardware implementation latches the expiry flag from its timer ISR
//! so the state machine sees it on the next poll. Arming a new one-shot
//! clears any previously latched expiry.

/// Trait for one-shot microsecond timers.
pub trait TimingSource {
    /// Arm the one-shot to fire after `duration_us` microseconds.
    ///
    /// Re-arming while armed restarts the timer and discards the
    /// previous deadline.
    fn arm_one_shot(&mut self, duration_us: u32);

    /// Cancel the pending one-shot, if any.
    fn cancel(&mut self);

    /// Return `true` once the armed one-shot has fired.
    ///
    /// Consumes the expiry: subsequent calls return `false` until the
    /// timer is armed and fires again.
    fn poll_expired(&mut self) -> bool;
}
