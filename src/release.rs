//! Hands the shared SPI bus to the target core and lets it out of reset.
use bitflags::bitflags;
use embedded_hal::delay::DelayNs;

use crate::traits::ControlRegister;

bitflags! {
    /// Bus-mux / core-reset control word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MuxControl: u32 {
        /// Set: the target core drives the SPI bus. Clear: the programmer does.
        const BUS_SELECT = 1 << 0;
        /// Set: the target core is held in reset.
        const CORE_RESET = 1 << 1;
    }
}

/// Values written to the control word, in order (1, 3, 2, 3). The mux
/// switches while reset is asserted so neither side drives the bus mid-command.
pub const RELEASE_SEQUENCE: [MuxControl; 4] = [
    MuxControl::BUS_SELECT,
    MuxControl::BUS_SELECT.union(MuxControl::CORE_RESET),
    MuxControl::CORE_RESET,
    MuxControl::BUS_SELECT.union(MuxControl::CORE_RESET),
];

/// Control word reached through a raw volatile store.
#[derive(Debug)]
pub struct MmioControl {
    address: usize,
}

impl MmioControl {
    /// # Safety
    ///
    /// `address` must be the mapped, word-aligned control register and
    /// nothing else may write it while this value lives.
    pub const unsafe fn new(address: usize) -> Self {
        Self { address }
    }
}

impl ControlRegister for MmioControl {
    fn write_control(&mut self, value: u32) {
        // SAFETY: guaranteed by the contract of `MmioControl::new`.
        unsafe { core::ptr::write_volatile(self.address as *mut u32, value) }
    }
}

pub struct CoreRelease<C, D> {
    control: C,
    delay: D,
    hold_us: u32,
}

impl<C, D> core::fmt::Debug for CoreRelease<C, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CoreRelease")
            .field("hold_us", &self.hold_us)
            .finish()
    }
}

impl<C: ControlRegister, D: DelayNs> CoreRelease<C, D> {
    pub fn new(control: C, delay: D, hold_us: u32) -> Self {
        Self {
            control,
            delay,
            hold_us,
        }
    }

    /// Writes [`RELEASE_SEQUENCE`], holding each value for `hold_us`.
    pub fn release(&mut self) {
        flash_log!(info, "Run the core");
        for step in RELEASE_SEQUENCE {
            flash_log!(trace, "mux control <- {}", step.bits());
            self.control.write_control(step.bits());
            self.delay.delay_us(self.hold_us);
        }
    }

    pub fn into_inner(self) -> (C, D) {
        (self.control, self.delay)
    }
}

/// Idles forever once the target core owns the bus.
pub fn park() -> ! {
    loop {
        core::hint::spin_loop();
    }
}
