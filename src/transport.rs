//! Polled driver for the Xilinx AXI Quad SPI controller in standard SPI mode.
//!
//! The controller shifts one byte per write to the transmit FIFO and pushes
//! the byte clocked in at the same time into the receive FIFO, so every
//! exchange is a write followed by a read. Slave select is driven manually
//! through an active-low bitmask.
use core::fmt::Debug;

use bitflags::bitflags;
use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{self, ErrorKind, ErrorType, Operation, SpiBus, SpiDevice};

use crate::traits::RegisterAccess;

pub const CONTROL: usize = 0x60;
pub const STATUS: usize = 0x64;
pub const TX_DATA: usize = 0x68;
pub const RX_DATA: usize = 0x6C;
pub const SLAVE_SELECT: usize = 0x70;

/// Clocked out while only the incoming byte matters.
const DUMMY: u8 = 0x00;

bitflags! {
    /// Control register (+0x60).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Control: u32 {
        const ENABLE = 1 << 1;
        const MASTER = 1 << 2;
        const TX_FIFO_RESET = 1 << 5;
        const RX_FIFO_RESET = 1 << 6;
        const MANUAL_SLAVE_SELECT = 1 << 7;
    }

    /// Status register (+0x64).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControllerStatus: u32 {
        const RX_EMPTY = 1 << 0;
        const TX_FULL = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// The transmit FIFO never drained.
    TxFifoTimeout,
    /// No byte showed up in the receive FIFO.
    RxFifoTimeout,
}

impl spi::Error for TransportError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Register file reached through raw volatile accesses.
pub struct Mmio {
    base: usize,
}

impl Mmio {
    /// # Safety
    ///
    /// `base` must be the address of a mapped peripheral that nothing else
    /// accesses for as long as this value lives.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }
}

impl Debug for Mmio {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Mmio({:#010x})", self.base)
    }
}

impl RegisterAccess for Mmio {
    fn read(&mut self, offset: usize) -> u32 {
        // SAFETY: exclusive access to a mapped peripheral is a precondition of `Mmio::new`.
        unsafe { core::ptr::read_volatile((self.base + offset) as *const u32) }
    }

    fn write(&mut self, offset: usize, value: u32) {
        // SAFETY: as above.
        unsafe { core::ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }
}

pub struct AxiQuadSpi<R> {
    regs: R,
    poll_limit: u32,
}

impl<R> Debug for AxiQuadSpi<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AxiQuadSpi")
            .field("poll_limit", &self.poll_limit)
            .finish()
    }
}

impl<R: RegisterAccess> AxiQuadSpi<R> {
    /// Resets both FIFOs, then enables the controller as master with manual
    /// slave select. `poll_limit` bounds every wait on a FIFO flag; the flag
    /// is always read at least once, so `0` behaves like `1`.
    pub fn init(regs: R, poll_limit: u32) -> Self {
        let mut this = Self { regs, poll_limit };
        this.reset_fifos();
        this
    }

    /// Empties both FIFOs and leaves the controller enabled as master.
    pub fn reset_fifos(&mut self) {
        self.regs.write(
            CONTROL,
            (Control::TX_FIFO_RESET | Control::RX_FIFO_RESET).bits(),
        );
        self.regs.write(
            CONTROL,
            (Control::ENABLE | Control::MASTER | Control::MANUAL_SLAVE_SELECT).bits(),
        );
    }

    pub fn read_status_bits(&mut self) -> ControllerStatus {
        ControllerStatus::from_bits_retain(self.regs.read(STATUS))
    }

    /// Exchanges one byte full-duplex and returns the byte clocked in.
    ///
    /// On a timeout both FIFOs are reset, so a byte that shows up late cannot
    /// shift every later exchange by one.
    pub fn transfer(&mut self, byte: u8) -> Result<u8, TransportError> {
        self.wait_clear(ControllerStatus::TX_FULL, TransportError::TxFifoTimeout)
            .inspect_err(|_| self.reset_fifos())?;
        self.regs.write(TX_DATA, byte as u32);
        self.wait_clear(ControllerStatus::RX_EMPTY, TransportError::RxFifoTimeout)
            .inspect_err(|_| self.reset_fifos())?;
        Ok(self.regs.read(RX_DATA) as u8)
    }

    /// Drives the chip-select line of `slave` low.
    pub fn select(&mut self, slave: u8) {
        let ssr = self.regs.read(SLAVE_SELECT);
        self.regs.write(SLAVE_SELECT, ssr & !slave_mask(slave));
    }

    /// Releases the chip-select line of `slave`.
    pub fn deselect(&mut self, slave: u8) {
        let ssr = self.regs.read(SLAVE_SELECT);
        self.regs.write(SLAVE_SELECT, ssr | slave_mask(slave));
    }

    pub fn release(self) -> R {
        self.regs
    }

    fn wait_clear(
        &mut self,
        flag: ControllerStatus,
        timeout: TransportError,
    ) -> Result<(), TransportError> {
        for _ in 0..self.poll_limit.max(1) {
            if !self.read_status_bits().contains(flag) {
                return Ok(());
            }
        }
        flash_log!(error, "SPI controller stuck, status = {:#x}", self.regs.read(STATUS));
        Err(timeout)
    }
}

fn slave_mask(slave: u8) -> u32 {
    1 << (slave % 32)
}

impl<R> ErrorType for AxiQuadSpi<R> {
    type Error = TransportError;
}

impl<R: RegisterAccess> SpiBus<u8> for AxiQuadSpi<R> {
    fn read(&mut self, words: &mut [u8]) -> Result<(), TransportError> {
        for word in words.iter_mut() {
            *word = AxiQuadSpi::transfer(self, DUMMY)?;
        }
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), TransportError> {
        for &word in words {
            AxiQuadSpi::transfer(self, word)?;
        }
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), TransportError> {
        for i in 0..read.len().max(write.len()) {
            let incoming = AxiQuadSpi::transfer(self, write.get(i).copied().unwrap_or(DUMMY))?;
            if let Some(slot) = read.get_mut(i) {
                *slot = incoming;
            }
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), TransportError> {
        for word in words.iter_mut() {
            *word = AxiQuadSpi::transfer(self, *word)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        // Every exchange already waited for its receive byte.
        Ok(())
    }
}

/// One device on the controller, selected for the length of each transaction.
pub struct SlaveSelectDevice<R, D> {
    bus: AxiQuadSpi<R>,
    delay: D,
    slave: u8,
}

impl<R, D> Debug for SlaveSelectDevice<R, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SlaveSelectDevice")
            .field("slave", &self.slave)
            .finish()
    }
}

impl<R: RegisterAccess, D: DelayNs> SlaveSelectDevice<R, D> {
    pub fn new(bus: AxiQuadSpi<R>, delay: D, slave: u8) -> Self {
        Self { bus, delay, slave }
    }

    pub fn release(self) -> (AxiQuadSpi<R>, D) {
        (self.bus, self.delay)
    }
}

impl<R, D> ErrorType for SlaveSelectDevice<R, D> {
    type Error = TransportError;
}

impl<R: RegisterAccess, D: DelayNs> SpiDevice<u8> for SlaveSelectDevice<R, D> {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), TransportError> {
        self.bus.select(self.slave);
        let result = self.run(operations);
        // Deselect even on failure so the flash drops the partial command.
        self.bus.deselect(self.slave);
        result
    }
}

impl<R: RegisterAccess, D: DelayNs> SlaveSelectDevice<R, D> {
    fn run(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), TransportError> {
        for op in operations {
            match op {
                Operation::Read(buf) => SpiBus::read(&mut self.bus, buf)?,
                Operation::Write(buf) => SpiBus::write(&mut self.bus, buf)?,
                Operation::Transfer(read, write) => SpiBus::transfer(&mut self.bus, read, write)?,
                Operation::TransferInPlace(buf) => SpiBus::transfer_in_place(&mut self.bus, buf)?,
                Operation::DelayNs(ns) => self.delay.delay_ns(*ns),
            }
        }
        Ok(())
    }
}
