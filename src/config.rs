/// Largest number of bytes a single Page Program (02h) may carry.
pub const PAGE_SIZE: usize = 256;
/// Sector Erase (20h) granularity.
pub const SECTOR_SIZE: usize = 4096;
pub const PAGES_PER_SECTOR: usize = SECTOR_SIZE / PAGE_SIZE;
/// Three address bytes are sent with every command, so 16 MiB is addressable.
pub const ADDRESS_SPACE: usize = 1 << 24;

/// AXI Lite base address of the Quad SPI controller.
pub const SPI_BASE: usize = 0x44A0_0000;
/// Bus-mux / core-reset control word.
pub const MUX_CONTROL_ADDRESS: usize = 0x4001_0000;
/// Slave-select line the flash is wired to.
pub const FLASH_SLAVE: u8 = 0;

/// How long to wait for the flash to clear its busy bit.
///
/// Both erase and program finish in the millisecond range on a W25Q, so the
/// defaults allow a sector erase (400 ms worst case per datasheet) with margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusyPoll {
    /// Status reads before giving up with [`crate::Error::BusyTimeout`].
    pub max_polls: u32,
    /// Pause between two status reads.
    pub interval_us: u32,
}

impl BusyPoll {
    pub const fn new() -> Self {
        Self {
            max_polls: 100_000,
            interval_us: 10,
        }
    }
}

impl Default for BusyPoll {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoaderConfig {
    /// Status register reads allowed while waiting on a TX or RX FIFO.
    pub fifo_poll_limit: u32,
    pub busy_poll: BusyPoll,
    /// Time each release-sequence value is held on the mux control word.
    pub release_hold_us: u32,
    pub slave: u8,
    /// Read the whole image back once more after programming it.
    pub reverify: bool,
}

impl LoaderConfig {
    pub const fn new() -> Self {
        Self {
            fifo_poll_limit: 10_000,
            busy_poll: BusyPoll::new(),
            release_hold_us: 10,
            slave: FLASH_SLAVE,
            reverify: false,
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self::new()
    }
}
