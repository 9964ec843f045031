//! Programs a raw image into a Winbond W25 serial NOR flash through a
//! memory-mapped AXI Quad SPI controller, verifies every page it writes, and
//! then hands the shared SPI bus to a second core that boots from that flash.
//!
//! The layers, leaf first:
//!
//! * [`transport`]: byte exchange and chip-select over the controller registers.
//! * [`comms`]: the W25 command set on top of any [`embedded_hal::spi::SpiDevice`].
//! * [`program`]: the erase / program / verify loop over a whole image.
//! * [`release`]: the bus-mux and reset sequence that starts the target core.
//!
//! [`loader::Loader`] ties them together.
#![cfg_attr(not(test), no_std)]

#[macro_use]
pub mod log;
pub mod comms;
pub mod config;
pub mod error;
pub mod identification;
pub mod loader;
pub mod program;
pub mod release;
pub mod traits;
pub mod transport;

pub use comms::{FlashSpi, Status};
pub use config::{BusyPoll, LoaderConfig, PAGES_PER_SECTOR, PAGE_SIZE, SECTOR_SIZE};
pub use error::Error;
pub use identification::JedecId;
pub use loader::Loader;
pub use program::{ProgramError, ProgramReport, Programmer};
pub use release::CoreRelease;
pub use traits::{ControlRegister, HardwareFlashDevice, RegisterAccess};
pub use transport::{AxiQuadSpi, SlaveSelectDevice, TransportError};
