//! The whole run: identify the flash, program and verify the image, then
//! start the target core.
use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;

use crate::comms::FlashSpi;
use crate::config::{LoaderConfig, MUX_CONTROL_ADDRESS, SPI_BASE};
use crate::error::Error;
use crate::program::{ProgramError, ProgramReport, Programmer};
use crate::release::{CoreRelease, MmioControl};
use crate::traits::{ControlRegister, RegisterAccess};
use crate::transport::{AxiQuadSpi, Mmio, SlaveSelectDevice};

pub struct Loader<SPI, D, C, RD> {
    programmer: Programmer<FlashSpi<SPI, D>>,
    release: CoreRelease<C, RD>,
    config: LoaderConfig,
}

impl<SPI, D, C, RD> core::fmt::Debug for Loader<SPI, D, C, RD> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Loader")
            .field("config", &self.config)
            .finish()
    }
}

impl<SPI, D, C, RD> Loader<SPI, D, C, RD>
where
    SPI: SpiDevice,
    D: DelayNs,
    C: ControlRegister,
    RD: DelayNs,
{
    pub fn new(flash: FlashSpi<SPI, D>, release: CoreRelease<C, RD>, config: LoaderConfig) -> Self {
        Self {
            programmer: Programmer::new(flash),
            release,
            config,
        }
    }

    /// Programs `image` from address 0 and, only if every byte verified,
    /// runs the release sequence. The caller idles afterwards
    /// (see [`crate::release::park`]).
    pub fn run(&mut self, image: &[u8]) -> Result<ProgramReport, ProgramError<Error<SPI>>> {
        flash_log!(info, "Programming the winbond chip...");
        let id = self
            .programmer
            .flash()
            .read_jedec_id()
            .map_err(ProgramError::Flash)?;
        let [manufacturer, memory_type, capacity] = id.bytes();
        flash_log!(
            info,
            "JEDEC ID = {:#x} {:#x} {:#x}",
            manufacturer,
            memory_type,
            capacity
        );
        if !id.is_winbond() {
            flash_log!(warn, "Not a Winbond part, continuing anyway");
        }
        if let Some(bytes) = id.capacity_bytes() {
            self.programmer.set_capacity(bytes as usize);
        }

        let report = self.programmer.program(image, self.config.reverify)?;
        flash_log!(info, "Done!");
        self.release.release();
        Ok(report)
    }

    pub fn release(self) -> (FlashSpi<SPI, D>, CoreRelease<C, RD>) {
        (self.programmer.release(), self.release)
    }
}

impl<R, D, C> Loader<SlaveSelectDevice<R, D>, D, C, D>
where
    R: RegisterAccess,
    D: DelayNs + Clone,
    C: ControlRegister,
{
    /// Brings up the SPI controller behind `regs` and wires the flash on
    /// `config.slave` to a loader that releases the core through `control`.
    pub fn with_controller(
        regs: R,
        control: C,
        delay: D,
        config: LoaderConfig,
    ) -> Result<Self, Error<SlaveSelectDevice<R, D>>> {
        let bus = AxiQuadSpi::init(regs, config.fifo_poll_limit);
        let device = SlaveSelectDevice::new(bus, delay.clone(), config.slave);
        let flash = FlashSpi::init(device, delay.clone(), config.busy_poll)?;
        let release = CoreRelease::new(control, delay, config.release_hold_us);
        Ok(Self::new(flash, release, config))
    }
}

impl<D: DelayNs + Clone> Loader<SlaveSelectDevice<Mmio, D>, D, MmioControl, D> {
    /// Loader on the fixed peripheral addresses of the board.
    ///
    /// # Safety
    ///
    /// The SPI controller at [`SPI_BASE`] and the control word at
    /// [`MUX_CONTROL_ADDRESS`] must be mapped, and nothing else may touch
    /// them while the loader lives.
    pub unsafe fn on_board(
        delay: D,
        config: LoaderConfig,
    ) -> Result<Self, Error<SlaveSelectDevice<Mmio, D>>> {
        Self::with_controller(
            Mmio::new(SPI_BASE),
            MmioControl::new(MUX_CONTROL_ADDRESS),
            delay,
            config,
        )
    }
}
