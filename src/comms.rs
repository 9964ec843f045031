/// Refer to datasheet:
/// https://datasheet.lcsc.com/lcsc/1912111437_Winbond-Elec-W25Q128JVSIQ_C113767.pdf
use crate::config::BusyPoll;
use crate::error::Error;
use crate::identification::JedecId;
use crate::traits::HardwareFlashDevice;
use bitflags::bitflags;
use core::fmt::Debug;
use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{Operation, SpiDevice};

pub struct FlashSpi<SPI, D> {
    spi: SPI,
    delay: D,
    busy_poll: BusyPoll,
}

impl<SPI, D> Debug for FlashSpi<SPI, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "FlashSPI")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Read 8-bit manufacturer ID, memory type and capacity.
    ReadJedecId = 0x9F,
    /// Set the write enable latch.
    WriteEnable = 0x06,
    /// Read the 8-bit status register.
    ReadStatus = 0x05,
    Read = 0x03,
    /// Read with one dummy byte after the address, for higher clock rates.
    FastRead = 0x0B,
    PageProg = 0x02,
    SectorErase = 0x20,
}

bitflags! {
    /// Status register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u8 {
        /// Erase or write in progress.
        const BUSY = 1 << 0;
        /// Status of the **W**rite **E**nable **L**atch.
        const WEL = 1 << 1;
        /// The 3 protection region bits.
        const PROT = 0b00011100;
        /// **S**tatus **R**egister **W**rite **D**isable bit.
        const SRWD = 1 << 7;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Status {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Status({=u8:#x})", self.bits())
    }
}

/// Opcode followed by a 24-bit address, most significant byte first.
fn address_command(opcode: Opcode, addr: u32) -> [u8; 4] {
    [opcode as u8, (addr >> 16) as u8, (addr >> 8) as u8, addr as u8]
}

impl<SPI, D> HardwareFlashDevice for FlashSpi<SPI, D>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    type Error = Error<SPI>;
    /// From datasheet section 8.2.6 (Read Data (03h))
    /// Reads flash contents into `buf`, starting at `addr`.
    ///
    /// Note that `addr` is not fully decoded: Flash chips will typically only
    /// look at the lowest `N` bits needed to encode their size, which means
    /// that the contents are "mirrored" to addresses that are a multiple of the
    /// flash size. Only 24 bits of `addr` are transferred to the device in any
    /// case, limiting the maximum size of 25-series SPI flash chips to 16 MiB.
    ///
    /// The read is not bounded by page or sector: the device keeps
    /// incrementing the address for as long as the clock runs.
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Error<SPI>> {
        self.spi
            .transaction(&mut [
                Operation::Write(&address_command(Opcode::Read, addr)),
                Operation::Read(buf),
            ])
            .map_err(Error::Spi)
    }

    /// Sector erase (see datasheet 8.2.15)
    /// The Sector Erase instruction sets all memory within a specified sector
    /// (4K-bytes) to the erased state of all 1s (FFh). A Write Enable instruction
    /// must be executed before the device will accept the Sector Erase Instruction
    /// (Status Register bit WEL must equal 1). The device ignores the low 12
    /// address bits, so any address inside the sector erases all of it.
    fn sector_erase(&mut self, addr: u32) -> Result<(), Error<SPI>> {
        self.write_enable()?;
        self.command(&address_command(Opcode::SectorErase, addr))?;
        self.wait_ready()
    }

    /// From datasheet section 8.2.13
    /// The Page Program instruction allows from one byte to 256 bytes (a page) of data
    /// to be programmed at previously erased (FFh) memory locations. A Write Enable
    /// instruction must be executed before the device will accept the Page Program
    /// Instruction (Status Register bit WEL= 1). The /CS pin must be held low for
    /// the entire length of the instruction while data is being sent to the device.
    ///
    /// `data` is sent as is: keeping it within one page is up to the caller,
    /// since the device wraps around to the start of the page past its end.
    fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<(), Error<SPI>> {
        self.write_enable()?;
        self.spi
            .transaction(&mut [
                Operation::Write(&address_command(Opcode::PageProg, addr)),
                Operation::Write(data),
            ])
            .map_err(Error::Spi)?;
        self.wait_ready()
    }
}

impl<SPI, D> FlashSpi<SPI, D>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    /// Takes ownership of the bus and waits for any operation left running
    /// from before a reset to finish.
    pub fn init(spi: SPI, delay: D, busy_poll: BusyPoll) -> Result<Self, Error<SPI>> {
        let mut this = Self {
            spi,
            delay,
            busy_poll,
        };
        let status = this.read_status()?;
        if status.contains(Status::BUSY) {
            flash_log!(warn, "Flash is not ready: {}. Waiting...", status.bits());
            this.wait_ready()?;
        }
        flash_log!(debug, "Initial status: {}", status.bits());
        Ok(this)
    }

    pub fn release(self) -> (SPI, D) {
        (self.spi, self.delay)
    }

    pub fn is_busy(&mut self) -> Result<bool, Error<SPI>> {
        let status = self.read_status()?;
        Ok(status.contains(Status::BUSY))
    }

    pub fn is_wel(&mut self) -> Result<bool, Error<SPI>> {
        let status = self.read_status()?;
        Ok(status.contains(Status::WEL))
    }

    /// Writes a command to the SPI bus
    fn command(&mut self, bytes: &[u8]) -> Result<(), Error<SPI>> {
        self.spi
            .transaction(&mut [Operation::Write(bytes)])
            .map_err(Error::Spi)?;
        Ok(())
    }

    /// Writes a command to the SPI bus, then clocks in `response.len()` bytes
    /// within the same chip-select window.
    fn command_with_response(
        &mut self,
        instruction: &[u8],
        response: &mut [u8],
    ) -> Result<(), Error<SPI>> {
        self.spi
            .transaction(&mut [Operation::Write(instruction), Operation::Read(response)])
            .map_err(Error::Spi)?;
        Ok(())
    }

    /// Reads the status register.
    pub fn read_status(&mut self) -> Result<Status, Error<SPI>> {
        let mut response = [0u8; 1];
        self.command_with_response(&[Opcode::ReadStatus as u8], &mut response)?;
        Ok(Status::from_bits_truncate(response[0]))
    }

    /// Reads the JEDEC manufacturer/device identification.
    pub fn read_jedec_id(&mut self) -> Result<JedecId, Error<SPI>> {
        let mut response = [0u8; 3];
        self.command_with_response(&[Opcode::ReadJedecId as u8], &mut response)?;
        Ok(JedecId::new(response))
    }

    /// Fast Read (0Bh), datasheet section 8.2.7.
    /// Same data as [`HardwareFlashDevice::read`], with eight dummy clocks
    /// between the address and the first data byte.
    pub fn read_fast(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Error<SPI>> {
        let [op, a2, a1, a0] = address_command(Opcode::FastRead, addr);
        self.command_with_response(&[op, a2, a1, a0, 0x00], buf)
    }

    /// Polls the status register until the busy bit clears, giving up after
    /// `busy_poll.max_polls` reads (at least one).
    pub fn wait_ready(&mut self) -> Result<(), Error<SPI>> {
        let BusyPoll {
            max_polls,
            interval_us,
        } = self.busy_poll;
        let max_polls = max_polls.max(1);
        for _ in 0..max_polls {
            if !self.read_status()?.contains(Status::BUSY) {
                return Ok(());
            }
            self.delay.delay_us(interval_us);
        }
        flash_log!(error, "Flash still busy after {} status reads", max_polls);
        Err(Error::BusyTimeout { polls: max_polls })
    }

    /// From datasheet section 8.2.1
    /// The Write Enable instruction sets the Write Enable Latch (WEL) bit
    /// in the Status Register to a 1. The WEL bit must be set prior to every Page Program,
    /// Sector Erase, Block Erase, Chip Erase and Write Status Register instruction,
    /// and the device clears it again once each of those completes.
    pub fn write_enable(&mut self) -> Result<(), Error<SPI>> {
        let cmd_buf = [Opcode::WriteEnable as u8];
        self.command(&cmd_buf)?;
        Ok(())
    }
}
