pub trait HardwareFlashDevice {
    type Error;

    /// Reads flash contents into `buf`, starting at `addr`.
    fn read(&mut self, addr: u32, data: &mut [u8]) -> Result<(), Self::Error>;

    /// The Sector Erase instruction sets all memory within a specified sector
    /// to the erased state of all 1s (FFh). Returns once the device is idle again.
    fn sector_erase(&mut self, addr: u32) -> Result<(), Self::Error>;

    /// The Page Program instruction allows from one byte to 256 bytes (a page) of data
    /// to be programmed at previously erased (FFh) memory locations. Returns once
    /// the device is idle again.
    fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<(), Self::Error>;
}

/// 32-bit register file of a memory-mapped peripheral, addressed by byte offset.
pub trait RegisterAccess {
    fn read(&mut self, offset: usize) -> u32;
    fn write(&mut self, offset: usize, value: u32);
}

/// The word that multiplexes the SPI bus and holds the target core in reset.
pub trait ControlRegister {
    fn write_control(&mut self, value: u32);
}
