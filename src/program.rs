//! Erase, program and verify a whole image, one sector at a time.
//!
//! Each sector is erased once, right before the first page inside it is
//! written. Every page is read back and compared as soon as it is programmed;
//! the first difference stops the run. Nothing is rolled back on failure, the
//! flash is left exactly as far as the run got.
use crate::config::{ADDRESS_SPACE, PAGE_SIZE, SECTOR_SIZE};
use crate::traits::HardwareFlashDevice;

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProgramError<E> {
    /// The flash driver failed underneath the programmer.
    Flash(E),
    /// Read-back of the page (or re-verified chunk) starting at `address`
    /// differs from the image.
    VerificationMismatch { address: u32 },
    /// The image does not fit the flash.
    ImageTooLarge { len: usize, capacity: usize },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProgramReport {
    pub bytes: usize,
    pub sectors_erased: usize,
    pub pages_programmed: usize,
}

pub struct Programmer<F> {
    flash: F,
    capacity: usize,
    verify: [u8; PAGE_SIZE],
}

impl<F> core::fmt::Debug for Programmer<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Programmer")
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<F: HardwareFlashDevice> Programmer<F> {
    pub fn new(flash: F) -> Self {
        Self {
            flash,
            capacity: ADDRESS_SPACE,
            verify: [0; PAGE_SIZE],
        }
    }

    /// Rejects images larger than `capacity` bytes (clamped to 16 MiB).
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.min(ADDRESS_SPACE);
    }

    pub fn flash(&mut self) -> &mut F {
        &mut self.flash
    }

    pub fn release(self) -> F {
        self.flash
    }

    /// Writes `image` to flash address 0 onwards.
    ///
    /// With `reverify`, the whole image is read back a second time once
    /// every page has passed its own check.
    pub fn program(
        &mut self,
        image: &[u8],
        reverify: bool,
    ) -> Result<ProgramReport, ProgramError<F::Error>> {
        let len = image.len();
        if len > self.capacity {
            flash_log!(error, "Image of {} bytes exceeds flash of {} bytes", len, self.capacity);
            return Err(ProgramError::ImageTooLarge {
                len,
                capacity: self.capacity,
            });
        }

        let mut report = ProgramReport {
            bytes: len,
            ..Default::default()
        };
        for (sector_index, sector) in image.chunks(SECTOR_SIZE).enumerate() {
            let sector_address = sector_index * SECTOR_SIZE;
            flash_log!(info, "Erase sector at address: {:#x}", sector_address as u32);
            self.flash
                .sector_erase(sector_address as u32)
                .map_err(ProgramError::Flash)?;
            report.sectors_erased += 1;

            for (page_index, page) in sector.chunks(PAGE_SIZE).enumerate() {
                let address = sector_address + page_index * PAGE_SIZE;
                flash_log!(
                    debug,
                    "Wrote {} bytes at address: {:#x}, left = {}",
                    page.len(),
                    address as u32,
                    len - address
                );
                self.flash
                    .page_program(address as u32, page)
                    .map_err(ProgramError::Flash)?;
                report.pages_programmed += 1;
                self.verify_chunk(address, page)?;
            }
        }

        if reverify {
            self.reverify(image)?;
        }
        flash_log!(info, "Verification success! All data are same");
        Ok(report)
    }

    /// Reads the full image range back in page-sized chunks.
    pub fn reverify(&mut self, image: &[u8]) -> Result<(), ProgramError<F::Error>> {
        for (index, chunk) in image.chunks(PAGE_SIZE).enumerate() {
            self.verify_chunk(index * PAGE_SIZE, chunk)?;
        }
        Ok(())
    }

    fn verify_chunk(&mut self, address: usize, expected: &[u8]) -> Result<(), ProgramError<F::Error>> {
        let readback = &mut self.verify[..expected.len()];
        // Stale bytes from the previous page must not pass for this one.
        readback.fill(0);
        self.flash
            .read(address as u32, readback)
            .map_err(ProgramError::Flash)?;

        match readback.iter().zip(expected).position(|(got, want)| got != want) {
            None => Ok(()),
            Some(offset) => {
                flash_log!(
                    error,
                    "Verification error at {:#x} (first bad byte at {:#x}: read {:#x}, expected {:#x})",
                    address as u32,
                    (address + offset) as u32,
                    readback[offset],
                    expected[offset]
                );
                Err(ProgramError::VerificationMismatch {
                    address: address as u32,
                })
            }
        }
    }
}
