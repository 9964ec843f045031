/// The three bytes returned by Read JEDEC ID (9Fh).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct JedecId([u8; 3]);

/// Winbond's JEDEC manufacturer code.
pub const WINBOND: u8 = 0xEF;

impl JedecId {
    pub const fn new(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 3] {
        self.0
    }

    pub const fn manufacturer(&self) -> u8 {
        self.0[0]
    }

    pub const fn memory_type(&self) -> u8 {
        self.0[1]
    }

    pub const fn capacity_code(&self) -> u8 {
        self.0[2]
    }

    /// Density in bytes, encoded by 25-series parts as a power of two.
    /// `None` for codes that do not follow that convention (e.g. an
    /// unconnected bus reading back `FF`).
    pub fn capacity_bytes(&self) -> Option<u32> {
        match self.capacity_code() {
            code @ 0x10..=0x1F => Some(1 << code),
            _ => None,
        }
    }

    pub fn is_winbond(&self) -> bool {
        self.manufacturer() == WINBOND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn w25q128_fields() {
        let id = JedecId::new([0xEF, 0x40, 0x18]);
        assert!(id.is_winbond());
        assert_eq!(id.memory_type(), 0x40);
        assert_eq!(id.capacity_bytes(), Some(16 * 1024 * 1024));
    }

    #[test]
    fn floating_bus_has_no_capacity() {
        let id = JedecId::new([0xFF; 3]);
        assert!(!id.is_winbond());
        assert_eq!(id.capacity_bytes(), None);
    }

    #[test]
    fn capacity_code_range_ends_at_1f() {
        assert_eq!(JedecId::new([0xEF, 0x40, 0x1F]).capacity_bytes(), Some(1 << 31));
        assert_eq!(JedecId::new([0xEF, 0x40, 0x20]).capacity_bytes(), None);
        assert_eq!(JedecId::new([0xEF, 0x40, 0x0F]).capacity_bytes(), None);
    }
}
