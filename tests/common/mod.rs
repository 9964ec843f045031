//! A W25 flash simulator with two front ends: an `SpiDevice` for the command
//! layer, and a model of the AXI Quad SPI register file for the full stack.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{ErrorType, Operation, SpiDevice};
use winbond_w25_core_loader::transport::{
    ControllerStatus, CONTROL, RX_DATA, SLAVE_SELECT, STATUS, TX_DATA,
};
use winbond_w25_core_loader::{ControlRegister, RegisterAccess, PAGE_SIZE, SECTOR_SIZE};

/// One completed command, as the chip saw it when chip-select went high.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashOp {
    ReadId,
    ReadStatus,
    WriteEnable,
    Erase(u32),
    Program(u32, usize),
    Read(u32, usize),
    FastRead(u32, usize),
    /// A modifying command sent without the write enable latch set.
    Ignored(u8),
}

pub struct W25Model {
    pub memory: Vec<u8>,
    pub jedec: [u8; 3],
    pub ops: Vec<FlashOp>,
    /// Status reads that report busy after each erase or program.
    pub busy_reads: u32,
    /// Address whose lowest bit refuses to program.
    pub stuck_bit: Option<usize>,
    wel: bool,
    busy_left: u32,
    frame: Vec<u8>,
}

impl W25Model {
    pub fn new(size: usize) -> Self {
        Self {
            // Not erased: leftovers from whatever was there before.
            memory: (0..size).map(|i| (i % 13) as u8).collect(),
            jedec: [0xEF, 0x40, 0x16],
            ops: Vec::new(),
            busy_reads: 2,
            stuck_bit: None,
            wel: false,
            busy_left: 0,
            frame: Vec::new(),
        }
    }

    pub fn erases(&self) -> Vec<u32> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                FlashOp::Erase(addr) => Some(*addr),
                _ => None,
            })
            .collect()
    }

    pub fn programs(&self) -> Vec<(u32, usize)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                FlashOp::Program(addr, len) => Some((*addr, *len)),
                _ => None,
            })
            .collect()
    }

    fn status(&mut self) -> u8 {
        let mut status = 0;
        if self.busy_left > 0 {
            self.busy_left -= 1;
            status |= 0x01;
        }
        if self.wel {
            status |= 0x02;
        }
        status
    }

    fn address(&self) -> usize {
        (usize::from(self.frame[1]) << 16 | usize::from(self.frame[2]) << 8 | usize::from(self.frame[3]))
            % self.memory.len()
    }

    pub fn select(&mut self) {
        self.frame.clear();
    }

    pub fn exchange(&mut self, mosi: u8) -> u8 {
        self.frame.push(mosi);
        let index = self.frame.len() - 1;
        match self.frame[0] {
            0x9F if (1..=3).contains(&index) => self.jedec[index - 1],
            0x05 if index >= 1 => self.status(),
            0x03 if index >= 4 => {
                let addr = (self.address() + index - 4) % self.memory.len();
                self.memory[addr]
            }
            0x0B if index >= 5 => {
                let addr = (self.address() + index - 5) % self.memory.len();
                self.memory[addr]
            }
            _ => 0xFF,
        }
    }

    pub fn deselect(&mut self) {
        let Some(&opcode) = self.frame.first() else {
            return;
        };
        let op = match opcode {
            0x9F => FlashOp::ReadId,
            0x05 => FlashOp::ReadStatus,
            0x06 => {
                self.wel = true;
                FlashOp::WriteEnable
            }
            0x20 | 0x02 if !self.wel || self.frame.len() < 4 => FlashOp::Ignored(opcode),
            0x20 => {
                let start = self.address() & !(SECTOR_SIZE - 1);
                self.memory[start..start + SECTOR_SIZE].fill(0xFF);
                self.finish_modify();
                FlashOp::Erase(self.address() as u32)
            }
            0x02 => {
                let addr = self.address();
                let page = addr & !(PAGE_SIZE - 1);
                let data = self.frame[4..].to_vec();
                for (i, byte) in data.iter().enumerate() {
                    let cell = page + (addr - page + i) % PAGE_SIZE;
                    let mut value = *byte;
                    if self.stuck_bit == Some(cell) {
                        value |= 0x01;
                    }
                    self.memory[cell] &= value;
                }
                self.finish_modify();
                FlashOp::Program(addr as u32, data.len())
            }
            0x03 => FlashOp::Read(self.address() as u32, self.frame.len() - 4),
            0x0B => FlashOp::FastRead(self.address() as u32, self.frame.len() - 5),
            other => FlashOp::Ignored(other),
        };
        self.ops.push(op);
    }

    fn finish_modify(&mut self) {
        self.wel = false;
        self.busy_left = self.busy_reads;
    }
}

/// The model behind an `SpiDevice`, one chip-select window per transaction.
pub struct SimSpi {
    pub model: W25Model,
}

impl SimSpi {
    pub fn new(size: usize) -> Self {
        Self {
            model: W25Model::new(size),
        }
    }
}

impl ErrorType for SimSpi {
    type Error = Infallible;
}

impl SpiDevice for SimSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
        self.model.select();
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    for byte in bytes.iter() {
                        self.model.exchange(*byte);
                    }
                }
                Operation::Read(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = self.model.exchange(0x00);
                    }
                }
                Operation::Transfer(read, write) => {
                    for i in 0..read.len().max(write.len()) {
                        let incoming = self.model.exchange(write.get(i).copied().unwrap_or(0));
                        if let Some(slot) = read.get_mut(i) {
                            *slot = incoming;
                        }
                    }
                }
                Operation::TransferInPlace(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = self.model.exchange(*byte);
                    }
                }
                Operation::DelayNs(_) => {}
            }
        }
        self.model.deselect();
        Ok(())
    }
}

/// The AXI Quad SPI register file with the flash wired to slave 0.
pub struct SimRegisters {
    pub model: W25Model,
    pub control_writes: Vec<u32>,
    ssr: u32,
    rx: VecDeque<u8>,
}

impl SimRegisters {
    pub fn new(size: usize) -> Self {
        Self {
            model: W25Model::new(size),
            control_writes: Vec::new(),
            ssr: 0xFFFF_FFFF,
            rx: VecDeque::new(),
        }
    }

    fn selected(&self) -> bool {
        self.ssr & 1 == 0
    }
}

impl RegisterAccess for SimRegisters {
    fn read(&mut self, offset: usize) -> u32 {
        match offset {
            STATUS if self.rx.is_empty() => ControllerStatus::RX_EMPTY.bits(),
            STATUS => 0,
            RX_DATA => self.rx.pop_front().map(u32::from).unwrap_or(0),
            SLAVE_SELECT => self.ssr,
            _ => 0,
        }
    }

    fn write(&mut self, offset: usize, value: u32) {
        match offset {
            CONTROL => self.control_writes.push(value),
            TX_DATA => {
                let miso = if self.selected() {
                    self.model.exchange(value as u8)
                } else {
                    0xFF
                };
                self.rx.push_back(miso);
            }
            SLAVE_SELECT => {
                let was_selected = self.selected();
                self.ssr = value;
                match (was_selected, self.selected()) {
                    (false, true) => self.model.select(),
                    (true, false) => self.model.deselect(),
                    _ => {}
                }
            }
            _ => {}
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingControl {
    pub writes: Vec<u32>,
}

impl ControlRegister for RecordingControl {
    fn write_control(&mut self, value: u32) {
        self.writes.push(value);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Deterministic, non-repeating-per-page test image.
pub fn image(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i ^ (i >> 8)) as u8 ^ 0x5A).collect()
}
