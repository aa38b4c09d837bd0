#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, Operation, SevenBitAddress};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusError;

impl i2c::Error for BusError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Debug)]
pub struct Bus {
    pub address: Option<u8>,
    pub regs: [u8; 256],
    /// Register writes in order
    pub writes: Vec<(u8, u8)>,
    pub fail: bool,
}

/// Register file behind a fake I2C bus, shared with the test
#[derive(Clone)]
pub struct MockI2c {
    pub bus: Rc<RefCell<Bus>>,
}

impl MockI2c {
    pub fn new() -> Self {
        Self {
            bus: Rc::new(RefCell::new(Bus {
                address: None,
                regs: [0; 256],
                writes: Vec::new(),
                fail: false,
            })),
        }
    }

    pub fn writes(&self) -> Vec<(u8, u8)> {
        self.bus.borrow().writes.clone()
    }

    pub fn clear(&self) {
        self.bus.borrow_mut().writes.clear();
    }

    pub fn reg(&self, reg: u8) -> u8 {
        self.bus.borrow().regs[reg as usize]
    }

    pub fn set_reg(&self, reg: u8, value: u8) {
        self.bus.borrow_mut().regs[reg as usize] = value;
    }

    pub fn set_fail(&self, fail: bool) {
        self.bus.borrow_mut().fail = fail;
    }

    /// Values written to `reg`, in order
    pub fn writes_to(&self, reg: u8) -> Vec<u8> {
        self.bus
            .borrow()
            .writes
            .iter()
            .filter(|(r, _)| *r == reg)
            .map(|(_, v)| *v)
            .collect()
    }
}

impl ErrorType for MockI2c {
    type Error = BusError;
}

impl I2c<SevenBitAddress> for MockI2c {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut bus = self.bus.borrow_mut();
        if bus.fail {
            return Err(BusError);
        }
        bus.address = Some(address);

        let mut pointer = 0u8;
        for operation in operations {
            match operation {
                Operation::Write(bytes) => match **bytes {
                    [reg] => pointer = reg,
                    [reg, value] => {
                        bus.regs[reg as usize] = value;
                        bus.writes.push((reg, value));
                        pointer = reg;
                    }
                    _ => return Err(BusError),
                },
                Operation::Read(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = bus.regs[pointer as usize];
                        pointer = pointer.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}
