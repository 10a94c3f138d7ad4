use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::i2c::{self, ErrorKind, NoAcknowledgeSource, Operation, SevenBitAddress};
use log::{error, trace};
use simple_logger::SimpleLogger;
use tca9534::{Address, Config, Register, Tca9534};

// GPIO expander type
pub type GpioExpander = Tca9534<FakeTca9534>;

/// Snapshot of the simulated register file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub input: u8,
    pub output: u8,
    pub inversion: u8,
    pub configuration: u8,
}

struct DeviceState {
    address: u8,
    output: u8,
    inversion: u8,
    configuration: u8,
    // Levels applied from outside on the pins
    lines: u8,
    // Register selected by the last command byte
    pointer: Register,
    fail_next: bool,
}

impl DeviceState {
    fn input(&self) -> u8 {
        // Inputs see the line level (inverted if asked), outputs read back their latch
        let from_lines = (self.lines ^ self.inversion) & self.configuration;
        let from_latch = self.output & !self.configuration;
        from_lines | from_latch
    }

    fn read(&self, register: Register) -> u8 {
        match register {
            Register::Input => self.input(),
            Register::Output => self.output,
            Register::PolarityInversion => self.inversion,
            Register::Configuration => self.configuration,
        }
    }

    fn write(&mut self, register: Register, value: u8) {
        match register {
            Register::Input => {}
            Register::Output => self.output = value,
            Register::PolarityInversion => self.inversion = value,
            Register::Configuration => self.configuration = value,
        }
    }
}

fn register_from_command(command: u8) -> Register {
    match command & 0x03 {
        0x00 => Register::Input,
        0x01 => Register::Output,
        0x02 => Register::PolarityInversion,
        _ => Register::Configuration,
    }
}

/// Fake TCA9534 for the simulator
///
/// Behaves like the device on the I2C bus: the first written byte selects a register, further
/// bytes are written to it, reads return the selected register (no auto-increment).
/// Clones share the same device, so one handle can be given to the driver while another
/// drives the pin levels.
#[derive(Clone)]
pub struct FakeTca9534 {
    state: Rc<RefCell<DeviceState>>,
}

impl FakeTca9534 {
    /// Device in its power-on state at `address`, all lines low
    pub fn new(address: u8) -> Self {
        Self {
            state: Rc::new(RefCell::new(DeviceState {
                address,
                output: 0xFF,
                inversion: 0x00,
                configuration: 0xFF,
                lines: 0x00,
                pointer: Register::Input,
                fail_next: false,
            })),
        }
    }

    /// Drive the external level of every pin
    pub fn set_inputs(&self, levels: u8) {
        self.state.borrow_mut().lines = levels;
    }

    pub fn registers(&self) -> Registers {
        let state = self.state.borrow();
        Registers {
            input: state.input(),
            output: state.output,
            inversion: state.inversion,
            configuration: state.configuration,
        }
    }

    /// Make the next bus transaction fail
    pub fn fail_next(&self) {
        self.state.borrow_mut().fail_next = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeI2cError {
    /// Nobody answered at that address
    NoAcknowledge,
    /// Injected with [`FakeTca9534::fail_next`]
    Bus,
}

impl std::fmt::Display for FakeI2cError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FakeI2cError::NoAcknowledge => write!(f, "Fake I2C error: no acknowledge"),
            FakeI2cError::Bus => write!(f, "Fake I2C error: bus error"),
        }
    }
}

impl std::error::Error for FakeI2cError {}

impl i2c::Error for FakeI2cError {
    fn kind(&self) -> ErrorKind {
        match self {
            FakeI2cError::NoAcknowledge => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            FakeI2cError::Bus => ErrorKind::Bus,
        }
    }
}

impl i2c::ErrorType for FakeTca9534 {
    type Error = FakeI2cError;
}

impl i2c::I2c<SevenBitAddress> for FakeTca9534 {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();

        if state.fail_next {
            state.fail_next = false;
            return Err(FakeI2cError::Bus);
        }
        if address != state.address {
            return Err(FakeI2cError::NoAcknowledge);
        }

        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    let Some((&command, data)) = bytes.split_first() else {
                        continue;
                    };
                    let register = register_from_command(command);
                    state.pointer = register;
                    for &value in data {
                        trace!("FakeTca9534@{:#04x}: {:?} <- {:#04x}", address, register, value);
                        state.write(register, value);
                    }
                }
                Operation::Read(buffer) => {
                    let pointer = state.pointer;
                    let value = state.read(pointer);
                    trace!("FakeTca9534@{:#04x}: {:?} -> {:#04x}", address, pointer, value);
                    buffer.fill(value);
                }
            }
        }
        Ok(())
    }
}

// Board specific implementations
pub struct BoardSimulator {
    pub gpio_expander: Option<GpioExpander>,
    /// Second handle on the simulated expander, to drive its pins from outside
    pub gpio_lines: FakeTca9534,
}

impl BoardSimulator {
    pub fn new() -> Self {
        init_logging();

        let gpio_lines = FakeTca9534::new(Address::DEFAULT.as_u8());
        let gpio_expander = Tca9534::new(gpio_lines.clone(), Config::default())
            .map_err(|e| error!("Failed to initialize GPIO expander: {}", e))
            .ok();

        Self {
            gpio_expander,
            gpio_lines,
        }
    }
}

impl Default for BoardSimulator {
    fn default() -> Self {
        Self::new()
    }
}

pub fn init_logging() {
    // A second board in the same process keeps the first logger
    SimpleLogger::new().init().ok();
}
