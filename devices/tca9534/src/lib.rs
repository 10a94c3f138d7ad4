#![cfg_attr(not(test), no_std)]

//! TCA9534 / PCA9534 I2C GPIO expander driver
//!
//! The TCA9534 is an 8-bit I2C GPIO expander. Each of its 8 pins can be configured
//! as an input or an output, and inputs can have their read polarity inverted.
//!
//! The device only accepts full-byte register writes, so the driver keeps a copy of the
//! OUTPUT, POLARITY INVERSION and CONFIGURATION registers and does single pin changes as
//! read-modify-write on that copy. The INPUT register is never cached.
//!
//! The cached copy is only accurate if nothing else on the bus writes to the device.

use core::fmt;

use bitfield::bitfield;
use embedded_hal::digital::{self, PinState};
use embedded_hal::i2c::I2c;
use log::{debug, trace};

mod pin;

pub use pin::Pin;

/// Number of GPIO pins on the device
pub const PIN_COUNT: u8 = 8;

/// TCA9534 register addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    /// Input register - live state of the pins, after polarity inversion
    Input = 0x00,
    /// Output register - output latch, drives pins configured as outputs
    Output = 0x01,
    /// Polarity inversion register - invert the read value of input pins
    PolarityInversion = 0x02,
    /// Configuration register - configure pins as inputs (1) or outputs (0)
    Configuration = 0x03,
}

bitfield! {
    /// Image of an 8-bit port register, one bit per pin
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Pins(u8);
    impl Debug;

    pub p0, set_p0: 0;
    pub p1, set_p1: 1;
    pub p2, set_p2: 2;
    pub p3, set_p3: 3;
    pub p4, set_p4: 4;
    pub p5, set_p5: 5;
    pub p6, set_p6: 6;
    pub p7, set_p7: 7;
}

impl Pins {
    pub const fn from_u8(value: u8) -> Self {
        Pins(value)
    }

    pub const fn as_u8(&self) -> u8 {
        self.0
    }

    /// Get the bit of a specific pin. Out of range pins read as `false`.
    pub fn pin(&self, pin: u8) -> bool {
        pin < PIN_COUNT && (self.0 & (1 << pin)) != 0
    }

    /// Set or clear the bit of a specific pin, leaving the others untouched.
    /// Out of range pins are ignored.
    pub fn set_pin(&mut self, pin: u8, value: bool) {
        if pin < PIN_COUNT {
            self.0 = (self.0 & !(1 << pin)) | ((value as u8) << pin);
        }
    }

    /// Copy of `self` with one pin bit replaced
    pub fn with_pin(mut self, pin: u8, value: bool) -> Self {
        self.set_pin(pin, value);
        self
    }
}

impl From<u8> for Pins {
    fn from(value: u8) -> Self {
        Pins(value)
    }
}

impl From<Pins> for u8 {
    fn from(pins: Pins) -> Self {
        pins.0
    }
}

/// 7-bit I2C device address
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Address(u8);

impl Address {
    /// Address with A2, A1 and A0 tied low
    pub const DEFAULT: Address = Address(0x20);

    /// Build the address from the levels of the A2, A1 and A0 strap pins
    pub fn from_pin_states(a2: PinState, a1: PinState, a0: PinState) -> Self {
        let bit = |state: PinState| match state {
            PinState::Low => 0,
            PinState::High => 1,
        };
        Address(Self::DEFAULT.0 | (bit(a2) << 2) | (bit(a1) << 1) | bit(a0))
    }

    pub fn as_u8(self) -> u8 {
        self.0
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u8> for Address {
    fn from(a: u8) -> Self {
        Address(a & 0x7F)
    }
}

/// Driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub address: Address,
    /// Put the device back in its power-on state (all inputs, no inversion, latch high)
    /// before reading the registers back.
    pub reset: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            address: Address::DEFAULT,
            reset: true,
        }
    }
}

impl Config {
    pub fn with_address(mut self, address: impl Into<Address>) -> Self {
        self.address = address.into();
        self
    }

    pub fn without_reset(mut self) -> Self {
        self.reset = false;
        self
    }
}

/// Pin direction, as encoded in the configuration register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Configuration bit 1
    Input,
    /// Configuration bit 0
    Output,
}

impl Direction {
    pub fn from_bit(bit: bool) -> Self {
        if bit {
            Direction::Input
        } else {
            Direction::Output
        }
    }

    pub fn bit(self) -> bool {
        self == Direction::Input
    }
}

impl TryFrom<u8> for Direction {
    /// The rejected raw value
    type Error = u8;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(Direction::Input),
            0 => Ok(Direction::Output),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// I2C communication error
    I2c(E),
    /// Invalid pin number (must be 0-7)
    InvalidPin(u8),
    /// Raw direction value that is neither input (1) nor output (0)
    InvalidDirection(u8),
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::I2c(e) => write!(f, "I2C bus error: {:?}", e),
            Error::InvalidPin(pin) => write!(f, "invalid pin {} (must be 0-7)", pin),
            Error::InvalidDirection(raw) => write!(f, "invalid direction value {}", raw),
        }
    }
}

impl<E: fmt::Debug> digital::Error for Error<E> {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

/// TCA9534 I2C GPIO expander driver
///
/// Owns the bus handle (pass `&mut bus` to keep using the bus elsewhere) and the cached
/// images of the OUTPUT, POLARITY INVERSION and CONFIGURATION registers.
pub struct Tca9534<I2C> {
    i2c: I2C,
    address: Address,
    output: Pins,
    inversion: Pins,
    configuration: Pins,
}

impl<I2C, E> Tca9534<I2C>
where
    I2C: I2c<Error = E>,
{
    /// Create a new TCA9534 instance
    ///
    /// # Arguments
    /// * `i2c` - I2C bus handle
    /// * `config` - device address and whether to reset the registers first
    ///
    /// With `config.reset` the device is first reset (see [`Tca9534::reset`]). In both cases
    /// the three cached registers are then read back from the device.
    pub fn new(i2c: I2C, config: Config) -> Result<Self, Error<E>> {
        let mut expander = Tca9534 {
            i2c,
            address: config.address,
            output: Pins(0),
            inversion: Pins(0),
            configuration: Pins(0),
        };

        debug!(
            "tca9534@{:#04x}: init (reset: {})",
            expander.address.as_u8(),
            config.reset
        );

        if config.reset {
            expander.reset()?;
        } else {
            expander.refresh()?;
        }
        Ok(expander)
    }

    /// Put the device in its power-on state, then refresh the cache
    ///
    /// Writes CONFIGURATION=0xFF (all inputs), POLARITY INVERSION=0x00 and OUTPUT=0xFF in
    /// that order. A failure part way leaves the device in a mixed state.
    pub fn reset(&mut self) -> Result<(), Error<E>> {
        self.set_direction(0xFF)?;
        self.set_inversion(0x00)?;
        self.write_gpio(0xFF)?;
        self.refresh()
    }

    /// Read OUTPUT, POLARITY INVERSION and CONFIGURATION back into the cache
    ///
    /// The cache is only updated once all three reads succeeded.
    pub fn refresh(&mut self) -> Result<(), Error<E>> {
        let output = self.read_register(Register::Output)?;
        let inversion = self.read_register(Register::PolarityInversion)?;
        let configuration = self.read_register(Register::Configuration)?;

        self.output = Pins(output);
        self.inversion = Pins(inversion);
        self.configuration = Pins(configuration);
        debug!(
            "tca9534@{:#04x}: output={:#010b} inversion={:#010b} configuration={:#010b}",
            self.address.as_u8(),
            output,
            inversion,
            configuration
        );
        Ok(())
    }

    /// Read the input register (always a bus transaction)
    pub fn read_gpio(&mut self) -> Result<u8, Error<E>> {
        self.read_register(Register::Input)
    }

    /// Write the whole output latch
    ///
    /// Only pins configured as outputs change electrically, but the latch keeps every bit.
    pub fn write_gpio(&mut self, value: u8) -> Result<(), Error<E>> {
        self.write_register(Register::Output, value)?;
        self.output = Pins(value);
        Ok(())
    }

    /// Cached output latch
    pub fn output(&self) -> u8 {
        self.output.as_u8()
    }

    /// Set the configuration register (1 = input, 0 = output)
    pub fn set_direction(&mut self, mask: u8) -> Result<(), Error<E>> {
        self.write_register(Register::Configuration, mask)?;
        self.configuration = Pins(mask);
        Ok(())
    }

    /// Cached configuration register (1 = input, 0 = output)
    pub fn get_direction(&self) -> u8 {
        self.configuration.as_u8()
    }

    /// Set the polarity inversion register (1 = inverted)
    ///
    /// Inversion only applies to the read value of pins configured as inputs.
    pub fn set_inversion(&mut self, mask: u8) -> Result<(), Error<E>> {
        self.write_register(Register::PolarityInversion, mask)?;
        self.inversion = Pins(mask);
        Ok(())
    }

    /// Cached polarity inversion register
    pub fn get_inversion(&self) -> u8 {
        self.inversion.as_u8()
    }

    /// Set a specific output latch bit high or low
    pub fn write_pin(&mut self, pin: u8, value: bool) -> Result<(), Error<E>> {
        Self::check_pin(pin)?;
        let output = self.output.with_pin(pin, value);
        self.write_gpio(output.as_u8())
    }

    /// Read a specific pin from the input register
    pub fn read_pin(&mut self, pin: u8) -> Result<bool, Error<E>> {
        Self::check_pin(pin)?;
        let inputs = Pins(self.read_gpio()?);
        Ok(inputs.pin(pin))
    }

    /// Toggle a specific output latch bit
    pub fn toggle_pin(&mut self, pin: u8) -> Result<(), Error<E>> {
        Self::check_pin(pin)?;
        let current = self.output.pin(pin);
        self.write_pin(pin, !current)
    }

    /// Get a handle on a single pin
    pub fn get_pin(&mut self, pin: u8) -> Result<Pin<'_, I2C>, Error<E>> {
        Self::check_pin(pin)?;
        Ok(Pin::new(pin, self))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Destroy the driver and give the bus handle back
    pub fn release(self) -> I2C {
        self.i2c
    }

    fn check_pin(pin: u8) -> Result<(), Error<E>> {
        if pin >= PIN_COUNT {
            return Err(Error::InvalidPin(pin));
        }
        Ok(())
    }

    fn read_register(&mut self, register: Register) -> Result<u8, Error<E>> {
        let mut buffer = [0u8; 1];
        self.i2c
            .write_read(self.address.as_u8(), &[register as u8], &mut buffer)
            .map_err(Error::I2c)?;
        trace!(
            "tca9534@{:#04x}: {:?} -> {:#04x}",
            self.address.as_u8(),
            register,
            buffer[0]
        );
        Ok(buffer[0])
    }

    fn write_register(&mut self, register: Register, value: u8) -> Result<(), Error<E>> {
        trace!(
            "tca9534@{:#04x}: {:?} <- {:#04x}",
            self.address.as_u8(),
            register,
            value
        );
        self.i2c
            .write(self.address.as_u8(), &[register as u8, value])
            .map_err(Error::I2c)
    }
}
