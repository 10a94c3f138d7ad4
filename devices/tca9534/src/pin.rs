use embedded_hal::digital::{ErrorType, InputPin, OutputPin, PinState, StatefulOutputPin};
use embedded_hal::i2c::I2c;

use crate::{Direction, Error, Pins, Tca9534};

/// Single pin of a [`Tca9534`]
///
/// A view on one bit of the expander registers. All state lives in the expander, every
/// change goes through its register methods as a read-modify-write of the cached byte.
pub struct Pin<'a, I2C> {
    pin: u8,
    expander: &'a mut Tca9534<I2C>,
}

impl<'a, I2C> Pin<'a, I2C> {
    pub(crate) fn new(pin: u8, expander: &'a mut Tca9534<I2C>) -> Self {
        Self { pin, expander }
    }

    /// Pin index (0-7)
    pub fn number(&self) -> u8 {
        self.pin
    }
}

impl<'a, I2C, E> Pin<'a, I2C>
where
    I2C: I2c<Error = E>,
{
    /// Change the pin direction, leaving the output latch untouched
    pub fn set_direction(&mut self, direction: Direction) -> Result<(), Error<E>> {
        let configuration =
            Pins::from_u8(self.expander.get_direction()).with_pin(self.pin, direction.bit());
        self.expander.set_direction(configuration.as_u8())
    }

    /// Change the pin direction from a raw configuration value (1 = input, 0 = output)
    pub fn set_direction_raw(&mut self, raw: u8) -> Result<(), Error<E>> {
        let direction = Direction::try_from(raw).map_err(Error::InvalidDirection)?;
        self.set_direction(direction)
    }

    /// Cached direction, no bus transaction
    pub fn get_direction(&self) -> Direction {
        Direction::from_bit(Pins::from_u8(self.expander.get_direction()).pin(self.pin))
    }

    /// Make the pin an output driving `initial`
    ///
    /// The latch is written before the direction so the pin never drives a stale level.
    pub fn switch_to_output(&mut self, initial: PinState) -> Result<(), Error<E>> {
        self.expander.write_pin(self.pin, initial == PinState::High)?;
        self.set_direction(Direction::Output)
    }

    pub fn switch_to_input(&mut self) -> Result<(), Error<E>> {
        self.set_direction(Direction::Input)
    }

    /// Read the pin from the input register
    ///
    /// This is a live read whatever the direction: for an output it reports the level seen
    /// on the pin, not the cached latch.
    pub fn get_value(&mut self) -> Result<bool, Error<E>> {
        self.expander.read_pin(self.pin)
    }

    /// Set the output latch bit. Not rejected on inputs, it just has no electrical effect.
    pub fn set_value(&mut self, value: bool) -> Result<(), Error<E>> {
        self.expander.write_pin(self.pin, value)
    }

    pub fn get_invert_polarity(&self) -> bool {
        Pins::from_u8(self.expander.get_inversion()).pin(self.pin)
    }

    pub fn set_invert_polarity(&mut self, invert: bool) -> Result<(), Error<E>> {
        let inversion = Pins::from_u8(self.expander.get_inversion()).with_pin(self.pin, invert);
        self.expander.set_inversion(inversion.as_u8())
    }
}

impl<'a, I2C: I2c> ErrorType for Pin<'a, I2C> {
    type Error = Error<I2C::Error>;
}

impl<'a, I2C: I2c> InputPin for Pin<'a, I2C> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.get_value()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.get_value().map(|high| !high)
    }
}

impl<'a, I2C: I2c> OutputPin for Pin<'a, I2C> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set_value(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set_value(true)
    }
}

// Reports the cached latch, not the pin level
impl<'a, I2C: I2c> StatefulOutputPin for Pin<'a, I2C> {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(Pins::from_u8(self.expander.output()).pin(self.pin))
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        self.is_set_high().map(|high| !high)
    }

    fn toggle(&mut self) -> Result<(), Self::Error> {
        self.expander.toggle_pin(self.pin)
    }
}
