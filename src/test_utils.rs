//! Bus transaction builders shared by the driver and controller tests
//!
//! Copyright 2019 Ryan Kurte

use std::io::ErrorKind;

use embedded_hal_mock::eh0::MockError;
use embedded_hal_mock::eh0::delay::NoopDelay;
use embedded_hal_mock::eh0::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

use crate::Sen6x;
use crate::base::{pack_command, pack_word};
use crate::device::{Command, DEFAULT_ADDRESS, IDENTITY_LEN};

pub type MockSensor = Sen6x<I2cMock, NoopDelay, MockError>;

/// Bare command write
pub fn command(cmd: Command) -> I2cTransaction {
    I2cTransaction::write(DEFAULT_ADDRESS, pack_command(cmd as u16).to_vec())
}

/// Command write followed by CRC framed data words
pub fn command_with(cmd: Command, words: &[u16]) -> I2cTransaction {
    let mut b = pack_command(cmd as u16).to_vec();
    for w in words {
        b.extend_from_slice(&pack_word(*w));
    }
    I2cTransaction::write(DEFAULT_ADDRESS, b)
}

/// Command write that fails on the bus
pub fn failed_command(cmd: Command) -> I2cTransaction {
    command(cmd).with_error(MockError::Io(ErrorKind::Other))
}

/// Command write with data that fails on the bus
pub fn failed_command_with(cmd: Command, words: &[u16]) -> I2cTransaction {
    command_with(cmd, words).with_error(MockError::Io(ErrorKind::Other))
}

/// CRC framed response
pub fn reply(words: &[u16]) -> I2cTransaction {
    let mut b = vec![];
    for w in words {
        b.extend_from_slice(&pack_word(*w));
    }
    I2cTransaction::read(DEFAULT_ADDRESS, b)
}

/// Response to a read command, preceded by the command itself
pub fn read(cmd: Command, words: &[u16]) -> Vec<I2cTransaction> {
    vec![command(cmd), reply(words)]
}

/// NUL padded ASCII identity response
pub fn ascii_reply(s: &str) -> I2cTransaction {
    let mut bytes = s.as_bytes().to_vec();
    bytes.resize(IDENTITY_LEN, 0);

    let words: Vec<u16> = bytes.chunks(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();

    reply(&words)
}

pub fn mock_sensor(i2c: &I2cMock) -> MockSensor {
    Sen6x::new(i2c.clone(), NoopDelay::new())
}
