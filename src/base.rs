//! Base communication implementation for interacting with Sen6x devices
//!
//! Copyright 2019 Ryan Kurte

use core::fmt::Debug;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c;

use crate::{Error, Sen6x};
use crate::device::*;

/// CRC mismatch (or truncation) in a framed response, `word` is the index of the first bad word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrcError {
    pub word: usize,
}

impl <ConnErr> From<CrcError> for Error<ConnErr> {
    fn from(e: CrcError) -> Self {
        Error::Crc{ word: e.word }
    }
}

/// Base API for reading and writing to the device
/// This should not be required by consumers, but is exposed to support alternate use
pub trait Base<Err> {
    /// Write a command to the device with no data
    fn write_command(&mut self, command: Command) -> Result<(), Error<Err>>;
    /// Write a command followed by a single data word
    fn write_command_with_word(&mut self, command: Command, data: u16) -> Result<(), Error<Err>>;
    /// Write a command followed by a number of data words
    fn write_command_with_words(&mut self, command: Command, data: &[u16]) -> Result<(), Error<Err>>;
    /// Issue a read command and fetch `data.len()` bytes of payload
    fn read_bytes(&mut self, command: Command, data: &mut [u8]) -> Result<(), Error<Err>>;
    /// Issue a read command and fetch `data.len()` words of payload
    fn read_words(&mut self, command: Command, data: &mut [u16]) -> Result<(), Error<Err>>;
    /// Fetch a pending response without issuing a new command
    fn read_response(&mut self, data: &mut [u16]) -> Result<(), Error<Err>>;
}

/// Helper for device CRC-8 calculation
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = CRC_INIT;

    // For each byte
    for v in data {
        // XOR with current byte
        crc ^= v;

        // For each bit (in -ve order, but, doesn't actually matter here)
        for _bit in 0..8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ CRC_POLY;
            } else {
                crc = crc << 1;
            }
        }
    }

    // Apply final xor
    crc ^ CRC_XOR
}

/// Big-endian command header
pub fn pack_command(command: u16) -> [u8; 2] {
    command.to_be_bytes()
}

/// Data word followed by its CRC
pub fn pack_word(word: u16) -> [u8; 3] {
    let b = word.to_be_bytes();
    [b[0], b[1], crc8(&b)]
}

/// Unpack a wire response of 3-byte (MSB, LSB, CRC) groups, checking every CRC
pub fn unpack_words(raw: &[u8]) -> Result<Vec<u16>, CrcError> {
    let mut words = Vec::with_capacity(raw.len() / 3);

    for (word, chunk) in raw.chunks(3).enumerate() {
        if chunk.len() != 3 || crc8(&chunk[..2]) != chunk[2] {
            return Err(CrcError{ word });
        }
        words.push(u16::from_be_bytes([chunk[0], chunk[1]]));
    }

    Ok(words)
}

impl <Conn, Delay, Err> Sen6x<Conn, Delay, Err> where
    Conn: i2c::Read<Error=Err> + i2c::Write<Error=Err>,
    Delay: DelayMs<u32>,
    Err: Debug,
{
    fn fetch(&mut self, command: Option<Command>, wire_len: usize) -> Result<Vec<u16>, Error<Err>> {
        if let Some(c) = command {
            let cmd = pack_command(c as u16);
            trace!("Writing command: {:x?}", cmd);

            self.conn.write(DEFAULT_ADDRESS, &cmd)
                .map_err(Error::Transport)?;

            // The device needs time to prepare the response
            self.delay.delay_ms(READ_DELAY_MS);
        }

        let mut raw = vec![0u8; wire_len];
        self.conn.read(DEFAULT_ADDRESS, &mut raw)
            .map_err(Error::Transport)?;

        trace!("Read data: {:x?}", raw);

        unpack_words(&raw).map_err(|e| {
            warn!("CRC error in response to {:?}, word {}", command, e.word);
            Error::from(e)
        })
    }
}

impl <Conn, Delay, Err> Base<Err> for Sen6x<Conn, Delay, Err> where
    Conn: i2c::Read<Error=Err> + i2c::Write<Error=Err>,
    Delay: DelayMs<u32>,
    Err: Debug,
{
    fn write_command(&mut self, command: Command) -> Result<(), Error<Err>> {
        self.write_command_with_words(command, &[])
    }

    fn write_command_with_word(&mut self, command: Command, data: u16) -> Result<(), Error<Err>> {
        self.write_command_with_words(command, &[data])
    }

    fn write_command_with_words(&mut self, command: Command, data: &[u16]) -> Result<(), Error<Err>> {
        let mut buff = Vec::with_capacity(2 + data.len() * 3);
        buff.extend_from_slice(&pack_command(command as u16));
        for d in data {
            buff.extend_from_slice(&pack_word(*d));
        }

        trace!("Writing command: {:?} data: {:x?}", command, data);

        self.conn.write(DEFAULT_ADDRESS, &buff).map_err(Error::Transport)
    }

    fn read_bytes(&mut self, command: Command, data: &mut [u8]) -> Result<(), Error<Err>> {
        // One CRC byte per two data bytes on the wire
        let words = (data.len() + 1) / 2;
        let v = self.fetch(Some(command), words * 3)?;

        for (i, b) in data.iter_mut().enumerate() {
            let w = v[i / 2];
            *b = if i % 2 == 0 { (w >> 8) as u8 } else { w as u8 };
        }

        Ok(())
    }

    fn read_words(&mut self, command: Command, data: &mut [u16]) -> Result<(), Error<Err>> {
        let v = self.fetch(Some(command), data.len() * 3)?;
        data.copy_from_slice(&v);
        Ok(())
    }

    fn read_response(&mut self, data: &mut [u16]) -> Result<(), Error<Err>> {
        let v = self.fetch(None, data.len() * 3)?;
        data.copy_from_slice(&v);
        Ok(())
    }
}
