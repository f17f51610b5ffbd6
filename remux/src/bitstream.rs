use crate::errors::RemuxError;

/// Reads MSB-first bit fields out of a byte slice
pub struct BitReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> BitReader<'a> {
        BitReader { data, position: 0 }
    }

    pub fn bits_remaining(&self) -> usize {
        self.data.len() * 8 - self.position
    }

    /// Reads `count` bits (at most 32) as an unsigned value
    pub fn read_bits(&mut self, count: u32) -> Result<u32, RemuxError> {
        if count > 32 || count as usize > self.bits_remaining() {
            return Err(RemuxError::NotEnoughData("bit field"));
        }

        let mut value = 0_u32;
        for _ in 0..count {
            let byte = self.data[self.position / 8];
            let bit = (byte >> (7 - (self.position % 8))) & 1;
            value = (value << 1) | bit as u32;
            self.position += 1;
        }

        Ok(value)
    }

    pub fn read_bool(&mut self) -> Result<bool, RemuxError> {
        Ok(self.read_bits(1)? == 1)
    }

    pub fn skip_bits(&mut self, count: usize) -> Result<(), RemuxError> {
        if count > self.bits_remaining() {
            return Err(RemuxError::NotEnoughData("bit field"));
        }

        self.position += count;
        Ok(())
    }
}
