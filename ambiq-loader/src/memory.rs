use crate::error::Error;

/// {function_name} was called with a data length that is not a multiple of {alignment}
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub struct InvalidDataLengthError {
    /// Name of the function that caused the error.
    pub function_name: &'static str,
    /// The alignment required on the data length.
    pub alignment: usize,
}

impl InvalidDataLengthError {
    pub fn new(function_name: &'static str, alignment: usize) -> Self {
        Self {
            function_name,
            alignment,
        }
    }
}

/// Memory access to address {address:#010X} was not aligned to {alignment} bytes.
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub struct MemoryNotAlignedError {
    /// The address of the access.
    pub address: u32,
    /// The required alignment in bytes (address increments).
    pub alignment: usize,
}

/// An interface to be implemented by drivers that allow target memory access.
///
/// The target here has a 32 bit address space. All accesses require a halted
/// core; ensuring that is the caller's responsibility.
pub trait MemoryInterface {
    /// Read a 32 bit word at `address`.
    ///
    /// The address has to be a multiple of 4, otherwise implementations
    /// return [`MemoryNotAlignedError`].
    fn read_word_32(&mut self, address: u32) -> Result<u32, Error> {
        let mut word = 0;
        self.read_32(address, std::slice::from_mut(&mut word))?;
        Ok(word)
    }

    /// Write a 32 bit word to `address`.
    ///
    /// The address has to be a multiple of 4, otherwise implementations
    /// return [`MemoryNotAlignedError`].
    fn write_word_32(&mut self, address: u32, data: u32) -> Result<(), Error> {
        self.write_32(address, std::slice::from_ref(&data))
    }

    /// Read a block of 32 bit words at `address`.
    ///
    /// The number of words read is `data.len()`.
    fn read_32(&mut self, address: u32, data: &mut [u32]) -> Result<(), Error>;

    /// Read a block of 8 bit words at `address`.
    fn read_8(&mut self, address: u32, data: &mut [u8]) -> Result<(), Error>;

    /// Write a block of 32 bit words to `address`.
    fn write_32(&mut self, address: u32, data: &[u32]) -> Result<(), Error>;

    /// Write a block of 8 bit words to `address`.
    fn write_8(&mut self, address: u32, data: &[u8]) -> Result<(), Error>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn alignment_error_names_address_and_alignment() {
        let error = MemoryNotAlignedError {
            address: 0x1000_0002,
            alignment: 4,
        };

        assert_eq!(
            error.to_string(),
            "Memory access to address 0x10000002 was not aligned to 4 bytes."
        );
    }

    #[test]
    fn data_length_error_names_function() {
        let error = InvalidDataLengthError::new("write", 4);

        assert_eq!(
            error.to_string(),
            "write was called with a data length that is not a multiple of 4"
        );
    }
}
