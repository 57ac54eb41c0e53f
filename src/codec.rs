//! Conversion between byte buffers and the 32-bit words the controller programs.
//!
//! Words use the controller's native little-endian layout, so a word read
//! back from the memory-mapped array converts to the bytes it was built from.

use crate::error::Error;

/// Size of the smallest programmable unit
pub const WORD_SIZE: usize = 4;

/// Pack the first `length` bytes of `bytes` into `words`, four bytes per word.
pub fn bytes_to_words(bytes: &[u8], length: usize, words: &mut [u32]) -> Result<(), Error> {
    check_sizes(bytes.len(), length, words.len())?;
    for (word, chunk) in words.iter_mut().zip(bytes[..length].chunks_exact(WORD_SIZE)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(())
}

/// Unpack the first `length / 4` words of `words` into `bytes`.
pub fn words_to_bytes(words: &[u32], length: usize, bytes: &mut [u8]) -> Result<(), Error> {
    check_sizes(bytes.len(), length, words.len())?;
    for (chunk, word) in bytes[..length].chunks_exact_mut(WORD_SIZE).zip(words) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    Ok(())
}

fn check_sizes(bytes: usize, length: usize, words: usize) -> Result<(), Error> {
    if length % WORD_SIZE != 0 || bytes < length || words < length / WORD_SIZE {
        return Err(Error::Conversion);
    }
    Ok(())
}
