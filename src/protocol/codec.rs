//! Encoding and decoding of the primitive types used on the wire.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Wraps [`std::io::Error`], most often a truncated packet.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid {1} tag {0}")]
    InvalidTag(u8, &'static str),

    #[error("{0} trailing bytes after packet")]
    TrailingBytes(usize),

    #[error("{0} entries do not fit into one packet")]
    TooManyEntries(usize),

    #[error("non-finite {0} value")]
    NonFinite(&'static str),
}

/// Objects that can be written as raw bytes.
pub trait Encode {
    fn encode(&self, write: impl Write) -> Result<()>;

    /// Length of the encoded data in bytes.
    fn encode_len(&self) -> usize;
}

/// Objects that can be read back from raw bytes.
pub trait Decode {
    fn decode(read: impl Read) -> Result<Self>
    where
        Self: Sized;
}

/// Decodes a whole datagram. Bytes left over after the value make the datagram invalid.
pub fn decode_exact<T: Decode>(bytes: &[u8]) -> Result<T> {
    let mut read = bytes;
    let value = T::decode(&mut read)?;
    if !read.is_empty() {
        return Err(ProtocolError::TrailingBytes(read.len()));
    }
    Ok(value)
}

pub fn encode_to_vec<T: Encode>(value: &T) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(value.encode_len());
    value.encode(&mut buffer)?;
    Ok(buffer)
}

impl Encode for u8 {
    fn encode(&self, mut write: impl Write) -> Result<()> {
        write.write_u8(*self)?;
        Ok(())
    }

    fn encode_len(&self) -> usize {
        1
    }
}

impl Decode for u8 {
    fn decode(mut read: impl Read) -> Result<Self> {
        Ok(read.read_u8()?)
    }
}

impl Encode for u32 {
    fn encode(&self, mut write: impl Write) -> Result<()> {
        write.write_u32::<LittleEndian>(*self)?;
        Ok(())
    }

    fn encode_len(&self) -> usize {
        4
    }
}

impl Decode for u32 {
    fn decode(mut read: impl Read) -> Result<Self> {
        Ok(read.read_u32::<LittleEndian>()?)
    }
}

impl Encode for f32 {
    fn encode(&self, mut write: impl Write) -> Result<()> {
        write.write_f32::<LittleEndian>(*self)?;
        Ok(())
    }

    fn encode_len(&self) -> usize {
        4
    }
}

impl Decode for f32 {
    fn decode(mut read: impl Read) -> Result<Self> {
        Ok(read.read_f32::<LittleEndian>()?)
    }
}

impl Encode for f64 {
    fn encode(&self, mut write: impl Write) -> Result<()> {
        write.write_f64::<LittleEndian>(*self)?;
        Ok(())
    }

    fn encode_len(&self) -> usize {
        8
    }
}

impl Decode for f64 {
    fn decode(mut read: impl Read) -> Result<Self> {
        Ok(read.read_f64::<LittleEndian>()?)
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode(&self, mut write: impl Write) -> Result<()> {
        for item in self {
            item.encode(&mut write)?;
        }
        Ok(())
    }

    fn encode_len(&self) -> usize {
        self.iter().map(Encode::encode_len).sum()
    }
}

impl<T: Decode + Default + Copy, const N: usize> Decode for [T; N] {
    fn decode(mut read: impl Read) -> Result<Self> {
        let mut items = [T::default(); N];
        for item in &mut items {
            *item = T::decode(&mut read)?;
        }
        Ok(items)
    }
}

/// Sequences carry a one byte length prefix.
impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, mut write: impl Write) -> Result<()> {
        let len = u8::try_from(self.len()).map_err(|_| ProtocolError::TooManyEntries(self.len()))?;
        len.encode(&mut write)?;
        for item in self {
            item.encode(&mut write)?;
        }
        Ok(())
    }

    fn encode_len(&self) -> usize {
        1 + self.iter().map(Encode::encode_len).sum::<usize>()
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(mut read: impl Read) -> Result<Self> {
        let len = u8::decode(&mut read)?;
        (0..len).map(|_| T::decode(&mut read)).collect()
    }
}

/// Optional values are a sequence of at most one element.
impl<T: Encode> Encode for Option<T> {
    fn encode(&self, mut write: impl Write) -> Result<()> {
        match self {
            Some(value) => {
                1u8.encode(&mut write)?;
                value.encode(write)
            }
            None => 0u8.encode(write),
        }
    }

    fn encode_len(&self) -> usize {
        1 + self.as_ref().map_or(0, Encode::encode_len)
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(mut read: impl Read) -> Result<Self> {
        match u8::decode(&mut read)? {
            0 => Ok(None),
            1 => Ok(Some(T::decode(read)?)),
            count => Err(ProtocolError::TooManyEntries(count.into())),
        }
    }
}
