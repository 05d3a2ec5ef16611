use bytes::{BufMut, Bytes};
use ethereum_types::{H128, H160, H256};

use crate::{SSZType, constants::BYTES_PER_LENGTH_PREFIX};

pub trait SSZEncode: SSZType {
    fn encode(&self, buf: &mut dyn BufMut);

    fn length(&self) -> usize {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf.len()
    }

    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.length());
        self.encode(&mut buf);
        buf
    }
}

pub(crate) fn put_offset(offset: usize, buf: &mut dyn BufMut) {
    buf.put_u32_le(offset as u32);
}

pub(crate) fn put_length(len: usize, buf: &mut dyn BufMut) {
    buf.put_u32_le(len as u32);
}

macro_rules! impl_uint {
    ($($t:ty => $put:ident),*) => {
        $(
            impl SSZType for $t {
                const FIXED_SIZE: Option<usize> = Some(std::mem::size_of::<$t>());
            }

            impl SSZEncode for $t {
                fn encode(&self, buf: &mut dyn BufMut) {
                    buf.$put(*self);
                }

                fn length(&self) -> usize {
                    std::mem::size_of::<$t>()
                }
            }
        )*
    };
}

impl_uint!(u8 => put_u8, u16 => put_u16_le, u32 => put_u32_le, u64 => put_u64_le);

macro_rules! impl_fixed_hash {
    ($($t:ty),*) => {
        $(
            impl SSZType for $t {
                const FIXED_SIZE: Option<usize> = Some(<$t>::len_bytes());
            }

            impl SSZEncode for $t {
                fn encode(&self, buf: &mut dyn BufMut) {
                    buf.put_slice(self.as_bytes());
                }

                fn length(&self) -> usize {
                    <$t>::len_bytes()
                }
            }
        )*
    };
}

impl_fixed_hash!(H128, H160, H256);

/// Byte list: a 4-byte little-endian length, then the raw bytes.
impl SSZType for Bytes {
    const FIXED_SIZE: Option<usize> = None;
}

impl SSZEncode for Bytes {
    fn encode(&self, buf: &mut dyn BufMut) {
        put_length(self.len(), buf);
        buf.put_slice(self);
    }

    fn length(&self) -> usize {
        BYTES_PER_LENGTH_PREFIX + self.len()
    }
}

impl<T: SSZType> SSZType for Vec<T> {
    const FIXED_SIZE: Option<usize> = None;
}

/// Lists start with their element count. Fixed-size elements follow packed;
/// variable-size ones follow an offset table measured from the list start.
impl<T: SSZEncode> SSZEncode for Vec<T> {
    fn encode(&self, buf: &mut dyn BufMut) {
        put_length(self.len(), buf);
        if T::FIXED_SIZE.is_some() {
            for item in self {
                item.encode(buf);
            }
            return;
        }
        let mut offset = BYTES_PER_LENGTH_PREFIX + self.len() * T::fixed_part_len();
        let lengths: Vec<usize> = self.iter().map(|item| item.length()).collect();
        for length in &lengths {
            put_offset(offset, buf);
            offset += length;
        }
        for item in self {
            item.encode(buf);
        }
    }

    fn length(&self) -> usize {
        let elements: usize = match T::FIXED_SIZE {
            Some(size) => size * self.len(),
            None => self
                .iter()
                .map(|item| T::fixed_part_len() + item.length())
                .sum(),
        };
        BYTES_PER_LENGTH_PREFIX + elements
    }
}
