use bytes::{BufMut, Bytes};
use ethereum_types::{H128, H160, H256};

use crate::constants::{RLP_EMPTY_LIST, RLP_NULL, SHORT_PAYLOAD_LIMIT};

pub trait RLPEncode {
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

/// Number of bytes needed to represent `value` in big-endian without leading zeros.
fn be_len(value: usize) -> usize {
    (usize::BITS as usize / 8) - (value.leading_zeros() as usize / 8)
}

fn put_be_len(value: usize, buf: &mut dyn BufMut) {
    let bytes = value.to_be_bytes();
    buf.put_slice(&bytes[bytes.len() - be_len(value)..]);
}

fn header_length(payload_len: usize) -> usize {
    if payload_len < SHORT_PAYLOAD_LIMIT {
        1
    } else {
        1 + be_len(payload_len)
    }
}

fn encode_header(offset: u8, payload_len: usize, buf: &mut dyn BufMut) {
    if payload_len < SHORT_PAYLOAD_LIMIT {
        buf.put_u8(offset + payload_len as u8);
    } else {
        buf.put_u8(offset + SHORT_PAYLOAD_LIMIT as u8 - 1 + be_len(payload_len) as u8);
        put_be_len(payload_len, buf);
    }
}

/// Writes a list header for a payload of `payload_len` bytes.
pub fn encode_length(payload_len: usize, buf: &mut dyn BufMut) {
    encode_header(RLP_EMPTY_LIST, payload_len, buf);
}

/// Total encoded length of a list whose payload is `payload_len` bytes.
pub fn list_length(payload_len: usize) -> usize {
    header_length(payload_len) + payload_len
}

/// Encodes an unsigned big-endian integer, dropping leading zero bytes.
fn encode_uint_be(bytes: &[u8], buf: &mut dyn BufMut) {
    match bytes.iter().position(|b| *b != 0) {
        Some(start) => bytes[start..].encode(buf),
        None => buf.put_u8(RLP_NULL),
    }
}

fn uint_be_length(bytes: &[u8]) -> usize {
    match bytes.iter().position(|b| *b != 0) {
        Some(start) => bytes[start..].length(),
        None => 1,
    }
}

impl RLPEncode for [u8] {
    fn encode(&self, buf: &mut dyn BufMut) {
        if self.len() == 1 && self[0] < RLP_NULL {
            buf.put_u8(self[0]);
        } else {
            encode_header(RLP_NULL, self.len(), buf);
            buf.put_slice(self);
        }
    }

    fn length(&self) -> usize {
        if self.len() == 1 && self[0] < RLP_NULL {
            1
        } else {
            header_length(self.len()) + self.len()
        }
    }
}

macro_rules! impl_uint_encode {
    ($($t:ty),*) => {
        $(
            impl RLPEncode for $t {
                fn encode(&self, buf: &mut dyn BufMut) {
                    encode_uint_be(&self.to_be_bytes(), buf);
                }

                fn length(&self) -> usize {
                    uint_be_length(&self.to_be_bytes())
                }
            }
        )*
    };
}

impl_uint_encode!(u8, u16, u32, u64, u128, usize);

impl RLPEncode for Bytes {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_ref().encode(buf)
    }

    fn length(&self) -> usize {
        self.as_ref().length()
    }
}

impl RLPEncode for H128 {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf)
    }

    fn length(&self) -> usize {
        self.as_bytes().length()
    }
}

impl RLPEncode for H160 {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf)
    }

    fn length(&self) -> usize {
        self.as_bytes().length()
    }
}

impl RLPEncode for H256 {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf)
    }

    fn length(&self) -> usize {
        self.as_bytes().length()
    }
}

impl<T: RLPEncode> RLPEncode for Vec<T> {
    fn encode(&self, buf: &mut dyn BufMut) {
        if self.is_empty() {
            buf.put_u8(RLP_EMPTY_LIST);
            return;
        }
        let payload_len: usize = self.iter().map(|item| item.length()).sum();
        encode_length(payload_len, buf);
        for item in self {
            item.encode(buf);
        }
    }

    fn length(&self) -> usize {
        list_length(self.iter().map(|item| item.length()).sum())
    }
}

impl<T: RLPEncode + ?Sized> RLPEncode for &T {
    fn encode(&self, buf: &mut dyn BufMut) {
        (**self).encode(buf)
    }

    fn length(&self) -> usize {
        (**self).length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn can_encode_integers() {
        assert_eq!(0u64.encode_to_vec(), vec![RLP_NULL]);
        assert_eq!(0x7fu16.encode_to_vec(), vec![0x7f]);
        assert_eq!(0x80u16.encode_to_vec(), vec![0x81, 0x80]);
        assert_eq!(0x0400u16.encode_to_vec(), vec![0x82, 0x04, 0x00]);
        assert_eq!(u64::MAX.encode_to_vec(), hex!("88ffffffffffffffff").to_vec());
    }

    #[test]
    fn can_encode_byte_strings() {
        let empty: &[u8] = &[];
        assert_eq!(empty.encode_to_vec(), vec![RLP_NULL]);
        let dog: &[u8] = b"dog";
        assert_eq!(dog.encode_to_vec(), hex!("83646f67").to_vec());

        let long = vec![0xaau8; 60];
        let encoded = long.as_slice().encode_to_vec();
        assert_eq!(&encoded[..2], &[0xb8, 60]);
        assert_eq!(encoded.len(), 62);
        assert_eq!(long.as_slice().length(), 62);
    }

    #[test]
    fn can_encode_lists() {
        let empty: Vec<u64> = vec![];
        assert_eq!(empty.encode_to_vec(), vec![RLP_EMPTY_LIST]);
        let list = vec![1u8, 2, 3];
        assert_eq!(list.encode_to_vec(), vec![0xc3, 0x01, 0x02, 0x03]);
        assert_eq!(list.length(), 4);
    }

    #[test]
    fn can_encode_fixed_hashes() {
        let address = H160::repeat_byte(0x11);
        let encoded = address.encode_to_vec();
        assert_eq!(encoded[0], 0x80 + 20);
        assert_eq!(&encoded[1..], address.as_bytes());
    }
}
