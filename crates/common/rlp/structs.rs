use bytes::BufMut;

use crate::{
    decode::{RLPDecode, decode_rlp_item},
    encode::{RLPEncode, encode_length},
    error::RLPDecodeError,
};

/// # Struct decoding helper
///
/// Decodes a struct encoded as a list of its fields, one field at a time and
/// in declaration order. A field decoded out of order yields garbage or an
/// error, so the order used here must match the one used by [`Encoder`].
///
/// ```
/// # use ethbal_rlp::structs::{Decoder, Encoder};
/// # use ethbal_rlp::error::RLPDecodeError;
/// let mut buf = Vec::new();
/// Encoder::new(&mut buf).encode_field(&7u16).encode_field(&1u64).finish();
///
/// let decoder = Decoder::new(&buf)?;
/// let (index, decoder): (u16, _) = decoder.decode_field("index")?;
/// let (nonce, decoder): (u64, _) = decoder.decode_field("nonce")?;
/// let rest = decoder.finish()?;
/// assert_eq!((index, nonce), (7, 1));
/// assert!(rest.is_empty());
/// # Ok::<(), RLPDecodeError>(())
/// ```
#[derive(Debug)]
#[must_use = "`Decoder` must be consumed with `finish` to perform decoding checks"]
pub struct Decoder<'a> {
    payload: &'a [u8],
    remaining: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Result<Self, RLPDecodeError> {
        match decode_rlp_item(buf)? {
            (true, payload, remaining) => Ok(Self { payload, remaining }),
            (false, _, _) => Err(RLPDecodeError::UnexpectedString),
        }
    }

    pub fn decode_field<T: RLPDecode>(self, name: &str) -> Result<(T, Self), RLPDecodeError> {
        let (field, rest) = <T as RLPDecode>::decode_unfinished(self.payload)
            .map_err(|err| field_decode_error::<T>(name, err))?;
        let updated_self = Self {
            payload: rest,
            ..self
        };
        Ok((field, updated_self))
    }

    /// Finishes decoding the struct and returns the bytes after the item.
    /// Fails if the list holds more fields than were decoded.
    pub fn finish(self) -> Result<&'a [u8], RLPDecodeError> {
        if self.payload.is_empty() {
            Ok(self.remaining)
        } else {
            Err(RLPDecodeError::MalformedData)
        }
    }
}

fn field_decode_error<T>(field_name: &str, err: RLPDecodeError) -> RLPDecodeError {
    let typ = std::any::type_name::<T>();
    RLPDecodeError::Custom(format!(
        "Error decoding field '{field_name}' of type {typ}: {err}"
    ))
}

/// # Struct encoding helper
///
/// Encodes a struct as a list of its fields, in the order they are given.
#[must_use = "`Encoder` must be consumed with `finish` to perform the encoding"]
pub struct Encoder<'a> {
    buf: &'a mut dyn BufMut,
    temp_buf: Vec<u8>,
}

impl core::fmt::Debug for Encoder<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Encoder")
            .field("buf", &"...")
            .field("temp_buf", &self.temp_buf)
            .finish()
    }
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut dyn BufMut) -> Self {
        Self {
            buf,
            temp_buf: Default::default(),
        }
    }

    pub fn encode_field<T: RLPEncode + ?Sized>(mut self, value: &T) -> Self {
        value.encode(&mut self.temp_buf);
        self
    }

    /// Writes the list header followed by the accumulated fields.
    pub fn finish(self) {
        encode_length(self.temp_buf.len(), self.buf);
        self.buf.put_slice(&self.temp_buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::RLPEncode;
    use ethereum_types::H160;

    #[derive(Debug, PartialEq, Eq)]
    struct Simple {
        pub a: u8,
        pub b: u16,
        pub owner: H160,
    }

    impl RLPEncode for Simple {
        fn encode(&self, buf: &mut dyn BufMut) {
            Encoder::new(buf)
                .encode_field(&self.a)
                .encode_field(&self.b)
                .encode_field(&self.owner)
                .finish();
        }
    }

    impl RLPDecode for Simple {
        fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
            let decoder = Decoder::new(rlp)?;
            let (a, decoder) = decoder.decode_field("a")?;
            let (b, decoder) = decoder.decode_field("b")?;
            let (owner, decoder) = decoder.decode_field("owner")?;
            Ok((Simple { a, b, owner }, decoder.finish()?))
        }
    }

    #[test]
    fn test_struct_round_trip() {
        let value = Simple {
            a: 61,
            b: 75,
            owner: H160::repeat_byte(0x42),
        };
        let encoded = value.encode_to_vec();
        assert_eq!(Simple::decode(&encoded), Ok(value));
    }

    #[test]
    fn test_struct_with_extra_field_is_rejected() {
        let mut buf = Vec::new();
        Encoder::new(&mut buf)
            .encode_field(&1u8)
            .encode_field(&2u16)
            .encode_field(&H160::zero())
            .encode_field(&3u8)
            .finish();
        assert_eq!(Simple::decode(&buf), Err(RLPDecodeError::MalformedData));
    }

    #[test]
    fn test_struct_with_missing_field_is_rejected() {
        let mut buf = Vec::new();
        Encoder::new(&mut buf)
            .encode_field(&1u8)
            .encode_field(&2u16)
            .finish();
        assert!(matches!(
            Simple::decode(&buf),
            Err(RLPDecodeError::Custom(_))
        ));
    }
}
