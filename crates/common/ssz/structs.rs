use bytes::BufMut;

use crate::{
    SSZType,
    decode::{SSZDecode, read_offset},
    encode::{SSZEncode, put_offset},
    error::SSZDecodeError,
};

/// # Container encoding helper
///
/// Fixed-size fields are written inline in declaration order; every
/// variable-size field leaves a 4-byte offset in its place and its bytes are
/// appended after the fixed part, in the same order.
#[must_use = "`Encoder` must be consumed with `finish` to perform the encoding"]
pub struct Encoder<'a> {
    buf: &'a mut dyn BufMut,
    fields: Vec<(bool, Vec<u8>)>,
}

impl core::fmt::Debug for Encoder<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Encoder")
            .field("buf", &"...")
            .field("fields", &self.fields.len())
            .finish()
    }
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut dyn BufMut) -> Self {
        Self {
            buf,
            fields: Vec::new(),
        }
    }

    pub fn encode_field<T: SSZEncode>(mut self, value: &T) -> Self {
        let mut bytes = Vec::new();
        value.encode(&mut bytes);
        self.fields.push((T::FIXED_SIZE.is_some(), bytes));
        self
    }

    pub fn finish(self) {
        let fixed_len: usize = self
            .fields
            .iter()
            .map(|(fixed, bytes)| if *fixed { bytes.len() } else { 4 })
            .sum();
        let mut offset = fixed_len;
        for (fixed, bytes) in &self.fields {
            if *fixed {
                self.buf.put_slice(bytes);
            } else {
                put_offset(offset, self.buf);
                offset += bytes.len();
            }
        }
        for (_, bytes) in self.fields.iter().filter(|(fixed, _)| !*fixed) {
            self.buf.put_slice(bytes);
        }
    }
}

/// Encoded size of a container whose fields are all fixed-size.
pub const fn fixed_container_size(field_sizes: &[usize]) -> usize {
    let mut total = 0;
    let mut i = 0;
    while i < field_sizes.len() {
        total += field_sizes[i];
        i += 1;
    }
    total
}

/// # Container decoding helper
///
/// Built from the container's field layout (each field's [`SSZType::FIXED_SIZE`]),
/// it validates the offset table up front and then hands out one field at a
/// time, in declaration order.
///
/// ```
/// # use bytes::Bytes;
/// # use ethbal_ssz::{SSZType, structs::{Decoder, Encoder}, error::SSZDecodeError};
/// let mut buf = Vec::new();
/// Encoder::new(&mut buf)
///     .encode_field(&3u16)
///     .encode_field(&Bytes::from_static(b"code"))
///     .finish();
///
/// let decoder = Decoder::new(&buf, 0, &[u16::FIXED_SIZE, Bytes::FIXED_SIZE])?;
/// let (index, decoder): (u16, _) = decoder.decode_field("index")?;
/// let (code, decoder): (Bytes, _) = decoder.decode_field("code")?;
/// decoder.finish()?;
/// assert_eq!(index, 3);
/// assert_eq!(&code[..], b"code");
/// # Ok::<(), SSZDecodeError>(())
/// ```
#[derive(Debug)]
#[must_use = "`Decoder` must be consumed with `finish` to perform decoding checks"]
pub struct Decoder<'a> {
    bytes: &'a [u8],
    base: usize,
    spans: Vec<(usize, usize)>,
    next: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(
        bytes: &'a [u8],
        base: usize,
        layout: &[Option<usize>],
    ) -> Result<Self, SSZDecodeError> {
        let fixed_len: usize = layout
            .iter()
            .map(|size| size.unwrap_or(crate::constants::BYTES_PER_LENGTH_OFFSET))
            .sum();
        if bytes.len() < fixed_len {
            return Err(SSZDecodeError::InvalidLength {
                offset: base,
                expected: fixed_len,
                actual: bytes.len(),
            });
        }

        // First pass: fixed fields get their inline span, variable fields
        // record where their data starts.
        let mut spans = Vec::with_capacity(layout.len());
        let mut variable = Vec::new();
        let mut cursor = 0;
        for size in layout {
            match size {
                Some(size) => {
                    spans.push((cursor, cursor + size));
                    cursor += size;
                }
                None => {
                    let start = read_offset(bytes, cursor, base)?;
                    let expected_min = variable
                        .last()
                        .map(|(_, previous)| *previous)
                        .unwrap_or(fixed_len);
                    let first_mismatch = variable.is_empty() && start != fixed_len;
                    if first_mismatch || start < expected_min || start > bytes.len() {
                        return Err(SSZDecodeError::InvalidOffset {
                            offset: base + cursor,
                            value: start,
                        });
                    }
                    variable.push((spans.len(), start));
                    spans.push((start, start));
                    cursor += crate::constants::BYTES_PER_LENGTH_OFFSET;
                }
            }
        }

        if variable.is_empty() && bytes.len() != fixed_len {
            return Err(SSZDecodeError::InvalidLength {
                offset: base,
                expected: fixed_len,
                actual: bytes.len(),
            });
        }

        // Second pass: each variable field ends where the next one starts.
        for (i, (field, start)) in variable.iter().enumerate() {
            let end = variable
                .get(i + 1)
                .map(|(_, next)| *next)
                .unwrap_or(bytes.len());
            spans[*field] = (*start, end);
        }

        Ok(Self {
            bytes,
            base,
            spans,
            next: 0,
        })
    }

    pub fn decode_field<T: SSZDecode>(mut self, name: &str) -> Result<(T, Self), SSZDecodeError> {
        let (start, end) = self.take_span(name)?;
        let value = T::decode_at(&self.bytes[start..end], self.base + start)
            .map_err(|err| field_error(name, err))?;
        Ok((value, self))
    }

    /// Decodes a list field, enforcing its maximum element count.
    pub fn decode_list_field<T: SSZDecode>(
        self,
        name: &str,
        max: usize,
    ) -> Result<(Vec<T>, Self), SSZDecodeError> {
        let offset = self
            .spans
            .get(self.next)
            .map(|(start, _)| self.base + start)
            .unwrap_or(self.base);
        let (items, decoder) = self.decode_field::<Vec<T>>(name)?;
        if items.len() > max {
            return Err(field_error(
                name,
                SSZDecodeError::ListTooLong {
                    offset,
                    len: items.len(),
                    max,
                },
            ));
        }
        Ok((items, decoder))
    }

    fn take_span(&mut self, name: &str) -> Result<(usize, usize), SSZDecodeError> {
        let span = self
            .spans
            .get(self.next)
            .copied()
            .ok_or_else(|| SSZDecodeError::MissingField {
                offset: self.base,
                name: name.to_string(),
            })?;
        self.next += 1;
        Ok(span)
    }

    pub fn finish(self) -> Result<(), SSZDecodeError> {
        if self.next == self.spans.len() {
            Ok(())
        } else {
            Err(SSZDecodeError::TrailingFields {
                offset: self.base,
                count: self.spans.len() - self.next,
            })
        }
    }
}

fn field_error(name: &str, err: SSZDecodeError) -> SSZDecodeError {
    SSZDecodeError::Field {
        name: name.to_string(),
        source: Box::new(err),
    }
}

/// Layout helper: the [`SSZType::FIXED_SIZE`] of each listed type.
#[macro_export]
macro_rules! layout {
    ($($t:ty),* $(,)?) => {
        [$(<$t as $crate::SSZType>::FIXED_SIZE),*]
    };
}
