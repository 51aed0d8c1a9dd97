// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Read half of the codec core. Mirrors [`crate::encoder::Encoder`]
//! byte-for-byte: every primitive this module reads was written by the
//! matching `Encoder` method under the same dialect.

use crate::align::pad;
use crate::codec::{reverse_if, LONG_DOUBLE_ALIGNMENT, LONG_DOUBLE_WIRE_SIZE};
use crate::encapsulation::{self, Encapsulation};
use crate::error::{CdrError, CdrResult};
use crate::state::CodecState;
use crate::xcdr::{emheader, header, MemberDispatcher};
use crate::{Dialect, EncodingFlag, Endianness, MemberId};

/// Opaque handle returned by [`Decoder::begin_type`] and consumed by
/// [`Decoder::end_type`].
pub struct TypeState {
    encoding: EncodingFlag,
    end_bound: Option<usize>,
    prior_anchor: usize,
}

/// Reads typed values out of a byte slice following one CDR dialect.
pub struct Decoder<'a> {
    bytes: &'a [u8],
    current: usize,
    anchor: usize,
    swap: bool,
    stream_endianness: Endianness,
    last_data_size: usize,
    dialect: Dialect,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder over `bytes`, assuming `endianness`/`dialect`
    /// until (for DDS-style dialects) `read_encapsulation` overrides them
    /// from the wire.
    pub fn new(bytes: &'a [u8], endianness: Endianness, dialect: Dialect) -> Self {
        Decoder {
            bytes,
            current: 0,
            anchor: 0,
            swap: endianness != Endianness::HOST,
            stream_endianness: endianness,
            last_data_size: 0,
            dialect,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn stream_endianness(&self) -> Endianness {
        self.stream_endianness
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.current)
    }

    pub fn jump(&mut self, n_bytes: usize) -> CdrResult<()> {
        self.check_remaining(n_bytes)?;
        self.current += n_bytes;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.current = 0;
        self.anchor = 0;
        self.last_data_size = 0;
    }

    pub fn reset_alignment(&mut self) {
        self.anchor = self.current;
        self.last_data_size = 0;
    }

    pub fn get_state(&self) -> CodecState {
        CodecState {
            current: self.current,
            anchor: self.anchor,
            swap: self.swap,
            last_data_size: self.last_data_size,
        }
    }

    pub fn set_state(&mut self, state: CodecState) {
        self.current = state.current;
        self.anchor = state.anchor;
        self.swap = state.swap;
        self.last_data_size = state.last_data_size;
    }

    /// Validates that `needed` more bytes remain *before* any allocation
    /// sized from untrusted wire data (spec.md §9 REDESIGN FLAGS: the
    /// length-vs-remaining-bytes check must happen before, not after, the
    /// destination is sized).
    fn check_remaining(&self, needed: usize) -> CdrResult<()> {
        if self.remaining() < needed {
            return Err(CdrError::not_enough_memory(self.current, needed));
        }
        Ok(())
    }

    fn align_for(&mut self, size: usize) -> CdrResult<()> {
        if !self.dialect.aligns() || size <= self.last_data_size {
            return Ok(());
        }
        let padding = pad(self.current - self.anchor, size);
        if padding > 0 {
            self.check_remaining(padding)?;
            self.current += padding;
        }
        Ok(())
    }

    fn read_raw(&mut self, size: usize) -> CdrResult<&'a [u8]> {
        self.align_for(size)?;
        self.check_remaining(size)?;
        let start = self.current;
        self.current += size;
        self.last_data_size = size;
        Ok(&self.bytes[start..start + size])
    }

    /// Bulk copy with no endianness swap (spec.md §4.2 `rmemcopy`).
    pub fn rmemcopy(&mut self, n: usize) -> CdrResult<&'a [u8]> {
        self.check_remaining(n)?;
        let start = self.current;
        self.current += n;
        self.last_data_size = 1;
        Ok(&self.bytes[start..start + n])
    }

    // -- scalars ------------------------------------------------------------

    pub fn read_u8(&mut self) -> CdrResult<u8> {
        Ok(self.read_raw(1)?[0])
    }

    pub fn read_i8(&mut self) -> CdrResult<i8> {
        Ok(self.read_raw(1)?[0] as i8)
    }

    pub fn read_octet(&mut self) -> CdrResult<u8> {
        self.read_u8()
    }

    pub fn read_char(&mut self) -> CdrResult<u8> {
        self.read_u8()
    }

    pub fn read_bool(&mut self) -> CdrResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CdrError::bad_parameter(format!(
                "invalid boolean byte 0x{other:02x}"
            ))),
        }
    }
}

macro_rules! impl_read_scalar {
    ($name:ident, $ty:ty, $size:expr) => {
        impl<'a> Decoder<'a> {
            pub fn $name(&mut self) -> CdrResult<$ty> {
                let raw = self.read_raw($size)?;
                let mut bytes = [0u8; $size];
                bytes.copy_from_slice(raw);
                reverse_if(&mut bytes, self.swap);
                Ok(<$ty>::from_ne_bytes(bytes))
            }
        }
    };
}

impl_read_scalar!(read_u16, u16, 2);
impl_read_scalar!(read_i16, i16, 2);
impl_read_scalar!(read_u32, u32, 4);
impl_read_scalar!(read_i32, i32, 4);
impl_read_scalar!(read_u64, u64, 8);
impl_read_scalar!(read_i64, i64, 8);

impl<'a> Decoder<'a> {
    pub fn read_f32(&mut self) -> CdrResult<f32> {
        let raw = self.read_raw(4)?;
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(raw);
        reverse_if(&mut bytes, self.swap);
        Ok(f32::from_bits(u32::from_ne_bytes(bytes)))
    }

    pub fn read_f64(&mut self) -> CdrResult<f64> {
        let raw = self.read_raw(8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(raw);
        reverse_if(&mut bytes, self.swap);
        Ok(f64::from_bits(u64::from_ne_bytes(bytes)))
    }

    /// Reads the 16-byte long-double slot, returning the 8 significant
    /// bytes as `f64` (spec.md §4.4, §6).
    pub fn read_long_double(&mut self) -> CdrResult<f64> {
        self.align_for(LONG_DOUBLE_ALIGNMENT)?;
        self.check_remaining(LONG_DOUBLE_WIRE_SIZE)?;
        let start = self.current;
        let slot = &self.bytes[start..start + LONG_DOUBLE_WIRE_SIZE];
        let mut bytes = [0u8; 8];
        match self.stream_endianness {
            Endianness::Little => bytes.copy_from_slice(&slot[8..16]),
            Endianness::Big => bytes.copy_from_slice(&slot[0..8]),
        }
        reverse_if(&mut bytes, self.swap);
        self.current += LONG_DOUBLE_WIRE_SIZE;
        self.last_data_size = LONG_DOUBLE_WIRE_SIZE;
        Ok(f64::from_bits(u64::from_ne_bytes(bytes)))
    }

    // -- strings --------------------------------------------------------------

    pub fn read_string(&mut self) -> CdrResult<String> {
        let before = self.get_state();
        let result = (|| {
            let len = self.read_u32()? as usize;
            if len == 0 {
                return Ok(String::new());
            }
            self.check_remaining(len)?;
            let raw = self.rmemcopy(len)?;
            let without_nul = if raw.last() == Some(&0) {
                &raw[..raw.len() - 1]
            } else {
                raw
            };
            String::from_utf8(without_nul.to_vec())
                .map_err(|e| CdrError::bad_parameter(format!("string is not valid UTF-8: {e}")))
        })();
        if result.is_err() {
            self.set_state(before);
        }
        result
    }

    pub fn read_wstring(&mut self) -> CdrResult<String> {
        let before = self.get_state();
        let result = (|| {
            let count = self.read_u32()? as usize;
            self.check_remaining(count.saturating_mul(4))?;
            let mut units = Vec::with_capacity(count);
            for _ in 0..count {
                units.push(self.read_u32()?);
            }
            if units.last() == Some(&0) {
                units.pop();
            }
            Ok(units
                .into_iter()
                .map(|u| char::from_u32(u).unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect::<String>())
        })();
        if result.is_err() {
            self.set_state(before);
        }
        result
    }

    // -- arrays and sequences ---------------------------------------------------

    pub fn deserialize_array<T, F>(&mut self, count: usize, mut read_elem: F) -> CdrResult<Vec<T>>
    where
        F: FnMut(&mut Self) -> CdrResult<T>,
    {
        let before = self.get_state();
        let mut out = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            match read_elem(self) {
                Ok(v) => out.push(v),
                Err(e) => {
                    self.set_state(before);
                    return Err(e);
                }
            }
        }
        Ok(out)
    }

    /// Validates the declared element count against remaining bytes
    /// *before* allocating the destination vector (spec.md §9 REDESIGN
    /// FLAGS).
    pub fn deserialize_sequence<T, F>(&mut self, min_elem_size: usize, mut read_elem: F) -> CdrResult<Vec<T>>
    where
        F: FnMut(&mut Self) -> CdrResult<T>,
    {
        let before = self.get_state();
        let result = (|| {
            let count = self.read_u32()? as usize;
            self.check_remaining(count.saturating_mul(min_elem_size))?;
            let mut out = Vec::with_capacity(count.min(4096));
            for _ in 0..count {
                out.push(read_elem(self)?);
            }
            Ok(out)
        })();
        if result.is_err() {
            self.set_state(before);
        }
        result
    }

    pub fn deserialize_bool_sequence(&mut self) -> CdrResult<Vec<bool>> {
        self.deserialize_sequence(1, |dec| dec.read_bool())
    }

    pub fn deserialize_octet_array(&mut self, count: usize) -> CdrResult<&'a [u8]> {
        self.rmemcopy(count)
    }

    // -- encapsulation --------------------------------------------------------

    /// Reads the 4-byte encapsulation preamble, adopting the wire's
    /// endianness/dialect/encoding flag, and resets the alignment anchor
    /// just past it (spec.md §4.7).
    pub fn read_encapsulation(&mut self) -> CdrResult<Encapsulation> {
        if !self.dialect.is_dds_style() {
            return Ok(Encapsulation {
                endianness: self.stream_endianness,
                dialect: self.dialect,
                encoding_flag: EncodingFlag::PlainCdr,
                options: 0,
            });
        }

        let before = self.get_state();
        let result = (|| {
            let dummy = self.read_u8()?;
            if dummy != 0 {
                return Err(CdrError::bad_parameter(
                    "unexpected non-zero initial byte in encapsulation",
                ));
            }
            let kind = self.read_u8()?;
            let mut enc = encapsulation::decode_kind(kind, self.dialect)?;
            let options = self.read_u16_raw_for_options(enc.endianness)?;
            enc.options = options;
            Ok(enc)
        })();

        match result {
            Ok(enc) => {
                self.swap = enc.endianness != Endianness::HOST;
                self.stream_endianness = enc.endianness;
                self.dialect = enc.dialect;
                self.reset_alignment();
                Ok(enc)
            }
            Err(e) => {
                self.set_state(before);
                Err(e)
            }
        }
    }

    /// The 16-bit options field is read using the endianness just decoded
    /// from the `kind` byte, which may differ from `self.swap` if this is
    /// the first time the stream's real endianness is known.
    fn read_u16_raw_for_options(&mut self, endianness: Endianness) -> CdrResult<u16> {
        let swap = endianness != Endianness::HOST;
        let raw = self.read_raw(2)?;
        let mut bytes = [0u8; 2];
        bytes.copy_from_slice(raw);
        reverse_if(&mut bytes, swap);
        Ok(u16::from_ne_bytes(bytes))
    }

    // -- XCDR member dispatch ---------------------------------------------------

    /// Starts an aggregate. For `DelimitCdr2`/`PlCdr2`, reads the 4-byte
    /// DHEADER and records the byte offset it bounds; otherwise a no-op.
    pub fn begin_type(&mut self, encoding: EncodingFlag) -> CdrResult<TypeState> {
        let prior_anchor = self.anchor;
        let end_bound = match encoding {
            EncodingFlag::DelimitCdr2 | EncodingFlag::PlCdr2 => {
                let len = self.read_u32()? as usize;
                self.reset_alignment();
                Some(self.current + len)
            }
            EncodingFlag::PlainCdr | EncodingFlag::PlCdr | EncodingFlag::PlainCdr2 => None,
        };
        Ok(TypeState {
            encoding,
            end_bound,
            prior_anchor,
        })
    }

    /// Ends an aggregate opened by `begin_type`: consumes/validates the
    /// PL_CDR v1 sentinel, or skips any trailing unknown bytes up to the
    /// DHEADER bound (spec.md §4.9: "decoders MUST skip trailing unknown
    /// bytes up to DHEADER to forward-compatibly ignore added fields").
    pub fn end_type(&mut self, state: TypeState) -> CdrResult<()> {
        match state.encoding {
            EncodingFlag::PlCdr => {
                self.align_for(4)?;
                let raw = self.rmemcopy(4)?;
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(raw);
                if !header::is_sentinel(bytes, self.swap) {
                    return Err(CdrError::bad_parameter("expected PL_CDR sentinel, found other bytes"));
                }
            }
            EncodingFlag::DelimitCdr2 | EncodingFlag::PlCdr2 => {
                let bound = state
                    .end_bound
                    .expect("DelimitCdr2/PlCdr2 always record an end bound in begin_type");
                if bound < self.current {
                    return Err(CdrError::bad_parameter("DHEADER bound smaller than bytes consumed"));
                }
                self.current = bound;
            }
            EncodingFlag::PlainCdr | EncodingFlag::PlainCdr2 => {}
        }
        self.anchor = state.prior_anchor;
        Ok(())
    }

    /// Drives the member-dispatch decode loop for `PlCdr`/`PlCdr2`
    /// aggregates. For `PlainCdr`/`PlainCdr2` (positional, no per-member
    /// framing) this is a no-op: the caller reads fields directly.
    pub fn deserialize_type(
        &mut self,
        encoding: EncodingFlag,
        mut dispatcher: impl MemberDispatcher,
    ) -> CdrResult<()> {
        match encoding {
            EncodingFlag::PlainCdr | EncodingFlag::PlainCdr2 | EncodingFlag::DelimitCdr2 => Ok(()),
            EncodingFlag::PlCdr => self.deserialize_pl_cdr_v1(&mut dispatcher),
            EncodingFlag::PlCdr2 => self.deserialize_pl_cdr2(&mut dispatcher),
        }
    }

    fn deserialize_pl_cdr_v1(&mut self, dispatcher: &mut impl MemberDispatcher) -> CdrResult<()> {
        loop {
            self.align_for(4)?;
            let raw = self.rmemcopy(4)?;
            let mut id_bytes = [0u8; 2];
            id_bytes.copy_from_slice(&raw[0..2]);
            if header::is_long_marker(id_bytes, self.swap) {
                let mut rest = [0u8; 12];
                rest[0..4].copy_from_slice(raw);
                let more = self.rmemcopy(8)?;
                rest[4..12].copy_from_slice(more);
                let (id, len) = header::decode_long(rest, self.swap);
                let member_end = self.current + len as usize;
                self.check_remaining(member_end.saturating_sub(self.current))?;
                dispatcher.dispatch(self, id)?;
                self.current = member_end;
                continue;
            }

            let mut bytes4 = [0u8; 4];
            bytes4.copy_from_slice(raw);
            if header::is_sentinel(bytes4, self.swap) {
                return Ok(());
            }
            let (id, len) = header::decode_short(bytes4, self.swap);
            let member_end = self.current + len as usize;
            self.check_remaining(member_end.saturating_sub(self.current))?;
            dispatcher.dispatch(self, u32::from(id))?;
            self.current = member_end;
        }
    }

    fn deserialize_pl_cdr2(&mut self, dispatcher: &mut impl MemberDispatcher) -> CdrResult<()> {
        let len = self.read_u32()? as usize;
        self.reset_alignment();
        let end = self.current + len;

        while self.current < end {
            self.align_for(4)?;
            let raw = self.rmemcopy(4)?;
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(raw);
            let (member_id, _must_understand, length_code) = emheader::decode(bytes, self.swap);

            // length_code 0..=3 declares the payload is exactly 1/2/4/8 bytes
            // with no extra length word; 4..=7 are all followed by a 32-bit
            // NEXTINT length word (spec.md §4.9), not just the literal
            // `NextInt` code value.
            let member_len = if length_code >= emheader::LengthCode::NextInt as u32 {
                let raw_len = self.rmemcopy(4)?;
                let mut len_bytes = [0u8; 4];
                len_bytes.copy_from_slice(raw_len);
                emheader::decode_length_word(len_bytes, self.swap) as usize
            } else {
                1usize << length_code
            };
            let member_end = (self.current + member_len).min(end);

            dispatcher.dispatch(self, member_id)?;
            self.current = member_end;
        }
        self.current = end;
        Ok(())
    }
}
