// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Write half of the codec core.
//!
//! Grounded on `eprosima::fastcdr::Cdr`'s serialize methods
//! (`original_source/src/cpp/Cdr.cpp`) and `FastCdr.cpp` for the
//! no-alignment sibling, generalized to one type parameterized by
//! [`crate::Dialect`] rather than eProsima's separate `Cdr`/`FastCdr`
//! classes.

use crate::align::pad;
use crate::codec::{reverse_if, LONG_DOUBLE_ALIGNMENT, LONG_DOUBLE_WIRE_SIZE};
use crate::encapsulation;
use crate::error::{CdrError, CdrResult};
use crate::state::CodecState;
use crate::xcdr::{emheader, header};
use crate::{Dialect, EncodingFlag, Endianness, HeaderSelection, MemberId};
use crate::Buffer;

/// Opaque handle returned by [`Encoder::begin_type`] and consumed by
/// [`Encoder::end_type`]. Carries whatever bookkeeping that pair needs to
/// stay balanced (spec.md §3: "every `begin_type` is followed by exactly
/// one `end_type` with the matching encoding flag").
pub struct TypeState {
    encoding: EncodingFlag,
    dheader_pos: Option<usize>,
    prior_anchor: usize,
}

/// Writes typed values into a [`Buffer`] following one CDR dialect.
pub struct Encoder<'a> {
    buffer: Buffer<'a>,
    current: usize,
    anchor: usize,
    swap: bool,
    stream_endianness: Endianness,
    last_data_size: usize,
    dialect: Dialect,
    pl_flag: bool,
    xcdr2_encoding_flag: EncodingFlag,
    options: u16,
}

impl<'a> Encoder<'a> {
    /// Creates an encoder over a fresh owned, growable buffer.
    pub fn new_owned(endianness: Endianness, dialect: Dialect) -> Self {
        Self::with_buffer(Buffer::allocate(), endianness, dialect)
    }

    /// Creates an encoder wrapping caller-provided memory. Writes beyond
    /// `bytes.len()` fail with [`CdrError::NotEnoughMemory`].
    pub fn wrap(bytes: &'a mut [u8], endianness: Endianness, dialect: Dialect) -> Self {
        Self::with_buffer(Buffer::wrap(bytes), endianness, dialect)
    }

    fn with_buffer(buffer: Buffer<'a>, endianness: Endianness, dialect: Dialect) -> Self {
        Encoder {
            buffer,
            current: 0,
            anchor: 0,
            swap: endianness != Endianness::HOST,
            stream_endianness: endianness,
            last_data_size: 0,
            dialect,
            pl_flag: false,
            xcdr2_encoding_flag: EncodingFlag::PlainCdr2,
            options: 0,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Switches the dialect an already-constructed encoder speaks, without
    /// touching anything already written. Mirrors the reassignment
    /// `Decoder::read_encapsulation` performs once a stream's real dialect
    /// is known, for the symmetric case of choosing it up front.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn stream_endianness(&self) -> Endianness {
        self.stream_endianness
    }

    // -- cursor/state machinery -------------------------------------------------

    /// Number of bytes written so far (spec.md §6 `get_serialized_data_length`).
    pub fn serialized_len(&self) -> usize {
        self.current
    }

    /// Returns the bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer.as_slice()[..self.current]
    }

    /// Moves the cursor forward by `n` bytes without writing, growing the
    /// buffer if necessary (grounded on `Cdr::jump`/`FastCdr::jump`).
    pub fn jump(&mut self, n_bytes: usize) -> CdrResult<()> {
        self.ensure_room(n_bytes)?;
        self.current += n_bytes;
        Ok(())
    }

    /// Resets the cursor (and alignment anchor) to the start of the
    /// buffer, without releasing capacity. Repeated `reset(); encode(V)`
    /// calls must produce identical bytes (spec.md §8 idempotence).
    pub fn reset(&mut self) {
        self.current = 0;
        self.anchor = 0;
        self.last_data_size = 0;
    }

    /// Re-bases the alignment anchor to the current cursor without moving
    /// it. Used when entering a nested aggregate that restarts alignment.
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

    fn ensure_room(&mut self, additional: usize) -> CdrResult<()> {
        let needed = self.current + additional;
        if self.buffer.len() < needed && !self.buffer.ensure_capacity(needed) {
            return Err(CdrError::not_enough_memory(self.current, additional));
        }
        Ok(())
    }

    /// Advances past any padding required before a primitive of natural
    /// size `size`, per spec.md §4.3. Skips the padding computation when
    /// `size <= last_data_size`: the previous primitive already left the
    /// cursor aligned to at least `size` (both are powers of two).
    fn align_for(&mut self, size: usize) -> CdrResult<()> {
        if !self.dialect.aligns() || size <= self.last_data_size {
            return Ok(());
        }
        let padding = pad(self.current - self.anchor, size);
        if padding > 0 {
            self.ensure_room(padding)?;
            let start = self.current;
            self.buffer.as_mut_slice()[start..start + padding].fill(0);
            self.current += padding;
        }
        Ok(())
    }

    fn write_raw(&mut self, size: usize, bytes: &[u8]) -> CdrResult<()> {
        self.align_for(size)?;
        self.ensure_room(size)?;
        let start = self.current;
        self.buffer.as_mut_slice()[start..start + size].copy_from_slice(bytes);
        self.current += size;
        self.last_data_size = size;
        Ok(())
    }

    /// Bulk copy with no endianness swap (spec.md §4.2 `memcopy`), used for
    /// octet/char arrays and string payloads.
    pub fn memcopy(&mut self, data: &[u8]) -> CdrResult<()> {
        self.ensure_room(data.len())?;
        let start = self.current;
        self.buffer.as_mut_slice()[start..start + data.len()].copy_from_slice(data);
        self.current += data.len();
        self.last_data_size = 1;
        Ok(())
    }

    // -- scalars ------------------------------------------------------------

    pub fn write_u8(&mut self, value: u8) -> CdrResult<()> {
        self.write_raw(1, &value.to_ne_bytes())
    }

    pub fn write_i8(&mut self, value: i8) -> CdrResult<()> {
        self.write_raw(1, &value.to_ne_bytes())
    }

    pub fn write_octet(&mut self, value: u8) -> CdrResult<()> {
        self.write_u8(value)
    }

    pub fn write_char(&mut self, value: u8) -> CdrResult<()> {
        self.write_u8(value)
    }

    pub fn write_bool(&mut self, value: bool) -> CdrResult<()> {
        self.write_u8(if value { 1 } else { 0 })
    }
}

macro_rules! impl_write_scalar {
    ($name:ident, $ty:ty, $size:expr) => {
        impl<'a> Encoder<'a> {
            pub fn $name(&mut self, value: $ty) -> CdrResult<()> {
                let mut bytes = value.to_ne_bytes();
                reverse_if(&mut bytes, self.swap);
                self.write_raw($size, &bytes)
            }
        }
    };
}

impl_write_scalar!(write_u16, u16, 2);
impl_write_scalar!(write_i16, i16, 2);
impl_write_scalar!(write_u32, u32, 4);
impl_write_scalar!(write_i32, i32, 4);
impl_write_scalar!(write_u64, u64, 8);
impl_write_scalar!(write_i64, i64, 8);

impl<'a> Encoder<'a> {
    pub fn write_f32(&mut self, value: f32) -> CdrResult<()> {
        let mut bytes = value.to_bits().to_ne_bytes();
        reverse_if(&mut bytes, self.swap);
        self.write_raw(4, &bytes)
    }

    pub fn write_f64(&mut self, value: f64) -> CdrResult<()> {
        let mut bytes = value.to_bits().to_ne_bytes();
        reverse_if(&mut bytes, self.swap);
        self.write_raw(8, &bytes)
    }

    /// Writes the 16-byte long-double slot (spec.md §4.4, §6). Rust has no
    /// native 16-byte float; the 8 significant bytes come from `value`,
    /// padded with 8 zero bytes positioned per the *stream* endianness
    /// (leading in little-endian streams, trailing in big-endian ones).
    pub fn write_long_double(&mut self, value: f64) -> CdrResult<()> {
        self.align_for(LONG_DOUBLE_ALIGNMENT)?;
        self.ensure_room(LONG_DOUBLE_WIRE_SIZE)?;
        let mut bytes = value.to_bits().to_ne_bytes();
        reverse_if(&mut bytes, self.swap);
        let start = self.current;
        match self.stream_endianness {
            Endianness::Little => {
                self.buffer.as_mut_slice()[start..start + 8].fill(0);
                self.buffer.as_mut_slice()[start + 8..start + 16].copy_from_slice(&bytes);
            }
            Endianness::Big => {
                self.buffer.as_mut_slice()[start..start + 8].copy_from_slice(&bytes);
                self.buffer.as_mut_slice()[start + 8..start + 16].fill(0);
            }
        }
        self.current += LONG_DOUBLE_WIRE_SIZE;
        self.last_data_size = LONG_DOUBLE_WIRE_SIZE;
        Ok(())
    }

    // -- strings --------------------------------------------------------------

    /// Classic narrow string: 4-byte length (including NUL) + bytes + NUL
    /// (spec.md §4.5). An empty string is encoded with length 1 (just the
    /// terminator) to match the "0 denotes absent/empty, MUST accept"
    /// language alongside the NUL-terminated wire shape in the table.
    pub fn write_string(&mut self, value: &str) -> CdrResult<()> {
        let before = self.get_state();
        let result = (|| {
            let len = value.len() + 1;
            self.write_u32(len as u32)?;
            self.memcopy(value.as_bytes())?;
            self.memcopy(&[0u8])?;
            Ok(())
        })();
        if result.is_err() {
            self.set_state(before);
        }
        result
    }

    /// Wide string: 4-byte code-unit count + N 32-bit code units, no
    /// terminator (spec.md §4.5).
    pub fn write_wstring(&mut self, value: &str) -> CdrResult<()> {
        let before = self.get_state();
        let result = (|| {
            let units: Vec<u32> = value.chars().map(|c| c as u32).collect();
            self.write_u32(units.len() as u32)?;
            for unit in units {
                self.write_u32(unit)?;
            }
            Ok(())
        })();
        if result.is_err() {
            self.set_state(before);
        }
        result
    }

    // -- arrays and sequences ---------------------------------------------------

    /// Fixed-length array of `T`: `K` copies back to back, each aligned,
    /// no length prefix (spec.md §4.6).
    pub fn serialize_array<T, F>(&mut self, items: &[T], mut write_elem: F) -> CdrResult<()>
    where
        F: FnMut(&mut Self, &T) -> CdrResult<()>,
    {
        let before = self.get_state();
        for item in items {
            if let Err(e) = write_elem(self, item) {
                self.set_state(before);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Variable-length sequence: 4-byte element count + N copies of `T`
    /// (spec.md §4.6).
    pub fn serialize_sequence<T, F>(&mut self, items: &[T], mut write_elem: F) -> CdrResult<()>
    where
        F: FnMut(&mut Self, &T) -> CdrResult<()>,
    {
        let before = self.get_state();
        let result = (|| {
            self.write_u32(items.len() as u32)?;
            for item in items {
                write_elem(self, item)?;
            }
            Ok(())
        })();
        if result.is_err() {
            self.set_state(before);
        }
        result
    }

    /// `vector<bool>` gets its own path: length N, then N bytes each 0/1
    /// (spec.md §4.6).
    pub fn serialize_bool_sequence(&mut self, items: &[bool]) -> CdrResult<()> {
        self.serialize_sequence(items, |enc, b| enc.write_bool(*b))
    }

    /// Contiguous blit of a byte (octet/char) array — only correct because
    /// single-byte elements never need swapping.
    pub fn serialize_octet_array(&mut self, items: &[u8]) -> CdrResult<()> {
        self.memcopy(items)
    }

    // -- encapsulation --------------------------------------------------------

    /// Writes the 4-byte encapsulation preamble (CORBA CDR never calls
    /// this; DDS/XCDR dialects always do). Resets the alignment anchor to
    /// just past the preamble.
    pub fn serialize_encapsulation(&mut self) -> CdrResult<()> {
        if !self.dialect.is_dds_style() {
            return Ok(());
        }
        self.write_u8(0)?;
        let kind = match self.dialect {
            Dialect::XCdrV2 => encapsulation::xcdr2_kind(self.stream_endianness, self.xcdr2_encoding_flag),
            _ => encapsulation::classic_kind(self.stream_endianness, self.pl_flag),
        };
        self.write_u8(kind)?;
        self.write_u16(self.options)?;
        self.reset_alignment();
        Ok(())
    }

    /// Sets the PL flag `serialize_encapsulation` will write for classic
    /// DDS/XCDRv1 dialects (selects PL_CDR vs plain DDS_CDR).
    pub fn set_pl_flag(&mut self, pl_flag: bool) {
        self.pl_flag = pl_flag;
    }

    /// Selects which of the three XCDRv2 encoding flags
    /// (`PlainCdr2`/`DelimitCdr2`/`PlCdr2`) `serialize_encapsulation` writes
    /// into the `kind` byte. Only meaningful for `Dialect::XCdrV2`; ignored
    /// otherwise. Defaults to `PlainCdr2`.
    pub fn set_xcdr2_encoding_flag(&mut self, encoding_flag: EncodingFlag) {
        self.xcdr2_encoding_flag = encoding_flag;
    }

    pub fn set_options(&mut self, options: u16) {
        self.options = options;
    }

    // -- XCDR member dispatch ---------------------------------------------------

    /// Starts an aggregate. For `DelimitCdr2`/`PlCdr2` under XCDRv2,
    /// reserves 4 bytes for the DHEADER and resets the anchor; otherwise a
    /// no-op (spec.md §4.9).
    pub fn begin_type(&mut self, encoding: EncodingFlag) -> CdrResult<TypeState> {
        let prior_anchor = self.anchor;
        let dheader_pos = match encoding {
            EncodingFlag::DelimitCdr2 | EncodingFlag::PlCdr2 => {
                let pos = self.current;
                self.write_u32(0)?;
                self.reset_alignment();
                Some(pos)
            }
            EncodingFlag::PlainCdr | EncodingFlag::PlCdr | EncodingFlag::PlainCdr2 => None,
        };
        Ok(TypeState {
            encoding,
            dheader_pos,
            prior_anchor,
        })
    }

    /// Ends an aggregate opened by `begin_type`, emitting the PL_CDR v1
    /// sentinel or back-patching the DHEADER, as the encoding requires.
    pub fn end_type(&mut self, state: TypeState) -> CdrResult<()> {
        match state.encoding {
            EncodingFlag::PlCdr => {
                self.align_for(4)?;
                let sentinel = header::sentinel(self.swap);
                self.memcopy(&sentinel)?;
            }
            EncodingFlag::DelimitCdr2 | EncodingFlag::PlCdr2 => {
                let pos = state
                    .dheader_pos
                    .expect("DelimitCdr2/PlCdr2 always reserve a DHEADER in begin_type");
                let body_len = (self.current - (pos + 4)) as u32;
                let mut bytes = body_len.to_ne_bytes();
                reverse_if(&mut bytes, self.swap);
                self.buffer.as_mut_slice()[pos..pos + 4].copy_from_slice(&bytes);
            }
            EncodingFlag::PlainCdr | EncodingFlag::PlainCdr2 => {}
        }
        self.anchor = state.prior_anchor;
        Ok(())
    }

    /// Serializes one XCDR member. `selection` only governs the XCDRv1
    /// (`PlCdr`) short/long header choice; XCDRv2 (`PlCdr2`) always uses
    /// the NEXTINT form of EMHEADER1 so the payload length never needs to
    /// be known up front.
    pub fn serialize_member<F>(
        &mut self,
        id: MemberId,
        encoding: EncodingFlag,
        selection: HeaderSelection,
        mut write_payload: F,
    ) -> CdrResult<()>
    where
        F: FnMut(&mut Self) -> CdrResult<()>,
    {
        match encoding {
            EncodingFlag::PlCdr => self.serialize_member_v1(id, selection, write_payload),
            EncodingFlag::PlCdr2 => self.serialize_member_v2(id, write_payload),
            _ => write_payload(self),
        }
    }

    fn serialize_member_v1<F>(
        &mut self,
        id: MemberId,
        selection: HeaderSelection,
        mut write_payload: F,
    ) -> CdrResult<()>
    where
        F: FnMut(&mut Self) -> CdrResult<()>,
    {
        let use_short = match selection {
            HeaderSelection::Short | HeaderSelection::AutoWithShortDefault => true,
            HeaderSelection::Long | HeaderSelection::AutoWithLongDefault => false,
        };

        if use_short && id > u32::from(header::SHORT_ID_LIMIT) {
            if matches!(selection, HeaderSelection::Short) {
                return Err(CdrError::bad_parameter(format!(
                    "member id {id} exceeds PL_CDR short header capacity"
                )));
            }
            return self.serialize_member_v1_long(id, write_payload);
        }

        if use_short {
            let before = self.get_state();
            self.align_for(4)?;
            let header_pos = self.current;
            self.memcopy(&header::encode_short(id as u16, 0, self.swap))?;
            let payload_start = self.current;
            if let Err(e) = write_payload(self) {
                self.set_state(before);
                return Err(e);
            }
            let len = self.current - payload_start;
            if len > usize::from(header::SHORT_LEN_LIMIT) {
                if matches!(selection, HeaderSelection::Short) {
                    self.set_state(before);
                    return Err(CdrError::bad_parameter(format!(
                        "member {id} payload of {len} bytes exceeds PL_CDR short header capacity"
                    )));
                }
                self.set_state(before);
                return self.serialize_member_v1_long(id, write_payload);
            }
            let patched = header::encode_short(id as u16, len as u16, self.swap);
            self.buffer.as_mut_slice()[header_pos..header_pos + 4].copy_from_slice(&patched);
            Ok(())
        } else {
            self.serialize_member_v1_long(id, write_payload)
        }
    }

    fn serialize_member_v1_long<F>(&mut self, id: MemberId, mut write_payload: F) -> CdrResult<()>
    where
        F: FnMut(&mut Self) -> CdrResult<()>,
    {
        let before = self.get_state();
        self.align_for(4)?;
        let header_pos = self.current;
        self.memcopy(&header::encode_long(id, 0, self.swap))?;
        let payload_start = self.current;
        if let Err(e) = write_payload(self) {
            self.set_state(before);
            return Err(e);
        }
        let len = (self.current - payload_start) as u32;
        let patched = header::encode_long(id, len, self.swap);
        self.buffer.as_mut_slice()[header_pos..header_pos + 12].copy_from_slice(&patched);
        Ok(())
    }

    fn serialize_member_v2<F>(&mut self, id: MemberId, mut write_payload: F) -> CdrResult<()>
    where
        F: FnMut(&mut Self) -> CdrResult<()>,
    {
        let before = self.get_state();
        self.align_for(4)?;
        self.memcopy(&emheader::encode(id, false, emheader::LengthCode::NextInt, self.swap))?;
        let nextint_pos = self.current;
        self.write_u32(0)?;
        let payload_start = self.current;
        if let Err(e) = write_payload(self) {
            self.set_state(before);
            return Err(e);
        }
        let len = (self.current - payload_start) as u32;
        let mut bytes = len.to_ne_bytes();
        reverse_if(&mut bytes, self.swap);
        self.buffer.as_mut_slice()[nextint_pos..nextint_pos + 4].copy_from_slice(&bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Dialect;

    #[test]
    fn scenario_1_plain_u32_little_endian() {
        let mut enc = Encoder::new_owned(Endianness::Little, Dialect::CorbaCdr);
        enc.write_u32(0x1234_5678).unwrap();
        assert_eq!(enc.as_slice(), &[0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn scenario_2_padding_between_octet_and_u32() {
        let mut enc = Encoder::new_owned(Endianness::Little, Dialect::CorbaCdr);
        enc.write_u8(0x01).unwrap();
        enc.write_u32(0x0203_0405).unwrap();
        assert_eq!(
            enc.as_slice(),
            &[0x01, 0x00, 0x00, 0x00, 0x05, 0x04, 0x03, 0x02]
        );
    }

    #[test]
    fn scenario_3_narrow_string() {
        let mut enc = Encoder::new_owned(Endianness::Little, Dialect::CorbaCdr);
        enc.write_string("Hi").unwrap();
        assert_eq!(enc.as_slice(), &[0x03, 0x00, 0x00, 0x00, b'H', b'i', 0x00]);
    }

    #[test]
    fn scenario_4_u16_sequence() {
        let mut enc = Encoder::new_owned(Endianness::Little, Dialect::CorbaCdr);
        enc.serialize_sequence(&[0x0Au16, 0x0B], |e, v| e.write_u16(*v))
            .unwrap();
        assert_eq!(
            enc.as_slice(),
            &[0x02, 0x00, 0x00, 0x00, 0x0A, 0x00, 0x0B, 0x00]
        );
    }

    #[test]
    fn scenario_5_dds_encapsulation_little_endian() {
        let mut enc = Encoder::new_owned(Endianness::Little, Dialect::DdsCdr);
        enc.serialize_encapsulation().unwrap();
        enc.write_u16(0xBEEF).unwrap();
        assert_eq!(
            enc.as_slice(),
            &[0x00, 0x01, 0x00, 0x00, 0xEF, 0xBE]
        );
    }

    #[test]
    fn xcdr_v2_delimit_cdr2_encapsulation_round_trips() {
        use crate::decoder::Decoder;

        let mut enc = Encoder::new_owned(Endianness::Little, Dialect::XCdrV2);
        enc.set_xcdr2_encoding_flag(EncodingFlag::DelimitCdr2);
        enc.serialize_encapsulation().unwrap();
        let outer = enc.begin_type(EncodingFlag::DelimitCdr2).unwrap();
        enc.write_u32(7).unwrap();
        enc.write_u16(9).unwrap();
        enc.end_type(outer).unwrap();

        let bytes = enc.as_slice().to_vec();
        let mut dec = Decoder::new(&bytes, Endianness::Little, Dialect::XCdrV2);
        let info = dec.read_encapsulation().unwrap();
        assert_eq!(info.encoding_flag, EncodingFlag::DelimitCdr2);
        let inner = dec.begin_type(info.encoding_flag).unwrap();
        assert_eq!(dec.read_u32().unwrap(), 7);
        assert_eq!(dec.read_u16().unwrap(), 9);
        dec.end_type(inner).unwrap();
    }

    #[test]
    fn pl_cdr_v1_member_headers_are_4_aligned() {
        // id=1 carries a u16 payload (ends 2-aligned, not 4-aligned), so the
        // next member's short header must be preceded by 2 padding bytes
        // (examples/original_source/test/xcdr/mutable.cpp's "Alignment"
        // fixture after a 1-byte member, generalized to any non-4-aligned
        // payload end).
        let mut enc = Encoder::new_owned(Endianness::Little, Dialect::XCdrV1);
        enc.set_pl_flag(true);
        enc.serialize_encapsulation().unwrap();
        let outer = enc.begin_type(EncodingFlag::PlCdr).unwrap();
        enc.serialize_member(1, EncodingFlag::PlCdr, HeaderSelection::AutoWithShortDefault, |e| {
            e.write_u16(0xAAAA)
        })
        .unwrap();
        enc.serialize_member(2, EncodingFlag::PlCdr, HeaderSelection::AutoWithShortDefault, |e| {
            e.write_u32(0xBBBB_BBBB)
        })
        .unwrap();
        enc.end_type(outer).unwrap();

        assert_eq!(
            enc.as_slice(),
            &[
                0x00, 0x03, 0x00, 0x00, // encapsulation: PL_LE, options=0
                0x01, 0x00, 0x02, 0x00, // short header: id=1 len=2
                0xAA, 0xAA, // payload: uint16
                0x00, 0x00, // alignment padding before the next header
                0x02, 0x00, 0x04, 0x00, // short header: id=2 len=4
                0xBB, 0xBB, 0xBB, 0xBB, // payload: uint32
                0x02, 0x3F, 0x00, 0x00, // sentinel
            ]
        );

        let mut calc = crate::SizeCalculator::new(Dialect::XCdrV1);
        calc.add_encapsulation();
        let outer = calc.begin_type(EncodingFlag::PlCdr);
        calc.add_member(1, EncodingFlag::PlCdr, |c| c.add_u16());
        calc.add_member(2, EncodingFlag::PlCdr, |c| c.add_u32());
        calc.end_type(outer);
        assert_eq!(calc.serialized_len(), enc.serialized_len());

        let bytes = enc.as_slice().to_vec();
        let mut dec = crate::Decoder::new(&bytes, Endianness::Little, Dialect::XCdrV1);
        dec.read_encapsulation().unwrap();
        let mut seen_1 = None;
        let mut seen_2 = None;
        let inner = dec.begin_type(EncodingFlag::PlCdr).unwrap();
        dec.deserialize_type(EncodingFlag::PlCdr, |d: &mut crate::Decoder<'_>, id| match id {
            1 => {
                seen_1 = Some(d.read_u16()?);
                Ok(true)
            }
            2 => {
                seen_2 = Some(d.read_u32()?);
                Ok(true)
            }
            _ => Ok(false),
        })
        .unwrap();
        dec.end_type(inner).unwrap();
        assert_eq!(seen_1, Some(0xAAAA));
        assert_eq!(seen_2, Some(0xBBBB_BBBB));
    }

    #[test]
    fn fast_cdr_never_pads() {
        let mut enc = Encoder::new_owned(Endianness::Little, Dialect::FastCdr);
        enc.write_u8(1).unwrap();
        enc.write_u32(2).unwrap();
        assert_eq!(enc.serialized_len(), 5);
    }

    #[test]
    fn snapshot_restore_identity() {
        let mut enc = Encoder::new_owned(Endianness::Little, Dialect::CorbaCdr);
        enc.write_u32(1).unwrap();
        let s = enc.get_state();
        enc.write_u64(2).unwrap();
        enc.set_state(s);
        assert_eq!(enc.serialized_len(), 4);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut enc = Encoder::new_owned(Endianness::Little, Dialect::CorbaCdr);
        enc.write_u32(42).unwrap();
        let first = enc.as_slice().to_vec();
        enc.reset();
        enc.write_u32(42).unwrap();
        assert_eq!(enc.as_slice(), first.as_slice());
    }

    #[test]
    fn wrap_fails_when_out_of_room() {
        let mut bytes = [0u8; 2];
        let mut enc = Encoder::wrap(&mut bytes, Endianness::Little, Dialect::CorbaCdr);
        let err = enc.write_u32(1).unwrap_err();
        assert!(matches!(err, CdrError::NotEnoughMemory { .. }));
    }

    #[test]
    fn xcdr_v1_member_dispatch_matches_scenario_6() {
        let mut enc = Encoder::new_owned(Endianness::Big, Dialect::XCdrV1);
        enc.set_pl_flag(true);
        enc.serialize_encapsulation().unwrap();
        let outer = enc.begin_type(EncodingFlag::PlCdr).unwrap();
        enc.serialize_member(3, EncodingFlag::PlCdr, HeaderSelection::AutoWithShortDefault, |e| {
            e.write_u32(0xCD)
        })
        .unwrap();
        enc.serialize_member(16, EncodingFlag::PlCdr, HeaderSelection::AutoWithShortDefault, |e| {
            e.write_u16(0xCD)
        })
        .unwrap();
        enc.end_type(outer).unwrap();
        assert_eq!(
            enc.as_slice(),
            &[
                0x00, 0x02, 0x00, 0x00, // encapsulation (PL, big endian)
                0x00, 0x03, 0x00, 0x04, // short header: id=3 len=4
                0x00, 0x00, 0x00, 0xCD, // member payload
                0x00, 0x10, 0x00, 0x02, // short header: id=16 len=2
                0x00, 0xCD, // member payload
                0x00, 0x00, // alignment padding before the sentinel
                0x3F, 0x02, 0x00, 0x00, // sentinel
            ]
        );
    }
}
