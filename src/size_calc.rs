// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! A write-free sibling of [`crate::Encoder`] that predicts encoded
//! length, including headers, sentinels, DHEADERs and the encapsulation
//! preamble.
//!
//! Grounded on `eprosima::fastcdr::CdrSizeCalculator`
//! (`original_source/src/cpp/CdrSizeCalculator.cpp`): same
//! `begin_calculate_type_serialized_size`/`end_calculate_type_serialized_size`
//! shape, generalized from its single XCDRv2-vs-classic split to all four
//! [`crate::EncodingFlag`] variants so it can be checked byte-for-byte
//! against [`crate::Encoder::serialized_len`] (spec.md §8).

use crate::align::pad;
use crate::codec::{LONG_DOUBLE_ALIGNMENT, LONG_DOUBLE_WIRE_SIZE};
use crate::{Dialect, EncodingFlag};

/// Opaque handle returned by [`SizeCalculator::begin_type`] and consumed
/// by [`SizeCalculator::end_type`], mirroring [`crate::encoder::TypeState`].
pub struct TypeState {
    encoding: EncodingFlag,
    reserved_dheader: bool,
    prior_anchor: usize,
}

/// Accumulates an encoded length without touching a buffer.
pub struct SizeCalculator {
    offset: usize,
    anchor: usize,
    last_data_size: usize,
    dialect: Dialect,
}

impl SizeCalculator {
    pub fn new(dialect: Dialect) -> Self {
        SizeCalculator {
            offset: 0,
            anchor: 0,
            last_data_size: 0,
            dialect,
        }
    }

    pub fn serialized_len(&self) -> usize {
        self.offset
    }

    pub fn reset(&mut self) {
        self.offset = 0;
        self.anchor = 0;
        self.last_data_size = 0;
    }

    pub fn reset_alignment(&mut self) {
        self.anchor = self.offset;
        self.last_data_size = 0;
    }

    fn account_for(&mut self, size: usize) {
        if self.dialect.aligns() && size > self.last_data_size {
            self.offset += pad(self.offset - self.anchor, size);
        }
        self.offset += size;
        self.last_data_size = size;
    }

    pub fn add_u8(&mut self) {
        self.account_for(1);
    }
    pub fn add_bool(&mut self) {
        self.account_for(1);
    }
    pub fn add_u16(&mut self) {
        self.account_for(2);
    }
    pub fn add_u32(&mut self) {
        self.account_for(4);
    }
    pub fn add_u64(&mut self) {
        self.account_for(8);
    }
    pub fn add_f32(&mut self) {
        self.account_for(4);
    }
    pub fn add_f64(&mut self) {
        self.account_for(8);
    }

    /// Always reserves the full 16-byte slot (spec.md §4.4), regardless of
    /// host float width.
    pub fn add_long_double(&mut self) {
        if self.dialect.aligns() && LONG_DOUBLE_ALIGNMENT > self.last_data_size {
            self.offset += pad(self.offset - self.anchor, LONG_DOUBLE_ALIGNMENT);
        }
        self.offset += LONG_DOUBLE_WIRE_SIZE;
        self.last_data_size = LONG_DOUBLE_WIRE_SIZE;
    }

    pub fn add_octets(&mut self, n: usize) {
        self.offset += n;
        self.last_data_size = 1;
    }

    /// Narrow string: 4-byte length + payload bytes + NUL terminator.
    pub fn add_string(&mut self, value: &str) {
        self.add_u32();
        self.add_octets(value.len() + 1);
    }

    /// Wide string: 4-byte code-unit count + 4 bytes per code unit.
    pub fn add_wstring(&mut self, value: &str) {
        self.add_u32();
        for _ in value.chars() {
            self.add_u32();
        }
    }

    /// Encapsulation preamble: 4 bytes for DDS-style dialects, 0 for
    /// CORBA CDR.
    pub fn add_encapsulation(&mut self) {
        if self.dialect.is_dds_style() {
            self.add_u8();
            self.add_u8();
            self.add_u16();
            self.reset_alignment();
        }
    }

    pub fn begin_type(&mut self, encoding: EncodingFlag) -> TypeState {
        let prior_anchor = self.anchor;
        let reserved_dheader = matches!(encoding, EncodingFlag::DelimitCdr2 | EncodingFlag::PlCdr2);
        if reserved_dheader {
            self.add_u32();
            self.reset_alignment();
        }
        TypeState {
            encoding,
            reserved_dheader,
            prior_anchor,
        }
    }

    pub fn end_type(&mut self, state: TypeState) {
        match state.encoding {
            EncodingFlag::PlCdr => {
                if self.dialect.aligns() && 4 > self.last_data_size {
                    self.offset += pad(self.offset - self.anchor, 4);
                }
                self.offset += 4; // sentinel
                self.last_data_size = 4;
            }
            EncodingFlag::DelimitCdr2 | EncodingFlag::PlCdr2 => {
                debug_assert!(state.reserved_dheader);
            }
            EncodingFlag::PlainCdr | EncodingFlag::PlainCdr2 => {}
        }
        self.anchor = state.prior_anchor;
    }

    /// Accounts for one XCDR member: the header (short/long for PL_CDR,
    /// EMHEADER1(+NEXTINT) for PL_CDR2) plus whatever `add_payload`
    /// accounts for.
    pub fn add_member<F>(&mut self, id: u32, encoding: EncodingFlag, mut add_payload: F)
    where
        F: FnMut(&mut Self),
    {
        match encoding {
            EncodingFlag::PlCdr => {
                self.add_u32(); // short header is exactly 4 bytes
                let _ = id;
                add_payload(self);
            }
            EncodingFlag::PlCdr2 => {
                self.add_u32(); // EMHEADER1
                self.add_u32(); // NEXTINT
                add_payload(self);
            }
            _ => add_payload(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dialect, Encoder, Endianness, HeaderSelection};

    #[test]
    fn agrees_with_encoder_for_plain_values() {
        let mut enc = Encoder::new_owned(Endianness::Little, Dialect::CorbaCdr);
        enc.write_u8(1).unwrap();
        enc.write_u32(2).unwrap();
        enc.write_string("hi").unwrap();

        let mut calc = SizeCalculator::new(Dialect::CorbaCdr);
        calc.add_u8();
        calc.add_u32();
        calc.add_string("hi");

        assert_eq!(calc.serialized_len(), enc.serialized_len());
    }

    #[test]
    fn agrees_with_encoder_for_dds_encapsulation() {
        let mut enc = Encoder::new_owned(Endianness::Little, Dialect::DdsCdr);
        enc.serialize_encapsulation().unwrap();
        enc.write_u16(0xBEEF).unwrap();

        let mut calc = SizeCalculator::new(Dialect::DdsCdr);
        calc.add_encapsulation();
        calc.add_u16();

        assert_eq!(calc.serialized_len(), enc.serialized_len());
    }

    #[test]
    fn agrees_with_encoder_for_xcdr_v1_mutable_aggregate() {
        let mut enc = Encoder::new_owned(Endianness::Little, Dialect::XCdrV1);
        enc.set_pl_flag(true);
        enc.serialize_encapsulation().unwrap();
        let outer = enc.begin_type(EncodingFlag::PlCdr).unwrap();
        enc.serialize_member(3, EncodingFlag::PlCdr, HeaderSelection::AutoWithShortDefault, |e| {
            e.write_u32(1)
        })
        .unwrap();
        enc.serialize_member(9, EncodingFlag::PlCdr, HeaderSelection::AutoWithShortDefault, |e| {
            e.write_u16(2)
        })
        .unwrap();
        enc.end_type(outer).unwrap();

        let mut calc = SizeCalculator::new(Dialect::XCdrV1);
        calc.add_encapsulation();
        let outer = calc.begin_type(EncodingFlag::PlCdr);
        calc.add_member(3, EncodingFlag::PlCdr, |c| c.add_u32());
        calc.add_member(9, EncodingFlag::PlCdr, |c| c.add_u16());
        calc.end_type(outer);

        assert_eq!(calc.serialized_len(), enc.serialized_len());
    }

    #[test]
    fn fast_cdr_has_no_padding() {
        let mut calc = SizeCalculator::new(Dialect::FastCdr);
        calc.add_u8();
        calc.add_u32();
        assert_eq!(calc.serialized_len(), 5);
    }
}
