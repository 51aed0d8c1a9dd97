// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The 4-byte encapsulation preamble shared by DDS-style dialects.
//!
//! Grounded on `eprosima::fastcdr::Cdr::{read_encapsulation,
//! serialize_encapsulation}` (`original_source/src/cpp/Cdr.cpp`). CORBA CDR
//! never writes or expects this preamble; `DdsCdr`, `XCdrV1` and `XCdrV2`
//! all do, differing only in the `kind` byte's bit layout.

use crate::error::{CdrError, CdrResult};
use crate::{Dialect, EncodingFlag, Endianness};

const LITTLE_ENDIANNESS_BIT: u8 = 0x01;
const DDS_CDR_WITH_PL: u8 = 0x02;

const PLAIN_CDR2: u8 = 0x10;
const DELIMIT_CDR2: u8 = 0x08;
const PL_CDR2: u8 = 0x0A;

/// Decoded contents of a 4-byte encapsulation preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encapsulation {
    pub endianness: Endianness,
    pub dialect: Dialect,
    pub encoding_flag: EncodingFlag,
    pub options: u16,
}

/// Builds the `kind` byte for a classic/XCDRv1 preamble.
///
/// `pl_flag` selects PL_CDR (XCDRv1 mutable aggregates); plain `DdsCdr`
/// never sets it.
pub(crate) fn classic_kind(endianness: Endianness, pl_flag: bool) -> u8 {
    let pl_bit = if pl_flag { DDS_CDR_WITH_PL } else { 0 };
    pl_bit | endianness.bit()
}

/// Builds the `kind` byte for an XCDRv2 preamble (spec.md §6 kind table).
pub(crate) fn xcdr2_kind(endianness: Endianness, encoding_flag: EncodingFlag) -> u8 {
    let nibble = match encoding_flag {
        EncodingFlag::PlainCdr2 => PLAIN_CDR2,
        EncodingFlag::DelimitCdr2 => DELIMIT_CDR2,
        EncodingFlag::PlCdr2 => PL_CDR2,
        EncodingFlag::PlainCdr | EncodingFlag::PlCdr => {
            unreachable!("xcdr2_kind called with a non-XCDRv2 encoding flag")
        }
    };
    nibble | endianness.bit()
}

/// Decodes a `kind` byte into endianness/dialect/encoding-flag, masking the
/// endianness bit on every path (spec.md §9 REDESIGN FLAGS: the original
/// source has one path that forgets to mask; this rewrite never does).
pub(crate) fn decode_kind(kind: u8, requested: Dialect) -> CdrResult<Encapsulation> {
    let endianness = Endianness::from_bit(kind & LITTLE_ENDIANNESS_BIT);
    // The endianness bit is the only one that varies independently of the
    // dialect/encoding selection, so masking it off first turns every kind
    // in spec.md §6's table into one of a handful of exact values, rather
    // than needing per-bit containment checks (which, for `DELIMIT_CDR2`
    // and `PL_CDR2`, have no bits in common with a 0xF0 high-nibble test).
    let masked = kind & !LITTLE_ENDIANNESS_BIT;

    match masked {
        PLAIN_CDR2 | DELIMIT_CDR2 | PL_CDR2 => {
            let encoding_flag = match masked {
                PLAIN_CDR2 => EncodingFlag::PlainCdr2,
                DELIMIT_CDR2 => EncodingFlag::DelimitCdr2,
                PL_CDR2 => EncodingFlag::PlCdr2,
                _ => unreachable!(),
            };
            Ok(Encapsulation {
                endianness,
                dialect: Dialect::XCdrV2,
                encoding_flag,
                options: 0,
            })
        }
        0x00 | DDS_CDR_WITH_PL => {
            let pl_flag = masked == DDS_CDR_WITH_PL;
            let (dialect, encoding_flag) = if pl_flag {
                (Dialect::XCdrV1, EncodingFlag::PlCdr)
            } else {
                (requested, EncodingFlag::PlainCdr)
            };
            Ok(Encapsulation {
                endianness,
                dialect,
                encoding_flag,
                options: 0,
            })
        }
        _ => Err(CdrError::bad_parameter(format!(
            "unexpected CDR type received in encapsulation (kind 0x{kind:02x})"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_kind_bits() {
        assert_eq!(classic_kind(Endianness::Big, false), 0x00);
        assert_eq!(classic_kind(Endianness::Little, false), 0x01);
        assert_eq!(classic_kind(Endianness::Little, true), 0x03);
    }

    #[test]
    fn xcdr2_kind_bits() {
        assert_eq!(xcdr2_kind(Endianness::Little, EncodingFlag::PlainCdr2), 0x11);
        assert_eq!(xcdr2_kind(Endianness::Big, EncodingFlag::DelimitCdr2), 0x08);
        assert_eq!(xcdr2_kind(Endianness::Little, EncodingFlag::PlCdr2), 0x0B);
    }

    #[test]
    fn decode_rejects_unknown_bits() {
        let err = decode_kind(0xF1, Dialect::DdsCdr).unwrap_err();
        assert!(matches!(err, CdrError::BadParameter { .. }));
    }

    #[test]
    fn decode_masks_endianness_both_ways() {
        let enc = decode_kind(0x01, Dialect::DdsCdr).unwrap();
        assert_eq!(enc.endianness, Endianness::Little);
        let enc = decode_kind(0x02, Dialect::DdsCdr).unwrap();
        assert_eq!(enc.endianness, Endianness::Big);
        assert_eq!(enc.dialect, Dialect::XCdrV1);
    }

    #[test]
    fn decode_round_trips_every_xcdr_v2_encoding_flag() {
        for flag in [
            EncodingFlag::PlainCdr2,
            EncodingFlag::DelimitCdr2,
            EncodingFlag::PlCdr2,
        ] {
            for endianness in [Endianness::Big, Endianness::Little] {
                let kind = xcdr2_kind(endianness, flag);
                let enc = decode_kind(kind, Dialect::XCdrV2).unwrap();
                assert_eq!(enc.dialect, Dialect::XCdrV2);
                assert_eq!(enc.endianness, endianness);
                assert_eq!(enc.encoding_flag, flag);
            }
        }
    }
}
