// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! State snapshot/restore used to roll back a partially-written or
//! partially-read value.
//!
//! Grounded on `eprosima::marshalling::Cdr::state`, which copies
//! `m_currentPosition`, `m_alignPosition`, `m_swapBytes` and
//! `m_lastDataSize` and restores all four on `setState`.

/// A value snapshot of a codec's cursor/alignment/endianness bookkeeping.
///
/// Taken before any operation that may write or read more than one
/// primitive (strings, sequences, nested aggregates) and restored if that
/// operation fails partway through, so the cursor never leaks past a
/// half-written or half-read value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecState {
    pub(crate) current: usize,
    pub(crate) anchor: usize,
    pub(crate) swap: bool,
    pub(crate) last_data_size: usize,
}
