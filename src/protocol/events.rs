//! Poll response parsing.
//!
//! A poll reply is a status byte followed by a stream of events. Each event
//! is a type byte and, depending on the type, a fixed or count-prefixed
//! trailer. The walker never reads past the end of the reply: a trailer
//! that does not fit is a [`SspError::MalformedResponse`], except for the
//! single channel byte, whose absence is tolerated.

use std::fmt;

use crate::error::{constants, Result, SspError};
use crate::protocol::codes::event as ev;
use crate::protocol::command::Currency;
use crate::protocol::lookup;

/// Size of a value/currency sub-record
pub const VALUE_RECORD_LEN: usize = 7;

/// Size of a paid/requested/currency sub-record
pub const INCOMPLETE_RECORD_LEN: usize = 11;

/// Amount of one currency reported inside an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueRecord {
    pub value: u32,
    pub currency: Currency,
}

/// Progress of an interrupted payout or float for one currency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncompleteRecord {
    pub paid: u32,
    pub requested: u32,
    pub currency: Currency,
}

/// One event from a poll reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    SlaveReset,
    /// Channel 0 while the note is still being identified
    ReadNote { channel: u8 },
    CreditNote { channel: u8 },
    NoteRejecting,
    NoteRejected,
    NoteStacking,
    NoteStacked,
    SafeNoteJam,
    UnsafeNoteJam,
    Disabled,
    FraudAttempt(Vec<ValueRecord>),
    StackerFull,
    NoteClearedFromFront { channel: u8 },
    NoteClearedToCashbox { channel: u8 },
    CashboxRemoved,
    CashboxReplaced,
    Dispensing(Vec<ValueRecord>),
    Dispensed(Vec<ValueRecord>),
    Jammed(Vec<ValueRecord>),
    Halted(Vec<ValueRecord>),
    Floating(Vec<ValueRecord>),
    Floated(Vec<ValueRecord>),
    TimeOut(Vec<ValueRecord>),
    IncompletePayout(Vec<IncompleteRecord>),
    IncompleteFloat(Vec<IncompleteRecord>),
    NoteStoredInPayout,
    Emptying,
    Emptied,
    SmartEmptying(Vec<ValueRecord>),
    SmartEmptied(Vec<ValueRecord>),
    PayoutOutOfService,
    ErrorDuringPayout { records: Vec<ValueRecord>, error: u8 },
    NoteTransferredToStacker(ValueRecord),
    NoteHeldInBezel(ValueRecord),
    NotePaidIntoStoreAtPowerUp(ValueRecord),
    NotePaidIntoStackerAtPowerUp(ValueRecord),
    /// Type byte this parser does not know; no trailer consumed
    Unknown(u8),
}

impl PollEvent {
    /// Event type byte as it appeared on the wire
    pub fn code(&self) -> u8 {
        match self {
            Self::SlaveReset => ev::SLAVE_RESET,
            Self::ReadNote { .. } => ev::READ_NOTE,
            Self::CreditNote { .. } => ev::CREDIT_NOTE,
            Self::NoteRejecting => ev::NOTE_REJECTING,
            Self::NoteRejected => ev::NOTE_REJECTED,
            Self::NoteStacking => ev::NOTE_STACKING,
            Self::NoteStacked => ev::NOTE_STACKED,
            Self::SafeNoteJam => ev::SAFE_NOTE_JAM,
            Self::UnsafeNoteJam => ev::UNSAFE_NOTE_JAM,
            Self::Disabled => ev::DISABLED,
            Self::FraudAttempt(_) => ev::FRAUD_ATTEMPT,
            Self::StackerFull => ev::STACKER_FULL,
            Self::NoteClearedFromFront { .. } => ev::NOTE_CLEARED_FROM_FRONT,
            Self::NoteClearedToCashbox { .. } => ev::NOTE_CLEARED_TO_CASHBOX,
            Self::CashboxRemoved => ev::CASHBOX_REMOVED,
            Self::CashboxReplaced => ev::CASHBOX_REPLACED,
            Self::Dispensing(_) => ev::DISPENSING,
            Self::Dispensed(_) => ev::DISPENSED,
            Self::Jammed(_) => ev::JAMMED,
            Self::Halted(_) => ev::HALTED,
            Self::Floating(_) => ev::FLOATING,
            Self::Floated(_) => ev::FLOATED,
            Self::TimeOut(_) => ev::TIME_OUT,
            Self::IncompletePayout(_) => ev::INCOMPLETE_PAYOUT,
            Self::IncompleteFloat(_) => ev::INCOMPLETE_FLOAT,
            Self::NoteStoredInPayout => ev::NOTE_STORED_IN_PAYOUT,
            Self::Emptying => ev::EMPTYING,
            Self::Emptied => ev::EMPTIED,
            Self::SmartEmptying(_) => ev::SMART_EMPTYING,
            Self::SmartEmptied(_) => ev::SMART_EMPTIED,
            Self::PayoutOutOfService => ev::PAYOUT_OUT_OF_SERVICE,
            Self::ErrorDuringPayout { .. } => ev::ERROR_DURING_PAYOUT,
            Self::NoteTransferredToStacker(_) => ev::NOTE_TRANSFERRED_TO_STACKER,
            Self::NoteHeldInBezel(_) => ev::NOTE_HELD_IN_BEZEL,
            Self::NotePaidIntoStoreAtPowerUp(_) => ev::NOTE_PAID_INTO_STORE_AT_POWER_UP,
            Self::NotePaidIntoStackerAtPowerUp(_) => ev::NOTE_PAID_INTO_STACKER_AT_POWER_UP,
            Self::Unknown(code) => *code,
        }
    }

    /// Channel number carried by single-byte events, if nonzero
    pub fn channel(&self) -> Option<u8> {
        match self {
            Self::ReadNote { channel }
            | Self::CreditNote { channel }
            | Self::NoteClearedFromFront { channel }
            | Self::NoteClearedToCashbox { channel }
                if *channel != 0 =>
            {
                Some(*channel)
            }
            _ => None,
        }
    }
}

impl fmt::Display for PollEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&lookup::event_name(self.code()))?;
        match self {
            Self::ReadNote { channel: 0 } => Ok(()),
            Self::ReadNote { channel }
            | Self::CreditNote { channel }
            | Self::NoteClearedFromFront { channel }
            | Self::NoteClearedToCashbox { channel } => write!(f, " (channel {channel})"),
            Self::ErrorDuringPayout { error, .. } => write!(f, " (error {error:#04x})"),
            Self::Unknown(code) => write!(f, " {code:#04x}"),
            _ => Ok(()),
        }
    }
}

/// Bounded cursor over a poll reply
struct EventReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> EventReader<'a> {
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn next_byte(&mut self) -> Option<u8> {
        let byte = self.buf.get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }

    fn take(&mut self, n: usize, code: u8) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(SspError::MalformedResponse(format!(
                "{} needs {n} more bytes, {} left",
                lookup::event_name(code),
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Channel byte; a reply that ends right after the type byte reads as 0
    fn channel(&mut self) -> u8 {
        self.next_byte().unwrap_or(0)
    }

    fn value_record(&mut self, code: u8) -> Result<ValueRecord> {
        let raw = self.take(VALUE_RECORD_LEN, code)?;
        Ok(value_record(raw))
    }

    fn count(&mut self, code: u8) -> Result<usize> {
        Ok(usize::from(self.take(1, code)?[0]))
    }

    /// `count` followed by that many 7-byte records
    fn value_records(&mut self, code: u8) -> Result<Vec<ValueRecord>> {
        let n = self.count(code)?;
        let raw = self.take(n * VALUE_RECORD_LEN, code)?;
        Ok(raw.chunks_exact(VALUE_RECORD_LEN).map(value_record).collect())
    }

    /// `count` followed by that many 11-byte records
    fn incomplete_records(&mut self, code: u8) -> Result<Vec<IncompleteRecord>> {
        let n = self.count(code)?;
        let raw = self.take(n * INCOMPLETE_RECORD_LEN, code)?;
        Ok(raw
            .chunks_exact(INCOMPLETE_RECORD_LEN)
            .map(|r| IncompleteRecord {
                paid: u32::from_le_bytes([r[0], r[1], r[2], r[3]]),
                requested: u32::from_le_bytes([r[4], r[5], r[6], r[7]]),
                currency: Currency([r[8], r[9], r[10]]),
            })
            .collect())
    }
}

fn value_record(r: &[u8]) -> ValueRecord {
    ValueRecord {
        value: u32::from_le_bytes([r[0], r[1], r[2], r[3]]),
        currency: Currency([r[4], r[5], r[6]]),
    }
}

/// Decode every event in a poll reply (status byte first)
pub fn parse_poll(data: &[u8]) -> Result<Vec<PollEvent>> {
    if data.is_empty() {
        return Err(SspError::MalformedResponse(
            constants::ERR_EMPTY_RESPONSE.to_string(),
        ));
    }

    let mut reader = EventReader { buf: data, pos: 1 };
    let mut events = Vec::new();

    while let Some(code) = reader.next_byte() {
        let event = match code {
            ev::SLAVE_RESET => PollEvent::SlaveReset,
            ev::READ_NOTE => PollEvent::ReadNote {
                channel: reader.channel(),
            },
            ev::CREDIT_NOTE => PollEvent::CreditNote {
                channel: reader.channel(),
            },
            ev::NOTE_REJECTING => PollEvent::NoteRejecting,
            ev::NOTE_REJECTED => PollEvent::NoteRejected,
            ev::NOTE_STACKING => PollEvent::NoteStacking,
            ev::NOTE_STACKED => PollEvent::NoteStacked,
            ev::SAFE_NOTE_JAM => PollEvent::SafeNoteJam,
            ev::UNSAFE_NOTE_JAM => PollEvent::UnsafeNoteJam,
            ev::DISABLED => PollEvent::Disabled,
            ev::FRAUD_ATTEMPT => PollEvent::FraudAttempt(reader.value_records(code)?),
            ev::STACKER_FULL => PollEvent::StackerFull,
            ev::NOTE_CLEARED_FROM_FRONT => PollEvent::NoteClearedFromFront {
                channel: reader.channel(),
            },
            ev::NOTE_CLEARED_TO_CASHBOX => PollEvent::NoteClearedToCashbox {
                channel: reader.channel(),
            },
            ev::CASHBOX_REMOVED => PollEvent::CashboxRemoved,
            ev::CASHBOX_REPLACED => PollEvent::CashboxReplaced,
            ev::DISPENSING => PollEvent::Dispensing(reader.value_records(code)?),
            ev::DISPENSED => PollEvent::Dispensed(reader.value_records(code)?),
            ev::JAMMED => PollEvent::Jammed(reader.value_records(code)?),
            ev::HALTED => PollEvent::Halted(reader.value_records(code)?),
            ev::FLOATING => PollEvent::Floating(reader.value_records(code)?),
            ev::FLOATED => PollEvent::Floated(reader.value_records(code)?),
            ev::TIME_OUT => PollEvent::TimeOut(reader.value_records(code)?),
            ev::INCOMPLETE_PAYOUT => PollEvent::IncompletePayout(reader.incomplete_records(code)?),
            ev::INCOMPLETE_FLOAT => PollEvent::IncompleteFloat(reader.incomplete_records(code)?),
            ev::NOTE_STORED_IN_PAYOUT => PollEvent::NoteStoredInPayout,
            ev::EMPTYING => PollEvent::Emptying,
            ev::EMPTIED => PollEvent::Emptied,
            ev::SMART_EMPTYING => PollEvent::SmartEmptying(reader.value_records(code)?),
            ev::SMART_EMPTIED => PollEvent::SmartEmptied(reader.value_records(code)?),
            ev::PAYOUT_OUT_OF_SERVICE => PollEvent::PayoutOutOfService,
            ev::ERROR_DURING_PAYOUT => {
                let records = reader.value_records(code)?;
                let error = reader.take(1, code)?[0];
                PollEvent::ErrorDuringPayout { records, error }
            }
            ev::NOTE_TRANSFERRED_TO_STACKER => {
                PollEvent::NoteTransferredToStacker(reader.value_record(code)?)
            }
            ev::NOTE_HELD_IN_BEZEL => PollEvent::NoteHeldInBezel(reader.value_record(code)?),
            ev::NOTE_PAID_INTO_STORE_AT_POWER_UP => {
                PollEvent::NotePaidIntoStoreAtPowerUp(reader.value_record(code)?)
            }
            ev::NOTE_PAID_INTO_STACKER_AT_POWER_UP => {
                PollEvent::NotePaidIntoStackerAtPowerUp(reader.value_record(code)?)
            }
            other => PollEvent::Unknown(other),
        };
        events.push(event);
    }

    Ok(events)
}

/// Follow-up work implied by one poll's events, in the order it runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollEffects {
    /// Ask the device why a note was rejected
    pub query_rejection: bool,
    /// Read the cashbox payout operation data
    pub cashbox_data: bool,
    /// Re-read level and route for every channel
    pub refresh_channels: bool,
    /// Send ENABLE again after a payout-side operation finished
    pub re_enable: bool,
    /// Nonzero channel of a note sitting in escrow
    pub escrow_channel: Option<u8>,
}

impl PollEffects {
    pub fn from_events(events: &[PollEvent]) -> Self {
        let mut effects = Self::default();
        for event in events {
            match event {
                PollEvent::NoteRejected => effects.query_rejection = true,
                PollEvent::SlaveReset
                | PollEvent::CreditNote { .. }
                | PollEvent::NoteStoredInPayout => effects.refresh_channels = true,
                PollEvent::Dispensed(_) | PollEvent::Emptied => {
                    effects.refresh_channels = true;
                    effects.re_enable = true;
                }
                PollEvent::Floated(_) | PollEvent::SmartEmptied(_) => {
                    effects.cashbox_data = true;
                    effects.refresh_channels = true;
                    effects.re_enable = true;
                }
                PollEvent::ReadNote { channel } if *channel != 0 => {
                    effects.escrow_channel = Some(*channel);
                }
                _ => {}
            }
        }
        effects
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
