//! Human-readable names for SSP codes.
//!
//! Purely cosmetic: used in log lines and `Display` impls. Known codes map
//! to borrowed static strings; anything else is formatted on demand.

use std::borrow::Cow;

use crate::protocol::codes::{command as op, event as ev, response};

/// Name of a command opcode
pub fn command_name(opcode: u8) -> Cow<'static, str> {
    let name = match opcode {
        op::RESET => "Reset",
        op::SET_CHANNEL_INHIBITS => "Set Channel Inhibits",
        op::SETUP_REQUEST => "Setup Request",
        op::HOST_PROTOCOL_VERSION => "Host Protocol Version",
        op::POLL => "Poll",
        op::REJECT_BANKNOTE => "Reject Banknote",
        op::DISABLE => "Disable",
        op::ENABLE => "Enable",
        op::GET_SERIAL_NUMBER => "Get Serial Number",
        op::SYNC => "Sync",
        op::LAST_REJECT_CODE => "Last Reject Code",
        op::HOLD => "Hold",
        op::GET_ALL_LEVELS => "Get All Levels",
        op::PAYOUT_AMOUNT => "Payout Amount",
        op::GET_DENOMINATION_LEVEL => "Get Denomination Level",
        op::SET_DENOMINATION_ROUTE => "Set Denomination Route",
        op::GET_DENOMINATION_ROUTE => "Get Denomination Route",
        op::FLOAT_AMOUNT => "Float Amount",
        op::EMPTY_ALL => "Empty All",
        op::PAYOUT_BY_DENOMINATION => "Payout By Denomination",
        op::SET_GENERATOR => "Set Generator",
        op::SET_MODULUS => "Set Modulus",
        op::REQUEST_KEY_EXCHANGE => "Request Key Exchange",
        op::SMART_EMPTY => "Smart Empty",
        op::CASHBOX_PAYOUT_OPERATION_DATA => "Cashbox Payout Operation Data",
        op::CONFIGURE_BEZEL => "Configure Bezel",
        op::DISABLE_PAYOUT_DEVICE => "Disable Payout Device",
        op::ENABLE_PAYOUT_DEVICE => "Enable Payout Device",
        other => return Cow::Owned(format!("Command {other:#04x}")),
    };
    Cow::Borrowed(name)
}

/// Name of a generic response code
pub fn response_name(code: u8) -> Cow<'static, str> {
    let name = match code {
        response::OK => "OK",
        response::COMMAND_NOT_KNOWN => "Command Not Known",
        response::WRONG_NO_PARAMETERS => "Wrong Number Of Parameters",
        response::PARAMETER_OUT_OF_RANGE => "Parameter Out Of Range",
        response::COMMAND_CANNOT_BE_PROCESSED => "Command Cannot Be Processed",
        response::SOFTWARE_ERROR => "Software Error",
        response::FAIL => "Fail",
        response::KEY_NOT_SET => "Key Not Set",
        other => return Cow::Owned(format!("Response {other:#04x}")),
    };
    Cow::Borrowed(name)
}

/// Name of a poll event type; unknown codes share one name
pub fn event_name(code: u8) -> Cow<'static, str> {
    Cow::Borrowed(match code {
        ev::SLAVE_RESET => "Slave Reset",
        ev::READ_NOTE => "Read Note",
        ev::CREDIT_NOTE => "Credit Note",
        ev::NOTE_REJECTING => "Note Rejecting",
        ev::NOTE_REJECTED => "Note Rejected",
        ev::NOTE_STACKING => "Note Stacking",
        ev::NOTE_STACKED => "Note Stacked",
        ev::SAFE_NOTE_JAM => "Safe Note Jam",
        ev::UNSAFE_NOTE_JAM => "Unsafe Note Jam",
        ev::DISABLED => "Disabled",
        ev::FRAUD_ATTEMPT => "Fraud Attempt",
        ev::STACKER_FULL => "Stacker Full",
        ev::NOTE_CLEARED_FROM_FRONT => "Note Cleared From Front",
        ev::NOTE_CLEARED_TO_CASHBOX => "Note Cleared To Cashbox",
        ev::CASHBOX_REMOVED => "Cashbox Removed",
        ev::CASHBOX_REPLACED => "Cashbox Replaced",
        ev::DISPENSING => "Dispensing",
        ev::DISPENSED => "Dispensed",
        ev::JAMMED => "Jammed",
        ev::HALTED => "Halted",
        ev::FLOATING => "Floating",
        ev::FLOATED => "Floated",
        ev::TIME_OUT => "Time Out",
        ev::INCOMPLETE_PAYOUT => "Incomplete Payout",
        ev::INCOMPLETE_FLOAT => "Incomplete Float",
        ev::NOTE_STORED_IN_PAYOUT => "Note Stored In Payout",
        ev::EMPTYING => "Emptying",
        ev::EMPTIED => "Emptied",
        ev::SMART_EMPTYING => "Smart Emptying",
        ev::SMART_EMPTIED => "Smart Emptied",
        ev::PAYOUT_OUT_OF_SERVICE => "Payout Out Of Service",
        ev::ERROR_DURING_PAYOUT => "Error During Payout",
        ev::NOTE_TRANSFERRED_TO_STACKER => "Note Transferred To Stacker",
        ev::NOTE_HELD_IN_BEZEL => "Note Held In Bezel",
        ev::NOTE_PAID_INTO_STORE_AT_POWER_UP => "Note Paid Into Store At Power Up",
        ev::NOTE_PAID_INTO_STACKER_AT_POWER_UP => "Note Paid Into Stacker At Power Up",
        _ => "Unknown Event",
    })
}

/// Reason text for a LAST_REJECT_CODE reply byte
pub fn reject_reason(code: u8) -> Cow<'static, str> {
    let reason = match code {
        0x00 => "Note accepted",
        0x01 => "Note length incorrect",
        0x02..=0x05 | 0x09 => "Invalid note",
        0x06 => "Channel inhibited",
        0x07 => "Second note inserted during read",
        0x08 => "Host rejected note",
        0x0A | 0x11 | 0x15..=0x18 => "Invalid note read",
        0x0B => "Note too long",
        0x0C => "Validator disabled",
        0x0D => "Mechanism slow/stalled",
        0x0E => "Strim attempt",
        0x0F => "Fraud channel reject",
        0x10 => "No notes inserted",
        0x12 => "Twisted note detected",
        0x13 => "Escrow time-out",
        0x14 => "Bar code scan fail",
        0x19 => "Incorrect note width",
        0x1A => "Note too short",
        other => return Cow::Owned(format!("Unknown reject reason {other:#04x}")),
    };
    Cow::Borrowed(reason)
}
