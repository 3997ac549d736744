//! Byte values defined by the SSP command set.

/// Command opcodes (first byte of a request)
pub mod command {
    pub const RESET: u8 = 0x01;
    pub const SET_CHANNEL_INHIBITS: u8 = 0x02;
    pub const SETUP_REQUEST: u8 = 0x05;
    pub const HOST_PROTOCOL_VERSION: u8 = 0x06;
    pub const POLL: u8 = 0x07;
    pub const REJECT_BANKNOTE: u8 = 0x08;
    pub const DISABLE: u8 = 0x09;
    pub const ENABLE: u8 = 0x0A;
    pub const GET_SERIAL_NUMBER: u8 = 0x0C;
    pub const SYNC: u8 = 0x11;
    pub const LAST_REJECT_CODE: u8 = 0x17;
    pub const HOLD: u8 = 0x18;
    pub const GET_ALL_LEVELS: u8 = 0x22;
    pub const PAYOUT_AMOUNT: u8 = 0x33;
    pub const GET_DENOMINATION_LEVEL: u8 = 0x35;
    pub const SET_DENOMINATION_ROUTE: u8 = 0x3B;
    pub const GET_DENOMINATION_ROUTE: u8 = 0x3C;
    pub const FLOAT_AMOUNT: u8 = 0x3D;
    pub const EMPTY_ALL: u8 = 0x3F;
    pub const PAYOUT_BY_DENOMINATION: u8 = 0x46;
    pub const SET_GENERATOR: u8 = 0x4A;
    pub const SET_MODULUS: u8 = 0x4B;
    pub const REQUEST_KEY_EXCHANGE: u8 = 0x4C;
    pub const SMART_EMPTY: u8 = 0x52;
    pub const CASHBOX_PAYOUT_OPERATION_DATA: u8 = 0x53;
    pub const CONFIGURE_BEZEL: u8 = 0x54;
    pub const DISABLE_PAYOUT_DEVICE: u8 = 0x5B;
    pub const ENABLE_PAYOUT_DEVICE: u8 = 0x5C;
}

/// Generic response codes (first byte of every reply)
pub mod response {
    pub const OK: u8 = 0xF0;
    pub const COMMAND_NOT_KNOWN: u8 = 0xF2;
    pub const WRONG_NO_PARAMETERS: u8 = 0xF3;
    pub const PARAMETER_OUT_OF_RANGE: u8 = 0xF4;
    pub const COMMAND_CANNOT_BE_PROCESSED: u8 = 0xF5;
    pub const SOFTWARE_ERROR: u8 = 0xF6;
    pub const FAIL: u8 = 0xF8;
    pub const KEY_NOT_SET: u8 = 0xFA;

    /// Sub-code after COMMAND_CANNOT_BE_PROCESSED meaning "busy"
    pub const BUSY: u8 = 0x03;
}

/// Poll response event codes
pub mod event {
    pub const SLAVE_RESET: u8 = 0xF1;
    pub const READ_NOTE: u8 = 0xEF;
    pub const CREDIT_NOTE: u8 = 0xEE;
    pub const NOTE_REJECTING: u8 = 0xED;
    pub const NOTE_REJECTED: u8 = 0xEC;
    pub const NOTE_STACKING: u8 = 0xCC;
    pub const NOTE_STACKED: u8 = 0xEB;
    pub const SAFE_NOTE_JAM: u8 = 0xEA;
    pub const UNSAFE_NOTE_JAM: u8 = 0xE9;
    pub const DISABLED: u8 = 0xE8;
    pub const STACKER_FULL: u8 = 0xE7;
    pub const FRAUD_ATTEMPT: u8 = 0xE6;
    pub const CASHBOX_REPLACED: u8 = 0xE4;
    pub const CASHBOX_REMOVED: u8 = 0xE3;
    pub const NOTE_CLEARED_TO_CASHBOX: u8 = 0xE2;
    pub const NOTE_CLEARED_FROM_FRONT: u8 = 0xE1;
    pub const DISPENSING: u8 = 0xDA;
    pub const TIME_OUT: u8 = 0xD9;
    pub const FLOATED: u8 = 0xD8;
    pub const FLOATING: u8 = 0xD7;
    pub const HALTED: u8 = 0xD6;
    pub const JAMMED: u8 = 0xD5;
    pub const DISPENSED: u8 = 0xD2;
    pub const INCOMPLETE_FLOAT: u8 = 0xDD;
    pub const INCOMPLETE_PAYOUT: u8 = 0xDC;
    pub const NOTE_STORED_IN_PAYOUT: u8 = 0xDB;
    pub const NOTE_HELD_IN_BEZEL: u8 = 0xCE;
    pub const NOTE_PAID_INTO_STORE_AT_POWER_UP: u8 = 0xCB;
    pub const NOTE_PAID_INTO_STACKER_AT_POWER_UP: u8 = 0xCA;
    pub const NOTE_TRANSFERRED_TO_STACKER: u8 = 0xC9;
    pub const PAYOUT_OUT_OF_SERVICE: u8 = 0xC6;
    pub const EMPTIED: u8 = 0xC3;
    pub const EMPTYING: u8 = 0xC2;
    pub const SMART_EMPTIED: u8 = 0xB4;
    pub const SMART_EMPTYING: u8 = 0xB3;
    pub const ERROR_DURING_PAYOUT: u8 = 0xB1;
}

/// Option byte for payout/float commands that performs the operation
pub const PAYOUT_REAL: u8 = 0x58;

/// Option byte for payout/float commands that only tests feasibility
pub const PAYOUT_TEST: u8 = 0x19;

/// Lowest host protocol version this engine drives
pub const MIN_PROTOCOL_VERSION: u8 = 6;

/// Upper bound for protocol-version probing
pub const PROTOCOL_PROBE_LIMIT: u8 = 12;
