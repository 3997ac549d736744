//! Payout unit as a typed API.
//!
//! [`PayoutDevice`] owns the [`SspConnection`] and the state read back from
//! the unit: its capabilities from the setup request and one
//! [`ChannelRecord`] per note channel. Every method issues one or more
//! commands; any framing failure closes the port and propagates, while a
//! non-OK status byte is reported as [`SspError::DeviceStatus`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::{BezelColour, DeviceConfig};
use crate::error::{constants, Result, SspError};
use crate::protocol::codes::{command as op, PAYOUT_REAL, PAYOUT_TEST};
use crate::protocol::command::{Command, Currency, ResponseFrame, ResponseStatus};
use crate::protocol::events::{parse_poll, PollEffects, PollEvent};
use crate::protocol::{handshake, lookup};
use crate::service::LogSink;
use crate::transport::SspConnection;

/// Kind of unit reported by the setup request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    Validator,
    SmartHopper,
    SmartPayout,
    Nv11,
    Unknown(u8),
}

impl UnitType {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Self::Validator,
            0x03 => Self::SmartHopper,
            0x06 => Self::SmartPayout,
            0x07 => Self::Nv11,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Validator => 0x00,
            Self::SmartHopper => 0x03,
            Self::SmartPayout => 0x06,
            Self::Nv11 => 0x07,
            Self::Unknown(code) => *code,
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validator => f.write_str("Validator"),
            Self::SmartHopper => f.write_str("SMART Hopper"),
            Self::SmartPayout => f.write_str("SMART Payout"),
            Self::Nv11 => f.write_str("NV11"),
            Self::Unknown(code) => write!(f, "Unknown Type {code:#04x}"),
        }
    }
}

/// One note channel as known to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    /// 1-based channel number
    pub channel: u8,
    /// Note value in minor units, already scaled by the value multiplier
    pub value: u32,
    pub currency: Currency,
    /// Notes of this denomination held in the payout store
    pub level: u16,
    /// Whether notes of this denomination are kept for payout
    pub recycling: bool,
}

impl fmt::Display for ChannelRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Channel {}: {} {} [{}]",
            self.channel,
            format_amount(self.value),
            self.currency,
            self.level
        )
    }
}

/// What the setup request says about the unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCapabilities {
    pub unit_type: UnitType,
    /// Firmware version as `AB.CD`
    pub firmware: String,
    pub channel_count: u8,
    pub value_multiplier: u32,
    pub protocol_version: u8,
}

/// Count of one denomination, as used by level reports and payout requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenominationLevel {
    pub count: u16,
    pub value: u32,
    pub currency: Currency,
}

/// Wire size of a [`DenominationLevel`]
pub const DENOMINATION_RECORD_LEN: usize = 9;

impl DenominationLevel {
    fn parse(bytes: &[u8]) -> Option<Self> {
        let count = u16::from_le_bytes(bytes.get(0..2)?.try_into().ok()?);
        let value = u32::from_le_bytes(bytes.get(2..6)?.try_into().ok()?);
        let currency = Currency::from_slice(bytes.get(6..9)?)?;
        Some(Self {
            count,
            value,
            currency,
        })
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.count.to_le_bytes());
        out.extend_from_slice(&self.value.to_le_bytes());
        out.extend_from_slice(&self.currency.0);
    }
}

/// Notes moved to the cashbox by the last float or smart empty
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CashboxPayoutData {
    pub moved: Vec<DenominationLevel>,
    pub unrecognised: u32,
}

/// Whether a payout-side command is carried out or only checked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PayoutMode {
    #[default]
    Real,
    Test,
}

impl PayoutMode {
    fn option_byte(self) -> u8 {
        match self {
            Self::Real => PAYOUT_REAL,
            Self::Test => PAYOUT_TEST,
        }
    }
}

/// `12345` becomes `"123.45"`
pub fn format_amount(value: u32) -> String {
    format!("{}.{:02}", value / 100, value % 100)
}

/// Decode a setup-request reply into capabilities and unsorted channel records
pub fn parse_setup(data: &[u8]) -> Result<(DeviceCapabilities, Vec<ChannelRecord>)> {
    let short = || SspError::MalformedResponse(constants::ERR_SHORT_SETUP.to_string());

    let unit_type = UnitType::from_byte(*data.get(1).ok_or_else(short)?);
    let fw = data.get(2..6).ok_or_else(short)?;
    let firmware = format!(
        "{}.{}",
        String::from_utf8_lossy(&fw[..2]),
        String::from_utf8_lossy(&fw[2..])
    );

    // 6..9 legacy country code, 9..12 legacy multiplier
    let channel_count = *data.get(12).ok_or_else(short)?;
    let n = channel_count as usize;

    // then n legacy values and n legacy security bytes
    let mut offset = 13 + 2 * n;
    let m = data.get(offset..offset + 3).ok_or_else(short)?;
    let value_multiplier = u32::from_be_bytes([0, m[0], m[1], m[2]]);
    if value_multiplier == 0 {
        return Err(SspError::MalformedResponse(
            "value multiplier is zero".to_string(),
        ));
    }
    offset += 3;

    let protocol_version = *data.get(offset).ok_or_else(short)?;
    offset += 1;

    let currencies = data.get(offset..offset + 3 * n).ok_or_else(short)?;
    let values = data
        .get(offset + 3 * n..offset + 7 * n)
        .ok_or_else(short)?;

    let mut records = Vec::with_capacity(n);
    for (i, (code, raw)) in currencies
        .chunks_exact(3)
        .zip(values.chunks_exact(4))
        .enumerate()
    {
        let raw = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        records.push(ChannelRecord {
            channel: i as u8 + 1,
            value: raw.saturating_mul(value_multiplier),
            currency: Currency::from_slice(code).ok_or_else(short)?,
            level: 0,
            recycling: false,
        });
    }

    Ok((
        DeviceCapabilities {
            unit_type,
            firmware,
            channel_count,
            value_multiplier,
            protocol_version,
        },
        records,
    ))
}

/// Decode a count-prefixed list of 9-byte denomination records
fn parse_levels(payload: &[u8]) -> Result<(Vec<DenominationLevel>, &[u8])> {
    let malformed = || SspError::MalformedResponse("denomination list is truncated".to_string());
    let (&count, rest) = payload.split_first().ok_or_else(malformed)?;
    let len = count as usize * DENOMINATION_RECORD_LEN;
    let body = rest.get(..len).ok_or_else(malformed)?;

    let levels = body
        .chunks_exact(DENOMINATION_RECORD_LEN)
        .map(DenominationLevel::parse)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(malformed)?;
    Ok((levels, &rest[len..]))
}

/// A payout unit behind one SSP connection
pub struct PayoutDevice {
    conn: SspConnection,
    config: DeviceConfig,
    sink: Arc<dyn LogSink>,
    capabilities: Option<DeviceCapabilities>,
    channels: Vec<ChannelRecord>,
    hold_remaining: u32,
    note_held: bool,
}

impl PayoutDevice {
    pub fn new(conn: SspConnection, config: DeviceConfig, sink: Arc<dyn LogSink>) -> Self {
        Self {
            conn,
            config,
            sink,
            capabilities: None,
            channels: Vec::new(),
            hold_remaining: 0,
            note_held: false,
        }
    }

    pub fn connection(&self) -> &SspConnection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut SspConnection {
        &mut self.conn
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Set by the last setup request
    pub fn capabilities(&self) -> Option<&DeviceCapabilities> {
        self.capabilities.as_ref()
    }

    /// Channel records, ascending by value
    pub fn channels(&self) -> &[ChannelRecord] {
        &self.channels
    }

    pub fn channel(&self, channel: u8) -> Option<&ChannelRecord> {
        self.channels.iter().find(|c| c.channel == channel)
    }

    /// Whether the last tick sent HOLD to keep a note in escrow
    pub fn is_note_held(&self) -> bool {
        self.note_held
    }

    /// HOLD commands still to be sent in place of POLL
    pub fn hold_remaining(&self) -> u32 {
        self.hold_remaining
    }

    /// Polls to answer with HOLD after a note reaches escrow
    pub fn set_hold_polls(&mut self, polls: u32) {
        self.config.hold_polls = polls;
    }

    fn log(&self, text: &str) {
        self.sink.log(text);
    }

    /// Open the port and negotiate a key, leaving encryption on when asked.
    ///
    /// Always starts from a closed port with encryption off, so a failed
    /// attempt can simply be repeated.
    #[instrument(skip(self), fields(port = %self.conn.settings().name))]
    pub async fn open_session(&mut self, encryption: bool) -> Result<()> {
        self.conn.close().await?;
        self.conn.disable_encryption();
        self.conn.open().await?;

        if encryption {
            if let Err(e) = handshake::negotiate(&mut self.conn).await {
                // Best effort: the negotiation error is what matters
                let _ = self.conn.close().await;
                return Err(e);
            }
            self.conn.enable_encryption()?;
        } else {
            self.sync().await?;
        }
        Ok(())
    }

    /// Protocol version, setup request, unit check and channel inhibits
    #[instrument(skip(self))]
    pub async fn initialise(&mut self) -> Result<()> {
        let version = self.probe_protocol_version().await?;
        if version < self.config.min_protocol_version {
            self.log(&format!(
                "This host does not support slaves under protocol {}",
                self.config.min_protocol_version
            ));
            return Err(SspError::UnsupportedProtocolVersion(version));
        }
        self.set_protocol_version(version).await?.check()?;

        let unit_type = self.setup_request().await?.unit_type;
        if unit_type != self.config.expected_unit {
            self.log(&format!(
                "Unsupported unit type {unit_type}, this host supports the {} only",
                self.config.expected_unit
            ));
            return Err(SspError::UnsupportedUnitType(unit_type));
        }

        self.set_inhibits(self.config.inhibit_mask).await
    }

    /// Exchange one command; a framing failure closes the port
    async fn send(&mut self, command: Command) -> Result<ResponseFrame> {
        match self.conn.exchange(&command).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                warn!(
                    opcode = %lookup::command_name(command.opcode()),
                    error = %e,
                    "Command failed, closing port"
                );
                self.log(&format!("Sending command failed: {e}"));
                if let Err(close_err) = self.conn.close().await {
                    debug!(error = %close_err, "Close after failure also failed");
                }
                Err(e)
            }
        }
    }

    /// Exchange one command and require an OK status
    async fn send_checked(&mut self, command: Command) -> Result<ResponseFrame> {
        let reply = self.send(command).await?;
        let status = reply.status();
        if !status.is_ok() {
            if status.is_busy() {
                self.log("Unit responded busy, command cannot be processed at this time");
            } else {
                self.log(&format!("Command response is {}", lookup::response_name(status.code())));
            }
        }
        reply.check()
    }

    pub async fn reset(&mut self) -> Result<()> {
        self.send_checked(Command::new(op::RESET)).await?;
        Ok(())
    }

    pub async fn sync(&mut self) -> Result<()> {
        self.send_checked(Command::sync()).await?;
        debug!("Sent sync");
        Ok(())
    }

    /// Ask the unit to speak `version`; the status is returned unchecked
    pub async fn set_protocol_version(&mut self, version: u8) -> Result<ResponseFrame> {
        self.send(Command::new(op::HOST_PROTOCOL_VERSION).with_u8(version))
            .await
    }

    /// Highest protocol version the unit accepts.
    ///
    /// Counts up from the configured minimum until the unit answers FAIL and
    /// returns the version before that. If nothing fails by the probe limit
    /// the minimum is assumed.
    pub async fn probe_protocol_version(&mut self) -> Result<u8> {
        let mut version = self.config.min_protocol_version;
        loop {
            let reply = self.set_protocol_version(version).await?;
            if reply.status() == ResponseStatus::Fail {
                let max = version.saturating_sub(1);
                debug!(max, "Protocol version probed");
                return Ok(max);
            }
            // A limit of 255 ends the probe at the top of the byte range
            match version.checked_add(1) {
                Some(next) if next <= self.config.protocol_probe_limit => version = next,
                _ => {
                    debug!(
                        limit = self.config.protocol_probe_limit,
                        "No protocol version rejected, using minimum"
                    );
                    return Ok(self.config.min_protocol_version);
                }
            }
        }
    }

    /// Read unit details and channel records, then fill in levels and routes
    #[instrument(skip(self))]
    pub async fn setup_request(&mut self) -> Result<&DeviceCapabilities> {
        let reply = self.send_checked(Command::new(op::SETUP_REQUEST)).await?;
        let (capabilities, channels) = parse_setup(reply.data())?;
        info!(
            unit = %capabilities.unit_type,
            firmware = %capabilities.firmware,
            channels = capabilities.channel_count,
            multiplier = capabilities.value_multiplier,
            protocol = capabilities.protocol_version,
            "Setup request decoded"
        );
        self.log(&format!(
            "Unit Type: {}\nFirmware: {}\nNumber of Channels: {}\nReal Value Multiplier: {}\nProtocol Version: {}",
            capabilities.unit_type,
            capabilities.firmware,
            capabilities.channel_count,
            capabilities.value_multiplier,
            capabilities.protocol_version
        ));

        self.channels = channels;
        self.refresh_channels().await?;
        self.channels.sort_by_key(|c| c.value);
        for record in &self.channels {
            self.sink.log(&record.to_string());
        }

        Ok(&*self.capabilities.insert(capabilities))
    }

    /// Re-read level and route for every known channel
    pub async fn refresh_channels(&mut self) -> Result<()> {
        for i in 0..self.channels.len() {
            let (value, currency) = (self.channels[i].value, self.channels[i].currency);
            let level = self.denomination_level(value, currency).await?;
            let recycling = self.denomination_route(value, currency).await?;
            let record = &mut self.channels[i];
            record.level = level;
            record.recycling = recycling;
        }
        Ok(())
    }

    /// Enable channels whose bit is set in `mask` (bit 0 = channel 1)
    pub async fn set_inhibits(&mut self, mask: u16) -> Result<()> {
        self.send_checked(Command::new(op::SET_CHANNEL_INHIBITS).with_u16(mask))
            .await?;
        self.log("Inhibits set");
        Ok(())
    }

    pub async fn enable(&mut self) -> Result<()> {
        self.send_checked(Command::new(op::ENABLE)).await?;
        self.log("Unit enabled");
        Ok(())
    }

    pub async fn disable(&mut self) -> Result<()> {
        self.send_checked(Command::new(op::DISABLE)).await?;
        self.log("Unit disabled");
        Ok(())
    }

    pub async fn enable_payout(&mut self) -> Result<()> {
        self.send_checked(Command::new(op::ENABLE_PAYOUT_DEVICE)).await?;
        self.log("Payout enabled");
        Ok(())
    }

    pub async fn disable_payout(&mut self) -> Result<()> {
        self.send_checked(Command::new(op::DISABLE_PAYOUT_DEVICE)).await?;
        self.log("Payout disabled");
        Ok(())
    }

    /// Keep the note in escrow for one more poll period
    pub async fn hold(&mut self) -> Result<()> {
        self.send_checked(Command::new(op::HOLD)).await?;
        Ok(())
    }

    /// Hand the note in escrow back to the customer
    pub async fn return_note(&mut self) -> Result<()> {
        self.send_checked(Command::new(op::REJECT_BANKNOTE)).await?;
        self.hold_remaining = 0;
        self.log("Returning note");
        Ok(())
    }

    /// Reason code for the last rejected note
    pub async fn last_reject_code(&mut self) -> Result<u8> {
        let reply = self.send_checked(Command::new(op::LAST_REJECT_CODE)).await?;
        reply
            .payload()
            .first()
            .copied()
            .ok_or_else(|| SspError::MalformedResponse("reject code missing".to_string()))
    }

    /// Look up and log why the last note was rejected
    pub async fn query_rejection(&mut self) -> Result<String> {
        let code = self.last_reject_code().await?;
        let reason = lookup::reject_reason(code).into_owned();
        self.log(&reason);
        Ok(reason)
    }

    /// Serial number, optionally of one sub-device of a multi-part unit
    pub async fn serial_number(&mut self, device: Option<u8>) -> Result<u32> {
        let mut command = Command::new(op::GET_SERIAL_NUMBER);
        if let Some(device) = device {
            command = command.with_u8(device);
        }
        let reply = self.send_checked(command).await?;
        let bytes: [u8; 4] = reply
            .payload()
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| SspError::MalformedResponse("serial number is truncated".to_string()))?;
        Ok(u32::from_be_bytes(bytes))
    }

    /// Notes of one denomination currently stored
    pub async fn denomination_level(&mut self, value: u32, currency: Currency) -> Result<u16> {
        let reply = self
            .send_checked(
                Command::new(op::GET_DENOMINATION_LEVEL)
                    .with_u32(value)
                    .with_currency(currency),
            )
            .await?;
        let bytes: [u8; 2] = reply
            .payload()
            .get(..2)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| SspError::MalformedResponse("level is truncated".to_string()))?;
        Ok(u16::from_le_bytes(bytes))
    }

    /// Whether one denomination is routed to the payout store
    pub async fn denomination_route(&mut self, value: u32, currency: Currency) -> Result<bool> {
        let reply = self
            .send_checked(
                Command::new(op::GET_DENOMINATION_ROUTE)
                    .with_u32(value)
                    .with_currency(currency),
            )
            .await?;
        match reply.payload().first() {
            Some(0x00) => Ok(true),
            Some(_) => Ok(false),
            None => Err(SspError::MalformedResponse("route is missing".to_string())),
        }
    }

    /// Route one denomination to the payout store (`recycle`) or the cashbox
    pub async fn set_denomination_route(
        &mut self,
        value: u32,
        currency: Currency,
        recycle: bool,
    ) -> Result<()> {
        let route = if recycle { 0x00 } else { 0x01 };
        self.send_checked(
            Command::new(op::SET_DENOMINATION_ROUTE)
                .with_u8(route)
                .with_u32(value)
                .with_currency(currency),
        )
        .await?;
        self.log(&format!(
            "Note routing successful ({} {currency} to {})",
            format_amount(value),
            if recycle { "storage" } else { "cashbox" }
        ));
        Ok(())
    }

    pub async fn payout_amount(
        &mut self,
        amount: u32,
        currency: Currency,
        mode: PayoutMode,
    ) -> Result<()> {
        self.send_checked(
            Command::new(op::PAYOUT_AMOUNT)
                .with_u32(amount)
                .with_currency(currency)
                .with_u8(mode.option_byte()),
        )
        .await?;
        self.log(&format!("Paying out {} {currency}", format_amount(amount)));
        Ok(())
    }

    pub async fn payout_by_denomination(
        &mut self,
        notes: &[DenominationLevel],
        mode: PayoutMode,
    ) -> Result<()> {
        let count = u8::try_from(notes.len()).map_err(|_| SspError::CommandTooLong(notes.len()))?;
        let mut body = Vec::with_capacity(notes.len() * DENOMINATION_RECORD_LEN);
        for note in notes {
            note.write_to(&mut body);
        }
        self.send_checked(
            Command::new(op::PAYOUT_BY_DENOMINATION)
                .with_u8(count)
                .with_bytes(&body)
                .with_u8(mode.option_byte()),
        )
        .await?;
        self.log("Paying out by denomination");
        Ok(())
    }

    /// Move notes to the cashbox until `amount` is left, keeping `min_payout` payable
    pub async fn float_amount(
        &mut self,
        min_payout: u32,
        amount: u32,
        currency: Currency,
        mode: PayoutMode,
    ) -> Result<()> {
        self.send_checked(
            Command::new(op::FLOAT_AMOUNT)
                .with_u32(min_payout)
                .with_u32(amount)
                .with_currency(currency)
                .with_u8(mode.option_byte()),
        )
        .await?;
        self.log("Floated amount successfully");
        Ok(())
    }

    pub async fn empty_all(&mut self) -> Result<()> {
        self.send_checked(Command::new(op::EMPTY_ALL)).await?;
        self.log("Emptying payout device");
        Ok(())
    }

    /// Empty to the cashbox while counting what was moved
    pub async fn smart_empty(&mut self) -> Result<()> {
        self.send_checked(Command::new(op::SMART_EMPTY)).await?;
        self.log("SMART Emptying...");
        Ok(())
    }

    pub async fn cashbox_payout_data(&mut self) -> Result<CashboxPayoutData> {
        let reply = self
            .send_checked(Command::new(op::CASHBOX_PAYOUT_OPERATION_DATA))
            .await?;
        let (moved, rest) = parse_levels(reply.payload())?;
        let unrecognised = rest
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .map(u32::from_le_bytes)
            .ok_or_else(|| {
                SspError::MalformedResponse("unrecognised count is missing".to_string())
            })?;

        for level in &moved {
            self.log(&format!(
                "Moved {} x {} {} to cashbox",
                level.count,
                format_amount(level.value),
                level.currency
            ));
        }
        self.log(&format!("{unrecognised} notes not recognised"));

        Ok(CashboxPayoutData {
            moved,
            unrecognised,
        })
    }

    /// Stored count of every denomination
    pub async fn all_levels(&mut self) -> Result<Vec<DenominationLevel>> {
        let reply = self.send_checked(Command::new(op::GET_ALL_LEVELS)).await?;
        let (levels, _) = parse_levels(reply.payload())?;
        Ok(levels)
    }

    /// Set the bezel colour until the next power cycle
    pub async fn configure_bezel(&mut self, colour: BezelColour) -> Result<()> {
        self.send_checked(
            Command::new(op::CONFIGURE_BEZEL)
                .with_u8(colour.red)
                .with_u8(colour.green)
                .with_u8(colour.blue)
                .with_u8(0x00),
        )
        .await?;
        Ok(())
    }

    /// One poll period: HOLD while a note is kept in escrow, otherwise POLL
    /// and act on the reported events.
    ///
    /// Follow-up commands run after all events are logged, in a fixed order:
    /// rejection query, cashbox payout data, channel refresh, re-enable.
    pub async fn poll(&mut self) -> Result<Vec<PollEvent>> {
        if self.hold_remaining > 0 {
            self.hold_remaining -= 1;
            self.note_held = true;
            self.log(&format!("Note held in escrow: {}", self.hold_remaining));
            self.send(Command::new(op::HOLD)).await?;
            return Ok(Vec::new());
        }
        self.note_held = false;

        let reply = self.send_checked(Command::poll()).await?;
        let events = parse_poll(reply.data())?;
        for event in &events {
            self.log(&self.describe(event));
        }

        let effects = PollEffects::from_events(&events);
        if !effects.is_empty() {
            self.apply(effects).await?;
        }
        Ok(events)
    }

    async fn apply(&mut self, effects: PollEffects) -> Result<()> {
        if effects.query_rejection {
            self.query_rejection().await?;
        }
        if effects.cashbox_data {
            self.cashbox_payout_data().await?;
        }
        if effects.refresh_channels {
            self.refresh_channels().await?;
        }
        if effects.re_enable {
            self.enable().await?;
        }
        if effects.escrow_channel.is_some() && self.config.hold_polls > 0 {
            self.hold_remaining = self.config.hold_polls;
        }
        Ok(())
    }

    /// Event text with the channel's value when the channel is known
    fn describe(&self, event: &PollEvent) -> String {
        match event.channel().and_then(|c| self.channel(c)) {
            Some(record) => format!(
                "{event}: {} {}",
                format_amount(record.value),
                record.currency
            ),
            None => event.to_string(),
        }
    }
}

impl fmt::Debug for PayoutDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayoutDevice")
            .field("conn", &self.conn)
            .field("capabilities", &self.capabilities)
            .field("channels", &self.channels.len())
            .field("hold_remaining", &self.hold_remaining)
            .finish_non_exhaustive()
    }
}
