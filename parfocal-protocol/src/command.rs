//! Command decoding
//!
//! A line is a two-digit action code followed by an optional decimal
//! argument. The parser checks the argument's shape (present, numeric, fits
//! its field); limits that depend on the focuser's configuration, such as the
//! maximum step count, are checked by the core when the command is applied.

use core::str::FromStr;

/// Action codes
pub mod code {
    pub const GET_POSITION: u8 = 0;
    pub const IS_MOVING: u8 = 1;
    pub const STATUS: u8 = 2;
    pub const VERSION: u8 = 3;
    pub const NAME: u8 = 4;
    pub const MOVE_TO: u8 = 5;
    pub const GET_TEMPERATURE: u8 = 6;
    pub const SET_MAX_STEP: u8 = 7;
    pub const GET_MAX_STEP: u8 = 8;
    pub const GET_COIL_POWER: u8 = 11;
    pub const SET_COIL_POWER: u8 = 12;
    pub const GET_REVERSE: u8 = 13;
    pub const SET_REVERSE: u8 = 14;
    pub const SET_SPEED: u8 = 15;
    pub const SET_CELSIUS: u8 = 16;
    pub const SET_FAHRENHEIT: u8 = 17;
    pub const GET_UNIT: u8 = 18;
    pub const SET_SETTLE_DELAY: u8 = 19;
    pub const GET_SETTLE_DELAY: u8 = 20;
    pub const SET_TEMP_COEFFICIENT: u8 = 21;
    pub const GET_TEMP_COEFFICIENT: u8 = 22;
    pub const SET_TC_DIRECTION: u8 = 23;
    pub const GET_TC_DIRECTION: u8 = 24;
    pub const SET_TC_ENABLED: u8 = 25;
    pub const GET_TC_ENABLED: u8 = 26;
    pub const HALT: u8 = 27;
    pub const HOME: u8 = 28;
    pub const GET_STEP_MODE: u8 = 29;
    pub const SET_STEP_MODE: u8 = 30;
    pub const SYNC_POSITION: u8 = 31;
    pub const GET_STEP_SIZE_ENABLED: u8 = 32;
    pub const SET_STEP_SIZE_ENABLED: u8 = 33;
    pub const GET_STEP_SIZE: u8 = 34;
    pub const SET_STEP_SIZE: u8 = 35;
    pub const SET_UPDATE_WHILE_MOVING: u8 = 36;
    pub const GET_UPDATE_WHILE_MOVING: u8 = 37;
    pub const MOVE_RELATIVE: u8 = 38;
    pub const RESET_DEFAULTS: u8 = 40;
    pub const GET_SPEED: u8 = 41;
    pub const GET_PROBE_PRESENT: u8 = 42;
    pub const GET_SPEED_THRESHOLD: u8 = 43;
    pub const GET_BACKLASH_IN_ENABLED: u8 = 70;
    pub const SET_BACKLASH_IN_ENABLED: u8 = 71;
    pub const GET_BACKLASH_OUT_ENABLED: u8 = 72;
    pub const SET_BACKLASH_OUT_ENABLED: u8 = 73;
    pub const GET_BACKLASH_STEPS_IN: u8 = 74;
    pub const SET_BACKLASH_STEPS_IN: u8 = 75;
    pub const GET_BACKLASH_STEPS_OUT: u8 = 76;
    pub const SET_BACKLASH_STEPS_OUT: u8 = 77;
}

/// Errors from decoding a command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Line shorter than an action code, or not ASCII
    Malformed,
    /// Action code not in the vocabulary
    UnknownAction(u8),
    /// Command needs an argument and none was given
    MissingArgument,
    /// Argument is not a decimal number
    BadArgument,
    /// Argument is numeric but outside what the field can hold
    OutOfRange,
}

impl ParseError {
    /// Whether the error concerns the argument value rather than the command
    pub fn is_range_error(self) -> bool {
        matches!(self, ParseError::OutOfRange)
    }
}

/// A decoded focuser command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    GetPosition,
    IsMoving,
    Status,
    Version,
    Name,
    /// Absolute move; the core clamps the target
    MoveTo(i32),
    GetTemperature,
    SetMaxStep(i32),
    GetMaxStep,
    GetCoilPower,
    SetCoilPower(bool),
    GetReverse,
    SetReverse(bool),
    /// Speed class: 0 slow, 1 medium, 2 fast
    SetSpeed(u8),
    SetCelsius,
    SetFahrenheit,
    GetUnit,
    SetSettleDelay(u8),
    GetSettleDelay,
    SetTempCoefficient(u8),
    GetTempCoefficient,
    /// `true` moves outward on a temperature rise
    SetTcDirection(bool),
    GetTcDirection,
    SetTcEnabled(bool),
    GetTcEnabled,
    Halt,
    Home,
    GetStepMode,
    /// Microstep divisor: 1, 2, 4, 8, 16 or 32
    SetStepMode(u8),
    SyncPosition(i32),
    GetStepSizeEnabled,
    SetStepSizeEnabled(bool),
    GetStepSize,
    /// Step size in microns × 100
    SetStepSize(u16),
    SetUpdateWhileMoving(bool),
    GetUpdateWhileMoving,
    /// Relative move by signed steps
    MoveRelative(i32),
    ResetDefaults,
    GetSpeed,
    GetProbePresent,
    GetSpeedThreshold,
    GetBacklashInEnabled,
    SetBacklashInEnabled(bool),
    GetBacklashOutEnabled,
    SetBacklashOutEnabled(bool),
    GetBacklashStepsIn,
    SetBacklashStepsIn(u8),
    GetBacklashStepsOut,
    SetBacklashStepsOut(u8),
}

impl Command {
    /// Decode a command line (prefix and terminator already stripped)
    pub fn parse(line: &[u8]) -> Result<Self, ParseError> {
        let text = core::str::from_utf8(line).map_err(|_| ParseError::Malformed)?;
        let text = text.trim();
        if text.len() < 2 || !text.is_char_boundary(2) {
            return Err(ParseError::Malformed);
        }

        let (action, arg) = text.split_at(2);
        if !action.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::Malformed);
        }
        let action: u8 = action.parse().map_err(|_| ParseError::Malformed)?;
        let arg = Argument(arg.trim());

        use code::*;
        let command = match action {
            GET_POSITION => Command::GetPosition,
            IS_MOVING => Command::IsMoving,
            STATUS => Command::Status,
            VERSION => Command::Version,
            NAME => Command::Name,
            MOVE_TO => Command::MoveTo(arg.position()?),
            GET_TEMPERATURE => Command::GetTemperature,
            SET_MAX_STEP => Command::SetMaxStep(arg.number()?),
            GET_MAX_STEP => Command::GetMaxStep,
            GET_COIL_POWER => Command::GetCoilPower,
            SET_COIL_POWER => Command::SetCoilPower(arg.flag()?),
            GET_REVERSE => Command::GetReverse,
            SET_REVERSE => Command::SetReverse(arg.flag()?),
            SET_SPEED => Command::SetSpeed(arg.number()?),
            SET_CELSIUS => Command::SetCelsius,
            SET_FAHRENHEIT => Command::SetFahrenheit,
            GET_UNIT => Command::GetUnit,
            SET_SETTLE_DELAY => Command::SetSettleDelay(arg.number()?),
            GET_SETTLE_DELAY => Command::GetSettleDelay,
            SET_TEMP_COEFFICIENT => Command::SetTempCoefficient(arg.number()?),
            GET_TEMP_COEFFICIENT => Command::GetTempCoefficient,
            SET_TC_DIRECTION => Command::SetTcDirection(arg.flag()?),
            GET_TC_DIRECTION => Command::GetTcDirection,
            SET_TC_ENABLED => Command::SetTcEnabled(arg.flag()?),
            GET_TC_ENABLED => Command::GetTcEnabled,
            HALT => Command::Halt,
            HOME => Command::Home,
            GET_STEP_MODE => Command::GetStepMode,
            SET_STEP_MODE => Command::SetStepMode(arg.number()?),
            SYNC_POSITION => Command::SyncPosition(arg.position()?),
            GET_STEP_SIZE_ENABLED => Command::GetStepSizeEnabled,
            SET_STEP_SIZE_ENABLED => Command::SetStepSizeEnabled(arg.flag()?),
            GET_STEP_SIZE => Command::GetStepSize,
            SET_STEP_SIZE => Command::SetStepSize(arg.number()?),
            SET_UPDATE_WHILE_MOVING => Command::SetUpdateWhileMoving(arg.flag()?),
            GET_UPDATE_WHILE_MOVING => Command::GetUpdateWhileMoving,
            MOVE_RELATIVE => Command::MoveRelative(arg.position()?),
            RESET_DEFAULTS => Command::ResetDefaults,
            GET_SPEED => Command::GetSpeed,
            GET_PROBE_PRESENT => Command::GetProbePresent,
            GET_SPEED_THRESHOLD => Command::GetSpeedThreshold,
            GET_BACKLASH_IN_ENABLED => Command::GetBacklashInEnabled,
            SET_BACKLASH_IN_ENABLED => Command::SetBacklashInEnabled(arg.flag()?),
            GET_BACKLASH_OUT_ENABLED => Command::GetBacklashOutEnabled,
            SET_BACKLASH_OUT_ENABLED => Command::SetBacklashOutEnabled(arg.flag()?),
            GET_BACKLASH_STEPS_IN => Command::GetBacklashStepsIn,
            SET_BACKLASH_STEPS_IN => Command::SetBacklashStepsIn(arg.number()?),
            GET_BACKLASH_STEPS_OUT => Command::GetBacklashStepsOut,
            SET_BACKLASH_STEPS_OUT => Command::SetBacklashStepsOut(arg.number()?),
            other => return Err(ParseError::UnknownAction(other)),
        };

        Ok(command)
    }

    /// Whether the reply goes to every active channel instead of the sender
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Command::Halt | Command::ResetDefaults)
    }
}

/// Argument text following the action code
pub(crate) struct Argument<'a>(pub(crate) &'a str);

impl Argument<'_> {
    /// Signed position or step count
    ///
    /// The core clamps positions, so a value beyond `i32` saturates to the
    /// nearest bound instead of failing.
    pub(crate) fn position(&self) -> Result<i32, ParseError> {
        match self.number::<i64>() {
            Ok(value) => Ok(value.clamp(i32::MIN as i64, i32::MAX as i64) as i32),
            Err(ParseError::OutOfRange) if self.0.starts_with('-') => Ok(i32::MIN),
            Err(ParseError::OutOfRange) => Ok(i32::MAX),
            Err(e) => Err(e),
        }
    }

    fn number<T: FromStr>(&self) -> Result<T, ParseError> {
        if self.0.is_empty() {
            return Err(ParseError::MissingArgument);
        }

        let digits = self.0.strip_prefix(&['+', '-'][..]).unwrap_or(self.0);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::BadArgument);
        }

        // Only digits and a sign remain, so a failure means the value does
        // not fit the target type.
        self.0
            .strip_prefix('+')
            .unwrap_or(self.0)
            .parse()
            .map_err(|_| ParseError::OutOfRange)
    }

    fn flag(&self) -> Result<bool, ParseError> {
        match self.number::<u8>()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(ParseError::OutOfRange),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_queries() {
        assert_eq!(Command::parse(b"00"), Ok(Command::GetPosition));
        assert_eq!(Command::parse(b"01"), Ok(Command::IsMoving));
        assert_eq!(Command::parse(b"06"), Ok(Command::GetTemperature));
        assert_eq!(Command::parse(b"76"), Ok(Command::GetBacklashStepsOut));
    }

    #[test]
    fn test_parse_move() {
        assert_eq!(Command::parse(b"0512000"), Ok(Command::MoveTo(12000)));
        assert_eq!(Command::parse(b"05 12000"), Ok(Command::MoveTo(12000)));
        assert_eq!(Command::parse(b"38-250"), Ok(Command::MoveRelative(-250)));
        assert_eq!(Command::parse(b"38+250"), Ok(Command::MoveRelative(250)));
    }

    #[test]
    fn test_parse_flags() {
        assert_eq!(Command::parse(b"121"), Ok(Command::SetCoilPower(true)));
        assert_eq!(Command::parse(b"120"), Ok(Command::SetCoilPower(false)));
        assert_eq!(Command::parse(b"122"), Err(ParseError::OutOfRange));
        assert_eq!(Command::parse(b"12"), Err(ParseError::MissingArgument));
    }

    #[test]
    fn test_parse_byte_fields() {
        assert_eq!(Command::parse(b"77255"), Ok(Command::SetBacklashStepsOut(255)));
        assert_eq!(Command::parse(b"77256"), Err(ParseError::OutOfRange));
        assert_eq!(Command::parse(b"77-1"), Err(ParseError::OutOfRange));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Command::parse(b""), Err(ParseError::Malformed));
        assert_eq!(Command::parse(b"0"), Err(ParseError::Malformed));
        assert_eq!(Command::parse(b"XY"), Err(ParseError::Malformed));
        assert_eq!(Command::parse(b"99"), Err(ParseError::UnknownAction(99)));
        assert_eq!(Command::parse(b"05abc"), Err(ParseError::BadArgument));
        assert_eq!(Command::parse(b"05-"), Err(ParseError::BadArgument));
        assert_eq!(Command::parse(b"+0"), Err(ParseError::Malformed));
        assert_eq!(Command::parse(b"+51000"), Err(ParseError::Malformed));
        assert_eq!(Command::parse(b"-5"), Err(ParseError::Malformed));
        assert_eq!(
            Command::parse(b"0799999999999"),
            Err(ParseError::OutOfRange)
        );
    }

    #[test]
    fn test_positions_saturate() {
        assert_eq!(
            Command::parse(b"059999999999"),
            Ok(Command::MoveTo(i32::MAX))
        );
        assert_eq!(
            Command::parse(b"31-9999999999"),
            Ok(Command::SyncPosition(i32::MIN))
        );
        assert_eq!(
            Command::parse(b"38-99999999999"),
            Ok(Command::MoveRelative(i32::MIN))
        );
        assert_eq!(
            Argument("99999999999999999999999").position(),
            Ok(i32::MAX)
        );
    }

    #[test]
    fn test_broadcast_flags() {
        assert!(Command::Halt.is_broadcast());
        assert!(Command::ResetDefaults.is_broadcast());
        assert!(!Command::GetPosition.is_broadcast());
        assert!(!Command::MoveTo(10).is_broadcast());
    }
}
