//! Command router
//!
//! Each channel has its own line buffer, so a half-received command on one
//! link never interferes with another. Completed lines are parsed and
//! dispatched against the focuser state. Replies go to the originating
//! channel, except broadcast commands whose reply goes to every active one.
//! A command that fails validation mutates nothing and produces an error
//! reply.

use core::fmt;

use parfocal_hal::{ChannelId, Transport};
use parfocal_protocol::reply::{self, code, FixedX100};
use parfocal_protocol::{Command, ErrorReply, FrameError, LineBuffer, ParseError, Reply};

use crate::config::{
    MoveDirection, PersistedSettings, SpeedClass, TemperatureUnit, FIRMWARE_NAME,
    FIRMWARE_VERSION, FOCUSER_LOWER_LIMIT,
};
use crate::motion::MotionController;
use crate::persistence::PersistenceManager;
use crate::temperature::TemperatureCompensator;
use crate::traits::{StepMode, StepperDriver, TemperatureProbe};

/// Why a command produced an error reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Line overflowed the command buffer
    Frame(FrameError),
    /// Line did not decode
    Parse(ParseError),
    /// Argument decoded but is not acceptable now
    OutOfRange,
    /// Temperature asked for without a reading
    ProbeUnavailable,
    /// Reply did not fit the reply buffer
    ReplyTooLong,
}

impl From<FrameError> for CommandError {
    fn from(e: FrameError) -> Self {
        CommandError::Frame(e)
    }
}

impl From<ParseError> for CommandError {
    fn from(e: ParseError) -> Self {
        CommandError::Parse(e)
    }
}

impl From<fmt::Error> for CommandError {
    fn from(_: fmt::Error) -> Self {
        CommandError::ReplyTooLong
    }
}

impl CommandError {
    /// Wire error for this failure
    pub fn error_reply(self) -> ErrorReply {
        match self {
            CommandError::Frame(_) => ErrorReply::Length,
            CommandError::Parse(e) if e.is_range_error() => ErrorReply::Range,
            CommandError::Parse(_) | CommandError::ReplyTooLong => ErrorReply::Command,
            CommandError::OutOfRange => ErrorReply::Range,
            CommandError::ProbeUnavailable => ErrorReply::Probe,
        }
    }
}

/// Where a reply goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Command has no reply
    None,
    /// Reply to one channel
    Reply(ChannelId, Reply),
    /// Same reply to every active channel
    Broadcast(Reply),
}

impl Delivery {
    /// Hand the reply to the transport
    pub fn deliver<T: Transport>(&self, transport: &mut T) {
        match self {
            Delivery::None => {}
            Delivery::Reply(channel, text) => transport.send(*channel, text),
            Delivery::Broadcast(text) => broadcast(transport, text),
        }
    }
}

/// Send `text` on every active channel
pub fn broadcast<T: Transport>(transport: &mut T, text: &str) {
    for channel in ChannelId::ALL {
        if transport.is_active(channel) {
            transport.send(channel, text);
        }
    }
}

/// Focuser state a command may read or change
pub struct Context<'a, P: TemperatureProbe> {
    pub now_ms: u32,
    pub settings: &'a mut PersistedSettings,
    pub motion: &'a mut MotionController,
    pub persistence: &'a mut PersistenceManager,
    pub temperature: &'a mut TemperatureCompensator<P>,
    /// Consulted for the resolutions it can produce
    pub driver: &'a dyn StepperDriver,
    pub speed_change_threshold: u32,
}

impl<P: TemperatureProbe> Context<'_, P> {
    fn changed(&mut self) {
        self.persistence.mark_dirty(self.now_ms);
    }

    fn move_to(&mut self, position: i32) {
        if self.motion.request_move(position, self.settings).is_accepted() {
            self.changed();
        }
    }
}

/// Per-channel line assembly and dispatch
#[derive(Debug)]
pub struct Router {
    lines: [LineBuffer; ChannelId::ALL.len()],
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub const fn new() -> Self {
        Self {
            lines: [LineBuffer::new(), LineBuffer::new(), LineBuffer::new()],
        }
    }

    /// Feed bytes received on `channel`, executing every completed line
    pub fn receive<P: TemperatureProbe, T: Transport>(
        &mut self,
        channel: ChannelId,
        bytes: &[u8],
        ctx: &mut Context<'_, P>,
        transport: &mut T,
    ) {
        let mut rest = bytes;
        while !rest.is_empty() {
            let (used, result) = self.lines[channel.index()].feed_bytes(rest);
            rest = &rest[used..];

            let delivery = match result {
                Ok(None) => continue,
                Ok(Some(line)) => Command::parse(&line)
                    .map_err(CommandError::from)
                    .and_then(|command| dispatch(command, channel, ctx)),
                Err(e) => Err(e.into()),
            };
            finish(delivery, channel).deliver(transport);
        }
    }
}

/// Turn a dispatch result into a delivery, errors going to `channel`
pub fn finish(result: Result<Delivery, CommandError>, channel: ChannelId) -> Delivery {
    match result {
        Ok(delivery) => delivery,
        Err(e) => {
            debug!("command rejected on {}: {}", channel, e);
            Delivery::Reply(channel, e.error_reply().to_reply())
        }
    }
}

/// Execute one command
///
/// The reply of a broadcast command goes to every active channel.
pub fn dispatch<P: TemperatureProbe>(
    command: Command,
    channel: ChannelId,
    ctx: &mut Context<'_, P>,
) -> Result<Delivery, CommandError> {
    let delivery = execute(command, channel, ctx)?;
    Ok(match delivery {
        Delivery::Reply(_, text) if command.is_broadcast() => Delivery::Broadcast(text),
        other => other,
    })
}

fn execute<P: TemperatureProbe>(
    command: Command,
    channel: ChannelId,
    ctx: &mut Context<'_, P>,
) -> Result<Delivery, CommandError> {
    let to_sender = |text: Reply| -> Result<Delivery, CommandError> {
        Ok(Delivery::Reply(channel, text))
    };

    match command {
        Command::GetPosition => {
            value(channel, code::POSITION, format_args!("{}", ctx.motion.position()))
        }
        Command::IsMoving => to_sender(reply::flag(code::MOVING, ctx.motion.is_turning())),
        Command::Status => value(channel, code::STATUS, format_args!("OK")),
        Command::Version => value(channel, code::FIRMWARE, format_args!("{}", FIRMWARE_VERSION)),
        Command::Name => value(channel, code::FIRMWARE, format_args!("{}", FIRMWARE_NAME)),

        Command::MoveTo(position) => {
            ctx.move_to(position);
            Ok(Delivery::None)
        }
        Command::MoveRelative(steps) => {
            let target = ctx.motion.target().saturating_add(steps);
            ctx.move_to(target);
            Ok(Delivery::None)
        }
        Command::Home => {
            ctx.move_to(FOCUSER_LOWER_LIMIT);
            Ok(Delivery::None)
        }
        Command::Halt => {
            ctx.motion.halt(ctx.now_ms, ctx.settings);
            info!("halted at {}", ctx.motion.position());
            value(channel, code::HALTED, format_args!("{}", ctx.motion.position()))
        }
        Command::SyncPosition(position) => {
            ctx.motion.sync_position(position, ctx.now_ms, ctx.settings);
            ctx.changed();
            Ok(Delivery::None)
        }

        Command::GetTemperature => {
            if !ctx.temperature.is_present() {
                return Err(CommandError::ProbeUnavailable);
            }
            ctx.temperature.request_now();
            let reading = ctx
                .temperature
                .reading_x100(ctx.settings.temperature_unit)
                .ok_or(CommandError::ProbeUnavailable)?;
            value(channel, code::TEMPERATURE, format_args!("{}", FixedX100(reading)))
        }
        Command::GetProbePresent => {
            to_sender(reply::flag(code::PROBE_PRESENT, ctx.temperature.is_present()))
        }

        Command::SetMaxStep(max_step) => {
            let reachable = ctx.motion.position().max(ctx.motion.target());
            if !PersistedSettings::is_valid_max_step(max_step) || max_step < reachable {
                return Err(CommandError::OutOfRange);
            }
            ctx.settings.max_step = max_step;
            ctx.changed();
            Ok(Delivery::None)
        }
        Command::GetMaxStep => {
            value(channel, code::MAX_STEP, format_args!("{}", ctx.settings.max_step))
        }

        Command::SetSpeed(speed) => {
            ctx.settings.speed = SpeedClass::from_u8(speed).ok_or(CommandError::OutOfRange)?;
            ctx.changed();
            Ok(Delivery::None)
        }
        Command::GetSpeed => {
            value(channel, code::SPEED, format_args!("{}", ctx.settings.speed.as_u8()))
        }
        Command::GetSpeedThreshold => {
            value(channel, code::SPEED_THRESHOLD, format_args!("{}", ctx.speed_change_threshold))
        }

        Command::SetStepMode(divisor) => {
            let mode = StepMode::from_divisor(divisor)
                .filter(|&mode| ctx.driver.supports(mode))
                .ok_or(CommandError::OutOfRange)?;
            ctx.motion.set_step_mode(mode);
            Ok(Delivery::None)
        }
        Command::GetStepMode => {
            value(channel, code::STEP_MODE, format_args!("{}", ctx.motion.step_mode().divisor()))
        }

        Command::SetStepSize(size) => {
            if size == 0 {
                return Err(CommandError::OutOfRange);
            }
            ctx.settings.step_size_x100 = size;
            ctx.changed();
            Ok(Delivery::None)
        }
        Command::GetStepSize => value(
            channel,
            code::STEP_SIZE,
            format_args!("{}", FixedX100(ctx.settings.step_size_x100 as i32)),
        ),

        Command::SetCelsius => set(ctx, |s| s.temperature_unit = TemperatureUnit::Celsius),
        Command::SetFahrenheit => set(ctx, |s| s.temperature_unit = TemperatureUnit::Fahrenheit),
        Command::GetUnit => value(
            channel,
            code::UNIT,
            format_args!("{}", ctx.settings.temperature_unit.as_char()),
        ),

        Command::SetTcEnabled(enabled) => {
            if enabled && !ctx.settings.tc_enabled {
                ctx.temperature.reset_baseline();
            }
            set(ctx, |s| s.tc_enabled = enabled)
        }
        Command::GetTcEnabled => to_sender(reply::flag(code::TC_ENABLED, ctx.settings.tc_enabled)),
        Command::SetTcDirection(out) => {
            set(ctx, |s| s.tc_direction = MoveDirection::from_flag(out))
        }
        Command::GetTcDirection => value(
            channel,
            code::TC_DIRECTION,
            format_args!("{}", ctx.settings.tc_direction.as_u8()),
        ),
        Command::SetTempCoefficient(coefficient) => {
            set(ctx, |s| s.temp_coefficient = coefficient)
        }
        Command::GetTempCoefficient => value(
            channel,
            code::TEMP_COEFFICIENT,
            format_args!("{}", ctx.settings.temp_coefficient),
        ),

        Command::SetSettleDelay(delay) => set(ctx, |s| s.settle_delay_ms = delay),
        Command::GetSettleDelay => {
            value(channel, code::SETTLE_DELAY, format_args!("{}", ctx.settings.settle_delay_ms))
        }

        Command::SetCoilPower(enabled) => set(ctx, |s| s.coil_power_enabled = enabled),
        Command::GetCoilPower => {
            to_sender(reply::flag(code::COIL_POWER, ctx.settings.coil_power_enabled))
        }
        Command::SetReverse(reversed) => set(ctx, |s| s.reverse_direction = reversed),
        Command::GetReverse => {
            to_sender(reply::flag(code::REVERSE, ctx.settings.reverse_direction))
        }
        Command::SetStepSizeEnabled(enabled) => set(ctx, |s| s.step_size_enabled = enabled),
        Command::GetStepSizeEnabled => to_sender(reply::flag(
            code::STEP_SIZE_ENABLED,
            ctx.settings.step_size_enabled,
        )),
        Command::SetUpdateWhileMoving(enabled) => set(ctx, |s| s.update_while_moving = enabled),
        Command::GetUpdateWhileMoving => to_sender(reply::flag(
            code::UPDATE_WHILE_MOVING,
            ctx.settings.update_while_moving,
        )),

        Command::SetBacklashInEnabled(enabled) => set(ctx, |s| s.backlash_in_enabled = enabled),
        Command::GetBacklashInEnabled => to_sender(reply::flag(
            code::BACKLASH_IN_ENABLED,
            ctx.settings.backlash_in_enabled,
        )),
        Command::SetBacklashOutEnabled(enabled) => set(ctx, |s| s.backlash_out_enabled = enabled),
        Command::GetBacklashOutEnabled => to_sender(reply::flag(
            code::BACKLASH_OUT_ENABLED,
            ctx.settings.backlash_out_enabled,
        )),
        Command::SetBacklashStepsIn(steps) => set(ctx, |s| s.backlash_steps_in = steps),
        Command::GetBacklashStepsIn => value(
            channel,
            code::BACKLASH_STEPS_IN,
            format_args!("{}", ctx.settings.backlash_steps_in),
        ),
        Command::SetBacklashStepsOut(steps) => set(ctx, |s| s.backlash_steps_out = steps),
        Command::GetBacklashStepsOut => value(
            channel,
            code::BACKLASH_STEPS_OUT,
            format_args!("{}", ctx.settings.backlash_steps_out),
        ),

        Command::ResetDefaults => {
            reset_defaults(ctx);
            value(channel, code::STATUS, format_args!("OK"))
        }
    }
}

/// `<code><value>#` to the sender
fn value(
    channel: ChannelId,
    code: char,
    args: fmt::Arguments<'_>,
) -> Result<Delivery, CommandError> {
    Ok(Delivery::Reply(channel, reply::format(code, args)?))
}

/// Apply a settings change and mark the record dirty
fn set<P: TemperatureProbe>(
    ctx: &mut Context<'_, P>,
    apply: impl FnOnce(&mut PersistedSettings),
) -> Result<Delivery, CommandError> {
    apply(&mut *ctx.settings);
    ctx.changed();
    Ok(Delivery::None)
}

/// Restore factory settings without moving the motor
///
/// The current position and any running move are kept, so `max_step` is
/// raised if either lies beyond the default limit. The default resolution
/// is only restored if the driver can produce it.
fn reset_defaults<P: TemperatureProbe>(ctx: &mut Context<'_, P>) {
    let position = ctx.motion.position();
    let mut defaults = PersistedSettings::defaults();
    defaults.last_position = position;
    defaults.max_step = defaults.max_step.max(position).max(ctx.motion.target());
    defaults.move_direction = ctx.settings.move_direction;
    *ctx.settings = defaults;
    if ctx.driver.supports(StepMode::default()) {
        ctx.motion.set_step_mode(StepMode::default());
    }
    ctx.changed();
    info!("settings reset to defaults");
}
