//! Motion controller
//!
//! Owns the current and target position and is the only code that changes
//! the position. [`MotionController::tick`] is called once per loop pass and
//! issues at most one logical step, gated by the step delay of the active
//! speed class.
//!
//! A move runs through three phases:
//!
//! ```text
//! Idle --request_move--> Moving --arrival/halt--> Settling --timeout--> Idle
//! ```
//!
//! While `Moving`, backlash pre-roll pulses are issued first. They drive the
//! motor in the move direction without changing the position.

use crate::config::{FocuserConfig, MoveDirection, PersistedSettings, SpeedClass};
use crate::time::has_elapsed;
use crate::traits::{Direction, StepMode, StepperDriver, StepperError};

/// Motion phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionState {
    /// Motor stopped and settled
    Idle,
    /// Motor turning towards the target
    Moving,
    /// Motor stopped, waiting out the settle delay
    Settling,
}

/// Result of a move request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MoveOutcome {
    /// Clamped target equals the current position; nothing changed
    NoChange,
    /// A move started from rest
    Started { target: i32 },
    /// The target of a running move was replaced
    Retargeted { target: i32 },
}

impl MoveOutcome {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, MoveOutcome::NoChange)
    }
}

/// What happened during one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionEvent {
    /// Nothing to do
    Idle,
    /// Moving or settling, nothing to report
    Busy,
    /// Periodic position announcement while moving
    PositionUpdate(i32),
    /// Target reached; settle window started
    Arrived(i32),
    /// Settle window elapsed; follow-up work may run
    Settled(i32),
}

/// Single-axis motion controller
#[derive(Debug, Clone)]
pub struct MotionController {
    position: i32,
    target: i32,
    state: MotionState,
    direction: MoveDirection,
    /// Physical direction latched when the move started
    physical: Direction,
    backlash_remaining: u32,
    /// Driver enabled and configured for the current move
    prepared: bool,
    last_step_ms: Option<u32>,
    steps_since_update: u32,
    settle_start_ms: u32,
    settle_ms: u32,
    step_mode: StepMode,
    microsteps_per_move: u8,
    position_update_steps: u32,
    speed_change_threshold: u32,
}

impl MotionController {
    /// Create a controller at rest at `position`
    pub fn new(position: i32, config: &FocuserConfig) -> Self {
        Self {
            position,
            target: position,
            state: MotionState::Idle,
            direction: MoveDirection::In,
            physical: Direction::CounterClockwise,
            backlash_remaining: 0,
            prepared: false,
            last_step_ms: None,
            steps_since_update: 0,
            settle_start_ms: 0,
            settle_ms: 0,
            step_mode: StepMode::default(),
            microsteps_per_move: 1,
            position_update_steps: config.position_update_steps.max(1),
            speed_change_threshold: config.speed_change_threshold,
        }
    }

    pub fn position(&self) -> i32 {
        self.position
    }

    pub fn target(&self) -> i32 {
        self.target
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn direction(&self) -> MoveDirection {
        self.direction
    }

    pub fn backlash_remaining(&self) -> u32 {
        self.backlash_remaining
    }

    pub fn step_mode(&self) -> StepMode {
        self.step_mode
    }

    /// Motor is turning (pre-roll or real steps)
    pub fn is_turning(&self) -> bool {
        self.state == MotionState::Moving
    }

    /// Moving or settling
    pub fn is_busy(&self) -> bool {
        self.state != MotionState::Idle
    }

    /// Select the driver microstep resolution for subsequent moves
    pub fn set_step_mode(&mut self, mode: StepMode) {
        self.step_mode = mode;
        self.prepared = false;
    }

    /// Driver pulses issued per logical step
    pub fn set_microsteps_per_move(&mut self, count: u8) {
        self.microsteps_per_move = count.max(1);
    }

    /// Request a move to `new_position`
    ///
    /// The position is clamped to `[FOCUSER_LOWER_LIMIT, max_step]`. A new
    /// request while moving replaces the target. A request equal to the
    /// current position while at rest changes nothing, settle timers
    /// included.
    pub fn request_move(&mut self, new_position: i32, settings: &PersistedSettings) -> MoveOutcome {
        let target = settings.clamp_position(new_position);
        let was_moving = self.is_turning();

        if target == self.position {
            if !was_moving {
                return MoveOutcome::NoChange;
            }
            // Stop where we are at the next tick
            self.target = target;
            self.backlash_remaining = 0;
            return MoveOutcome::Retargeted { target };
        }

        let direction = MoveDirection::between(self.position, target);
        let keep_preroll = was_moving && direction == self.direction && self.backlash_remaining > 0;
        if !keep_preroll {
            // Pre-roll only when reversing relative to the last pulse
            self.backlash_remaining = if direction != settings.move_direction {
                settings.backlash_steps(direction)
            } else {
                0
            };
        }

        let physical = direction.to_physical(settings.reverse_direction);
        if !was_moving || physical != self.physical {
            self.prepared = false;
        }

        self.target = target;
        self.direction = direction;
        self.physical = physical;

        if was_moving {
            MoveOutcome::Retargeted { target }
        } else {
            self.state = MotionState::Moving;
            self.last_step_ms = None;
            self.steps_since_update = 0;
            MoveOutcome::Started { target }
        }
    }

    /// Stop immediately
    ///
    /// The target becomes the current position and any pending pre-roll is
    /// dropped. A running move enters the settle window. Returns whether the
    /// motor was turning.
    pub fn halt(&mut self, now_ms: u32, settings: &PersistedSettings) -> bool {
        self.target = self.position;
        self.backlash_remaining = 0;

        if self.is_turning() {
            self.begin_settle(now_ms, settings);
            true
        } else {
            false
        }
    }

    /// Redefine the current position without moving
    pub fn sync_position(
        &mut self,
        position: i32,
        now_ms: u32,
        settings: &PersistedSettings,
    ) -> i32 {
        self.halt(now_ms, settings);
        let position = settings.clamp_position(position);
        self.position = position;
        self.target = position;
        position
    }

    /// Advance the motion state machine
    ///
    /// Issues at most one logical step. On a driver error the position is
    /// left unchanged and the error is returned.
    pub fn tick<D: StepperDriver>(
        &mut self,
        now_ms: u32,
        settings: &mut PersistedSettings,
        driver: &mut D,
    ) -> Result<MotionEvent, StepperError> {
        match self.state {
            MotionState::Idle => return Ok(MotionEvent::Idle),
            MotionState::Settling => {
                if has_elapsed(now_ms, self.settle_start_ms, self.settle_ms) {
                    self.state = MotionState::Idle;
                    return Ok(MotionEvent::Settled(self.position));
                }
                return Ok(MotionEvent::Busy);
            }
            MotionState::Moving => {}
        }

        if let Some(last) = self.last_step_ms {
            if !has_elapsed(now_ms, last, self.step_delay_ms(settings.speed)) {
                return Ok(MotionEvent::Busy);
            }
        }

        if !self.prepared {
            driver.enable(true)?;
            driver.set_step_mode(self.step_mode)?;
            driver.set_direction(self.physical)?;
            self.prepared = true;
        }

        if self.backlash_remaining > 0 {
            self.pulse(driver)?;
            self.backlash_remaining -= 1;
            settings.move_direction = self.direction;
            self.last_step_ms = Some(now_ms);
            return Ok(MotionEvent::Busy);
        }

        if self.position != self.target {
            self.pulse(driver)?;
            self.position += match self.direction {
                MoveDirection::Out => 1,
                MoveDirection::In => -1,
            };
            settings.move_direction = self.direction;
            self.last_step_ms = Some(now_ms);
            self.steps_since_update += 1;
        }

        if self.position == self.target {
            self.begin_settle(now_ms, settings);
            return Ok(MotionEvent::Arrived(self.position));
        }

        if self.steps_since_update >= self.position_update_steps {
            self.steps_since_update = 0;
            if settings.update_while_moving {
                return Ok(MotionEvent::PositionUpdate(self.position));
            }
        }

        Ok(MotionEvent::Busy)
    }

    fn pulse<D: StepperDriver>(&self, driver: &mut D) -> Result<(), StepperError> {
        for _ in 0..self.microsteps_per_move {
            driver.pulse()?;
        }
        Ok(())
    }

    /// Step delay for the next step; slow when close to the target
    fn step_delay_ms(&self, speed: SpeedClass) -> u32 {
        if self.position.abs_diff(self.target) < self.speed_change_threshold {
            SpeedClass::Slow.step_delay_ms()
        } else {
            speed.step_delay_ms()
        }
    }

    fn begin_settle(&mut self, now_ms: u32, settings: &PersistedSettings) {
        self.state = MotionState::Settling;
        self.settle_start_ms = now_ms;
        self.settle_ms = settings.settle_duration_ms();
        self.steps_since_update = 0;
        self.prepared = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Stepper double recording pulses
    #[derive(Default)]
    struct MockStepper {
        enabled: bool,
        direction: Option<Direction>,
        mode: Option<StepMode>,
        pulses: u32,
        fail_pulse: bool,
    }

    impl StepperDriver for MockStepper {
        fn enable(&mut self, enabled: bool) -> Result<(), StepperError> {
            self.enabled = enabled;
            Ok(())
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        fn set_direction(&mut self, dir: Direction) -> Result<(), StepperError> {
            self.direction = Some(dir);
            Ok(())
        }

        fn set_step_mode(&mut self, mode: StepMode) -> Result<(), StepperError> {
            self.mode = Some(mode);
            Ok(())
        }

        fn pulse(&mut self) -> Result<(), StepperError> {
            if self.fail_pulse {
                return Err(StepperError::Pin);
            }
            self.pulses += 1;
            Ok(())
        }
    }

    fn setup(position: i32) -> (MotionController, PersistedSettings, MockStepper) {
        let mut settings = PersistedSettings::default();
        settings.last_position = position;
        let motion = MotionController::new(position, &FocuserConfig::default());
        (motion, settings, MockStepper::default())
    }

    /// Tick with a generous clock until the controller stops turning
    fn run_until_arrived(
        motion: &mut MotionController,
        settings: &mut PersistedSettings,
        driver: &mut MockStepper,
        now: &mut u32,
    ) {
        for _ in 0..200_000 {
            if !motion.is_turning() {
                return;
            }
            motion.tick(*now, settings, driver).unwrap();
            *now += 10;
        }
        panic!("move did not finish");
    }

    #[test]
    fn test_idle_tick_is_noop() {
        let (mut motion, mut settings, mut driver) = setup(1000);
        assert_eq!(
            motion.tick(0, &mut settings, &mut driver),
            Ok(MotionEvent::Idle)
        );
        assert_eq!(driver.pulses, 0);
        assert!(!driver.enabled);
    }

    #[test]
    fn test_request_is_clamped() {
        let (mut motion, settings, _) = setup(1000);
        assert_eq!(
            motion.request_move(99_999, &settings),
            MoveOutcome::Started { target: 10_000 }
        );
        assert_eq!(motion.target(), 10_000);

        let (mut motion, settings, _) = setup(1000);
        motion.request_move(-50, &settings);
        assert_eq!(motion.target(), 0);
    }

    #[test]
    fn test_request_to_current_position_is_noop() {
        let (mut motion, settings, _) = setup(1000);
        assert_eq!(motion.request_move(1000, &settings), MoveOutcome::NoChange);
        assert_eq!(motion.state(), MotionState::Idle);
    }

    #[test]
    fn test_noop_request_keeps_settle_timer() {
        let (mut motion, mut settings, mut driver) = setup(1000);
        let mut now = 0;
        motion.request_move(1005, &settings);
        run_until_arrived(&mut motion, &mut settings, &mut driver, &mut now);
        assert_eq!(motion.state(), MotionState::Settling);
        let settle_start = motion.settle_start_ms;

        assert_eq!(motion.request_move(1005, &settings), MoveOutcome::NoChange);
        assert_eq!(motion.settle_start_ms, settle_start);
        assert_eq!(motion.state(), MotionState::Settling);
    }

    #[test]
    fn test_move_without_backlash() {
        let (mut motion, mut settings, mut driver) = setup(1000);
        let mut now = 0;
        motion.request_move(2000, &settings);
        run_until_arrived(&mut motion, &mut settings, &mut driver, &mut now);

        assert_eq!(motion.position(), 2000);
        assert_eq!(driver.pulses, 1000);
        assert_eq!(settings.move_direction, MoveDirection::Out);
        assert_eq!(driver.direction, Some(Direction::Clockwise));
        assert!(driver.enabled);
    }

    #[test]
    fn test_backlash_on_reversal() {
        let (mut motion, mut settings, mut driver) = setup(1000);
        settings.move_direction = MoveDirection::In;
        settings.backlash_out_enabled = true;
        settings.backlash_steps_out = 40;
        let mut now = 0;

        motion.request_move(2000, &settings);
        assert_eq!(motion.backlash_remaining(), 40);

        // Pre-roll pulses do not change the position
        for _ in 0..40 {
            motion.tick(now, &mut settings, &mut driver).unwrap();
            now += 10;
        }
        assert_eq!(driver.pulses, 40);
        assert_eq!(motion.position(), 1000);

        run_until_arrived(&mut motion, &mut settings, &mut driver, &mut now);
        assert_eq!(driver.pulses, 1040);
        assert_eq!(motion.position(), 2000);
    }

    #[test]
    fn test_no_backlash_when_continuing_direction() {
        let (mut motion, mut settings, mut driver) = setup(1000);
        settings.move_direction = MoveDirection::Out;
        settings.backlash_out_enabled = true;
        settings.backlash_steps_out = 40;

        motion.request_move(1100, &settings);
        assert_eq!(motion.backlash_remaining(), 0);

        let mut now = 0;
        run_until_arrived(&mut motion, &mut settings, &mut driver, &mut now);
        assert_eq!(driver.pulses, 100);
    }

    #[test]
    fn test_step_delay_gate() {
        let (mut motion, mut settings, mut driver) = setup(1000);
        settings.speed = SpeedClass::Fast;
        motion.request_move(2000, &settings);

        motion.tick(0, &mut settings, &mut driver).unwrap();
        motion.tick(1, &mut settings, &mut driver).unwrap();
        assert_eq!(driver.pulses, 1);
        motion.tick(2, &mut settings, &mut driver).unwrap();
        assert_eq!(driver.pulses, 2);
    }

    #[test]
    fn test_slow_near_target() {
        let (mut motion, mut settings, mut driver) = setup(1000);
        settings.speed = SpeedClass::Fast;
        motion.request_move(1010, &settings);

        motion.tick(0, &mut settings, &mut driver).unwrap();
        motion.tick(4, &mut settings, &mut driver).unwrap();
        assert_eq!(driver.pulses, 1);
        motion.tick(8, &mut settings, &mut driver).unwrap();
        assert_eq!(driver.pulses, 2);
    }

    #[test]
    fn test_position_updates_every_interval() {
        let (mut motion, mut settings, mut driver) = setup(0);
        motion.request_move(1000, &settings);

        let mut updates = 0;
        let mut now = 0;
        while motion.is_turning() {
            if let MotionEvent::PositionUpdate(pos) =
                motion.tick(now, &mut settings, &mut driver).unwrap()
            {
                assert_eq!(pos % 15, 0);
                updates += 1;
            }
            now += 10;
        }
        assert_eq!(updates, 999 / 15);

        let (mut motion, mut settings, mut driver) = setup(0);
        settings.update_while_moving = false;
        motion.request_move(1000, &settings);
        let mut now = 0;
        while motion.is_turning() {
            let event = motion.tick(now, &mut settings, &mut driver).unwrap();
            assert!(!matches!(event, MotionEvent::PositionUpdate(_)));
            now += 10;
        }
    }

    #[test]
    fn test_arrival_then_settle() {
        let (mut motion, mut settings, mut driver) = setup(1000);
        motion.request_move(1001, &settings);

        assert_eq!(
            motion.tick(0, &mut settings, &mut driver),
            Ok(MotionEvent::Arrived(1001))
        );
        assert!(!motion.is_turning());
        assert!(motion.is_busy());

        // settle = 50 + 2 * 5
        assert_eq!(
            motion.tick(59, &mut settings, &mut driver),
            Ok(MotionEvent::Busy)
        );
        assert_eq!(
            motion.tick(60, &mut settings, &mut driver),
            Ok(MotionEvent::Settled(1001))
        );
        assert_eq!(motion.state(), MotionState::Idle);
    }

    #[test]
    fn test_retarget_while_moving() {
        let (mut motion, mut settings, mut driver) = setup(1000);
        motion.request_move(2000, &settings);
        let mut now = 0;
        for _ in 0..10 {
            motion.tick(now, &mut settings, &mut driver).unwrap();
            now += 10;
        }
        assert_eq!(motion.position(), 1010);

        assert_eq!(
            motion.request_move(1005, &settings),
            MoveOutcome::Retargeted { target: 1005 }
        );
        run_until_arrived(&mut motion, &mut settings, &mut driver, &mut now);
        assert_eq!(motion.position(), 1005);
        assert_eq!(driver.direction, Some(Direction::CounterClockwise));
    }

    #[test]
    fn test_reversal_mid_preroll_schedules_full_preroll() {
        let (mut motion, mut settings, mut driver) = setup(1000);
        settings.move_direction = MoveDirection::Out;
        settings.backlash_in_enabled = true;
        settings.backlash_steps_in = 30;
        settings.backlash_out_enabled = true;
        settings.backlash_steps_out = 20;

        motion.request_move(500, &settings);
        assert_eq!(motion.backlash_remaining(), 30);
        let mut now = 0;
        for _ in 0..5 {
            motion.tick(now, &mut settings, &mut driver).unwrap();
            now += 10;
        }
        assert_eq!(motion.backlash_remaining(), 25);

        // Same direction keeps what is left
        motion.request_move(600, &settings);
        assert_eq!(motion.backlash_remaining(), 25);

        // Reversal takes up the full slack the other way
        motion.request_move(1500, &settings);
        assert_eq!(motion.backlash_remaining(), 20);
    }

    #[test]
    fn test_halt_mid_backlash() {
        let (mut motion, mut settings, mut driver) = setup(1000);
        settings.move_direction = MoveDirection::In;
        settings.backlash_out_enabled = true;
        settings.backlash_steps_out = 40;
        motion.request_move(2000, &settings);

        let mut now = 0;
        for _ in 0..10 {
            motion.tick(now, &mut settings, &mut driver).unwrap();
            now += 10;
        }
        assert_eq!(motion.position(), 1000);

        assert!(motion.halt(now, &settings));
        assert!(!motion.is_turning());
        assert_eq!(motion.backlash_remaining(), 0);
        assert_eq!(motion.target(), 1000);

        let pulses = driver.pulses;
        for _ in 0..1000 {
            motion.tick(now, &mut settings, &mut driver).unwrap();
            now += 10;
        }
        assert_eq!(driver.pulses, pulses);
        assert_eq!(motion.position(), 1000);
        assert_eq!(motion.state(), MotionState::Idle);
    }

    #[test]
    fn test_halt_when_idle() {
        let (mut motion, settings, _) = setup(1000);
        assert!(!motion.halt(0, &settings));
        assert_eq!(motion.state(), MotionState::Idle);
    }

    #[test]
    fn test_sync_position() {
        let (mut motion, settings, _) = setup(1000);
        assert_eq!(motion.sync_position(3000, 0, &settings), 3000);
        assert_eq!(motion.position(), 3000);
        assert_eq!(motion.target(), 3000);
        assert_eq!(motion.sync_position(60_000, 0, &settings), 10_000);
    }

    #[test]
    fn test_reverse_direction_inverts_line() {
        let (mut motion, mut settings, mut driver) = setup(1000);
        settings.reverse_direction = true;
        motion.request_move(1010, &settings);
        motion.tick(0, &mut settings, &mut driver).unwrap();
        assert_eq!(driver.direction, Some(Direction::CounterClockwise));
    }

    #[test]
    fn test_step_mode_and_microsteps() {
        let (mut motion, mut settings, mut driver) = setup(1000);
        motion.set_step_mode(StepMode::Sixteenth);
        motion.set_microsteps_per_move(4);
        motion.request_move(1010, &settings);

        let mut now = 0;
        run_until_arrived(&mut motion, &mut settings, &mut driver, &mut now);
        assert_eq!(driver.mode, Some(StepMode::Sixteenth));
        assert_eq!(driver.pulses, 40);
        assert_eq!(motion.position(), 1010);
    }

    #[test]
    fn test_driver_error_leaves_position() {
        let (mut motion, mut settings, mut driver) = setup(1000);
        driver.fail_pulse = true;
        motion.request_move(1010, &settings);
        assert_eq!(
            motion.tick(0, &mut settings, &mut driver),
            Err(StepperError::Pin)
        );
        assert_eq!(motion.position(), 1000);
        assert!(motion.is_turning());
    }
}
