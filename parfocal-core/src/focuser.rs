//! Cooperative control loop
//!
//! [`Focuser`] owns every component and the hardware handles. The board glue
//! calls [`Focuser::poll`] as often as it can and hands inbound bytes to
//! [`Focuser::receive`]. Nothing blocks: each component checks its own
//! deadline against the millisecond clock passed in.
//!
//! Per pass:
//!
//! 1. Motion controller issues at most one step
//! 2. Coil power follows the setting once the motor has settled
//! 3. Temperature is sampled and, when idle, compensated
//! 4. The settings record is written if the quiet window has passed

use parfocal_hal::{ChannelId, NvStorage, Transport};
use parfocal_protocol::reply::{self, code};
use parfocal_protocol::{http, Command};

use crate::command::{self, broadcast, CommandError, Context, Router};
use crate::config::{FocuserConfig, PersistedSettings};
use crate::error::ErrorKind;
use crate::motion::{MotionController, MotionEvent};
use crate::persistence::{load_or_default, LoadOrigin, PersistenceManager};
use crate::temperature::TemperatureCompensator;
use crate::traits::{StepMode, StepperDriver, TemperatureProbe};

/// Focuser control core
pub struct Focuser<D: StepperDriver, P: TemperatureProbe, S: NvStorage> {
    driver: D,
    storage: S,
    config: FocuserConfig,
    settings: PersistedSettings,
    load_origin: LoadOrigin,
    motion: MotionController,
    persistence: PersistenceManager,
    temperature: TemperatureCompensator<P>,
    router: Router,
}

impl<D: StepperDriver, P: TemperatureProbe, S: NvStorage> Focuser<D, P, S> {
    /// Load settings and start at rest at the stored position
    pub fn new(driver: D, probe: P, mut storage: S, config: FocuserConfig, now_ms: u32) -> Self {
        let loaded = load_or_default(&mut storage, config.record_addr);

        let mut persistence = PersistenceManager::new(now_ms, &config);
        if let LoadOrigin::Unavailable(e) = loaded.origin {
            warn!("running on default settings: {}", e);
            persistence.mark_dirty(now_ms);
        }

        let mut motion = MotionController::new(loaded.settings.last_position, &config);
        if !driver.supports(motion.step_mode()) {
            if let Some(&mode) = StepMode::ALL.iter().find(|&&mode| driver.supports(mode)) {
                motion.set_step_mode(mode);
            }
        }
        info!(
            "focuser ready at {}, max {}",
            loaded.settings.last_position,
            loaded.settings.max_step
        );

        Self {
            driver,
            storage,
            config,
            settings: loaded.settings,
            load_origin: loaded.origin,
            motion,
            persistence,
            temperature: TemperatureCompensator::new(probe, &config),
            router: Router::new(),
        }
    }

    pub fn settings(&self) -> &PersistedSettings {
        &self.settings
    }

    pub fn config(&self) -> &FocuserConfig {
        &self.config
    }

    pub fn load_origin(&self) -> LoadOrigin {
        self.load_origin
    }

    pub fn motion(&self) -> &MotionController {
        &self.motion
    }

    pub fn persistence(&self) -> &PersistenceManager {
        &self.persistence
    }

    pub fn temperature(&self) -> &TemperatureCompensator<P> {
        &self.temperature
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn position(&self) -> i32 {
        self.motion.position()
    }

    pub fn is_moving(&self) -> bool {
        self.motion.is_turning()
    }

    /// Feed bytes received on `channel`
    ///
    /// Every command completed by these bytes is executed and answered
    /// before returning.
    pub fn receive<T: Transport>(
        &mut self,
        channel: ChannelId,
        bytes: &[u8],
        now_ms: u32,
        transport: &mut T,
    ) {
        let mut ctx = Context {
            now_ms,
            settings: &mut self.settings,
            motion: &mut self.motion,
            persistence: &mut self.persistence,
            temperature: &mut self.temperature,
            driver: &self.driver,
            speed_change_threshold: self.config.speed_change_threshold,
        };
        self.router.receive(channel, bytes, &mut ctx, transport);
    }

    /// Execute an already decoded command
    pub fn handle_command<T: Transport>(
        &mut self,
        channel: ChannelId,
        command: Command,
        now_ms: u32,
        transport: &mut T,
    ) {
        let result = self.dispatch(channel, command, now_ms);
        command::finish(result, channel).deliver(transport);
    }

    /// Execute an HTTP request path
    ///
    /// `new_position` carries the goto form field when present. The reply
    /// goes to the HTTP channel.
    pub fn handle_http<T: Transport>(
        &mut self,
        path: &str,
        new_position: Option<&str>,
        now_ms: u32,
        transport: &mut T,
    ) {
        let result = http::route(path, new_position)
            .map_err(CommandError::from)
            .and_then(|command| self.dispatch(ChannelId::Http, command, now_ms));
        command::finish(result, ChannelId::Http).deliver(transport);
    }

    fn dispatch(
        &mut self,
        channel: ChannelId,
        command: Command,
        now_ms: u32,
    ) -> Result<command::Delivery, CommandError> {
        let mut ctx = Context {
            now_ms,
            settings: &mut self.settings,
            motion: &mut self.motion,
            persistence: &mut self.persistence,
            temperature: &mut self.temperature,
            driver: &self.driver,
            speed_change_threshold: self.config.speed_change_threshold,
        };
        command::dispatch(command, channel, &mut ctx)
    }

    /// Run one pass of the control loop
    ///
    /// Every component runs even if an earlier one failed; the first error
    /// of the pass is returned.
    pub fn poll<T: Transport>(&mut self, now_ms: u32, transport: &mut T) -> Result<(), ErrorKind> {
        let mut first_error = None;

        if let Err(e) = self.step(now_ms, transport) {
            warn!("stepper fault, halting: {}", e);
            self.motion.halt(now_ms, &self.settings);
            first_error.get_or_insert(e);
        }

        if !self.motion.is_busy() {
            if let Err(e) = self.sync_coil_power() {
                first_error.get_or_insert(e);
            }
            self.compensate(now_ms);
        } else {
            self.temperature.sample(now_ms);
        }

        match self.persistence.maybe_flush(
            now_ms,
            &mut self.settings,
            &self.motion,
            &mut self.storage,
        ) {
            Ok(_) => {}
            Err(e) => {
                warn!("settings write failed: {}", e);
                first_error.get_or_insert(e.into());
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn step<T: Transport>(&mut self, now_ms: u32, transport: &mut T) -> Result<(), ErrorKind> {
        let event = self
            .motion
            .tick(now_ms, &mut self.settings, &mut self.driver)?;

        match event {
            MotionEvent::Idle | MotionEvent::Busy => {}
            MotionEvent::PositionUpdate(position) => {
                if let Ok(text) = reply::format(code::POSITION, format_args!("{}", position)) {
                    broadcast(transport, &text);
                }
            }
            MotionEvent::Arrived(position) => debug!("arrived at {}", position),
            MotionEvent::Settled(position) => {
                debug!("settled at {}", position);
                self.persistence.mark_dirty(now_ms);
            }
        }
        Ok(())
    }

    /// Hold or release the coils according to the setting
    fn sync_coil_power(&mut self) -> Result<(), ErrorKind> {
        let hold = self.settings.coil_power_enabled;
        if self.driver.is_enabled() != hold {
            self.driver.enable(hold)?;
        }
        Ok(())
    }

    fn compensate(&mut self, now_ms: u32) {
        self.temperature.sample(now_ms);
        let Some(steps) = self.temperature.evaluate(&self.settings, true) else {
            return;
        };

        let target = self.motion.position().saturating_add(steps);
        if self
            .motion
            .request_move(target, &self.settings)
            .is_accepted()
        {
            info!("temperature compensation: {} steps", steps);
            self.persistence.mark_dirty(now_ms);
        }
    }
}
