//! Temperature compensation
//!
//! Focus drifts as the optical train expands and contracts. The compensator
//! samples the probe on a fixed cadence and, while the motor is idle,
//! converts the drift since the last correction into a step offset:
//!
//! ```text
//! steps = round(Δ°C × coefficient)      (negated when compensating inwards)
//! ```
//!
//! Drift smaller than [`TEMP_RESOLUTION_X100`] is ignored.

use crate::config::{
    FocuserConfig, MoveDirection, PersistedSettings, TemperatureUnit, TEMP_RESOLUTION_X100,
};
use crate::time::has_elapsed;
use crate::traits::probe::celsius_to_fahrenheit_x100;
use crate::traits::{ProbeError, TemperatureProbe};

/// Compensation bookkeeping; readings are °C × 100
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TemperatureState {
    pub current_x100: Option<i32>,
    pub previous_x100: Option<i32>,
    /// Reading at the last correction
    pub baseline_x100: Option<i32>,
    pub last_sample_ms: Option<u32>,
    pub conversion_pending: bool,
    pub conversion_started_ms: u32,
    /// A reading was asked for out of cadence
    pub on_demand: bool,
}

/// Samples the probe and turns drift into step offsets
pub struct TemperatureCompensator<P: TemperatureProbe> {
    probe: P,
    state: TemperatureState,
    present: bool,
    refresh_ms: u32,
    timeout_ms: u32,
}

impl<P: TemperatureProbe> TemperatureCompensator<P> {
    pub fn new(probe: P, config: &FocuserConfig) -> Self {
        let present = config.probe_fitted && probe.is_present();
        Self {
            probe,
            state: TemperatureState::default(),
            present,
            refresh_ms: config.temp_refresh_ms,
            timeout_ms: config.conversion_timeout_ms,
        }
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    pub fn state(&self) -> &TemperatureState {
        &self.state
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Latest reading in °C × 100
    pub fn celsius_x100(&self) -> Option<i32> {
        self.state.current_x100
    }

    /// Latest reading × 100 in the given unit
    pub fn reading_x100(&self, unit: TemperatureUnit) -> Option<i32> {
        self.state.current_x100.map(|c| match unit {
            TemperatureUnit::Celsius => c,
            TemperatureUnit::Fahrenheit => celsius_to_fahrenheit_x100(c),
        })
    }

    /// Start a conversion on the next pass regardless of cadence
    pub fn request_now(&mut self) {
        self.state.on_demand = true;
    }

    /// Make the latest reading the compensation reference
    pub fn reset_baseline(&mut self) {
        self.state.baseline_x100 = self.state.current_x100;
    }

    /// Drive the probe; returns a reading when one completes
    ///
    /// Starts a conversion every refresh interval (or at once after
    /// [`request_now`](Self::request_now)) and polls a pending conversion
    /// until it completes or times out.
    pub fn sample(&mut self, now_ms: u32) -> Option<i32> {
        if !self.present {
            return None;
        }

        if self.state.conversion_pending {
            return self.poll_conversion(now_ms);
        }

        let due = match self.state.last_sample_ms {
            None => true,
            Some(last) => has_elapsed(now_ms, last, self.refresh_ms),
        };
        if due || self.state.on_demand {
            self.state.on_demand = false;
            self.state.last_sample_ms = Some(now_ms);
            match self.probe.request_conversion() {
                Ok(()) => {
                    self.state.conversion_pending = true;
                    self.state.conversion_started_ms = now_ms;
                }
                Err(e) => warn!("temperature conversion not started: {}", e),
            }
        }

        None
    }

    fn poll_conversion(&mut self, now_ms: u32) -> Option<i32> {
        match self.probe.read_celsius_x100() {
            Ok(reading) => {
                self.state.conversion_pending = false;
                self.state.previous_x100 = self.state.current_x100;
                self.state.current_x100 = Some(reading);
                if self.state.baseline_x100.is_none() {
                    self.state.baseline_x100 = Some(reading);
                }
                Some(reading)
            }
            Err(ProbeError::NotReady) => {
                if has_elapsed(now_ms, self.state.conversion_started_ms, self.timeout_ms) {
                    warn!("temperature conversion timed out");
                    self.state.conversion_pending = false;
                }
                None
            }
            Err(e) => {
                warn!("temperature read failed: {}", e);
                self.state.conversion_pending = false;
                None
            }
        }
    }

    /// Step offset to apply for the drift since the last correction
    ///
    /// Only evaluates when compensation is enabled and the motor is idle. A
    /// non-zero result moves the baseline to the current reading.
    pub fn evaluate(&mut self, settings: &PersistedSettings, motor_idle: bool) -> Option<i32> {
        if !motor_idle || !settings.tc_enabled {
            return None;
        }
        let current = self.state.current_x100?;
        let baseline = match self.state.baseline_x100 {
            Some(baseline) => baseline,
            None => {
                self.state.baseline_x100 = Some(current);
                return None;
            }
        };

        let delta = current - baseline;
        if delta.abs() < TEMP_RESOLUTION_X100 {
            return None;
        }

        let steps = compensation_steps(delta, settings.temp_coefficient, settings.tc_direction);
        if steps == 0 {
            return None;
        }

        debug!("temperature drift {} -> {} steps", delta, steps);
        self.state.baseline_x100 = Some(current);
        Some(steps)
    }
}

/// Steps for a drift of `delta_x100` (°C × 100), rounded half away from zero
pub fn compensation_steps(delta_x100: i32, coefficient: u8, direction: MoveDirection) -> i32 {
    let product = delta_x100 * coefficient as i32;
    let steps = if product >= 0 {
        (product + 50) / 100
    } else {
        (product - 50) / 100
    };
    match direction {
        MoveDirection::Out => steps,
        MoveDirection::In => -steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::NoProbe;

    /// Probe returning a settable reading after `latency` polls
    struct MockProbe {
        reading: Result<i32, ProbeError>,
        latency: u32,
        polls: u32,
        conversions: u32,
    }

    impl MockProbe {
        fn reading(celsius_x100: i32) -> Self {
            Self {
                reading: Ok(celsius_x100),
                latency: 0,
                polls: 0,
                conversions: 0,
            }
        }
    }

    impl TemperatureProbe for MockProbe {
        fn request_conversion(&mut self) -> Result<(), ProbeError> {
            self.conversions += 1;
            self.polls = 0;
            Ok(())
        }

        fn read_celsius_x100(&mut self) -> Result<i32, ProbeError> {
            if self.polls < self.latency {
                self.polls += 1;
                return Err(ProbeError::NotReady);
            }
            self.reading
        }
    }

    fn compensator(probe: MockProbe) -> TemperatureCompensator<MockProbe> {
        TemperatureCompensator::new(probe, &FocuserConfig::default())
    }

    fn enabled_settings(coefficient: u8) -> PersistedSettings {
        let mut settings = PersistedSettings::default();
        settings.tc_enabled = true;
        settings.temp_coefficient = coefficient;
        settings
    }

    #[test]
    fn test_rounding() {
        assert_eq!(compensation_steps(50, 4, MoveDirection::Out), 2);
        assert_eq!(compensation_steps(50, 4, MoveDirection::In), -2);
        // 0.3°C × 5 = 1.5 steps
        assert_eq!(compensation_steps(30, 5, MoveDirection::Out), 2);
        assert_eq!(compensation_steps(-30, 5, MoveDirection::Out), -2);
        assert_eq!(compensation_steps(25, 1, MoveDirection::Out), 0);
    }

    #[test]
    fn test_sampling_cadence() {
        let mut tc = compensator(MockProbe::reading(2000));

        assert_eq!(tc.sample(0), None);
        assert_eq!(tc.sample(10), Some(2000));
        assert_eq!(tc.sample(20), None);
        assert_eq!(tc.probe().conversions, 1);

        assert_eq!(tc.sample(1299), None);
        assert_eq!(tc.probe().conversions, 1);
        tc.sample(1300);
        assert_eq!(tc.probe().conversions, 2);
    }

    #[test]
    fn test_on_demand_sample() {
        let mut tc = compensator(MockProbe::reading(2000));
        tc.sample(0);
        tc.sample(10);

        tc.request_now();
        tc.sample(20);
        assert_eq!(tc.probe().conversions, 2);
    }

    #[test]
    fn test_conversion_timeout() {
        let mut probe = MockProbe::reading(2000);
        probe.latency = u32::MAX;
        let mut tc = TemperatureCompensator::new(probe, &FocuserConfig::default());

        tc.sample(0);
        assert!(tc.state().conversion_pending);
        tc.sample(999);
        assert!(tc.state().conversion_pending);
        tc.sample(1000);
        assert!(!tc.state().conversion_pending);
        assert_eq!(tc.celsius_x100(), None);
    }

    #[test]
    fn test_disconnected_probe() {
        let mut probe = MockProbe::reading(0);
        probe.reading = Err(ProbeError::Disconnected);
        let mut tc = TemperatureCompensator::new(probe, &FocuserConfig::default());
        tc.sample(0);
        assert_eq!(tc.sample(10), None);
        assert!(!tc.state().conversion_pending);
    }

    #[test]
    fn test_compensation_move_then_none() {
        let mut tc = compensator(MockProbe::reading(2000));
        let settings = enabled_settings(4);

        tc.sample(0);
        tc.sample(10);
        assert_eq!(tc.state().baseline_x100, Some(2000));

        // +0.5°C
        tc.probe.reading = Ok(2050);
        tc.request_now();
        tc.sample(20);
        tc.sample(30);

        let steps = tc.evaluate(&settings, true).unwrap();
        assert_eq!(steps.abs(), 2);
        assert_eq!(tc.evaluate(&settings, true), None);
    }

    #[test]
    fn test_small_drift_ignored() {
        let mut tc = compensator(MockProbe::reading(2000));
        let settings = enabled_settings(100);
        tc.sample(0);
        tc.sample(10);

        tc.probe.reading = Ok(2024);
        tc.request_now();
        tc.sample(20);
        tc.sample(30);
        assert_eq!(tc.evaluate(&settings, true), None);
        // Baseline kept, so drift accumulates
        assert_eq!(tc.state().baseline_x100, Some(2000));
    }

    #[test]
    fn test_evaluate_requires_idle_and_enabled() {
        let mut tc = compensator(MockProbe::reading(2000));
        tc.sample(0);
        tc.sample(10);
        tc.probe.reading = Ok(2100);
        tc.request_now();
        tc.sample(20);
        tc.sample(30);

        let settings = enabled_settings(4);
        assert_eq!(tc.evaluate(&settings, false), None);

        let mut disabled = settings;
        disabled.tc_enabled = false;
        assert_eq!(tc.evaluate(&disabled, true), None);

        assert_eq!(tc.evaluate(&settings, true), Some(-4));
    }

    #[test]
    fn test_reset_baseline() {
        let mut tc = compensator(MockProbe::reading(2000));
        tc.sample(0);
        tc.sample(10);
        tc.probe.reading = Ok(2100);
        tc.request_now();
        tc.sample(20);
        tc.sample(30);

        tc.reset_baseline();
        assert_eq!(tc.evaluate(&enabled_settings(4), true), None);
    }

    #[test]
    fn test_fahrenheit_reading() {
        let mut tc = compensator(MockProbe::reading(2500));
        tc.sample(0);
        tc.sample(10);
        assert_eq!(tc.reading_x100(TemperatureUnit::Celsius), Some(2500));
        assert_eq!(tc.reading_x100(TemperatureUnit::Fahrenheit), Some(7700));
    }

    #[test]
    fn test_no_probe_never_reads() {
        let mut tc = TemperatureCompensator::new(NoProbe, &FocuserConfig::default());
        assert!(!tc.is_present());
        for t in 0..10 {
            assert_eq!(tc.sample(t * 2000), None);
        }
        assert_eq!(tc.evaluate(&enabled_settings(4), true), None);
    }

    #[test]
    fn test_probe_not_fitted_by_config() {
        let config = FocuserConfig {
            probe_fitted: false,
            ..Default::default()
        };
        let tc = TemperatureCompensator::new(MockProbe::reading(2000), &config);
        assert!(!tc.is_present());
    }
}
