//! NTC 10K thermistor probe
//!
//! Focuser probes sit on the drawtube in the night air, so the table
//! covers -30°C to 50°C. Uses a lookup table for integer-only conversion.

use parfocal_core::traits::{ProbeError, TemperatureProbe};

/// NTC 10K thermistor lookup table
///
/// Table format: (resistance_ohms, temperature_x100)
/// Generated using beta equation with:
/// - R0 = 10,000 ohms at T0 = 25°C
/// - Beta = 3950K
const TEMP_TABLE: &[(u32, i32)] = &[
    (200_204, -3000),
    (144_317, -2500),
    (105_385, -2000),
    (77_898, -1500),
    (58_246, -1000),
    (44_026, -500),
    (33_621, 0),
    (25_925, 500),
    (20_175, 1000),
    (15_837, 1500),
    (12_535, 2000),
    (10_000, 2500), // R0
    (8_037, 3000),
    (6_506, 3500),
    (5_301, 4000),
    (4_348, 4500),
    (3_588, 5000),
];

/// Readings this close to either rail mean a broken circuit
const RAIL_MARGIN: u16 = 10;

/// ADC reading trait for platform abstraction
pub trait AdcReader {
    /// Read ADC value (12-bit, 0-4095)
    #[allow(clippy::result_unit_err)]
    fn read(&mut self) -> Result<u16, ()>;
}

/// NTC thermistor in a divider below a pull-up resistor
///
/// The ADC is sampled when a conversion is requested; the result is held
/// until read so the probe behaves like a converting sensor.
pub struct NtcProbe<ADC> {
    adc: ADC,
    /// Pull-up resistor value in ohms
    pullup_ohms: u32,
    /// ADC full scale
    adc_max: u16,
    pending: Option<Result<i32, ProbeError>>,
}

impl<ADC> NtcProbe<ADC> {
    /// Create a new NTC probe
    ///
    /// # Arguments
    /// - `adc`: ADC channel for reading the thermistor
    /// - `pullup_ohms`: pull-up resistor value (typically 10000)
    pub fn new(adc: ADC, pullup_ohms: u32) -> Self {
        Self {
            adc,
            pullup_ohms,
            adc_max: 4096, // 12-bit ADC
            pending: None,
        }
    }

    /// Convert ADC reading to resistance
    ///
    /// Circuit: VCC -- pullup -- ADC_PIN -- NTC -- GND
    /// R_ntc = R_pullup * adc_value / (adc_max - adc_value)
    pub fn adc_to_resistance(&self, adc_value: u16) -> Result<u32, ProbeError> {
        // Open thermistor pulls the pin to the rail
        if adc_value >= self.adc_max - RAIL_MARGIN {
            return Err(ProbeError::Disconnected);
        }

        if adc_value < RAIL_MARGIN {
            return Err(ProbeError::OutOfRange);
        }

        let numerator = self.pullup_ohms as u64 * adc_value as u64;
        let denominator = (self.adc_max - adc_value) as u64;

        Ok((numerator / denominator) as u32)
    }

    /// Calculate temperature from resistance using the lookup table
    ///
    /// Returns °C × 100, linearly interpolated between entries.
    pub fn resistance_to_celsius_x100(resistance: u32) -> Result<i32, ProbeError> {
        let (coldest, _) = TEMP_TABLE[0];
        let (hottest, _) = TEMP_TABLE[TEMP_TABLE.len() - 1];
        if resistance > coldest || resistance < hottest {
            return Err(ProbeError::OutOfRange);
        }

        // Sorted by decreasing resistance
        TEMP_TABLE
            .windows(2)
            .find(|pair| resistance <= pair[0].0 && resistance >= pair[1].0)
            .map(|pair| {
                let (r_high, t_low) = pair[0];
                let (r_low, t_high) = pair[1];
                let r_offset = (r_high - resistance) as i64;
                let r_range = (r_high - r_low) as i64;
                t_low + ((t_high - t_low) as i64 * r_offset / r_range) as i32
            })
            .ok_or(ProbeError::OutOfRange)
    }
}

impl<ADC: AdcReader> TemperatureProbe for NtcProbe<ADC> {
    fn request_conversion(&mut self) -> Result<(), ProbeError> {
        let adc_value = self.adc.read().map_err(|_| ProbeError::Disconnected)?;
        let reading = self
            .adc_to_resistance(adc_value)
            .and_then(Self::resistance_to_celsius_x100);
        self.pending = Some(reading);
        Ok(())
    }

    fn read_celsius_x100(&mut self) -> Result<i32, ProbeError> {
        self.pending.take().unwrap_or(Err(ProbeError::NotReady))
    }
}
