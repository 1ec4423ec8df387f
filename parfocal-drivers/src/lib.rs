//! Hardware driver implementations
//!
//! This crate provides concrete implementations of the traits defined
//! in parfocal-core for the focuser's hardware:
//!
//! - Stepper drivers (DRV8825 step/direction)
//! - Temperature probes (NTC thermistor on an ADC channel)

#![no_std]
#![deny(unsafe_code)]

pub mod sensor;
pub mod stepper;
