//! Input drivers
//!
//! Implementations of [`crate::port::InputBackend`] for real MIDI hardware.

pub mod midi_in;

pub use midi_in::MidirBackend;
