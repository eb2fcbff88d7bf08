//! Mixer bus volume and mute settings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Lowest linear volume mapped to decibels (-80 dB).
const MIN_LINEAR_VOLUME: f32 = 0.0001;

/// Output mixer exposing per-bus volume parameters in decibels.
pub trait MixerBus: Send {
    fn set_parameter(&mut self, name: &str, decibels: f32);
}

/// Map a linear volume to decibels.
pub fn volume_to_decibels(volume: f32) -> f32 {
    volume.max(MIN_LINEAR_VOLUME).log10() * 20.0
}

/// A mixer bus and the parameter that controls its volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusDefinition {
    pub name: String,
    /// Exposed mixer parameter. Defaults to `"{name}Volume"`.
    #[serde(default)]
    pub exposed_param: Option<String>,
}

impl BusDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exposed_param: None,
        }
    }

    pub fn parameter(&self) -> String {
        self.exposed_param
            .clone()
            .unwrap_or_else(|| format!("{}Volume", self.name))
    }
}

/// Volume and mute state of one bus.
#[derive(Debug, Clone, PartialEq)]
pub struct BusSetting {
    parameter: String,
    volume: f32,
    muted: bool,
    /// Volume to restore on unmute.
    restore_volume: f32,
}

impl BusSetting {
    fn new(parameter: String, volume: f32) -> Self {
        Self {
            parameter,
            volume,
            muted: false,
            restore_volume: volume,
        }
    }

    pub const fn volume(&self) -> f32 {
        self.volume
    }

    pub const fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    fn apply(&self, output: &mut dyn MixerBus) {
        output.set_parameter(&self.parameter, volume_to_decibels(self.volume));
    }
}

/// Per-bus volume/mute state, written through to the output mixer.
pub struct MixerSettings {
    buses: BTreeMap<String, BusSetting>,
    output: Box<dyn MixerBus>,
}

impl MixerSettings {
    /// Create settings for `buses`, writing `default_volume` to every bus.
    pub fn new(
        buses: &[BusDefinition],
        default_volume: f32,
        mut output: Box<dyn MixerBus>,
    ) -> Self {
        let default_volume = default_volume.clamp(0.0, 1.0);
        let buses = buses
            .iter()
            .map(|bus| {
                let setting = BusSetting::new(bus.parameter(), default_volume);
                setting.apply(output.as_mut());
                (bus.name.clone(), setting)
            })
            .collect();

        Self { buses, output }
    }

    /// Set the volume of `bus` (clamped to 0..=1).
    ///
    /// While muted only the restore value changes. Returns false for
    /// unknown buses.
    pub fn set_volume(&mut self, bus: &str, volume: f32) -> bool {
        let Some(setting) = self.buses.get_mut(bus) else {
            warn!("Ignoring volume change for unknown mixer bus {bus}");
            return false;
        };

        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        if setting.muted {
            setting.restore_volume = volume;
        } else {
            setting.volume = volume;
            setting.restore_volume = volume;
            setting.apply(self.output.as_mut());
        }
        debug!("Mixer bus {bus} volume {volume:.2}");
        true
    }

    /// Mute or unmute `bus`. Returns false for unknown buses.
    pub fn set_mute(&mut self, bus: &str, muted: bool) -> bool {
        let Some(setting) = self.buses.get_mut(bus) else {
            warn!("Ignoring mute change for unknown mixer bus {bus}");
            return false;
        };

        if muted && !setting.muted {
            setting.restore_volume = setting.volume;
            setting.volume = 0.0;
            setting.muted = true;
        } else if !muted && setting.muted {
            setting.volume = setting.restore_volume;
            setting.muted = false;
        } else {
            return true;
        }
        setting.apply(self.output.as_mut());
        debug!("Mixer bus {bus} muted: {muted}");
        true
    }

    pub fn volume(&self, bus: &str) -> Option<f32> {
        self.buses.get(bus).map(BusSetting::volume)
    }

    pub fn is_muted(&self, bus: &str) -> Option<bool> {
        self.buses.get(bus).map(BusSetting::is_muted)
    }

    pub fn bus(&self, bus: &str) -> Option<&BusSetting> {
        self.buses.get(bus)
    }

    pub fn bus_names(&self) -> impl Iterator<Item = &str> {
        self.buses.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for MixerSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MixerSettings")
            .field("buses", &self.buses)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::sim::SimMixerBus;

    fn settings() -> (MixerSettings, SimMixerBus) {
        let bus = SimMixerBus::new();
        let settings = MixerSettings::new(
            &[
                BusDefinition::new("BGM"),
                BusDefinition {
                    name: "SFX".to_string(),
                    exposed_param: Some("EffectsLevel".to_string()),
                },
            ],
            0.5,
            Box::new(bus.clone()),
        );
        (settings, bus)
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_decibel_mapping() {
        assert!(close(volume_to_decibels(1.0), 0.0));
        assert!(close(volume_to_decibels(0.5), -6.0206));
        assert!(close(volume_to_decibels(0.0), -80.0));
        assert!(close(volume_to_decibels(-1.0), -80.0));
    }

    #[test]
    fn test_default_volume_applied() {
        let (settings, bus) = settings();
        assert!(close(bus.parameter("BGMVolume").unwrap(), -6.0206));
        assert!(close(bus.parameter("EffectsLevel").unwrap(), -6.0206));
        assert!(bus.parameter("SFXVolume").is_none());
        assert_eq!(settings.volume("BGM"), Some(0.5));
    }

    #[test]
    fn test_mute_restores_volume() {
        let (mut settings, bus) = settings();
        assert!(settings.set_volume("BGM", 0.8));
        assert!(settings.set_mute("BGM", true));
        assert!(close(bus.parameter("BGMVolume").unwrap(), -80.0));

        // Muting twice keeps the first restore value.
        assert!(settings.set_mute("BGM", true));
        assert!(settings.set_mute("BGM", false));
        assert_eq!(settings.volume("BGM"), Some(0.8));
        assert!(close(bus.parameter("BGMVolume").unwrap(), volume_to_decibels(0.8)));
    }

    #[test]
    fn test_volume_while_muted_updates_restore_only() {
        let (mut settings, bus) = settings();
        settings.set_mute("SFX", true);
        settings.set_volume("SFX", 1.0);
        assert_eq!(settings.volume("SFX"), Some(0.0));
        assert!(close(bus.parameter("EffectsLevel").unwrap(), -80.0));

        settings.set_mute("SFX", false);
        assert_eq!(settings.volume("SFX"), Some(1.0));
        assert!(close(bus.parameter("EffectsLevel").unwrap(), 0.0));
    }

    #[test]
    fn test_unknown_bus_ignored() {
        let (mut settings, _bus) = settings();
        assert!(!settings.set_volume("Voice", 1.0));
        assert!(!settings.set_mute("Voice", true));
        assert_eq!(settings.volume("Voice"), None);
        assert_eq!(settings.bus_names().collect::<Vec<_>>(), vec!["BGM", "SFX"]);
    }
}
