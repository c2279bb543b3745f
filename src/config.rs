use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::control::clamp_unit;
use crate::{Error, Result};

pub const SAMPLE_RATE: u32 = 44100;
pub const MIN_PITCH_HZ: u32 = 220;
pub const NUM_OCTAVES: u32 = 3;
/// Frames of output the sink may hold ahead of the device.
pub const SINK_BUFFER_FRAMES: usize = 2048;

/// How pending control updates are handed to the generation thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputPolicy {
    /// Every update is queued and applied one per buffer cycle, oldest first.
    #[default]
    Fifo,
    /// Only the most recent update is kept; older ones are overwritten.
    Latest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub min_pitch_hz: u32,
    pub num_octaves: u32,
    pub input_policy: InputPolicy,
    pub sink_buffer_frames: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            min_pitch_hz: MIN_PITCH_HZ,
            num_octaves: NUM_OCTAVES,
            input_policy: InputPolicy::Fifo,
            sink_buffer_frames: SINK_BUFFER_FRAMES,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let ron_string = fs::read_to_string(path)?;
        let config: EngineConfig = ron::from_str(&ron_string)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, ron_string)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::InvalidConfig("sample_rate must be positive".into()));
        }
        if self.min_pitch_hz == 0 {
            return Err(Error::InvalidConfig("min_pitch_hz must be positive".into()));
        }
        if self.num_octaves == 0 {
            return Err(Error::InvalidConfig("num_octaves must be positive".into()));
        }
        if self.sink_buffer_frames == 0 {
            return Err(Error::InvalidConfig(
                "sink_buffer_frames must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Maps a relative pitch in [0, 1] onto `num_octaves` octaves above
    /// `min_pitch_hz`, truncated to whole Hz.
    pub fn absolute_pitch(&self, relative_pitch: f32) -> u32 {
        let relative = clamp_unit(relative_pitch) as f64;
        let octaves = self.num_octaves as f64 * relative;
        (self.min_pitch_hz as f64 * 2.0_f64.powf(octaves)) as u32
    }

    pub fn max_pitch_hz(&self) -> u32 {
        self.absolute_pitch(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_spans_configured_octaves() {
        let config = EngineConfig::default();
        assert_eq!(config.absolute_pitch(0.0), 220);
        assert_eq!(config.absolute_pitch(1.0 / 3.0), 440);
        assert_eq!(config.absolute_pitch(1.0), 1760);
        assert_eq!(config.max_pitch_hz(), 1760);
    }

    #[test]
    fn pitch_clamps_out_of_range_input() {
        let config = EngineConfig::default();
        assert_eq!(config.absolute_pitch(-3.0), 220);
        assert_eq!(config.absolute_pitch(7.5), 1760);
        assert_eq!(config.absolute_pitch(f32::NAN), 220);
    }

    #[test]
    fn rejects_zero_sample_rate() {
        let config = EngineConfig {
            sample_rate: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn save_then_load_preserves_fields() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("presets").join("engine.ron");
        let config = EngineConfig {
            sample_rate: 48000,
            input_policy: InputPolicy::Latest,
            ..Default::default()
        };

        config.save(&path).unwrap();
        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: EngineConfig = ron::from_str("(input_policy: Latest)").unwrap();
        assert_eq!(config.sample_rate, SAMPLE_RATE);
        assert_eq!(config.input_policy, InputPolicy::Latest);
    }
}
