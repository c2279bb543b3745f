use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::OnceLock;

/// Entries in one cycle of every waveform table.
pub const TABLE_SIZE: usize = 2048;
pub const MAX_AMPLITUDE: f32 = i16::MAX as f32;

/// Square and sawtooth carry far more harmonic energy than sine or triangle at
/// the same peak; these bring them to roughly the same loudness.
pub const SQUARE_VOL_ADJ: f32 = 0.4;
pub const SAW_VOL_ADJ: f32 = 0.7;

/// Waveform families in blend order. Distortion moves left to right along
/// this list, so the order is part of the sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaveformFamily {
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

impl WaveformFamily {
    pub const ALL: [WaveformFamily; 4] = [
        WaveformFamily::Sine,
        WaveformFamily::Triangle,
        WaveformFamily::Square,
        WaveformFamily::Sawtooth,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Closed-form value of one cycle at `radians` in [0, 2π), in [-1, 1]
    /// before volume adjustment.
    fn shape(self, radians: f64) -> f64 {
        match self {
            WaveformFamily::Sine => radians.sin(),
            WaveformFamily::Triangle => {
                if radians < PI {
                    -1.0 + 2.0 * radians / PI
                } else {
                    3.0 - 2.0 * radians / PI
                }
            }
            WaveformFamily::Square => {
                if radians < PI {
                    1.0
                } else {
                    -1.0
                }
            }
            WaveformFamily::Sawtooth => -1.0 + radians / PI,
        }
    }

    fn volume_adjustment(self) -> f32 {
        match self {
            WaveformFamily::Sine | WaveformFamily::Triangle => 1.0,
            WaveformFamily::Square => SQUARE_VOL_ADJ,
            WaveformFamily::Sawtooth => SAW_VOL_ADJ,
        }
    }
}

/// One full cycle of a waveform, already scaled to the PCM range.
#[derive(Clone, PartialEq)]
pub struct WaveTable {
    family: WaveformFamily,
    samples: Box<[f32]>,
}

impl WaveTable {
    pub fn build(family: WaveformFamily) -> Self {
        let scale = family.volume_adjustment() * MAX_AMPLITUDE;
        let samples = (0..TABLE_SIZE)
            .map(|i| {
                let radians = 2.0 * PI * i as f64 / TABLE_SIZE as f64;
                family.shape(radians) as f32 * scale
            })
            .collect();
        Self { family, samples }
    }

    pub fn family(&self) -> WaveformFamily {
        self.family
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

impl std::ops::Index<usize> for WaveTable {
    type Output = f32;

    fn index(&self, index: usize) -> &f32 {
        &self.samples[index]
    }
}

impl std::fmt::Debug for WaveTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaveTable")
            .field("family", &self.family)
            .field("len", &self.samples.len())
            .finish()
    }
}

/// The full set of tables, one per family, in blend order.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveTableBank {
    tables: [WaveTable; WaveformFamily::COUNT],
}

static SHARED_BANK: OnceLock<WaveTableBank> = OnceLock::new();

impl WaveTableBank {
    pub fn new() -> Self {
        Self {
            tables: WaveformFamily::ALL.map(WaveTable::build),
        }
    }

    /// Process-wide bank, built on first use and read-only afterwards.
    pub fn shared() -> &'static WaveTableBank {
        SHARED_BANK.get_or_init(|| {
            tracing::debug!(table_size = TABLE_SIZE, "building wave tables");
            WaveTableBank::new()
        })
    }

    pub fn table(&self, family: WaveformFamily) -> &WaveTable {
        &self.tables[family.index()]
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl Default for WaveTableBank {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-2;

    fn radians(i: usize) -> f64 {
        2.0 * PI * i as f64 / TABLE_SIZE as f64
    }

    #[test]
    fn tables_match_closed_forms() {
        let bank = WaveTableBank::new();
        for i in [0, 1, 100, 511, 512, 1023, 1024, 1500, TABLE_SIZE - 1] {
            let r = radians(i);
            let sine = (r.sin() as f32) * MAX_AMPLITUDE;
            let triangle_unit = if r < PI {
                -1.0 + 2.0 * r / PI
            } else {
                3.0 - 2.0 * r / PI
            };
            let triangle = triangle_unit as f32 * MAX_AMPLITUDE;
            let square_unit: f32 = if r < PI { 1.0 } else { -1.0 };
            let square = square_unit * SQUARE_VOL_ADJ * MAX_AMPLITUDE;
            let saw = (-1.0 + r / PI) as f32 * SAW_VOL_ADJ * MAX_AMPLITUDE;

            assert!((bank.table(WaveformFamily::Sine)[i] - sine).abs() < EPS);
            assert!((bank.table(WaveformFamily::Triangle)[i] - triangle).abs() < EPS);
            assert!((bank.table(WaveformFamily::Square)[i] - square).abs() < EPS);
            assert!((bank.table(WaveformFamily::Sawtooth)[i] - saw).abs() < EPS);
        }
    }

    #[test]
    fn values_stay_within_max_amplitude() {
        let bank = WaveTableBank::new();
        for family in WaveformFamily::ALL {
            let table = bank.table(family);
            assert_eq!(table.samples().len(), TABLE_SIZE);
            assert!(table.samples().iter().all(|s| s.abs() <= MAX_AMPLITUDE));
        }
    }

    #[test]
    fn volume_adjusted_peaks() {
        let bank = WaveTableBank::new();
        let peak = |family| {
            bank.table(family)
                .samples()
                .iter()
                .fold(0.0f32, |acc, s| acc.max(s.abs()))
        };
        assert!((peak(WaveformFamily::Sine) - MAX_AMPLITUDE).abs() < 1.0);
        assert!((peak(WaveformFamily::Square) - 0.4 * MAX_AMPLITUDE).abs() < 1.0);
        assert!((peak(WaveformFamily::Sawtooth) - 0.7 * MAX_AMPLITUDE).abs() < 1.0);
    }

    #[test]
    fn tables_hold_exactly_one_period() {
        let bank = WaveTableBank::new();
        for family in WaveformFamily::ALL {
            let table = bank.table(family);
            assert_eq!(table.samples().len(), TABLE_SIZE);
            assert_eq!(table.family(), family);
        }
        // the last entry leads smoothly back into the first for continuous shapes
        let sine = bank.table(WaveformFamily::Sine);
        let step = MAX_AMPLITUDE * (2.0 * std::f32::consts::PI / TABLE_SIZE as f32);
        assert!((sine[TABLE_SIZE - 1] - sine[0]).abs() <= step + EPS);
    }

    #[test]
    fn shared_bank_is_built_once_and_deterministic() {
        let a = WaveTableBank::shared();
        let b = WaveTableBank::shared();
        assert!(std::ptr::eq(a, b));
        assert_eq!(*a, WaveTableBank::new());
    }

    #[test]
    fn family_order_is_blend_order() {
        for (i, family) in WaveformFamily::ALL.iter().enumerate() {
            assert_eq!(family.index(), i);
            assert_eq!(WaveformFamily::from_index(i), Some(*family));
        }
        assert_eq!(WaveformFamily::from_index(4), None);
    }
}
