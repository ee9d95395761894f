//! Schedule files
//!
//! One whitespace-separated row per sequence repetition:
//!
//! ```text
//! initial_delay  label_code  label_duration  post_label_delay  prep1_code  prep1_delay  prep2_code  prep2_delay
//! ```
//!
//! Durations are in seconds. `label_code` is `-1` for "no labeling" (the slot
//! becomes dead time), `0` for a control train and anything else for a label
//! train. Prep codes go through the [`PrepPulse`] catalog. Every row ends with a
//! gradient-echo readout. Zero-length segments are skipped; blank lines and
//! lines starting with `#` are ignored.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::models::{GradientEcho, PrepPulse, SequenceBlock};
use crate::solver::CompressionConfig;

/// Conventional schedule file name inside a sequence directory.
pub const SCHEDULE_FILE_NAME: &str = "mrf_schedule.txt";

const COLUMNS: usize = 8;
const NO_LABEL: i64 = -1;
const CONTROL: i64 = 0;

/// Timesteps and readout used when turning rows into blocks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Timestep of the leading dead time (ms).
    pub initial_delay_dt: f64,
    /// Timestep of labeling trains and the delays after them (ms).
    pub labeling_dt: f64,
    pub readout: GradientEcho,
    pub readout_dt: f64,
    pub compression: CompressionConfig,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            initial_delay_dt: 100.0,
            labeling_dt: 300.0,
            readout: GradientEcho::default(),
            readout_dt: 2.5,
            compression: CompressionConfig::default(),
        }
    }
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        for (name, dt) in [
            ("initial delay dt", self.initial_delay_dt),
            ("labeling dt", self.labeling_dt),
            ("readout dt", self.readout_dt),
        ] {
            if !(dt.is_finite() && dt > 0.0) {
                return Err(SimError::config(format!("{name} must be positive, got {dt}")));
            }
        }
        self.readout.validate()?;
        self.compression.validate()
    }
}

/// One parsed row, durations converted to ms.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduleRow {
    pub initial_delay: f64,
    pub label_code: i64,
    pub label_duration: f64,
    pub post_label_delay: f64,
    /// `(code, following delay)` for the two preparation slots.
    pub preps: [(i64, f64); 2],
}

impl ScheduleRow {
    fn parse(line: &str, line_number: usize) -> Result<Self, SimError> {
        let error = |message: String| SimError::Schedule { line: line_number, message };

        let values = line
            .split_whitespace()
            .map(|field| {
                field
                    .parse::<f64>()
                    .map_err(|_| error(format!("'{field}' is not a number")))
            })
            .collect::<Result<Vec<f64>, SimError>>()?;

        if values.len() != COLUMNS {
            return Err(error(format!("expected {COLUMNS} columns, found {}", values.len())));
        }

        let code = |value: f64, what: &str| -> Result<i64, SimError> {
            if value.fract() == 0.0 && value.is_finite() {
                Ok(value as i64)
            } else {
                Err(error(format!("{what} must be an integer, got {value}")))
            }
        };
        let millis = |value: f64, what: &str| -> Result<f64, SimError> {
            if value.is_finite() && value >= 0.0 {
                Ok(value * 1000.0)
            } else {
                Err(error(format!("{what} must be a non-negative duration, got {value}")))
            }
        };

        Ok(Self {
            initial_delay: millis(values[0], "initial delay")?,
            label_code: code(values[1], "label code")?,
            label_duration: millis(values[2], "label duration")?,
            post_label_delay: millis(values[3], "post-label delay")?,
            preps: [
                (code(values[4], "prep 1 code")?, millis(values[5], "prep 1 delay")?),
                (code(values[6], "prep 2 code")?, millis(values[7], "prep 2 delay")?),
            ],
        })
    }

    /// Blocks for this row, in play order.
    pub fn blocks(&self, config: &ScheduleConfig) -> Result<Vec<SequenceBlock>, SimError> {
        let mut blocks = Vec::new();

        if self.initial_delay > 0.0 {
            blocks.push(SequenceBlock::dead_air(self.initial_delay, config.initial_delay_dt)?);
        }

        if self.label_duration > 0.0 {
            blocks.push(match self.label_code {
                NO_LABEL => SequenceBlock::dead_air(self.label_duration, config.labeling_dt)?,
                code => SequenceBlock::labeling(self.label_duration, config.labeling_dt, code == CONTROL)?,
            });
        }

        if self.post_label_delay > 0.0 {
            blocks.push(SequenceBlock::dead_air(self.post_label_delay, config.labeling_dt)?);
        }

        for (code, delay) in self.preps {
            if let Some(pulse) = PrepPulse::from_code(code)? {
                blocks.push(SequenceBlock::prep(pulse)?);
            }
            if delay > 0.0 {
                blocks.push(SequenceBlock::dead_air(delay, config.labeling_dt)?);
            }
        }

        blocks.push(SequenceBlock::gradient_echo(config.readout.clone(), config.readout_dt)?);

        Ok(blocks
            .into_iter()
            .map(|block| block.with_compression(config.compression))
            .collect())
    }
}

/// A parsed schedule.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schedule {
    rows: Vec<ScheduleRow>,
}

impl Schedule {
    pub fn parse(text: &str) -> Result<Self, SimError> {
        let rows = text
            .lines()
            .enumerate()
            .filter(|(_, line)| {
                let trimmed = line.trim();
                !trimmed.is_empty() && !trimmed.starts_with('#')
            })
            .map(|(i, line)| ScheduleRow::parse(line, i + 1))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { rows })
    }

    /// Read a schedule file, or `mrf_schedule.txt` inside a directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let path = path.as_ref();
        let file = if path.is_dir() {
            path.join(SCHEDULE_FILE_NAME)
        } else {
            path.to_path_buf()
        };

        log::debug!("reading schedule from {}", file.display());
        Self::parse(&fs::read_to_string(file)?)
    }

    pub fn rows(&self) -> &[ScheduleRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Blocks of every row, concatenated.
    pub fn blocks(&self, config: &ScheduleConfig) -> Result<Vec<SequenceBlock>, SimError> {
        config.validate()?;
        let mut blocks = Vec::new();
        for row in &self.rows {
            blocks.extend(row.blocks(config)?);
        }
        Ok(blocks)
    }
}

impl FromStr for Schedule {
    type Err = SimError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}
