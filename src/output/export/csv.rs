//! CSV export of sequence traces and sample vectors
//!
//! Plain CSV readable by pandas, MATLAB or a spreadsheet. Two layouts:
//!
//! - **Trace**: one row per simulated time point with the field, arterial
//!   magnetization and the four-component state.
//! - **Samples**: one row per readout sample (`time`, `signal`).
//!
//! # Example
//!
//! ```rust,ignore
//! use mrf_rs::output::export::{export_sequence_csv, CsvConfig, CsvMetadata};
//!
//! sequence.run()?;
//! let metadata = CsvMetadata::from_sequence(&sequence);
//! export_sequence_csv(&sequence, "trace.csv", Some(&CsvConfig::default().with_metadata(metadata)))?;
//! ```
//!
//! **Output** (`trace.csv`):
//! ```csv
//! # MR Fingerprinting Simulation Data
//! # Generated: 2026-02-11T15:30:00Z
//! # Blocks: 6
//! # Total Time: 4280 ms
//! #
//! time_ms,bx_T,by_T,bz_T,arterial,mx,my,mz_free,mz_semisolid
//! 0.000000,0.000000,...
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use crate::sequence::PulseSequence;

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("nothing to export: {0}")]
    Empty(&'static str),

    #[error("length mismatch: {times} times versus {values} values")]
    LengthMismatch { times: usize, values: usize },

    #[error("non-finite value in {0}")]
    NonFinite(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Configuration Structures
// =============================================================================

/// Configuration for CSV export
///
/// # Example
///
/// ```rust,ignore
/// let config = CsvConfig {
///     delimiter: ';',
///     precision: 10,
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug)]
pub struct CsvConfig {
    /// Column delimiter (default: ',')
    pub delimiter: char,

    /// Decimal separator (default: '.')
    pub decimal_separator: char,

    /// Number of decimal places (default: 6). Field values are written in
    /// scientific notation with the same precision.
    pub precision: usize,

    /// Include metadata header comments (default: false)
    pub include_metadata: bool,

    pub metadata: Option<CsvMetadata>,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            decimal_separator: '.',
            precision: 6,
            include_metadata: false,
            metadata: None,
        }
    }
}

impl CsvConfig {
    /// Semicolon delimiter, comma decimal separator.
    pub fn european() -> Self {
        Self {
            delimiter: ';',
            decimal_separator: ',',
            ..Default::default()
        }
    }

    pub fn high_precision() -> Self {
        Self {
            precision: 12,
            ..Default::default()
        }
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_metadata(mut self, metadata: CsvMetadata) -> Self {
        self.include_metadata = true;
        self.metadata = Some(metadata);
        self
    }
}

/// Metadata for CSV header comments. Only `Some` fields are written.
#[derive(Clone, Debug, Default)]
pub struct CsvMetadata {
    pub block_count: Option<usize>,

    /// Total sequence duration (ms)
    pub total_time: Option<f64>,

    pub sample_count: Option<usize>,

    pub t1_free: Option<f64>,
    pub t2_free: Option<f64>,
    pub cbv: Option<f64>,
    pub flow: Option<f64>,
    pub arrival_time: Option<f64>,

    pub custom: Vec<(String, String)>,
}

impl CsvMetadata {
    /// Timing and the main tissue parameters of `sequence`.
    pub fn from_sequence(sequence: &PulseSequence) -> Self {
        let params = sequence.params();
        Self {
            block_count: Some(sequence.blocks().len()),
            total_time: Some(sequence.total_duration()),
            sample_count: Some(sequence.sample_count()),
            t1_free: Some(params.t1_free()),
            t2_free: Some(params.t2_free()),
            cbv: Some(params.cbv()),
            flow: Some(params.flow()),
            arrival_time: Some(params.arrival_time()),
            custom: Vec::new(),
        }
    }

    pub fn add_custom(&mut self, key: String, value: String) {
        self.custom.push((key, value));
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn write_metadata_header<W: Write>(out: &mut W, metadata: &CsvMetadata) -> Result<(), CsvError> {
    writeln!(out, "# MR Fingerprinting Simulation Data")?;
    writeln!(out, "# Generated: {}", chrono::Utc::now().to_rfc3339())?;

    if let Some(blocks) = metadata.block_count {
        writeln!(out, "# Blocks: {}", blocks)?;
    }
    if let Some(total_time) = metadata.total_time {
        writeln!(out, "# Total Time: {} ms", total_time)?;
    }
    if let Some(samples) = metadata.sample_count {
        writeln!(out, "# Samples: {}", samples)?;
    }

    if let Some(t1) = metadata.t1_free {
        writeln!(out, "# T1 free: {} ms", t1)?;
    }
    if let Some(t2) = metadata.t2_free {
        writeln!(out, "# T2 free: {} ms", t2)?;
    }
    if let Some(cbv) = metadata.cbv {
        writeln!(out, "# CBV: {}", cbv)?;
    }
    if let Some(flow) = metadata.flow {
        writeln!(out, "# Flow: {} 1/ms", flow)?;
    }
    if let Some(bat) = metadata.arrival_time {
        writeln!(out, "# Bolus arrival: {} ms", bat)?;
    }

    for (key, value) in &metadata.custom {
        writeln!(out, "# {}: {}", key, value)?;
    }

    writeln!(out, "#")?;
    Ok(())
}

fn format_number(value: f64, config: &CsvConfig) -> String {
    localize(format!("{:.prec$}", value, prec = config.precision), config)
}

/// Tesla-scale values vanish in fixed notation.
fn format_scientific(value: f64, config: &CsvConfig) -> String {
    localize(format!("{:.prec$e}", value, prec = config.precision), config)
}

fn localize(formatted: String, config: &CsvConfig) -> String {
    if config.decimal_separator != '.' {
        formatted.replace('.', &config.decimal_separator.to_string())
    } else {
        formatted
    }
}

fn open(path: &Path, config: &CsvConfig) -> Result<BufWriter<File>, CsvError> {
    let mut out = BufWriter::new(File::create(path)?);
    if config.include_metadata
        && let Some(metadata) = &config.metadata
    {
        write_metadata_header(&mut out, metadata)?;
    }
    Ok(out)
}

// =============================================================================
// Export Functions
// =============================================================================

/// Export the full trace of the last run of `sequence`.
///
/// # Errors
///
/// - The sequence has not been run
/// - NaN or Inf in the magnetization
/// - File creation errors
pub fn export_sequence_csv(
    sequence: &PulseSequence,
    output_path: impl AsRef<Path>,
    configuration: Option<&CsvConfig>,
) -> Result<(), CsvError> {
    let times = sequence.times();
    let field = sequence.field_trace();
    let arterial = sequence.arterial_trace();
    let magnetization = sequence.magnetization_trace();

    // ============================= Validation =============================

    if magnetization.is_empty() {
        return Err(CsvError::Empty("sequence has no magnetization trace"));
    }
    if magnetization.len() != times.len() {
        return Err(CsvError::LengthMismatch {
            times: times.len(),
            values: magnetization.len(),
        });
    }
    if magnetization.iter().any(|m| !m.is_finite()) {
        return Err(CsvError::NonFinite("magnetization trace"));
    }

    // ============================= Write ==================================

    let binding = CsvConfig::default();
    let configuration = configuration.unwrap_or(&binding);
    let d = configuration.delimiter;

    let mut out = open(output_path.as_ref(), configuration)?;
    writeln!(
        out,
        "time_ms{d}bx_T{d}by_T{d}bz_T{d}arterial{d}mx{d}my{d}mz_free{d}mz_semisolid"
    )?;

    for (((time, b), a), m) in times.iter().zip(&field).zip(&arterial).zip(&magnetization) {
        write!(out, "{}", format_number(*time, configuration))?;
        for component in b.iter() {
            write!(out, "{d}{}", format_scientific(*component, configuration))?;
        }
        write!(out, "{d}{}", format_number(*a, configuration))?;
        for component in m.as_vector().iter() {
            write!(out, "{d}{}", format_number(*component, configuration))?;
        }
        writeln!(out)?;
    }

    out.flush()?;
    Ok(())
}

/// Export a sample vector with its sample times.
///
/// # Example
///
/// ```rust,ignore
/// export_samples_csv(&sequence.sample_times(), sequence.samples(), "fingerprint.csv", None)?;
/// ```
pub fn export_samples_csv(
    times: &[f64],
    samples: &[f64],
    output_path: impl AsRef<Path>,
    configuration: Option<&CsvConfig>,
) -> Result<(), CsvError> {
    if times.is_empty() || samples.is_empty() {
        return Err(CsvError::Empty("times and samples must not be empty"));
    }
    if times.len() != samples.len() {
        return Err(CsvError::LengthMismatch {
            times: times.len(),
            values: samples.len(),
        });
    }
    if times.iter().any(|t| !t.is_finite()) {
        return Err(CsvError::NonFinite("sample times"));
    }
    if samples.iter().any(|s| !s.is_finite()) {
        return Err(CsvError::NonFinite("samples"));
    }

    let binding = CsvConfig::default();
    let configuration = configuration.unwrap_or(&binding);

    let mut out = open(output_path.as_ref(), configuration)?;
    writeln!(out, "time_ms{}signal", configuration.delimiter)?;
    for (time, sample) in times.iter().zip(samples) {
        writeln!(
            out,
            "{}{}{}",
            format_number(*time, configuration),
            configuration.delimiter,
            format_number(*sample, configuration)
        )?;
    }

    out.flush()?;
    Ok(())
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GradientEcho, SequenceBlock};
    use crate::physics::PhysiologicalParams;
    use std::fs;
    use tempfile::NamedTempFile;

    fn run_sequence() -> PulseSequence {
        let mut sequence = PulseSequence::new(PhysiologicalParams::default());
        sequence.add_block(SequenceBlock::dead_air(20.0, 5.0).unwrap());
        sequence.add_block(
            SequenceBlock::gradient_echo(
                GradientEcho {
                    echo_train_length: 1,
                    ..Default::default()
                },
                2.5,
            )
            .unwrap(),
        );
        sequence.setup().unwrap();
        sequence.run().unwrap();
        sequence
    }

    #[test]
    fn test_export_samples_basic() {
        let file = NamedTempFile::new().unwrap();
        export_samples_csv(&[10.0, 20.0], &[0.5, 0.25], file.path(), None).unwrap();

        let content = fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["time_ms,signal", "10.000000,0.500000", "20.000000,0.250000"]);
    }

    #[test]
    fn test_export_samples_european() {
        let file = NamedTempFile::new().unwrap();
        let config = CsvConfig::european().precision(2);
        export_samples_csv(&[1.5], &[0.25], file.path(), Some(&config)).unwrap();

        let content = fs::read_to_string(file.path()).unwrap();
        assert!(content.contains("1,50;0,25"));
    }

    #[test]
    fn test_export_samples_validation() {
        let file = NamedTempFile::new().unwrap();
        assert!(matches!(
            export_samples_csv(&[], &[], file.path(), None),
            Err(CsvError::Empty(_))
        ));
        assert!(matches!(
            export_samples_csv(&[1.0, 2.0], &[0.5], file.path(), None),
            Err(CsvError::LengthMismatch { times: 2, values: 1 })
        ));
        assert!(matches!(
            export_samples_csv(&[1.0], &[f64::NAN], file.path(), None),
            Err(CsvError::NonFinite(_))
        ));
    }

    #[test]
    fn test_export_sequence_with_metadata() {
        let sequence = run_sequence();
        let file = NamedTempFile::new().unwrap();
        let config = CsvConfig::default().with_metadata(CsvMetadata::from_sequence(&sequence));
        export_sequence_csv(&sequence, file.path(), Some(&config)).unwrap();

        let content = fs::read_to_string(file.path()).unwrap();
        assert!(content.starts_with("# MR Fingerprinting Simulation Data"));
        assert!(content.contains("# Blocks: 2"));

        let rows = content.lines().filter(|line| !line.starts_with('#')).count();
        // header row plus one row per time point
        assert_eq!(rows, sequence.times().len() + 1);
    }

    #[test]
    fn test_export_sequence_before_run_fails() {
        let sequence = PulseSequence::new(PhysiologicalParams::default());
        let file = NamedTempFile::new().unwrap();
        assert!(matches!(
            export_sequence_csv(&sequence, file.path(), None),
            Err(CsvError::Empty(_))
        ));
    }
}
