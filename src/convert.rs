//! Conversion driver shared by both binaries: input/output paths, the input
//! read, and the catch-and-report attempt around rendering.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::ReportError;
use crate::layout_config::LayoutConfig;

pub const DEFAULT_INPUT: &str = "design_analysis_report.md";
pub const DEFAULT_OUTPUT: &str = "design_analysis_report.pdf";

/// Input markdown and output PDF locations, relative to the working
/// directory unless absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl Default for ReportPaths {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            output: PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}

/// Read the whole input file as UTF-8.
pub fn read_input(path: &Path) -> Result<String, ReportError> {
    fs::read_to_string(path).map_err(|source| ReportError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `bytes` to `path`, creating the parent directory if necessary.
/// An existing file is overwritten.
pub fn write_output(path: &Path, bytes: &[u8]) -> Result<(), ReportError> {
    let write_err = |source: io::Error| ReportError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
    }
    fs::write(path, bytes).map_err(write_err)
}

/// Write the frozen layout as pretty-printed JSON.
pub fn write_layout_json(path: &Path, layout: &LayoutConfig) -> Result<(), ReportError> {
    let json = layout.to_json()?;
    write_output(path, json.as_bytes())
}

/// Result of one conversion attempt.
#[derive(Debug)]
pub enum ConversionOutcome {
    Created { path: PathBuf, size: u64 },
    Failed(ReportError),
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ConversionOutcome::Created { .. })
    }
}

/// Renders, writes the PDF and reports the result on a status stream.
/// Every failure from rendering or writing is reported and returned as
/// [`ConversionOutcome::Failed`]; nothing propagates.
#[derive(Debug, Clone)]
pub struct ConversionAttempt {
    output: PathBuf,
    report_size: bool,
}

impl ConversionAttempt {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            report_size: false,
        }
    }

    /// Also print the size of the written file.
    pub fn with_size_report(mut self) -> Self {
        self.report_size = true;
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Run the attempt, reporting on standard output.
    pub fn run<F>(&self, render: F) -> ConversionOutcome
    where
        F: FnOnce() -> Result<Vec<u8>, ReportError>,
    {
        self.run_with(&mut io::stdout().lock(), render)
    }

    /// Run the attempt, reporting on `status`.
    pub fn run_with<W, F>(&self, status: &mut W, render: F) -> ConversionOutcome
    where
        W: Write,
        F: FnOnce() -> Result<Vec<u8>, ReportError>,
    {
        let result = render()
            .and_then(|bytes| write_output(&self.output, &bytes))
            .and_then(|()| {
                fs::metadata(&self.output)
                    .map(|m| m.len())
                    .map_err(|source| ReportError::Write {
                        path: self.output.clone(),
                        source,
                    })
            });

        // Status output is best effort.
        match result {
            Ok(size) => {
                let _ = writeln!(status, "✅ PDF report created: {}", self.output.display());
                if self.report_size {
                    let _ = writeln!(status, "📄 File size: {:.1} KB", size as f64 / 1024.0);
                }
                log::debug!("wrote {size} bytes to {}", self.output.display());
                ConversionOutcome::Created {
                    path: self.output.clone(),
                    size,
                }
            }
            Err(err) => {
                let _ = writeln!(status, "❌ Error creating PDF: {err}");
                ConversionOutcome::Failed(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths() {
        let paths = ReportPaths::default();
        assert_eq!(paths.input, PathBuf::from("design_analysis_report.md"));
        assert_eq!(paths.output, PathBuf::from("design_analysis_report.pdf"));
    }

    #[test]
    fn missing_input_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_input(&dir.path().join("nope.md")).unwrap_err();
        assert!(matches!(err, ReportError::Read { .. }));
    }

    #[test]
    fn success_reports_path_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("report.pdf");
        let mut status = Vec::new();
        let outcome = ConversionAttempt::new(&out)
            .with_size_report()
            .run_with(&mut status, || Ok(vec![0u8; 2048]));
        assert!(outcome.is_success());
        let status = String::from_utf8(status).unwrap();
        assert_eq!(
            status,
            format!("✅ PDF report created: {}\n📄 File size: 2.0 KB\n", out.display())
        );
    }

    #[test]
    fn failure_is_caught_and_printed() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("report.pdf");
        let mut status = Vec::new();
        let outcome = ConversionAttempt::new(&out).run_with(&mut status, || {
            Err(ReportError::Render("boom".to_string()))
        });
        assert!(!outcome.is_success());
        assert!(!out.exists());
        let status = String::from_utf8(status).unwrap();
        assert_eq!(status, "❌ Error creating PDF: PDF rendering failed: boom\n");
    }

    #[test]
    fn layout_json_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("layout.json");
        let mut layout = LayoutConfig::a4();
        layout.title = "t".to_string();
        write_layout_json(&out, &layout).unwrap();
        let back = LayoutConfig::from_json(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(back.title, "t");
    }

    #[test]
    fn creates_missing_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/out.pdf");
        let outcome = ConversionAttempt::new(&out).run_with(&mut io::sink(), || Ok(b"%PDF-".to_vec()));
        assert!(outcome.is_success());
        assert_eq!(fs::read(&out).unwrap(), b"%PDF-");
    }
}
