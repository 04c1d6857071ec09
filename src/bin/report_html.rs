//! report-html – markdown report → HTML → PDF.
//!
//! Usage:
//!   report-html [input.md] [output.pdf] [--title "Report"] [--landscape]
//!
//! Without arguments reads `design_analysis_report.md` and writes
//! `design_analysis_report.pdf` in the working directory.

use std::{env, fs, process};

use md_report_pdf::cli::{parse_args, usage, CliOptions, Command, Route};
use md_report_pdf::convert::{read_input, write_layout_json, ConversionAttempt};
use md_report_pdf::error::ReportError;
use md_report_pdf::fonts::BuiltinFamily;
use md_report_pdf::html_report::{render_report_with, ReportStyle};
use md_report_pdf::pipeline::{PageOrientation, PipelineConfig};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let prog = args.first().map(String::as_str).unwrap_or("report-html");

    let opts = match parse_args(Route::Html, args.iter().skip(1).cloned()) {
        Ok(Command::Run(opts)) => opts,
        Ok(Command::Help) => {
            print!("{}", usage(Route::Html, prog));
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{e}");
            eprint!("{}", usage(Route::Html, prog));
            process::exit(1);
        }
    };

    let markdown = match read_input(&opts.paths.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let config = pipeline_config(&opts);
    let style = opts
        .title
        .clone()
        .map(ReportStyle::with_title)
        .unwrap_or_default();

    let mut layout = None;
    let outcome = ConversionAttempt::new(&opts.paths.output)
        .with_size_report()
        .run(|| {
            let pdf = render_report_with(&markdown, &style, &config)?;
            layout = Some(pdf.layout);
            Ok(pdf.bytes)
        });

    if let (Some(path), Some(layout)) = (&opts.layout_json, &layout) {
        if let Err(e) = write_layout_json(path, layout) {
            eprintln!("Error writing layout: {e}");
        }
    }

    if opts.strict && !outcome.is_success() {
        process::exit(1);
    }
}

fn pipeline_config(opts: &CliOptions) -> PipelineConfig {
    let mut config = PipelineConfig {
        title: opts.title.clone(),
        orientation: if opts.landscape {
            PageOrientation::Landscape
        } else {
            PageOrientation::Portrait
        },
        ..PipelineConfig::default()
    };
    if let Some(path) = &opts.font_metrics {
        let loaded = fs::read(path)
            .map_err(|e| format!("cannot read '{}': {e}", path.display()))
            .and_then(|bytes| config.fonts.load_font(BuiltinFamily::Helvetica, false, false, bytes));
        if let Err(e) = loaded {
            log::warn!("{}; using builtin metrics", ReportError::Font(e));
        }
    }
    config
}
