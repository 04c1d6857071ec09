//! report-simple – markdown report → paragraphs → PDF, without HTML.
//!
//! Usage:
//!   report-simple [input.md] [output.pdf] [--skip-code-blocks] [--landscape]

use std::{env, process};

use md_report_pdf::classify::FenceMode;
use md_report_pdf::cli::{parse_args, usage, Command, Route};
use md_report_pdf::convert::{read_input, write_layout_json, ConversionAttempt};
use md_report_pdf::doc_template::DocTemplate;
use md_report_pdf::story::build_story;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let prog = args.first().map(String::as_str).unwrap_or("report-simple");

    let opts = match parse_args(Route::Simple, args.iter().skip(1).cloned()) {
        Ok(Command::Run(opts)) => opts,
        Ok(Command::Help) => {
            print!("{}", usage(Route::Simple, prog));
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{e}");
            eprint!("{}", usage(Route::Simple, prog));
            process::exit(1);
        }
    };

    let content = match read_input(&opts.paths.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let mode = if opts.skip_code_blocks {
        FenceMode::Toggle
    } else {
        FenceMode::MarkerOnly
    };
    let mut template = DocTemplate::default();
    if let Some(title) = &opts.title {
        template.title = title.clone();
    }
    if opts.landscape {
        template.geometry = template.geometry.rotated();
    }

    let mut layout = None;
    let outcome = ConversionAttempt::new(&opts.paths.output).run(|| {
        let story = build_story(&content, mode);
        let (bytes, config) = template.build_pdf(&story)?;
        layout = Some(config);
        Ok(bytes)
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
