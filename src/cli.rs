//! Hand-rolled argument parsing shared by the two binaries.

use std::path::PathBuf;

use crate::convert::ReportPaths;

/// Which rendering route a binary drives. Some flags exist on one route only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Html,
    Simple,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CliOptions {
    pub paths: ReportPaths,
    pub title: Option<String>,
    pub landscape: bool,
    /// Dump the frozen layout as JSON next to the PDF.
    pub layout_json: Option<PathBuf>,
    /// Exit non-zero when the conversion attempt fails.
    pub strict: bool,
    pub skip_code_blocks: bool,
    pub font_metrics: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run(CliOptions),
    Help,
}

/// Parse the arguments following the program name.
pub fn parse_args<I>(route: Route, args: I) -> Result<Command, String>
where
    I: IntoIterator<Item = String>,
{
    let mut opts = CliOptions::default();
    let mut positional = 0usize;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(Command::Help),
            "--landscape" | "-l" => opts.landscape = true,
            "--strict" => opts.strict = true,
            "--title" | "-t" => {
                opts.title = Some(iter.next().ok_or("--title needs a value")?);
            }
            "--layout-json" => {
                let path = iter.next().ok_or("--layout-json needs a path")?;
                opts.layout_json = Some(PathBuf::from(path));
            }
            "--skip-code-blocks" if route == Route::Simple => opts.skip_code_blocks = true,
            "--font-metrics" if route == Route::Html => {
                let path = iter.next().ok_or("--font-metrics needs a path")?;
                opts.font_metrics = Some(PathBuf::from(path));
            }
            other if other.starts_with('-') => return Err(format!("Unknown flag: {other}")),
            path => {
                match positional {
                    0 => opts.paths.input = PathBuf::from(path),
                    1 => opts.paths.output = PathBuf::from(path),
                    _ => return Err(format!("Unexpected argument: {path}")),
                }
                positional += 1;
            }
        }
    }
    Ok(Command::Run(opts))
}

pub fn usage(route: Route, prog: &str) -> String {
    let (summary, extra) = match route {
        Route::Html => (
            "markdown report to PDF through HTML and CSS",
            "  --font-metrics <ttf>  Measure text with the advances of this font\n",
        ),
        Route::Simple => (
            "markdown report to PDF through direct paragraph layout",
            "  --skip-code-blocks    Drop every line inside ``` fences, not just the markers\n",
        ),
    };
    format!(
        "{prog} – {summary}\n\
         \n\
         Usage:\n  {prog} [input.md] [output.pdf] [flags]\n\
         \n\
         Arguments:\n\
         \x20 [input.md]            Markdown file (default: design_analysis_report.md)\n\
         \x20 [output.pdf]          Output path, overwritten (default: design_analysis_report.pdf)\n\
         \n\
         Flags:\n\
         \x20 --title, -t <title>   Document title\n\
         \x20 --landscape, -l       Landscape A4 pages\n\
         \x20 --layout-json <path>  Also write the page layout as JSON\n\
         \x20 --strict              Exit with status 1 when the PDF cannot be created\n\
         {extra}\
         \x20 --help, -h            Print this message\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(route: Route, args: &[&str]) -> Result<Command, String> {
        parse_args(route, args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn no_arguments_use_default_paths() {
        let Command::Run(opts) = parse(Route::Html, &[]).unwrap() else {
            panic!("expected run");
        };
        assert_eq!(opts.paths, ReportPaths::default());
        assert!(!opts.strict);
    }

    #[test]
    fn positionals_and_flags() {
        let cmd = parse(
            Route::Simple,
            &["in.md", "--title", "Q3", "out.pdf", "--skip-code-blocks", "--strict"],
        )
        .unwrap();
        let Command::Run(opts) = cmd else {
            panic!("expected run");
        };
        assert_eq!(opts.paths.input, PathBuf::from("in.md"));
        assert_eq!(opts.paths.output, PathBuf::from("out.pdf"));
        assert_eq!(opts.title.as_deref(), Some("Q3"));
        assert!(opts.skip_code_blocks);
        assert!(opts.strict);
    }

    #[test]
    fn route_specific_flags() {
        assert!(parse(Route::Html, &["--skip-code-blocks"]).is_err());
        assert!(parse(Route::Simple, &["--font-metrics", "a.ttf"]).is_err());
        assert!(parse(Route::Html, &["--font-metrics", "a.ttf"]).is_ok());
    }

    #[test]
    fn errors() {
        assert_eq!(
            parse(Route::Html, &["a", "b", "c"]),
            Err("Unexpected argument: c".to_string())
        );
        assert!(parse(Route::Html, &["--title"]).is_err());
        assert_eq!(parse(Route::Html, &["x.md", "-h"]), Ok(Command::Help));
    }
}
