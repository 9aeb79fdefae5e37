use anyhow::Result;
use clap::{builder::BoolishValueParser, ArgAction, Parser};
use spectre_lint::{
    load_unit_json, write_findings_json, AnalysisConfig, CheckEngine,
};
use std::path::PathBuf;

/// spectre-lint: runs the loop pointer-chase and spectre-gadget checks over a
/// front-end-serialized translation unit.
#[derive(Parser, Debug)]
#[command(version, about = "Loop pointer-chase and Spectre-gadget diagnosis")]
struct Args {
    /// Path to the serialized translation unit (JSON)
    #[arg(long)]
    unit_json: PathBuf,

    /// Optional path for the findings JSON output
    #[arg(long)]
    findings_json: Option<PathBuf>,

    /// Report every occurrence per base pointer instead of only the first
    #[arg(long = "report-every", action = ArgAction::SetTrue)]
    report_every: bool,

    /// Disable the `**` and `->...->` text heuristics
    #[arg(long = "no-text-heuristics", action = ArgAction::SetTrue)]
    no_text_heuristics: bool,

    /// Exit with code 1 when findings are produced (default true)
    #[arg(long, value_parser = BoolishValueParser::new())]
    fail_on_findings: Option<bool>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let unit = load_unit_json(&args.unit_json)?;

    let config = AnalysisConfig {
        suppress_multiple: !args.report_every,
        double_star_heuristic: !args.no_text_heuristics,
        arrow_chain_heuristic: !args.no_text_heuristics,
    };

    let engine = CheckEngine::with_builtin_checks();
    let result = engine.run(&unit, &config);

    for finding in &result.findings {
        println!("{}", finding.message);
    }

    if let Some(path) = &args.findings_json {
        write_findings_json(path, &result)?;
        println!("findings JSON: {}", path.display());
    }

    if args.fail_on_findings.unwrap_or(true) && !result.findings.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}
