//! # Trace Analyzer
//!
//! Command-line tool to replay a recorded trace through the detection engine.

use std::process::ExitCode;

use warden_security::{DetectorId, Trace};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         WARDEN TRACE ANALYZER                                    ║");
    println!("║         THE WATCHTOWER                                           ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        println!("Usage: trace_analyzer <trace.toml>");
        println!();
        println!("Options:");
        println!("  --verbose        List every finding");
        println!("  --player <id>    Focus on one player");
        return ExitCode::FAILURE;
    }

    let trace_path = &args[1];
    let verbose = args.iter().any(|a| a == "--verbose");
    let player_filter: Option<u64> = args
        .iter()
        .position(|a| a == "--player")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok());

    println!("Loading trace: {trace_path}");

    let trace = match Trace::load(trace_path) {
        Ok(t) => t,
        Err(e) => {
            println!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let report = match trace.replay() {
        Ok(r) => r,
        Err(e) => {
            println!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!();
    println!("┌─ TRACE INFO ─────────────────────────────────────────────────────┐");
    println!("│ Events:             {}", report.events);
    println!("│ Players:            {}", report.players.len());
    println!("│ Processed:          {}", report.stats.processed);
    println!("│ Ignored:            {}", report.stats.ignored);
    println!("│ Detector failures:  {}", report.stats.detector_failures);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    println!("┌─ ANALYSIS RESULTS ───────────────────────────────────────────────┐");
    println!("│ Findings:           {}", report.findings.len());
    println!("│ Flags:              {}", report.flags.len());
    for (id, player) in &report.players {
        if player_filter.is_some_and(|p| p != id.0) {
            continue;
        }
        println!("│");
        println!("│ {id}: {} processed, {} ignored", player.processed, player.ignored);
        for detector in DetectorId::ALL {
            if let Some(count) = player.findings.get(&detector) {
                println!("│   {:<16} {count} findings", detector.name());
            }
        }
        for (detector, level) in &player.final_levels {
            println!("│   level {:<10} {level:.2}", detector.name());
        }
    }

    if !report.flags.is_empty() {
        println!("│");
        println!("│ FLAGS:");
        for flag in &report.flags {
            if player_filter.is_some_and(|p| p != flag.player.0) {
                continue;
            }
            let marker = if flag.punish { " [PUNISH]" } else { "" };
            println!(
                "│  - {} {} #{} at {}ms (score {:.1}){marker}",
                flag.player, flag.detector, flag.flag_count, flag.timestamp_ms, flag.score
            );
            println!("│    {}", flag.evidence);
        }
    }

    if verbose && !report.findings.is_empty() {
        println!("│");
        println!("│ FINDINGS:");
        for record in &report.findings {
            if player_filter.is_some_and(|p| p != record.player.0) {
                continue;
            }
            println!(
                "│  - seq {} {} {}: {}",
                record.sequence, record.player, record.detector, record.evidence
            );
        }
    }
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    if report.flags.is_empty() {
        println!("✓ No cheating detected");
    } else {
        println!(
            "⚠ {} flags raised - manual review recommended",
            report.flags.len()
        );
    }
    ExitCode::SUCCESS
}
