// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI tool: Convert a 2D floor plan image into a wall graph (JSON output)
//!
//! The intermediate graph is rewritten while the agents run, so the output
//! file can be watched during long runs.
//!
//! Usage:
//!   floorplan-to-graph <image_path> [options]

use anyhow::{bail, Context};
use ifc_lite_wall_agents::{
    raster::{load_grid, RasterOptions},
    EngineConfig, ExportConfig, GraphDocument, GraphWriter, IntersectionSolver, Scheduler,
};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            env::var("RUST_LOG").unwrap_or_else(|_| "info,ifc_lite_wall_agents=debug".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return Ok(());
    }

    let image_path = PathBuf::from(&args[1]);

    // Parse options
    let mut engine = EngineConfig::from_env();
    let mut export = ExportConfig::from_env();
    let mut raster = RasterOptions::default();
    let mut output_path = PathBuf::from("graph.json");
    let mut publish_every: u64 = 500;
    let mut flush_ms: u64 = 1000;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--output" => {
                i += 1;
                output_path = PathBuf::from(arg_value(&args, i)?);
            }
            "--scale" => {
                i += 1;
                export.meter_per_pixel = Some(arg_value(&args, i)?.parse().context("invalid scale value")?);
            }
            "--threshold" => {
                i += 1;
                raster.threshold = Some(arg_value(&args, i)?.parse().context("invalid threshold value")?);
            }
            "--light-food" => {
                raster.food_is_dark = false;
            }
            "--max-ticks" => {
                i += 1;
                engine.max_ticks = arg_value(&args, i)?.parse().context("invalid max ticks value")?;
            }
            "--config" => {
                i += 1;
                engine = read_engine_config(Path::new(arg_value(&args, i)?))?;
            }
            "--publish-every" => {
                i += 1;
                publish_every = arg_value(&args, i)?.parse().context("invalid publish interval")?;
            }
            "--flush-ms" => {
                i += 1;
                flush_ms = arg_value(&args, i)?.parse().context("invalid flush interval")?;
            }
            other => {
                print_usage();
                bail!("unknown option: {other}");
            }
        }
        i += 1;
    }

    let grid = load_grid(&image_path, &raster)
        .with_context(|| format!("cannot load image '{}'", image_path.display()))?;
    tracing::info!(
        path = %image_path.display(),
        width = grid.width(),
        height = grid.height(),
        food = grid.food_count(),
        "image loaded"
    );

    let writer = GraphWriter::spawn(&output_path, Duration::from_millis(flush_ms));
    let mut scheduler = Scheduler::from_grid(grid, engine.clone());
    let solver = IntersectionSolver::new(&engine, &export);

    while !scheduler.is_settled() && scheduler.tick_count() < engine.max_ticks {
        let report = scheduler.tick();
        if publish_every > 0 && report.tick % publish_every == 0 {
            let solved = solver.solve(&scheduler.wall_lines());
            writer.publish(GraphDocument::from_graph(&solved.graph, export.meter_per_pixel));
        }
    }

    let converged = scheduler.is_settled();
    let solved = solver.solve(&scheduler.wall_lines());
    writer.publish(GraphDocument::from_graph(&solved.graph, export.meter_per_pixel));
    writer
        .finish()
        .with_context(|| format!("cannot write '{}'", output_path.display()))?;

    tracing::info!(
        ticks = scheduler.tick_count(),
        converged,
        nodes = solved.graph.nodes.len(),
        edges = solved.graph.edges.len(),
        merge_candidates = solved.merge_candidates.len(),
        output = %output_path.display(),
        "graph written"
    );
    Ok(())
}

fn arg_value(args: &[String], i: usize) -> anyhow::Result<&str> {
    args.get(i)
        .map(String::as_str)
        .with_context(|| format!("missing value for {}", args[i - 1]))
}

fn read_engine_config(path: &Path) -> anyhow::Result<EngineConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid config '{}'", path.display()))
}

fn print_usage() {
    println!("Usage: floorplan-to-graph <image_path> [options]");
    println!();
    println!("Options:");
    println!("  --output <path>         Output JSON file (default: graph.json)");
    println!("  --scale <m/px>          Meters per pixel applied to the exported graph");
    println!("  --threshold <0-255>     Fixed gray level (default: Otsu)");
    println!("  --light-food            Treat light pixels as walls (pre-inverted masks)");
    println!("  --max-ticks <n>         Stop after n ticks");
    println!("  --config <path>         Engine configuration as JSON");
    println!("  --publish-every <n>     Publish the intermediate graph every n ticks (0: never)");
    println!("  --flush-ms <ms>         Minimum time between file writes (default: 1000)");
    println!();
    println!("Environment:");
    println!("  RUST_LOG                Log filter (default: info,ifc_lite_wall_agents=debug)");
    println!("  WALL_AGENTS_*           Engine/export overrides, see EngineConfig::from_env");
}
