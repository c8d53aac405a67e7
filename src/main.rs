mod ui;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use graphletviz::graphlet::{scan, utils, DotRenderer, EdgeStream};
use std::path::{Path, PathBuf};
use ui::output;

/// graphletviz decodes host graphlet files and renders them for Graphviz
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// graphlet file (version 3 edge stream) to read
    #[arg(short = 'f', long, value_parser)]
    file: PathBuf,

    /// Render only graphlet n (by scan order)
    #[arg(short, long, default_value_t = -1, value_parser)]
    ngraphlet: i64,

    /// Display graphlet metadata only
    #[arg(short = 'm', long, action = ArgAction::SetTrue)]
    metaonly: bool,

    /// Directory to write .dot and .json output to
    #[arg(short = 'o', long, value_parser)]
    output_dir: Option<PathBuf>,

    /// Display metadata as formatted JSON
    #[arg(short = 'j', long, action = ArgAction::SetTrue)]
    json: bool,
}

fn main() -> Result<()> {
    simple_logger::init_with_env().context("initializing logger")?;

    let args = Args::parse();

    if let Some(out_dir) = args.output_dir.as_deref() {
        log::info!("Output directory {}", out_dir.display());
    } else {
        log::warn!("No output directory specified.");
    }

    let bytes = utils::load_file(&args.file)?;
    let stream = EdgeStream::new(&bytes)
        .with_context(|| format!("decoding {}", args.file.display()))?;
    let graphlets = scan(&stream).with_context(|| format!("scanning {}", args.file.display()))?;

    // ---- Output ----
    if args.metaonly {
        if args.json {
            let json = output::data_as_json(&graphlets)?;
            emit(&json, args.output_dir.as_deref(), "graphlets.json")?;
        } else {
            output::print_results(&graphlets, stream.len());
        }
        return Ok(());
    }

    // Metadata goes next to the .dot files; stdout is reserved for DOT text.
    if let (true, Some(dir)) = (args.json, args.output_dir.as_deref()) {
        let json = output::data_as_json(&graphlets)?;
        output::data_to_file(&json, &dir.join("graphlets.json"))?;
    } else if args.json {
        log::warn!("--json without --metaonly needs --output-dir; skipping metadata.");
    }

    let mut renderer = DotRenderer::new();
    if args.ngraphlet >= 0 {
        let n = args.ngraphlet as usize;
        let graphlet = graphlets
            .get(n)
            .with_context(|| format!("graphlet {} not found ({} graphlets)", n, graphlets.len()))?;
        let dot = renderer.render(&stream, graphlet.start_index)?;
        emit(&dot, args.output_dir.as_deref(), &format!("graphlet_{}.dot", n))?;
    } else {
        let dot = renderer.render_document(&stream, &graphlets)?;
        emit(&dot, args.output_dir.as_deref(), "graphlets.dot")?;
    }

    Ok(())
}

/// Writes `data` to `name` in the output directory, or prints it.
fn emit(data: &str, out_dir: Option<&Path>, name: &str) -> Result<()> {
    match out_dir {
        Some(dir) => output::data_to_file(data, &dir.join(name))?,
        None => println!("{}", data),
    }
    Ok(())
}
