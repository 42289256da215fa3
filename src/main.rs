// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! spacey-ts CLI - inspect how the loader sees a TypeScript program
//!
//! - `resolve`: classify a specifier
//! - `transpile`: print the JavaScript emitted for a file
//! - `graph`: link an entry point and print its module graph

mod host;

use anyhow::Context;
use clap::{Parser, Subcommand};
use host::DetachedHost;
use owo_colors::OwoColorize;
use spacey_ts_loader::{LoaderSession, ModuleRecord, TranspilerAdapter, VERSION};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

#[derive(Parser)]
#[command(
    name = "spacey-ts",
    about = "TypeScript module loader for the Spacey runtime",
    version = VERSION,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a specifier and print `{url, format}` as JSON
    Resolve {
        /// Import specifier
        specifier: String,

        /// URL of the importing module (defaults to the current directory)
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Transpile a TypeScript file and print the output
    Transpile {
        /// TypeScript file
        file: PathBuf,
    },

    /// Link an entry point and print its module graph
    Graph {
        /// Entry file or URL
        entry: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("spacey_ts_loader=debug,spacey_ts=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("spacey_ts_loader=warn")
            .init();
    }

    let session = LoaderSession::new(Arc::new(DetachedHost))?;

    match cli.command {
        Command::Resolve { specifier, parent } => {
            let resolved = session.resolve(&specifier, parent.as_deref(), None).await?;
            println!("{}", serde_json::to_string_pretty(&resolved)?);
        }
        Command::Transpile { file } => transpile(file).await?,
        Command::Graph { entry } => {
            let program = spacey_ts_loader::instantiate_or_exit(&session, &entry).await;
            let root = ModuleRecord::Static(Arc::clone(program.root()));
            let mut seen = HashSet::new();
            print_graph(&root, None, 0, &mut seen);
            println!(
                "\n{} modules linked",
                session.cache().len().to_string().yellow()
            );
        }
    }

    Ok(())
}

async fn transpile(file: PathBuf) -> anyhow::Result<()> {
    let path = std::path::absolute(&file)
        .with_context(|| format!("Cannot resolve path {}", file.display()))?;
    let url = Url::from_file_path(&path)
        .map_err(|_| anyhow::anyhow!("Not a file path: {}", path.display()))?;

    let adapter = TranspilerAdapter::oxc();
    let unit = adapter.transpile(url.as_str()).await?;

    for diagnostic in &unit.diagnostics {
        eprintln!("{}: {}", "Diagnostic".yellow().bold(), diagnostic);
    }
    print!("{}", unit.code);
    Ok(())
}

fn print_graph(
    record: &ModuleRecord,
    specifier: Option<&str>,
    depth: usize,
    seen: &mut HashSet<String>,
) {
    let indent = "  ".repeat(depth);
    let kind = match record {
        ModuleRecord::Static(_) => "static",
        ModuleRecord::Synthetic(_) => "synthetic",
    };
    let label = match specifier {
        Some(specifier) => format!("{} -> ", specifier.cyan()),
        None => String::new(),
    };
    let first_visit = seen.insert(record.url().to_string());

    println!(
        "{}{}{} {}",
        indent,
        label,
        record.url().green(),
        format!("[{}]", kind).dimmed()
    );

    if !first_visit {
        return;
    }
    if let Some(imports) = record.as_static().and_then(|module| module.imports()) {
        for (specifier, dependency) in imports {
            print_graph(dependency, Some(specifier), depth + 1, seen);
        }
    }
}
