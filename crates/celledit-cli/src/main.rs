// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result};
use celledit_db::Store;
use celledit_engine::EditorSettings;
use celledit_tui::GridRuntime;
use config::Config;
use logging::LogTarget;
use runtime::{LocalBackend, TasksRuntime};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `celledit --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let target = if options.check_only {
        LogTarget::Stderr
    } else {
        LogTarget::File(config.log_path()?)
    };
    logging::init(&config, &target)?;

    let db_path = if options.demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    let store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or CELLEDIT_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;
    if options.demo {
        store.seed_demo_data()?;
    }

    let backend = Arc::new(LocalBackend::new(store));
    let local = options.local || options.demo;
    let mut tasks = if local {
        TasksRuntime::local(backend)
    } else {
        let client = celledit_http::Client::new(config.server_base_url(), config.server_timeout()?)
            .with_context(|| {
                format!(
                    "invalid [server] config in {}; fix base_url/timeout values",
                    options.config_path.display()
                )
            })?;
        TasksRuntime::remote(backend, client)
    };

    let rows = tasks.load_rows()?;
    info!(
        db = %db_path.display(),
        rows = rows.len(),
        local,
        "startup checks passed"
    );
    if options.check_only {
        return Ok(());
    }

    let settings = EditorSettings {
        banner_ttl: config.error_banner()?,
        flash_ttl: config.success_flash()?,
        ..celledit_tui::terminal_settings(config.date_input()?)
    };
    let editor = runtime::tasks_editor()?;
    let mut view = celledit_tui::GridView::new("tasks", editor, runtime::task_columns(), settings);
    celledit_tui::run_app(&mut view, &mut tasks)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    demo: bool,
    local: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        demo: false,
        local: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--local" => {
                options.local = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("celledit");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Edit seeded demo data (in-memory, implies --local)");
    println!("  --local                  Save edits to the database instead of the server");
    println!("  --check                  Validate config + DB + server settings, then exit");
    println!("  --help                   Show this help");
}
