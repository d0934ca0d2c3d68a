use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use hcmigrate_core::archive::LocalArchive;
use hcmigrate_core::client::{ClientSettings, HelpCenterClient};
use hcmigrate_core::config::{
    DEFAULT_CONFIG_FILE, MigrateConfig, create_default_config, load_config,
};
use hcmigrate_core::fallback::FallbackIds;
use hcmigrate_core::pipeline::{
    BackupReport, Mode, RestoreOptions, RestoreReport, backup_pass, restore_pass,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "hcmigrate",
    version,
    about = "Back up Help Center articles from one instance and restore them into another"
)]
struct Cli {
    #[arg(long, value_enum, default_value_t = ModeArg::Backup)]
    mode: ModeArg,
    #[arg(long, help = "Stop on the first restore error")]
    fail_fast: bool,
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long, help = "Print the resolved configuration with secrets redacted")]
    diagnostics: bool,
    #[arg(long, help = "Print run reports as JSON")]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Backup,
    Restore,
    Both,
}

impl From<ModeArg> for Mode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Backup => Mode::Backup,
            ModeArg::Restore => Mode::Restore,
            ModeArg::Both => Mode::Both,
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_tracing();

    let mode = Mode::from(cli.mode);
    if create_default_config(&cli.config)? {
        info!(path = %normalize_path(&cli.config), "created default config file");
    }
    let config = load_config(&cli.config)?;
    if cli.diagnostics {
        println!("[diagnostics]\n{}\n", config.diagnostics());
    }

    let problems = config.validate_for_mode(mode);
    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("error: {problem}");
        }
        return Ok(ExitCode::FAILURE);
    }

    let archive = LocalArchive::new(config.archive_dir());
    info!(mode = %mode, archive = %normalize_path(archive.root()), "starting run");

    if mode.includes_backup() {
        let report = run_backup(&config, &archive)?;
        print_backup_report(&report, cli.json)?;
    }
    if mode.includes_restore() {
        let options = RestoreOptions {
            fail_fast: cli.fail_fast,
        };
        let report = run_restore(&config, &archive, &options)?;
        print_restore_report(&report, cli.json)?;
    }

    Ok(ExitCode::SUCCESS)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_backup(config: &MigrateConfig, archive: &LocalArchive) -> Result<BackupReport> {
    let mut client = HelpCenterClient::new(&config.source, ClientSettings::from_env())?;
    info!(base_url = client.base_url(), "backing up from source instance");
    backup_pass(&mut client, archive, config)
}

fn run_restore(
    config: &MigrateConfig,
    archive: &LocalArchive,
    options: &RestoreOptions,
) -> Result<RestoreReport> {
    let mut client = HelpCenterClient::new(&config.target, ClientSettings::from_env())?;
    info!(base_url = client.base_url(), "restoring into target instance");
    let report = restore_pass(&mut client, archive, config, options)?;
    if let Some(reason) = &report.aborted {
        warn!(%reason, "restore stopped early");
    }
    Ok(report)
}

fn print_backup_report(report: &BackupReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("backup");
    println!("archive_created: {}", format_flag(report.created_archive_dir));
    println!("categories: {}", report.structure.categories);
    println!("sections: {}", report.structure.sections);
    println!("listed: {}", report.listed);
    println!(
        "listing_surface: {}",
        report.listing_surface.unwrap_or("<none>")
    );
    println!("backed_up: {}/{}", report.backed_up.len(), report.listed);
    println!("request_count: {}", report.request_count);
    print_list("structure_errors", &report.structure.errors);
    print_list("failures", &report.failures);
    Ok(())
}

fn print_restore_report(report: &RestoreReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("restore");
    println!("queued: {}", report.queued);
    println!("restored: {}/{}", report.restored.len(), report.queued);
    println!("skipped: {}", report.skipped.len());
    println!("categories_mapped: {}", report.categories_mapped);
    println!("sections_mapped: {}", report.sections_mapped);
    println!(
        "categories_created: {}",
        report.reconcile.categories_created
    );
    println!("sections_created: {}", report.reconcile.sections_created);
    print_fallbacks(&report.fallbacks);
    println!("request_count: {}", report.request_count);
    println!("aborted: {}", report.aborted.as_deref().unwrap_or("no"));
    print_list("reconcile_errors", &report.reconcile.errors);
    print_list("failures", &report.failures);
    Ok(())
}

fn print_fallbacks(fallbacks: &FallbackIds) {
    println!("fallback_section_id: {}", format_id(fallbacks.section_id));
    println!(
        "fallback_permission_group_id: {}",
        format_id(fallbacks.permission_group_id)
    );
    println!(
        "fallback_user_segment_id: {}",
        format_id(fallbacks.user_segment_id)
    );
}

fn print_list(label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("{label}:");
    for item in items {
        println!("  - {item}");
    }
}

fn format_id(id: Option<u64>) -> String {
    id.map(|id| id.to_string())
        .unwrap_or_else(|| "<none>".to_string())
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
