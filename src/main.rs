mod cli;

use attio_clay_sync::{
    attio::{AttioClient, StatusQuery},
    clay::ClayClient,
    enrichment::{eligibility, Contact, Phase, ReconciliationDriver, RecordStore},
    error, utils, Config,
};
use chrono::Utc;
use clap::Parser;
use cli::{Cli, Commands};
use colored::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("attio_clay_sync=debug,info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match Config::load(Some(&cli.config)) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command.unwrap_or_default() {
        Commands::Run { dry_run, phase, json } => run_pipeline(&config, dry_run, &phase, json).await,

        Commands::Scan { verbose, limit } => {
            info!("Scanning Attio records...");
            scan_records(&config, verbose, limit).await
        }

        Commands::Init => initialize(&config),
    };

    if let Err(e) = result {
        error!("{}", format!("Error: {}", e).red());
        std::process::exit(1);
    }
}

async fn run_pipeline(config: &Config, dry_run: bool, phases: &[Phase], json: bool) -> error::Result<()> {
    let attio = AttioClient::new(&config.attio)?;
    let clay = ClayClient::new(&config.clay)?;

    let driver = ReconciliationDriver::new(&attio, &clay, &config.pipeline).with_dry_run(dry_run);

    info!("{}", "=".repeat(60));
    info!("Attio <-> Clay Enrichment Pipeline");
    info!("Started at: {}", utils::format_timestamp(&Utc::now()));
    if dry_run || config.pipeline.dry_run {
        info!("DRY RUN: no records will be changed");
    }
    info!("{}", "=".repeat(60));

    let report = driver.run(phases).await;

    report.print_summary();
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    info!("{}", report.summary_line());

    // Partial failures are reported, not fatal; the next pass retries them
    Ok(())
}

async fn scan_records(config: &Config, verbose: bool, limit: Option<usize>) -> error::Result<()> {
    println!("{}", "Scanning Attio records...".cyan());

    let attio = AttioClient::new(&config.attio)?;
    let settings = &config.pipeline;
    let now = Utc::now();
    let timeout = settings.timeout();

    let groups = [
        (StatusQuery::AwaitingResults, limit.unwrap_or(settings.pending_limit)),
        (StatusQuery::AwaitingCompanyLink, limit.unwrap_or(settings.link_limit)),
        (StatusQuery::Candidates, limit.unwrap_or(settings.scan_limit)),
    ];

    let mut contacts: Vec<Contact> = Vec::new();
    for (query, group_limit) in groups {
        let records = attio.query_by_status(query, group_limit).await?;
        for record in &records {
            let contact = Contact::from_record(record);
            if !contacts.iter().any(|c| c.record_id == contact.record_id) {
                contacts.push(contact);
            }
        }
    }

    let to_submit = contacts.iter().filter(|c| eligibility::needs_enrichment(c)).count();
    let to_link = contacts
        .iter()
        .filter(|c| eligibility::needs_company_linking(c))
        .count();
    let stuck = contacts
        .iter()
        .filter(|c| eligibility::is_stuck(c, now, timeout))
        .count();

    println!("\n{}", "=== Scan Results ===".cyan().bold());
    println!("Records scanned:     {}", contacts.len());
    println!("Ready to submit:     {}", to_submit.to_string().green());
    println!("Ready to link:       {}", to_link.to_string().green());
    println!("Stuck in Clay:       {}", stuck.to_string().yellow());

    if verbose && !contacts.is_empty() {
        println!("\n{}", "Records:".yellow());
        utils::print_table_border(110);
        utils::print_table_row(&["Record", "Email", "Status", "Reason"], &[28, 30, 15, 30]);
        utils::print_table_border(110);

        for contact in &contacts {
            let status = contact.status.to_string();
            let reason = eligibility::eligibility_reason(contact, now, timeout);
            utils::print_table_row(
                &[
                    contact.record_id.as_str(),
                    contact.email.as_deref().unwrap_or("-"),
                    status.as_str(),
                    reason.as_str(),
                ],
                &[28, 30, 15, 30],
            );
        }
        utils::print_table_border(110);
    }

    Ok(())
}

fn initialize(config: &Config) -> error::Result<()> {
    println!("{}", "✓ Configuration loaded".green());
    println!("\n{}", "Configuration:".cyan());
    println!("  Attio URL:      {}", config.attio.base_url);
    println!("  Attio API key:  {}", utils::mask_secret(&config.attio.api_key));
    println!("  Clay URL:       {}", config.clay.base_url);
    println!("  Clay API key:   {}", utils::mask_secret(&config.clay.api_key));
    println!("  Clay table:     {}", config.clay.table_id);
    match config.clay.max_pages {
        Some(max) => println!("  Page size:      {} (max {} pages)", config.clay.page_size, max),
        None => println!("  Page size:      {} (whole table)", config.clay.page_size),
    }
    println!("  Batch size:     {}", config.pipeline.batch_size);
    println!("  Scan limit:     {}", config.pipeline.scan_limit);
    println!("  Rate limit:     {} ms", config.pipeline.rate_limit_delay_ms);
    println!("  Timeout:        {} hours", config.pipeline.timeout_hours);
    println!("  Dry Run:        {}", config.pipeline.dry_run);

    println!("\n{}", "Ready to use! Try running:".cyan());
    println!("  {} to see what a pass would touch", "attio-clay-sync scan --verbose".yellow());
    println!("  {} to preview a pass", "attio-clay-sync run --dry-run".yellow());
    println!("  {} to run a pass", "attio-clay-sync run".yellow());
    Ok(())
}
