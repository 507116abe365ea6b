// src/main.rs
// =============================================================================
// This is the entry point of the route-scout CLI.
//
// What happens here:
// 1. Set up logging (to stderr, so stdout stays clean for --json output)
// 2. Parse command-line arguments using clap
// 3. Dispatch to the appropriate subcommand handler
// 4. Exit with proper code (0 = all routes valid, 1 = invalid routes, 2 = error)
//
// All the crawling lives in the route_scout library; this file only turns
// flags into a CrawlConfig and results into terminal output.
// =============================================================================

mod cli;

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use route_scout::{CrawlEvent, CrawlResult, Crawler};

#[tokio::main]
async fn main() {
    init_logging();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // {:#} prints the whole context chain on one line
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// RUST_LOG wins; otherwise info-level logs from the library only
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("route_scout=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// Returns:
//   Ok(0) = every processed route served HTML (or the seed is valid)
//   Ok(1) = at least one invalid route
//   Err   = bad seed, bad settings or client setup failure (exit code 2)
async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl { url, json, tree, settings } => {
            let crawler = Crawler::new(settings.into_config())?;
            handle_crawl(&crawler, &url, json, tree).await
        }
        Commands::Stream { url, json, settings } => {
            let crawler = Crawler::new(settings.into_config())?;
            handle_stream(&crawler, &url, json).await
        }
        Commands::Check { url } => handle_check(&url).await,
    }
}

// Handles the 'crawl' subcommand
async fn handle_crawl(crawler: &Crawler, url: &str, json: bool, tree: bool) -> Result<i32> {
    let result = with_ctrl_c(crawler, crawler.crawl(url))
        .await
        .with_context(|| format!("cannot crawl {}", url))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if tree {
        print!("{}", result.tree_visual);
    } else {
        print_table(&result);
    }

    Ok(exit_code(&result))
}

// Handles the 'stream' subcommand
async fn handle_stream(crawler: &Crawler, url: &str, json: bool) -> Result<i32> {
    let mut events = crawler
        .crawl_incremental(url)
        .await
        .with_context(|| format!("cannot crawl {}", url))?;

    let cancel = crawler.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let stdout = std::io::stdout();
    let mut code = 0;
    while let Some(event) = events.next().await {
        let mut out = stdout.lock();
        if json {
            // NDJSON: one event per line
            serde_json::to_writer(&mut out, &event)?;
            writeln!(out)?;
        } else {
            print_event(&mut out, &event)?;
        }
        out.flush()?;

        if let CrawlEvent::Complete { result, .. } = &event {
            code = exit_code(result);
        }
    }

    Ok(code)
}

// Handles the 'check' subcommand
async fn handle_check(url: &str) -> Result<i32> {
    let crawler = Crawler::new(Default::default())?;
    let seed = crawler.validate_seed(url).await?;
    println!("✅ {} is a valid crawl seed", seed);
    Ok(0)
}

// Ctrl-C cancels the crawl; the partial result is still printed
async fn with_ctrl_c<F: std::future::Future>(crawler: &Crawler, crawl: F) -> F::Output {
    let cancel = crawler.cancel_token();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
    let output = crawl.await;
    watcher.abort();
    output
}

fn exit_code(result: &CrawlResult) -> i32 {
    if result.invalid_routes.is_empty() {
        0
    } else {
        1
    }
}

fn print_event(out: &mut impl Write, event: &CrawlEvent) -> std::io::Result<()> {
    match event {
        CrawlEvent::Start { url, max_pages, max_depth } => {
            writeln!(out, "🔍 Crawling {} (max {} pages, depth {})", url, max_pages, max_depth)
        }
        CrawlEvent::Page(page) => writeln!(
            out,
            "[{:>3}%] {} {:<50} depth {}  queued {}",
            page.progress,
            status_mark(page.is_valid),
            page.route,
            page.depth,
            page.queue_size
        ),
        CrawlEvent::Complete { result, stop_reason } => writeln!(
            out,
            "📊 Done ({}): {} found, {} invalid, {} page(s) crawled{}",
            stop_reason,
            result.found_routes.len(),
            result.invalid_routes.len(),
            result.pages_crawled,
            if result.cancelled { ", cancelled" } else { "" }
        ),
    }
}

// Prints results as a human-readable table in the terminal
fn print_table(result: &CrawlResult) {
    println!("{:<60} {:<8} {:<12}", "ROUTE", "DEPTH", "STATUS");
    println!("{}", "=".repeat(80));

    let mut rows: Vec<(&String, bool)> = result
        .found_routes
        .iter()
        .map(|route| (route, true))
        .chain(result.invalid_routes.iter().map(|route| (route, false)))
        .collect();
    rows.sort();

    for (route, is_valid) in rows {
        // Truncate long routes so the columns stay aligned
        let route_display = if route.chars().count() > 57 {
            format!("{}...", route.chars().take(57).collect::<String>())
        } else {
            route.clone()
        };
        let depth = result
            .route_depths
            .get(route)
            .map(|d| d.to_string())
            .unwrap_or_default();

        println!("{:<60} {:<8} {:<12}", route_display, depth, format_status(is_valid));
    }

    println!();
    println!("📊 Summary for {}:", result.start_url);
    println!("   ✅ Found: {}", result.found_routes.len());
    println!("   ❌ Invalid: {}", result.invalid_routes.len());
    println!("   📄 Pages crawled: {}", result.pages_crawled);
    println!("   📏 Max depth reached: {}", result.max_depth_reached);
    println!("   🛑 Stop reason: {}", result.stop_reason);
    if result.cancelled {
        println!("   ⚠️  Crawl was cancelled; results are partial");
    }
}

fn status_mark(is_valid: bool) -> &'static str {
    if is_valid {
        "✓"
    } else {
        "✗"
    }
}

fn format_status(is_valid: bool) -> String {
    if is_valid {
        "✅ OK".to_string()
    } else {
        "❌ INVALID".to_string()
    }
}
