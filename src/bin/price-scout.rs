use clap::{Args, Parser, Subcommand};
use colored::{ColoredString, Colorize};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use price_scout::demo::DEMO_URLS;
use price_scout::{
    format_money, setup_logging, AgentConfig, Assessment, DemoListingSource, LogConfig, MentionEvent,
    MentionOutcome, PriceAgent, ScoutError, SetupReport, Verdict,
};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser)]
#[command(name = "price-scout", version, about = "Checks whether a listing is a bargain")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Also write logs to this directory
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze one listing URL
    Analyze {
        url: String,
        #[command(flatten)]
        source: SourceArgs,
        /// Print the assessment as JSON
        #[arg(long)]
        json: bool,
        /// Also draft the reply that would be posted
        #[arg(long)]
        reply: bool,
    },
    /// Analyze several URLs concurrently
    Batch {
        urls: Vec<String>,
        /// Read URLs from a file, one per line
        #[arg(short, long, value_name = "FILE")]
        file: Option<PathBuf>,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Handle a mention and post the reply
    Mention {
        /// Mention event as JSON: {"id", "author", "text"}
        #[arg(long, value_name = "FILE", conflicts_with_all = ["id", "text"])]
        event: Option<PathBuf>,
        #[arg(long, required_unless_present = "event")]
        id: Option<String>,
        #[arg(long, default_value = "")]
        author: String,
        #[arg(long, required_unless_present = "event")]
        text: Option<String>,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Run the built-in sample listings offline
    Demo,
    /// Prompt for URLs until `quit`
    Interactive {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Verify keys, tokens and catalog
    Check,
}

#[derive(Args, Clone, Copy)]
struct SourceArgs {
    /// Use offline sample listings instead of fetching pages
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    setup_logging(LogConfig {
        log_level: cli.log_level.clone(),
        file_output: cli.log_dir.is_some(),
        log_dir: cli.log_dir.clone().unwrap_or_else(|| "logs".into()),
        ..LogConfig::default()
    })?;

    let config = AgentConfig::from_env()?;

    match cli.command {
        Command::Analyze {
            url,
            source,
            json,
            reply,
        } => {
            let agent = build_agent(&config, source)?;
            let assessment = agent.analyze(&url).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&assessment)?);
            } else {
                print_assessment(&assessment);
            }
            if reply {
                let drafted = agent.composer().compose(&assessment).await;
                println!("{}: {}", "Reply".bold(), drafted.text);
            }
        }
        Command::Batch { urls, file, source } => {
            let mut urls = urls;
            if let Some(path) = file {
                let content = tokio::fs::read_to_string(&path).await?;
                urls.extend(
                    content
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty() && !l.starts_with('#'))
                        .map(str::to_string),
                );
            }
            if urls.is_empty() {
                return Err("no URLs given".into());
            }
            let agent = build_agent(&config, source)?;
            run_batch(&agent, &urls).await;
        }
        Command::Mention {
            event,
            id,
            author,
            text,
            source,
        } => {
            let event = match event {
                Some(path) => serde_json::from_str(&tokio::fs::read_to_string(&path).await?)?,
                None => MentionEvent {
                    id: id.unwrap_or_default(),
                    author,
                    text: text.unwrap_or_default(),
                },
            };
            let agent = build_agent(&config, source)?;
            print_outcome(&agent.handle_mention(&event).await?);
        }
        Command::Demo => run_demo(&config).await?,
        Command::Interactive { source } => {
            let agent = build_agent(&config, source)?;
            run_interactive(&agent).await?;
        }
        Command::Check => {
            let report = SetupReport::check(&config);
            print_report(&report);
            if !report.all_passed() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn build_agent(config: &AgentConfig, source: SourceArgs) -> Result<PriceAgent, ScoutError> {
    if source.demo {
        config.build_agent_with_source(Arc::new(DemoListingSource::new()))
    } else {
        config.build_agent()
    }
}

fn verdict_colored(verdict: &Verdict) -> ColoredString {
    paint(verdict, verdict.label())
}

fn paint(verdict: &Verdict, label: &str) -> ColoredString {
    match verdict {
        Verdict::Underpriced => label.green().bold(),
        Verdict::GoodDeal => label.green(),
        Verdict::FairlyPriced => label.yellow(),
        Verdict::Overpriced => label.red().bold(),
        Verdict::Unrated(_) => label.dimmed(),
    }
}

fn print_assessment(assessment: &Assessment) {
    let listing = &assessment.listing;
    let money = |v: Option<f64>| v.map_or_else(|| "N/A".to_string(), format_money);

    println!("\n{}", "Price Check".bold().blue());
    println!("{}", "---------------".blue());
    println!("{}: {}", "URL".bold(), listing.url);
    println!("{}: {}", "Title".bold(), listing.title.as_deref().unwrap_or("N/A"));
    println!("{}: {}", "Price".bold(), money(assessment.price));
    println!(
        "{}: {}",
        "Category".bold(),
        assessment.category.as_deref().unwrap_or("unknown")
    );
    println!("{}: {}", "Market value".bold(), money(assessment.market_value));
    if let Some(change) = assessment.market_change() {
        println!("{}: {}", "Change".bold(), change);
    }
    println!(
        "{}: {} → {}",
        "Verdict".bold(),
        verdict_colored(&assessment.verdict),
        assessment.recommendation.to_string().bold()
    );
    if let Verdict::Unrated(reason) = &assessment.verdict {
        println!("{}: {}", "Reason".bold(), reason.dimmed());
    }
    if assessment.is_alert() {
        println!("{}", "🚨 ALERT: underpriced item detected!".red().bold());
    }
}

async fn run_batch(agent: &PriceAgent, urls: &[String]) {
    let pb = ProgressBar::new(urls.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let results = join_all(urls.iter().map(|url| {
        let pb = pb.clone();
        async move {
            let result = agent.analyze(url).await;
            pb.inc(1);
            result
        }
    }))
    .await;
    pb.finish_and_clear();

    let mut alerts = 0;
    for (url, result) in urls.iter().zip(results) {
        match result {
            Ok(assessment) => {
                alerts += usize::from(assessment.is_alert());
                println!(
                    "{} {:<9} {}",
                    paint(&assessment.verdict, &format!("{:<12}", assessment.verdict.label())),
                    assessment.recommendation.to_string(),
                    url
                );
            }
            Err(e) => eprintln!("{}: {} - {}", "Error".bold().red(), url, e),
        }
    }
    println!(
        "\n{} URLs analyzed, {} underpriced",
        urls.len(),
        alerts.to_string().green().bold()
    );
}

fn print_outcome(outcome: &MentionOutcome) {
    match outcome {
        MentionOutcome::Replied {
            assessment,
            reply,
            posted,
        } => {
            print_assessment(assessment);
            println!("\n{} ({}): {}", "Replied".bold().green(), posted.id, reply.text);
        }
        MentionOutcome::FailureReplied { error, posted } => {
            println!("{}: {}", "Analysis failed".bold().red(), error);
            println!("{} ({}): {}", "Replied".bold().yellow(), posted.id, posted.text);
        }
        MentionOutcome::Ignored(reason) => {
            println!("{}: {}", "Ignored".bold().yellow(), reason);
        }
    }
}

async fn run_demo(config: &AgentConfig) -> Result<(), ScoutError> {
    println!("{}", "Price Scout Demo".bold().green());
    println!("{}", "================================".green());

    let demo_config = AgentConfig {
        dry_run: true,
        ..config.clone()
    };
    let agent = demo_config.build_agent_with_source(Arc::new(DemoListingSource::new()))?;

    for (label, url) in DEMO_URLS {
        println!("\n{}", label.bold().cyan());
        let event = MentionEvent {
            id: format!("demo-{}", label.to_lowercase().replace(' ', "-")),
            author: "demo".to_string(),
            text: format!("@pricescout is this a good deal? {url}"),
        };
        print_outcome(&agent.handle_mention(&event).await?);
    }
    Ok(())
}

async fn run_interactive(agent: &PriceAgent) -> Result<(), Box<dyn Error>> {
    println!("{}", "Price Scout interactive mode".bold().green());
    println!("Paste a listing URL, or type {} to exit.", "quit".bold());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        match input {
            "" => continue,
            "q" | "quit" | "exit" => break,
            _ => {}
        }

        let url = price_scout::extract_listing_url(input).unwrap_or_else(|| input.to_string());
        match agent.analyze(&url).await {
            Ok(assessment) => {
                print_assessment(&assessment);
                let reply = agent.composer().compose(&assessment).await;
                println!("\n{}: {}", "Reply".bold(), reply.text);
            }
            Err(e) => eprintln!("{}: {}", "Error".bold().red(), e),
        }
    }
    println!("{}", "Bye!".green());
    Ok(())
}

fn print_report(report: &SetupReport) {
    println!("{}", "Setup check".bold().green());
    println!("{}", "================================".green());
    for check in &report.checks {
        let mark = if check.passed { "✓".green() } else { "✗".red() };
        println!("{} {}: {}", mark, check.name.bold(), check.detail);
        if let Some(hint) = &check.hint {
            println!("    {}", hint.dimmed());
        }
    }
    if report.all_passed() {
        println!("\n{}", "All checks passed".green().bold());
    } else {
        println!(
            "\n{}",
            format!("{} check(s) failed", report.failures().count()).yellow().bold()
        );
    }
}
