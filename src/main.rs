use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};

use dc_fact_checker::config::Config;
use dc_fact_checker::content::highlight::highlights_for;
use dc_fact_checker::content::ContentScript;
use dc_fact_checker::engine::pipeline::PageLoader;
use dc_fact_checker::messaging::{ExtensionBus, Message, Response};

/// Drive the fact-checker content script against a page.
#[derive(Debug, Parser)]
#[command(name = "dc-fact-checker", version, about)]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the page's main text
    Extract {
        /// URL, bare host or local HTML file
        source: String,
    },
    /// Highlight claims and print the resulting body HTML
    Highlight {
        source: String,
        #[arg(long = "claim", required = true)]
        claims: Vec<String>,
        /// Verdict for a highlighted claim, as CLAIM=VERDICT
        #[arg(long = "verdict", value_parser = parse_verdict)]
        verdicts: Vec<(String, String)>,
    },
    /// Highlight one claim, click it and print the message sent to the panel
    Context {
        source: String,
        #[arg(long)]
        claim: String,
    },
}

fn parse_verdict(raw: &str) -> Result<(String, String), String> {
    raw.rsplit_once('=')
        .map(|(claim, verdict)| (claim.to_string(), verdict.to_string()))
        .ok_or_else(|| format!("expected CLAIM=VERDICT, got {:?}", raw))
}

fn load_script(source: &str, config: &Config) -> Result<ContentScript> {
    let page = PageLoader::new().load(source)?;
    Ok(ContentScript::new(
        page.dom,
        ExtensionBus::new(),
        config.content.clone(),
    ))
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Extract { source } => {
            let mut script = load_script(&source, &config)?;
            match script.handle_message(&Message::ExtractText) {
                Some(Response::Text { text }) => println!("{}", text),
                other => bail!("unexpected reply to EXTRACT_TEXT: {:?}", other),
            }
        }
        Command::Highlight {
            source,
            claims,
            verdicts,
        } => {
            let mut script = load_script(&source, &config)?;
            script.handle_message(&Message::HighlightClaims { claims });
            for (claim, verdict) in verdicts {
                script.handle_message(&Message::UpdateClaimStatus { claim, verdict });
            }
            let doc = script.document();
            let body = doc.body().unwrap_or_else(|| doc.root());
            println!("{}", doc.inner_html(body));
        }
        Command::Context { source, claim } => {
            let mut script = load_script(&source, &config)?;
            script.handle_message(&Message::HighlightClaims {
                claims: vec![claim.clone()],
            });
            let span = highlights_for(script.document(), &claim)
                .next()
                .ok_or_else(|| anyhow!("claim {:?} not found on the page", claim))?;
            let message = script
                .click(span)
                .dispatched
                .ok_or_else(|| anyhow!("click on {:?} was not handled", claim))?;
            let json = serde_json::to_string_pretty(&message)
                .context("failed to serialize VERIFY_CLAIM_FROM_PAGE")?;
            println!("{}", json);
        }
    }
    Ok(())
}
