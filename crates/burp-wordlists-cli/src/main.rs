use anyhow::Result;
use burp_wordlists_cli::cli::Cli;
use burp_wordlists_cli::config::Config;
use burp_wordlists_cli::output::Styled;
use clap::Parser;

fn main() -> Result<()> {
    let config = Config::from_cli(Cli::parse());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("burp_wordlists=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let summary = burp_wordlists_cli::run(&config)?;

    if config.json {
        println!("{}", summary.to_json()?);
    } else if !config.quiet {
        for line in summary.render_text(&Styled::new()) {
            eprintln!("{line}");
        }
    }
    Ok(())
}
