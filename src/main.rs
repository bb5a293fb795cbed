use clap::Parser;
use hcjwk::cli::commands;
use hcjwk::cli::{output, Cli, Commands};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = hcjwk::telemetry::init(&cli.log_level) {
        output::error(&e.to_string());
        std::process::exit(2);
    }

    let result = match cli.command {
        Commands::Refresh => commands::refresh::execute(&cli),
        Commands::Revoke { ref kid } => commands::revoke::execute(&cli, kid),
        Commands::Purge => commands::purge::execute(&cli),
        Commands::List => commands::list::execute(&cli),
        Commands::Jwks => commands::jwks::execute(&cli),
        Commands::SecretGenerate => commands::secret_generate::execute(),
        Commands::Completions { shell } => commands::completions::execute(shell),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "{} failed", cli.command.name());
        output::error(&e.to_string());
        std::process::exit(2);
    }
}
