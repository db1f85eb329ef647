// Entrypoint for the CLI application.
// - Keeps `main` small: parse arguments, set up logging, dispatch.
// - Every failure is reported as a red line and exits with status 1.

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::warn;

use elfsquad_cli::api::ApiClient;
use elfsquad_cli::config::Config;
use elfsquad_cli::error::PublishError;
use elfsquad_cli::logging::register_logger;
use elfsquad_cli::publish::{ProjectLayout, Publisher};
use elfsquad_cli::scaffold::{self, ExtensionTemplate};
use elfsquad_cli::token::TokenService;
use elfsquad_cli::ui;

/// Command-line client for Elfsquad: log in and manage extensions.
#[derive(Parser, Debug)]
#[command(name = "elfsquad", version)]
struct Args {
    /// Show debug logs on stderr (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in with your credentials.
    Login,
    /// Log out from your account.
    Logout,
    /// Manage extensions.
    #[command(subcommand)]
    Extension(ExtensionCommand),
}

#[derive(Subcommand, Debug)]
enum ExtensionCommand {
    /// Initialize a new extension.
    Init {
        /// Name of the extension and of the directory to create.
        name: String,
        /// Template to start from; asked interactively when omitted.
        #[arg(long, short, value_enum)]
        template: Option<ExtensionTemplate>,
        /// Do not run `npm install` in the new project.
        #[arg(long)]
        skip_install: bool,
    },
    /// Publish the extension in the current directory.
    Publish,
}

fn main() -> ExitCode {
    let args = Args::parse();
    register_logger(args.verbose);

    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ui::failure(&format!("{e:#}"));
            if needs_login(&e) {
                ui::failure("Run `elfsquad login` to start a new session.");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<()> {
    let config = Config::from_env()?;

    match command {
        Command::Login => login(config),
        Command::Logout => {
            let api = ApiClient::new(&config)?;
            TokenService::new(config, api).logout()?;
            ui::success("Logged out");
            Ok(())
        }
        Command::Extension(ExtensionCommand::Init {
            name,
            template,
            skip_install,
        }) => init(&name, template, skip_install),
        Command::Extension(ExtensionCommand::Publish) => publish(config),
    }
}

fn login(config: Config) -> Result<()> {
    let redirect_uri = config.redirect_uri();
    let api = ApiClient::new(&config)?;
    let service = TokenService::new(config, api);

    service.login(|url| {
        match open::that(url.as_str()) {
            Ok(()) => ui::info("Opening browser to login..."),
            Err(e) => {
                warn!(error = %e, "could not open browser");
                ui::warning("Could not open a browser. Open this URL to log in:");
                println!("{url}");
            }
        }
        ui::info(&format!("Waiting for the login redirect on {redirect_uri} ..."));
    })?;

    ui::success("Logged in!");
    Ok(())
}

fn init(name: &str, template: Option<ExtensionTemplate>, skip_install: bool) -> Result<()> {
    let template = match template {
        Some(template) => template,
        None => ui::select_template()?,
    };

    let cwd = std::env::current_dir()?;
    for path in scaffold::scaffold(&cwd, name, template)? {
        let shown = path.strip_prefix(&cwd).unwrap_or(&path);
        ui::success(&format!("Created {}", shown.display()));
    }

    if skip_install {
        return Ok(());
    }
    ui::info("Installing dependencies...");
    match scaffold::install_dependencies(&cwd.join(name)) {
        Ok(status) if status.success() => ui::success("Dependencies installed"),
        Ok(status) => ui::warning(&format!("npm install exited with {status}; run it again in {name}/")),
        Err(e) => ui::warning(&format!("Could not run npm install ({e}); install dependencies manually")),
    }
    Ok(())
}

fn publish(config: Config) -> Result<()> {
    ui::info("Publishing...");
    let api = ApiClient::new(&config)?;
    let tokens = TokenService::new(config, ApiClient::clone(&api));
    let layout = ProjectLayout::at(&std::env::current_dir()?);

    let spinner = ui::spinner("Uploading extension...");
    let result = Publisher::new(layout, &tokens, &api).publish();
    spinner.finish_and_clear();

    let package = result?;
    ui::success(&format!(
        "Extension published successfully ({} files, {} bytes)",
        package.entries.len(),
        package.bytes.len()
    ));
    Ok(())
}

fn needs_login(e: &anyhow::Error) -> bool {
    matches!(e.downcast_ref::<PublishError>(), Some(PublishError::Auth(_)))
}
