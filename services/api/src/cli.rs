use crate::demo::{run_demo, DemoArgs};
use crate::server;
use crate::tools::{fill, paginate, validate_upload, FillArgs, PaginateArgs, ValidateUploadArgs};
use clap::{Args, Parser, Subcommand};
use lease_desk::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Lease Desk",
    about = "Run the lease contract service or work with contract documents from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Offline contract document tools
    Contract {
        #[command(subcommand)]
        command: ContractCommand,
    },
    /// Walk a lease through generation, delivery and signing in memory
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum ContractCommand {
    /// Split a text file into contract pages
    Paginate(PaginateArgs),
    /// Fill a contract template from a JSON field map
    Fill(FillArgs),
    /// Check whether a file would be accepted as an uploaded contract
    ValidateUpload(ValidateUploadArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Contract { command } => match command {
            ContractCommand::Paginate(args) => paginate(args),
            ContractCommand::Fill(args) => fill(args),
            ContractCommand::ValidateUpload(args) => validate_upload(args),
        },
        Command::Demo(args) => run_demo(args).await,
    }
}
