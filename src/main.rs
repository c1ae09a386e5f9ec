//! otelgen CLI entry point.

use otelgen_lib::cli::{self, Cli};
use otelgen_lib::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse_args();

    // Execute the command
    cli::execute(cli).await
}
