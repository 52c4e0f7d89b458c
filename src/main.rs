use clap::Parser;
use kb_retrieval::cli::{Cli, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so that --json output stays machine-readable
    kb_retrieval::tracing::init();

    let cli = Cli::parse();
    let output = run(cli).await.inspect_err(|e| {
        tracing::error!("kb-search failed: {:?}", e);
    })?;
    print!("{output}");
    if !output.ends_with('\n') {
        println!();
    }
    Ok(())
}
