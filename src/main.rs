//! Terraform provider for Kubeflow Training Operator jobs

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kubeflow_training_provider::plugin;
use kubeflow_training_provider::provider::Provider;

/// Terraform provider plugin for Kubeflow training jobs
///
/// Run without arguments under Terraform; the binary prints the go-plugin
/// handshake and serves the plugin protocol over gRPC.
#[derive(Parser, Debug)]
#[command(name = "terraform-provider-kubeflow-training", version, about, long_about = None)]
struct Cli {
    /// Print the provider and resource schemas as JSON and exit
    #[arg(long)]
    schema: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Stdout carries the plugin handshake; logs go to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let provider = Provider::new();

    if cli.schema {
        let schemas = serde_json::json!({
            "provider": provider.provider_schema().to_json(),
            "resources": provider
                .resource_schemas()
                .into_iter()
                .map(|(name, schema)| (name.to_string(), schema.to_json()))
                .collect::<serde_json::Map<_, _>>(),
        });
        println!("{}", serde_json::to_string_pretty(&schemas)?);
        return Ok(());
    }

    plugin::serve(provider).await
}
