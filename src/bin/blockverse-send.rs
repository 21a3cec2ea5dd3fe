#![forbid(unsafe_code)]
//! Submits freshly signed demo transactions to a running node.

use blockverse::crypto::{address_to_hex, CanonicalHash, KeyPair};
use blockverse::network::{Dialer, TcpDialer};
use blockverse::node::init_logging;
use blockverse::transaction::{Transaction, TxInput, TxOutput};
use clap::Parser;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Node to send to
    #[arg(long, default_value = "127.0.0.1:3000")]
    node: String,
    /// Number of transactions to send
    #[arg(long, default_value_t = 1)]
    count: u32,
    /// Amount carried by each output
    #[arg(long, default_value_t = 99)]
    amount: u64,
    /// Connect/RPC timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,
    /// Print each submitted transaction as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging("info");

    let timeout = Duration::from_millis(cli.timeout_ms);
    let client = TcpDialer::new(timeout).dial(&cli.node).await?;

    for n in 0..cli.count {
        let keypair = KeyPair::generate();
        let mut tx = Transaction::new(
            1,
            vec![TxInput::new(
                rand::random::<[u8; 32]>(),
                n,
                keypair.public_key_bytes().to_vec(),
            )],
            vec![TxOutput {
                amount: cli.amount,
                address: keypair.address(),
            }],
        );
        tx.sign(&keypair);

        let hash = tx.hash_hex();
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&tx)?);
        }
        tokio::time::timeout(timeout, client.handle_transaction(tx))
            .await
            .map_err(|_| format!("{} did not answer within {:?}", cli.node, timeout))??;
        info!(
            hash = %hash,
            to = %address_to_hex(&keypair.address()),
            "transaction accepted by {}",
            cli.node
        );
    }

    Ok(())
}
