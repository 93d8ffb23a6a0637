//! Demo CLI for driving a remote DSP factory/instance session.
//!
//! Analogous to the library's own preview binary: a thin argument-parsing
//! shell around the public API, useful for manual smoke-testing against a
//! real server and as a runnable usage example.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use faust_remote_dsp::discovery::DiscoveryTable;
use faust_remote_dsp::factory::{self, CompileOptions};
use faust_remote_dsp::transport::ControlPlaneClient;
use faust_remote_dsp::ClientConfig;

#[derive(Parser)]
#[command(name = "remote-client", about = "Talk to a remote DSP compiler/runtime server")]
struct Cli {
    /// Server host.
    #[arg(long, default_value = "localhost")]
    host: String,
    /// Server control-plane port.
    #[arg(long, default_value_t = 7777)]
    port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a DSP source string into a factory and print its metadata.
    Compile {
        /// DSP source text.
        source: String,
        /// Optimization level passed through to the server.
        #[arg(long, default_value_t = 0)]
        opt_level: i32,
    },
    /// List factories currently known to the server.
    List,
    /// Print the multicast address this client listens for server
    /// advertisements on, and any servers seen so far.
    Discover,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::default();
    let client = ControlPlaneClient::new(&config);

    match cli.command {
        Command::Compile { source, opt_level } => {
            let options = CompileOptions {
                argv: Vec::new(),
                opt_level,
                machine_code: None,
            };
            match factory::create(&client, &config, &cli.host, cli.port, "cli", &source, &options) {
                Ok(f) => {
                    println!("factory {} ({} in, {} out)", f.key(), f.num_inputs(), f.num_outputs());
                    f.metadata(|k, v| println!("  {k} = {v}"));
                }
                Err(err) => eprintln!("compile failed: {err}"),
            }
        }
        Command::List => {
            let base_url = format!("http://{}:{}", cli.host, cli.port);
            match client.get_available_factories(&base_url) {
                Ok(factories) => {
                    for (name, key) in factories {
                        println!("{name} {key}");
                    }
                }
                Err(err) => eprintln!("list failed: {err}"),
            }
        }
        Command::Discover => {
            println!("listening on {}", config.discovery_multicast_addr());
            let table = DiscoveryTable::new();
            for (name, ip, port) in table.list_alive_configured(&config) {
                println!("{name} {ip}:{port}");
            }
        }
    }
}
