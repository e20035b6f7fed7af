use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "wifiauth", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config_path: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the auth server
    Serve {
        /// Listen host (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Listen port (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Development mode (verbose logging)
        #[arg(short, long)]
        dev: bool,
    },

    /// Initialize configuration
    Init,

    /// Generate sample configuration
    ConfigSample {
        /// Output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Gateway channel settings
    Gateway {
        #[command(subcommand)]
        command: GatewayCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum GatewayCommands {
    /// Import a gateway setting from a YAML file
    Import { file: PathBuf },
    /// Print the stored setting of a gateway
    Show { gw_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_flags_parse() {
        let cli = Cli::parse_from(["wifiauth", "serve", "--port", "9000", "--dev"]);
        match cli.command {
            Commands::Serve { host, port, dev } => {
                assert_eq!(host, None);
                assert_eq!(port, Some(9000));
                assert!(dev);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn gateway_subcommands_parse() {
        let cli = Cli::parse_from(["wifiauth", "-c", "x.yaml", "gateway", "show", "GW1"]);
        assert_eq!(cli.config_path.as_deref(), Some("x.yaml"));
        assert!(matches!(
            cli.command,
            Commands::Gateway {
                command: GatewayCommands::Show { ref gw_id }
            } if gw_id == "GW1"
        ));
    }
}
