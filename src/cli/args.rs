//! Command-line argument parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "oci-transfer")]
#[command(about = "Copy container images between registries and on-disk OCI layouts")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Pull an image from a registry into an on-disk OCI layout
    Copy {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Push an on-disk OCI layout to a registry
    Push {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(clap::Args)]
pub struct CommonArgs {
    /// Image reference: registry/[namespace/]repository
    #[arg(long = "image", short = 'i', help = "Image url : quay.io/user/component")]
    pub image: String,

    /// Image tag
    #[arg(long = "tag", short = 't', help = "Version tag : v0.0.1")]
    pub tag: String,

    /// OCI layout directory
    #[arg(long = "path", short = 'p', help = "Path of the local OCI layout")]
    pub path: String,

    /// Use https (default) or plain http when false
    #[arg(long = "tls-verify", default_value_t = true, action = clap::ArgAction::Set)]
    pub tls: bool,

    /// Read basic-auth credentials from BASIC_AUTH_CREDENTIALS
    #[arg(long = "basic-auth")]
    pub basic_auth: bool,

    /// Maximum in-flight blob transfers
    #[arg(long = "concurrency", short = 'j', default_value = "4")]
    pub concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long = "timeout", default_value = "300")]
    pub timeout: u64,
}
