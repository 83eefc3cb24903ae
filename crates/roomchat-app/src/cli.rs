use clap::Parser;

/// roomchat: anonymous group chat in named rooms.
#[derive(Parser, Debug)]
#[command(name = "roomchat", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<String>,

    /// Start location; a `#room` fragment joins that room on start-up.
    #[arg(long)]
    pub url: Option<String>,

    /// Use the in-process store instead of the hosted backend.
    #[arg(long)]
    pub offline: bool,
}

pub fn parse() -> Args {
    Args::parse()
}
