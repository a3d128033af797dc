use clap::{Args, Parser, Subcommand};
use nsbridge_core::Mode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nsbridge-ctl")]
#[command(version, about = "Inspect and drive the self-isolation of a network bridging daemon", long_about = None)]
#[command(after_help = "EXAMPLES:
    nsbridge-ctl check
    nsbridge-ctl addr ::ffff:10.0.0.1
    nsbridge-ctl cidr 192.0.2.0/24
    nsbridge-ctl match 0.0.0.0 10.1.2.3
    nsbridge-ctl seccomp --mode pasta

    # Show every kernel call the stages would make, without making them
    nsbridge-ctl isolate --mode pasta --use-userns --dry-run
    nsbridge-ctl isolate --config isolation.json --foreground
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check isolation requirements and show the current privilege state
    Check,

    /// Parse an address and print its canonical form
    Addr {
        /// IPv4 or IPv6 address
        text: String,
    },

    /// Parse an address with prefix length
    Cidr {
        /// <address>/<prefix length>
        text: String,
    },

    /// Check whether two addresses match ("*" is the wildcard)
    Match { a: String, b: String },

    /// List the runtime syscall allow-list of a mode
    Seccomp {
        /// passt, pasta or vhost-user
        #[arg(short, long, default_value = "passt")]
        mode: Mode,
    },

    /// Run the isolation stages on this process
    Isolate(IsolateArgs),
}

#[derive(Args, Debug, Default)]
pub struct IsolateArgs {
    /// JSON configuration file, flags override it
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// passt, pasta or vhost-user
    #[arg(short, long)]
    pub mode: Option<Mode>,

    /// Target UID
    #[arg(long, value_name = "UID")]
    pub uid: Option<u32>,

    /// Target GID
    #[arg(long, value_name = "GID")]
    pub gid: Option<u32>,

    /// Join this user namespace
    #[arg(long, value_name = "PATH")]
    pub userns: Option<PathBuf>,

    /// Create a user namespace (default unless --netns-only)
    #[arg(long, conflicts_with = "no_userns")]
    pub use_userns: bool,

    /// Stay in the current user namespace
    #[arg(long)]
    pub no_userns: bool,

    /// pasta only: no user namespace of our own
    #[arg(long)]
    pub netns_only: bool,

    /// Don't fork before the last stage
    #[arg(short, long)]
    pub foreground: bool,

    /// Directory to mount the empty root over
    #[arg(long, value_name = "PATH")]
    pub scratch: Option<PathBuf>,

    /// Descriptor to keep open
    #[arg(short = 'F', long, value_name = "FD")]
    pub fd: Option<i32>,

    /// Run against a simulated kernel and print every call
    #[arg(long)]
    pub dry_run: bool,
}
