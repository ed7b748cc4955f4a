use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "pkgfront",
    version,
    about = "pkgfront: front-end for pacman and pkg package managers"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    #[arg(long = "backend", value_name = "BACKEND", global = true, help = "Force a backend: pacman, pkg")]
    pub backend: Option<BackendArg>,
    #[arg(long = "terminal", value_name = "BIN", global = true, help = "Terminal emulator for privileged actions")]
    pub terminal: Option<String>,
    #[arg(long = "in-terminal", global = true, conflicts_with = "no_terminal", help = "Always run actions in a terminal window")]
    pub in_terminal: bool,
    #[arg(long = "no-terminal", global = true, help = "Run actions here, escalating with the privilege tool")]
    pub no_terminal: bool,
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum BackendArg {
    Pacman,
    Pkg,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search remote packages
    Search {
        term: String,
        /// Match package names only
        #[arg(long)]
        names_only: bool,
        /// Search the AUR through the installed helper
        #[arg(long)]
        aur: bool,
    },
    /// Show package information
    Info {
        pkg: String,
        /// Query the local database instead of the sync repos
        #[arg(long)]
        local: bool,
        /// Print a single field
        #[arg(long)]
        field: Option<String>,
    },
    /// List installed packages
    Installed,
    /// List outdated packages
    Outdated {
        #[arg(long)]
        aur: bool,
    },
    /// List packages not installed from a repository
    Foreign,
    /// List packages nothing depends on
    Orphans,
    /// List what a package pulls in
    Deps { pkg: String },
    /// List files of a package
    Files {
        pkg: String,
        /// Use the pkgfile database (package need not be installed)
        #[arg(long)]
        pkgfile: bool,
    },
    /// Find the package owning a file
    Owns { path: String },
    /// Suggest repository paths for a file name (pkgfile)
    Suggest { file: String },
    /// List package groups
    Groups,
    /// List packages of a group
    Group { name: String },
    /// List repository packages
    List { repo: Option<String> },
    /// Show IgnorePkg entries from pacman.conf
    Ignored,
    /// Preview what an upgrade or removal would touch
    Targets {
        #[command(subcommand)]
        cmd: TargetsCmd,
    },
    /// Synchronize package databases
    SyncDb,
    /// Upgrade the system
    Upgrade,
    /// Install packages
    Install {
        pkgs: Vec<String>,
        /// Build from the AUR with the installed helper
        #[arg(long)]
        aur: bool,
    },
    /// Install local package files
    Local { paths: Vec<String> },
    /// Remove packages
    Remove {
        pkgs: Vec<String>,
        /// Packages to install in the same transaction
        #[arg(long = "install", value_name = "PKG", num_args = 1..)]
        install: Vec<String>,
    },
    /// Run arbitrary commands as root in a terminal window
    Terminal {
        /// Commands to run; opens a root shell when empty
        commands: Vec<String>,
    },
    /// Run the mirror-check helper
    MirrorCheck,
    /// Trim the package cache
    Clean {
        #[arg(long)]
        keep: Option<u32>,
    },
    /// Report host, tools and configuration
    Doctor {
        #[arg(long)]
        json: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
}

#[derive(Subcommand, Debug)]
pub enum TargetsCmd {
    /// Targets of a full upgrade, or of installing PKG
    Upgrade { pkg: Option<String> },
    /// Targets of removing PKG
    Remove { pkg: String },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCmd {
    Show,
    Get { key: String },
    Set { key: String, value: String },
    Reset,
}
