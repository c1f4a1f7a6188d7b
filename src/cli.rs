use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "apkpatch")]
#[command(author, version, about = "Patch Android apps for HTTPS inspection")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decode, patch, rebuild and sign an APK
    Patch {
        /// APK file to patch
        #[arg(required = true)]
        input: PathBuf,

        /// Where to write the patched APK [default: <input>-patched.apk]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pause after patching so the decoded files can be edited by hand
        #[arg(long)]
        wait: bool,

        /// Working directory to decode into instead of a fresh temp dir
        #[arg(long)]
        tmp_dir: Option<PathBuf>,

        /// Keep the working directory after a successful run
        #[arg(long)]
        keep_tmp: bool,

        /// Do not zip-align the signed APK
        #[arg(long)]
        no_zipalign: bool,
    },

    /// Check that required external tools are available
    CheckTools {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Display version information
    Version,
}
