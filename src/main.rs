mod cli;
mod report;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ap_core::config::Config;
use ap_patch::{ManifestRewriter, NetworkConfigWriter, PinningPatcher};
use ap_pipeline::{
    run_patch, termination_signal, until_terminated, Adapters, RunConfig, TerminalKeySource,
};
use ap_tools::{Apktool, ToolRegistry, UberApkSigner, Workspace};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use report::{Reporter, APP_BUNDLE_WARNING};

/// Options of the `patch` subcommand.
struct PatchArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    wait: bool,
    tmp_dir: Option<PathBuf>,
    keep_tmp: bool,
    no_zipalign: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set; otherwise stay quiet so log lines do
    // not interleave with the step output.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "apkpatch=debug,ap_core=debug,ap_tools=debug,ap_patch=debug,ap_pipeline=debug"
                .to_string()
        } else {
            "warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Patch {
            input,
            output,
            wait,
            tmp_dir,
            keep_tmp,
            no_zipalign,
        } => {
            let args = PatchArgs {
                input,
                output,
                wait,
                tmp_dir,
                keep_tmp,
                no_zipalign,
            };
            let rt = tokio::runtime::Runtime::new()?;
            let result = rt.block_on(patch_apk(args, cli.config.as_deref()));
            // A key reader still blocked on the terminal must not hold up exit.
            rt.shutdown_timeout(Duration::from_secs(1));
            result
        }
        Commands::CheckTools { json } => check_tools(cli.config.as_deref(), json),
        Commands::Version => {
            println!("apkpatch {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// `app.apk` -> `app-patched.apk` in the same directory.
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "app".to_string());
    input.with_file_name(format!("{stem}-patched.apk"))
}

async fn patch_apk(args: PatchArgs, config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    for warning in config.validate() {
        tracing::warn!("config: {}", warning);
    }

    if !args.input.is_file() {
        anyhow::bail!("Input file does not exist: {:?}", args.input);
    }

    let output = args
        .output
        .unwrap_or_else(|| default_output_path(&args.input));
    let wait = args.wait || config.patch.wait;
    let zipalign = !args.no_zipalign && config.patch.zipalign;
    let keep_tmp = args.keep_tmp || config.patch.keep_workspace;

    let workspace = match &args.tmp_dir {
        Some(dir) => Workspace::at(dir)?,
        None => Workspace::create()?,
    };
    let layout = workspace.layout();

    let tools = ToolRegistry::discover(&config.tools);
    let framework_dir = config
        .tools
        .framework_dir
        .clone()
        .unwrap_or_else(|| layout.framework_dir());

    let adapters = Adapters {
        toolchain: Some(Arc::new(tools.clone())),
        codec: Arc::new(Apktool::new(tools.clone(), framework_dir)),
        signer: Arc::new(UberApkSigner::new(tools)),
        manifest: Arc::new(ManifestRewriter::new(config.patch.debuggable)),
        network_config: Arc::new(NetworkConfigWriter::new()),
        pinning: Arc::new(PinningPatcher::new()),
        keys: Arc::new(TerminalKeySource),
    };
    let run_config = RunConfig {
        input: args.input.clone(),
        output: output.clone(),
        tmp_dir: layout.root().to_path_buf(),
        wait,
        zipalign,
    };

    println!("Patching {}\n", args.input.display());
    let result = until_terminated(
        run_patch(&run_config, &adapters, &Reporter::new().into_sink()),
        termination_signal(),
    )
    .await;

    match result {
        Ok(report) => {
            if report.context.uses_app_bundle {
                println!("\n{APP_BUNDLE_WARNING}");
            }
            println!("\nDone! Patched file: {}", output.display());

            if keep_tmp {
                let dir = workspace.keep();
                println!("Temporary files kept in {}", dir.display());
            } else {
                workspace
                    .cleanup()
                    .context("failed to remove temporary files")?;
            }
            Ok(())
        }
        Err(e) => {
            let dir = workspace.keep();
            eprintln!("\nTemporary files kept in {}", dir.display());
            Err(anyhow::Error::new(e).context(format!("failed to patch {}", args.input.display())))
        }
    }
}

fn check_tools(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools).check_all();

    if json {
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    println!("Checking external tools...\n");
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Set their paths under [tools] in the config file.");
    }

    Ok(())
}
