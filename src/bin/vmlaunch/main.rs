use std::path::PathBuf;

use clap::{Parser, Subcommand};

use vmlaunch::host::{self, HostPaths, HostReport};
use vmlaunch::vmm::{launch_qemu, load_config, TracingLog};

/// Compile machine descriptions into QEMU invocations and run them
#[derive(Parser, Debug)]
#[command(name = "vmlaunch")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check whether this host can run KVM guests
    Check {
        /// CPU information source
        #[arg(long, env = "VMLAUNCH_CPUINFO")]
        cpuinfo: Option<PathBuf>,

        /// Directory of loaded kernel modules
        #[arg(long, env = "VMLAUNCH_SYS_MODULE_DIR")]
        sys_module_dir: Option<PathBuf>,

        /// Also open the KVM device and create a VM
        #[arg(long)]
        kvm: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the compiled QEMU arguments, one per line
    Args {
        /// Machine description (JSON or YAML)
        #[arg(long)]
        file: PathBuf,
    },

    /// Report every invalid socket, device and RTC setting
    Validate {
        /// Machine description (JSON or YAML)
        #[arg(long)]
        file: PathBuf,
    },

    /// Compile and launch, waiting for QEMU to exit
    Run {
        /// Machine description (JSON or YAML)
        #[arg(long)]
        file: PathBuf,

        /// QEMU binary, overriding the description
        #[arg(long, env = "VMLAUNCH_QEMU")]
        qemu: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            cpuinfo,
            sys_module_dir,
            kvm,
            json,
        } => cmd_check(cpuinfo, sys_module_dir, kvm, json)?,
        Commands::Args { file } => cmd_args(file)?,
        Commands::Validate { file } => cmd_validate(file)?,
        Commands::Run { file, qemu } => cmd_run(file, qemu)?,
    }

    Ok(())
}

fn cmd_check(
    cpuinfo: Option<PathBuf>,
    sys_module_dir: Option<PathBuf>,
    kvm: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut paths = HostPaths::default();
    if let Some(p) = cpuinfo {
        paths.cpuinfo = p;
    }
    if let Some(p) = sys_module_dir {
        paths.sys_module_dir = p;
    }

    let mut report = HostReport::collect(&paths);
    if kvm && report.capable {
        if let Err(e) = host::require_kvm_usable(&paths) {
            report.capable = false;
            report.reason = Some(e.to_string());
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let unknown = "unknown".to_string();
        println!("vendor: {}", report.vendor.as_ref().unwrap_or(&unknown));
        println!("model: {}", report.model.as_ref().unwrap_or(&unknown));
        println!(
            "kernel: {}",
            report.kernel_version.as_ref().unwrap_or(&unknown)
        );
        match &report.distro {
            Some(d) => println!("distro: {} {}", d.name, d.version),
            None => println!("distro: {unknown}"),
        }
        println!("capable: {}", report.capable);
        if let Some(reason) = &report.reason {
            println!("reason: {reason}");
        }
    }

    if !report.capable {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_args(file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&file)?;
    for arg in config.compile().args {
        println!("{arg}");
    }
    Ok(())
}

fn cmd_validate(file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&file)?;
    match config.validate() {
        Ok(()) => {
            println!("valid: {}", file.display());
            Ok(())
        }
        Err(vmlaunch::Error::InvalidConfig(problems)) => {
            for problem in &problems {
                eprintln!("invalid: {problem}");
            }
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_run(file: PathBuf, qemu: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(&file)?;
    if qemu.is_some() {
        config.path = qemu;
    }

    if let Err(e) = launch_qemu(&config, Some(&TracingLog)) {
        let stderr = e.stderr();
        if !stderr.is_empty() {
            eprint!("{stderr}");
        }
        eprintln!("error: {e}");
        std::process::exit(1);
    }
    Ok(())
}
