// ============================================================================
// src/main.rs – drbd-shim command line
// ============================================================================

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use drbd_shim::config::ConfigFile;
use drbd_shim::ui::UX;
use drbd_shim::{provision, teardown, Drbd, Endpoint, Link, Resource, VolumeSpec};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "drbd-shim", version)]
#[command(about = "Create, attach, connect and tear down drbd resources")]
struct Cli {
    /// Config file (TOML or YAML); defaults to /etc/drbd-shim.toml when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Suppress informational output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Machine-readable output for list/show
    #[arg(long, global = true)]
    json: bool,

    /// Do not ask before destructive operations
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// More log output (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List configured resource names
    List,
    /// Parsed `drbdsetup show all`, optionally for one resource
    Show { name: Option<String> },
    /// drbdsetup new-resource
    Create { name: String },
    /// Remove the resource's minor, then the resource
    Delete { name: String },
    /// Bind a minor to a resource volume
    NewMinor {
        name: String,
        minor: u32,
        #[arg(default_value_t = 0)]
        volume: u32,
    },
    DelMinor { minor: u32 },
    /// Initialise external meta-data (destroys existing meta-data)
    CreateMd { minor: u32, meta_dev: PathBuf },
    /// Attach backing storage; arguments after `--` go to drbdsetup
    Attach {
        minor: u32,
        data_dev: PathBuf,
        meta_dev: PathBuf,
        #[arg(last = true)]
        extra: Vec<String>,
    },
    Detach { minor: u32 },
    /// Connect to a peer, e.g. ipv4:10.0.0.1:7788 ipv4:10.0.0.2:7788
    Connect {
        name: String,
        local: Endpoint,
        remote: Endpoint,
        #[arg(last = true)]
        extra: Vec<String>,
    },
    Disconnect { local: Endpoint, remote: Endpoint },
    Primary {
        minor: u32,
        /// Promote even without up-to-date data
        #[arg(long)]
        force: bool,
    },
    Secondary { minor: u32 },
    Down { name: String },
    /// new-resource, new-minor, create-md and attach in one go
    Up(UpArgs),
    /// secondary, disconnect, detach and down
    Teardown {
        name: String,
        #[command(flatten)]
        peer: PeerArgs,
    },
}

#[derive(Args)]
struct UpArgs {
    name: String,
    #[arg(long)]
    minor: u32,
    #[arg(long, default_value_t = 0)]
    volume: u32,
    #[arg(long)]
    data: PathBuf,
    #[arg(long)]
    meta: PathBuf,
    /// Promote to primary once attached
    #[arg(long)]
    primary: bool,
    /// With --primary: force promotion
    #[arg(long, requires = "primary")]
    force: bool,
    #[command(flatten)]
    peer: PeerArgs,
    /// Extra `drbdsetup attach` arguments
    #[arg(last = true)]
    attach_args: Vec<String>,
}

#[derive(Args)]
struct PeerArgs {
    #[arg(long, requires = "remote")]
    local: Option<Endpoint>,
    #[arg(long, requires = "local")]
    remote: Option<Endpoint>,
}

impl PeerArgs {
    fn link(&self) -> Option<Link> {
        match (self.local, self.remote) {
            (Some(local), Some(remote)) => Some(Link::new(local, remote)),
            _ => None,
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ui = UX::new(cli.quiet, cli.yes);
    let cfg = ConfigFile::load_or_default(cli.config.as_deref())?;
    let drbd = Drbd::discover(&cfg).context("locating drbd userland tools")?;

    if let Err(err) = run(&cli, &ui, &drbd) {
        ui.error(&format!("{err:#}"));
        std::process::exit(1);
    }
    Ok(())
}

fn run(cli: &Cli, ui: &UX, drbd: &Drbd) -> Result<()> {
    match &cli.command {
        Command::List => {
            let names = drbd.list_resources()?;
            if cli.json {
                ui.out(&serde_json::to_string_pretty(&names)?);
            } else {
                for name in names {
                    ui.out(&name);
                }
            }
        }
        Command::Show { name } => show(cli, ui, drbd, name.as_deref())?,
        Command::Create { name } => {
            let res = Resource::create(drbd, name)?;
            ui.success(&format!("Resource {} created.", res.name()));
        }
        Command::Delete { name } => {
            if !ui.confirm(&format!("Delete resource {name}?"))? {
                ui.warn("Aborted.");
                return Ok(());
            }
            let mut res = Resource::open(drbd, name)?;
            res.delete()?;
            ui.success(&format!("Resource {name} deleted."));
        }
        Command::NewMinor {
            name,
            minor,
            volume,
        } => {
            drbd.new_minor(name, *minor, *volume)?;
            ui.success(&format!(
                "Minor {minor} bound to {name}/{volume} ({}).",
                drbd_shim::minor_dev(*minor).display()
            ));
        }
        Command::DelMinor { minor } => {
            drbd.del_minor(*minor)?;
            ui.success(&format!("Minor {minor} removed."));
        }
        Command::CreateMd { minor, meta_dev } => {
            if !ui.confirm(&format!(
                "Write fresh drbd meta-data to {}?",
                meta_dev.display()
            ))? {
                ui.warn("Aborted.");
                return Ok(());
            }
            drbd.create_md(*minor, meta_dev)?;
            ui.success(&format!("Meta-data created on {}.", meta_dev.display()));
        }
        Command::Attach {
            minor,
            data_dev,
            meta_dev,
            extra,
        } => {
            drbd.attach(*minor, data_dev, meta_dev, extra)?;
            ui.success(&format!("{} attached to minor {minor}.", data_dev.display()));
        }
        Command::Detach { minor } => {
            drbd.detach(*minor)?;
            ui.success(&format!("Minor {minor} detached."));
        }
        Command::Connect {
            name,
            local,
            remote,
            extra,
        } => {
            drbd.connect(name, local, remote, extra)?;
            ui.success(&format!("{name}: connecting {local} → {remote}."));
        }
        Command::Disconnect { local, remote } => {
            drbd.disconnect(local, remote)?;
            ui.success(&format!("Disconnected {local} → {remote}."));
        }
        Command::Primary { minor, force } => {
            if *force && !ui.confirm(&format!("Force minor {minor} primary?"))? {
                ui.warn("Aborted.");
                return Ok(());
            }
            drbd.primary(*minor, *force)?;
            ui.success(&format!("Minor {minor} is primary."));
        }
        Command::Secondary { minor } => {
            drbd.secondary(*minor)?;
            ui.success(&format!("Minor {minor} is secondary."));
        }
        Command::Down { name } => {
            if !ui.confirm(&format!("Take resource {name} down?"))? {
                ui.warn("Aborted.");
                return Ok(());
            }
            drbd.down(name)?;
            ui.success(&format!("Resource {name} is down."));
        }
        Command::Up(args) => up(ui, drbd, args)?,
        Command::Teardown { name, peer } => {
            if !ui.confirm(&format!("Tear down resource {name}?"))? {
                ui.warn("Aborted.");
                return Ok(());
            }
            let res = Resource::open(drbd, name)?;
            teardown(&res, peer.link().as_ref())?;
            ui.success(&format!("Resource {name} torn down."));
        }
    }
    Ok(())
}

fn show(cli: &Cli, ui: &UX, drbd: &Drbd, name: Option<&str>) -> Result<()> {
    let mut report = drbd.show()?;
    if let Some(name) = name {
        report.resources.retain(|r| r.name == name);
        if report.resources.is_empty() {
            anyhow::bail!("resource {name} not found");
        }
    }

    if cli.json {
        ui.out(&serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for res in &report.resources {
        let mut rows = Vec::new();
        for vol in &res.volumes {
            let label = vol
                .volume
                .map(|v| format!("volume {v}"))
                .unwrap_or_else(|| "volume -".to_string());
            let minor = vol
                .minor
                .map(|m| drbd_shim::minor_dev(m).display().to_string())
                .unwrap_or_else(|| "-".to_string());
            let disk = vol.disk.as_deref().unwrap_or("-");
            let meta = vol.meta_disk.as_deref().unwrap_or("-");
            rows.push((label, format!("{minor}  disk={disk}  meta={meta}")));
        }
        let rows: Vec<(&str, String)> = rows
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        ui.data_panel(&res.name, &rows);
    }
    Ok(())
}

fn up(ui: &UX, drbd: &Drbd, args: &UpArgs) -> Result<()> {
    let spec = VolumeSpec {
        resource: args.name.clone(),
        minor: args.minor,
        volume: args.volume,
        data_dev: args.data.clone(),
        meta_dev: args.meta.clone(),
        attach_args: args.attach_args.clone(),
    };
    if !ui.confirm(&format!(
        "Write fresh drbd meta-data to {} and attach {}?",
        spec.meta_dev.display(),
        spec.data_dev.display()
    ))? {
        ui.warn("Aborted.");
        return Ok(());
    }

    let res = provision(drbd, &spec)?;
    let link = args.peer.link();

    let follow_up = (|| -> drbd_shim::Result<()> {
        if args.primary {
            res.set_primary(args.force)?;
        }
        if let Some(link) = &link {
            res.connect(&link.local, &link.remote, &[])?;
        }
        Ok(())
    })();
    if let Err(err) = follow_up {
        if let Err(down_err) = res.down() {
            ui.warn(&format!("down after failure also failed: {down_err}"));
        }
        return Err(err.into());
    }

    let mut rows = vec![
        ("Device", res.minor_dev()?.display().to_string()),
        ("Data", spec.data_dev.display().to_string()),
        ("Meta", spec.meta_dev.display().to_string()),
        (
            "Role",
            if args.primary { "primary" } else { "secondary" }.to_string(),
        ),
    ];
    if let Some(link) = &link {
        rows.push(("Peer", format!("{} → {}", link.local, link.remote)));
    }
    ui.data_panel(&format!("Resource {}", res.name()), &rows);
    Ok(())
}
