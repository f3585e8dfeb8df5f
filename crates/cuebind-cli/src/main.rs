use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use cuebind_midi::hotplug::DEFAULT_POLL_INTERVAL;
use cuebind_midi::output::list_outputs;
use cuebind_midi::{
    Configurator, HotplugEvent, HotplugWatcher, LearnOptions, LearnSignal, MidiBackend,
    MidirBackend, DEFAULT_CAPTURE_TIMEOUT,
};
use cuebind_settings::extract::{DEFAULT_ACTION_MARKER, DEFAULT_KEY_MARKER};
use cuebind_settings::preferences::{set_enabled, set_global_channel, set_interface};
use cuebind_settings::{ExtractOptions, MidiPreferences, PropertyExtractor, SourceLayout};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.log_level.as_deref());
    match cli.command {
        Commands::Devices(args) => execute_devices(args),
        Commands::Show(args) => execute_show(&cli.global, args),
        Commands::Template(args) => execute_template(&cli.global, args),
        Commands::Export => execute_export(&cli.global),
        Commands::Learn(args) => execute_learn(&cli.global, args),
        Commands::Send(args) => execute_send(&cli.global, args),
        Commands::Prefs(args) => execute_prefs(&cli.global, args),
    }
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

#[derive(Parser)]
#[command(author, version, about = "Bind MIDI triggers to Quelea actions")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Root of the host application's source checkout.
    #[arg(long, global = true, default_value = ".")]
    source_root: PathBuf,
    /// Override the key declaration source file.
    #[arg(long, global = true)]
    keys: Option<PathBuf>,
    /// Override the defaults declaration source file.
    #[arg(long, global = true)]
    defaults: Option<PathBuf>,
    /// Settings file to import from and export to.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    /// Substring marking MIDI property keys.
    #[arg(long, global = true, default_value = DEFAULT_KEY_MARKER)]
    key_marker: String,
    /// Substring marking action trigger keys.
    #[arg(long, global = true, default_value = DEFAULT_ACTION_MARKER)]
    action_marker: String,
    /// Log filter, e.g. `debug` or `cuebind_midi=trace`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List MIDI input devices.
    Devices(DevicesArgs),
    /// Print the current configuration.
    Show(ShowArgs),
    /// Write the defaults to a fresh settings file.
    Template(TemplateArgs),
    /// Merge the current configuration into the settings file.
    Export,
    /// Capture the next MIDI event and bind it to an action.
    Learn(LearnArgs),
    /// Send the event bound to an action.
    Send(SendArgs),
    /// Change the MIDI preferences and export them.
    Prefs(PrefsArgs),
}

#[derive(Args)]
struct DevicesArgs {
    /// Keep running and print the list whenever it changes.
    #[arg(long)]
    watch: bool,
    /// List output devices instead of inputs.
    #[arg(long, conflicts_with = "watch")]
    outputs: bool,
}

#[derive(Args)]
struct ShowArgs {
    /// Print JSON instead of `identifier=value` lines.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct TemplateArgs {
    /// Output path for the template.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args)]
struct LearnArgs {
    /// Action identifier to bind.
    action: String,
    /// Input device name, matched by substring. Defaults to the configured interface.
    #[arg(long)]
    device: Option<String>,
    /// Seconds to wait for an event.
    #[arg(long, default_value_t = DEFAULT_CAPTURE_TIMEOUT.as_secs())]
    timeout: u64,
}

#[derive(Args)]
struct SendArgs {
    /// Action identifier whose binding is sent.
    action: String,
    /// Output device name, matched by substring. Defaults to the first output.
    #[arg(long)]
    output: Option<String>,
}

#[derive(Args)]
struct PrefsArgs {
    /// Enable or disable MIDI control (`true` or `false`).
    #[arg(long)]
    enabled: Option<bool>,
    /// Input device name; a trailing port number is dropped.
    #[arg(long)]
    interface: Option<String>,
    /// Global MIDI channel, 1 to 16.
    #[arg(long)]
    channel: Option<u8>,
}

fn default_settings_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".quelea").join("quelea.properties"))
}

fn settings_path(global: &GlobalArgs) -> Result<PathBuf> {
    global
        .settings
        .clone()
        .or_else(default_settings_path)
        .context("no settings path given and the home directory is unknown")
}

fn open_session(
    global: &GlobalArgs,
    learn: LearnOptions,
    backend: MidirBackend,
) -> Result<Configurator<MidirBackend>> {
    let options = ExtractOptions {
        key_marker: global.key_marker.clone(),
        action_marker: global.action_marker.clone(),
    };
    let layout = SourceLayout::from_root(&global.source_root)
        .with_overrides(global.keys.clone(), global.defaults.clone());
    let extraction = layout
        .extract(&PropertyExtractor::new(options.clone()))
        .context("failed to recover MIDI properties from the host sources")?;
    Ok(Configurator::new(extraction, options, learn, backend))
}

/// Applies the settings file over the defaults when it exists.
fn import_existing(session: &mut Configurator<MidirBackend>, path: &Path) -> Result<()> {
    if !path.exists() {
        info!(path = %path.display(), "settings file not found, using defaults");
        return Ok(());
    }
    let applied = session
        .import_settings(path)
        .with_context(|| format!("failed to import {}", path.display()))?;
    if applied == 0 {
        warn!(path = %path.display(), "no MIDI settings found in settings file");
    }
    Ok(())
}

fn execute_devices(args: DevicesArgs) -> Result<()> {
    if args.outputs {
        for name in list_outputs("cuebind")? {
            println!("{name}");
        }
        return Ok(());
    }
    let backend = MidirBackend::default();
    if !args.watch {
        for name in backend.enumerate()? {
            println!("{name}");
        }
        return Ok(());
    }
    let watcher = HotplugWatcher::spawn(backend, DEFAULT_POLL_INTERVAL)?;
    loop {
        if let Some(HotplugEvent::Snapshot(names)) = watcher.recv_timeout(Duration::from_secs(1)) {
            println!("-- {} input device(s)", names.len());
            for name in names {
                println!("{name}");
            }
        }
    }
}

fn execute_show(global: &GlobalArgs, args: ShowArgs) -> Result<()> {
    let mut session = open_session(global, LearnOptions::default(), MidirBackend::default())?;
    import_existing(&mut session, &settings_path(global)?)?;
    if args.json {
        let rendered = serde_json::to_string_pretty(&session.configuration().snapshot())?;
        println!("{rendered}");
        return Ok(());
    }
    for (identifier, value) in session.current_configuration() {
        println!("{identifier}={value}");
    }
    match MidiPreferences::from_map(session.configuration()) {
        Ok(prefs) => info!(
            enabled = prefs.enabled,
            interface = ?prefs.interface,
            channel = prefs.global_channel,
            "MIDI preferences"
        ),
        Err(err) => warn!(%err, "invalid MIDI preference"),
    }
    Ok(())
}

fn execute_template(global: &GlobalArgs, args: TemplateArgs) -> Result<()> {
    let session = open_session(global, LearnOptions::default(), MidirBackend::default())?;
    session
        .write_template(&args.out)
        .with_context(|| format!("failed to write template {}", args.out.display()))?;
    println!("wrote {}", args.out.display());
    Ok(())
}

fn execute_export(global: &GlobalArgs) -> Result<()> {
    let path = settings_path(global)?;
    let mut session = open_session(global, LearnOptions::default(), MidirBackend::default())?;
    import_existing(&mut session, &path)?;
    session
        .export_settings(&path)
        .with_context(|| format!("failed to export {}", path.display()))?;
    println!("exported {}", path.display());
    Ok(())
}

fn execute_learn(global: &GlobalArgs, args: LearnArgs) -> Result<()> {
    let path = settings_path(global)?;
    let learn = LearnOptions {
        timeout: Duration::from_secs(args.timeout),
    };
    let mut session = open_session(global, learn, MidirBackend::default())?;
    import_existing(&mut session, &path)?;
    if let Some(device) = args.device {
        session.set_device(device);
    }
    println!("press a control for {}", session.action_label(&args.action));
    let signal = session.learn(&args.action)?;
    println!("{signal}");
    if let LearnSignal::BindingApplied { .. } = signal {
        session
            .export_settings(&path)
            .with_context(|| format!("failed to export {}", path.display()))?;
    }
    Ok(())
}

fn execute_send(global: &GlobalArgs, args: SendArgs) -> Result<()> {
    let path = settings_path(global)?;
    let mut backend = MidirBackend::default();
    if let Some(output) = &args.output {
        backend = backend.with_output_hint(output.clone());
    }
    let mut session = open_session(global, LearnOptions::default(), backend)?;
    import_existing(&mut session, &path)?;
    session.send_binding(&args.action)?;
    println!("sent {}", args.action);
    Ok(())
}

fn execute_prefs(global: &GlobalArgs, args: PrefsArgs) -> Result<()> {
    let path = settings_path(global)?;
    let mut session = open_session(global, LearnOptions::default(), MidirBackend::default())?;
    import_existing(&mut session, &path)?;
    let map = session.configuration_mut();
    let mut changed = false;
    if let Some(enabled) = args.enabled {
        changed |= set_enabled(map, enabled);
    }
    if let Some(interface) = &args.interface {
        changed |= set_interface(map, interface);
    }
    if let Some(channel) = args.channel {
        changed |= set_global_channel(map, channel)?;
    }
    if !changed {
        warn!("no declared MIDI preference was changed");
        return Ok(());
    }
    session
        .export_settings(&path)
        .with_context(|| format!("failed to export {}", path.display()))?;
    let prefs = MidiPreferences::from_map(session.configuration())?;
    println!(
        "enabled={} interface={} channel={}",
        prefs.enabled,
        prefs.interface.as_deref().unwrap_or("-"),
        prefs.global_channel
    );
    Ok(())
}
