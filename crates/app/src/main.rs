use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use virtual_temple_core::{
    AppConfig, ChoreoEvent, DeityId, Direction, FlowerChoice, FlowerKind, JsonFileGateway,
    PlacementControl, RitualAction, SimulatedAudioDevice, TempleError, TempleStage, UserId,
};

/// Simulation step used when running animations to completion.
const FRAME_MS: u64 = 50;

fn main() -> virtual_temple_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    config.validate()?;

    let mut gateway = JsonFileGateway::new(&cli.store);
    let user = UserId::new(cli.user.clone());
    let stage = TempleStage::mount(
        config,
        user,
        &mut gateway,
        SimulatedAudioDevice::new().with_music(),
    )?;

    match cli.command {
        Commands::Shower { flower, duration_ms } => run_action(
            stage,
            RitualAction::DropFlowers(flower),
            duration_ms,
        ),
        Commands::Bells {
            double,
            duration_ms,
        } => run_action(
            stage,
            RitualAction::RingBells { double_ring: double },
            duration_ms,
        ),
        Commands::Ritual { duration_ms } => {
            run_action(stage, RitualAction::PerformRitual, duration_ms)
        }
        Commands::Compose(args) => run_compose(stage, &mut gateway, args),
        Commands::Show => run_show(stage, &cli.store),
    }
}

fn run_action(
    mut stage: TempleStage<SimulatedAudioDevice>,
    action: RitualAction,
    duration_ms: u64,
) -> virtual_temple_core::Result<()> {
    tracing::info!(?action, duration_ms, "performing ritual action");
    if !stage.perform(action)? {
        tracing::warn!(?action, "action ignored, animation already running");
    }
    tracing::info!(actors = stage.actors().len(), "actors spawned");

    let mut elapsed = 0;
    while elapsed < duration_ms {
        let slice = FRAME_MS.min(duration_ms - elapsed);
        for event in stage.advance(slice) {
            log_event(stage.now(), &event);
        }
        elapsed += slice;
    }

    for notice in stage.notices() {
        tracing::warn!(kind = ?notice.kind, "{}", notice.message);
    }
    let device = stage.unmount();
    tracing::info!(
        events = device.events().len(),
        max_concurrent = device.max_concurrent(),
        "audio device summary"
    );
    Ok(())
}

fn run_compose(
    mut stage: TempleStage<SimulatedAudioDevice>,
    gateway: &mut JsonFileGateway,
    args: ComposeArgs,
) -> virtual_temple_core::Result<()> {
    let backdrop = match &args.backdrop {
        Some(id) => Some(
            stage
                .catalog()
                .backdrop(id)
                .map(|backdrop| backdrop.colors.clone())
                .ok_or_else(|| TempleError::msg(format!("unknown backdrop `{id}`")))?,
        ),
        None => None,
    };

    let wizard = stage.begin_editing();
    if let Some(colors) = backdrop {
        wizard.choose_backdrop(colors)?;
    }
    stage.next_step()?;
    if let Some(style) = &args.style {
        if stage.catalog().style(style).is_none() {
            return Err(TempleError::msg(format!("unknown temple style `{style}`")));
        }
        if let Some(wizard) = stage.wizard_mut() {
            wizard.choose_style(style.clone());
        }
    }
    stage.next_step()?;

    for entry in &args.deities {
        let (deity, artwork) = match entry.split_once(':') {
            Some((deity, artwork)) => (deity.to_string(), artwork.to_string()),
            None => (entry.clone(), format!("{entry}_1")),
        };
        let id = stage.select_deity(&DeityId::new(deity), &artwork)?;
        tracing::info!(entity = %id, %artwork, "deity placed");
    }
    stage.next_step()?;

    let now = stage.now();
    if let Some(wizard) = stage.wizard_mut() {
        let target = wizard.placement().entities().first().map(|entity| entity.entity_id);
        if let Some(target) = target {
            wizard.select_target(target);
        }
        for adjustment in &args.adjust {
            let control = adjustment.control();
            if !wizard.press(control, now) {
                tracing::warn!(?control, "no entity to adjust");
            }
            wizard.release(control);
        }
    }

    stage.save(gateway)?;
    let scene = stage.scene();
    tracing::info!(
        entities = scene.entities.len(),
        style = %scene.temple_style,
        path = %gateway.path_for(stage.user()).display(),
        "temple saved"
    );
    stage.unmount();
    Ok(())
}

fn run_show(stage: TempleStage<SimulatedAudioDevice>, store: &Path) -> virtual_temple_core::Result<()> {
    tracing::info!(store = %store.display(), "showing saved temple");
    let scene = stage.scene();
    println!("{}", serde_json::to_string_pretty(&scene)?);
    stage.unmount();
    Ok(())
}

fn log_event(now: u64, event: &ChoreoEvent) {
    match event {
        ChoreoEvent::BellPhaseEntered { .. } => tracing::debug!(now, ?event, "choreography"),
        _ => tracing::info!(now, ?event, "choreography"),
    }
}

fn parse_flower(raw: &str) -> Result<FlowerChoice, String> {
    let raw = raw.trim().to_ascii_lowercase();
    if raw == "mixed" {
        return Ok(FlowerChoice::Mixed);
    }
    FlowerKind::PALETTE
        .into_iter()
        .find(|kind| kind.asset_key().trim_start_matches("flower_") == raw)
        .map(FlowerChoice::Single)
        .ok_or_else(|| format!("unknown flower `{raw}`"))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Virtual temple simulator", long_about = None)]
struct Cli {
    /// JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Seed for particle jitter and mixed flowers.
    #[arg(long, global = true)]
    seed: Option<u64>,
    /// Directory holding saved temples.
    #[arg(long, global = true, default_value = ".temple")]
    store: PathBuf,
    /// User whose temple is loaded.
    #[arg(short, long, global = true, default_value = "devotee")]
    user: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drop a shower of flowers over the temple.
    Shower {
        /// Flower kind, or `mixed`.
        #[arg(short, long, default_value = "marigold", value_parser = parse_flower)]
        flower: FlowerChoice,
        #[arg(long, default_value_t = 8_000)]
        duration_ms: u64,
    },
    /// Swing the two temple bells.
    Bells {
        /// Ring twice.
        #[arg(long)]
        double: bool,
        #[arg(long, default_value_t = 3_000)]
        duration_ms: u64,
    },
    /// Circle the offering tray around the sanctum.
    Ritual {
        #[arg(long, default_value_t = 9_000)]
        duration_ms: u64,
    },
    /// Compose a temple in the wizard and save it.
    Compose(ComposeArgs),
    /// Print the saved temple laid out on the configured screen.
    Show,
}

#[derive(clap::Args, Debug)]
struct ComposeArgs {
    /// Backdrop id from the catalog.
    #[arg(long)]
    backdrop: Option<String>,
    /// Temple style id from the catalog.
    #[arg(long)]
    style: Option<String>,
    /// Deity to place, as `deity` or `deity:artwork`. Up to three.
    #[arg(short, long = "deity", required = true)]
    deities: Vec<String>,
    /// Adjustments applied to the first deity, in order.
    #[arg(long, value_enum)]
    adjust: Vec<Adjustment>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Adjustment {
    Grow,
    Shrink,
    Up,
    Down,
    Left,
    Right,
}

impl Adjustment {
    fn control(self) -> PlacementControl {
        match self {
            Self::Grow => PlacementControl::Grow,
            Self::Shrink => PlacementControl::Shrink,
            Self::Up => PlacementControl::Nudge(Direction::Up),
            Self::Down => PlacementControl::Nudge(Direction::Down),
            Self::Left => PlacementControl::Nudge(Direction::Left),
            Self::Right => PlacementControl::Nudge(Direction::Right),
        }
    }
}
