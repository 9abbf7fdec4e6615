/// Flow Sim: runs a flow asset against a seeded, jittery frame clock and
/// prints every output the flow fires.
///
/// Usage: flow_sim <asset.ron> [--settings <settings.ron>] [--seed <n>]
///        [--frames <n>] [--min-dt <s>] [--max-dt <s>]
///        [--actor <name>=<Tag.A,Tag.B>@<frame>]... [--save-at <frame>] [--save-to <path>]
///
/// `--save-at` saves the flow mid-run, drops it together with its timer
/// queue, and resumes from the save record on a fresh queue.
use clap::Parser;
use narrative_flow::core::flow::{FlowInstance, FlowState, FlowWorld};
use narrative_flow::core::scheduler::TimerQueue;
use narrative_flow::schema::asset::FlowAsset;
use narrative_flow::schema::ids::ActorId;
use narrative_flow::schema::pin::FiredOutput;
use narrative_flow::schema::settings::FlowSettings;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::filter::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Run a narrative flow asset on a simulated frame clock")]
struct Cli {
    /// Flow asset to run.
    asset: PathBuf,
    /// Runtime settings (defaults apply when omitted).
    #[arg(long)]
    settings: Option<PathBuf>,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, default_value_t = 600)]
    frames: u32,
    /// Shortest simulated frame, in seconds.
    #[arg(long, default_value_t = 0.008)]
    min_dt: f32,
    /// Longest simulated frame, in seconds.
    #[arg(long, default_value_t = 0.033)]
    max_dt: f32,
    /// Register an actor at a frame, e.g. `raptor=Enemy.Raptor@30`.
    #[arg(long = "actor", value_parser = parse_spawn)]
    actors: Vec<ActorSpawn>,
    /// Save and reload the flow after this frame.
    #[arg(long)]
    save_at: Option<u32>,
    /// Write the save record here when saving.
    #[arg(long)]
    save_to: Option<PathBuf>,
}

#[derive(Debug, Clone)]
struct ActorSpawn {
    name: String,
    tags: Vec<String>,
    frame: u32,
}

fn parse_spawn(input: &str) -> Result<ActorSpawn, String> {
    let (name, rest) = input
        .split_once('=')
        .ok_or_else(|| format!("expected <name>=<tags>@<frame>, got '{}'", input))?;
    let (tags, frame) = match rest.rsplit_once('@') {
        Some((tags, frame)) => (
            tags,
            frame
                .parse()
                .map_err(|_| format!("invalid frame '{}'", frame))?,
        ),
        None => (rest, 0),
    };
    Ok(ActorSpawn {
        name: name.to_string(),
        tags: tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        frame,
    })
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn print_fired(fired: &[FiredOutput], frame: u32, base_time: f64) {
    for output in fired {
        println!(
            "[frame {:>5} | t={:>8.3}s] {} -> {}",
            frame,
            base_time + output.time,
            output.node,
            output.pin
        );
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if !(cli.min_dt > 0.0 && cli.min_dt <= cli.max_dt) {
        return Err(format!(
            "frame range must satisfy 0 < min-dt <= max-dt (got {}..{})",
            cli.min_dt, cli.max_dt
        )
        .into());
    }

    let asset = FlowAsset::load_from_ron(&cli.asset)?;
    let settings = match &cli.settings {
        Some(path) => FlowSettings::load_from_ron(path)?,
        None => FlowSettings::default(),
    };

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let mut world = FlowWorld::new();
    let mut flow = FlowInstance::new(&asset, settings.clone())?;
    // Queue time restarts at zero after a reload.
    let mut base_time = 0.0f64;
    let mut next_actor = 1u64;

    info!(asset = %asset.name, seed = cli.seed, frames = cli.frames, "simulation starting");
    flow.start(&mut world)?;
    print_fired(&flow.drain_fired(), 0, base_time);

    for frame in 1..=cli.frames {
        for spawn in cli.actors.iter().filter(|s| s.frame == frame) {
            let tags: Vec<&str> = spawn.tags.iter().map(String::as_str).collect();
            world.actors.register(ActorId(next_actor), &spawn.name, &tags);
            next_actor += 1;
        }

        let dt = rng.gen_range(cli.min_dt..=cli.max_dt);
        flow.tick(&mut world, dt);
        print_fired(&flow.drain_fired(), frame, base_time);

        for message in flow.drain_messages() {
            println!("[frame {:>5}] {:?}: {}", frame, message.severity, message.text);
        }

        if flow.state() == FlowState::Finished {
            info!(frame, "flow finished");
            return Ok(());
        }

        if cli.save_at == Some(frame) {
            let save = flow.save(&mut world);
            if let Some(path) = &cli.save_to {
                save.save_to_file(path)?;
                info!(path = %path.display(), "save written");
            }

            base_time += world.timers.now();
            world.timers = TimerQueue::new();
            flow = FlowInstance::load(&asset, settings.clone(), &save, &mut world)?;
            println!("[frame {:>5}] reloaded {} active node(s)", frame, save.nodes.len());
            print_fired(&flow.drain_fired(), frame, base_time);
        }
    }

    info!(frames = cli.frames, "frame budget exhausted");
    Ok(())
}

fn main() -> ExitCode {
    init_logging();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
