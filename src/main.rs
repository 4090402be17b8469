use anyhow::{Context, Result};
use par_autorun::cli;
use par_autorun::{Engine, EngineError, ExecutionState, OwnerKey};
use std::io::Write;
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    // Process CLI arguments first (before logging init for cleaner output)
    let options = match cli::process_cli() {
        cli::CliResult::Exit(code) => {
            if code == 0 {
                return Ok(());
            }
            std::process::exit(code);
        }
        cli::CliResult::Continue(options) => options,
    };
    // CLI --log-level flag takes highest precedence, then RUST_LOG, then config.
    par_autorun::debug::init_log_bridge(options.log_level);

    let config = options.load_config()?;
    par_autorun::debug::apply_config_level(options.log_level, config.log_level.to_level_filter());
    log::info!("Starting par-autorun {}", par_autorun::VERSION);

    let commands = par_autorun::load_script(&options.script)?;

    let engine = Engine::builder(config.clone())
        .printer(|_owner, line| {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(line.as_bytes());
            let _ = stdout.flush();
        })
        .build();
    let owner = OwnerKey::new(&options.owner);
    engine.enqueue(&owner, commands);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;
    let tick = Duration::from_millis(config.engine.tick_interval_ms);
    let drain = Duration::from_millis(options.drain_ms);
    let result = runtime.block_on(drive(&engine, &owner, tick, drain));

    engine.remove(&owner);
    match result {
        Ok(state) => {
            log::info!("Finished with state {:?}", state);
            Ok(())
        }
        Err(e) => {
            log::error!("Run failed: {}", e);
            Err(e.into())
        }
    }
}

/// Step `owner` on every tick until its queue ends, then keep printing shell
/// output until it has been quiet for `drain`.
async fn drive(
    engine: &Engine,
    owner: &OwnerKey,
    tick: Duration,
    drain: Duration,
) -> Result<ExecutionState, EngineError> {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if !engine.step(owner)? {
                    break;
                }
            }
            _ = &mut ctrl_c, if !interrupted => {
                log::warn!("Interrupted, cancelling '{}'", owner);
                interrupted = true;
                engine.cancel(owner)?;
            }
        }
    }

    let mut quiet_since = Instant::now();
    while quiet_since.elapsed() < drain {
        interval.tick().await;
        if !engine.poll_output(owner)?.is_empty() {
            quiet_since = Instant::now();
        }
    }
    Ok(engine.state(owner))
}
