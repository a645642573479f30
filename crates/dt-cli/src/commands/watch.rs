//! Live mode: periodic pipeline runs and a self-updating view of today.

use std::io::{BufRead, Write};

use anyhow::Result;
use chrono::Local;
use dt_core::{Clock, DayBounds, SystemClock};
use dt_db::SharedDatabase;
use dt_pipeline::{Collaborators, DayView, Pipeline, PipelineRunner, RunTrigger};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::slots::format_slots;
use crate::Config;

/// Runs until Ctrl-C.
///
/// The pipeline runs on a fixed interval and whenever Enter is pressed;
/// Enter also refreshes the view. The view follows the local day that was
/// current at startup.
pub async fn run(db: SharedDatabase, config: &Config) -> Result<()> {
    let cancel = CancellationToken::new();
    let pipeline = Pipeline::new(
        Collaborators::from_backend(&db, SystemClock),
        config.pipeline.clone(),
    );
    let notifications = pipeline.subscribe();

    let pipeline = &pipeline;
    let runner = PipelineRunner::new(move || pipeline.run(), cancel.clone());
    let trigger = runner.trigger();

    let day = DayBounds::containing(SystemClock.now(), &Local);
    let view = DayView::new(db, SystemClock, day, config.view.clone());
    let (foreground_tx, foreground_rx) = mpsc::channel(1);
    let (updates_tx, mut updates_rx) = watch::channel(Vec::new());

    spawn_stdin_reader(trigger.clone(), foreground_tx);

    let schedule = async {
        let mut interval = tokio::time::interval(config.run_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => trigger.trigger(),
            }
        }
    };

    let printer = async {
        while updates_rx.changed().await.is_ok() {
            let slots = updates_rx.borrow_and_update().clone();
            let mut stdout = std::io::stdout().lock();
            let _ = writeln!(stdout);
            let _ = write!(stdout, "{}", format_slots(&day, &slots, &Local));
            let _ = stdout.flush();
        }
    };

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(%err, "failed to listen for Ctrl-C");
        }
        cancel.cancel();
    };

    let (stats, (), (), (), ()) = tokio::join!(
        runner.serve(),
        view.watch(notifications, foreground_rx, updates_tx, cancel.clone()),
        schedule,
        printer,
        shutdown,
    );

    println!(
        "Stopped after {} runs ({} failed)",
        stats.succeeded + stats.failed,
        stats.failed
    );
    Ok(())
}

/// Reads stdin on a plain thread so a pending read never holds up runtime
/// shutdown. Each line requests a run and a view refresh.
fn spawn_stdin_reader(trigger: RunTrigger, foreground: mpsc::Sender<()>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if line.is_err() {
                break;
            }
            trigger.trigger();
            // A refresh already pending covers this one.
            let _ = foreground.try_send(());
        }
    });
}
