use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use commute_core::transit::{ArrivalEstimator, Coordinate, StaticCatalog, SystemClock};
use commute_core::{spawn_live_board, BoardEntry};
use rand::rngs::StdRng;

use crate::print_json;

pub struct BoardOptions {
    pub origin: Coordinate,
    pub radius_meters: f64,
    pub interval_secs: u64,
    /// 0 keeps refreshing until Ctrl-C
    pub refreshes: u32,
}

fn print_board(board: &[BoardEntry]) -> Result<()> {
    if board.is_empty() {
        tracing::warn!("No stops in range");
    }
    print_json(&board)
}

pub fn run(
    catalog: StaticCatalog,
    options: BoardOptions,
    estimator: ArrivalEstimator<StdRng, SystemClock>,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(watch(catalog, options, estimator))
}

/// Print the board, then each refresh, until the requested count is reached
/// or the user interrupts.
async fn watch(
    catalog: StaticCatalog,
    options: BoardOptions,
    estimator: ArrivalEstimator<StdRng, SystemClock>,
) -> Result<()> {
    let mut board = spawn_live_board(
        Arc::new(catalog),
        options.origin,
        options.radius_meters,
        Duration::from_secs(options.interval_secs),
        estimator,
    )?;

    print_board(&board.latest())?;

    let mut printed = 0;
    while options.refreshes == 0 || printed < options.refreshes {
        tokio::select! {
            next = board.changed() => match next {
                Some(snapshot) => print_board(&snapshot)?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
        printed += 1;
    }

    board.cancel();
    Ok(())
}
