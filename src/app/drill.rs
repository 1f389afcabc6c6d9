//! Shutdown drill workload
//!
//! Simulated cleanup steps (direct finalizers that sleep) and background
//! workers that own their shutdown through a rendezvous registration.

use super::cli::StepSpec;
use crate::finalizer::api::{Finalizer, FinalizerError, FinalizerId, FinalizerResult, WaitError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How often an idle worker reports that it is alive
pub const HEARTBEAT: Duration = Duration::from_millis(500);

/// Register one sleeping finalizer per step, in order
pub fn register_steps(finalizer: &Finalizer, steps: &[StepSpec]) -> FinalizerResult<Vec<FinalizerId>> {
    steps
        .iter()
        .map(|step| {
            let name = step.name.clone();
            let duration = step.duration;
            finalizer.add(move || {
                log::info!("step '{}' running ({:?})", name, duration);
                thread::sleep(duration);
                log::info!("step '{}' finished", name);
            })
        })
        .collect()
}

/// Start a worker thread that stops when the finalizer drains it
///
/// The worker takes `worker.duration` to stop once asked. It also exits,
/// without cleanup, when its registration is removed.
pub fn spawn_worker(
    finalizer: &Finalizer,
    worker: StepSpec,
    heartbeat: Duration,
) -> FinalizerResult<JoinHandle<()>> {
    let stop = finalizer.add_rendezvous()?;
    let name = worker.name.clone();

    let spawned = thread::Builder::new()
        .name(format!("worker-{}", worker.name))
        .spawn(move || {
            let mut beats = 0u64;
            loop {
                match stop.wait_timeout(heartbeat) {
                    Ok(completion) => {
                        log::info!("worker '{}' stopping after {} heartbeat(s)", worker.name, beats);
                        thread::sleep(worker.duration);
                        completion.done();
                        log::info!("worker '{}' stopped", worker.name);
                        return;
                    }
                    Err(WaitError::Empty) => {
                        beats += 1;
                        log::debug!("worker '{}' heartbeat {}", worker.name, beats);
                    }
                    Err(WaitError::Closed) => {
                        log::debug!("worker '{}' deregistered", worker.name);
                        return;
                    }
                }
            }
        });

    spawned.map_err(|e| FinalizerError::Spawn {
        origin: format!("worker '{}'", name),
        message: e.to_string(),
    })
}
