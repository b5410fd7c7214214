//! Forwarding of worker stdout and stderr to the log.

use std::io::{BufRead, BufReader, Read};
use std::thread;

use tracing::{info, warn};

use btrmount_protocol::InstanceId;

use super::SUPERVISOR_TARGET;

/// Spawns a thread that logs every line read from `pipe`.
///
/// A missing pipe or a failed thread spawn is logged and otherwise ignored.
pub(super) fn capture<R>(instance: InstanceId, stream: &'static str, pipe: Option<R>)
where
    R: Read + Send + 'static,
{
    let Some(pipe) = pipe else {
        warn!(
            target: SUPERVISOR_TARGET,
            %instance,
            stream,
            "worker output pipe unavailable"
        );
        return;
    };
    let spawned = thread::Builder::new()
        .name(format!("worker-{instance}-{stream}"))
        .spawn(move || forward_lines(instance, stream, BufReader::new(pipe)));
    if let Err(error) = spawned {
        warn!(
            target: SUPERVISOR_TARGET,
            %instance,
            stream,
            %error,
            "failed to start worker output capture"
        );
    }
}

fn forward_lines<R: BufRead>(instance: InstanceId, stream: &'static str, mut reader: R) {
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                info!(
                    target: SUPERVISOR_TARGET,
                    %instance,
                    stream,
                    line = %text.trim_end_matches(['\r', '\n']),
                    "worker output"
                );
            }
            Err(error) => {
                warn!(
                    target: SUPERVISOR_TARGET,
                    %instance,
                    stream,
                    %error,
                    "worker output capture stopped"
                );
                break;
            }
        }
    }
}
