//! Wait command implementation.

use crate::error::CliResult;
use mgmtsync_engine::{wait_for_group_completion, ThreadSleeper, WaitOutcome};
use mgmtsync_transport::ManageClient;
use std::time::Duration;

/// Blocks until the task server of `group` is idle.
pub fn run(client: &ManageClient, group: &str, interval: Duration) -> CliResult<WaitOutcome> {
    let outcome = wait_for_group_completion(client, group, interval, &ThreadSleeper)?;
    match outcome {
        WaitOutcome::Completed { polls } => {
            println!("✓ Tasks in group {group} finished after {polls} checks");
        }
        WaitOutcome::GroupUnresolved => println!("no task server for group {group}"),
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::fake;

    #[test]
    fn idle_server_returns_after_one_poll() {
        let (server, client) = fake();
        server.add_task_server("7001", "Default");
        assert_eq!(
            run(&client, "Default", Duration::from_millis(1)).unwrap(),
            WaitOutcome::Completed { polls: 1 }
        );
    }

    #[test]
    fn unknown_group_is_not_an_error() {
        let (_server, client) = fake();
        assert_eq!(
            run(&client, "Evaluator", Duration::from_millis(1)).unwrap(),
            WaitOutcome::GroupUnresolved
        );
    }
}
