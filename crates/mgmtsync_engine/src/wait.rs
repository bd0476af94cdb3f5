//! Blocking wait for a group's task server to go idle.

use crate::error::{ReconcileError, ReconcileResult};
use crate::kind::append_param;
use crate::listing::ListingAccessor;
use crate::receipt::WaitOutcome;
use mgmtsync_payload::Predicate;
use mgmtsync_transport::ManageClient;
use std::time::Duration;
use tracing::{info, warn};

/// Task server listing.
pub const TASK_SERVERS_PATH: &str = "/manage/v2/task-servers";
/// Request listing, filtered by server.
pub const REQUESTS_PATH: &str = "/manage/v2/requests";

/// Pauses the calling thread between polls.
pub trait Sleeper: Send + Sync {
    /// Sleeps for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Sleeps with [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Blocks until no requests are running on the task server of `group`.
///
/// When the group has no task server the wait returns
/// [`WaitOutcome::GroupUnresolved`] at once without polling. There is no upper
/// bound on the total wait.
pub fn wait_for_group_completion(
    client: &ManageClient,
    group: &str,
    interval: Duration,
    sleeper: &dyn Sleeper,
) -> ReconcileResult<WaitOutcome> {
    let listing = ListingAccessor::new(client, false);
    let servers = listing.find_matching_identities(
        TASK_SERVERS_PATH,
        &Predicate::eq("groupnameref", group),
    )?;

    let Some(server_id) = servers.into_iter().next() else {
        let unresolved = ReconcileError::UnresolvableGroupReference {
            group: group.to_string(),
        };
        warn!("{}, so not waiting for tasks to complete", unresolved);
        return Ok(WaitOutcome::GroupUnresolved);
    };

    let path = append_param(REQUESTS_PATH, "server-id", &server_id);
    info!("Waiting for tasks to complete on task server {}", server_id);

    let mut polls = 0u64;
    loop {
        let count = request_count(&listing, &path)?;
        polls = polls.saturating_add(1);
        if count == 0 {
            break;
        }
        info!("Waiting for tasks to complete on task server, count: {}", count);
        sleeper.sleep(interval);
    }

    info!("Finished waiting for tasks to complete on task server");
    Ok(WaitOutcome::Completed { polls })
}

fn request_count(listing: &ListingAccessor<'_>, path: &str) -> ReconcileResult<u64> {
    listing
        .snapshot(path)?
        .list_count()
        .ok_or_else(|| ReconcileError::InvalidListing(format!("{path}: no list-count")))
}
