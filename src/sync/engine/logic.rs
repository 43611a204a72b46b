use crate::model::command::CommandResult;
use crate::model::event::XEvent;
use crate::sync::engine::delta::{ChangeNotification, EventDelta};
use crate::sync::engine::mapper::EventMapper;
use crate::sync::engine::state::SynchronizedModel;
use crate::sync::engine::sync_log::{LocalChange, SyncLogEntry};
use crate::sync::engine::types::{RoundError, RoundOutcome, RoundRequest, SyncOutcome};

pub fn start_round(model: &SynchronizedModel) -> RoundRequest {
    let commands: Vec<_> = model
        .sync_log
        .local_changes()
        .iter()
        .map(|c| c.command.clone())
        .collect();
    let begin_revision = model.sync_log.synchronized_revision() + 1;

    log::debug!(
        "[ENGINE] {} round: {} commands, events from r{}",
        model.address(),
        commands.len(),
        begin_revision
    );
    RoundRequest {
        commands,
        begin_revision,
    }
}

fn validate(
    model: &SynchronizedModel,
    batch_len: usize,
    results: &[CommandResult],
    events: &[XEvent],
) -> Result<(), RoundError> {
    let pending = model.sync_log.local_changes().len();
    if batch_len > pending {
        return Err(RoundError::BatchTooLarge {
            batch: batch_len,
            pending,
        });
    }
    if results.len() != batch_len {
        return Err(RoundError::ResultCount {
            expected: batch_len,
            actual: results.len(),
        });
    }

    let first = model.sync_log.synchronized_revision() + 1;
    for (index, event) in events.iter().enumerate() {
        let expected = first + index as u64;
        if event.revision != expected {
            return Err(RoundError::EventGap {
                index,
                expected,
                actual: event.revision,
            });
        }
    }
    Ok(())
}

/// Merges the server's answer into the replica.
///
/// The first `batch_len` pending changes are the ones that were sent;
/// anything queued after them is replayed on top of the merged state.
/// `on_result` sees every server event and every unconfirmed local event
/// before the snapshot changes. Nothing is mutated if the response is
/// inconsistent with the replica.
pub fn continue_sync(
    model: &mut SynchronizedModel,
    batch_len: usize,
    results: &[CommandResult],
    events: &[XEvent],
    mapper: &dyn EventMapper,
    on_result: &mut dyn FnMut(&XEvent, SyncOutcome),
) -> Result<RoundOutcome, RoundError> {
    validate(model, batch_len, results, events)?;

    let sync_revision = model.sync_log.synchronized_revision();
    let local_events: Vec<XEvent> = model
        .sync_log
        .local_changes()
        .iter()
        .map(|c| c.event.clone())
        .collect();

    // a + b
    let mut delta = EventDelta::new();
    for event in events {
        delta.add_event(event);
    }
    for event in local_events.iter().rev() {
        delta.add_inverse_event(event);
    }

    // c
    let mapping = mapper.map_events(&local_events[..batch_len], events);

    // d
    for event in events {
        on_result(event, SyncOutcome::Confirmed);
    }
    for &index in &mapping.unmapped {
        on_result(&local_events[index], SyncOutcome::Rejected);
    }

    // e + f
    let mut changes = delta.apply_to(&mut model.snapshot);
    for event in events {
        model.snapshot.propagate_revision(event);
    }
    let new_revision = events.last().map_or(sync_revision, |e| e.revision);
    model.snapshot.set_revision(new_revision);

    // g
    model.sync_log.truncate_to_revision(sync_revision)?;
    for (server_index, event) in events.iter().enumerate() {
        let command = mapping
            .local_index_of(server_index)
            .and_then(|l| model.sync_log.local_changes().get(l))
            .map(|change| change.command.clone());
        model.sync_log.append_entry(SyncLogEntry {
            event: event.clone(),
            command,
        })?;
    }
    model.sync_log.set_synchronized_revision(new_revision)?;

    // h
    let mut outcome = RoundOutcome::default();
    for index in (0..batch_len).rev() {
        let Some(change) = model.sync_log.remove_local_change(index) else {
            continue;
        };
        let result = results[index];
        match result {
            CommandResult::Failed => outcome.report.failed += 1,
            CommandResult::NoChange => outcome.report.no_change += 1,
            CommandResult::Applied(_) => outcome.report.applied += 1,
        }
        outcome.completed.push((change, result));
    }

    for change in model.sync_log.clear_local_changes() {
        let (result, event) = model.snapshot.execute(&change.actor, &change.command);
        let Some(event) = event else {
            log::debug!(
                "[ENGINE] {} dropped on replay: {:?}",
                change.command.target(),
                result
            );
            outcome.dropped.push((change, result));
            continue;
        };
        changes.extend(ChangeNotification::for_event(&event));
        model.sync_log.append_entry(SyncLogEntry {
            event: event.clone(),
            command: Some(change.command.clone()),
        })?;
        model.sync_log.append_local_change(LocalChange { event, ..change });
        outcome.report.rebased += 1;
    }

    outcome.report.server_events = events.len();
    outcome.report.synchronized_revision = new_revision;
    outcome.report.sync_lost = events.is_empty() && results.iter().any(CommandResult::is_failed);
    if outcome.report.sync_lost {
        log::warn!(
            "[ENGINE] {}: command failed but no server events returned, replica may be out of sync",
            model.address()
        );
    }
    outcome.changes = changes;

    log::debug!(
        "[ENGINE] {} synced to r{}: {} applied, {} no-change, {} failed, {} rebased",
        model.address(),
        new_revision,
        outcome.report.applied,
        outcome.report.no_change,
        outcome.report.failed,
        outcome.report.rebased
    );
    Ok(outcome)
}
