use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    cycler::cycle_once,
    host::{AlarmScheduler, ConsumerHub, CYCLE_ALARM},
    info,
    model::{find_group, StateSnapshot},
    store::{KeyValueStore, StateStore},
    warn,
};

const MS_PER_MINUTE: u64 = 60_000;

/// Requests the background answers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Request {
    GetState,
    SetActiveGroup {
        #[serde(rename = "groupId")]
        group_id: String,
    },
    Next,
}

impl Request {
    /// `None` for anything that isn't one of the three known shapes.
    pub fn parse(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response {
    State(StateSnapshot),
    Ack { ok: bool },
}

impl Response {
    pub fn ack(ok: bool) -> Self {
        Response::Ack { ok }
    }
}

/// Alarm period for a group interval. The timer only has minute resolution,
/// so anything under a minute gets no alarm at all.
pub fn timer_period_minutes(interval_ms: u64) -> Option<u64> {
    if interval_ms < MS_PER_MINUTE {
        return None;
    }
    Some((interval_ms / MS_PER_MINUTE).max(1))
}

/// Parses and answers one raw message. Unrecognised shapes get no response.
pub fn dispatch<S, A, H>(
    message: &Value,
    store: &mut StateStore<S>,
    alarms: &mut A,
    hub: &H,
) -> Result<Option<Response>>
where
    S: KeyValueStore,
    A: AlarmScheduler + ?Sized,
    H: ConsumerHub + ?Sized,
{
    let Some(request) = Request::parse(message) else {
        return Ok(None);
    };
    handle(&request, store, alarms, hub).map(Some)
}

pub fn handle<S, A, H>(
    request: &Request,
    store: &mut StateStore<S>,
    alarms: &mut A,
    hub: &H,
) -> Result<Response>
where
    S: KeyValueStore,
    A: AlarmScheduler + ?Sized,
    H: ConsumerHub + ?Sized,
{
    match request {
        Request::GetState => Ok(Response::State(store.snapshot()?)),
        Request::SetActiveGroup { group_id } => {
            set_active_group(group_id, store, alarms)?;
            Ok(Response::ack(true))
        }
        Request::Next => {
            let shown = cycle_once(store, hub)?;
            Ok(Response::ack(shown.is_some()))
        }
    }
}

fn set_active_group<S, A>(group_id: &str, store: &mut StateStore<S>, alarms: &mut A) -> Result<()>
where
    S: KeyValueStore,
    A: AlarmScheduler + ?Sized,
{
    store.set_active_group_id(group_id)?;

    store.ensure_group_index(group_id)?;

    let groups = store.groups()?;
    let Some(group) = find_group(&groups, group_id) else {
        warn!("[ROUTER] Active group set to unknown id '{}'; no alarm installed", group_id);
        return Ok(());
    };

    match timer_period_minutes(group.interval_ms) {
        Some(minutes) => alarms.create(CYCLE_ALARM, minutes),
        None => info!(
            "[ROUTER] Group '{}' interval {}ms is below one minute; not scheduling",
            group_id, group.interval_ms
        ),
    }
    Ok(())
}

/// Timers don't survive a restart; reinstall the one the active group wants.
pub fn restore_cycle_alarm<S, A>(store: &StateStore<S>, alarms: &mut A) -> Result<Option<u64>>
where
    S: KeyValueStore,
    A: AlarmScheduler + ?Sized,
{
    let snapshot = store.snapshot()?;
    let minutes = snapshot
        .active_group()
        .and_then(|g| timer_period_minutes(g.interval_ms));
    if let Some(minutes) = minutes {
        alarms.create(CYCLE_ALARM, minutes);
    }
    Ok(minutes)
}
