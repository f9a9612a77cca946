use anyhow::Result;

use crate::{
    host::{Broadcast, ConsumerHub, CYCLE_ALARM},
    info,
    model::find_group,
    rotator::next_index,
    store::{KeyValueStore, StateStore},
    warn,
};

/// Alarm entry point. Only the `cycle` alarm advances anything.
pub fn on_alarm<S, H>(name: &str, store: &mut StateStore<S>, hub: &H) -> Result<Option<String>>
where
    S: KeyValueStore,
    H: ConsumerHub + ?Sized,
{
    if name != CYCLE_ALARM {
        return Ok(None);
    }
    cycle_once(store, hub)
}

/// Moves the active group one image forward, persists the new offset and
/// pushes the image to every consumer. Returns the URL shown, or `None` when
/// there is no active group or it has no images (nothing is written then).
pub fn cycle_once<S, H>(store: &mut StateStore<S>, hub: &H) -> Result<Option<String>>
where
    S: KeyValueStore,
    H: ConsumerHub + ?Sized,
{
    let snapshot = store.snapshot()?;
    let Some(active_id) = snapshot.active_group_id.as_deref() else {
        return Ok(None);
    };

    let Some(group) = find_group(&snapshot.groups, active_id) else {
        warn!("[CYCLE] Active group '{}' no longer exists", active_id);
        return Ok(None);
    };
    if group.images.is_empty() {
        return Ok(None);
    }

    let next = next_index(snapshot.index_of(active_id), group.images.len());
    store.set_group_index(active_id, next)?;

    let url = group.images[next].clone();
    let delivered = broadcast_background(hub, &url);
    info!(
        "[CYCLE] Group '{}' -> image {} ({}), delivered to {} consumer(s)",
        active_id, next, url, delivered
    );
    Ok(Some(url))
}

/// Best-effort fan-out. A consumer that can't take the message is skipped;
/// the rest still get it. Returns how many accepted.
pub fn broadcast_background<H: ConsumerHub + ?Sized>(hub: &H, url: &str) -> usize {
    let message = Broadcast::SetBackground { url: url.to_string() };
    let mut delivered = 0;
    for id in hub.contexts() {
        match hub.send(id, &message) {
            Ok(()) => delivered += 1,
            Err(e) => info!("[CYCLE] Consumer #{} not listening: {:#}", id, e),
        }
    }
    delivered
}
