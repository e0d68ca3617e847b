//! Session tree helpers: cost aggregation and ancestor/descendant walks used
//! by the delegation tool and the executor's accounting.

use crate::store::{SessionStore, StoreResult};
use ac_core::{Session, SessionId};

/// Walk from `session_id` up to (and including) the root session.
pub async fn ancestors(
    store: &dyn SessionStore,
    session_id: &SessionId,
) -> StoreResult<Vec<Session>> {
    let mut chain = Vec::new();
    let mut current = store.get(session_id).await?;
    loop {
        let parent_id = current.parent_session_id;
        chain.push(current);
        match parent_id {
            Some(parent_id) => current = store.get(&parent_id).await?,
            None => break,
        }
    }
    Ok(chain)
}

/// Recursively gather every descendant of `session_id`, breadth order.
pub async fn descendants(
    store: &dyn SessionStore,
    session_id: &SessionId,
) -> StoreResult<Vec<Session>> {
    let mut all = Vec::new();
    let mut frontier = vec![*session_id];
    while let Some(id) = frontier.pop() {
        let children = store.list_children(&id).await?;
        for child in children {
            frontier.push(child.id);
            all.push(child);
        }
    }
    Ok(all)
}

/// Sum of a session's own cost plus every descendant's cost, used when a
/// parent session needs to report total spend including delegated work.
pub async fn total_cost_including_descendants(
    store: &dyn SessionStore,
    session_id: &SessionId,
) -> StoreResult<f64> {
    let root = store.get(session_id).await?;
    let mut total = root.cost;
    for descendant in descendants(store, session_id).await? {
        total += descendant.cost;
    }
    Ok(total)
}

/// Apply a cost delta to `session_id` and every ancestor up to the root, so
/// delegated work is reflected in the parent's running total immediately
/// (spec §5, task delegation cost aggregation).
pub async fn propagate_cost_to_ancestors(
    store: &dyn SessionStore,
    session_id: &SessionId,
    delta: f64,
) -> StoreResult<()> {
    for mut session in ancestors(store, session_id).await? {
        session.add_cost(delta);
        store.save(&session).await?;
    }
    Ok(())
}
