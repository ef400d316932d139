//! Mix graph & routing resolver (§4.3). Tracks form a DAG through
//! `output_track_id`; this module validates destination changes, computes a
//! stable topological order, and derives per-track PDC compensation delays.

use std::collections::{HashMap, HashSet};

use vela_playlist::{ProjectState, Track, TrackId, MASTER_TRACK};

use crate::core::{EngineError, EngineResult};

/// Following `output_track_id` further than this many hops without reaching
/// master means the candidate destination would create a cycle (§4.3).
pub const MAX_ROUTE_DEPTH: usize = 20;

/// Checks whether routing `source` to `destination` keeps the graph acyclic:
/// walking `output_track_id` from `destination` must reach master within
/// [`MAX_ROUTE_DEPTH`] hops without revisiting `source`.
pub fn validate_destination(
    project: &ProjectState,
    source: TrackId,
    destination: TrackId,
) -> EngineResult<()> {
    if destination == source {
        return Err(EngineError::InvalidRouting);
    }
    if project.track(destination).is_none() {
        return Err(EngineError::unknown_id(destination.0));
    }

    let mut current = destination;
    for _ in 0..MAX_ROUTE_DEPTH {
        if current == MASTER_TRACK {
            return Ok(());
        }
        if current == source {
            return Err(EngineError::InvalidRouting);
        }
        let track = project
            .track(current)
            .ok_or_else(|| EngineError::unknown_id(current.0))?;
        if track.output_track_id == current {
            // Self-routing sink other than master: dead end, not master.
            return Err(EngineError::InvalidRouting);
        }
        current = track.output_track_id;
    }
    Err(EngineError::InvalidRouting)
}

/// Stable linearization of tracks such that every producer precedes its
/// consumer; master is always last. Ties among tracks with no dependency
/// relation break by ascending track id (§4.3).
pub fn topological_order(project: &ProjectState) -> Vec<TrackId> {
    let mut children: HashMap<TrackId, Vec<TrackId>> = HashMap::new();
    let mut indegree: HashMap<TrackId, usize> = HashMap::new();

    for track in &project.tracks {
        indegree.entry(track.id).or_insert(0);
    }
    for track in &project.tracks {
        if track.output_track_id != track.id {
            children.entry(track.output_track_id).or_default().push(track.id);
            *indegree.entry(track.output_track_id).or_insert(0) += 0;
            *indegree.get_mut(&track.id).unwrap() += 1;
        }
    }

    let mut ready: Vec<TrackId> = indegree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(id, _)| *id)
        .collect();
    ready.sort_by_key(|id| id.0);

    let mut order = Vec::with_capacity(project.tracks.len());
    let mut indegree = indegree;
    while let Some(pos) = ready
        .iter()
        .position(|id| *id != MASTER_TRACK || ready.len() == 1)
    {
        let id = ready.remove(pos);
        order.push(id);
        if let Some(kids) = children.get(&id) {
            for &kid in kids {
                let deg = indegree.get_mut(&kid).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    let insert_at = ready.partition_point(|r| r.0 < kid.0);
                    ready.insert(insert_at, kid);
                }
            }
        }
        ready.sort_by_key(|id| id.0);
    }
    order.extend(ready);
    order
}

/// Per-track PDC compensation delay, in samples, to apply before mixing a
/// track's output into its parent bus (§4.3).
#[derive(Debug, Clone, Default)]
pub struct PdcPlan {
    pub total_latency: HashMap<TrackId, u32>,
    pub compensation: HashMap<TrackId, u32>,
}

/// Computes `total_latency` bottom-up (master last in `order`) and the
/// per-sibling compensation delay. With `pdc_enabled=false` or `rec_mode=true`
/// every compensation delay collapses to zero (§4.3, §4.5).
pub fn compute_pdc(project: &ProjectState, order: &[TrackId], pdc_enabled: bool) -> PdcPlan {
    let mut plan = PdcPlan::default();
    if !pdc_enabled || project.rec_mode {
        for track in &project.tracks {
            plan.total_latency.insert(track.id, 0);
            plan.compensation.insert(track.id, 0);
        }
        return plan;
    }

    let mut children: HashMap<TrackId, Vec<TrackId>> = HashMap::new();
    for track in &project.tracks {
        if track.output_track_id != track.id {
            children.entry(track.output_track_id).or_default().push(track.id);
        }
    }

    for &id in order {
        let Some(track) = project.track(id) else { continue };
        let insert_latency = track.enabled_insert_latency();
        let max_child = children
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|child| plan.total_latency.get(child).copied())
            .max()
            .unwrap_or(0);
        plan.total_latency.insert(id, insert_latency + max_child);
    }

    for (_, kids) in &children {
        let max_sibling = kids
            .iter()
            .filter_map(|k| plan.total_latency.get(k).copied())
            .max()
            .unwrap_or(0);
        for &kid in kids {
            let this = plan.total_latency.get(&kid).copied().unwrap_or(0);
            plan.compensation.insert(kid, max_sibling.saturating_sub(this));
        }
    }

    plan
}

/// Tracks whose enabled inserts contribute nonzero latency, for "prepare for
/// recording" insert-freezing (§4.5).
pub fn latent_tracks(project: &ProjectState) -> HashSet<TrackId> {
    project
        .tracks
        .iter()
        .filter(|t: &&Track| t.enabled_insert_latency() > 0)
        .map(|t| t.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_playlist::TrackKind;

    fn project_with_chain() -> ProjectState {
        let mut project = ProjectState::new();
        let mut a = Track::new(TrackId(1), TrackKind::Bus, "A");
        a.output_track_id = MASTER_TRACK;
        let mut b = Track::new(TrackId(2), TrackKind::Audio, "B");
        b.output_track_id = TrackId(1);
        project.tracks.push(a);
        project.tracks.push(b);
        project
    }

    #[test]
    fn rejects_cycle() {
        let project = project_with_chain();
        assert!(validate_destination(&project, TrackId(1), TrackId(2)).is_err());
    }

    #[test]
    fn accepts_route_to_master() {
        let project = project_with_chain();
        assert!(validate_destination(&project, TrackId(2), MASTER_TRACK).is_ok());
    }

    #[test]
    fn topo_order_places_master_last() {
        let project = project_with_chain();
        let order = topological_order(&project);
        assert_eq!(*order.last().unwrap(), MASTER_TRACK);
        let pos_a = order.iter().position(|&id| id == TrackId(1)).unwrap();
        let pos_b = order.iter().position(|&id| id == TrackId(2)).unwrap();
        assert!(pos_b < pos_a);
    }

    #[test]
    fn pdc_disabled_zeroes_all_compensation() {
        let project = project_with_chain();
        let order = topological_order(&project);
        let plan = compute_pdc(&project, &order, false);
        assert!(plan.compensation.values().all(|&d| d == 0));
    }

    #[test]
    fn total_latency_matches_invariant() {
        let mut project = project_with_chain();
        project.track_mut(TrackId(2)).unwrap().inserts.push(
            vela_playlist::PluginInstance {
                id: vela_playlist::PluginInstanceId(1),
                kind: vela_playlist::PluginKind::Delay,
                is_enabled: true,
                params: Default::default(),
                latency: 100,
            },
        );
        let order = topological_order(&project);
        let plan = compute_pdc(&project, &order, true);
        assert_eq!(plan.total_latency[&TrackId(2)], 100);
        assert_eq!(plan.total_latency[&TrackId(1)], 100);
    }
}
