//! Relation loops over point indices.
//!
//! Every point may reference the next point of its relation group. Following
//! the references from any member visits the whole group once and comes back
//! to the start, so a group is always assigned, priced and moved as one unit.

use std::collections::HashSet;

use crate::error::{Result, ValidationError};
use crate::model::{Point, Relation};

/// Links the points of every relation into circular groups.
///
/// Binding relations merge into any loop a member already belongs to. A point
/// may only appear in one non-binding relation.
pub fn link_relations(points: &mut [Point], relations: &[Relation]) -> Result<()> {
    let mut in_non_binding: HashSet<usize> = HashSet::new();

    for (relation_index, relation) in relations.iter().enumerate() {
        let mut seen = HashSet::new();
        for &index in &relation.linked_indices {
            if index >= points.len() {
                return Err(ValidationError::RelationIndexOutOfRange {
                    relation: relation_index,
                    index,
                    len: points.len(),
                });
            }
            if !seen.insert(index) {
                return Err(ValidationError::DuplicateRelationIndex {
                    relation: relation_index,
                    index,
                });
            }
            if !relation.kind.is_binding() && !in_non_binding.insert(index) {
                return Err(ValidationError::PointInSeveralRelations {
                    id: points[index].id.clone(),
                });
            }
        }

        for pair in relation.linked_indices.windows(2) {
            link(points, pair[0], pair[1]);
        }
    }

    Ok(())
}

/// Merges the loops of `a` and `b` by exchanging their successors.
fn link(points: &mut [Point], a: usize, b: usize) {
    for index in [a, b] {
        if points[index].run.next_linked.is_none() {
            points[index].run.next_linked = Some(index);
        }
    }

    if same_loop(points, a, b) {
        return;
    }

    let next_a = points[a].run.next_linked;
    points[a].run.next_linked = points[b].run.next_linked;
    points[b].run.next_linked = next_a;
}

fn same_loop(points: &[Point], a: usize, b: usize) -> bool {
    let mut found = false;
    for_each_linked(points, a, |index| found |= index == b);
    found
}

/// Visits `start` and every point linked to it, each exactly once.
pub fn for_each_linked(points: &[Point], start: usize, mut visit: impl FnMut(usize)) {
    visit(start);

    let mut current = points[start].run.next_linked;
    let mut steps = 0;
    while let Some(index) = current {
        if index == start || steps >= points.len() {
            break;
        }
        visit(index);
        current = points[index].run.next_linked;
        steps += 1;
    }
}

/// Members of the relation group of `start`, starting with `start`.
pub fn relation_group(points: &[Point], start: usize) -> Vec<usize> {
    let mut group = Vec::new();
    for_each_linked(points, start, |index| group.push(index));
    group
}
