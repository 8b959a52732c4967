//! Stride partitioning of the draw list across worker contexts
//!
//! Worker `i` of `W` owns draws `i, i + W, i + 2W, ...`. The rule is the same
//! every frame, so a worker always records the same draws in the same order.

use std::iter::{Skip, StepBy};
use std::slice::Iter;

use crate::render::scene::DrawCall;

/// Lazy, restartable view of one worker's draws
///
/// Cloning restarts the sequence from the beginning.
#[derive(Debug, Clone)]
pub struct Partition<'a> {
    inner: StepBy<Skip<Iter<'a, DrawCall>>>,
}

impl<'a> Partition<'a> {
    /// Draws owned by `worker_index` when the list is split across `worker_count` workers
    ///
    /// `worker_count` must be at least 1.
    pub fn new(draws: &'a [DrawCall], worker_count: usize, worker_index: usize) -> Self {
        debug_assert!(worker_count >= 1, "partitioning needs at least one worker");
        Self {
            inner: draws.iter().skip(worker_index).step_by(worker_count.max(1)),
        }
    }
}

impl<'a> Iterator for Partition<'a> {
    type Item = &'a DrawCall;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Partition<'_> {}

/// Indices (into the draw list) owned by `worker_index`
pub fn partition_indices(
    draw_count: usize,
    worker_count: usize,
    worker_index: usize,
) -> impl Iterator<Item = usize> + Clone {
    (worker_index..draw_count).step_by(worker_count.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::scene::SceneDescription;

    #[test]
    fn test_twelve_draws_three_workers() {
        let partitions: Vec<Vec<usize>> = (0..3)
            .map(|worker| partition_indices(12, 3, worker).collect())
            .collect();

        assert_eq!(partitions[0], vec![0, 3, 6, 9]);
        assert_eq!(partitions[1], vec![1, 4, 7, 10]);
        assert_eq!(partitions[2], vec![2, 5, 8, 11]);
    }

    #[test]
    fn test_partitions_cover_every_draw_once() {
        for draw_count in 0..40 {
            for worker_count in 1..9 {
                let mut seen = vec![0_u32; draw_count];
                for worker in 0..worker_count {
                    for index in partition_indices(draw_count, worker_count, worker) {
                        seen[index] += 1;
                    }
                }
                assert!(
                    seen.iter().all(|&count| count == 1),
                    "D={draw_count} W={worker_count}: {seen:?}"
                );
            }
        }
    }

    #[test]
    fn test_partition_yields_draws_in_stride_order() {
        let scene = SceneDescription::synthetic(10, 2);
        let partition = Partition::new(&scene.draws, 4, 1);

        assert_eq!(partition.len(), 3);
        let draws: Vec<DrawCall> = partition.clone().copied().collect();
        assert_eq!(draws, vec![scene.draws[1], scene.draws[5], scene.draws[9]]);

        // the clone was consumed, not the partition itself
        assert_eq!(partition.count(), 3);
    }

    #[test]
    fn test_worker_index_past_end_is_empty() {
        let scene = SceneDescription::synthetic(2, 1);
        assert_eq!(Partition::new(&scene.draws, 4, 3).count(), 0);
    }
}
