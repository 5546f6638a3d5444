//! 3-D k-d tree over per-step satellite positions.
//!
//! Built fresh each coarse time step by the all-on-all screener; the only
//! query shapes needed are "items within radius of a point" and "all unique
//! close pairs".

use nalgebra::Vector3;

struct Node {
    point: Vector3<f64>,
    item: usize,
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

pub struct KdTree {
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl KdTree {
    /// Builds a balanced tree by median split. `points` pairs an arbitrary
    /// caller item id with its position.
    pub fn build(mut points: Vec<(usize, Vector3<f64>)>) -> Self {
        let mut nodes = Vec::with_capacity(points.len());
        let root = Self::build_rec(&mut nodes, &mut points, 0);
        Self { nodes, root }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn build_rec(
        nodes: &mut Vec<Node>,
        points: &mut [(usize, Vector3<f64>)],
        depth: usize,
    ) -> Option<usize> {
        if points.is_empty() {
            return None;
        }
        let axis = depth % 3;
        let mid = points.len() / 2;
        points.select_nth_unstable_by(mid, |a, b| {
            a.1[axis]
                .partial_cmp(&b.1[axis])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let (item, point) = points[mid];
        let (left_half, rest) = points.split_at_mut(mid);
        let right_half = &mut rest[1..];
        let left = Self::build_rec(nodes, left_half, depth + 1);
        let right = Self::build_rec(nodes, right_half, depth + 1);
        nodes.push(Node {
            point,
            item,
            axis,
            left,
            right,
        });
        Some(nodes.len() - 1)
    }

    /// Item ids of all stored points strictly closer than `radius` to
    /// `center`, matching the screening threshold test.
    pub fn within_radius(&self, center: &Vector3<f64>, radius: f64) -> Vec<usize> {
        let mut found = Vec::new();
        self.search(self.root, center, radius, &mut found);
        found
    }

    fn search(
        &self,
        index: Option<usize>,
        center: &Vector3<f64>,
        radius: f64,
        found: &mut Vec<usize>,
    ) {
        let Some(index) = index else {
            return;
        };
        let node = &self.nodes[index];
        if (node.point - center).norm() < radius {
            found.push(node.item);
        }
        let delta = center[node.axis] - node.point[node.axis];
        if delta < radius {
            self.search(node.left, center, radius, found);
        }
        if delta > -radius {
            self.search(node.right, center, radius, found);
        }
    }

    /// All unique item pairs closer than `radius`, each reported once with
    /// the smaller item id first.
    pub fn close_pairs(&self, radius: f64) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for node in &self.nodes {
            for other in self.within_radius(&node.point, radius) {
                if other > node.item {
                    pairs.push((node.item, other));
                }
            }
        }
        pairs.sort_unstable();
        pairs.dedup();
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Vec<(usize, Vector3<f64>)> {
        let mut points = Vec::new();
        let mut id = 0;
        for x in 0..5 {
            for y in 0..5 {
                for z in 0..5 {
                    points.push((id, Vector3::new(x as f64, y as f64, z as f64)));
                    id += 1;
                }
            }
        }
        points
    }

    fn brute_force_pairs(points: &[(usize, Vector3<f64>)], radius: f64) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for i in 0..points.len() {
            for j in (i + 1)..points.len() {
                if (points[i].1 - points[j].1).norm() < radius {
                    let (a, b) = (points[i].0.min(points[j].0), points[i].0.max(points[j].0));
                    pairs.push((a, b));
                }
            }
        }
        pairs.sort_unstable();
        pairs
    }

    #[test]
    fn radius_query_matches_brute_force() {
        let points = grid();
        let tree = KdTree::build(points.clone());
        let center = Vector3::new(2.2, 1.9, 2.0);
        let mut got = tree.within_radius(&center, 1.5);
        got.sort_unstable();
        let mut want: Vec<usize> = points
            .iter()
            .filter(|(_, p)| (p - center).norm() < 1.5)
            .map(|(id, _)| *id)
            .collect();
        want.sort_unstable();
        assert_eq!(got, want);
    }

    #[test]
    fn close_pairs_match_brute_force() {
        let points = grid();
        let tree = KdTree::build(points.clone());
        assert_eq!(tree.close_pairs(1.1), brute_force_pairs(&points, 1.1));
    }

    #[test]
    fn empty_tree_yields_nothing() {
        let tree = KdTree::build(Vec::new());
        assert!(tree.is_empty());
        assert!(tree.within_radius(&Vector3::zeros(), 10.0).is_empty());
        assert!(tree.close_pairs(10.0).is_empty());
    }
}
