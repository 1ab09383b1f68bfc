//! Blend weight computation: pure functions from blend parameters to
//! per-motion weight vectors.

use animrig_api_core::blend_tree::{BlendTree, BlendTreeKind, MotionSource};

/// 1D weights over ascending thresholds. At most two entries are non-zero
/// and the vector always sums to 1.
pub fn blend_1d_weights(thresholds: &[f32], p: f32, out: &mut Vec<f32>) {
    out.clear();
    out.resize(thresholds.len(), 0.0);
    let n = thresholds.len();
    if n == 0 {
        return;
    }
    if p <= thresholds[0] {
        out[0] = 1.0;
        return;
    }
    if p >= thresholds[n - 1] {
        out[n - 1] = 1.0;
        return;
    }
    for i in 0..n - 1 {
        if thresholds[i] <= p && p < thresholds[i + 1] {
            let span = thresholds[i + 1] - thresholds[i];
            let w = if span > 0.0 { (p - thresholds[i]) / span } else { 0.0 };
            out[i] = 1.0 - w;
            out[i + 1] = w;
            return;
        }
    }
    // Unreachable for ascending thresholds; keep a defined fallback.
    out[n - 1] = 1.0;
}

/// 2D "simple directional" weights. Each motion's raw weight is the product
/// of pairwise falloff terms against every other motion: the term shrinks
/// motion `i`'s influence the further the parameter has moved from `d[i]`
/// toward `d[j]`, clamped to [0, 1]. Raw weights are normalized to sum to 1;
/// if every raw weight vanishes (e.g. all motions share one direction), the
/// result falls back to uniform weights instead of dividing by zero.
pub fn blend_2d_weights(directions: &[[f32; 2]], p: [f32; 2], out: &mut Vec<f32>) {
    out.clear();
    out.resize(directions.len(), 0.0);
    let n = directions.len();
    if n == 0 {
        return;
    }
    if n == 1 {
        out[0] = 1.0;
        return;
    }
    for i in 0..n {
        let di = directions[i];
        let rel = [p[0] - di[0], p[1] - di[1]];
        let mut w = 1.0f32;
        for j in 0..n {
            if j == i {
                continue;
            }
            let edge = [directions[j][0] - di[0], directions[j][1] - di[1]];
            let len2 = edge[0] * edge[0] + edge[1] * edge[1];
            if len2 <= f32::EPSILON {
                continue;
            }
            let along = (rel[0] * edge[0] + rel[1] * edge[1]) / len2;
            w *= (1.0 - along).clamp(0.0, 1.0);
        }
        out[i] = w;
    }
    let total: f32 = out.iter().sum();
    if total > f32::EPSILON {
        for w in out.iter_mut() {
            *w /= total;
        }
    } else {
        let uniform = 1.0 / n as f32;
        for w in out.iter_mut() {
            *w = uniform;
        }
    }
}

/// Duration of one motion in tree-local time, given its source duration:
/// `source_duration / speed`.
#[inline]
pub fn effective_duration(source_duration: f32, speed: f32) -> f32 {
    if speed > 0.0 {
        source_duration / speed
    } else {
        0.0
    }
}

/// Weighted duration of a tree: the sum over motions of
/// `weight * effective_duration`. `motion_durations` supplies each motion's
/// source duration (clip duration, or a nested tree's reported duration).
pub fn weighted_duration(tree: &BlendTree, weights: &[f32], motion_durations: &[f32]) -> f32 {
    tree.motions
        .iter()
        .zip(weights.iter())
        .zip(motion_durations.iter())
        .map(|((m, w), d)| w * effective_duration(*d, m.speed))
        .sum()
}

/// Post-order evaluation of a motion tree's weights, used where the tree is
/// mixed flat (tests, tooling): nested trees contribute their own weight as
/// one scalar at the parent level, and their internal split is computed from
/// their own parameters.
pub fn evaluate_tree_weights(
    tree: &BlendTree,
    lookup: &dyn Fn(&str) -> f32,
    out: &mut Vec<f32>,
) {
    match tree.kind {
        BlendTreeKind::Simple1d => {
            let thresholds: Vec<f32> = tree.motions.iter().map(|m| m.threshold).collect();
            blend_1d_weights(&thresholds, lookup(&tree.parameters[0]), out);
        }
        BlendTreeKind::SimpleDirectional2d => {
            let directions: Vec<[f32; 2]> = tree.motions.iter().map(|m| m.direction).collect();
            let p = [lookup(&tree.parameters[0]), lookup(&tree.parameters[1])];
            blend_2d_weights(&directions, p, out);
        }
    }
}

/// Source duration of one motion slot, recursing into nested trees with the
/// same parameter lookup.
pub fn motion_source_duration(source: &MotionSource, lookup: &dyn Fn(&str) -> f32) -> f32 {
    match source {
        MotionSource::Clip(clip) => clip.duration,
        MotionSource::Tree(tree) => {
            let mut weights = Vec::new();
            evaluate_tree_weights(tree, lookup, &mut weights);
            let durations: Vec<f32> = tree
                .motions
                .iter()
                .map(|m| motion_source_duration(&m.source, lookup))
                .collect();
            weighted_duration(tree, &weights, &durations)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    #[test]
    fn one_d_brackets_parameter() {
        let mut w = Vec::new();
        blend_1d_weights(&[0.0, 1.0, 2.0], 0.5, &mut w);
        assert!((w[0] - 0.5).abs() < EPS);
        assert!((w[1] - 0.5).abs() < EPS);
        assert!(w[2].abs() < EPS);
    }

    #[test]
    fn one_d_clamps_below_and_above() {
        let mut w = Vec::new();
        blend_1d_weights(&[0.0, 1.0, 2.0], -1.0, &mut w);
        assert_eq!(w, vec![1.0, 0.0, 0.0]);
        blend_1d_weights(&[0.0, 1.0, 2.0], 3.0, &mut w);
        assert_eq!(w, vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn one_d_sums_to_one() {
        let thresholds = [0.0, 0.3, 1.1, 4.0];
        let mut w = Vec::new();
        for p in [-2.0, 0.0, 0.1, 0.9, 2.0, 4.0, 9.0] {
            blend_1d_weights(&thresholds, p, &mut w);
            let sum: f32 = w.iter().sum();
            assert!((sum - 1.0).abs() < EPS, "p={p} sum={sum}");
        }
    }

    #[test]
    fn two_d_exact_direction_selects_motion() {
        let dirs = [[1.0, 0.0], [0.0, 1.0], [-1.0, 0.0]];
        let mut w = Vec::new();
        blend_2d_weights(&dirs, [0.0, 1.0], &mut w);
        assert!(w[1] > 1.0 - 1e-4);
        assert!(w[0] < 1e-4 && w[2] < 1e-4);
    }

    #[test]
    fn two_d_weights_sum_to_one() {
        let dirs = [[1.0, 0.0], [0.3, 0.9], [-0.5, -0.5], [0.0, -2.0]];
        let mut w = Vec::new();
        for p in [[0.0, 0.0], [0.2, 0.4], [-1.0, 0.1], [3.0, 3.0]] {
            blend_2d_weights(&dirs, p, &mut w);
            let sum: f32 = w.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4, "p={p:?} sum={sum}");
        }
    }

    #[test]
    fn two_d_degenerate_directions_fall_back_to_uniform() {
        let dirs = [[1.0, 0.0], [1.0, 0.0], [1.0, 0.0]];
        let mut w = Vec::new();
        blend_2d_weights(&dirs, [-5.0, 0.0], &mut w);
        for v in &w {
            assert!((v - 1.0 / 3.0).abs() < EPS);
        }
    }

    #[test]
    fn effective_duration_divides_by_speed() {
        assert!((effective_duration(2.0, 2.0) - 1.0).abs() < EPS);
        assert_eq!(effective_duration(2.0, 0.0), 0.0);
    }
}
