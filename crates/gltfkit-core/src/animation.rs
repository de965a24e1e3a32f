//! Animations and keyframe sampling.

use crate::indices::{AccessorId, NodeId};
use crate::node::normalize_quat;
use crate::object::Common;
use crate::types::{Interpolation, TargetPath};

#[derive(Debug, Clone, Default)]
pub struct Animation {
    pub common: Common,
    pub channels: Vec<Channel>,
    pub samplers: Vec<AnimationSampler>,
}

#[derive(Debug, Clone)]
pub struct Channel {
    pub common: Common,
    /// Index into the owning animation's samplers.
    pub sampler: usize,
    pub target_node: Option<NodeId>,
    pub target_path: TargetPath,
}

#[derive(Debug, Clone)]
pub struct AnimationSampler {
    pub common: Common,
    pub input: AccessorId,
    pub output: AccessorId,
    pub interpolation: Interpolation,
}

/// Decoded keyframes of one channel, ready to be sampled.
///
/// For cubic-spline tracks each keyframe holds three values: in-tangent,
/// value, out-tangent.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeTrack {
    pub times: Vec<f32>,
    pub values: Vec<f32>,
    /// Components per value (3 for translation, 4 for rotation, ...).
    pub components: usize,
    pub interpolation: Interpolation,
}

impl KeyframeTrack {
    pub fn start_time(&self) -> f32 {
        self.times.first().copied().unwrap_or(0.0)
    }

    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Surrounding keyframes for `time`, clamped at both ends.
    pub fn key_indices(&self, time: f32) -> Option<(usize, usize)> {
        let n = self.times.len();
        if n == 0 {
            return None;
        }
        if time <= self.times[0] {
            return Some(if n > 1 { (0, 1) } else { (0, 0) });
        }
        let last = n - 1;
        if time >= self.times[last] {
            return Some(if last > 0 { (last - 1, last) } else { (last, last) });
        }
        let mut low = 0;
        let mut high = last;
        while low + 1 < high {
            let mid = (low + high) / 2;
            if self.times[mid] <= time {
                low = mid;
            } else {
                high = mid;
            }
        }
        Some((low, high))
    }

    fn value(&self, key: usize) -> &[f32] {
        let c = self.components;
        let slot = match self.interpolation {
            Interpolation::CubicSpline => key * 3 + 1,
            _ => key,
        };
        &self.values[slot * c..(slot + 1) * c]
    }

    fn tangent(&self, key: usize, out: bool) -> &[f32] {
        let c = self.components;
        let slot = key * 3 + if out { 2 } else { 0 };
        &self.values[slot * c..(slot + 1) * c]
    }

    /// Sample the track. Returns `None` for an empty track.
    pub fn sample(&self, time: f32) -> Option<Vec<f32>> {
        let (i, j) = self.key_indices(time)?;
        if i == j {
            return Some(self.value(i).to_vec());
        }
        let t0 = self.times[i];
        let t1 = self.times[j];
        let dt = t1 - t0;
        let t = if dt == 0.0 { 0.0 } else { ((time - t0) / dt).clamp(0.0, 1.0) };

        let out = match self.interpolation {
            Interpolation::Step => {
                if time >= t1 {
                    self.value(j).to_vec()
                } else {
                    self.value(i).to_vec()
                }
            }
            Interpolation::Linear => lerp(self.value(i), self.value(j), t),
            Interpolation::CubicSpline => hermite(
                self.value(i),
                self.tangent(i, true),
                self.value(j),
                self.tangent(j, false),
                t,
                dt,
            ),
        };
        Some(out)
    }

    /// Sample a rotation track: linear keys use spherical interpolation and
    /// the result is always a unit quaternion.
    pub fn sample_rotation(&self, time: f32) -> Option<[f32; 4]> {
        if self.components != 4 {
            return None;
        }
        let (i, j) = self.key_indices(time)?;
        let q = if self.interpolation == Interpolation::Linear && i != j {
            let t0 = self.times[i];
            let dt = self.times[j] - t0;
            let t = if dt == 0.0 { 0.0 } else { ((time - t0) / dt).clamp(0.0, 1.0) };
            let a = self.value(i);
            let b = self.value(j);
            slerp([a[0], a[1], a[2], a[3]], [b[0], b[1], b[2], b[3]], t)
        } else {
            let v = self.sample(time)?;
            [v[0], v[1], v[2], v[3]]
        };
        Some(normalize_quat(q))
    }
}

pub fn lerp(a: &[f32], b: &[f32], t: f32) -> Vec<f32> {
    a.iter().zip(b).map(|(a, b)| a + t * (b - a)).collect()
}

/// Cubic Hermite spline between `a` and `b` over an interval of length `dt`.
pub fn hermite(a: &[f32], a_out: &[f32], b: &[f32], b_in: &[f32], t: f32, dt: f32) -> Vec<f32> {
    let t2 = t * t;
    let t3 = t2 * t;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;
    (0..a.len())
        .map(|k| h00 * a[k] + dt * h10 * a_out[k] + h01 * b[k] + dt * h11 * b_in[k])
        .collect()
}

/// Spherical interpolation along the shorter arc.
pub fn slerp(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    let mut cos = a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3];
    let mut b = b;
    if cos < 0.0 {
        cos = -cos;
        b = [-b[0], -b[1], -b[2], -b[3]];
    }
    let (wa, wb) = if cos > 0.9995 {
        (1.0 - t, t)
    } else {
        let theta = cos.acos();
        let sin = theta.sin();
        (((1.0 - t) * theta).sin() / sin, (t * theta).sin() / sin)
    };
    normalize_quat([
        wa * a[0] + wb * b[0],
        wa * a[1] + wb * b[1],
        wa * a[2] + wb * b[2],
        wa * a[3] + wb * b[3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(times: &[f32], values: &[f32], components: usize, interpolation: Interpolation) -> KeyframeTrack {
        KeyframeTrack {
            times: times.to_vec(),
            values: values.to_vec(),
            components,
            interpolation,
        }
    }

    #[test]
    fn test_key_indices_clamp() {
        let t = track(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0], 1, Interpolation::Linear);
        assert_eq!(t.key_indices(-1.0), Some((0, 1)));
        assert_eq!(t.key_indices(1.5), Some((1, 2)));
        assert_eq!(t.key_indices(5.0), Some((1, 2)));
        assert_eq!(t.key_indices(1.0), Some((1, 2)));
    }

    #[test]
    fn test_linear_and_step() {
        let linear = track(&[0.0, 2.0], &[0.0, 10.0], 1, Interpolation::Linear);
        assert_eq!(linear.sample(0.5), Some(vec![2.5]));
        assert_eq!(linear.sample(9.0), Some(vec![10.0]));

        let step = track(&[0.0, 2.0], &[0.0, 10.0], 1, Interpolation::Step);
        assert_eq!(step.sample(1.9), Some(vec![0.0]));
        assert_eq!(step.sample(2.0), Some(vec![10.0]));
    }

    #[test]
    fn test_cubic_passes_through_keys() {
        // in-tangent, value, out-tangent per key
        let values = [0.0, 1.0, 0.0, 0.0, 3.0, 0.0];
        let cubic = track(&[0.0, 1.0], &values, 1, Interpolation::CubicSpline);
        assert_eq!(cubic.sample(0.0), Some(vec![1.0]));
        assert_eq!(cubic.sample(1.0), Some(vec![3.0]));
        let mid = cubic.sample(0.5).unwrap()[0];
        assert!((mid - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_slerp_halfway() {
        let half = std::f32::consts::FRAC_1_SQRT_2;
        let rot = track(
            &[0.0, 1.0],
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            4,
            Interpolation::Linear,
        );
        let q = rot.sample_rotation(0.5).unwrap();
        let expected = [0.0, 0.0, (std::f32::consts::FRAC_PI_4).sin(), (std::f32::consts::FRAC_PI_4).cos()];
        for k in 0..4 {
            assert!((q[k] - expected[k]).abs() < 1e-5);
        }
        assert!((expected[2] - half).abs() < 1e-6);
    }

    #[test]
    fn test_empty_track() {
        let empty = track(&[], &[], 3, Interpolation::Linear);
        assert_eq!(empty.sample(0.0), None);
    }
}
