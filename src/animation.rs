//! Animation runtime: channel/sampler evaluation at arbitrary times.
//!
//! Sampler input is seconds. STEP and LINEAR interpolate values directly;
//! CUBICSPLINE outputs are (in-tangent, value, out-tangent) triples and
//! interpolate with the Hermite basis scaled by the interval length.
//! Rotation channels slerp with shortest-arc correction.

use crate::accessor::{self, DecodeCache};
use crate::asset::Asset;
use crate::error::{Error, Result};
use crate::extensions;
use crate::json::{self, Interpolation, TargetPath};
use glam::Quat;

/// A value sampled from a channel at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `translation` or `scale`.
    Vec3(glam::Vec3),
    /// `rotation`, unit length.
    Rotation(Quat),
    /// `weights`: one entry per morph target of the target mesh.
    Weights(Vec<f32>),
    /// Pointer-extension target of width 1.
    Scalar(f32),
    /// Pointer-extension target of any other width.
    Floats(Vec<f32>),
}

/// What a channel drives: a classic `(node, path)` pair or a
/// JSON-pointer-like path into the asset.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedTarget {
    Node { node: usize, path: TargetPath },
    Pointer(String),
}

/// Resolve a channel's target, decoding the pointer extension if present.
pub fn resolve_target(
    asset: &Asset,
    animation_index: usize,
    channel_index: usize,
) -> Result<ResolvedTarget> {
    let pointer = format!("/animations/{animation_index}/channels/{channel_index}");
    let animation = asset.animation(animation_index)?;
    let channel = animation
        .channels
        .get(channel_index)
        .ok_or(Error::BadReference {
            pointer: pointer.clone(),
            index: channel_index,
            len: animation.channels.len(),
        })?;

    match channel.target.path {
        json::animation::TargetPathKind::Classic(path) => {
            let node = channel.target.node.ok_or_else(|| {
                Error::invariant(format!("{pointer}/target"), "classic target without node")
            })?;
            Ok(ResolvedTarget::Node {
                node: node.value(),
                path,
            })
        }
        json::animation::TargetPathKind::Pointer(_) => {
            match extensions::channel_pointer(&channel.target, &pointer) {
                Some(value) => Ok(ResolvedTarget::Pointer(value?)),
                None => Err(Error::invariant(
                    format!("{pointer}/target"),
                    "pointer path without a pointer extension",
                )),
            }
        }
    }
}

/// Evaluate one channel at `t` seconds.
pub fn evaluate(
    asset: &Asset,
    animation_index: usize,
    channel_index: usize,
    t: f32,
    cache: &mut DecodeCache,
) -> Result<Value> {
    let pointer = format!("/animations/{animation_index}/channels/{channel_index}");
    let animation = asset.animation(animation_index)?;
    let channel = animation
        .channels
        .get(channel_index)
        .ok_or(Error::BadReference {
            pointer: pointer.clone(),
            index: channel_index,
            len: animation.channels.len(),
        })?;
    let sampler = animation
        .samplers
        .get(channel.sampler)
        .ok_or(Error::BadReference {
            pointer: format!("{pointer}/sampler"),
            index: channel.sampler,
            len: animation.samplers.len(),
        })?;
    let sampler_pointer = format!(
        "/animations/{animation_index}/samplers/{}",
        channel.sampler
    );

    let times = accessor::decode(&asset.root, &asset.buffers, sampler.input.value(), cache)?;
    let times = times.to_f32();
    if times.is_empty() {
        return Err(Error::MalformedSampler {
            pointer: sampler_pointer,
            reason: "sampler has no keyframes".to_string(),
        });
    }

    let output = accessor::decode(&asset.root, &asset.buffers, sampler.output.value(), cache)?;
    let flat = output.to_f32();

    let stride = sampler.interpolation.output_stride();
    let per_key = times.len() * stride;
    if per_key == 0 || flat.len() % per_key != 0 || flat.is_empty() {
        return Err(Error::MalformedSampler {
            pointer: sampler_pointer,
            reason: format!(
                "{} output components for {} keyframes (stride {stride})",
                flat.len(),
                times.len()
            ),
        });
    }
    let width = flat.len() / per_key;

    let target = resolve_target(asset, animation_index, channel_index)?;
    let is_rotation = matches!(
        target,
        ResolvedTarget::Node {
            path: TargetPath::Rotation,
            ..
        }
    );
    if is_rotation && width != 4 {
        return Err(Error::MalformedSampler {
            pointer: sampler_pointer,
            reason: format!("rotation output width is {width}, expected 4"),
        });
    }
    if matches!(
        target,
        ResolvedTarget::Node {
            path: TargetPath::Translation | TargetPath::Scale,
            ..
        }
    ) && width != 3
    {
        return Err(Error::MalformedSampler {
            pointer: sampler_pointer,
            reason: format!("translation/scale output width is {width}, expected 3"),
        });
    }
    if let ResolvedTarget::Node {
        node,
        path: TargetPath::Weights,
    } = &target
    {
        // Weight channels must be as wide as the mesh's target list.
        let node = asset.node(json::Index::new(*node as u32))?;
        if let Some(mesh_index) = node.mesh {
            let mesh = asset.mesh(mesh_index)?;
            let expected = mesh
                .primitives
                .first()
                .map(|p| p.targets.len())
                .unwrap_or(0);
            if expected != 0 && width != expected {
                return Err(Error::MalformedSampler {
                    pointer: sampler_pointer,
                    reason: format!("weights width {width} but mesh has {expected} targets"),
                });
            }
        }
    }

    let values = sample(&times, &flat, width, sampler.interpolation, is_rotation, t);

    Ok(match target {
        ResolvedTarget::Node { path, .. } => match path {
            TargetPath::Translation | TargetPath::Scale => {
                Value::Vec3(glam::Vec3::new(values[0], values[1], values[2]))
            }
            TargetPath::Rotation => {
                Value::Rotation(Quat::from_xyzw(values[0], values[1], values[2], values[3]))
            }
            TargetPath::Weights => Value::Weights(values),
        },
        ResolvedTarget::Pointer(_) => {
            if width == 1 {
                Value::Scalar(values[0])
            } else {
                Value::Floats(values)
            }
        }
    })
}

/// Core interpolation over a flat keyframe array of element width `width`.
fn sample(
    times: &[f32],
    flat: &[f32],
    width: usize,
    interpolation: Interpolation,
    is_rotation: bool,
    t: f32,
) -> Vec<f32> {
    let stride = interpolation.output_stride();
    // CUBICSPLINE keyframes are (a, v, b) triples; the value block is the
    // middle one.
    let value_of = |key: usize| -> &[f32] {
        let base = (key * stride + if stride == 3 { 1 } else { 0 }) * width;
        &flat[base..base + width]
    };
    let in_tangent_of = |key: usize| -> &[f32] {
        let base = key * stride * width;
        &flat[base..base + width]
    };
    let out_tangent_of = |key: usize| -> &[f32] {
        let base = (key * stride + 2) * width;
        &flat[base..base + width]
    };

    let last = times.len() - 1;
    if times.len() == 1 || t <= times[0] {
        return value_of(0).to_vec();
    }
    if t >= times[last] {
        return value_of(last).to_vec();
    }

    // First keyframe strictly after t; the segment starts one before it.
    let after = times.partition_point(|&key_t| key_t <= t);
    let i = after - 1;
    let t0 = times[i];
    let t1 = times[i + 1];
    let dt = t1 - t0;
    let u = if dt > 0.0 { (t - t0) / dt } else { 0.0 };

    match interpolation {
        Interpolation::Step => value_of(i).to_vec(),
        Interpolation::Linear => {
            if is_rotation {
                let q0 = quat_from(value_of(i));
                let mut q1 = quat_from(value_of(i + 1));
                // Shortest arc: flip the far key when the dot is negative.
                if q0.dot(q1) < 0.0 {
                    q1 = -q1;
                }
                let q = q0.slerp(q1, u).normalize();
                vec![q.x, q.y, q.z, q.w]
            } else {
                value_of(i)
                    .iter()
                    .zip(value_of(i + 1))
                    .map(|(&a, &b)| a * (1.0 - u) + b * u)
                    .collect()
            }
        }
        Interpolation::CubicSpline => {
            let v0 = value_of(i);
            let v1 = value_of(i + 1);
            let a = out_tangent_of(i);
            let b = in_tangent_of(i + 1);
            let u2 = u * u;
            let u3 = u2 * u;
            let mut out: Vec<f32> = (0..width)
                .map(|c| {
                    (2.0 * u3 - 3.0 * u2 + 1.0) * v0[c]
                        + dt * (u3 - 2.0 * u2 + u) * a[c]
                        + (-2.0 * u3 + 3.0 * u2) * v1[c]
                        + dt * (u3 - u2) * b[c]
                })
                .collect();
            if is_rotation {
                let q = quat_from(&out).normalize();
                out = vec![q.x, q.y, q.z, q.w];
            }
            out
        }
    }
}

fn quat_from(values: &[f32]) -> Quat {
    Quat::from_xyzw(values[0], values[1], values[2], values[3])
}

/// Append `src`'s channels and samplers onto `dst`, renumbering `src`
/// channel sampler indices past the existing sampler table.
pub fn merge_animations(dst: &mut json::Animation, src: json::Animation) {
    let offset = dst.samplers.len();
    for mut channel in src.channels {
        channel.sampler += offset;
        dst.channels.push(channel);
    }
    dst.samplers.extend(src.samplers);
}

/// Writer-side policy for clips whose keyframes start before zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegativeTimePolicy {
    /// Shift the whole clip so the earliest keyframe lands on zero.
    Slide,
    /// Drop keyframes before zero.
    Crop,
}

/// Apply a negative-time policy to parallel keyframe arrays before they
/// are packed. `width` is components per keyframe (including the
/// CUBICSPLINE triple when applicable).
pub fn apply_negative_time_policy(
    policy: NegativeTimePolicy,
    times: &mut Vec<f32>,
    values: &mut Vec<f32>,
    width: usize,
) {
    let min = times.iter().copied().fold(f32::INFINITY, f32::min);
    if times.is_empty() || min >= 0.0 {
        return;
    }
    match policy {
        NegativeTimePolicy::Slide => {
            for t in times.iter_mut() {
                *t -= min;
            }
        }
        NegativeTimePolicy::Crop => {
            let keep: Vec<usize> = (0..times.len()).filter(|&k| times[k] >= 0.0).collect();
            *times = keep.iter().map(|&k| times[k]).collect();
            *values = keep
                .iter()
                .flat_map(|&k| values[k * width..(k + 1) * width].to_vec())
                .collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_hits_keyframes_exactly() {
        let times = [0.0, 1.0, 2.0];
        let flat = [0.0, 10.0, 20.0];
        for (i, &t) in times.iter().enumerate() {
            let out = sample(&times, &flat, 1, Interpolation::Linear, false, t);
            assert_eq!(out[0], flat[i]);
        }
        let mid = sample(&times, &flat, 1, Interpolation::Linear, false, 0.5);
        assert_eq!(mid[0], 5.0);
    }

    #[test]
    fn test_step_holds_left_value() {
        let times = [0.0, 1.0];
        let flat = [1.0, 2.0];
        let out = sample(&times, &flat, 1, Interpolation::Step, false, 0.99);
        assert_eq!(out[0], 1.0);
    }

    #[test]
    fn test_times_outside_range_clamp() {
        let times = [1.0, 2.0];
        let flat = [5.0, 6.0];
        assert_eq!(
            sample(&times, &flat, 1, Interpolation::Linear, false, 0.0)[0],
            5.0
        );
        assert_eq!(
            sample(&times, &flat, 1, Interpolation::Linear, false, 3.0)[0],
            6.0
        );
    }

    #[test]
    fn test_single_keyframe_is_constant() {
        let times = [0.5];
        let flat = [7.0, 8.0, 9.0];
        assert_eq!(
            sample(&times, &flat, 3, Interpolation::Linear, false, 123.0),
            vec![7.0, 8.0, 9.0]
        );
    }

    #[test]
    fn test_antipodal_quaternions_take_shortest_arc() {
        let times = [0.0, 1.0];
        // Identity and its negation: the same rotation twice.
        let flat = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, -1.0];
        let out = sample(&times, &flat, 4, Interpolation::Linear, true, 0.5);
        let q = Quat::from_xyzw(out[0], out[1], out[2], out[3]);
        assert!((q.length() - 1.0).abs() < 1e-5);
        assert!(q.dot(Quat::from_xyzw(0.0, 0.0, 0.0, 1.0)) >= 0.0);
    }

    #[test]
    fn test_cubicspline_hits_value_block_at_keyframes() {
        let times = [0.0, 1.0];
        // (a, v, b) per keyframe, width 1.
        let flat = [9.0, 1.0, 0.5, -0.5, 2.0, 9.0];
        assert_eq!(
            sample(&times, &flat, 1, Interpolation::CubicSpline, false, 0.0)[0],
            1.0
        );
        assert_eq!(
            sample(&times, &flat, 1, Interpolation::CubicSpline, false, 1.0)[0],
            2.0
        );
        // Interior samples are finite and between reasonable bounds.
        let mid = sample(&times, &flat, 1, Interpolation::CubicSpline, false, 0.5)[0];
        assert!(mid.is_finite());
    }

    #[test]
    fn test_cubicspline_tangent_scaling_by_interval() {
        // Linear-compatible spline: v0=0, v1=1, tangents = slope 1.
        // With dt = 2 the curve still passes through the endpoints.
        let times = [0.0, 2.0];
        let flat = [0.0, 0.0, 0.5, 0.5, 1.0, 0.0];
        let start = sample(&times, &flat, 1, Interpolation::CubicSpline, false, 0.0)[0];
        let end = sample(&times, &flat, 1, Interpolation::CubicSpline, false, 2.0)[0];
        assert_eq!(start, 0.0);
        assert_eq!(end, 1.0);
        let mid = sample(&times, &flat, 1, Interpolation::CubicSpline, false, 1.0)[0];
        assert!((mid - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_merge_renumbers_sampler_indices() {
        let mut a: json::Animation = serde_json::from_str(
            r#"{"channels":[{"sampler":0,"target":{"node":0,"path":"translation"}}],
                "samplers":[{"input":0,"output":1}]}"#,
        )
        .unwrap();
        let b: json::Animation = serde_json::from_str(
            r#"{"channels":[{"sampler":0,"target":{"node":1,"path":"scale"}}],
                "samplers":[{"input":2,"output":3}]}"#,
        )
        .unwrap();
        merge_animations(&mut a, b);
        assert_eq!(a.channels.len(), 2);
        assert_eq!(a.samplers.len(), 2);
        assert_eq!(a.channels[1].sampler, 1);
    }

    #[test]
    fn test_negative_time_slide() {
        let mut times = vec![-0.5, 0.0, 0.5];
        let mut values = vec![1.0, 2.0, 3.0];
        apply_negative_time_policy(NegativeTimePolicy::Slide, &mut times, &mut values, 1);
        assert_eq!(times, vec![0.0, 0.5, 1.0]);
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_negative_time_crop() {
        let mut times = vec![-0.5, 0.0, 0.5];
        let mut values = vec![1.0, 2.0, 3.0];
        apply_negative_time_policy(NegativeTimePolicy::Crop, &mut times, &mut values, 1);
        assert_eq!(times, vec![0.0, 0.5]);
        assert_eq!(values, vec![2.0, 3.0]);
    }
}
