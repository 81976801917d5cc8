//! Keyframe animation: tracks, clips, and the looping mixer that drives
//! node transforms.

use glam::{Quat, Vec3};

use crate::character::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Step,
}

/// Values a keyframe track can interpolate between.
pub trait Interpolate: Copy {
    fn interpolate(a: Self, b: Self, t: f32) -> Self;
}

impl Interpolate for f32 {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a + (b - a) * t
    }
}

impl Interpolate for Vec3 {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }
}

impl Interpolate for Quat {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.slerp(b, t)
    }
}

/// Sorted key times with one value per key. Sampling clamps to the track
/// ends; keys must be non-empty and times ascending.
#[derive(Debug, Clone)]
pub struct KeyframeTrack<T> {
    pub times: Vec<f32>,
    pub values: Vec<T>,
    pub interpolation: Interpolation,
}

impl<T: Interpolate> KeyframeTrack<T> {
    pub fn new(times: Vec<f32>, values: Vec<T>, interpolation: Interpolation) -> Self {
        debug_assert!(!times.is_empty());
        debug_assert_eq!(times.len(), values.len());

        Self {
            times,
            values,
            interpolation,
        }
    }

    /// Latest key time, i.e. the track's end.
    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    pub fn sample(&self, time: f32) -> T {
        // partition_point returns the first index with key time > `time`.
        let next = self.times.partition_point(|&t| t <= time);

        if next == 0 {
            return self.values[0];
        }
        if next >= self.times.len() {
            return self.values[self.times.len() - 1];
        }

        let index = next - 1;
        match self.interpolation {
            Interpolation::Step => self.values[index],
            Interpolation::Linear => {
                let t0 = self.times[index];
                let t1 = self.times[next];
                let span = t1 - t0;
                let t = if span > 1e-6 {
                    ((time - t0) / span).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                T::interpolate(self.values[index], self.values[next], t)
            }
        }
    }
}

/// Which node transform component a track writes.
#[derive(Debug, Clone)]
pub enum TrackData {
    Translation(KeyframeTrack<Vec3>),
    Rotation(KeyframeTrack<Quat>),
    Scale(KeyframeTrack<Vec3>),
}

impl TrackData {
    fn end_time(&self) -> f32 {
        match self {
            TrackData::Translation(t) | TrackData::Scale(t) => t.end_time(),
            TrackData::Rotation(t) => t.end_time(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Track {
    /// Index of the target node in the character's node list.
    pub node: usize,
    pub data: TrackData,
}

#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub tracks: Vec<Track>,
}

impl AnimationClip {
    pub fn new(name: String, tracks: Vec<Track>) -> Self {
        let duration = tracks
            .iter()
            .map(|t| t.data.end_time())
            .fold(0.0_f32, f32::max);

        Self {
            name,
            duration,
            tracks,
        }
    }
}

/// Advances one clip on a looping playhead and writes the sampled
/// transforms into the node hierarchy.
pub struct AnimationMixer {
    clip: AnimationClip,
    time: f32,
}

impl AnimationMixer {
    pub fn new(clip: AnimationClip) -> Self {
        Self { clip, time: 0.0 }
    }

    pub fn clip_name(&self) -> &str {
        &self.clip.name
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    /// Advances the playhead by `dt` seconds (wrapping at the clip
    /// duration) and applies every track to its target node.
    pub fn update(&mut self, dt: f32, nodes: &mut [Node]) {
        let duration = self.clip.duration;
        if duration <= 0.0 {
            return;
        }

        self.time += dt;
        if self.time >= duration {
            self.time %= duration;
        }

        for track in &self.clip.tracks {
            let Some(node) = nodes.get_mut(track.node) else {
                continue;
            };

            match &track.data {
                TrackData::Translation(t) => node.translation = t.sample(self.time),
                TrackData::Rotation(t) => node.rotation = t.sample(self.time),
                TrackData::Scale(t) => node.scale = t.sample(self.time),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(times: Vec<f32>, values: Vec<f32>) -> KeyframeTrack<f32> {
        KeyframeTrack::new(times, values, Interpolation::Linear)
    }

    #[test]
    fn linear_sampling_interpolates_between_keys() {
        let track = linear(vec![0.0, 1.0, 2.0], vec![0.0, 10.0, 0.0]);

        assert_eq!(track.sample(0.5), 5.0);
        assert_eq!(track.sample(1.5), 5.0);
        assert_eq!(track.sample(1.0), 10.0);
    }

    #[test]
    fn sampling_clamps_to_track_ends() {
        let track = linear(vec![1.0, 2.0], vec![3.0, 7.0]);

        assert_eq!(track.sample(0.0), 3.0);
        assert_eq!(track.sample(99.0), 7.0);
    }

    #[test]
    fn step_sampling_holds_the_previous_key() {
        let track = KeyframeTrack::new(
            vec![0.0, 1.0],
            vec![Vec3::ZERO, Vec3::ONE],
            Interpolation::Step,
        );

        assert_eq!(track.sample(0.99), Vec3::ZERO);
        assert_eq!(track.sample(1.0), Vec3::ONE);
    }

    #[test]
    fn clip_duration_is_the_longest_track_end() {
        let clip = AnimationClip::new(
            "walk".into(),
            vec![
                Track {
                    node: 0,
                    data: TrackData::Translation(KeyframeTrack::new(
                        vec![0.0, 0.8],
                        vec![Vec3::ZERO, Vec3::X],
                        Interpolation::Linear,
                    )),
                },
                Track {
                    node: 0,
                    data: TrackData::Rotation(KeyframeTrack::new(
                        vec![0.0, 1.25],
                        vec![Quat::IDENTITY, Quat::IDENTITY],
                        Interpolation::Linear,
                    )),
                },
            ],
        );

        assert_eq!(clip.duration, 1.25);
    }

    #[test]
    fn mixer_loops_and_writes_node_transforms() {
        let clip = AnimationClip::new(
            "bob".into(),
            vec![Track {
                node: 0,
                data: TrackData::Translation(KeyframeTrack::new(
                    vec![0.0, 1.0],
                    vec![Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0)],
                    Interpolation::Linear,
                )),
            }],
        );

        let mut nodes = vec![Node::named("root")];
        let mut mixer = AnimationMixer::new(clip);

        mixer.update(0.5, &mut nodes);
        assert!((nodes[0].translation.y - 1.0).abs() < 1e-6);

        // 0.5 + 0.75 wraps past the 1.0s duration to t = 0.25.
        mixer.update(0.75, &mut nodes);
        assert!((mixer.time() - 0.25).abs() < 1e-6);
        assert!((nodes[0].translation.y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn tracks_targeting_missing_nodes_are_ignored() {
        let clip = AnimationClip::new(
            "stray".into(),
            vec![Track {
                node: 5,
                data: TrackData::Scale(KeyframeTrack::new(
                    vec![0.0, 1.0],
                    vec![Vec3::ONE, Vec3::splat(2.0)],
                    Interpolation::Linear,
                )),
            }],
        );

        let mut nodes = vec![Node::named("only")];
        let mut mixer = AnimationMixer::new(clip);
        mixer.update(0.1, &mut nodes);
    }
}
