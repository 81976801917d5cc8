//! Character asset: glTF import into CPU-side node/mesh/skin/clip data.
//!
//! Parsing is delegated to the `gltf` crate; this module flattens the
//! document into index-addressed arrays the mixer and renderer consume.

use anyhow::{Context, Result};
use glam::{Mat4, Quat, Vec3};
use std::path::Path;

use crate::animation::{AnimationClip, Interpolation, KeyframeTrack, Track, TrackData};

/// One node of the transform hierarchy. `global` is recomputed from the
/// TRS components each frame, parents before children.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub parent: Option<usize>,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub global: Mat4,
}

impl Node {
    /// An identity node, mostly useful in tests.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            parent: None,
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            global: Mat4::IDENTITY,
        }
    }
}

/// Vertex layout shared by skinned and rigid primitives. Must match the
/// attribute layout in `character.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub joints: [u16; 4],
    pub weights: [f32; 4],
}

#[derive(Debug, Clone)]
pub struct Primitive {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    /// Node whose global transform places this primitive.
    pub node: usize,
    /// True when the vertices carry joint influences bound to the skin.
    pub skinned: bool,
}

#[derive(Debug, Clone)]
pub struct Skin {
    /// Node indices acting as joints, in glTF joint order.
    pub joints: Vec<usize>,
    pub inverse_bind: Vec<Mat4>,
}

/// A fully decoded character: hierarchy, mesh primitives, optional skin,
/// and the animation clips found in the file.
#[derive(Debug, Clone)]
pub struct CharacterData {
    pub nodes: Vec<Node>,
    /// Node indices ordered parents-before-children.
    pub traversal: Vec<usize>,
    pub primitives: Vec<Primitive>,
    pub skin: Option<Skin>,
    pub clips: Vec<AnimationClip>,
}

impl CharacterData {
    /// Reads and flattens a `.gltf` / `.glb` file.
    pub fn load(path: &Path) -> Result<Self> {
        let (document, buffers, _images) = gltf::import(path)
            .with_context(|| format!("importing glTF model {}", path.display()))?;

        Self::from_document(&document, &buffers)
    }

    fn from_document(document: &gltf::Document, buffers: &[gltf::buffer::Data]) -> Result<Self> {
        let node_count = document.nodes().len();

        let mut nodes = Vec::with_capacity(node_count);
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); node_count];
        let mut parent: Vec<Option<usize>> = vec![None; node_count];

        for node in document.nodes() {
            let (translation, rotation, scale) = node.transform().decomposed();

            nodes.push(Node {
                name: node
                    .name()
                    .map(str::to_owned)
                    .unwrap_or_else(|| format!("node_{}", node.index())),
                parent: None,
                translation: Vec3::from_array(translation),
                rotation: Quat::from_array(rotation),
                scale: Vec3::from_array(scale),
                global: Mat4::IDENTITY,
            });

            for child in node.children() {
                children[node.index()].push(child.index());
                parent[child.index()] = Some(node.index());
            }
        }

        for (index, p) in parent.iter().enumerate() {
            nodes[index].parent = *p;
        }

        let traversal = topo_order(&parent, &children);

        // One skin per character; extra skins in the file are ignored.
        let skin_index = document.skins().next().map(|s| s.index());
        let skin = document
            .skins()
            .next()
            .map(|skin| {
                let joints: Vec<usize> = skin.joints().map(|n| n.index()).collect();

                let reader = skin.reader(|buffer| buffers.get(buffer.index()).map(|d| &*d.0));
                let inverse_bind: Vec<Mat4> = match reader.read_inverse_bind_matrices() {
                    Some(iter) => iter.map(|m| Mat4::from_cols_array_2d(&m)).collect(),
                    None => vec![Mat4::IDENTITY; joints.len()],
                };

                if inverse_bind.len() != joints.len() {
                    anyhow::bail!(
                        "skin has {} joints but {} inverse bind matrices",
                        joints.len(),
                        inverse_bind.len()
                    );
                }

                Ok(Skin {
                    joints,
                    inverse_bind,
                })
            })
            .transpose()?;

        let mut primitives = Vec::new();
        for node in document.nodes() {
            let Some(mesh) = node.mesh() else { continue };
            let node_skinned = node.skin().map(|s| s.index()) == skin_index && skin.is_some();

            for prim in mesh.primitives() {
                let reader = prim.reader(|buffer| buffers.get(buffer.index()).map(|d| &*d.0));

                let Some(positions) = reader.read_positions() else {
                    log::warn!(
                        "mesh {:?} primitive without positions skipped",
                        mesh.name().unwrap_or("?")
                    );
                    continue;
                };
                let positions: Vec<[f32; 3]> = positions.collect();

                let normals: Vec<[f32; 3]> = match reader.read_normals() {
                    Some(iter) => iter.collect(),
                    None => vec![[0.0, 1.0, 0.0]; positions.len()],
                };

                let joints: Option<Vec<[u16; 4]>> =
                    reader.read_joints(0).map(|j| j.into_u16().collect());
                let weights: Option<Vec<[f32; 4]>> =
                    reader.read_weights(0).map(|w| w.into_f32().collect());
                let skinned = node_skinned && joints.is_some() && weights.is_some();

                let vertices: Vec<Vertex> = positions
                    .iter()
                    .enumerate()
                    .map(|(i, &position)| Vertex {
                        position,
                        normal: normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
                        joints: if skinned {
                            joints.as_deref().and_then(|j| j.get(i)).copied().unwrap_or([0; 4])
                        } else {
                            [0; 4]
                        },
                        weights: if skinned {
                            weights
                                .as_deref()
                                .and_then(|w| w.get(i))
                                .copied()
                                .unwrap_or([0.0; 4])
                        } else {
                            [0.0; 4]
                        },
                    })
                    .collect();

                let indices: Vec<u32> = match reader.read_indices() {
                    Some(iter) => iter.into_u32().collect(),
                    None => (0..vertices.len() as u32).collect(),
                };

                primitives.push(Primitive {
                    vertices,
                    indices,
                    node: node.index(),
                    skinned,
                });
            }
        }

        if primitives.is_empty() {
            anyhow::bail!("model contains no renderable mesh primitives");
        }

        let clips = load_clips(document, buffers);
        if clips.is_empty() {
            log::warn!("model has no animation clips; the character will hold its bind pose");
        }

        let mut data = Self {
            nodes,
            traversal,
            primitives,
            skin,
            clips,
        };
        data.update_global_transforms();

        Ok(data)
    }

    /// Recomputes every node's global matrix from its TRS components,
    /// visiting parents before children.
    pub fn update_global_transforms(&mut self) {
        for &index in &self.traversal {
            let node = &self.nodes[index];
            let local = Mat4::from_scale_rotation_translation(
                node.scale,
                node.rotation,
                node.translation,
            );

            let global = match node.parent {
                Some(p) => self.nodes[p].global * local,
                None => local,
            };
            self.nodes[index].global = global;
        }
    }

    /// Skinning matrices (`joint_global * inverse_bind`) in joint order;
    /// a single identity when the character has no skin, so the GPU
    /// buffer is never empty.
    pub fn joint_matrices(&self) -> Vec<Mat4> {
        match &self.skin {
            Some(skin) => skin
                .joints
                .iter()
                .zip(&skin.inverse_bind)
                .map(|(&joint, inverse_bind)| self.nodes[joint].global * *inverse_bind)
                .collect(),
            None => vec![Mat4::IDENTITY],
        }
    }
}

/// Orders node indices parents-first. Nodes unreachable from any root
/// (malformed hierarchies) are appended so every node still gets a global
/// transform.
fn topo_order(parent: &[Option<usize>], children: &[Vec<usize>]) -> Vec<usize> {
    let count = parent.len();
    let mut order = Vec::with_capacity(count);
    let mut visited = vec![false; count];

    let mut stack: Vec<usize> = (0..count).rev().filter(|&i| parent[i].is_none()).collect();

    while let Some(index) = stack.pop() {
        if visited[index] {
            continue;
        }
        visited[index] = true;
        order.push(index);

        for &child in children[index].iter().rev() {
            stack.push(child);
        }
    }

    for index in 0..count {
        if !visited[index] {
            order.push(index);
        }
    }

    order
}

fn load_clips(document: &gltf::Document, buffers: &[gltf::buffer::Data]) -> Vec<AnimationClip> {
    let mut clips = Vec::new();

    for anim in document.animations() {
        let mut tracks = Vec::new();

        for channel in anim.channels() {
            let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(|d| &*d.0));
            let node = channel.target().node().index();

            let times: Vec<f32> = match reader.read_inputs() {
                Some(iter) => iter.collect(),
                None => continue,
            };
            if times.is_empty() {
                continue;
            }

            let (interpolation, cubic) = match channel.sampler().interpolation() {
                gltf::animation::Interpolation::Linear => (Interpolation::Linear, false),
                gltf::animation::Interpolation::Step => (Interpolation::Step, false),
                // Cubic tangents are dropped; the key values interpolate
                // linearly, which is visually close at typical key rates.
                gltf::animation::Interpolation::CubicSpline => (Interpolation::Linear, true),
            };

            let Some(outputs) = reader.read_outputs() else {
                continue;
            };

            let data = match outputs {
                gltf::animation::util::ReadOutputs::Translations(iter) => {
                    let values = keyed_values(iter.map(Vec3::from_array), cubic, times.len());
                    TrackData::Translation(KeyframeTrack::new(times, values, interpolation))
                }
                gltf::animation::util::ReadOutputs::Rotations(iter) => {
                    let values = keyed_values(
                        iter.into_f32().map(Quat::from_array),
                        cubic,
                        times.len(),
                    );
                    TrackData::Rotation(KeyframeTrack::new(times, values, interpolation))
                }
                gltf::animation::util::ReadOutputs::Scales(iter) => {
                    let values = keyed_values(iter.map(Vec3::from_array), cubic, times.len());
                    TrackData::Scale(KeyframeTrack::new(times, values, interpolation))
                }
                gltf::animation::util::ReadOutputs::MorphTargetWeights(_) => continue,
            };

            tracks.push(Track { node, data });
        }

        if tracks.is_empty() {
            continue;
        }

        clips.push(AnimationClip::new(
            anim.name().unwrap_or("clip").to_owned(),
            tracks,
        ));
    }

    clips
}

/// Collects one value per key. Cubic-spline samplers store
/// `[in-tangent, value, out-tangent]` triplets; only the value is kept.
fn keyed_values<T>(iter: impl Iterator<Item = T>, cubic: bool, keys: usize) -> Vec<T> {
    if cubic {
        iter.skip(1)
            .step_by(3)
            .take(keys)
            .collect()
    } else {
        iter.take(keys).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topo_order_puts_parents_first() {
        // 2 -> 0 -> 1, plus a lone root 3.
        let parent = vec![Some(2), Some(0), None, None];
        let children = vec![vec![1], vec![], vec![0], vec![]];

        let order = topo_order(&parent, &children);

        assert_eq!(order.len(), 4);
        let pos = |i: usize| order.iter().position(|&x| x == i).unwrap();
        assert!(pos(2) < pos(0));
        assert!(pos(0) < pos(1));
    }

    #[test]
    fn global_transforms_compose_down_the_hierarchy() {
        let mut root = Node::named("root");
        root.translation = Vec3::new(0.0, 10.0, 0.0);

        let mut child = Node::named("child");
        child.parent = Some(0);
        child.translation = Vec3::new(5.0, 0.0, 0.0);
        child.scale = Vec3::splat(2.0);

        let mut data = CharacterData {
            nodes: vec![root, child],
            traversal: vec![0, 1],
            primitives: Vec::new(),
            skin: None,
            clips: Vec::new(),
        };

        data.update_global_transforms();

        let origin = data.nodes[1].global.transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(5.0, 10.0, 0.0)).length() < 1e-6);

        // The child's scale applies to its own geometry.
        let unit = data.nodes[1].global.transform_point3(Vec3::X);
        assert!((unit - Vec3::new(7.0, 10.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn joint_matrices_fold_in_the_inverse_bind() {
        let mut joint = Node::named("joint");
        joint.translation = Vec3::new(0.0, 3.0, 0.0);

        let mut data = CharacterData {
            nodes: vec![joint],
            traversal: vec![0],
            primitives: Vec::new(),
            skin: Some(Skin {
                joints: vec![0],
                inverse_bind: vec![Mat4::from_translation(Vec3::new(0.0, -3.0, 0.0))],
            }),
            clips: Vec::new(),
        };
        data.update_global_transforms();

        let mats = data.joint_matrices();
        assert_eq!(mats.len(), 1);

        // Bind pose: joint_global * inverse_bind is the identity.
        let p = mats[0].transform_point3(Vec3::new(1.0, 2.0, 3.0));
        assert!((p - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-6);
    }

    #[test]
    fn cubic_values_take_the_middle_of_each_triplet() {
        let flat: Vec<f32> = (0..9).map(|i| i as f32).collect();
        let values = keyed_values(flat.into_iter(), true, 3);
        assert_eq!(values, vec![1.0, 4.0, 7.0]);
    }
}
