//! Scenes, skins, cameras and punctual lights.

use crate::indices::{AccessorId, NodeId};
use crate::object::Common;

#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub common: Common,
    pub nodes: Vec<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct Skin {
    pub common: Common,
    pub inverse_bind_matrices: Option<AccessorId>,
    pub skeleton: Option<NodeId>,
    pub joints: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        aspect_ratio: Option<f32>,
        yfov: f32,
        znear: f32,
        /// Absent for an infinite projection.
        zfar: Option<f32>,
    },
    Orthographic {
        xmag: f32,
        ymag: f32,
        znear: f32,
        zfar: f32,
    },
}

#[derive(Debug, Clone)]
pub struct Camera {
    pub common: Common,
    pub projection: Projection,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Directional,
    Point,
    Spot {
        inner_cone_angle: f32,
        outer_cone_angle: f32,
    },
}

impl LightKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LightKind::Directional => "directional",
            LightKind::Point => "point",
            LightKind::Spot { .. } => "spot",
        }
    }
}

/// A `KHR_lights_punctual` light.
#[derive(Debug, Clone)]
pub struct Light {
    pub common: Common,
    pub kind: LightKind,
    pub color: [f32; 3],
    pub intensity: f32,
    pub range: Option<f32>,
}

impl Light {
    pub fn new(kind: LightKind) -> Self {
        Light {
            common: Common::default(),
            kind,
            color: [1.0; 3],
            intensity: 1.0,
            range: None,
        }
    }
}
