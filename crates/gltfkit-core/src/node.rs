//! Scene graph nodes and their local transforms.
//!
//! A node always carries both a column-major matrix and a
//! translation/rotation/scale triple. Whichever form the source declared is
//! authoritative; the other is derived from it. When a source declares both,
//! the matrix wins.

use indexmap::IndexMap;

use crate::indices::{AccessorId, CameraId, LightId, MeshId, NodeId, SkinId};
use crate::object::Common;

pub const IDENTITY_MATRIX: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Which transform form was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformSource {
    /// Neither form was present; the transform is identity.
    #[default]
    Identity,
    Matrix,
    Trs,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub common: Common,
    pub camera: Option<CameraId>,
    pub mesh: Option<MeshId>,
    pub skin: Option<SkinId>,
    pub light: Option<LightId>,
    pub children: Vec<NodeId>,
    /// Back reference to the owning node. Filled in by document validation.
    pub parent: Option<NodeId>,
    pub weights: Vec<f32>,
    /// `EXT_mesh_gpu_instancing` per-instance attributes.
    pub instancing: IndexMap<String, AccessorId>,
    matrix: [f32; 16],
    translation: [f32; 3],
    rotation: [f32; 4],
    scale: [f32; 3],
    transform_source: TransformSource,
}

impl Default for Node {
    fn default() -> Self {
        Node {
            common: Common::default(),
            camera: None,
            mesh: None,
            skin: None,
            light: None,
            children: Vec::new(),
            parent: None,
            weights: Vec::new(),
            instancing: IndexMap::new(),
            matrix: IDENTITY_MATRIX,
            translation: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
            transform_source: TransformSource::Identity,
        }
    }
}

impl Node {
    pub fn matrix(&self) -> [f32; 16] {
        self.matrix
    }

    pub fn translation(&self) -> [f32; 3] {
        self.translation
    }

    /// Rotation quaternion as `[x, y, z, w]`.
    pub fn rotation(&self) -> [f32; 4] {
        self.rotation
    }

    pub fn scale(&self) -> [f32; 3] {
        self.scale
    }

    pub fn transform_source(&self) -> TransformSource {
        self.transform_source
    }

    /// Set the transform from a column-major matrix and derive the TRS triple.
    pub fn set_matrix(&mut self, matrix: [f32; 16]) {
        let (t, r, s) = decompose_matrix(&matrix);
        self.matrix = matrix;
        self.translation = t;
        self.rotation = r;
        self.scale = s;
        self.transform_source = TransformSource::Matrix;
    }

    /// Set the transform from a TRS triple and derive the matrix.
    pub fn set_trs(&mut self, translation: [f32; 3], rotation: [f32; 4], scale: [f32; 3]) {
        self.matrix = compose_trs(translation, rotation, scale);
        self.translation = translation;
        self.rotation = rotation;
        self.scale = scale;
        self.transform_source = TransformSource::Trs;
    }
}

/// Compose `T * R * S` into a column-major matrix.
pub fn compose_trs(t: [f32; 3], r: [f32; 4], s: [f32; 3]) -> [f32; 16] {
    let (qx, qy, qz, qw) = (r[0], r[1], r[2], r[3]);
    let xx = qx * qx;
    let yy = qy * qy;
    let zz = qz * qz;
    let xy = qx * qy;
    let xz = qx * qz;
    let yz = qy * qz;
    let wx = qw * qx;
    let wy = qw * qy;
    let wz = qw * qz;

    // Rotation matrix (row-major)
    let rot = [
        [1.0 - 2.0 * (yy + zz), 2.0 * (xy - wz), 2.0 * (xz + wy)],
        [2.0 * (xy + wz), 1.0 - 2.0 * (xx + zz), 2.0 * (yz - wx)],
        [2.0 * (xz - wy), 2.0 * (yz + wx), 1.0 - 2.0 * (xx + yy)],
    ];

    [
        rot[0][0] * s[0],
        rot[1][0] * s[0],
        rot[2][0] * s[0],
        0.0,
        rot[0][1] * s[1],
        rot[1][1] * s[1],
        rot[2][1] * s[1],
        0.0,
        rot[0][2] * s[2],
        rot[1][2] * s[2],
        rot[2][2] * s[2],
        0.0,
        t[0],
        t[1],
        t[2],
        1.0,
    ]
}

/// Split an affine column-major matrix into translation, rotation and scale.
///
/// A negative determinant is folded into the x scale.
pub fn decompose_matrix(m: &[f32; 16]) -> ([f32; 3], [f32; 4], [f32; 3]) {
    let translation = [m[12], m[13], m[14]];

    let len = |a: f32, b: f32, c: f32| (a * a + b * b + c * c).sqrt();
    let mut sx = len(m[0], m[1], m[2]);
    let sy = len(m[4], m[5], m[6]);
    let sz = len(m[8], m[9], m[10]);

    let det = m[0] * (m[5] * m[10] - m[9] * m[6]) - m[4] * (m[1] * m[10] - m[9] * m[2])
        + m[8] * (m[1] * m[6] - m[5] * m[2]);
    if det < 0.0 {
        sx = -sx;
    }

    let inv = |s: f32| if s == 0.0 { 0.0 } else { 1.0 / s };
    let (ix, iy, iz) = (inv(sx), inv(sy), inv(sz));
    let r00 = m[0] * ix;
    let r10 = m[1] * ix;
    let r20 = m[2] * ix;
    let r01 = m[4] * iy;
    let r11 = m[5] * iy;
    let r21 = m[6] * iy;
    let r02 = m[8] * iz;
    let r12 = m[9] * iz;
    let r22 = m[10] * iz;

    let trace = r00 + r11 + r22;
    let rotation = if trace > 0.0 {
        let s = 0.5 / (trace + 1.0).sqrt();
        [(r21 - r12) * s, (r02 - r20) * s, (r10 - r01) * s, 0.25 / s]
    } else if r00 > r11 && r00 > r22 {
        let s = 2.0 * (1.0 + r00 - r11 - r22).sqrt();
        [0.25 * s, (r01 + r10) / s, (r02 + r20) / s, (r21 - r12) / s]
    } else if r11 > r22 {
        let s = 2.0 * (1.0 + r11 - r00 - r22).sqrt();
        [(r01 + r10) / s, 0.25 * s, (r12 + r21) / s, (r02 - r20) / s]
    } else {
        let s = 2.0 * (1.0 + r22 - r00 - r11).sqrt();
        [(r02 + r20) / s, (r12 + r21) / s, 0.25 * s, (r10 - r01) / s]
    };

    let rotation = if rotation.iter().all(|c| c.is_finite()) {
        normalize_quat(rotation)
    } else {
        [0.0, 0.0, 0.0, 1.0]
    };

    (translation, rotation, [sx, sy, sz])
}

pub(crate) fn normalize_quat(q: [f32; 4]) -> [f32; 4] {
    let l = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
    if l == 0.0 {
        [0.0, 0.0, 0.0, 1.0]
    } else {
        [q[0] / l, q[1] / l, q[2] / l, q[3] / l]
    }
}
