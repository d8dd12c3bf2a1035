//! Local and world transforms for scene nodes.
//!
//! Every node carries one local [`Transform`]; world transforms are obtained by
//! multiplying down the hierarchy (`parent * local`).

use std::ops::Mul;

use cgmath::{One, SquareMatrix};

/// Position, rotation (as quaternion) and non-uniform scale of a node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Transform {
    /// Identity transform (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            // `Quaternion::one()` is the identity quaternion (no rotation)
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// Decomposes an affine matrix into translation, rotation and scale.
    ///
    /// Shear is not representable and gets folded into the rotation.
    pub fn from_matrix(matrix: &cgmath::Matrix4<f32>) -> Self {
        use cgmath::InnerSpace;
        let position = matrix.w.truncate();
        let x = matrix.x.truncate();
        let y = matrix.y.truncate();
        let z = matrix.z.truncate();
        let mut scale = cgmath::Vector3::new(x.magnitude(), y.magnitude(), z.magnitude());
        // a mirrored basis keeps its handedness in the scale
        if x.cross(y).dot(z) < 0.0 {
            scale.x = -scale.x;
        }
        let safe = |axis: cgmath::Vector3<f32>, len: f32| {
            if len.abs() > f32::EPSILON {
                axis / len
            } else {
                axis
            }
        };
        let basis = cgmath::Matrix3::from_cols(safe(x, scale.x), safe(y, scale.y), safe(z, scale.z));
        Self {
            position,
            rotation: cgmath::Quaternion::from(basis).normalize(),
            scale,
        }
    }

    /// Upper 3x3 inverse-transpose, used to carry normals into world space.
    pub fn normal_matrix(matrix: &cgmath::Matrix4<f32>) -> cgmath::Matrix3<f32> {
        let upper = cgmath::Matrix3::from_cols(
            matrix.x.truncate(),
            matrix.y.truncate(),
            matrix.z.truncate(),
        );
        upper
            .invert()
            .map(|inverse| {
                use cgmath::Matrix;
                inverse.transpose()
            })
            .unwrap_or(upper)
    }
}

impl<'a, 'b> Mul<&'b Transform> for &'a Transform {
    type Output = Transform;

    fn mul(self, rhs: &'b Transform) -> Self::Output {
        let scaled_rhs_pos = cgmath::Vector3::new(
            self.scale.x * rhs.position.x,
            self.scale.y * rhs.position.y,
            self.scale.z * rhs.position.z,
        );
        Transform {
            position: self.position + (self.rotation * scaled_rhs_pos),
            rotation: self.rotation * rhs.rotation,
            scale: cgmath::Vector3::new(
                self.scale.x * rhs.scale.x,
                self.scale.y * rhs.scale.y,
                self.scale.z * rhs.scale.z,
            ),
        }
    }
}

impl Mul<Transform> for Transform {
    type Output = Self;

    fn mul(self, rhs: Transform) -> Self::Output {
        &self * &rhs
    }
}

impl From<cgmath::Vector3<f32>> for Transform {
    fn from(position: cgmath::Vector3<f32>) -> Self {
        Transform {
            position,
            ..Default::default()
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}
