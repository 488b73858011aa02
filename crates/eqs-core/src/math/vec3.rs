// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use crate::math::EPSILON;

/// Deterministic 3D vector used for item and context locations.
///
/// * Components encode world-space metres and may represent either points or
///   directions depending on the calling context.
/// * Arithmetic uses `f32` so results round like the runtime's float32 mode.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Vec3 {
    data: [f32; 3],
}

impl Vec3 {
    /// The origin / zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Unit vector pointing along the positive X axis.
    pub const UNIT_X: Self = Self::new(1.0, 0.0, 0.0);

    /// Unit vector pointing along the positive Y axis.
    pub const UNIT_Y: Self = Self::new(0.0, 1.0, 0.0);

    /// Unit vector pointing along the positive Z axis.
    pub const UNIT_Z: Self = Self::new(0.0, 0.0, 1.0);

    /// Creates a vector from components.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { data: [x, y, z] }
    }

    /// Returns the components as an array.
    pub fn to_array(self) -> [f32; 3] {
        self.data
    }

    /// X component.
    pub fn x(&self) -> f32 {
        self.data[0]
    }

    /// Y component.
    pub fn y(&self) -> f32 {
        self.data[1]
    }

    /// Z component.
    pub fn z(&self) -> f32 {
        self.data[2]
    }

    /// Adds two vectors.
    pub fn add(&self, other: &Self) -> Self {
        Self::new(
            self.x() + other.x(),
            self.y() + other.y(),
            self.z() + other.z(),
        )
    }

    /// Subtracts another vector.
    pub fn sub(&self, other: &Self) -> Self {
        Self::new(
            self.x() - other.x(),
            self.y() - other.y(),
            self.z() - other.z(),
        )
    }

    /// Scales the vector by a scalar.
    pub fn scale(&self, scalar: f32) -> Self {
        Self::new(self.x() * scalar, self.y() * scalar, self.z() * scalar)
    }

    /// Dot product with another vector.
    pub fn dot(&self, other: &Self) -> f32 {
        self.x() * other.x() + self.y() * other.y() + self.z() * other.z()
    }

    /// Vector length (magnitude).
    pub fn length(&self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Length of the XY projection.
    pub fn length_2d(&self) -> f32 {
        (self.x() * self.x() + self.y() * self.y()).sqrt()
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Self) -> f32 {
        self.sub(other).length()
    }

    /// Normalises the vector, returning the zero vector if length ≤ `EPSILON`.
    ///
    /// Degenerate inputs normalise to zero so callers can detect them
    /// deterministically.
    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len <= EPSILON {
            return Self::ZERO;
        }
        self.scale(1.0 / len)
    }

    /// Little-endian byte encoding used by the item store (12 bytes).
    pub fn to_le_bytes(self) -> [u8; 12] {
        let mut out = [0u8; 12];
        for (chunk, value) in out.chunks_exact_mut(4).zip(self.data) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        out
    }

    /// Decodes a 12-byte little-endian record; `None` on a wrong length.
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 12 {
            return None;
        }
        let mut data = [0f32; 3];
        for (index, chunk) in bytes.chunks_exact(4).enumerate() {
            data[index] = f32::from_le_bytes(chunk.try_into().ok()?);
        }
        Some(Self { data })
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(value: [f32; 3]) -> Self {
        Self { data: value }
    }
}
