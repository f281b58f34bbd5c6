//! The six directions a block face can point.

/// One of the six axis-aligned face directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FaceDirection {
    /// +X direction.
    PosX = 0,
    /// −X direction.
    NegX = 1,
    /// +Y direction.
    PosY = 2,
    /// −Y direction.
    NegY = 3,
    /// +Z direction.
    PosZ = 4,
    /// −Z direction.
    NegZ = 5,
}

impl FaceDirection {
    /// All six directions in order.
    pub const ALL: [FaceDirection; 6] = [
        Self::PosX,
        Self::NegX,
        Self::PosY,
        Self::NegY,
        Self::PosZ,
        Self::NegZ,
    ];

    /// The direction along `axis` (0=X, 1=Y, 2=Z) with the given sign.
    pub fn from_axis(axis: usize, positive: bool) -> Self {
        match (axis, positive) {
            (0, true) => Self::PosX,
            (0, false) => Self::NegX,
            (1, true) => Self::PosY,
            (1, false) => Self::NegY,
            (_, true) => Self::PosZ,
            (_, false) => Self::NegZ,
        }
    }

    /// Axis perpendicular to the face (0=X, 1=Y, 2=Z).
    pub fn axis(self) -> usize {
        self as usize / 2
    }

    /// Whether the face points along the positive axis.
    pub fn is_positive(self) -> bool {
        self as usize % 2 == 0
    }

    /// Tangent axes `(u, v)` spanning the face plane, chosen so that
    /// `u × v` points along the positive normal axis.
    pub fn tangent_axes(self) -> (usize, usize) {
        let axis = self.axis();
        ((axis + 1) % 3, (axis + 2) % 3)
    }

    /// Unit normal.
    pub fn normal(self) -> [f32; 3] {
        match self {
            Self::PosX => [1.0, 0.0, 0.0],
            Self::NegX => [-1.0, 0.0, 0.0],
            Self::PosY => [0.0, 1.0, 0.0],
            Self::NegY => [0.0, -1.0, 0.0],
            Self::PosZ => [0.0, 0.0, 1.0],
            Self::NegZ => [0.0, 0.0, -1.0],
        }
    }

    /// The opposite direction.
    pub fn opposite(self) -> Self {
        Self::from_axis(self.axis(), !self.is_positive())
    }

    /// Direction index (0–5).
    pub fn index(self) -> usize {
        self as usize
    }
}
