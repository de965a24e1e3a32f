//! Enumerations of the glTF schema with their wire values.

/// Accessor component type, keyed by its GL enumerant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    I8 = 5120,
    U8 = 5121,
    I16 = 5122,
    U16 = 5123,
    U32 = 5125,
    F32 = 5126,
}

impl ComponentType {
    pub fn from_gl(value: u32) -> Option<Self> {
        match value {
            5120 => Some(ComponentType::I8),
            5121 => Some(ComponentType::U8),
            5122 => Some(ComponentType::I16),
            5123 => Some(ComponentType::U16),
            5125 => Some(ComponentType::U32),
            5126 => Some(ComponentType::F32),
            _ => None,
        }
    }

    pub fn gl(self) -> u32 {
        self as u32
    }

    pub fn byte_size(self) -> usize {
        match self {
            ComponentType::I8 | ComponentType::U8 => 1,
            ComponentType::I16 | ComponentType::U16 => 2,
            ComponentType::U32 | ComponentType::F32 => 4,
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, ComponentType::F32)
    }

    pub fn is_signed(self) -> bool {
        matches!(self, ComponentType::I8 | ComponentType::I16)
    }

    /// Legal component types for sparse indices and index accessors.
    pub fn is_unsigned_integer(self) -> bool {
        matches!(self, ComponentType::U8 | ComponentType::U16 | ComponentType::U32)
    }
}

/// Accessor element shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl Dimension {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SCALAR" => Some(Dimension::Scalar),
            "VEC2" => Some(Dimension::Vec2),
            "VEC3" => Some(Dimension::Vec3),
            "VEC4" => Some(Dimension::Vec4),
            "MAT2" => Some(Dimension::Mat2),
            "MAT3" => Some(Dimension::Mat3),
            "MAT4" => Some(Dimension::Mat4),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Scalar => "SCALAR",
            Dimension::Vec2 => "VEC2",
            Dimension::Vec3 => "VEC3",
            Dimension::Vec4 => "VEC4",
            Dimension::Mat2 => "MAT2",
            Dimension::Mat3 => "MAT3",
            Dimension::Mat4 => "MAT4",
        }
    }

    pub fn component_count(self) -> usize {
        match self {
            Dimension::Scalar => 1,
            Dimension::Vec2 => 2,
            Dimension::Vec3 => 3,
            Dimension::Vec4 | Dimension::Mat2 => 4,
            Dimension::Mat3 => 9,
            Dimension::Mat4 => 16,
        }
    }

    /// Column count and rows per column for matrices.
    fn matrix_shape(self) -> Option<(usize, usize)> {
        match self {
            Dimension::Mat2 => Some((2, 2)),
            Dimension::Mat3 => Some((3, 3)),
            Dimension::Mat4 => Some((4, 4)),
            _ => None,
        }
    }
}

/// Byte layout of one accessor element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementLayout {
    pub component_type: ComponentType,
    pub dimension: Dimension,
}

impl ElementLayout {
    pub fn new(component_type: ComponentType, dimension: Dimension) -> Self {
        ElementLayout {
            component_type,
            dimension,
        }
    }

    /// Size of an element with no padding.
    pub fn packed_size(self) -> usize {
        self.dimension.component_count() * self.component_type.byte_size()
    }

    /// Size of an element as stored in a buffer view. Matrix columns of
    /// 1- and 2-byte components start on 4-byte boundaries.
    pub fn stored_size(self) -> usize {
        match self.dimension.matrix_shape() {
            Some((cols, _)) => cols * self.column_stride(),
            None => self.packed_size(),
        }
    }

    /// Byte distance between consecutive matrix columns in stored form.
    pub fn column_stride(self) -> usize {
        match self.dimension.matrix_shape() {
            Some((_, rows)) => (rows * self.component_type.byte_size() + 3) & !3,
            None => self.packed_size(),
        }
    }

    /// Copy one stored element into its packed form.
    pub fn pack_into(self, stored: &[u8], packed: &mut [u8]) {
        match self.dimension.matrix_shape() {
            Some((cols, rows)) if self.stored_size() != self.packed_size() => {
                let col_bytes = rows * self.component_type.byte_size();
                let stride = self.column_stride();
                for c in 0..cols {
                    packed[c * col_bytes..(c + 1) * col_bytes]
                        .copy_from_slice(&stored[c * stride..c * stride + col_bytes]);
                }
            }
            _ => packed.copy_from_slice(&stored[..self.packed_size()]),
        }
    }

    /// Inverse of [`ElementLayout::pack_into`]. Padding bytes are left untouched.
    pub fn unpack_into(self, packed: &[u8], stored: &mut [u8]) {
        match self.dimension.matrix_shape() {
            Some((cols, rows)) if self.stored_size() != self.packed_size() => {
                let col_bytes = rows * self.component_type.byte_size();
                let stride = self.column_stride();
                for c in 0..cols {
                    stored[c * stride..c * stride + col_bytes]
                        .copy_from_slice(&packed[c * col_bytes..(c + 1) * col_bytes]);
                }
            }
            _ => stored[..self.packed_size()].copy_from_slice(packed),
        }
    }
}

/// Primitive topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveMode {
    Points = 0,
    Lines = 1,
    LineLoop = 2,
    LineStrip = 3,
    #[default]
    Triangles = 4,
    TriangleStrip = 5,
    TriangleFan = 6,
}

impl PrimitiveMode {
    pub fn from_gl(value: u32) -> Option<Self> {
        match value {
            0 => Some(PrimitiveMode::Points),
            1 => Some(PrimitiveMode::Lines),
            2 => Some(PrimitiveMode::LineLoop),
            3 => Some(PrimitiveMode::LineStrip),
            4 => Some(PrimitiveMode::Triangles),
            5 => Some(PrimitiveMode::TriangleStrip),
            6 => Some(PrimitiveMode::TriangleFan),
            _ => None,
        }
    }

    pub fn gl(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

impl AlphaMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPAQUE" => Some(AlphaMode::Opaque),
            "MASK" => Some(AlphaMode::Mask),
            "BLEND" => Some(AlphaMode::Blend),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlphaMode::Opaque => "OPAQUE",
            AlphaMode::Mask => "MASK",
            AlphaMode::Blend => "BLEND",
        }
    }
}

/// Animation sampler interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
    CubicSpline,
}

impl Interpolation {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LINEAR" => Some(Interpolation::Linear),
            "STEP" => Some(Interpolation::Step),
            "CUBICSPLINE" => Some(Interpolation::CubicSpline),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Interpolation::Linear => "LINEAR",
            Interpolation::Step => "STEP",
            Interpolation::CubicSpline => "CUBICSPLINE",
        }
    }
}

/// Node property animated by a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetPath {
    Translation,
    Rotation,
    Scale,
    Weights,
    /// Paths introduced by extensions, kept as written.
    Other(String),
}

impl TargetPath {
    pub fn parse(s: &str) -> Self {
        match s {
            "translation" => TargetPath::Translation,
            "rotation" => TargetPath::Rotation,
            "scale" => TargetPath::Scale,
            "weights" => TargetPath::Weights,
            other => TargetPath::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TargetPath::Translation => "translation",
            TargetPath::Rotation => "rotation",
            TargetPath::Scale => "scale",
            TargetPath::Weights => "weights",
            TargetPath::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    ArrayBuffer = 34962,
    ElementArrayBuffer = 34963,
}

impl BufferTarget {
    pub fn from_gl(value: u32) -> Option<Self> {
        match value {
            34962 => Some(BufferTarget::ArrayBuffer),
            34963 => Some(BufferTarget::ElementArrayBuffer),
            _ => None,
        }
    }

    pub fn gl(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MagFilter {
    Nearest = 9728,
    Linear = 9729,
}

impl MagFilter {
    pub fn from_gl(value: u32) -> Option<Self> {
        match value {
            9728 => Some(MagFilter::Nearest),
            9729 => Some(MagFilter::Linear),
            _ => None,
        }
    }

    pub fn gl(self) -> u32 {
        self as u32
    }
}

/// Minification filter, including the mipmap selection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MinFilter {
    Nearest = 9728,
    Linear = 9729,
    NearestMipmapNearest = 9984,
    LinearMipmapNearest = 9985,
    NearestMipmapLinear = 9986,
    LinearMipmapLinear = 9987,
}

impl MinFilter {
    pub fn from_gl(value: u32) -> Option<Self> {
        match value {
            9728 => Some(MinFilter::Nearest),
            9729 => Some(MinFilter::Linear),
            9984 => Some(MinFilter::NearestMipmapNearest),
            9985 => Some(MinFilter::LinearMipmapNearest),
            9986 => Some(MinFilter::NearestMipmapLinear),
            9987 => Some(MinFilter::LinearMipmapLinear),
            _ => None,
        }
    }

    pub fn gl(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    ClampToEdge = 33071,
    MirroredRepeat = 33648,
    #[default]
    Repeat = 10497,
}

impl WrapMode {
    pub fn from_gl(value: u32) -> Option<Self> {
        match value {
            33071 => Some(WrapMode::ClampToEdge),
            33648 => Some(WrapMode::MirroredRepeat),
            10497 => Some(WrapMode::Repeat),
            _ => None,
        }
    }

    pub fn gl(self) -> u32 {
        self as u32
    }
}
