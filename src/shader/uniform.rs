use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

/// A uniform value held in the program manager's shared pool.
///
/// Values are stored as plain arrays so they can be pushed to any
/// compiled program without further conversion; the `From` impls accept
/// the `glam` types the rest of the crate computes with.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Int(i32),
    IntArray(Vec<i32>),
    Mat3([f32; 9]),
    Mat4([[f32; 4]; 4]),
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int(value)
    }
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        UniformValue::Int(value as i32)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(value: [f32; 2]) -> Self {
        UniformValue::Vec2(value)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(value: [f32; 3]) -> Self {
        UniformValue::Vec3(value)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(value: [f32; 4]) -> Self {
        UniformValue::Vec4(value)
    }
}

impl From<Vec<i32>> for UniformValue {
    fn from(value: Vec<i32>) -> Self {
        UniformValue::IntArray(value)
    }
}

impl From<Vec2> for UniformValue {
    fn from(value: Vec2) -> Self {
        UniformValue::Vec2(value.to_array())
    }
}

impl From<Vec3> for UniformValue {
    fn from(value: Vec3) -> Self {
        UniformValue::Vec3(value.to_array())
    }
}

impl From<Vec4> for UniformValue {
    fn from(value: Vec4) -> Self {
        UniformValue::Vec4(value.to_array())
    }
}

impl From<Mat3> for UniformValue {
    fn from(value: Mat3) -> Self {
        UniformValue::Mat3(value.to_cols_array())
    }
}

impl From<Mat4> for UniformValue {
    fn from(value: Mat4) -> Self {
        UniformValue::Mat4(value.to_cols_array_2d())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_converts_column_major() {
        let value: UniformValue = Mat4::IDENTITY.into();
        match value {
            UniformValue::Mat4(cols) => {
                assert_eq!(cols[0][0], 1.0);
                assert_eq!(cols[3][3], 1.0);
                assert_eq!(cols[0][1], 0.0);
            }
            other => panic!("expected Mat4, got {:?}", other),
        }
    }

    #[test]
    fn bool_becomes_int() {
        assert_eq!(UniformValue::from(true), UniformValue::Int(1));
        assert_eq!(UniformValue::from(false), UniformValue::Int(0));
    }
}
