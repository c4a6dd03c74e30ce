//! Arithmetic element types backing the four wire data types.

use hemark_abi::DataType;

/// One arithmetic element type of the ABI.
///
/// Integer arithmetic wraps on overflow; reference results are computed with
/// the same semantics the declared type has natively.
pub trait Element: Copy + Default + PartialEq + std::fmt::Debug + 'static {
    const DATA_TYPE: DataType;

    fn zero() -> Self;
    fn add(self, rhs: Self) -> Self;
    fn mul(self, rhs: Self) -> Self;
    fn from_f64(v: f64) -> Self;
    fn to_f64(self) -> f64;
}

impl Element for i32 {
    const DATA_TYPE: DataType = DataType::Int32;

    fn zero() -> Self {
        0
    }
    fn add(self, rhs: Self) -> Self {
        self.wrapping_add(rhs)
    }
    fn mul(self, rhs: Self) -> Self {
        self.wrapping_mul(rhs)
    }
    fn from_f64(v: f64) -> Self {
        v as i32
    }
    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Element for i64 {
    const DATA_TYPE: DataType = DataType::Int64;

    fn zero() -> Self {
        0
    }
    fn add(self, rhs: Self) -> Self {
        self.wrapping_add(rhs)
    }
    fn mul(self, rhs: Self) -> Self {
        self.wrapping_mul(rhs)
    }
    fn from_f64(v: f64) -> Self {
        v as i64
    }
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Element for f32 {
    const DATA_TYPE: DataType = DataType::Float32;

    fn zero() -> Self {
        0.0
    }
    fn add(self, rhs: Self) -> Self {
        self + rhs
    }
    fn mul(self, rhs: Self) -> Self {
        self * rhs
    }
    fn from_f64(v: f64) -> Self {
        v as f32
    }
    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Element for f64 {
    const DATA_TYPE: DataType = DataType::Float64;

    fn zero() -> Self {
        0.0
    }
    fn add(self, rhs: Self) -> Self {
        self + rhs
    }
    fn mul(self, rhs: Self) -> Self {
        self * rhs
    }
    fn from_f64(v: f64) -> Self {
        v
    }
    fn to_f64(self) -> f64 {
        self
    }
}
