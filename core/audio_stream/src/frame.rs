use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Sub};

/// One stereo frame: a left and a right sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Frame {
    pub left: f32,
    pub right: f32,
}

impl Frame {
    pub const ZERO: Self = Self::new(0.0, 0.0);

    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Same sample on both channels.
    pub const fn mono(sample: f32) -> Self {
        Self::new(sample, sample)
    }

    pub fn is_silent(self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }
}

impl From<(f32, f32)> for Frame {
    fn from((left, right): (f32, f32)) -> Self {
        Self::new(left, right)
    }
}

impl From<Frame> for (f32, f32) {
    fn from(frame: Frame) -> Self {
        (frame.left, frame.right)
    }
}

impl Add for Frame {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.left + rhs.left, self.right + rhs.right)
    }
}

impl AddAssign for Frame {
    fn add_assign(&mut self, rhs: Self) {
        self.left += rhs.left;
        self.right += rhs.right;
    }
}

impl Sub for Frame {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.left - rhs.left, self.right - rhs.right)
    }
}

impl Mul<f32> for Frame {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.left * rhs, self.right * rhs)
    }
}

impl Mul<Frame> for f32 {
    type Output = Frame;
    fn mul(self, rhs: Frame) -> Frame {
        rhs * self
    }
}

impl MulAssign<f32> for Frame {
    fn mul_assign(&mut self, rhs: f32) {
        self.left *= rhs;
        self.right *= rhs;
    }
}

impl Div<f32> for Frame {
    type Output = Self;
    fn div(self, rhs: f32) -> Self {
        Self::new(self.left / rhs, self.right / rhs)
    }
}
