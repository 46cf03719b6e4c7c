// ABOUTME: Complex number arithmetic used when evaluation falls out of the reals

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Imaginary parts below this collapse a complex result back to a real.
pub const REAL_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub fn new(re: f64, im: f64) -> Self {
        Complex { re, im }
    }

    pub fn from_real(re: f64) -> Self {
        Complex { re, im: 0.0 }
    }

    pub fn i() -> Self {
        Complex { re: 0.0, im: 1.0 }
    }

    pub fn is_real(&self) -> bool {
        self.im.abs() < REAL_EPSILON
    }

    pub fn modulus(&self) -> f64 {
        self.re.hypot(self.im)
    }

    pub fn argument(&self) -> f64 {
        self.im.atan2(self.re)
    }

    pub fn conjugate(&self) -> Self {
        Complex::new(self.re, -self.im)
    }

    pub fn exp(&self) -> Self {
        let magnitude = self.re.exp();
        Complex::new(magnitude * self.im.cos(), magnitude * self.im.sin())
    }

    /// Principal branch of the natural logarithm.
    pub fn ln(&self) -> Self {
        Complex::new(self.modulus().ln(), self.argument())
    }

    /// Principal square root.
    pub fn sqrt(&self) -> Self {
        let magnitude = self.modulus().sqrt();
        let angle = self.argument() / 2.0;
        Complex::new(magnitude * angle.cos(), magnitude * angle.sin())
    }

    /// Complex power through the exponential: z^w = exp(w ln z).
    pub fn pow(&self, exponent: Complex) -> Self {
        if self.re == 0.0 && self.im == 0.0 {
            return if exponent.re == 0.0 && exponent.im == 0.0 {
                Complex::from_real(1.0)
            } else {
                Complex::from_real(0.0)
            };
        }
        (exponent * self.ln()).exp()
    }

    pub fn sin(&self) -> Self {
        Complex::new(
            self.re.sin() * self.im.cosh(),
            self.re.cos() * self.im.sinh(),
        )
    }

    pub fn cos(&self) -> Self {
        Complex::new(
            self.re.cos() * self.im.cosh(),
            -(self.re.sin() * self.im.sinh()),
        )
    }

    pub fn tan(&self) -> Self {
        self.sin() / self.cos()
    }

    pub fn sinh(&self) -> Self {
        Complex::new(
            self.re.sinh() * self.im.cos(),
            self.re.cosh() * self.im.sin(),
        )
    }

    pub fn cosh(&self) -> Self {
        Complex::new(
            self.re.cosh() * self.im.cos(),
            self.re.sinh() * self.im.sin(),
        )
    }

    pub fn tanh(&self) -> Self {
        self.sinh() / self.cosh()
    }
}

impl Add for Complex {
    type Output = Complex;
    fn add(self, rhs: Complex) -> Complex {
        Complex::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl Sub for Complex {
    type Output = Complex;
    fn sub(self, rhs: Complex) -> Complex {
        Complex::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl Mul for Complex {
    type Output = Complex;
    fn mul(self, rhs: Complex) -> Complex {
        Complex::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

impl Div for Complex {
    type Output = Complex;
    fn div(self, rhs: Complex) -> Complex {
        let denom = rhs.re * rhs.re + rhs.im * rhs.im;
        Complex::new(
            (self.re * rhs.re + self.im * rhs.im) / denom,
            (self.im * rhs.re - self.re * rhs.im) / denom,
        )
    }
}

impl Neg for Complex {
    type Output = Complex;
    fn neg(self) -> Complex {
        Complex::new(-self.re, -self.im)
    }
}

impl fmt::Display for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.im.abs() < REAL_EPSILON {
            write!(f, "{}", self.re)
        } else if self.re.abs() < REAL_EPSILON {
            write!(f, "{}i", self.im)
        } else if self.im < 0.0 {
            write!(f, "{} - {}i", self.re, -self.im)
        } else {
            write!(f, "{} + {}i", self.re, self.im)
        }
    }
}
