use std::fmt;

#[derive(Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Coordinate(Vec<i64>);

impl Coordinate {
    pub fn new(components: impl Into<Vec<i64>>) -> Self {
        Self(components.into())
    }

    pub fn splat(value: i64, dims: usize) -> Self {
        Self(vec![value; dims])
    }

    pub fn zeros(dims: usize) -> Self {
        Self::splat(0, dims)
    }

    pub fn ones(dims: usize) -> Self {
        Self::splat(1, dims)
    }

    pub fn dims(&self) -> usize {
        self.0.len()
    }

    pub fn components(&self) -> &[i64] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.0.iter().copied()
    }

    pub fn is_strictly_positive(&self) -> bool {
        self.0.iter().all(|&c| c > 0)
    }

    pub fn is_non_negative(&self) -> bool {
        self.0.iter().all(|&c| c >= 0)
    }

    /// True if every component is a whole multiple of the matching `step` component.
    pub fn is_multiple_of(&self, step: &Coordinate) -> bool {
        debug_assert_eq!(self.dims(), step.dims());
        self.0
            .iter()
            .zip(step.iter())
            .all(|(&c, s)| s != 0 && c % s == 0)
    }

    pub fn min(&self, other: &Coordinate) -> Coordinate {
        self.zip_map(other, i64::min)
    }

    pub fn max(&self, other: &Coordinate) -> Coordinate {
        self.zip_map(other, i64::max)
    }

    pub fn gcd(&self, other: &Coordinate) -> Coordinate {
        self.zip_map(other, gcd_i64)
    }

    pub fn lcm(&self, other: &Coordinate) -> Coordinate {
        self.zip_map(other, |a, b| {
            if a == 0 || b == 0 {
                0
            } else {
                a / gcd_i64(a, b) * b
            }
        })
    }

    pub fn without_axis(&self, axis: usize) -> Coordinate {
        debug_assert!(axis < self.dims());
        let mut c = self.0.clone();
        c.remove(axis);
        Self(c)
    }

    pub fn with_axis_inserted(&self, axis: usize, value: i64) -> Coordinate {
        debug_assert!(axis <= self.dims());
        let mut c = self.0.clone();
        c.insert(axis, value);
        Self(c)
    }

    fn zip_map(&self, other: &Coordinate, f: impl Fn(i64, i64) -> i64) -> Coordinate {
        debug_assert_eq!(self.dims(), other.dims());
        Self(
            self.0
                .iter()
                .zip(other.0.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        )
    }
}

fn gcd_i64(mut a: i64, mut b: i64) -> i64 {
    a = a.abs();
    b = b.abs();
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

impl fmt::Debug for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coordinate{:?}", self.0)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, ")")
    }
}

impl std::ops::Index<usize> for Coordinate {
    type Output = i64;

    fn index(&self, axis: usize) -> &i64 {
        &self.0[axis]
    }
}

impl From<Vec<i64>> for Coordinate {
    fn from(components: Vec<i64>) -> Self {
        Self(components)
    }
}

impl<const N: usize> From<[i64; N]> for Coordinate {
    fn from(components: [i64; N]) -> Self {
        Self(components.to_vec())
    }
}

macro_rules! componentwise_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl std::ops::$trait<&Coordinate> for &Coordinate {
            type Output = Coordinate;

            fn $method(self, rhs: &Coordinate) -> Coordinate {
                self.zip_map(rhs, |a, b| a $op b)
            }
        }
    };
}

componentwise_op!(Add, add, +);
componentwise_op!(Sub, sub, -);
componentwise_op!(Mul, mul, *);
componentwise_op!(Div, div, /);

impl std::ops::Mul<i64> for &Coordinate {
    type Output = Coordinate;

    fn mul(self, rhs: i64) -> Coordinate {
        Coordinate(self.0.iter().map(|&c| c * rhs).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn componentwise_arithmetic() {
        let a = Coordinate::from([4, 6, 8]);
        let b = Coordinate::from([2, 3, 2]);
        assert_eq!(&a + &b, Coordinate::from([6, 9, 10]));
        assert_eq!(&a - &b, Coordinate::from([2, 3, 6]));
        assert_eq!(&a * &b, Coordinate::from([8, 18, 16]));
        assert_eq!(&a / &b, Coordinate::from([2, 2, 4]));
        assert_eq!(&a * 3, Coordinate::from([12, 18, 24]));
    }

    #[test]
    fn gcd_and_lcm_are_pairwise() {
        let a = Coordinate::from([4, 6, 1]);
        let b = Coordinate::from([6, 4, 5]);
        assert_eq!(a.gcd(&b), Coordinate::from([2, 2, 1]));
        assert_eq!(a.lcm(&b), Coordinate::from([12, 12, 5]));
    }

    #[test]
    fn lcm_of_equal_sizes_is_identity() {
        let a = Coordinate::from([2, 2, 2]);
        assert_eq!(a.lcm(&a), a);
    }

    #[test]
    fn multiples_and_axis_edits() {
        let a = Coordinate::from([4, 6, 0]);
        let step = Coordinate::from([2, 3, 5]);
        assert!(a.is_multiple_of(&step));
        assert!(!Coordinate::from([4, 7, 0]).is_multiple_of(&step));

        assert_eq!(a.without_axis(1), Coordinate::from([4, 0]));
        assert_eq!(
            a.without_axis(1).with_axis_inserted(1, 6),
            Coordinate::from([4, 6, 0])
        );
    }
}
