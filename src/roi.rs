use crate::{
    coord::Coordinate,
    error::{VoxweaveError, VoxweaveResult},
};

/// One axis of a region: either a half-open span `[offset, offset+size)` in
/// world units, or unbounded (no finite offset or extent known).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum AxisSpan {
    Unbounded,
    Span { offset: i64, size: i64 },
}

impl AxisSpan {
    pub fn is_bounded(&self) -> bool {
        matches!(self, AxisSpan::Span { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Roi(Vec<AxisSpan>);

impl Roi {
    pub fn new(offset: &Coordinate, shape: &Coordinate) -> VoxweaveResult<Self> {
        if offset.dims() != shape.dims() {
            return Err(VoxweaveError::config(format!(
                "roi offset {offset} and shape {shape} have different dimensionality"
            )));
        }
        if !shape.is_non_negative() {
            return Err(VoxweaveError::config(format!(
                "roi shape {shape} has a negative component"
            )));
        }
        Ok(Self(
            offset
                .iter()
                .zip(shape.iter())
                .map(|(offset, size)| AxisSpan::Span { offset, size })
                .collect(),
        ))
    }

    pub fn unbounded(dims: usize) -> Self {
        Self(vec![AxisSpan::Unbounded; dims])
    }

    pub fn from_spans(spans: Vec<AxisSpan>) -> Self {
        Self(spans)
    }

    pub fn dims(&self) -> usize {
        self.0.len()
    }

    pub fn spans(&self) -> &[AxisSpan] {
        &self.0
    }

    pub fn is_bounded(&self) -> bool {
        self.0.iter().all(AxisSpan::is_bounded)
    }

    pub fn bounded_offset(&self) -> VoxweaveResult<Coordinate> {
        self.bounded_components(|offset, _| offset, "offset")
    }

    pub fn bounded_shape(&self) -> VoxweaveResult<Coordinate> {
        self.bounded_components(|_, size| size, "shape")
    }

    pub fn bounded_end(&self) -> VoxweaveResult<Coordinate> {
        self.bounded_components(|offset, size| offset + size, "end")
    }

    fn bounded_components(
        &self,
        pick: impl Fn(i64, i64) -> i64,
        what: &str,
    ) -> VoxweaveResult<Coordinate> {
        self.0
            .iter()
            .map(|span| match span {
                AxisSpan::Span { offset, size } => Ok(pick(*offset, *size)),
                AxisSpan::Unbounded => Err(VoxweaveError::negotiation(format!(
                    "cannot take {what} of roi {self:?}: axis is unbounded"
                ))),
            })
            .collect::<VoxweaveResult<Vec<i64>>>()
            .map(Coordinate::new)
    }

    pub fn with_offset(&self, offset: &Coordinate) -> VoxweaveResult<Roi> {
        let shape = self.bounded_shape()?;
        Roi::new(offset, &shape)
    }

    pub fn with_shape(&self, shape: &Coordinate) -> VoxweaveResult<Roi> {
        let offset = self.bounded_offset()?;
        Roi::new(&offset, shape)
    }

    pub fn shift(&self, delta: &Coordinate) -> Roi {
        debug_assert_eq!(self.dims(), delta.dims());
        Self(
            self.0
                .iter()
                .zip(delta.iter())
                .map(|(span, d)| match span {
                    AxisSpan::Span { offset, size } => AxisSpan::Span {
                        offset: offset + d,
                        size: *size,
                    },
                    AxisSpan::Unbounded => AxisSpan::Unbounded,
                })
                .collect(),
        )
    }

    pub fn grow(&self, before: &Coordinate, after: &Coordinate) -> Roi {
        debug_assert_eq!(self.dims(), before.dims());
        debug_assert_eq!(self.dims(), after.dims());
        Self(
            self.0
                .iter()
                .enumerate()
                .map(|(axis, span)| match span {
                    AxisSpan::Span { offset, size } => AxisSpan::Span {
                        offset: offset - before[axis],
                        size: size + before[axis] + after[axis],
                    },
                    AxisSpan::Unbounded => AxisSpan::Unbounded,
                })
                .collect(),
        )
    }

    /// Component-wise scale, converting voxel units to world units.
    pub fn scale(&self, factor: &Coordinate) -> Roi {
        debug_assert_eq!(self.dims(), factor.dims());
        Self(
            self.0
                .iter()
                .enumerate()
                .map(|(axis, span)| match span {
                    AxisSpan::Span { offset, size } => AxisSpan::Span {
                        offset: offset * factor[axis],
                        size: size * factor[axis],
                    },
                    AxisSpan::Unbounded => AxisSpan::Unbounded,
                })
                .collect(),
        )
    }

    /// Component-wise exact division, converting world units to voxel units.
    /// Fails if any bounded component is not aligned to `step`.
    pub fn divide(&self, step: &Coordinate) -> VoxweaveResult<Roi> {
        debug_assert_eq!(self.dims(), step.dims());
        self.0
            .iter()
            .enumerate()
            .map(|(axis, span)| match span {
                AxisSpan::Span { offset, size } => {
                    let s = step[axis];
                    if s <= 0 || offset % s != 0 || size % s != 0 {
                        return Err(VoxweaveError::negotiation(format!(
                            "roi {self:?} is not aligned to step {step} on axis {axis}"
                        )));
                    }
                    Ok(AxisSpan::Span {
                        offset: offset / s,
                        size: size / s,
                    })
                }
                AxisSpan::Unbounded => Ok(AxisSpan::Unbounded),
            })
            .collect::<VoxweaveResult<Vec<AxisSpan>>>()
            .map(Self)
    }

    pub fn intersect(&self, other: &Roi) -> VoxweaveResult<Roi> {
        self.check_dims(other)?;
        Ok(Self(
            self.0
                .iter()
                .zip(other.0.iter())
                .map(|(a, b)| match (a, b) {
                    (AxisSpan::Unbounded, span) | (span, AxisSpan::Unbounded) => *span,
                    (
                        AxisSpan::Span {
                            offset: ao,
                            size: asz,
                        },
                        AxisSpan::Span {
                            offset: bo,
                            size: bsz,
                        },
                    ) => {
                        let offset = (*ao).max(*bo);
                        let end = (ao + asz).min(bo + bsz);
                        AxisSpan::Span {
                            offset,
                            size: (end - offset).max(0),
                        }
                    }
                })
                .collect(),
        ))
    }

    pub fn union_hull(&self, other: &Roi) -> VoxweaveResult<Roi> {
        self.check_dims(other)?;
        Ok(Self(
            self.0
                .iter()
                .zip(other.0.iter())
                .map(|(a, b)| match (a, b) {
                    (AxisSpan::Unbounded, _) | (_, AxisSpan::Unbounded) => AxisSpan::Unbounded,
                    (
                        AxisSpan::Span {
                            offset: ao,
                            size: asz,
                        },
                        AxisSpan::Span {
                            offset: bo,
                            size: bsz,
                        },
                    ) => {
                        let offset = (*ao).min(*bo);
                        let end = (ao + asz).max(bo + bsz);
                        AxisSpan::Span {
                            offset,
                            size: end - offset,
                        }
                    }
                })
                .collect(),
        ))
    }

    /// True if `other` lies fully inside this region. Unbounded axes of
    /// `self` contain anything; unbounded axes of `other` only fit inside
    /// unbounded axes of `self`.
    pub fn contains(&self, other: &Roi) -> bool {
        self.dims() == other.dims()
            && self.0.iter().zip(other.0.iter()).all(|(a, b)| match (a, b) {
                (AxisSpan::Unbounded, _) => true,
                (AxisSpan::Span { .. }, AxisSpan::Unbounded) => false,
                (
                    AxisSpan::Span {
                        offset: ao,
                        size: asz,
                    },
                    AxisSpan::Span {
                        offset: bo,
                        size: bsz,
                    },
                ) => ao <= bo && bo + bsz <= ao + asz,
            })
    }

    pub fn is_empty(&self) -> bool {
        self.0
            .iter()
            .any(|span| matches!(span, AxisSpan::Span { size: 0, .. }))
    }

    pub fn without_axis(&self, axis: usize) -> Roi {
        debug_assert!(axis < self.dims());
        let mut spans = self.0.clone();
        spans.remove(axis);
        Self(spans)
    }

    pub fn with_axis_inserted(&self, axis: usize, span: AxisSpan) -> Roi {
        debug_assert!(axis <= self.dims());
        let mut spans = self.0.clone();
        spans.insert(axis, span);
        Self(spans)
    }

    fn check_dims(&self, other: &Roi) -> VoxweaveResult<()> {
        if self.dims() != other.dims() {
            return Err(VoxweaveError::config(format!(
                "roi dimensionality mismatch: {} vs {}",
                self.dims(),
                other.dims()
            )));
        }
        Ok(())
    }
}
