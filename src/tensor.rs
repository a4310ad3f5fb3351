use crate::error::{VoxweaveError, VoxweaveResult};

/// Dense row-major f32 buffer with an explicit shape.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    pub fn zeros(shape: &[usize]) -> Self {
        Self::filled(shape, 0.0)
    }

    pub fn filled(shape: &[usize], value: f32) -> Self {
        Self {
            shape: shape.to_vec(),
            data: vec![value; element_count(shape)],
        }
    }

    pub fn from_vec(shape: &[usize], data: Vec<f32>) -> VoxweaveResult<Self> {
        if data.len() != element_count(shape) {
            return Err(VoxweaveError::data_integrity(format!(
                "tensor shape {shape:?} needs {} elements, got {}",
                element_count(shape),
                data.len()
            )));
        }
        Ok(Self {
            shape: shape.to_vec(),
            data,
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn get(&self, index: &[usize]) -> f32 {
        self.data[self.flat_index(index)]
    }

    fn strides(&self) -> Vec<usize> {
        strides_for(&self.shape)
    }

    fn flat_index(&self, index: &[usize]) -> usize {
        debug_assert_eq!(index.len(), self.ndim());
        index
            .iter()
            .zip(self.strides())
            .map(|(&i, s)| i * s)
            .sum()
    }

    pub fn crop(&self, start: &[usize], size: &[usize]) -> VoxweaveResult<Tensor> {
        if start.len() != self.ndim() || size.len() != self.ndim() {
            return Err(VoxweaveError::data_integrity(format!(
                "crop start {start:?} / size {size:?} do not match tensor shape {:?}",
                self.shape
            )));
        }
        for axis in 0..self.ndim() {
            if start[axis] + size[axis] > self.shape[axis] {
                return Err(VoxweaveError::data_integrity(format!(
                    "crop [{}, {}) exceeds extent {} on axis {axis}",
                    start[axis],
                    start[axis] + size[axis],
                    self.shape[axis]
                )));
            }
        }

        let strides = self.strides();
        let mut out = Vec::with_capacity(element_count(size));
        for_each_index(size, |index| {
            let src: usize = index
                .iter()
                .enumerate()
                .map(|(axis, &i)| (start[axis] + i) * strides[axis])
                .sum();
            out.push(self.data[src]);
        });
        Tensor::from_vec(size, out)
    }

    /// Pads with a constant fill, `before[axis]` elements in front and
    /// `after[axis]` behind, per axis.
    pub fn pad(&self, before: &[usize], after: &[usize], fill: f32) -> VoxweaveResult<Tensor> {
        if before.len() != self.ndim() || after.len() != self.ndim() {
            return Err(VoxweaveError::data_integrity(format!(
                "pad widths {before:?} / {after:?} do not match tensor shape {:?}",
                self.shape
            )));
        }
        let out_shape: Vec<usize> = (0..self.ndim())
            .map(|axis| before[axis] + self.shape[axis] + after[axis])
            .collect();
        let out_strides = strides_for(&out_shape);
        let mut out = vec![fill; element_count(&out_shape)];
        let mut cursor = 0;
        for_each_index(&self.shape, |index| {
            let dst: usize = index
                .iter()
                .enumerate()
                .map(|(axis, &i)| (before[axis] + i) * out_strides[axis])
                .sum();
            out[dst] = self.data[cursor];
            cursor += 1;
        });
        Tensor::from_vec(&out_shape, out)
    }

    /// Reduces by integer factors, replacing each block with its mean.
    /// Every axis extent must be divisible by its factor.
    pub fn downsample_mean(&self, factors: &[usize]) -> VoxweaveResult<Tensor> {
        if factors.len() != self.ndim() || factors.iter().any(|&f| f == 0) {
            return Err(VoxweaveError::data_integrity(format!(
                "downsample factors {factors:?} do not match tensor shape {:?}",
                self.shape
            )));
        }
        for axis in 0..self.ndim() {
            if self.shape[axis] % factors[axis] != 0 {
                return Err(VoxweaveError::data_integrity(format!(
                    "axis {axis} extent {} is not divisible by factor {}",
                    self.shape[axis], factors[axis]
                )));
            }
        }

        let out_shape: Vec<usize> = self
            .shape
            .iter()
            .zip(factors)
            .map(|(&s, &f)| s / f)
            .collect();
        let strides = self.strides();
        let block_len = element_count(factors) as f32;
        let mut out = Vec::with_capacity(element_count(&out_shape));
        for_each_index(&out_shape, |index| {
            let base: usize = index
                .iter()
                .enumerate()
                .map(|(axis, &i)| i * factors[axis] * strides[axis])
                .sum();
            let mut sum = 0.0f64;
            for_each_index(factors, |offset| {
                let src: usize = offset
                    .iter()
                    .enumerate()
                    .map(|(axis, &o)| o * strides[axis])
                    .sum();
                sum += f64::from(self.data[base + src]);
            });
            out.push((sum / f64::from(block_len)) as f32);
        });
        Tensor::from_vec(&out_shape, out)
    }

    /// Collapses one axis by applying `reduce` to every lane along it.
    pub fn project(
        &self,
        axis: usize,
        reduce: impl Fn(&[f32]) -> f32,
    ) -> VoxweaveResult<Tensor> {
        if axis >= self.ndim() {
            return Err(VoxweaveError::data_integrity(format!(
                "projection axis {axis} out of range for tensor shape {:?}",
                self.shape
            )));
        }
        let mut out_shape = self.shape.clone();
        out_shape.remove(axis);

        let extent = self.shape[axis];
        let inner: usize = self.shape[axis + 1..].iter().product();
        let outer: usize = self.shape[..axis].iter().product();
        let mut out = Vec::with_capacity(outer * inner);
        let mut lane = vec![0.0f32; extent];
        for o in 0..outer {
            for i in 0..inner {
                let base = o * extent * inner + i;
                for (k, slot) in lane.iter_mut().enumerate() {
                    *slot = self.data[base + k * inner];
                }
                out.push(reduce(&lane));
            }
        }
        Tensor::from_vec(&out_shape, out)
    }
}

fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

fn strides_for(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    strides
}

/// Visits every index of `shape` in row-major order.
pub(crate) fn for_each_index(shape: &[usize], mut visit: impl FnMut(&[usize])) {
    if shape.iter().any(|&s| s == 0) {
        return;
    }
    let mut index = vec![0usize; shape.len()];
    loop {
        visit(&index);
        let mut axis = shape.len();
        loop {
            if axis == 0 {
                return;
            }
            axis -= 1;
            index[axis] += 1;
            if index[axis] < shape[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting(shape: &[usize]) -> Tensor {
        let n = shape.iter().product::<usize>();
        Tensor::from_vec(shape, (0..n).map(|v| v as f32).collect()).unwrap()
    }

    #[test]
    fn from_vec_checks_element_count() {
        assert!(Tensor::from_vec(&[2, 3], vec![0.0; 5]).is_err());
        assert!(Tensor::from_vec(&[2, 3], vec![0.0; 6]).is_ok());
    }

    #[test]
    fn crop_extracts_sub_block() {
        let t = counting(&[4, 4]);
        let c = t.crop(&[1, 1], &[2, 2]).unwrap();
        assert_eq!(c.shape(), &[2, 2]);
        assert_eq!(c.data(), &[5.0, 6.0, 9.0, 10.0]);
    }

    #[test]
    fn crop_out_of_bounds_fails() {
        let t = counting(&[4, 4]);
        assert!(t.crop(&[3, 0], &[2, 4]).is_err());
    }

    #[test]
    fn pad_places_data_at_offset() {
        let t = counting(&[2, 2]);
        let p = t.pad(&[1, 0], &[0, 1], -1.0).unwrap();
        assert_eq!(p.shape(), &[3, 3]);
        assert_eq!(
            p.data(),
            &[-1.0, -1.0, -1.0, 0.0, 1.0, -1.0, 2.0, 3.0, -1.0]
        );
    }

    #[test]
    fn pad_then_crop_is_identity() {
        let t = counting(&[2, 3]);
        let p = t.pad(&[2, 1], &[1, 2], 0.0).unwrap();
        assert_eq!(p.crop(&[2, 1], &[2, 3]).unwrap(), t);
    }

    #[test]
    fn downsample_mean_averages_blocks() {
        let t = Tensor::from_vec(&[2, 4], vec![0.0, 2.0, 4.0, 6.0, 0.0, 2.0, 4.0, 6.0]).unwrap();
        let d = t.downsample_mean(&[2, 2]).unwrap();
        assert_eq!(d.shape(), &[1, 2]);
        assert_eq!(d.data(), &[1.0, 5.0]);
    }

    #[test]
    fn downsample_requires_divisible_extents() {
        let t = counting(&[3, 4]);
        assert!(t.downsample_mean(&[2, 2]).is_err());
    }

    #[test]
    fn project_max_collapses_axis() {
        let t = counting(&[3, 2, 2]);
        let p = t
            .project(0, |lane| lane.iter().cloned().fold(f32::MIN, f32::max))
            .unwrap();
        assert_eq!(p.shape(), &[2, 2]);
        assert_eq!(p.data(), &[8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn project_middle_axis() {
        let t = counting(&[2, 3, 2]);
        let p = t.project(1, |lane| lane.iter().sum()).unwrap();
        assert_eq!(p.shape(), &[2, 2]);
        assert_eq!(p.data(), &[6.0, 9.0, 24.0, 27.0]);
    }
}
