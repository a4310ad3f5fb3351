use crate::{
    error::{VoxweaveError, VoxweaveResult},
    tensor::Tensor,
};

/// Exact Euclidean distance transform of an indicator tensor: for every
/// element, the distance (in physical units, per-axis `sampling`) to the
/// nearest nonzero element. All-zero input yields +inf everywhere.
pub fn distance(indicator: &Tensor, sampling: &[f64]) -> VoxweaveResult<Tensor> {
    let mut squared = squared_distance(indicator, sampling)?;
    for v in squared.data_mut() {
        *v = v.sqrt();
    }
    Ok(squared)
}

pub fn squared_distance(indicator: &Tensor, sampling: &[f64]) -> VoxweaveResult<Tensor> {
    if sampling.len() != indicator.ndim() {
        return Err(VoxweaveError::data_integrity(format!(
            "sampling {sampling:?} does not match tensor shape {:?}",
            indicator.shape()
        )));
    }
    if sampling.iter().any(|&s| !s.is_finite() || s <= 0.0) {
        return Err(VoxweaveError::config(format!(
            "sampling {sampling:?} must be finite and strictly positive"
        )));
    }

    let mut field: Vec<f64> = indicator
        .data()
        .iter()
        .map(|&v| if v != 0.0 { 0.0 } else { f64::INFINITY })
        .collect();

    // One lower-envelope sweep per axis, applied to every lane along it.
    let shape = indicator.shape();
    let mut lane = Vec::new();
    let mut scratch = Scratch::default();
    for axis in 0..shape.len() {
        let extent = shape[axis];
        if extent == 0 {
            continue;
        }
        let inner: usize = shape[axis + 1..].iter().product();
        let outer: usize = shape[..axis].iter().product();
        for o in 0..outer {
            for i in 0..inner {
                let base = o * extent * inner + i;
                lane.clear();
                lane.extend((0..extent).map(|k| field[base + k * inner]));
                envelope_1d(&lane, sampling[axis], &mut scratch);
                for (k, &v) in scratch.out.iter().enumerate() {
                    field[base + k * inner] = v;
                }
            }
        }
    }

    Tensor::from_vec(shape, field.into_iter().map(|v| v as f32).collect())
}

#[derive(Default)]
struct Scratch {
    hull: Vec<usize>,
    boundary: Vec<f64>,
    out: Vec<f64>,
}

/// Felzenszwalb-Huttenlocher lower envelope of parabolas on an anisotropic
/// grid: out[i] = min_q ((i-q)*spacing)^2 + f[q]. Infinite entries carry no
/// parabola; a lane without any finite entry stays infinite.
fn envelope_1d(f: &[f64], spacing: f64, scratch: &mut Scratch) {
    let n = f.len();
    scratch.hull.clear();
    scratch.boundary.clear();
    scratch.out.clear();

    for q in 0..n {
        if !f[q].is_finite() {
            continue;
        }
        let xq = q as f64 * spacing;
        while let Some(&top) = scratch.hull.last() {
            let xt = top as f64 * spacing;
            // abscissa where parabola q overtakes the current hull top
            let s = ((f[q] + xq * xq) - (f[top] + xt * xt)) / (2.0 * xq - 2.0 * xt);
            if s <= *scratch.boundary.last().unwrap_or(&f64::NEG_INFINITY) {
                scratch.hull.pop();
                scratch.boundary.pop();
            } else {
                break;
            }
        }
        if scratch.hull.is_empty() {
            scratch.hull.push(q);
        } else {
            let top = *scratch.hull.last().unwrap_or(&0);
            let xt = top as f64 * spacing;
            let s = ((f[q] + xq * xq) - (f[top] + xt * xt)) / (2.0 * xq - 2.0 * xt);
            scratch.hull.push(q);
            scratch.boundary.push(s);
        }
    }

    if scratch.hull.is_empty() {
        scratch.out.extend(std::iter::repeat_n(f64::INFINITY, n));
        return;
    }

    let mut k = 0;
    for i in 0..n {
        let x = i as f64 * spacing;
        while k < scratch.boundary.len() && scratch.boundary[k] < x {
            k += 1;
        }
        let q = scratch.hull[k];
        let d = x - q as f64 * spacing;
        scratch.out.push(d * d + f[q]);
    }
}
