use voxweave::{
    ArrayKey, ArraySpec, ArraySource, BatchRequest, Coordinate, Filter, Pipeline, RandomLocation,
    RequestSpec, Roi, Tensor, VoxweaveError,
};

fn roi_1d(offset: i64, size: i64) -> Roi {
    Roi::new(&Coordinate::from([offset]), &Coordinate::from([size])).unwrap()
}

fn build_pipeline() -> Pipeline {
    // values equal their world coordinate, so the sampled origin is readable
    // straight from the data
    let spec = ArraySpec::new(roi_1d(50, 50), Coordinate::ones(1), true);
    let data = Tensor::from_vec(&[50], (50..100).map(|v| v as f32).collect()).unwrap();
    let source = ArraySource::new().with_array("raw", data, spec).unwrap();
    Pipeline::build(RandomLocation::new().over(source)).unwrap()
}

#[test]
fn samples_inside_the_upstream_extent_and_restores_the_requested_roi() {
    let mut pipeline = build_pipeline();

    for seed in 0..10 {
        let request = BatchRequest::new(seed).with("raw", RequestSpec::new(roi_1d(0, 32)));
        let batch = pipeline.request_batch(&request).unwrap();
        let array = batch.get(&ArrayKey::from("raw")).unwrap();

        assert_eq!(array.spec.roi, roi_1d(0, 32));
        let first = array.data.data()[0];
        assert!((50.0..=68.0).contains(&first), "origin {first} out of range");
        for (i, &v) in array.data.data().iter().enumerate() {
            assert_eq!(v, first + i as f32);
        }
    }
}

#[test]
fn same_seed_samples_the_same_location() {
    let request = BatchRequest::new(77).with("raw", RequestSpec::new(roi_1d(0, 32)));

    let mut a = build_pipeline();
    let mut b = build_pipeline();
    assert_eq!(
        a.request_batch(&request).unwrap().get(&ArrayKey::from("raw")).unwrap().data.data(),
        b.request_batch(&request).unwrap().get(&ArrayKey::from("raw")).unwrap().data.data()
    );
}

#[test]
fn different_seeds_reach_different_locations() {
    let mut pipeline = build_pipeline();
    let mut origins = Vec::new();
    for seed in 0..10 {
        let request = BatchRequest::new(seed).with("raw", RequestSpec::new(roi_1d(0, 32)));
        let batch = pipeline.request_batch(&request).unwrap();
        origins.push(batch.get(&ArrayKey::from("raw")).unwrap().data.data()[0]);
    }
    origins.sort_by(f32::total_cmp);
    origins.dedup();
    assert!(origins.len() > 1);
}

#[test]
fn oversized_request_has_no_valid_shift() {
    let mut pipeline = build_pipeline();
    let request = BatchRequest::new(0).with("raw", RequestSpec::new(roi_1d(0, 60)));
    assert!(matches!(
        pipeline.request_batch(&request),
        Err(VoxweaveError::Negotiation(_))
    ));
}

#[test]
fn shift_respects_coarser_voxel_sizes() {
    let spec = ArraySpec::new(roi_1d(0, 40), Coordinate::from([4]), true);
    let data = Tensor::from_vec(&[10], (0..10).map(|v| (v * 4) as f32).collect()).unwrap();
    let source = ArraySource::new().with_array("raw", data, spec).unwrap();
    let mut pipeline = Pipeline::build(RandomLocation::new().over(source)).unwrap();

    for seed in 0..8 {
        let request = BatchRequest::new(seed).with("raw", RequestSpec::new(roi_1d(0, 16)));
        let batch = pipeline.request_batch(&request).unwrap();
        let origin = batch.get(&ArrayKey::from("raw")).unwrap().data.data()[0];
        // origins are world coordinates of voxel boundaries
        assert_eq!(origin as i64 % 4, 0);
        assert!((0..=24).contains(&(origin as i64)));
    }
}
