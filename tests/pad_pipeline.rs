use voxweave::{
    ArrayKey, ArraySpec, ArraySource, BatchRequest, Coordinate, Filter, PadToRequestedSize,
    Pipeline, RandomLocation, RequestSpec, Roi, Tensor,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn roi(offset: [i64; 3], shape: [i64; 3]) -> Roi {
    Roi::new(&Coordinate::from(offset), &Coordinate::from(shape)).unwrap()
}

fn source_10x8x10() -> ArraySource {
    let spec = ArraySpec::new(roi([0, 0, 0], [10, 8, 10]), Coordinate::ones(3), true);
    ArraySource::new()
        .with_array("raw", Tensor::filled(&[10, 8, 10], 1.0), spec)
        .unwrap()
}

#[test]
fn pads_short_axis_to_requested_shape() {
    init_tracing();
    let pipeline = PadToRequestedSize::new(["raw"]).over(source_10x8x10());
    let mut pipeline = Pipeline::build(pipeline).unwrap();

    let request =
        BatchRequest::new(0).with("raw", RequestSpec::new(roi([0, 0, 0], [10, 10, 10])));
    let batch = pipeline.request_batch(&request).unwrap();
    let array = batch.get(&ArrayKey::from("raw")).unwrap();

    assert_eq!(array.data.shape(), &[10, 10, 10]);
    assert_eq!(array.spec.roi, roi([0, 0, 0], [10, 10, 10]));
    for x in 0..10 {
        for z in 0..10 {
            assert_eq!(array.data.get(&[x, 0, z]), 0.0);
            assert_eq!(array.data.get(&[x, 9, z]), 0.0);
            for y in 1..9 {
                assert_eq!(array.data.get(&[x, y, z]), 1.0);
            }
        }
    }
}

#[test]
fn odd_difference_pads_more_in_front() {
    let pipeline = PadToRequestedSize::new(["raw"]).over(source_10x8x10());
    let mut pipeline = Pipeline::build(pipeline).unwrap();

    let request =
        BatchRequest::new(0).with("raw", RequestSpec::new(roi([0, 0, 0], [10, 11, 10])));
    let batch = pipeline.request_batch(&request).unwrap();
    let array = batch.get(&ArrayKey::from("raw")).unwrap();

    assert_eq!(array.data.shape(), &[10, 11, 10]);
    for y in [0, 1, 10] {
        assert_eq!(array.data.get(&[5, y, 5]), 0.0);
    }
    for y in 2..10 {
        assert_eq!(array.data.get(&[5, y, 5]), 1.0);
    }
}

#[test]
fn matching_shape_is_a_no_op() {
    let pipeline = PadToRequestedSize::new(["raw"]).over(source_10x8x10());
    let mut pipeline = Pipeline::build(pipeline).unwrap();

    let request = BatchRequest::new(0).with("raw", RequestSpec::new(roi([0, 0, 0], [10, 8, 10])));
    let batch = pipeline.request_batch(&request).unwrap();
    let array = batch.get(&ArrayKey::from("raw")).unwrap();

    assert_eq!(array.data.shape(), &[10, 8, 10]);
    assert!(array.data.data().iter().all(|&v| v == 1.0));
}

#[test]
fn pads_anisotropic_volume_with_channels_behind_random_location() {
    init_tracing();
    let voxel_size = Coordinate::from([1024, 1024, 35]);
    let world = Roi::new(
        &Coordinate::zeros(3),
        &(&Coordinate::from([512, 100, 10]) * &voxel_size),
    )
    .unwrap();
    let spec = ArraySpec::new(world, voxel_size.clone(), true);
    let source = ArraySource::new()
        .with_array("raw", Tensor::filled(&[1, 512, 100, 10], 1.0), spec)
        .unwrap();

    let pipeline = PadToRequestedSize::new(["raw"]).over(RandomLocation::new().over(source));
    let mut pipeline = Pipeline::build(pipeline).unwrap();

    let requested = Roi::new(
        &Coordinate::zeros(3),
        &(&Coordinate::from([256, 256, 1]) * &voxel_size),
    )
    .unwrap();
    let request = BatchRequest::new(42).with("raw", RequestSpec::new(requested.clone()));
    let batch = pipeline.request_batch(&request).unwrap();
    let array = batch.get(&ArrayKey::from("raw")).unwrap();

    assert_eq!(array.data.shape(), &[1, 256, 256, 1]);
    assert_eq!(array.spec.roi, requested);
}
