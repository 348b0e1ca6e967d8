use bitinfo::pipeline::output_path;
use bitinfo::{open_dataset, to_uncompressed, Dataset, Executor, Flow, FlowParameters, Variable};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::PathBuf;

const IMAX: usize = 3;

/// Split a noisy field along time into `IMAX` files
fn flow_paths(dir: &tempfile::TempDir) -> Vec<PathBuf> {
    let (nt, ny, nx) = (12, 16, 40);
    let mut rng = StdRng::seed_from_u64(7);
    let values: Vec<f64> = (0..nt * ny * nx)
        .map(|i| {
            let (y, x) = ((i / nx) % ny, i % nx);
            1000.0 + 30.0 * ((x + y) as f64 / 6.0).sin() + rng.gen_range(-0.01..0.01)
        })
        .collect();
    let ds = Dataset::new()
        .with_data_var(Variable::from_vec("pressure", &["time", "y", "x"], &[nt, ny, nx], values).unwrap())
        .unwrap();

    let stride = nt / IMAX;
    (0..IMAX)
        .map(|i| {
            let path = dir.path().join(format!("file_{i}.bitc"));
            let part = ds.isel("time", stride * i..stride * (i + 1)).unwrap();
            to_uncompressed(&part, &path).unwrap();
            path
        })
        .collect()
}

#[test]
fn test_flow_runs_for_each_executor() {
    for executor in [Executor::Sequential, Executor::Parallel { threads: 2 }] {
        let dir = tempfile::tempdir().unwrap();
        let paths = flow_paths(&dir);
        let result = Flow::new(&paths)
            .with_executor(executor)
            .run(&FlowParameters::default())
            .unwrap();

        assert_eq!(result.outputs.len(), IMAX);
        for (input, output) in paths.iter().zip(&result.outputs) {
            assert_eq!(*output, output_path(input));
            let rounded = open_dataset(output).unwrap();
            assert_eq!(rounded.dims(), open_dataset(input).unwrap().dims());
            assert!(fs::metadata(output).unwrap().len() < fs::metadata(input).unwrap().len());
        }
        assert!(dir.path().join("file_0.json").exists());
    }
}

#[test]
fn test_flow_inflevel_parameter() {
    let dir = tempfile::tempdir().unwrap();
    let flow = Flow::new(flow_paths(&dir));
    let low = flow
        .run(&FlowParameters::default().with_inflevel(0.90).with_overwrite(true))
        .unwrap();
    let high = flow
        .run(&FlowParameters::default().with_inflevel(0.999_999_99).with_overwrite(true))
        .unwrap();
    assert_ne!(
        low.keepbits.get("pressure").unwrap(),
        high.keepbits.get("pressure").unwrap()
    );
}

#[test]
fn test_existing_outputs_are_kept_without_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let paths = flow_paths(&dir);
    let marker = output_path(&paths[1]);
    fs::write(&marker, b"placeholder").unwrap();

    Flow::new(&paths).run(&FlowParameters::default()).unwrap();
    assert_eq!(fs::read(&marker).unwrap(), b"placeholder");
    assert!(open_dataset(output_path(&paths[0])).is_ok());

    Flow::new(&paths)
        .run(&FlowParameters::default().with_overwrite(true))
        .unwrap();
    assert!(open_dataset(&marker).is_ok());
}
