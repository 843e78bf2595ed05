use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use field_core::io::{read_mesh, write_face_field, write_field};
use field_core::{calibrate, CalibrationSettings, FieldSynthesizer, SolveSettings};

use crate::args::{Command, Options};

pub fn run(options: &Options) -> Result<PathBuf> {
    println!("Reading mesh from {}...", options.input.display());
    let mesh = read_mesh(&options.input)
        .with_context(|| format!("failed to load mesh {}", options.input.display()))?;
    tracing::info!(
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        euler_characteristic = mesh.euler_characteristic(),
        "mesh loaded"
    );

    println!("Computing field...");
    let settings = SolveSettings {
        degree: options.degree,
        smoothness: options.smoothness,
        verbose: options.verbose,
        ..SolveSettings::default()
    };
    let mut synthesizer = FieldSynthesizer::new(&mesh, settings)?;
    synthesizer.clear_singularities();
    tracing::info!(s = options.smoothness, t = options.target, "solve parameters");

    let (solution, output) = match options.command() {
        Command::Calibrate { target } => {
            let calibration = calibrate(
                &mut synthesizer,
                target,
                CalibrationSettings {
                    check_monotonicity: options.verbose,
                    ..CalibrationSettings::default()
                },
            )
            .context("calibration failed")?;
            println!(
                "Calibrated lambda = {} (t = {}, target {}, upper bound {})",
                calibration.lambda, calibration.feature, target, calibration.upper_bound
            );
            let solution = synthesizer
                .solution()
                .cloned()
                .context("calibration finished without a field")?;
            let output = if options.sample_to_faces {
                calibrated_output_path(&options.output, calibration.feature, calibration.lambda)
            } else {
                options.output.clone()
            };
            (solution, output)
        }
        Command::Solve(mode) => {
            let solution = synthesizer
                .solve(mode)
                .with_context(|| format!("{mode:?} solve failed"))?;
            (solution, options.output.clone())
        }
    };
    tracing::info!(feature = solution.feature(), mode = ?solution.mode(), "field computed");

    println!("Writing solution to {}...", output.display());
    let geometry = synthesizer.geometry();
    if options.sample_to_faces {
        write_face_field(&output, &mesh, geometry, &solution)?;
    } else {
        write_field(&output, &mesh, geometry, &solution)?;
    }
    Ok(output)
}

/// `<stem>_t<t>_l<lambda>.<ext>` next to `output`.
pub fn calibrated_output_path(output: &Path, t: f64, lambda: f64) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match output.extension() {
        Some(ext) => format!("{stem}_t{t:.4}_l{lambda:.4}.{}", ext.to_string_lossy()),
        None => format!("{stem}_t{t:.4}_l{lambda:.4}"),
    };
    output.with_file_name(name)
}
