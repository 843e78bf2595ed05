use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use field_core::SolveMode;

pub const USAGE: &str = "usage: field_cli OBJ_INPUT_PATH OBJ_OUTPUT_PATH \
[--degree=n] [--alignToCurvature] [--alignToBoundary] [--bisectT] \
[--sampleToFaces] [--s=S] [--t=T] [--l=L] [--verbose]";

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub input: PathBuf,
    pub output: PathBuf,
    pub degree: u32,
    pub align_to_curvature: bool,
    pub align_to_boundary: bool,
    pub bisect_t: bool,
    pub sample_to_faces: bool,
    /// Curvature term weight `s`.
    pub smoothness: f64,
    /// Calibration target `t`.
    pub target: f64,
    /// Alignment weight `λ` for a single curvature-aligned solve.
    pub lambda: f64,
    pub verbose: bool,
}

/// What the run does once the mesh is loaded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Search λ for the target feature value, then keep the field at that λ.
    Calibrate { target: f64 },
    Solve(SolveMode),
}

impl Options {
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let mut positionals = Vec::new();
        let mut options = Options {
            input: PathBuf::new(),
            output: PathBuf::new(),
            degree: 1,
            align_to_curvature: false,
            align_to_boundary: false,
            bisect_t: false,
            sample_to_faces: false,
            smoothness: 0.0,
            target: 0.0,
            lambda: 0.0,
            verbose: false,
        };

        for arg in args {
            if let Some(value) = arg.strip_prefix("--degree=") {
                options.degree = value
                    .parse()
                    .with_context(|| format!("invalid degree '{value}'"))?;
                if options.degree == 0 {
                    bail!("degree must be at least 1");
                }
            } else if let Some(value) = arg.strip_prefix("--s=") {
                options.smoothness = parse_number("s", value)?;
            } else if let Some(value) = arg.strip_prefix("--t=") {
                options.target = parse_number("t", value)?;
            } else if let Some(value) = arg.strip_prefix("--l=") {
                options.lambda = parse_number("l", value)?;
            } else {
                match arg.as_str() {
                    "--alignToCurvature" => options.align_to_curvature = true,
                    "--alignToBoundary" => options.align_to_boundary = true,
                    "--bisectT" => options.bisect_t = true,
                    "--sampleToFaces" => options.sample_to_faces = true,
                    "--verbose" => options.verbose = true,
                    flag if flag.starts_with("--") => bail!("unknown option '{flag}'"),
                    _ => positionals.push(PathBuf::from(arg)),
                }
            }
        }

        let mut positionals = positionals.into_iter();
        match (positionals.next(), positionals.next(), positionals.next()) {
            (Some(input), Some(output), None) => {
                options.input = input;
                options.output = output;
            }
            (_, _, Some(extra)) => bail!("unexpected argument '{}'", extra.display()),
            _ => bail!("input and output paths are required"),
        }

        if options.align_to_boundary {
            options.align_to_curvature = false;
        }
        Ok(options)
    }

    pub fn command(&self) -> Command {
        if self.bisect_t {
            Command::Calibrate {
                target: self.target,
            }
        } else {
            Command::Solve(SolveMode::select(
                self.align_to_curvature,
                self.align_to_boundary,
                self.lambda,
            ))
        }
    }
}

fn parse_number(name: &str, value: &str) -> Result<f64> {
    let number: f64 = value
        .parse()
        .with_context(|| format!("invalid value '{value}' for --{name}"))?;
    if !number.is_finite() {
        bail!("--{name} must be finite, got {value}");
    }
    Ok(number)
}
