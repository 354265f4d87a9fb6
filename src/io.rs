//! Reading and writing data files, model files, and prediction files
//!
//! All three formats are line-oriented UTF-8 text. A data file starts with
//! `n` and `m`, followed by `n` rows of whitespace-separated features with
//! an optional trailing integer class label. Model files have a short
//! header and `Model:`, `Data:`, and `Output:` sections; prediction files
//! mirror the data format with the predicted label appended to each row.

use crate::data::Dataset;
use crate::error::{GenSvmError, Result};
use crate::model::{SvmModel, WeightPolicy};
use nalgebra::DMatrix;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;

fn format_error(file: &Path, message: impl Into<String>) -> GenSvmError {
    GenSvmError::FormatError {
        file: file.display().to_string(),
        message: message.into(),
    }
}

/// Read a dataset from a data file
///
/// Labels are detected from the token count: `n * (m+1)` values after the
/// dimensions mean every row carries a label. Zero-based label sets are
/// shifted up to `1..=K`; negative labels are rejected.
pub fn read_data(path: &Path) -> Result<Dataset> {
    let mut contents = String::new();
    File::open(path)?.read_to_string(&mut contents)?;
    let mut tokens = contents.split_whitespace();

    let n: usize = parse_token(&mut tokens, path, "number of instances")?;
    let m: usize = parse_token(&mut tokens, path, "number of features")?;
    if n == 0 || m == 0 {
        return Err(format_error(path, "dataset has no instances or no features"));
    }

    let rest: Vec<&str> = tokens.collect();
    let has_labels = if rest.len() == n * (m + 1) {
        true
    } else if rest.len() == n * m {
        false
    } else {
        return Err(format_error(
            path,
            format!(
                "expected {} or {} values for {} instances with {} features, found {}",
                n * m,
                n * (m + 1),
                n,
                m,
                rest.len()
            ),
        ));
    };

    let width = if has_labels { m + 1 } else { m };
    let mut x = DMatrix::zeros(n, m);
    let mut y: Vec<i64> = Vec::with_capacity(if has_labels { n } else { 0 });
    for i in 0..n {
        for j in 0..m {
            let token = rest[i * width + j];
            x[(i, j)] = token
                .parse()
                .map_err(|_| format_error(path, format!("invalid feature value '{}'", token)))?;
        }
        if has_labels {
            let token = rest[i * width + m];
            let label: f64 = token
                .parse()
                .map_err(|_| format_error(path, format!("invalid class label '{}'", token)))?;
            y.push(label as i64);
        }
    }

    let y = if has_labels {
        let min = *y.iter().min().expect("labeled data is non-empty");
        if min < 0 {
            return Err(format_error(
                path,
                format!("class labels must be non-negative, found {}", min),
            ));
        }
        // zero-based labels are shifted to 1..=K
        let shift = if min == 0 { 1 } else { 0 };
        Some(y.iter().map(|&v| (v + shift) as usize).collect())
    } else {
        None
    };

    Dataset::from_dense(&x, y)
}

/// Write a trained model to a model file
pub fn write_model(model: &SvmModel, path: &Path) -> Result<()> {
    let mut f = BufWriter::new(File::create(path)?);

    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    writeln!(
        f,
        "Output file for GenSVM (version {})",
        env!("CARGO_PKG_VERSION")
    )?;
    writeln!(f, "Generated on: {} (seconds since epoch)", timestamp)?;
    writeln!(f)?;
    writeln!(f, "Model:")?;
    writeln!(f, "p = {:.16}", model.p)?;
    writeln!(f, "lambda = {:.16}", model.lambda)?;
    writeln!(f, "kappa = {:.16}", model.kappa)?;
    writeln!(f, "epsilon = {:e}", model.epsilon)?;
    writeln!(f, "weight_idx = {}", model.weights.index())?;
    writeln!(f)?;
    writeln!(f, "Data:")?;
    writeln!(
        f,
        "filename = {}",
        model.data_file.as_deref().unwrap_or("-")
    )?;
    writeln!(f, "n = {}", model.n)?;
    writeln!(f, "m = {}", model.m)?;
    writeln!(f, "K = {}", model.k)?;
    writeln!(f)?;
    writeln!(f, "Output:")?;
    for i in 0..=model.m {
        for j in 0..model.k - 1 {
            write!(f, "{:+.16} ", model.v[(i, j)])?;
        }
        writeln!(f)?;
    }

    Ok(())
}

/// Read a model from a model file
///
/// The header lines are skipped; the sections must appear in the order
/// written by [`write_model`].
pub fn read_model(path: &Path) -> Result<SvmModel> {
    let mut contents = String::new();
    File::open(path)?.read_to_string(&mut contents)?;
    let lines: Vec<&str> = contents.lines().map(|l| l.trim_end()).collect();

    if lines.len() < 18 {
        return Err(format_error(path, "model file is truncated"));
    }

    let mut model = SvmModel::new();
    // lines 0..4: header, timestamp, blank, "Model:"
    model.p = parse_field(lines[4], "p", path)?;
    model.lambda = parse_field(lines[5], "lambda", path)?;
    model.kappa = parse_field(lines[6], "kappa", path)?;
    model.epsilon = parse_field(lines[7], "epsilon", path)?;
    let weight_idx: u8 = parse_field(lines[8], "weight_idx", path)?;
    model.weights = WeightPolicy::from_index(weight_idx)?;

    // lines 9, 10: blank, "Data:"
    let filename: String = parse_field(lines[11], "filename", path)?;
    model.data_file = Some(filename);
    model.n = parse_field(lines[12], "n", path)?;
    model.m = parse_field(lines[13], "m", path)?;
    model.k = parse_field(lines[14], "K", path)?;

    // lines 15, 16: blank, "Output:"
    let values: Vec<&str> = lines[17..].iter().flat_map(|l| l.split_whitespace()).collect();
    let expected = (model.m + 1) * (model.k - 1);
    if values.len() != expected {
        return Err(format_error(
            path,
            format!(
                "expected {} weight values, found {}",
                expected,
                values.len()
            ),
        ));
    }

    model.v = DMatrix::zeros(model.m + 1, model.k - 1);
    for i in 0..=model.m {
        for j in 0..model.k - 1 {
            let token = values[i * (model.k - 1) + j];
            model.v[(i, j)] = token
                .parse()
                .map_err(|_| format_error(path, format!("invalid weight value '{}'", token)))?;
        }
    }

    Ok(model)
}

/// Write predictions together with the raw features of each instance
pub fn write_predictions(data: &Dataset, predicted: &[usize], path: &Path) -> Result<()> {
    let mut f = BufWriter::new(File::create(path)?);

    writeln!(f, "{}", data.n)?;
    writeln!(f, "{}", data.m)?;
    for i in 0..data.n {
        for j in 0..data.m {
            write!(f, "{:.6} ", data.raw_feature(i, j))?;
        }
        writeln!(f, "{}", predicted[i])?;
    }

    Ok(())
}

fn parse_token<'a, T: FromStr>(
    tokens: &mut impl Iterator<Item = &'a str>,
    path: &Path,
    what: &str,
) -> Result<T> {
    let token = tokens
        .next()
        .ok_or_else(|| format_error(path, format!("missing {}", what)))?;
    token
        .parse()
        .map_err(|_| format_error(path, format!("invalid {}: '{}'", what, token)))
}

fn parse_field<T: FromStr>(line: &str, key: &str, path: &Path) -> Result<T> {
    let prefix = format!("{} = ", key);
    let value = line
        .strip_prefix(&prefix)
        .ok_or_else(|| format_error(path, format!("expected '{}<value>', found '{}'", prefix, line)))?;
    value
        .trim()
        .parse()
        .map_err(|_| format_error(path, format!("invalid value for {}: '{}'", key, value)))
}
