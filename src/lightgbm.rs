use anyhow::{anyhow, Context, Result};
use log::info;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use uuid::Uuid;

use crate::training::{TabularEstimator, TrainingRow};

pub const LIGHTGBM_EXE_ENV: &str = "LIGHTGBM_EXE";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LightgbmParams {
    pub num_iterations: u32,
    pub learning_rate: f64,
    pub max_depth: i32,
    pub seed: u64,
}

impl Default for LightgbmParams {
    fn default() -> Self {
        Self {
            num_iterations: 100,
            learning_rate: 0.1,
            max_depth: 4,
            seed: 42,
        }
    }
}

/// Trains a binary classifier with the LightGBM command-line tool.
///
/// Without an explicit executable, `LIGHTGBM_EXE` and then `PATH` are searched
/// when training starts.
pub struct LightgbmCli {
    executable: Option<PathBuf>,
    output_model: PathBuf,
    params: LightgbmParams,
}

impl LightgbmCli {
    pub fn new(
        executable: Option<PathBuf>,
        output_model: PathBuf,
        params: LightgbmParams,
    ) -> Self {
        Self {
            executable,
            output_model,
            params,
        }
    }

    fn executable(&self) -> Result<PathBuf> {
        match &self.executable {
            Some(path) => Ok(path.clone()),
            None => resolve_lightgbm_executable(),
        }
    }

    pub fn params(&self) -> &LightgbmParams {
        &self.params
    }

    pub fn output_model(&self) -> &Path {
        &self.output_model
    }

    fn write_and_train(
        &self,
        train: &[TrainingRow],
        validation: &[TrainingRow],
        train_path: &Path,
        validation_path: &Path,
    ) -> Result<ExitStatus> {
        let executable = self.executable()?;
        info!("Using LightGBM executable at {}", executable.display());
        write_libsvm_dataset(train, train_path)?;
        let validation_arg = if validation.is_empty() {
            None
        } else {
            write_libsvm_dataset(validation, validation_path)?;
            Some(validation_path)
        };

        let args = self.build_args(train_path, validation_arg);
        info!(
            "Launching LightGBM: num_iterations={}, learning_rate={}, max_depth={}, seed={}",
            self.params.num_iterations,
            self.params.learning_rate,
            self.params.max_depth,
            self.params.seed
        );
        Command::new(&executable)
            .args(&args)
            .status()
            .with_context(|| format!("Failed to spawn {} for training", executable.display()))
    }

    fn build_args(&self, train_path: &Path, validation_path: Option<&Path>) -> Vec<String> {
        let mut args = vec![
            String::from("task=train"),
            String::from("objective=binary"),
            String::from("metric=auc"),
            format!("num_iterations={}", self.params.num_iterations),
            format!("learning_rate={}", self.params.learning_rate),
            format!("max_depth={}", self.params.max_depth),
            format!("seed={}", self.params.seed),
            format!("data={}", train_path.to_string_lossy()),
        ];
        if let Some(path) = validation_path {
            args.push(format!("valid_data={}", path.to_string_lossy()));
        }
        args.push(format!(
            "output_model={}",
            self.output_model.to_string_lossy()
        ));
        args
    }
}

impl TabularEstimator for LightgbmCli {
    fn fit(&self, train: &[TrainingRow], validation: &[TrainingRow]) -> Result<()> {
        if train.is_empty() {
            return Err(anyhow!("Refusing to launch LightGBM with an empty training set"));
        }
        if let Some(parent) = self.output_model.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let train_path =
            std::env::temp_dir().join(format!("lightgbm_train_{}.svm", Uuid::new_v4()));
        let validation_path =
            std::env::temp_dir().join(format!("lightgbm_valid_{}.svm", Uuid::new_v4()));
        info!(
            "Writing training dataset to {} ({} rows) and validation dataset to {} ({} rows)",
            train_path.display(),
            train.len(),
            validation_path.display(),
            validation.len()
        );

        let outcome = self.write_and_train(train, validation, &train_path, &validation_path);

        let _ = fs::remove_file(&train_path);
        let _ = fs::remove_file(&validation_path);

        let status = outcome?;
        if !status.success() {
            return Err(anyhow!("LightGBM training failed with status {status}"));
        }
        info!(
            "LightGBM training complete; model saved to {}",
            self.output_model.display()
        );
        Ok(())
    }
}

/// One `label index:value ...` line per row.
pub fn write_libsvm_dataset(rows: &[TrainingRow], path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create dataset file {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    for row in rows {
        let mut line = format!("{}", row.label);
        for (idx, value) in row.features.iter().enumerate() {
            line.push(' ');
            line.push_str(&format!("{}:{:.10}", idx, value));
        }
        line.push('\n');
        writer.write_all(line.as_bytes())?;
    }

    writer.flush()?;
    Ok(())
}

fn resolve_lightgbm_executable() -> Result<PathBuf> {
    if let Some(configured) = std::env::var_os(LIGHTGBM_EXE_ENV) {
        let path = PathBuf::from(configured);
        if path.exists() {
            return Ok(path);
        }
        return Err(anyhow!(
            "{} points to {}, which does not exist",
            LIGHTGBM_EXE_ENV,
            path.display()
        ));
    }

    let binary = if cfg!(windows) { "lightgbm.exe" } else { "lightgbm" };
    if let Some(path) = find_in_path(binary) {
        return Ok(path);
    }

    Err(anyhow!(
        "lightgbm executable not found via {} or PATH; install the LightGBM CLI to train models",
        LIGHTGBM_EXE_ENV
    ))
}

fn find_in_path(binary: &str) -> Option<PathBuf> {
    let path_value = std::env::var_os("PATH")?;
    for entry in std::env::split_paths(&path_value) {
        let candidate = entry.join(binary);
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(label: u8, seed: f64) -> TrainingRow {
        TrainingRow {
            date: NaiveDate::from_ymd_opt(2021, 3, 1).unwrap(),
            features: [seed, 1.0, 0.02, 0.9, 25.0, 0.5],
            label,
        }
    }

    #[test]
    fn libsvm_lines_carry_label_and_indexed_features() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.svm");
        write_libsvm_dataset(&[row(1, 55.0), row(0, 40.5)], &path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1 0:55.0000000000 1:1.0000000000"));
        assert!(lines[1].starts_with("0 0:40.5000000000"));
        assert!(lines[1].ends_with("5:0.5000000000"));
    }

    #[test]
    fn args_use_binary_objective_and_fixed_defaults() {
        let cli = LightgbmCli::new(
            Some(PathBuf::from("lightgbm")),
            PathBuf::from("model.txt"),
            LightgbmParams::default(),
        );
        let args = cli.build_args(Path::new("train.svm"), None);
        for expected in [
            "objective=binary",
            "metric=auc",
            "num_iterations=100",
            "learning_rate=0.1",
            "max_depth=4",
            "seed=42",
            "output_model=model.txt",
        ] {
            assert!(args.iter().any(|arg| arg == expected), "missing {expected}");
        }
        assert!(!args.iter().any(|arg| arg.starts_with("valid_data=")));

        let args = cli.build_args(Path::new("train.svm"), Some(Path::new("valid.svm")));
        assert!(args.iter().any(|arg| arg == "valid_data=valid.svm"));
    }

    #[test]
    fn empty_training_set_is_rejected_before_spawning() {
        let cli = LightgbmCli::new(
            Some(PathBuf::from("/nonexistent/lightgbm")),
            PathBuf::from("model.txt"),
            LightgbmParams::default(),
        );
        let err = cli.fit(&[], &[row(1, 1.0)]).unwrap_err();
        assert!(err.to_string().contains("empty training set"));
    }

    #[cfg(unix)]
    #[test]
    fn failing_executable_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cli = LightgbmCli::new(
            Some(PathBuf::from("false")),
            dir.path().join("models/model.txt"),
            LightgbmParams::default(),
        );
        let err = cli.fit(&[row(1, 1.0)], &[]).unwrap_err();
        assert!(err.to_string().contains("failed with status"), "{err}");
        assert!(dir.path().join("models").is_dir());
    }
}
