//! Best-effort recalculation of a saved workbook by an external spreadsheet engine, so
//! that generated formulas get cached results.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

/// Recalculates the workbook file at `path` in place.
///
/// Returns whether cached values were refreshed. Implementations never fail past this
/// call: an unavailable engine is reported as `false`.
pub trait Recalculator {
    fn recalculate(&self, path: &Path) -> bool;
}

/// No engine available.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRecalc;

impl Recalculator for NoRecalc {
    fn recalculate(&self, path: &Path) -> bool {
        log::debug!("no recalculation engine configured for {}", path.display());
        false
    }
}

/// Round-trips the file through a headless office suite, which recomputes every formula
/// while converting.
#[derive(Clone, Debug)]
pub struct OfficeRecalc {
    program: PathBuf,
    settle: Duration,
}

impl OfficeRecalc {
    pub fn new(program: &Path, settle: Duration) -> Self {
        Self {
            program: program.to_path_buf(),
            settle,
        }
    }

    fn convert(&self, path: &Path) -> io::Result<()> {
        let out_dir = tempfile::tempdir()?;
        let output = Command::new(&self.program)
            .args(["--headless", "--convert-to", "xlsx", "--outdir"])
            .arg(out_dir.path())
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()?;
        if !output.status.success() {
            return Err(io::Error::other(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        thread::sleep(self.settle);

        let stem = path
            .file_stem()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
        // `run.v2.xlsx` converts to `run.v2.xlsx`; only the last extension is replaced.
        let converted = out_dir
            .path()
            .join(format!("{}.xlsx", stem.to_string_lossy()));
        isoflow_xlsx::atomic_write(path, |file| {
            let mut source = File::open(&converted)?;
            io::copy(&mut source, file)
        })?;
        Ok(())
    }
}

impl Recalculator for OfficeRecalc {
    fn recalculate(&self, path: &Path) -> bool {
        match self.convert(path) {
            Ok(()) => {
                log::debug!("recalculated {} with {}", path.display(), self.program.display());
                true
            }
            Err(err) => {
                log::warn!("recalculation of {} failed: {err}", path.display());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.xlsx");
        std::fs::write(&path, b"untouched").unwrap();

        let recalc = OfficeRecalc::new(
            Path::new("/nonexistent/isoflow-office-binary"),
            Duration::ZERO,
        );
        assert!(!recalc.recalculate(&path));
        assert_eq!(std::fs::read(&path).unwrap(), b"untouched");
        assert!(!NoRecalc.recalculate(&path));
    }

    /// Stands in for the office suite: writes `<outdir>/<name minus last extension>.xlsx`.
    #[cfg(unix)]
    fn fake_converter(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-office");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             out=\"$5\"\n\
             name=$(basename \"$6\")\n\
             printf recalculated > \"$out/${name%.*}.xlsx\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[test]
    fn converted_copy_replaces_files_with_dotted_names() {
        let dir = tempfile::tempdir().unwrap();
        let recalc = OfficeRecalc::new(&fake_converter(dir.path()), Duration::ZERO);

        for name in ["run.xlsx", "run.v2.xlsx"] {
            let path = dir.path().join(name);
            std::fs::write(&path, b"stale").unwrap();
            assert!(recalc.recalculate(&path), "{name}");
            assert_eq!(std::fs::read(&path).unwrap(), b"recalculated", "{name}");
        }
    }
}
