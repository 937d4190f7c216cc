//! Output file lifecycle of one stream.
//!
//! Shared-mode bindings get their file opened eagerly, when the stream's
//! schema arrives; the handle lives until the end of the run (or until the
//! schema arrives again, after which a file at the same path is appended to). Per-record bindings open a fresh file for each
//! record, which the caller closes once the record is fully rendered.

use std::path::{Path, PathBuf};

use crate::binding::TemplateBinding;
use crate::error::ProcessError;
use crate::output::OutputFile;

/// Where a binding writes the current record.
#[derive(Debug)]
pub enum Target<'a> {
    /// The binding's long-lived shared file.
    Shared(&'a mut OutputFile),
    /// A file opened for this record only.
    PerRecord(OutputFile),
}

/// Open handles of one stream, one slot per binding.
#[derive(Debug)]
pub struct StreamOutputs {
    output_dir: PathBuf,
    shared: Vec<Option<OutputFile>>,
}

impl StreamOutputs {
    /// Opens the shared file of every shared-mode binding.
    ///
    /// Files whose path is in `reopened` were written earlier in the run and
    /// are appended to; all others are truncated.
    pub fn open(
        output_dir: PathBuf,
        bindings: &[TemplateBinding],
        reopened: &[PathBuf],
    ) -> Result<Self, ProcessError> {
        let shared = bindings
            .iter()
            .map(|binding| {
                if binding.one_file_per_record {
                    return Ok(None);
                }
                let append = reopened.contains(&binding.shared_path(&output_dir));
                binding.open_shared(&output_dir, append).map(Some)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { output_dir, shared })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Resolves the file binding `slot` writes `record` to.
    pub fn target(
        &mut self,
        slot: usize,
        binding: &TemplateBinding,
        record: &serde_json::Value,
    ) -> Result<Option<Target<'_>>, ProcessError> {
        if binding.one_file_per_record {
            return binding
                .open_output(&self.output_dir, record)
                .map(|file| Some(Target::PerRecord(file)));
        }
        Ok(self
            .shared
            .get_mut(slot)
            .and_then(Option::as_mut)
            .map(Target::Shared))
    }

    /// Hands over the shared files, leaving the slots empty.
    pub fn take_shared(&mut self) -> Vec<(usize, OutputFile)> {
        self.shared
            .iter_mut()
            .enumerate()
            .filter_map(|(slot, file)| file.take().map(|file| (slot, file)))
            .collect()
    }

    /// Flushes and closes every remaining shared file without a footer,
    /// returning their paths.
    pub fn close_all(&mut self) -> Result<Vec<PathBuf>, ProcessError> {
        let mut closed = Vec::new();
        for (_, file) in self.take_shared() {
            let path = file.path().to_path_buf();
            file.close().map_err(|source| ProcessError::Output {
                path: path.clone(),
                source,
            })?;
            closed.push(path);
        }
        Ok(closed)
    }
}
