//! Streaming pipeline execution.
//!
//! A [`Pipeline`] is an ordered list of stages, each with a [`FailurePolicy`].
//! Turning it into a [`PipelineHandle`] binds it to a source set; nothing is
//! read until the handle is pulled. Each pull reads one source, pushes it
//! through every stage in order and yields what the write stage produced.
//! Once the sources run out, aggregating stages are flushed front to back.

use crate::artifact::Artifact;
use crate::build::discovery::{DiscoveryError, SourceFile};
use crate::build::result::PipelineReport;
use crate::config::ConfigError;
use crate::emit::EmitMode;
use crate::notify::{failure_message, Notifier};
use crate::stage::{Stage, StageError, StageKind};
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Error yielded by a pipeline or raised while building one.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Bad options or project configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Bad source pattern
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    /// A source file could not be read
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A stage failed fatally
    #[error("Task '{task}' failed: {source}")]
    Stage {
        task: String,
        #[source]
        source: StageError,
    },
}

impl BuildError {
    /// The stage error behind this failure, if any.
    pub fn stage_error(&self) -> Option<&StageError> {
        match self {
            BuildError::Stage { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// How a stage slot treats content failures. I/O failures are always fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Fatal when emitting; otherwise notify and drop the file.
    Gated,
    /// Fatal when emitting; otherwise notify and pass the file on unchanged.
    Advisory,
    /// Never fatal: log a warning and pass the file on unchanged.
    Lenient,
    /// Always fatal.
    Fatal,
}

impl FailurePolicy {
    fn resolve(self, mode: EmitMode) -> Resolution {
        match self {
            FailurePolicy::Gated | FailurePolicy::Advisory if mode.is_fail_fast() => Resolution::Halt,
            FailurePolicy::Gated | FailurePolicy::Advisory => Resolution::Notify,
            FailurePolicy::Lenient => Resolution::Log,
            FailurePolicy::Fatal => Resolution::Halt,
        }
    }

    fn passes_through(self) -> bool {
        matches!(self, FailurePolicy::Advisory | FailurePolicy::Lenient)
    }
}

/// What happens to a content failure in a given slot, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Halt,
    Notify,
    Log,
}

struct Slot {
    stage: Box<dyn Stage>,
    policy: FailurePolicy,
    resolution: Resolution,
}

/// An ordered list of stages not yet bound to sources.
pub struct Pipeline {
    task: String,
    mode: EmitMode,
    slots: Vec<Slot>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("task", &self.task)
            .field("mode", &self.mode)
            .field("stages", &self.stage_kinds())
            .finish()
    }
}

impl Pipeline {
    /// Create an empty pipeline. `mode` decides how gated stages fail.
    pub fn new(task: impl Into<String>, mode: EmitMode) -> Self {
        Self { task: task.into(), mode, slots: Vec::new() }
    }

    /// Append a stage.
    pub fn stage(self, stage: Box<dyn Stage>, policy: FailurePolicy) -> Self {
        let mode = self.mode;
        self.stage_with_mode(stage, policy, mode)
    }

    /// Append a stage whose failures follow their own emit mode.
    pub fn stage_with_mode(mut self, stage: Box<dyn Stage>, policy: FailurePolicy, mode: EmitMode) -> Self {
        let resolution = policy.resolve(mode);
        self.slots.push(Slot { stage, policy, resolution });
        self
    }

    /// Stage kinds in order.
    pub fn stage_kinds(&self) -> Vec<StageKind> {
        self.slots.iter().map(|slot| slot.stage.kind()).collect()
    }

    /// Bind the pipeline to its sources.
    pub fn into_handle(self, sources: Vec<SourceFile>, notifier: Arc<dyn Notifier>) -> PipelineHandle {
        tracing::debug!(
            task = %self.task,
            mode = %self.mode,
            sources = sources.len(),
            stages = ?self.stage_kinds(),
            "pipeline created"
        );
        PipelineHandle {
            report: PipelineReport::new(self.task.clone()),
            task: self.task,
            slots: self.slots,
            source_count: sources.len(),
            sources: sources.into_iter(),
            notifier,
            pending: VecDeque::new(),
            state: State::Pending,
            started: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pending,
    Running,
    Finished,
    Failed,
}

/// A pipeline bound to its sources, driven by iteration.
///
/// Yields each artifact the final stage produced. The first fatal failure is
/// yielded as an error and ends the iteration; files written before it stay
/// on disk.
pub struct PipelineHandle {
    task: String,
    slots: Vec<Slot>,
    sources: std::vec::IntoIter<SourceFile>,
    source_count: usize,
    notifier: Arc<dyn Notifier>,
    pending: VecDeque<Artifact>,
    report: PipelineReport,
    state: State,
    started: Option<Instant>,
}

impl std::fmt::Debug for PipelineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineHandle")
            .field("task", &self.task)
            .field("stages", &self.stage_kinds())
            .field("source_count", &self.source_count)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl PipelineHandle {
    /// Task name.
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Stage kinds in order.
    pub fn stage_kinds(&self) -> Vec<StageKind> {
        self.slots.iter().map(|slot| slot.stage.kind()).collect()
    }

    /// Whether a stage of the given kind is present.
    pub fn has_stage(&self, kind: StageKind) -> bool {
        self.slots.iter().any(|slot| slot.stage.kind() == kind)
    }

    /// Number of sources matched.
    pub fn source_count(&self) -> usize {
        self.source_count
    }

    /// What has happened so far.
    pub fn report(&self) -> &PipelineReport {
        &self.report
    }

    /// Whether the pipeline ran out of input without a fatal failure.
    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    /// Drive the pipeline to completion.
    pub fn run(mut self) -> Result<PipelineReport, BuildError> {
        for item in self.by_ref() {
            item?;
        }
        Ok(self.report)
    }

    fn advance(&mut self) -> Result<(), BuildError> {
        let Some(source) = self.sources.next() else {
            return self.flush();
        };

        let contents = fs::read_to_string(&source.path)
            .map_err(|source_err| BuildError::Io { path: source.path.clone(), source: source_err })?;
        let artifact = Artifact::new(source.base.clone(), source.relative(), contents);
        tracing::trace!(task = %self.task, file = %source.path.display(), "read source");

        let produced = self.drive(0, vec![artifact])?;
        self.emit(produced);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BuildError> {
        for index in 0..self.slots.len() {
            let flushed = match self.slots[index].stage.finish() {
                Ok(artifacts) => artifacts,
                Err(err) => {
                    self.recover(index, err)?;
                    Vec::new()
                }
            };
            if flushed.is_empty() {
                continue;
            }
            let produced = self.drive(index + 1, flushed)?;
            self.emit(produced);
        }

        self.state = State::Finished;
        if let Some(started) = self.started {
            self.report.duration = started.elapsed();
        }
        tracing::debug!(
            task = %self.task,
            outputs = self.report.outputs.len(),
            notifications = self.report.notifications.len(),
            duration = ?self.report.duration,
            "pipeline finished"
        );
        Ok(())
    }

    /// Push a batch through the stages starting at `start`.
    fn drive(&mut self, start: usize, mut batch: Vec<Artifact>) -> Result<Vec<Artifact>, BuildError> {
        for index in start..self.slots.len() {
            let mut next = Vec::with_capacity(batch.len());
            for artifact in batch {
                let fallback = self.slots[index].policy.passes_through().then(|| artifact.clone());
                match self.slots[index].stage.process(artifact) {
                    Ok(out) => next.extend(out),
                    Err(err) => {
                        self.recover(index, err)?;
                        next.extend(fallback);
                    }
                }
            }
            batch = next;
            if batch.is_empty() {
                break;
            }
        }
        Ok(batch)
    }

    fn recover(&mut self, index: usize, err: StageError) -> Result<(), BuildError> {
        let slot = &self.slots[index];
        let resolution = if err.is_io() { Resolution::Halt } else { slot.resolution };

        match resolution {
            Resolution::Halt => {
                tracing::error!(task = %self.task, stage = slot.stage.name(), error = %err, "stage failed");
                Err(BuildError::Stage { task: self.task.clone(), source: err })
            }
            Resolution::Notify => {
                tracing::warn!(task = %self.task, stage = slot.stage.name(), error = %err, "stage failed, continuing");
                let message = failure_message(slot.stage.name(), &err);
                self.notifier.notify(&message);
                self.report.notifications.push(message);
                Ok(())
            }
            Resolution::Log => {
                tracing::warn!(task = %self.task, stage = slot.stage.name(), error = %err, "optional stage failed, output left as is");
                self.report.warnings.push(err.to_string());
                Ok(())
            }
        }
    }

    fn emit(&mut self, produced: Vec<Artifact>) {
        self.report.outputs.extend(produced.iter().map(Artifact::path));
        self.pending.extend(produced);
    }
}

impl Iterator for PipelineHandle {
    type Item = Result<Artifact, BuildError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(artifact) = self.pending.pop_front() {
                return Some(Ok(artifact));
            }

            match self.state {
                State::Finished | State::Failed => return None,
                State::Pending => {
                    self.state = State::Running;
                    self.started = Some(Instant::now());
                }
                State::Running => {}
            }

            if let Err(err) = self.advance() {
                self.state = State::Failed;
                return Some(Err(err));
            }
        }
    }
}
