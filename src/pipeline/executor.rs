use std::future::Future;
use std::path::{Path, PathBuf};

use ddpforge_av::{
    resolve_tool, CleanupReport, JobWorkspace, ProgressEvent, Tool, ToolCommand, ToolLocation,
};

use super::plan::{input_base, plan, SubRun};
use super::{EncodeSettings, PipelineError, PipelineState};
use crate::analyzer::{self, StreamClassification};
use crate::config::ToolsConfig;
use crate::descriptor::{self, SanitizeOutcome};
use crate::profile::{DecodeTarget, EncodeProfile, PCM_BASE_NAME};

/// Progress callback type
pub type ProgressCallback = Box<dyn Fn(EncodeProfile, &ProgressEvent) + Send + Sync>;

/// Mutable state of one pipeline invocation.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub input: PathBuf,
    pub input_base: String,
    pub classification: Option<StreamClassification>,
    pub sub_runs: Vec<SubRun>,
    pub state: PipelineState,
    /// Profile of the sub-run currently executing.
    pub active: Option<EncodeProfile>,
    /// Final artifacts written so far.
    pub outputs: Vec<PathBuf>,
    pub cleanup: Vec<CleanupReport>,
}

impl PipelineRun {
    fn new(input: PathBuf) -> Self {
        let input_base = input_base(&input);
        Self {
            input,
            input_base,
            classification: None,
            sub_runs: Vec::new(),
            state: PipelineState::Analyze,
            active: None,
            outputs: Vec::new(),
            cleanup: Vec::new(),
        }
    }

    fn enter(&mut self, state: PipelineState, profile: Option<EncodeProfile>) {
        match profile {
            Some(profile) => tracing::info!("[{}] {} -> {}", profile, self.state, state),
            None => tracing::info!("{} -> {}", self.state, state),
        }
        self.state = state;
        self.active = profile;
    }
}

/// Orchestrates analysis, decoding and encoding for one input at a time.
pub struct Pipeline {
    decoder: ToolLocation,
    encoder: ToolLocation,
    settings: EncodeSettings,
    progress_callback: Option<ProgressCallback>,
}

impl Pipeline {
    pub fn new(decoder: ToolLocation, encoder: ToolLocation, settings: EncodeSettings) -> Self {
        Self {
            decoder,
            encoder,
            settings,
            progress_callback: None,
        }
    }

    /// Resolve both tools, searching `search_dir` before `PATH`.
    pub fn resolve(
        tools: &ToolsConfig,
        search_dir: &Path,
        settings: EncodeSettings,
    ) -> Result<Self, PipelineError> {
        let decoder = resolve_tool(Tool::Decoder, tools.decoder_dir.as_deref(), search_dir)?;
        tracing::info!("Found {}: {}", Tool::Decoder.display_name(), decoder.path.display());
        let encoder = resolve_tool(Tool::Encoder, tools.encoder_dir.as_deref(), search_dir)?;
        tracing::info!("Found {}: {}", Tool::Encoder.display_name(), encoder.path.display());
        Ok(Self::new(decoder, encoder, settings))
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn settings(&self) -> &EncodeSettings {
        &self.settings
    }

    fn report_progress(&self, profile: EncodeProfile, event: &ProgressEvent) {
        if let Some(ref cb) = self.progress_callback {
            cb(profile, event);
        }
    }

    /// Check the input, analyze it and plan the sub-runs. Nothing is decoded.
    pub async fn prepare(&self, input: &Path) -> Result<PipelineRun, PipelineError> {
        if !input.is_file() {
            return Err(PipelineError::Setup(format!(
                "input file does not exist: {}",
                input.display()
            )));
        }
        let input = std::path::absolute(input)
            .map_err(|e| PipelineError::Setup(format!("{}: {e}", input.display())))?;

        let mut run = PipelineRun::new(input);
        tracing::info!("Input file: {}", run.input.display());

        let classification = match analyzer::analyze(&self.decoder, &run.input).await {
            Ok(classification) => classification,
            Err(e) => {
                run.enter(PipelineState::Failed, None);
                return Err(PipelineError::Analysis(e.to_string()));
            }
        };

        run.classification = Some(classification);
        run.sub_runs = plan(classification, &self.settings, &run.input_base);
        for sub in &run.sub_runs {
            tracing::info!("Planned {} at {} kbps", sub.profile, sub.bitrate);
        }
        Ok(run)
    }

    /// Prepare and execute a full run.
    pub async fn run(&self, input: &Path) -> Result<PipelineRun, PipelineError> {
        let mut run = self.prepare(input).await?;
        self.execute(&mut run).await?;
        Ok(run)
    }

    /// Execute every planned sub-run in order.
    ///
    /// On failure `run.state` is [`PipelineState::Failed`] and outputs of
    /// earlier sub-runs stay where they were finalized.
    pub async fn execute(&self, run: &mut PipelineRun) -> Result<(), PipelineError> {
        for index in 0..run.sub_runs.len() {
            if let Err(e) = self.execute_sub_run(run, index).await {
                run.enter(PipelineState::Failed, e.profile());
                tracing::error!("{}", e);
                return Err(e);
            }
        }
        run.enter(PipelineState::Done, None);
        Ok(())
    }

    /// [`execute`](Self::execute), abandoned as soon as `shutdown`
    /// completes.
    ///
    /// `shutdown` is checked first at every suspension point, so a signal
    /// that arrives while a stage runs synchronously is seen before the next
    /// stage starts. A running child is killed when its future is dropped.
    pub async fn execute_until<S>(
        &self,
        run: &mut PipelineRun,
        shutdown: S,
    ) -> Result<(), PipelineError>
    where
        S: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            () = shutdown => {}
            result = self.execute(run) => return result,
        }

        let err = PipelineError::Interrupted {
            state: run.state,
            profile: run.active,
        };
        if !run.state.is_terminal() {
            run.enter(PipelineState::Failed, run.active);
        }
        tracing::error!("{}", err);
        Err(err)
    }

    async fn execute_sub_run(
        &self,
        run: &mut PipelineRun,
        index: usize,
    ) -> Result<(), PipelineError> {
        let mut sub = run.sub_runs[index].clone();
        let profile = sub.profile;

        run.enter(PipelineState::Decode, Some(profile));
        let workspace = JobWorkspace::create(&sub.work_dir).map_err(|e| PipelineError::Decode {
            profile,
            message: e.to_string(),
        })?;
        let stale = workspace.cleanup(profile.cleanup_suffixes());
        if !stale.removed.is_empty() {
            tracing::info!(
                "[{}] removed {} leftover file(s) from an earlier run",
                profile,
                stale.removed.len()
            );
        }
        sub.decoded = Some(self.decode(&run.input, &sub, &workspace).await?);

        run.enter(PipelineState::BuildConfig, Some(profile));
        let decoded = sub.decoded.as_deref().unwrap_or_default();
        let descriptor = descriptor::build(
            profile,
            workspace.dir(),
            decoded,
            &profile.temp_output_name(),
            &sub.requested,
        );
        let path = descriptor
            .write(workspace.dir())
            .map_err(|e| PipelineError::Descriptor {
                profile,
                message: e.to_string(),
            })?;
        if profile.requires_compat() {
            if let SanitizeOutcome::Rewritten = descriptor::sanitize_descriptor_file(&path) {
                tracing::warn!("Descriptor needed a second compatibility pass: {}", path.display());
            }
        }
        sub.descriptor = Some(path.clone());
        run.sub_runs[index] = sub.clone();

        run.enter(PipelineState::Encode, Some(profile));
        self.encode(profile, &path).await?;

        run.enter(PipelineState::Finalize, Some(profile));
        let output = workspace
            .finalize(&profile.temp_output_name(), &sub.final_path)
            .map_err(|e| PipelineError::Finalize {
                profile,
                message: e.to_string(),
            })?;
        tracing::info!("Output: {}", output.display());
        run.outputs.push(output);

        run.enter(PipelineState::Cleanup, Some(profile));
        let report = workspace.cleanup(profile.cleanup_suffixes());
        if !report.is_clean() {
            tracing::warn!(
                "[{}] cleanup left {} file(s) behind",
                profile,
                report.failed.len()
            );
        }
        run.cleanup.push(report);

        Ok(())
    }

    async fn decode(
        &self,
        input: &Path,
        sub: &SubRun,
        workspace: &JobWorkspace,
    ) -> Result<String, PipelineError> {
        let profile = sub.profile;
        let mut cmd = ToolCommand::new(&self.decoder.path);
        cmd.args(["decode", "--loglevel", "off", "--progress"])
            .arg(input)
            .arg("--output-path")
            .arg(workspace.dir())
            .current_dir(&self.decoder.dir);

        match profile.decode_target() {
            DecodeTarget::Pcm => {
                cmd.args(["--format", "w64"]);
            }
            DecodeTarget::Mezzanine => {
                if let Some(mode) = sub.warp_mode {
                    cmd.args(["--warp-mode", mode.as_arg()]);
                }
                if sub.bed_conform {
                    cmd.arg("--bed-conform");
                }
            }
        }

        tracing::info!("[{}] Decoding into {}", profile, workspace.name());
        let outcome = cmd
            .stream(|line| tracing::debug!("{}", line))
            .await
            .map_err(|e| PipelineError::Decode {
                profile,
                message: e.to_string(),
            })?;

        if !outcome.success() {
            return Err(PipelineError::Decode {
                profile,
                message: format!(
                    "decoder exited with status {}:\n{}",
                    outcome.code(),
                    outcome.tail.join("\n")
                ),
            });
        }

        let adopted = match profile.decode_target() {
            DecodeTarget::Pcm => workspace.adopt_pcm(PCM_BASE_NAME),
            DecodeTarget::Mezzanine => workspace.adopt_mezzanine(&workspace.name()),
        };
        adopted.map_err(|e| PipelineError::Decode {
            profile,
            message: e.to_string(),
        })
    }

    async fn encode(&self, profile: EncodeProfile, descriptor: &Path) -> Result<(), PipelineError> {
        let mut cmd = ToolCommand::new(&self.encoder.path);
        cmd.arg("-x")
            .arg(descriptor)
            .current_dir(&self.encoder.dir)
            .bypass_validation(profile.bypass_validation());

        let outcome = cmd
            .run_with_progress(|event| self.report_progress(profile, &event))
            .await
            .map_err(|e| PipelineError::Encode {
                profile,
                exit_code: -1,
                tail: vec![e.to_string()],
            })?;

        if !outcome.success() {
            tracing::error!("[{}] encoder failed (exit {}). Last output:", profile, outcome.code());
            for line in &outcome.tail {
                tracing::error!("  {}", line);
            }
            return Err(PipelineError::Encode {
                profile,
                exit_code: outcome.code(),
                tail: outcome.tail,
            });
        }

        tracing::info!(
            "[{}] encode finished in {}",
            profile,
            ddpforge_av::format_hms(outcome.elapsed)
        );
        Ok(())
    }
}
