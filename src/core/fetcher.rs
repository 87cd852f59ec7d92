use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use crate::core::config::FetcherConfig;
use crate::core::error::FetchError;

/// Stdout of a successful fetcher run, or why there is none.
pub type FetchFuture = Pin<Box<dyn Future<Output = Result<String, FetchError>> + Send>>;

/// Something that can produce fetcher output on demand.
///
/// The returned future must own everything it needs; the poller spawns it
/// and does not wait for it before the next trigger.
pub trait UsageSource: Send + Sync {
    fn fetch(&self) -> FetchFuture;
}

/// Runs the external usage fetcher script.
#[derive(Debug, Clone)]
pub struct ScriptSource {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ScriptSource {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            timeout: None,
        }
    }

    pub fn from_config(config: &FetcherConfig) -> Self {
        let mut source = Self::new(config.path.clone())
            .with_args(config.args.iter().cloned())
            .with_timeout(config.timeout_seconds.map(Duration::from_secs));
        source.working_dir = config.working_dir.clone();
        source
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl UsageSource for ScriptSource {
    fn fetch(&self) -> FetchFuture {
        let source = self.clone();
        Box::pin(async move { source.run().await })
    }
}

impl ScriptSource {
    async fn run(self) -> Result<String, FetchError> {
        let program = self.program.display().to_string();
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(program = %program, args = ?self.args, "launching fetcher");

        let child = cmd.spawn().map_err(|e| FetchError::Launch {
            program: program.clone(),
            reason: e.to_string(),
        })?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| FetchError::Timeout(limit.as_secs()))?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| FetchError::Launch {
            program: program.clone(),
            reason: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::process(output.status.code(), &stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Resolve a program the way the shell would. Paths containing a separator
/// are checked directly, bare names are searched in PATH.
pub fn which(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(program))
            .find(|p| p.is_file())
    })
}
