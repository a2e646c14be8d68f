/// # tfc-upload CLI Interface
///
/// Command parsing and user-visible output. All business logic lives in
/// [`tfc_upload_core`]; this module only wires the real collaborators
/// ([`TfcClient`], the discovered tar backend, the tokio sleeper) into the
/// core pipeline and prints the result.
///
/// ## How To Use
/// - Command line: `tfc-upload upload --organization acme --workspace net-prod`,
///   or `tfc-upload files` for a dry run of the file selection.
/// - Programmatic/integration use: call [`run`] with a constructed [`Cli`].
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use tfc_upload_core::config::{ArchiverChoice, SelectionPolicy};
use tfc_upload_core::contract::{FsLinkCounter, TokioSleeper};
use tfc_upload_core::pipeline::{preview_selection, upload_configuration, Collaborators, UploadReport};
use tfc_upload_core::toolchain::Toolchain;
use tfc_upload_core::tracker::PollOutcome;

use crate::client::TfcClient;
use crate::load_config::{api_settings, load_settings, upload_config, Overrides, SettingsFile};

/// Upload a configuration directory to a remote workspace and follow the run.
#[derive(Parser, Debug)]
#[clap(
    name = "tfc-upload",
    version,
    about = "Archive a configuration tree, upload it as a configuration version, and track the run"
)]
pub struct Cli {
    /// Verbose diagnostic logging on stderr
    #[clap(long, global = true)]
    pub debug: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Archive the configuration, upload it and report the resulting run
    Upload {
        #[clap(flatten)]
        selection: SelectionArgs,

        /// Organization owning the workspace
        #[clap(long)]
        organization: Option<String>,

        /// Workspace name
        #[clap(long)]
        workspace: Option<String>,

        /// Service hostname (default: $TFE_HOSTNAME or app.terraform.io)
        #[clap(long)]
        hostname: Option<String>,

        /// Seconds between run status polls; 0 disables polling
        #[clap(long, default_value_t = 0)]
        poll: u64,

        /// Optional YAML settings file
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// List the files that would be archived, without contacting the service
    Files {
        #[clap(flatten)]
        selection: SelectionArgs,
    },
}

/// Flags shared by every subcommand that selects files.
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Configuration root directory
    #[clap(long, short = 'C', default_value = ".")]
    pub path: PathBuf,

    /// Only archive files tracked by git
    #[clap(long)]
    pub tracked_only: bool,

    /// Include the downloaded module cache
    #[clap(long)]
    pub include_modules: bool,

    /// Include the local plugin directory
    #[clap(long)]
    pub include_plugins: bool,

    /// Tar implementation to use
    #[clap(long, default_value = "auto", value_parser = ["auto", "gnu", "bsd"])]
    pub archiver: String,
}

impl SelectionArgs {
    pub fn policy(&self) -> SelectionPolicy {
        SelectionPolicy {
            tracked_only: self.tracked_only,
            include_modules: self.include_modules,
            include_local_plugins: self.include_plugins,
        }
    }

    pub fn archiver_choice(&self) -> ArchiverChoice {
        ArchiverChoice::from(self.archiver.as_str())
    }
}

/// Async CLI entrypoint for integration tests and main().
///
/// A failure is reported once, as `[ERROR] ...` on stderr, and returned.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!(debug = cli.debug, "trace_initialised");

    let result = dispatch(cli.command).await;
    if let Err(e) = &result {
        eprintln!("[ERROR] {e:#}");
    }
    result
}

async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Files { selection } => list_files(&selection),
        Commands::Upload {
            selection,
            organization,
            workspace,
            hostname,
            poll,
            config,
        } => {
            let settings = match config {
                Some(path) => load_settings(path)?,
                None => SettingsFile::default(),
            };
            let overrides = Overrides {
                organization,
                workspace,
                hostname,
            };
            let upload = upload_config(
                selection.path.clone(),
                selection.policy(),
                selection.archiver_choice(),
                poll,
                &overrides,
                &settings,
            )?;
            let api = api_settings(&overrides, &settings)?;

            let toolchain = Toolchain::discover(&upload.policy, upload.archiver)?;
            let archiver = toolchain.archiver();
            let client = TfcClient::new(&api)?;

            tracing::info!(command = "upload", "Starting upload");
            let deps = Collaborators {
                api: &client,
                archiver: archiver.as_ref(),
                sleeper: &TokioSleeper,
                links: &FsLinkCounter,
                git: toolchain.git(),
            };
            match upload_configuration(&upload, deps).await {
                Ok(report) => {
                    print_report(&report);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "upload", error = %e, "Upload failed");
                    Err(anyhow::Error::new(e).context("Upload failed"))
                }
            }
        }
    }
}

fn list_files(selection: &SelectionArgs) -> Result<()> {
    let policy = selection.policy();
    let toolchain = Toolchain::discover(&policy, selection.archiver_choice())?;
    let archiver = toolchain.archiver();

    let preview = preview_selection(
        &selection.path,
        policy,
        archiver.as_ref(),
        &FsLinkCounter,
        toolchain.git(),
    )
    .map_err(|e| {
        tracing::error!(command = "files", error = %e, "File selection failed");
        anyhow::Error::new(e).context("File selection failed")
    })?;

    for path in preview.plan.direct.iter() {
        println!("{}", path.display());
    }
    for path in preview.plan.hardlinked.iter() {
        println!("{} (hardlinked, appended separately)", path.display());
    }
    println!(
        "{} files, archiver {}, strategy {:?}",
        preview.files.len(),
        archiver.name(),
        preview.strategy
    );
    Ok(())
}

fn print_report(report: &UploadReport) {
    println!(
        "Uploaded {} files to configuration version {} ({:?} archive)",
        report.file_count, report.configuration_version_id, report.strategy
    );
    match &report.run.outcome {
        PollOutcome::NotPolled => {}
        PollOutcome::Finished { status } => {
            println!("Run {} finished with status {}", report.run.run.id, status)
        }
        PollOutcome::LockedByOther { owner, status } => println!(
            "Stopped following run {} ({}): workspace locked by {}",
            report.run.run.id, status, owner
        ),
    }
}
