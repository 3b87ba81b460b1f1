pub mod cli;
pub mod commands;
pub mod config;
pub mod edit;
pub mod remote;
pub mod render;
pub mod storage;
pub mod sync;
pub mod task;
pub mod timestamp;

use std::ffi::OsString;
use std::io;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::commands::Flow;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting dotask"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
      .chain(cli.api.map(|api| {
        ("api.base_url".to_string(), api)
      }))
  );
  debug!(files = ?cfg.loaded_files, api = %cfg.api_base(), "effective config");

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store = storage::SlotFile::open(
    &data_dir,
    &cfg.slot_name()
  )
  .with_context(|| {
    format!(
      "failed to open fallback slot \
       in {}",
      data_dir.display()
    )
  })?;

  let api = remote::HttpApi::new(
    &cfg.api_base()
  )?;
  let filter = match cli.filter {
    | Some(filter) => filter,
    | None => cfg.default_filter()?
  };

  let renderer =
    render::Renderer::new(&cfg)?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async \
         runtime"
      )?;

  runtime.block_on(async move {
    let mut app =
      sync::App::new(api, store, filter);
    let mut out = io::stdout().lock();

    // Row numbers refer to the list as
    // loaded before the command runs.
    if matches!(
      inv.command.as_str(),
      "toggle" | "edit" | "delete" | "status"
    ) {
      app.load().await;
    }

    match commands::dispatch(
      &mut app, &renderer, &mut out,
      &inv
    )
    .await?
    {
      | Flow::EnterShell => {
        let stdin = io::stdin().lock();
        commands::run_shell(
          &mut app, &renderer, stdin,
          &mut out
        )
        .await?;
      }
      | Flow::Editing(_) => {
        anyhow::bail!(
          "edit needs the new title \
           outside the shell: edit \
           ROW TITLE"
        );
      }
      | Flow::Continue | Flow::Quit => {}
    }

    info!("done");
    Ok::<(), anyhow::Error>(())
  })
}
