use std::io::{BufRead, Write};

use anyhow::anyhow;
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::edit::{EditEffect, EditInput, TitleEditor};
use crate::remote::TodoApi;
use crate::render::{ListView, Renderer};
use crate::storage::FallbackStore;
use crate::sync::{App, Source};

pub const SHELL_PROMPT: &str = "dotask> ";
pub const EDIT_CANCEL: &str = ":esc";

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "list", "add", "toggle", "edit", "delete", "clear", "filter", "refresh", "status",
        "shell", "help", "version", "quit", "exit",
    ]
}

pub fn expand_command_abbrev<'a>(token: &str, known: &[&'a str]) -> Option<&'a str> {
    if let Some(exact) = known.iter().copied().find(|name| *name == token) {
        return Some(exact);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// What the caller should do once a command has run.
#[derive(Debug, Clone)]
pub enum Flow {
    Continue,
    Quit,
    EnterShell,
    /// A row switched to editing; the next input line is its new title.
    Editing(TitleEditor),
}

#[instrument(skip(app, renderer, out, inv), fields(command = %inv.command))]
pub async fn dispatch<A, S, W>(
    app: &mut App<A, S>,
    renderer: &Renderer,
    out: &mut W,
    inv: &Invocation,
) -> anyhow::Result<Flow>
where
    A: TodoApi,
    S: FallbackStore,
    W: Write,
{
    debug!(args = ?inv.args, "dispatching command");

    match inv.command.as_str() {
        "list" => {
            match inv.args.first() {
                Some(raw) => {
                    app.set_filter(raw.parse()?).await;
                }
                None => {
                    app.refresh().await;
                }
            }
            redraw(app, renderer, out)?;
        }
        "add" => {
            let title = inv.text_after(0);
            if app.create(&title).await.is_none() {
                writeln!(out, "Nothing to add: the title is empty.")?;
                return Ok(Flow::Continue);
            }
            redraw(app, renderer, out)?;
        }
        "toggle" => {
            let id = target(app, inv)?;
            if app.toggle(&id).await.is_none() {
                writeln!(out, "No task matches '{id}'.")?;
                return Ok(Flow::Continue);
            }
            redraw(app, renderer, out)?;
        }
        "edit" => {
            let id = target(app, inv)?;
            let title = app
                .state()
                .find(&id)
                .map(|task| task.title.clone())
                .unwrap_or_default();
            let mut editor = TitleEditor::new(id, title);
            editor.handle(EditInput::Activate);

            if inv.args.len() < 2 {
                return Ok(Flow::Editing(editor));
            }

            editor.handle(EditInput::Type(inv.text_after(1)));
            let effect = editor.handle(EditInput::Enter);
            finish_edit(app, renderer, out, &editor, effect).await?;
        }
        "delete" => {
            let id = target(app, inv)?;
            app.delete(&id).await;
            redraw(app, renderer, out)?;
        }
        "clear" => {
            app.clear_completed().await;
            redraw(app, renderer, out)?;
        }
        "filter" => {
            let raw = inv
                .args
                .first()
                .ok_or_else(|| anyhow!("filter requires one of: all, active, completed"))?;
            app.set_filter(raw.parse()?).await;
            redraw(app, renderer, out)?;
        }
        "refresh" => {
            app.refresh().await;
            redraw(app, renderer, out)?;
        }
        "status" => {
            let api = if app.reachable().await {
                "online"
            } else {
                "unreachable"
            };
            let showing = match app.state().source {
                Some(Source::Remote) => "API",
                Some(Source::Fallback) => "local slot",
                None => "nothing loaded yet",
            };
            writeln!(out, "api        {} ({api})", app.api().endpoint())?;
            writeln!(out, "local slot {}", app.store().describe())?;
            writeln!(out, "filter     {}", app.state().filter)?;
            writeln!(out, "showing    {showing}")?;
        }
        "shell" => return Ok(Flow::EnterShell),
        "help" => write_help(out)?,
        "version" => writeln!(out, "{}", env!("CARGO_PKG_VERSION"))?,
        "quit" | "exit" => return Ok(Flow::Quit),
        other => return Err(anyhow!("unknown command: {other}")),
    }

    Ok(Flow::Continue)
}

/// Reads commands line by line until EOF or `quit`, redrawing after each.
#[instrument(skip_all)]
pub async fn run_shell<A, S, R, W>(
    app: &mut App<A, S>,
    renderer: &Renderer,
    input: R,
    out: &mut W,
) -> anyhow::Result<()>
where
    A: TodoApi,
    S: FallbackStore,
    R: BufRead,
    W: Write,
{
    info!("starting interactive shell");
    app.load().await;
    redraw(app, renderer, out)?;

    let mut editing: Option<TitleEditor> = None;
    let mut lines = input.lines();

    loop {
        match &editing {
            Some(editor) => write!(out, "edit [{}]> ", editor.original())?,
            None => write!(out, "{SHELL_PROMPT}")?,
        }
        out.flush()?;

        let Some(line) = lines.next() else {
            writeln!(out)?;
            if let Some(mut editor) = editing.take() {
                let effect = editor.handle(EditInput::Blur);
                finish_edit(app, renderer, out, &editor, effect).await?;
            }
            break;
        };
        let line = line?;

        if let Some(mut editor) = editing.take() {
            let effect = if line.trim() == EDIT_CANCEL {
                editor.handle(EditInput::Escape)
            } else {
                editor.handle(EditInput::Type(line));
                editor.handle(EditInput::Enter)
            };
            finish_edit(app, renderer, out, &editor, effect).await?;
            continue;
        }

        let inv = match Invocation::from_line(&line) {
            None => continue,
            Some(Ok(inv)) => inv,
            Some(Err(err)) => {
                writeln!(out, "{err}")?;
                continue;
            }
        };

        match dispatch(app, renderer, out, &inv).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Ok(Flow::EnterShell) => writeln!(out, "Already in the shell.")?,
            Ok(Flow::Editing(editor)) => {
                writeln!(
                    out,
                    "Editing \"{}\". Enter saves, {EDIT_CANCEL} discards.",
                    editor.original()
                )?;
                editing = Some(editor);
            }
            Err(err) => writeln!(out, "error: {err:#}")?,
        }
    }

    info!("shell finished");
    Ok(())
}

fn redraw<A, S, W>(app: &App<A, S>, renderer: &Renderer, out: &mut W) -> anyhow::Result<()>
where
    A: TodoApi,
    S: FallbackStore,
    W: Write,
{
    renderer.render_list(out, &ListView::of(app.state()))
}

async fn finish_edit<A, S, W>(
    app: &mut App<A, S>,
    renderer: &Renderer,
    out: &mut W,
    editor: &TitleEditor,
    effect: EditEffect,
) -> anyhow::Result<()>
where
    A: TodoApi,
    S: FallbackStore,
    W: Write,
{
    match effect {
        EditEffect::Commit(title) => {
            app.rename(editor.task_id(), &title).await;
        }
        EditEffect::Ignored => {
            writeln!(out, "Empty title ignored; keeping \"{}\".", editor.original())?;
            app.refresh().await;
        }
        EditEffect::Discarded | EditEffect::None | EditEffect::Began => {
            app.refresh().await;
        }
    }
    redraw(app, renderer, out)
}

/// Resolves the first argument to a task id: a row number of the visible
/// list, a full id, or a unique id prefix of at least four characters.
fn target<A, S>(app: &App<A, S>, inv: &Invocation) -> anyhow::Result<String>
where
    A: TodoApi,
    S: FallbackStore,
{
    let token = inv
        .args
        .first()
        .ok_or_else(|| anyhow!("{} requires a row number or task id", inv.command))?;
    resolve_row(app, token).ok_or_else(|| anyhow!("no task matches '{token}'"))
}

pub fn resolve_row<A, S>(app: &App<A, S>, token: &str) -> Option<String>
where
    A: TodoApi,
    S: FallbackStore,
{
    let visible = app.visible();
    if let Ok(row) = token.parse::<usize>()
        && let Some(task) = row.checked_sub(1).and_then(|idx| visible.get(idx))
    {
        return Some(task.id.clone());
    }

    if let Some(task) = app.state().find(token) {
        return Some(task.id.clone());
    }

    if token.chars().count() < 4 {
        return None;
    }
    let mut matches = app
        .state()
        .tasks
        .iter()
        .filter(|task| task.id.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first.id.clone())
    }
}

fn write_help<W: Write>(out: &mut W) -> anyhow::Result<()> {
    writeln!(out, "commands (unique prefixes work):")?;
    for (usage, what) in [
        ("list [FILTER]", "reload and show the list"),
        ("add TITLE", "create a task"),
        ("toggle ROW", "flip completion"),
        ("edit ROW [TITLE]", "rename; without TITLE the shell asks for it"),
        ("delete ROW", "remove a task"),
        ("clear", "remove every completed task"),
        ("filter all|active|completed", "switch filter and reload"),
        ("refresh", "reload from the API or the local slot"),
        ("status", "show API reachability and storage location"),
        ("shell", "interactive mode"),
        ("quit", "leave the shell"),
    ] {
        writeln!(out, "  {usage:<30} {what}")?;
    }
    writeln!(out, "ROW is a row number, a task id, or a unique id prefix.")?;
    Ok(())
}
