//! Interactive session: one document list, one preview pane and two question
//! views, all sharing a single selection.

use crate::error::ErrorKind;
use crate::file::{LocalFile, PreviewKind};
use crate::preview::{Key, ObjectUrlRegistry, PreviewViewer};
use crate::registry::RemoteRegistry;
use crate::render;
use crate::store::BlobStore;
use crate::workspace::{
    DeleteOutcome, DocumentCachePresenter, QueryOrchestrator, SelectionCoordinator,
    SharedSelection, ThemeOrchestrator,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

pub const HELP: &str = "\
commands:
  ls                       reload the document list
  select <id>...           replace the selection
  toggle <id>              add or remove one document
  clear                    empty the selection
  upload <path>...         upload .pdf .txt .png .jpg files
  rm [-y] <id>             delete a document (asks first)
  preview [kind]           preview the single selected document (pdf|image|text|other)
  data                     print the open image preview as a data: URI
  esc | close              close the preview
  ask <question>           per-document answers (scoped to the selection if any)
  themes <question>        cross-document themes (scoped to the selection if any)
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Select(Vec<String>),
    Toggle(String),
    Clear,
    Upload(Vec<PathBuf>),
    Delete { doc_id: String, assume_yes: bool },
    Preview(Option<PreviewKind>),
    DataUri,
    Close,
    Ask(String),
    Themes(String),
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };
        let args: Vec<String> = rest.split_whitespace().map(str::to_string).collect();

        let command = match head {
            "ls" | "list" => Command::List,
            "select" => Command::Select(args),
            "toggle" => match args.as_slice() {
                [id] => Command::Toggle(id.clone()),
                _ => return Err("usage: toggle <id>".into()),
            },
            "clear" => Command::Clear,
            "upload" if !args.is_empty() => {
                Command::Upload(args.into_iter().map(PathBuf::from).collect())
            }
            "upload" => return Err("usage: upload <path>...".into()),
            "rm" | "delete" => match args.as_slice() {
                [flag, id] if flag == "-y" => Command::Delete {
                    doc_id: id.clone(),
                    assume_yes: true,
                },
                [flag] if flag == "-y" => return Err("usage: rm [-y] <id>".into()),
                [id] => Command::Delete {
                    doc_id: id.clone(),
                    assume_yes: false,
                },
                _ => return Err("usage: rm [-y] <id>".into()),
            },
            "preview" | "open" => match args.as_slice() {
                [] => Command::Preview(None),
                [kind] => Command::Preview(Some(kind.parse().map_err(|e| format!("{e}"))?)),
                _ => return Err("usage: preview [kind]".into()),
            },
            "data" => Command::DataUri,
            "esc" | "close" => Command::Close,
            "ask" | "query" if !rest.is_empty() => Command::Ask(rest.to_string()),
            "themes" | "theme" if !rest.is_empty() => Command::Themes(rest.to_string()),
            "ask" | "query" | "themes" | "theme" => return Err(format!("usage: {head} <question>")),
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => return Err(format!("unknown command: {other} (try `help`)")),
        };
        Ok(Some(command))
    }
}

/// All views of one interactive session.
pub struct Session {
    selection: SharedSelection,
    documents: DocumentCachePresenter,
    viewer: PreviewViewer,
    query: QueryOrchestrator,
    themes: ThemeOrchestrator,
}

impl Session {
    pub fn new(
        registry: Arc<dyn RemoteRegistry>,
        store: Arc<dyn BlobStore>,
        top_k_per_doc: u32,
    ) -> Self {
        let selection = SelectionCoordinator::shared();
        Self {
            documents: DocumentCachePresenter::new(
                Arc::clone(&registry),
                Arc::clone(&store),
                selection.clone(),
            ),
            viewer: PreviewViewer::new(store, selection.clone(), ObjectUrlRegistry::new()),
            query: QueryOrchestrator::new(Arc::clone(&registry), top_k_per_doc),
            themes: ThemeOrchestrator::new(registry, top_k_per_doc),
            selection,
        }
    }

    pub fn documents(&self) -> &DocumentCachePresenter {
        &self.documents
    }

    pub fn viewer(&self) -> &PreviewViewer {
        &self.viewer
    }

    /// Read commands until `quit` or end of input. Delete confirmations are
    /// read from the same input.
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();
        self.documents.load().await;
        self.flush_notice(out)?;
        writeln!(out, "{}", self.list_text())?;

        loop {
            write!(out, "doclens> ")?;
            out.flush()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            let command = match Command::parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(message) => {
                    writeln!(out, "{message}")?;
                    continue;
                }
            };

            match command {
                Command::Quit => break,
                Command::Delete {
                    doc_id,
                    assume_yes: false,
                } => {
                    let name = self
                        .documents
                        .document(&doc_id)
                        .map(|d| d.record.filename.clone())
                        .unwrap_or_else(|| doc_id.clone());
                    write!(out, "Delete \"{name}\"? [y/N] ")?;
                    out.flush()?;
                    let answer = lines.next_line().await?.unwrap_or_default();
                    let confirmed = matches!(answer.trim(), "y" | "Y" | "yes");
                    self.delete(&doc_id, confirmed, out).await?;
                }
                command => self.execute(command, out).await?,
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Execute one command. Interactive confirmation is the caller's job.
    pub async fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> std::io::Result<()> {
        match command {
            Command::List => {
                self.documents.load().await;
                self.flush_notice(out)?;
                writeln!(out, "{}", self.list_text())?;
            }
            Command::Select(ids) => {
                let (known, unknown): (Vec<_>, Vec<_>) = ids
                    .into_iter()
                    .partition(|id| self.documents.document(id).is_some());
                self.report_unknown(&unknown, out)?;
                self.selection.lock().set_selected(known);
                writeln!(out, "{}", self.list_text())?;
            }
            Command::Toggle(id) => {
                if self.documents.document(&id).is_none() {
                    self.report_unknown(&[id], out)?;
                    return Ok(());
                }
                self.selection.lock().toggle(id);
                writeln!(out, "{}", self.list_text())?;
            }
            Command::Clear => {
                self.selection.lock().clear();
                writeln!(out, "{}", self.list_text())?;
            }
            Command::Upload(paths) => {
                let mut files = Vec::with_capacity(paths.len());
                for path in &paths {
                    match LocalFile::read(path).await {
                        Ok(file) => files.push(file),
                        Err(e) => writeln!(out, "{} {}: {e}", console::style("skip").yellow(), path.display())?,
                    }
                }
                if let Some(summary) = self.documents.upload(files).await {
                    write!(out, "{}", render::upload_results(&summary.results))?;
                }
                self.flush_notice(out)?;
                writeln!(out, "{}", self.list_text())?;
            }
            Command::Delete { doc_id, assume_yes } => {
                self.delete(&doc_id, assume_yes, out).await?;
            }
            Command::Preview(kind) => match self.viewer.open_selected(kind).await {
                Some(state) => writeln!(out, "{}", render::preview(state))?,
                None => writeln!(out, "Select exactly one document to preview.")?,
            },
            Command::DataUri => match self.viewer.state().session() {
                Some(session) if session.kind == PreviewKind::Image => {
                    writeln!(out, "{}", session.data_uri().unwrap_or_default())?
                }
                Some(_) => writeln!(out, "Only image previews have a data URI.")?,
                None => writeln!(out, "No preview is open.")?,
            },
            Command::Close => {
                self.viewer.handle_key(Key::Escape);
                writeln!(out, "{}", render::preview(self.viewer.state()))?;
            }
            Command::Ask(question) => {
                let scope = self.selection.lock().selected_ids();
                self.query.set_input(question);
                let view = self.query.submit(Some(scope)).await;
                writeln!(out, "{}", render::answer_view(view, render::answers))?;
            }
            Command::Themes(question) => {
                let scope = self.selection.lock().selected_ids();
                self.themes.set_input(question);
                let view = self.themes.submit(Some(scope)).await;
                writeln!(out, "{}", render::answer_view(view, render::themes))?;
            }
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Quit => {}
        }
        Ok(())
    }

    async fn delete<W: Write>(&mut self, doc_id: &str, confirmed: bool, out: &mut W) -> std::io::Result<()> {
        let outcome = self.documents.handle_delete(doc_id, &|_: &str| confirmed).await;
        match outcome {
            DeleteOutcome::Declined => {
                writeln!(out, "Cancelled.")?;
                return Ok(());
            }
            DeleteOutcome::Deleted
            | DeleteOutcome::Failed {
                kind: ErrorKind::NotFound,
                ..
            } => {
                self.viewer.forget(doc_id);
            }
            DeleteOutcome::Failed { .. } | DeleteOutcome::Discarded => {}
        }
        self.flush_notice(out)?;
        writeln!(out, "{}", self.list_text())
    }

    fn report_unknown<W: Write>(&self, ids: &[String], out: &mut W) -> std::io::Result<()> {
        if !ids.is_empty() {
            writeln!(out, "Not in the document list: {}", ids.join(", "))?;
        }
        Ok(())
    }

    fn list_text(&self) -> String {
        render::documents(self.documents.documents(), self.selection.lock().state())
    }

    fn flush_notice<W: Write>(&mut self, out: &mut W) -> std::io::Result<()> {
        if let Some(notice) = self.documents.take_notice() {
            writeln!(out, "{}", render::notice(&notice))?;
        }
        Ok(())
    }

    /// Tear every view down: pending results are discarded and the preview is revoked.
    pub fn shutdown(&mut self) {
        self.documents.unmount();
        self.query.lifetime().cancel();
        self.themes.lifetime().cancel();
        self.viewer.unmount();
    }
}
