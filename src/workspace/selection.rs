use crate::file::LocalFile;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Every way the shared selection context can change.
#[derive(Debug, Clone)]
pub enum SelectionAction {
    SetSelected(Vec<String>),
    Toggle(String),
    Clear,
    /// The visible document list was replaced (load, upload, delete).
    ListChanged,
    /// Keep the bytes of a file uploaded in this session.
    AttachFile { doc_id: String, file: LocalFile },
    DetachFile(String),
}

/// Selected document ids plus the in-memory file handles captured at upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    selected: BTreeSet<String>,
    files: HashMap<String, LocalFile>,
}

impl SelectionState {
    /// Pure transition: returns the next state, `self` is untouched.
    pub fn reduce(&self, action: SelectionAction) -> SelectionState {
        let mut next = self.clone();
        match action {
            SelectionAction::SetSelected(ids) => {
                next.selected = ids.into_iter().collect();
            }
            SelectionAction::Toggle(id) => {
                if !next.selected.remove(&id) {
                    next.selected.insert(id);
                }
            }
            SelectionAction::Clear | SelectionAction::ListChanged => next.selected.clear(),
            SelectionAction::AttachFile { doc_id, file } => {
                next.files.insert(doc_id, file);
            }
            SelectionAction::DetachFile(doc_id) => {
                next.files.remove(&doc_id);
                next.selected.remove(&doc_id);
            }
        }
        next
    }

    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(String::as_str)
    }

    pub fn is_selected(&self, doc_id: &str) -> bool {
        self.selected.contains(doc_id)
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// The single selected id, if exactly one is selected. Preview is only offered then.
    pub fn single(&self) -> Option<&str> {
        match self.selected.len() {
            1 => self.selected.iter().next().map(String::as_str),
            _ => None,
        }
    }

    pub fn file(&self, doc_id: &str) -> Option<&LocalFile> {
        self.files.get(doc_id)
    }
}

/// Owner of the selection state. Shared between views as [`SharedSelection`].
#[derive(Debug, Default)]
pub struct SelectionCoordinator {
    state: SelectionState,
}

pub type SharedSelection = Arc<Mutex<SelectionCoordinator>>;

impl SelectionCoordinator {
    pub fn shared() -> SharedSelection {
        Arc::new(Mutex::new(Self::default()))
    }

    pub fn dispatch(&mut self, action: SelectionAction) {
        self.state = self.state.reduce(action);
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn set_selected(&mut self, ids: Vec<String>) {
        self.dispatch(SelectionAction::SetSelected(ids));
    }

    pub fn toggle(&mut self, doc_id: impl Into<String>) {
        self.dispatch(SelectionAction::Toggle(doc_id.into()));
    }

    pub fn clear(&mut self) {
        self.dispatch(SelectionAction::Clear);
    }

    pub fn selected_ids(&self) -> Vec<String> {
        self.state.selected().map(str::to_string).collect()
    }

    pub fn single_selected(&self) -> Option<String> {
        self.state.single().map(str::to_string)
    }

    pub fn file(&self, doc_id: &str) -> Option<LocalFile> {
        self.state.file(doc_id).cloned()
    }
}
