#![allow(dead_code)]

use chrono::{DateTime, Utc};
use crossterm::event::KeyEvent;

use crate::listing::{direct_children, sort_entries};
use crate::ops::Mutation;
use crate::paths::{display_name, is_folder_key, leaf_name, parent_prefix};
use crate::tree::remove_subtree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Folder,
    Image,
    Pdf,
    Document,
    Video,
    Audio,
    File,
}

impl EntryKind {
    /// Kind of an object key. Keys ending with a separator are folders,
    /// everything else goes through the extension table.
    pub fn infer(key: &str) -> Self {
        if is_folder_key(key) {
            return Self::Folder;
        }
        let Some((_, extension)) = leaf_name(key).rsplit_once('.') else {
            return Self::File;
        };
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" => Self::Image,
            "pdf" => Self::Pdf,
            "doc" | "docx" => Self::Document,
            "mp4" | "mov" | "avi" => Self::Video,
            "mp3" | "wav" => Self::Audio,
            _ => Self::File,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Folder => "FOLDER",
            Self::Image => "IMAGE",
            Self::Pdf => "PDF",
            Self::Document => "DOC",
            Self::Video => "VIDEO",
            Self::Audio => "AUDIO",
            Self::File => "FILE",
        }
    }

    pub fn is_folder(self) -> bool {
        self == Self::Folder
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Enabled,
    Disabled,
}

impl EntryStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Enabled => "ENABLE",
            Self::Disabled => "DISABLE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: String,
    pub parent_id: String,
    pub name: String,
    pub kind: EntryKind,
    pub status: EntryStatus,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Entry {
    /// Materializes an entry from a storage object key. Folder sizes are
    /// forced to zero whatever the store reports.
    pub fn from_key(key: &str, size: u64, modified_at: DateTime<Utc>) -> Self {
        let kind = EntryKind::infer(key);
        Self {
            id: key.to_string(),
            parent_id: parent_prefix(key).to_string(),
            name: leaf_name(key).to_string(),
            kind,
            status: EntryStatus::Enabled,
            size: if kind.is_folder() { 0 } else { size },
            created_at: modified_at,
            modified_at,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind.is_folder()
    }

    pub fn display_name(&self) -> &str {
        display_name(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    Name,
    Size,
    ModifiedAt,
}

impl SortMode {
    pub fn next(self) -> Self {
        match self {
            Self::Name => Self::Size,
            Self::Size => Self::ModifiedAt,
            Self::ModifiedAt => Self::Name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavState<'a> {
    AtRoot,
    InFolder(&'a str),
}

/// Folder stack: the current prefix plus the prefixes visited before it.
#[derive(Debug, Clone, Default)]
pub struct Navigation {
    current: String,
    back_stack: Vec<String>,
}

impl Navigation {
    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn state(&self) -> NavState<'_> {
        if self.current.is_empty() {
            NavState::AtRoot
        } else {
            NavState::InFolder(&self.current)
        }
    }

    pub fn depth(&self) -> usize {
        self.back_stack.len()
    }

    pub fn can_go_back(&self) -> bool {
        !self.back_stack.is_empty()
    }

    pub fn enter_prefix(&mut self, prefix: impl Into<String>) {
        let next = prefix.into();
        let previous = std::mem::replace(&mut self.current, next);
        self.back_stack.push(previous);
    }

    /// Moves into `entry` if it is a folder.
    pub fn enter(&mut self, entry: &Entry) -> bool {
        if !entry.is_folder() {
            return false;
        }
        self.enter_prefix(entry.id.clone());
        true
    }

    pub fn back(&mut self) -> bool {
        match self.back_stack.pop() {
            Some(previous) => {
                self.current = previous;
                true
            }
            None => false,
        }
    }

    pub fn go_root(&mut self) -> bool {
        if self.current.is_empty() {
            return false;
        }
        self.enter_prefix(String::new());
        true
    }
}

#[derive(Debug, Clone)]
pub struct BrowserState {
    pub nav: Navigation,
    pub listing: Vec<Entry>,
    pub entries: Vec<Entry>,
    pub selected_index: usize,
    pub sort_mode: SortMode,
    pub search_query: String,
    pub error_message: Option<String>,
    pub loading: bool,
}

impl Default for BrowserState {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserState {
    pub fn new() -> Self {
        Self {
            nav: Navigation::default(),
            listing: Vec::new(),
            entries: Vec::new(),
            selected_index: 0,
            sort_mode: SortMode::Name,
            search_query: String::new(),
            error_message: None,
            loading: false,
        }
    }

    pub fn current_prefix(&self) -> &str {
        self.nav.current()
    }

    pub fn selected_entry(&self) -> Option<&Entry> {
        self.entries.get(self.selected_index)
    }

    pub fn move_selection_up(&mut self) {
        self.selected_index = self.selected_index.saturating_sub(1);
    }

    pub fn move_selection_down(&mut self) {
        if self.entries.is_empty() {
            self.selected_index = 0;
            return;
        }
        let last = self.entries.len().saturating_sub(1);
        self.selected_index = (self.selected_index + 1).min(last);
    }

    pub fn select_id(&mut self, id: &str) -> bool {
        match self.entries.iter().position(|entry| entry.id == id) {
            Some(idx) => {
                self.selected_index = idx;
                true
            }
            None => false,
        }
    }

    /// Replaces the listing wholesale and keeps the selection on the same
    /// key when it is still present.
    pub fn set_listing(&mut self, listing: Vec<Entry>) {
        let selected_id = self.selected_entry().map(|entry| entry.id.clone());
        self.listing = listing;
        self.error_message = None;
        self.loading = false;
        self.refresh_view();
        if let Some(id) = selected_id {
            self.select_id(&id);
        }
    }

    /// Records a failed fetch; the last listing stays on screen.
    pub fn listing_failed(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
        self.loading = false;
    }

    pub fn refresh_view(&mut self) {
        let mut entries = direct_children(&self.listing, self.nav.current());
        sort_entries(&mut entries, self.sort_mode);
        let needle = self.search_query.trim().to_lowercase();
        if !needle.is_empty() {
            entries.retain(|entry| entry.display_name().to_lowercase().contains(&needle));
        }
        self.entries = entries;
        self.normalize_selection();
    }

    /// Drops a deleted entry and everything below it from the cached
    /// listing, ahead of the re-listing that confirms it.
    pub fn forget_subtree(&mut self, id: &str) {
        self.listing = remove_subtree(&self.listing, id);
        self.refresh_view();
    }

    pub fn clear_search(&mut self) {
        self.search_query.clear();
        self.refresh_view();
    }

    pub fn set_sort_mode(&mut self, sort_mode: SortMode) {
        self.sort_mode = sort_mode;
        self.refresh_view();
    }

    pub fn enter(&mut self, entry: &Entry) -> bool {
        if !self.nav.enter(entry) {
            return false;
        }
        self.after_navigation();
        true
    }

    pub fn back(&mut self) -> bool {
        if !self.nav.back() {
            return false;
        }
        self.after_navigation();
        true
    }

    pub fn go_root(&mut self) -> bool {
        if !self.nav.go_root() {
            return false;
        }
        self.after_navigation();
        true
    }

    fn after_navigation(&mut self) {
        self.search_query.clear();
        self.selected_index = 0;
        self.loading = true;
        self.refresh_view();
    }

    fn normalize_selection(&mut self) {
        if self.entries.is_empty() {
            self.selected_index = 0;
            return;
        }
        let last = self.entries.len().saturating_sub(1);
        self.selected_index = self.selected_index.min(last);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeTone {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub tone: NoticeTone,
    pub text: String,
    pub ticks_left: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PromptKind {
    Rename { entry: Entry },
    NewFolder,
    UploadSource,
    UploadName { local_path: std::path::PathBuf },
    Search,
}

#[derive(Debug, Clone)]
pub struct Prompt {
    pub kind: PromptKind,
    pub title: String,
    pub value: String,
    pub error: Option<String>,
}

impl Prompt {
    pub fn new(kind: PromptKind, title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            value: value.into(),
            error: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TerminalSize {
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub store_label: String,
    pub bucket: String,
    pub browser: BrowserState,
    pub status_line: String,
    pub activity_log: Vec<String>,
    pub notice: Option<Notice>,
    pub prompt: Option<Prompt>,
    pub confirm_prompt: Option<String>,
    pub jobs: Vec<Job>,
    pub terminal_size: TerminalSize,
}

impl AppState {
    pub fn new(store_label: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            store_label: store_label.into(),
            bucket: bucket.into(),
            browser: BrowserState::new(),
            status_line: "Ready".to_string(),
            activity_log: Vec::new(),
            notice: None,
            prompt: None,
            confirm_prompt: None,
            jobs: Vec::new(),
            terminal_size: TerminalSize {
                width: 0,
                height: 0,
            },
        }
    }

    pub fn running_jobs(&self) -> usize {
        self.jobs
            .iter()
            .filter(|job| matches!(job.status, JobStatus::Queued | JobStatus::Running))
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    MoveSelectionUp,
    MoveSelectionDown,
    OpenSelected,
    Back,
    GoRoot,
    Refresh,
    Upload,
    Download,
    Rename,
    NewFolder,
    Delete,
    ToggleSort,
    StartSearch,
}

#[derive(Debug, Clone)]
pub enum Event {
    Input(KeyEvent),
    Paste(String),
    Tick,
    Resize { width: u16, height: u16 },
    Job(JobUpdate),
    Listing(ListingUpdate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    List,
    Upload,
    Download,
    Delete,
    Rename,
    CreateFolder,
}

impl JobKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Upload => "upload",
            Self::Download => "download",
            Self::Delete => "delete",
            Self::Rename => "rename",
            Self::CreateFolder => "create-folder",
        }
    }

    /// Whether a successful run invalidates the current listing.
    pub fn changes_bucket(self) -> bool {
        !matches!(self, Self::List | Self::Download)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: u64,
    pub kind: JobKind,
    pub status: JobStatus,
    pub target: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Work {
    List { prefix: String },
    Mutate(Mutation),
}

#[derive(Debug, Clone)]
pub struct JobRequest {
    pub id: u64,
    pub work: Work,
}

impl JobRequest {
    pub fn kind(&self) -> JobKind {
        match &self.work {
            Work::List { .. } => JobKind::List,
            Work::Mutate(mutation) => mutation.kind(),
        }
    }

    pub fn target(&self) -> String {
        match &self.work {
            Work::List { prefix } => prefix.clone(),
            Work::Mutate(mutation) => mutation.target().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobUpdate {
    pub id: u64,
    pub kind: JobKind,
    pub status: JobStatus,
    pub target: String,
    pub message: Option<String>,
}

impl JobUpdate {
    pub fn into_job(self) -> Job {
        Job {
            id: self.id,
            kind: self.kind,
            status: self.status,
            target: self.target,
            message: self.message,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListingUpdate {
    pub job_id: u64,
    pub prefix: String,
    pub result: Result<Vec<Entry>, String>,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{BrowserState, Entry, EntryKind, NavState, Navigation};

    fn entry(key: &str, size: u64) -> Entry {
        Entry::from_key(key, size, Utc::now())
    }

    #[test]
    fn kind_inference_is_case_insensitive() {
        assert_eq!(EntryKind::infer("photo.JPG"), EntryKind::Image);
        assert_eq!(EntryKind::infer("anim.gif"), EntryKind::Image);
        assert_eq!(EntryKind::infer("docs/report.Pdf"), EntryKind::Pdf);
        assert_eq!(EntryKind::infer("letter.docx"), EntryKind::Document);
        assert_eq!(EntryKind::infer("clip.MOV"), EntryKind::Video);
        assert_eq!(EntryKind::infer("song.wav"), EntryKind::Audio);
        assert_eq!(EntryKind::infer("archive.tar.gz"), EntryKind::File);
        assert_eq!(EntryKind::infer("Makefile"), EntryKind::File);
        assert_eq!(EntryKind::infer("v1.2/notes"), EntryKind::File);
        assert_eq!(EntryKind::infer("photos.png/"), EntryKind::Folder);
    }

    #[test]
    fn folders_never_carry_size() {
        let folder = entry("docs/", 4096);
        assert!(folder.is_folder());
        assert_eq!(folder.size, 0);
        assert_eq!(folder.display_name(), "docs");
        assert_eq!(entry("docs/readme.pdf", 120).size, 120);
    }

    #[test]
    fn navigation_stack_round_trips_to_root() {
        let mut nav = Navigation::default();
        assert_eq!(nav.state(), NavState::AtRoot);

        assert!(nav.enter(&entry("docs/", 0)));
        assert!(nav.enter(&entry("docs/2024/", 0)));
        assert_eq!(nav.state(), NavState::InFolder("docs/2024/"));
        assert_eq!(nav.depth(), 2);

        assert!(nav.back());
        assert_eq!(nav.current(), "docs/");
        assert!(nav.back());
        assert_eq!(nav.state(), NavState::AtRoot);

        assert!(!nav.back());
        assert_eq!(nav.state(), NavState::AtRoot);
    }

    #[test]
    fn entering_a_file_is_rejected() {
        let mut nav = Navigation::default();
        assert!(!nav.enter(&entry("img.png", 900)));
        assert_eq!(nav.depth(), 0);
    }

    #[test]
    fn go_root_is_undone_by_back() {
        let mut nav = Navigation::default();
        assert!(!nav.go_root());
        nav.enter(&entry("docs/", 0));
        assert!(nav.go_root());
        assert_eq!(nav.state(), NavState::AtRoot);
        assert!(nav.back());
        assert_eq!(nav.current(), "docs/");
    }

    #[test]
    fn failed_listing_keeps_previous_entries() {
        let mut browser = BrowserState::new();
        browser.set_listing(vec![entry("img.png", 900), entry("a.txt", 1)]);
        assert_eq!(browser.entries.len(), 2);

        browser.listing_failed("bucket not found");
        assert_eq!(browser.entries.len(), 2);
        assert_eq!(browser.listing.len(), 2);
        assert_eq!(browser.error_message.as_deref(), Some("bucket not found"));
    }

    #[test]
    fn selection_follows_key_across_listings() {
        let mut browser = BrowserState::new();
        browser.set_listing(vec![entry("b.txt", 1), entry("c.txt", 1)]);
        assert!(browser.select_id("c.txt"));

        browser.set_listing(vec![entry("a.txt", 1), entry("b.txt", 1), entry("c.txt", 1)]);
        assert_eq!(
            browser.selected_entry().map(|entry| entry.id.as_str()),
            Some("c.txt")
        );
    }

    #[test]
    fn search_filters_visible_entries() {
        let mut browser = BrowserState::new();
        browser.set_listing(vec![entry("Report.pdf", 1), entry("img.png", 1)]);
        browser.search_query = "rep".to_string();
        browser.refresh_view();
        assert_eq!(browser.entries.len(), 1);
        assert_eq!(browser.entries[0].id, "Report.pdf");
        browser.clear_search();
        assert_eq!(browser.entries.len(), 2);
    }

    #[test]
    fn search_ignores_surrounding_whitespace() {
        let mut browser = BrowserState::new();
        browser.set_listing(vec![entry("Report.pdf", 1), entry("img.png", 1)]);
        browser.search_query = " rep ".to_string();
        browser.refresh_view();
        assert_eq!(browser.entries.len(), 1);
        assert_eq!(browser.entries[0].id, "Report.pdf");

        browser.search_query = "   ".to_string();
        browser.refresh_view();
        assert_eq!(browser.entries.len(), 2);
    }

    #[test]
    fn forgetting_a_folder_drops_its_descendants() {
        let mut browser = BrowserState::new();
        browser.set_listing(vec![
            entry("docs/", 0),
            entry("docs/2024/", 0),
            entry("docs/2024/q1.pdf", 10),
            entry("img.png", 900),
        ]);
        browser.forget_subtree("docs/");
        let ids: Vec<_> = browser.listing.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(ids, vec!["img.png"]);
        assert_eq!(browser.entries.len(), 1);
    }

    #[test]
    fn entering_folder_shows_known_children() {
        let mut browser = BrowserState::new();
        browser.set_listing(vec![
            entry("docs/", 0),
            entry("docs/readme.pdf", 120),
            entry("img.png", 900),
        ]);
        let docs = browser
            .entries
            .iter()
            .find(|entry| entry.id == "docs/")
            .cloned()
            .expect("docs folder listed");
        assert!(browser.enter(&docs));
        assert!(browser.loading);
        assert_eq!(browser.entries.len(), 1);
        assert_eq!(browser.entries[0].name, "readme.pdf");

        assert!(browser.back());
        assert_eq!(browser.current_prefix(), "");
        assert_eq!(browser.entries.len(), 2);
    }
}
