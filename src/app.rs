use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use crossbeam_channel::Sender;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{debug, info};

use crate::jobs::WorkerPool;
use crate::model::{
    AppState, Command, Entry, Event, Job, JobKind, JobRequest, JobStatus, JobUpdate, ListingUpdate, Notice,
    NoticeTone, Prompt, PromptKind, TerminalSize, Work,
};
use crate::ops::{Mutation, plan_create_folder, plan_delete, plan_download, plan_rename, plan_upload};
use crate::store::ObjectStore;

const NOTICE_TICKS: u16 = 20;
const MAX_ACTIVITY_LOG: usize = 16;
const MAX_FINISHED_JOBS: usize = 32;

pub struct App {
    state: AppState,
    running: bool,
    store: Arc<dyn ObjectStore>,
    workers: WorkerPool,
    download_dir: PathBuf,
    next_job_id: u64,
    pending_confirmation: Option<PendingConfirmation>,
}

enum PendingConfirmation {
    Delete { entry: Entry },
}

impl App {
    pub fn bootstrap(
        store: Arc<dyn ObjectStore>,
        download_dir: PathBuf,
        worker_count: usize,
        event_tx: Sender<Event>,
    ) -> Result<Self> {
        let workers = WorkerPool::new(worker_count, Arc::clone(&store), event_tx);
        let mut app = Self {
            state: AppState::new(store.store_name(), store.bucket()),
            running: true,
            store,
            workers,
            download_dir,
            next_job_id: 1,
            pending_confirmation: None,
        };

        app.request_listing()?;
        Ok(app)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn on_event(&mut self, event: Event) -> bool {
        match event {
            Event::Input(key) => {
                if let Some(redraw) = self.handle_confirmation_input(&key) {
                    return redraw;
                }

                if let Some(redraw) = self.handle_prompt_input(&key) {
                    return redraw;
                }

                match map_key_to_command(&key) {
                    Some(command) => self.apply_command(command),
                    None => false,
                }
            }
            Event::Paste(text) => self.handle_paste(text),
            Event::Tick => self.expire_notice(),
            Event::Resize { width, height } => {
                self.state.terminal_size = TerminalSize { width, height };
                true
            }
            Event::Job(update) => self.handle_job_update(update),
            Event::Listing(update) => self.handle_listing(update),
        }
    }

    fn apply_command(&mut self, command: Command) -> bool {
        let command_result: Result<bool> = match command {
            Command::Quit => {
                self.running = false;
                Ok(false)
            }
            Command::MoveSelectionUp => {
                self.state.browser.move_selection_up();
                Ok(true)
            }
            Command::MoveSelectionDown => {
                self.state.browser.move_selection_down();
                Ok(true)
            }
            Command::OpenSelected => self.open_selected(),
            Command::Back => self.go_back(),
            Command::GoRoot => self.go_root(),
            Command::Refresh => self.request_listing(),
            Command::Upload => self.start_upload(),
            Command::Download => self.download_selected(),
            Command::Rename => self.start_rename(),
            Command::NewFolder => self.start_new_folder(),
            Command::Delete => self.confirm_delete(),
            Command::ToggleSort => {
                let next = self.state.browser.sort_mode.next();
                self.state.browser.set_sort_mode(next);
                Ok(true)
            }
            Command::StartSearch => self.start_search(),
        };

        match command_result {
            Ok(should_redraw) => should_redraw,
            Err(err) => {
                self.notify(NoticeTone::Error, err.to_string());
                true
            }
        }
    }

    fn request_listing(&mut self) -> Result<bool> {
        let prefix = self.state.browser.current_prefix().to_string();
        let id = self.take_job_id();
        self.state.browser.loading = true;
        debug!(job = id, prefix = prefix.as_str(), "listing requested");
        self.workers.submit(JobRequest {
            id,
            work: Work::List { prefix },
        })?;
        Ok(true)
    }

    fn handle_listing(&mut self, update: ListingUpdate) -> bool {
        if update.prefix != self.state.browser.current_prefix() {
            debug!(
                job = update.job_id,
                prefix = update.prefix.as_str(),
                "discarding listing for a folder no longer shown"
            );
            return false;
        }

        match update.result {
            Ok(entries) => {
                let count = entries.len();
                self.state.browser.set_listing(entries);
                self.state.status_line = format!(
                    "Loaded {} ({count} objects)",
                    prefix_label(&update.prefix)
                );
            }
            Err(message) => {
                self.state.browser.listing_failed(message.clone());
                self.push_log(format!("list failed: {message}"));
                self.notify(NoticeTone::Error, message);
            }
        }
        true
    }

    fn handle_job_update(&mut self, update: JobUpdate) -> bool {
        let kind = update.kind;
        let status = update.status;
        let target = update.target.clone();
        let message = update.message.clone();

        if let Some(job) = self.state.jobs.iter_mut().find(|job| job.id == update.id) {
            job.status = update.status;
            job.message = update.message.clone();
        } else {
            self.state.jobs.push(update.into_job());
        }
        self.prune_jobs();

        match status {
            JobStatus::Queued | JobStatus::Running => {
                self.state.status_line = format!("{} running", kind.label());
            }
            JobStatus::Done => {
                let text = message.unwrap_or_else(|| format!("{} done", kind.label()));
                info!("{text}");
                self.push_log(text.clone());
                self.notify(NoticeTone::Success, text);
                if kind == JobKind::Delete {
                    self.state.browser.forget_subtree(&target);
                }
                if kind.changes_bucket() {
                    if let Err(err) = self.request_listing() {
                        self.push_log(format!("refresh failed: {err}"));
                    }
                }
            }
            JobStatus::Failed => {
                let text = message.unwrap_or_else(|| format!("{} failed", kind.label()));
                self.push_log(text.clone());
                self.notify(NoticeTone::Error, text);
            }
        }
        true
    }

    fn open_selected(&mut self) -> Result<bool> {
        let Some(entry) = self.state.browser.selected_entry().cloned() else {
            return Ok(false);
        };

        if entry.is_folder() {
            self.state.browser.enter(&entry);
            return self.request_listing();
        }
        self.download_entry(&entry)
    }

    fn go_back(&mut self) -> Result<bool> {
        if !self.state.browser.back() {
            self.state.status_line = "Already at the first folder".to_string();
            return Ok(true);
        }
        self.request_listing()
    }

    fn go_root(&mut self) -> Result<bool> {
        if !self.state.browser.go_root() {
            return Ok(false);
        }
        self.request_listing()
    }

    fn download_selected(&mut self) -> Result<bool> {
        match self.state.browser.selected_entry().cloned() {
            Some(entry) => self.download_entry(&entry),
            None => {
                self.notify(NoticeTone::Info, "Select a file to download");
                Ok(true)
            }
        }
    }

    fn download_entry(&mut self, entry: &Entry) -> Result<bool> {
        let mutation = plan_download(entry, &self.download_dir)?;
        self.push_log(format!("download: {}", self.store.download_url(&entry.id)));
        self.enqueue_mutation(mutation)
    }

    fn start_upload(&mut self) -> Result<bool> {
        self.open_prompt(Prompt::new(
            PromptKind::UploadSource,
            "Upload file: local path",
            String::new(),
        ));
        Ok(true)
    }

    fn start_rename(&mut self) -> Result<bool> {
        let Some(entry) = self.state.browser.selected_entry().cloned() else {
            self.notify(NoticeTone::Info, "Select an entry to rename");
            return Ok(true);
        };
        let title = if entry.is_folder() {
            "Rename folder"
        } else {
            "Rename file"
        };
        let value = entry.display_name().to_string();
        self.open_prompt(Prompt::new(PromptKind::Rename { entry }, title, value));
        Ok(true)
    }

    fn start_new_folder(&mut self) -> Result<bool> {
        self.open_prompt(Prompt::new(PromptKind::NewFolder, "New folder", String::new()));
        Ok(true)
    }

    fn start_search(&mut self) -> Result<bool> {
        let query = self.state.browser.search_query.clone();
        self.open_prompt(Prompt::new(PromptKind::Search, "Filter by name", query));
        Ok(true)
    }

    fn confirm_delete(&mut self) -> Result<bool> {
        let Some(entry) = self.state.browser.selected_entry().cloned() else {
            return Ok(false);
        };
        let question = if entry.is_folder() {
            format!(
                "Delete folder '{}' and everything in it? [y/N]",
                entry.display_name()
            )
        } else {
            format!("Delete '{}'? [y/N]", entry.display_name())
        };
        self.state.confirm_prompt = Some(question);
        self.pending_confirmation = Some(PendingConfirmation::Delete { entry });
        Ok(true)
    }

    fn enqueue_mutation(&mut self, mutation: Mutation) -> Result<bool> {
        let id = self.take_job_id();
        let kind = mutation.kind();
        let target = mutation.target().to_string();
        let queued_message = format!("{} queued: {target}", kind.label());

        self.state.jobs.push(Job {
            id,
            kind,
            status: JobStatus::Queued,
            target,
            message: Some(queued_message.clone()),
        });
        self.push_log(queued_message);
        self.workers.submit(JobRequest {
            id,
            work: Work::Mutate(mutation),
        })?;
        Ok(true)
    }

    fn handle_confirmation_input(&mut self, key: &KeyEvent) -> Option<bool> {
        self.pending_confirmation.as_ref()?;

        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                let confirmation = self.pending_confirmation.take();
                self.state.confirm_prompt = None;
                if let Some(PendingConfirmation::Delete { entry }) = confirmation {
                    let mutation = plan_delete(self.state.browser.current_prefix(), &entry);
                    if let Err(err) = self.enqueue_mutation(mutation) {
                        self.notify(NoticeTone::Error, err.to_string());
                    }
                }
                Some(true)
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc | KeyCode::Enter => {
                self.pending_confirmation = None;
                self.state.confirm_prompt = None;
                self.push_log("delete canceled");
                Some(true)
            }
            _ => Some(false),
        }
    }

    fn handle_prompt_input(&mut self, key: &KeyEvent) -> Option<bool> {
        let prompt = self.state.prompt.as_mut()?;

        match key.code {
            KeyCode::Char(c)
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
            {
                prompt.value.push(c);
                prompt.error = None;
                self.sync_search_prompt();
                Some(true)
            }
            KeyCode::Backspace => {
                prompt.value.pop();
                prompt.error = None;
                self.sync_search_prompt();
                Some(true)
            }
            KeyCode::Esc => {
                if let Some(closed) = self.state.prompt.take() {
                    if closed.kind == PromptKind::Search {
                        self.state.browser.clear_search();
                        self.state.status_line = "search cleared".to_string();
                    }
                }
                Some(true)
            }
            KeyCode::Enter => {
                self.submit_prompt();
                Some(true)
            }
            _ => Some(false),
        }
    }

    fn handle_paste(&mut self, text: String) -> bool {
        let Some(prompt) = self.state.prompt.as_mut() else {
            return false;
        };
        prompt.value.push_str(text.trim_end_matches(['\r', '\n']));
        prompt.error = None;
        self.sync_search_prompt();
        true
    }

    fn sync_search_prompt(&mut self) {
        let Some(prompt) = self.state.prompt.as_ref() else {
            return;
        };
        if prompt.kind != PromptKind::Search {
            return;
        }
        self.state.browser.search_query = prompt.value.clone();
        self.state.browser.refresh_view();
    }

    /// Validates the open prompt. Invalid input keeps the prompt open with
    /// the reason shown inside it and nothing is sent to the store.
    fn submit_prompt(&mut self) {
        let Some(prompt) = self.state.prompt.clone() else {
            return;
        };
        let prefix = self.state.browser.current_prefix().to_string();

        let planned = match &prompt.kind {
            PromptKind::Rename { entry } => plan_rename(&prefix, entry, &prompt.value),
            PromptKind::NewFolder => plan_create_folder(&prefix, &prompt.value),
            PromptKind::UploadSource => {
                let local_path = PathBuf::from(prompt.value.trim());
                match plan_upload(&prefix, &local_path, None) {
                    Ok(_) => {
                        let suggested = local_path
                            .file_name()
                            .map(|name| name.to_string_lossy().to_string())
                            .unwrap_or_default();
                        self.state.prompt = Some(Prompt::new(
                            PromptKind::UploadName { local_path },
                            "Upload file: object name",
                            suggested,
                        ));
                        return;
                    }
                    Err(err) => Err(err),
                }
            }
            PromptKind::UploadName { local_path } => {
                plan_upload(&prefix, local_path, Some(&prompt.value))
            }
            PromptKind::Search => {
                self.state.prompt = None;
                self.state.status_line = if prompt.value.is_empty() {
                    "search off".to_string()
                } else {
                    format!("search applied: {}", prompt.value)
                };
                return;
            }
        };

        match planned {
            Ok(mutation) => {
                self.state.prompt = None;
                if let Err(err) = self.enqueue_mutation(mutation) {
                    self.notify(NoticeTone::Error, err.to_string());
                }
            }
            Err(err) if err.is_validation() => {
                debug!("prompt rejected: {err}");
                if let Some(open) = self.state.prompt.as_mut() {
                    open.error = Some(err.user_message());
                }
            }
            Err(err) => {
                self.state.prompt = None;
                self.notify(NoticeTone::Error, err.user_message());
            }
        }
    }

    fn open_prompt(&mut self, prompt: Prompt) {
        self.state.prompt = Some(prompt);
    }

    fn expire_notice(&mut self) -> bool {
        let Some(notice) = self.state.notice.as_mut() else {
            return false;
        };
        notice.ticks_left = notice.ticks_left.saturating_sub(1);
        if notice.ticks_left == 0 {
            self.state.notice = None;
            return true;
        }
        false
    }

    fn notify(&mut self, tone: NoticeTone, text: impl Into<String>) {
        let text = text.into();
        self.state.status_line = text.clone();
        self.state.notice = Some(Notice {
            tone,
            text,
            ticks_left: NOTICE_TICKS,
        });
    }

    fn push_log(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.state.status_line = message.clone();
        self.state.activity_log.push(message);
        if self.state.activity_log.len() > MAX_ACTIVITY_LOG {
            self.state.activity_log.remove(0);
        }
    }

    fn prune_jobs(&mut self) {
        let finished = self
            .state
            .jobs
            .iter()
            .filter(|job| matches!(job.status, JobStatus::Done | JobStatus::Failed))
            .count();
        let mut excess = finished.saturating_sub(MAX_FINISHED_JOBS);
        self.state.jobs.retain(|job| {
            if excess > 0 && matches!(job.status, JobStatus::Done | JobStatus::Failed) {
                excess -= 1;
                return false;
            }
            true
        });
    }

    fn take_job_id(&mut self) -> u64 {
        let id = self.next_job_id;
        self.next_job_id += 1;
        id
    }
}

fn prefix_label(prefix: &str) -> &str {
    if prefix.is_empty() { "/" } else { prefix }
}

fn map_key_to_command(key: &KeyEvent) -> Option<Command> {
    match key.code {
        KeyCode::Char('q') | KeyCode::F(10) => Some(Command::Quit),
        KeyCode::Up | KeyCode::Char('k') => Some(Command::MoveSelectionUp),
        KeyCode::Down | KeyCode::Char('j') => Some(Command::MoveSelectionDown),
        KeyCode::Enter => Some(Command::OpenSelected),
        KeyCode::Backspace | KeyCode::Left => Some(Command::Back),
        KeyCode::Home | KeyCode::Char('~') => Some(Command::GoRoot),
        KeyCode::Char('r') | KeyCode::F(5) => Some(Command::Refresh),
        KeyCode::Char('u') | KeyCode::F(4) => Some(Command::Upload),
        KeyCode::Char('d') | KeyCode::F(3) => Some(Command::Download),
        KeyCode::Char('n') | KeyCode::F(2) => Some(Command::Rename),
        KeyCode::Char('m') | KeyCode::F(7) => Some(Command::NewFolder),
        KeyCode::Delete | KeyCode::F(8) => Some(Command::Delete),
        KeyCode::Char('s') => Some(Command::ToggleSort),
        KeyCode::Char('/') if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
            Some(Command::StartSearch)
        }
        _ => None,
    }
}
