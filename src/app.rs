use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::audio::{AudioPlayer, PlaybackState};
use crate::client::ApiClient;
use crate::config::Config;
use crate::models::*;
use crate::quiz::{QuizEngine, QuizPhase};

/// Top-level panels. Exactly one is active at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Dashboard,
    Text,
    Code,
    Visual,
    Audio,
}

impl View {
    pub const ALL: [View; 5] = [
        View::Dashboard,
        View::Text,
        View::Code,
        View::Visual,
        View::Audio,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::Text => "Lesson",
            Self::Code => "Code",
            Self::Visual => "Visual",
            Self::Audio => "Audio",
        }
    }

    pub fn next(&self) -> Self {
        let idx = Self::ALL.iter().position(|v| v == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Self {
        let idx = Self::ALL.iter().position(|v| v == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Topic,
    CodePrompt,
    Chat,
}

/// Focus within the dashboard view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardPane {
    Graph,
    Quiz,
}

/// Content state of a fetched panel. Lazy fetch triggers fire only on
/// `Empty`, so a panel is requested at most once per session.
#[derive(Debug, Clone, Default)]
pub enum Panel<T> {
    #[default]
    Empty,
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> Panel<T> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// Resolution state of a video resource in the node modal.
#[derive(Debug, Clone)]
pub enum VideoLink {
    Resolving,
    Ready(String),
    Unavailable(String),
}

/// Detail modal for a knowledge node.
#[derive(Debug, Clone)]
pub struct NodeModal {
    pub node_index: usize,
    pub videos: HashMap<usize, VideoLink>,
}

/// Result of one background fetch, tagged with the session generation it
/// belongs to.
#[derive(Debug)]
pub struct FetchEvent {
    pub generation: u64,
    pub outcome: Outcome,
}

#[derive(Debug)]
pub enum Outcome {
    Architecture(Result<Architecture, String>),
    Text(Result<TextLesson, String>),
    /// Architecture and text both landed; dependent fetches may start.
    CoreReady,
    Code(Result<CodeSample, String>),
    Visual(Result<Vec<u8>, String>),
    Audio(Result<Vec<u8>, String>),
    Quiz(Result<Vec<QuizQuestion>, String>),
    Chat(Result<String, String>),
    Video {
        node_index: usize,
        resource_index: usize,
        result: Result<String, String>,
    },
}

pub struct App {
    pub config: Config,
    client: Arc<ApiClient>,
    cache_dir: PathBuf,

    pub view: View,
    pub input_mode: InputMode,
    pub session: Option<Session>,
    pub topic_input: String,
    pub code_prompt: String,
    pub difficulty: Difficulty,
    pub voice: Voice,

    pub dashboard: Panel<Architecture>,
    pub text_panel: Panel<TextLesson>,
    pub code_panel: Panel<CodeSample>,
    pub visual_panel: Panel<Diagram>,

    pub quiz: QuizEngine,
    pub mastery: Mastery,
    pub audio: AudioPlayer,

    pub dashboard_pane: DashboardPane,
    pub selected_node: usize,
    pub modal: Option<NodeModal>,

    pub chat_open: bool,
    pub chat_input: String,
    pub chat_messages: Vec<ChatMessage>,
    pub chat_waiting: bool,

    pub status_message: Option<String>,

    generation: u64,
    events_tx: UnboundedSender<FetchEvent>,
    events_rx: UnboundedReceiver<FetchEvent>,
}

impl App {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let client = ApiClient::new(
            &config.server.base_url,
            Duration::from_secs(config.server.timeout_secs),
        )?;
        let cache_dir = Config::cache_dir()?;
        let difficulty = Difficulty::parse(&config.session.difficulty);
        let voice = Voice::parse(&config.session.voice);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            client: Arc::new(client),
            cache_dir,
            view: View::Dashboard,
            input_mode: InputMode::Normal,
            session: None,
            topic_input: String::new(),
            code_prompt: String::new(),
            difficulty,
            voice,
            dashboard: Panel::Empty,
            text_panel: Panel::Empty,
            code_panel: Panel::Empty,
            visual_panel: Panel::Empty,
            quiz: QuizEngine::new(),
            mastery: Mastery::default(),
            audio: AudioPlayer::new(),
            dashboard_pane: DashboardPane::Graph,
            selected_node: 0,
            modal: None,
            chat_open: false,
            chat_input: String::new(),
            chat_messages: vec![ChatMessage::bot(
                "Hi! Set a topic (t) and start a session (s).",
            )],
            chat_waiting: false,
            status_message: None,
            generation: 0,
            events_tx,
            events_rx,
        })
    }

    // --- event loop hooks ---

    /// Apply all fetch results that have arrived since the last tick.
    pub fn drain_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply_event(event);
        }
    }

    /// Per-tick housekeeping (detects natural end of narration).
    pub fn tick(&mut self) {
        self.audio.tick();
    }

    // --- key handling ---

    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        self.status_message = None;
        match self.input_mode {
            InputMode::Topic => {
                self.handle_topic_key(key);
                false
            }
            InputMode::CodePrompt => {
                self.handle_code_prompt_key(key);
                false
            }
            InputMode::Chat => {
                self.handle_chat_key(key);
                false
            }
            InputMode::Normal => self.handle_normal_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> bool {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return true;
        }

        if self.modal.is_some() {
            match key.code {
                KeyCode::Esc | KeyCode::Char('q') => self.modal = None,
                KeyCode::Char('m') => self.toggle_selected_complete(),
                _ => {}
            }
            return false;
        }

        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Tab => self.set_view(self.view.next()),
            KeyCode::BackTab => self.set_view(self.view.prev()),
            KeyCode::Char('t') => self.input_mode = InputMode::Topic,
            KeyCode::Char('g') => {
                self.difficulty = self.difficulty.next();
                self.status_message = Some(format!("Difficulty: {}", self.difficulty.name()));
            }
            KeyCode::Char('v') => {
                self.voice = self.voice.next();
                self.status_message = Some(format!("Voice: {}", self.voice.label()));
            }
            KeyCode::Char('s') => self.start_session(),
            KeyCode::Char('c') => {
                self.chat_open = true;
                self.input_mode = InputMode::Chat;
            }
            _ => match self.view {
                View::Dashboard => self.handle_dashboard_key(key),
                View::Code => self.handle_code_key(key),
                View::Audio => self.handle_audio_key(key),
                _ => {}
            },
        }

        false
    }

    fn handle_dashboard_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => self.dashboard_pane = DashboardPane::Graph,
            KeyCode::Right | KeyCode::Char('l') => self.dashboard_pane = DashboardPane::Quiz,
            _ => {}
        }

        match self.dashboard_pane {
            DashboardPane::Graph => match key.code {
                KeyCode::Char('j') | KeyCode::Down => {
                    let count = self.node_count();
                    if count > 0 {
                        self.selected_node = (self.selected_node + 1).min(count - 1);
                    }
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    self.selected_node = self.selected_node.saturating_sub(1);
                }
                KeyCode::Enter => self.open_node_modal(),
                _ => {}
            },
            DashboardPane::Quiz => match key.code {
                KeyCode::Char(c @ '1'..='4') => {
                    let option = c as usize - '1' as usize;
                    self.quiz.select(option);
                }
                KeyCode::Char('n') => {
                    if self.quiz.advance() {
                        self.fetch_more_questions();
                    }
                }
                KeyCode::Char('r') => {
                    if self.quiz.phase() == QuizPhase::FetchFailed {
                        self.fetch_more_questions();
                    }
                }
                _ => {}
            },
        }
    }

    fn handle_code_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('e') => self.input_mode = InputMode::CodePrompt,
            KeyCode::Char('d') => self.export_code(),
            _ => {}
        }
    }

    fn handle_audio_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char(' ') {
            self.toggle_audio();
        }
    }

    fn handle_topic_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.input_mode = InputMode::Normal,
            KeyCode::Enter => {
                self.input_mode = InputMode::Normal;
                self.start_session();
            }
            KeyCode::Backspace => {
                self.topic_input.pop();
            }
            KeyCode::Char(c) => self.topic_input.push(c),
            _ => {}
        }
    }

    fn handle_code_prompt_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.input_mode = InputMode::Normal,
            KeyCode::Enter => {
                self.input_mode = InputMode::Normal;
                self.fetch_code();
            }
            KeyCode::Backspace => {
                self.code_prompt.pop();
            }
            KeyCode::Char(c) => self.code_prompt.push(c),
            _ => {}
        }
    }

    fn handle_chat_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.chat_open = false;
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Enter => self.send_chat(),
            KeyCode::Backspace => {
                self.chat_input.pop();
            }
            KeyCode::Char(c) => self.chat_input.push(c),
            _ => {}
        }
    }

    // --- view switching ---

    /// Switch the active panel. First entry into the code or visual panel
    /// of an active session triggers that panel's fetch exactly once.
    pub fn set_view(&mut self, view: View) {
        self.view = view;
        if self.session.is_some() {
            if view == View::Code && self.code_panel.is_empty() {
                self.fetch_code();
            }
            if view == View::Visual && self.visual_panel.is_empty() {
                self.fetch_visual();
            }
        }
    }

    // --- session orchestration ---

    /// Start a fresh session: reset all panels, bump the generation token
    /// and fetch architecture + text concurrently. Code and visual fire
    /// only after both land (`CoreReady`), unjoined with each other.
    pub fn start_session(&mut self) {
        let topic = self.topic_input.trim().to_string();
        if topic.is_empty() {
            self.status_message = Some("Set a topic first (press t)".to_string());
            return;
        }

        self.generation += 1;
        let generation = self.generation;
        let difficulty = self.difficulty;
        self.session = Some(Session {
            topic: topic.clone(),
            difficulty,
            generation,
        });
        info!(%topic, difficulty = difficulty.as_str(), generation, "starting session");

        self.dashboard = Panel::Loading;
        self.text_panel = Panel::Loading;
        self.code_panel = Panel::Empty;
        self.visual_panel = Panel::Empty;
        self.quiz.clear();
        self.mastery = Mastery::default();
        self.audio.release();
        self.code_prompt.clear();
        self.modal = None;
        self.selected_node = 0;
        self.dashboard_pane = DashboardPane::Graph;
        self.chat_messages = vec![ChatMessage::bot(format!(
            "Hi! Ask me anything about {topic}."
        ))];
        self.chat_waiting = false;

        let client = self.client.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let (architecture, text) = tokio::join!(
                client.generate_architecture(&topic, difficulty),
                client.generate_text(&topic, difficulty),
            );
            let core_ok = architecture.is_ok() && text.is_ok();
            let _ = tx.send(FetchEvent {
                generation,
                outcome: Outcome::Architecture(architecture.map_err(|e| e.to_string())),
            });
            let _ = tx.send(FetchEvent {
                generation,
                outcome: Outcome::Text(text.map_err(|e| e.to_string())),
            });
            if core_ok {
                let _ = tx.send(FetchEvent {
                    generation,
                    outcome: Outcome::CoreReady,
                });
            }
        });
    }

    /// Fetch (or re-fetch) the code sample. A non-empty code prompt
    /// overrides the session topic, so the learner can steer what gets
    /// generated without restarting the session.
    fn fetch_code(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        let prompt = match self.code_prompt.trim() {
            "" => session.topic.clone(),
            p => p.to_string(),
        };
        self.code_panel = Panel::Loading;
        let client = self.client.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = client.generate_code(&prompt, session.difficulty).await;
            let _ = tx.send(FetchEvent {
                generation: session.generation,
                outcome: Outcome::Code(result.map_err(|e| e.to_string())),
            });
        });
    }

    /// Save the current code sample to the cache directory. The backend
    /// emits notebook-ready source, kept verbatim under the name the
    /// export has always used.
    fn export_code(&mut self) {
        let written = self
            .code_panel
            .ready()
            .map(|sample| self.write_notebook(&sample.code));
        self.status_message = Some(match written {
            Some(Ok(path)) => format!("Code saved to {}", path.display()),
            Some(Err(e)) => format!("Save error: {e}"),
            None => "No code sample to save yet.".to_string(),
        });
    }

    fn write_notebook(&self, code: &str) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.cache_dir)?;
        let path = self.cache_dir.join("lesson.ipynb");
        fs::write(&path, code)?;
        Ok(path)
    }

    fn fetch_visual(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        self.visual_panel = Panel::Loading;
        let client = self.client.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = client.generate_visual(&session.topic).await;
            let _ = tx.send(FetchEvent {
                generation: session.generation,
                outcome: Outcome::Visual(result.map_err(|e| e.to_string())),
            });
        });
    }

    fn fetch_more_questions(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        if !self.quiz.begin_fetch() {
            return;
        }
        let client = self.client.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = client
                .generate_quiz(&session.topic, session.difficulty)
                .await;
            let _ = tx.send(FetchEvent {
                generation: session.generation,
                outcome: Outcome::Quiz(result.map_err(|e| e.to_string())),
            });
        });
    }

    // --- audio ---

    /// Space on the audio view: pause when playing, resume or start when
    /// possible, fetch-then-play when idle with lesson text cached.
    fn toggle_audio(&mut self) {
        match self.audio.state() {
            PlaybackState::Playing => self.audio.pause(),
            PlaybackState::Paused | PlaybackState::Ready | PlaybackState::Ended => {
                if let Err(e) = self.audio.play() {
                    warn!(error = %e, "playback failed");
                    self.status_message = Some(format!("Playback error: {e}"));
                }
            }
            PlaybackState::Idle => match self.cached_text() {
                Some(text) => self.fetch_audio(text),
                None => {
                    self.status_message =
                        Some("Wait for the lesson text to load first.".to_string());
                }
            },
            PlaybackState::Loading => {}
        }
    }

    fn cached_text(&self) -> Option<String> {
        self.text_panel
            .ready()
            .map(|lesson| lesson.raw_text.clone())
            .filter(|text| !text.is_empty())
    }

    fn fetch_audio(&mut self, text: String) {
        let Some(session) = self.session.clone() else {
            return;
        };
        self.audio.begin_loading();
        let voice = self.voice;
        let client = self.client.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = client.generate_audio(&text, voice).await;
            let _ = tx.send(FetchEvent {
                generation: session.generation,
                outcome: Outcome::Audio(result.map_err(|e| e.to_string())),
            });
        });
    }

    // --- knowledge graph / mastery ---

    pub fn node_count(&self) -> usize {
        self.dashboard
            .ready()
            .map(|arch| arch.knowledge_graph.len())
            .unwrap_or(0)
    }

    fn open_node_modal(&mut self) {
        let generation = self.generation;
        let node_index = self.selected_node;
        let Some(arch) = self.dashboard.ready() else {
            return;
        };
        let Some(node) = arch.knowledge_graph.get(node_index) else {
            return;
        };

        let mut videos = HashMap::new();
        for (resource_index, resource) in node.resources.iter().enumerate() {
            if resource.kind != ResourceKind::Video {
                continue;
            }
            match resource.query.clone() {
                Some(query) => {
                    videos.insert(resource_index, VideoLink::Resolving);
                    let client = self.client.clone();
                    let tx = self.events_tx.clone();
                    tokio::spawn(async move {
                        let result = client.resolve_video(&query).await;
                        let _ = tx.send(FetchEvent {
                            generation,
                            outcome: Outcome::Video {
                                node_index,
                                resource_index,
                                result: result.map_err(|e| e.to_string()),
                            },
                        });
                    });
                }
                None => {
                    videos.insert(
                        resource_index,
                        VideoLink::Unavailable("no search query".to_string()),
                    );
                }
            }
        }

        self.modal = Some(NodeModal { node_index, videos });
    }

    fn toggle_selected_complete(&mut self) {
        let node_id = self.modal.as_ref().and_then(|modal| {
            self.dashboard
                .ready()
                .and_then(|arch| arch.knowledge_graph.get(modal.node_index))
                .map(|node| node.id)
        });
        if let Some(id) = node_id {
            self.mastery.toggle(id);
            self.modal = None;
        }
    }

    pub fn mastery_score(&self) -> u8 {
        self.mastery.score(self.node_count())
    }

    // --- chat ---

    /// Append the user turn optimistically, then issue one stateless
    /// request. Failure appends a fixed bot turn.
    fn send_chat(&mut self) {
        let message = self.chat_input.trim().to_string();
        if message.is_empty() {
            return;
        }
        self.chat_input.clear();
        self.chat_messages.push(ChatMessage::user(message.clone()));
        self.chat_waiting = true;

        let generation = self.generation;
        let topic = self
            .session
            .as_ref()
            .map(|s| s.topic.clone())
            .unwrap_or_default();
        let client = self.client.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = client.chat(&message, &topic).await;
            let _ = tx.send(FetchEvent {
                generation,
                outcome: Outcome::Chat(result.map_err(|e| e.to_string())),
            });
        });
    }

    // --- fetch result application ---

    fn apply_event(&mut self, event: FetchEvent) {
        if event.generation != self.generation {
            debug!(
                stale = event.generation,
                active = self.generation,
                "discarding stale fetch result"
            );
            return;
        }

        match event.outcome {
            Outcome::Architecture(Ok(architecture)) => {
                self.mastery = Mastery::new(architecture.analytics.mastery_seed());
                self.quiz.reset(architecture.quiz.clone());
                self.selected_node = 0;
                self.dashboard = Panel::Ready(architecture);
                if self.quiz.needs_fetch() {
                    self.fetch_more_questions();
                }
            }
            Outcome::Architecture(Err(message)) => {
                warn!(%message, "architecture generation failed");
                self.status_message = Some(format!("Architecture error: {message}"));
                self.dashboard = Panel::Failed(message);
            }
            Outcome::Text(Ok(lesson)) => {
                self.text_panel = Panel::Ready(lesson);
            }
            Outcome::Text(Err(message)) => {
                warn!(%message, "text generation failed");
                self.status_message = Some(format!("Text error: {message}"));
                self.text_panel = Panel::Failed(message);
            }
            Outcome::CoreReady => {
                if self.code_panel.is_empty() {
                    self.fetch_code();
                }
                if self.visual_panel.is_empty() {
                    self.fetch_visual();
                }
            }
            Outcome::Code(Ok(sample)) => {
                self.code_panel = Panel::Ready(sample);
            }
            Outcome::Code(Err(message)) => {
                warn!(%message, "code generation failed");
                self.status_message = Some(format!("Code error: {message}"));
                self.code_panel = Panel::Failed(message);
            }
            Outcome::Visual(Ok(bytes)) => match self.store_diagram(bytes) {
                Ok(diagram) => self.visual_panel = Panel::Ready(diagram),
                Err(e) => self.visual_panel = Panel::Failed(e.to_string()),
            },
            Outcome::Visual(Err(message)) => {
                warn!(%message, "visual generation failed");
                self.visual_panel = Panel::Failed(message);
            }
            Outcome::Audio(Ok(bytes)) => {
                match self.audio.bind_clip(bytes, &self.cache_dir) {
                    Ok(()) => {
                        if let Err(e) = self.audio.play() {
                            warn!(error = %e, "auto-play failed");
                            self.status_message = Some(format!("Playback error: {e}"));
                        }
                    }
                    Err(e) => {
                        self.audio.fail_loading();
                        self.status_message = Some(format!("Audio error: {e}"));
                    }
                }
            }
            Outcome::Audio(Err(message)) => {
                warn!(%message, "audio generation failed");
                self.audio.fail_loading();
                self.status_message = Some(format!("Audio error: {message}"));
            }
            Outcome::Quiz(result) => {
                self.quiz.complete_fetch(result);
            }
            Outcome::Chat(result) => {
                self.chat_waiting = false;
                match result {
                    Ok(text) => self.chat_messages.push(ChatMessage::bot(text)),
                    Err(message) => {
                        debug!(%message, "chat request failed");
                        self.chat_messages
                            .push(ChatMessage::bot("Error connecting."));
                    }
                }
            }
            Outcome::Video {
                node_index,
                resource_index,
                result,
            } => {
                if let Some(modal) = &mut self.modal {
                    if modal.node_index == node_index {
                        let link = match result {
                            Ok(id) => VideoLink::Ready(id),
                            Err(message) => VideoLink::Unavailable(message),
                        };
                        modal.videos.insert(resource_index, link);
                    }
                }
            }
        }
    }

    fn store_diagram(&self, bytes: Vec<u8>) -> anyhow::Result<Diagram> {
        fs::create_dir_all(&self.cache_dir)?;
        let format = image_format(&bytes);
        let name = if format == "JPEG" {
            "diagram.jpg"
        } else {
            "diagram.png"
        };
        let path = self.cache_dir.join(name);
        fs::write(&path, &bytes)?;
        Ok(Diagram {
            path,
            size_bytes: bytes.len(),
            format,
        })
    }

    // --- status line ---

    pub fn status_text(&self) -> String {
        if let Some(msg) = &self.status_message {
            return msg.clone();
        }

        match self.input_mode {
            InputMode::Topic => "TOPIC | Enter:start session  Esc:cancel".to_string(),
            InputMode::CodePrompt => "CODE PROMPT | Enter:regenerate  Esc:cancel".to_string(),
            InputMode::Chat => "CHAT | Enter:send  Esc:close".to_string(),
            InputMode::Normal => {
                if self.modal.is_some() {
                    return "m:toggle complete  Esc:close".to_string();
                }
                match self.view {
                    View::Dashboard => {
                        "Tab:view  t:topic  s:start  h/l:pane  j/k:nodes  Enter:details  1-4:answer  n:next  c:chat  q:quit"
                            .to_string()
                    }
                    View::Code => {
                        "Tab:view  e:code prompt  d:save .ipynb  c:chat  q:quit".to_string()
                    }
                    View::Audio => {
                        format!(
                            "Tab:view  Space:play/pause  v:voice ({})  c:chat  q:quit",
                            self.voice.label()
                        )
                    }
                    _ => "Tab:view  t:topic  s:start  c:chat  q:quit".to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEvent;

    fn app() -> App {
        App::new(Config::default()).unwrap()
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn lesson() -> TextLesson {
        TextLesson {
            content: "<p>hi</p>".to_string(),
            raw_text: "hi".to_string(),
        }
    }

    #[test]
    fn exactly_one_view_after_any_switch() {
        let mut app = app();
        // No session: switching must not trigger fetches or panic.
        for _ in 0..View::ALL.len() + 2 {
            app.handle_key(key(KeyCode::Tab));
            assert!(View::ALL.contains(&app.view));
        }
        app.handle_key(key(KeyCode::BackTab));
        assert!(View::ALL.contains(&app.view));
    }

    #[test]
    fn view_cycle_is_a_permutation() {
        let mut seen = Vec::new();
        let mut view = View::Dashboard;
        for _ in 0..View::ALL.len() {
            seen.push(view);
            view = view.next();
        }
        assert_eq!(view, View::Dashboard);
        for expected in View::ALL {
            assert!(seen.contains(&expected));
        }
        assert_eq!(View::Dashboard.next().prev(), View::Dashboard);
    }

    #[test]
    fn start_requires_topic() {
        let mut app = app();
        app.start_session();
        assert!(app.session.is_none());
        assert!(app.status_message.is_some());
    }

    #[tokio::test]
    async fn start_resets_state_and_bumps_generation() {
        let mut app = app();
        app.topic_input = "gradient descent".to_string();
        app.start_session();
        let first = app.session.as_ref().unwrap().generation;

        app.text_panel = Panel::Ready(lesson());
        app.start_session();
        let second = app.session.as_ref().unwrap().generation;

        assert!(second > first);
        assert!(matches!(app.text_panel, Panel::Loading));
        assert!(matches!(app.code_panel, Panel::Empty));
        assert_eq!(app.quiz.phase(), QuizPhase::Inactive);
        assert_eq!(app.chat_messages.len(), 1);
    }

    #[tokio::test]
    async fn stale_results_are_discarded() {
        let mut app = app();
        app.topic_input = "transformers".to_string();
        app.start_session();
        let stale = app.session.as_ref().unwrap().generation;
        app.start_session();

        app.apply_event(FetchEvent {
            generation: stale,
            outcome: Outcome::Text(Ok(lesson())),
        });
        assert!(matches!(app.text_panel, Panel::Loading));

        let current = app.session.as_ref().unwrap().generation;
        app.apply_event(FetchEvent {
            generation: current,
            outcome: Outcome::Text(Ok(lesson())),
        });
        assert!(app.text_panel.ready().is_some());
    }

    #[tokio::test]
    async fn declared_text_error_blocks_audio() {
        let mut app = app();
        app.topic_input = "svm".to_string();
        app.start_session();
        let generation = app.session.as_ref().unwrap().generation;

        app.apply_event(FetchEvent {
            generation,
            outcome: Outcome::Text(Err("rate limited".to_string())),
        });
        assert!(matches!(&app.text_panel, Panel::Failed(m) if m == "rate limited"));

        // Idle + no cached text: play is rejected with a prompt, no fetch.
        app.view = View::Audio;
        app.handle_key(key(KeyCode::Char(' ')));
        assert_eq!(app.audio.state(), PlaybackState::Idle);
        assert!(app.status_message.as_deref().unwrap_or("").contains("Wait"));
    }

    #[tokio::test]
    async fn architecture_seeds_quiz_and_mastery() {
        let mut app = app();
        app.topic_input = "cnns".to_string();
        app.start_session();
        let generation = app.session.as_ref().unwrap().generation;

        let architecture: Architecture = serde_json::from_str(
            r#"{
                "analytics": {"mastery_progress": 25},
                "knowledge_graph": [
                    {"skill": "A"}, {"skill": "B"}, {"skill": "C"}, {"skill": "D"}
                ],
                "quiz": [{"question":"?","options":["x","y"],"answer":0}]
            }"#,
        )
        .unwrap();
        app.apply_event(FetchEvent {
            generation,
            outcome: Outcome::Architecture(Ok(architecture)),
        });

        assert_eq!(app.node_count(), 4);
        assert_eq!(app.mastery_score(), 25);
        assert_eq!(app.quiz.phase(), QuizPhase::AwaitingAnswer);

        // Toggle nodes 0 and 2 complete -> 50%.
        let (a, c) = {
            let graph = &app.dashboard.ready().unwrap().knowledge_graph;
            (graph[0].id, graph[2].id)
        };
        app.mastery.toggle(a);
        app.mastery.toggle(c);
        assert_eq!(app.mastery_score(), 50);
    }

    #[tokio::test]
    async fn core_ready_fires_code_and_visual_once() {
        let mut app = app();
        app.topic_input = "rnns".to_string();
        app.start_session();
        let generation = app.session.as_ref().unwrap().generation;

        app.apply_event(FetchEvent {
            generation,
            outcome: Outcome::CoreReady,
        });
        assert!(matches!(app.code_panel, Panel::Loading));
        assert!(matches!(app.visual_panel, Panel::Loading));

        // Switching into the code view must not refetch a loading panel.
        app.set_view(View::Code);
        assert!(matches!(app.code_panel, Panel::Loading));
    }

    #[tokio::test]
    async fn lazy_fetch_fires_on_first_code_view_only() {
        let mut app = app();
        app.topic_input = "trees".to_string();
        app.start_session();

        assert!(app.code_panel.is_empty());
        app.set_view(View::Code);
        assert!(matches!(app.code_panel, Panel::Loading));

        let generation = app.session.as_ref().unwrap().generation;
        app.apply_event(FetchEvent {
            generation,
            outcome: Outcome::Code(Ok(CodeSample {
                code: "print('hi')".to_string(),
                dependencies: vec![],
            })),
        });
        app.set_view(View::Dashboard);
        app.set_view(View::Code);
        assert!(app.code_panel.ready().is_some());
    }

    #[tokio::test]
    async fn code_prompt_regenerates_and_resets_with_session() {
        let mut app = app();
        app.topic_input = "k-means".to_string();
        app.start_session();
        let generation = app.session.as_ref().unwrap().generation;
        app.apply_event(FetchEvent {
            generation,
            outcome: Outcome::Code(Ok(CodeSample {
                code: "x = 1".to_string(),
                dependencies: vec![],
            })),
        });
        assert!(app.code_panel.ready().is_some());

        // Edit a prompt on the code view and regenerate.
        app.set_view(View::Code);
        app.handle_key(key(KeyCode::Char('e')));
        assert_eq!(app.input_mode, InputMode::CodePrompt);
        for c in "numpy version".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.input_mode, InputMode::Normal);
        assert_eq!(app.code_prompt, "numpy version");
        assert!(matches!(app.code_panel, Panel::Loading));

        // A fresh session discards the override.
        app.start_session();
        assert!(app.code_prompt.is_empty());
    }

    #[test]
    fn export_writes_notebook_and_reports_path() {
        let mut app = app();
        app.cache_dir = std::env::temp_dir().join("study-tutor-test-export");
        app.view = View::Code;

        app.handle_key(key(KeyCode::Char('d')));
        assert!(app
            .status_message
            .as_deref()
            .unwrap()
            .contains("No code sample"));

        app.code_panel = Panel::Ready(CodeSample {
            code: "print('hi')".to_string(),
            dependencies: vec![],
        });
        app.handle_key(key(KeyCode::Char('d')));
        let path = app.cache_dir.join("lesson.ipynb");
        assert_eq!(fs::read_to_string(&path).unwrap(), "print('hi')");
        assert!(app.status_message.as_deref().unwrap().contains("lesson.ipynb"));

        fs::remove_dir_all(&app.cache_dir).ok();
    }

    #[tokio::test]
    async fn chat_failure_appends_fixed_bot_turn() {
        let mut app = app();
        app.chat_input = "what is a tensor".to_string();
        app.send_chat();
        assert_eq!(app.chat_messages.last().unwrap().role, ChatRole::User);

        app.apply_event(FetchEvent {
            generation: 0,
            outcome: Outcome::Chat(Err("boom".to_string())),
        });
        let last = app.chat_messages.last().unwrap();
        assert_eq!(last.role, ChatRole::Bot);
        assert_eq!(last.text, "Error connecting.");
        assert!(!app.chat_waiting);
    }

    #[tokio::test]
    async fn quiz_exhaustion_triggers_single_fetch() {
        let mut app = app();
        app.topic_input = "pca".to_string();
        app.start_session();
        let generation = app.session.as_ref().unwrap().generation;

        let architecture: Architecture = serde_json::from_str(
            r#"{"quiz": [{"question":"?","options":["x","y"],"answer":1}]}"#,
        )
        .unwrap();
        app.apply_event(FetchEvent {
            generation,
            outcome: Outcome::Architecture(Ok(architecture)),
        });

        app.dashboard_pane = DashboardPane::Quiz;
        app.handle_key(key(KeyCode::Char('2')));
        assert_eq!(app.quiz.phase(), QuizPhase::Answered);
        app.handle_key(key(KeyCode::Char('n')));
        assert_eq!(app.quiz.phase(), QuizPhase::FetchingMore);

        // A second advance attempt while fetching must not double-fetch.
        app.handle_key(key(KeyCode::Char('n')));
        app.fetch_more_questions();
        app.quiz.complete_fetch(Ok(vec![]));
        assert_eq!(app.quiz.phase(), QuizPhase::FetchFailed);
    }
}
