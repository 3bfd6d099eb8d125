//! In-memory backend and notifier used by the controller tests.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};
use tokio::sync::Notify;

use crate::{
    audio::{
        backend::{AudioBackend, BackendError, SessionId},
        queue::{GuildQueueStore, TrackDescriptor},
    },
    bot::handlers::{CommandContext, DiagInfo, QueueController},
    ui::{
        embeds::Reply,
        notifier::{Notifier, ReplyTarget},
    },
};

pub const GUILD: GuildId = GuildId::new(1);
pub const TEXT: ChannelId = ChannelId::new(20);
pub const VOICE: ChannelId = ChannelId::new(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Resolve(String),
    Open(ChannelId),
    Move(ChannelId),
    Close,
    Start(String),
    Stop,
    Pause(bool),
}

pub fn track(title: &str) -> TrackDescriptor {
    TrackDescriptor::new(title, format!("enc-{title}"))
}

#[derive(Default)]
pub struct FakeBackend {
    pub ready: AtomicBool,
    pub fail_resolve: AtomicBool,
    pub fail_join: AtomicBool,
    pub fail_move: AtomicBool,
    catalog: Mutex<HashMap<String, Vec<TrackDescriptor>>>,
    failing_payloads: Mutex<HashSet<String>>,
    calls: Mutex<Vec<BackendCall>>,
    next_session: AtomicU64,
    resolve_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeBackend {
    pub fn ready() -> Self {
        let backend = Self::default();
        backend.ready.store(true, Ordering::SeqCst);
        backend
    }

    /// `query` resuelve a un único track titulado `title`
    pub fn with_track(self, query: &str, title: &str) -> Self {
        self.catalog.lock().insert(query.to_string(), vec![track(title)]);
        self
    }

    pub fn with_results(self, query: &str, tracks: Vec<TrackDescriptor>) -> Self {
        self.catalog.lock().insert(query.to_string(), tracks);
        self
    }

    pub fn fail_playback_of(&self, title: &str) {
        self.failing_payloads.lock().insert(format!("enc-{title}"));
    }

    /// Bloquea cada `resolve` hasta notificar el handle devuelto
    pub fn gate_resolve(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.resolve_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl AudioBackend for FakeBackend {
    type Session = u64;

    fn session_id(session: &u64) -> SessionId {
        *session
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn endpoint(&self) -> String {
        "localhost:2333".to_string()
    }

    async fn resolve(&self, _guild_id: GuildId, query: &str) -> Result<Vec<TrackDescriptor>, BackendError> {
        self.record(BackendCall::Resolve(query.to_string()));

        let gate = self.resolve_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail_resolve.load(Ordering::SeqCst) {
            return Err(BackendError::Resolve {
                query: query.to_string(),
                reason: "node unreachable".to_string(),
            });
        }
        Ok(self.catalog.lock().get(query).cloned().unwrap_or_default())
    }

    async fn open_session(&self, _guild_id: GuildId, channel_id: ChannelId) -> Result<u64, BackendError> {
        self.record(BackendCall::Open(channel_id));
        if self.fail_join.load(Ordering::SeqCst) {
            return Err(BackendError::Join("missing access".to_string()));
        }
        Ok(self.next_session.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn move_session(&self, _guild_id: GuildId, _session: &u64, channel_id: ChannelId) -> Result<(), BackendError> {
        self.record(BackendCall::Move(channel_id));
        if self.fail_move.load(Ordering::SeqCst) {
            return Err(BackendError::Move("missing access".to_string()));
        }
        Ok(())
    }

    async fn close_session(&self, _guild_id: GuildId, _session: &u64) {
        self.record(BackendCall::Close);
    }

    async fn start_playback(&self, _session: &u64, payload: &str) -> Result<(), BackendError> {
        self.record(BackendCall::Start(payload.to_string()));
        if self.failing_payloads.lock().contains(payload) {
            return Err(BackendError::Player("track unavailable".to_string()));
        }
        Ok(())
    }

    async fn stop_playback(&self, _session: &u64) {
        self.record(BackendCall::Stop);
    }

    async fn set_paused(&self, _session: &u64, paused: bool) -> Result<(), BackendError> {
        self.record(BackendCall::Pause(paused));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub fail: AtomicBool,
    sent: Mutex<Vec<(ReplyTarget, Reply)>>,
}

impl RecordingNotifier {
    pub fn bodies(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, reply)| reply.body().to_string()).collect()
    }

    pub fn sent(&self) -> Vec<(ReplyTarget, Reply)> {
        self.sent.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, target: ReplyTarget, reply: Reply) -> Result<()> {
        self.sent.lock().push((target, reply));
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("discord unavailable");
        }
        Ok(())
    }
}

pub type TestController = QueueController<FakeBackend, RecordingNotifier>;

pub fn controller(backend: FakeBackend) -> (TestController, Arc<FakeBackend>, Arc<RecordingNotifier>) {
    let backend = Arc::new(backend);
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = QueueController::new(
        backend.clone(),
        notifier.clone(),
        Arc::new(GuildQueueStore::new()),
        DiagInfo {
            prefix: "m!".to_string(),
            scopes: vec!["Guilds".to_string(), "GuildVoiceStates".to_string()],
        },
    );
    (controller, backend, notifier)
}

/// Miembro en [`VOICE`] escribiendo en [`TEXT`].
pub fn in_voice() -> CommandContext {
    CommandContext {
        voice_channel_id: Some(VOICE),
        ..CommandContext::new(GUILD, TEXT)
    }
}

/// `(título actual, títulos pendientes)` de [`GUILD`], o `None` sin registro.
pub fn snapshot<N: Notifier>(controller: &QueueController<FakeBackend, N>) -> Option<(Option<String>, Vec<String>)> {
    controller.store().with(GUILD, |record| {
        (
            record.current().map(|t| t.title.clone()),
            record.pending().map(|t| t.title.clone()).collect(),
        )
    })
}

/// Sesión abierta en [`GUILD`], la que llevan los eventos vigentes.
pub fn session<N: Notifier>(controller: &QueueController<FakeBackend, N>) -> Option<SessionId> {
    controller.store().with(GUILD, |record| record.session)
}
