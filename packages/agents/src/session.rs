//! Per-conversation campaign state.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use resonance_agents_models::{
    CampaignContent, CampaignInputs, CulturalInsights, GeneratedImageRef, MerchandiseConcept,
    SessionSnapshot,
};
use resonance_ai::providers::{Message, MessageContent};
use resonance_campaign_models::{CampaignAnalysis, LocationGroup, LocationHistoryEntry};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::AgentError;

/// Number of location groups kept in the history.
pub const MAX_LOCATION_HISTORY: usize = 10;

/// Questions kept in the conversation history, with their tool calls and
/// answers.
pub const MAX_CONVERSATION_TURNS: usize = 10;

/// Sessions unused for this long are dropped when a new one is created.
pub const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

/// Everything a conversation has produced so far.
#[derive(Debug)]
pub struct CampaignSession {
    /// Session ID.
    pub id: Uuid,
    /// Current analysis.
    pub analysis: Option<CampaignAnalysis>,
    /// Most recent location group.
    pub identified_locations: Option<LocationGroup>,
    /// Recent location groups, oldest first.
    pub location_history: VecDeque<LocationHistoryEntry>,
    /// Cultural insights for the identified locations.
    pub insights: Option<CulturalInsights>,
    /// Creative brief.
    pub campaign_inputs: Option<CampaignInputs>,
    /// Generated copy.
    pub campaign_content: Option<CampaignContent>,
    /// Generated campaign image.
    pub campaign_image: Option<GeneratedImageRef>,
    /// Generated merchandise concepts.
    pub merchandise_concepts: Vec<MerchandiseConcept>,
    /// Generated merchandise mock-ups.
    pub merchandise_images: Vec<GeneratedImageRef>,
    /// Conversation history.
    pub messages: Vec<Message>,
}

impl CampaignSession {
    /// Creates an empty session.
    #[must_use]
    pub const fn new(id: Uuid) -> Self {
        Self {
            id,
            analysis: None,
            identified_locations: None,
            location_history: VecDeque::new(),
            insights: None,
            campaign_inputs: None,
            campaign_content: None,
            campaign_image: None,
            merchandise_concepts: Vec::new(),
            merchandise_images: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Returns the current analysis.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::MissingState`] if nothing has been loaded.
    pub fn analysis(&self) -> Result<&CampaignAnalysis, AgentError> {
        self.analysis.as_ref().ok_or_else(|| AgentError::MissingState {
            message: "No campaign analysis loaded. Run create_candidate_analysis or load_campaign_data first."
                .to_string(),
        })
    }

    /// Replaces the analysis. Location groups built from the previous
    /// analysis are cleared; the history is kept.
    pub fn set_analysis(&mut self, analysis: CampaignAnalysis) {
        self.analysis = Some(analysis);
        self.identified_locations = None;
        self.insights = None;
    }

    /// Makes `group` the identified locations and records it in the
    /// history, keeping the last [`MAX_LOCATION_HISTORY`] entries.
    pub fn set_identified_locations(&mut self, group: LocationGroup) {
        self.location_history.push_back(LocationHistoryEntry::from(&group));
        while self.location_history.len() > MAX_LOCATION_HISTORY {
            self.location_history.pop_front();
        }
        self.identified_locations = Some(group);
    }

    /// Drops whole turns from the front of the conversation so at most
    /// [`MAX_CONVERSATION_TURNS`] questions remain. A turn starts at a
    /// plain-text user message; tool results never start one, so a tool
    /// call is never separated from its result.
    pub fn trim_messages(&mut self) {
        let starts: Vec<usize> = self
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role == "user" && matches!(m.content, MessageContent::Text(_)))
            .map(|(i, _)| i)
            .collect();

        if starts.len() > MAX_CONVERSATION_TURNS {
            let cut = starts[starts.len() - MAX_CONVERSATION_TURNS];
            self.messages.drain(..cut);
            log::debug!("Session {}: dropped {cut} old messages", self.id);
        }
    }

    /// Summary of the session's state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.to_string(),
            analysis: self.analysis.as_ref().map(|a| a.metadata.clone()),
            record_count: self.analysis.as_ref().map_or(0, |a| a.records.len()),
            identified_locations: self.identified_locations.clone(),
            location_history: self.location_history.iter().cloned().collect(),
            insight_counts: self
                .insights
                .as_ref()
                .map(|i| {
                    i.categories
                        .iter()
                        .map(|(category, items)| (*category, items.len()))
                        .collect()
                })
                .unwrap_or_default(),
            campaign_inputs: self.campaign_inputs.clone(),
            has_campaign_content: self.campaign_content.is_some(),
            campaign_image: self.campaign_image.clone(),
            merchandise_concepts: self.merchandise_concepts.len(),
            message_count: self.messages.len(),
        }
    }
}

/// A session shared between requests.
pub type SharedSession = Arc<Mutex<CampaignSession>>;

#[derive(Debug)]
struct StoredSession {
    session: SharedSession,
    last_used: Instant,
}

/// In-memory session registry.
///
/// Sessions unused for longer than the idle timeout are evicted whenever a
/// new session is created. A session that is locked by a running agent is
/// never evicted.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<BTreeMap<Uuid, StoredSession>>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_timeout(DEFAULT_SESSION_IDLE_TIMEOUT)
    }
}

impl SessionStore {
    /// Creates an empty store with [`DEFAULT_SESSION_IDLE_TIMEOUT`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with a custom idle timeout.
    #[must_use]
    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            idle_timeout,
        }
    }

    /// Creates a new session.
    pub async fn create(&self) -> (Uuid, SharedSession) {
        self.evict_idle().await;

        let id = Uuid::new_v4();
        let session = Arc::new(Mutex::new(CampaignSession::new(id)));
        self.sessions.write().await.insert(
            id,
            StoredSession {
                session: session.clone(),
                last_used: Instant::now(),
            },
        );
        log::info!("Created session {id}");
        (id, session)
    }

    /// Looks up a session and marks it as used.
    pub async fn get(&self, id: &Uuid) -> Option<SharedSession> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions.get_mut(id)?;
        stored.last_used = Instant::now();
        Some(stored.session.clone())
    }

    /// Returns the session for `id`, or a new one when `id` is `None` or
    /// unknown.
    pub async fn get_or_create(&self, id: Option<Uuid>) -> (Uuid, SharedSession) {
        if let Some(id) = id {
            if let Some(session) = self.get(&id).await {
                return (id, session);
            }
            log::warn!("Unknown session {id}; starting a new one");
        }
        self.create().await
    }

    /// Removes a session. Returns `false` if it did not exist.
    pub async fn remove(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            log::info!("Removed session {id}");
        }
        removed
    }

    /// Drops sessions idle for at least the idle timeout and returns how
    /// many were dropped.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, stored| {
            stored.last_used.elapsed() < self.idle_timeout || stored.session.try_lock().is_err()
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            log::info!("Evicted {evicted} idle session(s)");
        }
        evicted
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the store holds no sessions.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use resonance_ai::providers::ContentBlock;

    use super::*;

    fn group(tag: &str) -> LocationGroup {
        LocationGroup {
            tag: tag.to_string(),
            description: "Filtered locations: strategy: Rally the Base".to_string(),
            coordinates: vec![[40.7, -74.0]],
            total_locations: 1,
            filters_applied: vec!["strategy: Rally the Base".to_string()],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn history_keeps_the_last_ten_groups() {
        let mut session = CampaignSession::new(Uuid::new_v4());
        for i in 0..13 {
            session.set_identified_locations(group(&format!("group {i}")));
        }
        assert_eq!(session.location_history.len(), MAX_LOCATION_HISTORY);
        assert_eq!(session.location_history.front().unwrap().tag, "group 3");
        assert_eq!(session.identified_locations.as_ref().unwrap().tag, "group 12");
    }

    #[test]
    fn missing_analysis_is_reported() {
        let session = CampaignSession::new(Uuid::new_v4());
        assert!(matches!(
            session.analysis(),
            Err(AgentError::MissingState { .. })
        ));
        assert_eq!(session.snapshot().record_count, 0);
    }

    fn turn(session: &mut CampaignSession, question: &str, with_tool: bool) {
        session.messages.push(Message::user(question));
        if with_tool {
            session.messages.push(Message {
                role: "assistant".to_string(),
                content: MessageContent::Blocks(vec![ContentBlock::ToolUse {
                    id: "call-1".to_string(),
                    name: "get_identified_locations".to_string(),
                    input: serde_json::json!({}),
                }]),
            });
            session.messages.push(Message {
                role: "user".to_string(),
                content: MessageContent::Blocks(vec![ContentBlock::ToolResult {
                    tool_use_id: "call-1".to_string(),
                    content: "{}".to_string(),
                }]),
            });
        }
        session.messages.push(Message {
            role: "assistant".to_string(),
            content: MessageContent::Text(format!("answer to {question}")),
        });
    }

    #[test]
    fn conversation_keeps_the_last_turns() {
        let mut session = CampaignSession::new(Uuid::new_v4());
        for i in 0..14 {
            turn(&mut session, &format!("question {i}"), i % 2 == 0);
        }
        session.trim_messages();

        let questions: Vec<&str> = session
            .messages
            .iter()
            .filter_map(|m| match (&*m.role, &m.content) {
                ("user", MessageContent::Text(t)) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(questions.len(), MAX_CONVERSATION_TURNS);
        assert_eq!(questions[0], "question 4");
        assert!(matches!(&session.messages[0].content, MessageContent::Text(t) if t == "question 4"));
        // 10 turns, half of them with a tool call and result
        assert_eq!(session.messages.len(), 10 * 2 + 5 * 2);
    }

    #[test]
    fn short_conversations_are_untouched() {
        let mut session = CampaignSession::new(Uuid::new_v4());
        turn(&mut session, "only question", true);
        session.trim_messages();
        assert_eq!(session.messages.len(), 4);
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted_on_create() {
        let store = SessionStore::with_idle_timeout(Duration::ZERO);
        let (first, _) = store.create().await;
        let (second, _) = store.create().await;
        assert_eq!(store.len().await, 1);
        assert!(store.get(&first).await.is_none());
        assert!(store.get(&second).await.is_some());
    }

    #[tokio::test]
    async fn busy_sessions_are_not_evicted() {
        let store = SessionStore::with_idle_timeout(Duration::ZERO);
        let (busy, session) = store.create().await;
        let _guard = session.lock().await;

        assert_eq!(store.evict_idle().await, 0);
        assert!(store.get(&busy).await.is_some());
    }

    #[tokio::test]
    async fn sessions_can_be_removed() {
        let store = SessionStore::new();
        let (id, _) = store.create().await;
        assert!(store.remove(&id).await);
        assert!(!store.remove(&id).await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn unknown_session_ids_start_new_sessions() {
        let store = SessionStore::new();
        let (first, _) = store.get_or_create(None).await;
        let (same, _) = store.get_or_create(Some(first)).await;
        assert_eq!(first, same);

        let (fresh, _) = store.get_or_create(Some(Uuid::new_v4())).await;
        assert_ne!(fresh, first);
        assert_eq!(store.len().await, 2);
    }
}
