// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The session orchestrator: owns each session's state machine and drives it
//! to a terminal state.
//!
//! Mutation model: every mutating operation takes the session's async lock,
//! re-reads the record from the store, applies the change, and commits with
//! the optimistic version check (retried up to three times before a
//! `Conflict` surfaces). Events are published after each commit while the
//! lock is still held, so subscribers observe commit order.
//!
//! Background work — analyzer fan-out, per-question deadline watchers, the
//! evaluation timeout — re-enters the same serialized path to apply its
//! results, and is cancelled through a per-session token on abort.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use intervo_analyzers::{AnswerAnalyzer, ProgressFn};
use intervo_bus::{EventBus, Subscription};
use intervo_core::event::SessionEvent;
use intervo_core::types::{
    Answer, Evaluation, Question, Session, SessionConfig, SessionId, SessionState,
    SessionTiming,
};
use intervo_core::IntervoError;
use intervo_questions::QuestionGenerator;
use intervo_store::SessionStore;

use crate::scoring;

/// Commit attempts before a version conflict surfaces to the caller.
const COMMIT_ATTEMPTS: u32 = 3;

/// Orchestrator tuning knobs, derived from the scoring config section.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub pass_threshold: u8,
    /// Seconds past a question's limit an answer is still accepted.
    pub answer_grace_seconds: u32,
    /// How long after the last answer unsettled analyses are failed.
    pub evaluation_timeout: Duration,
    /// Window in which a repeated `start` is idempotent.
    pub start_grace: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            pass_threshold: 70,
            answer_grace_seconds: 5,
            evaluation_timeout: Duration::from_secs(120),
            start_grace: Duration::from_secs(2),
        }
    }
}

/// An answer as submitted by the caller.
#[derive(Debug, Clone)]
pub struct AnswerSubmission {
    pub question_id: u32,
    pub text: Option<String>,
    pub media_ref: Option<String>,
    pub time_spent_seconds: u32,
}

/// What the caller sees after a successful submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// More questions remain; the next one is live with this deadline.
    Next {
        question: Question,
        deadline: DateTime<Utc>,
    },
    /// That was the last question; the session is evaluating.
    Final,
}

/// Serializes and drives all mutations of interview sessions.
pub struct InterviewOrchestrator {
    store: Arc<dyn SessionStore>,
    analyzer: Arc<dyn AnswerAnalyzer>,
    generator: QuestionGenerator,
    bus: Arc<EventBus>,
    config: OrchestratorConfig,
    locks: DashMap<String, Arc<Mutex<()>>>,
    cancels: DashMap<String, CancellationToken>,
    weak: Weak<Self>,
}

impl InterviewOrchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        analyzer: Arc<dyn AnswerAnalyzer>,
        generator: QuestionGenerator,
        bus: Arc<EventBus>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            store,
            analyzer,
            generator,
            bus,
            config,
            locks: DashMap::new(),
            cancels: DashMap::new(),
            weak: weak.clone(),
        })
    }

    // --- Public operations ---

    /// Create a session: validate the config, generate questions, persist in
    /// Ready. Generator failure falls back to the bank and flags the session
    /// as degraded instead of failing the call.
    pub async fn create(
        &self,
        owner: &str,
        title: Option<String>,
        config: SessionConfig,
    ) -> Result<Session, IntervoError> {
        if !(5..=120).contains(&config.duration_minutes) {
            return Err(IntervoError::InvalidArgument(format!(
                "duration_minutes must be within 5..=120, got {}",
                config.duration_minutes
            )));
        }

        let draft = Session {
            id: SessionId::generate(),
            owner: owner.to_string(),
            title,
            config,
            questions: vec![],
            state: SessionState::Draft,
            cursor: 0,
            answers: vec![],
            timing: SessionTiming {
                created_at: Utc::now(),
                started_at: None,
                completed_at: None,
                question_deadline: None,
            },
            result: None,
            degraded_generation: false,
            version: 1,
        };
        self.store.put_if_version(&draft, 0).await?;
        let id = draft.id.clone();

        // Question generation happens outside the session lock; it can take
        // seconds against a live LLM.
        let generated = self.generator.generate(&config).await?;

        let lock = self.lock_for(&id);
        let _guard = lock.lock().await;
        let (_, session) = self
            .mutate(&id, |s| {
                if s.state != SessionState::Draft {
                    return Err(IntervoError::FailedPrecondition(format!(
                        "session {} left Draft during generation",
                        s.id
                    )));
                }
                s.questions = generated.questions.clone();
                s.degraded_generation = generated.degraded;
                s.state = SessionState::Ready;
                Ok((
                    (),
                    vec![SessionEvent::StateChanged {
                        from: SessionState::Draft,
                        to: SessionState::Ready,
                    }],
                ))
            })
            .await?;

        info!(
            session_id = %session.id,
            owner,
            questions = session.questions.len(),
            degraded = session.degraded_generation,
            "session created"
        );
        Ok(session)
    }

    /// Start a Ready session: cursor to the first question, arm its deadline.
    ///
    /// A repeated start within the grace window returns the running session
    /// without error or mutation.
    pub async fn start(&self, id: &SessionId) -> Result<Session, IntervoError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let session = self.load(id).await?;
        if session.state == SessionState::Running
            && let Some(started_at) = session.timing.started_at
            && (Utc::now() - started_at).to_std().unwrap_or_default() <= self.config.start_grace
        {
            debug!(session_id = %id, "repeated start within grace window");
            return Ok(session);
        }

        let (deadline, session) = self
            .mutate(id, |s| {
                if s.state != SessionState::Ready {
                    return Err(IntervoError::FailedPrecondition(format!(
                        "start requires Ready, session {} is {}",
                        s.id, s.state
                    )));
                }
                let first = s.questions.first().cloned().ok_or_else(|| {
                    IntervoError::Internal(format!("session {} has no questions", s.id))
                })?;

                let now = Utc::now();
                let deadline = now + chrono::Duration::seconds(i64::from(first.time_limit_seconds));
                s.state = SessionState::Running;
                s.cursor = 0;
                s.timing.started_at = Some(now);
                s.timing.question_deadline = Some(deadline);

                Ok((
                    deadline,
                    vec![
                        SessionEvent::StateChanged {
                            from: SessionState::Ready,
                            to: SessionState::Running,
                        },
                        SessionEvent::QuestionStarted {
                            question_id: first.id,
                            index: 0,
                            deadline,
                        },
                    ],
                ))
            })
            .await?;

        self.arm_deadline(id, 0, deadline);
        info!(session_id = %id, "session started");
        Ok(session)
    }

    /// Accept a candidate's answer for the current question.
    pub async fn submit_answer(
        &self,
        id: &SessionId,
        submission: AnswerSubmission,
    ) -> Result<SubmitOutcome, IntervoError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let session = self.load(id).await?;
        if session.state != SessionState::Running {
            return Err(IntervoError::FailedPrecondition(format!(
                "submit requires Running, session {} is {}",
                session.id, session.state
            )));
        }
        let question = session
            .current_question()
            .ok_or_else(|| IntervoError::Internal("running session has no current question".into()))?;

        if submission.question_id != question.id {
            // A question that was already answered is a state problem, not a
            // shape problem: the concurrent-submit loser lands here.
            if session
                .answers
                .iter()
                .any(|a| a.question_id == submission.question_id)
            {
                return Err(IntervoError::FailedPrecondition(format!(
                    "question {} was already answered",
                    submission.question_id
                )));
            }
            return Err(IntervoError::InvalidArgument(format!(
                "expected answer for question {}, got {}",
                question.id, submission.question_id
            )));
        }

        let max_spent = question.time_limit_seconds + self.config.answer_grace_seconds;
        if submission.time_spent_seconds > max_spent {
            return Err(IntervoError::InvalidArgument(format!(
                "time_spent_seconds {} exceeds limit {} (+{}s grace)",
                submission.time_spent_seconds,
                question.time_limit_seconds,
                self.config.answer_grace_seconds
            )));
        }

        if submission.text.as_deref().is_some_and(|t| !t.is_empty()) && !question.allow_text {
            return Err(IntervoError::InvalidArgument(
                "question does not accept text answers".into(),
            ));
        }
        if submission.media_ref.is_some() && !(question.allow_video || question.allow_audio) {
            return Err(IntervoError::InvalidArgument(
                "question does not accept media answers".into(),
            ));
        }

        let answer = Answer {
            question_id: submission.question_id,
            text: submission.text,
            media_ref: submission.media_ref,
            time_spent_seconds: submission.time_spent_seconds,
            submitted_at: Utc::now(),
            analysis: None,
        };
        self.apply_answer_locked(id, answer).await
    }

    /// Timer-source entry point: when the current question's deadline has
    /// elapsed, synthesize an empty answer. Never errors toward the caller's
    /// flow; an already-advanced session makes this a no-op.
    pub async fn tick(&self, id: &SessionId) -> Result<(), IntervoError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        self.tick_locked(id, None).await
    }

    /// Abort a non-terminal session; pending analyzer work is discarded.
    pub async fn abort(&self, id: &SessionId, reason: &str) -> Result<(), IntervoError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let (_, _session) = self
            .mutate(id, |s| {
                if s.state.is_terminal() {
                    return Err(IntervoError::FailedPrecondition(format!(
                        "session {} is already {}",
                        s.id, s.state
                    )));
                }
                let from = s.state;
                s.state = SessionState::Aborted;
                s.timing.question_deadline = None;
                s.timing.completed_at = Some(Utc::now());
                Ok((
                    (),
                    vec![SessionEvent::StateChanged {
                        from,
                        to: SessionState::Aborted,
                    }],
                ))
            })
            .await?;

        info!(session_id = %id, reason, "session aborted");
        self.teardown(id);
        Ok(())
    }

    /// Read-only session snapshot.
    pub async fn get(&self, id: &SessionId) -> Result<Session, IntervoError> {
        self.load(id).await
    }

    /// The final evaluation; only available once Completed.
    pub async fn result(&self, id: &SessionId) -> Result<Evaluation, IntervoError> {
        let session = self.load(id).await?;
        match session.result {
            Some(evaluation) if session.state == SessionState::Completed => Ok(evaluation),
            _ => Err(IntervoError::FailedPrecondition(format!(
                "session {} is {}, result requires Completed",
                session.id, session.state
            ))),
        }
    }

    /// Sessions owned by `owner`, newest first.
    pub async fn list(&self, owner: &str) -> Result<Vec<Session>, IntervoError> {
        self.store.list(owner).await
    }

    /// Preview question generation without creating a session.
    pub async fn preview_questions(
        &self,
        config: SessionConfig,
    ) -> Result<intervo_questions::GeneratedQuestions, IntervoError> {
        self.generator.generate(&config).await
    }

    /// Attach a realtime subscriber: the current snapshot is enqueued
    /// atomically under the session lock, so subsequent events are a
    /// contiguous suffix of the emission log.
    pub async fn subscribe(&self, id: &SessionId) -> Result<Subscription, IntervoError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        let session = self.load(id).await?;
        Ok(self
            .bus
            .subscribe(id.as_str(), SessionEvent::Snapshot { session }))
    }

    // --- Internals ---

    fn lock_for(&self, id: &SessionId) -> Arc<Mutex<()>> {
        self.locks
            .entry(id.0.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn cancel_for(&self, id: &SessionId) -> CancellationToken {
        self.cancels
            .entry(id.0.clone())
            .or_insert_with(CancellationToken::new)
            .clone()
    }

    /// Drop per-session runtime state once the session is terminal.
    fn teardown(&self, id: &SessionId) {
        if let Some((_, token)) = self.cancels.remove(id.as_str()) {
            token.cancel();
        }
        self.locks.remove(id.as_str());
    }

    async fn load(&self, id: &SessionId) -> Result<Session, IntervoError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| IntervoError::NotFound(format!("no session {id}")))
    }

    /// Load-mutate-commit with version-conflict retries, publishing the
    /// mutation's events after a successful commit. Callers hold the
    /// session lock.
    async fn mutate<R>(
        &self,
        id: &SessionId,
        apply: impl Fn(&mut Session) -> Result<(R, Vec<SessionEvent>), IntervoError>,
    ) -> Result<(R, Session), IntervoError> {
        let mut attempt = 0;
        loop {
            let mut session = self.load(id).await?;
            let (result, events) = apply(&mut session)?;
            let expected = session.version;
            session.version += 1;

            match self.store.put_if_version(&session, expected).await {
                Ok(()) => {
                    for event in events {
                        self.bus.publish(id.as_str(), event);
                    }
                    return Ok((result, session));
                }
                Err(IntervoError::Conflict(msg)) => {
                    attempt += 1;
                    if attempt >= COMMIT_ATTEMPTS {
                        return Err(IntervoError::Conflict(msg));
                    }
                    debug!(session_id = %id, attempt, "version conflict, retrying commit");
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Record an accepted answer and advance the machine. Lock held.
    async fn apply_answer_locked(
        &self,
        id: &SessionId,
        answer: Answer,
    ) -> Result<SubmitOutcome, IntervoError> {
        enum Plan {
            Next {
                question: Question,
                deadline: DateTime<Utc>,
                cursor: usize,
            },
            Final,
        }

        let answer_ref = &answer;
        let (plan, session) = self
            .mutate(id, |s| {
                if s.state != SessionState::Running {
                    return Err(IntervoError::FailedPrecondition(format!(
                        "session {} is no longer Running",
                        s.id
                    )));
                }
                let current = s.current_question().ok_or_else(|| {
                    IntervoError::Internal("running session has no current question".into())
                })?;
                if current.id != answer_ref.question_id {
                    return Err(IntervoError::FailedPrecondition(format!(
                        "cursor moved past question {}",
                        answer_ref.question_id
                    )));
                }

                s.answers.push(answer_ref.clone());
                let mut events = vec![SessionEvent::AnswerAccepted {
                    question_id: answer_ref.question_id,
                }];

                if s.cursor + 1 < s.questions.len() {
                    s.cursor += 1;
                    let next = s.questions[s.cursor].clone();
                    let deadline = Utc::now()
                        + chrono::Duration::seconds(i64::from(next.time_limit_seconds));
                    s.timing.question_deadline = Some(deadline);
                    events.push(SessionEvent::QuestionStarted {
                        question_id: next.id,
                        index: s.cursor,
                        deadline,
                    });
                    Ok((
                        Plan::Next {
                            question: next,
                            deadline,
                            cursor: s.cursor,
                        },
                        events,
                    ))
                } else {
                    s.state = SessionState::Evaluating;
                    s.timing.question_deadline = None;
                    events.push(SessionEvent::StateChanged {
                        from: SessionState::Running,
                        to: SessionState::Evaluating,
                    });
                    Ok((Plan::Final, events))
                }
            })
            .await?;

        // Fan out analysis of the just-answered question in the background.
        let answered = session
            .questions
            .iter()
            .find(|q| q.id == answer.question_id)
            .cloned()
            .ok_or_else(|| IntervoError::Internal("answered question vanished".into()))?;
        self.spawn_fanout(id, answered, answer);

        match plan {
            Plan::Next {
                question,
                deadline,
                cursor,
            } => {
                self.arm_deadline(id, cursor, deadline);
                Ok(SubmitOutcome::Next { question, deadline })
            }
            Plan::Final => {
                self.arm_evaluation_timeout(id);
                Ok(SubmitOutcome::Final)
            }
        }
    }

    /// Deadline-tick body. Lock held. `armed_cursor` is set when the call
    /// comes from a deadline watcher, which has already slept the full
    /// question window; the public path re-checks the wall clock instead.
    async fn tick_locked(
        &self,
        id: &SessionId,
        armed_cursor: Option<usize>,
    ) -> Result<(), IntervoError> {
        let session = match self.store.get(id).await? {
            Some(session) => session,
            None => return Ok(()),
        };
        if session.state != SessionState::Running {
            return Ok(());
        }

        match armed_cursor {
            Some(cursor) => {
                // An accepted submission advances the cursor, which disarms
                // this watcher: the caller's answer won the race.
                if session.cursor != cursor {
                    return Ok(());
                }
            }
            None => {
                let Some(deadline) = session.timing.question_deadline else {
                    return Ok(());
                };
                if Utc::now() < deadline {
                    return Ok(());
                }
            }
        }

        let question = session
            .current_question()
            .ok_or_else(|| IntervoError::Internal("running session has no current question".into()))?;
        debug!(
            session_id = %id,
            question_id = question.id,
            "deadline elapsed, synthesizing empty answer"
        );

        let empty = Answer {
            question_id: question.id,
            text: Some(String::new()),
            media_ref: None,
            time_spent_seconds: question.time_limit_seconds,
            submitted_at: Utc::now(),
            analysis: None,
        };
        self.apply_answer_locked(id, empty).await.map(|_| ())
    }

    /// Watch one question's deadline; fires a tick unless disarmed first.
    fn arm_deadline(&self, id: &SessionId, cursor: usize, deadline: DateTime<Utc>) {
        let Some(this) = self.weak.upgrade() else {
            return;
        };
        let token = self.cancel_for(id);
        let id = id.clone();
        let sleep_for = (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO);

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(sleep_for) => {
                    let lock = this.lock_for(&id);
                    let _guard = lock.lock().await;
                    if let Err(e) = this.tick_locked(&id, Some(cursor)).await {
                        warn!(session_id = %id, error = %e, "deadline tick failed");
                    }
                }
            }
        });
    }

    /// After the last answer, cap how long analyzers may keep the session in
    /// Evaluating.
    fn arm_evaluation_timeout(&self, id: &SessionId) {
        let Some(this) = self.weak.upgrade() else {
            return;
        };
        let token = self.cancel_for(id);
        let id = id.clone();
        let timeout = self.config.evaluation_timeout;

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    if let Err(e) = this.force_finalize(&id).await {
                        warn!(session_id = %id, error = %e, "evaluation timeout failed");
                    }
                }
            }
        });
    }

    /// Dispatch one answer to the analyzer pool; the completion re-enters
    /// the serialized mutation path. Cancelled work is simply discarded.
    fn spawn_fanout(&self, id: &SessionId, question: Question, answer: Answer) {
        let Some(this) = self.weak.upgrade() else {
            return;
        };
        let token = self.cancel_for(id);
        let bus = self.bus.clone();
        let id = id.clone();

        tokio::spawn(async move {
            let question_id = question.id;
            let progress: ProgressFn = {
                let bus = bus.clone();
                let session_id = id.0.clone();
                Arc::new(move |modality, report| {
                    bus.publish(
                        &session_id,
                        SessionEvent::AnalysisProgress {
                            question_id,
                            modality,
                            status: report.status,
                            score: report.score,
                        },
                    );
                })
            };

            tokio::select! {
                _ = token.cancelled() => {
                    debug!(session_id = %id, question_id, "analysis cancelled, result discarded");
                }
                outcomes = this.analyzer.analyze_answer(&question, &answer, progress) => {
                    if let Err(e) = this.apply_analysis(&id, question_id, outcomes).await {
                        warn!(session_id = %id, question_id, error = %e, "failed to apply analysis");
                    }
                }
            }
        });
    }

    /// Apply a settled per-answer analysis; finalizes the session when it was
    /// the last one outstanding.
    async fn apply_analysis(
        &self,
        id: &SessionId,
        question_id: u32,
        outcomes: intervo_analyzers::ModalityOutcomes,
    ) -> Result<(), IntervoError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let session = match self.store.get(id).await? {
            Some(session) => session,
            None => return Ok(()),
        };
        if session.state.is_terminal() {
            debug!(session_id = %id, question_id, "session terminal, analysis discarded");
            return Ok(());
        }
        if session
            .answers
            .iter()
            .any(|a| a.question_id == question_id && a.analysis.is_some())
        {
            return Ok(());
        }

        let pass_threshold = self.config.pass_threshold;
        let analysis = scoring::analyze(outcomes);
        let analysis_ref = &analysis;
        let (finalized, _) = self
            .mutate(id, |s| {
                let answer = s
                    .answers
                    .iter_mut()
                    .find(|a| a.question_id == question_id)
                    .ok_or_else(|| {
                        IntervoError::NotFound(format!("no answer for question {question_id}"))
                    })?;
                answer.analysis = Some(analysis_ref.clone());

                let mut events = vec![SessionEvent::AnalysisCompleted {
                    question_id,
                    composite: analysis_ref.composite,
                }];

                let all_settled =
                    s.all_answered() && s.answers.iter().all(|a| a.analysis.is_some());
                if s.state == SessionState::Evaluating && all_settled {
                    let evaluation = scoring::evaluate(s, pass_threshold);
                    s.state = SessionState::Completed;
                    s.timing.completed_at = Some(Utc::now());
                    s.result = Some(evaluation.clone());
                    events.push(SessionEvent::StateChanged {
                        from: SessionState::Evaluating,
                        to: SessionState::Completed,
                    });
                    events.push(SessionEvent::SessionCompleted { evaluation });
                    Ok((true, events))
                } else {
                    Ok((false, events))
                }
            })
            .await?;

        if finalized {
            info!(session_id = %id, "session completed");
            self.teardown(id);
        }
        Ok(())
    }

    /// Evaluation timeout: remaining unsettled analyses are marked failed and
    /// the session completes with what it has.
    async fn force_finalize(&self, id: &SessionId) -> Result<(), IntervoError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let session = match self.store.get(id).await? {
            Some(session) => session,
            None => return Ok(()),
        };
        if session.state != SessionState::Evaluating {
            return Ok(());
        }

        let pass_threshold = self.config.pass_threshold;
        let (_, _) = self
            .mutate(id, |s| {
                let mut events = Vec::new();
                for answer in s.answers.iter_mut().filter(|a| a.analysis.is_none()) {
                    let analysis = scoring::analyze(intervo_analyzers::ModalityOutcomes {
                        facial: intervo_core::types::ModalityReport::failed("evaluation timeout"),
                        audio: intervo_core::types::ModalityReport::failed("evaluation timeout"),
                        text: intervo_core::types::ModalityReport::failed("evaluation timeout"),
                    });
                    events.push(SessionEvent::AnalysisCompleted {
                        question_id: answer.question_id,
                        composite: analysis.composite,
                    });
                    answer.analysis = Some(analysis);
                }

                let evaluation = scoring::evaluate(s, pass_threshold);
                s.state = SessionState::Completed;
                s.timing.completed_at = Some(Utc::now());
                s.result = Some(evaluation.clone());
                events.push(SessionEvent::StateChanged {
                    from: SessionState::Evaluating,
                    to: SessionState::Completed,
                });
                events.push(SessionEvent::SessionCompleted { evaluation });
                Ok(((), events))
            })
            .await?;

        warn!(session_id = %id, "evaluation timed out, remaining analyses failed");
        self.teardown(id);
        Ok(())
    }
}
