//! Audited adjustment and recalculation of monthly summaries.
//!
//! Every operation here mutates stored state, so each one:
//! - validates human input (reason, `HH:MM` times, unit values) before reading
//!   or writing anything,
//! - runs under the [`SummaryLocks`] lock of the affected `(user, month)`,
//! - hands the mutation and its [`AuditLogEntry`] to the store in a single
//!   commit, so a rejected attempt leaves no trace.
//!
//! Session edits do not cascade: [`Workflow::edit_session`] and
//! [`Workflow::close_session`] return the affected [`SummaryKey`] and the
//! caller decides when to [`Workflow::recalculate`] it. This lets admins
//! batch several edits before one recomputation.

use std::error::Error as StdError;
use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate};
use thiserror::Error;

use crate::aggregate::{Aggregation, LeaveMonthlySummary, MonthInputs, aggregate_detailed, aggregate_many};
use crate::audit::{AuditAction, AuditLogEntry, EntityType};
use crate::classify::{DayClassification, classify};
use crate::lock::SummaryLocks;
use crate::model::{AttendanceSession, Employee, LeaveGrant, WorkCalendarDay};
use crate::time_of_day::{at_clock_time, parse_clock_time};
use crate::types::{
    AdminId, SessionId, SessionStatus, SummaryKey, UserId, ValidationError, YearMonth,
    require_reason, require_units,
};

/// Errors surfaced by workflow operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Human input was rejected before any state change.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A referenced session, user or summary does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Before/after snapshots could not be serialized.
    #[error("failed to snapshot audit state: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// The storage collaborator failed.
    #[error("storage error: {0}")]
    Store(#[source] Box<dyn StdError + Send + Sync>),
}

fn store_err<E: StdError + Send + Sync + 'static>(err: E) -> EngineError {
    EngineError::Store(Box::new(err))
}

/// Source and sink of everything the workflow reads and writes.
///
/// The `commit_*` methods must persist the record and the audit entry
/// atomically: both or neither.
pub trait AttendanceStore {
    type Error: StdError + Send + Sync + 'static;

    fn employee(&self, user_id: &UserId) -> Result<Option<Employee>, Self::Error>;

    fn session(&self, id: &SessionId) -> Result<Option<AttendanceSession>, Self::Error>;

    fn sessions_in(
        &self,
        user_id: &UserId,
        period: YearMonth,
    ) -> Result<Vec<AttendanceSession>, Self::Error>;

    fn calendar_day(&self, date: NaiveDate) -> Result<Option<WorkCalendarDay>, Self::Error>;

    fn calendar_in(&self, period: YearMonth) -> Result<Vec<WorkCalendarDay>, Self::Error>;

    fn grants_in(&self, user_id: &UserId, period: YearMonth)
    -> Result<Vec<LeaveGrant>, Self::Error>;

    fn summary(&self, key: &SummaryKey) -> Result<Option<LeaveMonthlySummary>, Self::Error>;

    fn commit_summary(
        &mut self,
        summary: &LeaveMonthlySummary,
        audit: &AuditLogEntry,
    ) -> Result<(), Self::Error>;

    fn commit_session(
        &mut self,
        session: &AttendanceSession,
        audit: &AuditLogEntry,
    ) -> Result<(), Self::Error>;

    /// Stores a new grant and returns it with its assigned id.
    fn commit_grant(
        &mut self,
        grant: &LeaveGrant,
        audit: &AuditLogEntry,
    ) -> Result<LeaveGrant, Self::Error>;
}

/// Result of a session edit or close.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionChange {
    pub session: AttendanceSession,
    /// The day re-classified with the new times.
    pub classification: DayClassification,
    /// Summary that is now stale until recalculated.
    pub affected: SummaryKey,
}

/// Admin-facing operations over one store.
///
/// Each worker owns its `Workflow` (and its store connection); workers share
/// one [`SummaryLocks`] registry.
pub struct Workflow<S> {
    store: S,
    locks: Arc<SummaryLocks>,
    offset: FixedOffset,
    today: Option<NaiveDate>,
}

impl<S: AttendanceStore> Workflow<S> {
    /// `offset` is the wall clock used to turn `HH:MM` edits into timestamps.
    pub fn new(store: S, locks: Arc<SummaryLocks>, offset: FixedOffset) -> Self {
        Self {
            store,
            locks,
            offset,
            today: None,
        }
    }

    /// Counts the month containing `today` only up to `today`.
    #[must_use]
    pub const fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Direct store access for source-data loads, which bypass locks and audit.
    pub const fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Loads the snapshot the aggregator reads for one user and month.
    pub fn month_inputs(&self, user_id: &UserId, period: YearMonth) -> Result<MonthInputs, EngineError> {
        let employee = self
            .store
            .employee(user_id)
            .map_err(store_err)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "user",
                id: user_id.to_string(),
            })?;
        Ok(MonthInputs {
            employee,
            period,
            sessions: self.store.sessions_in(user_id, period).map_err(store_err)?,
            calendar: self.store.calendar_in(period).map_err(store_err)?,
            grants: self.store.grants_in(user_id, period).map_err(store_err)?,
            as_of: self.today.filter(|today| period.contains(*today)),
        })
    }

    /// Read-only per-day view of a month, without storing anything.
    pub fn month_report(&self, user_id: &UserId, period: YearMonth) -> Result<Aggregation, EngineError> {
        Ok(aggregate_detailed(&self.month_inputs(user_id, period)?))
    }

    /// Recomputes a summary from source data, discarding manual overrides.
    pub fn recalculate(
        &mut self,
        admin: &AdminId,
        user_id: &UserId,
        period: YearMonth,
    ) -> Result<LeaveMonthlySummary, EngineError> {
        let key = SummaryKey::new(user_id.clone(), period);
        let mut summaries = self.recalculate_many(admin, std::slice::from_ref(&key))?;
        summaries.pop().ok_or_else(|| EngineError::NotFound {
            entity: "summary",
            id: key.to_string(),
        })
    }

    /// Recomputes several summaries, aggregating them in parallel.
    ///
    /// All keys stay locked from snapshot to commit. Fails before writing
    /// anything if any user is unknown.
    pub fn recalculate_many(
        &mut self,
        admin: &AdminId,
        keys: &[SummaryKey],
    ) -> Result<Vec<LeaveMonthlySummary>, EngineError> {
        let locks = Arc::clone(&self.locks);
        locks.with_locks(keys, || -> Result<_, EngineError> {
            let inputs = keys
                .iter()
                .map(|key| self.month_inputs(&key.user_id, key.period))
                .collect::<Result<Vec<_>, _>>()?;
            let summaries = aggregate_many(&inputs);

            for summary in &summaries {
                let key = summary.key();
                let before = self.store.summary(&key).map_err(store_err)?;
                let audit = AuditLogEntry::record(
                    admin,
                    AuditAction::Recalculate,
                    EntityType::LeaveMonthlySummary,
                    key.to_string(),
                    before.as_ref(),
                    Some(summary),
                    None,
                )?;
                self.store.commit_summary(summary, &audit).map_err(store_err)?;
                tracing::info!(%key, %admin, "recalculated summary");
            }
            Ok(summaries)
        })
    }

    /// Overrides the paid-leave figure of a stored summary.
    pub fn adjust_paid_leave(
        &mut self,
        admin: &AdminId,
        user_id: &UserId,
        period: YearMonth,
        new_paid_leave: f64,
        reason: &str,
    ) -> Result<LeaveMonthlySummary, EngineError> {
        let reason = require_reason(reason)?;
        let new_paid_leave = require_units("paid leave", new_paid_leave)?;
        let key = SummaryKey::new(user_id.clone(), period);

        let locks = Arc::clone(&self.locks);
        locks.with_lock(&key, || -> Result<_, EngineError> {
            let before = self
                .store
                .summary(&key)
                .map_err(store_err)?
                .ok_or_else(|| EngineError::NotFound {
                    entity: "summary",
                    id: key.to_string(),
                })?;
            let after = before.with_paid_leave(new_paid_leave);
            let audit = AuditLogEntry::record(
                admin,
                AuditAction::Adjust,
                EntityType::LeaveMonthlySummary,
                key.to_string(),
                Some(&before),
                Some(&after),
                Some(reason),
            )?;
            self.store.commit_summary(&after, &audit).map_err(store_err)?;
            tracing::info!(%key, %admin, paid = after.paid_used_units, "adjusted paid leave");
            Ok(after)
        })
    }

    /// Replaces the check-in and/or check-out of a session with `HH:MM` times.
    ///
    /// Does not recalculate the month; see the module docs.
    pub fn edit_session(
        &mut self,
        admin: &AdminId,
        session_id: &SessionId,
        check_in: Option<&str>,
        check_out: Option<&str>,
        reason: &str,
    ) -> Result<SessionChange, EngineError> {
        let reason = require_reason(reason)?;
        let check_in = check_in.map(parse_clock_time).transpose()?;
        let check_out = check_out.map(parse_clock_time).transpose()?;
        if check_in.is_none() && check_out.is_none() {
            return Err(ValidationError::Empty {
                field: "check-in or check-out",
            }
            .into());
        }

        self.mutate_session(admin, session_id, AuditAction::Update, reason, |session, offset| {
            let offset = session
                .check_in_at
                .map_or(offset, |at| *at.offset());
            if let Some(time) = check_in {
                session.check_in_at = Some(at_clock_time(session.work_date, time, offset));
            }
            if let Some(time) = check_out {
                session.check_out_at = Some(at_clock_time(session.work_date, time, offset));
            }
            Ok(())
        })
    }

    /// Closes an open session whose check-out was never recorded.
    pub fn close_session(
        &mut self,
        admin: &AdminId,
        session_id: &SessionId,
        check_out: &str,
        reason: &str,
    ) -> Result<SessionChange, EngineError> {
        let reason = require_reason(reason)?;
        let check_out = parse_clock_time(check_out)?;

        self.mutate_session(admin, session_id, AuditAction::Close, reason, |session, offset| {
            if session.status != SessionStatus::Open {
                return Err(ValidationError::SessionState {
                    session_id: session.id.to_string(),
                    status: session.status,
                    expected: SessionStatus::Open,
                });
            }
            let offset = session.check_in_at.map_or(offset, |at| *at.offset());
            session.check_out_at = Some(at_clock_time(session.work_date, check_out, offset));
            Ok(())
        })
    }

    /// Records an approved paid-leave allotment.
    pub fn grant_paid_leave(
        &mut self,
        admin: &AdminId,
        user_id: &UserId,
        period: YearMonth,
        units: f64,
        reason: &str,
    ) -> Result<LeaveGrant, EngineError> {
        let reason = require_reason(reason)?;
        let units = require_units("granted units", units)?;
        if units <= 0.0 {
            return Err(ValidationError::InvalidUnits {
                field: "granted units",
                value: units,
            }
            .into());
        }
        let key = SummaryKey::new(user_id.clone(), period);

        let locks = Arc::clone(&self.locks);
        locks.with_lock(&key, || -> Result<_, EngineError> {
            if self.store.employee(user_id).map_err(store_err)?.is_none() {
                return Err(EngineError::NotFound {
                    entity: "user",
                    id: user_id.to_string(),
                });
            }
            let grant = LeaveGrant {
                id: None,
                user_id: user_id.clone(),
                period,
                units,
            };
            let audit = AuditLogEntry::record(
                admin,
                AuditAction::Grant,
                EntityType::LeaveGrant,
                key.to_string(),
                None::<&LeaveGrant>,
                Some(&grant),
                Some(reason),
            )?;
            let stored = self.store.commit_grant(&grant, &audit).map_err(store_err)?;
            tracing::info!(%key, %admin, units, "granted paid leave");
            Ok(stored)
        })
    }

    fn mutate_session(
        &mut self,
        admin: &AdminId,
        session_id: &SessionId,
        action: AuditAction,
        reason: &str,
        apply: impl FnOnce(&mut AttendanceSession, FixedOffset) -> Result<(), ValidationError>,
    ) -> Result<SessionChange, EngineError> {
        let not_found = || EngineError::NotFound {
            entity: "session",
            id: session_id.to_string(),
        };
        let located = self
            .store
            .session(session_id)
            .map_err(store_err)?
            .ok_or_else(not_found)?;
        let key = SummaryKey::new(located.user_id.clone(), YearMonth::of(located.work_date));
        let offset = self.offset;

        let locks = Arc::clone(&self.locks);
        locks.with_lock(&key, || -> Result<_, EngineError> {
            // Re-read under the lock so a concurrent edit is not overwritten.
            let before = self
                .store
                .session(session_id)
                .map_err(store_err)?
                .ok_or_else(not_found)?;
            let mut after = before.clone();
            apply(&mut after, offset)?;
            after.validate()?;
            after.refresh_derived();
            after.checkout_reason = Some(reason.to_string());

            let day = self
                .store
                .calendar_day(after.work_date)
                .map_err(store_err)?
                .unwrap_or_else(|| WorkCalendarDay::undefined(after.work_date));
            let classification = classify(&after, &day);

            let audit = AuditLogEntry::record(
                admin,
                action,
                EntityType::AttendanceSession,
                session_id.to_string(),
                Some(&before),
                Some(&after),
                Some(reason),
            )?;
            self.store.commit_session(&after, &audit).map_err(store_err)?;
            tracing::info!(
                session = %session_id,
                %key,
                %admin,
                action = %action,
                status = %classification.status,
                "session changed; summary needs recalculation"
            );
            Ok(SessionChange {
                session: after,
                classification,
                affected: key.clone(),
            })
        })
    }
}
