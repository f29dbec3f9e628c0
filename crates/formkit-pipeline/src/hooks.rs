//! Lifecycle hooks
//!
//! Hooks are typed pipeline stages registered at one of three points:
//!
//! | Point | Runs | Sees |
//! |-------|------|------|
//! | `BeforeSubmit` | after validation, before any I/O | raw validated record |
//! | `OnSubmit` | right after `BeforeSubmit` | raw validated record |
//! | `AfterSubmit` | after persistence succeeded | record and receipt |
//!
//! `OnSubmit` hooks see the record before attachments are uploaded, so file
//! fields still hold file handles rather than URLs. Use `AfterSubmit` to
//! observe final URLs through the receipt.
//!
//! Every hook returns a [`HookOutcome`]. An abort before I/O stops the
//! submission; an abort after persistence is logged and ignored.

use crate::error::Stage;
use crate::pipeline::SubmissionReceipt;
use async_trait::async_trait;
use formkit_schema::ValidatedRecord;
use std::fmt;

/// Where a hook runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    /// First stage after validation
    BeforeSubmit,
    /// Second stage after validation
    OnSubmit,
    /// After persistence succeeded
    AfterSubmit,
}

impl From<HookPoint> for Stage {
    fn from(point: HookPoint) -> Self {
        match point {
            HookPoint::BeforeSubmit => Stage::BeforeSubmit,
            HookPoint::OnSubmit => Stage::OnSubmit,
            HookPoint::AfterSubmit => Stage::AfterSubmit,
        }
    }
}

/// Continue or abort
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// Proceed to the next stage
    Continue,
    /// Stop, with a message shown to the user
    Abort(String),
}

impl HookOutcome {
    /// Abort with a reason
    #[must_use]
    pub fn abort(reason: impl Into<String>) -> Self {
        Self::Abort(reason.into())
    }
}

/// What a hook is given
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    /// Point being run
    pub point: HookPoint,
    /// Validated record, before upload
    pub record: &'a ValidatedRecord,
    /// Present for `AfterSubmit` only
    pub receipt: Option<&'a SubmissionReceipt>,
}

/// A lifecycle stage supplied by the host
#[async_trait]
pub trait SubmitHook: Send + Sync {
    /// Run the hook
    async fn run(&self, ctx: &HookContext<'_>) -> HookOutcome;
}

/// Hook backed by a synchronous closure
pub struct FnHook<F> {
    name: &'static str,
    f: F,
}

impl<F> FnHook<F>
where
    F: Fn(&HookContext<'_>) -> HookOutcome + Send + Sync,
{
    /// Wrap a closure
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<F> fmt::Debug for FnHook<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FnHook").field(&self.name).finish()
    }
}

#[async_trait]
impl<F> SubmitHook for FnHook<F>
where
    F: Fn(&HookContext<'_>) -> HookOutcome + Send + Sync,
{
    async fn run(&self, ctx: &HookContext<'_>) -> HookOutcome {
        (self.f)(ctx)
    }
}
