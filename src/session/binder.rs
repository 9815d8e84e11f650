use std::sync::Arc;

use serde::Serialize;

use super::store::{ResultSet, SessionReader, SessionState, SubmissionId};
use crate::core::{DerivedViews, DisplayUnits, ViewKind, ViewRef, derive_views};
use crate::error::EngineError;

/// What a view surface should show right now.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Render<'a> {
    /// Nothing has been published yet.
    NotRun,
    Ready {
        kind: ViewKind,
        view: ViewRef<'a>,
    },
    Error {
        message: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Inputs {
    units: DisplayUnits,
    results: Option<usize>,
    in_flight: bool,
}

impl Inputs {
    fn of(state: &SessionState) -> Self {
        Self {
            units: state.units,
            results: state.results.as_ref().map(|r| Arc::as_ptr(r) as usize),
            in_flight: state.phase.in_flight(),
        }
    }
}

/// Keeps the derived view bundle in sync with the session store. The bundle
/// is rebuilt only when units, the published result set or the in-flight flag
/// change; switching the active view never recomputes anything.
pub struct ViewBinder {
    reader: SessionReader,
    active: ViewKind,
    inputs: Option<Inputs>,
    // Held so the pointer in `inputs` cannot be reused by a later allocation.
    results: Option<Arc<ResultSet>>,
    views: Option<Result<Arc<DerivedViews>, EngineError>>,
    derivations: u64,
}

impl ViewBinder {
    pub fn new(reader: SessionReader) -> Self {
        let mut binder = Self {
            reader,
            active: ViewKind::default(),
            inputs: None,
            results: None,
            views: None,
            derivations: 0,
        };
        binder.refresh();
        binder
    }

    /// Pulls the latest store state. Returns whether the views were rebuilt.
    pub fn refresh(&mut self) -> bool {
        let state = self.reader.observe();
        let inputs = Inputs::of(&state);
        if self.inputs.as_ref() == Some(&inputs) {
            return false;
        }

        self.views = state.results.as_ref().map(|results| {
            derive_views(
                &results.config,
                &results.simulation,
                &results.backtest,
                inputs.in_flight,
                inputs.units,
            )
            .map(Arc::new)
        });
        if self.views.is_some() {
            self.derivations += 1;
        }
        self.results = state.results;
        self.inputs = Some(inputs);
        true
    }

    /// Waits for the store to change and rebuilds. Returns `false` once the
    /// store has been dropped.
    pub async fn next(&mut self) -> bool {
        if !self.reader.changed().await {
            return false;
        }
        self.refresh();
        true
    }

    pub fn select(&mut self, kind: ViewKind) {
        self.active = kind;
    }

    pub fn active(&self) -> ViewKind {
        self.active
    }

    pub fn views(&self) -> Option<&Result<Arc<DerivedViews>, EngineError>> {
        self.views.as_ref()
    }

    /// Submission whose published result the current views were derived from.
    pub fn submission(&self) -> Option<SubmissionId> {
        self.results.as_ref().map(|results| results.submission)
    }

    pub fn derivations(&self) -> u64 {
        self.derivations
    }

    pub fn render(&self) -> Render<'_> {
        self.render_kind(self.active)
    }

    pub fn render_kind(&self, kind: ViewKind) -> Render<'_> {
        match &self.views {
            None => Render::NotRun,
            Some(Ok(views)) => Render::Ready {
                kind,
                view: views.view(kind),
            },
            Some(Err(err)) => Render::Error {
                message: err.to_string(),
            },
        }
    }
}
