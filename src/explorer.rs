//! Explorer session: the single owner of the node store and the view state.
//!
//! Every state change goes through `&mut self`, so mutations never
//! interleave. Queries run against the engine collaborator; results are only
//! installed if nothing changed while they were in flight:
//!
//! 1. [`Explorer::plan_refresh`] snapshots (active node, filters, sort, page)
//!    into a [`RefreshTicket`] tagged with a fresh generation.
//! 2. [`RefreshTicket::run`] executes it without borrowing the explorer, so
//!    several tickets may be in flight at once.
//! 3. [`Explorer::apply_refresh`] installs the outcome only if its
//!    generation is still current; superseded outcomes are dropped.

use std::fmt;
use std::sync::Arc;

use crate::compose::{self, FilterSet, Pagination, QueryPair, SortSpec, DEFAULT_PAGE_SIZE, Direction};
use crate::dataset::{self, DatasetStats, DEFAULT_DISPLAY_COLUMNS, EMPLOYER_NAME};
use crate::engine::{self, Engine, EngineError};
use crate::node::{Node, NodeId};
use crate::persist::{self, BlobStore, FILTERS_KEY};
use crate::shape::{self, Shape};
use crate::store::{LimitExceeded, Limits, NodeStore, StoreError};
use crate::translate::{self, TranslateError, Translation, Translator};
use crate::value::{Row, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExplorerConfig {
    pub limits: Limits,
    pub page_size: usize,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        ExplorerConfig {
            limits: Limits::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug)]
pub enum ExplorerError {
    /// Tree size or depth cap reached
    Limit(LimitExceeded),
    /// Translator failed or answered in an unusable form
    Translation(TranslateError),
    /// Engine rejected a query
    Execution(EngineError),
    /// Operation referenced a node that does not exist
    NotFound(NodeId),
    /// Column is not part of the base dataset
    UnknownColumn(String),
    EmptyPrompt,
}

impl fmt::Display for ExplorerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExplorerError::Limit(e) => write!(f, "{}", e),
            ExplorerError::Translation(e) => write!(f, "{}", e),
            ExplorerError::Execution(e) => write!(f, "SQL Error: {}", e),
            ExplorerError::NotFound(id) => write!(f, "Node {} does not exist", id),
            ExplorerError::UnknownColumn(c) => write!(f, "Unknown column: {}", c),
            ExplorerError::EmptyPrompt => write!(f, "Describe the filter before submitting"),
        }
    }
}

impl std::error::Error for ExplorerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExplorerError::Limit(e) => Some(e),
            ExplorerError::Translation(e) => Some(e),
            ExplorerError::Execution(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LimitExceeded> for ExplorerError {
    fn from(e: LimitExceeded) -> Self {
        ExplorerError::Limit(e)
    }
}

impl From<TranslateError> for ExplorerError {
    fn from(e: TranslateError) -> Self {
        ExplorerError::Translation(e)
    }
}

impl From<EngineError> for ExplorerError {
    fn from(e: EngineError) -> Self {
        ExplorerError::Execution(e)
    }
}

impl From<StoreError> for ExplorerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Limit(e) => ExplorerError::Limit(e),
            StoreError::MissingParent(id) => ExplorerError::NotFound(id),
        }
    }
}

/// Where a draft will land once committed.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftTarget {
    /// New node under `parent` (`None` = on the base dataset)
    Add { parent: Option<NodeId> },
    /// Replacement for an existing node
    Edit { node: NodeId },
}

/// A translated step that has not been committed yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub target: DraftTarget,
    pub prompt: String,
    pub fragment: String,
    pub shape: Shape,
}

/// Result of proposing a new or edited step.
#[derive(Debug, Clone, PartialEq)]
pub enum Proposal {
    Committed(NodeId),
    /// The translator asked a question instead of producing a fragment.
    NeedsClarification(String),
    /// The step runs but yields no rows. Nothing was committed; pass the
    /// draft to [`Explorer::commit_draft`] to keep it anyway.
    EmptyResult(Draft),
}

/// Filters, sort and page applied to the active step's output.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub filters: FilterSet,
    pub sort: SortSpec,
    pub page: usize,
}

/// What is currently on screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultView {
    pub rows: Vec<Row>,
    pub total_rows: u64,
    pub error: Option<String>,
}

/// Snapshot of the queries for one view, tagged with the generation it was planned at.
#[derive(Debug, Clone)]
pub struct RefreshTicket {
    generation: u64,
    queries: QueryPair,
}

#[derive(Debug)]
pub struct RefreshOutcome {
    generation: u64,
    result: Result<(Vec<Row>, u64), EngineError>,
}

impl RefreshOutcome {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

impl RefreshTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn queries(&self) -> &QueryPair {
        &self.queries
    }

    /// Issue the count and data queries together.
    pub async fn run(self, engine: &dyn Engine) -> RefreshOutcome {
        let result = tokio::try_join!(
            execute_logged(engine, &self.queries.count),
            execute_logged(engine, &self.queries.data),
        )
        .map(|(count_rows, rows)| (rows, engine::read_count(&count_rows)));

        RefreshOutcome {
            generation: self.generation,
            result,
        }
    }
}

async fn execute_logged(engine: &dyn Engine, sql: &str) -> Result<Vec<Row>, EngineError> {
    let result = engine.execute(sql).await;
    if let Err(e) = &result {
        tracing::debug!(query = %sql, error = %e, "engine rejected query");
    }
    result
}

pub struct Explorer {
    store: NodeStore,
    view: ViewState,
    config: ExplorerConfig,
    engine: Arc<dyn Engine>,
    translator: Arc<dyn Translator>,
    blobs: Arc<dyn BlobStore>,
    generation: u64,
    display: ResultView,
}

impl fmt::Debug for Explorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Explorer")
            .field("store", &self.store)
            .field("view", &self.view)
            .field("config", &self.config)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl Explorer {
    /// Restore the persisted tree and filters (if any) and start a session.
    pub fn open(
        engine: Arc<dyn Engine>,
        translator: Arc<dyn Translator>,
        blobs: Arc<dyn BlobStore>,
        config: ExplorerConfig,
    ) -> Self {
        let store = NodeStore::open(Arc::clone(&blobs), config.limits);
        let filters = persist::load_json::<FilterSet>(blobs.as_ref(), FILTERS_KEY).unwrap_or_default();

        let mut explorer = Explorer {
            store,
            view: ViewState {
                filters,
                sort: SortSpec::none(),
                page: 1,
            },
            config,
            engine,
            translator,
            blobs,
            generation: 0,
            display: ResultView::default(),
        };
        // A restored active step keeps its own ORDER BY.
        if explorer.store.active_id().is_none() && explorer.current_shape().contains(EMPLOYER_NAME) {
            explorer.view.sort = SortSpec::by(EMPLOYER_NAME, Direction::Asc);
        }
        explorer
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn engine(&self) -> Arc<dyn Engine> {
        Arc::clone(&self.engine)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn displayed(&self) -> &ResultView {
        &self.display
    }

    /// Output shape of the active step, or the base dataset's.
    pub fn current_shape(&self) -> Shape {
        self.store
            .active_node()
            .map(|n| n.shape.clone())
            .unwrap_or_else(dataset::base_shape)
    }

    pub fn display_columns(&self) -> Vec<String> {
        match self.store.active_node() {
            Some(node) => node.shape.names().map(String::from).collect(),
            None => DEFAULT_DISPLAY_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.view.page, self.config.page_size)
    }

    pub fn total_pages(&self) -> u64 {
        self.pagination().total_pages(self.display.total_rows)
    }

    // ------------------------------------------------------------------
    // Proposals
    // ------------------------------------------------------------------

    /// Translate `prompt` into a new step under `parent`, validate it and commit it.
    pub async fn propose_add(
        &mut self,
        parent: Option<&NodeId>,
        prompt: &str,
    ) -> Result<Proposal, ExplorerError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ExplorerError::EmptyPrompt);
        }
        if let Some(parent) = parent {
            if !self.store.contains(parent) {
                return Err(ExplorerError::NotFound(parent.clone()));
            }
        }
        self.store.can_add(parent)?;

        let target = DraftTarget::Add {
            parent: parent.cloned(),
        };
        self.propose(target, parent.cloned(), prompt).await
    }

    /// Translate `prompt` into a replacement for node `id`, validate it and commit it.
    pub async fn propose_edit(&mut self, id: &NodeId, prompt: &str) -> Result<Proposal, ExplorerError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ExplorerError::EmptyPrompt);
        }
        let parent = self
            .store
            .get(id)
            .ok_or_else(|| ExplorerError::NotFound(id.clone()))?
            .parent_id
            .clone();

        let target = DraftTarget::Edit { node: id.clone() };
        self.propose(target, parent, prompt).await
    }

    async fn propose(
        &mut self,
        target: DraftTarget,
        parent: Option<NodeId>,
        prompt: &str,
    ) -> Result<Proposal, ExplorerError> {
        let parent_shape = self.store.parent_shape(parent.as_ref());
        let translation = self
            .translator
            .translate(prompt, &shape::describe(&parent_shape))
            .await?;

        let (fragment, shape) = match translation {
            Translation::Generated { fragment, shape } => (fragment, shape),
            Translation::Clarification(question) => {
                tracing::info!(%question, "translator asked for clarification");
                return Ok(Proposal::NeedsClarification(question));
            }
        };
        translate::check_fragment(&fragment)?;

        let draft = Draft {
            target,
            prompt: prompt.to_string(),
            fragment,
            shape,
        };

        let probe = self.validation_query(&parent, &draft);
        match self.engine.execute(&probe).await {
            Err(e) => {
                tracing::debug!(query = %probe, error = %e, "proposed step failed validation");
                return Err(ExplorerError::Execution(e));
            }
            Ok(rows) if rows.is_empty() => return Ok(Proposal::EmptyResult(draft)),
            Ok(_) => {}
        }

        self.commit_draft(draft).map(Proposal::Committed)
    }

    fn validation_query(&self, parent: &Option<NodeId>, draft: &Draft) -> String {
        let parent_chain = self.store.ancestor_chain(parent.as_ref());
        let proposed = Node::new(
            NodeId::pending(),
            parent.clone(),
            draft.prompt.as_str(),
            draft.fragment.as_str(),
            draft.shape.clone(),
        );
        compose::validation_query(&parent_chain, &proposed)
    }

    /// Commit a draft without (re-)validating it.
    ///
    /// Used to keep a step whose probe came back empty. Limits and the
    /// target's existence are still checked, since the tree may have changed
    /// since the draft was made.
    pub fn commit_draft(&mut self, draft: Draft) -> Result<NodeId, ExplorerError> {
        match draft.target {
            DraftTarget::Add { parent } => {
                let id = self.store.add(parent, draft.prompt, draft.fragment, draft.shape)?;
                tracing::debug!(node = %id, "committed new step");
                self.reset_navigation();
                Ok(id)
            }
            DraftTarget::Edit { node } => {
                let previous = self
                    .store
                    .get(&node)
                    .ok_or_else(|| ExplorerError::NotFound(node.clone()))?;
                let shape_changed = !shape::equal(&previous.shape, &draft.shape);

                self.store.update(&node, draft.prompt, draft.fragment, draft.shape);
                // Just validated against its current parent.
                self.store.clear_stale(&node);
                if shape_changed {
                    self.view.filters = FilterSet::default();
                    self.save_filters();
                }
                self.view.page = 1;
                self.touch();
                tracing::debug!(node = %node, shape_changed, "committed edited step");
                Ok(node)
            }
        }
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Show `id`'s output (`None` = the base dataset). Unknown ids are ignored.
    pub fn activate(&mut self, id: Option<&NodeId>) -> bool {
        if !self.store.set_active(id) {
            return false;
        }
        self.reset_navigation();
        true
    }

    /// Delete a leaf step. Steps with children (and unknown ids) are ignored.
    pub fn delete(&mut self, id: &NodeId) -> bool {
        if !self.store.delete(id) {
            return false;
        }
        self.reset_navigation();
        true
    }

    pub fn reset_tree(&mut self) {
        self.store.clear();
        self.reset_navigation();
    }

    /// Filters and sort may name columns the new view lacks, so both go.
    fn reset_navigation(&mut self) {
        self.view.filters = FilterSet::default();
        self.view.sort = SortSpec::none();
        self.view.page = 1;
        self.save_filters();
        self.touch();
    }

    // ------------------------------------------------------------------
    // Filters, sort, page
    // ------------------------------------------------------------------

    pub fn filters(&self) -> &FilterSet {
        &self.view.filters
    }

    pub fn set_filters(&mut self, filters: FilterSet) {
        self.update_filters(|f| *f = filters);
    }

    pub fn update_filters(&mut self, change: impl FnOnce(&mut FilterSet)) {
        change(&mut self.view.filters);
        self.view.page = 1;
        self.save_filters();
        self.touch();
    }

    pub fn toggle_employer(&mut self, employer: &str) {
        self.update_filters(|f| f.toggle_employer(employer));
    }

    pub fn toggle_job_title(&mut self, title: &str) {
        self.update_filters(|f| f.toggle_job_title(title));
    }

    pub fn reset_filters(&mut self) {
        self.update_filters(|f| *f = FilterSet::default());
    }

    /// Sort by `column`; repeating the current column flips direction.
    pub fn sort_by(&mut self, column: &str) {
        self.set_sort(self.view.sort.toggled(column));
    }

    pub fn set_sort(&mut self, sort: SortSpec) {
        self.view.sort = sort;
        self.view.page = 1;
        self.touch();
    }

    pub fn set_page(&mut self, page: usize) {
        self.view.page = page.max(1);
        self.touch();
    }

    fn save_filters(&self) {
        persist::save_json(self.blobs.as_ref(), FILTERS_KEY, &self.view.filters);
    }

    /// Any state change supersedes results still in flight.
    fn touch(&mut self) {
        self.generation += 1;
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Queries for the current view.
    pub fn current_queries(&self) -> QueryPair {
        let chain = self.store.ancestor_chain(self.store.active_id());
        compose::compose_pair(
            &chain,
            &self.view.filters,
            &self.view.sort,
            &self.pagination(),
        )
    }

    /// Snapshot the current view into a ticket. Tickets planned earlier are superseded.
    pub fn plan_refresh(&mut self) -> RefreshTicket {
        self.touch();
        RefreshTicket {
            generation: self.generation,
            queries: self.current_queries(),
        }
    }

    /// Install a finished refresh. Returns `false` if it was superseded and dropped.
    pub fn apply_refresh(&mut self, outcome: RefreshOutcome) -> bool {
        if outcome.generation != self.generation {
            tracing::debug!(
                stale = outcome.generation,
                current = self.generation,
                "discarding superseded query result"
            );
            return false;
        }

        self.display = match outcome.result {
            Ok((rows, total_rows)) => ResultView {
                rows,
                total_rows,
                error: None,
            },
            Err(e) => ResultView {
                rows: Vec::new(),
                total_rows: 0,
                error: Some(e.to_string()),
            },
        };
        true
    }

    /// Plan, run and apply a refresh of the current view.
    pub async fn refresh(&mut self) -> Result<&ResultView, ExplorerError> {
        let ticket = self.plan_refresh();
        let engine = self.engine();
        let outcome = ticket.run(engine.as_ref()).await;
        self.apply_refresh(outcome);

        match &self.display.error {
            Some(message) => Err(ExplorerError::Execution(EngineError::new(message.clone()))),
            None => Ok(&self.display),
        }
    }

    /// Run arbitrary query text as-is.
    pub async fn run_sql(&self, sql: &str) -> Result<Vec<Row>, ExplorerError> {
        Ok(execute_logged(self.engine.as_ref(), sql).await?)
    }

    pub async fn stats(&self) -> Result<DatasetStats, ExplorerError> {
        let rows = self.run_sql(&dataset::stats_query()).await?;
        Ok(rows.first().map(DatasetStats::from_row).unwrap_or_default())
    }

    /// Distinct values of a base column, most frequent first.
    pub async fn unique_values(&self, column: &str) -> Result<Vec<Value>, ExplorerError> {
        let sql = dataset::unique_values_query(column)
            .ok_or_else(|| ExplorerError::UnknownColumn(column.to_string()))?;
        let rows = self.run_sql(&sql).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.get(column).cloned())
            .collect())
    }
}
